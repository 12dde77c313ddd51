//! Workbook reading. Everything is coerced to strings: the upstream exports
//! are string-typed and the engine only ever compares text.

use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};

use crate::error::{CleanError, Result};
use crate::model::{OriginFile, RawDealRow};

/// Reads an origin file: the first worksheet, header row first, every
/// following row keyed by the header.
pub fn read_origin_file(path: &Path) -> Result<OriginFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let (columns, rows) = read_table(path)?;
    Ok(OriginFile {
        name,
        columns,
        rows,
    })
}

/// Reads the first worksheet of a workbook into header-keyed rows, dropping
/// the header itself.
pub fn read_rows(path: &Path) -> Result<Vec<RawDealRow>> {
    let (_, rows) = read_table(path)?;
    Ok(rows)
}

fn read_table(path: &Path) -> Result<(Vec<String>, Vec<RawDealRow>)> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| CleanError::InvalidWorkbook(format!("{} has no sheets", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| CleanError::InvalidWorkbook(format!("missing sheet '{sheet_name}'")))??;

    let mut row_iter = range.rows();
    let columns: Vec<String> = match row_iter.next() {
        Some(header) => header
            .iter()
            .map(|cell| cell_to_string(Some(cell)))
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for raw_row in row_iter {
        let mut row = RawDealRow::default();
        for (idx, column) in columns.iter().enumerate() {
            if column.is_empty() {
                continue;
            }
            row.set(column.clone(), cell_to_string(raw_row.get(idx)));
        }
        rows.push(row);
    }

    Ok((columns, rows))
}

/// Reads every non-empty cell of every sheet as one raw phone value. Opt-out
/// exports arrive both as single-column lists and as multi-sheet workbooks;
/// all cells are treated alike.
pub fn read_phone_list(path: &Path) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let mut values = Vec::new();
    for sheet_name in sheet_names {
        let range = workbook
            .worksheet_range(&sheet_name)
            .ok_or_else(|| CleanError::InvalidWorkbook(format!("missing sheet '{sheet_name}'")))??;
        for row in range.rows() {
            for cell in row {
                let value = cell_to_string(Some(cell));
                if !value.trim().is_empty() {
                    values.push(value);
                }
            }
        }
    }
    Ok(values)
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => {
            // Excel often re-types phone and id columns as floats; render
            // whole values without the trailing ".0".
            if value.fract() == 0.0 {
                format!("{}", *value as i64)
            } else {
                value.to_string()
            }
        }
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
