//! Cleaned workbook output: one workbook per origin file, or a merged
//! multi-sheet export with the carrier lookup formula injected.

use std::path::Path;

use rust_xlsxwriter::{Formula, Workbook, Worksheet};

use crate::error::Result;
use crate::model::{CARRIER_COLUMN, FileOutput, PHONE_COLUMN};

/// Configuration of the carrier lookup injected into the merged export. The
/// formula references an external carrier table sheet; the engine only
/// contributes the phone and carrier column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierLookup {
    /// Name of the sheet holding the phone → carrier table (phones in column
    /// A, carriers in column B).
    pub sheet: String,
}

/// Writes the cleaned records of one origin file to `path`.
pub fn write_file_output(path: &Path, file: &FileOutput) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    write_sheet(worksheet, file, None)?;
    workbook.save(path)?;
    Ok(())
}

/// Writes every origin file into one workbook, one sheet per file. When a
/// carrier lookup is configured, every data row gets a lookup formula in its
/// carrier column.
pub fn write_merged(path: &Path, files: &[FileOutput], carrier: Option<&CarrierLookup>) -> Result<()> {
    let mut workbook = Workbook::new();
    let mut used_names: Vec<String> = Vec::new();

    for file in files {
        let name = sheet_name_for(&file.origin, &used_names);
        used_names.push(name.clone());
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        write_sheet(worksheet, file, carrier)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_sheet(
    worksheet: &mut Worksheet,
    file: &FileOutput,
    carrier: Option<&CarrierLookup>,
) -> Result<()> {
    let columns = file.columns();
    for (col_idx, header) in columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, *header)?;
    }

    let carrier_positions = carrier.and_then(|lookup| {
        let carrier_col = columns.iter().position(|c| *c == CARRIER_COLUMN)?;
        let phone_col = columns.iter().position(|c| *c == PHONE_COLUMN)?;
        Some((lookup, carrier_col as u16, phone_col as u16))
    });

    for (row_idx, record) in file.records.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        for (col_idx, column) in columns.iter().enumerate() {
            worksheet.write_string(row, col_idx as u16, record.cell(column))?;
        }
        if let Some((lookup, carrier_col, phone_col)) = carrier_positions {
            let formula = carrier_formula(&lookup.sheet, phone_col, row);
            worksheet.write_formula(row, carrier_col, Formula::new(formula))?;
        }
    }

    Ok(())
}

/// Builds the per-row carrier lookup, e.g.
/// `=IFERROR(VLOOKUP($C2,'Carriers'!$A:$B,2,FALSE),"")`.
fn carrier_formula(carrier_sheet: &str, phone_col: u16, row: u32) -> String {
    format!(
        "=IFERROR(VLOOKUP(${}{},'{}'!$A:$B,2,FALSE),\"\")",
        column_letters(phone_col),
        row + 1,
        carrier_sheet
    )
}

fn column_letters(mut col: u16) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Derives a legal, unique sheet name from an origin file name.
fn sheet_name_for(origin: &str, used: &[String]) -> String {
    let stem = origin.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(origin);
    let mut base: String = stem
        .chars()
        .map(|ch| match ch {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(28)
        .collect();
    if base.is_empty() {
        base = "Sheet".to_string();
    }
    if !used.contains(&base) {
        return base;
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{base}_{counter}");
        if !used.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
