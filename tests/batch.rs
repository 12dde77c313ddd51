use std::fs;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use dealscrub::batch::Engine;
use dealscrub::config::EngineConfig;
use dealscrub::io::excel_read;
use dealscrub::io::excel_write::{self, CarrierLookup};
use dealscrub::io::sources::{DirAuthorityFetcher, DirOptOutFetcher};
use dealscrub::model::DiagnosticKind;
use tempfile::tempdir;

fn write_workbook(path: &Path, headers: &[&str], rows: &[Vec<&str>]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .expect("header written");
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            worksheet
                .write_string((row_idx + 1) as u32, col as u16, *cell)
                .expect("cell written");
        }
    }
    workbook.save(path).expect("workbook saved");
}

fn read_sheet(path: &Path) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("workbook opened");
    let sheet = workbook.sheet_names().first().cloned().expect("sheet");
    let range = workbook
        .worksheet_range(&sheet)
        .expect("sheet present")
        .expect("sheet read");
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    DataType::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

fn origin_headers(config: &EngineConfig) -> Vec<String> {
    let mut headers: Vec<String> = config
        .fields
        .required()
        .iter()
        .map(|c| c.to_string())
        .collect();
    headers.push("Person - Phone - Work".to_string());
    headers.push("Person - Phone - Home".to_string());
    headers
}

/// Required columns are: id, stage, contact, title, owner, county, value.
fn origin_row<'a>(
    deal_id: &'a str,
    stage: &'a str,
    work_phone: &'a str,
    home_phone: &'a str,
) -> Vec<&'a str> {
    vec![
        deal_id,
        stage,
        "Jane Doe",
        "doe property",
        "Sam Seller",
        "Bay, King, Pierce",
        "1000",
        work_phone,
        home_phone,
    ]
}

#[test]
fn end_to_end_batch_cleans_an_origin_folder() {
    let temp = tempdir().expect("temp dir");
    let input = temp.path().join("for_processing");
    let lists = temp.path().join("lists");
    let authority = temp.path().join("pd_phone");
    let output = temp.path().join("output");
    for dir in [&input, &lists, &authority] {
        fs::create_dir_all(dir).expect("dir created");
    }

    let config = EngineConfig::default();
    let header_names = origin_headers(&config);
    let headers: Vec<&str> = header_names.iter().map(String::as_str).collect();

    write_workbook(
        &input.join("leads.xlsx"),
        &headers,
        &[
            // Clean row: phone survives every pass.
            origin_row("D1", "Staging", "(555) 123-4567", ""),
            // Opted-out phone: remark, no chosen phone.
            origin_row("D2", "Staging", "5550000009", ""),
            // Authority conflict: remark, no chosen phone.
            origin_row("D3", "Staging", "5550000001", ""),
            // Stage outside every configured group: dropped.
            origin_row("D4", "Won", "5550000002", ""),
        ],
    );

    fs::write(lists.join("DNC (Cold-PD).csv"), "5550000009\n").expect("list written");
    fs::write(lists.join("CallTextOut-7d (PD).csv"), "").expect("list written");

    write_workbook(
        &authority.join("export_1.xlsx"),
        &["Deal - ID", "Deal - Stage", "Person - Phone - Work"],
        &[vec!["D9", "Won", "555-000-0001"]],
    );

    let opt_out_fetcher = DirOptOutFetcher::new(&lists);
    let authority_fetcher = DirAuthorityFetcher::new(&authority);
    let engine = Engine::new(&config, &opt_out_fetcher, &authority_fetcher);

    let files = vec![excel_read::read_origin_file(&input.join("leads.xlsx")).expect("origin read")];
    let report = engine.run(files);

    assert!(report.diagnostics.is_empty());
    assert_eq!(report.files.len(), 1);
    // D4's stage matches no group; the other three rows survive.
    assert_eq!(report.record_count(), 3);

    fs::create_dir_all(&output).expect("output dir");
    let cleaned_path = output.join("leads_cleaned.xlsx");
    excel_write::write_file_output(&cleaned_path, &report.files[0]).expect("output written");

    let sheet = read_sheet(&cleaned_path);
    assert_eq!(
        sheet[0],
        [
            "Carrier",
            "Deal - ID",
            "Phone Number",
            "First Name",
            "Deal - Value",
            "Deal - Owner",
            "Deal - County",
            "Deal - Title",
            "Deal - Stage",
            "Remarks"
        ]
    );
    assert_eq!(
        sheet[1],
        [
            "",
            "D1",
            "5551234567",
            "Jane",
            "1000",
            "Sam",
            "\"Bay, King and Pierce\"",
            "doe property",
            "Staging",
            ""
        ]
    );
    assert_eq!(sheet[2][1], "D2");
    assert_eq!(sheet[2][2], "");
    assert_eq!(
        sheet[2][9],
        "Phone number 5550000009 exist in DNC (Cold-PD).csv"
    );
    assert_eq!(sheet[3][1], "D3");
    assert_eq!(sheet[3][2], "");
    assert_eq!(
        sheet[3][9],
        "5550000001 exists in Deal ID D9 on stage Won (PD Phone Numbers)"
    );
}

#[test]
fn corrupt_authority_workbook_degrades_without_losing_siblings() {
    let temp = tempdir().expect("temp dir");
    let lists = temp.path().join("lists");
    let authority = temp.path().join("pd_phone");
    fs::create_dir_all(&lists).expect("dir created");
    fs::create_dir_all(&authority).expect("dir created");
    fs::write(lists.join("DNC (Cold-PD).csv"), "").expect("list written");
    fs::write(lists.join("CallTextOut-7d (PD).csv"), "").expect("list written");

    write_workbook(
        &authority.join("export_good.xlsx"),
        &["Deal - ID", "Deal - Stage", "Person - Phone - Work"],
        &[vec!["D9", "Won", "5550000001"]],
    );
    fs::write(authority.join("zz_corrupt.xlsx"), b"this is not a zip archive")
        .expect("corrupt file written");

    let config = EngineConfig::default();
    let opt_out_fetcher = DirOptOutFetcher::new(&lists);
    let authority_fetcher = DirAuthorityFetcher::new(&authority);
    let engine = Engine::new(&config, &opt_out_fetcher, &authority_fetcher);

    let file = dealscrub::model::OriginFile {
        name: "leads.xlsx".into(),
        columns: origin_headers(&config),
        rows: vec![dealscrub::model::RawDealRow::from_pairs([
            ("Deal - ID", "D1"),
            ("Deal - Stage", "Staging"),
            ("Person - Phone - Work", "5550000001"),
        ])],
    };
    let report = engine.run(vec![file]);

    // The readable workbook's claims still apply.
    assert_eq!(
        report.files[0].records[0].remarks,
        "5550000001 exists in Deal ID D9 on stage Won (PD Phone Numbers)"
    );
    assert_eq!(report.files[0].records[0].phone, "");
    // The corrupt workbook is reported by name, once.
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::SourceUnavailable);
    assert_eq!(report.diagnostics[0].subject, "zz_corrupt.xlsx");
}

#[test]
fn cold_stage_rows_consult_their_own_opt_out_sources() {
    use dealscrub::config::{OptOutPolicy, ShapePolicy, StageSourceRule};
    use dealscrub::io::sources::{StaticAuthorityFetcher, StaticOptOutFetcher};

    let config = EngineConfig {
        shape_policy: ShapePolicy::Universal,
        opt_out: OptOutPolicy {
            rules: vec![StageSourceRule {
                stages: vec!["Cold Deals - Priority 2".into()],
                sources: vec!["Cold DNC.csv".into()],
            }],
            default_sources: vec!["General DNC.csv".into()],
        },
        ..EngineConfig::default()
    };
    let opt_out_fetcher = StaticOptOutFetcher::new([
        ("Cold DNC.csv", vec!["5550000001"]),
        ("General DNC.csv", vec!["5550000002"]),
    ]);
    let authority_fetcher = StaticAuthorityFetcher::default();
    let engine = Engine::new(&config, &opt_out_fetcher, &authority_fetcher);

    let row = |deal: &str, stage: &str| {
        dealscrub::model::RawDealRow::from_pairs([
            ("Deal - ID", deal),
            ("Deal - Stage", stage),
            ("Person - Phone - Work", "5550000001"),
            ("Person - Phone - Home", "5550000002"),
        ])
    };
    let file = dealscrub::model::OriginFile {
        name: "leads.xlsx".into(),
        columns: origin_headers(&config),
        rows: vec![
            row("D1", "Cold Deals - Priority 2"),
            row("D2", "Staging"),
        ],
    };
    let report = engine.run(vec![file]);

    assert!(report.diagnostics.is_empty());
    let records = &report.files[0].records;

    // The cold row only sees the cold list: 5550000001 is blocked there and
    // 5550000002 survives to become the chosen phone.
    assert_eq!(
        records[0].remarks,
        "Phone number 5550000001 exist in Cold DNC.csv"
    );
    assert_eq!(records[0].phone, "5550000002");

    // The other stage uses the default list instead: the blocked and chosen
    // numbers swap.
    assert_eq!(
        records[1].remarks,
        "Phone number 5550000002 exist in General DNC.csv"
    );
    assert_eq!(records[1].phone, "5550000001");
}

#[test]
fn missing_opt_out_file_degrades_to_diagnostic() {
    let temp = tempdir().expect("temp dir");
    let lists = temp.path().join("lists");
    let authority = temp.path().join("pd_phone");
    fs::create_dir_all(&lists).expect("dir created");
    fs::create_dir_all(&authority).expect("dir created");
    fs::write(lists.join("DNC (Cold-PD).csv"), "5550000009\n").expect("list written");
    // "CallTextOut-7d (PD).csv" is deliberately absent.

    let config = EngineConfig::default();
    let opt_out_fetcher = DirOptOutFetcher::new(&lists);
    let authority_fetcher = DirAuthorityFetcher::new(&authority);
    let engine = Engine::new(&config, &opt_out_fetcher, &authority_fetcher);

    let headers = origin_headers(&config);
    let file = dealscrub::model::OriginFile {
        name: "leads.xlsx".into(),
        columns: headers,
        rows: vec![dealscrub::model::RawDealRow::from_pairs([
            ("Deal - ID", "D1"),
            ("Deal - Stage", "Staging"),
            ("Person - Phone - Work", "5550000009"),
        ])],
    };
    let report = engine.run(vec![file]);

    // The present list still matches; the absent one is reported once.
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::SourceUnavailable);
    assert_eq!(report.diagnostics[0].subject, "CallTextOut-7d (PD).csv");
    assert_eq!(
        report.files[0].records[0].remarks,
        "Phone number 5550000009 exist in DNC (Cold-PD).csv"
    );
}

#[test]
fn merged_export_injects_carrier_lookup_formula() {
    let temp = tempdir().expect("temp dir");
    let lists = temp.path().join("lists");
    let authority = temp.path().join("pd_phone");
    fs::create_dir_all(&lists).expect("dir created");
    fs::create_dir_all(&authority).expect("dir created");
    fs::write(lists.join("DNC (Cold-PD).csv"), "").expect("list written");
    fs::write(lists.join("CallTextOut-7d (PD).csv"), "").expect("list written");

    let config = EngineConfig::default();
    let opt_out_fetcher = DirOptOutFetcher::new(&lists);
    let authority_fetcher = DirAuthorityFetcher::new(&authority);
    let engine = Engine::new(&config, &opt_out_fetcher, &authority_fetcher);

    let headers = origin_headers(&config);
    let file = dealscrub::model::OriginFile {
        name: "leads.xlsx".into(),
        columns: headers,
        rows: vec![dealscrub::model::RawDealRow::from_pairs([
            ("Deal - ID", "D1"),
            ("Deal - Stage", "Staging"),
            ("Person - Phone - Work", "5551234567"),
        ])],
    };
    let report = engine.run(vec![file]);
    assert_eq!(report.record_count(), 1);

    let merged_path = temp.path().join("merged.xlsx");
    let carrier = CarrierLookup {
        sheet: "Carriers".into(),
    };
    excel_write::write_merged(&merged_path, &report.files, Some(&carrier)).expect("merged written");

    let mut workbook: Xlsx<_> = open_workbook(&merged_path).expect("merged opened");
    let sheet = workbook.sheet_names().first().cloned().expect("sheet");
    assert_eq!(sheet, "leads");
    let formulas = workbook
        .worksheet_formula(&sheet)
        .expect("formula range present")
        .expect("formula range read");
    let formula_cells: Vec<String> = formulas
        .used_cells()
        .map(|(_, _, value)| value.clone())
        .collect();
    assert_eq!(formula_cells.len(), 1);
    assert!(formula_cells[0].contains("VLOOKUP"));
    assert!(formula_cells[0].contains("Carriers"));
}
