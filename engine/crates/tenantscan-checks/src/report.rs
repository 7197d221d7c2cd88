//! Report writers for completed audits

use csv::WriterBuilder;
use rust_xlsxwriter::{Color, Format, Workbook};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tenantscan_core::{Error, Result, ScanResult};
use tracing::info;

const COLUMNS: [&str; 4] = ["id", "name", "status", "comment"];

/// Output format, chosen from the report path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
    Xlsx,
}

impl ReportFormat {
    /// `.csv` and `.xlsx` select their format; anything else is written as JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ReportFormat::Csv,
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ReportFormat::Xlsx,
            _ => ReportFormat::Json,
        }
    }
}

/// Write `{id, name, status, comment}` records in the given order
pub fn write_report(path: impl AsRef<Path>, results: &[&ScanResult]) -> Result<()> {
    let path = path.as_ref();
    let format = ReportFormat::from_path(path);
    info!("Writing {} results to {} ({:?})", results.len(), path.display(), format);

    match format {
        ReportFormat::Csv => write_csv(File::create(path)?, results),
        ReportFormat::Json => write_json(File::create(path)?, results),
        ReportFormat::Xlsx => write_xlsx(path, results),
    }
}

/// CSV with a header row; informational entries have an empty status
pub fn write_csv<W: Write>(writer: W, results: &[&ScanResult]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for result in results {
        writer.serialize(result).map_err(report_error)?;
    }
    writer.flush()?;
    Ok(())
}

/// Pretty-printed JSON array
pub fn write_json<W: Write>(writer: W, results: &[&ScanResult]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Spreadsheet with a bold header row. Each result row is filled with the
/// colour of its verdict; informational rows stay unfilled.
pub fn write_xlsx(path: &Path, results: &[&ScanResult]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Audit").map_err(report_error)?;

    let header = Format::new().set_bold();
    for (col, title) in COLUMNS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *title, &header)
            .map_err(report_error)?;
    }

    for (i, result) in results.iter().enumerate() {
        let row = i as u32 + 1;
        let format = row_format(result);
        let cells = [
            result.id.as_str(),
            result.name.as_str(),
            result.status_str(),
            result.comment.as_str(),
        ];
        for (col, text) in cells.iter().enumerate() {
            sheet
                .write_string_with_format(row, col as u16, *text, &format)
                .map_err(report_error)?;
        }
    }

    sheet.autofit();
    workbook.save(path).map_err(report_error)?;
    Ok(())
}

fn row_format(result: &ScanResult) -> Format {
    match result.status.and_then(|verdict| hex_rgb(verdict.color_hex())) {
        Some(rgb) => Format::new().set_background_color(Color::RGB(rgb)),
        None => Format::new(),
    }
}

fn hex_rgb(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex.trim_start_matches('#'), 16).ok()
}

fn report_error(e: impl std::fmt::Display) -> Error {
    Error::Report(e.to_string())
}
