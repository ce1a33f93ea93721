//! Tabular detection report
//!
//! One row per detection, in the order the detections were produced. The
//! first column labels the owning frame with its index and timestamp, the
//! remaining four carry the box bounds.

use crate::config::ReportFormat;
use crate::error::{AnnotatorError, Result};
use crate::export_utils::{ensure_parent_dir, normalize_extension};
use crate::session::SessionSnapshot;
use crate::types::Detection;
use rayon::prelude::*;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const REPORT_HEADERS: [&str; 5] = [
    "Current Frame",
    "X Bound Left",
    "X Bound Right",
    "Y Bound Upper",
    "Y Bound Lower",
];

const SHEET_NAME: &str = "Detections";

/// Fixed document creation time so the same session always yields the
/// same workbook bytes (the zip container's own epoch)
const XLSX_CREATED: (u16, u8, u8) = (1980, 1, 1);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Current Frame")]
    pub current_frame: String,
    #[serde(rename = "X Bound Left")]
    pub x_left: f64,
    #[serde(rename = "X Bound Right")]
    pub x_right: f64,
    #[serde(rename = "Y Bound Upper")]
    pub y_upper: f64,
    #[serde(rename = "Y Bound Lower")]
    pub y_lower: f64,
}

impl ReportRow {
    /// Detector corners map straight onto the bound columns, no reordering
    pub fn from_detection(detection: &Detection, frame_rate: f64) -> Self {
        Self {
            current_frame: frame_label(detection.frame_index, frame_rate),
            x_left: report_value(detection.x1),
            x_right: report_value(detection.x2),
            y_upper: report_value(detection.y1),
            y_lower: report_value(detection.y2),
        }
    }
}

/// Widen through the shortest decimal form, so `0.1f32` is written as `0.1`
/// rather than `0.10000000149011612` in every format
fn report_value(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

/// `mm:ss.mmm` for the frame at `frame_index`.
///
/// Rounds to whole milliseconds before splitting so seconds never render
/// as `60.000`.
pub fn format_timestamp(frame_index: usize, frame_rate: f64) -> String {
    let total_ms = (frame_index as f64 / frame_rate * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let seconds = (total_ms % 60_000) as f64 / 1000.0;
    format!("{:02}:{:06.3}", minutes, seconds)
}

pub fn frame_label(frame_index: usize, frame_rate: f64) -> String {
    format!(
        "Frame: {}, Timestamp: {}",
        frame_index,
        format_timestamp(frame_index, frame_rate)
    )
}

/// Build the report rows for a finished session
pub fn build_report(snapshot: &SessionSnapshot) -> Result<Vec<ReportRow>> {
    if snapshot.detections.is_empty() {
        return Err(AnnotatorError::NoDetections);
    }
    let frame_rate = snapshot.frame_rate;
    if frame_rate <= 0.0 || !frame_rate.is_finite() {
        return Err(AnnotatorError::InvalidFrameRate(frame_rate));
    }

    Ok(snapshot
        .detections
        .par_iter()
        .map(|det| ReportRow::from_detection(det, frame_rate))
        .collect())
}

pub fn write_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AnnotatorError::write(format!("Failed to create {}: {}", path.display(), e)))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AnnotatorError::write(format!("Failed to write row: {}", e)))?;
    }
    writer
        .flush()
        .map_err(|e| AnnotatorError::write(format!("Failed to flush {}: {}", path.display(), e)))
}

pub fn write_xlsx(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| AnnotatorError::write(e.to_string());

    let (year, month, day) = XLSX_CREATED;
    let created = ExcelDateTime::from_ymd(year, month, day).map_err(xlsx_err)?;
    let mut workbook = Workbook::new();
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(xlsx_err)?;

    for (col, header) in REPORT_HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *header, &bold)
            .map_err(xlsx_err)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet
            .write_string(r, 0, &row.current_frame)
            .map_err(xlsx_err)?;
        let bounds = [row.x_left, row.x_right, row.y_upper, row.y_lower];
        for (col, value) in bounds.iter().enumerate() {
            worksheet
                .write_number(r, (col + 1) as u16, *value)
                .map_err(xlsx_err)?;
        }
    }
    worksheet.set_column_width(0, 36).map_err(xlsx_err)?;

    workbook.save(path).map_err(xlsx_err)
}

/// Write the report for `snapshot` and return the written path.
///
/// Nothing is written when the session has no detections.
pub fn export_report(path: &Path, snapshot: &SessionSnapshot, format: ReportFormat) -> Result<PathBuf> {
    let rows = build_report(snapshot)?;
    let path = normalize_extension(path, format.extension());
    ensure_parent_dir(&path)?;

    match format {
        ReportFormat::Xlsx => write_xlsx(&path, &rows)?,
        ReportFormat::Csv => write_csv(&path, &rows)?,
    }

    log::info!("Wrote {} report rows to {}", rows.len(), path.display());
    Ok(path)
}
