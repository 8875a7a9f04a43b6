//! Spreadsheet export: the full record set rendered as a styled XLSX
//! workbook with one embedded thumbnail per image-bearing cell.
//!
//! Layout mirrors the QA team's canvas sheet: 18 fixed columns, role-colored
//! header fills, fixed row heights sized for image thumbnails.

use chrono::{DateTime, Local};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, Image, ObjectMovement, Workbook, XlsxError,
};
use thiserror::Error;
use tracing::warn;

use crate::models::{ImagePayload, ImageSlot, RmaRecord};

/// Errors from workbook serialization. Per-image embedding failures are not
/// errors; they are logged and the cell is left blank.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write workbook: {0}")]
    Workbook(#[from] XlsxError),
}

const AMBER: u32 = 0xFFC000;
const BLUE: u32 = 0x0070C0;
const YELLOW: u32 = 0xFFFF00;
const WHITE: u32 = 0xFFFFFF;

/// Column order is significant: it matches the canvas sheet exactly.
const HEADERS: [(&str, u32); 18] = [
    ("NO", AMBER),
    ("Customer Country", AMBER),
    ("Customer", AMBER),
    ("From Market or Factory", BLUE),
    ("Size", AMBER),
    ("ODF", AMBER),
    ("EXPRESSLUCK BOM", AMBER),
    ("Brand", AMBER),
    ("Model P/N(Panel Part No)", AMBER),
    ("Defect description", BLUE),
    ("Ver.", AMBER),
    ("W/C", AMBER),
    ("OC Serial Number", BLUE),
    ("Picture Of Defective Symptom", BLUE),
    ("Factory batch No. picture (ODF No. )", BLUE),
    ("Picture Of O/C Serial Number", BLUE),
    ("Remark", YELLOW),
    ("date", WHITE),
];

const COLUMN_WIDTH: f64 = 25.0;
const HEADER_ROW_HEIGHT: f64 = 35.0;
/// Data rows are tall enough to hold an embedded thumbnail.
const DATA_ROW_HEIGHT: f64 = 70.0;

/// (column, slot) pairs for the three image-bearing columns.
const IMAGE_COLUMNS: [(u16, ImageSlot); 3] = [
    (13, ImageSlot::DefectSymptom),
    (14, ImageSlot::FactoryBatch),
    (15, ImageSlot::OcSerial),
];

fn base_format() -> Format {
    Format::new()
        .set_font_name("Courier New")
        .set_font_size(9)
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
}

/// Serialize the record collection into XLSX bytes.
///
/// Records render in input order; zero records yield a header-only workbook.
pub fn encode(records: &[RmaRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("RMA Records")?;

    worksheet.set_row_height(0, HEADER_ROW_HEIGHT)?;
    for (col, (title, fill)) in HEADERS.iter().enumerate() {
        let format = base_format().set_bold().set_background_color(Color::RGB(*fill));
        let col = col as u16;
        worksheet.set_column_width(col, COLUMN_WIDTH)?;
        worksheet.write_string_with_format(0, col, *title, &format)?;
    }

    let data_format = base_format();
    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as u32;
        worksheet.set_row_height(row, DATA_ROW_HEIGHT)?;

        let cells: [&str; 18] = [
            &record.id,
            &record.customer_country,
            &record.customer,
            &record.source,
            &record.size,
            &record.odf,
            &record.bom,
            &record.brand,
            &record.model_pn,
            &record.defect_description,
            &record.ver,
            &record.wc,
            &record.oc_serial_number,
            "", // image column placeholders
            "",
            "",
            &record.remark,
            &record.date,
        ];
        for (col, value) in cells.iter().enumerate() {
            worksheet.write_string_with_format(row, col as u16, *value, &data_format)?;
        }

        for (col, slot) in IMAGE_COLUMNS {
            if let Some(payload) = record.images.get(slot) {
                if let Err(reason) = embed_image(worksheet, row, col, payload) {
                    warn!(
                        "Skipping image embed for record {} slot {}: {}",
                        record.id,
                        slot.as_str(),
                        reason
                    );
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Embed one payload anchored to its data cell.
///
/// Any failure (bad MIME, undecodable base64, unreadable raster) is reported
/// back as a reason string for logging; it never aborts the export.
fn embed_image(
    worksheet: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    col: u16,
    payload: &ImagePayload,
) -> Result<(), String> {
    if !payload.mime_type.starts_with("image/") {
        return Err(format!("unsupported MIME type {}", payload.mime_type));
    }

    let bytes = payload
        .decoded_bytes()
        .map_err(|e| format!("base64 decode failed: {}", e))?;

    let image = Image::new_from_buffer(&bytes)
        .map_err(|e| format!("unreadable image data: {}", e))?
        // "oneCell" semantics: anchored to the cell, not resized with it.
        .set_object_movement(ObjectMovement::MoveButDontSizeWithCells);

    worksheet
        .insert_image_fit_to_cell(row, col, &image, true)
        .map_err(|e| format!("insert failed: {}", e))?;
    Ok(())
}

/// Human-readable export filename for the given moment.
pub fn export_filename(now: DateTime<Local>) -> String {
    format!("RMA_Export_{}.xlsx", now.format("%Y-%m-%d"))
}
