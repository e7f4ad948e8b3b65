//! Excel workbooks: first-sheet reading for sources, single-sheet writing for
//! cleaned output.

use crate::domain::model::CleanRow;
use crate::utils::error::{EtlError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::io::Cursor;

/// Cells of the first worksheet as text, header row included.
pub fn read_first_sheet(data: Vec<u8>) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EtlError::ProcessingError {
            message: "workbook has no worksheets".to_string(),
        })??;

    tracing::debug!("Read worksheet with {} rows", range.height());
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

// 日期儲存格轉成 ISO 字串，交給 cleaner 依一般規則解析
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTimeIso(s) => s.split('T').next().unwrap_or(s).to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

pub fn write_clean_rows(header: &[&str], rows: &[CleanRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("birthdays")?;

    for (col, title) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, *title)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let r = index as u32 + 1;
        sheet.write_string(r, 0, &row.name)?;
        sheet.write_string(r, 1, &row.email)?;
        sheet.write_string(r, 2, &row.dob)?;
        sheet.write_number(r, 3, row.birth_year as f64)?;
        sheet.write_number(r, 4, row.birth_month as f64)?;
        sheet.write_number(r, 5, row.birth_day as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}
