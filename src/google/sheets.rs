//! Google Sheets operations and grid helpers.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::GoogleClient;
use crate::error::{ExtkitError, Result};

const ALPHABET_SIZE: usize = 26;

/// Spreadsheet metadata returned by `spreadsheets.get`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub properties: SpreadsheetProperties,
    #[serde(default)]
    pub sheets: Vec<Sheet>,
    #[serde(default)]
    pub spreadsheet_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetProperties {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub index: i64,
}

/// A block of cell values, as returned by `spreadsheets.values.get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// Zero-based, end-exclusive cell rectangle on one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    pub start_row_index: u32,
    pub end_row_index: u32,
    pub start_column_index: u32,
    pub end_column_index: u32,
}

impl GridRange {
    /// The single cell at (`row`, `column`).
    pub fn cell(sheet_id: i64, row: u32, column: u32) -> Self {
        Self {
            sheet_id,
            start_row_index: row,
            end_row_index: row.saturating_add(1),
            start_column_index: column,
            end_column_index: column.saturating_add(1),
        }
    }
}

/// RGB color with components in `[0, 1]`, the form the Sheets API expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Color {
    pub const fn rgb(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Parse `#RRGGBB` or a named color (`red`, `grey`, `orange`, ...).
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(hex) = input.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| {
                ExtkitError::InvalidArgument(format!("invalid hex color: {input}"))
            });
        }
        named_color(&input.to_ascii_lowercase()).ok_or_else(|| {
            ExtkitError::InvalidArgument(format!(
                "Unknown color name: {input}. Use a hex code or an RGB value instead."
            ))
        })
    }
}

impl FromStr for Color {
    type Err = ExtkitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|v| f32::from(v) / 255.0)
    };
    Some(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name {
        "red" => Color::rgb(1.0, 0.0, 0.0),
        "green" => Color::rgb(0.0, 1.0, 0.0),
        "blue" => Color::rgb(0.0, 0.0, 1.0),
        "yellow" => Color::rgb(1.0, 1.0, 0.0),
        "cyan" => Color::rgb(0.0, 1.0, 1.0),
        "magenta" => Color::rgb(1.0, 0.0, 1.0),
        "black" => Color::rgb(0.0, 0.0, 0.0),
        "white" => Color::rgb(1.0, 1.0, 1.0),
        "gray" | "grey" => Color::rgb(0.5, 0.5, 0.5),
        "orange" => Color::rgb(1.0, 0.5, 0.0),
        "purple" => Color::rgb(0.5, 0.0, 0.5),
        "pink" => Color::rgb(1.0, 0.75, 0.8),
        "brown" => Color::rgb(0.6, 0.4, 0.2),
        _ => return None,
    };
    Some(color)
}

/// Spreadsheet-style letter (`A`, `B`, ..., `Z`, `AA`, ...) of the column
/// whose header equals `key`.
pub fn column_letter<S: AsRef<str>>(headers: &[S], key: &str) -> Result<String> {
    let index = headers
        .iter()
        .position(|header| header.as_ref() == key)
        .ok_or_else(|| ExtkitError::InvalidArgument(format!("Column \"{key}\" not found in header")))?;
    Ok(column_letter_at(index))
}

/// Letter for a zero-based column index.
pub fn column_letter_at(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        let offset = (remaining - 1) % ALPHABET_SIZE;
        letters.push(b'A' + offset as u8);
        remaining = (remaining - 1) / ALPHABET_SIZE;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Spreadsheet id from a `https://docs.google.com/spreadsheets/d/<id>/...` URL.
pub fn extract_sheet_id(url: &str) -> Option<String> {
    static SHEET_ID: OnceLock<Option<Regex>> = OnceLock::new();
    SHEET_ID
        .get_or_init(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").ok())
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Find the first data row whose `column` cell equals `needle`.
///
/// `values` is a header-first grid as returned by [`GoogleClient::get_values`]
/// for a range starting at row 1. The result is the 1-based sheet row number.
pub fn find_row_index(values: &[Vec<Value>], column: &str, needle: &str) -> Result<Option<usize>> {
    let header = values
        .first()
        .ok_or_else(|| ExtkitError::InvalidArgument("sheet has no header row".to_string()))?;
    let column_index = header
        .iter()
        .position(|cell| cell_text(cell) == column)
        .ok_or_else(|| {
            ExtkitError::InvalidArgument(format!("Column \"{column}\" not found in the sheet headers"))
        })?;

    Ok(values
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| row.get(column_index).map(cell_text).as_deref() == Some(needle))
        .map(|(offset, _)| offset + 1))
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl GoogleClient {
    /// Spreadsheet metadata including its sheets.
    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet> {
        let url = self.sheets_url(&["v4", "spreadsheets", spreadsheet_id])?;
        let value = self.request_json(Method::GET, url, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Cell values for an A1 range, e.g. `Sheet1!A1:D20`.
    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange> {
        let url = self.sheets_url(&["v4", "spreadsheets", spreadsheet_id, "values", range])?;
        let value = self.request_json(Method::GET, url, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Append rows after the table found in `range`. Values are parsed as if
    /// typed by a user, so formulas such as `=SUM(A2:A9)` are evaluated.
    ///
    /// An empty `rows` slice sends nothing and returns `None`.
    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<Value>],
    ) -> Result<Option<Value>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let mut url = self.sheets_url(&[
            "v4",
            "spreadsheets",
            spreadsheet_id,
            "values",
            &format!("{range}:append"),
        ])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({ "values": rows });
        self.request_json(Method::POST, url, Some(&body))
            .await
            .map(Some)
    }

    /// Apply raw `spreadsheets.batchUpdate` requests.
    pub async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<Value> {
        let url = self.sheets_url(&[
            "v4",
            "spreadsheets",
            &format!("{spreadsheet_id}:batchUpdate"),
        ])?;
        let body = json!({ "requests": requests });
        self.request_json(Method::POST, url, Some(&body)).await
    }

    pub async fn set_background_color(
        &self,
        spreadsheet_id: &str,
        range: GridRange,
        color: Color,
    ) -> Result<Value> {
        let request = json!({
            "repeatCell": {
                "range": range,
                "cell": {
                    "userEnteredFormat": { "backgroundColor": color }
                },
                "fields": "userEnteredFormat.backgroundColor",
            }
        });
        self.batch_update(spreadsheet_id, vec![request]).await
    }
}
