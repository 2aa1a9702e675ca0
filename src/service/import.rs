//! Import of result sheets extracted as plain text.
//!
//! Each student sits on one line:
//!
//! ```text
//! 1277 SHIVENDRA PRATAP SINGH SHREE VINDHY KUMAR SINGH 4.89
//! ```
//!
//! A four-digit roll number, the student's name followed by the father's
//! name, then the marks (`A` for absent).

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{BulkCreateResponse, ResultInput, Subject};
use crate::error::Result;
use crate::service::results::ResultService;

/// Words that mark header, footer, and separator lines.
const HEADER_MARKERS: &[&str] = &[
    "Roll",
    "Number",
    "Full Name",
    "Father",
    "Marks",
    "--",
    "of",
    "TOP",
];

/// Import settings.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Prefix placed before every roll number.
    pub prefix: String,
    pub subject: Subject,
    pub exam_date: NaiveDate,
}

/// One student row read from a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// Four-digit roll number without prefix.
    pub roll_number: String,
    pub name: String,
    pub father_name: String,
    /// Marks as printed; negative values are kept here.
    pub marks: f64,
}

impl SheetRow {
    fn into_input(self, options: &ImportOptions, rank: usize) -> ResultInput {
        let failed = self.marks < 0.0;
        ResultInput {
            roll_number: Some(format!("{}{}", options.prefix, self.roll_number)),
            name: Some(self.name),
            father_name: Some(self.father_name),
            subject: Some(options.subject.to_string()),
            marks: Some(self.marks.max(0.0)),
            rank: Some(i64::try_from(rank).unwrap_or(i64::MAX)),
            exam_date: Some(options.exam_date.format("%Y-%m-%d").to_string()),
            status: Some(if failed { "Failed" } else { "Passed" }.to_string()),
            is_published: Some(false),
            ..Default::default()
        }
    }
}

/// Import outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// Rows read from the sheet.
    pub parsed: usize,
    pub upsert: BulkCreateResponse,
}

fn is_roll_token(token: &str) -> bool {
    token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a marks token: an optionally negative decimal, or `A` for absent.
fn parse_marks(token: &str) -> Option<f64> {
    if token == "A" {
        return Some(0.0);
    }
    let digits = token.strip_prefix('-').unwrap_or(token);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (digits, ""),
    };
    let well_formed = !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    if well_formed { token.parse().ok() } else { None }
}

/// Parse one line, or `None` if it holds no student.
#[must_use]
pub fn parse_line(line: &str) -> Option<SheetRow> {
    let line = line.trim();
    if line.is_empty() || HEADER_MARKERS.iter().any(|marker| line.contains(marker)) {
        return None;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 || !is_roll_token(parts[0]) {
        return None;
    }

    let (marks_index, marks) = parts
        .iter()
        .enumerate()
        .rev()
        .find_map(|(index, token)| parse_marks(token).map(|marks| (index, marks)))?;
    if marks_index == 0 {
        return None;
    }

    let words = &parts[1..marks_index];
    if words.len() < 2 {
        return None;
    }

    let split = if words.len() >= 4 {
        (words.len() / 2).min(3)
    } else {
        1
    };
    Some(SheetRow {
        roll_number: parts[0].to_string(),
        name: words[..split].join(" "),
        father_name: words[split..].join(" "),
        marks,
    })
}

/// Parse a sheet into result inputs, ranked by marks.
///
/// Repeated roll numbers keep their first occurrence. Ties keep sheet
/// order.
#[must_use]
pub fn parse_sheet(text: &str, options: &ImportOptions) -> Vec<ResultInput> {
    let mut seen = HashSet::new();
    let mut rows: Vec<SheetRow> = text
        .lines()
        .filter_map(parse_line)
        .filter(|row| {
            let fresh = seen.insert(row.roll_number.clone());
            if !fresh {
                debug!(roll_number = %row.roll_number, "Skipping repeated roll number");
            }
            fresh
        })
        .collect();

    rows.sort_by(|a, b| b.marks.max(0.0).total_cmp(&a.marks.max(0.0)));
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| row.into_input(options, index + 1))
        .collect()
}

/// Parse a sheet and upsert every row into the result store.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the sheet holds no student rows.
pub async fn import_sheet(
    results: &ResultService,
    text: &str,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let inputs = parse_sheet(text, options);
    let parsed = inputs.len();
    info!(parsed, prefix = %options.prefix, subject = %options.subject, "Parsed result sheet");

    let upsert = results.bulk_upsert(inputs).await?;
    Ok(ImportReport { parsed, upsert })
}
