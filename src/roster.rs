// Attendees and the CSV roster reader

use crate::error::AppError;
use std::path::Path;

/// Attendees printed on one sheet
pub const NAMES_PER_PAGE: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub first_name: String,
    pub last_name: String,
}

impl Attendee {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Attendee {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn display_name(&self) -> String {
        format_person_name(&self.first_name, &self.last_name)
    }
}

/// "LASTNAME Firstname"
pub fn format_person_name(first: &str, last: &str) -> String {
    let last_upper = last.trim().to_uppercase();
    let first_lower = first.trim().to_lowercase();

    let mut chars = first_lower.chars();
    let first_norm = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    format!("{} {}", last_upper, first_norm)
}

/// Consecutive groups of at most `per_page` attendees, in roster order.
pub fn split_into_pages(attendees: &[Attendee], per_page: usize) -> Vec<&[Attendee]> {
    attendees.chunks(per_page.max(1)).collect()
}

fn normalize_header(value: &str) -> String {
    value
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace([' ', '_'], "")
}

/// `;` when the first non-blank line has more semicolons than commas.
pub fn detect_delimiter(data: &str) -> u8 {
    data.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| {
            if line.matches(';').count() > line.matches(',').count() {
                b';'
            } else {
                b','
            }
        })
        .unwrap_or(b',')
}

pub fn parse_csv(data: &str) -> Result<Vec<Attendee>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(data))
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AppError::AttendeeError(format!("Invalid CSV: {}", e)))?;
        records.push(record);
    }
    let Some(header) = records.first() else {
        return Err(AppError::AttendeeError("csv has no rows".to_string()));
    };

    let mut first_idx = 0;
    let mut last_idx = 1;
    let mut header_detected = false;
    for (i, column) in header.iter().enumerate() {
        match normalize_header(column).as_str() {
            "firstname" => {
                first_idx = i;
                header_detected = true;
            }
            "lastname" => {
                last_idx = i;
                header_detected = true;
            }
            _ => {}
        }
    }
    let start_row = usize::from(header_detected);

    let attendees: Vec<Attendee> = records[start_row..]
        .iter()
        .filter_map(|row| {
            let first = row.get(first_idx)?.trim();
            let last = row.get(last_idx)?.trim();
            if first.is_empty() && last.is_empty() {
                return None;
            }
            Some(Attendee::new(first, last))
        })
        .collect();

    if attendees.is_empty() {
        return Err(AppError::AttendeeError("csv has no attendees".to_string()));
    }
    Ok(attendees)
}

pub fn load_csv(path: &Path) -> Result<Vec<Attendee>, AppError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| AppError::AttendeeError(format!("{}: {}", path.display(), e)))?;
    let attendees = parse_csv(&data)
        .map_err(|e| AppError::AttendeeError(format!("{}: {}", path.display(), e)))?;
    log::info!("Read {} attendees from {}", attendees.len(), path.display());
    Ok(attendees)
}
