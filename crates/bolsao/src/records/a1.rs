//! A1 notation helpers.

use std::fmt;

/// Column letters for a 1-based column index: 1 → `A`, 27 → `AA`.
pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// `C5` style reference for a 1-based row and column.
pub fn cell(row: u32, column: u32) -> String {
    format!("{}{}", column_letters(column), row)
}

/// Quotes a sheet title for use in a range, doubling embedded apostrophes.
pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Prefixes `range` with the sheet title unless it already names a sheet.
/// An unqualified range would otherwise land on the spreadsheet's first tab.
pub fn qualify_range(sheet_title: &str, range: &str) -> String {
    if range.contains('!') {
        range.to_string()
    } else {
        format!("{}!{}", quote_sheet_title(sheet_title), range)
    }
}

/// Whole-column range starting at `from_row`, e.g. `'Sheet'!C2:C`.
pub fn column_range(sheet_title: &str, column: u32, from_row: u32) -> String {
    let letters = column_letters(column);
    qualify_range(sheet_title, &format!("{letters}{from_row}:{letters}"))
}

/// Whole-row range, e.g. `'Sheet'!1:1`.
pub fn row_range(sheet_title: &str, row: u32) -> String {
    qualify_range(sheet_title, &format!("{row}:{row}"))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid A1 range '{0}'")]
pub struct RangeParseError(pub String);

/// A parsed A1 range. Missing bounds are open-ended, as in `A2:A` or `1:1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRange {
    pub sheet: Option<String>,
    pub start_row: Option<u32>,
    pub start_column: Option<u32>,
    pub end_row: Option<u32>,
    pub end_column: Option<u32>,
}

impl GridRange {
    pub fn parse(raw: &str) -> Result<Self, RangeParseError> {
        let invalid = || RangeParseError(raw.to_string());
        let (sheet, cells) = split_sheet(raw).ok_or_else(invalid)?;

        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };
        let (start_column, start_row) = parse_endpoint(start).ok_or_else(invalid)?;
        let (end_column, end_row) = match end {
            Some(end) => parse_endpoint(end).ok_or_else(invalid)?,
            None => (start_column, start_row),
        };

        Ok(Self {
            sheet,
            start_row,
            start_column,
            end_row,
            end_column,
        })
    }

    pub fn contains_row(&self, row: u32) -> bool {
        self.start_row.map_or(true, |start| row >= start)
            && self.end_row.map_or(true, |end| row <= end)
    }

    pub fn contains_column(&self, column: u32) -> bool {
        self.start_column.map_or(true, |start| column >= start)
            && self.end_column.map_or(true, |end| column <= end)
    }
}

impl fmt::Display for GridRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", quote_sheet_title(sheet))?;
        }
        let endpoint = |column: Option<u32>, row: Option<u32>| {
            format!(
                "{}{}",
                column.map(column_letters).unwrap_or_default(),
                row.map(|row| row.to_string()).unwrap_or_default()
            )
        };
        write!(
            f,
            "{}:{}",
            endpoint(self.start_column, self.start_row),
            endpoint(self.end_column, self.end_row)
        )
    }
}

fn split_sheet(raw: &str) -> Option<(Option<String>, &str)> {
    if let Some(quoted) = raw.strip_prefix('\'') {
        let mut title = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c != '\'' {
                title.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                title.push('\'');
                continue;
            }
            let rest = &quoted[idx + 1..];
            return rest.strip_prefix('!').map(|cells| (Some(title), cells));
        }
        return None;
    }

    match raw.rsplit_once('!') {
        Some((title, cells)) => Some((Some(title.to_string()), cells)),
        None => Some((None, raw)),
    }
}

fn parse_endpoint(raw: &str) -> Option<(Option<u32>, Option<u32>)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let split = raw
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (letters, digits) = raw.split_at(split);

    if !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let column = if letters.is_empty() {
        None
    } else {
        Some(
            letters
                .to_ascii_uppercase()
                .bytes()
                .try_fold(0u32, |acc, b| {
                    acc.checked_mul(26)?.checked_add(u32::from(b - b'A' + 1))
                })?,
        )
    };
    let row = if digits.is_empty() {
        None
    } else {
        Some(digits.parse::<u32>().ok()?)
    };
    Some((column, row))
}
