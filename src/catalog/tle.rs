use std::fmt;

use serde::Serialize;

use super::error::CatalogError;

/// A two-line element set, optionally with the name line that usually
/// precedes it. See <https://en.wikipedia.org/wiki/Two-line_element_set>.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tle {
    pub name: String,
    pub line1: String,
    pub line2: String,
    pub norad_id: u64,
}

impl Tle {
    /// Checks the line layout and extracts the NORAD catalog number.
    ///
    /// Only the framing is validated here; orbital elements are parsed when a
    /// predictor is built from the TLE.
    pub fn new(line1: &str, line2: &str, name: &str) -> Result<Self, CatalogError> {
        let line1 = line1.trim();
        let line2 = line2.trim();

        let fields: Vec<&str> = line1.split_whitespace().collect();
        if fields.len() != 9 {
            return Err(CatalogError::InvalidTle(format!(
                "first line ({line1}) has {} values, expected 9",
                fields.len()
            )));
        }
        if fields[0] != "1" {
            return Err(CatalogError::InvalidTle(format!(
                "first line ({line1}) does not start with '1'"
            )));
        }
        if line2.split_whitespace().next() != Some("2") {
            return Err(CatalogError::InvalidTle(format!(
                "second line ({line2}) does not start with '2'"
            )));
        }

        let digits: String = fields[1].chars().filter(char::is_ascii_digit).collect();
        let norad_id = digits.parse().map_err(|_| {
            CatalogError::InvalidTle(format!("no catalog number in first line ({line1})"))
        })?;

        Ok(Self {
            name: name.trim().to_string(),
            line1: line1.to_string(),
            line2: line2.to_string(),
            norad_id,
        })
    }
}

impl fmt::Display for Tle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            writeln!(f, "{}", self.name)?;
        }
        write!(f, "{}\n{}", self.line1, self.line2)
    }
}

/// Splits concatenated TLE data into `(name, line1, line2)` groups.
///
/// Both 3-line (named) and bare 2-line groups are accepted; lines that fit
/// neither shape are skipped.
pub fn parse_tle_bulk(content: &str) -> Vec<(String, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut groups = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if lines[i].starts_with("1 ") && lines.get(i + 1).is_some_and(|l| l.starts_with("2 ")) {
            groups.push((String::new(), lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if lines.get(i + 1).is_some_and(|l| l.starts_with("1 "))
            && lines.get(i + 2).is_some_and(|l| l.starts_with("2 "))
        {
            groups.push((
                lines[i].to_string(),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            log::debug!("Skipping unexpected TLE line: {}", lines[i]);
            i += 1;
        }
    }
    groups
}
