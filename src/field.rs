//! Owned cell values so the pipeline core is not tied to the reader crate.

use calamine::Data;
use std::fmt;

/// One cell of a tabular source, reduced to what the roster pipeline cares about.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Text(String),
    Number(f64),
    /// A spreadsheet error marker such as `#ERROR!` or `#DIV/0!`.
    Error(String),
    Empty,
}

impl Field {
    /// True for missing cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Field::Empty => true,
            Field::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render for display and keying. Integral numbers come out as plain digit
    /// strings: phone numbers stored as floats must not grow a trailing `.0`
    /// or thousands separators.
    pub fn display_string(&self) -> String {
        match self {
            Field::Text(s) => s.clone(),
            Field::Number(n) => format_number(*n),
            Field::Error(e) => e.clone(),
            Field::Empty => String::new(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Field::Number(n) => Some(*n),
            _ => None,
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    // i64 covers every phone/id value we will ever see; anything outside stays float-formatted.
    if n.fract() == 0.0 && n.abs() < 9.2e18 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<&Data> for Field {
    fn from(d: &Data) -> Self {
        match d {
            Data::Empty => Field::Empty,
            Data::String(s) => Field::Text(s.clone()),
            Data::Int(i) => Field::Number(*i as f64),
            Data::Float(f) => Field::Number(*f),
            Data::Bool(b) => Field::Text(b.to_string()),
            Data::Error(e) => Field::Error(e.to_string()),
            Data::DateTime(dt) => Field::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Field::Text(s.clone()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}
