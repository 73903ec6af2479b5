//! Acquisition periods

use greenstack_core::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const MONTHS: [(&str, &str); 12] = [
    ("january", "Jan"),
    ("february", "Feb"),
    ("march", "Mar"),
    ("april", "Apr"),
    ("may", "May"),
    ("june", "Jun"),
    ("july", "Jul"),
    ("august", "Aug"),
    ("september", "Sep"),
    ("october", "Oct"),
    ("november", "Nov"),
    ("december", "Dec"),
];

/// A named acquisition period.
///
/// `key` identifies the period (`"april"`); `label` is the suffix used in
/// band labels (`"Apr"` → `"NDVI-Apr"`). Calendar months also carry their
/// month number, which fixes their place in a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    key: String,
    label: String,
    #[serde(skip)]
    month: Option<u8>,
}

impl Period {
    /// A period with an arbitrary key and label
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            month: None,
        }
    }

    /// Calendar month from its full name, three-letter abbreviation or
    /// number (1-12), case-insensitive.
    pub fn month(name: &str) -> Result<Self> {
        let name = name.trim().to_ascii_lowercase();

        let index = match name.parse::<usize>() {
            Ok(n) if (1..=12).contains(&n) => Some(n - 1),
            Ok(_) => None,
            Err(_) => MONTHS
                .iter()
                .position(|(full, abbr)| name == *full || name == abbr.to_ascii_lowercase()),
        };

        let index = index.ok_or_else(|| Error::InvalidParameter {
            name: "period",
            value: name.clone(),
            reason: "expected a month name, abbreviation or number".into(),
        })?;
        let (key, label) = MONTHS[index];
        Ok(Self {
            month: Some(index as u8 + 1),
            ..Self::new(key, label)
        })
    }

    /// Month number 1-12, `None` for periods built with [`Period::new`]
    pub fn month_number(&self) -> Option<u8> {
        self.month
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Period::month(s)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
