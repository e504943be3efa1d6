//! Transfer document numbers: `PV-<year>-<sequence>`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DOCUMENT_PREFIX: &str = "PV";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberingError {
    #[error("malformed document number: {0}")]
    Malformed(String),
}

/// A parsed document number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub year: i32,
    pub sequence: u32,
}

impl DocumentNumber {
    pub fn new(year: i32, sequence: u32) -> Self {
        Self { year, sequence }
    }

    /// `PV-2026-`, for `LIKE` lookups of one year's numbers
    pub fn year_prefix(year: i32) -> String {
        format!("{}-{}-", DOCUMENT_PREFIX, year)
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:03}", DOCUMENT_PREFIX, self.year, self.sequence)
    }
}

impl FromStr for DocumentNumber {
    type Err = NumberingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || NumberingError::Malformed(s.to_string());

        let mut parts = s.trim().splitn(3, '-');
        let (Some(prefix), Some(year), Some(sequence)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if prefix != DOCUMENT_PREFIX || year.len() != 4 {
            return Err(malformed());
        }
        if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }

        Ok(Self {
            year: year.parse().map_err(|_| malformed())?,
            sequence: sequence.parse().map_err(|_| malformed())?,
        })
    }
}

/// In-memory counter for one allocation run.
///
/// The base is read once from storage; every store's document then takes
/// the next value without re-querying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberSequence {
    year: i32,
    next: u32,
}

impl NumberSequence {
    /// Start after the highest existing number of `year`. Numbers of other
    /// years and malformed numbers are ignored.
    pub fn continue_from<'a, I>(year: i32, existing: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let highest = existing
            .into_iter()
            .filter_map(|number| number.parse::<DocumentNumber>().ok())
            .filter(|number| number.year == year)
            .map(|number| number.sequence)
            .max()
            .unwrap_or(0);

        Self {
            year,
            next: highest + 1,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// The number the next call to [`issue`](Self::issue) returns
    pub fn peek(&self) -> DocumentNumber {
        DocumentNumber::new(self.year, self.next)
    }

    pub fn issue(&mut self) -> DocumentNumber {
        let number = self.peek();
        self.next += 1;
        number
    }
}
