//! Derived age-group computation.
//!
//! The bucket is a function of the birth year and the calendar year at
//! load time, recomputed fresh on every load. Ages under 18 map to
//! `Unknown`, matching observed upstream behavior (clerical birth-year
//! errors are folded into the same bucket as missing data).

use crate::columns::{AGE_GROUP_COLUMN, BIRTH_YEAR_COLUMN};
use crate::reader::RowBatch;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGroup {
    Age18To25,
    Age26To35,
    Age36To50,
    Age51To65,
    Age65Plus,
    Unknown,
}

impl AgeGroup {
    /// Bucket a birth year against a reference calendar year.
    /// Only all-digit years are accepted; signed, non-numeric, or
    /// missing birth years are `Unknown`.
    pub fn from_birth_year(birth_year: Option<&str>, reference_year: i32) -> Self {
        let Some(raw) = birth_year else {
            return Self::Unknown;
        };
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Self::Unknown;
        }
        let Ok(year) = raw.parse::<i32>() else {
            return Self::Unknown;
        };

        let age = reference_year - year;
        match age {
            18..=25 => Self::Age18To25,
            26..=35 => Self::Age26To35,
            36..=50 => Self::Age36To50,
            51..=65 => Self::Age51To65,
            _ if age > 65 => Self::Age65Plus,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Age18To25 => "18-25",
            Self::Age26To35 => "26-35",
            Self::Age36To50 => "36-50",
            Self::Age51To65 => "51-65",
            Self::Age65Plus => "65+",
            Self::Unknown => "Unknown",
        }
    }
}

/// Append the derived `age_group` column to a batch. Stateless across
/// batches. A source file missing `birth_year` entirely (schema drift)
/// yields `Unknown` for every row.
pub fn apply_age_group(batch: &mut RowBatch, reference_year: i32) {
    let birth_year_idx = batch.column_index(BIRTH_YEAR_COLUMN);

    let mut columns = batch.columns.as_ref().clone();
    columns.push(AGE_GROUP_COLUMN.to_string());
    batch.columns = Arc::new(columns);

    for row in &mut batch.rows {
        let birth_year = birth_year_idx.and_then(|i| row[i].as_deref());
        let group = AgeGroup::from_birth_year(birth_year, reference_year);
        row.push(Some(group.as_str().to_string()));
    }
}
