//! Row acceptance rules for assembled staging records.
//!
//! # Predicate chain
//!
//! Evaluated in order, first failure decides:
//!
//! 1. `required` - the column must be non-empty
//! 2. `membership` - the column value must be one of the replacement values
//!    of a value lookup table (drops rows whose category could not be mapped)
//! 3. `numeric` - per-column constraints; `non_negative` clamps to zero,
//!    `non_zero` rejects
//!
//! Rejected rows are dropped without raising an error; callers count them.
//!
//! # Example
//!
//! ```json
//! {
//!   "required": "Title",
//!   "membership": { "column": "Product Category", "table": "Product Category" },
//!   "numeric": [
//!     { "column": "Variant Inventory Qty", "constraint": "non_negative" },
//!     { "column": "Variant Price", "constraint": "non_zero" }
//!   ]
//! }
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::config::ValueLookupTables;
use crate::models::{StagingRecord, StagingValue};

/// Column required by default (the product name is mapped there).
pub const DEFAULT_REQUIRED_COLUMN: &str = "Title";

/// Floor applied by `non_negative`.
const NUMERIC_FLOOR: &str = "0";

/// Row acceptance settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RowRules {
    /// Column that must be non-empty
    pub required: Option<String>,
    /// Column whose value must be known to a lookup table
    pub membership: Option<MembershipRule>,
    /// Numeric constraints
    pub numeric: Vec<NumericRule>,
}

impl Default for RowRules {
    fn default() -> Self {
        Self {
            required: Some(DEFAULT_REQUIRED_COLUMN.to_string()),
            membership: None,
            numeric: Vec::new(),
        }
    }
}

impl RowRules {
    /// Destination columns the rules read or write.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .map(String::as_str)
            .chain(self.membership.iter().map(|m| m.column.as_str()))
            .chain(self.numeric.iter().map(|n| n.column.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MembershipRule {
    pub column: String,
    /// Name of the value lookup table whose values are allowed
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NumericRule {
    pub column: String,
    pub constraint: NumericConstraint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericConstraint {
    /// Negative values are clamped to zero
    NonNegative,
    /// Zero rejects the row
    NonZero,
}

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("required column '{column}' is empty")]
    MissingRequired { column: String },

    #[error("value '{value}' of '{column}' is not a known lookup value")]
    UnknownValue { column: String, value: String },

    #[error("numeric column '{column}' is zero")]
    Zero { column: String },
}

/// Outcome of validating one staging record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Accepted; lists columns that were clamped
    Accepted { clamped: Vec<String> },
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// Applies [`RowRules`] to staging records.
#[derive(Debug, Clone, Copy)]
pub struct RowValidator<'c> {
    rules: &'c RowRules,
    lookups: &'c ValueLookupTables,
}

impl<'c> RowValidator<'c> {
    pub fn new(rules: &'c RowRules, lookups: &'c ValueLookupTables) -> Self {
        Self { rules, lookups }
    }

    /// Check `record`, clamping out-of-range numeric values in place.
    pub fn validate(&self, record: &mut StagingRecord<'_>) -> Verdict {
        if let Some(column) = &self.rules.required {
            if record.get(column).map_or(true, StagingValue::is_empty) {
                return Verdict::Rejected(Rejection::MissingRequired {
                    column: column.clone(),
                });
            }
        }

        if let Some(membership) = &self.rules.membership {
            let value = record.scalar(&membership.column);
            if !self.lookups.contains_value(&membership.table, value) {
                return Verdict::Rejected(Rejection::UnknownValue {
                    column: membership.column.clone(),
                    value: value.to_string(),
                });
            }
        }

        let mut clamped = Vec::new();
        for rule in &self.rules.numeric {
            let number = match record.get(&rule.column) {
                Some(StagingValue::Scalar(raw)) => parse_number(raw),
                _ => None,
            };
            let Some(number) = number else {
                continue;
            };
            match rule.constraint {
                NumericConstraint::NonNegative if number < 0.0 => {
                    record.set(&rule.column, NUMERIC_FLOOR);
                    clamped.push(rule.column.clone());
                }
                NumericConstraint::NonZero if number == 0.0 => {
                    return Verdict::Rejected(Rejection::Zero {
                        column: rule.column.clone(),
                    });
                }
                _ => {}
            }
        }

        Verdict::Accepted { clamped }
    }
}

/// Parse a decimal number, accepting a comma as decimal separator.
/// Empty and unparsable text yields `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}
