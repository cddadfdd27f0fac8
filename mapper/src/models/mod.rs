//! Domain models for the mapping pipeline.
//!
//! # Record lifecycle
//!
//! ```text
//! SourceRecord ──▶ StagingRecord ──▶ OutputRow, OutputRow, ...
//! (source header)  (destination      (one value per destination
//!                   schema, scalar    column, always scalar)
//!                   or sequence)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// Destination Schema
// =============================================================================

/// Built-in storefront product import header.
pub const STOREFRONT_COLUMNS: &[&str] = &[
    "Handle",
    "Title",
    "Body (HTML)",
    "Vendor",
    "Product Category",
    "Type",
    "Tags",
    "Published",
    "Option1 Name",
    "Option1 Value",
    "Option2 Name",
    "Option2 Value",
    "Option3 Name",
    "Option3 Value",
    "Variant SKU",
    "Variant Grams",
    "Variant Inventory Tracker",
    "Variant Inventory Qty",
    "Variant Inventory Policy",
    "Variant Fulfillment Service",
    "Variant Price",
    "Variant Compare At Price",
    "Variant Requires Shipping",
    "Variant Taxable",
    "Variant Barcode",
    "Image Src",
    "Image Position",
    "Image Alt Text",
    "Gift Card",
    "SEO Title",
    "SEO Description",
    "Google Shopping / Google Product Category",
    "Google Shopping / Gender",
    "Google Shopping / Age Group",
    "Google Shopping / MPN",
    "Google Shopping / Condition",
    "Google Shopping / Custom Product",
    "Google Shopping / Custom Label 0",
    "Google Shopping / Custom Label 1",
    "Google Shopping / Custom Label 2",
    "Google Shopping / Custom Label 3",
    "Google Shopping / Custom Label 4",
    "Variant Image",
    "Variant Weight Unit",
    "Variant Tax Code",
    "Cost per item",
    "Included / Deutschland",
    "Price / Deutschland",
    "Compare At Price / Deutschland",
    "Included / International",
    "Price / International",
    "Compare At Price / International",
    "Status",
];

/// Fixed, ordered set of output columns for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl DestinationSchema {
    /// Build a schema from column names. Duplicate names keep their first position.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut index = HashMap::new();
        for column in columns {
            let column = column.into();
            if index.contains_key(&column) {
                continue;
            }
            index.insert(column.clone(), ordered.len());
            ordered.push(column);
        }
        Self {
            columns: ordered,
            index,
        }
    }

    /// The storefront product import header.
    pub fn storefront() -> Self {
        Self::new(STOREFRONT_COLUMNS.iter().copied())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }
}

impl Default for DestinationSchema {
    fn default() -> Self {
        Self::storefront()
    }
}

// =============================================================================
// Source Record
// =============================================================================

/// One input row keyed by its dataset's header.
///
/// The header is shared between all records of the same dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl SourceRecord {
    /// Values beyond the header are dropped; missing values become empty strings.
    pub fn new(headers: Arc<[String]>, mut values: Vec<String>) -> Self {
        values.resize(headers.len(), String::new());
        Self { headers, values }
    }

    /// Convenience constructor from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (headers, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(headers.into(), values)
    }

    /// Value of `column`, or `None` when the dataset has no such column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|i| self.values[i].as_str())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

// =============================================================================
// Staging Record
// =============================================================================

/// A staging value: one string, or an ordered list of strings for
/// multi-valued columns such as image lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingValue {
    Scalar(String),
    Sequence(Vec<String>),
}

impl StagingValue {
    /// Scalar text of the value. Sequences render their first element.
    pub fn as_scalar(&self) -> &str {
        match self {
            StagingValue::Scalar(s) => s,
            StagingValue::Sequence(items) => items.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StagingValue::Scalar(s) => s.is_empty(),
            StagingValue::Sequence(items) => items.iter().all(String::is_empty),
        }
    }
}

impl Default for StagingValue {
    fn default() -> Self {
        StagingValue::Scalar(String::new())
    }
}

impl From<&str> for StagingValue {
    fn from(value: &str) -> Self {
        StagingValue::Scalar(value.to_string())
    }
}

impl From<String> for StagingValue {
    fn from(value: String) -> Self {
        StagingValue::Scalar(value)
    }
}

impl From<Vec<String>> for StagingValue {
    fn from(value: Vec<String>) -> Self {
        StagingValue::Sequence(value)
    }
}

/// Schema-shaped record under construction. Every destination column is
/// present from creation, initialised to an empty scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingRecord<'s> {
    schema: &'s DestinationSchema,
    values: Vec<StagingValue>,
}

impl<'s> StagingRecord<'s> {
    pub fn new(schema: &'s DestinationSchema) -> Self {
        Self {
            schema,
            values: vec![StagingValue::default(); schema.len()],
        }
    }

    pub fn schema(&self) -> &'s DestinationSchema {
        self.schema
    }

    /// Set `column`. Returns `false` if the column is not in the schema.
    pub fn set(&mut self, column: &str, value: impl Into<StagingValue>) -> bool {
        match self.schema.position(column) {
            Some(i) => {
                self.values[i] = value.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, column: &str) -> Option<&StagingValue> {
        self.schema.position(column).map(|i| &self.values[i])
    }

    /// Scalar text of `column`, empty when unknown.
    pub fn scalar(&self, column: &str) -> &str {
        self.get(column).map(StagingValue::as_scalar).unwrap_or("")
    }

    pub fn values(&self) -> &[StagingValue] {
        &self.values
    }

    /// Iterate `(column, value)` in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StagingValue)> {
        self.schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

// =============================================================================
// Output Row
// =============================================================================

/// Fully scalar row, one value per destination column in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    values: Vec<String>,
}

impl OutputRow {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, schema: &DestinationSchema, column: &str) -> Option<&str> {
        schema
            .position(column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// True if every value is empty.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(String::is_empty)
    }
}
