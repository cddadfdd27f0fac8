//! Expansion of one staging record into output rows.
//!
//! With `L` the length of the longest sequence column, rows are built for
//! index `L` down to `0`:
//!
//! ```text
//! index   Handle        Title   Image Src
//!   2     ""            ""      ""            <- beyond every list
//!   1     nordic-parka  ""      b.jpg         <- continuation row
//!   0     nordic-parka  Parka   a.jpg         <- primary row, emitted last
//! ```
//!
//! Scalars appear only on the primary row. Sequences of different lengths
//! are not aligned; an index past a shorter list yields an empty value.

use crate::models::{OutputRow, StagingRecord, StagingValue};

/// Length of the longest sequence column, 0 if all columns are scalar.
pub fn max_sequence_len(record: &StagingRecord<'_>) -> usize {
    record
        .values()
        .iter()
        .filter_map(|value| match value {
            StagingValue::Sequence(items) => Some(items.len()),
            StagingValue::Scalar(_) => None,
        })
        .max()
        .unwrap_or(0)
}

/// Value of one column on the row built for `index`.
fn value_at(value: &StagingValue, index: usize) -> String {
    match (value, index) {
        (StagingValue::Scalar(s), 0) => s.clone(),
        (StagingValue::Scalar(_), _) => String::new(),
        (StagingValue::Sequence(items), i) => items.get(i).cloned().unwrap_or_default(),
    }
}

/// Build the row for `index`.
pub fn row_at(record: &StagingRecord<'_>, index: usize) -> OutputRow {
    OutputRow::new(record.values().iter().map(|v| value_at(v, index)).collect())
}

/// Rows of one staging record, continuation rows first, primary row last.
#[derive(Debug)]
pub struct FanOut<'r, 's> {
    record: &'r StagingRecord<'s>,
    next: Option<usize>,
}

impl<'r, 's> FanOut<'r, 's> {
    pub fn new(record: &'r StagingRecord<'s>) -> Self {
        Self {
            record,
            next: Some(max_sequence_len(record)),
        }
    }
}

impl Iterator for FanOut<'_, '_> {
    type Item = OutputRow;

    fn next(&mut self) -> Option<OutputRow> {
        let index = self.next?;
        self.next = index.checked_sub(1);
        Some(row_at(self.record, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next.map_or(0, |i| i + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FanOut<'_, '_> {}

/// Expand `record` into its output rows.
pub fn fan_out<'r, 's>(record: &'r StagingRecord<'s>) -> FanOut<'r, 's> {
    FanOut::new(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DestinationSchema;
    use proptest::prelude::*;

    fn schema() -> DestinationSchema {
        DestinationSchema::new(["Handle", "Title", "Image Src"])
    }

    fn images(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("img{i}.jpg")).collect()
    }

    #[test]
    fn test_all_scalar_is_single_row() {
        let schema = schema();
        let mut record = StagingRecord::new(&schema);
        record.set("Handle", "parka");
        record.set("Title", "Parka");

        let rows: Vec<OutputRow> = fan_out(&record).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values(), &["parka", "Parka", ""]);
    }

    #[test]
    fn test_three_images_give_four_rows() {
        let schema = schema();
        let mut record = StagingRecord::new(&schema);
        record.set("Handle", "parka");
        record.set("Title", "Parka");
        record.set("Image Src", images(3));

        let rows: Vec<OutputRow> = fan_out(&record).collect();
        assert_eq!(rows.len(), 4);

        // index 3 is past the list
        assert!(rows[0].is_blank());
        assert_eq!(rows[1].values(), &["", "", "img3.jpg"]);
        assert_eq!(rows[2].values(), &["", "", "img2.jpg"]);
        assert_eq!(rows[3].values(), &["parka", "Parka", "img1.jpg"]);
    }

    #[test]
    fn test_repeated_key_on_continuation_rows() {
        let schema = schema();
        let mut record = StagingRecord::new(&schema);
        record.set("Handle", vec!["parka".to_string(); 3]);
        record.set("Title", "Parka");
        record.set("Image Src", images(2));

        let rows: Vec<OutputRow> = fan_out(&record).collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_blank());
        assert_eq!(rows[1].values(), &["parka", "", ""]);
        assert_eq!(rows[2].values(), &["parka", "", "img2.jpg"]);
        assert_eq!(rows[3].values(), &["parka", "Parka", "img1.jpg"]);
    }

    #[test]
    fn test_empty_sequence_on_primary_row() {
        let schema = schema();
        let mut record = StagingRecord::new(&schema);
        record.set("Title", "Parka");
        record.set("Image Src", Vec::<String>::new());

        let rows: Vec<OutputRow> = fan_out(&record).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values(), &["", "Parka", ""]);
    }

    #[test]
    fn test_size_hint_is_exact() {
        let schema = schema();
        let mut record = StagingRecord::new(&schema);
        record.set("Image Src", images(5));
        let rows = fan_out(&record);
        assert_eq!(rows.len(), 6);
    }

    proptest! {
        #[test]
        fn prop_row_count_and_primary_last(
            title in "[a-z]{1,8}",
            a in 0usize..6,
            b in 0usize..6,
        ) {
            let schema = DestinationSchema::new(["Title", "A", "B"]);
            let mut record = StagingRecord::new(&schema);
            record.set("Title", title.clone());
            record.set("A", images(a));
            record.set("B", images(b));

            let rows: Vec<OutputRow> = fan_out(&record).collect();
            prop_assert_eq!(rows.len(), a.max(b) + 1);
            for row in &rows {
                prop_assert_eq!(row.values().len(), 3);
            }
            let (primary, continuation) = rows.split_last().unwrap();
            prop_assert_eq!(&primary.values()[0], &title);
            for row in continuation {
                prop_assert_eq!(row.values()[0].as_str(), "");
            }
        }
    }
}
