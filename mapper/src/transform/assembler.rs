//! Staging record assembly.
//!
//! Order of application:
//!
//! 1. static fields (literals and resolved `ext:` texts)
//! 2. field mappings against each joined related record, in join rule order
//! 3. field mappings against the source record
//!
//! Later steps overwrite earlier ones, so source data wins over joined data
//! for the same destination column. Every written value passes through the
//! destination column's lookup table and, for the image column, gets the
//! image base path prepended.

use crate::config::{FieldMapping, MappingConfiguration};
use crate::models::{SourceRecord, StagingRecord};

/// Where a mapping read its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    Related,
    Source,
}

/// Result of applying one field mapping to one input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingOutcome {
    Applied,
    /// The input record has no such column; nothing was written.
    SkippedMissingKey { source: String, origin: RecordOrigin },
}

/// Mapping outcomes collected while assembling one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub applied: usize,
    pub skipped: Vec<MappingOutcome>,
}

impl AssemblyReport {
    fn record(&mut self, outcome: MappingOutcome) {
        match outcome {
            MappingOutcome::Applied => self.applied += 1,
            skipped => self.skipped.push(skipped),
        }
    }
}

/// Builds staging records from source records.
#[derive(Debug, Clone, Copy)]
pub struct RecordAssembler<'c> {
    config: &'c MappingConfiguration,
}

impl<'c> RecordAssembler<'c> {
    pub fn new(config: &'c MappingConfiguration) -> Self {
        Self { config }
    }

    /// Assemble one record. `related` holds the joined records, in rule order.
    pub fn assemble(&self, source: &SourceRecord, related: &[&SourceRecord]) -> (StagingRecord<'c>, AssemblyReport) {
        let mut record = self.seed();
        let mut report = AssemblyReport::default();

        for joined in related {
            for mapping in self.config.field_mappings.iter() {
                report.record(self.apply_mapping(&mut record, mapping, joined, RecordOrigin::Related));
            }
        }
        for mapping in self.config.field_mappings.iter() {
            report.record(self.apply_mapping(&mut record, mapping, source, RecordOrigin::Source));
        }

        (record, report)
    }

    /// Empty staging record with the static fields applied.
    pub fn seed(&self) -> StagingRecord<'c> {
        let mut record = StagingRecord::new(&self.config.schema);
        for (column, value) in &self.config.static_fields {
            record.set(column, value.as_str());
        }
        record
    }

    /// Copy one mapped source value into each of its destination columns.
    pub fn apply_mapping(
        &self,
        record: &mut StagingRecord<'c>,
        mapping: &FieldMapping,
        input: &SourceRecord,
        origin: RecordOrigin,
    ) -> MappingOutcome {
        let Some(value) = input.get(&mapping.source) else {
            tracing::warn!(
                source = %mapping.source,
                ?origin,
                "mapped column does not exist in record, mapping skipped"
            );
            return MappingOutcome::SkippedMissingKey {
                source: mapping.source.clone(),
                origin,
            };
        };

        for column in mapping.target.destinations() {
            let mapped = self.config.lookups.lookup(column, value).to_string();
            record.set(column, self.config.image.apply(column, mapped));
        }
        MappingOutcome::Applied
    }
}
