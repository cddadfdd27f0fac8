//! End-to-end mapping run.
//!
//! ```text
//! source CSV ──▶ join ──▶ assemble ──▶ derive ──▶ validate ──▶ fan-out ──▶ output units
//!                 ▲           ▲                                              (rotated)
//!          related CSVs   config dir
//! ```
//!
//! Configuration, related datasets and join resolvers are all set up before
//! the first source record is read, so configuration errors never leave a
//! partial output behind.
//!
//! # Example
//!
//! ```rust,ignore
//! use productmap::{run, RunOptions};
//!
//! let mut options = RunOptions::new("source/products.csv", "dist/products.csv");
//! options.image_path = Some("https://cdn.example/".into());
//! options.image_field = Some("Image Src".into());
//!
//! let summary = run(&options)?;
//! println!("{} rows in {} units", summary.rows_emitted, summary.units.len());
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::config::{ConfigPaths, ImageSettings, MappingConfiguration};
use crate::error::{ConfigError, ConfigResult, PipelineResult};
use crate::models::{SourceRecord, StagingRecord};
use crate::output::{OutputChunker, UnitNaming, DEFAULT_ROW_LIMIT};
use crate::parser::SourceReader;
use crate::transform::assembler::{AssemblyReport, RecordAssembler};
use crate::transform::derived::Deriver;
use crate::transform::fanout::fan_out;
use crate::transform::join::{JoinResolver, RelatedDatasets};
use crate::validation::{RowValidator, Verdict};

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: PathBuf,
    /// Unit names are derived from this path (`dist/p.csv` -> `dist/p_1.csv`)
    pub destination: PathBuf,
    /// Base path prepended to image values
    pub image_path: Option<String>,
    /// Destination column holding the image value
    pub image_field: Option<String>,
    pub config: ConfigPaths,
    /// Maximum data rows per output unit
    pub row_limit: usize,
    /// Source delimiter (auto-detect if not specified)
    pub delimiter: Option<char>,
}

impl RunOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            image_path: None,
            image_field: None,
            config: ConfigPaths::default(),
            row_limit: DEFAULT_ROW_LIMIT,
            delimiter: None,
        }
    }

    pub fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            base_path: self.image_path.clone(),
            column: self.image_field.clone(),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Source records read
    pub seen: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Output rows written, after fan-out
    pub rows_emitted: usize,
    /// Committed output units, in order
    pub units: Vec<PathBuf>,
    pub skipped_mappings: usize,
    pub join_hits: usize,
    pub join_misses: usize,
}

/// One source record after join, assembly, derivation and validation.
#[derive(Debug)]
pub struct MappedRecord<'c> {
    pub record: StagingRecord<'c>,
    pub verdict: Verdict,
    pub report: AssemblyReport,
    pub join_hits: usize,
    pub join_misses: usize,
}

/// Per-record processing with everything loaded once per run.
#[derive(Debug)]
pub struct MappingPipeline<'c> {
    resolvers: Vec<JoinResolver<'c>>,
    assembler: RecordAssembler<'c>,
    deriver: Deriver<'c>,
    validator: RowValidator<'c>,
}

impl<'c> MappingPipeline<'c> {
    /// Fails if a join rule's dataset is missing or lacks its id column.
    pub fn new(config: &'c MappingConfiguration, datasets: &'c RelatedDatasets) -> ConfigResult<Self> {
        Ok(Self {
            resolvers: datasets.resolvers(&config.join_rules)?,
            assembler: RecordAssembler::new(config),
            deriver: Deriver::new(&config.derived, &config.image),
            validator: RowValidator::new(&config.row_rules, &config.lookups),
        })
    }

    pub fn map_record(&self, source: &SourceRecord) -> MappedRecord<'c> {
        let related: Vec<&SourceRecord> = self
            .resolvers
            .iter()
            .filter_map(|resolver| {
                let hit = resolver.resolve(source);
                if hit.is_some() {
                    tracing::debug!(
                        dataset = %resolver.rule().related_dataset.display(),
                        "join hit"
                    );
                }
                hit
            })
            .collect();
        let join_hits = related.len();

        let (mut record, report) = self.assembler.assemble(source, &related);
        self.deriver.apply(source, &mut record);
        let verdict = self.validator.validate(&mut record);

        MappedRecord {
            record,
            verdict,
            report,
            join_hits,
            join_misses: self.resolvers.len() - join_hits,
        }
    }
}

/// Map the source file of `options` into rotated output units.
pub fn run(options: &RunOptions) -> PipelineResult<RunSummary> {
    let limit = NonZeroUsize::new(options.row_limit).ok_or(ConfigError::ZeroRowLimit)?;
    let config = MappingConfiguration::load(&options.config, options.image_settings())?;
    let datasets = RelatedDatasets::load(&config.join_rules)?;
    let pipeline = MappingPipeline::new(&config, &datasets)?;

    let reader = SourceReader::open(&options.source, options.delimiter)?;
    tracing::info!(
        source = %options.source.display(),
        encoding = reader.encoding(),
        delimiter = %reader.delimiter().escape_default(),
        columns = reader.headers().len(),
        "reading source"
    );

    let naming = UnitNaming::from_destination(&options.destination);
    let mut chunker = OutputChunker::new(&config.schema, naming, limit);
    let mut summary = RunSummary::default();

    for record in reader {
        let record = record?;
        summary.seen += 1;

        let mapped = pipeline.map_record(&record);
        summary.skipped_mappings += mapped.report.skipped.len();
        summary.join_hits += mapped.join_hits;
        summary.join_misses += mapped.join_misses;

        match &mapped.verdict {
            Verdict::Accepted { clamped } => {
                if !clamped.is_empty() {
                    tracing::debug!(record = summary.seen, ?clamped, "values clamped");
                }
                summary.accepted += 1;
                for row in fan_out(&mapped.record) {
                    tracing::trace!(record = summary.seen, values = ?row.values(), "row");
                    chunker.write_row(&row)?;
                    summary.rows_emitted += 1;
                }
            }
            Verdict::Rejected(reason) => {
                tracing::debug!(record = summary.seen, %reason, "record rejected");
                summary.rejected += 1;
            }
        }
    }

    summary.units = chunker.finish()?;
    tracing::info!(
        seen = summary.seen,
        accepted = summary.accepted,
        rejected = summary.rejected,
        rows = summary.rows_emitted,
        units = summary.units.len(),
        "mapping finished"
    );
    Ok(summary)
}
