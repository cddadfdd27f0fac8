//! # Productmap - config-driven CSV product mapping
//!
//! Productmap maps rows of an arbitrary supplier CSV into a fixed shop
//! import schema using declarative JSON rules, optionally enriching each
//! row from related CSV files, and writes the result as rotated CSV units.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Source CSV │────▶│   Parser    │────▶│  Assemble   │────▶│  Validate   │────▶│   Fan-out   │──▶ units
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (join+map)  │     │  (rules)    │     │  (images)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use productmap::{run, RunOptions};
//!
//! let summary = run(&RunOptions::new("source/products.csv", "dist/products.csv"))?;
//! println!("Mapped {} source data items.", summary.seen);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Destination schema, source, staging and output records
//! - [`parser`] - CSV reading with encoding and delimiter detection
//! - [`config`] - Mapping configuration resources
//! - [`cache`] - External text resources for static fields
//! - [`transform`] - Join, assembly, derivation, fan-out and the pipeline
//! - [`validation`] - Row acceptance rules
//! - [`output`] - Rotating output units
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod error;
pub mod models;

// Input and configuration
pub mod cache;
pub mod config;
pub mod parser;

// Processing
pub mod transform;
pub mod validation;

// Output
pub mod logging;
pub mod output;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, CsvError, CsvResult, OutputError, OutputResult, PipelineError,
    PipelineResult,
};

// =============================================================================
// Re-exports - Models and configuration
// =============================================================================

pub use config::{
    ConfigPaths, FieldMapping, FieldMappings, FieldTarget, ImageSettings, JoinOperator, JoinRule,
    MappingConfiguration, ValueLookupTables,
};
pub use models::{DestinationSchema, OutputRow, SourceRecord, StagingRecord, StagingValue};

// =============================================================================
// Re-exports - Components
// =============================================================================

pub use output::{OutputChunker, UnitNaming, DEFAULT_ROW_LIMIT};
pub use parser::{detect_delimiter, detect_encoding, ParseResult, SourceReader};
pub use transform::{
    fan_out, run, MappingOutcome, MappingPipeline, RecordAssembler, RelatedDatasets, RunOptions,
    RunSummary,
};
pub use validation::{RowRules, RowValidator, Verdict};
