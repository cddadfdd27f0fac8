//! Record transformation.
//!
//! - [`join`]: related record lookup
//! - [`assembler`]: static fields, field mappings and value lookups
//! - [`derived`]: handle and image list columns
//! - [`fanout`]: one staging record to its output rows
//! - [`pipeline`]: the full run

pub mod assembler;
pub mod derived;
pub mod fanout;
pub mod join;
pub mod pipeline;

pub use assembler::{AssemblyReport, MappingOutcome, RecordAssembler, RecordOrigin};
pub use derived::{derive_handle, DerivedColumns, Deriver};
pub use fanout::{fan_out, FanOut};
pub use join::{JoinResolver, RelatedDataset, RelatedDatasets};
pub use pipeline::{run, MappedRecord, MappingPipeline, RunOptions, RunSummary};
