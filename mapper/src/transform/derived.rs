//! Derived columns computed from the source record after mapping.
//!
//! - **handle**: first words of a source column, lowercased and joined,
//!   e.g. `"Nordic Parka XL"` -> `"nordic-parka"`
//! - **images**: every file in an image directory whose name starts with one
//!   word of a source column, e.g. `Parka_1.jpg`, `Parka_2.jpg` for `"Nordic Parka"`.
//!   The image column becomes a list, and with `repeat_key` the handle column
//!   becomes a list too (one extra handle per image) so every continuation
//!   row carries the product key.
//!
//! ```json
//! {
//!   "handle": { "source": "Productname", "column": "Handle", "words": 2, "separator": "-" },
//!   "images": { "source": "Productname", "word": 1, "directory": "source/images",
//!               "column": "Image Src", "repeat_key": true }
//! }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::ImageSettings;
use crate::models::{SourceRecord, StagingRecord, StagingValue};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DerivedColumns {
    pub handle: Option<HandleRule>,
    pub images: Option<ImageListRule>,
}

impl DerivedColumns {
    /// Destination columns written by derivation.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.handle
            .iter()
            .map(|h| h.column.as_str())
            .chain(self.images.iter().map(|i| i.column.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_none() && self.images.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HandleRule {
    pub source: String,
    pub column: String,
    #[serde(default = "default_handle_words")]
    pub words: usize,
    #[serde(default = "default_handle_separator")]
    pub separator: String,
}

fn default_handle_words() -> usize {
    2
}

fn default_handle_separator() -> String {
    "-".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageListRule {
    pub source: String,
    /// 0-based word of the source value used as file name prefix
    #[serde(default = "default_image_word")]
    pub word: usize,
    pub directory: PathBuf,
    pub column: String,
    /// Repeat the handle once per image
    #[serde(default)]
    pub repeat_key: bool,
}

fn default_image_word() -> usize {
    1
}

/// Build a handle from the first `words` words of `name`.
pub fn derive_handle(name: &str, words: usize, separator: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Applies [`DerivedColumns`] to staging records.
///
/// The image directory is listed once when the deriver is created.
#[derive(Debug, Clone)]
pub struct Deriver<'c> {
    derived: &'c DerivedColumns,
    image: &'c ImageSettings,
    image_files: Vec<String>,
}

impl<'c> Deriver<'c> {
    pub fn new(derived: &'c DerivedColumns, image: &'c ImageSettings) -> Self {
        let image_files = derived
            .images
            .as_ref()
            .map(|rule| list_files(&rule.directory))
            .unwrap_or_default();
        Self {
            derived,
            image,
            image_files,
        }
    }

    /// Image files known to the deriver, sorted by name.
    pub fn image_files(&self) -> &[String] {
        &self.image_files
    }

    pub fn apply(&self, source: &SourceRecord, record: &mut StagingRecord<'_>) {
        if let Some(rule) = &self.derived.handle {
            match source.get(&rule.source) {
                Some(name) => {
                    let handle = derive_handle(name, rule.words, &rule.separator);
                    if !handle.is_empty() {
                        record.set(&rule.column, handle);
                    }
                }
                None => tracing::warn!(column = %rule.source, "handle source column missing"),
            }
        }

        if let Some(rule) = &self.derived.images {
            self.apply_images(rule, source, record);
        }
    }

    fn apply_images(&self, rule: &ImageListRule, source: &SourceRecord, record: &mut StagingRecord<'_>) {
        let Some(name) = source.get(&rule.source) else {
            tracing::warn!(column = %rule.source, "image source column missing");
            return;
        };
        if name.is_empty() {
            return;
        }
        let Some(model) = name.split_whitespace().nth(rule.word) else {
            tracing::debug!(name, word = rule.word, "no model word for image lookup");
            return;
        };

        let images: Vec<String> = self
            .image_files
            .iter()
            .filter(|file| file.starts_with(model))
            .map(|file| format!("{}{}", self.image.prefix(), file))
            .collect();
        tracing::trace!(model, count = images.len(), "images found");

        if rule.repeat_key {
            if let Some(handle_rule) = &self.derived.handle {
                let handle = record.scalar(&handle_rule.column).to_string();
                let keys = vec![handle; images.len() + 1];
                record.set(&handle_rule.column, StagingValue::Sequence(keys));
            }
        }
        record.set(&rule.column, StagingValue::Sequence(images));
    }
}

/// File names in `directory`, sorted. A missing directory yields no files.
fn list_files(directory: &Path) -> Vec<String> {
    if !directory.is_dir() {
        tracing::warn!(directory = %directory.display(), "image directory not found");
        return Vec::new();
    }
    let pattern = format!("{}/*", glob::Pattern::escape(&directory.to_string_lossy()));
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(directory = %directory.display(), error = %e, "cannot list image directory");
            return Vec::new();
        }
    };

    let mut files: Vec<String> = entries
        .flatten()
        .filter(|path| path.is_file())
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    files.sort();
    files
}
