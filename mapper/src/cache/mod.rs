//! Text resource cache for `ext:` static fields.
//!
//! A static field whose value is `ext:<name>` takes its content from the
//! file `<name>` in the statics directory. Each file is read at most once
//! per run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Prefix marking a static value as a reference to an external text file.
pub const EXTERNAL_PREFIX: &str = "ext:";

/// Directory where external texts are looked up (relative to current dir)
pub const DEFAULT_STATICS_DIR: &str = "statics";

/// Per-run cache of external text resources
#[derive(Debug)]
pub struct TextResourceCache {
    /// Directory the resources are resolved against
    statics_dir: PathBuf,
    /// Loaded contents (file name -> text)
    texts: HashMap<String, String>,
}

impl TextResourceCache {
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            statics_dir: dir.as_ref().to_path_buf(),
            texts: HashMap::new(),
        }
    }

    /// Resolve a static value: `ext:` references are replaced by the file
    /// content, anything else is returned unchanged.
    pub fn resolve(&mut self, value: &str) -> ConfigResult<String> {
        match value.strip_prefix(EXTERNAL_PREFIX) {
            Some(name) => self.load(name).map(str::to_string),
            None => Ok(value.to_string()),
        }
    }

    /// Load a resource by file name, reading it from disk on first use.
    pub fn load(&mut self, name: &str) -> ConfigResult<&str> {
        if !self.texts.contains_key(name) {
            let path = self.statics_dir.join(name);
            let content = fs::read_to_string(&path)
                .map_err(|source| ConfigError::ExternalText { path, source })?;
            self.texts.insert(name.to_string(), content);
        }
        Ok(self.texts[name].as_str())
    }

    /// Number of distinct resources read so far.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}
