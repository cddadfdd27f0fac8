//! Mapping configuration.
//!
//! The configuration is loaded once at start-up from a directory of JSON
//! resources and then shared read-only by every component of the run.
//!
//! | Resource                               | Required | Content                            |
//! |----------------------------------------|----------|------------------------------------|
//! | `csv-static-mappings.json`             | yes      | destination column -> literal      |
//! | `csv-field-mappings.json`              | yes      | source column -> destination(s)    |
//! | `csv-list-mappings.json`               | yes      | destination column -> value lookup |
//! | `csv-additional-related-mapping.json`  | no       | join rules                         |
//! | `destination-schema.json`              | no       | destination column names           |
//! | `csv-row-rules.json`                   | no       | row acceptance rules               |
//! | `csv-derived-columns.json`             | no       | handle and image list derivation   |

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::TextResourceCache;
use crate::error::{ConfigError, ConfigResult};
use crate::models::DestinationSchema;
use crate::transform::derived::DerivedColumns;
use crate::validation::RowRules;

pub const STATIC_MAPPINGS_FILE: &str = "csv-static-mappings.json";
pub const FIELD_MAPPINGS_FILE: &str = "csv-field-mappings.json";
pub const LIST_MAPPINGS_FILE: &str = "csv-list-mappings.json";
pub const RELATED_MAPPINGS_FILE: &str = "csv-additional-related-mapping.json";
pub const DESTINATION_SCHEMA_FILE: &str = "destination-schema.json";
pub const ROW_RULES_FILE: &str = "csv-row-rules.json";
pub const DERIVED_COLUMNS_FILE: &str = "csv-derived-columns.json";

/// Default configuration directory (relative to current dir)
pub const DEFAULT_CONFIG_DIR: &str = "config";

// =============================================================================
// Field Mappings
// =============================================================================

/// Destination of a field mapping: one column, or several columns that all
/// receive the same source value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldTarget {
    Single(String),
    Multiple(Vec<String>),
}

impl FieldTarget {
    pub fn destinations(&self) -> &[String] {
        match self {
            FieldTarget::Single(column) => std::slice::from_ref(column),
            FieldTarget::Multiple(columns) => columns,
        }
    }
}

/// One `source column -> destination(s)` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target: FieldTarget,
}

/// Ordered field mappings. Order is the order of the JSON object, so a later
/// entry writing the same destination wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMappings(Vec<FieldMapping>);

impl FieldMappings {
    pub fn new(mappings: Vec<FieldMapping>) -> Self {
        Self(mappings)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldMapping> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FieldMappings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = FieldMappings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of source column to destination column(s)")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut mappings = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((source, target)) = map.next_entry::<String, FieldTarget>()? {
                    mappings.push(FieldMapping { source, target });
                }
                Ok(FieldMappings(mappings))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

// =============================================================================
// Value Lookup Tables
// =============================================================================

/// Per-destination-column value substitution tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ValueLookupTables(HashMap<String, HashMap<String, String>>);

impl ValueLookupTables {
    pub fn new(tables: HashMap<String, HashMap<String, String>>) -> Self {
        Self(tables)
    }

    /// Replacement for `value` in `column`'s table, or `value` unchanged when
    /// there is no table or no entry.
    pub fn lookup<'a>(&'a self, column: &str, value: &'a str) -> &'a str {
        self.0
            .get(column)
            .and_then(|table| table.get(value))
            .map(String::as_str)
            .unwrap_or(value)
    }

    pub fn table(&self, column: &str) -> Option<&HashMap<String, String>> {
        self.0.get(column)
    }

    /// True if `value` is one of the replacement values of `table`.
    pub fn contains_value(&self, table: &str, value: &str) -> bool {
        self.0
            .get(table)
            .is_some_and(|t| t.values().any(|v| v == value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

// =============================================================================
// Join Rules
// =============================================================================

/// How a source value is compared with the related id column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinOperator {
    /// Related id contains the source value as a substring
    Contains,
    /// Related id equals the source value
    Equal,
    /// Source value is a regular expression found in the related id
    Matches,
}

/// Declares how to find one related record per source record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawJoinRule")]
pub struct JoinRule {
    pub match_column: String,
    pub related_dataset: PathBuf,
    pub related_id_column: String,
    pub operator: JoinOperator,
}

#[derive(Deserialize)]
struct RawJoinRule {
    #[serde(rename = "related-data-file")]
    related_data_file: PathBuf,
    #[serde(rename = "related-data-file-id-column")]
    id_column: String,
    #[serde(rename = "matching-rule-in-main")]
    matching: RawMatchingRule,
}

#[derive(Deserialize)]
struct RawMatchingRule {
    column: String,
    operator: JoinOperator,
}

impl From<RawJoinRule> for JoinRule {
    fn from(raw: RawJoinRule) -> Self {
        Self {
            match_column: raw.matching.column,
            related_dataset: raw.related_data_file,
            related_id_column: raw.id_column,
            operator: raw.matching.operator,
        }
    }
}

// =============================================================================
// Image Settings
// =============================================================================

/// Base path prepended to values of the designated image column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSettings {
    pub base_path: Option<String>,
    pub column: Option<String>,
}

impl ImageSettings {
    /// Apply the base path if `column` is the image column.
    pub fn apply(&self, column: &str, value: String) -> String {
        match (&self.base_path, &self.column) {
            (Some(base), Some(image_column)) if !base.is_empty() && image_column == column => {
                format!("{base}{value}")
            }
            _ => value,
        }
    }

    /// Prefix for discovered image files. Empty when no base path is set.
    pub fn prefix(&self) -> &str {
        self.base_path.as_deref().unwrap_or("")
    }
}

// =============================================================================
// Mapping Configuration
// =============================================================================

/// Locations of the configuration resources.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub statics_dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(config_dir: impl Into<PathBuf>, statics_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            statics_dir: statics_dir.into(),
        }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DIR, crate::cache::DEFAULT_STATICS_DIR)
    }
}

/// Process-wide, read-only configuration for one run.
#[derive(Debug, Clone)]
pub struct MappingConfiguration {
    pub schema: DestinationSchema,
    /// Static fields with `ext:` references already resolved
    pub static_fields: Vec<(String, String)>,
    pub field_mappings: FieldMappings,
    pub lookups: ValueLookupTables,
    pub join_rules: Vec<JoinRule>,
    pub row_rules: RowRules,
    pub derived: DerivedColumns,
    pub image: ImageSettings,
}

impl MappingConfiguration {
    /// Configuration with the given schema and nothing else.
    pub fn new(schema: DestinationSchema) -> Self {
        Self {
            schema,
            static_fields: Vec::new(),
            field_mappings: FieldMappings::default(),
            lookups: ValueLookupTables::default(),
            join_rules: Vec::new(),
            row_rules: RowRules::default(),
            derived: DerivedColumns::default(),
            image: ImageSettings::default(),
        }
    }

    /// Load every resource from `paths`, resolve `ext:` static fields and
    /// check that all referenced destination columns exist.
    pub fn load(paths: &ConfigPaths, image: ImageSettings) -> ConfigResult<Self> {
        let schema = match read_optional_json::<Vec<String>>(&paths.file(DESTINATION_SCHEMA_FILE))? {
            Some(columns) => DestinationSchema::new(columns),
            None => DestinationSchema::storefront(),
        };

        let static_path = paths.file(STATIC_MAPPINGS_FILE);
        let raw_statics: BTreeMap<String, Value> = read_json(&static_path)?;
        let mut texts = TextResourceCache::with_dir(&paths.statics_dir);
        let static_fields = resolve_static_fields(&static_path, raw_statics, &mut texts)?;

        let config = Self {
            schema,
            static_fields,
            field_mappings: read_json(&paths.file(FIELD_MAPPINGS_FILE))?,
            lookups: read_json(&paths.file(LIST_MAPPINGS_FILE))?,
            join_rules: read_optional_json(&paths.file(RELATED_MAPPINGS_FILE))?.unwrap_or_default(),
            row_rules: read_optional_json(&paths.file(ROW_RULES_FILE))?.unwrap_or_default(),
            derived: read_optional_json(&paths.file(DERIVED_COLUMNS_FILE))?.unwrap_or_default(),
            image,
        };
        config.check_columns()?;

        tracing::info!(
            columns = config.schema.len(),
            statics = config.static_fields.len(),
            mappings = config.field_mappings.len(),
            joins = config.join_rules.len(),
            external_texts = texts.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Reject references to destination columns outside the schema.
    pub fn check_columns(&self) -> ConfigResult<()> {
        let check = |column: &str, origin: String| -> ConfigResult<()> {
            if self.schema.contains(column) {
                Ok(())
            } else {
                Err(ConfigError::UnknownDestinationColumn {
                    column: column.to_string(),
                    origin,
                })
            }
        };

        for (column, _) in &self.static_fields {
            check(column, "static fields".to_string())?;
        }
        for mapping in self.field_mappings.iter() {
            for column in mapping.target.destinations() {
                check(column, format!("field mapping '{}'", mapping.source))?;
            }
        }
        for column in self.lookups.columns() {
            check(column, "value lookup tables".to_string())?;
        }
        for column in self.row_rules.columns() {
            check(column, "row rules".to_string())?;
        }
        if let Some(membership) = &self.row_rules.membership {
            if self.lookups.table(&membership.table).is_none() {
                return Err(ConfigError::InvalidValue {
                    path: PathBuf::from(ROW_RULES_FILE),
                    key: "membership.table".to_string(),
                    message: format!("no value lookup table named '{}'", membership.table),
                });
            }
        }
        for column in self.derived.columns() {
            check(column, "derived columns".to_string())?;
        }
        if self.derived.images.as_ref().is_some_and(|i| i.repeat_key) && self.derived.handle.is_none() {
            return Err(ConfigError::InvalidValue {
                path: PathBuf::from(DERIVED_COLUMNS_FILE),
                key: "images.repeat_key".to_string(),
                message: "repeat_key needs a handle rule".to_string(),
            });
        }
        if let Some(column) = &self.image.column {
            check(column, "image column option".to_string())?;
        }
        Ok(())
    }
}

/// Turn static JSON values into strings and resolve `ext:` references.
fn resolve_static_fields(
    path: &Path,
    raw: BTreeMap<String, Value>,
    texts: &mut TextResourceCache,
) -> ConfigResult<Vec<(String, String)>> {
    raw.into_iter()
        .map(|(column, value)| {
            let literal = match value {
                Value::String(s) => texts.resolve(&s)?,
                Value::Null => String::new(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ConfigError::InvalidValue {
                        path: path.to_path_buf(),
                        key: column,
                        message: "static values must be strings, numbers or booleans".to_string(),
                    })
                }
            };
            Ok((column, literal))
        })
        .collect()
}

/// Read and parse a required JSON resource.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Missing {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an optional JSON resource. A missing file yields `None`.
pub fn read_optional_json<T: DeserializeOwned>(path: &Path) -> ConfigResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}
