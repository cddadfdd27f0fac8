//! Enrichment of source records from a related dataset.
//!
//! Each [`JoinRule`] names a related CSV file, the id column in that file and
//! the source column whose value is searched for. The related file is read
//! once per run; lookups scan it in file order and the first hit wins.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{JoinOperator, JoinRule};
use crate::error::{ConfigError, ConfigResult, CsvResult};
use crate::models::SourceRecord;
use crate::parser::SourceReader;

/// A related dataset held in memory for the whole run.
#[derive(Debug, Clone)]
pub struct RelatedDataset {
    path: PathBuf,
    headers: Arc<[String]>,
    records: Vec<SourceRecord>,
}

impl RelatedDataset {
    /// Read the dataset from disk (encoding and delimiter auto-detected).
    pub fn load(path: &Path) -> CsvResult<Self> {
        let parsed = SourceReader::open(path, None)?.read_all()?;
        tracing::debug!(
            path = %path.display(),
            rows = parsed.records.len(),
            "related dataset loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            headers: parsed.headers,
            records: parsed.records,
        })
    }

    pub fn from_records(path: impl Into<PathBuf>, headers: Arc<[String]>, records: Vec<SourceRecord>) -> Self {
        Self {
            path: path.into(),
            headers,
            records,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Related datasets keyed by path, so rules sharing a file share one copy.
#[derive(Debug, Default)]
pub struct RelatedDatasets {
    by_path: HashMap<PathBuf, RelatedDataset>,
}

impl RelatedDatasets {
    /// Load every dataset referenced by `rules`.
    pub fn load(rules: &[JoinRule]) -> ConfigResult<Self> {
        let mut by_path = HashMap::new();
        for rule in rules {
            if !by_path.contains_key(&rule.related_dataset) {
                let dataset = RelatedDataset::load(&rule.related_dataset)?;
                by_path.insert(rule.related_dataset.clone(), dataset);
            }
        }
        Ok(Self { by_path })
    }

    pub fn insert(&mut self, dataset: RelatedDataset) {
        self.by_path.insert(dataset.path.clone(), dataset);
    }

    pub fn get(&self, path: &Path) -> Option<&RelatedDataset> {
        self.by_path.get(path)
    }

    /// One resolver per rule, in rule order.
    pub fn resolvers<'a>(&'a self, rules: &'a [JoinRule]) -> ConfigResult<Vec<JoinResolver<'a>>> {
        rules
            .iter()
            .map(|rule| {
                let dataset = self
                    .get(&rule.related_dataset)
                    .ok_or_else(|| ConfigError::DatasetNotLoaded(rule.related_dataset.clone()))?;
                JoinResolver::new(rule, dataset)
            })
            .collect()
    }
}

/// Finds at most one related record for a source record.
#[derive(Debug, Clone, Copy)]
pub struct JoinResolver<'a> {
    rule: &'a JoinRule,
    dataset: &'a RelatedDataset,
    id_index: usize,
}

impl<'a> JoinResolver<'a> {
    /// Fails if the dataset has no column named by the rule's id column.
    pub fn new(rule: &'a JoinRule, dataset: &'a RelatedDataset) -> ConfigResult<Self> {
        let id_index = dataset
            .headers
            .iter()
            .position(|h| h == &rule.related_id_column)
            .ok_or_else(|| ConfigError::MissingIdColumn {
                path: dataset.path.clone(),
                column: rule.related_id_column.clone(),
            })?;
        Ok(Self {
            rule,
            dataset,
            id_index,
        })
    }

    pub fn rule(&self) -> &'a JoinRule {
        self.rule
    }

    /// First related record matching `source`, or `None`.
    pub fn resolve(&self, source: &SourceRecord) -> Option<&'a SourceRecord> {
        let Some(needle) = source.get(&self.rule.match_column) else {
            tracing::warn!(
                column = %self.rule.match_column,
                "join column missing from source record"
            );
            return None;
        };

        let mut records = self.dataset.records.iter();
        match self.rule.operator {
            JoinOperator::Equal => records.find(|r| self.id(r) == needle),
            JoinOperator::Contains => records.find(|r| self.id(r).contains(needle)),
            JoinOperator::Matches => {
                let pattern = match Regex::new(needle) {
                    Ok(pattern) => pattern,
                    Err(e) => {
                        tracing::warn!(pattern = %needle, error = %e, "invalid join pattern");
                        return None;
                    }
                };
                records.find(|r| pattern.is_match(self.id(r)))
            }
        }
    }

    fn id<'r>(&self, record: &'r SourceRecord) -> &'r str {
        record.values().get(self.id_index).map_or("", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> RelatedDataset {
        let headers: Arc<[String]> = vec!["id".to_string(), "stock".to_string()].into();
        let rows = [("abc123", "5"), ("xyz", "7"), ("abc999", "9")];
        let records = rows
            .iter()
            .map(|(id, stock)| SourceRecord::new(Arc::clone(&headers), vec![id.to_string(), stock.to_string()]))
            .collect();
        RelatedDataset::from_records("stock.csv", headers, records)
    }

    fn rule(operator: JoinOperator) -> JoinRule {
        JoinRule {
            match_column: "sku".into(),
            related_dataset: PathBuf::from("stock.csv"),
            related_id_column: "id".into(),
            operator,
        }
    }

    fn source(sku: &str) -> SourceRecord {
        SourceRecord::from_pairs([("sku", sku)])
    }

    #[test]
    fn test_contains_matches_substring() {
        let data = dataset();
        let rule = rule(JoinOperator::Contains);
        let resolver = JoinResolver::new(&rule, &data).unwrap();

        let hit = resolver.resolve(&source("abc")).unwrap();
        assert_eq!(hit.get("id"), Some("abc123"));
    }

    #[test]
    fn test_equal_requires_exact_value() {
        let data = dataset();
        let rule = rule(JoinOperator::Equal);
        let resolver = JoinResolver::new(&rule, &data).unwrap();

        assert!(resolver.resolve(&source("abc")).is_none());
        assert_eq!(resolver.resolve(&source("xyz")).unwrap().get("stock"), Some("7"));
    }

    #[test]
    fn test_first_hit_wins() {
        let data = dataset();
        let rule = rule(JoinOperator::Contains);
        let resolver = JoinResolver::new(&rule, &data).unwrap();

        // Both abc123 and abc999 contain "abc"
        assert_eq!(resolver.resolve(&source("abc")).unwrap().get("stock"), Some("5"));
    }

    #[test]
    fn test_matches_uses_pattern() {
        let data = dataset();
        let rule = rule(JoinOperator::Matches);
        let resolver = JoinResolver::new(&rule, &data).unwrap();

        assert_eq!(resolver.resolve(&source("9+$")).unwrap().get("id"), Some("abc999"));
        assert!(resolver.resolve(&source("(unclosed")).is_none());
    }

    #[test]
    fn test_missing_source_column_is_a_miss() {
        let data = dataset();
        let rule = rule(JoinOperator::Equal);
        let resolver = JoinResolver::new(&rule, &data).unwrap();

        let record = SourceRecord::from_pairs([("other", "abc123")]);
        assert!(resolver.resolve(&record).is_none());
    }

    #[test]
    fn test_empty_value_compared_like_any_other() {
        let headers: Arc<[String]> = vec!["id".to_string(), "stock".to_string()].into();
        let records = [("", "1"), ("abc", "2")]
            .iter()
            .map(|(id, stock)| SourceRecord::new(Arc::clone(&headers), vec![id.to_string(), stock.to_string()]))
            .collect();
        let data = RelatedDataset::from_records("stock.csv", headers, records);

        for operator in [JoinOperator::Equal, JoinOperator::Contains, JoinOperator::Matches] {
            let rule = rule(operator);
            let resolver = JoinResolver::new(&rule, &data).unwrap();
            assert_eq!(resolver.resolve(&source("")).unwrap().get("stock"), Some("1"));
        }

        // every id contains the empty string
        let rule = rule(JoinOperator::Contains);
        let data = dataset();
        let resolver = JoinResolver::new(&rule, &data).unwrap();
        assert_eq!(resolver.resolve(&source("")).unwrap().get("id"), Some("abc123"));
    }

    #[test]
    fn test_unknown_id_column_is_config_error() {
        let data = dataset();
        let mut rule = rule(JoinOperator::Equal);
        rule.related_id_column = "ean".into();
        assert!(matches!(
            JoinResolver::new(&rule, &data),
            Err(ConfigError::MissingIdColumn { .. })
        ));
    }

    #[test]
    fn test_shared_dataset_per_path() {
        let mut datasets = RelatedDatasets::default();
        datasets.insert(dataset());
        let rules = vec![rule(JoinOperator::Equal), rule(JoinOperator::Contains)];
        let resolvers = datasets.resolvers(&rules).unwrap();
        assert_eq!(resolvers.len(), 2);
    }
}
