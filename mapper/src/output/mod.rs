//! Rotating CSV output units.
//!
//! Rows are streamed into units of at most `limit` data rows, each unit
//! starting with the destination header. Units are named after the
//! destination path with a 1-based sequence suffix:
//!
//! ```text
//! dist/products.csv  ->  dist/products_1.csv, dist/products_2.csv, ...
//! ```
//!
//! A unit is written to a hidden `.products_1.csv.tmp` beside its final
//! path and renamed into place once it is complete. If the chunker is
//! dropped before [`OutputChunker::finish`], the unfinished temporary file is
//! removed and already committed units stay on disk.

use std::fs::{self, File};
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::{OutputError, OutputResult};
use crate::models::{DestinationSchema, OutputRow};

/// Default number of data rows per output unit.
pub const DEFAULT_ROW_LIMIT: usize = 400;

/// File naming for the units of one destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitNaming {
    dir: PathBuf,
    stem: String,
    extension: Option<String>,
}

impl UnitNaming {
    pub fn from_destination(destination: &Path) -> Self {
        let dir = destination.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let extension = destination.extension().map(|e| e.to_string_lossy().into_owned());
        Self { dir, stem, extension }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, index: usize) -> String {
        match &self.extension {
            Some(ext) => format!("{}_{}.{}", self.stem, index, ext),
            None => format!("{}_{}", self.stem, index),
        }
    }

    /// Final path of unit `index` (1-based).
    pub fn unit_path(&self, index: usize) -> PathBuf {
        self.dir.join(self.file_name(index))
    }

    /// Temporary path unit `index` is written to before commit.
    pub fn temp_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(".{}.tmp", self.file_name(index)))
    }
}

#[derive(Debug)]
struct OpenUnit {
    index: usize,
    temp: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

/// Streams output rows into rotating units.
#[derive(Debug)]
pub struct OutputChunker<'s> {
    schema: &'s DestinationSchema,
    naming: UnitNaming,
    limit: NonZeroUsize,
    current: Option<OpenUnit>,
    committed: Vec<PathBuf>,
    rows_written: usize,
}

impl<'s> OutputChunker<'s> {
    pub fn new(schema: &'s DestinationSchema, naming: UnitNaming, limit: NonZeroUsize) -> Self {
        Self {
            schema,
            naming,
            limit,
            current: None,
            committed: Vec::new(),
            rows_written: 0,
        }
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Data rows written so far, across all units.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Paths of the units committed so far.
    pub fn committed(&self) -> &[PathBuf] {
        &self.committed
    }

    /// Append one row, starting a new unit if the current one is full.
    pub fn write_row(&mut self, row: &OutputRow) -> OutputResult<()> {
        if row.values().len() != self.schema.len() {
            return Err(OutputError::RowWidth {
                expected: self.schema.len(),
                actual: row.values().len(),
            });
        }

        let full = self
            .current
            .as_ref()
            .is_some_and(|unit| unit.rows == self.limit.get());
        if full {
            self.commit_current()?;
        }
        let unit = match self.current.take() {
            Some(unit) => unit,
            None => self.open_unit()?,
        };
        let unit = self.current.insert(unit);

        unit.writer
            .write_record(row.values())
            .map_err(|source| OutputError::Write {
                path: unit.temp.clone(),
                source,
            })?;
        unit.rows += 1;
        self.rows_written += 1;
        Ok(())
    }

    /// Commit the last unit and return every unit path in order.
    ///
    /// A run without rows still produces one header-only unit.
    pub fn finish(mut self) -> OutputResult<Vec<PathBuf>> {
        if self.current.is_none() && self.committed.is_empty() {
            self.current = Some(self.open_unit()?);
        }
        self.commit_current()?;
        self.remove_stale_units()?;
        Ok(std::mem::take(&mut self.committed))
    }

    /// Delete units left by an earlier, longer run into the same destination.
    fn remove_stale_units(&self) -> OutputResult<()> {
        let mut index = self.committed.len() + 1;
        loop {
            let path = self.naming.unit_path(index);
            if !path.is_file() {
                return Ok(());
            }
            fs::remove_file(&path).map_err(|source| OutputError::Commit {
                path: path.clone(),
                source,
            })?;
            tracing::info!(unit = %path.display(), "removed stale unit");
            index += 1;
        }
    }

    fn open_unit(&self) -> OutputResult<OpenUnit> {
        let index = self.committed.len() + 1;
        let temp = self.naming.temp_path(index);

        if !self.naming.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.naming.dir).map_err(|source| OutputError::Create {
                path: self.naming.dir.clone(),
                source,
            })?;
        }
        let file = File::create(&temp).map_err(|source| OutputError::Create {
            path: temp.clone(),
            source,
        })?;

        let mut writer = csv::WriterBuilder::new().from_writer(file);
        writer
            .write_record(self.schema.columns())
            .map_err(|source| OutputError::Write {
                path: temp.clone(),
                source,
            })?;

        tracing::debug!(unit = index, path = %temp.display(), "output unit opened");
        Ok(OpenUnit {
            index,
            temp,
            writer,
            rows: 0,
        })
    }

    fn commit_current(&mut self) -> OutputResult<()> {
        let Some(unit) = self.current.take() else {
            return Ok(());
        };
        let path = self.naming.unit_path(unit.index);
        let commit_err = |source| OutputError::Commit {
            path: path.clone(),
            source,
        };

        let mut writer = unit.writer;
        writer.flush().map_err(commit_err)?;
        let file = writer
            .into_inner()
            .map_err(|e| commit_err(io::Error::new(e.error().kind(), e.to_string())))?;
        file.sync_all().map_err(commit_err)?;
        drop(file);
        fs::rename(&unit.temp, &path).map_err(commit_err)?;

        tracing::info!(unit = unit.index, rows = unit.rows, path = %path.display(), "output unit written");
        self.committed.push(path);
        Ok(())
    }
}

impl Drop for OutputChunker<'_> {
    fn drop(&mut self) {
        if let Some(unit) = self.current.take() {
            drop(unit.writer);
            if let Err(e) = fs::remove_file(&unit.temp) {
                tracing::warn!(path = %unit.temp.display(), error = %e, "cannot remove unfinished output unit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn schema() -> DestinationSchema {
        DestinationSchema::new(["Handle", "Title"])
    }

    fn limit(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn row(i: usize) -> OutputRow {
        OutputRow::new(vec![format!("h{i}"), format!("Title {i}")])
    }

    fn read_unit(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (headers, rows)
    }

    fn write_rows(dir: &Path, count: usize, per_unit: usize) -> Vec<PathBuf> {
        let schema = schema();
        let naming = UnitNaming::from_destination(&dir.join("out/products.csv"));
        let mut chunker = OutputChunker::new(&schema, naming, limit(per_unit));
        for i in 0..count {
            chunker.write_row(&row(i)).unwrap();
        }
        chunker.finish().unwrap()
    }

    #[test]
    fn test_unit_naming() {
        let naming = UnitNaming::from_destination(Path::new("dist/products.csv"));
        assert_eq!(naming.unit_path(1), PathBuf::from("dist/products_1.csv"));
        assert_eq!(naming.unit_path(12), PathBuf::from("dist/products_12.csv"));
        assert_eq!(naming.temp_path(2), PathBuf::from("dist/.products_2.csv.tmp"));

        let bare = UnitNaming::from_destination(Path::new("products"));
        assert_eq!(bare.unit_path(1), PathBuf::from("products_1"));
    }

    #[test]
    fn test_950_rows_make_three_units() {
        let dir = TempDir::new().unwrap();
        let units = write_rows(dir.path(), 950, 400);
        assert_eq!(units.len(), 3);

        let mut all = Vec::new();
        for (n, unit) in units.iter().enumerate() {
            assert!(unit.ends_with(format!("products_{}.csv", n + 1)));
            let (headers, rows) = read_unit(unit);
            assert_eq!(headers, vec!["Handle", "Title"]);
            all.extend(rows);
        }
        assert_eq!(all.len(), 950);
        for (i, values) in all.iter().enumerate() {
            assert_eq!(values[0], format!("h{i}"));
        }
        assert_eq!(read_unit(&units[2]).1.len(), 150);
    }

    #[test]
    fn test_exact_multiple_does_not_open_empty_unit() {
        let dir = TempDir::new().unwrap();
        let units = write_rows(dir.path(), 800, 400);
        assert_eq!(units.len(), 2);
        assert_eq!(read_unit(&units[1]).1.len(), 400);
    }

    #[test]
    fn test_no_rows_gives_header_only_unit() {
        let dir = TempDir::new().unwrap();
        let units = write_rows(dir.path(), 0, 400);
        assert_eq!(units.len(), 1);
        let (headers, rows) = read_unit(&units[0]);
        assert_eq!(headers.len(), 2);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_no_temp_files_left_after_finish() {
        let dir = TempDir::new().unwrap();
        write_rows(dir.path(), 5, 2);
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_row_width_checked() {
        let dir = TempDir::new().unwrap();
        let schema = schema();
        let naming = UnitNaming::from_destination(&dir.path().join("products.csv"));
        let mut chunker = OutputChunker::new(&schema, naming, limit(10));
        let err = chunker.write_row(&OutputRow::new(vec!["only one".into()])).unwrap_err();
        assert!(matches!(err, OutputError::RowWidth { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_drop_removes_unfinished_unit() {
        let dir = TempDir::new().unwrap();
        let schema = schema();
        let naming = UnitNaming::from_destination(&dir.path().join("products.csv"));
        {
            let mut chunker = OutputChunker::new(&schema, naming, limit(2));
            for i in 0..3 {
                chunker.write_row(&row(i)).unwrap();
            }
            assert_eq!(chunker.committed().len(), 1);
        }
        assert!(dir.path().join("products_1.csv").exists());
        assert!(!dir.path().join("products_2.csv").exists());
        assert!(!dir.path().join(".products_2.csv.tmp").exists());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_units_partition_rows(count in 0usize..60, per_unit in 1usize..12) {
            let dir = TempDir::new().unwrap();
            let units = write_rows(dir.path(), count, per_unit);

            let expected_units = count.div_ceil(per_unit).max(1);
            prop_assert_eq!(units.len(), expected_units);

            let mut seen = 0;
            for unit in &units {
                let (_, rows) = read_unit(unit);
                prop_assert!(rows.len() <= per_unit);
                for values in rows {
                    prop_assert_eq!(&values[0], &format!("h{seen}"));
                    seen += 1;
                }
            }
            prop_assert_eq!(seen, count);
        }
    }

    #[test]
    fn test_shorter_run_removes_stale_units() {
        let dir = TempDir::new().unwrap();
        assert_eq!(write_rows(dir.path(), 5, 2).len(), 3);

        let units = write_rows(dir.path(), 1, 2);
        assert_eq!(units, vec![dir.path().join("out/products_1.csv")]);
        assert_eq!(read_unit(&units[0]).1.len(), 1);
        assert!(!dir.path().join("out/products_2.csv").exists());
        assert!(!dir.path().join("out/products_3.csv").exists());
    }
}
