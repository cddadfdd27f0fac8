//! Delimited-text reading with encoding and delimiter auto-detection.
//!
//! Shop exports arrive in whatever encoding the shop system used, so
//! files are decoded before the `csv` reader sees them. Nothing here knows
//! about the destination schema.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::error::{CsvError, CsvResult};
use crate::models::SourceRecord;

/// Delimiters tried during detection, in order of preference on ties.
const CANDIDATE_DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

/// Fully loaded dataset with metadata.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Records in file order
    pub records: Vec<SourceRecord>,
    /// Detected encoding
    pub encoding: String,
    /// Detected or requested delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Arc<[String]>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string. Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &CANDIDATE_DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Streaming reader over the records of one delimited-text resource.
///
/// The file is decoded up front; records are parsed one at a time.
pub struct SourceReader {
    headers: Arc<[String]>,
    encoding: String,
    delimiter: char,
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for SourceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceReader")
            .field("headers", &self.headers)
            .field("encoding", &self.encoding)
            .field("delimiter", &self.delimiter)
            .finish_non_exhaustive()
    }
}

impl SourceReader {
    /// Open a file, detecting encoding and (unless given) the delimiter.
    pub fn open(path: &Path, delimiter: Option<char>) -> CsvResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| CsvError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, delimiter)
    }

    /// Same as [`SourceReader::open`] for in-memory content.
    pub fn from_bytes(bytes: &[u8], delimiter: Option<char>) -> CsvResult<Self> {
        if bytes.is_empty() {
            return Err(CsvError::EmptyFile);
        }
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding);
        if content.trim().is_empty() {
            return Err(CsvError::EmptyFile);
        }
        let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
        if !delimiter.is_ascii() {
            return Err(CsvError::InvalidDelimiter(delimiter));
        }
        let content = skip_initial_space(&content, delimiter);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(Cursor::new(content.into_bytes()));

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(String::is_empty) {
            return Err(CsvError::NoHeaders);
        }

        Ok(Self {
            headers: headers.into(),
            encoding,
            delimiter,
            records: reader.into_records(),
        })
    }

    pub fn headers(&self) -> &Arc<[String]> {
        &self.headers
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Drain the reader into a [`ParseResult`].
    pub fn read_all(self) -> CsvResult<ParseResult> {
        let headers = Arc::clone(&self.headers);
        let encoding = self.encoding.clone();
        let delimiter = self.delimiter;
        let records = self.collect::<CsvResult<Vec<_>>>()?;
        Ok(ParseResult {
            records,
            encoding,
            delimiter,
            headers,
        })
    }
}

impl Iterator for SourceReader {
    type Item = CsvResult<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };
            // whitespace-only lines survive the csv reader
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let values = record.iter().map(str::to_string).collect();
            return Some(Ok(SourceRecord::new(Arc::clone(&self.headers), values)));
        }
    }
}

/// Drop spaces at the start of unquoted fields, like a reader with
/// skip-initial-space. Quoted content is kept as is.
fn skip_initial_space(content: &str, delimiter: char) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_quotes = false;
    let mut field_start = true;

    for c in content.chars() {
        if field_start && c == ' ' {
            continue;
        }
        field_start = false;
        if c == '"' {
            in_quotes = !in_quotes;
        } else if !in_quotes && (c == delimiter || c == '\n') {
            field_start = true;
        }
        out.push(c);
    }
    out
}
