//! Delimited source reader with charset and delimiter auto-detection.
//!
//! ```text
//! bytes ─▶ detect charset ─▶ decode ─▶ detect delimiter ─▶ split records ─▶ rows
//! ```
//!
//! A source is a single file or a directory; every `*.csv` file of a
//! directory is read in name order and the rows are concatenated. Rows are
//! kept as plain strings, header included. Whether the first row is a header
//! is the importer's call.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SourceError, SourceResult};

/// Candidate delimiters, in tie-break order.
const DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Rows read from a source, plus what was detected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceData {
    pub rows: Vec<Vec<String>>,
    /// Charset used to decode the (first) file.
    pub charset: String,
    /// Delimiter used to split the (first) file.
    pub delimiter: char,
    /// Files the rows came from.
    pub files: Vec<PathBuf>,
}

impl SourceData {
    /// Build from rows already in memory.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
            charset: "utf-8".to_string(),
            delimiter: ',',
            files: Vec::new(),
        }
    }

    /// Display name for run records: the file, or the directory for multi-file sources.
    pub fn file_name(&self) -> String {
        match self.files.as_slice() {
            [] => String::new(),
            [one] => one.display().to_string(),
            [first, ..] => first
                .parent()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| first.display().to_string()),
        }
    }
}

/// Overrides for auto-detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// Force a charset instead of detecting it.
    pub charset: Option<String>,
    /// Force a delimiter instead of detecting it.
    pub delimiter: Option<char>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes using the named encoding. A leading BOM is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SourceResult<String> {
    let label = match encoding.trim().to_lowercase().as_str() {
        "utf8" | "ascii" | "utf-8-sig" => "utf-8".to_string(),
        "latin1" | "latin-1" => "iso-8859-1".to_string(),
        "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    };

    let codec = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| SourceError::Encoding(encoding.to_string()))?;
    let (content, _, _) = codec.decode(bytes);
    Ok(content.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when the line holds none of the candidates.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = DELIMITERS[0];
    let mut best_count = 0;

    for &sep in &DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Split decoded content into rows of cells.
///
/// Rows may have different lengths. Blank lines are skipped.
pub fn read_rows(content: &str, delimiter: char) -> SourceResult<Vec<Vec<String>>> {
    let byte = u8::try_from(delimiter).map_err(|_| SourceError::InvalidDelimiter(delimiter))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(byte)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(rows)
}

/// Read in-memory bytes with auto-detection.
pub fn read_bytes(bytes: &[u8], options: &ReadOptions) -> SourceResult<SourceData> {
    let (charset, content) = match &options.charset {
        Some(forced) => (forced.clone(), decode_content(bytes, forced)?),
        None => {
            let detected = detect_encoding(bytes);
            match decode_content(bytes, &detected) {
                Ok(content) => (detected, content),
                // chardet can name charsets encoding_rs does not know.
                Err(_) => ("utf-8".to_string(), decode_content(bytes, "utf-8")?),
            }
        }
    };

    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));
    let rows = read_rows(&content, delimiter)?;

    Ok(SourceData {
        rows,
        charset,
        delimiter,
        files: Vec::new(),
    })
}

/// Read one file.
pub fn read_file<P: AsRef<Path>>(path: P, options: &ReadOptions) -> SourceResult<SourceData> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let mut data = read_bytes(&bytes, options)?;
    if data.rows.is_empty() {
        return Err(SourceError::Empty);
    }
    data.files.push(path.to_path_buf());
    Ok(data)
}

/// Read a file, or every `*.csv` file of a directory.
///
/// Files of a directory that fail to read are skipped. A later file whose
/// first row repeats the first file's first row has that row dropped, so
/// files sharing a header concatenate cleanly.
pub fn read_source<P: AsRef<Path>>(path: P, options: &ReadOptions) -> SourceResult<SourceData> {
    let path = path.as_ref();
    let not_found = || SourceError::NotFound(path.display().to_string());

    if path.is_file() {
        return read_file(path, options);
    }
    if !path.is_dir() {
        return Err(not_found());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "csv"))
        .collect();
    files.sort();

    let mut merged: Option<SourceData> = None;
    for file in files {
        let Ok(data) = read_file(&file, options) else {
            continue;
        };
        match merged.as_mut() {
            None => merged = Some(data),
            Some(all) => {
                let mut rows = data.rows.into_iter().peekable();
                if rows.peek() == all.rows.first() {
                    rows.next();
                }
                all.rows.extend(rows);
                all.files.push(file);
            }
        }
    }

    merged.ok_or_else(not_found)
}
