// ========================================================================================
//
//                      GENOTYPE STORE: ONE CALL FILE, INDEXED BY MARKER
//
// ========================================================================================

use crate::shared::files::{FileError, ReaderTextSource, TextSource, compare_names, open_text_source};
use crate::types::MarkerRecord;
use ahash::AHashMap;
use log::debug;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// Number of tab-separated fields a record must carry: id, chromosome, position, call.
pub const REQUIRED_FIELDS: usize = 4;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error("malformed record in {source_label} at line {line}: {message}")]
    MalformedRecord {
        source_label: String,
        line: usize,
        message: String,
    },
}

/// Parsing knobs for call files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Lines starting with this prefix are header or metadata and are skipped.
    /// An empty prefix means the source has no comment lines.
    pub comment_prefix: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            comment_prefix: "#".to_string(),
        }
    }
}

/// All marker records parsed from a single source. Immutable after load.
#[derive(Clone, Debug)]
pub struct GenotypeStore {
    source: String,
    records: AHashMap<String, MarkerRecord>,
}

impl PartialEq for GenotypeStore {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && *self.records == *other.records
    }
}

impl Eq for GenotypeStore {}

impl GenotypeStore {
    /// Loads a call file from disk. Files ending in `.gz` are decompressed.
    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self, StoreError> {
        let mut source = open_text_source(path)?;
        Self::from_text_source(source.as_mut(), options)
    }

    /// Parses call data from any buffered reader, labelled `source` in the store
    /// and in diagnostics.
    pub fn from_reader<R: BufRead + Send>(
        source: &str,
        reader: R,
        options: &LoadOptions,
    ) -> Result<Self, StoreError> {
        let mut text = ReaderTextSource::new(source, reader);
        Self::from_text_source(&mut text, options)
    }

    pub fn from_text_source(
        text: &mut dyn TextSource,
        options: &LoadOptions,
    ) -> Result<Self, StoreError> {
        let source_label = text.label().to_string();
        let mut records = AHashMap::new();
        let mut line_number = 0usize;
        let mut comment_lines = 0usize;
        let mut duplicates = 0usize;

        while let Some(raw_line) = text.next_line()? {
            line_number += 1;
            let line = std::str::from_utf8(raw_line).map_err(|err| StoreError::MalformedRecord {
                source_label: source_label.clone(),
                line: line_number,
                message: format!("line is not valid UTF-8: {err}"),
            })?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if is_comment(trimmed, &options.comment_prefix) {
                comment_lines += 1;
                continue;
            }

            let (marker_id, record) = parse_record(trimmed).map_err(|message| {
                StoreError::MalformedRecord {
                    source_label: source_label.clone(),
                    line: line_number,
                    message,
                }
            })?;

            // Last write wins for repeated marker ids.
            if records.insert(marker_id, record).is_some() {
                duplicates += 1;
            }
        }

        debug!(
            "Parsed {} markers from {source_label} ({comment_lines} comment lines, {duplicates} duplicate ids)",
            records.len()
        );

        Ok(Self {
            source: source_label,
            records,
        })
    }

    /// Builds a store from already-parsed records.
    pub fn from_records(
        source: impl Into<String>,
        records: impl IntoIterator<Item = (String, MarkerRecord)>,
    ) -> Self {
        Self {
            source: source.into(),
            records: records.into_iter().collect(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get(&self, marker_id: &str) -> Option<&MarkerRecord> {
        self.records.get(marker_id)
    }

    pub fn contains(&self, marker_id: &str) -> bool {
        self.records.contains_key(marker_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn marker_ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MarkerRecord)> {
        self.records.iter().map(|(id, record)| (id.as_str(), record))
    }

    /// Records ordered by marker id (natural order), for stable output.
    pub fn sorted_records(&self) -> Vec<(&str, &MarkerRecord)> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by(|a, b| compare_names(a.0, b.0));
        sorted
    }
}

fn is_comment(line: &str, prefix: &str) -> bool {
    !prefix.is_empty() && line.starts_with(prefix)
}

fn parse_record(line: &str) -> Result<(String, MarkerRecord), String> {
    let mut fields = line.split('\t').map(str::trim);
    let mut next_field = |name: &str, found: usize| {
        fields.next().ok_or_else(|| {
            format!(
                "expected {REQUIRED_FIELDS} tab-separated fields but found {found} (missing {name})"
            )
        })
    };

    let marker_id = next_field("marker id", 0)?;
    let chromosome = next_field("chromosome", 1)?;
    let position_text = next_field("position", 2)?;
    let genotype = next_field("genotype call", 3)?;

    if marker_id.is_empty() {
        return Err("marker id is empty".to_string());
    }

    let position: u64 = position_text
        .parse()
        .map_err(|_| format!("invalid position value: {position_text}"))?;

    Ok((
        marker_id.to_string(),
        MarkerRecord::new(chromosome, position, genotype),
    ))
}
