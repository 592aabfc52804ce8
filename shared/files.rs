use flate2::read::MultiGzDecoder;
use log::debug;
use natord::compare;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

const LINE_BUFFER_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("opening {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error reading {label}: {source}")]
    Read {
        label: String,
        #[source]
        source: io::Error,
    },
}

/// A trait that abstracts sequential, line-oriented access to genotype call
/// files, regardless of whether they are compressed or already in memory.
pub trait TextSource: Send {
    /// Human-readable label used in diagnostics.
    fn label(&self) -> &str;

    fn next_line<'a>(&'a mut self) -> Result<Option<&'a [u8]>, FileError>;
}

/// Line reader over any buffered byte stream. Trailing `\n` and `\r\n` are
/// stripped from each yielded line.
pub struct ReaderTextSource<R> {
    reader: R,
    line: Vec<u8>,
    line_active: bool,
    label: String,
}

impl<R: BufRead + Send> ReaderTextSource<R> {
    pub fn new(label: impl Into<String>, reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(LINE_BUFFER_CAPACITY),
            line_active: false,
            label: label.into(),
        }
    }
}

impl<R: BufRead + Send> TextSource for ReaderTextSource<R> {
    fn label(&self) -> &str {
        &self.label
    }

    fn next_line<'a>(&'a mut self) -> Result<Option<&'a [u8]>, FileError> {
        if self.line_active {
            self.line.clear();
            self.line_active = false;
        }

        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.line)
            .map_err(|source| FileError::Read {
                label: self.label.clone(),
                source,
            })?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }

        self.line_active = true;
        Ok(Some(&self.line))
    }
}

pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Opens a local call file, decompressing it on the fly when the path ends in `.gz`.
pub fn open_text_source(path: &Path) -> Result<Box<dyn TextSource>, FileError> {
    let file = File::open(path).map_err(|source| FileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let label = path.display().to_string();

    let inner: Box<dyn Read + Send> = if is_gzip_path(path) {
        debug!("Opening {label} as a gzip stream");
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    Ok(Box::new(ReaderTextSource::new(label, BufReader::new(inner))))
}

/// The table name for a source: its file name up to the first `.`.
pub fn table_stem(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    match file_name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    }
}

/// Natural ordering of names, so `sample2` sorts before `sample10`.
pub fn compare_names(a: &str, b: &str) -> std::cmp::Ordering {
    compare(a, b)
}
