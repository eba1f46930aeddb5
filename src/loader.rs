//! Opens an incident export and streams its rows.
//!
//! The header is read and resolved into a [`ColumnLayout`] up front; cell
//! contents are left untouched for the cleaner.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use csv::ByteRecord;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    error::PipelineError,
    io_utils,
    schema::{ColumnLayout, IncidentColumn},
};

#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

/// One undecoded-by-type record: its 1-based source line and string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub fields: Vec<String>,
}

pub struct IncidentSource {
    path: PathBuf,
    reader: csv::Reader<Box<dyn Read>>,
    layout: ColumnLayout,
    encoding: &'static Encoding,
}

impl IncidentSource {
    pub fn open(
        path: &Path,
        required: &[IncidentColumn],
        options: SourceOptions,
    ) -> Result<Self, PipelineError> {
        let input = io_utils::open_input(path)
            .map_err(|err| PipelineError::source_read(path, format!("cannot open: {err}")))?;
        let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
        Self::from_reader(path, input, delimiter, required, options.encoding)
    }

    pub fn from_reader(
        path: &Path,
        input: Box<dyn Read>,
        delimiter: u8,
        required: &[IncidentColumn],
        encoding: &'static Encoding,
    ) -> Result<Self, PipelineError> {
        let mut reader = io_utils::open_csv_reader(input, delimiter);
        let headers = io_utils::reader_headers(&mut reader, encoding).map_err(|err| {
            PipelineError::source_read(
                path,
                format!("malformed header: {err:#}{}", encoding_hint(encoding)),
            )
        })?;
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(PipelineError::source_read(path, "missing header row"));
        }
        let layout = ColumnLayout::resolve(&headers, required).map_err(|missing| {
            PipelineError::source_read(
                path,
                format!("header is missing required column(s): {}", missing.join(", ")),
            )
        })?;
        info!(
            "Opened '{}' with delimiter '{}' ({} column(s))",
            path.display(),
            crate::printable_delimiter(delimiter),
            headers.len()
        );
        debug!("Resolved column layout: {layout:?}");
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            layout,
            encoding,
        })
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lazily yields rows; a read or decode failure ends the stream with
    /// [`PipelineError::SourceRead`]. Rows of the wrong width are yielded
    /// as-is for the cleaner to judge.
    pub fn rows(&mut self) -> RawRows<'_> {
        RawRows {
            path: &self.path,
            reader: &mut self.reader,
            encoding: self.encoding,
            record: ByteRecord::new(),
            failed: false,
        }
    }
}

pub struct RawRows<'a> {
    path: &'a Path,
    reader: &'a mut csv::Reader<Box<dyn Read>>,
    encoding: &'static Encoding,
    record: ByteRecord,
    failed: bool,
}

impl Iterator for RawRows<'_> {
    type Item = Result<RawRow, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let outcome = match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => return None,
            Ok(true) => {
                let line = self
                    .record
                    .position()
                    .map(|pos| pos.line())
                    .unwrap_or_default();
                io_utils::decode_record(&self.record, self.encoding)
                    .map(|fields| RawRow { line, fields })
                    .map_err(|err| {
                        PipelineError::source_read(
                            self.path,
                            format!("line {line}: {err:#}{}", encoding_hint(self.encoding)),
                        )
                    })
            }
            Err(err) => Err(PipelineError::source_read(self.path, err.to_string())),
        };
        if outcome.is_err() {
            self.failed = true;
        }
        Some(outcome)
    }
}

/// GTD exports are commonly Latin-1; point UTF-8 decode failures at the flag.
fn encoding_hint(encoding: &'static Encoding) -> &'static str {
    if encoding == UTF_8 {
        " (for Latin-1 exports pass --input-encoding latin1)"
    } else {
        ""
    }
}
