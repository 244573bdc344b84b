//! Recorded playback from a CSV capture
//!
//! Each line is one frame. Fields are split on `,`; the first
//! [`EEG_CHANNELS`] fields are read as floats and anything unparsable
//! (empty, text, missing) becomes `0.0`. At end of file the capture is
//! re-opened and playback restarts from the first line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::EEG_CHANNELS;
use crate::error::{RecordingError, Result};
use crate::source::FrameSource;

const DELIMITER: char = ',';

/// One comma-delimited row
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    fields: Vec<String>,
}

impl CsvRow {
    /// Split a line into fields.
    ///
    /// A trailing delimiter produces an empty last field, and an empty line
    /// produces a single empty field. A trailing `\r` is dropped.
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);
        Self {
            fields: line.split(DELIMITER).map(str::to_owned).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field `index` as a float; missing or malformed fields are `0.0`.
    pub fn value(&self, index: usize) -> f32 {
        self.fields
            .get(index)
            .map(|field| parse_lenient(field))
            .unwrap_or(0.0)
    }

    /// Write the first `out.len()` values into `out`.
    pub fn fill_frame(&self, out: &mut [f32]) {
        for (i, value) in out.iter_mut().enumerate() {
            *value = self.value(i);
        }
    }
}

fn parse_lenient(field: &str) -> f32 {
    field.trim().parse::<f32>().unwrap_or(0.0)
}

/// Endless playback of a CSV capture, paced to the device sampling rate
pub struct RecordedSource {
    path: PathBuf,
    interval: Duration,
    reader: Option<BufReader<File>>,
    line: Vec<u8>,
    frame: Vec<f32>,
    rows_this_pass: u64,
    passes: u64,
    frames_emitted: u64,
}

impl RecordedSource {
    /// Pace frames `1000 / sampling_rate` whole milliseconds apart.
    pub fn new(path: impl Into<PathBuf>, sampling_rate: u32) -> Self {
        let interval = if sampling_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(1000 / sampling_rate as u64)
        };
        Self::with_interval(path, interval)
    }

    pub fn with_interval(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            reader: None,
            line: Vec::new(),
            frame: vec![0.0; EEG_CHANNELS],
            rows_this_pass: 0,
            passes: 0,
            frames_emitted: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Completed or in-progress passes over the file
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path).map_err(|e| RecordingError::Open {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(BufReader::new(file))
    }
}

impl FrameSource for RecordedSource {
    fn next_frame(&mut self) -> Result<&[f32]> {
        if self.frames_emitted > 0 && !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }

        loop {
            let reader = match self.reader.as_mut() {
                Some(reader) => reader,
                None => {
                    self.reader = Some(self.open()?);
                    self.rows_this_pass = 0;
                    self.passes += 1;
                    tracing::debug!("Playback pass {} of {}", self.passes, self.path.display());
                    continue;
                }
            };

            // Rows are bytes; invalid UTF-8 decodes to U+FFFD and parses as 0.0
            self.line.clear();
            match reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    if self.rows_this_pass == 0 {
                        return Err(RecordingError::Empty(self.path.display().to_string()).into());
                    }
                    self.reader = None;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.line);
                    let line = line.strip_suffix('\n').unwrap_or(&line);
                    CsvRow::parse(line).fill_frame(&mut self.frame);
                    self.rows_this_pass += 1;
                    self.frames_emitted += 1;
                    return Ok(&self.frame);
                }
                Err(e) => return Err(RecordingError::Read(e.to_string()).into()),
            }
        }
    }
}
