//! Result file persistence.
//!
//! One CSV row per finished combination: parameter values, then requested
//! metric columns, then the optional raw-output columns. The whole file is
//! rewritten under an exclusive lock after every finished experiment so an
//! interrupted sweep can be resumed.

use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use runexp_config::{HarnessSettings, OutputStream};

use crate::{runner::ExperimentOutput, sweep::Combination};

/// Column layout of a result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    params: Vec<String>,
    metrics: Vec<String>,
    outputs: Option<OutputStream>,
}

impl Layout {
    #[must_use]
    pub fn new(params: Vec<String>, settings: &HarnessSettings) -> Self {
        Self {
            params,
            metrics: settings.metrics.clone(),
            outputs: settings.preserve_output.then_some(settings.stream),
        }
    }

    /// Full header row, in file order.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        let mut header = self.params.clone();
        header.extend(self.metrics.iter().cloned());
        if let Some(stream) = self.outputs {
            header.extend(stream.columns().iter().map(|c| (*c).to_string()));
        }
        header
    }

    fn width(&self) -> usize {
        self.params.len()
            + self.metrics.len()
            + self.outputs.map_or(0, |s| s.columns().len())
    }
}

/// One row of the result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub combination: Combination,
    /// One value per requested metric; empty when not found.
    pub metrics: Vec<String>,
    /// One value per preserved output column.
    pub outputs: Vec<String>,
}

impl ResultRow {
    /// Build a row from a finished experiment.
    #[must_use]
    pub fn from_output(combination: Combination, output: &ExperimentOutput, layout: &Layout) -> Self {
        let metrics = layout
            .metrics
            .iter()
            .map(|m| output.metrics.column(m).unwrap_or_default().to_string())
            .collect();
        let outputs = match layout.outputs {
            None => Vec::new(),
            Some(OutputStream::Both) => vec![output.stdout.clone(), output.stderr.clone()],
            Some(OutputStream::Stdout) => vec![output.stdout.clone()],
            Some(OutputStream::Stderr) => vec![output.stderr.clone()],
        };
        Self {
            combination,
            metrics,
            outputs,
        }
    }

    fn to_record(&self) -> Vec<&str> {
        self.combination
            .iter()
            .map(|(_, v)| v)
            .chain(self.metrics.iter().map(String::as_str))
            .chain(self.outputs.iter().map(String::as_str))
            .collect()
    }

    fn from_record(record: &csv::StringRecord, layout: &Layout) -> Self {
        let n_params = layout.params.len();
        let n_metrics = layout.metrics.len();
        let combination = Combination::from_pairs(
            layout
                .params
                .iter()
                .zip(record.iter())
                .map(|(n, v)| (n.clone(), v.to_string()))
                .collect(),
        );
        Self {
            combination,
            metrics: record
                .iter()
                .skip(n_params)
                .take(n_metrics)
                .map(String::from)
                .collect(),
            outputs: record
                .iter()
                .skip(n_params + n_metrics)
                .map(String::from)
                .collect(),
        }
    }
}

/// Reads and rewrites a result file with a fixed layout.
pub struct ResultStore {
    path: PathBuf,
    layout: Layout,
}

impl ResultStore {
    #[must_use]
    pub fn new(path: impl AsRef<Path>, layout: Layout) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            layout,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Load existing rows. A missing or empty file has no rows; a file with a
    /// different header is rejected.
    pub fn load(&self) -> Result<Vec<ResultRow>, ResultsError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(|e| ResultsError::Io(self.path.clone(), e))?;
        file.lock_shared()
            .map_err(|e| ResultsError::Lock(self.path.clone(), e))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(&file);
        let mut records = reader.records();

        let header = match records.next() {
            None => return Ok(Vec::new()),
            Some(record) => record.map_err(|e| ResultsError::Csv(self.path.clone(), e))?,
        };
        let expected = self.layout.header();
        if header.iter().ne(expected.iter().map(String::as_str)) {
            return Err(ResultsError::Incompatible {
                path: self.path.clone(),
                expected: expected.join(","),
                found: header.iter().collect::<Vec<_>>().join(","),
            });
        }

        let mut rows = Vec::new();
        for (line, record) in records.enumerate() {
            let record = record.map_err(|e| ResultsError::Csv(self.path.clone(), e))?;
            if record.len() != self.layout.width() {
                tracing::warn!(
                    "{}: skipping row {} with {} columns (expected {})",
                    self.path.display(),
                    line + 2,
                    record.len(),
                    self.layout.width()
                );
                continue;
            }
            rows.push(ResultRow::from_record(&record, &self.layout));
        }

        file.unlock()
            .map_err(|e| ResultsError::Lock(self.path.clone(), e))?;

        Ok(rows)
    }

    /// Rewrite the file with `rows`, holding an exclusive lock throughout.
    pub fn save(&self, rows: &[ResultRow]) -> Result<(), ResultsError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ResultsError::Io(parent.to_path_buf(), e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| ResultsError::Io(self.path.clone(), e))?;
        file.lock_exclusive()
            .map_err(|e| ResultsError::Lock(self.path.clone(), e))?;

        file.set_len(0)
            .map_err(|e| ResultsError::Io(self.path.clone(), e))?;
        (&file)
            .seek(SeekFrom::Start(0))
            .map_err(|e| ResultsError::Io(self.path.clone(), e))?;

        let mut writer = csv::Writer::from_writer(&file);
        writer
            .write_record(self.layout.header())
            .map_err(|e| ResultsError::Csv(self.path.clone(), e))?;
        for row in rows {
            writer
                .write_record(row.to_record())
                .map_err(|e| ResultsError::Csv(self.path.clone(), e))?;
        }
        writer
            .flush()
            .map_err(|e| ResultsError::Io(self.path.clone(), e))?;
        drop(writer);

        file.unlock()
            .map_err(|e| ResultsError::Lock(self.path.clone(), e))?;

        Ok(())
    }
}

/// Errors that can occur reading or writing the result file.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("failed to read/write result file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to lock result file {0}: {1}")]
    Lock(PathBuf, std::io::Error),
    #[error("malformed result file {0}: {1}")]
    Csv(PathBuf, csv::Error),
    #[error(
        "existing result file {path} is incompatible (header mismatch)\n  expected: {expected}\n  found:    {found}\nuse a different output file or remove the existing one"
    )]
    Incompatible {
        path: PathBuf,
        expected: String,
        found: String,
    },
}
