//! Debug summary of a result CSV.

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Every row of a CSV file, read without header interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSummary {
    header: Vec<String>,
    /// Header re-encoded as CSV, so quoted fields keep their quotes.
    header_line: String,
    data: Vec<Vec<String>>,
}

impl CsvSummary {
    /// Rows including the header.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.data.len() + 1
    }

    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    #[must_use]
    pub fn data_rows(&self) -> &[Vec<String>] {
        &self.data
    }
}

/// Read `path` and check that every data row carries GPU and BATCH columns.
pub fn inspect(path: &Path) -> Result<CsvSummary, InspectError> {
    let file = std::fs::File::open(path).map_err(|e| InspectError::Open(path.to_path_buf(), e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| InspectError::Csv(path.to_path_buf(), e))?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let mut rows = rows.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| InspectError::Empty(path.to_path_buf()))?;
    let data: Vec<Vec<String>> = rows.collect();
    let header_line =
        encode_record(&header).map_err(|e| InspectError::Csv(path.to_path_buf(), e))?;

    if let Some((idx, row)) = data.iter().enumerate().find(|(_, r)| r.len() < 2) {
        return Err(InspectError::ShortRow {
            path: path.to_path_buf(),
            row: idx + 1,
            columns: row.len(),
        });
    }

    tracing::debug!("{}: {} data rows", path.display(), data.len());
    Ok(CsvSummary {
        header,
        header_line,
        data,
    })
}

fn encode_record(fields: &[String]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string())
}

impl fmt::Display for CsvSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total CSV rows: {}", self.total_rows())?;
        writeln!(f, "Header: {}", self.header_line)?;
        write!(f, "Data rows: {}", self.data.len())?;
        // Blank lines never reach here, the reader drops them
        for (i, row) in self.data.iter().enumerate() {
            write!(f, "\nRow {}: GPU={}, BATCH={}", i + 1, row[0], row[1])?;
        }
        Ok(())
    }
}

/// Errors that can occur when inspecting a CSV file.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("failed to open {0}: {1}")]
    Open(PathBuf, std::io::Error),
    #[error("malformed CSV {0}: {1}")]
    Csv(PathBuf, csv::Error),
    #[error("{0} is empty")]
    Empty(PathBuf),
    #[error("{path}: row {row} has {columns} column(s), expected at least GPU and BATCH")]
    ShortRow {
        path: PathBuf,
        row: usize,
        columns: usize,
    },
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn write(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_concurrent_fail.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_summary() {
        let (_dir, path) = write("GPU,BATCH,accuracy\n1,32,0.9\n2,64,0.8\n");
        let summary = inspect(&path).unwrap();
        assert_eq!(summary.total_rows(), 3);
        assert_eq!(summary.header(), ["GPU", "BATCH", "accuracy"]);
        assert_eq!(
            summary.to_string(),
            "Total CSV rows: 3\n\
             Header: GPU,BATCH,accuracy\n\
             Data rows: 2\n\
             Row 1: GPU=1, BATCH=32\n\
             Row 2: GPU=2, BATCH=64"
        );
    }

    #[test]
    fn test_header_only() {
        let (_dir, path) = write("GPU,BATCH\n");
        let summary = inspect(&path).unwrap();
        assert_eq!(summary.data_rows().len(), 0);
        assert_eq!(
            summary.to_string(),
            "Total CSV rows: 1\nHeader: GPU,BATCH\nData rows: 0"
        );
    }

    #[test]
    fn test_quoted_multiline_field_is_one_row() {
        let (_dir, path) = write("GPU,BATCH,stdout\n1,32,\"line one\nline two\"\n");
        let summary = inspect(&path).unwrap();
        assert_eq!(summary.total_rows(), 2);
        assert_eq!(summary.data_rows()[0][2], "line one\nline two");
    }

    #[test]
    fn test_rows_of_empty_fields_are_listed() {
        let (_dir, path) = write("GPU,BATCH\n,\n\n4,8\n");
        assert_eq!(
            inspect(&path).unwrap().to_string(),
            "Total CSV rows: 3\n\
             Header: GPU,BATCH\n\
             Data rows: 2\n\
             Row 1: GPU=, BATCH=\n\
             Row 2: GPU=4, BATCH=8"
        );
    }

    #[test]
    fn test_quoted_header_is_kept() {
        let (_dir, path) = write("\"a,b\",c\n1,2\n");
        let summary = inspect(&path).unwrap();
        assert_eq!(summary.header(), ["a,b", "c"]);
        assert!(summary.to_string().contains("Header: \"a,b\",c\n"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            inspect(Path::new("/nonexistent/test.csv")),
            Err(InspectError::Open(..))
        ));

        let (_dir, path) = write("");
        assert!(matches!(inspect(&path), Err(InspectError::Empty(_))));

        let (_dir, path) = write("GPU,BATCH\n1,2\n3\n");
        assert!(matches!(
            inspect(&path),
            Err(InspectError::ShortRow {
                row: 2,
                columns: 1,
                ..
            })
        ));
    }
}
