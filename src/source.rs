//! Tabular record source.
//!
//! Reads a CSV file with a header row into [`Record`]s. Header cells are
//! case-normalized; ragged rows produce records without the missing fields.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::{
    observability::{log_error, log_warn},
    record::{normalize_field_name, Record},
};

/// Default number of rows cached for the streaming modes.
pub const DEFAULT_SAMPLE_ROWS: usize = 5000;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open record source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("cannot read header of {path}: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("record source {path} produced no rows")]
    Empty { path: PathBuf },
    #[error("record source failed after {rows} rows: {source}")]
    Read {
        rows: u64,
        #[source]
        source: csv::Error,
    },
}

/// Streaming CSV reader yielding one [`Record`] per data row.
///
/// An I/O failure mid-file is yielded once as [`SourceError::Read`] and ends
/// the iteration; undecodable rows are skipped and counted.
pub struct CsvSource<R> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    row: StringRecord,
    read: u64,
    skipped: usize,
    finished: bool,
}

impl CsvSource<File> {
    /// Opens `path` and reads its header row. Failure here is fatal for a run.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let reader = builder()
            .from_path(path)
            .map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::with_reader(reader).map_err(|source| SourceError::Header {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl<R: io::Read> CsvSource<R> {
    /// Wraps an arbitrary reader, e.g. an in-memory buffer.
    pub fn from_reader(input: R) -> Result<Self, csv::Error> {
        Self::with_reader(builder().from_reader(input))
    }

    fn with_reader(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let headers = reader
            .headers()?
            .iter()
            .map(normalize_field_name)
            .collect();
        Ok(Self {
            reader,
            headers,
            row: StringRecord::new(),
            read: 0,
            skipped: 0,
            finished: false,
        })
    }

    /// Normalized header names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows dropped because the CSV layer could not decode them.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn to_record(&self) -> Record {
        self.headers
            .iter()
            .zip(self.row.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }
}

impl<R: io::Read> Iterator for CsvSource<R> {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.reader.read_record(&mut self.row) {
                Ok(true) => {
                    self.read += 1;
                    return Some(Ok(self.to_record()));
                }
                Ok(false) => self.finished = true,
                Err(err) if err.is_io_error() => {
                    log_error!(
                        component = "source",
                        event = "source_read_failed",
                        rows = self.read,
                        error = %err,
                    );
                    self.finished = true;
                    return Some(Err(SourceError::Read {
                        rows: self.read,
                        source: err,
                    }));
                }
                Err(err) => {
                    self.skipped += 1;
                    log_warn!(
                        component = "source",
                        event = "row_skipped",
                        error = %err,
                    );
                }
            }
        }
        None
    }
}

/// Loads up to `max_rows` records into memory for repeated sampling.
pub fn load_sample(path: impl AsRef<Path>, max_rows: usize) -> Result<Vec<Record>, SourceError> {
    let path = path.as_ref();
    let rows = CsvSource::open(path)?
        .take(max_rows)
        .collect::<Result<Vec<Record>, _>>()?;
    if rows.is_empty() {
        return Err(SourceError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}

fn builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.flexible(true).trim(Trim::Headers);
    builder
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::record::fields;

    const TRIPS: &str = "VendorID,Trip_Distance,PULocationID\n\
                         1,2.5,161\n\
                         2,0.9\n\
                         1,,48\n";

    #[test]
    fn headers_are_case_normalized() {
        let source = CsvSource::from_reader(TRIPS.as_bytes()).expect("source");
        assert_eq!(
            source.headers(),
            &["vendorid", "trip_distance", "pulocationid"]
        );
    }

    #[test]
    fn ragged_rows_leave_fields_absent() {
        let rows: Vec<Record> = CsvSource::from_reader(TRIPS.as_bytes())
            .expect("source")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][fields::PU_LOCATION_ID], "161");
        assert!(!rows[1].contains_key(fields::PU_LOCATION_ID));
        assert_eq!(rows[2][fields::TRIP_DISTANCE], "");
    }

    /// Serves `data` once, then fails every read.
    struct FailAfter<'a> {
        data: &'a [u8],
    }

    impl io::Read for FailAfter<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::Other, "device went away"));
            }
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn read_failure_is_yielded_once() {
        let mut source = CsvSource::from_reader(FailAfter {
            data: b"vendorid,trip_distance\n1,2.5\n2,0.9\n",
        })
        .expect("source");
        assert!(matches!(source.next(), Some(Ok(_))));
        assert!(matches!(source.next(), Some(Ok(_))));
        assert!(matches!(
            source.next(),
            Some(Err(SourceError::Read { rows: 2, .. }))
        ));
        assert!(source.next().is_none());
    }

    #[test]
    fn sample_is_bounded_and_rejects_empty_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trips.csv");
        std::fs::write(&path, TRIPS).expect("write csv");
        assert_eq!(load_sample(&path, 2).expect("sample").len(), 2);

        let empty = dir.path().join("empty.csv");
        let mut file = File::create(&empty).expect("create");
        writeln!(file, "vendorid,trip_distance").expect("header");
        assert!(matches!(
            load_sample(&empty, 10),
            Err(SourceError::Empty { .. })
        ));

        assert!(matches!(
            CsvSource::open(dir.path().join("missing.csv")),
            Err(SourceError::Open { .. })
        ));
    }
}
