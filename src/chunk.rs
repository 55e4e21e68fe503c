//! Sorted runs persisted on the file system.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::sort::SortError;
use crate::text::{self, IntReader, Malformed};

const RUN_PREFIX: &str = "chunk_";
const RUN_EXTENSION: &str = "txt";

/// Sorted run stored in a file, one value per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    path: PathBuf,
    len: u64,
}

impl Run {
    /// Persists already sorted `items` as run number `index` in `dir`.
    pub fn build(dir: &Path, index: usize, items: &[i64], buf_size: Option<usize>) -> Result<Self, SortError> {
        let path = dir.join(Self::file_name(index));
        let sink_error = |source| SortError::SinkUnwritable {
            path: path.clone(),
            source,
        };

        let file = fs::File::create(&path).map_err(sink_error)?;
        if let Err(err) = Self::dump(file, items, buf_size) {
            if let Err(rm_err) = fs::remove_file(&path) {
                log::warn!("cannot remove incomplete run {}: {}", path.display(), rm_err);
            }
            return Err(sink_error(err));
        }

        Ok(Run {
            path,
            len: items.len() as u64,
        })
    }

    fn dump(file: fs::File, items: &[i64], buf_size: Option<usize>) -> io::Result<()> {
        let mut run_writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        for &item in items {
            text::write_int(&mut run_writer, item)?;
        }
        run_writer.flush()
    }

    /// Returns the file name of run number `index`.
    pub fn file_name(index: usize) -> String {
        format!("{}{}.{}", RUN_PREFIX, index, RUN_EXTENSION)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of values stored in the run.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opens a sequential cursor over the run.
    pub fn open(&self, buf_size: Option<usize>) -> Result<RunReader, SortError> {
        let file = fs::File::open(&self.path).map_err(|source| SortError::RunUnreadable {
            path: self.path.clone(),
            source,
        })?;
        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        Ok(RunReader {
            path: self.path.clone(),
            inner: IntReader::new(reader, Malformed::Fail),
        })
    }
}

/// Sequential cursor over a run. The underlying file is closed when the reader is dropped.
pub struct RunReader {
    path: PathBuf,
    inner: IntReader<io::BufReader<fs::File>>,
}

impl Iterator for RunReader {
    type Item = Result<i64, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next()? {
            Ok(value) => Some(Ok(value)),
            Err(source) => Some(Err(SortError::RunUnreadable {
                path: self.path.clone(),
                source,
            })),
        }
    }
}

/// Runs produced by one chunking pass together with the directory they are stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSet {
    dir: PathBuf,
    runs: Vec<Run>,
}

impl RunSet {
    pub fn new(dir: PathBuf, runs: Vec<Run>) -> Self {
        RunSet { dir, runs }
    }

    /// Directory holding the runs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Runs in creation order.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Total number of values across all runs.
    pub fn total_len(&self) -> u64 {
        self.runs.iter().map(Run::len).sum()
    }

    /// Deletes every run file and then the directory. Failures are logged and otherwise ignored.
    pub fn remove(self) {
        for run in &self.runs {
            if let Err(err) = fs::remove_file(run.path()) {
                log::warn!("cannot remove run {}: {}", run.path().display(), err);
            }
        }

        if let Err(err) = fs::remove_dir(&self.dir) {
            log::warn!("cannot remove run directory {}: {}", self.dir.display(), err);
        }
    }
}

/// Counts run files currently stored in `dir`. A missing directory holds no runs.
pub fn count_persisted_runs(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };

    let mut count = 0;
    for entry in entries {
        let path = entry?.path();
        let is_run = path.is_file()
            && path.extension().map_or(false, |ext| ext == RUN_EXTENSION)
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with(RUN_PREFIX));
        if is_run {
            count += 1;
        }
    }

    Ok(count)
}
