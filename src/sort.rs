//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::buffer::ChunkBuffer;
use crate::chunk::{Run, RunSet};
use crate::heap;
use crate::merger::{self, MergeOptions, MergeSummary};
use crate::progress::{NoProgress, Progress};
use crate::text::{IntReader, Malformed};

/// Default number of values held in memory at once.
pub const DEFAULT_CHUNK_CAPACITY: usize = 10_000;
/// Default number of merged values between two progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 2_000;

const CHUNKING_LABEL: &str = "chunking";

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Input file can't be opened.
    SourceUnreadable { path: PathBuf, source: io::Error },
    /// Input data stream error.
    Input(io::Error),
    /// Run directory, run file or output file can't be created or written.
    SinkUnwritable { path: PathBuf, source: io::Error },
    /// Output stream can't be written.
    Output(io::Error),
    /// Merge requested with no runs to merge.
    EmptyRunSet,
    /// Run can't be opened or read back.
    RunUnreadable { path: PathBuf, source: io::Error },
    /// Chunk capacity must be positive.
    InvalidChunkCapacity,
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::SourceUnreadable { source, .. } => Some(source),
            SortError::Input(err) => Some(err),
            SortError::SinkUnwritable { source, .. } => Some(source),
            SortError::Output(err) => Some(err),
            SortError::RunUnreadable { source, .. } => Some(source),
            SortError::EmptyRunSet | SortError::InvalidChunkCapacity => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::SourceUnreadable { path, source } => {
                write!(f, "input {} can't be opened: {}", path.display(), source)
            }
            SortError::Input(err) => write!(f, "input data stream error: {}", err),
            SortError::SinkUnwritable { path, source } => {
                write!(f, "{} can't be written: {}", path.display(), source)
            }
            SortError::Output(err) => write!(f, "output can't be written: {}", err),
            SortError::EmptyRunSet => write!(f, "no runs to merge"),
            SortError::RunUnreadable { path, source } => {
                write!(f, "run {} can't be read: {}", path.display(), source)
            }
            SortError::InvalidChunkCapacity => write!(f, "chunk capacity must be greater than zero"),
        }
    }
}

/// Outcome of a complete file sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortReport {
    /// Number of values read from the input and written to the output.
    pub elements: u64,
    /// Number of runs the input was split into.
    pub runs: usize,
    /// Whether re-reading the output confirmed ascending order.
    pub sorted: bool,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
pub struct ExternalSorterBuilder {
    /// Maximum number of values held in memory at once.
    chunk_capacity: usize,
    /// Directory to be used to store runs.
    tmp_dir: Option<PathBuf>,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Keep run files after merging.
    keep_runs: bool,
    /// Number of merged values between progress reports.
    progress_interval: u64,
    /// Progress observer.
    progress: Box<dyn Progress>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        if self.chunk_capacity == 0 {
            return Err(SortError::InvalidChunkCapacity);
        }

        Ok(ExternalSorter {
            chunk_capacity: self.chunk_capacity,
            tmp_dir: self.tmp_dir,
            rw_buf_size: self.rw_buf_size,
            keep_runs: self.keep_runs,
            progress_interval: self.progress_interval.max(1),
            progress: self.progress,
        })
    }

    /// Sets maximum number of values held in memory at once.
    pub fn with_chunk_capacity(mut self, chunk_capacity: usize) -> ExternalSorterBuilder {
        self.chunk_capacity = chunk_capacity;
        self
    }

    /// Sets directory to be used to store runs. The directory is created if it doesn't exist.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        self
    }

    /// Sets run read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        self
    }

    /// Keeps run files on disk after they have been merged.
    pub fn with_keep_runs(mut self, keep_runs: bool) -> ExternalSorterBuilder {
        self.keep_runs = keep_runs;
        self
    }

    /// Sets progress observer.
    pub fn with_progress(mut self, progress: impl Progress + 'static) -> ExternalSorterBuilder {
        self.progress = Box::new(progress);
        self
    }

    /// Sets number of merged values between two progress reports.
    pub fn with_progress_interval(mut self, interval: u64) -> ExternalSorterBuilder {
        self.progress_interval = interval;
        self
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            tmp_dir: None,
            rw_buf_size: None,
            keep_runs: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress: Box::new(NoProgress),
        }
    }
}

/// External sorter.
///
/// Sorting is done in two phases: [`produce_runs`](ExternalSorter::produce_runs) splits the input into sorted runs
/// stored on disk, [`merge`](ExternalSorter::merge) merges them into a single ascending output.
/// [`sort_file`](ExternalSorter::sort_file) runs both phases and verifies the result.
pub struct ExternalSorter {
    chunk_capacity: usize,
    tmp_dir: Option<PathBuf>,
    rw_buf_size: Option<usize>,
    keep_runs: bool,
    progress_interval: u64,
    progress: Box<dyn Progress>,
}

impl ExternalSorter {
    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Splits the input into sorted runs.
    /// Returns the runs in creation order; an empty input produces an empty [`RunSet`].
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    pub fn produce_runs<I>(&self, input: I) -> Result<RunSet, SortError>
    where
        I: IntoIterator<Item = io::Result<i64>>,
    {
        let input = input.into_iter();
        let total = input.size_hint().1;

        self.produce(input, |_, consumed| match total {
            Some(total) => consumed as f64 / total.max(1) as f64,
            None => 0.0,
        })
    }

    /// Splits the content of a whitespace-separated integer file into sorted runs.
    /// A malformed token ends the input.
    pub fn produce_runs_from_file(&self, path: &Path) -> Result<RunSet, SortError> {
        let source_error = |source| SortError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let file = fs::File::open(path).map_err(source_error)?;
        let file_len = file.metadata().map_err(source_error)?.len();
        let reader = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        log::info!("chunking {}", path.display());
        self.produce(IntReader::new(reader, Malformed::Stop), |reader, _| {
            reader.bytes_read() as f64 / file_len.max(1) as f64
        })
    }

    fn produce<I, P>(&self, input: I, estimate: P) -> Result<RunSet, SortError>
    where
        I: Iterator<Item = io::Result<i64>>,
        P: Fn(&I, u64) -> f64,
    {
        let dir = self.init_run_directory()?;
        let mut runs = Vec::new();

        match self.fill_runs(&dir, input, estimate, &mut runs) {
            Ok(consumed) => {
                log::info!("created {} sorted runs from {} values in {}", runs.len(), consumed, dir.display());
                Ok(RunSet::new(dir, runs))
            }
            Err(err) => {
                log::debug!("chunking failed, removing {} partial runs from {}", runs.len(), dir.display());
                RunSet::new(dir, runs).remove();
                Err(err)
            }
        }
    }

    /// Reads the whole input, pushing every persisted run to `runs`. Returns the number of values read.
    fn fill_runs<I, P>(&self, dir: &Path, mut input: I, estimate: P, runs: &mut Vec<Run>) -> Result<u64, SortError>
    where
        I: Iterator<Item = io::Result<i64>>,
        P: Fn(&I, u64) -> f64,
    {
        let mut chunk_buf = ChunkBuffer::new(self.chunk_capacity);
        let mut consumed = 0u64;

        while let Some(item) = input.next() {
            chunk_buf.push(item.map_err(SortError::Input)?);
            consumed += 1;

            if chunk_buf.is_full() {
                runs.push(self.flush_chunk(dir, runs.len(), &mut chunk_buf)?);
                self.progress.update(estimate(&input, consumed).min(1.0), CHUNKING_LABEL);
            }
        }

        if !chunk_buf.is_empty() {
            runs.push(self.flush_chunk(dir, runs.len(), &mut chunk_buf)?);
        }
        self.progress.update(1.0, CHUNKING_LABEL);

        Ok(consumed)
    }

    /// Sorts the buffered values, persists them as run number `index` and releases the buffer memory.
    fn flush_chunk(&self, dir: &Path, index: usize, chunk_buf: &mut ChunkBuffer<i64>) -> Result<Run, SortError> {
        log::debug!("sorting chunk {} ({} values)", index, chunk_buf.len());
        heap::heap_sort(chunk_buf.as_mut_slice());

        let run = Run::build(dir, index, chunk_buf.as_slice(), self.rw_buf_size)?;
        log::debug!("saved run {}", run.path().display());

        chunk_buf.release();

        Ok(run)
    }

    fn init_run_directory(&self) -> Result<PathBuf, SortError> {
        let dir = match &self.tmp_dir {
            Some(tmp_dir) => {
                fs::create_dir_all(tmp_dir).map_err(|source| SortError::SinkUnwritable {
                    path: tmp_dir.clone(),
                    source,
                })?;
                tmp_dir.clone()
            }
            None => tempfile::Builder::new()
                .prefix("ext-int-sort")
                .tempdir()
                .map_err(|source| SortError::SinkUnwritable {
                    path: std::env::temp_dir(),
                    source,
                })?
                .into_path(),
        };

        log::info!("using {} as a run directory", dir.display());

        Ok(dir)
    }

    /// Merges runs into `output`. Runs are removed afterwards unless the sorter keeps them.
    pub fn merge<W: Write>(&self, runs: RunSet, output: W) -> Result<MergeSummary, SortError> {
        let options = MergeOptions {
            rw_buf_size: self.rw_buf_size,
            keep_runs: self.keep_runs,
            progress_interval: self.progress_interval,
        };

        merger::merge(runs, output, &options, self.progress.as_ref())
    }

    /// Merges runs into the `output` file. An incomplete output is removed if the merge fails.
    pub fn merge_into_file(&self, runs: RunSet, output: &Path) -> Result<MergeSummary, SortError> {
        let sink_error = |source| SortError::SinkUnwritable {
            path: output.to_path_buf(),
            source,
        };
        let file = fs::File::create(output).map_err(sink_error)?;
        let mut output_writer = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        let merged = self
            .merge(runs, &mut output_writer)
            .and_then(|summary| output_writer.flush().map(|_| summary).map_err(SortError::Output));
        drop(output_writer);

        merged.map_err(|err| {
            if let Err(rm_err) = fs::remove_file(output) {
                log::warn!("cannot remove incomplete output {}: {}", output.display(), rm_err);
            }
            match err {
                SortError::Output(source) => sink_error(source),
                err => err,
            }
        })
    }

    /// Sorts the integers of the `input` file into the `output` file and verifies the result.
    /// Any failure aborts the whole pipeline.
    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortReport, SortError> {
        let runs = self.produce_runs_from_file(input)?;
        if runs.is_empty() {
            runs.remove();
            return Err(SortError::EmptyRunSet);
        }
        let run_count = runs.len();

        let summary = self.merge_into_file(runs, output)?;

        log::info!("verifying {}", output.display());
        let sorted = merger::verify_file(output)?;

        Ok(SortReport {
            elements: summary.elements,
            runs: run_count,
            sorted,
        })
    }
}
