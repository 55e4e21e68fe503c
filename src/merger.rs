//! K-way merge of sorted runs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use crate::chunk::RunSet;
use crate::progress::Progress;
use crate::sort::SortError;
use crate::text::{self, IntReader, Malformed};

const MERGING_LABEL: &str = "merging";

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of inputs.
///
/// The heap (the merge frontier) holds at most one item per input: the smallest item not yet yielded from it.
/// Ties between inputs are broken by input index.
pub struct BinaryHeapMerger<T, I>
where
    T: Ord,
{
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    frontier: BinaryHeap<Reverse<(T, usize)>>,
    inputs: Vec<I>,
    failed: bool,
}

impl<T, E, I> BinaryHeapMerger<T, I>
where
    T: Ord,
    I: Iterator<Item = Result<T, E>>,
{
    /// Creates an instance of a binary heap merger and seeds the frontier with the first item of every input.
    /// Input items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `inputs` - Inputs to be merged in a single sorted one
    pub fn new<C>(inputs: C) -> Result<Self, E>
    where
        C: IntoIterator<Item = I>,
    {
        let mut inputs = Vec::from_iter(inputs);
        let mut frontier = BinaryHeap::with_capacity(inputs.len());

        for (idx, input) in inputs.iter_mut().enumerate() {
            if let Some(item) = input.next() {
                frontier.push(Reverse((item?, idx)));
            }
        }

        Ok(BinaryHeapMerger {
            frontier,
            inputs,
            failed: false,
        })
    }

    /// Number of inputs that still have items.
    pub fn open_inputs(&self) -> usize {
        self.frontier.len()
    }
}

impl<T, E, I> Iterator for BinaryHeapMerger<T, I>
where
    T: Ord,
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order. Iteration ends after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let Reverse((result, idx)) = self.frontier.pop()?;
        match self.inputs[idx].next() {
            Some(Ok(item)) => self.frontier.push(Reverse((item, idx))),
            Some(Err(err)) => {
                self.failed = true;
                return Some(Err(err));
            }
            None => {}
        }

        Some(Ok(result))
    }
}

/// Merge settings.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Run file read buffer size.
    pub rw_buf_size: Option<usize>,
    /// Keep run files after a successful merge.
    pub keep_runs: bool,
    /// Number of merged values between progress reports.
    pub progress_interval: u64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            rw_buf_size: None,
            keep_runs: false,
            progress_interval: crate::sort::DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Merge statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of values written to the output.
    pub elements: u64,
    /// Number of merged runs.
    pub runs: usize,
}

/// Merges sorted runs into `output`, one value per line.
///
/// Fails with [`SortError::EmptyRunSet`] without writing anything if there are no runs. Any run that can't be
/// opened or read fails the merge, and so does a failing `output` ([`SortError::Output`]). After a successful
/// merge the run files and their directory are removed (unless `keep_runs` is set); removal failures are only
/// logged.
pub fn merge<W: Write>(
    runs: RunSet,
    mut output: W,
    options: &MergeOptions,
    progress: &dyn Progress,
) -> Result<MergeSummary, SortError> {
    if runs.is_empty() {
        log::error!("no runs to merge");
        return Err(SortError::EmptyRunSet);
    }

    let expected = runs.total_len();
    log::info!("merging {} runs ({} values)", runs.len(), expected);

    let readers = runs
        .runs()
        .iter()
        .map(|run| run.open(options.rw_buf_size))
        .collect::<Result<Vec<_>, _>>()?;
    let merger = BinaryHeapMerger::new(readers)?;
    log::debug!("frontier seeded from {} non-empty runs", merger.open_inputs());

    let interval = options.progress_interval.max(1);
    let mut written = 0u64;
    for item in merger {
        text::write_int(&mut output, item?).map_err(SortError::Output)?;

        written += 1;
        if written % interval == 0 {
            progress.update(written as f64 / expected.max(1) as f64, MERGING_LABEL);
        }
    }

    output.flush().map_err(SortError::Output)?;
    progress.update(1.0, MERGING_LABEL);

    if written != expected {
        return Err(SortError::RunUnreadable {
            path: runs.dir().to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("runs hold {} values but {} were merged", expected, written),
            ),
        });
    }

    let summary = MergeSummary {
        elements: written,
        runs: runs.len(),
    };
    log::info!("merge complete ({} values)", written);

    if options.keep_runs {
        log::info!("keeping runs in {}", runs.dir().display());
    } else {
        log::debug!("removing runs from {}", runs.dir().display());
        runs.remove();
    }

    Ok(summary)
}

/// Checks that the values read from `source` never descend. Reading stops at the first malformed token.
pub fn verify<R: BufRead>(source: R) -> io::Result<bool> {
    let mut values = IntReader::new(source, Malformed::Stop);

    let mut prev = match values.next() {
        Some(value) => value?,
        None => return Ok(true),
    };
    for value in values {
        let value = value?;
        if value < prev {
            return Ok(false);
        }
        prev = value;
    }

    Ok(true)
}

/// Checks that the values stored in the file at `path` never descend.
pub fn verify_file(path: &Path) -> Result<bool, SortError> {
    let source_error = |source| SortError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::open(path).map_err(source_error)?;
    verify(io::BufReader::new(file)).map_err(source_error)
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::{self, ErrorKind};

    use rstest::*;

    use super::{merge, verify, verify_file, BinaryHeapMerger, MergeOptions};
    use crate::chunk::{Run, RunSet};
    use crate::progress::NoProgress;
    use crate::sort::SortError;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    fn run_set(dir: &std::path::Path, runs: &[Vec<i64>]) -> RunSet {
        fs::create_dir_all(dir).unwrap();
        let runs = runs
            .iter()
            .enumerate()
            .map(|(index, values)| Run::build(dir, index, values, None).unwrap())
            .collect();
        RunSet::new(dir.to_path_buf(), runs)
    }

    #[rstest]
    #[case(
        vec![],
        vec![],
    )]
    #[case(
        vec![
            vec![],
            vec![]
        ],
        vec![],
    )]
    #[case(
        vec![
            vec![Ok(4), Ok(5), Ok(7)],
            vec![Ok(1), Ok(6)],
            vec![Ok(3)],
            vec![],
        ],
        vec![Ok(1), Ok(3), Ok(4), Ok(5), Ok(6), Ok(7)],
    )]
    #[case(
        vec![
            vec![Ok(2), Ok(4)],
            vec![Ok(2), Ok(4)],
        ],
        vec![Ok(2), Ok(2), Ok(4), Ok(4)],
    )]
    #[case(
        vec![
            vec![Ok(3), Err(io::Error::new(ErrorKind::Other, "test error"))],
            vec![Ok(1), Ok(2)],
        ],
        vec![
            Ok(1),
            Ok(2),
            Err(io::Error::new(ErrorKind::Other, "test error")),
        ],
    )]
    fn test_merger(
        #[case] inputs: Vec<Vec<Result<i32, io::Error>>>,
        #[case] expected_result: Vec<Result<i32, io::Error>>,
    ) {
        let merger = BinaryHeapMerger::new(inputs.into_iter().map(|input| input.into_iter())).unwrap();
        let actual_result: Vec<Result<i32, io::Error>> = merger.collect();
        assert!(
            compare_vectors_of_result(&actual_result, &expected_result),
            "actual={:?}, expected={:?}",
            actual_result,
            expected_result
        );
    }

    #[test]
    fn test_merger_seed_error() {
        let inputs = vec![
            vec![Ok(1)].into_iter(),
            vec![Err(io::Error::new(ErrorKind::Other, "test error"))].into_iter(),
        ];

        let result = BinaryHeapMerger::<i32, _>::new(inputs);

        assert!(result.is_err());
    }

    fn compare_vectors_of_result(actual: &[Result<i32, io::Error>], expected: &[Result<i32, io::Error>]) -> bool {
        actual.len() == expected.len()
            && actual
                .iter()
                .zip(expected)
                .all(|(actual_result, expected_result)| match (actual_result, expected_result) {
                    (Ok(actual_result), Ok(expected_result)) => actual_result == expected_result,
                    (Err(actual_err), Err(expected_err)) => actual_err.to_string() == expected_err.to_string(),
                    _ => false,
                })
    }

    #[rstest]
    fn test_merge_runs(tmp_dir: tempfile::TempDir) {
        let dir = tmp_dir.path().join("runs");
        let runs = run_set(&dir, &[vec![3, 5, 8], vec![1, 2, 9], vec![-4]]);

        let mut output = Vec::new();
        let summary = merge(runs, &mut output, &MergeOptions::default(), &NoProgress).unwrap();

        assert_eq!(summary.elements, 7);
        assert_eq!(summary.runs, 3);
        assert_eq!(String::from_utf8(output).unwrap(), "-4\n1\n2\n3\n5\n8\n9\n");
        assert!(!dir.exists());
    }

    #[rstest]
    fn test_merge_keeps_runs(tmp_dir: tempfile::TempDir) {
        let dir = tmp_dir.path().join("runs");
        let runs = run_set(&dir, &[vec![1], vec![0]]);
        let options = MergeOptions {
            keep_runs: true,
            ..MergeOptions::default()
        };

        merge(runs, io::sink(), &options, &NoProgress).unwrap();

        assert!(dir.join("chunk_0.txt").exists());
        assert!(dir.join("chunk_1.txt").exists());
    }

    #[rstest]
    fn test_merge_empty_run_set(tmp_dir: tempfile::TempDir) {
        let runs = RunSet::new(tmp_dir.path().to_path_buf(), Vec::new());

        let mut output = Vec::new();
        let result = merge(runs, &mut output, &MergeOptions::default(), &NoProgress);

        assert!(matches!(result, Err(SortError::EmptyRunSet)));
        assert!(output.is_empty());
    }

    #[rstest]
    fn test_merge_missing_run(tmp_dir: tempfile::TempDir) {
        let dir = tmp_dir.path().join("runs");
        let runs = run_set(&dir, &[vec![1, 2], vec![3]]);
        fs::remove_file(dir.join("chunk_1.txt")).unwrap();

        let mut output = Vec::new();
        let result = merge(runs, &mut output, &MergeOptions::default(), &NoProgress);

        assert!(matches!(result, Err(SortError::RunUnreadable { .. })));
        assert!(output.is_empty());
        assert!(dir.join("chunk_0.txt").exists());
    }

    #[rstest]
    fn test_merge_truncated_run(tmp_dir: tempfile::TempDir) {
        let dir = tmp_dir.path().join("runs");
        let runs = run_set(&dir, &[vec![1, 2, 3], vec![4]]);
        fs::write(dir.join("chunk_0.txt"), "1\n2\n").unwrap();

        let result = merge(runs, io::sink(), &MergeOptions::default(), &NoProgress);

        assert!(matches!(result, Err(SortError::RunUnreadable { .. })));
    }

    #[rstest]
    fn test_merge_progress(tmp_dir: tempfile::TempDir) {
        let dir = tmp_dir.path().join("runs");
        let runs = run_set(&dir, &[vec![1, 3], vec![2, 4]]);
        let options = MergeOptions {
            progress_interval: 2,
            ..MergeOptions::default()
        };
        let seen = std::cell::RefCell::new(Vec::new());
        let observer = |fraction: f64, label: &str| seen.borrow_mut().push((fraction, label.to_string()));

        merge(runs, io::sink(), &options, &observer).unwrap();

        assert_eq!(
            seen.into_inner(),
            vec![
                (0.5, "merging".to_string()),
                (1.0, "merging".to_string()),
                (1.0, "merging".to_string()),
            ]
        );
    }

    #[rstest]
    #[case("", true)]
    #[case("42", true)]
    #[case("1 2 2 3\n", true)]
    #[case("-5\n-5\n0\n", true)]
    #[case("1 3 2", false)]
    #[case("1 2 x 0", true)]
    fn test_verify(#[case] output: &str, #[case] expected: bool) {
        assert_eq!(verify(output.as_bytes()).unwrap(), expected);
        assert_eq!(verify(output.as_bytes()).unwrap(), expected);
    }

    #[rstest]
    fn test_verify_file(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("output.txt");
        fs::write(&path, "1\n2\n0\n").unwrap();

        assert_eq!(verify_file(&path).unwrap(), false);
        assert!(matches!(
            verify_file(&tmp_dir.path().join("missing.txt")),
            Err(SortError::SourceUnreadable { .. })
        ));
    }
}
