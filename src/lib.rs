//! `ext-int-sort` is an external merge sort for integer streams.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass it sorts chunks of data that each fit in RAM, during the second pass it merges the sorted chunks
//! together. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Bounded memory:**
//!   at most `chunk_capacity` values are held in memory while chunking; the chunk buffer allocation is released
//!   after every flush.
//! * **Heap sorted runs:**
//!   every chunk is sorted in place with a binary max-heap sort and stored as a plain text run file.
//! * **K-way merge:**
//!   runs are merged through a min-heap frontier holding one value per run, in *O(n log k)* comparisons.
//! * **No silent data loss:**
//!   a run that can't be written or read back fails the whole sort.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ext_int_sort::{ExternalSorterBuilder, LogProgress};
//!
//! fn main() {
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_chunk_capacity(10_000)
//!         .with_tmp_dir(Path::new("./temp_chunks"))
//!         .with_progress(LogProgress::default())
//!         .build()
//!         .unwrap();
//!
//!     let report = sorter.sort_file(Path::new("input.txt"), Path::new("output.txt")).unwrap();
//!     assert!(report.sorted);
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod heap;
pub mod merger;
pub mod progress;
pub mod sort;
pub mod text;

pub use buffer::ChunkBuffer;
pub use chunk::{count_persisted_runs, Run, RunReader, RunSet};
pub use heap::{heap_sort, is_sorted};
pub use merger::{merge, verify, verify_file, BinaryHeapMerger, MergeOptions, MergeSummary};
pub use progress::{LogProgress, NoProgress, Progress};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortReport};
