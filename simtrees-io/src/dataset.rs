//! Partitioned datasets: many fragment files presented as one column store.
//!
//! A logical dataset with directory `P` and stem `S` is stored either as a
//! single file `P/S.hdf5` or as numbered fragments `P/S.0.hdf5`,
//! `P/S.1.hdf5`, … whose rows concatenate in order. [`PartitionedDataset`]
//! hides the split: callers read a named column, optionally restricted to a
//! global [`RowInterval`], and get back one contiguous [`Column`].
//!
//! Reads can be spread over a private worker pool. A failure inside any
//! worker demotes the dataset to serial reads for the rest of its lifetime
//! and the failed call is retried once serially.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::column::{AttributeValue, Column, ColumnKind};
use crate::error::{DatasetError, Result};
use crate::storage::FragmentStorage;

/// File extension used when none is given.
pub const DEFAULT_EXTENSION: &str = "hdf5";

/// Half-open interval `[start, end)` over the logical row space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowInterval {
    start: usize,
    end: usize,
}

impl RowInterval {
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(DatasetError::invalid_interval(format!(
                "Interval start {} is past its end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Fragment-local rows of a fragment spanning global rows
    /// `[offset, offset + rows)` that fall inside this interval.
    fn overlap(&self, offset: usize, rows: usize) -> Option<Range<usize>> {
        let lo = self.start.max(offset);
        let hi = self.end.min(offset + rows);
        (lo < hi).then(|| lo - offset..hi - offset)
    }
}

impl fmt::Display for RowInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One unit of read work: a row range inside one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReadTask {
    fragment: usize,
    rows: Range<usize>,
}

/// Per-call read plan computed from fragment shapes.
#[derive(Debug)]
struct ReadPlan {
    kind: ColumnKind,
    width: usize,
    tasks: Vec<ReadTask>,
}

/// A logical row-indexed dataset split across fragment files.
#[derive(Debug)]
pub struct PartitionedDataset {
    storage: Arc<dyn FragmentStorage>,
    dir: PathBuf,
    stem: String,
    fragments: Vec<PathBuf>,
    /// Worker count; drops to 1 after a failed parallel read
    workers: AtomicUsize,
}

impl PartitionedDataset {
    /// Discover the fragments of `<dir>/<stem>` with the default extension.
    pub fn open(
        storage: Arc<dyn FragmentStorage>,
        dir: impl AsRef<Path>,
        stem: &str,
    ) -> Result<Self> {
        Self::open_with_extension(storage, dir, stem, DEFAULT_EXTENSION)
    }

    /// Discover fragments: the monolithic `<stem>.<ext>` if present, else the
    /// numbered run `<stem>.0.<ext>`, `<stem>.1.<ext>`, … up to the first gap.
    pub fn open_with_extension(
        storage: Arc<dyn FragmentStorage>,
        dir: impl AsRef<Path>,
        stem: &str,
        extension: &str,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let fragments = discover_fragments(storage.as_ref(), &dir, stem, extension)?;
        tracing::debug!(
            dir = %dir.display(),
            stem,
            fragments = fragments.len(),
            "Discovered dataset fragments"
        );
        Ok(Self {
            storage,
            dir,
            stem: stem.to_string(),
            fragments,
            workers: AtomicUsize::new(1),
        })
    }

    /// Set the worker count for parallel reads; `0` selects one less than the
    /// available cores.
    pub fn with_workers(self, workers: usize) -> Self {
        self.workers.store(resolve_workers(workers), Ordering::SeqCst);
        self
    }

    /// Current worker count (1 means serial).
    pub fn workers(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    /// Fragment paths in row order.
    pub fn fragments(&self) -> &[PathBuf] {
        &self.fragments
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Total logical rows of `column` across all fragments holding it.
    pub fn row_count(&self, column: &str) -> Result<usize> {
        let mut total = 0;
        let mut found = false;
        for path in &self.fragments {
            if let Some(info) = self.storage.column_info(path, column)? {
                total += info.rows;
                found = true;
            }
        }
        if !found {
            return Err(self.missing_column(column));
        }
        Ok(total)
    }

    /// Read `column`, optionally restricted to a global row interval.
    pub fn read(&self, column: &str, interval: Option<RowInterval>) -> Result<Column> {
        let plan = self.plan(column, interval)?;
        let workers = self.workers();

        let parts = if workers > 1 && !plan.tasks.is_empty() {
            match self.read_parallel(column, &plan.tasks, workers) {
                Ok(parts) => parts,
                Err(err) => {
                    tracing::warn!(
                        column,
                        stem = %self.stem,
                        workers,
                        error = %err,
                        "Parallel read failed, falling back to serial reads"
                    );
                    self.workers.store(1, Ordering::SeqCst);
                    self.read_serial(column, &plan.tasks)?
                }
            }
        } else {
            self.read_serial(column, &plan.tasks)?
        };

        Column::concat(plan.kind, plan.width, parts)
    }

    /// Value of attribute `name` on `object` in the first fragment that has it.
    pub fn read_attribute(&self, object: &str, name: &str) -> Result<AttributeValue> {
        for path in &self.fragments {
            if let Some(value) = self.storage.read_attribute(path, object, name)? {
                return Ok(value);
            }
        }
        Err(DatasetError::not_found(format!(
            "Attribute '{}' of object '{}' not in any file with path '{}' and stem '{}'",
            name,
            object,
            self.dir.display(),
            self.stem
        )))
    }

    fn missing_column(&self, column: &str) -> DatasetError {
        DatasetError::not_found(format!(
            "Object '{}' doesn't exist in file with path '{}' and stem '{}'",
            column,
            self.dir.display(),
            self.stem
        ))
    }

    /// Work out which rows of which fragments to read. Only shapes are
    /// probed here; no row data is touched before the interval is validated.
    fn plan(&self, column: &str, interval: Option<RowInterval>) -> Result<ReadPlan> {
        let mut tasks = Vec::new();
        let mut shape: Option<(ColumnKind, usize)> = None;
        let mut offset = 0;

        for (fragment, path) in self.fragments.iter().enumerate() {
            let Some(info) = self.storage.column_info(path, column)? else {
                continue;
            };
            match shape {
                None => shape = Some((info.kind, info.width)),
                Some(expected) if expected != (info.kind, info.width) => {
                    return Err(DatasetError::schema(format!(
                        "Column '{}' is {:?}x{} in {} but {:?}x{} in earlier fragments",
                        column,
                        info.kind,
                        info.width,
                        path.display(),
                        expected.0,
                        expected.1
                    )));
                }
                Some(_) => {}
            }

            let rows = match interval {
                None => (info.rows > 0).then(|| 0..info.rows),
                Some(iv) => iv.overlap(offset, info.rows),
            };
            offset += info.rows;
            if let Some(rows) = rows {
                tasks.push(ReadTask { fragment, rows });
            }
        }

        let (kind, width) = shape.ok_or_else(|| self.missing_column(column))?;
        if let Some(iv) = interval {
            if iv.end() > offset {
                return Err(DatasetError::invalid_interval(format!(
                    "Interval {} contains larger indices than the {} rows of '{}'",
                    iv, offset, column
                )));
            }
        }

        tracing::debug!(
            column,
            tasks = tasks.len(),
            total_rows = offset,
            "Planned partitioned read"
        );
        Ok(ReadPlan { kind, width, tasks })
    }

    fn read_serial(&self, column: &str, tasks: &[ReadTask]) -> Result<Vec<Column>> {
        tasks
            .iter()
            .map(|task| self.read_task(column, task))
            .collect()
    }

    fn read_task(&self, column: &str, task: &ReadTask) -> Result<Column> {
        let path = &self.fragments[task.fragment];
        let part = self.storage.read_rows(path, column, task.rows.clone())?;
        let expected = task.rows.len();
        if part.rows() != expected {
            return Err(DatasetError::storage(format!(
                "Short read of '{}' from {}: expected {} rows, got {}",
                column,
                path.display(),
                expected,
                part.rows()
            )));
        }
        Ok(part)
    }

    /// Split tasks into contiguous batches, one per worker, and reassemble the
    /// results in task order.
    fn read_parallel(
        &self,
        column: &str,
        tasks: &[ReadTask],
        workers: usize,
    ) -> Result<Vec<Column>> {
        let batches = split_batches(tasks, workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(batches.len())
            .thread_name(|i| format!("simtrees-read-{}", i))
            .build()
            .map_err(|e| DatasetError::worker(format!("Cannot start read workers: {}", e)))?;

        let results: Vec<Result<Vec<Column>>> = pool.install(|| {
            batches
                .par_iter()
                .map(|batch| self.read_serial(column, batch))
                .collect()
        });

        let mut parts = Vec::with_capacity(tasks.len());
        for batch in results {
            parts.extend(batch?);
        }
        Ok(parts)
    }
}

fn resolve_workers(workers: usize) -> usize {
    if workers > 0 {
        return workers;
    }
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn discover_fragments(
    storage: &dyn FragmentStorage,
    dir: &Path,
    stem: &str,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let monolithic = dir.join(format!("{}.{}", stem, extension));
    if storage.exists(&monolithic) {
        return Ok(vec![monolithic]);
    }

    let part = |index: usize| dir.join(format!("{}.{}.{}", stem, index, extension));
    let fragments: Vec<PathBuf> = (0..)
        .map(part)
        .take_while(|path| storage.exists(path))
        .collect();

    if fragments.is_empty() {
        return Err(DatasetError::not_found(format!(
            "File with path '{}' and stem '{}' doesn't exist",
            dir.display(),
            stem
        )));
    }
    Ok(fragments)
}

/// Split `tasks` into at most `workers` contiguous batches; the first
/// `len % workers` batches carry one extra task.
fn split_batches(tasks: &[ReadTask], workers: usize) -> Vec<&[ReadTask]> {
    let count = workers.min(tasks.len()).max(1);
    let base = tasks.len() / count;
    let extra = tasks.len() % count;

    let mut batches = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let len = base + usize::from(i < extra);
        batches.push(&tasks[start..start + len]);
        start += len;
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryFragment, MemoryStorage};

    fn task(fragment: usize) -> ReadTask {
        ReadTask {
            fragment,
            rows: 0..1,
        }
    }

    #[test]
    fn test_split_batches_is_contiguous_and_balanced() {
        let tasks: Vec<ReadTask> = (0..7).map(task).collect();

        let batches = split_batches(&tasks, 3);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);

        let flattened: Vec<usize> = batches.iter().flat_map(|b| b.iter().map(|t| t.fragment)).collect();
        assert_eq!(flattened, (0..7).collect::<Vec<_>>());

        // More workers than tasks: one task per batch
        assert_eq!(split_batches(&tasks[..2], 8).len(), 2);
    }

    #[test]
    fn test_interval_overlap() {
        let iv = RowInterval::new(5, 12).unwrap();
        assert_eq!(iv.overlap(0, 5), None);
        assert_eq!(iv.overlap(0, 6), Some(5..6));
        assert_eq!(iv.overlap(6, 4), Some(0..4));
        assert_eq!(iv.overlap(10, 10), Some(0..2));
        assert_eq!(iv.overlap(12, 3), None);

        assert!(RowInterval::new(3, 2).is_err());
        assert!(RowInterval::new(3, 3).unwrap().is_empty());
    }

    #[test]
    fn test_monolithic_file_wins_over_numbered() {
        let mut storage = MemoryStorage::new();
        storage.add_fragment("/sim/tree.hdf5", MemoryFragment::new());
        storage.add_fragment("/sim/tree.0.hdf5", MemoryFragment::new());

        let ds = PartitionedDataset::open(Arc::new(storage), "/sim", "tree").unwrap();
        assert_eq!(ds.fragments(), &[PathBuf::from("/sim/tree.hdf5")]);
    }

    #[test]
    fn test_numbered_fragments_stop_at_first_gap() {
        let mut storage = MemoryStorage::new();
        for i in [0, 1, 2, 4] {
            storage.add_fragment(format!("/sim/tree.{}.hdf5", i), MemoryFragment::new());
        }

        let ds = PartitionedDataset::open(Arc::new(storage), "/sim", "tree").unwrap();
        assert_eq!(ds.fragments().len(), 3);
        assert_eq!(ds.fragments()[2], PathBuf::from("/sim/tree.2.hdf5"));
    }

    #[test]
    fn test_missing_fileset_is_not_found() {
        let mut storage = MemoryStorage::new();
        // Numbering must start at zero
        storage.add_fragment("/sim/tree.1.hdf5", MemoryFragment::new());

        let err = PartitionedDataset::open(Arc::new(storage), "/sim", "tree").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_custom_extension() {
        let mut storage = MemoryStorage::new();
        storage.add_fragment("/sim/tree.0.h5", MemoryFragment::new());

        let ds =
            PartitionedDataset::open_with_extension(Arc::new(storage), "/sim", "tree", "h5").unwrap();
        assert_eq!(ds.fragments().len(), 1);
    }

    #[test]
    fn test_zero_workers_resolves_to_at_least_one() {
        assert!(resolve_workers(0) >= 1);
        assert_eq!(resolve_workers(3), 3);
    }
}
