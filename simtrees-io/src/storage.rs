//! Storage abstraction for reading dataset fragments.
//!
//! This module provides the [`FragmentStorage`] trait for reading columns out
//! of individual fragment files, an in-memory backend and a call-tracking
//! wrapper for tests. The HDF5 backend lives in `hdf5_storage`.
//!
//! # Design
//!
//! - **Stateless calls**: every method takes the fragment path; backends open
//!   the file per call and never cache handles between reads
//! - **`Send + Sync`**: parallel reads share one storage across worker threads
//! - **Absence is not failure**: a missing column or attribute is `Ok(None)`,
//!   so callers can probe fragments in order

use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::column::{AttributeValue, Column, ColumnInfo};
use crate::error::{DatasetError, Result};

/// Storage trait for reading fragment files.
pub trait FragmentStorage: Debug + Send + Sync {
    /// Whether a fragment file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Shape of `column` in the fragment, or `None` if the fragment lacks it.
    fn column_info(&self, path: &Path, column: &str) -> Result<Option<ColumnInfo>>;

    /// Read a range of rows (fragment-local indices) of `column`.
    fn read_rows(&self, path: &Path, column: &str, rows: Range<usize>) -> Result<Column>;

    /// Read attribute `name` attached to `object`, or `None` if absent.
    fn read_attribute(&self, path: &Path, object: &str, name: &str)
        -> Result<Option<AttributeValue>>;
}

/// One in-memory fragment: named columns plus attributes keyed by
/// `(object, name)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFragment {
    columns: HashMap<String, Column>,
    attributes: HashMap<(String, String), AttributeValue>,
}

impl MemoryFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    pub fn with_attribute(
        mut self,
        object: impl Into<String>,
        name: impl Into<String>,
        value: AttributeValue,
    ) -> Self {
        self.attributes.insert((object.into(), name.into()), value);
        self
    }
}

/// In-memory storage for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    fragments: HashMap<PathBuf, MemoryFragment>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment at `path`.
    pub fn add_fragment(&mut self, path: impl Into<PathBuf>, fragment: MemoryFragment) {
        self.fragments.insert(path.into(), fragment);
    }

    fn fragment(&self, path: &Path) -> Result<&MemoryFragment> {
        self.fragments
            .get(path)
            .ok_or_else(|| DatasetError::storage(format!("File not found: {}", path.display())))
    }
}

impl FragmentStorage for MemoryStorage {
    fn exists(&self, path: &Path) -> bool {
        self.fragments.contains_key(path)
    }

    fn column_info(&self, path: &Path, column: &str) -> Result<Option<ColumnInfo>> {
        Ok(self.fragment(path)?.columns.get(column).map(Column::info))
    }

    fn read_rows(&self, path: &Path, column: &str, rows: Range<usize>) -> Result<Column> {
        let col = self.fragment(path)?.columns.get(column).ok_or_else(|| {
            DatasetError::not_found(format!(
                "Column '{}' not in fragment {}",
                column,
                path.display()
            ))
        })?;
        col.slice_rows(rows)
    }

    fn read_attribute(
        &self,
        path: &Path,
        object: &str,
        name: &str,
    ) -> Result<Option<AttributeValue>> {
        Ok(self
            .fragment(path)?
            .attributes
            .get(&(object.to_string(), name.to_string()))
            .cloned())
    }
}

/// A storage wrapper that counts calls and can inject row-read failures.
///
/// Used in tests to check that interval validation happens before any row
/// data is touched, and that a failing parallel read falls back to serial.
#[derive(Debug)]
pub struct TrackingStorage<S: FragmentStorage> {
    inner: S,
    /// Number of column_info() probes
    info_calls: AtomicUsize,
    /// Number of read_rows() calls, including failed ones
    read_calls: AtomicUsize,
    /// Remaining read_rows() calls that should fail
    failures_left: AtomicUsize,
}

impl<S: FragmentStorage> TrackingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            info_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` row reads fail with a storage error.
    pub fn fail_next_reads(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<S: FragmentStorage> FragmentStorage for TrackingStorage<S> {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn column_info(&self, path: &Path, column: &str) -> Result<Option<ColumnInfo>> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.column_info(path, column)
    }

    fn read_rows(&self, path: &Path, column: &str, rows: Range<usize>) -> Result<Column> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(DatasetError::storage(format!(
                "Injected read failure: {}",
                path.display()
            )));
        }
        self.inner.read_rows(path, column, rows)
    }

    fn read_attribute(
        &self,
        path: &Path,
        object: &str,
        name: &str,
    ) -> Result<Option<AttributeValue>> {
        self.inner.read_attribute(path, object, name)
    }
}
