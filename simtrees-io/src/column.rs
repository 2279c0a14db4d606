//! Typed column slices read from dataset fragments.
//!
//! A [`Column`] is a row-major run of values with a fixed row width: scalar
//! columns have width 1, while per-halo vectors such as positions (width 3) or
//! masses by particle type (width 6) are stored flattened.
//!
//! # Design
//!
//! - **Strongly typed**: all access goes through [`ColumnData`], no `dyn Any`
//! - **Widening only**: integer and boolean storage widen on conversion, float
//!   storage never silently converts to integers

use std::ops::Range;

use crate::error::{DatasetError, Result};

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Int64,
    Float64,
}

/// Shape and type of a column inside one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub kind: ColumnKind,
    /// Number of rows in this fragment.
    pub rows: usize,
    /// Values per row (1 for scalar columns).
    pub width: usize,
}

/// Column storage, flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Boolean(Vec<bool>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
}

impl ColumnData {
    fn empty(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Boolean => Self::Boolean(Vec::new()),
            ColumnKind::Int64 => Self::Int64(Vec::new()),
            ColumnKind::Float64 => Self::Float64(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    fn kind(&self) -> ColumnKind {
        match self {
            Self::Boolean(_) => ColumnKind::Boolean,
            Self::Int64(_) => ColumnKind::Int64,
            Self::Float64(_) => ColumnKind::Float64,
        }
    }
}

/// A typed slice of rows from one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    data: ColumnData,
    width: usize,
}

impl Column {
    /// Create a column from flattened values; `values.len()` must be a
    /// multiple of `width`.
    pub fn new(data: ColumnData, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(DatasetError::schema("Column width must be at least 1"));
        }
        if data.len() % width != 0 {
            return Err(DatasetError::schema(format!(
                "Column of {} values is not a whole number of rows of width {}",
                data.len(),
                width
            )));
        }
        Ok(Self { data, width })
    }

    pub fn boolean(values: Vec<bool>) -> Self {
        Self {
            data: ColumnData::Boolean(values),
            width: 1,
        }
    }

    pub fn int64(values: Vec<i64>) -> Self {
        Self {
            data: ColumnData::Int64(values),
            width: 1,
        }
    }

    pub fn float64(values: Vec<f64>) -> Self {
        Self {
            data: ColumnData::Float64(values),
            width: 1,
        }
    }

    /// Create a float column of `width`-wide rows, e.g. `[x, y, z]` triples.
    pub fn float64_rows<const N: usize>(rows: Vec<[f64; N]>) -> Self {
        Self {
            data: ColumnData::Float64(rows.into_iter().flatten().collect()),
            width: N,
        }
    }

    /// Create an empty column with the given type and row width.
    pub fn empty(kind: ColumnKind, width: usize) -> Self {
        Self {
            data: ColumnData::empty(kind),
            width: width.max(1),
        }
    }

    #[inline]
    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows (not values).
    #[inline]
    pub fn rows(&self) -> usize {
        self.data.len() / self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Shape information for this column.
    pub fn info(&self) -> ColumnInfo {
        ColumnInfo {
            kind: self.kind(),
            rows: self.rows(),
            width: self.width,
        }
    }

    /// Copy out a range of rows.
    pub fn slice_rows(&self, rows: Range<usize>) -> Result<Column> {
        if rows.start > rows.end || rows.end > self.rows() {
            return Err(DatasetError::invalid_interval(format!(
                "Rows {}..{} outside column of {} rows",
                rows.start,
                rows.end,
                self.rows()
            )));
        }
        let values = rows.start * self.width..rows.end * self.width;
        let data = match &self.data {
            ColumnData::Boolean(v) => ColumnData::Boolean(v[values].to_vec()),
            ColumnData::Int64(v) => ColumnData::Int64(v[values].to_vec()),
            ColumnData::Float64(v) => ColumnData::Float64(v[values].to_vec()),
        };
        Ok(Column {
            data,
            width: self.width,
        })
    }

    /// Concatenate slices in order. Every part must match `kind` and `width`.
    pub fn concat(kind: ColumnKind, width: usize, parts: Vec<Column>) -> Result<Column> {
        let mut out = Column::empty(kind, width);
        for part in parts {
            if part.kind() != kind || part.width != out.width {
                return Err(DatasetError::schema(format!(
                    "Cannot concatenate {:?}x{} slice onto {:?}x{} column",
                    part.kind(),
                    part.width,
                    kind,
                    out.width
                )));
            }
            match (&mut out.data, part.data) {
                (ColumnData::Boolean(dst), ColumnData::Boolean(src)) => dst.extend(src),
                (ColumnData::Int64(dst), ColumnData::Int64(src)) => dst.extend(src),
                (ColumnData::Float64(dst), ColumnData::Float64(src)) => dst.extend(src),
                _ => unreachable!("kinds checked above"),
            }
        }
        Ok(out)
    }

    fn require_scalar(&self, what: &str) -> Result<()> {
        if self.width != 1 {
            return Err(DatasetError::schema(format!(
                "Expected scalar {} column, got rows of width {}",
                what, self.width
            )));
        }
        Ok(())
    }

    /// Integer values; boolean storage widens to 0/1.
    pub fn into_i64(self) -> Result<Vec<i64>> {
        self.require_scalar("integer")?;
        match self.data {
            ColumnData::Int64(v) => Ok(v),
            ColumnData::Boolean(v) => Ok(v.into_iter().map(i64::from).collect()),
            ColumnData::Float64(_) => Err(DatasetError::schema(
                "Expected integer column, got floating point values",
            )),
        }
    }

    /// Boolean flags; integer storage maps nonzero to `true`.
    pub fn into_bool(self) -> Result<Vec<bool>> {
        self.require_scalar("boolean")?;
        match self.data {
            ColumnData::Boolean(v) => Ok(v),
            ColumnData::Int64(v) => Ok(v.into_iter().map(|x| x != 0).collect()),
            ColumnData::Float64(_) => Err(DatasetError::schema(
                "Expected boolean column, got floating point values",
            )),
        }
    }

    /// Fixed-width float rows, e.g. `[f64; 3]` positions.
    pub fn into_f64_rows<const N: usize>(self) -> Result<Vec<[f64; N]>> {
        if self.width != N {
            return Err(DatasetError::schema(format!(
                "Expected rows of width {}, got width {}",
                N, self.width
            )));
        }
        let flat = self.into_flat_f64()?;
        Ok(flat
            .chunks_exact(N)
            .map(|chunk| {
                let mut row = [0.0; N];
                row.copy_from_slice(chunk);
                row
            })
            .collect())
    }

    fn into_flat_f64(self) -> Result<Vec<f64>> {
        match self.data {
            ColumnData::Float64(v) => Ok(v),
            ColumnData::Int64(v) => Ok(v.into_iter().map(|x| x as f64).collect()),
            ColumnData::Boolean(_) => Err(DatasetError::schema(
                "Expected float column, got boolean values",
            )),
        }
    }
}

/// Value of an attribute attached to a dataset or group.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}
