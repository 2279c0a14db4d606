//! HDF5 fragment storage.
//!
//! Reads 1-D and 2-D numeric datasets and scalar or 1-D attributes from HDF5
//! files. Every call opens the file afresh so parallel workers never share a
//! handle.

use std::ops::Range;
use std::path::Path;

use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, Dataset, File, Hyperslab, Location, Selection, SliceOrIndex};

use crate::column::{AttributeValue, Column, ColumnData, ColumnInfo, ColumnKind};
use crate::error::{DatasetError, Result};
use crate::storage::FragmentStorage;

/// Storage backed by HDF5 files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Storage;

impl Hdf5Storage {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<File> {
        File::open(path)
            .map_err(|e| DatasetError::storage(format!("Cannot open {}: {}", path.display(), e)))
    }

    /// `None` when `column` is missing or names a group; any other failure
    /// to open the dataset is a storage error.
    fn dataset(path: &Path, file: &File, column: &str) -> Result<Option<Dataset>> {
        if !file.link_exists(column) {
            return Ok(None);
        }
        match file.dataset(column) {
            Ok(ds) => Ok(Some(ds)),
            Err(_) if file.group(column).is_ok() => Ok(None),
            Err(e) => Err(DatasetError::storage(format!(
                "Cannot open dataset '{}' in {}: {}",
                column,
                path.display(),
                e
            ))),
        }
    }
}

fn column_kind(dataset: &Dataset) -> Result<ColumnKind> {
    let descriptor = dataset.dtype()?.to_descriptor()?;
    match descriptor {
        TypeDescriptor::Boolean => Ok(ColumnKind::Boolean),
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Ok(ColumnKind::Int64),
        TypeDescriptor::Float(_) => Ok(ColumnKind::Float64),
        other => Err(DatasetError::schema(format!(
            "Unsupported HDF5 element type: {:?}",
            other
        ))),
    }
}

fn shape_info(dataset: &Dataset) -> Result<ColumnInfo> {
    let shape = dataset.shape();
    let (rows, width) = match shape.as_slice() {
        [rows] => (*rows, 1),
        [rows, width] => (*rows, *width),
        _ => {
            return Err(DatasetError::schema(format!(
                "Dataset {} has rank {}; only 1-D and 2-D datasets are columns",
                dataset.name(),
                shape.len()
            )))
        }
    };
    Ok(ColumnInfo {
        kind: column_kind(dataset)?,
        rows,
        width,
    })
}

fn read_values<T>(dataset: &Dataset, rows: Range<usize>) -> Result<Vec<T>>
where
    T: hdf5::H5Type + Copy,
{
    if dataset.ndim() == 1 {
        let values = dataset.read_slice_1d::<T, _>(rows)?;
        return Ok(values.iter().copied().collect());
    }
    let selection = Selection::from(Hyperslab::from(vec![
        SliceOrIndex::from(rows),
        SliceOrIndex::from(..),
    ]));
    let values = dataset.read_slice_2d::<T, _>(selection)?;
    // Standard layout, so iteration order is row-major.
    Ok(values.iter().copied().collect())
}

fn read_attribute_value(attr: &Attribute) -> Result<AttributeValue> {
    let descriptor = attr.dtype()?.to_descriptor()?;
    let scalar = attr.ndim() == 0;
    let value = match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Boolean => {
            if scalar {
                AttributeValue::Int(attr.read_scalar::<i64>()?)
            } else {
                AttributeValue::IntArray(attr.read_raw::<i64>()?)
            }
        }
        TypeDescriptor::Float(_) => {
            if scalar {
                AttributeValue::Float(attr.read_scalar::<f64>()?)
            } else {
                AttributeValue::FloatArray(attr.read_raw::<f64>()?)
            }
        }
        TypeDescriptor::VarLenUnicode => {
            AttributeValue::Text(attr.read_scalar::<VarLenUnicode>()?.as_str().to_string())
        }
        TypeDescriptor::VarLenAscii => {
            AttributeValue::Text(attr.read_scalar::<VarLenAscii>()?.as_str().to_string())
        }
        other => {
            return Err(DatasetError::schema(format!(
                "Unsupported HDF5 attribute type: {:?}",
                other
            )))
        }
    };
    Ok(value)
}

fn attribute_in(location: &Location, name: &str) -> Result<Option<AttributeValue>> {
    if !location.attr_names()?.iter().any(|n| n == name) {
        return Ok(None);
    }
    read_attribute_value(&location.attr(name)?).map(Some)
}

impl FragmentStorage for Hdf5Storage {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn column_info(&self, path: &Path, column: &str) -> Result<Option<ColumnInfo>> {
        let file = Self::open(path)?;
        match Self::dataset(path, &file, column)? {
            Some(ds) => shape_info(&ds).map(Some),
            None => Ok(None),
        }
    }

    fn read_rows(&self, path: &Path, column: &str, rows: Range<usize>) -> Result<Column> {
        let file = Self::open(path)?;
        let ds = Self::dataset(path, &file, column)?.ok_or_else(|| {
            DatasetError::not_found(format!(
                "Dataset '{}' not in file {}",
                column,
                path.display()
            ))
        })?;
        let info = shape_info(&ds)?;
        if rows.end > info.rows || rows.start > rows.end {
            return Err(DatasetError::invalid_interval(format!(
                "Rows {}..{} outside dataset '{}' of {} rows in {}",
                rows.start,
                rows.end,
                column,
                info.rows,
                path.display()
            )));
        }
        let data = match info.kind {
            ColumnKind::Boolean => ColumnData::Boolean(read_values::<bool>(&ds, rows)?),
            ColumnKind::Int64 => ColumnData::Int64(read_values::<i64>(&ds, rows)?),
            ColumnKind::Float64 => ColumnData::Float64(read_values::<f64>(&ds, rows)?),
        };
        Column::new(data, info.width)
    }

    fn read_attribute(
        &self,
        path: &Path,
        object: &str,
        name: &str,
    ) -> Result<Option<AttributeValue>> {
        let file = Self::open(path)?;
        if object != "/" && !file.link_exists(object) {
            return Ok(None);
        }
        match file.dataset(object) {
            Ok(ds) => attribute_in(&ds, name),
            Err(_) => attribute_in(&file.group(object)?, name),
        }
    }
}
