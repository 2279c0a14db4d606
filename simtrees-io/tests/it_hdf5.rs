//! Integration tests for partitioned reads over real HDF5 fragments.

#![cfg(feature = "hdf5")]

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use simtrees_io::{
    AttributeValue, ColumnInfo, ColumnKind, DatasetError, FragmentStorage, Hdf5Storage,
    PartitionedDataset, RowInterval,
};

const IDS: &str = "/haloTrees/nodeIndex";
const POS: &str = "/haloTrees/position";
const INTERP: &str = "/haloTrees/isInterpolated";

struct Rows<'a> {
    ids: &'a [i64],
    pos: &'a [[f64; 3]],
    interpolated: &'a [bool],
    redshift: f64,
}

fn write_fragment(path: &Path, rows: &Rows<'_>) -> hdf5::Result<()> {
    let file = hdf5::File::create(path)?;
    let trees = file.create_group("haloTrees")?;
    trees
        .new_dataset::<i64>()
        .shape(rows.ids.len())
        .create("nodeIndex")?
        .write_raw(rows.ids)?;
    let flat: Vec<f64> = rows.pos.iter().flatten().copied().collect();
    trees
        .new_dataset::<f64>()
        .shape((rows.pos.len(), 3))
        .create("position")?
        .write_raw(flat.as_slice())?;
    trees
        .new_dataset::<bool>()
        .shape(rows.interpolated.len())
        .create("isInterpolated")?
        .write_raw(rows.interpolated)?;

    let header = file.create_group("Header")?;
    header
        .new_attr::<f64>()
        .shape(())
        .create("Redshift")?
        .write_scalar(&rows.redshift)?;
    header
        .new_attr::<i64>()
        .shape(())
        .create("NumFilesPerSnapshot")?
        .write_scalar(&2i64)?;
    Ok(())
}

/// `tree.0.hdf5` holds nodes 10..13 and `tree.1.hdf5` nodes 13..15.
fn two_fragments(dir: &Path) {
    write_fragment(
        &dir.join("tree.0.hdf5"),
        &Rows {
            ids: &[10, 11, 12],
            pos: &[[0.0, 0.5, 1.0], [1.0, 1.5, 2.0], [2.0, 2.5, 3.0]],
            interpolated: &[false, true, false],
            redshift: 0.25,
        },
    )
    .unwrap();
    write_fragment(
        &dir.join("tree.1.hdf5"),
        &Rows {
            ids: &[13, 14],
            pos: &[[3.0, 3.5, 4.0], [4.0, 4.5, 5.0]],
            interpolated: &[true, false],
            redshift: 9.0,
        },
    )
    .unwrap();
}

fn open(dir: &Path, stem: &str) -> PartitionedDataset {
    PartitionedDataset::open(Arc::new(Hdf5Storage::new()), dir, stem).unwrap()
}

#[test]
fn test_full_reads_concatenate_fragments() {
    let dir = tempfile::tempdir().unwrap();
    two_fragments(dir.path());
    let ds = open(dir.path(), "tree");

    assert_eq!(ds.fragments().len(), 2);
    assert_eq!(
        ds.read(IDS, None).unwrap().into_i64().unwrap(),
        vec![10, 11, 12, 13, 14]
    );
    assert_eq!(
        ds.read(INTERP, None).unwrap().into_bool().unwrap(),
        vec![false, true, false, true, false]
    );
    assert_eq!(ds.row_count(POS).unwrap(), 5);
}

#[test]
fn test_interval_reads_span_fragment_boundary() {
    let dir = tempfile::tempdir().unwrap();
    two_fragments(dir.path());
    let ds = open(dir.path(), "tree");
    let interval = RowInterval::new(2, 4).unwrap();

    assert_eq!(
        ds.read(IDS, Some(interval)).unwrap().into_i64().unwrap(),
        vec![12, 13]
    );
    assert_eq!(
        ds.read(POS, Some(interval))
            .unwrap()
            .into_f64_rows::<3>()
            .unwrap(),
        vec![[2.0, 2.5, 3.0], [3.0, 3.5, 4.0]]
    );
    assert_eq!(
        ds.read(INTERP, Some(interval)).unwrap().into_bool().unwrap(),
        vec![false, true]
    );

    let tail = RowInterval::new(4, 5).unwrap();
    assert_eq!(ds.read(IDS, Some(tail)).unwrap().into_i64().unwrap(), vec![14]);
}

#[test]
fn test_interval_past_end_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    two_fragments(dir.path());
    let ds = open(dir.path(), "tree");

    let err = ds.read(IDS, Some(RowInterval::new(3, 6).unwrap())).unwrap_err();
    assert!(
        matches!(err, DatasetError::InvalidInterval(_)),
        "{}",
        err
    );
}

#[test]
fn test_attributes_come_from_first_fragment() {
    let dir = tempfile::tempdir().unwrap();
    two_fragments(dir.path());
    let ds = open(dir.path(), "tree");

    assert_eq!(
        ds.read_attribute("/Header", "Redshift").unwrap(),
        AttributeValue::Float(0.25)
    );
    assert_eq!(
        ds.read_attribute("/Header", "NumFilesPerSnapshot").unwrap(),
        AttributeValue::Int(2)
    );
    assert!(ds
        .read_attribute("/Header", "BoxSize")
        .unwrap_err()
        .is_not_found());
    assert!(ds
        .read_attribute("/Units", "Redshift")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_column_info_reports_kind_and_width() {
    let dir = tempfile::tempdir().unwrap();
    two_fragments(dir.path());
    let storage = Hdf5Storage::new();
    let path = dir.path().join("tree.0.hdf5");

    assert_eq!(
        storage.column_info(&path, POS).unwrap(),
        Some(ColumnInfo {
            kind: ColumnKind::Float64,
            rows: 3,
            width: 3,
        })
    );
    assert_eq!(
        storage.column_info(&path, INTERP).unwrap().map(|i| i.kind),
        Some(ColumnKind::Boolean)
    );
    assert_eq!(storage.column_info(&path, "/haloTrees/mass").unwrap(), None);
}

#[test]
fn test_group_link_is_an_absent_column() {
    let dir = tempfile::tempdir().unwrap();
    two_fragments(dir.path());

    // A third fragment where the id column name is taken by a group
    {
        let file = hdf5::File::create(dir.path().join("tree.2.hdf5")).unwrap();
        file.create_group("haloTrees")
            .unwrap()
            .create_group("nodeIndex")
            .unwrap();
    }
    let ds = open(dir.path(), "tree");
    assert_eq!(ds.fragments().len(), 3);

    let storage = Hdf5Storage::new();
    assert_eq!(
        storage
            .column_info(&dir.path().join("tree.2.hdf5"), IDS)
            .unwrap(),
        None
    );
    assert_eq!(
        ds.read(IDS, None).unwrap().into_i64().unwrap(),
        vec![10, 11, 12, 13, 14]
    );
}

#[test]
fn test_unreadable_fragment_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    two_fragments(dir.path());
    std::fs::write(dir.path().join("tree.1.hdf5"), b"not an hdf5 file").unwrap();
    let ds = open(dir.path(), "tree");

    let err = ds.read(IDS, None).unwrap_err();
    assert!(
        matches!(err, DatasetError::Storage(_)),
        "{}",
        err
    );
}
