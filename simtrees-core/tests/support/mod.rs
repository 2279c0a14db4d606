//! In-memory merger tree fixture shared by the integration tests.
//!
//! Snapshot 28 holds two roots. Root 100 has progenitors 200 (weight 5),
//! 201 (9) and 202 (9); 201 has progenitor 300. Root 101 links to an
//! interpolated phantom node, which links to 301.

#![allow(dead_code)]

use std::sync::Arc;

use simtrees_core::{PathConfig, SnapshotId, SnapshotPaths, PARTICLE_TYPES};
use simtrees_io::{Column, FragmentStorage, MemoryFragment, MemoryStorage};

pub const SIMULATION: &str = "L0012N0188_REFERENCE";
pub const PHANTOM: i64 = 10_000_000_000_000_001;

/// (id, snapshot, fof, descendant, weight, interpolated, catalog position)
pub const NODES: &[(i64, i64, i64, i64, i64, bool, i64)] = &[
    (100, 28, 0, 100, 0, false, 0),
    (101, 28, 0, 101, 0, false, 1),
    (200, 27, 0, 100, 5, false, 0),
    (201, 27, 0, 100, 9, false, 1),
    (202, 27, 1, 100, 9, false, 2),
    (PHANTOM, 27, 2, 101, 4, true, -1),
    (300, 26, 0, 201, 3, false, 0),
    (301, 26, 0, PHANTOM, 1, false, 1),
];

/// (id, snapshot, subgroup, dark matter mass); rows of a snapshot are in
/// catalog position order.
pub const HALOS: &[(i64, i32, i64, f64)] = &[
    (300, 26, 0, 6.0),
    (301, 26, 1, 4.0),
    (200, 27, 0, 7.0),
    (201, 27, 1, 2.0),
    (202, 27, 0, 1.0),
    (100, 28, 0, 9.0),
    (101, 28, 1, 3.0),
];

pub fn snapshot() -> SnapshotId {
    SnapshotId::new(SIMULATION, 28)
}

fn tree_fragment(rows: &[(i64, i64, i64, i64, i64, bool, i64)]) -> MemoryFragment {
    MemoryFragment::new()
        .with_column("/haloTrees/nodeIndex", Column::int64(rows.iter().map(|r| r.0).collect()))
        .with_column(
            "/haloTrees/snapshotNumber",
            Column::int64(rows.iter().map(|r| r.1).collect()),
        )
        .with_column("/haloTrees/fofIndex", Column::int64(rows.iter().map(|r| r.2).collect()))
        .with_column(
            "/haloTrees/descendantIndex",
            Column::int64(rows.iter().map(|r| r.3).collect()),
        )
        .with_column(
            "/haloTrees/mbpsContributed",
            Column::int64(rows.iter().map(|r| r.4).collect()),
        )
        .with_column(
            "/haloTrees/isInterpolated",
            Column::boolean(rows.iter().map(|r| r.5).collect()),
        )
        .with_column(
            "/haloTrees/positionInCatalogue",
            Column::int64(rows.iter().map(|r| r.6).collect()),
        )
}

fn mass(dm: f64) -> [f64; PARTICLE_TYPES] {
    [0.5, dm, 0.0, 0.0, 0.1, 0.0]
}

fn halo_fragment(halos: &[(i64, i32, i64, f64)]) -> MemoryFragment {
    MemoryFragment::new()
        .with_column(
            "/Subhalo/SubGroupNumber",
            Column::int64(halos.iter().map(|h| h.2).collect()),
        )
        .with_column(
            "/Subhalo/MassType",
            Column::float64_rows(halos.iter().map(|h| mass(h.3)).collect()),
        )
        .with_column(
            "/Subhalo/CentreOfPotential",
            Column::float64_rows(halos.iter().map(|h| [h.0 as f64, 1.0, 2.0]).collect()),
        )
        .with_column(
            "/Subhalo/Velocity",
            Column::float64_rows(halos.iter().map(|_| [0.0, -1.0, 0.0]).collect()),
        )
}

fn subfind_fragment() -> MemoryFragment {
    let mut halos = HALOS.to_vec();
    // Not in the tree table; the join ignores it
    halos.push((999, 28, 7, 100.0));
    halo_fragment(&halos).with_column(
        "/Subhalo/nodeIndex",
        Column::int64(halos.iter().map(|h| h.0).collect()),
    )
}

/// Tree fileset in two fragments, a monolithic subfind catalog next to it,
/// and one row-indexed catalog per snapshot under `/sim/snap_NNN`.
pub fn storage() -> MemoryStorage {
    let mut storage = MemoryStorage::new();
    storage.add_fragment("/sim/treedir_028/tree_028.0.hdf5", tree_fragment(&NODES[..4]));
    storage.add_fragment("/sim/treedir_028/tree_028.1.hdf5", tree_fragment(&NODES[4..]));
    storage.add_fragment(
        "/sim/treedir_028/subfind_028.hdf5",
        subfind_fragment(),
    );
    for snap in [26, 27, 28] {
        let rows: Vec<_> = HALOS.iter().copied().filter(|h| h.1 == snap).collect();
        storage.add_fragment(
            format!("/sim/snap_{:03}/subhalos_{:03}.hdf5", snap, snap),
            halo_fragment(&rows),
        );
    }
    storage
}

pub fn shared_storage() -> Arc<dyn FragmentStorage> {
    Arc::new(storage())
}

/// Resolver for the tree fileset.
pub fn tree_config() -> PathConfig {
    let mut config = PathConfig::new();
    config.insert(
        snapshot(),
        SnapshotPaths::new("/sim/treedir_028", "tree_028").with_subfind_stem("subfind_028"),
    );
    config
}

/// Resolver for the per-snapshot catalogs.
pub fn catalog_config() -> PathConfig {
    let mut config = PathConfig::new();
    for snap in [26, 27, 28] {
        config.insert(
            snapshot().with_snapshot(snap),
            SnapshotPaths::new(format!("/sim/snap_{:03}", snap), "unused")
                .with_subfind_stem(format!("subhalos_{:03}", snap)),
        );
    }
    config
}
