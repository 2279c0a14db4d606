//! In-memory halo catalog index built from merger tree tables.
//!
//! The index owns the node linkage (descendant and ordering weight for every
//! node id, interpolated ones included) and the catalog side (group identity
//! and halo properties for cataloged nodes), plus the reverse lookup from a
//! group identity to the real node that carries it.
//!
//! Ids in `[0, phantom_threshold)` denote real cataloged nodes; ids at or
//! above the threshold are structural nodes that only keep tree links intact
//! and never appear in the reverse lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use simtrees_io::{FragmentStorage, PartitionedDataset};

use crate::catalog::{HaloProperties, SnapshotCatalogLoader, SubhaloCatalog, PARTICLE_TYPES};
use crate::config::{PathResolver, SnapshotId};
use crate::error::{Error, Result};

/// Globally unique merger tree node id.
pub type NodeId = i64;

/// Ids at or above this value are phantom (interpolated) nodes.
pub const DEFAULT_PHANTOM_THRESHOLD: NodeId = 10_000_000_000_000_000;

pub const TREE_NODE_INDEX: &str = "/haloTrees/nodeIndex";
pub const TREE_SNAPSHOT_NUMBER: &str = "/haloTrees/snapshotNumber";
pub const TREE_FOF_INDEX: &str = "/haloTrees/fofIndex";
pub const TREE_DESCENDANT_INDEX: &str = "/haloTrees/descendantIndex";
pub const TREE_MBPS_CONTRIBUTED: &str = "/haloTrees/mbpsContributed";
pub const TREE_IS_INTERPOLATED: &str = "/haloTrees/isInterpolated";
pub const TREE_POSITION_IN_CATALOGUE: &str = "/haloTrees/positionInCatalogue";

/// The external handle for a halo: (snapshot, FoF group, subgroup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupIdentity {
    pub snapshot: i32,
    pub group: i64,
    pub subgroup: i64,
}

impl GroupIdentity {
    pub fn new(snapshot: i32, group: i64, subgroup: i64) -> Self {
        Self {
            snapshot,
            group,
            subgroup,
        }
    }
}

impl fmt::Display for GroupIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.snapshot, self.group, self.subgroup)
    }
}

/// Flat merger tree node table, one row per node in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    pub node_ids: Vec<NodeId>,
    pub snapshots: Vec<i32>,
    pub groups: Vec<i64>,
    pub descendants: Vec<NodeId>,
    pub weights: Vec<i64>,
    pub interpolated: Vec<bool>,
    /// Row of each node in its snapshot's catalog; needed only when
    /// properties come from per-snapshot catalogs.
    pub catalog_positions: Option<Vec<i64>>,
}

impl NodeTable {
    /// Read the `/haloTrees/*` columns of a merger tree fileset.
    pub fn read(dataset: &PartitionedDataset, with_catalog_positions: bool) -> Result<Self> {
        let snapshots = dataset
            .read(TREE_SNAPSHOT_NUMBER, None)?
            .into_i64()?
            .into_iter()
            .map(|sn| {
                i32::try_from(sn)
                    .map_err(|_| Error::schema(format!("Snapshot number {} out of range", sn)))
            })
            .collect::<Result<Vec<_>>>()?;
        let catalog_positions = if with_catalog_positions {
            Some(dataset.read(TREE_POSITION_IN_CATALOGUE, None)?.into_i64()?)
        } else {
            None
        };
        let table = Self {
            node_ids: dataset.read(TREE_NODE_INDEX, None)?.into_i64()?,
            snapshots,
            groups: dataset.read(TREE_FOF_INDEX, None)?.into_i64()?,
            descendants: dataset.read(TREE_DESCENDANT_INDEX, None)?.into_i64()?,
            weights: dataset.read(TREE_MBPS_CONTRIBUTED, None)?.into_i64()?,
            interpolated: dataset.read(TREE_IS_INTERPOLATED, None)?.into_bool()?,
            catalog_positions,
        };
        table.validate()?;
        Ok(table)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let n = self.node_ids.len();
        let mut lengths = vec![
            (TREE_SNAPSHOT_NUMBER, self.snapshots.len()),
            (TREE_FOF_INDEX, self.groups.len()),
            (TREE_DESCENDANT_INDEX, self.descendants.len()),
            (TREE_MBPS_CONTRIBUTED, self.weights.len()),
            (TREE_IS_INTERPOLATED, self.interpolated.len()),
        ];
        if let Some(positions) = &self.catalog_positions {
            lengths.push((TREE_POSITION_IN_CATALOGUE, positions.len()));
        }
        for (column, len) in lengths {
            if len != n {
                return Err(Error::schema(format!(
                    "Column {} has {} rows but {} has {}",
                    column, len, TREE_NODE_INDEX, n
                )));
            }
        }
        Ok(())
    }
}

/// Options for building a [`HaloCatalogIndex`] from files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Workers for partitioned reads (0 selects one less than the core count)
    pub workers: usize,
    pub phantom_threshold: NodeId,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            phantom_threshold: DEFAULT_PHANTOM_THRESHOLD,
        }
    }
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_phantom_threshold(mut self, threshold: NodeId) -> Self {
        self.phantom_threshold = threshold;
        self
    }
}

/// Where halo properties come from.
pub enum CatalogSource<'a> {
    /// Subfind catalog in the same directory, joined by node id
    Subfind,
    /// Per-snapshot catalogs addressed by `/haloTrees/positionInCatalogue`
    Snapshot(&'a dyn SnapshotCatalogLoader),
}

impl fmt::Debug for CatalogSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::Subfind => f.write_str("Subfind"),
            CatalogSource::Snapshot(_) => f.write_str("Snapshot(..)"),
        }
    }
}

/// Outcome of a mass filter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    /// Cataloged nodes before filtering
    pub before: usize,
    /// Cataloged nodes kept
    pub after: usize,
}

/// A catalog record joined to a tree node.
struct JoinedHalo {
    id: NodeId,
    group: GroupIdentity,
    properties: HaloProperties,
}

/// Node linkage and catalog lookups for one merger tree fileset.
///
/// Built once, optionally mass-filtered, then shared read-only by tree
/// builders. Filtering takes `&mut self`, so it cannot overlap a borrow held
/// by a [`TreeBuilder`](crate::tree::TreeBuilder).
#[derive(Debug, Clone)]
pub struct HaloCatalogIndex {
    phantom_threshold: NodeId,
    /// Node ids in table order
    order: Vec<NodeId>,
    descendants: FxHashMap<NodeId, NodeId>,
    weights: FxHashMap<NodeId, i64>,
    groups: FxHashMap<NodeId, GroupIdentity>,
    properties: FxHashMap<NodeId, HaloProperties>,
    reverse: FxHashMap<GroupIdentity, NodeId>,
    /// Descendant id -> progenitor ids in table order, self links excluded
    progenitors: FxHashMap<NodeId, Vec<NodeId>>,
}

impl HaloCatalogIndex {
    /// Build the index for `snapshot`: resolve its filesets, read the tree
    /// tables and join halo properties from `source`.
    pub fn build<R: PathResolver + ?Sized>(
        snapshot: &SnapshotId,
        resolver: &R,
        storage: Arc<dyn FragmentStorage>,
        options: &IndexOptions,
        source: CatalogSource<'_>,
    ) -> Result<Self> {
        let paths = resolver.resolve(snapshot)?;
        tracing::info!(
            snapshot = %snapshot,
            dir = %paths.dir.display(),
            tree_stem = %paths.tree_stem,
            source = ?source,
            "Building halo catalog index"
        );

        let trees = PartitionedDataset::open(storage.clone(), &paths.dir, &paths.tree_stem)?
            .with_workers(options.workers);
        let with_positions = matches!(source, CatalogSource::Snapshot(_));
        let table = NodeTable::read(&trees, with_positions)?;

        match source {
            CatalogSource::Subfind => {
                let stem = paths.subfind_stem.as_deref().ok_or_else(|| {
                    Error::invalid_config(format!(
                        "Snapshot {} has no subfind_stem configured",
                        snapshot
                    ))
                })?;
                let subfind = PartitionedDataset::open(storage, &paths.dir, stem)?
                    .with_workers(options.workers);
                let catalog = SubhaloCatalog::read(&subfind)?;
                Self::from_subhalo_catalog(table, &catalog, options.phantom_threshold)
            }
            CatalogSource::Snapshot(loader) => Self::from_snapshot_catalogs(
                snapshot,
                table,
                loader,
                options.phantom_threshold,
            ),
        }
    }

    /// Build from a node table and a subfind catalog joined by node id.
    /// Only non-interpolated nodes present in the catalog are cataloged.
    pub fn from_subhalo_catalog(
        table: NodeTable,
        catalog: &SubhaloCatalog,
        phantom_threshold: NodeId,
    ) -> Result<Self> {
        table.validate()?;
        let real_rows: FxHashMap<NodeId, usize> = table
            .node_ids
            .iter()
            .enumerate()
            .filter(|(row, _)| !table.interpolated[*row])
            .map(|(row, &id)| (id, row))
            .collect();

        let mut seen = FxHashSet::default();
        let mut joined = Vec::with_capacity(real_rows.len());
        for (id, subgroup, properties) in catalog.iter() {
            let Some(&row) = real_rows.get(&id) else {
                continue;
            };
            if !seen.insert(id) {
                return Err(Error::integrity(format!(
                    "Node {} appears more than once in the subhalo catalog",
                    id
                )));
            }
            joined.push(JoinedHalo {
                id,
                group: GroupIdentity::new(table.snapshots[row], table.groups[row], subgroup),
                properties: *properties,
            });
        }
        Self::from_joined(table, joined, phantom_threshold)
    }

    /// Build from a node table and one row-indexed catalog per snapshot,
    /// loaded through `loader` with `snapshot` retargeted to each snapshot
    /// number present in the table.
    pub fn from_snapshot_catalogs(
        snapshot: &SnapshotId,
        table: NodeTable,
        loader: &dyn SnapshotCatalogLoader,
        phantom_threshold: NodeId,
    ) -> Result<Self> {
        table.validate()?;
        let positions = table.catalog_positions.as_ref().ok_or_else(|| {
            Error::schema(format!(
                "{} is required to join per-snapshot catalogs",
                TREE_POSITION_IN_CATALOGUE
            ))
        })?;

        // Real rows per snapshot; snapshots holding only interpolated rows
        // keep an empty entry so their catalog is still loaded.
        let mut rows_by_snapshot: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (row, &sn) in table.snapshots.iter().enumerate() {
            let rows = rows_by_snapshot.entry(sn).or_default();
            if !table.interpolated[row] {
                rows.push(row);
            }
        }

        let mut joined = Vec::with_capacity(table.len());
        let total = rows_by_snapshot.len();
        for (i, (sn, rows)) in rows_by_snapshot.iter().enumerate() {
            tracing::info!(snapshot = sn, "Reading snapshot catalog {}/{}", i + 1, total);
            let records = loader.load(&snapshot.with_snapshot(*sn))?;
            for &row in rows {
                let id = table.node_ids[row];
                let position = positions[row];
                let entry = usize::try_from(position)
                    .ok()
                    .and_then(|p| records.get(p));
                let Some((subgroup, properties)) = entry else {
                    return Err(Error::integrity(format!(
                        "Node {} points at catalog row {} but snapshot {} has {} rows",
                        id,
                        position,
                        sn,
                        records.len()
                    )));
                };
                joined.push(JoinedHalo {
                    id,
                    group: GroupIdentity::new(*sn, table.groups[row], subgroup),
                    properties: *properties,
                });
            }
        }
        Self::from_joined(table, joined, phantom_threshold)
    }

    fn from_joined(
        table: NodeTable,
        joined: Vec<JoinedHalo>,
        phantom_threshold: NodeId,
    ) -> Result<Self> {
        let n = table.len();
        let mut descendants = FxHashMap::default();
        let mut weights = FxHashMap::default();
        descendants.reserve(n);
        weights.reserve(n);
        let mut progenitors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();

        for row in 0..n {
            let id = table.node_ids[row];
            let descendant = table.descendants[row];
            if descendants.insert(id, descendant).is_some() {
                return Err(Error::integrity(format!(
                    "Node id {} appears more than once in the tree table",
                    id
                )));
            }
            weights.insert(id, table.weights[row]);
            if descendant != id {
                progenitors.entry(descendant).or_default().push(id);
            }
        }

        let mut groups = FxHashMap::default();
        let mut properties = FxHashMap::default();
        groups.reserve(joined.len());
        properties.reserve(joined.len());
        for halo in joined {
            groups.insert(halo.id, halo.group);
            properties.insert(halo.id, halo.properties);
        }

        let mut index = Self {
            phantom_threshold,
            order: table.node_ids,
            descendants,
            weights,
            groups,
            properties,
            reverse: FxHashMap::default(),
            progenitors,
        };
        index.rebuild_reverse()?;

        tracing::info!(
            nodes = index.len(),
            cataloged = index.cataloged_len(),
            roots = index.reverse.len(),
            "Built halo catalog index"
        );
        Ok(index)
    }

    /// Whether `id` names a real cataloged node rather than a phantom.
    #[inline]
    pub fn is_real_id(&self, id: NodeId) -> bool {
        (0..self.phantom_threshold).contains(&id)
    }

    fn rebuild_reverse(&mut self) -> Result<()> {
        let mut reverse = FxHashMap::default();
        reverse.reserve(self.groups.len());
        for (&id, &group) in &self.groups {
            if !self.is_real_id(id) {
                continue;
            }
            if let Some(other) = reverse.insert(group, id) {
                return Err(Error::integrity(format!(
                    "Group {} is carried by both node {} and node {}",
                    group, other, id
                )));
            }
        }
        self.reverse = reverse;
        Ok(())
    }

    /// Keep only cataloged nodes whose mass of `particle_type` is strictly
    /// greater than `cut`. Tree linkage is untouched, so trees still pass
    /// through filtered-out progenitors; only roots are restricted.
    ///
    /// This is destructive; clone the index first to keep the unfiltered one.
    pub fn mass_filter(&mut self, cut: f64, particle_type: usize) -> Result<FilterSummary> {
        if particle_type >= PARTICLE_TYPES {
            return Err(Error::invalid_argument(format!(
                "Particle type {} out of range 0..{}",
                particle_type, PARTICLE_TYPES
            )));
        }
        let before = self.properties.len();
        let survivors: FxHashSet<NodeId> = self
            .properties
            .iter()
            .filter(|(_, props)| props.mass_by_type[particle_type] > cut)
            .map(|(&id, _)| id)
            .collect();

        self.properties.retain(|id, _| survivors.contains(id));
        self.groups.retain(|id, _| survivors.contains(id));
        self.rebuild_reverse()?;

        let summary = FilterSummary {
            before,
            after: self.properties.len(),
        };
        tracing::info!(
            cut,
            particle_type,
            before = summary.before,
            after = summary.after,
            "Applied mass filter"
        );
        Ok(summary)
    }

    pub fn phantom_threshold(&self) -> NodeId {
        self.phantom_threshold
    }

    /// Number of nodes in the tree table.
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of nodes with catalog data (after any filtering).
    #[inline]
    pub fn cataloged_len(&self) -> usize {
        self.properties.len()
    }

    /// Node ids in table order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    #[inline]
    pub fn descendant(&self, id: NodeId) -> Option<NodeId> {
        self.descendants.get(&id).copied()
    }

    #[inline]
    pub fn weight(&self, id: NodeId) -> Option<i64> {
        self.weights.get(&id).copied()
    }

    #[inline]
    pub fn group(&self, id: NodeId) -> Option<GroupIdentity> {
        self.groups.get(&id).copied()
    }

    #[inline]
    pub fn properties(&self, id: NodeId) -> Option<&HaloProperties> {
        self.properties.get(&id)
    }

    /// The real node carrying `group`, if any.
    #[inline]
    pub fn lookup(&self, group: &GroupIdentity) -> Option<NodeId> {
        self.reverse.get(group).copied()
    }

    /// Group identities that can name a tree root, sorted.
    pub fn root_groups(&self) -> Vec<GroupIdentity> {
        let mut groups: Vec<GroupIdentity> = self.reverse.keys().copied().collect();
        groups.sort_unstable();
        groups
    }

    /// Nodes whose descendant is `id`, in table order, excluding `id` itself.
    #[inline]
    pub fn progenitors(&self, id: NodeId) -> &[NodeId] {
        self.progenitors.get(&id).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HaloRecords;

    fn table(rows: &[(NodeId, i32, i64, NodeId, i64, bool)]) -> NodeTable {
        NodeTable {
            node_ids: rows.iter().map(|r| r.0).collect(),
            snapshots: rows.iter().map(|r| r.1).collect(),
            groups: rows.iter().map(|r| r.2).collect(),
            descendants: rows.iter().map(|r| r.3).collect(),
            weights: rows.iter().map(|r| r.4).collect(),
            interpolated: rows.iter().map(|r| r.5).collect(),
            catalog_positions: None,
        }
    }

    fn catalog(entries: &[(NodeId, i64, f64)]) -> SubhaloCatalog {
        let records = HaloRecords::new(
            entries.iter().map(|e| e.1).collect(),
            entries.iter().map(|e| [0.0, e.2, 0.0, 0.0, 0.0, 0.0]).collect(),
            vec![[0.0; 3]; entries.len()],
            vec![[0.0; 3]; entries.len()],
        )
        .unwrap();
        SubhaloCatalog::new(entries.iter().map(|e| e.0).collect(), records).unwrap()
    }

    #[test]
    fn test_join_skips_interpolated_and_uncataloged_nodes() {
        let t = table(&[
            (1, 10, 0, 1, 0, false),
            (2, 9, 0, 1, 5, false),
            (3, 9, 1, 1, 2, true),
        ]);
        // Node 3 is interpolated; node 9 is not in the tree table
        let c = catalog(&[(1, 0, 10.0), (3, 0, 1.0), (9, 0, 1.0), (2, 4, 3.0)]);
        let index = HaloCatalogIndex::from_subhalo_catalog(t, &c, 100).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.cataloged_len(), 2);
        assert_eq!(index.group(2), Some(GroupIdentity::new(9, 0, 4)));
        assert_eq!(index.group(3), None);
        assert_eq!(index.lookup(&GroupIdentity::new(10, 0, 0)), Some(1));
        assert_eq!(index.descendant(3), Some(1));
        assert_eq!(index.weight(3), Some(2));
    }

    #[test]
    fn test_progenitors_exclude_self_links() {
        let t = table(&[
            (1, 10, 0, 1, 0, false),
            (2, 9, 0, 1, 5, false),
            (3, 9, 1, 1, 2, false),
        ]);
        let index = HaloCatalogIndex::from_subhalo_catalog(t, &catalog(&[]), 100).unwrap();
        assert_eq!(index.progenitors(1), &[2, 3]);
        assert!(index.progenitors(2).is_empty());
    }

    #[test]
    fn test_duplicate_node_id_is_integrity_error() {
        let t = table(&[(1, 10, 0, 1, 0, false), (1, 9, 0, 1, 5, false)]);
        let err = HaloCatalogIndex::from_subhalo_catalog(t, &catalog(&[]), 100).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn test_duplicate_group_is_integrity_error() {
        let t = table(&[(1, 10, 0, 1, 0, false), (2, 10, 0, 1, 5, false)]);
        let c = catalog(&[(1, 0, 1.0), (2, 0, 1.0)]);
        let err = HaloCatalogIndex::from_subhalo_catalog(t, &c, 100).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn test_mismatched_columns_are_schema_errors() {
        let mut t = table(&[(1, 10, 0, 1, 0, false)]);
        t.weights.push(3);
        let err = HaloCatalogIndex::from_subhalo_catalog(t, &catalog(&[]), 100).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_mass_filter_rejects_unknown_particle_type() {
        let t = table(&[(1, 10, 0, 1, 0, false)]);
        let mut index =
            HaloCatalogIndex::from_subhalo_catalog(t, &catalog(&[(1, 0, 1.0)]), 100).unwrap();
        let err = index.mass_filter(0.0, PARTICLE_TYPES).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(index.cataloged_len(), 1);
    }

    #[test]
    fn test_snapshot_join_loads_each_catalog_once() {
        use std::cell::RefCell;

        // Snapshots interleave in table order; node 5 is interpolated and
        // snapshot 7 holds nothing else
        let mut t = table(&[
            (1, 9, 0, 1, 0, false),
            (2, 8, 0, 1, 4, false),
            (3, 9, 1, 1, 0, false),
            (4, 8, 1, 1, 2, false),
            (5, 7, 0, 2, 1, true),
        ]);
        t.catalog_positions = Some(vec![1, 0, 0, 1, 0]);

        let loads = RefCell::new(Vec::new());
        let loader = |id: &SnapshotId| {
            loads.borrow_mut().push(id.snapshot);
            let subgroups = match id.snapshot {
                9 => vec![30, 10],
                8 => vec![20, 40],
                _ => Vec::new(),
            };
            let n = subgroups.len();
            HaloRecords::new(subgroups, vec![[1.0; 6]; n], vec![[0.0; 3]; n], vec![[0.0; 3]; n])
        };
        let index = HaloCatalogIndex::from_snapshot_catalogs(
            &SnapshotId::new("sim", 9),
            t,
            &loader,
            100,
        )
        .unwrap();

        assert_eq!(loads.into_inner(), vec![7, 8, 9]);
        assert_eq!(index.cataloged_len(), 4);
        assert_eq!(index.group(1), Some(GroupIdentity::new(9, 0, 10)));
        assert_eq!(index.group(2), Some(GroupIdentity::new(8, 0, 20)));
        assert_eq!(index.group(3), Some(GroupIdentity::new(9, 1, 30)));
        assert_eq!(index.group(4), Some(GroupIdentity::new(8, 1, 40)));
        assert_eq!(index.group(5), None);
    }

    #[test]
    fn test_default_options() {
        let options = IndexOptions::default();
        assert_eq!(options.workers, 1);
        assert_eq!(options.phantom_threshold, DEFAULT_PHANTOM_THRESHOLD);
        assert_eq!(IndexOptions::new().with_workers(4).workers, 4);
    }
}
