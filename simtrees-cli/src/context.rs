use std::path::Path;
use std::sync::Arc;

use simtrees_core::{
    CatalogSource, FilterSummary, GroupIdentity, HaloCatalogIndex, IndexOptions, PathConfig,
    SnapshotId, DEFAULT_PHANTOM_THRESHOLD,
};
use simtrees_io::Hdf5Storage;

use crate::cli::{GroupArgs, IndexArgs};
use crate::error::{CliError, CliResult};

/// A built (and possibly filtered) index plus what produced it.
pub struct IndexContext {
    pub snapshot: SnapshotId,
    pub index: HaloCatalogIndex,
    pub filter: Option<FilterSummary>,
}

pub fn snapshot_id(args: &IndexArgs) -> CliResult<SnapshotId> {
    let simulation = args
        .simulation
        .clone()
        .ok_or_else(|| CliError::Usage("--simulation is required".to_string()))?;
    let snapshot = args
        .snapshot
        .ok_or_else(|| CliError::Usage("--snapshot is required".to_string()))?;
    Ok(SnapshotId::new(simulation, snapshot))
}

/// Load the path config, build the subfind-joined index and apply the
/// optional mass cut.
pub fn build_index(config_path: &Path, args: &IndexArgs) -> CliResult<IndexContext> {
    let snapshot = snapshot_id(args)?;
    let config = PathConfig::load(config_path)?;
    let options = IndexOptions::default()
        .with_workers(args.workers)
        .with_phantom_threshold(args.phantom.unwrap_or(DEFAULT_PHANTOM_THRESHOLD));

    let mut index = HaloCatalogIndex::build(
        &snapshot,
        &config,
        Arc::new(Hdf5Storage::new()),
        &options,
        CatalogSource::Subfind,
    )?;

    let filter = match args.mass_cut {
        Some(cut) => Some(index.mass_filter(cut, args.particle_type)?),
        None => None,
    };

    Ok(IndexContext {
        snapshot,
        index,
        filter,
    })
}

pub fn group_identity(root: &GroupArgs) -> GroupIdentity {
    GroupIdentity::new(root.root_snapshot, root.group, root.subgroup)
}
