//! Snapshot path configuration.
//!
//! Resolves an opaque snapshot identifier to the directory and file stems of
//! its merger tree (and optionally subfind) filesets. The default resolver is
//! a TOML file:
//!
//! ```toml
//! [[snapshots]]
//! simulation = "L0012N0188_REFERENCE"
//! snapshot = 28
//! dir = "/data/L0012N0188/trees/treedir_028"
//! tree_stem = "tree_028"
//! subfind_stem = "subfind_028"   # optional
//! ```
//!
//! Relative `dir` values are taken relative to the config file's directory.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Identifies one snapshot of one simulation run.
///
/// `simulation` is an opaque label; only `snapshot` is interpreted, so that
/// per-snapshot catalogs can be located by retargeting the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotId {
    pub simulation: String,
    pub snapshot: i32,
}

impl SnapshotId {
    pub fn new(simulation: impl Into<String>, snapshot: i32) -> Self {
        Self {
            simulation: simulation.into(),
            snapshot,
        }
    }

    /// The same simulation at another snapshot.
    pub fn with_snapshot(&self, snapshot: i32) -> Self {
        Self {
            simulation: self.simulation.clone(),
            snapshot,
        }
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:03}", self.simulation, self.snapshot)
    }
}

/// On-disk location of a snapshot's filesets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub dir: PathBuf,
    pub tree_stem: String,
    pub subfind_stem: Option<String>,
}

impl SnapshotPaths {
    pub fn new(dir: impl Into<PathBuf>, tree_stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            tree_stem: tree_stem.into(),
            subfind_stem: None,
        }
    }

    pub fn with_subfind_stem(mut self, stem: impl Into<String>) -> Self {
        self.subfind_stem = Some(stem.into());
        self
    }
}

/// Maps snapshot identifiers to file locations.
pub trait PathResolver {
    /// Unknown identifiers are [`Error::InvalidConfig`].
    fn resolve(&self, id: &SnapshotId) -> Result<SnapshotPaths>;
}

#[derive(Debug, Default, Deserialize)]
struct PathConfigFile {
    #[serde(default)]
    snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotEntry {
    simulation: String,
    snapshot: i32,
    dir: PathBuf,
    tree_stem: String,
    #[serde(default)]
    subfind_stem: Option<String>,
}

/// In-memory path table, usually loaded from a TOML file.
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    entries: HashMap<SnapshotId, SnapshotPaths>,
}

impl PathConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML path configuration. A missing file is
    /// [`Error::NotFound`]; malformed content is [`Error::Config`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(format!("Config file '{}' not found", path.display()))
            } else {
                Error::config(format!("Cannot read config file '{}': {}", path.display(), e))
            }
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, Some(base), &path.display().to_string())
    }

    /// Parse TOML content; relative directories are kept as written.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::parse(text, None, "<inline config>")
    }

    fn parse(text: &str, base: Option<&Path>, origin: &str) -> Result<Self> {
        let file: PathConfigFile =
            toml::from_str(text).map_err(|e| Error::config(format!("{}: {}", origin, e)))?;
        let mut config = Self::new();
        for entry in file.snapshots {
            let id = SnapshotId::new(entry.simulation, entry.snapshot);
            let dir = match base {
                Some(base) if entry.dir.is_relative() => base.join(&entry.dir),
                _ => entry.dir,
            };
            let paths = SnapshotPaths {
                dir,
                tree_stem: entry.tree_stem,
                subfind_stem: entry.subfind_stem,
            };
            if config.entries.insert(id.clone(), paths).is_some() {
                return Err(Error::config(format!(
                    "{}: snapshot {} defined twice",
                    origin, id
                )));
            }
        }
        Ok(config)
    }

    pub fn insert(&mut self, id: SnapshotId, paths: SnapshotPaths) {
        self.entries.insert(id, paths);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PathResolver for PathConfig {
    fn resolve(&self, id: &SnapshotId) -> Result<SnapshotPaths> {
        self.entries.get(id).cloned().ok_or_else(|| {
            Error::invalid_config(format!("Unknown snapshot {} (not defined in config)", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[[snapshots]]
simulation = "L0012N0188_REFERENCE"
snapshot = 28
dir = "/data/L0012N0188/trees/treedir_028"
tree_stem = "tree_028"

[[snapshots]]
simulation = "AP-L1-V1-hydro"
snapshot = 127
dir = "treedir_127"
tree_stem = "tree_127"
subfind_stem = "subfind_127"
"#;

    #[test]
    fn test_parse_and_resolve() {
        let config = PathConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.len(), 2);

        let paths = config
            .resolve(&SnapshotId::new("L0012N0188_REFERENCE", 28))
            .unwrap();
        assert_eq!(paths.dir, PathBuf::from("/data/L0012N0188/trees/treedir_028"));
        assert_eq!(paths.tree_stem, "tree_028");
        assert_eq!(paths.subfind_stem, None);

        let paths = config.resolve(&SnapshotId::new("AP-L1-V1-hydro", 127)).unwrap();
        assert_eq!(paths.subfind_stem.as_deref(), Some("subfind_127"));
    }

    #[test]
    fn test_unknown_snapshot_is_invalid_config() {
        let config = PathConfig::from_toml_str(CONFIG).unwrap();
        let err = config
            .resolve(&SnapshotId::new("L0012N0188_REFERENCE", 27))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_duplicate_and_malformed_entries() {
        let dup = format!("{}\n{}", CONFIG, CONFIG);
        assert!(matches!(PathConfig::from_toml_str(&dup), Err(Error::Config(_))));

        let missing_stem = "[[snapshots]]\nsimulation = \"x\"\nsnapshot = 1\ndir = \"/d\"\n";
        assert!(matches!(
            PathConfig::from_toml_str(missing_stem),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_with_snapshot_keeps_simulation() {
        let id = SnapshotId::new("AP-L1-V1-hydro", 127);
        let earlier = id.with_snapshot(90);
        assert_eq!(earlier.simulation, "AP-L1-V1-hydro");
        assert_eq!(earlier.snapshot, 90);
        assert_eq!(earlier.to_string(), "AP-L1-V1-hydro@090");
    }
}
