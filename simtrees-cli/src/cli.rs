use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simtrees", about = "Merger tree inspection for simulation outputs", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the snapshot path config (TOML)
    #[arg(long, global = true, default_value = "simtrees.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub index: IndexArgs,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

/// Which tree fileset to index and how.
#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Simulation label as written in the config
    #[arg(long, global = true)]
    pub simulation: Option<String>,

    /// Snapshot whose tree fileset is indexed
    #[arg(long, global = true)]
    pub snapshot: Option<i32>,

    /// Read workers (0 = one less than the number of cores)
    #[arg(long, global = true, default_value_t = 1)]
    pub workers: usize,

    /// Node ids at or above this value are treated as phantom nodes
    #[arg(long, global = true)]
    pub phantom: Option<i64>,

    /// Keep only halos heavier than this mass (catalog units)
    #[arg(long, global = true)]
    pub mass_cut: Option<f64>,

    /// Particle type the mass cut applies to
    #[arg(long, global = true, default_value_t = 1)]
    pub particle_type: usize,
}

/// A halo named by its group identity.
#[derive(Args, Debug, Clone, Copy)]
pub struct GroupArgs {
    /// Snapshot number of the root halo
    pub root_snapshot: i32,

    /// FoF group number
    pub group: i64,

    /// Subgroup number within the FoF group
    pub subgroup: i64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the main progenitor branch of a halo
    Trunk {
        #[command(flatten)]
        root: GroupArgs,
    },

    /// Print the full progenitor tree of a halo
    Tree {
        #[command(flatten)]
        root: GroupArgs,

        /// Only print leaf nodes
        #[arg(long)]
        leaves: bool,
    },

    /// Show index statistics
    Summary {
        /// Also list every root group identity
        #[arg(long)]
        roots: bool,
    },
}
