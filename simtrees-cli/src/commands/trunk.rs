use colored::Colorize;
use serde::Serialize;
use simtrees_core::{GroupIdentity, TreeBuilder};

use crate::context::IndexContext;
use crate::error::CliResult;
use crate::output::{self, NodeRecord};

#[derive(Serialize)]
struct TrunkOutput {
    root: GroupIdentityOutput,
    nodes: Vec<NodeRecord>,
}

#[derive(Serialize)]
pub struct GroupIdentityOutput {
    pub snapshot: i32,
    pub group: i64,
    pub subgroup: i64,
}

impl From<GroupIdentity> for GroupIdentityOutput {
    fn from(g: GroupIdentity) -> Self {
        Self {
            snapshot: g.snapshot,
            group: g.group,
            subgroup: g.subgroup,
        }
    }
}

pub fn run(
    ctx: &IndexContext,
    root: GroupIdentity,
    particle_type: usize,
    json: bool,
) -> CliResult<()> {
    let tree = TreeBuilder::new(&ctx.index).build_tree(&root)?;
    let nodes = output::tree_records(&ctx.index, &tree, tree.trunk(), particle_type);

    if json {
        return output::print_json(&TrunkOutput {
            root: tree.group().into(),
            nodes,
        });
    }

    println!(
        "{} {} ({} nodes, {} in full tree)",
        "Trunk of".green().bold(),
        tree.group(),
        nodes.len(),
        tree.len()
    );
    output::print_node_table(&nodes);
    Ok(())
}
