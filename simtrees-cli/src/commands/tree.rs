use colored::Colorize;
use serde::Serialize;
use simtrees_core::{GroupIdentity, NodeId, TreeBuilder};

use crate::commands::trunk::GroupIdentityOutput;
use crate::context::IndexContext;
use crate::error::CliResult;
use crate::output::{self, NodeRecord};

#[derive(Serialize)]
struct TreeOutput {
    root: GroupIdentityOutput,
    depth: usize,
    size: usize,
    trunk: Vec<NodeId>,
    nodes: Vec<NodeRecord>,
}

pub fn run(
    ctx: &IndexContext,
    root: GroupIdentity,
    leaves_only: bool,
    particle_type: usize,
    json: bool,
) -> CliResult<()> {
    let tree = TreeBuilder::new(&ctx.index).build_tree(&root)?;
    let ids: Vec<NodeId> = if leaves_only {
        tree.leaves().map(|node| node.id()).collect()
    } else {
        tree.node_ids().to_vec()
    };
    let nodes = output::tree_records(&ctx.index, &tree, &ids, particle_type);

    if json {
        return output::print_json(&TreeOutput {
            root: tree.group().into(),
            depth: tree.depth(),
            size: tree.len(),
            trunk: tree.trunk().to_vec(),
            nodes,
        });
    }

    println!(
        "{} {}: {} nodes, {} generations, trunk length {}",
        "Tree of".green().bold(),
        tree.group(),
        tree.len(),
        tree.depth(),
        tree.trunk().len()
    );
    output::print_node_table(&nodes);
    Ok(())
}
