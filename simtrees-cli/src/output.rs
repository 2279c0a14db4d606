use colored::Colorize;
use serde::Serialize;
use simtrees_core::{HaloCatalogIndex, NodeId, Tree, TreeNode};

use crate::error::CliResult;

/// One tree node as printed by `trunk` and `tree`.
#[derive(Debug, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub snapshot: Option<i32>,
    pub group: Option<i64>,
    pub subgroup: Option<i64>,
    pub descendant: Option<NodeId>,
    pub progenitors: Vec<NodeId>,
    pub phantom: bool,
    pub mass: Option<f64>,
}

impl NodeRecord {
    pub fn new(index: &HaloCatalogIndex, node: &TreeNode, particle_type: usize) -> Self {
        let group = index.group(node.id());
        Self {
            id: node.id(),
            snapshot: group.map(|g| g.snapshot),
            group: group.map(|g| g.group),
            subgroup: group.map(|g| g.subgroup),
            descendant: node.descendant(),
            progenitors: node.progenitors().to_vec(),
            phantom: !index.is_real_id(node.id()),
            mass: index
                .properties(node.id())
                .and_then(|p| p.mass(particle_type)),
        }
    }
}

pub fn tree_records<'a>(
    index: &HaloCatalogIndex,
    tree: &Tree,
    ids: impl IntoIterator<Item = &'a NodeId>,
    particle_type: usize,
) -> Vec<NodeRecord> {
    ids.into_iter()
        .filter_map(|id| tree.node(*id))
        .map(|node| NodeRecord::new(index, node, particle_type))
        .collect()
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn print_node_table(records: &[NodeRecord]) {
    let header = format!(
        "{:>20} {:>5} {:>8} {:>8} {:>12} {:>6}",
        "node", "snap", "group", "subgrp", "mass", "progs"
    );
    println!("{}", header.bold());
    for r in records {
        let id = format!("{:>20}", r.id);
        let id = if r.phantom { id.dimmed() } else { id.normal() };
        println!(
            "{} {:>5} {:>8} {:>8} {:>12} {:>6}",
            id,
            or_dash(r.snapshot),
            or_dash(r.group),
            or_dash(r.subgroup),
            or_dash(r.mass.map(|m| format!("{:.4e}", m))),
            r.progenitors.len()
        );
    }
}
