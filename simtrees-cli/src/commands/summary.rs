use colored::Colorize;
use serde::Serialize;

use crate::commands::trunk::GroupIdentityOutput;
use crate::context::IndexContext;
use crate::error::CliResult;
use crate::output;

#[derive(Serialize)]
struct SummaryOutput {
    snapshot: String,
    nodes: usize,
    cataloged: usize,
    roots: usize,
    phantom_threshold: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    filtered_from: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    root_groups: Vec<GroupIdentityOutput>,
}

pub fn run(ctx: &IndexContext, list_roots: bool, json: bool) -> CliResult<()> {
    let index = &ctx.index;
    let groups = index.root_groups();
    let summary = SummaryOutput {
        snapshot: ctx.snapshot.to_string(),
        nodes: index.len(),
        cataloged: index.cataloged_len(),
        roots: groups.len(),
        phantom_threshold: index.phantom_threshold(),
        filtered_from: ctx.filter.map(|f| f.before),
        root_groups: if list_roots {
            groups.iter().copied().map(Into::into).collect()
        } else {
            Vec::new()
        },
    };

    if json {
        return output::print_json(&summary);
    }

    println!("{}", "Index Summary:".bold());
    println!("  Snapshot:          {}", summary.snapshot.green());
    println!("  Tree nodes:        {}", summary.nodes);
    match ctx.filter {
        Some(filter) => println!(
            "  Cataloged halos:   {} (of {} before mass cut)",
            filter.after, filter.before
        ),
        None => println!("  Cataloged halos:   {}", summary.cataloged),
    }
    println!("  Root groups:       {}", summary.roots);
    println!("  Phantom threshold: {}", summary.phantom_threshold);

    if list_roots {
        for g in &groups {
            println!("    {}", g);
        }
    }
    Ok(())
}
