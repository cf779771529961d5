use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Summary of FK graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for FK dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphReport {
    pub summary: FkGraphSummary,
    /// Foreign tables come before the native tables that reference them.
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic FK dependency report for a schema.
pub fn build_fk_graph_report(schema: &Schema) -> FkGraphReport {
    let graph = build_adjacency(schema);
    let nodes = graph.len();
    let edges = graph.values().map(BTreeSet::len).sum();
    let summary = FkGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => FkGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => FkGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(schema: &Schema) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table in schema.table_names() {
        graph.entry(table.to_string()).or_default();
    }

    for fk in schema.foreign_keys() {
        graph
            .entry(fk.foreign_table.clone())
            .or_default()
            .insert(fk.native_table.clone());
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = graph.keys().map(|node| (node.as_str(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());

        if let Some(targets) = graph.get(node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.as_str());
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        return Ok(order);
    }

    // Kahn leaves cycle members and everything downstream of them; keep only
    // the nodes that can reach themselves.
    let blocked: BTreeSet<&str> = indegree
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(node, _)| node)
        .collect();
    Err(blocked
        .iter()
        .filter(|node| reaches_itself(graph, &blocked, node))
        .map(|node| node.to_string())
        .collect())
}

fn reaches_itself(
    graph: &BTreeMap<String, BTreeSet<String>>,
    within: &BTreeSet<&str>,
    start: &str,
) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        let Some(targets) = graph.get(node) else {
            continue;
        };
        for target in targets {
            let target = target.as_str();
            if target == start {
                return true;
            }
            if within.contains(target) && seen.insert(target) {
                stack.push(target);
            }
        }
    }
    false
}
