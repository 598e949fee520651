//! Graph inspection.
//!
//! [`Graph::explain`](crate::Graph::explain) walks the DAG behind a graph and
//! lists its nodes in topological order (parents before children), each with its
//! label and parent ids. The runner uses the same walk to find the input names a
//! run must bind before anything is pulled.
//!
//! ```
//! use compgraph::Graph;
//! use compgraph::operations::reducers::Count;
//!
//! let g = Graph::from_source("docs").sort(&["word"]).reduce(Count::new("count"), &["word"]);
//! let plan = g.explain();
//! assert_eq!(plan.steps.len(), 3);
//! assert_eq!(plan.required_sources(), ["docs".to_string()]);
//! println!("{plan}");
//! ```

use crate::node::{Node, NodeKind};
use crate::node_id::{NodeId, NodeLabel};
use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;

/// One node of a plan.
#[derive(Clone, Debug)]
pub struct PlanStep {
    pub id: NodeId,
    pub label: NodeLabel,
    /// Parent ids; for joins, left then right.
    pub parents: Vec<NodeId>,
    /// Whether the step consumes its whole input before emitting.
    pub barrier: bool,
}

/// Topologically ordered description of a graph.
#[derive(Clone, Debug)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    sources: Vec<String>,
}

impl Plan {
    pub(crate) fn build(output: &Arc<Node>) -> Self {
        let mut steps = Vec::new();
        let mut seen = HashSet::new();
        let mut sources = BTreeSet::new();
        visit(output, &mut seen, &mut steps, &mut sources);
        Self {
            steps,
            sources: sources.into_iter().collect(),
        }
    }

    /// Distinct input names the graph reads, sorted.
    #[must_use]
    pub fn required_sources(&self) -> &[String] {
        &self.sources
    }

    /// Number of steps that buffer their whole input.
    #[must_use]
    pub fn barriers(&self) -> usize {
        self.steps.iter().filter(|s| s.barrier).count()
    }
}

fn visit(
    node: &Arc<Node>,
    seen: &mut HashSet<NodeId>,
    steps: &mut Vec<PlanStep>,
    sources: &mut BTreeSet<String>,
) {
    if !seen.insert(node.id) {
        return;
    }
    for parent in node.parents() {
        visit(parent, seen, steps, sources);
    }
    if let NodeKind::Source { name } = &node.kind {
        sources.insert(name.clone());
    }
    steps.push(PlanStep {
        id: node.id,
        label: node.label(),
        parents: node.parents().iter().map(|p| p.id).collect(),
        barrier: node.is_barrier(),
    });
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "╔═══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(
            f,
            "║                       GRAPH PLAN                              ║"
        )?;
        writeln!(
            f,
            "╚═══════════════════════════════════════════════════════════════╝"
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "┌─ SUMMARY ────────────────────────────────────────────────────┐"
        )?;
        writeln!(f, "│ Nodes:             {:>10}", self.steps.len())?;
        writeln!(f, "│ Barrier Ops:       {:>10}", self.barriers())?;
        writeln!(f, "│ Inputs:            {}", self.sources.join(", "))?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "┌─ EXECUTION STEPS ────────────────────────────────────────────┐"
        )?;
        for step in &self.steps {
            let barrier_marker = if step.barrier { " [BARRIER]" } else { "" };
            writeln!(f, "│")?;
            writeln!(f, "│ {}{barrier_marker}", step.label)?;
            if !step.parents.is_empty() {
                let parents: Vec<String> = step.parents.iter().map(ToString::to_string).collect();
                writeln!(f, "│   ← {}", parents.join(", "))?;
            }
        }
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )
    }
}
