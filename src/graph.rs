//! Static task graph and its scheduler.
//!
//! Pipelines are declared with two combinators, [`series`] and [`parallel`],
//! which build a directed acyclic graph of task nodes where an edge means
//! "must precede". Execution is a parallel topological walk: every node whose
//! dependencies have completed is spawned on the thread pool immediately, so
//! independent branches overlap while series edges hold strict order.
//!
//! Failure semantics: the first task error stops all further spawns. Tasks
//! already in flight run to completion, then the pipeline returns the first
//! error observed in completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::channel;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::Environment;
use crate::error::PipelineError;
use crate::io::as_overhead;
use crate::task::Task;

/// A composition node: a single task, or an ordered/concurrent group.
pub enum Step {
    Leaf(Arc<dyn Task>),
    Series(Vec<Step>),
    Parallel(Vec<Step>),
}

/// Wrap a task as a composition leaf.
pub fn leaf(task: impl Task + 'static) -> Step {
    Step::Leaf(Arc::new(task))
}

/// Sequential composition: each child starts only after the previous one
/// completed successfully.
pub fn series(steps: impl IntoIterator<Item = Step>) -> Step {
    Step::Series(steps.into_iter().collect())
}

/// Concurrent composition: all children start together.
pub fn parallel(steps: impl IntoIterator<Item = Step>) -> Step {
    Step::Parallel(steps.into_iter().collect())
}

/// A named, executable task graph.
pub struct Pipeline {
    name: &'static str,
    graph: DiGraph<Arc<dyn Task>, ()>,
}

impl Pipeline {
    pub fn new(name: &'static str, step: Step) -> Self {
        let mut graph = DiGraph::new();
        lower(&mut graph, step);
        Self { name, graph }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of task nodes in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Execute the graph to completion on the rayon thread pool.
    pub fn run(&self, env: &Environment) -> Result<(), PipelineError> {
        // Primarily a cycle check; the combinators only ever produce DAGs.
        petgraph::algo::toposort(&self.graph, None).map_err(|_| PipelineError::Cycle)?;

        let total = self.graph.node_count() as u64;
        if total == 0 {
            return Ok(());
        }

        // Map from a dependency to the nodes that depend on it.
        let mut dependents: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        for edge in self.graph.raw_edges() {
            dependents
                .entry(edge.source())
                .or_default()
                .push(edge.target());
        }

        let mut dependency_counts: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|i| {
                (
                    i,
                    self.graph
                        .neighbors_directed(i, petgraph::Direction::Incoming)
                        .count(),
                )
            })
            .collect();

        let bar = ProgressBar::new(total).with_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("invalid progress bar template")
                .progress_chars("#>-"),
        );

        let s = Instant::now();
        let mut in_flight = 0usize;
        let mut failure: Option<PipelineError> = None;

        // The coordination loop blocks on a plain mpsc channel, so it must
        // stay on the calling thread; handing it to a pool worker starves a
        // single-threaded pool.
        rayon::in_place_scope(|scope| {
            let (sender, receiver) = channel::<(NodeIndex, anyhow::Result<()>)>();

            let spawn_task = |in_flight: &mut usize, index: NodeIndex| {
                let task = self.graph[index].clone();
                let sender = sender.clone();
                *in_flight += 1;

                scope.spawn(move |_| {
                    tracing::debug!("running task '{}'", task.name());
                    let result = task.run(env);
                    // The receiver outlives every worker inside this scope.
                    let _ = sender.send((index, result));
                });
            };

            // Seed the tasks with no predecessors.
            for index in self.graph.node_indices() {
                if dependency_counts[&index] == 0 {
                    spawn_task(&mut in_flight, index);
                }
            }

            while in_flight > 0 {
                let (index, result) = receiver.recv().expect("worker channel closed");
                in_flight -= 1;
                bar.inc(1);

                match result {
                    Ok(()) => {
                        if failure.is_some() {
                            // Aborting; drain without unlocking anything new.
                            continue;
                        }

                        if let Some(unlocked) = dependents.get(&index) {
                            for &next in unlocked {
                                let count = dependency_counts
                                    .get_mut(&next)
                                    .expect("dependent node missing from graph");
                                *count -= 1;
                                if *count == 0 {
                                    spawn_task(&mut in_flight, next);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        if failure.is_none() {
                            failure = Some(PipelineError::Task(self.graph[index].name(), e));
                        }
                    }
                }
            }
        });

        bar.finish_with_message(format!("Finished '{}' {}", self.name, as_overhead(s)));

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Flatten a [`Step`] tree into the graph. Returns the entry and exit node
/// sets of the lowered fragment.
fn lower(
    graph: &mut DiGraph<Arc<dyn Task>, ()>,
    step: Step,
) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
    match step {
        Step::Leaf(task) => {
            let index = graph.add_node(task);
            (vec![index], vec![index])
        }
        Step::Series(steps) => {
            let mut entries = Vec::new();
            let mut exits: Vec<NodeIndex> = Vec::new();

            for step in steps {
                let (step_entries, step_exits) = lower(graph, step);

                // Empty groups contribute no nodes; skipping them keeps the
                // previous exits alive so the ordering edge still lands on
                // the next real fragment.
                if step_entries.is_empty() {
                    continue;
                }

                if entries.is_empty() {
                    entries = step_entries;
                } else {
                    for &from in &exits {
                        for &to in &step_entries {
                            graph.add_edge(from, to, ());
                        }
                    }
                }

                exits = step_exits;
            }

            (entries, exits)
        }
        Step::Parallel(steps) => {
            let mut entries = Vec::new();
            let mut exits = Vec::new();

            for step in steps {
                let (step_entries, step_exits) = lower(graph, step);
                entries.extend(step_entries);
                exits.extend(step_exits);
            }

            (entries, exits)
        }
    }
}
