//! Dependency graph validation.
//!
//! Runs once, at [`ServiceCollection::build_provider()`](crate::collection::ServiceCollection::build_provider),
//! before anything is constructed:
//! - Detects circular dependencies
//! - Rejects singletons that capture shorter-lived services
//! - Computes the topological order used for eager singletons
//!
//! Unmet optional edges have nothing to capture or loop through and are
//! skipped by every pass. Met optional edges count like required ones.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::{debug, instrument, warn};

use crate::error::{CircularDependencyError, InvalidLifetimeError, WasilError};
use crate::graph::DependencyGraph;
use crate::lifetime::Lifetime;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Validates `graph` and returns its topological order (node indices,
/// dependencies first).
///
/// # Errors
/// - [`WasilError::CircularDependency`]: cycle detected
/// - [`WasilError::InvalidLifetime`]: captive dependency
#[instrument(skip_all, name = "graph_validation", fields(nodes = graph.len()))]
pub(crate) fn validate(graph: &DependencyGraph) -> Result<Vec<usize>, WasilError> {
    CycleDetector::new(graph).run()?;
    check_captive_dependencies(graph)?;
    let order = topological_order(graph);

    debug!("Dependency graph validation passed");
    Ok(order)
}

/// Three-color depth-first search over met edges.
struct CycleDetector<'g> {
    graph: &'g DependencyGraph,
    marks: Vec<Mark>,
    /// Current DFS path, for error reporting.
    path: Vec<usize>,
}

impl<'g> CycleDetector<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            marks: vec![Mark::Unvisited; graph.len()],
            path: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<(), WasilError> {
        for i in 0..self.graph.len() {
            if self.marks[i] == Mark::Unvisited {
                self.visit(i)?;
            }
        }
        Ok(())
    }

    fn visit(&mut self, i: usize) -> Result<(), WasilError> {
        match self.marks[i] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = self.path.iter().position(|&p| p == i).unwrap_or(0);
                let nodes = self.graph.nodes();
                let mut chain: Vec<_> = self.path[start..].iter().map(|&p| nodes[p].key).collect();
                chain.push(nodes[i].key);

                let err = CircularDependencyError { chain };
                warn!(cycle = ?err.chain_names(), "Circular dependency detected");
                return Err(WasilError::CircularDependency(err));
            }
            Mark::Unvisited => {}
        }

        self.marks[i] = Mark::InProgress;
        self.path.push(i);

        let dependencies: Vec<usize> = self.graph.dependencies_of(i).collect();
        for dep in dependencies {
            self.visit(dep)?;
        }

        self.path.pop();
        self.marks[i] = Mark::Done;
        Ok(())
    }
}

/// Computes, bottom-up, the set of lifetimes each node reaches. A
/// singleton reaching Scoped or Transient is a captive dependency.
///
/// Must run on an acyclic graph.
fn check_captive_dependencies(graph: &DependencyGraph) -> Result<(), WasilError> {
    let nodes = graph.nodes();
    let mut captured = vec![0u8; nodes.len()];
    // For every node and lifetime: the dependency through which that
    // lifetime is reached, `None` when it is the node's own.
    let mut via: Vec<[Option<usize>; 3]> = vec![[None; 3]; nodes.len()];
    let mut done = vec![false; nodes.len()];

    fn fill(
        graph: &DependencyGraph,
        i: usize,
        captured: &mut [u8],
        via: &mut [[Option<usize>; 3]],
        done: &mut [bool],
    ) {
        if done[i] {
            return;
        }
        done[i] = true;
        captured[i] = graph.nodes()[i].lifetime.bit();

        let dependencies: Vec<usize> = graph.dependencies_of(i).collect();
        for dep in dependencies {
            fill(graph, dep, captured, via, done);
            for (slot, lifetime) in Lifetime::ALL.iter().enumerate() {
                let bit = lifetime.bit();
                if captured[dep] & bit != 0 && captured[i] & bit == 0 {
                    captured[i] |= bit;
                    via[i][slot] = Some(dep);
                }
            }
        }
    }

    for i in 0..nodes.len() {
        fill(graph, i, &mut captured, &mut via, &mut done);
    }

    for (i, node) in nodes.iter().enumerate() {
        if node.lifetime != Lifetime::Singleton {
            continue;
        }

        let captive = Lifetime::ALL
            .iter()
            .enumerate()
            .find(|(_, lifetime)| lifetime.is_captive_in_singleton() && captured[i] & lifetime.bit() != 0);

        if let Some((slot, &lifetime)) = captive {
            let mut path = vec![(node.key, node.lifetime)];
            let mut current = i;
            while let Some(next) = via[current][slot] {
                path.push((nodes[next].key, nodes[next].lifetime));
                current = next;
            }

            warn!(
                consumer = %node.key,
                captive = %nodes[current].key,
                lifetime = %lifetime,
                "Captive dependency detected"
            );
            return Err(WasilError::InvalidLifetime(InvalidLifetimeError::CaptiveDependency { path }));
        }
    }

    Ok(())
}

/// Kahn's algorithm; among ready nodes the earliest registered goes first.
///
/// Must run on an acyclic graph.
fn topological_order(graph: &DependencyGraph) -> Vec<usize> {
    let len = graph.len();
    let mut pending = vec![0usize; len];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); len];

    for i in 0..len {
        for dep in graph.dependencies_of(i) {
            pending[i] += 1;
            dependents[dep].push(i);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..len).filter(|&i| pending[i] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(len);

    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &dependent in &dependents[i] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    order
}
