//! Dependency graph construction.
//!
//! Turns every descriptor's declared parameters into edges:
//! - constructors and factories get one edge per parameter, optional when
//!   the parameter is declared with `Param::optional` or `or_default`
//! - the context sentinel produces no edge
//! - instances are terminal nodes
//!
//! Parameters that reference a type by name are resolved here, and a
//! required edge to an unregistered key fails the build. The result is
//! checked by [`validate`](crate::validate) and sealed with a topological
//! order; after that it never changes.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};
use wasil_support::rendering::type_name_matches;

use crate::descriptor::{CreationStrategy, ParamType};
use crate::error::{
    AnnotationIssue, InvalidLifetimeError, TypeAnnotationError, UnresolvableTypeError, WasilError,
};
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::registry::Registry;

/// `consumer` needs `dependency` through parameter `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub consumer: ServiceKey,
    pub dependency: ServiceKey,
    pub optional: bool,
    pub position: usize,
    /// Whether `dependency` is registered. Only optional edges can be unmet.
    pub met: bool,
}

/// A declared parameter after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeParam {
    /// The resolving provider/scope itself.
    Context,
    Dependency(DependencyEdge),
}

/// One service in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub key: ServiceKey,
    pub lifetime: Lifetime,
    pub params: Vec<NodeParam>,
    /// The service's own factory is async.
    pub is_async: bool,
}

impl Node {
    /// Edges of this node, in parameter order.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.params.iter().filter_map(|param| match param {
            NodeParam::Dependency(edge) => Some(edge),
            NodeParam::Context => None,
        })
    }

    /// Edges whose dependency is registered.
    pub fn met_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges().filter(|edge| edge.met)
    }
}

/// Adjacency structure over registered services.
///
/// Node indices follow registration order.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    index: HashMap<ServiceKey, usize>,
    order: Vec<usize>,
    needs_async: Vec<bool>,
}

impl DependencyGraph {
    /// Derives the graph from `registry`.
    ///
    /// # Errors
    /// - [`WasilError::TypeAnnotation`]: a by-name parameter matches no
    ///   registration, or several
    /// - [`WasilError::Unresolvable`]: a required parameter is not registered
    /// - [`WasilError::InvalidLifetime`]: a pre-built instance registered
    ///   with a lifetime other than Singleton
    #[instrument(skip_all, name = "graph_build", fields(services = registry.len()))]
    pub fn build(registry: &Registry) -> Result<Self, WasilError> {
        let mut nodes = Vec::with_capacity(registry.len());

        for descriptor in registry.all() {
            let consumer = descriptor.key;

            if matches!(descriptor.strategy, CreationStrategy::FromInstance(_))
                && descriptor.lifetime != Lifetime::Singleton
            {
                return Err(WasilError::InvalidLifetime(InvalidLifetimeError::InstanceNotSingleton {
                    key: consumer,
                    lifetime: descriptor.lifetime,
                }));
            }

            let mut params = Vec::with_capacity(descriptor.strategy.params().len());
            for (position, param) in descriptor.strategy.params().iter().enumerate() {
                if param.is_context() {
                    params.push(NodeParam::Context);
                    continue;
                }

                let dependency = match param.ty() {
                    ParamType::Key(key) => key,
                    ParamType::Deferred(name) => resolve_type_name(registry, consumer, position, name)?,
                };
                let met = registry.contains(&dependency);

                if !met && !param.is_optional() {
                    warn!(consumer = %consumer, dependency = %dependency, "Missing dependency");
                    return Err(WasilError::Unresolvable(UnresolvableTypeError {
                        requested: dependency,
                        required_by: Some(consumer),
                        suggestions: registry.suggestions_for(&dependency),
                    }));
                }

                params.push(NodeParam::Dependency(DependencyEdge {
                    consumer,
                    dependency,
                    optional: param.is_optional(),
                    position,
                    met,
                }));
            }

            nodes.push(Node {
                key: consumer,
                lifetime: descriptor.lifetime,
                params,
                is_async: descriptor.strategy.is_async(),
            });
        }

        let index = nodes.iter().enumerate().map(|(i, node)| (node.key, i)).collect();
        debug!(nodes = nodes.len(), "Dependency graph built");

        Ok(Self {
            nodes,
            index,
            order: Vec::new(),
            needs_async: Vec::new(),
        })
    }

    /// Records the topological order computed by the validator and derives
    /// which services transitively need an async factory.
    pub(crate) fn seal(&mut self, order: Vec<usize>) {
        let mut needs_async = vec![false; self.nodes.len()];
        for &i in &order {
            let node = &self.nodes[i];
            needs_async[i] = node.is_async
                || node
                    .met_edges()
                    .filter_map(|edge| self.index.get(&edge.dependency))
                    .any(|&dep| needs_async[dep]);
        }
        self.order = order;
        self.needs_async = needs_async;
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn index_of(&self, key: &ServiceKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn node(&self, key: &ServiceKey) -> Option<&Node> {
        self.index_of(key).map(|i| &self.nodes[i])
    }

    /// Indices of the registered dependencies of node `i`, in parameter order.
    pub fn dependencies_of(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[i]
            .met_edges()
            .filter_map(|edge| self.index.get(&edge.dependency).copied())
    }

    /// Dependencies first; ties broken by registration order.
    pub fn topological_order(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().map(|&i| &self.nodes[i])
    }

    /// Whether resolving `key` reaches an async factory.
    pub fn needs_async(&self, key: &ServiceKey) -> bool {
        self.index_of(key)
            .and_then(|i| self.needs_async.get(i).copied())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn resolve_type_name(
    registry: &Registry,
    consumer: ServiceKey,
    position: usize,
    name: &'static str,
) -> Result<ServiceKey, WasilError> {
    let candidates: Vec<ServiceKey> = registry
        .keys()
        .filter(|key| type_name_matches(key.type_name(), name))
        .copied()
        .collect();

    match candidates.as_slice() {
        [key] => Ok(*key),
        [] => Err(WasilError::TypeAnnotation(TypeAnnotationError {
            consumer,
            position,
            issue: AnnotationIssue::Unknown(name),
        })),
        _ => Err(WasilError::TypeAnnotation(TypeAnnotationError {
            consumer,
            position,
            issue: AnnotationIssue::Ambiguous(name, candidates),
        })),
    }
}
