use std::collections::HashMap;
use std::collections::VecDeque;
use std::num::NonZeroUsize;

use log::warn;
use lru::LruCache;
use petgraph::stable_graph::NodeIndex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::pricing::PricingConfig;
use crate::models::{EdgeOrigin, ObjectiveOwned, RouteRequest, SolverDirection};
use crate::network::{EdgeData, EdgeHandle, Network};

const CHEAPEST_CACHE_SIZE: usize = 256;
// Upper limit to prevent runaway graph walks on dense networks.
const MAX_SEARCH_STEPS: usize = 100_000;

/// Solver-level unknown bound one-to-one to an unresolved edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceVariable {
    pub name: String,
    pub edge: EdgeHandle,
    pub lower: Decimal,
    pub upper: Decimal,
}

/// Comparison operator for a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    LessEqual,
    GreaterEqual,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Every price variable is non-negative.
    Positivity,
    /// Signed price sum around a cycle through the new route must be >= 0.
    CycleNonNegative,
    /// A direct route must not exceed the cheapest existing path.
    DirectCeiling,
    /// A direct route must not undercut the discount floor.
    DiscountFloor,
}

/// A single linear constraint `sum(coeff_i * x_i) <op> rhs` over sparse
/// variable terms. The label identifies the constraint in logs and in
/// unsatisfiable cores.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub label: String,
    pub terms: Vec<(usize, Decimal)>,
    pub sense: ConstraintSense,
    pub rhs: Decimal,
}

impl Constraint {
    pub fn geq(
        kind: ConstraintKind,
        label: String,
        terms: Vec<(usize, Decimal)>,
        rhs: Decimal,
    ) -> Self {
        Constraint {
            kind,
            label,
            terms,
            sense: ConstraintSense::GreaterEqual,
            rhs,
        }
    }

    pub fn leq(
        kind: ConstraintKind,
        label: String,
        terms: Vec<(usize, Decimal)>,
        rhs: Decimal,
    ) -> Self {
        Constraint {
            kind,
            label,
            terms,
            sense: ConstraintSense::LessEqual,
            rhs,
        }
    }
}

/// Ordered constraint system for one solve invocation, consumed exactly once.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    pub variables: Vec<PriceVariable>,
    pub constraints: Vec<Constraint>,
    pub objective: ObjectiveOwned,
    pub direction: SolverDirection,
}

#[derive(Debug)]
struct PathState {
    node: NodeIndex,
    edges: Vec<EdgeHandle>,
    nodes: Vec<NodeIndex>,
    hops: usize,
}

/// Derives the constraint system for one pending route against a network.
///
/// Holds an LRU memo of cheapest anchored paths; anchored edges never change
/// within a run, so entries stay valid across the whole batch.
pub struct ConstraintBuilder {
    cheapest_cache: LruCache<(NodeIndex, NodeIndex), Option<Decimal>>,
}

impl Default for ConstraintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintBuilder {
    pub fn new() -> Self {
        ConstraintBuilder {
            cheapest_cache: LruCache::new(
                NonZeroUsize::new(CHEAPEST_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            ),
        }
    }

    /// Walk the network and emit the constraint set for `pending`, the edge
    /// inserted for `request`.
    pub fn build(
        &mut self,
        network: &Network,
        pending: EdgeHandle,
        request: &RouteRequest,
        config: &PricingConfig,
    ) -> ConstraintSet {
        // One variable per unresolved edge, in edge insertion order.
        let mut variables = Vec::new();
        let mut column: HashMap<EdgeHandle, usize> = HashMap::new();
        for (handle, data) in network.edges() {
            if data.is_anchored() {
                continue;
            }
            let (lower, upper) = if handle == pending {
                (
                    request.min_price.unwrap_or(Decimal::ZERO).max(Decimal::ZERO),
                    request
                        .max_price
                        .map_or(config.price_ceiling, |max| max.min(config.price_ceiling)),
                )
            } else {
                (Decimal::ZERO, config.price_ceiling)
            };
            column.insert(handle, variables.len());
            variables.push(PriceVariable {
                name: format!("p_{}-{}", data.source, data.target),
                edge: handle,
                lower,
                upper,
            });
        }

        let mut constraints = Vec::new();
        for (idx, var) in variables.iter().enumerate() {
            constraints.push(Constraint::geq(
                ConstraintKind::Positivity,
                format!("positivity {}", var.name),
                vec![(idx, Decimal::ONE)],
                Decimal::ZERO,
            ));
        }
        self.push_cycle_constraints(network, pending, &column, config, &mut constraints);
        self.push_monotonic_constraints(network, pending, &column, config, &mut constraints);

        let objective: ObjectiveOwned = variables
            .iter()
            .map(|var| (var.name.clone(), 1.0))
            .collect();

        ConstraintSet {
            variables,
            constraints,
            objective,
            direction: SolverDirection::Minimize,
        }
    }

    /// For every simple cycle through the pending edge within the length
    /// bound, the signed sum of prices around the cycle must be >= 0.
    fn push_cycle_constraints(
        &mut self,
        network: &Network,
        pending: EdgeHandle,
        column: &HashMap<EdgeHandle, usize>,
        config: &PricingConfig,
        constraints: &mut Vec<Constraint>,
    ) {
        let Some(data) = network.edge(pending) else {
            return;
        };
        let (Some(from), Some(to)) = (
            network.index_of(&data.source),
            network.index_of(&data.target),
        ) else {
            return;
        };
        if config.max_cycle_len < 2 {
            return;
        }
        let returns = simple_paths(
            network,
            to,
            from,
            config.max_cycle_len - 1,
            config.max_paths_per_pair,
            |handle, _| handle != pending,
        );
        for path in returns {
            let mut terms = vec![(column[&pending], Decimal::ONE)];
            let mut fixed = Decimal::ZERO;
            let mut stops = vec![data.source.clone(), data.target.clone()];
            for handle in &path {
                let Some(edge) = network.edge(*handle) else {
                    continue;
                };
                stops.push(edge.target.clone());
                match column.get(handle) {
                    Some(&col) => terms.push((col, Decimal::ONE)),
                    None => fixed += edge.price.unwrap_or(Decimal::ZERO),
                }
            }
            constraints.push(Constraint::geq(
                ConstraintKind::CycleNonNegative,
                format!("cycle {}", stops.join("->")),
                terms,
                -fixed,
            ));
        }
    }

    /// A new direct route may not exceed the cheapest pre-existing path
    /// between its endpoints, nor undercut it below the discount floor.
    fn push_monotonic_constraints(
        &mut self,
        network: &Network,
        pending: EdgeHandle,
        column: &HashMap<EdgeHandle, usize>,
        config: &PricingConfig,
        constraints: &mut Vec<Constraint>,
    ) {
        let Some(data) = network.edge(pending) else {
            return;
        };
        let Some(cheapest) = self.cheapest_anchored_path(network, &data.source, &data.target, config)
        else {
            return;
        };
        let col = column[&pending];
        let floor = (config.discount_floor * cheapest)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        constraints.push(Constraint::leq(
            ConstraintKind::DirectCeiling,
            format!("direct {}->{} <= {}", data.source, data.target, cheapest),
            vec![(col, Decimal::ONE)],
            cheapest,
        ));
        constraints.push(Constraint::geq(
            ConstraintKind::DiscountFloor,
            format!("floor {}->{} >= {}", data.source, data.target, floor),
            vec![(col, Decimal::ONE)],
            floor,
        ));
    }

    /// Cheapest multi-hop path over original anchored edges, memoized.
    fn cheapest_anchored_path(
        &mut self,
        network: &Network,
        source: &str,
        target: &str,
        config: &PricingConfig,
    ) -> Option<Decimal> {
        let from = network.index_of(source)?;
        let to = network.index_of(target)?;
        if let Some(cached) = self.cheapest_cache.get(&(from, to)) {
            return *cached;
        }
        let paths = simple_paths(
            network,
            from,
            to,
            config.max_path_hops,
            config.max_paths_per_pair,
            |_, data| data.is_anchored() && data.origin == EdgeOrigin::Original,
        );
        let cheapest = paths
            .iter()
            .map(|path| {
                path.iter()
                    .filter_map(|handle| network.edge(*handle))
                    .map(|edge| edge.price.unwrap_or(Decimal::ZERO))
                    .sum::<Decimal>()
            })
            .min();
        self.cheapest_cache.put((from, to), cheapest);
        cheapest
    }
}

/// Find simple paths between two nodes with a maximum number of hops, in a
/// depth-first manner. Admission of each edge is delegated to `admit`; the
/// search stops after `max_paths` results or when the step guard trips.
fn simple_paths(
    network: &Network,
    from: NodeIndex,
    to: NodeIndex,
    max_hops: usize,
    max_paths: usize,
    admit: impl Fn(EdgeHandle, &EdgeData) -> bool,
) -> Vec<Vec<EdgeHandle>> {
    let mut paths = Vec::new();
    let mut stack = VecDeque::new();
    stack.push_back(PathState {
        node: from,
        edges: Vec::new(),
        nodes: vec![from],
        hops: 0,
    });

    let mut steps = 0usize;
    while let Some(PathState { node, edges, nodes, hops }) = stack.pop_back() {
        if steps > MAX_SEARCH_STEPS {
            warn!("path search truncated after {MAX_SEARCH_STEPS} steps");
            break;
        }
        steps += 1;

        if node == to && !edges.is_empty() {
            paths.push(edges);
            if paths.len() >= max_paths {
                break;
            }
            continue;
        }
        if hops >= max_hops {
            continue;
        }
        for (handle, next) in network.outgoing(node) {
            let Some(data) = network.edge(handle) else {
                continue;
            };
            if !admit(handle, data) {
                continue;
            }
            if next != to && nodes.contains(&next) {
                continue;
            }
            let mut new_edges = edges.clone();
            new_edges.push(handle);
            let mut new_nodes = nodes.clone();
            new_nodes.push(next);
            stack.push_back(PathState {
                node: next,
                edges: new_edges,
                nodes: new_nodes,
                hops: hops + 1,
            });
        }
    }
    paths
}
