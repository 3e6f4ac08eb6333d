use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------- Input (wire) types: owned & serde-friendly ----------

/// A parsed network: node identifiers plus priced directed edges.
#[derive(Serialize, Deserialize, Clone)]
pub struct NetworkInput {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeInput>,
}

/// One directed edge of the input network. A missing `price` means the edge
/// is unresolved and will be priced by the solver; `renegotiable` opts a
/// priced edge back into re-solving.
#[derive(Serialize, Deserialize, Clone)]
pub struct EdgeInput {
    pub source: String,
    pub target: String,
    pub price: Option<Decimal>,
    pub capacity: Option<Decimal>,
    #[serde(default)]
    pub renegotiable: bool,
}

/// A proposed new direct route, not part of the network until solved.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RouteRequest {
    pub source: String,
    pub target: String,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

/// Ordered batch of route requests, as loaded from the routes file.
#[derive(Serialize, Deserialize, Clone)]
pub struct RouteBatch {
    pub routes: Vec<RouteRequest>,
}

// ---------- Solver-facing types ----------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SolverDirection {
    Maximize,
    Minimize,
}

pub type ObjectiveOwned = HashMap<String, f64>;

// ---------- Output types ----------

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    /// Part of the network as supplied by the caller.
    Original,
    /// Inserted by an accepted route request.
    Added,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EdgeSnapshot {
    pub source: String,
    pub target: String,
    pub price: Option<Decimal>,
    pub capacity: Option<Decimal>,
    pub origin: EdgeOrigin,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NetworkSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeSnapshot>,
}

/// A route request the solver could not price consistently. `core` lists the
/// labels of a minimal set of mutually conflicting constraints when the
/// backend can produce one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RejectedRoute {
    pub source: String,
    pub target: String,
    pub reason: String,
    pub core: Vec<String>,
}

/// Observational per-run metrics; never fed back into a solve.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    pub new_routes_priced: u64,
    pub routes_rejected: u64,
    pub min_new_price: Option<f64>,
    pub max_new_price: Option<f64>,
    pub mean_new_price: Option<f64>,
    pub solve_time_ms: u64,
    pub solve_calls: u64,
}

/// Final result of one pricing run: the updated network, the rejections, and
/// the metrics. The serialization layer owns persisting this.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunReport {
    pub network: NetworkSnapshot,
    pub rejected: Vec<RejectedRoute>,
    pub metrics: Metrics,
}
