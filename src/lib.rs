//! # dynamic-pricing
//!
//! Constraint-based pricing of newly proposed direct routes in a priced
//! transportation network. The network and each route request are compiled
//! into a linear constraint system (price positivity, arbitrage-free cycles,
//! monotonic consistency against existing paths), an external solver finds a
//! consistent assignment, and solved prices are written back onto the graph
//! together with run metrics.
//!
//! ## Example
//!
//! ```no_run
//! use dynamic_pricing::{
//!     create_solver, price_routes, Network, NetworkInput, PricingConfig, RouteRequest,
//!     SolverType,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let input: NetworkInput = serde_json::from_str(r#"{
//!         "nodes": ["A", "B", "C"],
//!         "edges": [
//!             {"source": "A", "target": "B", "price": "10"},
//!             {"source": "B", "target": "C", "price": "5"}
//!         ]
//!     }"#)?;
//!     let mut network = Network::build(&input)?;
//!
//!     let requests = vec![RouteRequest {
//!         source: "C".to_string(),
//!         target: "A".to_string(),
//!         min_price: None,
//!         max_price: None,
//!     }];
//!
//!     let solver = create_solver(SolverType::Glpk);
//!     let report = price_routes(
//!         &mut network,
//!         &requests,
//!         solver.as_ref(),
//!         &PricingConfig::default(),
//!     )?;
//!     println!("priced {} routes", report.metrics.new_routes_priced);
//!     Ok(())
//! }
//! ```

pub mod constraints;
pub mod convert;
pub mod domain;
pub mod models;
pub mod network;

pub use constraints::{
    Constraint, ConstraintBuilder, ConstraintKind, ConstraintSense, ConstraintSet, PriceVariable,
};
pub use domain::pricing::{price_routes, PricingConfig, PricingError};
pub use domain::solver::{SolveOutcome, Solution, Solver, SolverError, UnsatCore};
pub use domain::solver_factory::{create_solver, SolverType};
pub use domain::solvers::GlpkSolver;
pub use domain::validate::{validate_requests, StructuralError};
pub use models::{
    EdgeInput, EdgeOrigin, EdgeSnapshot, Metrics, NetworkInput, NetworkSnapshot, ObjectiveOwned,
    RejectedRoute, RouteBatch, RouteRequest, RunReport, SolverDirection,
};
pub use network::{EdgeData, EdgeHandle, Network, NetworkError};
