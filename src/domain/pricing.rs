use std::time::{Duration, Instant};

use log::{debug, info};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::constraints::{ConstraintBuilder, ConstraintSet};
use crate::domain::solver::{SolveOutcome, Solution, Solver, SolverError};
use crate::domain::validate::{validate_requests, StructuralError};
use crate::models::{Metrics, RejectedRoute, RouteRequest, RunReport};
use crate::network::{EdgeHandle, Network};

/// Tunables of the pricing engine. The cycle and path bounds keep the
/// constraint count polynomial; the discount floor and ceiling shape the
/// monotonic-consistency band.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Maximum number of edges in an enumerated cycle, including the new
    /// route itself.
    pub max_cycle_len: usize,
    /// Maximum number of edges in an existing path considered for the
    /// monotonic bound.
    pub max_path_hops: usize,
    /// Cap on enumerated cycles/paths per endpoint pair.
    pub max_paths_per_pair: usize,
    /// A new route may undercut the cheapest existing path down to this
    /// fraction of its cost.
    pub discount_floor: Decimal,
    /// Default upper bound for price variables without a request maximum.
    pub price_ceiling: Decimal,
    /// Wall-clock budget per solver invocation.
    pub solver_timeout: Option<Duration>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            max_cycle_len: 4,
            max_path_hops: 3,
            max_paths_per_pair: 8,
            discount_floor: Decimal::new(50, 2),
            price_ceiling: Decimal::from(1000),
            solver_timeout: Some(Duration::from_millis(2000)),
        }
    }
}

#[derive(Debug, Error)]
pub enum PricingError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Price a batch of route requests against a network.
///
/// Requests are solved one at a time in input order; an accepted route is
/// anchored before the next request is considered. Structural errors abort
/// before any solve, infeasible requests are rolled back and reported, and
/// a solver fault fails the whole run.
pub fn price_routes(
    network: &mut Network,
    requests: &[RouteRequest],
    solver: &dyn Solver,
    config: &PricingConfig,
) -> Result<RunReport, PricingError> {
    validate_requests(network, requests)?;

    let mut builder = ConstraintBuilder::new();
    let mut rejected: Vec<RejectedRoute> = Vec::new();
    let mut new_prices: Vec<Decimal> = Vec::new();
    let mut solve_time = Duration::ZERO;
    let mut solve_calls = 0u64;

    for request in requests {
        let pending = network
            .add_route(request)
            .map_err(StructuralError::from)?;
        let set = builder.build(network, pending, request, config);
        debug!(
            "built {} constraints over {} variables for {}->{}",
            set.constraints.len(),
            set.variables.len(),
            request.source,
            request.target
        );

        let started = Instant::now();
        let outcome = match solver.solve(&set, config.solver_timeout) {
            Ok(outcome) => outcome,
            Err(err) => {
                network.remove_pending(pending);
                return Err(err.into());
            }
        };
        solve_time += started.elapsed();
        solve_calls += 1;

        match outcome {
            SolveOutcome::Satisfiable(solution) => {
                let price = match apply_solution(network, pending, &set, &solution) {
                    Ok(price) => price,
                    Err(err) => {
                        network.remove_pending(pending);
                        return Err(err.into());
                    }
                };
                info!(
                    "priced route {}->{} at {}",
                    request.source, request.target, price
                );
                new_prices.push(price);
            }
            SolveOutcome::Unsatisfiable(core) => {
                network.remove_pending(pending);
                info!(
                    "rejected route {}->{}: no feasible price assignment",
                    request.source, request.target
                );
                rejected.push(RejectedRoute {
                    source: request.source.clone(),
                    target: request.target.clone(),
                    reason: "no feasible price assignment".to_string(),
                    core: core.constraints,
                });
            }
        }
    }

    let metrics = summarize(&new_prices, &rejected, solve_time, solve_calls);
    Ok(RunReport {
        network: network.snapshot(),
        rejected,
        metrics,
    })
}

/// Write each solved value back onto its edge and return the price assigned
/// to the pending route.
fn apply_solution(
    network: &mut Network,
    pending: EdgeHandle,
    set: &ConstraintSet,
    solution: &Solution,
) -> Result<Decimal, SolverError> {
    // The network is only mutated once the whole assignment checks out.
    let mut assignment = Vec::with_capacity(set.variables.len());
    let mut priced = None;
    for var in &set.variables {
        let value = solution
            .values
            .get(&var.name)
            .copied()
            .ok_or_else(|| SolverError::Backend {
                details: format!("solution is missing variable {}", var.name),
            })?;
        assignment.push((var.edge, value));
        if var.edge == pending {
            priced = Some(value);
        }
    }
    let priced = priced.ok_or_else(|| SolverError::Backend {
        details: "pending route has no price variable".to_string(),
    })?;
    for (edge, value) in assignment {
        network.assign_price(edge, value);
    }
    Ok(priced)
}

fn summarize(
    new_prices: &[Decimal],
    rejected: &[RejectedRoute],
    solve_time: Duration,
    solve_calls: u64,
) -> Metrics {
    let mean = if new_prices.is_empty() {
        None
    } else {
        let total: Decimal = new_prices.iter().copied().sum();
        (total / Decimal::from(new_prices.len() as u64)).to_f64()
    };
    Metrics {
        new_routes_priced: new_prices.len() as u64,
        routes_rejected: rejected.len() as u64,
        min_new_price: new_prices.iter().min().and_then(|d| d.to_f64()),
        max_new_price: new_prices.iter().max().and_then(|d| d.to_f64()),
        mean_new_price: mean,
        solve_time_ms: solve_time.as_millis() as u64,
        solve_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::solver::UnsatCore;
    use crate::models::{EdgeInput, NetworkInput};
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays a fixed sequence of solver outcomes, so pipeline behavior can
    /// be tested without a system GLPK.
    struct ScriptedSolver {
        script: Mutex<VecDeque<Result<SolveOutcome, SolverError>>>,
    }

    impl ScriptedSolver {
        fn new(outcomes: Vec<Result<SolveOutcome, SolverError>>) -> Self {
            ScriptedSolver {
                script: Mutex::new(outcomes.into()),
            }
        }

        fn satisfiable(pairs: &[(&str, Decimal)]) -> Result<SolveOutcome, SolverError> {
            let values: HashMap<String, Decimal> = pairs
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect();
            let objective = pairs.iter().map(|(_, value)| *value).sum();
            Ok(SolveOutcome::Satisfiable(Solution { values, objective }))
        }

        fn calls_left(&self) -> usize {
            self.script.lock().unwrap().len()
        }
    }

    impl Solver for ScriptedSolver {
        fn solve(
            &self,
            _constraints: &ConstraintSet,
            _timeout: Option<Duration>,
        ) -> Result<SolveOutcome, SolverError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected solve invocation")
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn network() -> Network {
        Network::build(&NetworkInput {
            nodes: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            edges: vec![
                EdgeInput {
                    source: "A".to_string(),
                    target: "B".to_string(),
                    price: Some(dec!(10)),
                    capacity: None,
                    renegotiable: false,
                },
                EdgeInput {
                    source: "B".to_string(),
                    target: "C".to_string(),
                    price: Some(dec!(5)),
                    capacity: None,
                    renegotiable: false,
                },
            ],
        })
        .unwrap()
    }

    fn request(source: &str, target: &str) -> RouteRequest {
        RouteRequest {
            source: source.to_string(),
            target: target.to_string(),
            min_price: None,
            max_price: None,
        }
    }

    #[test]
    fn test_price_routes_given_satisfiable_request_should_price_edge() {
        let mut net = network();
        let solver = ScriptedSolver::new(vec![ScriptedSolver::satisfiable(&[(
            "p_C-A",
            dec!(4.00),
        )])]);

        let report = price_routes(
            &mut net,
            &[request("C", "A")],
            &solver,
            &PricingConfig::default(),
        )
        .unwrap();

        let edge = net
            .edges()
            .find(|(_, data)| data.source == "C" && data.target == "A")
            .map(|(_, data)| data.clone())
            .unwrap();
        assert_eq!(edge.price, Some(dec!(4.00)));
        assert_eq!(report.metrics.new_routes_priced, 1);
        assert_eq!(report.metrics.routes_rejected, 0);
        assert_eq!(report.metrics.min_new_price, Some(4.0));
        assert_eq!(report.metrics.mean_new_price, Some(4.0));
        assert_eq!(report.metrics.solve_calls, 1);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_price_routes_should_not_touch_anchored_prices() {
        let mut net = network();
        let solver =
            ScriptedSolver::new(vec![ScriptedSolver::satisfiable(&[("p_C-A", dec!(0))])]);

        price_routes(
            &mut net,
            &[request("C", "A")],
            &solver,
            &PricingConfig::default(),
        )
        .unwrap();

        let anchored: Vec<Option<Decimal>> = net
            .edges()
            .filter(|(_, data)| data.origin == crate::models::EdgeOrigin::Original)
            .map(|(_, data)| data.price)
            .collect();
        assert_eq!(anchored, vec![Some(dec!(10)), Some(dec!(5))]);
    }

    #[test]
    fn test_price_routes_given_unsatisfiable_request_should_roll_back() {
        let mut net = network();
        let solver = ScriptedSolver::new(vec![Ok(SolveOutcome::Unsatisfiable(UnsatCore {
            constraints: vec!["floor A->C >= 7.50".to_string()],
        }))]);

        let report = price_routes(
            &mut net,
            &[request("A", "C")],
            &solver,
            &PricingConfig::default(),
        )
        .unwrap();

        assert!(!net.contains_edge("A", "C"));
        assert_eq!(net.edge_count(), 2);
        assert_eq!(report.metrics.new_routes_priced, 0);
        assert_eq!(report.metrics.routes_rejected, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].source, "A");
        assert_eq!(report.rejected[0].core, vec!["floor A->C >= 7.50".to_string()]);
    }

    #[test]
    fn test_price_routes_given_mixed_batch_should_report_partial_results() {
        let mut net = network();
        let solver = ScriptedSolver::new(vec![
            Ok(SolveOutcome::Unsatisfiable(UnsatCore::default())),
            ScriptedSolver::satisfiable(&[("p_C-A", dec!(2.50))]),
        ]);

        let report = price_routes(
            &mut net,
            &[request("A", "C"), request("C", "A")],
            &solver,
            &PricingConfig::default(),
        )
        .unwrap();

        assert!(!net.contains_edge("A", "C"));
        assert!(net.contains_edge("C", "A"));
        assert_eq!(report.metrics.new_routes_priced, 1);
        assert_eq!(report.metrics.routes_rejected, 1);
        assert_eq!(report.metrics.solve_calls, 2);
    }

    #[test]
    fn test_price_routes_given_structural_error_should_abort_before_solving() {
        let mut net = network();
        let solver = ScriptedSolver::new(vec![]);

        let result = price_routes(
            &mut net,
            &[request("A", "Z")],
            &solver,
            &PricingConfig::default(),
        );

        assert!(matches!(result, Err(PricingError::Structural(_))));
        assert_eq!(net.edge_count(), 2);
        assert_eq!(solver.calls_left(), 0);
    }

    #[test]
    fn test_price_routes_given_solver_error_should_fail_run_and_roll_back() {
        let mut net = network();
        let solver = ScriptedSolver::new(vec![Err(SolverError::Backend {
            details: "simplex exploded".to_string(),
        })]);

        let result = price_routes(
            &mut net,
            &[request("C", "A")],
            &solver,
            &PricingConfig::default(),
        );

        assert!(matches!(result, Err(PricingError::Solver(_))));
        assert!(!net.contains_edge("C", "A"));
        assert_eq!(net.edge_count(), 2);
    }

    #[test]
    fn test_price_routes_given_incomplete_solution_should_fail_run() {
        let mut net = network();
        let solver = ScriptedSolver::new(vec![ScriptedSolver::satisfiable(&[(
            "p_wrong-name",
            dec!(1),
        )])]);

        let result = price_routes(
            &mut net,
            &[request("C", "A")],
            &solver,
            &PricingConfig::default(),
        );

        assert!(matches!(
            result,
            Err(PricingError::Solver(SolverError::Backend { .. }))
        ));
        assert!(!net.contains_edge("C", "A"));
    }
}
