use std::env;
use std::error::Error;
use std::fs;
use std::process;
use std::time::Duration;

use dotenv::dotenv;
use log::info;
use rust_decimal::Decimal;

use dynamic_pricing::{
    create_solver, price_routes, Network, NetworkInput, PricingConfig, RouteBatch, RunReport,
    SolverType,
};

fn main() {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: dynamic-pricing <network.json> <routes.json> <results.json>");
        process::exit(2);
    }

    if let Err(err) = run(&args[1], &args[2], &args[3]) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(network_path: &str, routes_path: &str, results_path: &str) -> Result<(), Box<dyn Error>> {
    let input: NetworkInput = serde_json::from_str(&fs::read_to_string(network_path)?)?;
    let batch: RouteBatch = serde_json::from_str(&fs::read_to_string(routes_path)?)?;

    let mut network = Network::build(&input)?;
    info!(
        "network parsed: {} nodes, {} edges",
        network.node_count(),
        network.edge_count()
    );

    let solver_name = env::var("SOLVER").unwrap_or_else(|_| "glpk".to_string());
    let solver_type = SolverType::from_str(&solver_name)
        .ok_or_else(|| format!("unknown solver backend {solver_name}"))?;
    let solver = create_solver(solver_type);
    let config = config_from_env();

    info!(
        "pricing {} route requests with {}",
        batch.routes.len(),
        solver.name()
    );
    let report = price_routes(&mut network, &batch.routes, solver.as_ref(), &config)?;
    info!(
        "run complete: {} priced, {} rejected",
        report.metrics.new_routes_priced, report.metrics.routes_rejected
    );

    append_report(results_path, &report)?;
    Ok(())
}

fn config_from_env() -> PricingConfig {
    let defaults = PricingConfig::default();
    PricingConfig {
        max_cycle_len: env::var("DP_MAX_CYCLE_LEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_cycle_len),
        max_path_hops: env::var("DP_MAX_PATH_HOPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_path_hops),
        max_paths_per_pair: env::var("DP_MAX_PATHS_PER_PAIR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_paths_per_pair),
        discount_floor: env::var("DP_DISCOUNT_FLOOR")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
            .unwrap_or(defaults.discount_floor),
        price_ceiling: env::var("DP_PRICE_CEILING")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
            .unwrap_or(defaults.price_ceiling),
        solver_timeout: match env::var("DP_SOLVER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.solver_timeout,
        },
    }
}

/// Append the run report to the `runs` array of the results file, creating
/// the file if it does not exist yet.
fn append_report(path: &str, report: &RunReport) -> Result<(), Box<dyn Error>> {
    let mut document: serde_json::Value = match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)?,
        Err(_) => serde_json::json!({ "runs": [] }),
    };
    if !document.is_object() {
        document = serde_json::json!({ "runs": [] });
    }
    if !document
        .get("runs")
        .map(serde_json::Value::is_array)
        .unwrap_or(false)
    {
        document["runs"] = serde_json::json!([]);
    }
    if let Some(runs) = document["runs"].as_array_mut() {
        runs.push(serde_json::to_value(report)?);
    }
    fs::write(path, serde_json::to_string_pretty(&document)?)?;
    Ok(())
}
