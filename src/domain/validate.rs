use std::collections::HashSet;

use thiserror::Error;

use crate::convert::fits_minor_units;
use crate::models::RouteRequest;
use crate::network::{Network, NetworkError};

/// Caller supplied an inconsistent network or batch; the run aborts before
/// any solve attempt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructuralError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("route {source}->{target} has invalid bounds: {details}")]
    InvalidBounds {
        source: String,
        target: String,
        details: String,
    },
}

/// Validate a whole batch of route requests against the network.
pub fn validate_requests(
    network: &Network,
    requests: &[RouteRequest],
) -> Result<(), StructuralError> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for request in requests {
        for node in [&request.source, &request.target] {
            if !network.contains_node(node) {
                return Err(NetworkError::UnknownNode {
                    source: request.source.clone(),
                    target: request.target.clone(),
                    node: node.clone(),
                }
                .into());
            }
        }
        if network.contains_edge(&request.source, &request.target)
            || !seen.insert((request.source.as_str(), request.target.as_str()))
        {
            return Err(NetworkError::DuplicateEdge {
                source: request.source.clone(),
                target: request.target.clone(),
            }
            .into());
        }

        let invalid = |details: String| StructuralError::InvalidBounds {
            source: request.source.clone(),
            target: request.target.clone(),
            details,
        };
        if let Some(max) = request.max_price {
            if max.is_sign_negative() {
                return Err(invalid(format!("maximum {max} is negative")));
            }
        }
        if let (Some(min), Some(max)) = (request.min_price, request.max_price) {
            if min > max {
                return Err(invalid(format!("minimum {min} exceeds maximum {max}")));
            }
        }
        for bound in [request.min_price, request.max_price].into_iter().flatten() {
            if !fits_minor_units(bound) {
                return Err(invalid(format!("bound {bound} is finer than 0.01")));
            }
        }
    }

    Ok(())
}
