//! Cost function for the outer optimizer.
//!
//! The optimizer proposes free-parameter vectors; each is scored by the
//! KL divergence between the observed site-pattern frequencies and the
//! simulated estimate. An infeasible vector costs infinity, which the
//! optimizer handles by rejecting the move.

use crate::errors::{ParamError, RunError};
use crate::pattern::BranchTab;
use crate::simulation::{pattern_probs, DemoModel, RunConfig};

/// Score one free-parameter vector. Low is better.
///
/// Returns `+inf` (without simulating) when the vector is infeasible:
/// out of bounds, violating the time ordering of segments, or driving a
/// constrained parameter to a non-finite value.
pub fn kl_cost(
    model: &mut DemoModel,
    observed: &BranchTab,
    free: &[f64],
    cfg: &RunConfig,
) -> Result<f64, RunError> {
    match model.set_free(free) {
        Ok(()) => {}
        Err(ParamError::NonFinite(_)) => return Ok(f64::INFINITY),
        Err(e) => return Err(e.into()),
    }
    if !model.feasible() {
        return Ok(f64::INFINITY);
    }
    let probs = pattern_probs(model, cfg)?;
    Ok(BranchTab::kl_divergence(observed, &probs)?)
}
