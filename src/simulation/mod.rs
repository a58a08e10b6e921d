//! Simulation of demographic models: the model itself, the parallel
//! replicate driver, and the optimizer's cost function.

mod cost;
mod driver;
mod model;

pub use cost::kl_cost;
pub use driver::{pattern_probs, pattern_probs_serial, RunConfig};
pub use model::DemoModel;
