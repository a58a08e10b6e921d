//! Readers for the model-description inputs the core consumes.

mod network_file;

pub use network_file::{parse_network_file, ParsedNetwork};
