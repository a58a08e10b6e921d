//! Fundamental types: the tip-set bitmask and the sample-label index.

mod labels;
mod tipset;

pub use labels::LabelIndex;
pub use tipset::{is_singleton, tip_bit, union_mask, TipId, MAX_SAMPLES};
