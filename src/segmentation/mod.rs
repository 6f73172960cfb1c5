//! Series segmentation and trend classification
//!
//! - [`bottom_up_merge`] builds the multi-level segment hierarchy
//! - [`classify`] enriches it with relative slopes and trend categories
//! - [`fit`] holds the least-squares helpers both rely on

pub mod bottom_up;
pub mod classify;
pub mod fit;

pub use bottom_up::bottom_up_merge;
pub use classify::{categorize, classify, max_abs_slope, relative_slope, DEFAULT_FLAT_THRESHOLD};
pub use fit::{build_segment, fit_line, validate_series, LineFit};
