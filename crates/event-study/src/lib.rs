//! event-study: table loading and alignment math for the study figures.
//!
//! Loads the precomputed CSV tables, reindexes cohort snapshots onto
//! relative week offsets around each treatment week, and computes the
//! rolling means, size-weighted averages, and decline / DiD statistics
//! the renderers plot.

pub mod align;
pub mod error;
pub mod rolling;
pub mod tables;

pub use align::*;
pub use error::*;
pub use rolling::*;
pub use tables::*;
