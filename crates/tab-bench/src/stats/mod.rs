//! Statistics for the convergence check and report summaries
//!
//! # Examples
//!
//! ```
//! use tab_bench::stats::{standardized_difference, LatencySummary};
//!
//! let previous = [10.0, 12.0, 11.0, 10.0, 13.0, 12.0];
//! let latest = [11.0, 11.0, 10.0, 12.0, 12.0, 11.0];
//!
//! let stat = standardized_difference(&latest, &previous).unwrap();
//! assert!(stat < 1.0);
//!
//! let summary = LatencySummary::from_samples(&latest).unwrap();
//! println!("p50: {}ms, p95: {}ms", summary.p50, summary.p95);
//! ```

pub mod summary;
pub mod welch;

pub use summary::{percentile, LatencySummary};
pub use welch::{mean, population_variance, standardized_difference};
