pub mod classifier;
pub mod contingency;
pub mod error;
pub mod genotypes;
pub mod homogeneity;
pub mod logging;
pub mod null_scan;
pub mod odds;
pub mod output;
pub mod power;
pub mod statistics;
pub mod types;

pub use error::{PowerError, Result};

/// Print a progress line to stderr unless `quiet` is set.
#[macro_export]
macro_rules! progress {
    ($quiet:expr) => {
        if !$quiet {
            eprintln!();
        }
    };
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}
