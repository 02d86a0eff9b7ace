use thiserror::Error;

/// Conditions that invalidate a run. Per-pair test failures are `TestOutcome`s.
#[derive(Error, Debug)]
pub enum PowerError {
    /// The population ran out before the sterile/fertile groups were filled
    #[error(
        "individuals exhausted before filling groups: sterile {sterile_found}/{sterile_target}, \
         fertile {fertile_found}/{fertile_target} after scanning {individuals} individuals"
    )]
    GroupsUnfillable {
        sterile_found: usize,
        sterile_target: usize,
        fertile_found: usize,
        fertile_target: usize,
        individuals: usize,
    },

    /// Malformed genotype matrix
    #[error("Invalid genotype matrix: {0}")]
    InvalidMatrix(String),

    /// Chromosome boundaries inconsistent with each other or the matrix
    #[error("Invalid chromosome layout: {0}")]
    InvalidLayout(String),

    /// Out-of-range run parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A uniparental locus was requested but no markers were assigned
    #[error("uniparental locus requested but no uniparental markers are available")]
    MissingUniparentalMarkers,
}

pub type Result<T> = std::result::Result<T, PowerError>;
