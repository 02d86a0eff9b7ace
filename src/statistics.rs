use crate::odds::{StratifiedTables, Table2x2};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

/// Result of a test of equal odds ratios across strata
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomogeneityResult {
    pub statistic: f64,
    pub p_value: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomogeneityError {
    #[error("pooled odds ratio {0} makes the expected-count quadratic degenerate")]
    DegeneratePooledOddsRatio(f64),
    #[error("negative discriminant {0} when solving for expected counts")]
    NegativeDiscriminant(f64),
    #[error("non-positive or non-finite variance in stratum {0}")]
    InvalidVariance(usize),
    #[error("non-finite test statistic")]
    NonFiniteStatistic,
}

/// A stratified test of equal odds ratios across 2×2 tables.
pub trait HomogeneityTest: Sync {
    fn test_equal_odds(&self, tables: &StratifiedTables) -> Result<HomogeneityResult, HomogeneityError>;
}

/// Breslow-Day test of homogeneity of odds ratios, optionally with Tarone's
/// adjustment.
///
/// Each table is `[[a, b], [c, d]]`. Under the Mantel-Haenszel pooled odds
/// ratio `r`, the expected count of cell `a` solves
/// `(1 - r)e² + (r(a+b + a+c) + d - a)e - r(a+b)(a+c) = 0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreslowDay {
    pub tarone: bool,
}

impl BreslowDay {
    pub fn new(tarone: bool) -> Self {
        Self { tarone }
    }
}

/// Mantel-Haenszel pooled odds ratio `Σ(ad/n) / Σ(bc/n)`
pub fn mantel_haenszel_odds_ratio(tables: &[Table2x2]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for t in tables {
        let n = t[0][0] + t[0][1] + t[1][0] + t[1][1];
        num += t[0][0] * t[1][1] / n;
        den += t[0][1] * t[1][0] / n;
    }
    num / den
}

impl HomogeneityTest for BreslowDay {
    fn test_equal_odds(&self, tables: &StratifiedTables) -> Result<HomogeneityResult, HomogeneityError> {
        let strata = &tables.strata;
        let r = mantel_haenszel_odds_ratio(strata);

        let qa = 1.0 - r;
        if !r.is_finite() || qa == 0.0 {
            return Err(HomogeneityError::DegeneratePooledOddsRatio(r));
        }

        let mut statistic = 0.0;
        let mut sum_observed = 0.0;
        let mut sum_expected = 0.0;
        let mut sum_variance = 0.0;

        for (k, t) in strata.iter().enumerate() {
            let a = t[0][0];
            let apb = t[0][0] + t[0][1];
            let apc = t[0][0] + t[1][0];
            let dma = t[1][1] - t[0][0];

            let qb = r * (apb + apc) + dma;
            let qc = -r * apb * apc;
            let disc = qb * qb - 4.0 * qa * qc;
            if disc < 0.0 {
                return Err(HomogeneityError::NegativeDiscriminant(disc));
            }
            let e = (-qb + disc.sqrt()) / (2.0 * qa);

            let inv = 1.0 / e + 1.0 / (apc - e) + 1.0 / (apb - e) + 1.0 / (dma + e);
            let v = 1.0 / inv;
            if !v.is_finite() || v <= 0.0 {
                return Err(HomogeneityError::InvalidVariance(k));
            }

            statistic += (a - e).powi(2) / v;
            sum_observed += a;
            sum_expected += e;
            sum_variance += v;
        }

        if self.tarone {
            statistic -= (sum_observed - sum_expected).powi(2) / sum_variance;
        }
        if !statistic.is_finite() {
            return Err(HomogeneityError::NonFiniteStatistic);
        }

        let df = (strata.len() - 1) as f64;
        let chi2 = ChiSquared::new(df).map_err(|_| HomogeneityError::NonFiniteStatistic)?;
        let p_value = 1.0 - chi2.cdf(statistic.max(0.0));

        Ok(HomogeneityResult {
            statistic,
            p_value,
        })
    }
}
