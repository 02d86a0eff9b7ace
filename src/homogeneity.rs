use crate::contingency::ContingencyCells;
use crate::odds::{select, Selection, StratifiedTables};
use crate::statistics::HomogeneityTest;
use crate::types::TestOutcome;

/// Test continuity-corrected tables. Errors and p-values outside [0, 1] become
/// `TestFailed`.
pub fn run_test<T: HomogeneityTest + ?Sized>(tables: &StratifiedTables, test: &T) -> TestOutcome {
    match test.test_equal_odds(tables) {
        Ok(result) if (0.0..=1.0).contains(&result.p_value) => TestOutcome::PValue(result.p_value),
        Ok(result) => {
            log::debug!("Homogeneity test returned invalid p-value {}", result.p_value);
            TestOutcome::TestFailed
        }
        Err(e) => {
            log::debug!("Homogeneity test failed: {}", e);
            TestOutcome::TestFailed
        }
    }
}

/// Odds filter, then the homogeneity test if the configuration is eligible.
pub fn evaluate<T: HomogeneityTest + ?Sized>(cells: &ContingencyCells, test: &T) -> TestOutcome {
    match select(cells) {
        Selection::Eligible(tables) => run_test(&tables, test),
        Selection::NotEligible => TestOutcome::NotEligible,
    }
}
