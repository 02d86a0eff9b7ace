use crate::contingency::ContingencyCells;

/// Added to every cell before the homogeneity test
pub const CONTINUITY_CORRECTION: f64 = 0.5;

pub type Table2x2 = [[f64; 2]; 2];

/// Two continuity-corrected 2×2 strata, ready for the homogeneity test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StratifiedTables {
    pub strata: [Table2x2; 2],
}

impl StratifiedTables {
    pub fn from_cells(cells: &ContingencyCells) -> Self {
        let corrected = |t: [[u32; 2]; 2]| -> Table2x2 {
            [
                [t[0][0] as f64 + CONTINUITY_CORRECTION, t[0][1] as f64 + CONTINUITY_CORRECTION],
                [t[1][0] as f64 + CONTINUITY_CORRECTION, t[1][1] as f64 + CONTINUITY_CORRECTION],
            ]
        };
        Self {
            strata: [corrected(cells.stratum_a()), corrected(cells.stratum_b())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    Eligible(StratifiedTables),
    NotEligible,
}

/// `num / (num + other)`, or `(0.5 + num) / (num + other + 1)` when the
/// denominator is zero.
pub fn naive_odds(num: u32, other: u32) -> f64 {
    let den = num + other;
    if den == 0 {
        (0.5 + num as f64) / (den as f64 + 1.0)
    } else {
        num as f64 / den as f64
    }
}

/// The four odds `bd1/(bd1+bd2)`, `bd3/(bd3+bd4)`, `bd5/(bd5+bd6)`, `bd7/(bd7+bd8)`
pub fn odds_profile(cells: &ContingencyCells) -> [f64; 4] {
    let bd = &cells.0;
    [
        naive_odds(bd[0], bd[1]),
        naive_odds(bd[2], bd[3]),
        naive_odds(bd[4], bd[5]),
        naive_odds(bd[6], bd[7]),
    ]
}

/// Test only when the first odds is the maximum of the four. Ties go to testing.
pub fn select(cells: &ContingencyCells) -> Selection {
    let odds = odds_profile(cells);
    let max = odds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if odds[0] == max {
        Selection::Eligible(StratifiedTables::from_cells(cells))
    } else {
        Selection::NotEligible
    }
}
