use crate::classifier::IndividualGroups;
use crate::contingency::{build_cells, CellLayout};
use crate::genotypes::GenotypeSource;
use crate::homogeneity::evaluate;
use crate::statistics::HomogeneityTest;
use crate::types::{FocalGenotype, Locus, LocusPair, TestOutcome};
use indicatif::ProgressBar;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// window 1 from the first range, window 2 from the second
    Forward,
    /// window 1 from the second range, window 2 from the first
    Reverse,
}

impl Orientation {
    pub fn label(&self) -> &'static str {
        match self {
            Orientation::Forward => "forward",
            Orientation::Reverse => "reverse",
        }
    }
}

/// The set of locus pairs scanned for the null distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPlan {
    /// Every (range1 × range2) pair, then every (range2 × range1) pair
    Bidirectional { range1: Range<usize>, range2: Range<usize> },
    /// The uniparental marker against every window in `range`
    Uniparental { range: Range<usize> },
}

impl ScanPlan {
    pub fn len(&self) -> usize {
        match self {
            ScanPlan::Bidirectional { range1, range2 } => 2 * range1.len() * range2.len(),
            ScanPlan::Uniparental { range } => range.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th pair in scan order. Forward pairs iterate window 1 in the
    /// outer loop; reverse pairs follow all forward pairs.
    pub fn pair_at(&self, index: usize) -> (Orientation, LocusPair) {
        match self {
            ScanPlan::Bidirectional { range1, range2 } => {
                let half = range1.len() * range2.len();
                if index < half {
                    let w1 = range1.start + index / range2.len();
                    let w2 = range2.start + index % range2.len();
                    (Orientation::Forward, LocusPair::windows(w1, w2))
                } else {
                    let j = index - half;
                    let w1 = range2.start + j / range1.len();
                    let w2 = range1.start + j % range1.len();
                    (Orientation::Reverse, LocusPair::windows(w1, w2))
                }
            }
            ScanPlan::Uniparental { range } => (
                Orientation::Forward,
                LocusPair::new(Locus::Uniparental, Locus::Window(range.start + index)),
            ),
        }
    }
}

/// Smallest value of a null scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NullMinimum {
    /// Smallest genuine p-value
    Genuine(f64),
    /// No pair produced a p-value: `TestFailed` if any test failed, otherwise `NotEligible`
    AllSentinel(TestOutcome),
}

impl NullMinimum {
    pub fn outcome(&self) -> TestOutcome {
        match self {
            NullMinimum::Genuine(p) => TestOutcome::PValue(*p),
            NullMinimum::AllSentinel(o) => *o,
        }
    }

    pub fn is_genuine(&self) -> bool {
        matches!(self, NullMinimum::Genuine(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullCounts {
    pub genuine: usize,
    pub not_eligible: usize,
    pub failed: usize,
}

impl NullCounts {
    pub fn total(&self) -> usize {
        self.genuine + self.not_eligible + self.failed
    }
}

/// Outcomes of a null scan, stored in scan order.
#[derive(Debug, Clone)]
pub struct NullScan {
    pub plan: ScanPlan,
    pub outcomes: Vec<TestOutcome>,
}

impl NullScan {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Orientation, LocusPair, TestOutcome)> + '_ {
        self.outcomes.iter().enumerate().map(move |(i, &outcome)| {
            let (orientation, pair) = self.plan.pair_at(i);
            (orientation, pair, outcome)
        })
    }

    /// Sentinels never beat a genuine p-value. Ties keep the earliest pair.
    ///
    /// With no genuine p-value the smaller legacy sentinel wins: a failure
    /// (-999) over not-eligible (999) for bidirectional plans, not-eligible (1)
    /// over a failure for uniparental plans.
    pub fn minimum(&self) -> NullMinimum {
        let mut best: Option<f64> = None;
        let mut any_failed = false;
        let mut any_not_eligible = false;
        for outcome in &self.outcomes {
            match outcome {
                TestOutcome::PValue(p) => {
                    if best.map_or(true, |b| *p < b) {
                        best = Some(*p);
                    }
                }
                TestOutcome::TestFailed => any_failed = true,
                TestOutcome::NotEligible => any_not_eligible = true,
            }
        }
        if let Some(p) = best {
            return NullMinimum::Genuine(p);
        }
        let failed_wins = match self.plan {
            ScanPlan::Bidirectional { .. } => any_failed,
            ScanPlan::Uniparental { .. } => any_failed && !any_not_eligible,
        };
        if failed_wins {
            NullMinimum::AllSentinel(TestOutcome::TestFailed)
        } else {
            NullMinimum::AllSentinel(TestOutcome::NotEligible)
        }
    }

    pub fn counts(&self) -> NullCounts {
        let mut counts = NullCounts::default();
        for outcome in &self.outcomes {
            match outcome {
                TestOutcome::PValue(_) => counts.genuine += 1,
                TestOutcome::NotEligible => counts.not_eligible += 1,
                TestOutcome::TestFailed => counts.failed += 1,
            }
        }
        counts
    }
}

/// Pool the empirical sterile and fertile ids, shuffle, and re-split keeping
/// the sterile group size.
pub fn shuffle_labels<R: Rng>(groups: &IndividualGroups, rng: &mut R) -> (Vec<usize>, Vec<usize>) {
    let mut pooled: Vec<usize> = groups.sterile.clone();
    pooled.extend(groups.fertile_ids());
    pooled.shuffle(rng);
    let fertile = pooled.split_off(groups.sterile.len());
    (pooled, fertile)
}

/// Evaluate every pair of `plan` against the given (shuffled) groups.
///
/// Pairs are independent and evaluated in parallel; outcomes are collected in
/// scan order.
#[allow(clippy::too_many_arguments)]
pub fn scan<T: HomogeneityTest + ?Sized>(
    source: &GenotypeSource<'_>,
    plan: &ScanPlan,
    focal: FocalGenotype,
    sterile: &[usize],
    fertile: &[usize],
    layout: CellLayout,
    test: &T,
    progress: Option<&ProgressBar>,
) -> NullScan {
    let outcomes: Vec<TestOutcome> = (0..plan.len())
        .into_par_iter()
        .map(|i| {
            let (_, pair) = plan.pair_at(i);
            let cells = build_cells(source, pair, focal, sterile, fertile, layout);
            let outcome = evaluate(&cells, test);
            if let Some(pb) = progress {
                pb.inc(1);
            }
            outcome
        })
        .collect();

    NullScan {
        plan: plan.clone(),
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FertileGroups;
    use crate::genotypes::GenotypeMatrix;
    use crate::statistics::BreslowDay;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn random_matrix(n: usize, windows: usize, seed: u64) -> GenotypeMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows: Vec<Vec<u8>> = (0..n)
            .map(|_| (0..windows).map(|_| rng.gen_range(0..3u8)).collect())
            .collect();
        GenotypeMatrix::from_individual_rows(&rows).unwrap()
    }

    #[test]
    fn test_bidirectional_pair_order() {
        let plan = ScanPlan::Bidirectional { range1: 0..2, range2: 2..5 };
        assert_eq!(plan.len(), 12);
        let pairs: Vec<_> = (0..plan.len()).map(|i| plan.pair_at(i)).collect();
        assert_eq!(pairs[0], (Orientation::Forward, LocusPair::windows(0, 2)));
        assert_eq!(pairs[2], (Orientation::Forward, LocusPair::windows(0, 4)));
        assert_eq!(pairs[3], (Orientation::Forward, LocusPair::windows(1, 2)));
        assert_eq!(pairs[6], (Orientation::Reverse, LocusPair::windows(2, 0)));
        assert_eq!(pairs[7], (Orientation::Reverse, LocusPair::windows(2, 1)));
        assert_eq!(pairs[11], (Orientation::Reverse, LocusPair::windows(4, 1)));

        let unique: HashSet<_> = pairs.iter().map(|(_, p)| (p.locus1, p.locus2)).collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_uniparental_plan() {
        let plan = ScanPlan::Uniparental { range: 3..7 };
        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan.pair_at(1).1,
            LocusPair::new(Locus::Uniparental, Locus::Window(4))
        );
    }

    #[test]
    fn test_scan_collects_every_pair_in_order() {
        let m = random_matrix(60, 7, 3);
        let src = GenotypeSource::new(&m);
        let plan = ScanPlan::Bidirectional { range1: 0..3, range2: 3..7 };
        let sterile: Vec<usize> = (0..15).collect();
        let fertile: Vec<usize> = (15..60).collect();
        let focal = FocalGenotype::new(0, 2);
        let test = BreslowDay::default();

        let null = scan(&src, &plan, focal, &sterile, &fertile, CellLayout::SterileRows, &test, None);
        assert_eq!(null.len(), 2 * 3 * 4);
        assert_eq!(null.counts().total(), null.len());

        for (i, (_, pair, outcome)) in null.entries().enumerate() {
            let cells = build_cells(&src, pair, focal, &sterile, &fertile, CellLayout::SterileRows);
            assert_eq!(cells.total(), 60);
            assert_eq!(evaluate(&cells, &test), outcome, "pair {}", i);
        }
    }

    #[test]
    fn test_minimum_prefers_genuine() {
        let plan = ScanPlan::Uniparental { range: 0..5 };
        let null = NullScan {
            plan,
            outcomes: vec![
                TestOutcome::NotEligible,
                TestOutcome::PValue(0.4),
                TestOutcome::TestFailed,
                TestOutcome::PValue(0.02),
                TestOutcome::PValue(0.02),
            ],
        };
        assert_eq!(null.minimum(), NullMinimum::Genuine(0.02));
        let counts = null.counts();
        assert_eq!((counts.genuine, counts.not_eligible, counts.failed), (3, 1, 1));
    }

    #[test]
    fn test_minimum_all_sentinel() {
        let mixed = vec![TestOutcome::NotEligible, TestOutcome::TestFailed];

        let bidirectional = NullScan {
            plan: ScanPlan::Bidirectional { range1: 0..1, range2: 1..2 },
            outcomes: mixed.clone(),
        };
        assert_eq!(bidirectional.minimum(), NullMinimum::AllSentinel(TestOutcome::TestFailed));
        assert!(!bidirectional.minimum().is_genuine());

        // Uniparental: not-eligible (1) is the smaller legacy value
        let uniparental = NullScan {
            plan: ScanPlan::Uniparental { range: 0..2 },
            outcomes: mixed,
        };
        assert_eq!(uniparental.minimum(), NullMinimum::AllSentinel(TestOutcome::NotEligible));

        let all_failed = NullScan {
            plan: ScanPlan::Uniparental { range: 0..2 },
            outcomes: vec![TestOutcome::TestFailed; 2],
        };
        assert_eq!(all_failed.minimum(), NullMinimum::AllSentinel(TestOutcome::TestFailed));

        let ineligible = NullScan {
            plan: ScanPlan::Bidirectional { range1: 0..1, range2: 1..2 },
            outcomes: vec![TestOutcome::NotEligible; 2],
        };
        assert_eq!(ineligible.minimum(), NullMinimum::AllSentinel(TestOutcome::NotEligible));
    }

    #[test]
    fn test_shuffle_preserves_sizes_and_members() {
        let groups = IndividualGroups {
            sterile: vec![0, 4, 9],
            fertile: FertileGroups::Split {
                focal: vec![1, 2],
                nonfocal: vec![5, 6, 7],
            },
        };
        let mut rng = StdRng::seed_from_u64(21);
        let (sterile, fertile) = shuffle_labels(&groups, &mut rng);
        assert_eq!(sterile.len(), 3);
        assert_eq!(fertile.len(), 5);

        let mut all: Vec<usize> = sterile.iter().chain(fertile.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 4, 5, 6, 7, 9]);
    }
}
