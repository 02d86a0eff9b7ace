use crate::classifier::{classify, BackgroundScope, ClassifierParams, FertileSplit, IndividualGroups};
use crate::contingency::{build_cells, CellLayout, ContingencyCells};
use crate::error::{PowerError, Result};
use crate::genotypes::{assign_uniparental_markers, GenotypeMatrix, GenotypeSource};
use crate::homogeneity::evaluate;
use crate::null_scan::{scan, shuffle_labels, NullMinimum, NullScan, ScanPlan};
use crate::statistics::HomogeneityTest;
use crate::types::{ChromosomeLayout, FocalGenotype, Locus, LocusPair, ScanMode, TestOutcome};
use indicatif::ProgressBar;
use rand::Rng;
use std::ops::Range;

/// Where the first incompatibility locus comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocusDraw {
    /// A window drawn uniformly from the range
    Window(Range<usize>),
    /// The individual's uniparental marker
    Uniparental,
}

/// Everything that distinguishes one test target from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDesign {
    pub mode: ScanMode,
    pub label: &'static str,
    pub locus1: LocusDraw,
    pub locus2: Range<usize>,
    pub null_plan: ScanPlan,
    pub background_scope: BackgroundScope,
    pub fertile_split: FertileSplit,
    pub layout: CellLayout,
}

impl TestDesign {
    /// Test targets run by `mode`: one for the bidirectional scans, X then
    /// autosomes for the uniparental scan.
    pub fn for_mode(mode: ScanMode, layout: &ChromosomeLayout) -> Vec<TestDesign> {
        match mode {
            ScanMode::XAutosome => vec![TestDesign {
                mode,
                label: "xa",
                locus1: LocusDraw::Window(layout.x_draw()),
                locus2: layout.autosomes(),
                null_plan: ScanPlan::Bidirectional {
                    range1: layout.x(),
                    range2: layout.autosomes(),
                },
                background_scope: BackgroundScope::DoubleFocalOnly,
                fertile_split: FertileSplit::Pooled,
                layout: CellLayout::SterileRows,
            }],
            ScanMode::AutosomeAutosome => vec![TestDesign {
                mode,
                label: "aa",
                locus1: LocusDraw::Window(layout.chr2()),
                locus2: layout.chr3(),
                null_plan: ScanPlan::Bidirectional {
                    range1: layout.chr2(),
                    range2: layout.chr3(),
                },
                background_scope: BackgroundScope::DoubleFocalOnly,
                fertile_split: FertileSplit::Pooled,
                layout: CellLayout::SterileRows,
            }],
            ScanMode::Uniparental => vec![
                Self::uniparental("uni_x", layout.x_draw(), layout.x()),
                Self::uniparental("uni_a", layout.autosomes(), layout.autosomes()),
            ],
        }
    }

    fn uniparental(label: &'static str, draw: Range<usize>, scan: Range<usize>) -> TestDesign {
        TestDesign {
            mode: ScanMode::Uniparental,
            label,
            locus1: LocusDraw::Uniparental,
            locus2: draw,
            null_plan: ScanPlan::Uniparental { range: scan },
            background_scope: BackgroundScope::AllIndividuals,
            fertile_split: FertileSplit::ByWindow1Focal,
            layout: CellLayout::GenotypeRows,
        }
    }

    pub fn needs_uniparental(&self) -> bool {
        self.locus1 == LocusDraw::Uniparental
    }

    pub fn draw_pair<R: Rng>(&self, rng: &mut R) -> LocusPair {
        let locus1 = match &self.locus1 {
            LocusDraw::Window(range) => Locus::Window(rng.gen_range(range.clone())),
            LocusDraw::Uniparental => Locus::Uniparental,
        };
        let locus2 = Locus::Window(rng.gen_range(self.locus2.clone()));
        LocusPair::new(locus1, locus2)
    }
}

/// Run-wide parameters shared by every mode
#[derive(Debug, Clone)]
pub struct PowerSettings {
    pub sterile: usize,
    pub fertile: usize,
    pub penetrance: f64,
    pub background_percent: u32,
    /// Overrides the per-mode default when set
    pub background_scope: Option<BackgroundScope>,
    pub reverse_focal: bool,
    /// Focal codes for (uniparental marker, window); required by the uniparental scan
    pub uniparental_focal: Option<FocalGenotype>,
}

impl PowerSettings {
    pub fn focal_for(&self, mode: ScanMode) -> Result<FocalGenotype> {
        match mode {
            ScanMode::XAutosome | ScanMode::AutosomeAutosome => {
                Ok(FocalGenotype::bidirectional(self.reverse_focal))
            }
            ScanMode::Uniparental => self.uniparental_focal.ok_or_else(|| {
                PowerError::InvalidParameter(
                    "the uniparental scan needs focal genotypes for both windows".to_string(),
                )
            }),
        }
    }

    pub fn classifier_params(&self, design: &TestDesign) -> ClassifierParams {
        ClassifierParams {
            sterile: self.sterile,
            fertile: self.fertile,
            penetrance: self.penetrance,
            background_percent: self.background_percent,
            background_scope: self.background_scope.unwrap_or(design.background_scope),
            fertile_split: design.fertile_split,
        }
    }
}

/// Results for one test target
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub design: TestDesign,
    pub pair: LocusPair,
    pub focal: FocalGenotype,
    pub groups: IndividualGroups,
    pub empirical_cells: ContingencyCells,
    pub empirical: TestOutcome,
    pub null: NullScan,
}

impl TargetReport {
    pub fn null_minimum(&self) -> NullMinimum {
        self.null.minimum()
    }
}

/// Results for one scan mode, targets in design order
#[derive(Debug, Clone)]
pub struct ModeReport {
    pub mode: ScanMode,
    pub targets: Vec<TargetReport>,
}

/// Draw the pair, classify, test the true pair, and scan the null.
#[allow(clippy::too_many_arguments)]
pub fn run_target<R: Rng, T: HomogeneityTest + ?Sized>(
    source: &GenotypeSource<'_>,
    design: &TestDesign,
    focal: FocalGenotype,
    params: &ClassifierParams,
    test: &T,
    rng: &mut R,
    progress: Option<&ProgressBar>,
) -> Result<TargetReport> {
    if design.needs_uniparental() && !source.has_uniparental() {
        return Err(PowerError::MissingUniparentalMarkers);
    }

    let pair = design.draw_pair(rng);
    log::debug!("{}: incompatibility pair {} x {}", design.label, pair.locus1, pair.locus2);

    let groups = classify(source, pair, focal, params, rng)?;
    let fertile = groups.fertile_ids();

    let empirical_cells = build_cells(source, pair, focal, &groups.sterile, &fertile, design.layout);
    let empirical = evaluate(&empirical_cells, test);

    let (null_sterile, null_fertile) = shuffle_labels(&groups, rng);
    let null = scan(
        source,
        &design.null_plan,
        focal,
        &null_sterile,
        &null_fertile,
        design.layout,
        test,
        progress,
    );

    let counts = null.counts();
    if counts.failed > 0 {
        log::debug!("{}: {} of {} null tests failed", design.label, counts.failed, null.len());
    }
    if !null.minimum().is_genuine() {
        log::warn!(
            "{}: no null pair produced a p-value ({} not eligible, {} failed)",
            design.label,
            counts.not_eligible,
            counts.failed
        );
    }

    Ok(TargetReport {
        design: design.clone(),
        pair,
        focal,
        groups,
        empirical_cells,
        empirical,
        null,
    })
}

/// Run every target of `mode`. The uniparental scan first assigns each
/// individual a marker, shared by its X and autosome targets.
pub fn run_mode<R: Rng, T: HomogeneityTest + ?Sized>(
    matrix: &GenotypeMatrix,
    mode: ScanMode,
    layout: &ChromosomeLayout,
    settings: &PowerSettings,
    test: &T,
    rng: &mut R,
    progress: Option<&ProgressBar>,
) -> Result<ModeReport> {
    layout.validate(matrix.n_windows())?;
    let focal = settings.focal_for(mode)?;
    let designs = TestDesign::for_mode(mode, layout);

    let markers = if designs.iter().any(TestDesign::needs_uniparental) {
        assign_uniparental_markers(matrix.n_individuals(), rng)
    } else {
        Vec::new()
    };
    let mut source = GenotypeSource::new(matrix);
    if !markers.is_empty() {
        source = source.with_uniparental(&markers);
    }

    let mut targets = Vec::with_capacity(designs.len());
    for design in &designs {
        let params = settings.classifier_params(design);
        targets.push(run_target(&source, design, focal, &params, test, rng, progress)?);
    }

    Ok(ModeReport { mode, targets })
}

/// Number of null pairs `mode` will scan, for sizing progress bars.
pub fn null_scan_size(mode: ScanMode, layout: &ChromosomeLayout) -> usize {
    TestDesign::for_mode(mode, layout)
        .iter()
        .map(|d| d.null_plan.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::BreslowDay;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_layout() -> ChromosomeLayout {
        ChromosomeLayout { x_end: 4, chr2_end: 8, chr3_end: 12 }
    }

    fn random_matrix(n: usize, windows: usize, seed: u64) -> GenotypeMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows: Vec<Vec<u8>> = (0..n)
            .map(|_| (0..windows).map(|_| rng.gen_range(0..3u8)).collect())
            .collect();
        GenotypeMatrix::from_individual_rows(&rows).unwrap()
    }

    fn settings() -> PowerSettings {
        PowerSettings {
            sterile: 5,
            fertile: 100,
            penetrance: 0.5,
            background_percent: 0,
            background_scope: None,
            reverse_focal: false,
            uniparental_focal: Some(FocalGenotype::new(0, 2)),
        }
    }

    #[test]
    fn test_designs_per_mode() {
        let layout = ChromosomeLayout::default();
        assert_eq!(TestDesign::for_mode(ScanMode::XAutosome, &layout).len(), 1);
        assert_eq!(TestDesign::for_mode(ScanMode::AutosomeAutosome, &layout).len(), 1);
        let uni = TestDesign::for_mode(ScanMode::Uniparental, &layout);
        assert_eq!(uni.len(), 2);
        assert!(uni.iter().all(TestDesign::needs_uniparental));

        assert_eq!(null_scan_size(ScanMode::XAutosome, &layout), 2 * 545 * 2034);
        assert_eq!(null_scan_size(ScanMode::AutosomeAutosome, &layout), 2 * 979 * 1055);
        assert_eq!(null_scan_size(ScanMode::Uniparental, &layout), 545 + 2034);
    }

    #[test]
    fn test_drawn_pairs_cross_chromosomes() {
        let layout = small_layout();
        let mut rng = StdRng::seed_from_u64(4);
        for mode in [ScanMode::XAutosome, ScanMode::AutosomeAutosome] {
            let design = &TestDesign::for_mode(mode, &layout)[0];
            for _ in 0..200 {
                let pair = design.draw_pair(&mut rng);
                match (pair.locus1, pair.locus2) {
                    (Locus::Window(w1), Locus::Window(w2)) => {
                        if mode == ScanMode::XAutosome {
                            assert!((1..4).contains(&w1));
                            assert!((4..12).contains(&w2));
                        } else {
                            assert!((4..8).contains(&w1));
                            assert!((8..12).contains(&w2));
                        }
                    }
                    other => panic!("unexpected pair {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_run_mode_xa() {
        let layout = small_layout();
        let m = random_matrix(400, 12, 17);
        let mut rng = StdRng::seed_from_u64(18);
        let report = run_mode(
            &m,
            ScanMode::XAutosome,
            &layout,
            &settings(),
            &BreslowDay::default(),
            &mut rng,
            None,
        )
        .unwrap();

        assert_eq!(report.targets.len(), 1);
        let target = &report.targets[0];
        assert_eq!(target.groups.sterile.len(), 5);
        assert_eq!(target.groups.fertile.len(), 100);
        assert_eq!(target.empirical_cells.total(), 105);
        assert_eq!(target.null.len(), 2 * 4 * 8);
    }

    #[test]
    fn test_run_mode_uniparental() {
        let layout = small_layout();
        let m = random_matrix(400, 12, 19);
        let mut rng = StdRng::seed_from_u64(20);
        let report = run_mode(
            &m,
            ScanMode::Uniparental,
            &layout,
            &settings(),
            &BreslowDay::default(),
            &mut rng,
            None,
        )
        .unwrap();

        let labels: Vec<_> = report.targets.iter().map(|t| t.design.label).collect();
        assert_eq!(labels, vec!["uni_x", "uni_a"]);
        assert_eq!(report.targets[0].null.len(), 4);
        assert_eq!(report.targets[1].null.len(), 8);
        for target in &report.targets {
            assert_eq!(target.pair.locus1, Locus::Uniparental);
            assert_eq!(target.empirical_cells.total(), 105);
        }
    }

    #[test]
    fn test_run_mode_is_reproducible() {
        let layout = small_layout();
        let m = random_matrix(400, 12, 23);
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            run_mode(
                &m,
                ScanMode::AutosomeAutosome,
                &layout,
                &settings(),
                &BreslowDay::default(),
                &mut rng,
                None,
            )
            .unwrap()
        };
        let a = run(5);
        let b = run(5);
        assert_eq!(a.targets[0].pair, b.targets[0].pair);
        assert_eq!(a.targets[0].groups, b.targets[0].groups);
        assert_eq!(a.targets[0].empirical, b.targets[0].empirical);
        assert_eq!(a.targets[0].null.outcomes, b.targets[0].null.outcomes);
    }

    #[test]
    fn test_uniparental_requires_focal_codes() {
        let layout = small_layout();
        let m = random_matrix(50, 12, 1);
        let mut s = settings();
        s.uniparental_focal = None;
        let mut rng = StdRng::seed_from_u64(2);
        let err = run_mode(&m, ScanMode::Uniparental, &layout, &s, &BreslowDay::default(), &mut rng, None);
        assert!(matches!(err, Err(PowerError::InvalidParameter(_))));
    }

    #[test]
    fn test_missing_markers_rejected() {
        let layout = small_layout();
        let m = random_matrix(50, 12, 1);
        let src = GenotypeSource::new(&m);
        let design = &TestDesign::for_mode(ScanMode::Uniparental, &layout)[0];
        let params = settings().classifier_params(design);
        let mut rng = StdRng::seed_from_u64(3);
        let err = run_target(
            &src,
            design,
            FocalGenotype::new(0, 2),
            &params,
            &BreslowDay::default(),
            &mut rng,
            None,
        );
        assert!(matches!(err, Err(PowerError::MissingUniparentalMarkers)));
    }

    #[test]
    fn test_layout_checked_against_matrix() {
        let m = random_matrix(50, 10, 1);
        let mut rng = StdRng::seed_from_u64(3);
        let err = run_mode(
            &m,
            ScanMode::XAutosome,
            &small_layout(),
            &settings(),
            &BreslowDay::default(),
            &mut rng,
            None,
        );
        assert!(matches!(err, Err(PowerError::InvalidLayout(_))));
    }
}
