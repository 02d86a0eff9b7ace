use crate::error::{PowerError, Result};
use std::fmt;
use std::ops::Range;

/// Homozygous reference genotype code
pub const HOM_REF: u8 = 0;
/// Homozygous alternate genotype code
pub const HOM_ALT: u8 = 2;

/// A genotyped position: either a window of the matrix or the per-individual
/// uniparental (Y/mitochondrial) marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locus {
    Window(usize),
    Uniparental,
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locus::Window(w) => write!(f, "{}", w),
            Locus::Uniparental => write!(f, "uniparental"),
        }
    }
}

/// The two loci of a candidate incompatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocusPair {
    pub locus1: Locus,
    pub locus2: Locus,
}

impl LocusPair {
    pub fn new(locus1: Locus, locus2: Locus) -> Self {
        Self { locus1, locus2 }
    }

    pub fn windows(window1: usize, window2: usize) -> Self {
        Self::new(Locus::Window(window1), Locus::Window(window2))
    }
}

/// Genotype codes that make up the incompatible combination at (locus1, locus2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocalGenotype {
    pub window1: u8,
    pub window2: u8,
}

impl FocalGenotype {
    pub fn new(window1: u8, window2: u8) -> Self {
        Self { window1, window2 }
    }

    /// Focal pair for the bidirectional scans: (0, 2), or (2, 0) when reversed.
    pub fn bidirectional(reverse: bool) -> Self {
        if reverse {
            Self::new(HOM_ALT, HOM_REF)
        } else {
            Self::new(HOM_REF, HOM_ALT)
        }
    }
}

/// Result of evaluating one locus pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestOutcome {
    /// Breslow-Day p-value
    PValue(f64),
    /// The odds filter rejected the configuration, no test was run
    NotEligible,
    /// The test was run but failed numerically
    TestFailed,
}

impl TestOutcome {
    pub fn p_value(&self) -> Option<f64> {
        match self {
            TestOutcome::PValue(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, TestOutcome::PValue(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            TestOutcome::PValue(_) => "tested",
            TestOutcome::NotEligible => "not_eligible",
            TestOutcome::TestFailed => "failed",
        }
    }
}

/// Window boundaries (zero-indexed, exclusive ends) of the X chromosome and the
/// two major autosomes. Windows must be ordered X, then chr2, then chr3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromosomeLayout {
    pub x_end: usize,
    pub chr2_end: usize,
    pub chr3_end: usize,
}

impl Default for ChromosomeLayout {
    fn default() -> Self {
        Self {
            x_end: 545,
            chr2_end: 1524,
            chr3_end: 2579,
        }
    }
}

impl ChromosomeLayout {
    pub fn x(&self) -> Range<usize> {
        0..self.x_end
    }

    pub fn chr2(&self) -> Range<usize> {
        self.x_end..self.chr2_end
    }

    pub fn chr3(&self) -> Range<usize> {
        self.chr2_end..self.chr3_end
    }

    /// Both autosomes, chr2 followed by chr3
    pub fn autosomes(&self) -> Range<usize> {
        self.x_end..self.chr3_end
    }

    /// X windows eligible as the drawn incompatibility locus. Window 0 is never drawn.
    pub fn x_draw(&self) -> Range<usize> {
        1..self.x_end
    }

    /// Check the layout against a matrix with `n_windows` windows.
    pub fn validate(&self, n_windows: usize) -> Result<()> {
        if self.x_end < 2 {
            return Err(PowerError::InvalidLayout(format!(
                "X range must hold at least two windows (x_end = {})",
                self.x_end
            )));
        }
        if self.chr2_end <= self.x_end || self.chr3_end <= self.chr2_end {
            return Err(PowerError::InvalidLayout(format!(
                "boundaries must be strictly increasing (x_end = {}, chr2_end = {}, chr3_end = {})",
                self.x_end, self.chr2_end, self.chr3_end
            )));
        }
        if self.chr3_end > n_windows {
            return Err(PowerError::InvalidLayout(format!(
                "chr3_end = {} exceeds the {} windows in the genotype matrix",
                self.chr3_end, n_windows
            )));
        }
        Ok(())
    }
}

/// Which incompatibility scan a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// X-by-autosome, scanned in both orientations
    XAutosome,
    /// chr2-by-chr3, scanned in both orientations
    AutosomeAutosome,
    /// Uniparental marker against X and against the autosomes
    Uniparental,
}

impl ScanMode {
    pub fn label(&self) -> &'static str {
        match self {
            ScanMode::XAutosome => "xa",
            ScanMode::AutosomeAutosome => "aa",
            ScanMode::Uniparental => "uniparental",
        }
    }
}
