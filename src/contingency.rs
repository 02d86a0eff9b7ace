//! Stratified 2×2×2 tallies of sterile/fertile individuals by focal status at
//! two loci.
//!
//! The eight cells `bd1..bd8` form two 2×2 strata: stratum A holds individuals
//! focal at window 2, stratum B those non-focal at window 2.

use crate::genotypes::GenotypeSource;
use crate::types::{FocalGenotype, LocusPair};

const FOCAL: usize = 0;
const NONFOCAL: usize = 1;

/// Arrangement of a stratum's 2×2 table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLayout {
    /// Rows are sterile/fertile, columns window-1 focal/non-focal:
    /// `[[S·W1F, S·W1NF], [F·W1F, F·W1NF]]`
    SterileRows,
    /// Rows are window-1 focal/non-focal, columns sterile/fertile:
    /// `[[S·W1F, F·W1F], [S·W1NF, F·W1NF]]`
    GenotypeRows,
}

/// Raw counts indexed `[window1][window2]`, 0 = focal, 1 = non-focal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StratifiedCounts {
    pub sterile: [[u32; 2]; 2],
    pub fertile: [[u32; 2]; 2],
}

impl StratifiedCounts {
    pub fn total(&self) -> u32 {
        self.sterile.iter().chain(self.fertile.iter()).flatten().sum()
    }

    /// Lay the counts out as `bd1..bd8` for the given layout.
    pub fn arrange(&self, layout: CellLayout) -> ContingencyCells {
        let s = &self.sterile;
        let f = &self.fertile;
        let stratum = |w2: usize| -> [u32; 4] {
            match layout {
                CellLayout::SterileRows => [s[FOCAL][w2], s[NONFOCAL][w2], f[FOCAL][w2], f[NONFOCAL][w2]],
                CellLayout::GenotypeRows => [s[FOCAL][w2], f[FOCAL][w2], s[NONFOCAL][w2], f[NONFOCAL][w2]],
            }
        };
        let a = stratum(FOCAL);
        let b = stratum(NONFOCAL);
        ContingencyCells([a[0], a[1], a[2], a[3], b[0], b[1], b[2], b[3]])
    }
}

/// The eight Breslow-Day cells `bd1..bd8`, stored zero-indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContingencyCells(pub [u32; 8]);

impl ContingencyCells {
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Stratum A (window-2 focal) as a 2×2 table
    pub fn stratum_a(&self) -> [[u32; 2]; 2] {
        [[self.0[0], self.0[1]], [self.0[2], self.0[3]]]
    }

    /// Stratum B (window-2 non-focal) as a 2×2 table
    pub fn stratum_b(&self) -> [[u32; 2]; 2] {
        [[self.0[4], self.0[5]], [self.0[6], self.0[7]]]
    }
}

fn tally_group(
    source: &GenotypeSource<'_>,
    pair: LocusPair,
    focal: FocalGenotype,
    ids: &[usize],
    counts: &mut [[u32; 2]; 2],
) {
    for &id in ids {
        let w1 = if source.is_focal(pair.locus1, id, focal.window1) { FOCAL } else { NONFOCAL };
        let w2 = if source.is_focal(pair.locus2, id, focal.window2) { FOCAL } else { NONFOCAL };
        counts[w1][w2] += 1;
    }
}

/// Count sterile and fertile individuals by focal status at both loci.
pub fn tally(
    source: &GenotypeSource<'_>,
    pair: LocusPair,
    focal: FocalGenotype,
    sterile: &[usize],
    fertile: &[usize],
) -> StratifiedCounts {
    let mut counts = StratifiedCounts::default();
    tally_group(source, pair, focal, sterile, &mut counts.sterile);
    tally_group(source, pair, focal, fertile, &mut counts.fertile);
    counts
}

pub fn build_cells(
    source: &GenotypeSource<'_>,
    pair: LocusPair,
    focal: FocalGenotype,
    sterile: &[usize],
    fertile: &[usize],
    layout: CellLayout,
) -> ContingencyCells {
    tally(source, pair, focal, sterile, fertile).arrange(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotypes::GenotypeMatrix;

    fn matrix() -> GenotypeMatrix {
        // window 0 / window 1 per individual
        let rows = vec![
            vec![0, 2], // W1F W2F
            vec![0, 1], // W1F W2NF
            vec![1, 2], // W1NF W2F
            vec![2, 0], // W1NF W2NF
            vec![0, 2], // W1F W2F
            vec![1, 1], // W1NF W2NF
        ];
        GenotypeMatrix::from_individual_rows(&rows).unwrap()
    }

    #[test]
    fn test_sterile_rows_layout() {
        let m = matrix();
        let src = GenotypeSource::new(&m);
        let cells = build_cells(
            &src,
            LocusPair::windows(0, 1),
            FocalGenotype::new(0, 2),
            &[0, 1, 2],
            &[3, 4, 5],
            CellLayout::SterileRows,
        );
        // bd1 S W1F W2F, bd2 S W1NF W2F, bd3 F W1F W2F, bd4 F W1NF W2F,
        // bd5 S W1F W2NF, bd6 S W1NF W2NF, bd7 F W1F W2NF, bd8 F W1NF W2NF
        assert_eq!(cells.0, [1, 1, 1, 0, 1, 0, 0, 2]);
        assert_eq!(cells.stratum_a(), [[1, 1], [1, 0]]);
        assert_eq!(cells.stratum_b(), [[1, 0], [0, 2]]);
    }

    #[test]
    fn test_genotype_rows_layout() {
        let m = matrix();
        let src = GenotypeSource::new(&m);
        let cells = build_cells(
            &src,
            LocusPair::windows(0, 1),
            FocalGenotype::new(0, 2),
            &[0, 1, 2],
            &[3, 4, 5],
            CellLayout::GenotypeRows,
        );
        // bd1 S W1F W2F, bd2 F W1F W2F, bd3 S W1NF W2F, bd4 F W1NF W2F, ...
        assert_eq!(cells.0, [1, 1, 1, 0, 1, 0, 0, 2]);
        let swapped = build_cells(
            &src,
            LocusPair::windows(0, 1),
            FocalGenotype::new(0, 2),
            &[3, 4, 5],
            &[0, 1, 2],
            CellLayout::GenotypeRows,
        );
        assert_eq!(swapped.0, [1, 1, 0, 1, 0, 1, 2, 0]);
    }

    #[test]
    fn test_cell_sum_matches_group_sizes() {
        let m = matrix();
        let src = GenotypeSource::new(&m);
        for layout in [CellLayout::SterileRows, CellLayout::GenotypeRows] {
            let cells = build_cells(
                &src,
                LocusPair::windows(1, 0),
                FocalGenotype::new(2, 0),
                &[5, 1],
                &[0, 2, 3],
                layout,
            );
            assert_eq!(cells.total(), 5);
        }
    }

    #[test]
    fn test_empty_groups_give_zero_cells() {
        let m = matrix();
        let src = GenotypeSource::new(&m);
        let counts = tally(&src, LocusPair::windows(0, 1), FocalGenotype::new(0, 2), &[], &[]);
        assert_eq!(counts.total(), 0);
        assert_eq!(counts.arrange(CellLayout::SterileRows), ContingencyCells([0; 8]));
    }
}
