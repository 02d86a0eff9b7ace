use crate::error::{PowerError, Result as PowerResult};
use crate::types::{Locus, HOM_ALT, HOM_REF};
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Genotype codes stored window-major: all individuals of window 0, then window 1, ...
#[derive(Debug, Clone)]
pub struct GenotypeMatrix {
    n_windows: usize,
    n_individuals: usize,
    codes: Vec<u8>,
}

impl GenotypeMatrix {
    /// Build from rows of individuals (one genotype per window), transposing to
    /// window-major storage.
    pub fn from_individual_rows(rows: &[Vec<u8>]) -> PowerResult<Self> {
        let n_individuals = rows.len();
        if n_individuals == 0 {
            return Err(PowerError::InvalidMatrix("no individuals".to_string()));
        }
        let n_windows = rows[0].len();
        if n_windows == 0 {
            return Err(PowerError::InvalidMatrix("no windows".to_string()));
        }

        let mut codes = vec![0u8; n_windows * n_individuals];
        for (individual, row) in rows.iter().enumerate() {
            if row.len() != n_windows {
                return Err(PowerError::InvalidMatrix(format!(
                    "individual {} has {} windows, expected {}",
                    individual,
                    row.len(),
                    n_windows
                )));
            }
            for (window, &code) in row.iter().enumerate() {
                if code > HOM_ALT {
                    return Err(PowerError::InvalidMatrix(format!(
                        "genotype code {} at individual {}, window {} is not 0, 1 or 2",
                        code, individual, window
                    )));
                }
                codes[window * n_individuals + individual] = code;
            }
        }

        Ok(Self {
            n_windows,
            n_individuals,
            codes,
        })
    }

    pub fn n_windows(&self) -> usize {
        self.n_windows
    }

    pub fn n_individuals(&self) -> usize {
        self.n_individuals
    }

    pub fn get(&self, window: usize, individual: usize) -> Option<u8> {
        if window >= self.n_windows || individual >= self.n_individuals {
            return None;
        }
        Some(self.codes[window * self.n_individuals + individual])
    }
}

/// Load a whitespace-delimited genotype matrix (individuals as rows, windows as
/// columns). Paths ending in `.gz` are decompressed on the fly.
pub fn load_matrix(path: &Path) -> Result<GenotypeMatrix> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open genotype matrix: {}", path.display()))?;

    let is_gz = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"));

    let matrix = if is_gz {
        parse_matrix(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        parse_matrix(BufReader::new(file))
    };
    matrix.with_context(|| format!("Failed to parse genotype matrix: {}", path.display()))
}

/// Parse matrix text from any reader. Blank lines are ignored.
pub fn parse_matrix<R: BufRead>(reader: R) -> Result<GenotypeMatrix> {
    let mut rows: Vec<Vec<u8>> = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .enumerate()
            .map(|(col, tok)| {
                tok.parse::<u8>()
                    .with_context(|| format!("line {}, column {}: '{}' is not a genotype code", i + 1, col + 1, tok))
            })
            .collect::<Result<Vec<u8>>>()?;
        rows.push(row);
    }

    Ok(GenotypeMatrix::from_individual_rows(&rows)?)
}

/// Draw a uniparental marker (0 or 2, equally likely) for each individual.
pub fn assign_uniparental_markers<R: Rng>(n_individuals: usize, rng: &mut R) -> Vec<u8> {
    (0..n_individuals)
        .map(|_| if rng.gen_bool(0.5) { HOM_REF } else { HOM_ALT })
        .collect()
}

/// Resolves a `Locus` to a genotype code for an individual.
#[derive(Debug, Clone, Copy)]
pub struct GenotypeSource<'a> {
    matrix: &'a GenotypeMatrix,
    uniparental: Option<&'a [u8]>,
}

impl<'a> GenotypeSource<'a> {
    pub fn new(matrix: &'a GenotypeMatrix) -> Self {
        Self {
            matrix,
            uniparental: None,
        }
    }

    pub fn with_uniparental(mut self, markers: &'a [u8]) -> Self {
        self.uniparental = Some(markers);
        self
    }

    pub fn has_uniparental(&self) -> bool {
        self.uniparental.is_some()
    }

    pub fn n_individuals(&self) -> usize {
        self.matrix.n_individuals()
    }

    pub fn genotype(&self, locus: Locus, individual: usize) -> Option<u8> {
        match locus {
            Locus::Window(w) => self.matrix.get(w, individual),
            Locus::Uniparental => self.uniparental.and_then(|m| m.get(individual).copied()),
        }
    }

    /// Whether `individual` carries `code` at `locus`. Unresolvable lookups count as non-focal.
    pub fn is_focal(&self, locus: Locus, individual: usize, code: u8) -> bool {
        self.genotype(locus, individual) == Some(code)
    }
}
