use crate::error::{PowerError, Result};
use crate::genotypes::GenotypeSource;
use crate::types::{FocalGenotype, LocusPair};
use rand::Rng;

/// Default probability that a double-focal individual is sterile
pub const DEFAULT_PENETRANCE: f64 = 0.25;

/// Which individuals receive a background-sterility draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundScope {
    /// Only double-focal individuals whose penetrance draw failed
    DoubleFocalOnly,
    /// Every individual; double-focal ones only after a failed penetrance draw
    AllIndividuals,
}

/// How fertile individuals are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FertileSplit {
    /// A single fertile group of size `F`
    Pooled,
    /// Fertile individuals focal at locus 1 (`F/2`, rounded down) and
    /// non-focal at locus 1 (the remainder) are filled separately
    ByWindow1Focal,
}

#[derive(Debug, Clone)]
pub struct ClassifierParams {
    pub sterile: usize,
    pub fertile: usize,
    pub penetrance: f64,
    /// Background sterility as an integer percentage in [0, 100]
    pub background_percent: u32,
    pub background_scope: BackgroundScope,
    pub fertile_split: FertileSplit,
}

impl ClassifierParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.penetrance) {
            return Err(PowerError::InvalidParameter(format!(
                "penetrance must be in [0, 1], got {}",
                self.penetrance
            )));
        }
        if self.background_percent > 100 {
            return Err(PowerError::InvalidParameter(format!(
                "background sterility must be a percentage in [0, 100], got {}",
                self.background_percent
            )));
        }
        Ok(())
    }

    fn fertile_targets(&self) -> (usize, usize) {
        match self.fertile_split {
            FertileSplit::Pooled => (self.fertile, 0),
            FertileSplit::ByWindow1Focal => {
                let focal = self.fertile / 2;
                (focal, self.fertile - focal)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FertileGroups {
    Pooled(Vec<usize>),
    Split { focal: Vec<usize>, nonfocal: Vec<usize> },
}

impl FertileGroups {
    pub fn len(&self) -> usize {
        match self {
            FertileGroups::Pooled(ids) => ids.len(),
            FertileGroups::Split { focal, nonfocal } => focal.len() + nonfocal.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All fertile ids; for split groups the focal ids come first.
    pub fn ids(&self) -> Vec<usize> {
        match self {
            FertileGroups::Pooled(ids) => ids.clone(),
            FertileGroups::Split { focal, nonfocal } => {
                focal.iter().chain(nonfocal.iter()).copied().collect()
            }
        }
    }
}

/// Disjoint sterile and fertile id sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualGroups {
    pub sterile: Vec<usize>,
    pub fertile: FertileGroups,
}

impl IndividualGroups {
    pub fn fertile_ids(&self) -> Vec<usize> {
        self.fertile.ids()
    }

    pub fn total(&self) -> usize {
        self.sterile.len() + self.fertile.len()
    }
}

fn background_draw<R: Rng>(rng: &mut R, percent: u32) -> bool {
    rng.gen_range(0..100) < percent
}

/// Fill the sterile and fertile groups, scanning individuals in ascending id order.
///
/// An individual whose destination group is already full is skipped. Fails with
/// `GroupsUnfillable` when the population is exhausted first.
pub fn classify<R: Rng>(
    source: &GenotypeSource<'_>,
    pair: LocusPair,
    focal: FocalGenotype,
    params: &ClassifierParams,
    rng: &mut R,
) -> Result<IndividualGroups> {
    params.validate()?;

    let (focal_target, nonfocal_target) = params.fertile_targets();
    let n = source.n_individuals();

    let mut sterile: Vec<usize> = Vec::with_capacity(params.sterile);
    // Pooled fertile ids go in `fertile_focal`
    let mut fertile_focal: Vec<usize> = Vec::with_capacity(focal_target);
    let mut fertile_nonfocal: Vec<usize> = Vec::with_capacity(nonfocal_target);

    let mut individual = 0;
    while sterile.len() < params.sterile
        || fertile_focal.len() < focal_target
        || fertile_nonfocal.len() < nonfocal_target
    {
        if individual == n {
            return Err(PowerError::GroupsUnfillable {
                sterile_found: sterile.len(),
                sterile_target: params.sterile,
                fertile_found: fertile_focal.len() + fertile_nonfocal.len(),
                fertile_target: params.fertile,
                individuals: n,
            });
        }

        let w1 = source.is_focal(pair.locus1, individual, focal.window1);
        let w2 = source.is_focal(pair.locus2, individual, focal.window2);

        // Background is only drawn after a failed penetrance draw
        let is_sterile = if w1 && w2 {
            rng.gen_bool(params.penetrance) || background_draw(rng, params.background_percent)
        } else {
            params.background_scope == BackgroundScope::AllIndividuals
                && background_draw(rng, params.background_percent)
        };

        if is_sterile {
            if sterile.len() < params.sterile {
                sterile.push(individual);
            }
        } else {
            let (bucket, target) = match params.fertile_split {
                FertileSplit::Pooled => (&mut fertile_focal, focal_target),
                FertileSplit::ByWindow1Focal if w1 => (&mut fertile_focal, focal_target),
                FertileSplit::ByWindow1Focal => (&mut fertile_nonfocal, nonfocal_target),
            };
            if bucket.len() < target {
                bucket.push(individual);
            }
        }

        individual += 1;
    }

    let fertile = match params.fertile_split {
        FertileSplit::Pooled => FertileGroups::Pooled(fertile_focal),
        FertileSplit::ByWindow1Focal => FertileGroups::Split {
            focal: fertile_focal,
            nonfocal: fertile_nonfocal,
        },
    };

    Ok(IndividualGroups { sterile, fertile })
}
