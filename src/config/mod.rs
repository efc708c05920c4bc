use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{SomError, SomResult};

/// Interpolation used when resampling rotated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpolation {
    NearestNeighbor,
    Bilinear,
}

impl FromStr for Interpolation {
    type Err = SomError;

    fn from_str(s: &str) -> SomResult<Self> {
        match s {
            "NEAREST_NEIGHBOR" => Ok(Self::NearestNeighbor),
            "BILINEAR" => Ok(Self::Bilinear),
            other => Err(SomError::UnsupportedVariant(format!(
                "interpolation '{other}'"
            ))),
        }
    }
}

/// Arrangement of the neurons on the map.
///
/// Cartesian grids may be 1-, 2- or 3-dimensional, with periodic wrap
/// selectable per axis. Hexagonal maps are 2D with an odd side length and a
/// regular-hexagon extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    Cartesian {
        lengths: Vec<usize>,
        periodic: Vec<bool>,
    },
    Hexagonal {
        side: usize,
    },
}

impl Layout {
    pub fn cartesian(lengths: &[usize]) -> Self {
        Self::Cartesian {
            lengths: lengths.to_vec(),
            periodic: vec![false; lengths.len()],
        }
    }

    pub fn cartesian_periodic(lengths: &[usize]) -> Self {
        Self::Cartesian {
            lengths: lengths.to_vec(),
            periodic: vec![true; lengths.len()],
        }
    }

    pub fn hexagonal(side: usize) -> Self {
        Self::Hexagonal { side }
    }

    /// Number of neurons addressed by this layout.
    pub fn num_neurons(&self) -> usize {
        match self {
            Self::Cartesian { lengths, .. } => lengths.iter().product(),
            Self::Hexagonal { side } => {
                let r = (side - 1) / 2;
                side * side - r * (r + 1)
            }
        }
    }

    /// Axis lengths as written to the SOM file header (width, height, depth).
    pub fn header_dims(&self) -> [usize; 3] {
        match self {
            Self::Cartesian { lengths, .. } => {
                let mut dims = [1usize; 3];
                dims[..lengths.len()].copy_from_slice(lengths);
                dims
            }
            Self::Hexagonal { side } => [*side, *side, 1],
        }
    }

    pub fn validate(&self) -> SomResult<()> {
        match self {
            Self::Cartesian { lengths, periodic } => {
                if lengths.is_empty() || lengths.len() > 3 {
                    return Err(SomError::BadConfig(format!(
                        "cartesian layout must have 1 to 3 axes, got {}",
                        lengths.len()
                    )));
                }
                if lengths.iter().any(|&l| l == 0) {
                    return Err(SomError::BadConfig(
                        "cartesian axis lengths must be positive".into(),
                    ));
                }
                if periodic.len() != lengths.len() {
                    return Err(SomError::BadConfig(format!(
                        "expected one periodic flag per axis, got {} flags for {} axes",
                        periodic.len(),
                        lengths.len()
                    )));
                }
            }
            Self::Hexagonal { side } => {
                if *side == 0 || side % 2 == 0 {
                    return Err(SomError::BadConfig(format!(
                        "hexagonal side length must be odd and positive, got {side}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// How the neuron tensor is filled before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SomInit {
    Zero,
    Random,
    RandomWithPreferredDirection,
    Fileinit,
}

impl FromStr for SomInit {
    type Err = SomError;

    fn from_str(s: &str) -> SomResult<Self> {
        match s {
            "ZERO" => Ok(Self::Zero),
            "RANDOM" => Ok(Self::Random),
            "RANDOM_WITH_PREFERRED_DIRECTION" => Ok(Self::RandomWithPreferredDirection),
            "FILEINIT" => Ok(Self::Fileinit),
            other => Err(SomError::UnsupportedVariant(format!("init '{other}'"))),
        }
    }
}

/// Neighborhood weighting shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionFunction {
    Gaussian,
    MexicanHat,
}

impl FromStr for DistributionFunction {
    type Err = SomError;

    fn from_str(s: &str) -> SomResult<Self> {
        match s {
            "GAUSSIAN" => Ok(Self::Gaussian),
            "MEXICAN_HAT" => Ok(Self::MexicanHat),
            other => Err(SomError::UnsupportedVariant(format!(
                "distribution function '{other}'"
            ))),
        }
    }
}

/// Checkpoint policy during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntermediateStorage {
    Off,
    Overwrite,
    Keep,
}

impl FromStr for IntermediateStorage {
    type Err = SomError;

    fn from_str(s: &str) -> SomResult<Self> {
        match s {
            "OFF" => Ok(Self::Off),
            "OVERWRITE" => Ok(Self::Overwrite),
            "KEEP" => Ok(Self::Keep),
            other => Err(SomError::UnsupportedVariant(format!(
                "intermediate storage '{other}'"
            ))),
        }
    }
}

/// Full description of one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub num_iter: usize,
    pub number_of_rotations: usize,
    pub use_flip: bool,
    pub interpolation: Interpolation,
    pub layout: Layout,
    pub neuron_dim: usize,
    pub number_of_channels: usize,
    pub init: SomInit,
    pub seed: u64,
    pub init_filename: Option<PathBuf>,
    pub distribution_function: DistributionFunction,
    pub sigma: f32,
    pub damping: f32,
    pub max_update_distance: f32,
    pub intermediate_storage: IntermediateStorage,
    pub progress_factor: f32,
    pub result_filename: PathBuf,
    pub images_filename: PathBuf,
}

impl TrainConfig {
    pub fn validate(&self) -> SomResult<()> {
        if self.num_iter == 0 {
            return Err(SomError::BadConfig("numIter must be positive".into()));
        }
        if self.number_of_rotations == 0 {
            return Err(SomError::BadConfig(
                "numberOfRotations must be positive".into(),
            ));
        }
        if self.neuron_dim == 0 {
            return Err(SomError::BadConfig("neuronDim must be positive".into()));
        }
        if self.number_of_channels == 0 {
            return Err(SomError::BadConfig(
                "numberOfChannels must be positive".into(),
            ));
        }
        self.layout.validate()?;
        if !(self.sigma > 0.0) {
            return Err(SomError::BadConfig(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(SomError::BadConfig(format!(
                "damping must lie in (0, 1], got {}",
                self.damping
            )));
        }
        if self.init == SomInit::Fileinit && self.init_filename.is_none() {
            return Err(SomError::BadConfig(
                "FILEINIT requires initFilename".into(),
            ));
        }
        if self.intermediate_storage != IntermediateStorage::Off && !(self.progress_factor > 0.0) {
            return Err(SomError::BadConfig(format!(
                "progressFactor must be positive, got {}",
                self.progress_factor
            )));
        }
        Ok(())
    }

    /// Number of bank entries per input image.
    pub fn rotations_and_flip(&self) -> usize {
        if self.use_flip {
            2 * self.number_of_rotations
        } else {
            self.number_of_rotations
        }
    }
}
