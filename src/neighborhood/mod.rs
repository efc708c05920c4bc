use std::f32::consts::PI;

use crate::config::DistributionFunction;
use crate::{SomError, SomResult};

/// Neighborhood weight as a function of grid distance.
///
/// The constant prefactor only depends on sigma and is computed once.
#[derive(Debug, Clone, Copy)]
pub enum Neighborhood {
    Gaussian { sigma: f32, prefactor: f32 },
    MexicanHat { sigma: f32, prefactor: f32 },
}

impl Neighborhood {
    pub fn new(function: DistributionFunction, sigma: f32) -> SomResult<Self> {
        match function {
            DistributionFunction::Gaussian => Self::gaussian(sigma),
            DistributionFunction::MexicanHat => Self::mexican_hat(sigma),
        }
    }

    /// `1/(sigma * sqrt(2 pi)) * exp(-1/2 (d/sigma)^2)`
    pub fn gaussian(sigma: f32) -> SomResult<Self> {
        Self::check_sigma(sigma)?;
        Ok(Self::Gaussian {
            sigma,
            prefactor: 1.0 / (sigma * (2.0 * PI).sqrt()),
        })
    }

    /// `2/(sqrt(3 sigma) * pi^(1/4)) * (1 - d^2/sigma^2) * exp(-d^2/(2 sigma^2))`
    pub fn mexican_hat(sigma: f32) -> SomResult<Self> {
        Self::check_sigma(sigma)?;
        Ok(Self::MexicanHat {
            sigma,
            prefactor: 2.0 / ((3.0 * sigma).sqrt() * PI.powf(0.25)),
        })
    }

    fn check_sigma(sigma: f32) -> SomResult<()> {
        if sigma > 0.0 {
            Ok(())
        } else {
            Err(SomError::BadConfig(format!(
                "sigma must be positive, got {sigma}"
            )))
        }
    }

    pub fn weight(&self, distance: f32) -> f32 {
        match *self {
            Self::Gaussian { sigma, prefactor } => {
                let t = distance / sigma;
                prefactor * (-0.5 * t * t).exp()
            }
            Self::MexicanHat { sigma, prefactor } => {
                let d2 = distance * distance;
                let sigma2 = sigma * sigma;
                prefactor * (1.0 - d2 / sigma2) * (-d2 / (2.0 * sigma2)).exp()
            }
        }
    }
}
