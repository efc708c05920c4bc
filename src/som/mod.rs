use std::fmt::Write as _;
use std::path::Path;

use ndarray::{Array2, Axis};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use ndarray::parallel::prelude::*;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::{Layout, SomInit};
use crate::io::{self, SomFileHeader};
use crate::neighborhood::Neighborhood;
use crate::topology::GridMetric;
use crate::{SomError, SomResult};

/// Static shape of a SOM: map layout plus neuron resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SomGeometry {
    pub layout: Layout,
    pub neuron_dim: usize,
    pub channels: usize,
}

impl SomGeometry {
    pub fn num_neurons(&self) -> usize {
        self.layout.num_neurons()
    }

    /// Length of one neuron vector: channels * neuron_dim^2.
    pub fn neuron_stride(&self) -> usize {
        self.channels * self.neuron_dim * self.neuron_dim
    }

    pub fn payload_len(&self) -> usize {
        self.num_neurons() * self.neuron_stride()
    }

    pub fn file_header(&self) -> SomFileHeader {
        let [width, height, depth] = self.layout.header_dims();
        SomFileHeader {
            number_of_channels: self.channels,
            width,
            height,
            depth,
            neuron_dim: self.neuron_dim,
        }
    }
}

/// Per-call inputs of the neighborhood update; the container holds no
/// functors so the trainer stays the single owner of the configuration.
pub struct UpdateParams<'a> {
    pub metric: &'a GridMetric,
    pub neighborhood: &'a Neighborhood,
    pub damping: f32,
    pub max_update_distance: f32,
}

/// The map itself: one prototype image per grid position plus a counter of
/// how often each position won.
#[derive(Debug, Clone)]
pub struct Som {
    geometry: SomGeometry,
    neurons: Array2<f32>,
    update_counter: Vec<u32>,
}

impl Som {
    pub fn new(
        geometry: SomGeometry,
        init: SomInit,
        seed: u64,
        init_filename: Option<&Path>,
    ) -> SomResult<Self> {
        let num_neurons = geometry.num_neurons();
        let stride = geometry.neuron_stride();

        let neurons = match init {
            SomInit::Zero => Array2::zeros((num_neurons, stride)),
            SomInit::Random => Self::random_neurons(&geometry, seed),
            SomInit::RandomWithPreferredDirection => {
                let mut neurons = Self::random_neurons(&geometry, seed);
                let dim = geometry.neuron_dim;
                let neuron_size = dim * dim;
                for mut row in neurons.axis_iter_mut(Axis(0)) {
                    for c in 0..geometry.channels {
                        for i in 0..dim {
                            row[c * neuron_size + i * dim + i] = 1.0;
                        }
                    }
                }
                neurons
            }
            SomInit::Fileinit => {
                let path = init_filename.ok_or_else(|| {
                    SomError::BadConfig("FILEINIT requires initFilename".into())
                })?;
                let data = io::read_som_file(path, &geometry.file_header(), geometry.payload_len())?;
                Array2::from_shape_vec((num_neurons, stride), data)
                    .expect("payload length matches the geometry")
            }
        };

        Ok(Self {
            geometry,
            neurons,
            update_counter: vec![0; num_neurons],
        })
    }

    fn random_neurons(geometry: &SomGeometry, seed: u64) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::random_using(
            (geometry.num_neurons(), geometry.neuron_stride()),
            Uniform::new(0.0f32, 1.0),
            &mut rng,
        )
    }

    pub fn geometry(&self) -> &SomGeometry {
        &self.geometry
    }

    pub fn neurons(&self) -> &Array2<f32> {
        &self.neurons
    }

    pub fn update_counter(&self) -> &[u32] {
        &self.update_counter
    }

    /// Pull every neuron within the cutoff toward its preferred bank entry.
    ///
    /// The weight is the neighborhood value of the grid distance to the
    /// winner, damped by `params.damping`; a weight of 1 replaces the
    /// neuron with the bank entry, 0 leaves it untouched. Inputs are
    /// validated up front so the mutation below cannot fail half-way.
    pub fn update_neighborhood(
        &mut self,
        bank: &Array2<f32>,
        best_neuron: usize,
        best_rot: &[usize],
        params: &UpdateParams<'_>,
    ) -> SomResult<()> {
        let num_neurons = self.geometry.num_neurons();
        if best_neuron >= num_neurons {
            return Err(SomError::InvariantViolation(format!(
                "winner index {best_neuron} out of range for {num_neurons} neurons"
            )));
        }
        if best_rot.len() != num_neurons {
            return Err(SomError::InvariantViolation(format!(
                "best rotation vector has length {}, expected {num_neurons}",
                best_rot.len()
            )));
        }
        if bank.ncols() != self.geometry.neuron_stride() {
            return Err(SomError::InvariantViolation(format!(
                "bank stride {} does not match neuron stride {}",
                bank.ncols(),
                self.geometry.neuron_stride()
            )));
        }
        if let Some(&rot) = best_rot.iter().find(|&&rot| rot >= bank.nrows()) {
            return Err(SomError::InvariantViolation(format!(
                "bank index {rot} out of range for {} entries",
                bank.nrows()
            )));
        }

        let metric = params.metric;
        let neighborhood = params.neighborhood;
        let damping = params.damping;
        let cutoff = params.max_update_distance;

        let pull = |i: usize, mut neuron: ndarray::ArrayViewMut1<'_, f32>, rot: usize| {
            let distance = metric.distance(best_neuron, i);
            if cutoff > 0.0 && distance >= cutoff {
                return;
            }
            let factor = neighborhood.weight(distance) * damping;
            let entry = bank.row(rot);
            let entry = entry.as_slice().expect("bank row is contiguous");
            let neuron = neuron.as_slice_mut().expect("neuron row is contiguous");
            for (value, &target) in neuron.iter_mut().zip(entry) {
                *value -= (*value - target) * factor;
            }
        };

        #[cfg(feature = "rayon")]
        {
            self.neurons
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(best_rot.par_iter())
                .enumerate()
                .for_each(|(i, (neuron, &rot))| pull(i, neuron, rot));
        }
        #[cfg(not(feature = "rayon"))]
        {
            self.neurons
                .axis_iter_mut(Axis(0))
                .zip(best_rot.iter())
                .enumerate()
                .for_each(|(i, (neuron, &rot))| pull(i, neuron, rot));
        }

        self.update_counter[best_neuron] += 1;
        Ok(())
    }

    pub fn write(&self, path: impl AsRef<Path>) -> SomResult<()> {
        let data = self
            .neurons
            .as_slice()
            .expect("neuron tensor is contiguous");
        io::write_som_file(path, &self.geometry.file_header(), data)
    }

    /// Update counts laid out like the map, one row per grid row.
    pub fn counter_grid_string(&self) -> String {
        let mut out = String::new();
        match &self.geometry.layout {
            Layout::Hexagonal { side } => {
                let radius = (*side as i32 - 1) / 2;
                let mut pos = 0usize;
                for x in -radius..=radius {
                    for _ in -radius - x.min(0)..=radius - x.max(0) {
                        write!(out, "{:6} ", self.update_counter[pos]).unwrap();
                        pos += 1;
                    }
                    out.push('\n');
                }
            }
            Layout::Cartesian { lengths, .. } => {
                let [width, height, depth] = {
                    let mut dims = [1usize; 3];
                    dims[..lengths.len()].copy_from_slice(lengths);
                    dims
                };
                let mut pos = 0usize;
                for _ in 0..depth {
                    for _ in 0..height {
                        for _ in 0..width {
                            write!(out, "{:6} ", self.update_counter[pos]).unwrap();
                            pos += 1;
                        }
                        out.push('\n');
                    }
                    out.push('\n');
                }
            }
        }
        out
    }
}
