use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ndarray::{Array2, Array3};

use crate::config::{IntermediateStorage, Interpolation, TrainConfig};
use crate::io::{ImageStreamHeader, ImageStreamReader};
use crate::matching::{argmin, best_match};
use crate::neighborhood::Neighborhood;
use crate::som::{Som, SomGeometry, UpdateParams};
use crate::topology::GridMetric;
use crate::transform::{generate_bank, BankParams};
use crate::{SomError, SomResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Fresh,
    Running,
    Finished,
}

/// Accumulated wall time of the three kernels of a training step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimers {
    pub transform: Duration,
    pub matching: Duration,
    pub update: Duration,
}

impl StageTimers {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Drives generate -> match -> update over an image stream.
///
/// Owns the configuration, the SOM and all scratch buffers; the buffers are
/// sized once at construction and reused for every step.
pub struct Trainer {
    config: TrainConfig,
    geometry: SomGeometry,
    metric: GridMetric,
    neighborhood: Neighborhood,
    bank_params: BankParams,
    som: Option<Som>,
    bank: Array2<f32>,
    min_dist: Vec<f32>,
    best_rot: Vec<usize>,
    timers: StageTimers,
    state: TrainerState,
    update_count: usize,
    checkpoint_count: usize,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> SomResult<Self> {
        config.validate()?;

        let geometry = SomGeometry {
            layout: config.layout.clone(),
            neuron_dim: config.neuron_dim,
            channels: config.number_of_channels,
        };
        let metric = GridMetric::new(&geometry.layout);
        let neighborhood = Neighborhood::new(config.distribution_function, config.sigma)?;
        let bank_params = BankParams {
            rotations: config.number_of_rotations,
            flip: config.use_flip,
            neuron_dim: config.neuron_dim,
            interpolation: config.interpolation,
        };

        let num_neurons = geometry.num_neurons();
        let bank = Array2::zeros((bank_params.num_entries(), geometry.neuron_stride()));
        let min_dist = vec![0.0; num_neurons];
        let best_rot = vec![0; num_neurons];

        Ok(Self {
            config,
            geometry,
            metric,
            neighborhood,
            bank_params,
            som: None,
            bank,
            min_dist,
            best_rot,
            timers: StageTimers::default(),
            state: TrainerState::Fresh,
            update_count: 0,
            checkpoint_count: 0,
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// The trained map; `None` until the first step or `run` call.
    pub fn som(&self) -> Option<&Som> {
        self.som.as_ref()
    }

    pub fn timers(&self) -> &StageTimers {
        &self.timers
    }

    pub fn update_count(&self) -> usize {
        self.update_count
    }

    /// Squared minimum distances of the most recent step, per neuron.
    pub fn last_min_distances(&self) -> &[f32] {
        &self.min_dist
    }

    /// Train on a single image.
    ///
    /// The first call initialises the SOM; a finished trainer rejects
    /// further steps. A failed step leaves the SOM untouched.
    pub fn step(&mut self, image: &Array3<f32>) -> SomResult<()> {
        self.ensure_running()?;
        let (channels, height, width) = image.dim();
        self.validate_image_dims(channels, height, width)?;

        let t = Instant::now();
        generate_bank(image.view(), &self.bank_params, &mut self.bank)?;
        self.timers.transform += t.elapsed();

        let som = self.som.as_mut().expect("running trainer owns a SOM");

        let t = Instant::now();
        best_match(
            som.neurons(),
            &self.bank,
            &mut self.min_dist,
            &mut self.best_rot,
        );
        self.timers.matching += t.elapsed();

        let t = Instant::now();
        let best = argmin(&self.min_dist);
        som.update_neighborhood(
            &self.bank,
            best,
            &self.best_rot,
            &UpdateParams {
                metric: &self.metric,
                neighborhood: &self.neighborhood,
                damping: self.config.damping,
                max_update_distance: self.config.max_update_distance,
            },
        )?;
        self.timers.update += t.elapsed();

        self.update_count += 1;
        Ok(())
    }

    /// Full training run over the configured image stream.
    ///
    /// Re-opens the stream once per epoch, checkpoints per the configured
    /// intermediate-storage policy and writes the final SOM to
    /// `resultFilename`.
    pub fn run(&mut self) -> SomResult<()> {
        if self.state != TrainerState::Fresh {
            return Err(SomError::InvariantViolation(
                "training has already been started".into(),
            ));
        }
        self.ensure_running()?;

        let header = *ImageStreamReader::open(&self.config.images_filename)?.header();
        self.validate_stream(&header)?;

        let total_updates = self.config.num_iter * header.number_of_images;
        let progress_step = 1.0 / total_updates as f32;
        let mut progress = 0.0f32;
        let mut next_progress = self.config.progress_factor;
        let mut start = Instant::now();

        for _ in 0..self.config.num_iter {
            let reader = ImageStreamReader::open(&self.config.images_filename)?;
            for image in reader {
                let image = image?;
                if self.progress_due(progress, next_progress) {
                    tracing::info!(
                        updates = self.update_count,
                        percent = progress * 100.0,
                        elapsed_s = start.elapsed().as_secs_f32(),
                        transform_ms = self.timers.transform.as_millis() as u64,
                        matching_ms = self.timers.matching.as_millis() as u64,
                        update_ms = self.timers.update.as_millis() as u64,
                        "training progress"
                    );
                    self.write_checkpoint()?;
                    next_progress += self.config.progress_factor;
                    start = Instant::now();
                    self.timers.reset();
                }
                progress += progress_step;
                self.step(&image)?;
            }
        }

        tracing::info!(
            updates = self.update_count,
            elapsed_s = start.elapsed().as_secs_f32(),
            "training finished"
        );
        let som = self.som.as_ref().expect("running trainer owns a SOM");
        som.write(&self.config.result_filename)?;
        self.state = TrainerState::Finished;
        Ok(())
    }

    fn ensure_running(&mut self) -> SomResult<()> {
        match self.state {
            TrainerState::Fresh => {
                let som = Som::new(
                    self.geometry.clone(),
                    self.config.init,
                    self.config.seed,
                    self.config.init_filename.as_deref(),
                )?;
                self.som = Some(som);
                self.state = TrainerState::Running;
                Ok(())
            }
            TrainerState::Running => Ok(()),
            TrainerState::Finished => Err(SomError::InvariantViolation(
                "trainer has already finished".into(),
            )),
        }
    }

    fn validate_stream(&self, header: &ImageStreamHeader) -> SomResult<()> {
        if header.number_of_channels != self.config.number_of_channels {
            return Err(SomError::DimensionMismatch {
                field: "numberOfChannels",
                expected: self.config.number_of_channels as i64,
                found: header.number_of_channels as i64,
            });
        }
        self.validate_image_dims(header.number_of_channels, header.height, header.width)
    }

    fn validate_image_dims(&self, channels: usize, height: usize, width: usize) -> SomResult<()> {
        if channels != self.config.number_of_channels {
            return Err(SomError::DimensionMismatch {
                field: "numberOfChannels",
                expected: self.config.number_of_channels as i64,
                found: channels as i64,
            });
        }
        if height != width {
            return Err(SomError::DimensionMismatch {
                field: "image width",
                expected: height as i64,
                found: width as i64,
            });
        }
        if height < self.config.neuron_dim {
            return Err(SomError::DimensionMismatch {
                field: "image height",
                expected: self.config.neuron_dim as i64,
                found: height as i64,
            });
        }
        if self.bank_params.interpolation == Interpolation::Bilinear
            && self.bank_params.rotations > 1
        {
            // Bilinear sampling reaches sqrt(2)/2 * neuron_dim from the
            // centre; the input must cover that on every side.
            let needed = self.config.neuron_dim as f32 * (1.0 + std::f32::consts::FRAC_1_SQRT_2);
            if (height as f32) < needed - 1e-6 {
                return Err(SomError::BadConfig(format!(
                    "bilinear rotation of {}x{} neurons needs images of at least {:.0} pixels, got {height}",
                    self.config.neuron_dim,
                    self.config.neuron_dim,
                    needed.ceil()
                )));
            }
        }
        Ok(())
    }

    fn progress_due(&self, progress: f32, next_progress: f32) -> bool {
        let factor = self.config.progress_factor;
        if factor <= 0.0 {
            return false;
        }
        if factor < 1.0 {
            progress > next_progress
        } else {
            self.update_count != 0 && self.update_count % factor as usize == 0
        }
    }

    fn write_checkpoint(&mut self) -> SomResult<()> {
        if self.config.intermediate_storage == IntermediateStorage::Off {
            return Ok(());
        }
        let path = match self.config.intermediate_storage {
            IntermediateStorage::Overwrite => self.config.result_filename.clone(),
            IntermediateStorage::Keep => {
                let path = numbered_checkpoint(&self.config.result_filename, self.checkpoint_count);
                self.checkpoint_count += 1;
                path
            }
            IntermediateStorage::Off => unreachable!(),
        };
        tracing::debug!(path = %path.display(), "writing intermediate SOM");
        let som = self.som.as_ref().expect("running trainer owns a SOM");
        som.write(&path)
    }
}

/// `result.som` -> `result_3.som`; a missing extension appends the suffix.
fn numbered_checkpoint(result: &Path, count: usize) -> PathBuf {
    match (result.file_stem(), result.extension()) {
        (Some(stem), Some(ext)) => {
            let mut name = stem.to_os_string();
            name.push(format!("_{count}."));
            name.push(ext);
            result.with_file_name(name)
        }
        _ => {
            let mut name = result.as_os_str().to_os_string();
            name.push(format!("_{count}"));
            PathBuf::from(name)
        }
    }
}
