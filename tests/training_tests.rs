use ndarray::{Array2, Array3};
use rotasom::som::UpdateParams;
use rotasom::{
    DistributionFunction, GridMetric, IntermediateStorage, Interpolation, Layout, Neighborhood,
    Som, SomError, SomGeometry, SomInit, TrainConfig, Trainer, TrainerState,
};

fn base_config(dir: &std::path::Path) -> TrainConfig {
    TrainConfig {
        num_iter: 1,
        number_of_rotations: 1,
        use_flip: false,
        interpolation: Interpolation::NearestNeighbor,
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 2,
        number_of_channels: 1,
        init: SomInit::Zero,
        seed: 42,
        init_filename: None,
        distribution_function: DistributionFunction::Gaussian,
        sigma: 1.0,
        damping: 1.0,
        max_update_distance: 0.0,
        intermediate_storage: IntermediateStorage::Off,
        progress_factor: 0.1,
        result_filename: dir.join("result.som"),
        images_filename: dir.join("images.bin"),
    }
}

#[test]
fn test_single_step_spreads_the_winner_neighborhood() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());
    let layout = config.layout.clone();
    let mut trainer = Trainer::new(config).unwrap();

    let image = Array3::from_elem((1, 2, 2), 1.0f32);
    trainer.step(&image).unwrap();

    // All neurons start at zero, so every distance ties and the winner is
    // neuron 0; each neuron is pulled toward the constant-1 image by the
    // Gaussian of its grid distance to the winner.
    let som = trainer.som().unwrap();
    let metric = GridMetric::new(&layout);
    let gaussian = Neighborhood::gaussian(1.0).unwrap();
    for (i, row) in som.neurons().outer_iter().enumerate() {
        let expected = gaussian.weight(metric.distance(0, i));
        for &value in row {
            assert_eq!(value, expected, "neuron {i}");
        }
    }
    assert_eq!(som.update_counter()[0], 1);
    assert_eq!(som.update_counter()[1..], [0, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_zero_damping_leaves_the_map_untouched() {
    let geometry = SomGeometry {
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 2,
        channels: 1,
    };
    let mut som = Som::new(geometry.clone(), SomInit::Random, 7, None).unwrap();
    let before = som.neurons().clone();

    let metric = GridMetric::new(&geometry.layout);
    let gaussian = Neighborhood::gaussian(1.0).unwrap();
    let bank = Array2::from_elem((1, geometry.neuron_stride()), 0.5f32);
    som.update_neighborhood(
        &bank,
        4,
        &[0; 9],
        &UpdateParams {
            metric: &metric,
            neighborhood: &gaussian,
            damping: 0.0,
            max_update_distance: 0.0,
        },
    )
    .unwrap();

    assert_eq!(som.neurons(), &before);
    assert_eq!(som.update_counter()[4], 1);
}

#[test]
fn test_unit_weight_replaces_the_winner() {
    let geometry = SomGeometry {
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 2,
        channels: 1,
    };
    let mut som = Som::new(geometry.clone(), SomInit::Zero, 0, None).unwrap();

    let metric = GridMetric::new(&geometry.layout);
    // Unit prefactor makes the weight exactly 1 at distance 0.
    let neighborhood = Neighborhood::Gaussian {
        sigma: 1.0,
        prefactor: 1.0,
    };
    let bank = Array2::from_shape_fn((2, geometry.neuron_stride()), |(j, k)| {
        0.125 + j as f32 + k as f32 * 0.25
    });
    let best_rot = [1usize, 0, 1, 0, 1, 0, 1, 0, 1];
    som.update_neighborhood(
        &bank,
        4,
        &best_rot,
        &UpdateParams {
            metric: &metric,
            neighborhood: &neighborhood,
            damping: 1.0,
            max_update_distance: 0.0,
        },
    )
    .unwrap();

    // The winner picked bank entry 1 and now equals it bitwise.
    assert_eq!(som.neurons().row(4), bank.row(1));
}

#[test]
fn test_update_cutoff_skips_distant_neurons() {
    let geometry = SomGeometry {
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 2,
        channels: 1,
    };
    let mut som = Som::new(geometry.clone(), SomInit::Zero, 0, None).unwrap();

    let metric = GridMetric::new(&geometry.layout);
    let gaussian = Neighborhood::gaussian(1.0).unwrap();
    let bank = Array2::from_elem((1, geometry.neuron_stride()), 1.0f32);
    som.update_neighborhood(
        &bank,
        4,
        &[0; 9],
        &UpdateParams {
            metric: &metric,
            neighborhood: &gaussian,
            damping: 1.0,
            max_update_distance: 1.0,
        },
    )
    .unwrap();

    for (i, row) in som.neurons().outer_iter().enumerate() {
        if i == 4 {
            assert!(row.iter().all(|&v| v > 0.0));
        } else {
            assert!(row.iter().all(|&v| v == 0.0), "neuron {i} is outside the cutoff");
        }
    }
}

#[test]
fn test_update_counts_accumulate() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.init = SomInit::Random;
    let mut trainer = Trainer::new(config).unwrap();

    let images = [
        Array3::from_elem((1, 2, 2), 1.0f32),
        Array3::from_shape_fn((1, 2, 2), |(_, y, x)| (y * 2 + x) as f32),
        Array3::from_elem((1, 2, 2), -0.5f32),
    ];
    for image in &images {
        trainer.step(image).unwrap();
    }

    assert_eq!(trainer.update_count(), 3);
    let total: u32 = trainer.som().unwrap().update_counter().iter().sum();
    assert_eq!(total, 3);
}

#[test]
fn test_training_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let images: Vec<Array3<f32>> = (0..5)
        .map(|i| {
            Array3::from_shape_fn((1, 8, 8), |(_, y, x)| {
                ((i * 31 + y * 8 + x) % 17) as f32 * 0.1
            })
        })
        .collect();
    let images_path = dir.path().join("images.bin");
    rotasom::io::write_image_stream(&images_path, &images).unwrap();

    let run = |result_name: &str| {
        let mut config = base_config(dir.path());
        config.num_iter = 2;
        config.number_of_rotations = 4;
        config.use_flip = true;
        config.neuron_dim = 4;
        config.init = SomInit::Random;
        config.sigma = 1.5;
        config.damping = 0.7;
        config.images_filename = images_path.clone();
        config.result_filename = dir.path().join(result_name);
        let mut trainer = Trainer::new(config).unwrap();
        trainer.run().unwrap();
        std::fs::read(dir.path().join(result_name)).unwrap()
    };

    let first = run("first.som");
    let second = run("second.som");
    assert_eq!(first, second);
}

#[test]
fn test_trainer_state_machine() {
    let dir = tempfile::tempdir().unwrap();
    let images_path = dir.path().join("images.bin");
    rotasom::io::write_image_stream(&images_path, &[Array3::from_elem((1, 2, 2), 1.0f32)])
        .unwrap();

    let mut config = base_config(dir.path());
    config.images_filename = images_path;
    let mut trainer = Trainer::new(config).unwrap();
    assert_eq!(trainer.state(), TrainerState::Fresh);
    assert!(trainer.som().is_none());

    trainer.run().unwrap();
    assert_eq!(trainer.state(), TrainerState::Finished);

    // A finished trainer accepts neither another run nor further steps.
    assert!(matches!(
        trainer.run(),
        Err(SomError::InvariantViolation(_))
    ));
    let image = Array3::from_elem((1, 2, 2), 1.0f32);
    assert!(matches!(
        trainer.step(&image),
        Err(SomError::InvariantViolation(_))
    ));
}

#[test]
fn test_trainer_rejects_mismatched_images() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());
    let mut trainer = Trainer::new(config).unwrap();

    // Wrong channel count.
    let image = Array3::from_elem((2, 2, 2), 1.0f32);
    assert!(matches!(
        trainer.step(&image),
        Err(SomError::DimensionMismatch { .. })
    ));

    // Smaller than the neuron.
    let image = Array3::from_elem((1, 1, 1), 1.0f32);
    assert!(matches!(
        trainer.step(&image),
        Err(SomError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_bilinear_needs_a_crop_margin() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.interpolation = Interpolation::Bilinear;
    config.number_of_rotations = 8;
    config.neuron_dim = 8;
    let mut trainer = Trainer::new(config).unwrap();

    // 8 * (1 + sqrt(2)/2) > 10: the rotated samples would leave the image.
    let image = Array3::from_elem((1, 10, 10), 1.0f32);
    assert!(matches!(
        trainer.step(&image),
        Err(SomError::BadConfig(_))
    ));

    let image = Array3::from_elem((1, 14, 14), 1.0f32);
    trainer.step(&image).unwrap();
}
