use anyhow::Result;
use ndarray::Array3;
use rotasom::{
    DistributionFunction, IntermediateStorage, Interpolation, Layout, SomInit, TrainConfig,
    Trainer,
};

/// A bright bar through the image centre at the given angle.
fn bar_image(dim: usize, angle: f32) -> Array3<f32> {
    let centre = (dim as f32 - 1.0) * 0.5;
    let (sin_a, cos_a) = angle.sin_cos();
    Array3::from_shape_fn((1, dim, dim), |(_, y, x)| {
        let dx = x as f32 - centre;
        let dy = y as f32 - centre;
        let off_axis = (-sin_a * dx + cos_a * dy).abs();
        if off_axis < 1.0 {
            1.0
        } else {
            0.0
        }
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("--- rotasom: oriented-bar training demo ---");

    let dir = std::env::temp_dir();
    let images_path = dir.join("rotasom_demo_images.bin");
    let result_path = dir.join("rotasom_demo_result.som");

    // Bars at 24 orientations; a rotation-invariant map should collapse
    // them onto very few winning prototypes.
    let images: Vec<Array3<f32>> = (0..24)
        .map(|i| bar_image(16, std::f32::consts::PI * i as f32 / 24.0))
        .collect();
    rotasom::io::write_image_stream(&images_path, &images)?;

    let config = TrainConfig {
        num_iter: 5,
        number_of_rotations: 16,
        use_flip: true,
        interpolation: Interpolation::Bilinear,
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 8,
        number_of_channels: 1,
        init: SomInit::Random,
        seed: 42,
        init_filename: None,
        distribution_function: DistributionFunction::Gaussian,
        sigma: 1.0,
        damping: 0.8,
        max_update_distance: 0.0,
        intermediate_storage: IntermediateStorage::Off,
        progress_factor: 0.25,
        result_filename: result_path.clone(),
        images_filename: images_path,
    };

    let mut trainer = Trainer::new(config)?;
    trainer.run()?;

    println!("updates: {}", trainer.update_count());
    let closest = trainer
        .last_min_distances()
        .iter()
        .cloned()
        .fold(f32::INFINITY, f32::min);
    println!("closest match of the last step: {:.4}", closest.sqrt());
    println!("winner counts per neuron:");
    print!("{}", trainer.som().expect("trained").counter_grid_string());

    let timers = trainer.timers();
    println!(
        "stage times: transform {:?}, match {:?}, update {:?}",
        timers.transform, timers.matching, timers.update
    );
    println!("result written to {}", result_path.display());
    Ok(())
}
