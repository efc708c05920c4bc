use ndarray::Array3;
use rotasom::io::{write_image_stream, ImageStreamReader};
use rotasom::{Layout, Som, SomError, SomGeometry, SomInit};

#[test]
fn test_som_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.som");

    let geometry = SomGeometry {
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 2,
        channels: 1,
    };
    let som = Som::new(geometry.clone(), SomInit::Zero, 0, None).unwrap();
    som.write(&path).unwrap();

    let reloaded = Som::new(geometry, SomInit::Fileinit, 0, Some(&path)).unwrap();
    assert_eq!(som.neurons(), reloaded.neurons());

    // Writing the reloaded map reproduces the file byte for byte.
    let path2 = dir.path().join("map2.som");
    reloaded.write(&path2).unwrap();
    assert_eq!(
        std::fs::read(&path).unwrap(),
        std::fs::read(&path2).unwrap()
    );
}

#[test]
fn test_som_file_round_trip_random_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.som");

    let geometry = SomGeometry {
        layout: Layout::hexagonal(5),
        neuron_dim: 3,
        channels: 2,
    };
    let som = Som::new(geometry.clone(), SomInit::Random, 1234, None).unwrap();
    som.write(&path).unwrap();

    let reloaded = Som::new(geometry, SomInit::Fileinit, 0, Some(&path)).unwrap();
    assert_eq!(som.neurons(), reloaded.neurons());
}

#[test]
fn test_som_file_header_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.som");

    let geometry = SomGeometry {
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 2,
        channels: 1,
    };
    Som::new(geometry, SomInit::Zero, 0, None)
        .unwrap()
        .write(&path)
        .unwrap();

    let wrong_width = SomGeometry {
        layout: Layout::cartesian(&[4, 3]),
        neuron_dim: 2,
        channels: 1,
    };
    let err = Som::new(wrong_width, SomInit::Fileinit, 0, Some(&path)).unwrap_err();
    match err {
        SomError::DimensionMismatch {
            field,
            expected,
            found,
        } => {
            assert_eq!(field, "somWidth");
            assert_eq!(expected, 4);
            assert_eq!(found, 3);
        }
        other => panic!("expected a dimension mismatch, got {other}"),
    }

    let wrong_neuron = SomGeometry {
        layout: Layout::cartesian(&[3, 3]),
        neuron_dim: 4,
        channels: 1,
    };
    assert!(matches!(
        Som::new(wrong_neuron, SomInit::Fileinit, 0, Some(&path)),
        Err(SomError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_random_init_is_reproducible() {
    let geometry = SomGeometry {
        layout: Layout::cartesian(&[4]),
        neuron_dim: 3,
        channels: 1,
    };
    let a = Som::new(geometry.clone(), SomInit::Random, 99, None).unwrap();
    let b = Som::new(geometry.clone(), SomInit::Random, 99, None).unwrap();
    let c = Som::new(geometry, SomInit::Random, 100, None).unwrap();
    assert_eq!(a.neurons(), b.neurons());
    assert_ne!(a.neurons(), c.neurons());
}

#[test]
fn test_preferred_direction_sets_the_diagonal() {
    let geometry = SomGeometry {
        layout: Layout::cartesian(&[2, 2]),
        neuron_dim: 3,
        channels: 2,
    };
    let som = Som::new(geometry, SomInit::RandomWithPreferredDirection, 5, None).unwrap();
    for row in som.neurons().outer_iter() {
        for c in 0..2 {
            for i in 0..3 {
                assert_eq!(row[c * 9 + i * 3 + i], 1.0);
            }
        }
    }
}

#[test]
fn test_image_stream_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("images.bin");

    let images: Vec<Array3<f32>> = (0..3)
        .map(|i| Array3::from_shape_fn((2, 4, 4), |(c, y, x)| (i * 100 + c * 16 + y * 4 + x) as f32))
        .collect();
    write_image_stream(&path, &images).unwrap();

    let reader = ImageStreamReader::open(&path).unwrap();
    let header = *reader.header();
    assert_eq!(header.number_of_images, 3);
    assert_eq!(header.number_of_channels, 2);
    assert_eq!(header.height, 4);
    assert_eq!(header.width, 4);

    let decoded: Vec<Array3<f32>> = reader.map(|image| image.unwrap()).collect();
    assert_eq!(decoded, images);
}

#[test]
fn test_truncated_image_stream_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("images.bin");
    write_image_stream(&path, &[Array3::<f32>::zeros((1, 4, 4))]).unwrap();

    // Chop off the last pixels.
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

    let mut reader = ImageStreamReader::open(&path).unwrap();
    assert!(matches!(reader.next(), Some(Err(SomError::Io(_)))));
}
