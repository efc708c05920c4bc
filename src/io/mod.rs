use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array3;

use crate::{SomError, SomResult};

/// Header of the binary image stream, four little-endian i32 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStreamHeader {
    pub number_of_images: usize,
    pub number_of_channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageStreamHeader {
    pub fn image_len(&self) -> usize {
        self.number_of_channels * self.height * self.width
    }
}

/// Streaming reader over an image file; images are decoded one at a time.
pub struct ImageStreamReader {
    reader: BufReader<File>,
    header: ImageStreamHeader,
    remaining: usize,
}

impl ImageStreamReader {
    pub fn open(path: impl AsRef<Path>) -> SomResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let number_of_images = read_dim(&mut reader, "numberOfImages")?;
        let number_of_channels = read_dim(&mut reader, "numberOfChannels")?;
        let height = read_dim(&mut reader, "height")?;
        let width = read_dim(&mut reader, "width")?;
        let header = ImageStreamHeader {
            number_of_images,
            number_of_channels,
            height,
            width,
        };
        Ok(Self {
            reader,
            header,
            remaining: header.number_of_images,
        })
    }

    pub fn header(&self) -> &ImageStreamHeader {
        &self.header
    }

    fn read_image(&mut self) -> SomResult<Array3<f32>> {
        let mut data = vec![0.0f32; self.header.image_len()];
        self.reader.read_f32_into::<LittleEndian>(&mut data)?;
        let image = Array3::from_shape_vec(
            (
                self.header.number_of_channels,
                self.header.height,
                self.header.width,
            ),
            data,
        )
        .expect("image buffer matches the header shape");
        Ok(image)
    }
}

impl Iterator for ImageStreamReader {
    type Item = SomResult<Array3<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.read_image())
    }
}

/// Write a full image stream; all images must share one shape.
pub fn write_image_stream(path: impl AsRef<Path>, images: &[Array3<f32>]) -> SomResult<()> {
    let first = images.first().ok_or_else(|| {
        SomError::InvariantViolation("image stream must contain at least one image".into())
    })?;
    let (channels, height, width) = first.dim();

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_i32::<LittleEndian>(images.len() as i32)?;
    writer.write_i32::<LittleEndian>(channels as i32)?;
    writer.write_i32::<LittleEndian>(height as i32)?;
    writer.write_i32::<LittleEndian>(width as i32)?;

    for image in images {
        if image.dim() != (channels, height, width) {
            return Err(SomError::InvariantViolation(
                "all images in a stream must have the same shape".into(),
            ));
        }
        let data = image
            .as_slice()
            .ok_or_else(|| SomError::InvariantViolation("image is not contiguous".into()))?;
        for &value in data {
            writer.write_f32::<LittleEndian>(value)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Header of the binary SOM file, six little-endian i32 values
/// (the neuron edge length is written twice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SomFileHeader {
    pub number_of_channels: usize,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub neuron_dim: usize,
}

pub fn write_som_file(
    path: impl AsRef<Path>,
    header: &SomFileHeader,
    data: &[f32],
) -> SomResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_i32::<LittleEndian>(header.number_of_channels as i32)?;
    writer.write_i32::<LittleEndian>(header.width as i32)?;
    writer.write_i32::<LittleEndian>(header.height as i32)?;
    writer.write_i32::<LittleEndian>(header.depth as i32)?;
    writer.write_i32::<LittleEndian>(header.neuron_dim as i32)?;
    writer.write_i32::<LittleEndian>(header.neuron_dim as i32)?;
    for &value in data {
        writer.write_f32::<LittleEndian>(value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a SOM payload, verifying every header field against `expected`.
pub fn read_som_file(
    path: impl AsRef<Path>,
    expected: &SomFileHeader,
    payload_len: usize,
) -> SomResult<Vec<f32>> {
    let mut reader = BufReader::new(File::open(path)?);
    check_dim(&mut reader, "numberOfChannels", expected.number_of_channels)?;
    check_dim(&mut reader, "somWidth", expected.width)?;
    check_dim(&mut reader, "somHeight", expected.height)?;
    check_dim(&mut reader, "somDepth", expected.depth)?;
    check_dim(&mut reader, "neuronDim", expected.neuron_dim)?;
    check_dim(&mut reader, "neuronDim", expected.neuron_dim)?;

    let mut data = vec![0.0f32; payload_len];
    reader.read_f32_into::<LittleEndian>(&mut data)?;
    Ok(data)
}

fn read_dim(reader: &mut impl ReadBytesExt, field: &'static str) -> SomResult<usize> {
    let value = reader.read_i32::<LittleEndian>()?;
    if value <= 0 {
        return Err(SomError::InvariantViolation(format!(
            "image stream header field {field} must be positive, got {value}"
        )));
    }
    Ok(value as usize)
}

fn check_dim(
    reader: &mut impl ReadBytesExt,
    field: &'static str,
    expected: usize,
) -> SomResult<()> {
    let found = reader.read_i32::<LittleEndian>()?;
    if found as i64 != expected as i64 {
        return Err(SomError::DimensionMismatch {
            field,
            expected: expected as i64,
            found: found as i64,
        });
    }
    Ok(())
}
