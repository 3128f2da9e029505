//! Label-driven raw image decoder.
//!
//! This module resolves image geometry from a parsed label and reads the
//! raw samples into a `(bands, lines, samples)` array. Samples are assumed
//! to be band sequential.

use crate::label::{FromLabelValue, Label, LabelError};
use crate::parser::{LabelParser, ParseOptions};
use crate::types::{
    ByteOrder, ImageDescriptor, ImagePointer, SampleDescriptor, SampleKind, UnsupportedType,
};
use byteorder::{BigEndian, LittleEndian};
use log::{debug, info, warn};
use ndarray::{Array3, ShapeError};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label fields consulted by the decoder.
pub mod fields {
    pub const RECORD_BYTES: &str = "RECORD_BYTES";
    pub const IMAGE_POINTER: &str = "^IMAGE";
    pub const BANDS: &str = "IMAGE/BANDS";
    pub const SAMPLE_TYPE: &str = "IMAGE/SAMPLE_TYPE";
    pub const SAMPLE_BITS: &str = "IMAGE/SAMPLE_BITS";
    pub const LINES: &str = "IMAGE/LINES";
    pub const LINE_SAMPLES: &str = "IMAGE/LINE_SAMPLES";
    pub const BAND_STORAGE_TYPE: &str = "IMAGE/BAND_STORAGE_TYPE";
}

const BAND_SEQUENTIAL: &str = "BAND_SEQUENTIAL";

/// Errors that can occur while decoding an image.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Label error: {0}")]
    Label(LabelError),

    #[error("Malformed metadata field {field}: {reason}")]
    MalformedMetadata { field: &'static str, reason: String },

    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedType),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Short read: expected {expected} bytes, found {found}")]
    ShortRead { expected: usize, found: usize },

    #[error("Invalid image shape: {0}")]
    Shape(#[from] ShapeError),
}

impl From<LabelError> for DecodeError {
    fn from(err: LabelError) -> Self {
        match err {
            LabelError::NotFound(path) => Self::NotFound(path),
            other => Self::Label(other),
        }
    }
}

impl DecodeError {
    fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            field,
            reason: reason.into(),
        }
    }
}

/// Where the image samples live relative to the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Label and samples share one file; the pointer locates the samples.
    Embedded,
    /// Samples fill a separate file from its first byte.
    Detached,
}

/// Decoded samples, typed by the resolved sample descriptor.
///
/// Values are converted to host byte order while decoding. The byte order
/// of the file is kept in [`SampleDescriptor::byte_order`] on the image
/// descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    U8(Array3<u8>),
    U16(Array3<u16>),
    U32(Array3<u32>),
    U64(Array3<u64>),
    I8(Array3<i8>),
    I16(Array3<i16>),
    I32(Array3<i32>),
    I64(Array3<i64>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

macro_rules! image_data_accessors {
    ($($name:ident => $variant:ident($ty:ty)),* $(,)?) => {
        impl ImageData {
            /// Shape `(bands, lines, samples)`.
            pub fn shape(&self) -> (usize, usize, usize) {
                match self {
                    $(Self::$variant(array) => array.dim(),)*
                }
            }

            /// Total number of samples.
            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(array) => array.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            $(
                pub fn $name(&self) -> Option<&Array3<$ty>> {
                    match self {
                        Self::$variant(array) => Some(array),
                        _ => None,
                    }
                }
            )*
        }
    };
}

image_data_accessors!(
    as_u8 => U8(u8),
    as_u16 => U16(u16),
    as_u32 => U32(u32),
    as_u64 => U64(u64),
    as_i8 => I8(i8),
    as_i16 => I16(i16),
    as_i32 => I32(i32),
    as_i64 => I64(i64),
    as_f32 => F32(f32),
    as_f64 => F64(f64),
);

/// A decoded image with the label and geometry it was read from.
#[derive(Debug, Clone)]
pub struct Image {
    pub label: Label,
    pub descriptor: ImageDescriptor,
    pub data: ImageData,
}

fn required<T: FromLabelValue>(label: &Label, field: &'static str) -> Result<T, DecodeError> {
    match label.get::<T>(field) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(DecodeError::malformed(field, "missing")),
        Err(err) => Err(DecodeError::malformed(field, err.to_string())),
    }
}

/// Builds the image descriptor from the label geometry fields.
///
/// Every required field is checked here, before any sample byte is read.
pub fn describe(label: &Label, placement: Placement) -> Result<ImageDescriptor, DecodeError> {
    let record_bytes: u64 = required(label, fields::RECORD_BYTES)?;
    let pointer_value: String = required(label, fields::IMAGE_POINTER)?;
    let pointer = ImagePointer::parse(&pointer_value)
        .ok_or_else(|| DecodeError::malformed(fields::IMAGE_POINTER, pointer_value.clone()))?;
    let bands: usize = required(label, fields::BANDS)?;
    let sample_type: String = required(label, fields::SAMPLE_TYPE)?;
    let sample_bits: u32 = required(label, fields::SAMPLE_BITS)?;
    let lines: usize = required(label, fields::LINES)?;
    let samples: usize = required(label, fields::LINE_SAMPLES)?;
    let band_storage = label
        .get_str(fields::BAND_STORAGE_TYPE)
        .map(|value| value.trim_matches('"').to_owned());

    let sample = SampleDescriptor::resolve(&sample_type, sample_bits)?;

    let offset = match (placement, &pointer) {
        (Placement::Detached, _) => 0,
        (Placement::Embedded, ImagePointer::Record(record)) => record
            .checked_sub(1)
            .and_then(|index| index.checked_mul(record_bytes))
            .ok_or_else(|| DecodeError::malformed(fields::IMAGE_POINTER, pointer_value.clone()))?,
        (Placement::Embedded, ImagePointer::Byte(position)) => position
            .checked_sub(1)
            .ok_or_else(|| DecodeError::malformed(fields::IMAGE_POINTER, pointer_value.clone()))?,
        (Placement::Embedded, ImagePointer::File { name, .. }) => {
            return Err(DecodeError::malformed(
                fields::IMAGE_POINTER,
                format!("samples are in separate file {name}"),
            ));
        }
    };

    let descriptor = ImageDescriptor {
        offset,
        bands,
        lines,
        samples,
        sample,
        band_storage,
    };
    if descriptor.byte_len().is_none() {
        return Err(DecodeError::malformed(
            fields::LINE_SAMPLES,
            "image size overflows addressable memory",
        ));
    }

    // Other storage orders are read as if band sequential.
    if let Some(storage) = descriptor.band_storage.as_deref() {
        if storage != BAND_SEQUENTIAL {
            warn!("{storage} storage is not reordered; reading samples as {BAND_SEQUENTIAL}");
        }
    }
    Ok(descriptor)
}

/// Reads and decodes the samples described by `descriptor`.
pub fn read_samples<R: Read + Seek>(
    reader: &mut R,
    descriptor: &ImageDescriptor,
) -> Result<ImageData, DecodeError> {
    let expected = descriptor
        .byte_len()
        .ok_or_else(|| DecodeError::malformed(fields::LINE_SAMPLES, "image size overflow"))?;

    // Label geometry is untrusted; check the source length before allocating.
    let end = reader.seek(SeekFrom::End(0))?;
    let available = end.saturating_sub(descriptor.offset);
    if available < expected as u64 {
        return Err(DecodeError::ShortRead {
            expected,
            found: available as usize,
        });
    }

    reader.seek(SeekFrom::Start(descriptor.offset))?;
    let mut bytes = Vec::new();
    reader.by_ref().take(expected as u64).read_to_end(&mut bytes)?;
    if bytes.len() < expected {
        return Err(DecodeError::ShortRead {
            expected,
            found: bytes.len(),
        });
    }

    match descriptor.sample.byte_order {
        ByteOrder::Big => decode_samples::<BigEndian>(&bytes, descriptor),
        ByteOrder::Little => decode_samples::<LittleEndian>(&bytes, descriptor),
    }
}

fn fill<T: Clone + Default>(
    bytes: &[u8],
    shape: (usize, usize, usize),
    read_into: fn(&[u8], &mut [T]),
) -> Result<Array3<T>, ShapeError> {
    let mut values = vec![T::default(); bytes.len() / std::mem::size_of::<T>()];
    read_into(bytes, &mut values);
    Array3::from_shape_vec(shape, values)
}

fn decode_samples<B: byteorder::ByteOrder>(
    bytes: &[u8],
    descriptor: &ImageDescriptor,
) -> Result<ImageData, DecodeError> {
    let shape = descriptor.shape();
    let data = match (descriptor.sample.kind, descriptor.sample.width) {
        (SampleKind::Unsigned, 1) => ImageData::U8(Array3::from_shape_vec(shape, bytes.to_vec())?),
        (SampleKind::Unsigned, 2) => ImageData::U16(fill(bytes, shape, B::read_u16_into)?),
        (SampleKind::Unsigned, 4) => ImageData::U32(fill(bytes, shape, B::read_u32_into)?),
        (SampleKind::Unsigned, 8) => ImageData::U64(fill(bytes, shape, B::read_u64_into)?),
        (SampleKind::Signed, 1) => ImageData::I8(Array3::from_shape_vec(
            shape,
            bytes.iter().map(|&byte| byte as i8).collect(),
        )?),
        (SampleKind::Signed, 2) => ImageData::I16(fill(bytes, shape, B::read_i16_into)?),
        (SampleKind::Signed, 4) => ImageData::I32(fill(bytes, shape, B::read_i32_into)?),
        (SampleKind::Signed, 8) => ImageData::I64(fill(bytes, shape, B::read_i64_into)?),
        (SampleKind::Float, 4) => ImageData::F32(fill(bytes, shape, B::read_f32_into)?),
        (SampleKind::Float, 8) => ImageData::F64(fill(bytes, shape, B::read_f64_into)?),
        (_, width) => {
            return Err(DecodeError::malformed(
                fields::SAMPLE_BITS,
                format!("no decoder for {width}-byte samples"),
            ))
        }
    };
    Ok(data)
}

fn open(path: &Path) -> Result<File, DecodeError> {
    File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => DecodeError::NotFound(path.to_path_buf()),
        _ => DecodeError::Io(err),
    })
}

/// Data file path for a detached label: the label path with its extension
/// replaced by `IMG`, matching the case of the label extension.
pub fn infer_data_path(label_path: &Path) -> PathBuf {
    let lowercase = label_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| !ext.is_empty() && ext.chars().all(|c| !c.is_ascii_uppercase()));
    label_path.with_extension(if lowercase { "img" } else { "IMG" })
}

/// Decoder for labelled PDS3 images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder {
    options: ParseOptions,
}

impl ImageDecoder {
    /// Creates a decoder with default label parsing options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Decodes a file that carries its label in front of the samples.
    ///
    /// The same file handle reads the label and then the samples.
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<Image, DecodeError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(open(path)?);

        let label = LabelParser::with_options(self.options).parse_reader(reader.by_ref())?;
        let descriptor = describe(&label, Placement::Embedded)?;
        debug!(
            "{}: {} at offset {}, shape {:?}",
            path.display(),
            descriptor.sample.type_code(),
            descriptor.offset,
            descriptor.shape()
        );

        let data = read_samples(&mut reader, &descriptor)?;
        info!("Decoded {} samples from {}", data.len(), path.display());
        Ok(Image {
            label,
            descriptor,
            data,
        })
    }

    /// Decodes samples described by a separate label file.
    ///
    /// Without `data_path` the data file is inferred with
    /// [`infer_data_path`]. Samples start at the first byte of the data file.
    pub fn decode_detached<P: AsRef<Path>>(
        &self,
        label_path: P,
        data_path: Option<&Path>,
    ) -> Result<Image, DecodeError> {
        let label_path = label_path.as_ref();
        let label = LabelParser::with_options(self.options).parse_file(label_path)?;
        let descriptor = describe(&label, Placement::Detached)?;

        let data_path = data_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| infer_data_path(label_path));
        debug!(
            "{}: {} samples in {}, shape {:?}",
            label_path.display(),
            descriptor.sample.type_code(),
            data_path.display(),
            descriptor.shape()
        );

        let mut file = open(&data_path)?;
        let data = read_samples(&mut file, &descriptor)?;
        info!("Decoded {} samples from {}", data.len(), data_path.display());
        Ok(Image {
            label,
            descriptor,
            data,
        })
    }
}

/// Decodes a file with an embedded label using default options.
pub fn read_img<P: AsRef<Path>>(path: P) -> Result<Image, DecodeError> {
    ImageDecoder::new().decode_file(path)
}

/// Decodes a detached label and its data file using default options.
pub fn read_lbl_img<P: AsRef<Path>>(
    label_path: P,
    data_path: Option<&Path>,
) -> Result<Image, DecodeError> {
    ImageDecoder::new().decode_detached(label_path, data_path)
}
