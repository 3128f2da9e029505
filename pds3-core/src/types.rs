//! Core types describing PDS3 image samples and image layout.
//!
//! This module maps the PDS3 `SAMPLE_TYPE` vocabulary onto byte order,
//! element kind and width, and defines the geometry derived from a label.

use thiserror::Error;

/// Byte order of stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ByteOrder {
    /// Most significant byte first (PDS3 default)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

/// Numeric kind of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Unsigned,
    Signed,
    Float,
}

/// A `SAMPLE_TYPE`/`SAMPLE_BITS` pair this crate cannot decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported sample type {sample_type} with {bits} bits")]
pub struct UnsupportedType {
    pub sample_type: String,
    pub bits: u32,
}

/// How one sample is stored: byte order, kind and width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleDescriptor {
    pub byte_order: ByteOrder,
    pub kind: SampleKind,
    /// Width in bytes
    pub width: usize,
}

impl SampleDescriptor {
    /// Resolves a PDS3 sample type word and bit width.
    ///
    /// Words without an explicit `MSB_`/`LSB_` (or `PC_`) prefix are big
    /// endian. Integers may be 8, 16, 32 or 64 bits wide, reals 32 or 64.
    pub fn resolve(sample_type: &str, bits: u32) -> Result<Self, UnsupportedType> {
        let word = sample_type.trim().trim_matches('"');
        let unsupported = || UnsupportedType {
            sample_type: word.to_owned(),
            bits,
        };

        let (byte_order, kind) = match word {
            "UNSIGNED_INTEGER" | "MSB_UNSIGNED_INTEGER" => (ByteOrder::Big, SampleKind::Unsigned),
            "LSB_UNSIGNED_INTEGER" | "PC_UNSIGNED_INTEGER" => {
                (ByteOrder::Little, SampleKind::Unsigned)
            }
            "INTEGER" | "SIGNED_INTEGER" | "MSB_INTEGER" | "MSB_SIGNED_INTEGER" => {
                (ByteOrder::Big, SampleKind::Signed)
            }
            "LSB_INTEGER" | "LSB_SIGNED_INTEGER" | "PC_INTEGER" => {
                (ByteOrder::Little, SampleKind::Signed)
            }
            "IEEE_REAL" | "IEEE_DOUBLE" | "REAL" | "FLOAT" => (ByteOrder::Big, SampleKind::Float),
            "PC_REAL" => (ByteOrder::Little, SampleKind::Float),
            _ => return Err(unsupported()),
        };

        if bits % 8 != 0 {
            return Err(unsupported());
        }
        let width = (bits / 8) as usize;
        let supported = match kind {
            SampleKind::Unsigned | SampleKind::Signed => matches!(width, 1 | 2 | 4 | 8),
            SampleKind::Float => matches!(width, 4 | 8),
        };
        if !supported {
            return Err(unsupported());
        }

        Ok(Self {
            byte_order,
            kind,
            width,
        })
    }

    /// Compact type code, e.g. `>u2` for big-endian unsigned 16-bit.
    pub fn type_code(&self) -> String {
        let order = match self.byte_order {
            ByteOrder::Big => '>',
            ByteOrder::Little => '<',
        };
        let kind = match self.kind {
            SampleKind::Unsigned => 'u',
            SampleKind::Signed => 'i',
            SampleKind::Float => 'f',
        };
        format!("{order}{kind}{}", self.width)
    }
}

/// Target of the `^IMAGE` pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePointer {
    /// 1-based record index within the labelled file
    Record(u64),
    /// 1-based byte position within the labelled file (`<BYTES>` unit)
    Byte(u64),
    /// A separate data file, with an optional 1-based record index
    File { name: String, record: Option<u64> },
}

impl ImagePointer {
    /// Parses a pointer value such as `161`, `600 <BYTES>`, `"X.IMG"` or
    /// `("X.IMG", 2)`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Ok(record) = value.parse() {
            return Some(Self::Record(record));
        }
        if let Some(bytes) = value.strip_suffix("<BYTES>") {
            return bytes.trim().parse().ok().map(Self::Byte);
        }

        let (name, record) = match value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
            Some(inner) => match inner.split_once(',') {
                Some((name, record)) => (name, Some(record.trim().parse().ok()?)),
                None => (inner, None),
            },
            None => (value, None),
        };
        let name = name.trim().trim_matches('"').trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::File {
            name: name.to_owned(),
            record,
        })
    }
}

/// Location and geometry of an image, derived from its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Byte offset of the first sample in the data file
    pub offset: u64,
    pub bands: usize,
    pub lines: usize,
    /// Samples per line
    pub samples: usize,
    pub sample: SampleDescriptor,
    /// `BAND_STORAGE_TYPE` as found in the label, if any
    pub band_storage: Option<String>,
}

impl ImageDescriptor {
    /// Output shape `(bands, lines, samples)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.bands, self.lines, self.samples)
    }

    /// Total number of samples, or `None` on overflow.
    pub fn element_count(&self) -> Option<usize> {
        self.bands.checked_mul(self.lines)?.checked_mul(self.samples)
    }

    /// Number of bytes to read, or `None` on overflow.
    pub fn byte_len(&self) -> Option<usize> {
        self.element_count()?.checked_mul(self.sample.width)
    }
}
