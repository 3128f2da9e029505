//! PDS3/ODL label parser and raw image decoder.
//!
//! This crate parses the ODL text labels that describe planetary science
//! data products and uses them to decode the raw image samples, either from
//! a file that carries its label in front of the pixels or from a detached
//! `.LBL`/`.IMG` pair.
//!
//! # Example
//!
//! ```no_run
//! use pds3_core::{read_lbl_img, LabelParser};
//!
//! let label = LabelParser::new().parse_file("3531ML1023500011404703C00_DRXX.LBL").unwrap();
//! let lines: Option<u32> = label.get("IMAGE/LINES").unwrap();
//! let counters: Option<Vec<i64>> = label.get_array("ROVER_MOTION_COUNTER").unwrap();
//! println!("{lines:?} lines, motion counter {counters:?}");
//!
//! let image = read_lbl_img("3531ML1023500011404703C00_DRXX.LBL", None).unwrap();
//! println!("{} {:?}", image.descriptor.sample.type_code(), image.data.shape());
//! ```
//!
//! # Features
//!
//! - Multi-line quoted strings and sequences
//! - `GROUP`/`OBJECT` scopes flattened into `/`-joined key paths
//! - Partial labels recovered when an embedded label runs into binary data
//! - Calendar and mission solar time decoding
//! - Integer and IEEE real samples of either byte order

pub mod decoder;
pub mod label;
pub mod parser;
pub mod time;
pub mod tokenizer;
pub mod types;

// Re-export commonly used types
pub use decoder::{read_img, read_lbl_img, DecodeError, Image, ImageData, ImageDecoder};
pub use label::{FromLabelValue, Label, LabelError};
pub use parser::{Diagnostic, DiagnosticKind, LabelParser, ParseOptions};
pub use time::{parse_calendar, parse_sol, SolTime, TimeError};
pub use types::{ByteOrder, ImageDescriptor, ImagePointer, SampleDescriptor, SampleKind};
