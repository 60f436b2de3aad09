//! # tagcraft
//!
//! Declarative decoding of MPEG audio frame metadata and ID3v2 tags.
//!
//! Two small engines drive everything: a bit-level schema engine
//! ([schema::BitSchema]) that consumes fields of arbitrary bit widths from a
//! shared cursor, and a byte-level one ([items::ByteSchema]) for structures
//! made of whole-byte items with pluggable transforms. The [mpeg] and [id3]
//! modules declare the actual wire formats on top of them and lift the decoded
//! records into typed structs.
//!
//! ## Example
//!
//! ```
//! use tagcraft::mpeg::Mp3FrameHeader;
//!
//! let header = Mp3FrameHeader::parse(&[0xFF, 0xFB, 0x90, 0x04]).unwrap();
//! assert_eq!(header.bitrate().unwrap(), 128);
//! assert_eq!(header.sample_rate().unwrap(), 44100);
//! assert_eq!(header.frame_length().unwrap(), 417);
//! ```

pub mod bits;
pub mod errors;
pub mod field;
pub mod id3;
pub mod items;
pub mod mpeg;
pub mod schema;
pub mod transform;
pub mod value;
