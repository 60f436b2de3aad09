//! ID3v2 tag decoding: tag/extended/frame headers, the unsynchronization
//! codec, and typed frame bodies for UFID and text frames.

use std::borrow::Cow;
use std::sync::LazyLock;

use crate::errors::DecodeError;
use crate::items::{ByteSchema, Fmt, Item};
use crate::transform::Synchsafe;

/// True iff `data` starts with the 3-byte `ID3` identifier.
pub fn has_id3v2(data: &[u8]) -> bool {
    data.starts_with(b"ID3")
}

/// Tag header flag bits.
pub mod tag_flags {
    pub const UNSYNCHRONIZATION: u8 = 1 << 7;
    pub const EXTENDED_HEADER: u8 = 1 << 6;
    pub const EXPERIMENTAL: u8 = 1 << 5;
}

/// Extended header flag bits.
pub mod ext_flags {
    pub const CRC_DATA_PRESENT: u16 = 1 << 15;
}

/// Frame header flag bits.
pub mod frame_flags {
    pub const TAG_ALTER_DISCARDED: u16 = 1 << 15;
    pub const FILE_ALTER_DISCARDED: u16 = 1 << 14;
    pub const READ_ONLY: u16 = 1 << 13;
    pub const COMPRESSION: u16 = 1 << 7;
    pub const ENCRYPTION: u16 = 1 << 6;
    pub const GROUPING: u16 = 1 << 5;
}

/// Bytes occupied by the tag header on the wire.
pub const HEADER_SIZE: usize = 10;

/// Bytes occupied by a frame header on the wire.
pub const FRAME_HEADER_SIZE: usize = 10;

static HEADER: LazyLock<ByteSchema> = LazyLock::new(|| {
    ByteSchema::compile(vec![
        Item::fixed("identifier", Fmt::Bytes(3)),
        Item::fixed("major_version", Fmt::U8),
        Item::fixed("minor_version", Fmt::U8),
        Item::fixed("flags", Fmt::U8),
        Item::fixed("tag_size", Fmt::Bytes(4)).with_transform(Synchsafe::new(4)),
    ])
    .expect("tag header schema is well formed")
});

static EXT_HEADER: LazyLock<ByteSchema> = LazyLock::new(|| {
    ByteSchema::compile(vec![
        Item::fixed("extended_header_size", Fmt::U32Be),
        Item::fixed("extended_flags", Fmt::U16Be),
        Item::fixed("padding_size", Fmt::U32Be),
    ])
    .expect("extended header schema is well formed")
});

static FRAME_HEADER: LazyLock<ByteSchema> = LazyLock::new(|| {
    ByteSchema::compile(vec![
        Item::fixed("frame_id", Fmt::Bytes(4)),
        Item::fixed("data_size", Fmt::U32Be),
        Item::fixed("flags", Fmt::U16Be),
    ])
    .expect("frame header schema is well formed")
});

/// The 10-byte tag header. `tag_size` is the synchsafe-decoded content
/// length, excluding this header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Id3v2Header {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u8,
    pub tag_size: u32,
}

impl Id3v2Header {
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        if !has_id3v2(data) {
            return Err(DecodeError::MalformedHeader(
                "missing ID3 identifier".to_string(),
            ));
        }
        let rec = HEADER.parse(data)?;
        Ok(Id3v2Header {
            major_version: rec.uint("major_version")? as u8,
            minor_version: rec.uint("minor_version")? as u8,
            flags: rec.uint("flags")? as u8,
            tag_size: rec.uint("tag_size")? as u32,
        })
    }

    pub fn unsynchronized(&self) -> bool {
        self.flags & tag_flags::UNSYNCHRONIZATION != 0
    }

    pub fn has_extended_header(&self) -> bool {
        self.flags & tag_flags::EXTENDED_HEADER != 0
    }

    pub fn experimental(&self) -> bool {
        self.flags & tag_flags::EXPERIMENTAL != 0
    }
}

/// Reverses unsynchronization: every `FF 00` pair becomes `FF`, scanning
/// left to right without overlap.
pub fn remove_unsynchronization(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());
    let mut i = 0;
    while i < buf.len() {
        out.push(buf[i]);
        if buf[i] == 0xff && buf.get(i + 1) == Some(&0x00) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// The insertion half of the codec: a `00` stuffing byte after every `FF`,
/// so tag content can never contain a false MPEG sync word.
pub fn apply_unsynchronization(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());
    for &b in buf {
        out.push(b);
        if b == 0xff {
            out.push(0x00);
        }
    }
    out
}

/// Optional extended header, plus the trailing CRC when flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Id3v2ExtendedHeader {
    pub extended_header_size: u32,
    pub flags: u16,
    pub padding_size: u32,
    pub crc: Option<u32>,
    /// Bytes consumed from the tag content, CRC included.
    pub size: usize,
}

impl Id3v2ExtendedHeader {
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let rec = EXT_HEADER.parse(data)?;
        let flags = rec.uint("extended_flags")? as u16;
        let mut size = rec.consumed();
        let crc = if flags & ext_flags::CRC_DATA_PRESENT != 0 {
            let bytes = data
                .get(size..size + 4)
                .ok_or(DecodeError::TruncatedBuffer {
                    field: "total_frame_crc",
                    offset: size,
                    requested: 4,
                    available: data.len().saturating_sub(size),
                })?;
            size += 4;
            Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        } else {
            None
        };
        Ok(Id3v2ExtendedHeader {
            extended_header_size: rec.uint("extended_header_size")? as u32,
            flags,
            padding_size: rec.uint("padding_size")? as u32,
            crc,
            size,
        })
    }
}

/// The 10-byte frame header preceding each frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Id3v2FrameHeader {
    pub frame_id: [u8; 4],
    pub data_size: u32,
    pub flags: u16,
}

impl Id3v2FrameHeader {
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let rec = FRAME_HEADER.parse(data)?;
        let frame_id: [u8; 4] =
            rec.bytes("frame_id")?
                .try_into()
                .map_err(|_| DecodeError::UnexpectedShape {
                    field: "frame_id",
                    expected: "4 bytes",
                })?;
        Ok(Id3v2FrameHeader {
            frame_id,
            data_size: rec.uint("data_size")? as u32,
            flags: rec.uint("flags")? as u16,
        })
    }
}

/// Text encoding byte of a text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TextEncoding {
    Latin1,
    /// UTF-16 with a leading byte-order mark; little-endian when absent.
    Utf16,
    Utf16Be,
    Utf8,
}

impl TextEncoding {
    pub fn from_code(code: u64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(TextEncoding::Latin1),
            1 => Ok(TextEncoding::Utf16),
            2 => Ok(TextEncoding::Utf16Be),
            3 => Ok(TextEncoding::Utf8),
            _ => Err(DecodeError::InvalidEnumValue {
                field: "text_encoding",
                offset: 0,
                value: code,
                enumeration: "TextEncoding",
            }),
        }
    }
}

/// A decoded frame body. Frames without a dedicated decoder keep their raw
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FrameBody {
    /// `UFID`: owner and identifier split at the first NUL.
    UniqueFileId {
        owner_id: Vec<u8>,
        identifier: Vec<u8>,
    },
    /// `T`-prefixed frames other than `TXXX`.
    Text {
        encoding: TextEncoding,
        text: String,
    },
    Raw(Vec<u8>),
}

fn decode_frame_body(frame_id: &[u8; 4], body: &[u8]) -> Result<FrameBody, DecodeError> {
    if frame_id == b"UFID" {
        let nul = body.iter().position(|&b| b == 0).ok_or_else(|| {
            DecodeError::MalformedHeader("UFID frame missing NUL separator".to_string())
        })?;
        Ok(FrameBody::UniqueFileId {
            owner_id: body[..nul].to_vec(),
            identifier: body[nul + 1..].to_vec(),
        })
    } else if frame_id[0] == b'T' && frame_id != b"TXXX" {
        let &code = body.first().ok_or_else(|| {
            DecodeError::MalformedHeader("text frame missing encoding byte".to_string())
        })?;
        let encoding = TextEncoding::from_code(code as u64)?;
        Ok(FrameBody::Text {
            encoding,
            text: decode_text(encoding, &body[1..])?,
        })
    } else {
        Ok(FrameBody::Raw(body.to_vec()))
    }
}

/// Decodes frame text and drops the trailing terminator character.
fn decode_text(encoding: TextEncoding, bytes: &[u8]) -> Result<String, DecodeError> {
    let mut text = match encoding {
        TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        TextEncoding::Utf8 => std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::MalformedHeader("invalid UTF-8 text".to_string()))?
            .to_string(),
        TextEncoding::Utf16 => match bytes {
            [0xfe, 0xff, rest @ ..] => decode_utf16_units(rest, true)?,
            [0xff, 0xfe, rest @ ..] => decode_utf16_units(rest, false)?,
            _ => decode_utf16_units(bytes, false)?,
        },
        TextEncoding::Utf16Be => decode_utf16_units(bytes, true)?,
    };
    text.pop();
    Ok(text)
}

fn decode_utf16_units(bytes: &[u8], big_endian: bool) -> Result<String, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::MalformedHeader(
            "UTF-16 text has odd byte length".to_string(),
        ));
    }
    let units = bytes.chunks_exact(2).map(|pair| {
        if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| DecodeError::MalformedHeader("invalid UTF-16 text".to_string()))
}

/// One frame: header plus decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Id3v2Frame {
    pub header: Id3v2FrameHeader,
    pub body: FrameBody,
}

/// A whole decoded tag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Id3v2Tag {
    pub header: Id3v2Header,
    pub extended_header: Option<Id3v2ExtendedHeader>,
    pub frames: Vec<Id3v2Frame>,
    /// Bytes the tag occupies in the source buffer, header included.
    pub size: usize,
}

impl Id3v2Tag {
    /// Decodes header, optional extended header, and frames until padding or
    /// end of content. Unsynchronization is reversed on the whole content
    /// before any frame decoding.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let header = Id3v2Header::parse(data)?;
        let end = HEADER_SIZE + header.tag_size as usize;
        let content = data
            .get(HEADER_SIZE..end)
            .ok_or(DecodeError::TruncatedBuffer {
                field: "tag_content",
                offset: HEADER_SIZE,
                requested: header.tag_size as usize,
                available: data.len().saturating_sub(HEADER_SIZE),
            })?;
        let content: Cow<[u8]> = if header.unsynchronized() {
            Cow::Owned(remove_unsynchronization(content))
        } else {
            Cow::Borrowed(content)
        };

        let mut offset = 0usize;
        let extended_header = if header.has_extended_header() {
            let ext = Id3v2ExtendedHeader::parse(&content)?;
            offset += ext.size;
            Some(ext)
        } else {
            None
        };

        let mut frames = Vec::new();
        // Padding is NUL-filled, so a zero byte where a frame id should
        // start ends the loop.
        while offset < content.len() && content[offset] != 0 {
            let frame_header = Id3v2FrameHeader::parse(&content[offset..])?;
            offset += FRAME_HEADER_SIZE;
            let body_len = frame_header.data_size as usize;
            let body =
                content
                    .get(offset..offset + body_len)
                    .ok_or(DecodeError::TruncatedBuffer {
                        field: "frame_body",
                        offset,
                        requested: body_len,
                        available: content.len().saturating_sub(offset),
                    })?;
            offset += body_len;
            frames.push(Id3v2Frame {
                body: decode_frame_body(&frame_header.frame_id, body)?,
                header: frame_header,
            });
        }

        Ok(Id3v2Tag {
            header,
            extended_header,
            frames,
            size: end,
        })
    }
}
