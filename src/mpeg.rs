//! MPEG audio frame header and Layer III side-information decoding.
//!
//! The 32-bit frame header and the 17/32-byte side info are described as
//! [BitSchema]s and lifted into typed structs. Derived values (bitrate,
//! sample rate, frame length) come from the standard lookup tables; reserved
//! indexes fail with [DecodeError::InvalidTableIndex].

use std::sync::LazyLock;

use crate::errors::DecodeError;
use crate::field::Field;
use crate::schema::BitSchema;
use crate::transform::EnumSpec;
use crate::value::{Record, Value};

/// MPEG audio version, as encoded in the frame header. `Reserved` is a valid
/// wire code but has no bitrate table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MpegVersion {
    Version2_5,
    Reserved,
    Version2,
    Version1,
}

impl MpegVersion {
    pub fn from_code(code: u64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(MpegVersion::Version2_5),
            1 => Ok(MpegVersion::Reserved),
            2 => Ok(MpegVersion::Version2),
            3 => Ok(MpegVersion::Version1),
            _ => Err(invalid_code(code, "MpegVersion")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Layer {
    Reserved,
    LayerIII,
    LayerII,
    LayerI,
}

impl Layer {
    pub fn from_code(code: u64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(Layer::Reserved),
            1 => Ok(Layer::LayerIII),
            2 => Ok(Layer::LayerII),
            3 => Ok(Layer::LayerI),
            _ => Err(invalid_code(code, "Layer")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    SingleChannel,
}

impl ChannelMode {
    pub fn from_code(code: u64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(ChannelMode::Stereo),
            1 => Ok(ChannelMode::JointStereo),
            2 => Ok(ChannelMode::DualChannel),
            3 => Ok(ChannelMode::SingleChannel),
            _ => Err(invalid_code(code, "ChannelMode")),
        }
    }
}

/// Granule block type. Granules decoded through the long-block layout are
/// always [BlockType::Normal].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BlockType {
    Normal,
    Start,
    Short,
    End,
}

impl BlockType {
    pub fn from_code(code: u64) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(BlockType::Normal),
            1 => Ok(BlockType::Start),
            2 => Ok(BlockType::Short),
            3 => Ok(BlockType::End),
            _ => Err(invalid_code(code, "BlockType")),
        }
    }
}

fn invalid_code(value: u64, enumeration: &'static str) -> DecodeError {
    DecodeError::InvalidEnumValue {
        field: "",
        offset: 0,
        value,
        enumeration,
    }
}

const VERSIONS: EnumSpec = EnumSpec::new("MpegVersion", &[0, 1, 2, 3]);
const LAYERS: EnumSpec = EnumSpec::new("Layer", &[0, 1, 2, 3]);
const CHANNEL_MODES: EnumSpec = EnumSpec::new("ChannelMode", &[0, 1, 2, 3]);
const BLOCK_TYPES: EnumSpec = EnumSpec::new("BlockType", &[0, 1, 2, 3]);

/// Rows: V1-LI, V1-LII, V1-LIII, V2/V2.5-LI, V2/V2.5-LII/LIII. Columns are
/// the 4-bit bitrate index; index 15 ("free format") is rejected before
/// lookup. Values in kbit/s.
const BITRATE_TABLE: [[u32; 15]; 5] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

const SAMPLE_RATE_TABLE: [u32; 3] = [44100, 48000, 32000];

/// (slen1, slen2) scale-factor group bit lengths by scalefac_compress code.
const SLEN_TABLE: [(u8, u8); 16] = [
    (0, 0),
    (0, 1),
    (0, 2),
    (0, 3),
    (3, 0),
    (1, 1),
    (1, 2),
    (1, 3),
    (2, 1),
    (2, 2),
    (2, 3),
    (3, 1),
    (3, 2),
    (3, 3),
    (4, 2),
    (4, 3),
];

/// Bytes occupied by the frame header on the wire.
pub const FRAME_HEADER_SIZE: usize = 4;

static FRAME_HEADER: LazyLock<BitSchema> = LazyLock::new(|| {
    BitSchema::compile(vec![
        Field::uint("frame_sync", 11),
        Field::enumerated("version", 2, VERSIONS),
        Field::enumerated("layer", 2, LAYERS),
        Field::uint("protection", 1),
        Field::uint("bitrate_index", 4),
        Field::uint("sample_rate_index", 2),
        Field::flag("padding"),
        Field::flag("private"),
        Field::enumerated("channel_mode", 2, CHANNEL_MODES),
        Field::uint("mode_extension", 2),
        Field::flag("copyright"),
        Field::flag("original"),
        Field::uint("emphasis", 2),
    ])
    .expect("frame header schema is well formed")
});

fn granule_fields() -> Vec<Field> {
    vec![
        Field::uint("part2_3_length", 12),
        Field::uint("big_values", 9),
        Field::uint("global_gain", 8),
        Field::uint("scalefac_compress", 4),
        Field::flag("window_switching"),
        // Both arms are exactly 22 bits; compile asserts the balance.
        Field::switch(
            "block",
            "window_switching",
            vec![
                (
                    1,
                    vec![
                        Field::enumerated("block_type", 2, BLOCK_TYPES),
                        Field::flag("mixed_block"),
                        Field::uint("table_select", 5).with_shape(&[2]),
                        Field::uint("subblock_gain", 3).with_shape(&[3]),
                    ],
                ),
                (
                    0,
                    vec![
                        Field::uint("table_select", 5).with_shape(&[3]),
                        Field::uint("region0_count", 4),
                        Field::uint("region1_count", 3),
                    ],
                ),
            ],
        ),
        Field::flag("preflag"),
        Field::uint("scalefac_scale", 1),
        Field::uint("count1table_select", 1),
    ]
}

fn side_info_fields(channels: usize) -> Vec<Field> {
    vec![
        Field::uint("main_data_begin", 9),
        Field::uint("private_bits", if channels == 1 { 5 } else { 3 }),
        Field::uint("scfsi", 1).with_shape(&[channels, 4]),
        Field::structure("granule", granule_fields()).with_shape(&[2, channels]),
    ]
}

static SIDE_INFO_MONO: LazyLock<BitSchema> = LazyLock::new(|| {
    BitSchema::compile(side_info_fields(1)).expect("mono side info schema is well formed")
});

static SIDE_INFO_STEREO: LazyLock<BitSchema> = LazyLock::new(|| {
    BitSchema::compile(side_info_fields(2)).expect("stereo side info schema is well formed")
});

/// The 32-bit MPEG audio frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mp3FrameHeader {
    pub frame_sync: u16,
    pub version: MpegVersion,
    pub layer: Layer,
    /// 0 means a 16-bit CRC follows the header.
    pub protection: u8,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: bool,
    pub private: bool,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: u8,
}

impl Mp3FrameHeader {
    /// The frame header bit schema, for record-level introspection.
    pub fn schema() -> &'static BitSchema {
        &FRAME_HEADER
    }

    /// True iff `buf` starts with the 11-bit sync word: first byte 0xFF and
    /// the top three bits of the second byte set.
    pub fn has_frame_sync(buf: &[u8]) -> bool {
        buf.len() >= 2 && buf[0] == 0xff && (buf[1] >> 5) & 0x7 == 0x7
    }

    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let rec = FRAME_HEADER.parse(data)?;
        Ok(Mp3FrameHeader {
            frame_sync: rec.uint("frame_sync")? as u16,
            version: MpegVersion::from_code(rec.uint("version")?)?,
            layer: Layer::from_code(rec.uint("layer")?)?,
            protection: rec.uint("protection")? as u8,
            bitrate_index: rec.uint("bitrate_index")? as u8,
            sample_rate_index: rec.uint("sample_rate_index")? as u8,
            padding: rec.boolean("padding")?,
            private: rec.boolean("private")?,
            channel_mode: ChannelMode::from_code(rec.uint("channel_mode")?)?,
            mode_extension: rec.uint("mode_extension")? as u8,
            copyright: rec.boolean("copyright")?,
            original: rec.boolean("original")?,
            emphasis: rec.uint("emphasis")? as u8,
        })
    }

    /// Whether a 16-bit CRC follows the header.
    pub fn crc_protected(&self) -> bool {
        self.protection == 0
    }

    /// Bitrate in kbit/s. Index 15 ("free format") and reserved
    /// version/layer codes have no table entry.
    pub fn bitrate(&self) -> Result<u32, DecodeError> {
        if self.bitrate_index == 0xf {
            return Err(DecodeError::InvalidTableIndex {
                table: "bitrate",
                index: self.bitrate_index as u64,
            });
        }
        let row = match (self.version, self.layer) {
            (MpegVersion::Version1, Layer::LayerI) => 0,
            (MpegVersion::Version1, Layer::LayerII) => 1,
            (MpegVersion::Version1, Layer::LayerIII) => 2,
            (MpegVersion::Version2 | MpegVersion::Version2_5, Layer::LayerI) => 3,
            (
                MpegVersion::Version2 | MpegVersion::Version2_5,
                Layer::LayerII | Layer::LayerIII,
            ) => 4,
            _ => {
                return Err(DecodeError::InvalidTableIndex {
                    table: "bitrate",
                    index: self.bitrate_index as u64,
                });
            }
        };
        Ok(BITRATE_TABLE[row][self.bitrate_index as usize])
    }

    /// Sample rate in Hz: base table for version 1, halved for version 2,
    /// quartered for version 2.5. Index 3 is reserved.
    pub fn sample_rate(&self) -> Result<u32, DecodeError> {
        if self.sample_rate_index == 0x3 {
            return Err(DecodeError::InvalidTableIndex {
                table: "sample_rate",
                index: self.sample_rate_index as u64,
            });
        }
        let base = SAMPLE_RATE_TABLE[self.sample_rate_index as usize];
        Ok(match self.version {
            MpegVersion::Version2 => base / 2,
            MpegVersion::Version2_5 => base / 4,
            _ => base,
        })
    }

    /// Frame length in bytes, including the header.
    pub fn frame_length(&self) -> Result<u32, DecodeError> {
        let bitrate = self.bitrate()?;
        let sample_rate = self.sample_rate()?;
        let pad = self.padding as u32;
        Ok(if self.layer == Layer::LayerI {
            (12_000 * bitrate / sample_rate + pad) * 4
        } else {
            144_000 * bitrate / sample_rate + pad
        })
    }

    pub fn channel_count(&self) -> usize {
        if self.channel_mode == ChannelMode::SingleChannel {
            1
        } else {
            2
        }
    }
}

/// Per-granule, per-channel side information: a fixed 34-bit prefix, a
/// 22-bit layout chosen by the window-switching flag, and a 3-bit suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GranuleSideInfo {
    pub part2_3_length: u16,
    pub big_values: u16,
    pub global_gain: u8,
    pub scalefac_compress: u8,
    pub window_switching: bool,
    pub block: BlockLayout,
    pub preflag: bool,
    pub scalefac_scale: u8,
    pub count1table_select: u8,
}

/// The 22-bit conditional block of a granule, chosen at decode time by the
/// window-switching flag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BlockLayout {
    /// Window-switching layout: explicit block type, two region table
    /// selections, and per-subblock gains.
    Switched {
        block_type: BlockType,
        mixed_block: bool,
        table_select: [u8; 2],
        subblock_gain: [u8; 3],
    },
    /// Long-block layout: three region table selections plus region sizes.
    Long {
        table_select: [u8; 3],
        region0_count: u8,
        region1_count: u8,
    },
}

impl GranuleSideInfo {
    /// The effective block type; the long-block layout is always
    /// [BlockType::Normal].
    pub fn block_type(&self) -> BlockType {
        match &self.block {
            BlockLayout::Switched { block_type, .. } => *block_type,
            BlockLayout::Long { .. } => BlockType::Normal,
        }
    }

    /// (slen1, slen2) scale-factor group bit lengths for this granule's
    /// scalefac_compress code.
    pub fn slen(&self) -> (u8, u8) {
        SLEN_TABLE[(self.scalefac_compress & 0xf) as usize]
    }

    fn from_record(rec: &Record) -> Result<Self, DecodeError> {
        let window_switching = rec.boolean("window_switching")?;
        let block_rec = rec.record("block")?;
        let block = if window_switching {
            BlockLayout::Switched {
                block_type: BlockType::from_code(block_rec.uint("block_type")?)?,
                mixed_block: block_rec.boolean("mixed_block")?,
                table_select: uint_array(block_rec, "table_select")?,
                subblock_gain: uint_array(block_rec, "subblock_gain")?,
            }
        } else {
            BlockLayout::Long {
                table_select: uint_array(block_rec, "table_select")?,
                region0_count: block_rec.uint("region0_count")? as u8,
                region1_count: block_rec.uint("region1_count")? as u8,
            }
        };
        Ok(GranuleSideInfo {
            part2_3_length: rec.uint("part2_3_length")? as u16,
            big_values: rec.uint("big_values")? as u16,
            global_gain: rec.uint("global_gain")? as u8,
            scalefac_compress: rec.uint("scalefac_compress")? as u8,
            window_switching,
            block,
            preflag: rec.boolean("preflag")?,
            scalefac_scale: rec.uint("scalefac_scale")? as u8,
            count1table_select: rec.uint("count1table_select")? as u8,
        })
    }
}

/// Layer III side information: 17 bytes for mono, 32 for stereo.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mp3SideInfo {
    pub main_data_begin: u16,
    pub private_bits: u8,
    /// Scale-factor selection info, `[channel][band group]`.
    pub scfsi: Vec<[u8; 4]>,
    /// Indexed `[granule][channel]`.
    pub granules: Vec<Vec<GranuleSideInfo>>,
    /// Bytes this structure occupies on the wire.
    pub size: usize,
}

impl Mp3SideInfo {
    /// The side-info bit schema for the given channel count, for
    /// record-level introspection.
    pub fn schema(channels: usize) -> Option<&'static BitSchema> {
        match channels {
            1 => Some(&SIDE_INFO_MONO),
            2 => Some(&SIDE_INFO_STEREO),
            _ => None,
        }
    }

    pub fn parse(data: &[u8], channels: usize) -> Result<Self, DecodeError> {
        let schema = Self::schema(channels).ok_or_else(|| {
            DecodeError::MalformedHeader(format!(
                "side info supports 1 or 2 channels, got {channels}"
            ))
        })?;
        let rec = schema.parse(data)?;

        let mut scfsi = Vec::with_capacity(channels);
        for row in rec.array("scfsi")? {
            let row = row.as_array().ok_or(DecodeError::UnexpectedShape {
                field: "scfsi",
                expected: "array",
            })?;
            scfsi.push(uint_slice_array(row, "scfsi")?);
        }

        let mut granules = Vec::with_capacity(2);
        for row in rec.array("granule")? {
            let row = row.as_array().ok_or(DecodeError::UnexpectedShape {
                field: "granule",
                expected: "array",
            })?;
            let mut per_channel = Vec::with_capacity(channels);
            for v in row {
                let sub = v.as_record().ok_or(DecodeError::UnexpectedShape {
                    field: "granule",
                    expected: "record",
                })?;
                per_channel.push(GranuleSideInfo::from_record(sub)?);
            }
            granules.push(per_channel);
        }

        Ok(Mp3SideInfo {
            main_data_begin: rec.uint("main_data_begin")? as u16,
            private_bits: rec.uint("private_bits")? as u8,
            scfsi,
            granules,
            size: schema.total_bytes(),
        })
    }
}

/// One whole frame prefix: header, optional CRC, side info.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mp3Frame {
    pub header: Mp3FrameHeader,
    pub crc: Option<u16>,
    pub side_info: Mp3SideInfo,
}

impl Mp3Frame {
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let header = Mp3FrameHeader::parse(data)?;
        let mut offset = FRAME_HEADER_SIZE;

        let crc = if header.crc_protected() {
            let bytes = data
                .get(offset..offset + 2)
                .ok_or(DecodeError::TruncatedBuffer {
                    field: "crc",
                    offset,
                    requested: 2,
                    available: data.len().saturating_sub(offset),
                })?;
            offset += 2;
            Some(u16::from_be_bytes([bytes[0], bytes[1]]))
        } else {
            None
        };

        let rest = data.get(offset..).unwrap_or(&[]);
        let side_info = Mp3SideInfo::parse(rest, header.channel_count())?;
        Ok(Mp3Frame {
            header,
            crc,
            side_info,
        })
    }
}

fn uint_array<const N: usize>(rec: &Record, name: &'static str) -> Result<[u8; N], DecodeError> {
    uint_slice_array(rec.array(name)?, name)
}

fn uint_slice_array<const N: usize>(
    values: &[Value],
    name: &'static str,
) -> Result<[u8; N], DecodeError> {
    let mut out = [0u8; N];
    if values.len() != N {
        return Err(DecodeError::UnexpectedShape {
            field: name,
            expected: "fixed-length array",
        });
    }
    for (slot, v) in out.iter_mut().zip(values) {
        *slot = v.as_uint().ok_or(DecodeError::UnexpectedShape {
            field: name,
            expected: "integer array",
        })? as u8;
    }
    Ok(out)
}
