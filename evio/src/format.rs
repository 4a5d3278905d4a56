//! Binary format definitions for EVIO v6 (HIPO) files
//!
//! An EVIO v6 file has the following structure:
//!
//! ```text
//! +--------------------------------------+
//! | File header (14 x 32-bit words)      |
//! +--------------------------------------+
//! | Optional index: N x (len, count)     |
//! +--------------------------------------+
//! | Optional user header (padded)        |
//! +--------------------------------------+
//! | Record 1                             |
//! +--------------------------------------+
//! | ...                                  |
//! +--------------------------------------+
//! | Record N                             |
//! +--------------------------------------+
//! | Optional trailer record (with index) |
//! +--------------------------------------+
//! ```
//!
//! Each record is a 14-word header, an event-length index, an optional user
//! header, and an event payload that may be compressed as one unit. Events
//! are trees of banks, segments, and tagsegments; their one- or two-word
//! headers are bit-packed as described on [`StructureHeader`].
//!
//! Everything is 4-byte aligned. The magic word 0xC0DA0100 in every header
//! doubles as the endianness oracle.

use crate::buffer::{ByteBuffer, ByteOrder};
use crate::error::{EvioError, Result};

/// Magic word present in word 7 of every header: 0xC0DA0100
pub const MAGIC: u32 = 0xC0DA_0100;

/// The magic word as seen through the wrong byte order
pub const MAGIC_SWAPPED: u32 = MAGIC.swap_bytes();

/// Format version implemented by this crate
pub const EVIO_VERSION: u32 = 6;

/// Record and file headers are always 14 words
pub const HEADER_WORDS: u32 = 14;

/// Header size in bytes (14 x 4)
pub const HEADER_BYTES: usize = 56;

/// Bytes of padding needed to bring `len` to a 4-byte boundary
pub fn padding(len: usize) -> usize {
    (4 - (len & 3)) & 3
}

/// `len` rounded up to a 4-byte boundary
pub fn pad4(len: usize) -> usize {
    len + padding(len)
}

/// Payload compression applied to a record's event data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum CompressionType {
    /// No compression
    #[default]
    None = 0,
    /// LZ4 fast
    Lz4 = 1,
    /// LZ4 best (high-compression mode)
    Lz4Best = 2,
    /// Gzip
    Gzip = 3,
}

impl TryFrom<u32> for CompressionType {
    type Error = EvioError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lz4),
            2 => Ok(CompressionType::Lz4Best),
            3 => Ok(CompressionType::Gzip),
            _ => Err(EvioError::Codec(format!(
                "unknown compression type {value}"
            ))),
        }
    }
}

impl CompressionType {
    /// True unless this is [`CompressionType::None`]
    pub fn is_compressed(self) -> bool {
        self != CompressionType::None
    }
}

/// General header type carried in bits 28-31 of the bit-info word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum HeaderType {
    /// An evio record header
    #[default]
    EvioRecord = 0,
    /// An evio file header
    EvioFile = 1,
    /// An evio trailer record
    EvioTrailer = 3,
    /// A HIPO record header
    HipoRecord = 4,
    /// A HIPO file header
    HipoFile = 5,
    /// A HIPO trailer record
    HipoTrailer = 7,
}

impl TryFrom<u32> for HeaderType {
    type Error = EvioError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(HeaderType::EvioRecord),
            1 => Ok(HeaderType::EvioFile),
            3 => Ok(HeaderType::EvioTrailer),
            4 => Ok(HeaderType::HipoRecord),
            5 => Ok(HeaderType::HipoFile),
            7 => Ok(HeaderType::HipoTrailer),
            _ => Err(EvioError::BadMagic(value)),
        }
    }
}

impl HeaderType {
    /// True for the two file-header kinds
    pub fn is_file_header(self) -> bool {
        matches!(self, HeaderType::EvioFile | HeaderType::HipoFile)
    }

    /// True for the two trailer kinds
    pub fn is_trailer(self) -> bool {
        matches!(self, HeaderType::EvioTrailer | HeaderType::HipoTrailer)
    }
}

/// Payload type codes carried in structure headers (6-bit field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Uninterpreted 32-bit words
    Unknown32,
    /// Unsigned 32-bit integers
    Uint32,
    /// 32-bit floats
    Float32,
    /// Null-terminated ASCII strings
    CharStar8,
    /// Signed 16-bit integers
    Short16,
    /// Unsigned 16-bit integers
    Ushort16,
    /// Signed bytes
    Char8,
    /// Unsigned bytes
    Uchar8,
    /// 64-bit floats
    Double64,
    /// Signed 64-bit integers
    Long64,
    /// Unsigned 64-bit integers
    Ulong64,
    /// Signed 32-bit integers
    Int32,
    /// Children are tagsegments
    TagSegment,
    /// Children are segments (code 13)
    AlsoSegment,
    /// Children are banks (code 14)
    Bank,
    /// Hall B composite data
    Composite,
    /// Children are banks (code 16)
    AlsoBank,
    /// Children are segments (code 32)
    Segment,
    /// Any other code
    Other(u32),
}

impl DataType {
    /// Decode a 6-bit type code
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => DataType::Unknown32,
            1 => DataType::Uint32,
            2 => DataType::Float32,
            3 => DataType::CharStar8,
            4 => DataType::Short16,
            5 => DataType::Ushort16,
            6 => DataType::Char8,
            7 => DataType::Uchar8,
            8 => DataType::Double64,
            9 => DataType::Long64,
            10 => DataType::Ulong64,
            11 => DataType::Int32,
            12 => DataType::TagSegment,
            13 => DataType::AlsoSegment,
            14 => DataType::Bank,
            15 => DataType::Composite,
            16 => DataType::AlsoBank,
            32 => DataType::Segment,
            other => DataType::Other(other),
        }
    }

    /// The wire code for this type
    pub fn code(self) -> u32 {
        match self {
            DataType::Unknown32 => 0,
            DataType::Uint32 => 1,
            DataType::Float32 => 2,
            DataType::CharStar8 => 3,
            DataType::Short16 => 4,
            DataType::Ushort16 => 5,
            DataType::Char8 => 6,
            DataType::Uchar8 => 7,
            DataType::Double64 => 8,
            DataType::Long64 => 9,
            DataType::Ulong64 => 10,
            DataType::Int32 => 11,
            DataType::TagSegment => 12,
            DataType::AlsoSegment => 13,
            DataType::Bank => 14,
            DataType::Composite => 15,
            DataType::AlsoBank => 16,
            DataType::Segment => 32,
            DataType::Other(c) => c,
        }
    }

    /// True if the payload is a list of bank structures
    pub fn is_bank(self) -> bool {
        matches!(self, DataType::Bank | DataType::AlsoBank)
    }

    /// True if the payload is a list of segment structures
    pub fn is_segment(self) -> bool {
        matches!(self, DataType::Segment | DataType::AlsoSegment)
    }

    /// True if the payload is a list of tagsegment structures
    pub fn is_tagsegment(self) -> bool {
        matches!(self, DataType::TagSegment)
    }

    /// True if the payload is itself a list of evio structures
    pub fn is_container(self) -> bool {
        self.is_bank() || self.is_segment() || self.is_tagsegment()
    }

    /// Element width in bytes for swappable primitive payloads; `None` for
    /// containers, composite, and opaque or byte-oriented data
    /// (`Unknown32` bytes are carried untouched)
    pub fn element_size(self) -> Option<usize> {
        match self {
            DataType::Short16 | DataType::Ushort16 => Some(2),
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => Some(4),
            DataType::Double64 | DataType::Long64 | DataType::Ulong64 => Some(8),
            _ => None,
        }
    }
}

/// The three kinds of evio container structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureType {
    /// Two-word header: length, then tag/pad/type/num
    Bank,
    /// One-word header: tag(8) | pad(2) | type(6) | length(16)
    Segment,
    /// One-word header: tag(12) | type(4) | length(16)
    TagSegment,
}

impl StructureType {
    /// Header size in 32-bit words
    pub fn header_words(self) -> u32 {
        match self {
            StructureType::Bank => 2,
            StructureType::Segment | StructureType::TagSegment => 1,
        }
    }

    /// The structure kind contained by a payload of the given type, if any
    pub fn of_content(data_type: DataType) -> Option<StructureType> {
        if data_type.is_bank() {
            Some(StructureType::Bank)
        } else if data_type.is_segment() {
            Some(StructureType::Segment)
        } else if data_type.is_tagsegment() {
            Some(StructureType::TagSegment)
        } else {
            None
        }
    }
}

/// Decoded header of a bank, segment, or tagsegment.
///
/// Wire packing:
///
/// ```text
/// BANK        W0 = length - 1 (words after W0)
///             W1 = tag(16) | pad(2) | type(6) | num(8)
/// SEGMENT     W0 = tag(8) | pad(2) | type(6) | length(16)
/// TAGSEGMENT  W0 = tag(12) | type(4) | length(16)
/// ```
///
/// `length` here is the total structure size in words, header included;
/// the `length - 1` wire convention is applied during encode/decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureHeader {
    /// Which of the three structure kinds this is
    pub structure_type: StructureType,
    /// Total structure length in words, header words included
    pub length: u32,
    /// Tag (16 bits for banks, 8 for segments, 12 for tagsegments)
    pub tag: u32,
    /// Num field (banks only, 0 otherwise)
    pub num: u8,
    /// Count of padding bytes on the payload (0-3)
    pub pad: u8,
    /// Payload type
    pub data_type: DataType,
}

impl StructureHeader {
    /// Header size in words
    pub fn header_words(&self) -> u32 {
        self.structure_type.header_words()
    }

    /// Payload size in words
    pub fn data_words(&self) -> u32 {
        self.length - self.header_words()
    }

    /// Total structure size in bytes
    pub fn total_bytes(&self) -> usize {
        self.length as usize * 4
    }

    /// Decode a bank header from its two words
    pub fn parse_bank(word0: u32, word1: u32) -> Result<Self> {
        // W0 counts the words that follow it; a bank has at least its
        // second header word.
        if word0 < 1 {
            return Err(EvioError::BadLength(format!(
                "bank length word {word0} below minimum 1"
            )));
        }
        Ok(StructureHeader {
            structure_type: StructureType::Bank,
            length: word0 + 1,
            tag: word1 >> 16,
            pad: ((word1 >> 14) & 0x3) as u8,
            data_type: DataType::from_code((word1 >> 8) & 0x3f),
            num: (word1 & 0xff) as u8,
        })
    }

    /// Decode a segment header from its word
    pub fn parse_segment(word: u32) -> Self {
        StructureHeader {
            structure_type: StructureType::Segment,
            length: (word & 0xffff) + 1,
            tag: word >> 24,
            pad: ((word >> 22) & 0x3) as u8,
            data_type: DataType::from_code((word >> 16) & 0x3f),
            num: 0,
        }
    }

    /// Decode a tagsegment header from its word
    pub fn parse_tagsegment(word: u32) -> Self {
        StructureHeader {
            structure_type: StructureType::TagSegment,
            length: (word & 0xffff) + 1,
            tag: word >> 20,
            pad: 0,
            data_type: DataType::from_code((word >> 16) & 0xf),
            num: 0,
        }
    }

    /// Read a structure header of the given kind at `offset`
    pub fn read_at(
        buf: &ByteBuffer,
        offset: usize,
        structure_type: StructureType,
    ) -> Result<Self> {
        match structure_type {
            StructureType::Bank => {
                let w0 = buf.get_u32_at(offset)?;
                let w1 = buf.get_u32_at(offset + 4)?;
                Self::parse_bank(w0, w1)
            }
            StructureType::Segment => Ok(Self::parse_segment(buf.get_u32_at(offset)?)),
            StructureType::TagSegment => {
                Ok(Self::parse_tagsegment(buf.get_u32_at(offset)?))
            }
        }
    }

    /// Encode this header into its one or two words
    pub fn encode(&self) -> (u32, Option<u32>) {
        match self.structure_type {
            StructureType::Bank => {
                let w0 = self.length - 1;
                let w1 = (self.tag << 16)
                    | ((self.pad as u32 & 0x3) << 14)
                    | ((self.data_type.code() & 0x3f) << 8)
                    | self.num as u32;
                (w0, Some(w1))
            }
            StructureType::Segment => {
                let w = ((self.tag & 0xff) << 24)
                    | ((self.pad as u32 & 0x3) << 22)
                    | ((self.data_type.code() & 0x3f) << 16)
                    | ((self.length - 1) & 0xffff);
                (w, None)
            }
            StructureType::TagSegment => {
                let w = ((self.tag & 0xfff) << 20)
                    | ((self.data_type.code() & 0xf) << 16)
                    | ((self.length - 1) & 0xffff);
                (w, None)
            }
        }
    }

    /// Write this header at `offset`
    pub fn write_at(&self, buf: &mut ByteBuffer, offset: usize) -> Result<()> {
        let (w0, w1) = self.encode();
        buf.put_u32_at(offset, w0)?;
        if let Some(w1) = w1 {
            buf.put_u32_at(offset + 4, w1)?;
        }
        Ok(())
    }
}

/// Build the two header words of a bank; handy for tests and writers
pub fn encode_bank_header(data_words: u32, tag: u16, data_type: DataType, num: u8) -> [u32; 2] {
    let header = StructureHeader {
        structure_type: StructureType::Bank,
        length: data_words + 2,
        tag: tag as u32,
        num,
        pad: 0,
        data_type,
    };
    let (w0, w1) = header.encode();
    [w0, w1.unwrap()]
}

/// Serialize a bank with the given 32-bit payload into wire bytes
pub fn bank_of_u32(tag: u16, num: u8, payload: &[u32], order: ByteOrder) -> Vec<u8> {
    let mut buf = ByteBuffer::new(8 + payload.len() * 4, order);
    let words = encode_bank_header(payload.len() as u32, tag, DataType::Uint32, num);
    buf.write_u32(words[0]).unwrap();
    buf.write_u32(words[1]).unwrap();
    for v in payload {
        buf.write_u32(*v).unwrap();
    }
    buf.as_slice().to_vec()
}
