//! Record and file header codec
//!
//! Every record, file header, and trailer in an EVIO v6 stream starts with
//! the same 14-word layout:
//!
//! ```text
//! word  0   record length (32-bit words, header included)
//! word  1   record number
//! word  2   header length (always 14)
//! word  3   entries (event count; record count in file headers)
//! word  4   index length in bytes
//! word  5   bit info | version (version in the low 8 bits)
//! word  6   user header length in bytes
//! word  7   magic 0xC0DA0100 (endianness oracle)
//! word  8   uncompressed data length in bytes
//! word  9   compression type (4 bits) | compressed length in words (28 bits)
//! word 10-11  user register 1 (64 bits)
//! word 12-13  user register 2 (64 bits)
//! ```
//!
//! Reading is endian-adaptive: the magic word decides whether the source
//! buffer's byte order is kept or flipped. The two user registers are read
//! as single 64-bit quantities in the detected order, never as two
//! independently swapped 32-bit halves.
//!
//! File headers reuse the same codec: their `entries` field counts records,
//! `user_register1` holds the trailer position, and bit 10 of the bit-info
//! word means "trailer with index present" instead of "has first event".

use crate::buffer::{ByteBuffer, ByteOrder};
use crate::error::{EvioError, Result};
use crate::format::{
    pad4, padding, CompressionType, HeaderType, EVIO_VERSION, HEADER_BYTES, HEADER_WORDS, MAGIC,
    MAGIC_SWAPPED,
};

/// Bit 8 of the bit-info word: record carries a dictionary
const DICTIONARY_BIT: u32 = 1 << 8;
/// Bit 9: last record in the stream
const LAST_RECORD_BIT: u32 = 1 << 9;
/// Bit 10: record has a first event; on file headers, trailer-with-index
const FIRST_EVENT_BIT: u32 = 1 << 10;

/// Bits 20-21: user-header padding
const PAD1_SHIFT: u32 = 20;
/// Bits 22-23: compressed-data padding
const PAD2_SHIFT: u32 = 22;
/// Bits 24-25: uncompressed-data padding
const PAD3_SHIFT: u32 = 24;
/// Bits 28-31: general header type
const TYPE_SHIFT: u32 = 28;

/// Decoded 14-word record, file, or trailer header.
///
/// The length fields (`record_length`, paddings, compressed words) are
/// derived: [`RecordHeader::write_at`] recomputes them from the primary
/// fields before serializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// What kind of header this is (bits 28-31 of the bit-info word)
    pub header_type: HeaderType,
    /// Total length in words, header included (derived on write)
    pub record_length: u32,
    /// Position in the stream, 1-based and monotone
    pub record_number: u32,
    /// Event count (record count for file headers)
    pub entries: u32,
    /// Event index length in bytes (4 x entries when present)
    pub index_length: u32,
    /// User header length in bytes, before padding
    pub user_header_length: u32,
    /// Event payload length in bytes, before compression and padding
    pub uncompressed_data_length: u32,
    /// Compressed payload length in bytes (0 when uncompressed)
    pub compressed_data_length: u32,
    /// Payload compression
    pub compression_type: CompressionType,
    /// First 64-bit user register (trailer position in file headers)
    pub user_register1: u64,
    /// Second 64-bit user register
    pub user_register2: u64,
    /// Format version (low 8 bits of the bit-info word)
    pub version: u32,
    /// Record carries a dictionary as its first event
    pub has_dictionary: bool,
    /// Last record in the stream
    pub is_last_record: bool,
    /// Record carries a first event; trailer-with-index on file headers
    pub has_first_event: bool,
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new(HeaderType::EvioRecord)
    }
}

impl RecordHeader {
    /// An empty header of the given type, version 6
    pub fn new(header_type: HeaderType) -> Self {
        RecordHeader {
            header_type,
            record_length: HEADER_WORDS,
            record_number: 1,
            entries: 0,
            index_length: 0,
            user_header_length: 0,
            uncompressed_data_length: 0,
            compressed_data_length: 0,
            compression_type: CompressionType::None,
            user_register1: 0,
            user_register2: 0,
            version: EVIO_VERSION,
            has_dictionary: false,
            is_last_record: false,
            has_first_event: false,
        }
    }

    /// A trailer header: last-record bit set, no payload
    pub fn trailer(record_number: u32, index_length: u32) -> Self {
        let mut h = Self::new(HeaderType::EvioTrailer);
        h.record_number = record_number;
        h.index_length = index_length;
        h.is_last_record = true;
        h
    }

    /// Padding bytes after the user header
    pub fn user_header_padding(&self) -> u8 {
        padding(self.user_header_length as usize) as u8
    }

    /// Padding bytes after the compressed payload
    pub fn compressed_padding(&self) -> u8 {
        padding(self.compressed_data_length as usize) as u8
    }

    /// Padding bytes after the uncompressed payload
    pub fn data_padding(&self) -> u8 {
        padding(self.uncompressed_data_length as usize) as u8
    }

    /// Payload bytes as they appear on the wire, padding included
    pub fn payload_bytes_on_wire(&self) -> usize {
        if self.compression_type.is_compressed() {
            pad4(self.compressed_data_length as usize)
        } else {
            pad4(self.uncompressed_data_length as usize)
        }
    }

    /// Offset of the event payload from the start of this header
    pub fn data_offset(&self) -> usize {
        HEADER_BYTES + self.index_length as usize + pad4(self.user_header_length as usize)
    }

    /// Total on-wire size in bytes
    pub fn total_bytes(&self) -> usize {
        self.record_length as usize * 4
    }

    /// Recompute `record_length` from the primary length fields
    pub fn compute_lengths(&mut self) {
        let bytes = HEADER_BYTES
            + self.index_length as usize
            + pad4(self.user_header_length as usize)
            + self.payload_bytes_on_wire();
        self.record_length = (bytes / 4) as u32;
    }

    /// Pack the bit-info word (word 5)
    pub fn bit_info(&self) -> u32 {
        let mut word = self.version & 0xff;
        if self.has_dictionary {
            word |= DICTIONARY_BIT;
        }
        if self.is_last_record {
            word |= LAST_RECORD_BIT;
        }
        if self.has_first_event {
            word |= FIRST_EVENT_BIT;
        }
        word |= (self.user_header_padding() as u32) << PAD1_SHIFT;
        word |= (self.compressed_padding() as u32) << PAD2_SHIFT;
        word |= (self.data_padding() as u32) << PAD3_SHIFT;
        word |= (self.header_type as u32) << TYPE_SHIFT;
        word
    }

    /// On file headers, the byte position of the trailer record
    pub fn trailer_position(&self) -> u64 {
        self.user_register1
    }

    /// On file headers, bit 10 means a trailer-with-index is present
    pub fn has_trailer_with_index(&self) -> bool {
        self.has_first_event
    }

    /// Read a header at `offset`, adapting the buffer's byte order to the
    /// magic word.
    ///
    /// On success the buffer's order is the file's order; a flipped buffer
    /// is the only side effect. Fails with `BadMagic` when word 7 matches
    /// neither form of the magic and `UnsupportedVersion` below version 6.
    pub fn read_at(buf: &mut ByteBuffer, offset: usize) -> Result<RecordHeader> {
        let magic = buf.get_u32_at(offset + 28)?;
        if magic == MAGIC_SWAPPED {
            buf.set_order(buf.order().swapped());
        } else if magic != MAGIC {
            return Err(EvioError::BadMagic(magic));
        }

        let bit_info = buf.get_u32_at(offset + 20)?;
        let version = bit_info & 0xff;
        if version < EVIO_VERSION {
            return Err(EvioError::UnsupportedVersion(version));
        }

        let header_length = buf.get_u32_at(offset + 8)?;
        if header_length != HEADER_WORDS {
            return Err(EvioError::BadLength(format!(
                "header length {header_length} words, expected {HEADER_WORDS}"
            )));
        }

        let word9 = buf.get_u32_at(offset + 36)?;
        let compression_type = CompressionType::try_from(word9 >> 28)?;
        let compressed_words = word9 & 0x0fff_ffff;
        let pad2 = (bit_info >> PAD2_SHIFT) & 0x3;

        let compressed_data_length = if compression_type.is_compressed() {
            (compressed_words * 4).saturating_sub(pad2)
        } else {
            0
        };

        Ok(RecordHeader {
            header_type: HeaderType::try_from(bit_info >> TYPE_SHIFT)
                .unwrap_or(HeaderType::EvioRecord),
            record_length: buf.get_u32_at(offset)?,
            record_number: buf.get_u32_at(offset + 4)?,
            entries: buf.get_u32_at(offset + 12)?,
            index_length: buf.get_u32_at(offset + 16)?,
            user_header_length: buf.get_u32_at(offset + 24)?,
            uncompressed_data_length: buf.get_u32_at(offset + 32)?,
            compressed_data_length,
            compression_type,
            // One 64-bit read in buffer order; reading two swapped 32-bit
            // halves would scramble the register across endianness.
            user_register1: buf.get_u64_at(offset + 40)?,
            user_register2: buf.get_u64_at(offset + 48)?,
            version,
            has_dictionary: bit_info & DICTIONARY_BIT != 0,
            is_last_record: bit_info & LAST_RECORD_BIT != 0,
            has_first_event: bit_info & FIRST_EVENT_BIT != 0,
        })
    }

    /// Serialize at `offset` in the buffer's byte order, recomputing the
    /// derived length and padding fields first.
    pub fn write_at(&mut self, buf: &mut ByteBuffer, offset: usize) -> Result<()> {
        self.compute_lengths();

        let compressed_words = if self.compression_type.is_compressed() {
            (pad4(self.compressed_data_length as usize) / 4) as u32
        } else {
            0
        };
        let word9 = ((self.compression_type as u32) << 28) | (compressed_words & 0x0fff_ffff);

        buf.put_u32_at(offset, self.record_length)?;
        buf.put_u32_at(offset + 4, self.record_number)?;
        buf.put_u32_at(offset + 8, HEADER_WORDS)?;
        buf.put_u32_at(offset + 12, self.entries)?;
        buf.put_u32_at(offset + 16, self.index_length)?;
        buf.put_u32_at(offset + 20, self.bit_info())?;
        buf.put_u32_at(offset + 24, self.user_header_length)?;
        buf.put_u32_at(offset + 28, MAGIC)?;
        buf.put_u32_at(offset + 32, self.uncompressed_data_length)?;
        buf.put_u32_at(offset + 36, word9)?;
        buf.put_u64_at(offset + 40, self.user_register1)?;
        buf.put_u64_at(offset + 48, self.user_register2)?;
        Ok(())
    }

    /// Serialize into a fresh 56-byte vector in the given order
    pub fn to_bytes(&mut self, order: ByteOrder) -> Vec<u8> {
        let mut buf = ByteBuffer::new(HEADER_BYTES, order);
        self.write_at(&mut buf, 0).expect("fixed-size header fits");
        buf.as_slice().to_vec()
    }
}
