//! Single-record input and output
//!
//! [`RecordInput`] reads one record from a file offset or a byte slice,
//! decompresses its payload, and serves events in O(1) through the event
//! index. [`RecordOutput`] accumulates events under configured caps and
//! builds the wire form (header, index, user header, payload) in one shot.
//!
//! Both ends keep the record as the unit of work: a record is built once,
//! written once, and read back as a whole.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::buffer::{ByteBuffer, ByteOrder};
use crate::codec;
use crate::error::{EvioError, Result};
use crate::format::{pad4, padding, CompressionType, HeaderType, HEADER_BYTES};
use crate::header::RecordHeader;

/// Default cap on uncompressed event bytes per record (~8 MiB)
pub const DEFAULT_MAX_DATA_BYTES: usize = 8 * 1024 * 1024;

/// Default cap on events per record
pub const DEFAULT_MAX_EVENT_COUNT: usize = 1_000_000;

/// One record read back from a file or buffer, payload decompressed.
///
/// The internal buffer holds the header, index, and user header verbatim
/// (still claiming the wire compression) followed by the uncompressed
/// payload; the parsed [`RecordHeader`] is the source of truth for lengths.
#[derive(Debug)]
pub struct RecordInput {
    header: RecordHeader,
    buffer: ByteBuffer,
    event_offsets: Vec<usize>,
    event_lengths: Vec<u32>,
}

impl RecordInput {
    /// Read the record starting at `offset` in `src`.
    ///
    /// `order` is the caller's best guess; the header's magic word corrects
    /// it. Fails with `Truncated` when the header's claimed lengths run past
    /// `src`.
    pub fn read_from_buffer(src: &[u8], offset: usize, order: ByteOrder) -> Result<Self> {
        if src.len() < offset + HEADER_BYTES {
            return Err(EvioError::Truncated(format!(
                "record header needs {HEADER_BYTES} bytes at offset {offset}, have {}",
                src.len().saturating_sub(offset)
            )));
        }

        let mut head = ByteBuffer::wrap(src[offset..offset + HEADER_BYTES].to_vec(), order);
        let header = RecordHeader::read_at(&mut head, 0)?;
        let order = head.order();

        let total = header.total_bytes();
        if src.len() < offset + total {
            return Err(EvioError::Truncated(format!(
                "record claims {total} bytes at offset {offset}, have {}",
                src.len() - offset
            )));
        }

        Self::assemble(&src[offset..offset + total], header, order)
    }

    /// Seek to `offset` and read one record from an open file
    pub fn read_from_file(file: &mut File, offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(offset))?;

        let mut head = [0u8; HEADER_BYTES];
        read_exact_or_truncated(file, &mut head, "record header")?;
        let mut head_buf = ByteBuffer::wrap(head.to_vec(), ByteOrder::Little);
        let header = RecordHeader::read_at(&mut head_buf, 0)?;
        let order = head_buf.order();

        let total = header.total_bytes();
        let mut bytes = head.to_vec();
        bytes.resize(total, 0);
        read_exact_or_truncated(file, &mut bytes[HEADER_BYTES..], "record body")?;

        Self::assemble(&bytes, header, order)
    }

    /// Build the internal uncompressed buffer and the event offset table
    /// from complete wire bytes.
    fn assemble(wire: &[u8], header: RecordHeader, order: ByteOrder) -> Result<Self> {
        let index_len = header.index_length as usize;
        let user_len = pad4(header.user_header_length as usize);
        let pre_len = HEADER_BYTES + index_len + user_len;
        let data_len = header.uncompressed_data_length as usize;

        if wire.len() < pre_len {
            return Err(EvioError::Truncated(format!(
                "index and user header claim {pre_len} bytes, record has {}",
                wire.len()
            )));
        }

        let payload = if header.compression_type.is_compressed() {
            let clen = header.compressed_data_length as usize;
            if wire.len() < pre_len + clen {
                return Err(EvioError::Truncated(format!(
                    "compressed payload claims {clen} bytes, record has {}",
                    wire.len() - pre_len
                )));
            }
            codec::decompress(
                header.compression_type,
                &wire[pre_len..pre_len + clen],
                data_len,
            )?
        } else {
            if wire.len() < pre_len + data_len {
                return Err(EvioError::Truncated(format!(
                    "payload claims {data_len} bytes, record has {}",
                    wire.len() - pre_len
                )));
            }
            wire[pre_len..pre_len + data_len].to_vec()
        };

        // Header + index + user header verbatim, then the expanded payload.
        let mut bytes = Vec::with_capacity(pre_len + payload.len());
        bytes.extend_from_slice(&wire[..pre_len]);
        bytes.extend_from_slice(&payload);
        let buffer = ByteBuffer::wrap(bytes, order);

        let (event_offsets, event_lengths) = Self::build_event_table(&buffer, &header, pre_len)?;

        Ok(RecordInput {
            header,
            buffer,
            event_offsets,
            event_lengths,
        })
    }

    /// Event offsets from the index array, or from a bank-header walk when
    /// the record was written without an index.
    fn build_event_table(
        buffer: &ByteBuffer,
        header: &RecordHeader,
        data_start: usize,
    ) -> Result<(Vec<usize>, Vec<u32>)> {
        let entries = header.entries as usize;
        let data_len = header.uncompressed_data_length as usize;
        let mut offsets = Vec::with_capacity(entries);
        let mut lengths = Vec::with_capacity(entries);

        if header.index_length > 0 {
            let mut running = 0usize;
            for i in 0..entries {
                let len = buffer.get_u32_at(HEADER_BYTES + 4 * i)?;
                offsets.push(data_start + running);
                lengths.push(len);
                running += len as usize;
            }
            if running > data_len {
                return Err(EvioError::Truncated(format!(
                    "event index sums to {running} bytes, payload has {data_len}"
                )));
            }
        } else {
            // No index: the payload must be evio banks; walk length words.
            let mut pos = data_start;
            let end = data_start + data_len;
            for _ in 0..entries {
                if pos + 8 > end {
                    return Err(EvioError::Truncated(format!(
                        "bank header at offset {pos} runs past payload end {end}"
                    )));
                }
                let words = buffer.get_u32_at(pos)? as usize + 1;
                let len = words * 4;
                if pos + len > end {
                    return Err(EvioError::BadLength(format!(
                        "bank at offset {pos} claims {len} bytes, payload ends at {end}"
                    )));
                }
                offsets.push(pos);
                lengths.push(len as u32);
                pos += len;
            }
        }

        Ok((offsets, lengths))
    }

    /// The parsed record header
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Byte order detected from the header magic
    pub fn byte_order(&self) -> ByteOrder {
        self.buffer.order()
    }

    /// Number of events in this record
    pub fn entry_count(&self) -> usize {
        self.event_offsets.len()
    }

    /// Borrow event `i` without copying
    pub fn event(&self, i: usize) -> Result<&[u8]> {
        let offset = *self.event_offsets.get(i).ok_or(EvioError::OutOfBounds {
            offset: i,
            len: 1,
            bound: self.event_offsets.len(),
        })?;
        self.buffer.slice(offset, self.event_lengths[i] as usize)
    }

    /// Append event `i` to `dest`, returning its byte length
    pub fn read_event(&self, dest: &mut Vec<u8>, i: usize) -> Result<usize> {
        let bytes = self.event(i)?;
        dest.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Uncompressed byte length of event `i`
    pub fn event_length(&self, i: usize) -> Result<u32> {
        self.event_lengths
            .get(i)
            .copied()
            .ok_or(EvioError::OutOfBounds {
                offset: i,
                len: 1,
                bound: self.event_lengths.len(),
            })
    }

    /// The record's user header bytes (unpadded length)
    pub fn user_header(&self) -> Result<&[u8]> {
        self.buffer.slice(
            HEADER_BYTES + self.header.index_length as usize,
            self.header.user_header_length as usize,
        )
    }

    /// The index and padded user header exactly as stored on the wire
    pub fn pre_payload(&self) -> Result<&[u8]> {
        self.buffer
            .slice(HEADER_BYTES, self.header.data_offset() - HEADER_BYTES)
    }

    /// The whole uncompressed payload
    pub fn payload(&self) -> Result<&[u8]> {
        self.buffer.slice(
            self.header.data_offset(),
            self.header.uncompressed_data_length as usize,
        )
    }
}

/// Accumulates events and builds one wire-format record.
///
/// `try_add_event` refuses an event that would push the record past either
/// cap; the caller builds, writes, resets, and retries. Buffers are reused
/// across `reset` calls.
#[derive(Debug)]
pub struct RecordOutput {
    byte_order: ByteOrder,
    compression: CompressionType,
    max_event_count: usize,
    max_data_bytes: usize,
    index: Vec<u32>,
    events: Vec<u8>,
    user_header: Vec<u8>,
    header: RecordHeader,
    built: Vec<u8>,
}

impl RecordOutput {
    /// A record accumulator with default caps
    pub fn new(byte_order: ByteOrder, compression: CompressionType) -> Self {
        Self::with_limits(byte_order, compression, 0, 0)
    }

    /// A record accumulator with explicit caps; 0 selects the default
    pub fn with_limits(
        byte_order: ByteOrder,
        compression: CompressionType,
        max_event_count: usize,
        max_data_bytes: usize,
    ) -> Self {
        let max_event_count = if max_event_count == 0 {
            DEFAULT_MAX_EVENT_COUNT
        } else {
            max_event_count
        };
        let max_data_bytes = if max_data_bytes == 0 {
            DEFAULT_MAX_DATA_BYTES
        } else {
            max_data_bytes
        };
        RecordOutput {
            byte_order,
            compression,
            max_event_count,
            max_data_bytes,
            index: Vec::new(),
            events: Vec::new(),
            user_header: Vec::new(),
            header: RecordHeader::new(HeaderType::HipoRecord),
            built: Vec::new(),
        }
    }

    /// Byte order of the built record
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Number of accepted events
    pub fn event_count(&self) -> usize {
        self.index.len()
    }

    /// Accepted event bytes so far
    pub fn data_bytes(&self) -> usize {
        self.events.len()
    }

    /// True before the first accepted event
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Set the record number stamped into the header
    pub fn set_record_number(&mut self, n: u32) {
        self.header.record_number = n;
    }

    /// The record number to be stamped into the header
    pub fn record_number(&self) -> u32 {
        self.header.record_number
    }

    /// Set the user header carried by this record
    pub fn set_user_header(&mut self, bytes: &[u8]) {
        self.user_header.clear();
        self.user_header.extend_from_slice(bytes);
    }

    /// Mutable access to the header for flag bits (dictionary, last record)
    pub fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    /// Try to accept one event.
    ///
    /// Returns `false` when the event would exceed the event-count or
    /// byte-count cap; the first event is always accepted so an oversized
    /// event still travels in a record of its own.
    pub fn try_add_event(&mut self, event: &[u8]) -> bool {
        if !self.is_empty() {
            if self.index.len() + 1 > self.max_event_count {
                return false;
            }
            if self.events.len() + event.len() > self.max_data_bytes {
                return false;
            }
        }
        self.index.push(event.len() as u32);
        self.events.extend_from_slice(event);
        self.built.clear();
        true
    }

    /// Compress the payload and assemble header, index, user header, and
    /// payload into the internal wire buffer.
    pub fn build(&mut self) -> Result<()> {
        let payload: Vec<u8>;
        let payload_wire: &[u8] = if self.compression.is_compressed() {
            payload = codec::compress(self.compression, &self.events)?;
            &payload
        } else {
            &self.events
        };

        self.header.entries = self.index.len() as u32;
        self.header.index_length = (self.index.len() * 4) as u32;
        self.header.user_header_length = self.user_header.len() as u32;
        self.header.uncompressed_data_length = self.events.len() as u32;
        self.header.compression_type = self.compression;
        self.header.compressed_data_length = if self.compression.is_compressed() {
            payload_wire.len() as u32
        } else {
            0
        };
        self.header.compute_lengths();

        let total = self.header.total_bytes();
        let mut buf = ByteBuffer::new(total, self.byte_order);
        self.header.write_at(&mut buf, 0)?;

        let mut pos = HEADER_BYTES;
        for len in &self.index {
            buf.put_u32_at(pos, *len)?;
            pos += 4;
        }
        buf.put_bytes_at(pos, &self.user_header)?;
        pos += pad4(self.user_header.len());
        buf.put_bytes_at(pos, payload_wire)?;

        debug_assert_eq!(pos + pad4(payload_wire.len()), total);

        self.built.clear();
        self.built.extend_from_slice(buf.as_slice());
        Ok(())
    }

    /// The wire bytes produced by the last [`RecordOutput::build`]
    pub fn as_bytes(&self) -> &[u8] {
        &self.built
    }

    /// Mutable wire bytes, for the writer to patch the record number
    pub(crate) fn built_mut(&mut self) -> &mut [u8] {
        &mut self.built
    }

    /// Padding bytes the payload carries on the wire
    pub fn payload_padding(&self) -> usize {
        padding(self.events.len())
    }

    /// Clear events, index, user header, and built bytes; caps and byte
    /// order stay.
    pub fn reset(&mut self) {
        self.index.clear();
        self.events.clear();
        self.user_header.clear();
        self.built.clear();
        let number = self.header.record_number;
        self.header = RecordHeader::new(HeaderType::HipoRecord);
        self.header.record_number = number;
    }
}

/// `read_exact` with short reads surfaced as `Truncated`
fn read_exact_or_truncated(file: &mut File, buf: &mut [u8], what: &str) -> Result<()> {
    file.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EvioError::Truncated(format!("{what}: unexpected end of file"))
        } else {
            EvioError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::bank_of_u32;

    fn sample_events(order: ByteOrder) -> Vec<Vec<u8>> {
        (0u8..4)
            .map(|i| bank_of_u32(i as u16 + 1, i, &[i as u32; 6], order))
            .collect()
    }

    #[test]
    fn build_and_read_back_every_codec() {
        for compression in [
            CompressionType::None,
            CompressionType::Lz4,
            CompressionType::Lz4Best,
            CompressionType::Gzip,
        ] {
            let events = sample_events(ByteOrder::Little);
            let mut out = RecordOutput::new(ByteOrder::Little, compression);
            for ev in &events {
                assert!(out.try_add_event(ev));
            }
            out.build().unwrap();

            let rec =
                RecordInput::read_from_buffer(out.as_bytes(), 0, ByteOrder::Little).unwrap();
            assert_eq!(rec.entry_count(), events.len(), "{compression:?}");
            for (i, ev) in events.iter().enumerate() {
                assert_eq!(rec.event(i).unwrap(), &ev[..], "{compression:?} event {i}");
            }
        }
    }

    #[test]
    fn big_endian_record_detected_from_any_guess() {
        let events = sample_events(ByteOrder::Big);
        let mut out = RecordOutput::new(ByteOrder::Big, CompressionType::None);
        for ev in &events {
            assert!(out.try_add_event(ev));
        }
        out.build().unwrap();

        let rec = RecordInput::read_from_buffer(out.as_bytes(), 0, ByteOrder::Little).unwrap();
        assert_eq!(rec.byte_order(), ByteOrder::Big);
        assert_eq!(rec.event(0).unwrap(), &events[0][..]);
    }

    #[test]
    fn event_count_cap() {
        let mut out = RecordOutput::with_limits(ByteOrder::Little, CompressionType::None, 2, 0);
        assert!(out.try_add_event(&[0u8; 8]));
        assert!(out.try_add_event(&[1u8; 8]));
        assert!(!out.try_add_event(&[2u8; 8]));
        assert_eq!(out.event_count(), 2);
    }

    #[test]
    fn byte_cap_and_oversized_first_event() {
        let mut out = RecordOutput::with_limits(ByteOrder::Little, CompressionType::None, 0, 16);
        // First event always fits, even past the cap.
        assert!(out.try_add_event(&[7u8; 32]));
        assert!(!out.try_add_event(&[8u8; 4]));
    }

    #[test]
    fn index_is_prefix_sum_of_lengths() {
        let events = sample_events(ByteOrder::Little);
        let mut out = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        for ev in &events {
            out.try_add_event(ev);
        }
        out.build().unwrap();

        let rec = RecordInput::read_from_buffer(out.as_bytes(), 0, ByteOrder::Little).unwrap();
        let payload_start = rec.payload().unwrap().as_ptr() as usize;
        let mut running = 0usize;
        for (i, ev) in events.iter().enumerate() {
            assert_eq!(rec.event_length(i).unwrap() as usize, ev.len());
            let offset = rec.event(i).unwrap().as_ptr() as usize - payload_start;
            assert_eq!(offset, running);
            running += ev.len();
        }
        assert_eq!(running, rec.header().uncompressed_data_length as usize);
    }

    #[test]
    fn user_header_padded_and_recovered() {
        let mut out = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        out.set_user_header(b"seven by");
        out.try_add_event(&bank_of_u32(1, 1, &[9], ByteOrder::Little));
        out.build().unwrap();

        let rec = RecordInput::read_from_buffer(out.as_bytes(), 0, ByteOrder::Little).unwrap();
        assert_eq!(rec.user_header().unwrap(), b"seven by");
        // 8-byte user header needs no padding; total stays word-exact.
        assert_eq!(rec.header().total_bytes() % 4, 0);
    }

    #[test]
    fn truncated_buffer_rejected() {
        let mut out = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        out.try_add_event(&bank_of_u32(1, 1, &[1, 2, 3], ByteOrder::Little));
        out.build().unwrap();
        let wire = out.as_bytes();

        assert!(matches!(
            RecordInput::read_from_buffer(&wire[..40], 0, ByteOrder::Little),
            Err(EvioError::Truncated(_))
        ));
        assert!(matches!(
            RecordInput::read_from_buffer(&wire[..wire.len() - 4], 0, ByteOrder::Little),
            Err(EvioError::Truncated(_))
        ));
    }

    #[test]
    fn reset_reuses_and_clears() {
        let mut out = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        out.set_record_number(5);
        out.try_add_event(&[1u8; 12]);
        out.build().unwrap();
        assert!(!out.as_bytes().is_empty());

        out.reset();
        assert!(out.is_empty());
        assert!(out.as_bytes().is_empty());
        assert_eq!(out.record_number(), 5);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one_record.evio");

        let events = sample_events(ByteOrder::Little);
        let mut out = RecordOutput::new(ByteOrder::Little, CompressionType::Lz4);
        for ev in &events {
            out.try_add_event(ev);
        }
        out.build().unwrap();
        std::fs::write(&path, out.as_bytes()).unwrap();

        let mut file = File::open(&path).unwrap();
        let rec = RecordInput::read_from_file(&mut file, 0).unwrap();
        assert_eq!(rec.entry_count(), events.len());
        let mut dest = Vec::new();
        assert_eq!(rec.read_event(&mut dest, 2).unwrap(), events[2].len());
        assert_eq!(dest, events[2]);
    }
}
