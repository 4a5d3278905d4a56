//! EVIO file reader
//!
//! Opens a file, detects its byte order from the file-header magic, and
//! builds the global event-to-record index from (in order of preference)
//! the trailer's record index, the index following the file header, or a
//! forced linear scan over record headers. Events are then dispensed
//! randomly or sequentially through a shared cursor.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::buffer::{ByteBuffer, ByteOrder};
use crate::error::{EvioError, Result};
use crate::format::HEADER_BYTES;
use crate::header::RecordHeader;
use crate::record::RecordInput;

/// Options controlling how a [`Reader`] opens a file
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Fail with `BadSequence` unless records are numbered 1, 2, 3, ...
    pub check_record_sequence: bool,
    /// Ignore in-file and trailer indexes; walk the records instead
    pub force_scan: bool,
}

/// Location of one record in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    /// Byte offset of the record header
    pub position: u64,
    /// Total record length in bytes
    pub length: u32,
    /// Events in the record
    pub entries: u32,
}

/// Prefix-sum index mapping a global event ordinal to its record.
///
/// Also carries the sequential cursor shared by `next`/`prev`/random
/// access: the cursor remembers the last dispensed ordinal, so flipping
/// direction never repeats an event.
#[derive(Debug, Clone)]
pub struct FileEventIndex {
    /// `cumulative[i]` = events in records `0..i`; one extra final entry
    cumulative: Vec<u64>,
    cursor: i64,
}

impl FileEventIndex {
    /// Build from per-record event counts
    pub fn new<I: IntoIterator<Item = u32>>(counts: I) -> Self {
        let mut cumulative = vec![0u64];
        let mut total = 0u64;
        for c in counts {
            total += c as u64;
            cumulative.push(total);
        }
        FileEventIndex {
            cumulative,
            cursor: -1,
        }
    }

    /// Total number of events
    pub fn event_count(&self) -> u64 {
        *self.cumulative.last().unwrap()
    }

    /// Map an ordinal to (record index, index within record) by binary
    /// search over the prefix sums
    pub fn record_for(&self, ordinal: u64) -> Option<(usize, usize)> {
        if ordinal >= self.event_count() {
            return None;
        }
        // First record whose cumulative end exceeds the ordinal.
        let record = self.cumulative.partition_point(|&c| c <= ordinal) - 1;
        Some((record, (ordinal - self.cumulative[record]) as usize))
    }

    /// Point the cursor at event `i` (it becomes the last-dispensed event)
    pub fn set_event(&mut self, i: u64) {
        self.cursor = i as i64;
    }

    /// True if a following event exists
    pub fn can_advance(&self) -> bool {
        self.cursor + 1 < self.event_count() as i64
    }

    /// True if a preceding event exists
    pub fn can_retreat(&self) -> bool {
        self.cursor > 0
    }

    /// Step forward, returning the new ordinal
    pub fn advance(&mut self) -> Option<u64> {
        if !self.can_advance() {
            return None;
        }
        self.cursor += 1;
        Some(self.cursor as u64)
    }

    /// Step backward, returning the new ordinal
    pub fn retreat(&mut self) -> Option<u64> {
        if !self.can_retreat() {
            return None;
        }
        self.cursor -= 1;
        Some(self.cursor as u64)
    }
}

/// Aggregate counts over a whole file
#[derive(Debug, Clone)]
pub struct ReaderStats {
    /// Number of data records
    pub record_count: usize,
    /// Number of events
    pub event_count: u64,
    /// Bytes occupied by data records on disk
    pub total_record_bytes: u64,
    /// Sum of uncompressed payload bytes
    pub uncompressed_bytes: u64,
    /// Sum of on-disk payload bytes (equals uncompressed when not compressed)
    pub stored_payload_bytes: u64,
}

impl ReaderStats {
    /// Stored payload over uncompressed payload
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed_bytes == 0 {
            return 1.0;
        }
        self.stored_payload_bytes as f64 / self.uncompressed_bytes as f64
    }
}

/// Random- and sequential-access reader over one EVIO file
pub struct Reader {
    file: File,
    path: PathBuf,
    file_header: RecordHeader,
    byte_order: ByteOrder,
    records: Vec<RecordLocation>,
    index: FileEventIndex,
    dictionary_xml: Option<String>,
    first_event: Option<Vec<u8>>,
    current: Option<(usize, RecordInput)>,
    options: ReaderOptions,
}

impl Reader {
    /// Open with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    /// Open a file, read its header, and build the record index
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let mut head = vec![0u8; HEADER_BYTES];
        file.read_exact(&mut head).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                EvioError::Truncated("file shorter than a file header".into())
            } else {
                EvioError::Io(e)
            }
        })?;
        let mut head_buf = ByteBuffer::wrap(head, ByteOrder::Little);
        let file_header = RecordHeader::read_at(&mut head_buf, 0)?;
        let byte_order = head_buf.order();
        debug!("opened {:?}: {:?} order", path, byte_order);

        let mut reader = Reader {
            file,
            path,
            file_header,
            byte_order,
            records: Vec::new(),
            index: FileEventIndex::new(std::iter::empty()),
            dictionary_xml: None,
            first_event: None,
            current: None,
            options,
        };

        reader.read_user_header_record()?;
        reader.locate_records()?;
        reader.index = FileEventIndex::new(reader.records.iter().map(|r| r.entries));
        Ok(reader)
    }

    /// Recover the dictionary and first event from the file header's user
    /// header, which is itself framed as a record. A user header that is
    /// not record-framed (arbitrary caller bytes) is left alone.
    fn read_user_header_record(&mut self) -> Result<()> {
        let user_len = self.file_header.user_header_length as usize;
        if user_len < HEADER_BYTES {
            return Ok(());
        }
        let user_pos = HEADER_BYTES as u64 + self.file_header.index_length as u64;
        self.file.seek(SeekFrom::Start(user_pos))?;
        let mut bytes = vec![0u8; user_len];
        self.file.read_exact(&mut bytes)?;

        let record = match RecordInput::read_from_buffer(&bytes, 0, self.byte_order) {
            Ok(r) => r,
            Err(_) => return Ok(()),
        };
        let mut next = 0usize;
        if self.file_header.has_dictionary && record.entry_count() > 0 {
            let xml = record.event(0)?;
            self.dictionary_xml = Some(String::from_utf8_lossy(xml).into_owned());
            next = 1;
        }
        if record.entry_count() > next {
            self.first_event = Some(record.event(next)?.to_vec());
        }
        Ok(())
    }

    /// Build `records` from the trailer index, the in-file index, or a scan
    fn locate_records(&mut self) -> Result<()> {
        let first_record_pos = self.file_header.data_offset() as u64;

        if !self.options.force_scan {
            if self.file_header.has_trailer_with_index() && self.file_header.trailer_position() > 0
            {
                if self.read_trailer_index(first_record_pos)? {
                    return Ok(());
                }
            }
            if self.file_header.index_length > 0 {
                self.read_file_index(first_record_pos)?;
                return Ok(());
            }
        }

        self.force_scan(first_record_pos)
    }

    /// Read the (length, count) pair array out of the trailer record.
    ///
    /// Returns false when the trailer carries no index after all.
    fn read_trailer_index(&mut self, first_record_pos: u64) -> Result<bool> {
        let trailer_pos = self.file_header.trailer_position();
        self.file.seek(SeekFrom::Start(trailer_pos))?;
        let mut head = vec![0u8; HEADER_BYTES];
        self.file.read_exact(&mut head).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                EvioError::Truncated("trailer position past end of file".into())
            } else {
                EvioError::Io(e)
            }
        })?;
        let mut head_buf = ByteBuffer::wrap(head, self.byte_order);
        let trailer = RecordHeader::read_at(&mut head_buf, 0)?;
        if !trailer.is_last_record || trailer.index_length == 0 {
            return Ok(false);
        }

        let mut index = vec![0u8; trailer.index_length as usize];
        self.file.read_exact(&mut index)?;
        let mut view = ByteBuffer::wrap(index, self.byte_order);

        let mut pos = first_record_pos;
        while view.remaining() >= 8 {
            let length = view.read_u32()?;
            let entries = view.read_u32()?;
            self.records.push(RecordLocation {
                position: pos,
                length,
                entries,
            });
            pos += length as u64;
        }
        debug!("trailer index: {} records", self.records.len());
        Ok(true)
    }

    /// Read the (length, count) pair array between the file header and the
    /// user header.
    fn read_file_index(&mut self, first_record_pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(HEADER_BYTES as u64))?;
        let mut index = vec![0u8; self.file_header.index_length as usize];
        self.file.read_exact(&mut index)?;
        let mut view = ByteBuffer::wrap(index, self.byte_order);

        let mut pos = first_record_pos;
        while view.remaining() >= 8 {
            let length = view.read_u32()?;
            let entries = view.read_u32()?;
            self.records.push(RecordLocation {
                position: pos,
                length,
                entries,
            });
            pos += length as u64;
        }
        debug!("file index: {} records", self.records.len());
        Ok(())
    }

    /// Walk the records linearly by their length words
    fn force_scan(&mut self, first_record_pos: u64) -> Result<()> {
        let file_len = self.file.metadata()?.len();
        let mut pos = first_record_pos;
        let mut expected = 1u32;

        while pos + HEADER_BYTES as u64 <= file_len {
            self.file.seek(SeekFrom::Start(pos))?;
            let mut head = vec![0u8; HEADER_BYTES];
            self.file.read_exact(&mut head)?;
            let mut head_buf = ByteBuffer::wrap(head, self.byte_order);
            let header = RecordHeader::read_at(&mut head_buf, 0)?;

            if header.header_type.is_trailer() || header.is_last_record {
                break;
            }
            if self.options.check_record_sequence && header.record_number != expected {
                return Err(EvioError::BadSequence {
                    expected,
                    actual: header.record_number,
                });
            }

            let total = header.total_bytes() as u64;
            if pos + total > file_len {
                return Err(EvioError::Truncated(format!(
                    "record at offset {pos} claims {total} bytes, file ends at {file_len}"
                )));
            }
            self.records.push(RecordLocation {
                position: pos,
                length: total as u32,
                entries: header.entries,
            });
            pos += total;
            expected += 1;
        }
        debug!("scan: {} records", self.records.len());
        Ok(())
    }

    /// The path this reader was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed file header
    pub fn file_header(&self) -> &RecordHeader {
        &self.file_header
    }

    /// Byte order detected from the file-header magic
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Number of data records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Record locations in file order
    pub fn record_locations(&self) -> &[RecordLocation] {
        &self.records
    }

    /// Total number of events
    pub fn event_count(&self) -> u64 {
        self.index.event_count()
    }

    /// The XML dictionary, when the file carries one
    pub fn dictionary_xml(&self) -> Option<&str> {
        self.dictionary_xml.as_deref()
    }

    /// True when the file carries a dictionary
    pub fn has_dictionary(&self) -> bool {
        self.dictionary_xml.is_some()
    }

    /// The first event stored in the file header, when present
    pub fn first_event(&self) -> Option<&[u8]> {
        self.first_event.as_deref()
    }

    /// Load (and cache) record `i`
    pub fn record(&mut self, i: usize) -> Result<&RecordInput> {
        if self.current.as_ref().map(|(idx, _)| *idx) != Some(i) {
            let location = *self.records.get(i).ok_or(EvioError::OutOfBounds {
                offset: i,
                len: 1,
                bound: self.records.len(),
            })?;
            let record = RecordInput::read_from_file(&mut self.file, location.position)?;
            if self.options.check_record_sequence
                && record.header().record_number != (i + 1) as u32
            {
                return Err(EvioError::BadSequence {
                    expected: (i + 1) as u32,
                    actual: record.header().record_number,
                });
            }
            self.current = Some((i, record));
        }
        Ok(&self.current.as_ref().unwrap().1)
    }

    /// Copy out event `ordinal`; shares the cursor with sequential access
    pub fn event(&mut self, ordinal: u64) -> Result<Vec<u8>> {
        let (record_idx, within) =
            self.index
                .record_for(ordinal)
                .ok_or(EvioError::OutOfBounds {
                    offset: ordinal as usize,
                    len: 1,
                    bound: self.event_count() as usize,
                })?;
        self.index.set_event(ordinal);
        let record = self.record(record_idx)?;
        Ok(record.event(within)?.to_vec())
    }

    /// The next event after the cursor, or `None` at the end
    pub fn next_event(&mut self) -> Result<Option<Vec<u8>>> {
        match self.index.advance() {
            Some(ordinal) => {
                let (record_idx, within) = self.index.record_for(ordinal).unwrap();
                let record = self.record(record_idx)?;
                Ok(Some(record.event(within)?.to_vec()))
            }
            None => Ok(None),
        }
    }

    /// The event before the cursor, or `None` at the start
    pub fn prev_event(&mut self) -> Result<Option<Vec<u8>>> {
        match self.index.retreat() {
            Some(ordinal) => {
                let (record_idx, within) = self.index.record_for(ordinal).unwrap();
                let record = self.record(record_idx)?;
                Ok(Some(record.event(within)?.to_vec()))
            }
            None => Ok(None),
        }
    }

    /// Aggregate counts; reads every record header once
    pub fn stats(&mut self) -> Result<ReaderStats> {
        let mut stats = ReaderStats {
            record_count: self.records.len(),
            event_count: self.index.event_count(),
            total_record_bytes: 0,
            uncompressed_bytes: 0,
            stored_payload_bytes: 0,
        };
        for location in self.records.clone() {
            self.file.seek(SeekFrom::Start(location.position))?;
            let mut head = vec![0u8; HEADER_BYTES];
            self.file.read_exact(&mut head)?;
            let mut head_buf = ByteBuffer::wrap(head, self.byte_order);
            let header = RecordHeader::read_at(&mut head_buf, 0)?;

            stats.total_record_bytes += header.total_bytes() as u64;
            stats.uncompressed_bytes += header.uncompressed_data_length as u64;
            stats.stored_payload_bytes += if header.compression_type.is_compressed() {
                header.compressed_data_length as u64
            } else {
                header.uncompressed_data_length as u64
            };
        }
        Ok(stats)
    }
}

/// Open an EVIO file for reading with default options
pub fn open<P: AsRef<Path>>(path: P) -> Result<Reader> {
    Reader::open(path)
}

/// True when the file starts with a valid EVIO v6 file header
pub fn is_evio_file<P: AsRef<Path>>(path: P) -> bool {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut head = vec![0u8; HEADER_BYTES];
    if file.read_exact(&mut head).is_err() {
        return false;
    }
    let mut buf = ByteBuffer::wrap(head, ByteOrder::Little);
    match RecordHeader::read_at(&mut buf, 0) {
        Ok(h) => h.header_type.is_file_header(),
        Err(_) => false,
    }
}
