//! EVIO file writers
//!
//! [`Writer`] appends events into records, splits output files on a size
//! cap, and finishes each file with an optional trailer (optionally
//! carrying the file-wide record index) plus a patched file header.
//! [`EventWriter`] layers dictionary and first-event handling on top so
//! every split file is standalone.
//!
//! Events are accepted as opaque wire bytes already in the writer's byte
//! order; the writer frames them, it does not transform them.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};
use log::debug;

use crate::buffer::{ByteBuffer, ByteOrder};
use crate::error::{EvioError, Result};
use crate::format::{pad4, CompressionType, HeaderType, HEADER_BYTES};
use crate::header::RecordHeader;
use crate::node::{NodeHandle, ScannedBuffer};
use crate::reader::Reader;
use crate::record::RecordOutput;

/// How record numbers behave across split files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordNumbering {
    /// Numbers continue 1, 2, 3, ... across every split
    #[default]
    ContinueAcrossSplits,
    /// Numbers restart at 1 in each split file
    RestartPerFile,
}

/// Writer configuration with consuming builder setters
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Byte order of everything written
    pub byte_order: ByteOrder,
    /// Payload compression
    pub compression: CompressionType,
    /// Cap on uncompressed event bytes per record (0 = ~8 MiB default)
    pub max_record_bytes: usize,
    /// Cap on events per record (0 = ~1M default)
    pub max_event_count: usize,
    /// File size that triggers a split, in bytes (0 = never split)
    pub split_size: u64,
    /// Run number substituted into the filename
    pub run_number: u32,
    /// Stream id substituted into the filename
    pub stream_id: u32,
    /// Number of parallel streams (filename bookkeeping)
    pub stream_count: u32,
    /// First split number
    pub split_number: u32,
    /// Step between split numbers
    pub split_increment: u32,
    /// Compression worker count for the ring writer
    pub comp_threads: usize,
    /// Ring slot count for the ring writer (power of two)
    pub ring_size: usize,
    /// Reopen an existing file and continue it
    pub append: bool,
    /// Allow clobbering an existing file
    pub overwrite_ok: bool,
    /// Write a trailer record on close
    pub add_trailer: bool,
    /// Carry the record index in the trailer (implies a trailer)
    pub add_trailer_index: bool,
    /// Record numbering across splits
    pub record_numbering: RecordNumbering,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            byte_order: ByteOrder::Little,
            compression: CompressionType::None,
            max_record_bytes: 0,
            max_event_count: 0,
            split_size: 0,
            run_number: 0,
            stream_id: 0,
            stream_count: 1,
            split_number: 0,
            split_increment: 1,
            comp_threads: 2,
            ring_size: 16,
            append: false,
            overwrite_ok: true,
            add_trailer: false,
            add_trailer_index: false,
            record_numbering: RecordNumbering::default(),
        }
    }
}

impl WriterOptions {
    /// Set the byte order
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Set the payload compression
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Cap the uncompressed event bytes per record
    pub fn max_record_bytes(mut self, bytes: usize) -> Self {
        self.max_record_bytes = bytes;
        self
    }

    /// Cap the events per record
    pub fn max_event_count(mut self, count: usize) -> Self {
        self.max_event_count = count;
        self
    }

    /// Split output files at this size
    pub fn split_size(mut self, bytes: u64) -> Self {
        self.split_size = bytes;
        self
    }

    /// Set run, stream id, and stream count for filename rendering
    pub fn stream(mut self, run_number: u32, stream_id: u32, stream_count: u32) -> Self {
        self.run_number = run_number;
        self.stream_id = stream_id;
        self.stream_count = stream_count.max(1);
        self
    }

    /// Set the first split number and its increment
    pub fn split_numbering(mut self, first: u32, increment: u32) -> Self {
        self.split_number = first;
        self.split_increment = increment.max(1);
        self
    }

    /// Set compression worker count and ring size for the ring writer
    pub fn ring(mut self, comp_threads: usize, ring_size: usize) -> Self {
        self.comp_threads = comp_threads;
        self.ring_size = ring_size;
        self
    }

    /// Reopen and continue an existing file
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Allow clobbering existing files
    pub fn overwrite_ok(mut self, ok: bool) -> Self {
        self.overwrite_ok = ok;
        self
    }

    /// Write a trailer record on close
    pub fn add_trailer(mut self, add: bool) -> Self {
        self.add_trailer = add;
        self
    }

    /// Carry the record index in the trailer
    pub fn add_trailer_index(mut self, add: bool) -> Self {
        self.add_trailer_index = add;
        if add {
            self.add_trailer = true;
        }
        self
    }

    /// Select record numbering across splits
    pub fn record_numbering(mut self, numbering: RecordNumbering) -> Self {
        self.record_numbering = numbering;
        self
    }
}

/// Render a filename from its template.
///
/// The first `%d`/`%x` specifier receives the run number, the second the
/// split number, the third the stream id. A width like `%3d` is normalised
/// to zero padding (`%03d`) so filenames never contain whitespace. When
/// splitting is active and the template has fewer than two specifiers, the
/// stream id and split number are appended as `.streamId.splitN`.
pub(crate) fn render_file_name(
    template: &str,
    run_number: u32,
    split_number: u32,
    stream_id: u32,
    splitting: bool,
) -> String {
    let values = [run_number, split_number, stream_id];
    let mut out = String::with_capacity(template.len() + 8);
    let mut used = 0usize;

    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut width = String::new();
        while chars.peek().is_some_and(|d| d.is_ascii_digit()) {
            width.push(chars.next().unwrap());
        }
        match chars.peek() {
            Some('d') | Some('x') if used < values.len() => {
                let hex = chars.next() == Some('x');
                let v = values[used];
                used += 1;
                let w: usize = width.parse().unwrap_or(0);
                if hex {
                    out.push_str(&format!("{v:0w$x}"));
                } else {
                    out.push_str(&format!("{v:0w$}"));
                }
            }
            _ => {
                // Not a specifier we fill; keep it verbatim.
                out.push('%');
                out.push_str(&width);
            }
        }
    }

    if splitting && used < 2 {
        out.push_str(&format!(".{stream_id}.{split_number}"));
    }
    out
}

/// Single-threaded record writer with file splitting
pub struct Writer {
    options: WriterOptions,
    template: String,
    file: Option<File>,
    current_path: PathBuf,
    record: RecordOutput,
    record_number: u32,
    split_number: u32,
    file_bytes: u64,
    total_bytes: u64,
    total_events: u64,
    file_count: u32,
    /// (length bytes, entries) per record of the current file
    record_summaries: Vec<(u32, u32)>,
    file_header: RecordHeader,
    file_user_header: Vec<u8>,
    closed: bool,
}

impl Writer {
    /// Create a writer over `path` (a template when splitting)
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        Self::create_full(path, options, &[], false)
    }

    /// Create a writer whose file header carries the given user bytes
    pub fn create_with_user_header<P: AsRef<Path>>(
        path: P,
        options: WriterOptions,
        user_header: &[u8],
    ) -> Result<Self> {
        Self::create_full(path, options, user_header, false)
    }

    pub(crate) fn create_full<P: AsRef<Path>>(
        path: P,
        options: WriterOptions,
        user_header: &[u8],
        user_header_is_dictionary: bool,
    ) -> Result<Self> {
        let template = path.as_ref().to_string_lossy().into_owned();

        let mut file_header = RecordHeader::new(HeaderType::EvioFile);
        file_header.record_number = 1;
        file_header.has_dictionary = user_header_is_dictionary;
        file_header.user_header_length = user_header.len() as u32;

        let mut writer = Writer {
            record: RecordOutput::with_limits(
                options.byte_order,
                options.compression,
                options.max_event_count,
                options.max_record_bytes,
            ),
            split_number: options.split_number,
            options,
            template,
            file: None,
            current_path: PathBuf::new(),
            record_number: 1,
            file_bytes: 0,
            total_bytes: 0,
            total_events: 0,
            file_count: 0,
            record_summaries: Vec::new(),
            file_header,
            file_user_header: user_header.to_vec(),
            closed: false,
        };

        if writer.options.append && writer.try_open_append()? {
            return Ok(writer);
        }
        writer.open_file()?;
        Ok(writer)
    }

    /// Reopen an existing file to continue it. Returns false when the file
    /// does not exist yet (plain create takes over).
    fn try_open_append(&mut self) -> Result<bool> {
        let path = PathBuf::from(render_file_name(
            &self.template,
            self.options.run_number,
            self.split_number,
            self.options.stream_id,
            self.options.split_size > 0,
        ));
        if !path.exists() {
            return Ok(false);
        }

        // The file's own byte order wins over the configured one.
        let reader = Reader::open(&path)?;
        let order = reader.byte_order();
        self.options.byte_order = order;
        self.record = RecordOutput::with_limits(
            order,
            self.options.compression,
            self.options.max_event_count,
            self.options.max_record_bytes,
        );

        self.file_header = reader.file_header().clone();
        // The trailer (if any) is truncated away; its bit no longer holds.
        self.file_header.has_first_event = false;
        self.file_header.user_register1 = 0;

        self.record_summaries = reader
            .record_locations()
            .iter()
            .map(|r| (r.length, r.entries))
            .collect();
        self.total_events = reader.event_count();
        self.record_number = reader.record_count() as u32 + 1;

        let end = reader
            .record_locations()
            .last()
            .map(|r| r.position + r.length as u64)
            .unwrap_or(self.file_header.data_offset() as u64);
        drop(reader);

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        file.set_len(end)?;
        file.seek(SeekFrom::Start(end))?;

        debug!(
            "appending to {:?}: {} records, continuing at byte {end}",
            path,
            self.record_number - 1
        );

        self.file = Some(file);
        self.current_path = path;
        self.file_bytes = end;
        self.file_count += 1;
        Ok(true)
    }

    /// Open the current split file and write its file header
    fn open_file(&mut self) -> Result<()> {
        let path = PathBuf::from(render_file_name(
            &self.template,
            self.options.run_number,
            self.split_number,
            self.options.stream_id,
            self.options.split_size > 0,
        ));
        if path.exists() && !self.options.overwrite_ok {
            return Err(EvioError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} exists and overwrite is disabled", path.display()),
            )));
        }

        let mut file = File::create(&path)?;

        self.file_header.entries = 0;
        self.file_header.user_register1 = 0;
        self.file_header.has_first_event = false;
        let header_region = self.write_file_header(&mut file)?;

        debug!("opened {:?} ({} header bytes)", path, header_region);

        self.file = Some(file);
        self.current_path = path;
        self.file_bytes = header_region as u64;
        self.record_summaries.clear();
        self.file_count += 1;
        if self.options.record_numbering == RecordNumbering::RestartPerFile {
            self.record_number = 1;
        }
        Ok(())
    }

    /// Serialize the file header plus padded user header; returns the
    /// region size in bytes
    fn write_file_header(&mut self, file: &mut File) -> Result<usize> {
        let user_len = self.file_user_header.len();
        let region = HEADER_BYTES + pad4(user_len);
        let mut buf = ByteBuffer::new(region, self.options.byte_order);
        self.file_header.user_header_length = user_len as u32;
        self.file_header.write_at(&mut buf, 0)?;
        buf.put_bytes_at(HEADER_BYTES, &self.file_user_header)?;
        file.write_all(buf.as_slice())?;
        Ok(region)
    }

    /// Append one event, flushing the current record when it is full
    pub fn add_event(&mut self, event: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if !self.record.try_add_event(event) {
            self.flush_record()?;
            if !self.record.try_add_event(event) {
                return Err(EvioError::BadLength(format!(
                    "event of {} bytes cannot fit any record",
                    event.len()
                )));
            }
        }
        self.total_events += 1;
        Ok(())
    }

    /// Write an externally accumulated record, preserving stream numbering
    pub fn write_record(&mut self, record: &mut RecordOutput) -> Result<()> {
        self.ensure_open()?;
        self.flush_record()?;
        record.set_record_number(self.record_number);
        record.build()?;
        let entries = record.event_count() as u32;
        let mut bytes = record.as_bytes().to_vec();
        self.total_events += entries as u64;
        self.write_built(&mut bytes, entries)?;
        Ok(())
    }

    /// Build and write the pending record, if it holds anything
    fn flush_record(&mut self) -> Result<()> {
        if self.record.is_empty() {
            return Ok(());
        }
        self.record.set_record_number(self.record_number);
        self.record.build()?;
        let entries = self.record.event_count() as u32;
        let mut bytes = self.record.as_bytes().to_vec();
        self.record.reset();
        self.write_built(&mut bytes, entries)?;
        Ok(())
    }

    /// Write finished record bytes, splitting the file first when needed.
    ///
    /// The record number (header word 1) is stamped here, after the split
    /// decision, so per-file renumbering and the ring writer's out-of-band
    /// records all end up with the stream's numbering.
    pub(crate) fn write_built(&mut self, bytes: &mut [u8], entries: u32) -> Result<()> {
        self.ensure_open()?;

        if self.options.split_size > 0
            && !self.record_summaries.is_empty()
            && self.file_bytes + bytes.len() as u64 > self.options.split_size
        {
            self.finish_file()?;
            self.split_number += self.options.split_increment;
            self.open_file()?;
        }

        if bytes.len() >= 8 {
            let number = &mut bytes[4..8];
            match self.options.byte_order {
                ByteOrder::Little => LittleEndian::write_u32(number, self.record_number),
                ByteOrder::Big => BigEndian::write_u32(number, self.record_number),
            }
        }

        self.file.as_mut().unwrap().write_all(bytes)?;
        self.file_bytes += bytes.len() as u64;
        self.total_bytes += bytes.len() as u64;
        self.record_summaries.push((bytes.len() as u32, entries));
        self.record_number += 1;
        Ok(())
    }

    /// Write the trailer (when configured) and patch the file header
    fn finish_file(&mut self) -> Result<()> {
        let trailer_pos = self.file_bytes;

        if self.options.add_trailer {
            let index_len = if self.options.add_trailer_index {
                (self.record_summaries.len() * 8) as u32
            } else {
                0
            };
            let mut trailer = RecordHeader::trailer(self.record_number, index_len);
            trailer.entries = self.record_summaries.len() as u32;

            let mut buf =
                ByteBuffer::new(HEADER_BYTES + index_len as usize, self.options.byte_order);
            trailer.write_at(&mut buf, 0)?;
            if self.options.add_trailer_index {
                let mut pos = HEADER_BYTES;
                for (length, entries) in &self.record_summaries {
                    buf.put_u32_at(pos, *length)?;
                    buf.put_u32_at(pos + 4, *entries)?;
                    pos += 8;
                }
            }
            let file = self.file.as_mut().unwrap();
            file.write_all(buf.as_slice())?;
            self.file_bytes += buf.limit() as u64;
            self.total_bytes += buf.limit() as u64;
        }

        // Rewrite the file header with final record count and trailer info.
        self.file_header.entries = self.record_summaries.len() as u32;
        if self.options.add_trailer {
            self.file_header.user_register1 = trailer_pos;
            self.file_header.has_first_event = self.options.add_trailer_index;
        }
        let mut head = ByteBuffer::new(HEADER_BYTES, self.options.byte_order);
        self.file_header.write_at(&mut head, 0)?;
        let file = self.file.as_mut().unwrap();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(head.as_slice())?;
        file.flush()?;

        debug!(
            "finished {:?}: {} records, {} bytes",
            self.current_path,
            self.record_summaries.len(),
            self.file_bytes
        );
        self.file = None;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(EvioError::InvalidConfig("writer is closed".into()));
        }
        if self.file.is_none() {
            return Err(EvioError::InvalidConfig(
                "writer has no open file (a previous split failed)".into(),
            ));
        }
        Ok(())
    }

    /// Flush the pending record, finish the current file, and close
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_record()?;
        if self.file.is_some() {
            self.finish_file()?;
        }
        self.closed = true;
        Ok(())
    }

    /// Path of the file currently being written
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Total record bytes written across every split
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes
    }

    /// Total events accepted
    pub fn event_count(&self) -> u64 {
        self.total_events
    }

    /// Number of files opened so far
    pub fn file_count(&self) -> u32 {
        self.file_count
    }

    /// The configured options
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }
}

/// Event-level writer: dictionary and first-event aware.
///
/// The dictionary (plain ASCII XML) and the first event are framed as a
/// record and planted in the file header's user-header region of every
/// split file, so each split reads standalone.
pub struct EventWriter {
    writer: Writer,
    dictionary: Option<String>,
    first_event: Option<Vec<u8>>,
}

impl EventWriter {
    /// Create without dictionary or first event
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        Self::create_with(path, options, None, None)
    }

    /// Create with an optional dictionary and first event
    pub fn create_with<P: AsRef<Path>>(
        path: P,
        options: WriterOptions,
        dictionary: Option<&str>,
        first_event: Option<&[u8]>,
    ) -> Result<Self> {
        let user_header = match (dictionary, first_event) {
            (None, None) => Vec::new(),
            _ => {
                let mut sub = RecordOutput::new(options.byte_order, CompressionType::None);
                if let Some(xml) = dictionary {
                    sub.try_add_event(xml.as_bytes());
                    sub.header_mut().has_dictionary = true;
                }
                if let Some(event) = first_event {
                    sub.try_add_event(event);
                    sub.header_mut().has_first_event = true;
                }
                sub.build()?;
                sub.as_bytes().to_vec()
            }
        };

        let writer = Writer::create_full(path, options, &user_header, dictionary.is_some())?;
        Ok(EventWriter {
            writer,
            dictionary: dictionary.map(str::to_owned),
            first_event: first_event.map(<[u8]>::to_vec),
        })
    }

    /// Append one event given as wire bytes
    pub fn add_event(&mut self, event: &[u8]) -> Result<()> {
        self.writer.add_event(event)
    }

    /// Append the readable region of a buffer as one event
    pub fn add_event_buffer(&mut self, buffer: &ByteBuffer) -> Result<()> {
        let bytes = buffer.slice(buffer.position(), buffer.remaining())?;
        self.writer.add_event(bytes)
    }

    /// Append a scanned structure as one event
    pub fn add_event_node(&mut self, scanned: &ScannedBuffer, node: NodeHandle) -> Result<()> {
        let bytes = scanned.structure_bytes(node)?;
        self.writer.add_event(bytes)
    }

    /// The dictionary planted in each split
    pub fn dictionary(&self) -> Option<&str> {
        self.dictionary.as_deref()
    }

    /// The first event planted in each split
    pub fn first_event(&self) -> Option<&[u8]> {
        self.first_event.as_deref()
    }

    /// The wrapped writer
    pub fn writer(&self) -> &Writer {
        &self.writer
    }

    /// Flush and close
    pub fn close(&mut self) -> Result<()> {
        self.writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::bank_of_u32;
    use crate::reader::{Reader, ReaderOptions};

    fn options() -> WriterOptions {
        WriterOptions::default()
    }

    // ── filename rendering ──────────────────────────────────────────────

    #[test]
    fn render_substitutes_run_split_stream() {
        assert_eq!(
            render_file_name("run_%d_split_%03d_s%d.evio", 7, 2, 1, false),
            "run_7_split_002_s1.evio"
        );
        assert_eq!(render_file_name("plain.evio", 7, 2, 1, false), "plain.evio");
    }

    #[test]
    fn render_normalises_width_to_zero_padding() {
        // "%3d" behaves as "%03d": no whitespace in filenames.
        assert_eq!(render_file_name("f_%3d.evio", 7, 0, 0, false), "f_007.evio");
        assert_eq!(render_file_name("f_%2x.evio", 255, 0, 0, false), "f_ff.evio");
    }

    #[test]
    fn render_appends_split_suffix_when_specifiers_missing() {
        assert_eq!(render_file_name("out.evio", 1, 3, 2, true), "out.evio.2.3");
        // Two specifiers are enough; nothing is appended.
        assert_eq!(
            render_file_name("out_%d_%d.evio", 1, 3, 2, true),
            "out_1_3.evio"
        );
    }

    // ── end-to-end writing ──────────────────────────────────────────────

    #[test]
    fn empty_file_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.evio");
        let mut writer = Writer::create(&path, options()).unwrap();
        writer.close().unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 56);
        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 0);
        assert_eq!(reader.record_count(), 0);
    }

    #[test]
    fn single_uint32_bank_is_160_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.evio");

        let event = bank_of_u32(1, 1, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9], ByteOrder::Little);
        assert_eq!(event.len(), 44);

        let mut writer = Writer::create(&path, options()).unwrap();
        writer.add_event(&event).unwrap();
        writer.close().unwrap();

        // file header 56 + record header 56 + index 4 + event 44
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 160);

        let mut reader = Reader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 1);
        assert_eq!(reader.event(0).unwrap(), event);
    }

    #[test]
    fn trailer_with_index_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trailer.evio");

        let opts = options().max_event_count(1).add_trailer_index(true);
        let mut writer = Writer::create(&path, opts).unwrap();
        let events: Vec<Vec<u8>> = (0..3)
            .map(|i| bank_of_u32(i + 1, i as u8, &[i as u32; 4], ByteOrder::Little))
            .collect();
        for ev in &events {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();

        // Index path and scan path must agree.
        let mut via_index = Reader::open(&path).unwrap();
        assert!(via_index.file_header().has_trailer_with_index());
        assert_eq!(via_index.record_count(), 3);
        assert_eq!(via_index.event_count(), 3);

        let mut via_scan = Reader::open_with_options(
            &path,
            ReaderOptions {
                force_scan: true,
                check_record_sequence: true,
            },
        )
        .unwrap();
        assert_eq!(via_scan.record_count(), 3);
        for i in 0..3u64 {
            assert_eq!(
                via_index.event(i).unwrap(),
                via_scan.event(i).unwrap(),
                "event {i}"
            );
        }
    }

    #[test]
    fn compressed_records_round_trip() {
        for compression in [CompressionType::Lz4, CompressionType::Gzip] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("packed.evio");

            let opts = options().compression(compression).add_trailer(true);
            let mut writer = Writer::create(&path, opts).unwrap();
            let events: Vec<Vec<u8>> = (0..20)
                .map(|i| bank_of_u32(1, i as u8, &[i as u32; 50], ByteOrder::Little))
                .collect();
            for ev in &events {
                writer.add_event(ev).unwrap();
            }
            writer.close().unwrap();

            let mut reader = Reader::open(&path).unwrap();
            assert_eq!(reader.event_count(), 20);
            for (i, ev) in events.iter().enumerate() {
                assert_eq!(&reader.event(i as u64).unwrap(), ev, "{compression:?}");
            }
            let stats = reader.stats().unwrap();
            assert!(stats.compression_ratio() < 1.0);
        }
    }

    #[test]
    fn sequential_and_random_access_share_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.evio");

        let opts = options().max_event_count(2);
        let mut writer = Writer::create(&path, opts).unwrap();
        let events: Vec<Vec<u8>> = (0..5)
            .map(|i| bank_of_u32(i + 1, 0, &[i as u32], ByteOrder::Little))
            .collect();
        for ev in &events {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert_eq!(reader.next_event().unwrap().unwrap(), events[0]);
        assert_eq!(reader.next_event().unwrap().unwrap(), events[1]);
        // Direction flip returns the previous event, not the same one.
        assert_eq!(reader.prev_event().unwrap().unwrap(), events[0]);
        // Random access repositions the shared cursor.
        assert_eq!(reader.event(3).unwrap(), events[3]);
        assert_eq!(reader.next_event().unwrap().unwrap(), events[4]);
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn split_files_are_standalone_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("run_%d_%d.evio");
        let template = template.to_str().unwrap();

        let opts = options()
            .split_size(1000)
            .max_event_count(1)
            .stream(5, 0, 1)
            .add_trailer_index(true);
        let mut writer = Writer::create(template, opts).unwrap();

        let events: Vec<Vec<u8>> = (0..10)
            .map(|i| bank_of_u32(i + 1, i as u8, &[i as u32; 72], ByteOrder::Little))
            .collect();
        for ev in &events {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();
        assert!(writer.file_count() > 1);

        // Concatenating events across splits reproduces submission order.
        let mut recovered = Vec::new();
        for split in 0..writer.file_count() {
            let path = render_file_name(template, 5, split, 0, true);
            let mut reader = Reader::open(&path).unwrap();
            for i in 0..reader.event_count() {
                recovered.push(reader.event(i).unwrap());
            }
        }
        assert_eq!(recovered, events);
    }

    #[test]
    fn record_numbers_continue_across_splits_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("num_%d_%d.evio");
        let template = template.to_str().unwrap();

        let opts = options().split_size(400).max_event_count(1);
        let mut writer = Writer::create(template, opts).unwrap();
        for i in 0..6u32 {
            writer
                .add_event(&bank_of_u32(1, 0, &[i; 40], ByteOrder::Little))
                .unwrap();
        }
        writer.close().unwrap();
        let files = writer.file_count();
        assert!(files > 1);

        let mut numbers = Vec::new();
        for split in 0..files {
            let path = render_file_name(template, 0, split, 0, true);
            let mut reader = Reader::open(&path).unwrap();
            for r in 0..reader.record_count() {
                numbers.push(reader.record(r).unwrap().header().record_number);
            }
        }
        assert_eq!(numbers, (1..=6).collect::<Vec<u32>>());
    }

    #[test]
    fn append_continues_record_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appended.evio");

        let first: Vec<Vec<u8>> = (0..2)
            .map(|i| bank_of_u32(1, i, &[i as u32; 3], ByteOrder::Little))
            .collect();
        let opts = options().max_event_count(1).add_trailer_index(true);
        let mut writer = Writer::create(&path, opts.clone()).unwrap();
        for ev in &first {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();

        let second: Vec<Vec<u8>> = (2..4)
            .map(|i| bank_of_u32(1, i, &[i as u32; 3], ByteOrder::Little))
            .collect();
        let mut writer = Writer::create(&path, opts.append(true)).unwrap();
        for ev in &second {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();

        let mut reader = Reader::open_with_options(
            &path,
            ReaderOptions {
                check_record_sequence: true,
                force_scan: true,
            },
        )
        .unwrap();
        assert_eq!(reader.event_count(), 4);
        for (i, ev) in first.iter().chain(&second).enumerate() {
            assert_eq!(&reader.event(i as u64).unwrap(), ev);
        }
    }

    #[test]
    fn append_keeps_existing_byte_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bigend.evio");

        let event = bank_of_u32(1, 1, &[1, 2, 3], ByteOrder::Big);
        let opts = options().byte_order(ByteOrder::Big);
        let mut writer = Writer::create(&path, opts).unwrap();
        writer.add_event(&event).unwrap();
        writer.close().unwrap();

        // Configured little, but the file is big-endian; big wins.
        let opts = options().append(true);
        let event2 = bank_of_u32(2, 2, &[4, 5, 6], ByteOrder::Big);
        let mut writer = Writer::create(&path, opts).unwrap();
        assert_eq!(writer.options().byte_order, ByteOrder::Big);
        writer.add_event(&event2).unwrap();
        writer.close().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert_eq!(reader.byte_order(), ByteOrder::Big);
        assert_eq!(reader.event(1).unwrap(), event2);
    }

    #[test]
    fn arbitrary_user_header_does_not_confuse_the_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userhdr.evio");

        // 64 bytes of non-record user data, larger than a record header.
        let user: Vec<u8> = (0u8..64).collect();
        let event = bank_of_u32(1, 1, &[1, 2], ByteOrder::Little);
        let mut writer = Writer::create_with_user_header(&path, options(), &user).unwrap();
        writer.add_event(&event).unwrap();
        writer.close().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert!(!reader.has_dictionary());
        assert!(reader.first_event().is_none());
        assert_eq!(reader.file_header().user_header_length, 64);
        assert_eq!(reader.event(0).unwrap(), event);
    }

    #[test]
    fn overwrite_refused_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("precious.evio");
        std::fs::write(&path, b"do not clobber").unwrap();

        let result = Writer::create(&path, options().overwrite_ok(false));
        assert!(matches!(result, Err(EvioError::Io(_))));
    }

    // ── EventWriter ─────────────────────────────────────────────────────

    #[test]
    fn dictionary_and_first_event_reach_every_split() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("dict_%d_%d.evio");
        let template = template.to_str().unwrap();

        let xml = "<xmlDict><bank name=\"hits\" tag=\"1\"/></xmlDict>";
        let first = bank_of_u32(99, 9, &[7, 7, 7], ByteOrder::Little);

        let opts = options().split_size(600).max_event_count(1);
        let mut writer = EventWriter::create_with(template, opts, Some(xml), Some(&first)).unwrap();
        for i in 0..6u32 {
            writer
                .add_event(&bank_of_u32(1, 0, &[i; 40], ByteOrder::Little))
                .unwrap();
        }
        writer.close().unwrap();
        let files = writer.writer().file_count();
        assert!(files > 1);

        for split in 0..files {
            let path = render_file_name(template, 0, split, 0, true);
            let reader = Reader::open(&path).unwrap();
            assert_eq!(reader.dictionary_xml(), Some(xml), "split {split}");
            assert_eq!(reader.first_event(), Some(&first[..]), "split {split}");
        }
    }

    #[test]
    fn event_writer_accepts_buffers_and_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.evio");

        let event = bank_of_u32(1, 1, &[10, 20, 30], ByteOrder::Little);

        // A scanned buffer to take a node from.
        let mut rec = RecordOutput::new(ByteOrder::Little, CompressionType::None);
        rec.try_add_event(&event);
        rec.build().unwrap();
        let scanned =
            ScannedBuffer::scan(ByteBuffer::wrap(rec.as_bytes().to_vec(), ByteOrder::Little))
                .unwrap();
        let node = scanned.event(0).unwrap();

        let mut writer = EventWriter::create(&path, options()).unwrap();
        writer.add_event(&event).unwrap();
        let mut buffer = ByteBuffer::wrap(event.clone(), ByteOrder::Little);
        buffer.set_position(0).unwrap();
        writer.add_event_buffer(&buffer).unwrap();
        writer.add_event_node(&scanned, node).unwrap();
        writer.close().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 3);
        for i in 0..3 {
            assert_eq!(reader.event(i).unwrap(), event);
        }
    }
}
