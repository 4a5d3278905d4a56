//! Ring-based multi-threaded record writer
//!
//! A bounded ring of record slots connects three roles: the producer (the
//! caller of [`RingWriter::add_event`]) fills slots, `comp_threads`
//! compressor workers build them in parallel, and one writer thread puts
//! the finished records on disk strictly in submission order, so the file
//! is byte-identical for any worker count.
//!
//! Slot ownership moves producer -> compressor -> writer -> producer,
//! guarded by three sequence gates:
//!
//! - the producer claims slot `s` once the writer has released `s - ring`,
//! - compressor `k` takes slot `s` when `s` is published and `s % N == k`
//!   (a strided partition, one owner per slot),
//! - the writer consumes slot `s` when its compressor reports it done.
//!
//! Every wait depends only on a strictly earlier sequence, so the pipeline
//! cannot deadlock. Worker errors are latched and re-raised on the next
//! public call; `close` publishes an end-of-stream marker, drains the ring,
//! joins the threads, and finishes the file (trailer and header patch
//! included). Splitting is the writer thread's business; the producer and
//! compressors are file-oblivious.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::error::{EvioError, Result};
use crate::format::CompressionType;
use crate::record::RecordOutput;
use crate::writer::{Writer, WriterOptions};

/// A monotone sequence counter that threads can wait on
struct Gate {
    seq: Mutex<i64>,
    cond: Condvar,
}

impl Gate {
    fn new() -> Self {
        Gate {
            seq: Mutex::new(-1),
            cond: Condvar::new(),
        }
    }

    /// Raise the counter to `v` and wake every waiter
    fn publish(&self, v: i64) {
        let mut s = self.seq.lock().unwrap();
        if v > *s {
            *s = v;
            self.cond.notify_all();
        }
    }

    /// Block until the counter reaches `v`; `None` when `cancel` fires first
    fn wait_for<F: Fn() -> bool>(&self, v: i64, cancel: F) -> Option<i64> {
        let mut s = self.seq.lock().unwrap();
        loop {
            if *s >= v {
                return Some(*s);
            }
            if cancel() {
                return None;
            }
            s = self.cond.wait(s).unwrap();
        }
    }

    /// Wake waiters so they re-check their cancel predicate
    fn kick(&self) {
        let _s = self.seq.lock().unwrap();
        self.cond.notify_all();
    }
}

/// One ring slot: a reusable record plus its current sequence
struct RingItem {
    record: RecordOutput,
    sequence: i64,
    last: bool,
}

/// State shared by the producer, compressors, and writer thread
struct RingShared {
    slots: Vec<Mutex<RingItem>>,
    mask: i64,
    /// Highest sequence handed to the compressors
    published: Gate,
    /// Per-compressor: highest sequence built
    compressed: Vec<Gate>,
    /// Highest sequence written to disk and released
    written: Gate,
    /// Sequence of the end-of-stream marker, `i64::MAX` until close
    final_seq: AtomicI64,
    failed: AtomicBool,
    error: Mutex<Option<EvioError>>,
}

impl RingShared {
    fn slot(&self, seq: i64) -> &Mutex<RingItem> {
        &self.slots[(seq & self.mask) as usize]
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Record the first error and wake every gate
    fn latch_error(&self, error: EvioError) {
        {
            let mut slot = self.error.lock().unwrap();
            if slot.is_none() {
                *slot = Some(error);
            }
        }
        self.failed.store(true, Ordering::Release);
        self.published.kick();
        for gate in &self.compressed {
            gate.kick();
        }
        self.written.kick();
    }

    fn take_error(&self) -> EvioError {
        self.error.lock().unwrap().take().unwrap_or_else(|| {
            EvioError::Io(std::io::Error::other("writer pipeline already failed"))
        })
    }
}

/// Multi-threaded writer: parallel compression, ordered output
pub struct RingWriter {
    shared: Arc<RingShared>,
    ring_size: i64,
    seq: i64,
    claimed: bool,
    total_events: u64,
    compressors: Vec<JoinHandle<()>>,
    writer_thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl RingWriter {
    /// Create a ring writer over `path` (a template when splitting)
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        Self::create_with(path, options, None, None)
    }

    /// Create with an optional dictionary and first event, planted in each
    /// split like [`crate::writer::EventWriter`] does
    pub fn create_with<P: AsRef<Path>>(
        path: P,
        options: WriterOptions,
        dictionary: Option<&str>,
        first_event: Option<&[u8]>,
    ) -> Result<Self> {
        let ring_size = options.ring_size;
        let comp_threads = options.comp_threads;
        if ring_size < 4 || !ring_size.is_power_of_two() {
            return Err(EvioError::InvalidConfig(format!(
                "ring size {ring_size} must be a power of two, at least 4"
            )));
        }
        if comp_threads == 0 || comp_threads > ring_size - 2 {
            return Err(EvioError::InvalidConfig(format!(
                "compression thread count {comp_threads} must be 1 ..= ring size - 2 ({})",
                ring_size - 2
            )));
        }

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
        let sink = Writer::create_full(path, options.clone(), &user_header, dictionary.is_some())?;

        let slots = (0..ring_size)
            .map(|_| {
                Mutex::new(RingItem {
                    record: RecordOutput::with_limits(
                        options.byte_order,
                        options.compression,
                        options.max_event_count,
                        options.max_record_bytes,
                    ),
                    sequence: -1,
                    last: false,
                })
            })
            .collect();

        let shared = Arc::new(RingShared {
            slots,
            mask: (ring_size - 1) as i64,
            published: Gate::new(),
            compressed: (0..comp_threads).map(|_| Gate::new()).collect(),
            written: Gate::new(),
            final_seq: AtomicI64::new(i64::MAX),
            failed: AtomicBool::new(false),
            error: Mutex::new(None),
        });

        let compressors = (0..comp_threads)
            .map(|k| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("evio-comp-{k}"))
                    .spawn(move || run_compressor(&shared, k, comp_threads))
                    .map_err(EvioError::Io)
            })
            .collect::<Result<Vec<_>>>()?;

        let writer_thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("evio-writer".into())
                .spawn(move || run_writer(&shared, sink, comp_threads))
                .map_err(EvioError::Io)?
        };

        debug!("ring writer up: {comp_threads} compressors, ring of {ring_size}");

        Ok(RingWriter {
            shared,
            ring_size: ring_size as i64,
            seq: 0,
            claimed: false,
            total_events: 0,
            compressors,
            writer_thread: Some(writer_thread),
            closed: false,
        })
    }

    fn check_failed(&self) -> Result<()> {
        if self.shared.failed() {
            return Err(self.shared.take_error());
        }
        Ok(())
    }

    /// Take ownership of the slot for the current sequence, waiting for the
    /// writer to release that ring position.
    fn claim(&mut self) -> Result<()> {
        let released = self
            .shared
            .written
            .wait_for(self.seq - self.ring_size, || self.shared.failed());
        if released.is_none() {
            return Err(self.shared.take_error());
        }

        let mut slot = self.shared.slot(self.seq).lock().unwrap();
        slot.record.reset();
        slot.record.set_record_number((self.seq + 1) as u32);
        slot.sequence = self.seq;
        slot.last = false;
        self.claimed = true;
        Ok(())
    }

    /// Hand the current slot to the compressors
    fn publish_current(&mut self) {
        self.shared.published.publish(self.seq);
        self.claimed = false;
        self.seq += 1;
    }

    /// Append one event; blocks only when the ring is full
    pub fn add_event(&mut self, event: &[u8]) -> Result<()> {
        if self.closed {
            return Err(EvioError::InvalidConfig("writer is closed".into()));
        }
        self.check_failed()?;

        loop {
            if !self.claimed {
                self.claim()?;
            }
            {
                let mut slot = self.shared.slot(self.seq).lock().unwrap();
                if slot.record.try_add_event(event) {
                    self.total_events += 1;
                    return Ok(());
                }
            }
            // Record full: publish it and move to the next slot.
            self.publish_current();
        }
    }

    /// Total events accepted
    pub fn event_count(&self) -> u64 {
        self.total_events
    }

    /// Publish the end-of-stream marker, drain, join, and finish the file
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.shared.failed() {
            // Flush a partially filled slot first.
            if self.claimed {
                let has_events = {
                    let slot = self.shared.slot(self.seq).lock().unwrap();
                    !slot.record.is_empty()
                };
                if has_events {
                    self.publish_current();
                }
            }
            if !self.claimed {
                // A fresh slot carries the marker; a failure while waiting
                // just falls through to the join below.
                let _ = self.claim();
            }
            if self.claimed {
                {
                    let mut slot = self.shared.slot(self.seq).lock().unwrap();
                    slot.last = true;
                }
                self.shared.final_seq.store(self.seq, Ordering::Release);
                self.shared.published.publish(self.seq);
                for gate in &self.shared.compressed {
                    gate.kick();
                }
                self.claimed = false;
                self.seq += 1;
            }
        }

        for handle in self.compressors.drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }

        if self.shared.failed.load(Ordering::Acquire) {
            return Err(self.shared.take_error());
        }
        debug!("ring writer closed after {} events", self.total_events);
        Ok(())
    }
}

impl Drop for RingWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Compressor worker `k`: builds slots `k, k + n, k + 2n, ...`
fn run_compressor(shared: &RingShared, k: usize, n: usize) {
    let mut seq = k as i64;
    loop {
        let published = shared.published.wait_for(seq, || {
            shared.failed() || shared.final_seq.load(Ordering::Acquire) < seq
        });
        if published.is_none() {
            // Failed, or the stream ended before this worker's next stride.
            return;
        }

        let is_last = {
            let mut slot = shared.slot(seq).lock().unwrap();
            debug_assert_eq!(slot.sequence, seq);
            if slot.last {
                true
            } else {
                if let Err(e) = slot.record.build() {
                    drop(slot);
                    shared.latch_error(e);
                    return;
                }
                false
            }
        };

        shared.compressed[k].publish(seq);
        if is_last {
            return;
        }
        seq += n as i64;
    }
}

/// Writer thread: consumes slots in submission order and owns the file
fn run_writer(shared: &RingShared, mut sink: Writer, n: usize) {
    let mut seq = 0i64;
    loop {
        let k = (seq % n as i64) as usize;
        let done = shared.compressed[k].wait_for(seq, || shared.failed());
        if done.is_none() {
            return;
        }

        let mut slot = shared.slot(seq).lock().unwrap();
        if slot.last {
            drop(slot);
            if let Err(e) = sink.close() {
                shared.latch_error(e);
            }
            // Release everything; the producer is already past the marker.
            shared.written.publish(i64::MAX);
            return;
        }

        let entries = slot.record.event_count() as u32;
        let result = sink.write_built(slot.record.built_mut(), entries);
        slot.record.reset();
        drop(slot);

        if let Err(e) = result {
            shared.latch_error(e);
            return;
        }
        shared.written.publish(seq);
        seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteOrder;
    use crate::format::bank_of_u32;
    use crate::reader::Reader;
    use crate::writer::RecordNumbering;

    fn sample_events(count: usize) -> Vec<Vec<u8>> {
        (0..count)
            .map(|i| bank_of_u32((i % 7 + 1) as u16, i as u8, &[i as u32; 20], ByteOrder::Little))
            .collect()
    }

    #[test]
    fn invalid_configurations_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.evio");

        for (comp, ring) in [(2usize, 10usize), (2, 2), (0, 16), (15, 16)] {
            let opts = WriterOptions::default().ring(comp, ring);
            assert!(
                matches!(
                    RingWriter::create(&path, opts),
                    Err(EvioError::InvalidConfig(_))
                ),
                "comp={comp} ring={ring}"
            );
        }
    }

    #[test]
    fn ordered_round_trip_with_compression() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring.evio");

        let events = sample_events(50);
        let opts = WriterOptions::default()
            .compression(CompressionType::Lz4)
            .max_event_count(4)
            .ring(3, 16)
            .add_trailer_index(true);
        let mut writer = RingWriter::create(&path, opts).unwrap();
        for ev in &events {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();
        assert_eq!(writer.event_count(), 50);

        let mut reader = Reader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 50);
        for (i, ev) in events.iter().enumerate() {
            assert_eq!(&reader.event(i as u64).unwrap(), ev, "event {i}");
        }
    }

    #[test]
    fn output_is_independent_of_comp_threads() {
        let dir = tempfile::tempdir().unwrap();
        let events = sample_events(60);

        let base = WriterOptions::default()
            .compression(CompressionType::Lz4)
            .max_event_count(5)
            .add_trailer_index(true);

        // Single-threaded reference.
        let serial_path = dir.path().join("serial.evio");
        let mut serial = Writer::create(&serial_path, base.clone()).unwrap();
        for ev in &events {
            serial.add_event(ev).unwrap();
        }
        serial.close().unwrap();
        let reference = std::fs::read(&serial_path).unwrap();

        for threads in [1usize, 2, 4] {
            let path = dir.path().join(format!("ring_{threads}.evio"));
            let opts = base.clone().ring(threads, 16);
            let mut writer = RingWriter::create(&path, opts).unwrap();
            for ev in &events {
                writer.add_event(ev).unwrap();
            }
            writer.close().unwrap();

            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(bytes, reference, "comp_threads = {threads}");
        }
    }

    #[test]
    fn empty_stream_closes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.evio");

        let opts = WriterOptions::default().ring(2, 8).add_trailer(true);
        let mut writer = RingWriter::create(&path, opts).unwrap();
        writer.close().unwrap();

        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 0);
        assert_eq!(reader.record_count(), 0);
    }

    #[test]
    fn splits_happen_in_the_writer_thread() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("ring_%d_%d.evio");
        let template = template.to_str().unwrap();

        let events = sample_events(12);
        let opts = WriterOptions::default()
            .split_size(700)
            .max_event_count(2)
            .ring(2, 8)
            .record_numbering(RecordNumbering::ContinueAcrossSplits)
            .add_trailer_index(true);
        let mut writer = RingWriter::create(template, opts).unwrap();
        for ev in &events {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();

        // Concatenation across splits preserves submission order.
        let mut recovered = Vec::new();
        let mut split = 0;
        loop {
            let path = crate::writer::render_file_name(template, 0, split, 0, true);
            if !std::path::Path::new(&path).exists() {
                break;
            }
            let mut reader = Reader::open(&path).unwrap();
            for i in 0..reader.event_count() {
                recovered.push(reader.event(i).unwrap());
            }
            split += 1;
        }
        assert!(split > 1, "expected more than one split file");
        assert_eq!(recovered, events);
    }

    #[test]
    fn many_small_events_fill_the_ring() {
        // More records than ring slots forces the producer to wait on the
        // writer's release gate.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.evio");

        let events = sample_events(64);
        let opts = WriterOptions::default().max_event_count(1).ring(2, 4);
        let mut writer = RingWriter::create(&path, opts).unwrap();
        for ev in &events {
            writer.add_event(ev).unwrap();
        }
        writer.close().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert_eq!(reader.record_count(), 64);
        for (i, ev) in events.iter().enumerate() {
            assert_eq!(&reader.event(i as u64).unwrap(), ev);
        }
    }

    #[test]
    fn add_after_close_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("closed.evio");

        let mut writer = RingWriter::create(&path, WriterOptions::default()).unwrap();
        writer.close().unwrap();
        assert!(matches!(
            writer.add_event(&[0u8; 8]),
            Err(EvioError::InvalidConfig(_))
        ));
    }

    #[test]
    fn dictionary_travels_through_the_ring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ringdict.evio");

        let xml = "<xmlDict><bank name=\"raw\" tag=\"2\"/></xmlDict>";
        let first = bank_of_u32(42, 0, &[1], ByteOrder::Little);
        let mut writer = RingWriter::create_with(
            &path,
            WriterOptions::default().ring(2, 8),
            Some(xml),
            Some(&first),
        )
        .unwrap();
        writer
            .add_event(&bank_of_u32(1, 0, &[5, 6], ByteOrder::Little))
            .unwrap();
        writer.close().unwrap();

        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.dictionary_xml(), Some(xml));
        assert_eq!(reader.first_event(), Some(&first[..]));
    }
}
