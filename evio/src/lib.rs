//! EVIO - reader and writer for the EVIO v6 / HIPO record format
//!
//! A library for the binary event format used by nuclear-physics data
//! acquisition: files are sequences of *records*, each carrying a 14-word
//! header, an event index, an optional user header, and a possibly
//! compressed payload of *events*; events are trees of banks, segments,
//! and tagsegments.
//!
//! # Features
//!
//! - **Read** files randomly or sequentially, with the record index taken
//!   from the trailer, the file header, or a forced scan
//! - **Write** files with per-record LZ4 / LZ4-best / gzip compression,
//!   size-based file splitting, trailers, dictionaries, and first events
//! - **Parallel writing** through a bounded ring of records: N compression
//!   workers, one in-order writer thread, byte-identical output
//! - **Scan and mutate** uncompressed buffers in place through zero-copy
//!   [`ScannedBuffer`] / [`NodeHandle`] views
//! - **Endian swap** whole event trees, composite data included
//! - **Cross-platform** - plain files, no platform-specific I/O
//!
//! # Example
//!
//! ```no_run
//! use evio::{Reader, Writer, WriterOptions, CompressionType, Result};
//!
//! fn main() -> Result<()> {
//!     let options = WriterOptions::default()
//!         .compression(CompressionType::Lz4)
//!         .add_trailer_index(true);
//!     let mut writer = Writer::create("run_42.evio", options)?;
//!     writer.add_event(&[/* evio bank bytes */])?;
//!     writer.close()?;
//!
//!     let mut reader = Reader::open("run_42.evio")?;
//!     for i in 0..reader.event_count() {
//!         let event = reader.event(i)?;
//!         println!("event {i}: {} bytes", event.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod composite;
pub mod error;
pub mod format;
pub mod header;
pub mod node;
pub mod reader;
pub mod record;
pub mod ring;
pub mod swap;
pub mod writer;

pub use buffer::{BufferView, ByteBuffer, ByteOrder};
pub use composite::{parse_format, swap_composite, FormatToken, Repeat};
pub use error::{EvioError, Result};
pub use format::{
    CompressionType, DataType, HeaderType, StructureHeader, StructureType, EVIO_VERSION, MAGIC,
};
pub use header::RecordHeader;
pub use node::{EvioNode, NodeHandle, RecordPosition, ScannedBuffer};
pub use reader::{is_evio_file, open, FileEventIndex, Reader, ReaderOptions, ReaderStats};
pub use record::{RecordInput, RecordOutput};
pub use ring::RingWriter;
pub use swap::{swap_event, swap_event_in_place};
pub use writer::{EventWriter, RecordNumbering, Writer, WriterOptions};
