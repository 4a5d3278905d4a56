use evio::{Reader, ReaderOptions};

use crate::parse_file_args;
use crate::style::*;

pub(crate) fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (path, scan) = parse_file_args(args, "evio-tool info <file> [--scan]");

    let mut reader = Reader::open_with_options(
        &path,
        ReaderOptions {
            force_scan: scan,
            ..Default::default()
        },
    )?;

    header(&format!("EVIO: {path}"));

    let fh = reader.file_header().clone();
    section("File header");
    kv("Byte order", &format!("{:?}", reader.byte_order()));
    kv("Version", &fh.version.to_string());
    kv("Records", &format_commas(reader.record_count() as u64));
    kv("Events", &format_commas(reader.event_count()));
    kv(
        "Trailer index",
        if fh.has_trailer_with_index() {
            "present"
        } else {
            "absent"
        },
    );
    if fh.has_trailer_with_index() {
        kv("Trailer position", &format_commas(fh.trailer_position()));
    }
    if let Some(xml) = reader.dictionary_xml() {
        kv("Dictionary", &format!("{} chars", xml.len()));
    }
    if let Some(first) = reader.first_event() {
        kv("First event", &format_size(first.len() as u64));
    }

    let stats = reader.stats()?;
    section("Payload");
    kv("Record bytes", &format_size(stats.total_record_bytes));
    kv("Uncompressed", &format_size(stats.uncompressed_bytes));
    kv("Stored", &format_size(stats.stored_payload_bytes));
    kv_highlight(
        "Compression",
        &format!("{:.1}%", stats.compression_ratio() * 100.0),
    );
    println!();

    Ok(())
}
