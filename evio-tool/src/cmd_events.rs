use evio::{ByteBuffer, Reader, ReaderOptions, ScannedBuffer};

use crate::parse_file_args;
use crate::style::*;

pub(crate) fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (path, scan) = parse_file_args(args, "evio-tool events <file> [--scan]");

    let mut reader = Reader::open_with_options(
        &path,
        ReaderOptions {
            force_scan: scan,
            ..Default::default()
        },
    )?;
    let order = reader.byte_order();

    header(&format!("Events: {path}"));
    println!(
        "  {DIM}{:>8}  {:>12}  {:>8}  {:>5}  {}{RESET}",
        "#", "bytes", "tag", "num", "payload"
    );

    for i in 0..reader.event_count() {
        let event = reader.event(i)?;
        // Scan the lone event through a node view for its tag and type.
        match scan_one(&event, order) {
            Some((tag, num, data_type)) => println!(
                "  {:>8}  {:>12}  {:>8}  {:>5}  {data_type}",
                i,
                event.len(),
                tag,
                num
            ),
            None => println!(
                "  {:>8}  {:>12}  {DIM}{:>8}  {:>5}  (opaque){RESET}",
                i, event.len(), "-", "-"
            ),
        }
    }
    println!();
    Ok(())
}

/// Pull tag/num/type out of an event's root bank header
fn scan_one(event: &[u8], order: evio::ByteOrder) -> Option<(u32, u8, String)> {
    let mut record = evio::RecordOutput::new(order, evio::CompressionType::None);
    if !record.try_add_event(event) {
        return None;
    }
    record.build().ok()?;
    let scanned = ScannedBuffer::scan(ByteBuffer::wrap(record.as_bytes().to_vec(), order)).ok()?;
    let node = scanned.get(scanned.event(0).ok()?).ok()?.clone();
    Some((node.tag, node.num, format!("{:?}", node.data_type)))
}
