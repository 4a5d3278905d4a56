use evio::{Reader, ReaderOptions};

use crate::parse_file_args;
use crate::style::*;

pub(crate) fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (path, scan) = parse_file_args(args, "evio-tool records <file> [--scan]");

    let mut reader = Reader::open_with_options(
        &path,
        ReaderOptions {
            force_scan: scan,
            ..Default::default()
        },
    )?;

    header(&format!("Records: {path}"));
    println!(
        "  {DIM}{:>5}  {:>6}  {:>12}  {:>10}  {:>12}  {}{RESET}",
        "#", "number", "offset", "events", "bytes", "compression"
    );

    for i in 0..reader.record_count() {
        let location = reader.record_locations()[i];
        let record = reader.record(i)?;
        let h = record.header();
        println!(
            "  {:>5}  {:>6}  {:>12}  {:>10}  {:>12}  {:?}",
            i,
            h.record_number,
            location.position,
            h.entries,
            location.length,
            h.compression_type,
        );
    }
    println!();
    Ok(())
}
