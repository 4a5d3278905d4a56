use std::io::{self, Write};
use std::process;

use evio::Reader;

pub(crate) fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if args.len() < 2 {
        eprintln!("Usage: evio-tool cat <file> <event-index>");
        process::exit(1);
    }
    let path = &args[0];
    let index: u64 = args[1].parse()?;

    let mut reader = Reader::open(path)?;
    let event = reader.event(index)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(&event)?;
    out.flush()?;
    Ok(())
}
