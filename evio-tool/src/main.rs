//! evio-tool — CLI to inspect EVIO v6 / HIPO files
//!
//! # Usage
//!
//! ```text
//! evio-tool info <file>                  File header, dictionary, stats
//! evio-tool records <file> [--scan]      Per-record table
//! evio-tool events <file> [--scan]       Per-event sizes and tags
//! evio-tool cat <file> <event-index>     One event's bytes to stdout
//! ```

mod cmd_cat;
mod cmd_events;
mod cmd_info;
mod cmd_records;
mod style;

use std::env;
use std::process;

use style::{BOLD, DIM, GREEN, RED, RESET};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "info" => cmd_info::run(&args[2..]),
        "records" => cmd_records::run(&args[2..]),
        "events" => cmd_events::run(&args[2..]),
        "cat" => cmd_cat::run(&args[2..]),
        "-h" | "--help" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            eprintln!("{RED}Unknown command: {}{RESET}", args[1]);
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("{RED}error:{RESET} {e}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!(
        r#"
{BOLD}evio-tool{RESET} — EVIO v6 / HIPO file inspector

{BOLD}USAGE:{RESET}
    evio-tool <COMMAND> [OPTIONS]

{BOLD}COMMANDS:{RESET}
    {GREEN}info{RESET}      <file>                 File header, dictionary, stats
    {GREEN}records{RESET}   <file> [--scan]        Per-record table
    {GREEN}events{RESET}    <file> [--scan]        Per-event sizes and tags
    {GREEN}cat{RESET}       <file> <event-index>   One event's bytes to stdout

{DIM}--scan ignores in-file and trailer indexes and walks the records{RESET}

{BOLD}EXAMPLES:{RESET}
    evio-tool info run_42.evio
    evio-tool records run_42.evio --scan
    evio-tool cat run_42.evio 7 > event7.bin
"#
    );
}

/// Shared option handling: (path, force_scan)
pub(crate) fn parse_file_args(args: &[String], usage: &str) -> (String, bool) {
    let mut path = None;
    let mut scan = false;
    for a in args {
        match a.as_str() {
            "--scan" => scan = true,
            _ if path.is_none() => path = Some(a.clone()),
            _ => {}
        }
    }
    match path {
        Some(p) => (p, scan),
        None => {
            eprintln!("Usage: {usage}");
            process::exit(1);
        }
    }
}
