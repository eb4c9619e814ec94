//! jetson-decode - decode captured tegrastats output to JSON.
//!
//! Reads a tegrastats log (or standard input) and prints one JSON snapshot
//! per line. Lines that cannot be decoded are reported on stderr and
//! skipped.

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{Level, debug, error, warn};
use tracing_subscriber::EnvFilter;

use jetson_exporter::collector::RealFs;
use jetson_exporter::collector::tegrastats::{DecodeError, LineDecoder, parse_line};
use jetson_exporter::storage::Snapshot;

/// Decode captured tegrastats output to JSON lines.
#[derive(Parser)]
#[command(
    name = "jetson-decode",
    about = "Decode captured tegrastats output to JSON lines",
    version = jetson_exporter::VERSION
)]
struct Args {
    /// Log file to decode. Reads standard input when omitted or "-".
    input: Option<PathBuf>,

    /// Only decode the last line.
    #[arg(long)]
    last: bool,

    /// Read CPU governors below this /sys root. Only meaningful on the board
    /// the log was captured on.
    #[arg(long, value_name = "PATH")]
    sys_path: Option<PathBuf>,

    /// Pretty-print each snapshot.
    #[arg(long)]
    pretty: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("jetson_decode={level}").parse() {
        filter = filter.add_directive(directive);
    }
    if let Ok(directive) = format!("jetson_exporter={level}").parse() {
        filter = filter.add_directive(directive);
    }

    // stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn read_input(input: Option<&PathBuf>) -> io::Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_snapshot(out: &mut impl Write, snapshot: &Snapshot, pretty: bool) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, snapshot)?;
    } else {
        serde_json::to_writer(&mut *out, snapshot)?;
    }
    writeln!(out)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let content = match read_input(args.input.as_ref()) {
        Ok(content) => content,
        Err(e) => {
            error!(error = %e, "failed to read input");
            return ExitCode::FAILURE;
        }
    };

    let decoder = args
        .sys_path
        .as_ref()
        .map(|sys| LineDecoder::new(RealFs::new(), sys.clone()));
    let decode = |line: &str| -> Result<Snapshot, DecodeError> {
        match &decoder {
            Some(decoder) => decoder.decode(line),
            None => parse_line(line),
        }
    };

    let mut lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line))
        .collect();
    if args.last {
        lines = lines.split_off(lines.len().saturating_sub(1));
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut decoded = 0usize;
    let mut failed = 0usize;

    for (number, line) in lines {
        match decode(line) {
            Ok(snapshot) => {
                if let Err(e) = write_snapshot(&mut out, &snapshot, args.pretty) {
                    if e.kind() == io::ErrorKind::BrokenPipe {
                        return ExitCode::SUCCESS;
                    }
                    error!(error = %e, "failed to write output");
                    return ExitCode::FAILURE;
                }
                decoded += 1;
            }
            Err(e) => {
                warn!(line = number, error = %e, "skipping line");
                failed += 1;
            }
        }
    }

    if let Err(e) = out.flush()
        && e.kind() != io::ErrorKind::BrokenPipe
    {
        error!(error = %e, "failed to write output");
        return ExitCode::FAILURE;
    }

    debug!(decoded, failed, "done");
    if decoded == 0 {
        error!("no line could be decoded");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
