// SPDX-FileCopyrightText: 2025 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Run an Intcode program on its own thread, feeding it input from the command line or stdin and
//! printing its output to stdout

use intcode_vm::task::{Sender, rendezvous};
use intcode_vm::{Program, TaskOptions};
use std::error::Error;
use std::fmt::{self, Display};
use std::fs::{self, read_to_string};
use std::io::{self, BufRead, Write, stdin, stdout};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(PartialEq, Clone, Copy, ValueEnum)]
enum CodeFormat {
    /// comma-separated ASCII-encoded decimal numbers
    #[value(alias("text"))]
    #[value(alias("aoc"))]
    Ascii,
    /// little-endian 64-bit integers
    #[cfg_attr(target_endian = "little", value(alias("binary-native")))]
    #[value(name("binary-little-endian"), alias("binle"))]
    LittleEndian,
    #[cfg_attr(target_endian = "big", value(alias("binary-native")))]
    #[value(name("binary-big-endian"), alias("binbe"))]
    /// big-endian 64-bit integers
    BigEndian,
}

const VERSION: &str = concat!(env!("CARGO_CRATE_NAME"), '-', env!("CARGO_PKG_VERSION"));

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = VERSION)]
#[command(about = "Intcode interpreter", long_about = None)]
struct Args {
    #[arg(help = "The source code to interpret")]
    source: PathBuf,
    #[arg(help = "Input format for the intcode")]
    #[arg(short, long)]
    #[arg(default_value = "ascii")]
    format: CodeFormat,
    #[arg(short = 's', long = "set", value_name = "ADDR=VAL", value_parser = parse_override)]
    #[arg(help = "Write VAL to ADDR before running (can be repeated)")]
    overrides: Vec<(i64, i64)>,
    #[arg(short, long, value_name = "INTS", value_delimiter = ',')]
    #[arg(help = "Comma-separated inputs to use instead of reading stdin")]
    input: Option<Vec<i64>>,
    #[arg(short, long)]
    #[arg(help = "Exchange input and output as ASCII text")]
    ascii: bool,
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "Give up if the program waits on I/O for longer than this")]
    timeout: Option<u64>,
    #[arg(short, long)]
    #[arg(help = "Log every executed instruction to stderr")]
    trace: bool,
    #[arg(short, long)]
    #[arg(help = "Print the final result once the program halts")]
    result: bool,
}

fn parse_override(s: &str) -> Result<(i64, i64), String> {
    let (addr, val) = s
        .split_once('=')
        .ok_or_else(|| format!("{s:?} is not in ADDR=VAL form"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<i64>()
            .map_err(|e| format!("{part:?} is not a valid int: {e}"))
    };
    Ok((parse(addr)?, parse(val)?))
}

fn parse_ints(s: &str) -> Result<Vec<i64>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .map_err(|e| format!("{part:?} is not a valid int: {e}"))
        })
        .collect()
}

macro_rules! to_ascii_char {
    ($e: expr) => {{
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "in macro to make it explicit"
        )]
        {
            $e as u8 as char
        }
    }};
}

/// Turn a line of stdin into inputs, either one per byte or one per comma-separated int
fn line_inputs(line: &str, ascii: bool) -> Result<Vec<i64>, CliError> {
    if ascii {
        if let Some(bad_char) = line.chars().find(|c| !c.is_ascii()) {
            return Err(CliError::InvalidAsciiChar(bad_char));
        }
        Ok(line.bytes().chain([b'\n']).map(i64::from).collect())
    } else {
        parse_ints(line).map_err(CliError::InvalidInput)
    }
}

/// Send inputs to the program until they run out or the program stops listening
fn feed(to_vm: Sender<i64>, inputs: Option<Vec<i64>>, ascii: bool) -> Result<(), CliError> {
    if let Some(inputs) = inputs {
        for value in inputs {
            if to_vm.send(value).is_err() {
                break;
            }
        }
        return Ok(());
    }
    for line in stdin().lock().lines() {
        let line = line.map_err(CliError::IoError)?;
        for value in line_inputs(&line, ascii)? {
            if to_vm.send(value).is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn print_output(out: &mut impl Write, value: i64, ascii: bool) -> io::Result<()> {
    match value {
        c @ 0..128 if ascii => {
            write!(out, "{}", to_ascii_char!(c))?;
            if c == 10 { out.flush() } else { Ok(()) }
        }
        _ => {
            writeln!(out, "{value}")?;
            out.flush()
        }
    }
}

fn read_bin_file<F: Fn([u8; 8]) -> i64>(file: &Path, func: F) -> Result<Vec<i64>, Box<dyn Error>> {
    let input = fs::read(file)?;
    let (chunks, remainder) = input.as_chunks::<8>();
    if !remainder.is_empty() {
        return Err(Box::new(IncompleteI64(Box::from(remainder))));
    }
    Ok(chunks.iter().map(|c| func(*c)).collect())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let default_level = if args.trace { "trace" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let program: Program = match args.format {
        CodeFormat::Ascii => read_to_string(&args.source)?.parse()?,
        CodeFormat::LittleEndian => read_bin_file(&args.source, i64::from_le_bytes)?.into(),
        CodeFormat::BigEndian => read_bin_file(&args.source, i64::from_be_bytes)?.into(),
    };
    tracing::debug!(source = %args.source.display(), len = program.len(), "loaded program");

    let mut interp = program.interpreter_with_overrides(args.overrides)?;
    if args.trace {
        interp.on_instruction(|instr| tracing::trace!("{instr}"));
    }

    let mut options = TaskOptions::default().name("intcode");
    if let Some(secs) = args.timeout {
        options = options.io_timeout(Duration::from_secs(secs));
    }

    let (to_vm, vm_in) = rendezvous();
    let (vm_out, from_vm) = rendezvous();
    let task = interp.run_as_task_with(vm_in, vm_out, options)?;

    let ascii = args.ascii;
    let inputs = args.input;
    // not joined, as it may be blocked reading stdin after the program halts
    thread::Builder::new()
        .name(String::from("feeder"))
        .spawn(move || {
            if let Err(err) = feed(to_vm, inputs, ascii) {
                tracing::error!(%err, "stopped feeding input");
            }
        })?;

    let mut out = stdout().lock();
    for value in from_vm.iter() {
        print_output(&mut out, value, ascii)?;
    }
    out.flush()?;

    let interp = task.join()?;
    if args.result {
        writeln!(out, "{}", interp.result())?;
    }
    Ok(())
}

#[derive(Debug)]
struct IncompleteI64(Box<[u8]>);

impl Display for IncompleteI64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected 8 bytes, got {}: {:02x?}", self.0.len(), self.0)
    }
}
impl Error for IncompleteI64 {}

#[derive(Debug)]
enum CliError {
    IoError(io::Error),
    InvalidAsciiChar(char),
    InvalidInput(String),
}

impl Error for CliError {}
impl Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::IoError(e) => write!(f, "an I/O error occured: {e}"),
            CliError::InvalidAsciiChar(c) => write!(f, "{c:?} is not a valid ASCII character"),
            CliError::InvalidInput(e) => write!(f, "invalid input: {e}"),
        }
    }
}
