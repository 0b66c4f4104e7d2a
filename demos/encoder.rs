// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! CSV-driven encoder
//!
//! This program encodes retired instructions listed in a CSV file. Each line
//! holds the instruction's address in hex, its timestamp and its kind as a
//! number, e.g. `80000004,17,2`. Lines starting with `#` are ignored. The
//! trace is written to `tacit.out` unless another output file is specified.
//!
//! Optionally, parameters may be supplied in the form of a TOML file (such as
//! `params.toml` in this directory). The branch mode may also be overridden
//! via `--mode`. A human readable log of all packets and a list of all
//! records traced may be written via `--log` and `--debug-ingress`.
//!
//! With `--debug` (or `DEBUG` set), packets and predictions are logged to
//! stderr. Logging may be further configured via `RUST_LOG`.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::PathBuf;

use tacit_encoder::config::{self, BranchMode};
use tacit_encoder::encoder::{self, Encoder};
use tacit_encoder::ingress::{Ingress, Kind};
use tacit_encoder::predictor::BoxedTable;
use tacit_encoder::sink;

fn main() {
    let matches = clap::Command::new("TACIT encoder")
        .arg(
            clap::arg!(<input> "Path to the encoder input")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(-o --output <FILE> "Output file")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("tacit.out"),
        )
        .arg(
            clap::arg!(-p --params <FILE> "Trace encoder parameters")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(--mode <MODE> "Branch mode (0: target, 2: prediction)")
                .value_parser(clap::value_parser!(u8)),
        )
        .arg(
            clap::arg!(--log <FILE> "Write a human readable packet log")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(--"debug-ingress" <FILE> "Write all records traced")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(-d --debug "Enable additional debug output")
                .env("DEBUG")
                .action(clap::ArgAction::SetTrue)
                .value_parser(clap::builder::FalseyValueParser::new()),
        )
        .get_matches();

    let debug = matches.get_flag("debug");
    let level = if debug {
        "tacit_encoder=trace"
    } else {
        "tacit_encoder=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse().expect("Invalid log directive")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let input = matches
        .get_one::<PathBuf>("input")
        .expect("No input file specified");
    let input = File::open(input).expect("Could not open input file");
    let input = std::io::BufReader::new(input).lines();

    // We may want to emulate an encoder with certain parameters
    let mut params: config::Parameters = matches
        .get_one::<PathBuf>("params")
        .map(|p| {
            let params = std::fs::read_to_string(p).expect("Could not load parameters");
            toml::from_str(params.as_ref()).expect("Could not parse parameters")
        })
        .unwrap_or_default();
    if let Some(mode) = matches.get_one::<u8>("mode") {
        params.br_mode = BranchMode::try_from(*mode).expect("Invalid branch mode");
    }
    if debug {
        eprintln!("Parameters: {params:?}");
    }

    let output = matches
        .get_one::<PathBuf>("output")
        .expect("No output file specified");
    if debug {
        eprintln!("Opening output file: {}", output.display());
    }
    let mut output = BufWriter::new(File::create(output).expect("Could not create output file"));

    let mut encoder: Encoder<_, BoxedTable> = encoder::builder()
        .with_params(&params)
        .with_sink(sink::from_fn(|data: &[u8]| output.write_all(data)))
        .build()
        .expect("Could not set up encoder");

    let mut mirrors = Mirrors {
        log: create_mirror(matches.get_one::<PathBuf>("log")),
        ingress: create_mirror(matches.get_one::<PathBuf>("debug-ingress")),
    };

    encoder.set_enabled(true);
    let mut last = None;
    input
        .map(|l| l.expect("Could not read line"))
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .map(|l| l.parse::<CSVLine>().expect("Could not parse line"))
        .for_each(|CSVLine(ingress)| {
            push(&mut encoder, &mut mirrors, ingress);
            last = Some(ingress);
        });

    // Drain the pipeline, then close the segment
    if let Some(ingress) = last {
        let ingress = Ingress::new(ingress.address, ingress.timestamp, Kind::None);
        push(&mut encoder, &mut mirrors, ingress);
        encoder.set_enabled(false);
        push(&mut encoder, &mut mirrors, ingress);
    }

    if debug {
        eprintln!("Pending hits dropped: {}", encoder.pending_hits());
    }
    drop(encoder);
    output.flush().expect("Could not flush output");
}

/// Human readable mirrors of the trace
struct Mirrors {
    /// Log of all packets generated
    log: Option<BufWriter<File>>,
    /// List of all records pushed while tracing was enabled
    ingress: Option<BufWriter<File>>,
}

/// Push a single record to the encoder, updating the mirrors
fn push<S>(encoder: &mut Encoder<S, BoxedTable>, mirrors: &mut Mirrors, ingress: Ingress)
where
    S: sink::Sink,
    S::Error: std::fmt::Debug,
{
    if encoder.is_enabled() {
        if let Some(mirror) = mirrors.ingress.as_mut() {
            writeln!(mirror, "{:x}, {}", ingress.address, u8::from(ingress.kind))
                .expect("Could not write ingress mirror");
        }
    }
    let packet = encoder
        .push_ingress(ingress)
        .expect("Could not encode record");
    if let (Some(packet), Some(mirror)) = (packet, mirrors.log.as_mut()) {
        writeln!(mirror, "{packet}").expect("Could not write packet log");
    }
}

/// Create a buffered file for a mirror of the trace, if requested
fn create_mirror(path: Option<&PathBuf>) -> Option<BufWriter<File>> {
    path.map(|p| BufWriter::new(File::create(p).expect("Could not create file")))
}

/// A single line of the encoder input
#[derive(Copy, Clone, Debug)]
struct CSVLine(Ingress);

impl std::str::FromStr for CSVLine {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.trim_end().split(',').map(str::trim);

        let address = fields
            .next()
            .map(|f| f.trim_start_matches("0x"))
            .and_then(|f| u64::from_str_radix(f, 16).ok())
            .ok_or(line)?;

        let timestamp = fields
            .next()
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or(line)?;

        let kind = fields
            .next()
            .and_then(|f| f.parse::<u8>().ok())
            .and_then(|f| Kind::try_from(f).ok())
            .ok_or(line)?;

        if fields.next().is_some() {
            return Err(line.into());
        }

        Ok(Self(Ingress::new(address, timestamp, kind)))
    }
}
