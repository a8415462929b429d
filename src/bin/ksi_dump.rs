//! Print the TLV structure of a KSI file (signature, publications file, PDU...).
//!
//! Usage:
//!   ksi_dump [OPTIONS] [FILE ...]
//!   ksi_dump < file.ksig
//!
//! Options:
//!   --max-depth N, -d N   Expand nested payloads at most N levels deep (default 64)
//!   --flat                Do not try to expand raw payloads
//!
//! Set `RUST_LOG=ksitlv=trace` to see each TLV as it is read.
//! Exit status is 1 if any input is malformed or unreadable.

use ksitlv::context::Config;
use ksitlv::dump::{dump_tlv, dump_tlv_expanded};
use ksitlv::reader::TlvReader;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

struct Options {
    max_depth: usize,
    expand: bool,
}

/// Dump every top-level TLV in `input`. Returns false on the first malformed TLV.
fn dump_stream<R: Read>(name: &str, input: R, opts: &Options, out: &mut impl Write) -> io::Result<bool> {
    let config = Config::default();
    let mut count = 0usize;
    for item in TlvReader::with_config(input, &config) {
        match item {
            Ok(tlv) => {
                let text = if opts.expand { dump_tlv_expanded(&tlv, opts.max_depth) } else { dump_tlv(&tlv) };
                out.write_all(text.as_bytes())?;
                count += 1;
            }
            Err(e) => {
                out.flush()?;
                eprintln!("{}: {}", name, e);
                return Ok(false);
            }
        }
    }
    tracing::debug!(input = name, count, "done");
    Ok(true)
}

fn parse_depth(value: Option<String>) -> anyhow::Result<usize> {
    let value = value.ok_or_else(|| anyhow::anyhow!("--max-depth needs a value"))?;
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid --max-depth {:?}: {}", value, e))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut opts = Options { max_depth: Config::default().max_depth, expand: true };
    let mut files = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--max-depth" | "-d" => opts.max_depth = parse_depth(args.next())?,
            "--flat" => opts.expand = false,
            _ => files.push(arg),
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut ok = true;

    if files.is_empty() {
        ok = dump_stream("<stdin>", io::stdin().lock(), &opts, &mut out)?;
    } else {
        for path in &files {
            let path = Path::new(path);
            let file = match std::fs::File::open(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    ok = false;
                    continue;
                }
            };
            if files.len() > 1 {
                writeln!(out, "# {}", path.display())?;
            }
            let display = path.display().to_string();
            if !dump_stream(&display, io::BufReader::new(file), &opts, &mut out)? {
                ok = false;
            }
        }
    }

    out.flush()?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
