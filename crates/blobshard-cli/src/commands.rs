use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use blobshard_store::{ContentHasher, Digest, FsBlobStore, StoreError};
use colored::Colorize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cli::*;
use crate::config::CliConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = CliConfig::resolve(cli.config.as_deref(), cli.data_dir, cli.max_blob_size)?;
    debug!(?config, "resolved configuration");
    let format = cli.format;
    match cli.command {
        Command::Put(args) => cmd_put(&config, args, &format),
        Command::Get(args) => cmd_get(&config, args),
        Command::Path(args) => cmd_path(&config, args, &format),
        Command::Exists(args) => cmd_exists(&config, args, &format),
        Command::Verify(args) => cmd_verify(&config, args, &format),
        Command::Hash(args) => cmd_hash(&config, args, &format),
    }
}

fn open_store(config: &CliConfig) -> anyhow::Result<FsBlobStore> {
    let root = config.data_dir()?;
    FsBlobStore::open(root).with_context(|| format!("cannot open store at {}", root.display()))
}

fn open_input(path: Option<&Path>, max: u64) -> anyhow::Result<SizeLimit<Box<dyn Read>>> {
    let inner: Box<dyn Read> = match path {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("cannot open {}", p.display()))?;
            Box::new(file)
        }
        None => Box::new(io::stdin().lock()),
    };
    debug!(input = ?path, max, "reading input");
    Ok(SizeLimit::new(inner, max))
}

/// JSON form of a filesystem path. Paths need not be UTF-8, so invalid
/// sequences are replaced rather than failing the command.
fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn cmd_put(
    config: &CliConfig,
    args: PutArgs,
    format: &OutputFormat,
) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let input = open_input(args.path.as_deref(), config.max_blob_size)?;
    let result = if args.exclusive {
        store.create(input)
    } else {
        store.insert(input)
    };

    let digest = match result {
        Ok(digest) => digest,
        Err(StoreError::AlreadyExists(digest)) => {
            info!(%digest, "blob already stored");
            match format {
                OutputFormat::Json => println!("{}", json!({ "digest": digest, "stored": false })),
                OutputFormat::Text => eprintln!(
                    "{} {} already stored",
                    "✗".red().bold(),
                    digest.to_hex().yellow()
                ),
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    info!(%digest, exclusive = args.exclusive, "stored blob");
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "digest": digest,
                "path": path_value(&store.blob_path(&digest)),
                "stored": true,
            })
        ),
        OutputFormat::Text => println!("{digest}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_get(config: &CliConfig, args: GetArgs) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let mut blob = match store.get(&args.digest) {
        Ok(blob) => blob,
        Err(StoreError::NotFound(digest)) => {
            eprintln!("{} {} not found", "✗".red().bold(), digest.to_hex().yellow());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    match &args.output {
        Some(path) => {
            let mut out = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            let written = io::copy(&mut blob, &mut out)?;
            out.sync_all()?;
            debug!(digest = %args.digest, written, output = %path.display(), "wrote blob");
        }
        None => {
            let mut out = io::stdout().lock();
            io::copy(&mut blob, &mut out)?;
            out.flush()?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_path(
    config: &CliConfig,
    args: DigestArgs,
    format: &OutputFormat,
) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let path = store.blob_path(&args.digest);
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "digest": args.digest, "path": path_value(&path) })
        ),
        OutputFormat::Text => println!("{}", path.display()),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_exists(
    config: &CliConfig,
    args: DigestArgs,
    format: &OutputFormat,
) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let exists = store.exists(&args.digest)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "digest": args.digest, "exists": exists })
        ),
        OutputFormat::Text if exists => println!("{} {}", "✓".green(), args.digest),
        OutputFormat::Text => println!("{} {}", "✗".red(), args.digest),
    }
    Ok(if exists { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_verify(
    config: &CliConfig,
    args: VerifyArgs,
    format: &OutputFormat,
) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let digests: Vec<Digest> = if args.digests.is_empty() {
        store.digests().collect::<Result<_, _>>()?
    } else {
        args.digests
    };

    debug!(count = digests.len(), "verifying blobs");

    let mut report = VerifyReport::default();
    for digest in &digests {
        match store.verify(digest) {
            Ok(()) => report.ok += 1,
            Err(StoreError::HashMismatch { computed, .. }) => {
                if let OutputFormat::Text = format {
                    println!(
                        "{} {} (content hashes to {})",
                        "corrupt".red().bold(),
                        digest,
                        computed.short_hex()
                    );
                }
                report.corrupt.push(*digest);
            }
            Err(StoreError::NotFound(_)) => {
                if let OutputFormat::Text = format {
                    println!("{} {}", "missing".yellow().bold(), digest);
                }
                report.missing.push(*digest);
            }
            Err(e) => return Err(e.into()),
        }
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "ok": report.ok, "corrupt": report.corrupt, "missing": report.missing })
        ),
        OutputFormat::Text if report.is_clean() => {
            println!("{} {} blobs verified", "✓".green().bold(), report.ok)
        }
        OutputFormat::Text => println!(
            "{} {} ok, {} corrupt, {} missing",
            "✗".red().bold(),
            report.ok,
            report.corrupt.len(),
            report.missing.len()
        ),
    }
    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_hash(
    config: &CliConfig,
    args: HashArgs,
    format: &OutputFormat,
) -> anyhow::Result<ExitCode> {
    let input = open_input(args.path.as_deref(), config.max_blob_size)?;
    let digest = ContentHasher::hash_reader(input)?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "digest": digest })),
        OutputFormat::Text => println!("{digest}"),
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Default)]
struct VerifyReport {
    ok: usize,
    corrupt: Vec<Digest>,
    missing: Vec<Digest>,
}

impl VerifyReport {
    fn is_clean(&self) -> bool {
        self.corrupt.is_empty() && self.missing.is_empty()
    }
}

/// Reader that fails once more than `max` bytes have been read.
///
/// Failing (rather than truncating like `Read::take`) aborts the store's
/// write, so an oversized input is never stored in part.
struct SizeLimit<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> SizeLimit<R> {
    fn new(inner: R, max: u64) -> Self {
        Self { inner, remaining: max }
    }
}

impl<R: Read> Read for SizeLimit<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Allow one byte past the limit so an input of exactly `max` bytes
        // can reach EOF.
        let window = usize::try_from(self.remaining.saturating_add(1)).unwrap_or(usize::MAX);
        let len = buf.len().min(window);
        let n = self.inner.read(&mut buf[..len])?;
        if n as u64 > self.remaining {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "input exceeds max_blob_size",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
