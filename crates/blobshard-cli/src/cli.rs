use std::path::PathBuf;

use blobshard_store::Digest;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blobshard",
    about = "Sharded content-addressed blob store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Root directory of the store
    #[arg(long, global = true, env = "BLOBSHARD_DATADIR")]
    pub data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, env = "BLOBSHARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Reject inputs larger than this many bytes
    #[arg(long, global = true)]
    pub max_blob_size: Option<u64>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a file (or stdin) and print its digest
    Put(PutArgs),
    /// Write a stored blob to stdout or a file
    Get(GetArgs),
    /// Print the shard path of a digest
    Path(DigestArgs),
    /// Check whether a blob is stored
    Exists(DigestArgs),
    /// Re-hash stored blobs and report corruption
    Verify(VerifyArgs),
    /// Print the digest of a file (or stdin) without storing it
    Hash(HashArgs),
}

#[derive(Args)]
pub struct PutArgs {
    /// Input file; reads stdin when omitted
    pub path: Option<PathBuf>,
    /// Fail if the blob is already stored instead of overwriting it
    #[arg(short = 'x', long)]
    pub exclusive: bool,
}

#[derive(Args)]
pub struct GetArgs {
    pub digest: Digest,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DigestArgs {
    pub digest: Digest,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Digests to check; checks every stored blob when omitted
    pub digests: Vec<Digest>,
}

#[derive(Args)]
pub struct HashArgs {
    pub path: Option<PathBuf>,
}
