use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "msuite",
    about = "MaterialSuite storage: content plus PREMIS metadata, ingested with fixity checks",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Service configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output; repeat for trace level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP endpoint
    Serve(ServeArgs),
    /// Ingest a content file with its PREMIS record
    Ingest(IngestArgs),
    /// List stored suite identifiers
    List(ListArgs),
    /// Show a suite's PREMIS record
    Show(ShowArgs),
    /// Write a suite's content to a file or stdout
    Cat(CatArgs),
    /// Replace the PREMIS record of an existing suite
    Amend(AmendArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<std::net::SocketAddr>,
}

#[derive(Args)]
pub struct IngestArgs {
    pub content: PathBuf,
    pub premis: PathBuf,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, default_value = "0")]
    pub offset: usize,
    #[arg(short = 'n', long, default_value = "1000")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ShowArgs {
    pub identifier: String,
    /// Print the structural JSON form instead of XML
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CatArgs {
    pub identifier: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct AmendArgs {
    pub identifier: String,
    pub premis: PathBuf,
}
