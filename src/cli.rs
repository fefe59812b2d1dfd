use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Jsonl,
    Csv,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Optional path to config file (YAML)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate and decode analysis exports into visit records
    Decode {
        /// Analysis export (.tsv); repeat to merge several exports
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Output directory for visit records and the run summary
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Export time (RFC 3339) recorded by the export's container; defaults
        /// to the time in a Takeout-style input file name
        #[arg(long)]
        export_time: Option<String>,

        /// Visit record format
        #[arg(long, value_enum, default_value_t = OutputFormat::Jsonl)]
        format: OutputFormat,
    },
    /// Encode visit records (JSONL) as an analysis export
    Encode {
        /// Visit records, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Analysis export to write
        #[arg(short, long)]
        output: PathBuf,

        /// Zone for the local time column (overrides config): UTC, local, or +HH:MM
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Extract visits from a Chrome History database
    Chrome {
        /// Chrome `History` SQLite file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for visit records and the run summary
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Visit record format
        #[arg(long, value_enum, default_value_t = OutputFormat::Jsonl)]
        format: OutputFormat,
    },
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
