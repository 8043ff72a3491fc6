use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer column types in tabular files and cast every value",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect the type of every column and print a summary table
    Detect(DetectArgs),
    /// Detect and cast every column, writing the processed book as JSON or YAML
    Cast(CastArgs),
    /// List candidate geographic areas for each row of a geo column
    Geodata(GeodataArgs),
}

/// Options shared by every command that reads a file.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Treat the first row as data instead of column titles
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Geographic area catalog (YAML or JSON list of areas)
    #[arg(long = "geo")]
    pub geo: Option<PathBuf>,
    /// Sampling configuration file (YAML)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Seed for reproducible sampling
    #[arg(long)]
    pub seed: Option<u64>,
    /// Confidence level in percent (80, 85, 90, 95 or 99)
    #[arg(long)]
    pub confidence: Option<u32>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct CastArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output file; `.yml`/`.yaml` writes YAML, anything else JSON (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct GeodataArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Title of the column to resolve
    #[arg(short = 'f', long = "field")]
    pub field: String,
    /// Output file; `.yml`/`.yaml` writes YAML, anything else JSON (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiters_accept_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn shared_input_flags_parse_on_every_command() {
        let cli = Cli::try_parse_from([
            "tabular-cast",
            "geodata",
            "-i",
            "data.csv",
            "--geo",
            "areas.yml",
            "--field",
            "district",
            "--seed",
            "7",
            "--no-header",
        ])
        .expect("parse");
        match cli.command {
            Commands::Geodata(args) => {
                assert_eq!(args.field, "district");
                assert_eq!(args.input.seed, Some(7));
                assert!(args.input.no_header);
                assert_eq!(args.input.geo, Some(PathBuf::from("areas.yml")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
