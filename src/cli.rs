//! CLI argument definitions using clap derive macros.
//!
//! Options that may also come from the config file are `Option`s so that an
//! absent flag falls through to the file value.

use std::path::PathBuf;

use bundler_core::naming::{Casing, NamingScheme};
use clap::Parser;

/// Bundle every attachment of one record into a single ZIP archive.
///
/// Images are converted to one-page PDFs, files are named after their column
/// and the record's identity value, and the archive lands in the output
/// directory.
#[derive(Parser, Debug)]
#[command(name = "attachment-bundler")]
#[command(author, version, about)]
pub struct Args {
    /// Row id of the record to bundle
    #[arg(long)]
    pub row: i64,

    /// Attachment column, repeatable or comma-separated, in archive order
    #[arg(short = 'a', long = "column", value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Column whose value names the archive
    #[arg(short = 'n', long)]
    pub name_column: Option<String>,

    /// Server URL (e.g. https://docs.getgrist.com)
    #[arg(long, env = "GRIST_SERVER")]
    pub server: Option<String>,

    /// Document id
    #[arg(long, env = "GRIST_DOC_ID")]
    pub doc: Option<String>,

    /// Table id holding the record
    #[arg(long)]
    pub table: Option<String>,

    /// API key used for the record request and, without a token, for downloads
    #[arg(long, env = "GRIST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Short-lived attachment access token appended to download URLs
    #[arg(long, env = "GRIST_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Directory receiving the archive (default: current directory)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Keep images as-is instead of converting them to PDF
    #[arg(long)]
    pub no_convert: bool,

    /// Extension for files of unknown type
    #[arg(long)]
    pub default_extension: Option<String>,

    /// Separator between name parts
    #[arg(long)]
    pub separator: Option<String>,

    /// Case applied to name parts (preserve, lower, upper)
    #[arg(long)]
    pub casing: Option<Casing>,

    /// Entry naming scheme (templated, original)
    #[arg(long)]
    pub naming_scheme: Option<NamingScheme>,

    /// Attachments fetched ahead of the one being archived (1-16)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Attempts per attachment for transient failures (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: Option<u8>,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Whole-request timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Config file (default: $XDG_CONFIG_HOME/attachment-bundler/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_minimal_args_parse_successfully() {
        let args = Args::try_parse_from(["attachment-bundler", "--row", "7"]).unwrap();
        assert_eq!(args.row, 7);
        assert!(args.columns.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.no_convert);
        assert!(args.concurrency.is_none());
    }

    #[test]
    fn test_cli_row_is_required() {
        let err = Args::try_parse_from(["attachment-bundler"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_columns_repeat_and_split() {
        let args = Args::try_parse_from([
            "attachment-bundler",
            "--row",
            "1",
            "-a",
            "Contrat,Photos",
            "--column",
            "Factures",
        ])
        .unwrap();
        assert_eq!(args.columns, vec!["Contrat", "Photos", "Factures"]);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["attachment-bundler", "--row", "1", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["attachment-bundler", "--row", "1", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_naming_options_parse() {
        let args = Args::try_parse_from([
            "attachment-bundler",
            "--row",
            "1",
            "--casing",
            "upper",
            "--naming-scheme",
            "original",
            "--separator",
            "-",
        ])
        .unwrap();
        assert_eq!(args.casing, Some(Casing::Upper));
        assert_eq!(args.naming_scheme, Some(NamingScheme::Original));
        assert_eq!(args.separator.as_deref(), Some("-"));
    }

    #[test]
    fn test_cli_unknown_casing_rejected() {
        let err = Args::try_parse_from(["attachment-bundler", "--row", "1", "--casing", "title"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["attachment-bundler", "--row", "1", "-c", "16"]).unwrap();
        assert_eq!(args.concurrency, Some(16));

        for value in ["0", "17"] {
            let err = Args::try_parse_from(["attachment-bundler", "--row", "1", "-c", value])
                .unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_max_attempts_bounds() {
        let args = Args::try_parse_from(["attachment-bundler", "--row", "1", "-r", "3"]).unwrap();
        assert_eq!(args.max_attempts, Some(3));

        let err = Args::try_parse_from(["attachment-bundler", "--row", "1", "-r", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_timeout_zero_rejected() {
        let err = Args::try_parse_from(["attachment-bundler", "--row", "1", "--read-timeout", "0"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["attachment-bundler", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["attachment-bundler", "--row", "1", "--invalid-flag"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
