//! Effective run settings: CLI flags over config file values over defaults.

use std::path::PathBuf;

use anyhow::{Result, bail};
use bundler_core::bundle::DEFAULT_CONCURRENCY;
use bundler_core::fetch::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, READ_TIMEOUT_SECS};
use bundler_core::host::WidgetBindings;
use bundler_core::naming::{DEFAULT_SEPARATOR, NamingPolicy};
use bundler_core::normalize::NormalizePolicy;

use crate::cli::Args;
use crate::config::{FileConfig, VerbositySetting};

/// Everything `main` needs, fully resolved.
///
/// No `Debug`: the struct holds the API key.
#[derive(Clone)]
pub(crate) struct Settings {
    pub(crate) server: String,
    pub(crate) doc_id: String,
    pub(crate) table: String,
    pub(crate) row: i64,
    pub(crate) api_key: String,
    pub(crate) access_token: Option<String>,
    pub(crate) bindings: WidgetBindings,
    pub(crate) output_dir: PathBuf,
    pub(crate) naming: NamingPolicy,
    pub(crate) normalize: NormalizePolicy,
    pub(crate) concurrency: usize,
    pub(crate) max_attempts: u32,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) read_timeout_secs: u64,
}

impl Settings {
    /// Merges CLI arguments with the optional file config.
    ///
    /// # Errors
    ///
    /// Fails when a required value (server, document, table, API key,
    /// attachment columns) is missing from both sources.
    pub(crate) fn resolve(args: &Args, file: Option<&FileConfig>) -> Result<Self> {
        let empty = FileConfig::default();
        let file = file.unwrap_or(&empty);

        let Some(server) = args.server.clone().or_else(|| file.server.clone()) else {
            bail!("No server configured. Pass --server, set GRIST_SERVER or `server` in the config file");
        };
        let Some(doc_id) = args.doc.clone().or_else(|| file.doc_id.clone()) else {
            bail!("No document configured. Pass --doc, set GRIST_DOC_ID or `doc_id` in the config file");
        };
        let Some(table) = args.table.clone().or_else(|| file.table.clone()) else {
            bail!("No table configured. Pass --table or set `table` in the config file");
        };
        let Some(api_key) = args.api_key.clone().filter(|key| !key.is_empty()) else {
            bail!("No API key. Pass --api-key or set GRIST_API_KEY");
        };

        let attachment_columns = if args.columns.is_empty() {
            file.attachment_columns.clone().unwrap_or_default()
        } else {
            args.columns.clone()
        };
        if attachment_columns.is_empty() {
            bail!("No attachment column configured. Pass --column or set `attachment_columns`");
        }
        let identity_column = args
            .name_column
            .clone()
            .or_else(|| file.identity_column.clone());

        let mut naming = NamingPolicy::new().with_separator(
            args.separator
                .as_deref()
                .or(file.separator.as_deref())
                .unwrap_or(DEFAULT_SEPARATOR),
        );
        if let Some(casing) = args.casing.or(file.casing) {
            naming = naming.with_casing(casing);
        }
        if let Some(scheme) = args.naming_scheme.or(file.naming_scheme) {
            naming = naming.with_scheme(scheme);
        }

        let convert_images = !args.no_convert && file.convert_images.unwrap_or(true);
        let mut normalize = NormalizePolicy::default().with_convert_images(convert_images);
        if let Some(extension) = args
            .default_extension
            .as_deref()
            .or(file.default_extension.as_deref())
        {
            normalize = normalize.with_default_extension(extension);
        }

        Ok(Self {
            server,
            doc_id,
            table,
            row: args.row,
            api_key,
            access_token: args.access_token.clone().filter(|token| !token.is_empty()),
            bindings: WidgetBindings::new(attachment_columns, identity_column),
            output_dir: args
                .output_dir
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            naming,
            normalize,
            concurrency: args
                .concurrency
                .map(usize::from)
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            max_attempts: args
                .max_attempts
                .map(u32::from)
                .or(file.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            connect_timeout_secs: args
                .connect_timeout
                .or(file.connect_timeout_secs)
                .unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: args
                .read_timeout
                .or(file.read_timeout_secs)
                .unwrap_or(READ_TIMEOUT_SECS),
        })
    }
}

/// Log filter used when `RUST_LOG` is unset.
///
/// Priority: `--quiet` > `-v` count > config `verbosity` > `info`.
pub(crate) fn resolve_default_log_level(args: &Args, file: Option<&FileConfig>) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file
            .and_then(|cfg| cfg.verbosity)
            .map_or("info", VerbositySetting::log_level),
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use bundler_core::naming::{Casing, NamingScheme};

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["attachment-bundler", "--row", "5"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn full_args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "--server",
            "https://docs.example.com",
            "--doc",
            "abc",
            "--table",
            "Dossiers",
            "--api-key",
            "key",
            "-a",
            "Contrat",
        ];
        argv.extend_from_slice(extra);
        args(&argv)
    }

    #[test]
    fn test_resolve_uses_defaults() {
        let settings = Settings::resolve(&full_args(&[]), None).unwrap();

        assert_eq!(settings.row, 5);
        assert_eq!(settings.bindings.attachment_columns, vec!["Contrat"]);
        assert!(settings.bindings.identity_column.is_none());
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(settings.read_timeout_secs, READ_TIMEOUT_SECS);
        assert!(settings.normalize.convert_images);
        assert_eq!(settings.naming.separator(), DEFAULT_SEPARATOR);
    }

    #[test]
    fn test_resolve_file_values_fill_gaps() {
        let file = FileConfig {
            server: Some("https://file.example.com".to_string()),
            doc_id: Some("fromfile".to_string()),
            table: Some("T".to_string()),
            attachment_columns: Some(vec!["A".to_string(), "B".to_string()]),
            identity_column: Some("Nom".to_string()),
            convert_images: Some(false),
            casing: Some(Casing::Lower),
            naming_scheme: Some(NamingScheme::Original),
            concurrency: Some(4),
            max_attempts: Some(3),
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(&args(&["--api-key", "k"]), Some(&file)).unwrap();

        assert_eq!(settings.server, "https://file.example.com");
        assert_eq!(settings.doc_id, "fromfile");
        assert_eq!(settings.bindings.attachment_columns, vec!["A", "B"]);
        assert_eq!(settings.bindings.identity_column.as_deref(), Some("Nom"));
        assert!(!settings.normalize.convert_images);
        assert_eq!(settings.naming.casing(), Casing::Lower);
        assert_eq!(settings.naming.scheme(), NamingScheme::Original);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_resolve_cli_overrides_file() {
        let file = FileConfig {
            table: Some("FromFile".to_string()),
            attachment_columns: Some(vec!["FileCol".to_string()]),
            concurrency: Some(4),
            casing: Some(Casing::Lower),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(
            &full_args(&["-c", "2", "--casing", "upper", "-n", "Client"]),
            Some(&file),
        )
        .unwrap();

        assert_eq!(settings.table, "Dossiers");
        assert_eq!(settings.bindings.attachment_columns, vec!["Contrat"]);
        assert_eq!(settings.bindings.identity_column.as_deref(), Some("Client"));
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.naming.casing(), Casing::Upper);
    }

    #[test]
    fn test_resolve_no_convert_wins_over_file() {
        let file = FileConfig {
            convert_images: Some(true),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(&full_args(&["--no-convert"]), Some(&file)).unwrap();
        assert!(!settings.normalize.convert_images);
    }

    #[test]
    fn test_resolve_missing_required_values_fail() {
        let Err(err) = Settings::resolve(&args(&[]), None) else {
            panic!("expected missing server error");
        };
        assert!(err.to_string().contains("server"), "unexpected: {err}");

        let Err(err) = Settings::resolve(
            &args(&[
                "--server",
                "https://x",
                "--doc",
                "d",
                "--table",
                "t",
                "--api-key",
                "k",
            ]),
            None,
        ) else {
            panic!("expected missing attachment column error");
        };
        assert!(err.to_string().contains("attachment column"), "unexpected: {err}");
    }

    #[test]
    fn test_default_log_level_priority() {
        let file = FileConfig {
            verbosity: Some(VerbositySetting::Debug),
            ..FileConfig::default()
        };
        assert_eq!(resolve_default_log_level(&args(&[]), None), "info");
        assert_eq!(resolve_default_log_level(&args(&[]), Some(&file)), "trace");
        assert_eq!(resolve_default_log_level(&args(&["-v"]), Some(&file)), "debug");
        assert_eq!(resolve_default_log_level(&args(&["-q", "-vv"]), Some(&file)), "error");
    }
}
