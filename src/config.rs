//! Configuration file loading for CLI defaults.
//!
//! The file uses a flat `key = value` subset of TOML:
//!
//! ```toml
//! server = "https://docs.getgrist.com"
//! doc_id = "abc123"
//! table = "Dossiers"
//! attachment_columns = ["Contrat", "Photos"]
//! identity_column = "Nom"
//! concurrency = 4 # read-ahead
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use bundler_core::naming::{Casing, NamingScheme, sanitize_extension};

/// Application directory under the config base.
const APP_DIR: &str = "attachment-bundler";

/// Values read from the configuration file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Host server URL.
    pub server: Option<String>,
    /// Document id.
    pub doc_id: Option<String>,
    /// Table id holding the records.
    pub table: Option<String>,
    /// Directory receiving archives.
    pub output_dir: Option<PathBuf>,
    /// Attachment columns, in archive order.
    pub attachment_columns: Option<Vec<String>>,
    /// Column naming the archive.
    pub identity_column: Option<String>,
    /// Convert raster images to PDF.
    pub convert_images: Option<bool>,
    /// Extension for unknown pass-through files.
    pub default_extension: Option<String>,
    /// Separator between name parts.
    pub separator: Option<String>,
    /// Case applied to name parts.
    pub casing: Option<Casing>,
    /// Entry naming scheme.
    pub naming_scheme: Option<NamingScheme>,
    /// Fetch read-ahead (1..=16).
    pub concurrency: Option<usize>,
    /// Attempts per attachment (1..=10).
    pub max_attempts: Option<u32>,
    /// Connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Overall request timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
    /// Default verbosity.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates value ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=16).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=16");
        }
        if let Some(max_attempts) = self.max_attempts
            && !(1..=10).contains(&max_attempts)
        {
            bail!("Invalid config value for `max_attempts`: {max_attempts}. Expected range: 1..=10");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(columns) = &self.attachment_columns
            && columns.iter().any(|column| column.trim().is_empty())
        {
            bail!("Invalid config value for `attachment_columns`: empty column name");
        }
        if let Some(extension) = &self.default_extension
            && sanitize_extension(extension).is_none()
        {
            bail!("Invalid config value for `default_extension`: '{extension}'");
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/attachment-bundler/config.toml`
/// 2. `$HOME/.config/attachment-bundler/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from an explicit path, or the default path if present.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = read_config_file(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(read_config_file(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub(crate) fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "server" => cfg.server = Some(parse_string_literal(value).with_context(invalid)?),
            "doc_id" => cfg.doc_id = Some(parse_string_literal(value).with_context(invalid)?),
            "table" => cfg.table = Some(parse_string_literal(value).with_context(invalid)?),
            "output_dir" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "attachment_columns" => {
                cfg.attachment_columns = Some(parse_string_list(value).with_context(invalid)?);
            }
            "identity_column" => {
                cfg.identity_column = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "convert_images" => cfg.convert_images = Some(parse_boolean(value).with_context(invalid)?),
            "default_extension" => {
                cfg.default_extension = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "separator" => cfg.separator = Some(parse_string_literal(value).with_context(invalid)?),
            "casing" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.casing = Some(parsed.parse().map_err(|e: String| anyhow!(e)).with_context(invalid)?);
            }
            "naming_scheme" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.naming_scheme =
                    Some(parsed.parse().map_err(|e: String| anyhow!(e)).with_context(invalid)?);
            }
            "concurrency" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.concurrency = Some(usize::try_from(parsed).with_context(invalid)?);
            }
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.max_attempts = Some(u32::try_from(parsed).with_context(invalid)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    let raw_value = raw_value.trim();
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

/// Parses `["a", "b"]`. Commas inside quotes belong to the item.
fn parse_string_list(raw_value: &str) -> Result<Vec<String>> {
    let inner = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| anyhow!("Expected a list like [\"A\", \"B\"]"))?;

    let mut items = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (index, ch) in inner.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ',' if !in_string => {
                items.push(&inner[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);

    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_string_literal)
        .collect()
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_full_example() {
        let cfg = parse_config_str(
            r#"
server = "https://docs.example.com"
doc_id = "abc123"
table = "Dossiers"
output_dir = "/tmp/zips"
attachment_columns = ["Contrat", "Photos, recto"] # archive order
identity_column = "Nom"
convert_images = false
default_extension = "dat"
separator = "-"
casing = "lower"
naming_scheme = "original"
concurrency = 4
max_attempts = 3
connect_timeout_secs = 10
read_timeout_secs = 60
verbosity = "verbose"
"#,
        )
        .expect("full config should parse");

        assert_eq!(cfg.server.as_deref(), Some("https://docs.example.com"));
        assert_eq!(cfg.table.as_deref(), Some("Dossiers"));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/tmp/zips")));
        assert_eq!(
            cfg.attachment_columns,
            Some(vec!["Contrat".to_string(), "Photos, recto".to_string()])
        );
        assert_eq!(cfg.convert_images, Some(false));
        assert_eq!(cfg.casing, Some(Casing::Lower));
        assert_eq!(cfg.naming_scheme, Some(NamingScheme::Original));
        assert_eq!(cfg.concurrency, Some(4));
        assert_eq!(cfg.max_attempts, Some(3));
        assert_eq!(cfg.read_timeout_secs, Some(60));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str("concurrency = 2\n").expect("partial config should parse");
        assert_eq!(cfg.concurrency, Some(2));
        assert!(cfg.server.is_none());
        assert!(cfg.attachment_columns.is_none());
    }

    #[test]
    fn test_parse_config_rejects_invalid_concurrency() {
        let err = parse_config_str("concurrency = 17").expect_err("invalid concurrency expected");
        assert!(
            err.to_string().contains("concurrency"),
            "Expected concurrency validation error in: {err}"
        );
    }

    #[test]
    fn test_parse_config_rejects_invalid_max_attempts() {
        let err = parse_config_str("max_attempts = 0").expect_err("invalid max_attempts expected");
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("read_timeout_secs = 0").expect_err("invalid timeout expected");
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_bad_list() {
        let err = parse_config_str("attachment_columns = \"Contrat\"")
            .expect_err("list expected");
        assert!(err.to_string().contains("attachment_columns"));

        let err = parse_config_str("attachment_columns = [\"A\", B]").expect_err("quotes expected");
        assert!(err.to_string().contains("attachment_columns"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_casing() {
        let err = parse_config_str("casing = \"title\"").expect_err("unknown casing expected");
        assert!(format!("{err:#}").contains("casing"), "Expected casing in: {err:#}");
    }

    #[test]
    fn test_parse_config_rejects_bad_default_extension() {
        let err = parse_config_str("default_extension = \"..\"").expect_err("bad extension");
        assert!(err.to_string().contains("default_extension"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("rate_limit = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("rate_limit"));
    }

    #[test]
    fn test_parse_config_hash_inside_string_is_kept() {
        let cfg = parse_config_str("table = \"Table#1\" # comment").expect("should parse");
        assert_eq!(cfg.table.as_deref(), Some("Table#1"));
    }

    #[test]
    fn test_load_file_config_explicit_path() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "doc_id = \"xyz\"\n").expect("write config");

        let loaded = load_file_config(Some(&path)).expect("config should load");

        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(
            loaded.config.and_then(|cfg| cfg.doc_id).as_deref(),
            Some("xyz")
        );
    }

    #[test]
    fn test_verbosity_log_levels() {
        assert_eq!(VerbositySetting::Default.log_level(), "info");
        assert_eq!(VerbositySetting::Verbose.log_level(), "debug");
        assert_eq!(VerbositySetting::Quiet.log_level(), "error");
        assert_eq!(VerbositySetting::Debug.log_level(), "trace");
    }
}
