//! Naming policy for archive entries and the archive itself.
//!
//! Raw column names and identity values come straight from user data, so every
//! segment goes through [`sanitize`] before it reaches a filename. Entry names
//! follow a small template:
//!
//! - single file in the cell: `Column_Identity.ext`
//! - several files in the cell: `Column_Identity_2.ext` (1-based position)
//!
//! An absent or empty identity is left out of entry names (`Column.ext`).
//! Only the archive itself falls back to [`DEFAULT_ARCHIVE_FALLBACK`].
//!
//! [`UniqueNames`] guarantees uniqueness inside one archive even when two
//! column names sanitize to the same segment.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Archive base name used when the identity value is absent or sanitizes to nothing.
pub const DEFAULT_ARCHIVE_FALLBACK: &str = "attachments";

/// Separator placed between filename parts by default.
pub const DEFAULT_SEPARATOR: &str = "_";

/// Stem used when neither the column name nor the identity yields a usable segment.
const FALLBACK_STEM: &str = "fichier";

/// Maximum accepted extension length (characters, without the dot).
const MAX_EXTENSION_LEN: usize = 12;

/// Letter casing applied to filename segments before sanitization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Casing {
    /// Keep the casing of the source text.
    #[default]
    Preserve,
    /// Lowercase every segment.
    Lower,
    /// Uppercase every segment.
    Upper,
}

impl Casing {
    /// Returns the stable label used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    fn apply(self, value: &str) -> String {
        match self {
            Self::Preserve => value.to_string(),
            Self::Lower => value.to_lowercase(),
            Self::Upper => value.to_uppercase(),
        }
    }
}

impl FromStr for Casing {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "lower" => Ok(Self::Lower),
            "upper" => Ok(Self::Upper),
            other => Err(format!(
                "unknown casing '{other}' (expected preserve, lower or upper)"
            )),
        }
    }
}

impl fmt::Display for Casing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How entry names are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingScheme {
    /// `Column_Identity[_n].ext` for every entry.
    #[default]
    Templated,
    /// Keep the filename announced by the server, falling back to the template
    /// when the server sent none.
    Original,
}

impl NamingScheme {
    /// Returns the stable label used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Templated => "templated",
            Self::Original => "original",
        }
    }
}

impl FromStr for NamingScheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "templated" => Ok(Self::Templated),
            "original" => Ok(Self::Original),
            other => Err(format!(
                "unknown naming scheme '{other}' (expected templated or original)"
            )),
        }
    }
}

/// Everything the policy needs to name one archive entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryName<'a> {
    /// Real column name the attachment came from.
    pub column_name: &'a str,
    /// Identity value of the record, if any.
    pub identity: Option<&'a str>,
    /// 0-based index of the column slot in the mapping.
    pub column_index: usize,
    /// 0-based position of the attachment inside its cell.
    pub position: usize,
    /// Whether the cell holds more than one attachment.
    pub cell_has_multiple: bool,
    /// Extension of the (possibly converted) bytes, without the dot.
    pub extension: &'a str,
    /// Filename announced by the server, used by [`NamingScheme::Original`].
    pub original_name: Option<&'a str>,
}

/// Configurable naming policy.
///
/// Defaults: `_` separator, casing preserved, templated scheme,
/// `attachments` as archive fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    separator: String,
    casing: Casing,
    scheme: NamingScheme,
    archive_fallback: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            casing: Casing::default(),
            scheme: NamingScheme::default(),
            archive_fallback: DEFAULT_ARCHIVE_FALLBACK.to_string(),
        }
    }
}

impl NamingPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the separator placed between filename parts (`_` or ` - ` are typical).
    ///
    /// Path separators and other unsafe characters are stripped; an empty
    /// result falls back to `_`.
    #[must_use]
    pub fn with_separator(mut self, separator: &str) -> Self {
        let cleaned: String = separator
            .chars()
            .filter(|c| matches!(c, '_' | '-' | ' '))
            .collect();
        self.separator = if cleaned.is_empty() {
            DEFAULT_SEPARATOR.to_string()
        } else {
            cleaned
        };
        self
    }

    /// Sets the casing applied to every segment.
    #[must_use]
    pub fn with_casing(mut self, casing: Casing) -> Self {
        self.casing = casing;
        self
    }

    /// Sets the naming scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: NamingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the archive base name used when the identity is unusable.
    #[must_use]
    pub fn with_archive_fallback(mut self, fallback: &str) -> Self {
        let cleaned = sanitize(fallback);
        self.archive_fallback = if cleaned.is_empty() {
            DEFAULT_ARCHIVE_FALLBACK.to_string()
        } else {
            cleaned
        };
        self
    }

    /// Returns the configured separator.
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Returns the configured casing.
    #[must_use]
    pub fn casing(&self) -> Casing {
        self.casing
    }

    /// Returns the configured scheme.
    #[must_use]
    pub fn scheme(&self) -> NamingScheme {
        self.scheme
    }

    /// Builds the entry name for one attachment.
    ///
    /// An identity that is absent or sanitizes to nothing is omitted rather
    /// than replaced by the archive fallback.
    #[must_use]
    pub fn entry_name(&self, entry: &EntryName<'_>) -> String {
        let extension = sanitize_extension(entry.extension).unwrap_or_else(|| "bin".to_string());

        if self.scheme == NamingScheme::Original
            && let Some(stem) = entry.original_name.map(|name| self.segment(file_stem(name)))
            && !stem.is_empty()
        {
            return format!("{stem}.{extension}");
        }

        let mut parts: Vec<String> = [Some(entry.column_name), entry.identity]
            .into_iter()
            .flatten()
            .map(|raw| self.segment(raw))
            .filter(|segment| !segment.is_empty())
            .collect();
        if parts.is_empty() {
            return format!(
                "{}{sep}{}{sep}{}.{extension}",
                self.segment(FALLBACK_STEM),
                entry.column_index + 1,
                entry.position + 1,
                sep = self.separator
            );
        }
        if entry.cell_has_multiple {
            parts.push((entry.position + 1).to_string());
        }

        format!("{}.{extension}", parts.join(&self.separator))
    }

    /// Builds the archive base name (without `.zip`) from the identity value.
    #[must_use]
    pub fn archive_name(&self, identity: Option<&str>) -> String {
        identity
            .map(|raw| self.segment(raw))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.archive_fallback.clone())
    }

    /// Builds the delivered archive filename, `{archive_name}.zip`.
    #[must_use]
    pub fn archive_file_name(&self, identity: Option<&str>) -> String {
        format!("{}.zip", self.archive_name(identity))
    }

    fn segment(&self, raw: &str) -> String {
        sanitize(&self.casing.apply(raw))
    }
}

/// Strips every character outside the allow-list (Unicode letters, digits, `-`).
///
/// Each run of rejected characters becomes a single separator: `-` when the
/// run is made of hyphens only, `_` otherwise. Separators never lead or trail.
/// The function is total and idempotent.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending: Option<char> = None;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            if let Some(separator) = pending.take()
                && !out.is_empty()
            {
                out.push(separator);
            }
            out.push(ch);
        } else {
            pending = Some(match (pending, ch) {
                (None | Some('-'), '-') => '-',
                _ => '_',
            });
        }
    }
    out
}

/// Builds an entry name with the default policy.
///
/// `Column_Identity_{position+1}.ext` when the cell has several files,
/// `Column_Identity.ext` otherwise. Without a usable identity the segment is
/// dropped (`Column.ext`); the fallback literal applies to the archive name
/// only, see [`build_archive_name`].
#[must_use]
pub fn build_filename(
    column_name: &str,
    identity: Option<&str>,
    position: usize,
    cell_has_multiple: bool,
    extension: &str,
) -> String {
    NamingPolicy::default().entry_name(&EntryName {
        column_name,
        identity,
        column_index: 0,
        position,
        cell_has_multiple,
        extension,
        original_name: None,
    })
}

/// Builds the archive base name with the default policy.
#[must_use]
pub fn build_archive_name(identity: Option<&str>) -> String {
    NamingPolicy::default().archive_name(identity)
}

/// Normalizes an extension to lowercase ASCII alphanumerics.
///
/// Returns `None` for empty or overly long results.
#[must_use]
pub fn sanitize_extension(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!cleaned.is_empty() && cleaned.len() <= MAX_EXTENSION_LEN).then_some(cleaned)
}

/// Returns the extension of a filename (text after the last dot), if any.
#[must_use]
pub fn extension_of(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    sanitize_extension(&name[dot + 1..])
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// Tracks names already placed in one archive.
///
/// A colliding name gets the separator and `2`, `3`, ... inserted before its
/// extension. Comparison ignores case so the archive extracts cleanly on
/// case-insensitive file systems.
#[derive(Debug)]
pub struct UniqueNames {
    taken: HashSet<String>,
    separator: String,
}

impl Default for UniqueNames {
    fn default() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }
}

impl UniqueNames {
    /// Creates an empty tracker using [`DEFAULT_SEPARATOR`] for suffixes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tracker joining suffixes with `separator`, normally
    /// [`NamingPolicy::separator`].
    #[must_use]
    pub fn with_separator(separator: &str) -> Self {
        Self {
            taken: HashSet::new(),
            separator: separator.to_string(),
        }
    }

    /// Reserves `name`, or the first free suffixed variant of it.
    pub fn claim(&mut self, name: String) -> String {
        if self.taken.insert(name.to_lowercase()) {
            return name;
        }

        let (stem, ext) = match name.rfind('.') {
            Some(pos) => (&name[..pos], &name[pos..]),
            None => (name.as_str(), ""),
        };
        let mut suffix: usize = 2;
        loop {
            let candidate = format!("{stem}{}{suffix}{ext}", self.separator);
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Number of names claimed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    /// Returns true when no name has been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}
