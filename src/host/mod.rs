//! Host-side collaborators: records, widget bindings, access grants, delivery.
//!
//! The bundling pipeline never talks to a host directly. It receives a
//! [`ResolvedMapping`] built from a [`Record`] and [`WidgetBindings`], asks an
//! [`AccessProvider`] for an [`AccessGrant`] and hands the finished archive to
//! a [`Delivery`].

mod delivery;
mod error;
pub mod rest;

pub use delivery::{DirectoryDelivery, MemoryDelivery};
pub use error::{HostError, MappingError};
pub use rest::GristClient;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Marker opening a list-typed cell in the host's JSON encoding (`["L", 1, 2]`).
const LIST_MARKER: &str = "L";

/// Opaque attachment identifier issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(pub u64);

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of host data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Row id.
    pub id: i64,
    /// Cell values keyed by column id.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record from a row id and its cells.
    #[must_use]
    pub fn new(id: i64, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }
}

/// The two user-facing bindings the widget registers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetBindings {
    /// Ordered, multi-valued binding to the attachment columns.
    pub attachment_columns: Vec<String>,
    /// Single-valued binding to the column naming the archive.
    pub identity_column: Option<String>,
}

impl WidgetBindings {
    /// Creates bindings from attachment columns and an identity column.
    #[must_use]
    pub fn new(attachment_columns: Vec<String>, identity_column: Option<String>) -> Self {
        Self {
            attachment_columns,
            identity_column,
        }
    }
}

/// One resolved attachment-column slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSlot {
    /// Real column name.
    pub column_name: String,
    /// Attachments found in the record's cell, in cell order. May be empty.
    pub attachments: Vec<AttachmentId>,
}

impl ColumnSlot {
    /// Creates a slot.
    #[must_use]
    pub fn new(column_name: impl Into<String>, attachments: Vec<AttachmentId>) -> Self {
        Self {
            column_name: column_name.into(),
            attachments,
        }
    }
}

/// Fully resolved mapping for one record: ordered slots plus the identity value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMapping {
    /// Slots in configured order.
    pub slots: Vec<ColumnSlot>,
    /// Identity value, absent when the cell is empty.
    pub identity: Option<String>,
}

impl ResolvedMapping {
    /// Creates a mapping.
    #[must_use]
    pub fn new(slots: Vec<ColumnSlot>, identity: Option<String>) -> Self {
        Self { slots, identity }
    }

    /// Total number of attachments across all slots.
    #[must_use]
    pub fn total_attachments(&self) -> usize {
        self.slots.iter().map(|slot| slot.attachments.len()).sum()
    }
}

/// Resolves the bindings against one record.
///
/// Every attachment column and the identity column must be bound and present
/// in the record. Missing attachment cells are not an error once the column
/// exists: a `null` cell simply yields an empty slot.
///
/// # Errors
///
/// Returns [`MappingError`] when a binding is missing or names a column the
/// record does not have.
pub fn resolve_mapping(
    record: &Record,
    bindings: &WidgetBindings,
) -> Result<ResolvedMapping, MappingError> {
    if bindings.attachment_columns.is_empty() {
        return Err(MappingError::NoAttachmentColumns);
    }
    let identity_column = bindings
        .identity_column
        .as_deref()
        .filter(|column| !column.trim().is_empty())
        .ok_or(MappingError::IdentityUnbound)?;

    let mut slots = Vec::with_capacity(bindings.attachment_columns.len());
    for column in &bindings.attachment_columns {
        let cell = record
            .fields
            .get(column)
            .ok_or_else(|| MappingError::unknown_column(column))?;
        slots.push(ColumnSlot::new(column.clone(), parse_attachment_cell(cell)));
    }

    let identity = record
        .fields
        .get(identity_column)
        .ok_or_else(|| MappingError::unknown_column(identity_column))
        .map(identity_text)?;

    Ok(ResolvedMapping { slots, identity })
}

/// Extracts attachment ids from one cell.
///
/// Accepts the list encoding `["L", 1, 2]`, a plain array, a single id and
/// `null`. Ids may be integers or numeric strings; other values are skipped.
#[must_use]
pub fn parse_attachment_cell(cell: &Value) -> Vec<AttachmentId> {
    match cell {
        Value::Array(items) => {
            let items = match items.first() {
                Some(Value::String(marker)) if marker == LIST_MARKER => &items[1..],
                _ => &items[..],
            };
            items.iter().filter_map(attachment_id_of).collect()
        }
        Value::Null => Vec::new(),
        other => attachment_id_of(other).into_iter().collect(),
    }
}

fn attachment_id_of(value: &Value) -> Option<AttachmentId> {
    let id = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    if id.is_none() {
        debug!(value = %value, "ignoring non-id value in attachment cell");
    }
    id.map(AttachmentId)
}

/// Renders an identity cell as text; empty or `null` cells yield `None`.
#[must_use]
pub fn identity_text(cell: &Value) -> Option<String> {
    let text = match cell {
        Value::Null => return None,
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => {
            let items = match items.first() {
                Some(Value::String(marker)) if marker == LIST_MARKER => &items[1..],
                _ => &items[..],
            };
            items
                .iter()
                .filter_map(identity_text)
                .collect::<Vec<_>>()
                .join(" ")
        }
        Value::Object(_) => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Credential attached to attachment downloads.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Short-lived token passed as the `auth` query parameter.
    QueryToken(String),
    /// API key sent as `Authorization: Bearer`.
    Bearer(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryToken(_) => f.write_str("QueryToken(***)"),
            Self::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

/// Base URL plus credential allowing attachment downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    base_url: String,
    credential: Credential,
}

impl AccessGrant {
    /// Grant using a query-string token (`?auth=...`).
    #[must_use]
    pub fn query_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: Credential::QueryToken(token.into()),
        }
    }

    /// Grant using a bearer API key.
    #[must_use]
    pub fn bearer(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: Credential::Bearer(api_key.into()),
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the credential.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Builds `{base}/attachments/{id}/download`, with `?auth={token}` for query grants.
    #[must_use]
    pub fn download_url(&self, id: AttachmentId) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.credential {
            Credential::QueryToken(token) => format!(
                "{base}/attachments/{id}/download?auth={}",
                urlencoding::encode(token)
            ),
            Credential::Bearer(_) => format!("{base}/attachments/{id}/download"),
        }
    }
}

/// Source of download credentials.
///
/// Uses `async_trait` so providers can be shared as `Arc<dyn AccessProvider>`.
#[async_trait]
pub trait AccessProvider: Send + Sync {
    /// Returns a grant valid for the downloads of one bundling run.
    async fn access_grant(&self) -> Result<AccessGrant, HostError>;
}

/// Provider returning a fixed grant.
#[derive(Debug, Clone)]
pub struct StaticAccess {
    grant: AccessGrant,
}

impl StaticAccess {
    /// Wraps a grant.
    #[must_use]
    pub fn new(grant: AccessGrant) -> Self {
        Self { grant }
    }
}

#[async_trait]
impl AccessProvider for StaticAccess {
    async fn access_grant(&self) -> Result<AccessGrant, HostError> {
        Ok(self.grant.clone())
    }
}

/// Hands a finished archive to the user.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Delivers `bytes` under `file_name`; returns where it ended up.
    async fn deliver(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, HostError>;
}
