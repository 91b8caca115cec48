//! Permission record types, as served to the data-virtualization gateway.
//!
//! Field order in these structs is the field order of the JSON responses.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::RegistryError;

/// Display name of the synthetic record returned for unknown identifiers.
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Message attached to the synthetic record returned for unknown identifiers.
pub const UNKNOWN_USER_MESSAGE: &str = "No permissions configured for this user";

/// Row limit applied to unknown identifiers.
pub const GUEST_MAX_ROWS: i64 = 1000;

/// Canonical form of a user identifier: surrounding whitespace removed,
/// letters lower-cased.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A user's access profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermissionRecord {
    pub user_id: String,

    #[serde(alias = "name")]
    pub display_name: String,

    #[serde(default)]
    pub profiles: Vec<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default, alias = "datasources")]
    pub data_sources: Vec<DataSourceGrant>,

    pub max_rows_per_query: RowLimit,

    #[serde(default)]
    pub can_export: bool,

    #[serde(default)]
    pub can_create_views: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_manage_users: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_manage_data_sources: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PermissionRecord {
    /// The record served for identifiers with no configured permissions.
    ///
    /// Never grants export, view creation, or any data source.
    pub fn unknown(normalized_id: impl Into<String>) -> Self {
        Self {
            user_id: normalized_id.into(),
            display_name: UNKNOWN_USER_NAME.to_string(),
            profiles: vec!["guest".to_string()],
            roles: vec!["viewer".to_string()],
            data_sources: Vec::new(),
            max_rows_per_query: RowLimit::limited(GUEST_MAX_ROWS as u64),
            can_export: false,
            can_create_views: false,
            can_manage_users: None,
            can_manage_data_sources: None,
            message: Some(UNKNOWN_USER_MESSAGE.to_string()),
        }
    }

    /// Has a `"*"` grant covering every data source.
    pub fn grants_all_sources(&self) -> bool {
        self.data_sources.iter().any(DataSourceGrant::is_wildcard)
    }

    /// Check a configured record before it enters a registry.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidRecord {
            user_id: self.user_id.clone(),
            reason: reason.to_string(),
        };

        if self.user_id.is_empty() {
            return Err(invalid("userId must not be empty"));
        }
        if normalize_identifier(&self.user_id) != self.user_id {
            return Err(invalid(
                "userId must be lower-case without surrounding whitespace",
            ));
        }
        // Administrative records reach every source through a `"*"` grant.
        if self.data_sources.is_empty() {
            return Err(invalid("record grants no data sources"));
        }
        if self.message.is_some() {
            return Err(invalid(
                "message is reserved for the unknown-user record",
            ));
        }
        for grant in &self.data_sources {
            if grant.id.is_empty() {
                return Err(invalid("data source id must not be empty"));
            }
            if grant.permissions.is_empty() {
                return Err(invalid(&format!(
                    "data source '{}' grants no operations",
                    grant.id
                )));
            }
        }
        Ok(())
    }
}

/// Access to one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataSourceGrant {
    /// Source identifier, or `"*"` for every source.
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub kind: DataSourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub permissions: Vec<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
}

impl DataSourceGrant {
    pub const WILDCARD_ID: &'static str = "*";

    pub fn is_wildcard(&self) -> bool {
        self.id == Self::WILDCARD_ID
    }

    pub fn allows(&self, operation: Operation) -> bool {
        self.permissions
            .iter()
            .any(|granted| *granted == Operation::All || *granted == operation)
    }
}

/// Kind of data source. Unrecognized kinds are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataSourceKind {
    Postgresql,
    RestApi,
    /// Wildcard kind used by the all-sources grant.
    All,
    Other(String),
}

impl DataSourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            DataSourceKind::Postgresql => "postgresql",
            DataSourceKind::RestApi => "rest-api",
            DataSourceKind::All => "all",
            DataSourceKind::Other(kind) => kind,
        }
    }
}

impl From<String> for DataSourceKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "postgresql" => DataSourceKind::Postgresql,
            "rest-api" => DataSourceKind::RestApi,
            "all" => DataSourceKind::All,
            _ => DataSourceKind::Other(value),
        }
    }
}

impl From<DataSourceKind> for String {
    fn from(value: DataSourceKind) -> Self {
        match value {
            DataSourceKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation tag on a data source grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Query,
    Export,
    #[serde(rename = "*")]
    All,
}

/// Maximum rows per query: a non-negative count, or unlimited (`-1` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RowLimit(i64);

impl RowLimit {
    pub const UNLIMITED: RowLimit = RowLimit(-1);

    pub fn limited(rows: u64) -> Self {
        Self(i64::try_from(rows).unwrap_or(i64::MAX))
    }

    pub fn is_unlimited(&self) -> bool {
        self.0 == -1
    }

    /// Row cap, or `None` when unlimited.
    pub fn rows(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for RowLimit {
    type Error = RowLimitError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value >= -1 {
            Ok(Self(value))
        } else {
            Err(RowLimitError(value))
        }
    }
}

impl From<RowLimit> for i64 {
    fn from(value: RowLimit) -> Self {
        value.0
    }
}

impl fmt::Display for RowLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            f.write_str("unlimited")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("maxRowsPerQuery must be a non-negative integer or -1, got {0}")]
pub struct RowLimitError(i64);
