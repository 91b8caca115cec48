//! Permissions registry: normalized user identifier → permission record.
//!
//! The registry is built once at startup and only read afterwards. Records
//! come from a [`PermissionsSource`]; the in-memory [`StaticPermissionsSource`]
//! is the only source shipped, but a database-backed one can be swapped in
//! without touching the request handler.

mod types;

use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
pub use types::*;

use crate::config::RegistryConfig;

/// Built-in user table, compiled into the binary.
const BUILTIN_USERS: &str = include_str!("../../data/users.json");

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse registry document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid permission record '{user_id}': {reason}")]
    InvalidRecord { user_id: String, reason: String },

    #[error("Duplicate permission record for '{0}'")]
    Duplicate(String),

    #[error("Permissions source error: {0}")]
    Source(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Lookup from canonical identifier to permission record.
///
/// Callers always pass an identifier that has already been through
/// [`normalize_identifier`].
#[async_trait]
pub trait PermissionsSource: Send + Sync {
    async fn get_record(&self, identifier: &str) -> RegistryResult<Option<Arc<PermissionRecord>>>;

    /// Number of records, when the source can tell cheaply.
    fn record_count(&self) -> Option<usize> {
        None
    }
}

/// JSON document shape accepted by the file and built-in sources.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UsersDocument {
    users: Vec<PermissionRecord>,
}

/// In-memory, immutable permissions table.
#[derive(Debug, Default)]
pub struct StaticPermissionsSource {
    records: HashMap<String, Arc<PermissionRecord>>,
}

impl StaticPermissionsSource {
    /// Validate and index records. Rejects invalid and duplicate entries.
    pub fn from_records(
        records: impl IntoIterator<Item = PermissionRecord>,
    ) -> RegistryResult<Self> {
        let mut map = HashMap::new();
        for record in records {
            record.validate()?;
            if map.contains_key(&record.user_id) {
                return Err(RegistryError::Duplicate(record.user_id));
            }
            map.insert(record.user_id.clone(), Arc::new(record));
        }
        Ok(Self { records: map })
    }

    /// Parse a `{"users": [...]}` document.
    pub fn from_json(json: &str) -> RegistryResult<Self> {
        let document: UsersDocument = serde_json::from_str(json)?;
        Self::from_records(document.users)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// The analyst / scientist / admin table shipped with the service.
    pub fn builtin() -> RegistryResult<Self> {
        Self::from_json(BUILTIN_USERS)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl PermissionsSource for StaticPermissionsSource {
    async fn get_record(&self, identifier: &str) -> RegistryResult<Option<Arc<PermissionRecord>>> {
        Ok(self.records.get(identifier).cloned())
    }

    fn record_count(&self) -> Option<usize> {
        Some(self.records.len())
    }
}

/// The lookup the request handler depends on.
#[derive(Clone)]
pub struct PermissionsRegistry {
    source: Arc<dyn PermissionsSource>,
}

impl PermissionsRegistry {
    pub fn new(source: Arc<dyn PermissionsSource>) -> Self {
        Self { source }
    }

    /// Build the registry selected by configuration.
    pub fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        let source = match config {
            RegistryConfig::Builtin => StaticPermissionsSource::builtin()?,
            RegistryConfig::File { path } => StaticPermissionsSource::from_file(path)?,
        };

        tracing::info!(
            source = match config {
                RegistryConfig::Builtin => "builtin",
                RegistryConfig::File { .. } => "file",
            },
            records = source.len(),
            "Permissions registry loaded"
        );

        Ok(Self::new(Arc::new(source)))
    }

    /// Resolve a raw identifier to a record.
    ///
    /// Unknown identifiers resolve to [`PermissionRecord::unknown`]; only a
    /// failing source produces an error.
    pub async fn lookup(&self, raw_identifier: &str) -> RegistryResult<Arc<PermissionRecord>> {
        let identifier = normalize_identifier(raw_identifier);

        match self.source.get_record(&identifier).await? {
            Some(record) => {
                tracing::debug!(user_id = %identifier, "Permission record found");
                Ok(record)
            }
            None => {
                tracing::info!(
                    user_id = %identifier,
                    "No permissions configured, serving guest record"
                );
                Ok(Arc::new(PermissionRecord::unknown(identifier)))
            }
        }
    }

    pub fn record_count(&self) -> Option<usize> {
        self.source.record_count()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;

    use super::*;

    fn builtin_registry() -> PermissionsRegistry {
        PermissionsRegistry::new(Arc::new(StaticPermissionsSource::builtin().unwrap()))
    }

    #[test]
    fn test_builtin_table_loads() {
        let source = StaticPermissionsSource::builtin().unwrap();
        assert_eq!(source.len(), 3);
    }

    #[tokio::test]
    async fn test_analyst_record() {
        let record = builtin_registry()
            .lookup("analyst@denodo.com")
            .await
            .unwrap();

        assert_eq!(record.display_name, "Data Analyst");
        assert_eq!(record.roles, vec!["viewer"]);
        assert_eq!(record.max_rows_per_query.as_i64(), 10_000);
        assert!(!record.can_export);
        assert!(!record.can_create_views);
        assert_eq!(record.data_sources.len(), 2);

        let opendata = &record.data_sources[0];
        assert_eq!(opendata.id, "rds-opendata");
        assert_eq!(opendata.kind, DataSourceKind::Postgresql);
        assert_eq!(opendata.permissions, vec![Operation::Read, Operation::Query]);
        assert!(!opendata.allows(Operation::Export));
        assert_eq!(opendata.tables.as_ref().map(Vec::len), Some(3));

        let geo = &record.data_sources[1];
        assert_eq!(geo.base_url.as_deref(), Some("https://geo.api.gouv.fr"));
        assert_eq!(
            geo.endpoints.as_deref(),
            Some(&["/communes".to_string(), "/departements".into(), "/regions".into()][..])
        );
    }

    #[tokio::test]
    async fn test_scientist_record() {
        let record = builtin_registry()
            .lookup("scientist@denodo.com")
            .await
            .unwrap();

        assert_eq!(record.roles, vec!["editor"]);
        assert_eq!(record.max_rows_per_query.as_i64(), 50_000);
        assert!(record.can_export);
        assert!(record.can_create_views);
        assert_eq!(record.data_sources.len(), 3);
        assert!(record.data_sources[0].allows(Operation::Export));
        assert_eq!(record.data_sources[0].tables.as_ref().map(Vec::len), Some(5));
        assert_eq!(record.data_sources[2].id, "api-sirene");
    }

    #[tokio::test]
    async fn test_admin_record() {
        let record = builtin_registry().lookup("admin@denodo.com").await.unwrap();

        assert!(record.grants_all_sources());
        assert!(record.max_rows_per_query.is_unlimited());
        assert_eq!(record.can_manage_users, Some(true));
        assert_eq!(record.can_manage_data_sources, Some(true));
        assert_eq!(record.data_sources[0].kind, DataSourceKind::All);
    }

    #[rstest]
    #[case("analyst@denodo.com")]
    #[case("ANALYST@DENODO.COM")]
    #[case("  Analyst@Denodo.Com  ")]
    #[case("\tanalyst@denodo.com\n")]
    #[tokio::test]
    async fn test_lookup_is_case_and_whitespace_insensitive(#[case] raw: &str) {
        let registry = builtin_registry();
        let canonical = registry.lookup("analyst@denodo.com").await.unwrap();
        let record = registry.lookup(raw).await.unwrap();
        assert!(Arc::ptr_eq(&canonical, &record));
    }

    #[rstest]
    #[case("unknown@example.com")]
    #[case("  Someone@Else.org ")]
    #[case("")]
    #[tokio::test]
    async fn test_unknown_identifier_gets_guest_record(#[case] raw: &str) {
        let record = builtin_registry().lookup(raw).await.unwrap();

        assert_eq!(record.user_id, normalize_identifier(raw));
        assert_eq!(record.profiles, vec!["guest"]);
        assert!(record.data_sources.is_empty());
        assert!(!record.can_export);
        assert!(!record.can_create_views);
        assert_eq!(record.max_rows_per_query.as_i64(), 1000);
        assert!(record.message.as_deref().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn test_repeated_lookups_are_identical() {
        let registry = builtin_registry();
        let first = registry.lookup("scientist@denodo.com").await.unwrap();
        for _ in 0..5 {
            let again = registry.lookup("scientist@denodo.com").await.unwrap();
            assert_eq!(*first, *again);
        }
    }

    #[test]
    fn test_duplicate_records_rejected() {
        let doc = r#"{"users": [
            {"userId": "a@b.c", "displayName": "A", "maxRowsPerQuery": 1, "dataSources": [
                {"id": "api-geo", "name": "Geo", "type": "rest-api", "permissions": ["read"]}
            ]},
            {"userId": "a@b.c", "displayName": "A again", "maxRowsPerQuery": 1, "dataSources": [
                {"id": "api-geo", "name": "Geo", "type": "rest-api", "permissions": ["read"]}
            ]}
        ]}"#;
        assert!(matches!(
            StaticPermissionsSource::from_json(doc),
            Err(RegistryError::Duplicate(ref id)) if id == "a@b.c"
        ));
    }

    #[test]
    fn test_invalid_row_limit_rejected() {
        let doc = r#"{"users": [
            {"userId": "a@b.c", "displayName": "A", "maxRowsPerQuery": -7, "canManageUsers": true}
        ]}"#;
        assert!(matches!(
            StaticPermissionsSource::from_json(doc),
            Err(RegistryError::Parse(_))
        ));
    }

    #[test]
    fn test_record_without_sources_rejected() {
        let doc = r#"{"users": [
            {"userId": "a@b.c", "displayName": "A", "maxRowsPerQuery": 10}
        ]}"#;
        assert!(matches!(
            StaticPermissionsSource::from_json(doc),
            Err(RegistryError::InvalidRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"users": [{{
                "userId": "ops@denodo.com",
                "displayName": "Ops",
                "profiles": ["ops"],
                "roles": ["viewer"],
                "dataSources": [{{
                    "id": "api-geo",
                    "name": "French Geographic API",
                    "type": "rest-api",
                    "permissions": ["read"]
                }}],
                "maxRowsPerQuery": 0
            }}]}}"#
        )
        .unwrap();

        let registry = PermissionsRegistry::from_config(&RegistryConfig::File {
            path: file.path().to_path_buf(),
        })
        .unwrap();

        assert_eq!(registry.record_count(), Some(1));
        let record = registry.lookup("OPS@denodo.com").await.unwrap();
        assert_eq!(record.display_name, "Ops");
        assert_eq!(record.max_rows_per_query.rows(), Some(0));

        // Built-in users are not merged into a file-backed registry
        let analyst = registry.lookup("analyst@denodo.com").await.unwrap();
        assert_eq!(analyst.profiles, vec!["guest"]);
    }

    #[test]
    fn test_missing_file_errors() {
        let err = PermissionsRegistry::from_config(&RegistryConfig::File {
            path: "/nonexistent/users.json".into(),
        })
        .err()
        .unwrap();
        assert!(matches!(err, RegistryError::Io { .. }));
    }
}
