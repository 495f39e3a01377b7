//! Policy and subject stores.
//!
//! The engine only reads from stores. Two implementations of each trait are
//! provided: an in-memory store for embedding and tests, and a JSON-file
//! store used by the CLI.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use warden_abac::attributes::{AttributeNode, UserAttributes};
use warden_abac::{Policy, PolicyDocument};

use crate::error::StoreError;

// ============================================================================
// Subject Records
// ============================================================================

/// Identifier of a subject (user) in the subject store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

impl SubjectId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SubjectId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A subject as stored, and as cached between requests.
///
/// Fields other than the known ones are kept in `extra` and exposed as
/// `user.<name>` attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: SubjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_active() -> bool {
    true
}

impl SubjectRecord {
    /// An active subject with no roles.
    pub fn new(id: impl Into<SubjectId>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            phone: None,
            department: None,
            security_level: None,
            is_active: true,
            roles: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_extra(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Converts the record into the `user` attributes of a request.
    ///
    /// Extra fields that are JSON null are dropped.
    pub fn to_attributes(&self) -> UserAttributes {
        let mut user = UserAttributes::new(self.id.as_i64())
            .with_roles(self.roles.iter().cloned())
            .with_active(self.is_active);
        user.username.clone_from(&self.username);
        user.email.clone_from(&self.email);
        user.phone.clone_from(&self.phone);
        user.department.clone_from(&self.department);
        user.security_level = self.security_level;

        for (name, value) in &self.extra {
            if let Some(node) = AttributeNode::from_json(value.clone()) {
                user = user.with_attribute(name, node);
            }
        }
        user
    }
}

// ============================================================================
// Store Interfaces
// ============================================================================

/// Source of policy documents.
pub trait PolicyStore: Send + Sync {
    /// Returns the active policy documents in evaluation order.
    fn active_policies(&self) -> Result<Vec<PolicyDocument>, StoreError>;
}

/// Source of subject records.
pub trait SubjectStore: Send + Sync {
    /// Looks up one subject. `Ok(None)` means the subject does not exist.
    fn subject(&self, id: SubjectId) -> Result<Option<SubjectRecord>, StoreError>;
}

impl<T: PolicyStore + ?Sized> PolicyStore for Arc<T> {
    fn active_policies(&self) -> Result<Vec<PolicyDocument>, StoreError> {
        (**self).active_policies()
    }
}

impl<T: SubjectStore + ?Sized> SubjectStore for Arc<T> {
    fn subject(&self, id: SubjectId) -> Result<Option<SubjectRecord>, StoreError> {
        (**self).subject(id)
    }
}

// ============================================================================
// In-Memory Stores
// ============================================================================

/// Policy store backed by a vector of documents.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    documents: RwLock<Vec<PolicyDocument>>,
}

impl InMemoryPolicyStore {
    pub fn new(documents: Vec<PolicyDocument>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// A store holding the given compiled policies.
    pub fn from_policies(policies: &[Policy]) -> Self {
        Self::new(policies.iter().map(PolicyDocument::from).collect())
    }

    /// Replaces the stored documents. Cached copies stay until invalidated.
    pub fn replace(&self, documents: Vec<PolicyDocument>) -> Result<(), StoreError> {
        let mut guard = self
            .documents
            .write()
            .map_err(|_| StoreError::Unavailable("policy store lock poisoned".into()))?;
        *guard = documents;
        Ok(())
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn active_policies(&self) -> Result<Vec<PolicyDocument>, StoreError> {
        let guard = self
            .documents
            .read()
            .map_err(|_| StoreError::Unavailable("policy store lock poisoned".into()))?;
        Ok(guard.iter().filter(|d| d.is_active).cloned().collect())
    }
}

/// Subject store backed by a vector of records.
#[derive(Debug, Default)]
pub struct InMemorySubjectStore {
    subjects: RwLock<Vec<SubjectRecord>>,
}

impl InMemorySubjectStore {
    pub fn new(subjects: Vec<SubjectRecord>) -> Self {
        Self {
            subjects: RwLock::new(subjects),
        }
    }

    /// Inserts or replaces a subject.
    pub fn upsert(&self, record: SubjectRecord) -> Result<(), StoreError> {
        let mut guard = self
            .subjects
            .write()
            .map_err(|_| StoreError::Unavailable("subject store lock poisoned".into()))?;
        match guard.iter_mut().find(|s| s.id == record.id) {
            Some(existing) => *existing = record,
            None => guard.push(record),
        }
        Ok(())
    }
}

impl SubjectStore for InMemorySubjectStore {
    fn subject(&self, id: SubjectId) -> Result<Option<SubjectRecord>, StoreError> {
        let guard = self
            .subjects
            .read()
            .map_err(|_| StoreError::Unavailable("subject store lock poisoned".into()))?;
        Ok(guard.iter().find(|s| s.id == id).cloned())
    }
}

// ============================================================================
// JSON File Stores
// ============================================================================

fn read_json_array(path: &Path) -> Result<Vec<Value>, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Policy store reading a JSON array of policy documents on every call.
///
/// Documents that do not deserialize are skipped with a warning; the file as
/// a whole must still be a JSON array.
#[derive(Debug, Clone)]
pub struct JsonFilePolicyStore {
    path: PathBuf,
}

impl JsonFilePolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicyStore for JsonFilePolicyStore {
    fn active_policies(&self) -> Result<Vec<PolicyDocument>, StoreError> {
        let mut documents = Vec::new();
        for (index, value) in read_json_array(&self.path)?.into_iter().enumerate() {
            match PolicyDocument::from_value(value) {
                Ok(doc) if doc.is_active => documents.push(doc),
                Ok(_) => {}
                Err(error) => warn!(
                    path = %self.path.display(),
                    index,
                    error = %error,
                    "skipping unreadable policy document"
                ),
            }
        }
        Ok(documents)
    }
}

/// Subject store reading a JSON array of subject records on every call.
#[derive(Debug, Clone)]
pub struct JsonFileSubjectStore {
    path: PathBuf,
}

impl JsonFileSubjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SubjectStore for JsonFileSubjectStore {
    fn subject(&self, id: SubjectId) -> Result<Option<SubjectRecord>, StoreError> {
        let records: Vec<SubjectRecord> =
            serde_json::from_value(Value::Array(read_json_array(&self.path)?)).map_err(
                |source| StoreError::Parse {
                    path: self.path.clone(),
                    source,
                },
            )?;
        Ok(records.into_iter().find(|s| s.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_abac::StandardPolicies;
    use warden_abac::attributes::{AttributeValue, Scalar};

    #[test]
    fn subject_record_from_json() {
        let record: SubjectRecord = serde_json::from_value(json!({
            "id": 5,
            "username": "alice",
            "roles": ["standard_user"],
            "clearance": "secret",
            "manager_id": null
        }))
        .unwrap();

        assert_eq!(record.id, SubjectId(5));
        assert!(record.is_active);
        assert_eq!(record.extra.get("clearance"), Some(&json!("secret")));

        let user = record.to_attributes();
        assert_eq!(user.id, Scalar::Int(5));
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.roles, vec!["standard_user".to_string()]);
        assert!(user.extra.contains_key("clearance"));
        assert!(!user.extra.contains_key("manager_id"));
    }

    #[test]
    fn subject_record_survives_cache_encoding() {
        let record = SubjectRecord::new(7)
            .with_username("bob")
            .with_roles(["admin"])
            .with_extra("region", json!("eu"));
        let bytes = serde_json::to_vec(&record).unwrap();
        let decoded: SubjectRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn extra_attributes_resolve_in_namespace() {
        use warden_abac::attributes::{AttributeNamespace, EnvironmentAttributes, ResourceAttributes};

        let user = SubjectRecord::new(1)
            .with_extra("teams", json!([{"name": "red"}, {"name": "blue"}]))
            .to_attributes();
        let ns = AttributeNamespace::new(
            &user,
            "read",
            &ResourceAttributes::of_type("file"),
            &EnvironmentAttributes::now(),
        );
        assert_eq!(
            ns.resolve("user.teams.name"),
            Some(AttributeValue::Sequence(vec!["red".into(), "blue".into()]))
        );
    }

    #[test]
    fn in_memory_policy_store_filters_inactive() {
        let policies = vec![
            Policy::allow("on").with_actions(["read"]),
            Policy::allow("off").with_actions(["read"]).with_active(false),
        ];
        let store = InMemoryPolicyStore::from_policies(&policies);
        let active = store.active_policies().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "on");

        store.replace(Vec::new()).unwrap();
        assert!(store.active_policies().unwrap().is_empty());
    }

    #[test]
    fn in_memory_subject_store_upsert() {
        let store = InMemorySubjectStore::default();
        store.upsert(SubjectRecord::new(1).with_roles(["a"])).unwrap();
        store.upsert(SubjectRecord::new(1).with_roles(["b"])).unwrap();

        let found = store.subject(SubjectId(1)).unwrap().unwrap();
        assert_eq!(found.roles, vec!["b".to_string()]);
        assert!(store.subject(SubjectId(2)).unwrap().is_none());
    }

    #[test]
    fn json_file_stores() {
        let dir = tempfile::tempdir().unwrap();
        let policies_path = dir.path().join("policies.json");
        let subjects_path = dir.path().join("subjects.json");

        let mut documents: Vec<Value> = StandardPolicies::seed()
            .iter()
            .map(|p| serde_json::to_value(PolicyDocument::from(p)).unwrap())
            .collect();
        documents.push(json!({"name": "broken", "actions": 42}));
        std::fs::write(&policies_path, serde_json::to_string(&documents).unwrap()).unwrap();
        std::fs::write(
            &subjects_path,
            json!([{"id": 1, "roles": ["admin"]}, {"id": 2, "is_active": false}]).to_string(),
        )
        .unwrap();

        let policies = JsonFilePolicyStore::new(&policies_path).active_policies().unwrap();
        assert_eq!(policies.len(), StandardPolicies::seed().len());

        let subjects = JsonFileSubjectStore::new(&subjects_path);
        assert_eq!(subjects.subject(SubjectId(1)).unwrap().unwrap().roles, vec!["admin"]);
        assert!(!subjects.subject(SubjectId(2)).unwrap().unwrap().is_active);
        assert!(subjects.subject(SubjectId(3)).unwrap().is_none());
    }

    #[test]
    fn json_file_store_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFilePolicyStore::new(dir.path().join("missing.json"));
        assert!(matches!(missing.active_policies(), Err(StoreError::Io { .. })));

        let path = dir.path().join("object.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(
            JsonFileSubjectStore::new(&path).subject(SubjectId(1)),
            Err(StoreError::Parse { .. })
        ));
    }
}
