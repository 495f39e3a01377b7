//! Attribute types and path resolution for ABAC evaluation.
//!
//! Four attribute sections drive access decisions:
//! - **user**: identity, roles, department, security level
//! - **resource**: type, id, owner, plus any fields the caller supplies
//! - **action**: the operation being attempted
//! - **environment**: request time
//!
//! The sections are assembled into an [`AttributeNamespace`], a tree of
//! [`AttributeNode`]s that policies address with dot-separated paths such as
//! `user.roles` or `resource.owner_id`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Scalar
// ============================================================================

/// A single leaf value in the attribute tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Time(DateTime<Utc>),
    Text(String),
}

impl Scalar {
    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as a timestamp.
    ///
    /// Text is accepted when it parses as RFC 3339.
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Scalar::Time(t) => Some(*t),
            Scalar::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Returns the text content if this is a text scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical equality used everywhere the engine compares attribute values.
    ///
    /// Numbers compare numerically, timestamps chronologically, and every other
    /// combination compares by canonical string form, so `5` equals `"5"`.
    pub fn same_as(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Time(a), b) | (b, Scalar::Time(a)) => b.as_time() == Some(*a),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.to_string() == b.to_string(),
            },
        }
    }

    /// Ordering between two scalars of compatible kinds.
    ///
    /// Returns `None` for mismatched kinds (e.g. text vs number).
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Time(_), _) | (_, Scalar::Time(_)) => {
                Some(self.as_time()?.cmp(&other.as_time()?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Scalar::Time(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

// ============================================================================
// Attribute Value (resolution result)
// ============================================================================

/// The value found at the end of a resolved attribute path.
///
/// Absence is expressed as `Option::None` by the resolver, never as an
/// empty sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Scalar(Scalar),
    Sequence(Vec<Scalar>),
}

impl AttributeValue {
    /// Returns the scalar if this is not a sequence.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            AttributeValue::Scalar(s) => Some(s),
            AttributeValue::Sequence(_) => None,
        }
    }

    /// Elements of the value, treating a scalar as a one-element set.
    pub fn elements(&self) -> &[Scalar] {
        match self {
            AttributeValue::Scalar(s) => std::slice::from_ref(s),
            AttributeValue::Sequence(items) => items,
        }
    }

    /// Equality between two resolved values.
    ///
    /// Scalars use [`Scalar::same_as`]; sequences must agree element-wise.
    pub fn same_as(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Scalar(a), AttributeValue::Scalar(b)) => a.same_as(b),
            (AttributeValue::Sequence(a), AttributeValue::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            _ => false,
        }
    }

    /// Returns whether a sequence shares an element with `expected`.
    ///
    /// A scalar never intersects, even when it equals one of the values.
    pub fn intersects(&self, expected: &[String]) -> bool {
        let AttributeValue::Sequence(items) = self else {
            return false;
        };
        items
            .iter()
            .any(|el| expected.iter().any(|e| el.same_as(&Scalar::Text(e.clone()))))
    }
}

impl From<Scalar> for AttributeValue {
    fn from(value: Scalar) -> Self {
        AttributeValue::Scalar(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Scalar(s) => write!(f, "{s}"),
            AttributeValue::Sequence(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

// ============================================================================
// Attribute Node (tree)
// ============================================================================

/// A node in the attribute tree: a leaf, a list, or a record of named children.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeNode {
    Scalar(Scalar),
    List(Vec<AttributeNode>),
    Record(BTreeMap<String, AttributeNode>),
}

impl AttributeNode {
    /// Builds a record node from `(name, node)` pairs.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, AttributeNode)>,
    {
        AttributeNode::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Converts a JSON document into a node. `null` maps to `None` and is
    /// dropped from enclosing lists and records.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(AttributeNode::Scalar(Scalar::Bool(b))),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float))
                .map(AttributeNode::Scalar),
            Value::String(s) => Some(AttributeNode::Scalar(Scalar::Text(s))),
            Value::Array(items) => Some(AttributeNode::List(
                items.into_iter().filter_map(AttributeNode::from_json).collect(),
            )),
            Value::Object(map) => Some(AttributeNode::Record(
                map.into_iter()
                    .filter_map(|(k, v)| AttributeNode::from_json(v).map(|node| (k, node)))
                    .collect(),
            )),
        }
    }

    /// Returns the scalar if this node is a leaf.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            AttributeNode::Scalar(s) => Some(s),
            _ => None,
        }
    }

    fn is_record(&self) -> bool {
        matches!(self, AttributeNode::Record(_))
    }
}

impl From<Scalar> for AttributeNode {
    fn from(value: Scalar) -> Self {
        AttributeNode::Scalar(value)
    }
}

macro_rules! leaf_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AttributeNode {
                fn from(value: $ty) -> Self {
                    AttributeNode::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

leaf_from!(bool, i64, i32, f64, DateTime<Utc>, &str, String);

impl<T: Into<Scalar>> FromIterator<T> for AttributeNode {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        AttributeNode::List(
            iter.into_iter()
                .map(|v| AttributeNode::Scalar(v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Path Resolution
// ============================================================================

/// Resolves a dot-separated attribute path against a tree.
///
/// - A missing key yields `None`.
/// - A path that ends on a record (not a leaf) yields `None`.
/// - On a list of records the remaining path is resolved against every
///   record, absent results are dropped and nested sequences are flattened
///   one level. No surviving values yields `None`.
/// - A path that ends on a list yields its scalar elements, possibly empty.
///
/// # Examples
///
/// ```
/// use warden_abac::attributes::{resolve, AttributeNode, AttributeValue, Scalar};
///
/// let tree = AttributeNode::record([(
///     "user",
///     AttributeNode::record([(
///         "roles",
///         AttributeNode::List(vec![
///             AttributeNode::record([("name", AttributeNode::from("admin"))]),
///             AttributeNode::record([("name", AttributeNode::from("user"))]),
///         ]),
///     )]),
/// )]);
///
/// assert_eq!(
///     resolve("user.roles.name", &tree),
///     Some(AttributeValue::Sequence(vec![Scalar::from("admin"), Scalar::from("user")]))
/// );
/// assert_eq!(resolve("user.roles.missing", &tree), None);
/// ```
pub fn resolve(path: &str, root: &AttributeNode) -> Option<AttributeValue> {
    let segments: Vec<&str> = path.split('.').collect();
    resolve_segments(root, &segments)
}

fn resolve_segments(node: &AttributeNode, segments: &[&str]) -> Option<AttributeValue> {
    match node {
        AttributeNode::Record(fields) => {
            let (head, rest) = segments.split_first()?;
            resolve_segments(fields.get(*head)?, rest)
        }
        AttributeNode::Scalar(s) => segments
            .is_empty()
            .then(|| AttributeValue::Scalar(s.clone())),
        AttributeNode::List(items) if segments.is_empty() => Some(AttributeValue::Sequence(
            items
                .iter()
                .filter_map(AttributeNode::as_scalar)
                .cloned()
                .collect(),
        )),
        AttributeNode::List(items) => {
            let mut collected = Vec::new();
            for item in items.iter().filter(|item| item.is_record()) {
                match resolve_segments(item, segments) {
                    Some(AttributeValue::Scalar(s)) => collected.push(s),
                    Some(AttributeValue::Sequence(inner)) => collected.extend(inner),
                    None => {}
                }
            }
            (!collected.is_empty()).then_some(AttributeValue::Sequence(collected))
        }
    }
}

// ============================================================================
// User Attributes
// ============================================================================

/// Attributes describing the subject making the access request.
///
/// Populated from the subject store at the start of each request.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAttributes {
    pub id: Scalar,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub security_level: Option<i64>,
    pub is_active: bool,
    /// Role names held by the subject.
    pub roles: Vec<String>,
    /// Additional attributes exposed under `user.<name>`.
    pub extra: BTreeMap<String, AttributeNode>,
}

impl UserAttributes {
    /// Creates an active subject with no roles and no optional attributes.
    pub fn new(id: impl Into<Scalar>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            phone: None,
            department: None,
            security_level: None,
            is_active: true,
            roles: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Sets the role names.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the username.
    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Sets the department.
    pub fn with_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }

    /// Sets the security level.
    pub fn with_security_level(mut self, level: i64) -> Self {
        self.security_level = Some(level);
        self
    }

    /// Marks the subject active or inactive.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Adds an extra attribute under `user.<name>`.
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeNode>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }

    /// Builds the `user` section of the namespace.
    pub fn to_node(&self) -> AttributeNode {
        let mut fields = self.extra.clone();
        fields.insert("id".into(), AttributeNode::Scalar(self.id.clone()));
        fields.insert("is_active".into(), self.is_active.into());
        fields.insert("roles".into(), self.roles.iter().map(String::as_str).collect());

        let optional = [
            ("username", self.username.as_deref()),
            ("email", self.email.as_deref()),
            ("phone", self.phone.as_deref()),
            ("department", self.department.as_deref()),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                fields.insert(name.into(), v.into());
            }
        }
        if let Some(level) = self.security_level {
            fields.insert("security_level".into(), level.into());
        }

        AttributeNode::Record(fields)
    }
}

// ============================================================================
// Resource Record / Resource Attributes
// ============================================================================

/// A concrete resource instance as supplied by the caller (one row).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRecord {
    fields: BTreeMap<String, AttributeNode>,
}

impl ResourceRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field (builder pattern).
    pub fn with_field(mut self, name: &str, value: impl Into<AttributeNode>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Returns a field by name.
    pub fn field(&self, name: &str) -> Option<&AttributeNode> {
        self.fields.get(name)
    }

    /// Builds a record from a JSON object. Returns `None` for non-objects.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match AttributeNode::from_json(value)? {
            AttributeNode::Record(fields) => Some(Self { fields }),
            _ => None,
        }
    }
}

/// Attributes describing the resource being accessed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAttributes {
    pub resource_type: String,
    pub id: Option<Scalar>,
    pub owner_id: Option<Scalar>,
    /// Every field of the concrete instance, exposed under `resource.<name>`.
    pub fields: BTreeMap<String, AttributeNode>,
}

impl ResourceAttributes {
    /// Attributes for a resource kind with no concrete instance.
    pub fn of_type(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: None,
            owner_id: None,
            fields: BTreeMap::new(),
        }
    }

    /// Attributes for a concrete instance. `id` and `owner_id` are taken from
    /// the record's fields of the same name when present.
    pub fn from_record(resource_type: &str, record: &ResourceRecord) -> Self {
        let scalar_field = |name: &str| record.field(name).and_then(AttributeNode::as_scalar).cloned();
        Self {
            resource_type: resource_type.to_string(),
            id: scalar_field("id"),
            owner_id: scalar_field("owner_id"),
            fields: record.fields.clone(),
        }
    }

    /// Overrides the resource id.
    pub fn with_id(mut self, id: impl Into<Scalar>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builds the `resource` section of the namespace.
    pub fn to_node(&self) -> AttributeNode {
        let mut fields = self.fields.clone();
        fields.insert("type".into(), self.resource_type.as_str().into());
        if let Some(id) = &self.id {
            fields.insert("id".into(), AttributeNode::Scalar(id.clone()));
        }
        if let Some(owner) = &self.owner_id {
            fields.insert("owner_id".into(), AttributeNode::Scalar(owner.clone()));
        }
        AttributeNode::Record(fields)
    }
}

// ============================================================================
// Environment Attributes
// ============================================================================

/// Attributes describing the context of the access request.
///
/// Computed at request time from system state, not supplied by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentAttributes {
    pub current_time: DateTime<Utc>,
}

impl EnvironmentAttributes {
    /// Environment at the given instant.
    pub fn at(current_time: DateTime<Utc>) -> Self {
        Self { current_time }
    }

    /// Environment at the current wall-clock time.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    fn to_node(&self) -> AttributeNode {
        AttributeNode::record([("current_time", self.current_time.into())])
    }
}

// ============================================================================
// Attribute Namespace
// ============================================================================

/// The per-request attribute tree with `user`, `resource`, `action` and
/// `environment` sections.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeNamespace {
    root: AttributeNode,
}

impl AttributeNamespace {
    /// Assembles the namespace for one request.
    pub fn new(
        user: &UserAttributes,
        action: &str,
        resource: &ResourceAttributes,
        env: &EnvironmentAttributes,
    ) -> Self {
        Self {
            root: AttributeNode::record([
                ("user", user.to_node()),
                ("resource", resource.to_node()),
                ("action", AttributeNode::record([("type", action.into())])),
                ("environment", env.to_node()),
            ]),
        }
    }

    /// Wraps an arbitrary tree. Used for ad-hoc evaluation and tests.
    pub fn from_tree(root: AttributeNode) -> Self {
        Self { root }
    }

    /// Resolves a dot-separated path. See [`resolve`].
    pub fn resolve(&self, path: &str) -> Option<AttributeValue> {
        resolve(path, &self.root)
    }

    /// Returns the underlying tree.
    pub fn root(&self) -> &AttributeNode {
        &self.root
    }
}

// ============================================================================
// Vocabulary
// ============================================================================

/// A well-known attribute path, for documentation and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    pub key: &'static str,
    pub category: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
}

const fn descriptor(
    key: &'static str,
    category: &'static str,
    kind: &'static str,
    description: &'static str,
) -> AttributeDescriptor {
    AttributeDescriptor {
        key,
        category,
        kind,
        description,
    }
}

/// The attributes every namespace provides (when set). Resources also expose
/// every field of the instance under `resource.<field>`.
pub const VOCABULARY: &[AttributeDescriptor] = &[
    descriptor("user.id", "user", "integer", "Subject identifier"),
    descriptor("user.username", "user", "string", "Login name"),
    descriptor("user.email", "user", "string", "Email address"),
    descriptor("user.phone", "user", "string", "Phone number"),
    descriptor("user.department", "user", "string", "Department"),
    descriptor("user.security_level", "user", "integer", "Clearance level"),
    descriptor("user.is_active", "user", "boolean", "Whether the account is active"),
    descriptor("user.roles", "user", "list<string>", "Role names held by the subject"),
    descriptor("resource.type", "resource", "string", "Resource type, e.g. file"),
    descriptor("resource.id", "resource", "integer", "Resource instance identifier"),
    descriptor("resource.owner_id", "resource", "integer", "Owning subject"),
    descriptor("action.type", "action", "string", "Requested action, e.g. read_list"),
    descriptor("environment.current_time", "environment", "datetime", "Request time (UTC)"),
];

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn roles_tree() -> AttributeNode {
        AttributeNode::record([(
            "user",
            AttributeNode::record([(
                "roles",
                AttributeNode::List(vec![
                    AttributeNode::record([("name", "admin".into())]),
                    AttributeNode::record([("name", "user".into())]),
                ]),
            )]),
        )])
    }

    fn test_namespace() -> AttributeNamespace {
        let user = UserAttributes::new(5)
            .with_roles(["editor", "viewer"])
            .with_department("engineering")
            .with_security_level(2);
        let resource = ResourceAttributes::from_record(
            "file",
            &ResourceRecord::new()
                .with_field("id", 9)
                .with_field("owner_id", 5)
                .with_field("user_id", 5),
        );
        let ts = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
        AttributeNamespace::new(&user, "read", &resource, &EnvironmentAttributes::at(ts))
    }

    #[test]
    fn test_resolve_through_sequence_of_records() {
        let value = resolve("user.roles.name", &roles_tree());
        assert_eq!(
            value,
            Some(AttributeValue::Sequence(vec!["admin".into(), "user".into()]))
        );
    }

    #[test]
    fn test_resolve_missing_key_is_none() {
        assert_eq!(resolve("user.roles.title", &roles_tree()), None);
        assert_eq!(resolve("user.email", &roles_tree()), None);
        assert_eq!(resolve("nothing.here", &roles_tree()), None);
    }

    #[test]
    fn test_resolve_record_is_not_a_leaf() {
        assert_eq!(resolve("user", &roles_tree()), None);
    }

    #[test]
    fn test_resolve_past_scalar_is_none() {
        let ns = test_namespace();
        assert_eq!(ns.resolve("user.id.value"), None);
    }

    #[test]
    fn test_resolve_flattens_nested_sequences() {
        let tree = AttributeNode::record([(
            "groups",
            AttributeNode::List(vec![
                AttributeNode::record([("tags", ["a", "b"].into_iter().collect())]),
                AttributeNode::record([("tags", ["c"].into_iter().collect())]),
                AttributeNode::record([("other", 1.into())]),
            ]),
        )]);

        assert_eq!(
            resolve("groups.tags", &tree),
            Some(AttributeValue::Sequence(vec!["a".into(), "b".into(), "c".into()]))
        );
    }

    #[test]
    fn test_resolve_empty_list_leaf_is_empty_sequence() {
        let tree = AttributeNode::record([("roles", AttributeNode::List(Vec::new()))]);
        assert_eq!(resolve("roles", &tree), Some(AttributeValue::Sequence(Vec::new())));
    }

    #[test]
    fn test_resolve_list_without_matches_is_none() {
        let tree = AttributeNode::record([(
            "items",
            AttributeNode::List(vec![AttributeNode::record([("x", 1.into())])]),
        )]);
        assert_eq!(resolve("items.y", &tree), None);
    }

    #[test]
    fn test_namespace_sections() {
        let ns = test_namespace();

        assert_eq!(ns.resolve("user.id"), Some(Scalar::Int(5).into()));
        assert_eq!(
            ns.resolve("user.roles"),
            Some(AttributeValue::Sequence(vec!["editor".into(), "viewer".into()]))
        );
        assert_eq!(ns.resolve("user.department"), Some(Scalar::from("engineering").into()));
        assert_eq!(ns.resolve("user.security_level"), Some(Scalar::Int(2).into()));
        assert_eq!(ns.resolve("user.is_active"), Some(Scalar::Bool(true).into()));
        assert_eq!(ns.resolve("resource.type"), Some(Scalar::from("file").into()));
        assert_eq!(ns.resolve("resource.owner_id"), Some(Scalar::Int(5).into()));
        assert_eq!(ns.resolve("resource.user_id"), Some(Scalar::Int(5).into()));
        assert_eq!(ns.resolve("action.type"), Some(Scalar::from("read").into()));
        assert!(ns.resolve("environment.current_time").is_some());
        assert_eq!(ns.resolve("user.email"), None);
    }

    #[test]
    fn test_resource_type_overrides_record_field() {
        let record = ResourceRecord::new().with_field("type", "spoofed");
        let resource = ResourceAttributes::from_record("file", &record);
        let ns = AttributeNamespace::from_tree(AttributeNode::record([(
            "resource",
            resource.to_node(),
        )]));
        assert_eq!(ns.resolve("resource.type"), Some(Scalar::from("file").into()));
    }

    #[test]
    fn test_explicit_id_overrides_record() {
        let record = ResourceRecord::new().with_field("id", 1);
        let resource = ResourceAttributes::from_record("file", &record).with_id(2);
        assert_eq!(resource.id, Some(Scalar::Int(2)));
    }

    #[test]
    fn test_scalar_same_as_crosses_kinds() {
        assert!(Scalar::Int(5).same_as(&Scalar::from("5")));
        assert!(Scalar::from("5").same_as(&Scalar::Int(5)));
        assert!(Scalar::Int(5).same_as(&Scalar::Float(5.0)));
        assert!(Scalar::Bool(true).same_as(&Scalar::from("true")));
        assert!(!Scalar::Int(5).same_as(&Scalar::Int(7)));
        assert!(!Scalar::from("a").same_as(&Scalar::from("b")));
    }

    #[test]
    fn test_scalar_same_as_time() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
        assert!(Scalar::Time(ts).same_as(&Scalar::from("2025-01-08T10:00:00Z")));
        assert!(!Scalar::Time(ts).same_as(&Scalar::from("not a time")));
    }

    #[test]
    fn test_scalar_compare() {
        assert_eq!(Scalar::Int(2).compare(&Scalar::Float(1.5)), Some(Ordering::Greater));
        assert_eq!(Scalar::from("a").compare(&Scalar::from("b")), Some(Ordering::Less));
        assert_eq!(Scalar::Int(2).compare(&Scalar::from("b")), None);

        let early = Utc.with_ymd_and_hms(2025, 1, 8, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 1, 8, 18, 0, 0).unwrap();
        assert_eq!(Scalar::Time(early).compare(&Scalar::Time(late)), Some(Ordering::Less));
    }

    #[test]
    fn test_attribute_value_same_as() {
        let a = AttributeValue::Sequence(vec![1.into(), 2.into()]);
        let b = AttributeValue::Sequence(vec!["1".into(), "2".into()]);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&AttributeValue::Scalar(1.into())));
    }

    #[test]
    fn test_intersects_needs_sequence() {
        let expected = vec!["engineering".to_string(), "3".to_string()];
        let roles = AttributeValue::Sequence(vec!["viewer".into(), 3.into()]);
        assert!(roles.intersects(&expected));
        assert!(!AttributeValue::Sequence(vec!["viewer".into()]).intersects(&expected));
        assert!(!AttributeValue::Scalar("engineering".into()).intersects(&expected));
    }

    #[test]
    fn test_from_json_drops_nulls() {
        let node = AttributeNode::from_json(serde_json::json!({
            "id": 3,
            "name": null,
            "tags": ["x", null, "y"],
            "score": 1.5
        }))
        .unwrap();

        assert_eq!(resolve("id", &node), Some(Scalar::Int(3).into()));
        assert_eq!(resolve("name", &node), None);
        assert_eq!(
            resolve("tags", &node),
            Some(AttributeValue::Sequence(vec!["x".into(), "y".into()]))
        );
        assert_eq!(resolve("score", &node), Some(Scalar::Float(1.5).into()));
    }

    #[test]
    fn test_record_from_json_rejects_non_object() {
        assert!(ResourceRecord::from_json(serde_json::json!([1, 2])).is_none());
        assert!(ResourceRecord::from_json(serde_json::json!({"id": 1})).is_some());
    }

    #[test]
    fn test_vocabulary_resolves_on_full_namespace() {
        let user = UserAttributes::new(1)
            .with_username("ada")
            .with_department("research")
            .with_security_level(3)
            .with_roles(["admin"]);
        let user = UserAttributes {
            email: Some("ada@example.com".into()),
            phone: Some("555".into()),
            ..user
        };
        let resource = ResourceAttributes::of_type("file").with_id(4);
        let resource = ResourceAttributes {
            owner_id: Some(Scalar::Int(1)),
            ..resource
        };
        let ns = AttributeNamespace::new(&user, "read", &resource, &EnvironmentAttributes::now());

        for attribute in VOCABULARY {
            assert!(ns.resolve(attribute.key).is_some(), "{} unresolved", attribute.key);
        }
    }
}
