//! JSON wire form of policies and load-time compilation.
//!
//! [`PolicyDocument`] mirrors the declarative schema exactly as policy
//! authoring tools and stores produce it, including a few tolerated legacy
//! shapes. Compiling a document validates every operator, effect and
//! function name so evaluation never sees an unknown one.
//!
//! ```text
//! Policy {
//!   name, description?, effect: "allow" | "deny" (default "allow"),
//!   actions: [string], subjects: [AttributeFilter], resources: [AttributeFilter],
//!   query_conditions: [QueryCondition], conditions?: Rule, is_active: 0 | 1
//! }
//! AttributeFilter { key, operator: "eq" | "in" | "contains", value: [string] }
//! QueryCondition  { resource_attribute, operator: "eq", subject_attribute }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::attributes::{AttributeValue, Scalar};
use crate::functions::Function;
use crate::policy::{
    AttributeFilter, Condition, Effect, Policy, PolicyError, QueryCondition, RESOURCE_TYPE_KEY,
    USER_ROLES_KEY,
};

// ============================================================================
// Documents
// ============================================================================

/// A policy as stored and exchanged in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_effect")]
    pub effect: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub actions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subjects: Vec<SubjectEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resources: Vec<ResourceEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub query_conditions: Vec<QueryConditionDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
    #[serde(
        default = "default_active",
        deserialize_with = "active_flag",
        serialize_with = "active_as_int"
    )]
    pub is_active: bool,
}

/// `{ key, operator, value }`. `value` may be a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilterDocument {
    pub key: String,
    pub operator: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub value: Vec<String>,
}

/// A subject entry: a filter, or the legacy `{ "role": "admin" }` shorthand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectEntry {
    Filter(AttributeFilterDocument),
    LegacyRole { role: String },
}

/// A resource entry: a filter, or a legacy bare resource type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceEntry {
    Filter(AttributeFilterDocument),
    LegacyType(String),
}

/// `{ resource_attribute, operator, subject_attribute }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConditionDocument {
    pub resource_attribute: String,
    #[serde(default = "default_query_operator")]
    pub operator: String,
    pub subject_attribute: String,
}

fn default_effect() -> String {
    Effect::Allow.as_str().to_string()
}

fn default_active() -> bool {
    true
}

fn default_query_operator() -> String {
    "eq".to_string()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

fn active_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => true,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
    })
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn active_as_int<S>(is_active: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u8(u8::from(*is_active))
}

impl PolicyDocument {
    /// Parses one document from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, PolicyError> {
        serde_json::from_value(value).map_err(|e| PolicyError::InvalidDocument(e.to_string()))
    }
}

// ============================================================================
// Compilation
// ============================================================================

impl AttributeFilterDocument {
    fn compile(&self) -> Result<AttributeFilter, PolicyError> {
        Ok(AttributeFilter {
            key: self.key.clone(),
            operator: self.operator.parse()?,
            values: self.value.clone(),
        })
    }
}

impl SubjectEntry {
    fn compile(&self) -> Result<AttributeFilter, PolicyError> {
        match self {
            SubjectEntry::Filter(doc) => doc.compile(),
            SubjectEntry::LegacyRole { role } => {
                Ok(AttributeFilter::one_of(USER_ROLES_KEY, [role.as_str()]))
            }
        }
    }
}

impl ResourceEntry {
    fn compile(&self) -> Result<AttributeFilter, PolicyError> {
        match self {
            ResourceEntry::Filter(doc) => doc.compile(),
            ResourceEntry::LegacyType(kind) => {
                Ok(AttributeFilter::one_of(RESOURCE_TYPE_KEY, [kind.as_str()]))
            }
        }
    }
}

impl TryFrom<PolicyDocument> for Policy {
    type Error = PolicyError;

    fn try_from(doc: PolicyDocument) -> Result<Self, Self::Error> {
        if doc.name.trim().is_empty() {
            return Err(PolicyError::MissingName);
        }

        let subjects = doc
            .subjects
            .iter()
            .map(SubjectEntry::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let resources = doc
            .resources
            .iter()
            .map(ResourceEntry::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let query_conditions = doc
            .query_conditions
            .iter()
            .map(|qc| {
                Ok(QueryCondition {
                    resource_attribute: qc.resource_attribute.clone(),
                    operator: qc.operator.parse()?,
                    subject_attribute: qc.subject_attribute.clone(),
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;
        let conditions = doc.conditions.as_ref().map(parse_condition).transpose()?;

        Ok(Policy {
            id: doc.id,
            effect: doc.effect.parse()?,
            name: doc.name,
            description: doc.description,
            actions: doc.actions,
            subjects,
            resources,
            query_conditions,
            conditions,
            is_active: doc.is_active,
        })
    }
}

fn filter_document(filter: &AttributeFilter) -> AttributeFilterDocument {
    AttributeFilterDocument {
        key: filter.key.clone(),
        operator: filter.operator.as_str().to_string(),
        value: filter.values.clone(),
    }
}

impl From<&Policy> for PolicyDocument {
    fn from(policy: &Policy) -> Self {
        PolicyDocument {
            id: policy.id,
            name: policy.name.clone(),
            description: policy.description.clone(),
            effect: policy.effect.as_str().to_string(),
            actions: policy.actions.clone(),
            subjects: policy
                .subjects
                .iter()
                .map(|f| SubjectEntry::Filter(filter_document(f)))
                .collect(),
            resources: policy
                .resources
                .iter()
                .map(|f| ResourceEntry::Filter(filter_document(f)))
                .collect(),
            query_conditions: policy
                .query_conditions
                .iter()
                .map(|qc| QueryConditionDocument {
                    resource_attribute: qc.resource_attribute.clone(),
                    operator: qc.operator.as_str().to_string(),
                    subject_attribute: qc.subject_attribute.clone(),
                })
                .collect(),
            conditions: policy.conditions.as_ref().map(condition_to_json),
            is_active: policy.is_active,
        }
    }
}

// ============================================================================
// Rule Trees
// ============================================================================

fn malformed(reason: impl Into<String>) -> PolicyError {
    PolicyError::MalformedRule(reason.into())
}

fn required_str<'a>(map: &'a Map<String, Value>, field: &str) -> Result<&'a str, PolicyError> {
    map.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("`{field}` must be a string")))
}

/// Parses a rule tree:
///
/// ```text
/// Rule    := { "operator": "AND" | "OR", "rules": [Rule | Call | Compare] }
/// Call    := { "function": name, "args": [path] }
/// Compare := { "attribute": path, "operator": op, "value": literal }
/// ```
pub fn parse_condition(value: &Value) -> Result<Condition, PolicyError> {
    let Value::Object(map) = value else {
        return Err(malformed(format!("expected an object, got {value}")));
    };

    if let Some(rules) = map.get("rules") {
        let Value::Array(items) = rules else {
            return Err(malformed("`rules` must be an array"));
        };
        let children = items
            .iter()
            .map(parse_condition)
            .collect::<Result<Vec<_>, _>>()?;
        return match map.get("operator").and_then(Value::as_str).unwrap_or("AND") {
            "AND" => Ok(Condition::All(children)),
            "OR" => Ok(Condition::Any(children)),
            other => Err(PolicyError::UnknownOperator {
                context: "logical",
                operator: other.to_string(),
            }),
        };
    }

    if map.contains_key("function") {
        let name = required_str(map, "function")?;
        let function = name
            .parse::<Function>()
            .map_err(|_| PolicyError::UnknownFunction(name.to_string()))?;
        let args = match map.get("args") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(ToString::to_string)
                        .ok_or_else(|| malformed("function arguments must be attribute paths"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(malformed("`args` must be an array")),
        };
        return Ok(Condition::Call { function, args });
    }

    let attribute = required_str(map, "attribute")?.to_string();
    let op = required_str(map, "operator")?.parse()?;
    let value = map
        .get("value")
        .ok_or_else(|| malformed("comparison has no `value`"))
        .and_then(literal)?;
    Ok(Condition::Compare { attribute, op, value })
}

fn scalar_literal(value: &Value) -> Result<Scalar, PolicyError> {
    match value {
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| n.as_f64().map(Scalar::Float))
            .ok_or_else(|| malformed(format!("unrepresentable number {n}"))),
        Value::String(s) => Ok(Scalar::Text(s.clone())),
        other => Err(malformed(format!("unsupported literal {other}"))),
    }
}

fn literal(value: &Value) -> Result<AttributeValue, PolicyError> {
    match value {
        Value::Array(items) => Ok(AttributeValue::Sequence(
            items.iter().map(scalar_literal).collect::<Result<_, _>>()?,
        )),
        other => scalar_literal(other).map(AttributeValue::Scalar),
    }
}

fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(i) => Value::from(*i),
        Scalar::Float(f) => Value::from(*f),
        Scalar::Time(t) => Value::String(t.to_rfc3339()),
        Scalar::Text(s) => Value::String(s.clone()),
    }
}

/// Inverse of [`parse_condition`].
pub fn condition_to_json(condition: &Condition) -> Value {
    match condition {
        Condition::All(children) | Condition::Any(children) => {
            let operator = if matches!(condition, Condition::All(_)) { "AND" } else { "OR" };
            serde_json::json!({
                "operator": operator,
                "rules": children.iter().map(condition_to_json).collect::<Vec<_>>(),
            })
        }
        Condition::Call { function, args } => serde_json::json!({
            "function": function.name(),
            "args": args,
        }),
        Condition::Compare { attribute, op, value } => {
            let value = match value {
                AttributeValue::Scalar(s) => scalar_to_json(s),
                AttributeValue::Sequence(items) => {
                    Value::Array(items.iter().map(scalar_to_json).collect())
                }
            };
            serde_json::json!({
                "attribute": attribute,
                "operator": op.as_str(),
                "value": value,
            })
        }
    }
}

// ============================================================================
// Policy Set
// ============================================================================

/// A document that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPolicy {
    /// Position in the input.
    pub index: usize,
    pub name: String,
    pub error: PolicyError,
}

/// An ordered set of compiled policies plus the documents that were rejected.
///
/// One bad document never prevents the rest from loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicySet {
    policies: Vec<Policy>,
    rejected: Vec<RejectedPolicy>,
}

impl PolicySet {
    /// Compiles documents in order, collecting failures.
    pub fn compile<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = PolicyDocument>,
    {
        let mut set = PolicySet::default();
        for (index, doc) in documents.into_iter().enumerate() {
            let name = doc.name.clone();
            match Policy::try_from(doc) {
                Ok(policy) => set.policies.push(policy),
                Err(error) => set.reject(index, name, error),
            }
        }
        set
    }

    /// Parses a JSON array of documents, compiling each independently.
    ///
    /// Fails only if the input is not a JSON array.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        let values: Vec<Value> = serde_json::from_str(input)?;
        let mut set = PolicySet::default();
        for (index, value) in values.into_iter().enumerate() {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match PolicyDocument::from_value(value).and_then(Policy::try_from) {
                Ok(policy) => set.policies.push(policy),
                Err(error) => set.reject(index, name, error),
            }
        }
        Ok(set)
    }

    fn reject(&mut self, index: usize, name: String, error: PolicyError) {
        warn!(policy = %name, index, error = %error, "rejected policy document");
        self.rejected.push(RejectedPolicy { index, name, error });
    }

    /// Compiled policies in document order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Documents that failed to compile.
    pub fn rejected(&self) -> &[RejectedPolicy] {
        &self.rejected
    }

    pub fn into_policies(self) -> Vec<Policy> {
        self.policies
    }
}
