//! ABAC policy definitions.
//!
//! A policy grants or denies a set of actions on a set of resource types to
//! the subjects its filters select. Allow policies may narrow the grant to
//! resource instances related to the subject through query conditions
//! (e.g. `resource.owner_id == user.id`).
//!
//! These are the typed, validated forms. The JSON wire form lives in
//! [`crate::document`] and is compiled into these types at load time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;
use crate::functions::Function;

/// Attribute key that gates which resource types a policy applies to.
pub const RESOURCE_TYPE_KEY: &str = "resource.type";

/// Attribute key holding the subject's role names.
pub const USER_ROLES_KEY: &str = "user.roles";

/// Matches every action or every resource type.
pub const WILDCARD: &str = "*";

/// Errors raised while compiling a policy document into a [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy has no name")]
    MissingName,

    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("unknown {context} operator: {operator}")]
    UnknownOperator {
        context: &'static str,
        operator: String,
    },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("malformed rule: {0}")]
    MalformedRule(String),

    #[error("invalid policy document: {0}")]
    InvalidDocument(String),
}

// ============================================================================
// Effect
// ============================================================================

/// The effect of a policy: allow or deny access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant access.
    Allow,
    /// Deny access. Overrides every matching allow.
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl FromStr for Effect {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            other => Err(PolicyError::UnknownEffect(other.to_string())),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Attribute Filter
// ============================================================================

/// Operator of an [`AttributeFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// The resolved value equals the single expected value.
    Eq,
    /// The resolved sequence shares an element with the expected values.
    /// A scalar value never matches.
    In,
    /// The resolved sequence contains the single expected value.
    Contains,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::In => "in",
            FilterOperator::Contains => "contains",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOperator::Eq),
            "in" => Ok(FilterOperator::In),
            "contains" => Ok(FilterOperator::Contains),
            other => Err(PolicyError::UnknownOperator {
                context: "attribute filter",
                operator: other.to_string(),
            }),
        }
    }
}

/// A predicate over one attribute path, used for subject and resource clauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeFilter {
    pub key: String,
    pub operator: FilterOperator,
    pub values: Vec<String>,
}

impl AttributeFilter {
    pub fn new<I, S>(key: &str, operator: FilterOperator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.to_string(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `key in [values]`.
    pub fn one_of<I, S>(key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(key, FilterOperator::In, values)
    }

    /// `key == value`.
    pub fn equals(key: &str, value: &str) -> Self {
        Self::new(key, FilterOperator::Eq, [value])
    }

    /// `value in key` where `key` resolves to a sequence.
    pub fn contains(key: &str, value: &str) -> Self {
        Self::new(key, FilterOperator::Contains, [value])
    }

    /// Subjects holding any of the given roles.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::one_of(USER_ROLES_KEY, roles)
    }

    /// Resource types the policy applies to. `"*"` matches any type.
    pub fn resource_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::one_of(RESOURCE_TYPE_KEY, types)
    }
}

// ============================================================================
// Query Condition
// ============================================================================

/// Operator of a [`QueryCondition`]. Only equality is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOperator {
    Eq,
}

impl QueryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryOperator::Eq => "eq",
        }
    }
}

impl FromStr for QueryOperator {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(QueryOperator::Eq),
            other => Err(PolicyError::UnknownOperator {
                context: "query condition",
                operator: other.to_string(),
            }),
        }
    }
}

/// Relates a resource field to a subject attribute:
/// `resource.<resource_attribute> == user.<subject_attribute>`.
///
/// Checked against concrete instances by the evaluator and compiled into a
/// row predicate by the filter compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryCondition {
    pub resource_attribute: String,
    pub operator: QueryOperator,
    pub subject_attribute: String,
}

impl QueryCondition {
    /// `resource.<resource_attribute> == user.<subject_attribute>`.
    pub fn eq(resource_attribute: &str, subject_attribute: &str) -> Self {
        Self {
            resource_attribute: resource_attribute.to_string(),
            operator: QueryOperator::Eq,
            subject_attribute: subject_attribute.to_string(),
        }
    }

    /// Full path of the resource side.
    pub fn resource_path(&self) -> String {
        format!("resource.{}", self.resource_attribute)
    }

    /// Full path of the subject side.
    pub fn subject_path(&self) -> String {
        format!("user.{}", self.subject_attribute)
    }
}

// ============================================================================
// Rule-tree Conditions
// ============================================================================

/// Comparison operator of a [`Condition::Compare`] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equals,
    NotEquals,
    In,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Equals => "equals",
            CompareOp::NotEquals => "not_equals",
            CompareOp::In => "in",
            CompareOp::GreaterThan => "greater_than",
            CompareOp::GreaterThanOrEqual => "greater_than_or_equal",
            CompareOp::LessThan => "less_than",
            CompareOp::LessThanOrEqual => "less_than_or_equal",
        }
    }
}

impl FromStr for CompareOp {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "equals" => CompareOp::Equals,
            "not_equals" => CompareOp::NotEquals,
            "in" => CompareOp::In,
            "greater_than" => CompareOp::GreaterThan,
            "greater_than_or_equal" => CompareOp::GreaterThanOrEqual,
            "less_than" => CompareOp::LessThan,
            "less_than_or_equal" => CompareOp::LessThanOrEqual,
            other => {
                return Err(PolicyError::UnknownOperator {
                    context: "comparison",
                    operator: other.to_string(),
                });
            }
        })
    }
}

/// A rule-tree condition evaluated after the subject clause.
///
/// Conditions combine with `All` / `Any` to express arbitrarily nested logic.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Every child must hold. Empty is true.
    All(Vec<Condition>),
    /// At least one child must hold. Empty is false.
    Any(Vec<Condition>),
    /// A registered function applied to resolved attribute paths.
    Call { function: Function, args: Vec<String> },
    /// An attribute compared against a literal.
    Compare {
        attribute: String,
        op: CompareOp,
        value: AttributeValue,
    },
}

impl Condition {
    /// `function(args...)`.
    pub fn call(function: Function, args: &[&str]) -> Self {
        Condition::Call {
            function,
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// `attribute <op> value`.
    pub fn compare(attribute: &str, op: CompareOp, value: impl Into<AttributeValue>) -> Self {
        Condition::Compare {
            attribute: attribute.to_string(),
            op,
            value: value.into(),
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// A compiled ABAC policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Store identifier, if the policy came from a store.
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub effect: Effect,
    /// Actions covered. Empty or containing `"*"` covers every action.
    pub actions: Vec<String>,
    /// Subject filters, OR-combined. Empty selects every subject.
    pub subjects: Vec<AttributeFilter>,
    /// Resource filters. A `resource.type` filter gates applicability.
    pub resources: Vec<AttributeFilter>,
    /// Instance conditions, AND-combined. Empty is unconditional.
    pub query_conditions: Vec<QueryCondition>,
    /// Optional rule tree.
    pub conditions: Option<Condition>,
    pub is_active: bool,
}

impl Policy {
    /// Creates an active policy with no clauses.
    pub fn new(name: &str, effect: Effect) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            description: None,
            effect,
            actions: Vec::new(),
            subjects: Vec::new(),
            resources: Vec::new(),
            query_conditions: Vec::new(),
            conditions: None,
            is_active: true,
        }
    }

    /// Creates an allow policy.
    pub fn allow(name: &str) -> Self {
        Self::new(name, Effect::Allow)
    }

    /// Creates a deny policy.
    pub fn deny(name: &str) -> Self {
        Self::new(name, Effect::Deny)
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subject(mut self, filter: AttributeFilter) -> Self {
        self.subjects.push(filter);
        self
    }

    pub fn with_resource(mut self, filter: AttributeFilter) -> Self {
        self.resources.push(filter);
        self
    }

    /// Shorthand for a `resource.type in [types]` resource filter.
    pub fn on_resource_types<I, S>(self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_resource(AttributeFilter::resource_types(types))
    }

    pub fn with_query_condition(mut self, condition: QueryCondition) -> Self {
        self.query_conditions.push(condition);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions = Some(condition);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

// ============================================================================
// Standard Policies
// ============================================================================

/// Content types managed by the content manager role.
const CONTENT_TYPES: [&str; 2] = ["rag_data", "rag_file"];

/// Pre-built policies provisioned on a fresh installation.
///
/// Roles: `admin`, `content_manager`, `standard_user`.
pub struct StandardPolicies;

impl StandardPolicies {
    /// Administrators may perform every action on every resource type.
    pub fn admin_full_access() -> Policy {
        Policy::allow("Allow Admin Full Access")
            .with_description("Grants administrators unrestricted access to all resources and actions.")
            .with_subject(AttributeFilter::roles(["admin"]))
            .with_actions([WILDCARD])
            .on_resource_types([WILDCARD])
    }

    /// Content managers manage knowledge-base data and files.
    pub fn content_manager_content() -> Policy {
        Policy::allow("Allow Content Manager to Manage Content (RAG, Files)")
            .with_subject(AttributeFilter::roles(["content_manager"]))
            .with_actions([
                "create",
                "read",
                "update",
                "delete",
                "manage",
                "read_list",
                "read_files",
                "upload_file",
                "delete_file",
                "preview_file",
                "query",
            ])
            .on_resource_types(CONTENT_TYPES)
    }

    /// Content managers may list users, roles and policies.
    pub fn content_manager_core_lists() -> Policy {
        Policy::allow("Allow Content Manager Read-Only Access to Core Data Lists")
            .with_subject(AttributeFilter::roles(["content_manager"]))
            .with_actions(["read_list"])
            .on_resource_types(["user", "role", "policy"])
    }

    /// Standard users may create and read chats.
    pub fn standard_user_chat() -> Policy {
        Policy::allow("Allow Standard User to Use Chat")
            .with_subject(AttributeFilter::roles(["standard_user"]))
            .with_actions(["create", "read"])
            .on_resource_types(["chat"])
    }

    /// Every subject may read and update its own user record.
    pub fn own_profile() -> Policy {
        Policy::allow("Allow User to Manage Their Own Profile")
            .with_description("Allows any user to view and update their own user object.")
            .with_actions(["read", "update"])
            .on_resource_types(["user"])
            .with_query_condition(QueryCondition::eq("owner_id", "id"))
    }

    /// Every subject may list and manage the files it uploaded.
    pub fn own_files() -> Policy {
        Policy::allow("Allow User to Manage Their Own Files (List & CRUD)")
            .with_actions(["create", "read", "update", "delete", "read_list"])
            .on_resource_types(["file"])
            .with_query_condition(QueryCondition::eq("user_id", "id"))
    }

    /// The full seed set, in provisioning order.
    pub fn seed() -> Vec<Policy> {
        vec![
            Self::admin_full_access(),
            Self::content_manager_content(),
            Self::content_manager_core_lists(),
            Self::standard_user_chat(),
            Self::own_profile(),
            Self::own_files(),
        ]
    }
}

// ============================================================================
// Tests
// ============================================================================
