//! Bulk filter compilation for list queries.
//!
//! Instead of evaluating every row, a list endpoint compiles the subject's
//! allow policies once into a [`FilterExpression`] and hands it to the
//! storage layer:
//!
//! - a matching allow policy without query conditions grants the whole
//!   resource type ([`FilterExpression::All`]);
//! - a matching allow policy with query conditions contributes one
//!   conjunction of `column == value` predicates;
//! - conjunctions are OR-combined; no contribution at all yields
//!   [`FilterExpression::Nothing`].
//!
//! Deny policies are not modelled here. A row returned by a list query can
//! still be refused by a later point check if a deny policy matches it.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::attributes::{
    AttributeNamespace, AttributeNode, AttributeValue, ResourceAttributes, Scalar, resolve,
};
use crate::matcher::is_applicable;
use crate::policy::{Effect, Policy};

/// Errors raised while rendering a filter for a store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid column identifier: {0:?}")]
    InvalidColumn(String),

    #[error("column {column} is compared against a sequence, which has no SQL equality")]
    UnsupportedValue { column: String },
}

// ============================================================================
// Filter Expression
// ============================================================================

/// `column == value` on a resource row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPredicate {
    pub column: String,
    pub value: AttributeValue,
}

impl FieldPredicate {
    fn holds(&self, row: &AttributeNode) -> bool {
        resolve(&self.column, row).is_some_and(|v| v.same_as(&self.value))
    }
}

/// Predicates that must all hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Conjunction {
    pub predicates: Vec<FieldPredicate>,
}

/// A row-level filter for one list query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "any_of", rename_all = "snake_case")]
pub enum FilterExpression {
    /// Every row is visible.
    All,
    /// No row is visible.
    Nothing,
    /// Rows matching at least one conjunction are visible.
    AnyOf(Vec<Conjunction>),
}

impl FilterExpression {
    /// Evaluates the filter against one row in memory.
    ///
    /// Uses the same equality as the point check, so a row passes exactly
    /// when an allow policy's query conditions would hold for it.
    pub fn matches(&self, resource: &ResourceAttributes) -> bool {
        match self {
            FilterExpression::All => true,
            FilterExpression::Nothing => false,
            FilterExpression::AnyOf(conjunctions) => {
                let row = resource.to_node();
                conjunctions
                    .iter()
                    .any(|c| c.predicates.iter().all(|p| p.holds(&row)))
            }
        }
    }

    /// Renders the filter as a parameterised SQL boolean expression.
    ///
    /// ```
    /// use warden_abac::attributes::{AttributeValue, Scalar};
    /// use warden_abac::filter::{Conjunction, FieldPredicate, FilterExpression};
    ///
    /// let filter = FilterExpression::AnyOf(vec![Conjunction {
    ///     predicates: vec![FieldPredicate {
    ///         column: "user_id".into(),
    ///         value: AttributeValue::Scalar(Scalar::Int(5)),
    ///     }],
    /// }]);
    ///
    /// let sql = filter.to_sql().unwrap();
    /// assert_eq!(sql.clause, "(user_id = ?)");
    /// assert_eq!(sql.params, vec![Scalar::Int(5)]);
    /// assert_eq!(FilterExpression::All.to_sql().unwrap().clause, "1=1");
    /// ```
    pub fn to_sql(&self) -> Result<SqlFilter, FilterError> {
        let conjunctions = match self {
            FilterExpression::All => return Ok(SqlFilter::constant("1=1")),
            FilterExpression::Nothing => return Ok(SqlFilter::constant("1=0")),
            FilterExpression::AnyOf(conjunctions) => conjunctions,
        };

        let mut params = Vec::new();
        let mut groups = Vec::with_capacity(conjunctions.len());
        for conjunction in conjunctions {
            let mut parts = Vec::with_capacity(conjunction.predicates.len());
            for predicate in &conjunction.predicates {
                validate_identifier(&predicate.column)?;
                let AttributeValue::Scalar(value) = &predicate.value else {
                    return Err(FilterError::UnsupportedValue {
                        column: predicate.column.clone(),
                    });
                };
                parts.push(format!("{} = ?", predicate.column));
                params.push(value.clone());
            }
            groups.push(format!("({})", parts.join(" AND ")));
        }

        Ok(SqlFilter {
            clause: groups.join(" OR "),
            params,
        })
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpression::All => f.write_str("ALL"),
            FilterExpression::Nothing => f.write_str("NOTHING"),
            FilterExpression::AnyOf(conjunctions) => {
                let groups: Vec<String> = conjunctions
                    .iter()
                    .map(|c| {
                        let parts: Vec<String> = c
                            .predicates
                            .iter()
                            .map(|p| format!("{} == {}", p.column, p.value))
                            .collect();
                        format!("({})", parts.join(" AND "))
                    })
                    .collect();
                f.write_str(&groups.join(" OR "))
            }
        }
    }
}

/// A SQL boolean expression with positional `?` parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<Scalar>,
}

impl SqlFilter {
    fn constant(clause: &str) -> Self {
        Self {
            clause: clause.to_string(),
            params: Vec::new(),
        }
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_.]*`.
fn validate_identifier(column: &str) -> Result<(), FilterError> {
    let mut chars = column.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(column.to_string()))
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Compiles the allow policies that apply to the subject into a row filter.
///
/// `namespace` carries the subject's attributes; its `resource` section is
/// expected to hold only the type, so rule trees that depend on a concrete
/// resource fail closed.
pub fn compile(
    policies: &[Policy],
    namespace: &AttributeNamespace,
    action: &str,
    resource_type: &str,
) -> FilterExpression {
    let mut conjunctions = Vec::new();

    let allows = policies
        .iter()
        .filter(|p| p.is_active && p.effect == Effect::Allow);
    for policy in allows {
        match is_applicable(policy, namespace, action, resource_type) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(error) => {
                warn!(policy = %policy.name, error = %error, "policy evaluation failed, skipping in filter");
                continue;
            }
        }

        if policy.query_conditions.is_empty() {
            debug!(policy = %policy.name, resource_type, "unconditional grant");
            return FilterExpression::All;
        }

        match conjunction_for(policy, namespace) {
            Some(conjunction) => conjunctions.push(conjunction),
            None => debug!(
                policy = %policy.name,
                "subject attribute unresolved, policy contributes no rows"
            ),
        }
    }

    if conjunctions.is_empty() {
        FilterExpression::Nothing
    } else {
        FilterExpression::AnyOf(conjunctions)
    }
}

fn conjunction_for(policy: &Policy, namespace: &AttributeNamespace) -> Option<Conjunction> {
    let predicates = policy
        .query_conditions
        .iter()
        .map(|qc| {
            Some(FieldPredicate {
                column: qc.resource_attribute.clone(),
                value: namespace.resolve(&qc.subject_path())?,
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(Conjunction { predicates })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{EnvironmentAttributes, ResourceRecord, UserAttributes};
    use crate::policy::{AttributeFilter, FilterOperator, QueryCondition, StandardPolicies};
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    fn subject_namespace(user: &UserAttributes, resource_type: &str) -> AttributeNamespace {
        let ts = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
        AttributeNamespace::new(
            user,
            "read_list",
            &ResourceAttributes::of_type(resource_type),
            &EnvironmentAttributes::at(ts),
        )
    }

    fn predicate(column: &str, value: Scalar) -> FieldPredicate {
        FieldPredicate {
            column: column.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_no_policies_is_nothing() {
        let user = UserAttributes::new(5);
        let ns = subject_namespace(&user, "file");
        assert_eq!(compile(&[], &ns, "read_list", "file"), FilterExpression::Nothing);
    }

    #[test]
    fn test_own_files_compiles_to_predicate() {
        let user = UserAttributes::new(5).with_roles(["standard_user"]);
        let ns = subject_namespace(&user, "file");
        let filter = compile(&StandardPolicies::seed(), &ns, "read_list", "file");

        assert_eq!(
            filter,
            FilterExpression::AnyOf(vec![Conjunction {
                predicates: vec![predicate("user_id", Scalar::Int(5))],
            }])
        );
    }

    #[test]
    fn test_unconditional_policy_short_circuits() {
        let user = UserAttributes::new(5).with_roles(["admin"]);
        let ns = subject_namespace(&user, "file");
        assert_eq!(
            compile(&StandardPolicies::seed(), &ns, "read_list", "file"),
            FilterExpression::All
        );
    }

    #[test]
    fn test_deny_policies_are_not_modelled() {
        let user = UserAttributes::new(5).with_roles(["admin"]);
        let ns = subject_namespace(&user, "file");
        let policies = vec![
            Policy::deny("deny-all")
                .with_actions(["*"])
                .on_resource_types(["*"]),
            StandardPolicies::admin_full_access(),
        ];
        assert_eq!(compile(&policies, &ns, "read_list", "file"), FilterExpression::All);
    }

    #[test]
    fn test_unresolved_subject_attribute_contributes_nothing() {
        let user = UserAttributes::new(5);
        let ns = subject_namespace(&user, "file");
        let policies = vec![
            Policy::allow("by-team")
                .with_actions(["read_list"])
                .on_resource_types(["file"])
                .with_query_condition(QueryCondition::eq("team_id", "team_id")),
        ];
        assert_eq!(compile(&policies, &ns, "read_list", "file"), FilterExpression::Nothing);
    }

    #[test]
    fn test_malformed_policy_is_skipped() {
        let user = UserAttributes::new(5).with_roles(["admin"]);
        let ns = subject_namespace(&user, "file");
        let broken = Policy::allow("broken")
            .with_actions(["*"])
            .on_resource_types(["*"])
            .with_subject(AttributeFilter::new(
                "user.id",
                FilterOperator::Contains,
                Vec::<String>::new(),
            ));
        let policies = vec![broken, StandardPolicies::own_files()];

        assert_eq!(
            compile(&policies, &ns, "read_list", "file"),
            FilterExpression::AnyOf(vec![Conjunction {
                predicates: vec![predicate("user_id", Scalar::Int(5))],
            }])
        );
    }

    #[test]
    fn test_conjunctions_are_or_combined() {
        let user = UserAttributes::new(5).with_department("hr");
        let ns = subject_namespace(&user, "file");
        let policies = vec![
            StandardPolicies::own_files(),
            Policy::allow("department")
                .with_actions(["read_list"])
                .on_resource_types(["file"])
                .with_query_condition(QueryCondition::eq("department", "department"))
                .with_query_condition(QueryCondition::eq("shared", "is_active")),
        ];

        let filter = compile(&policies, &ns, "read_list", "file");
        let FilterExpression::AnyOf(conjunctions) = &filter else {
            panic!("expected AnyOf, got {filter:?}");
        };
        assert_eq!(conjunctions.len(), 2);
        assert_eq!(conjunctions[1].predicates.len(), 2);

        let sql = filter.to_sql().unwrap();
        assert_eq!(sql.clause, "(user_id = ?) OR (department = ? AND shared = ?)");
        assert_eq!(sql.params, vec![Scalar::Int(5), Scalar::from("hr"), Scalar::Bool(true)]);
    }

    #[test]
    fn test_matches_rows() {
        let filter = FilterExpression::AnyOf(vec![Conjunction {
            predicates: vec![predicate("user_id", Scalar::Int(5))],
        }]);
        let row = |owner: i64| {
            ResourceAttributes::from_record("file", &ResourceRecord::new().with_field("user_id", owner))
        };

        assert!(filter.matches(&row(5)));
        assert!(!filter.matches(&row(6)));
        assert!(!filter.matches(&ResourceAttributes::of_type("file")));
        assert!(FilterExpression::All.matches(&row(6)));
        assert!(!FilterExpression::Nothing.matches(&row(5)));
    }

    #[test_case("user_id" ; "plain")]
    #[test_case("_private" ; "leading underscore")]
    #[test_case("files.owner_id" ; "qualified")]
    fn test_valid_identifiers(column: &str) {
        assert!(validate_identifier(column).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("1col" ; "leading digit")]
    #[test_case("id; DROP TABLE files" ; "injection")]
    #[test_case("owner-id" ; "dash")]
    fn test_invalid_identifiers(column: &str) {
        assert_eq!(
            validate_identifier(column),
            Err(FilterError::InvalidColumn(column.to_string()))
        );
    }

    #[test]
    fn test_to_sql_constants() {
        assert_eq!(FilterExpression::All.to_sql().unwrap().clause, "1=1");
        assert_eq!(FilterExpression::Nothing.to_sql().unwrap().clause, "1=0");
    }

    #[test]
    fn test_to_sql_rejects_sequences() {
        let filter = FilterExpression::AnyOf(vec![Conjunction {
            predicates: vec![FieldPredicate {
                column: "team".into(),
                value: AttributeValue::Sequence(vec!["a".into()]),
            }],
        }]);
        assert_eq!(
            filter.to_sql(),
            Err(FilterError::UnsupportedValue { column: "team".into() })
        );
    }

    #[test]
    fn test_display() {
        let filter = FilterExpression::AnyOf(vec![Conjunction {
            predicates: vec![predicate("user_id", Scalar::Int(5))],
        }]);
        assert_eq!(filter.to_string(), "(user_id == 5)");
        assert_eq!(FilterExpression::All.to_string(), "ALL");
    }

    #[test]
    fn test_serializes_for_tooling() {
        let filter = FilterExpression::AnyOf(vec![Conjunction {
            predicates: vec![predicate("user_id", Scalar::Int(5))],
        }]);
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            serde_json::json!({
                "kind": "any_of",
                "any_of": [[{ "column": "user_id", "value": 5 }]]
            })
        );
        assert_eq!(
            serde_json::to_value(FilterExpression::Nothing).unwrap(),
            serde_json::json!({ "kind": "nothing" })
        );
    }
}
