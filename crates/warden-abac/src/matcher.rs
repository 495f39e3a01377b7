//! Per-policy matching shared by point checks and bulk filter compilation.
//!
//! A policy matches a request when, in order:
//!
//! 1. its actions are empty, contain `"*"`, or contain the action;
//! 2. one of its `resource.type` filters admits the resource type;
//! 3. its subject filters are empty, or any one of them holds;
//! 4. its rule tree, if any, holds;
//! 5. every query condition holds.
//!
//! Matching short-circuits on the first failing step. Malformed clauses are
//! reported as [`MatchError`] rather than panicking; callers treat an error
//! as "does not match".

use std::cmp::Ordering;

use tracing::trace;

use crate::attributes::{AttributeNamespace, AttributeValue, Scalar};
use crate::functions::FunctionError;
use crate::policy::{
    AttributeFilter, CompareOp, Condition, FilterOperator, Policy, QueryOperator,
    RESOURCE_TYPE_KEY, WILDCARD,
};

/// Errors raised while matching a single policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("malformed policy: {0}")]
    MalformedPolicy(String),

    #[error(transparent)]
    Function(#[from] FunctionError),
}

/// The inputs of one access check.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub namespace: &'a AttributeNamespace,
    pub action: &'a str,
    pub resource_type: &'a str,
}

impl<'a> AccessRequest<'a> {
    pub fn new(namespace: &'a AttributeNamespace, action: &'a str, resource_type: &'a str) -> Self {
        Self {
            namespace,
            action,
            resource_type,
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Full match of one policy against a request, query conditions included.
///
/// A resource without the attributes a query condition names does not match.
pub fn matches(policy: &Policy, request: &AccessRequest<'_>) -> Result<bool, MatchError> {
    if !is_applicable(policy, request.namespace, request.action, request.resource_type)? {
        return Ok(false);
    }
    matches_query_conditions(policy, request.namespace)
}

/// Steps 1-4: action, resource type, subject and rule tree. Query conditions
/// are not consulted; the filter compiler turns them into row predicates.
pub fn is_applicable(
    policy: &Policy,
    namespace: &AttributeNamespace,
    action: &str,
    resource_type: &str,
) -> Result<bool, MatchError> {
    if !matches_action(policy, action) {
        trace!(policy = %policy.name, action, "action not covered");
        return Ok(false);
    }
    if !matches_resource_type(policy, resource_type)? {
        trace!(policy = %policy.name, resource_type, "resource type not covered");
        return Ok(false);
    }
    if !matches_subject(policy, namespace)? {
        trace!(policy = %policy.name, "subject not selected");
        return Ok(false);
    }
    if let Some(condition) = &policy.conditions {
        if !evaluate_condition(condition, namespace)? {
            trace!(policy = %policy.name, "rule tree not satisfied");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Step 1.
pub fn matches_action(policy: &Policy, action: &str) -> bool {
    policy.actions.is_empty() || policy.actions.iter().any(|a| a == WILDCARD || a == action)
}

/// Step 2. Filters on keys other than `resource.type` do not gate.
pub fn matches_resource_type(policy: &Policy, resource_type: &str) -> Result<bool, MatchError> {
    for filter in policy.resources.iter().filter(|f| f.key == RESOURCE_TYPE_KEY) {
        let admitted = match filter.operator {
            FilterOperator::In => filter
                .values
                .iter()
                .any(|v| v == WILDCARD || v == resource_type),
            FilterOperator::Eq => single_value(filter)? == resource_type,
            FilterOperator::Contains => false,
        };
        if admitted {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Step 3. Filters are OR-combined; a filter whose key does not resolve
/// never holds. `in` needs a sequence value such as `user.roles`.
pub fn matches_subject(policy: &Policy, namespace: &AttributeNamespace) -> Result<bool, MatchError> {
    if policy.subjects.is_empty() {
        return Ok(true);
    }

    for filter in &policy.subjects {
        let Some(resolved) = namespace.resolve(&filter.key) else {
            continue;
        };
        let holds = match filter.operator {
            FilterOperator::In => resolved.intersects(&filter.values),
            FilterOperator::Eq => {
                let expected = Scalar::from(single_value(filter)?);
                resolved.as_scalar().is_some_and(|s| s.same_as(&expected))
            }
            FilterOperator::Contains => {
                let expected = Scalar::from(single_value(filter)?);
                matches!(&resolved, AttributeValue::Sequence(items) if items.iter().any(|s| s.same_as(&expected)))
            }
        };
        if holds {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Step 5. Every condition must resolve on both sides and compare equal.
pub fn matches_query_conditions(
    policy: &Policy,
    namespace: &AttributeNamespace,
) -> Result<bool, MatchError> {
    for condition in &policy.query_conditions {
        let resource_value = namespace.resolve(&condition.resource_path());
        let subject_value = namespace.resolve(&condition.subject_path());
        let (Some(resource_value), Some(subject_value)) = (resource_value, subject_value) else {
            trace!(
                policy = %policy.name,
                resource_attribute = %condition.resource_attribute,
                subject_attribute = %condition.subject_attribute,
                "query condition unresolved"
            );
            return Ok(false);
        };
        let holds = match condition.operator {
            QueryOperator::Eq => resource_value.same_as(&subject_value),
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// Rule-tree Evaluation
// ============================================================================

/// Recursively evaluates a rule tree.
pub fn evaluate_condition(
    condition: &Condition,
    namespace: &AttributeNamespace,
) -> Result<bool, MatchError> {
    match condition {
        Condition::All(children) => {
            for child in children {
                if !evaluate_condition(child, namespace)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any(children) => {
            for child in children {
                if evaluate_condition(child, namespace)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Call { function, args } => {
            if args.len() != function.arity() {
                return Err(FunctionError::Arity {
                    function: *function,
                    expected: function.arity(),
                    found: args.len(),
                }
                .into());
            }
            let mut resolved = Vec::with_capacity(args.len());
            for path in args {
                match namespace.resolve(path) {
                    Some(value) => resolved.push(value),
                    None => return Ok(false),
                }
            }
            Ok(function.call(&resolved)?)
        }
        Condition::Compare { attribute, op, value } => Ok(namespace
            .resolve(attribute)
            .is_some_and(|actual| compare(&actual, *op, value))),
    }
}

fn compare(actual: &AttributeValue, op: CompareOp, expected: &AttributeValue) -> bool {
    let ordered = |accept: fn(Ordering) -> bool| match (actual.as_scalar(), expected.as_scalar()) {
        (Some(a), Some(b)) => a.compare(b).is_some_and(accept),
        _ => false,
    };

    match op {
        CompareOp::Equals => actual.same_as(expected),
        CompareOp::NotEquals => !actual.same_as(expected),
        CompareOp::In => actual
            .elements()
            .iter()
            .any(|a| expected.elements().iter().any(|e| a.same_as(e))),
        CompareOp::GreaterThan => ordered(Ordering::is_gt),
        CompareOp::GreaterThanOrEqual => ordered(Ordering::is_ge),
        CompareOp::LessThan => ordered(Ordering::is_lt),
        CompareOp::LessThanOrEqual => ordered(Ordering::is_le),
    }
}

fn single_value(filter: &AttributeFilter) -> Result<&str, MatchError> {
    match filter.values.as_slice() {
        [value] => Ok(value),
        values => Err(MatchError::MalformedPolicy(format!(
            "`{}` filter on `{}` expects exactly one value, got {}",
            filter.operator.as_str(),
            filter.key,
            values.len()
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
