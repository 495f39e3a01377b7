//! ABAC policy evaluation engine.
//!
//! Evaluates a point access check against an ordered policy set with
//! deny-overrides semantics:
//!
//! 1. Inactive policies are ignored.
//! 2. Deny pass: the first matching deny policy denies.
//! 3. Allow pass: the first matching allow policy allows.
//! 4. Otherwise access is denied.
//!
//! A policy that fails to evaluate is treated as non-matching and recorded
//! in [`Decision::faults`]; it never changes the outcome of other policies.

use tracing::{debug, warn};

use crate::matcher::{AccessRequest, MatchError, matches};
use crate::policy::{Effect, Policy};

// ============================================================================
// Decision
// ============================================================================

/// A policy that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFault {
    pub policy: String,
    pub error: MatchError,
}

/// The result of evaluating an access request against a policy set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether access is allowed or denied.
    pub effect: Effect,
    /// The name of the policy that decided, or `None` for the default deny.
    pub matched_policy: Option<String>,
    /// Human-readable explanation of why this decision was made.
    pub reason: String,
    /// Policies skipped because they failed to evaluate.
    pub faults: Vec<PolicyFault>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Evaluates an access request with deny-overrides.
///
/// # Postcondition
///
/// Always returns a `Decision`; never panics on valid input.
pub fn evaluate(policies: &[Policy], request: &AccessRequest<'_>) -> Decision {
    let mut faults = Vec::new();

    for effect in [Effect::Deny, Effect::Allow] {
        let pass = policies
            .iter()
            .filter(|p| p.is_active && p.effect == effect);

        for policy in pass {
            match matches(policy, request) {
                Ok(true) => {
                    debug!(
                        policy = %policy.name,
                        effect = %effect,
                        action = request.action,
                        resource_type = request.resource_type,
                        "policy matched"
                    );
                    return Decision {
                        effect,
                        matched_policy: Some(policy.name.clone()),
                        reason: format!("Matched {effect} policy '{}'", policy.name),
                        faults,
                    };
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(policy = %policy.name, error = %error, "policy evaluation failed, treating as non-matching");
                    faults.push(PolicyFault {
                        policy: policy.name.clone(),
                        error,
                    });
                }
            }
        }
    }

    debug!(
        action = request.action,
        resource_type = request.resource_type,
        "no policy matched, denying by default"
    );
    Decision {
        effect: Effect::Deny,
        matched_policy: None,
        reason: "No policy matched; denying by default".to_string(),
        faults,
    }
}

/// Returns whether the request is permitted.
pub fn decide(policies: &[Policy], request: &AccessRequest<'_>) -> bool {
    evaluate(policies, request).is_allowed()
}

// ============================================================================
// Tests
// ============================================================================
