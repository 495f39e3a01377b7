//! # warden-abac: Attribute-Based Access Control
//!
//! Decides whether a subject may perform an action on a resource, and
//! compiles the same declarative policies into row filters so list queries
//! return only permitted rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Access Request                              │
//! │  (user + action + resource + environment)    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Attribute Namespace                         │
//! │  └─ dotted paths, through lists of records   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌──────────────────┐ ┌──────────────────────┐
//! │  Evaluator       │ │  Filter Compiler     │
//! │  ├─ deny pass    │ │  ├─ allow policies   │
//! │  ├─ allow pass   │ │  ├─ unconditional ⇒  │
//! │  └─ default deny │ │  │  all rows         │
//! │                  │ │  └─ OR of ANDs       │
//! └────────┬─────────┘ └──────────┬───────────┘
//!          ▼                      ▼
//!      Decision             FilterExpression
//! ```
//!
//! Both paths share the per-policy [`matcher`]. Policies arrive as JSON
//! [`document::PolicyDocument`]s and are compiled once; unknown operators and
//! function names are rejected at load time.
//!
//! ## Examples
//!
//! ```
//! use warden_abac::attributes::{
//!     AttributeNamespace, EnvironmentAttributes, ResourceAttributes, ResourceRecord,
//!     UserAttributes,
//! };
//! use warden_abac::matcher::AccessRequest;
//! use warden_abac::policy::StandardPolicies;
//! use warden_abac::evaluator;
//!
//! let policies = StandardPolicies::seed();
//! let user = UserAttributes::new(5).with_roles(["standard_user"]);
//! let file = ResourceAttributes::from_record(
//!     "file",
//!     &ResourceRecord::new().with_field("id", 10).with_field("user_id", 5),
//! );
//! let ns = AttributeNamespace::new(&user, "read", &file, &EnvironmentAttributes::now());
//!
//! assert!(evaluator::decide(&policies, &AccessRequest::new(&ns, "read", "file")));
//! ```

pub mod attributes;
pub mod document;
pub mod evaluator;
pub mod filter;
pub mod functions;
pub mod matcher;
pub mod policy;

pub use attributes::{
    AttributeNamespace, AttributeValue, EnvironmentAttributes, ResourceAttributes, ResourceRecord,
    Scalar, UserAttributes,
};
pub use document::{PolicyDocument, PolicySet};
pub use evaluator::{Decision, decide, evaluate};
pub use filter::{FilterExpression, compile};
pub use functions::Function;
pub use matcher::{AccessRequest, MatchError};
pub use policy::{Effect as PolicyEffect, Policy, PolicyError, StandardPolicies};
