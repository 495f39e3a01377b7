//! # Warden
//!
//! Attribute-based access control for applications: point permission checks
//! and row filters for list queries, driven by declarative policies.
//!
//! Warden wraps the pure [`warden_abac`] engine with the I/O it needs:
//!
//! - **Policy store** - where active policy documents live
//! - **Subject store** - users, their roles and attributes
//! - **Key-value cache** - the active policy set and subject bundles, with TTL
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PermissionFacade                       │
//! │  ┌──────────┐   ┌──────────────┐   ┌─────────────────────┐  │
//! │  │  Cache   │ → │ Policy/Subj. │ → │  warden-abac        │  │
//! │  │ (SIEVE + │   │   stores     │   │  evaluate / compile │  │
//! │  │   TTL)   │   │ (on a miss)  │   │  (pure)             │  │
//! │  └──────────┘   └──────────────┘   └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use warden::{
//!     InMemoryPolicyStore, InMemorySubjectStore, MemoryCache, PermissionFacade, ResourceRecord,
//!     StandardPolicies, SubjectId, SubjectRecord, Target, WardenConfig,
//! };
//!
//! let config = WardenConfig::default();
//! let facade = PermissionFacade::new(
//!     MemoryCache::new(config.cache.capacity),
//!     InMemoryPolicyStore::from_policies(&StandardPolicies::seed()),
//!     InMemorySubjectStore::new(vec![SubjectRecord::new(5).with_roles(["standard_user"])]),
//!     &config,
//! );
//!
//! let own_file = Target::instance(
//!     "file",
//!     ResourceRecord::new().with_field("id", 10).with_field("user_id", 5),
//! );
//! assert!(facade.is_permitted(SubjectId(5), "update", &own_file));
//!
//! let filter = facade.compile_list_filter(SubjectId(5), "read_list", "file");
//! assert_eq!(filter.to_string(), "(user_id == 5)");
//! ```

mod cache;
mod clock;
mod error;
mod facade;
mod store;

pub use cache::{KeyValueCache, MemoryCache};
pub use clock::{Clock, fixed_clock, system_clock};
pub use error::{AccessError, AccessResult, CacheError, StoreError};
pub use facade::{PermissionFacade, Target};
pub use store::{
    InMemoryPolicyStore, InMemorySubjectStore, JsonFilePolicyStore, JsonFileSubjectStore,
    PolicyStore, SubjectId, SubjectRecord, SubjectStore,
};

// Re-export the engine types callers need alongside the facade
pub use warden_abac::attributes::{ResourceAttributes, ResourceRecord, UserAttributes};
pub use warden_abac::{
    Decision, FilterExpression, Policy, PolicyDocument, PolicyEffect, PolicySet, StandardPolicies,
};
pub use warden_config::{ConfigLoader, WardenConfig};
