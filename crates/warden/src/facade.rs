//! Permission facade: the entry point applications call.
//!
//! Loads the active policy set and the subject's attributes (cache first,
//! store on miss), assembles the attribute namespace and hands off to the
//! pure evaluator or filter compiler.
//!
//! # Failure handling
//!
//! - Cache failures are logged and bypassed; the store is the source of truth.
//! - A cache entry that does not decode is deleted and reloaded.
//! - Store failures, unknown subjects and inactive subjects deny access (and
//!   compile to [`FilterExpression::Nothing`]).

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, trace, warn};
use warden_abac::attributes::{
    AttributeNamespace, EnvironmentAttributes, ResourceAttributes, ResourceRecord, Scalar,
    UserAttributes,
};
use warden_abac::matcher::AccessRequest;
use warden_abac::policy::Effect;
use warden_abac::{Decision, FilterExpression, Policy, PolicyDocument, PolicySet, evaluate, filter};
use warden_config::{CacheConfig, WardenConfig};

use crate::cache::KeyValueCache;
use crate::clock::{Clock, system_clock};
use crate::error::{AccessError, AccessResult, StoreError};
use crate::store::{PolicyStore, SubjectId, SubjectRecord, SubjectStore};

// ============================================================================
// Target
// ============================================================================

/// What a request acts on: a resource type, optionally one instance of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    resource_type: String,
    id: Option<Scalar>,
    record: Option<ResourceRecord>,
}

impl Target {
    /// A resource of this type with no known fields. Policies with query
    /// conditions cannot match it; use [`PermissionFacade::compile_list_filter`]
    /// to ask which rows of the type are visible.
    pub fn kind(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: None,
            record: None,
        }
    }

    /// One concrete instance, with its fields.
    pub fn instance(resource_type: &str, record: ResourceRecord) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: None,
            record: Some(record),
        }
    }

    /// Names a concrete instance. Without a record, only `resource.id` and
    /// `resource.type` are known, so ownership conditions fail.
    pub fn with_id(mut self, id: impl Into<Scalar>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn resource_id(&self) -> Option<String> {
        self.id
            .clone()
            .or_else(|| self.attributes().id)
            .map(|id| id.to_string())
    }

    fn attributes(&self) -> ResourceAttributes {
        let attributes = match &self.record {
            Some(record) => ResourceAttributes::from_record(&self.resource_type, record),
            None => ResourceAttributes::of_type(&self.resource_type),
        };
        match &self.id {
            Some(id) => attributes.with_id(id.clone()),
            None => attributes,
        }
    }
}

// ============================================================================
// Refusals
// ============================================================================

/// Why a request was refused before any policy was evaluated.
#[derive(Debug)]
enum Refusal {
    UnknownSubject,
    InactiveSubject,
    Store(StoreError),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::UnknownSubject => f.write_str("Subject not found; denying"),
            Refusal::InactiveSubject => f.write_str("Subject is inactive; denying"),
            Refusal::Store(error) => write!(f, "Attribute lookup failed ({error}); denying"),
        }
    }
}

impl From<StoreError> for Refusal {
    fn from(error: StoreError) -> Self {
        Refusal::Store(error)
    }
}

// ============================================================================
// Permission Facade
// ============================================================================

/// Permission checks and list filters for one application.
///
/// Holds its cache and store clients explicitly; share it by reference
/// across threads.
pub struct PermissionFacade<C, P, S> {
    cache: C,
    policies: P,
    subjects: S,
    settings: CacheConfig,
    clock: Clock,
}

impl<C, P, S> PermissionFacade<C, P, S>
where
    C: KeyValueCache,
    P: PolicyStore,
    S: SubjectStore,
{
    pub fn new(cache: C, policies: P, subjects: S, config: &WardenConfig) -> Self {
        Self {
            cache,
            policies,
            subjects,
            settings: config.cache.clone(),
            clock: system_clock(),
        }
    }

    /// Uses `clock` for `environment.current_time`.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Evaluates a point check and returns the full decision.
    pub fn explain(&self, subject: SubjectId, action: &str, target: &Target) -> Decision {
        let (policies, user) = match self.load_context(subject) {
            Ok(context) => context,
            Err(refusal) => return refused(refusal),
        };

        let resource = target.attributes();
        let env = EnvironmentAttributes::at((self.clock)());
        let namespace = AttributeNamespace::new(&user, action, &resource, &env);
        evaluate(&policies, &AccessRequest::new(&namespace, action, target.resource_type()))
    }

    /// Returns whether `subject` may perform `action` on `target`.
    pub fn is_permitted(&self, subject: SubjectId, action: &str, target: &Target) -> bool {
        let decision = self.explain(subject, action, target);
        info!(
            subject = %subject,
            action,
            resource_type = target.resource_type(),
            resource_id = ?target.resource_id(),
            allowed = decision.is_allowed(),
            policy = ?decision.matched_policy,
            "access decision"
        );
        decision.is_allowed()
    }

    /// Like [`Self::is_permitted`], but returns `PermissionDenied` on refusal.
    pub fn assert_permitted(
        &self,
        subject: SubjectId,
        action: &str,
        target: &Target,
    ) -> AccessResult<()> {
        if self.is_permitted(subject, action, target) {
            Ok(())
        } else {
            Err(AccessError::PermissionDenied {
                action: action.to_string(),
                resource_type: target.resource_type().to_string(),
                resource_id: target.resource_id(),
            })
        }
    }

    /// Compiles the row filter for a list query over `resource_type`.
    pub fn compile_list_filter(
        &self,
        subject: SubjectId,
        action: &str,
        resource_type: &str,
    ) -> FilterExpression {
        let (policies, user) = match self.load_context(subject) {
            Ok(context) => context,
            Err(refusal) => {
                debug!(subject = %subject, action, resource_type, reason = %refusal, "list filter refused");
                return FilterExpression::Nothing;
            }
        };

        let env = EnvironmentAttributes::at((self.clock)());
        let resource = ResourceAttributes::of_type(resource_type);
        let namespace = AttributeNamespace::new(&user, action, &resource, &env);
        let expression = filter::compile(&policies, &namespace, action, resource_type);
        info!(
            subject = %subject,
            action,
            resource_type,
            filter = %expression,
            "list filter compiled"
        );
        expression
    }

    /// The active policy set, cache first.
    pub fn active_policies(&self) -> Result<Vec<Policy>, StoreError> {
        let documents = self.read_through(
            &self.settings.policy_key,
            self.settings.policy_ttl(),
            || {
                let set = PolicySet::compile(self.policies.active_policies()?);
                let accepted: Vec<PolicyDocument> =
                    set.policies().iter().map(PolicyDocument::from).collect();
                Ok(Some(accepted))
            },
        )?;
        Ok(PolicySet::compile(documents.unwrap_or_default()).into_policies())
    }

    /// The subject's attribute bundle, cache first. `None` if unknown.
    pub fn subject_record(&self, subject: SubjectId) -> Result<Option<SubjectRecord>, StoreError> {
        self.read_through(
            &self.settings.subject_key(subject),
            self.settings.subject_ttl(),
            || self.subjects.subject(subject),
        )
    }

    /// Drops the cached policy set. The next check reloads it.
    pub fn invalidate_policies(&self) {
        self.evict(&self.settings.policy_key);
    }

    /// Drops one subject's cached attributes.
    pub fn invalidate_subject(&self, subject: SubjectId) {
        self.evict(&self.settings.subject_key(subject));
    }

    fn load_context(&self, subject: SubjectId) -> Result<(Vec<Policy>, UserAttributes), Refusal> {
        let record = self.subject_record(subject).map_err(|error| {
            error!(subject = %subject, error = %error, "subject lookup failed");
            Refusal::from(error)
        })?;
        let record = match record {
            Some(record) => record,
            None => {
                warn!(subject = %subject, "unknown subject");
                return Err(Refusal::UnknownSubject);
            }
        };
        if !record.is_active {
            debug!(subject = %subject, "inactive subject");
            return Err(Refusal::InactiveSubject);
        }

        let policies = self.active_policies().map_err(|error| {
            error!(error = %error, "policy lookup failed");
            Refusal::from(error)
        })?;
        Ok((policies, record.to_attributes()))
    }

    fn read_through<T, F>(&self, key: &str, ttl: Duration, load: F) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Option<T>, StoreError>,
    {
        match self.cache.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    trace!(key, "cache hit");
                    return Ok(Some(value));
                }
                Err(error) => {
                    warn!(key, error = %error, "discarding undecodable cache entry");
                    self.evict(key);
                }
            },
            Ok(None) => trace!(key, "cache miss"),
            Err(error) => warn!(key, error = %error, "cache read failed, using store"),
        }

        let value = match load()? {
            Some(value) => value,
            None => return Ok(None),
        };

        match serde_json::to_vec(&value) {
            Ok(encoded) => {
                if let Err(error) = self.cache.set_with_ttl(key, Bytes::from(encoded), ttl) {
                    warn!(key, error = %error, "cache write failed");
                }
            }
            Err(error) => warn!(key, error = %error, "cache encoding failed"),
        }
        Ok(Some(value))
    }

    fn evict(&self, key: &str) {
        if let Err(error) = self.cache.delete(key) {
            warn!(key, error = %error, "cache delete failed");
        }
    }
}

fn refused(refusal: Refusal) -> Decision {
    Decision {
        effect: Effect::Deny,
        matched_policy: None,
        reason: refusal.to_string(),
        faults: Vec::new(),
    }
}
