//! `warden check`: decide one access request.

use std::path::Path;

use anyhow::{Context, Result};
use warden::{ResourceRecord, SubjectId, Target};
use warden_abac::Scalar;

use super::{FileFacade, read_json};
use crate::style::colors::SemanticStyle;
use crate::style::{print_labeled, print_warn};

pub fn run(
    facade: &FileFacade,
    subject_id: i64,
    action: &str,
    resource_type: &str,
    resource: Option<&Path>,
    resource_id: Option<&str>,
    explain: bool,
) -> Result<()> {
    let mut target = match resource {
        Some(path) => {
            let record = ResourceRecord::from_json(read_json(path)?)
                .with_context(|| format!("{} must contain a JSON object", path.display()))?;
            Target::instance(resource_type, record)
        }
        None => Target::kind(resource_type),
    };
    if let Some(id) = resource_id {
        target = target.with_id(parse_id(id));
    }

    let decision = facade.explain(SubjectId(subject_id), action, &target);
    if decision.is_allowed() {
        println!("{}", "ALLOW".success());
    } else {
        println!("{}", "DENY".error());
    }

    if explain {
        print_labeled(
            "policy",
            &decision
                .matched_policy
                .as_deref()
                .map_or_else(|| "(none)".muted(), |name| name.code()),
        );
        print_labeled("reason", &decision.reason);
        for fault in &decision.faults {
            print_warn(&format!("{} skipped: {}", fault.policy.code(), fault.error));
        }
    }

    Ok(())
}

/// Numeric ids become integers so they compare with numeric fields.
fn parse_id(id: &str) -> Scalar {
    id.parse::<i64>().map_or_else(|_| Scalar::from(id), Scalar::Int)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_are_integers() {
        assert_eq!(parse_id("42"), Scalar::Int(42));
        assert_eq!(parse_id("abc-1"), Scalar::Text("abc-1".into()));
    }
}
