//! `warden validate`: compile policy documents and report rejects.

use std::path::Path;

use anyhow::{Context, Result};
use warden::PolicySet;

use crate::style::colors::SemanticStyle;
use crate::style::{print_error, print_success, print_table};

pub fn run(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let set = PolicySet::from_json(&content)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    let rows: Vec<Vec<String>> = set
        .policies()
        .iter()
        .map(|policy| {
            vec![
                policy.name.clone(),
                policy.effect.to_string(),
                policy.actions.join(", "),
                policy.query_conditions.len().to_string(),
                if policy.is_active { "yes".to_string() } else { "no".muted() },
            ]
        })
        .collect();
    print_table(&["Policy", "Effect", "Actions", "Query conditions", "Active"], &rows);

    let rejected = set.rejected();
    for reject in rejected {
        let name = if reject.name.is_empty() { "(unnamed)" } else { reject.name.as_str() };
        print_error(&format!("#{} {}: {}", reject.index, name.code(), reject.error));
    }

    let total = set.policies().len() + rejected.len();
    if rejected.is_empty() {
        print_success(&format!("{total} policies valid"));
        Ok(())
    } else {
        anyhow::bail!("{} of {total} policies rejected", rejected.len())
    }
}
