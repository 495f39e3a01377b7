//! `warden filter`: compile the row filter for a list query.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use warden::{ResourceAttributes, ResourceRecord, SubjectId};

use super::{FileFacade, read_json};
use crate::style::colors::SemanticStyle;
use crate::style::{print_header, print_labeled, print_table};

pub fn run(
    facade: &FileFacade,
    subject_id: i64,
    action: &str,
    resource_type: &str,
    rows: Option<&Path>,
    sql: bool,
) -> Result<()> {
    let expression = facade.compile_list_filter(SubjectId(subject_id), action, resource_type);

    if sql {
        let rendered = expression
            .to_sql()
            .context("Filter cannot be rendered as SQL")?;
        println!("{}", rendered.clause.code());
        if !rendered.params.is_empty() {
            let params: Vec<String> = rendered.params.iter().map(ToString::to_string).collect();
            print_labeled("params", &params.join(", "));
        }
    } else {
        println!("{}", expression.to_string().code());
    }

    let Some(path) = rows else {
        return Ok(());
    };
    let rows = match read_json(path)? {
        Value::Array(rows) => rows,
        _ => anyhow::bail!("{} must contain a JSON array of rows", path.display()),
    };

    let mut admitted = Vec::new();
    for row in rows {
        let record = ResourceRecord::from_json(row.clone())
            .with_context(|| format!("Every row in {} must be a JSON object", path.display()))?;
        if expression.matches(&ResourceAttributes::from_record(resource_type, &record)) {
            admitted.push(row);
        }
    }

    println!();
    print_header("Admitted rows");
    let (columns, cells) = tabulate(&admitted);
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    print_table(&columns, &cells);
    Ok(())
}

/// Column names (sorted union of keys) and cell text for each row.
fn tabulate(rows: &[Value]) -> (Vec<String>, Vec<Vec<String>>) {
    let columns: BTreeSet<&String> = rows
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|row| row.keys())
        .collect();
    let columns: Vec<String> = columns.into_iter().cloned().collect();

    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| match row.get(column) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();

    (columns, cells)
}
