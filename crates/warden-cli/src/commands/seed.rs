//! `warden seed`: the standard policies as JSON documents.

use anyhow::Result;
use warden::{PolicyDocument, StandardPolicies};

pub fn run() -> Result<()> {
    let documents: Vec<PolicyDocument> = StandardPolicies::seed().iter().map(PolicyDocument::from).collect();
    println!("{}", serde_json::to_string_pretty(&documents)?);
    Ok(())
}
