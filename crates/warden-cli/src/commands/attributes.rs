//! `warden attributes`: the attribute vocabulary.

use warden_abac::attributes::VOCABULARY;

use crate::style::print_table;

pub fn run() {
    let rows: Vec<Vec<String>> = VOCABULARY
        .iter()
        .map(|a| {
            vec![
                a.key.to_string(),
                a.category.to_string(),
                a.kind.to_string(),
                a.description.to_string(),
            ]
        })
        .collect();
    print_table(&["Key", "Category", "Type", "Description"], &rows);
    println!("Resources also expose every instance field as resource.<field>.");
}
