use std::path::Path;

use comfy_table::{ContentArrangement, Table};

pub fn run(path: &Path) -> Result<(), String> {
    let script = super::load_script(path)?;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Label", "Line", "Lines"]);

    for label in script.labels() {
        table.add_row(vec![
            format!("*{}", label.name),
            script.display_line(label.line).to_string(),
            label.len().to_string(),
        ]);
    }

    println!("{table}");
    println!();
    let entry = script
        .entry_label()
        .map(|id| format!("*{}", script.label(id).name))
        .unwrap_or_else(|| "none".to_string());
    println!("  {} labels, entry {entry}", script.labels().len());

    Ok(())
}
