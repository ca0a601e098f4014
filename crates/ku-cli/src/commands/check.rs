use std::fs;
use std::path::Path;

use colored::Colorize;
use ku_engine::DispatchTable;
use ku_engine::check::{check, has_errors};
use ku_script::Script;

pub fn run(path: &Path) -> Result<(), String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let script = Script::parse(&source);
    let diagnostics = check(&script, &DispatchTable::new());
    super::print_diagnostics(&script, path, &diagnostics);

    if has_errors(&diagnostics) {
        return Err("check failed with errors".into());
    }

    println!("  {} {}", "All checks passed for".green(), path.display());
    println!(
        "  {} lines, {} labels",
        script.line_count(),
        script.labels().len()
    );
    Ok(())
}
