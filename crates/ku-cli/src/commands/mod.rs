pub mod check;
pub mod labels;
pub mod run;
pub mod slots;

use std::path::Path;

use ku_script::{Counts, Diagnostic, Script, render_diagnostics};

/// Load a script that is ready to run.
fn load_script(path: &Path) -> Result<Script, String> {
    Script::from_path(path).map_err(|e| e.to_string())
}

/// Print diagnostics to stderr using ariadne, followed by a count line.
fn print_diagnostics(script: &Script, path: &Path, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    let filename = path.display().to_string();
    eprint!("{}", render_diagnostics(script.source(), &filename, diagnostics));
    eprintln!("  {}", Counts::of(diagnostics));
}
