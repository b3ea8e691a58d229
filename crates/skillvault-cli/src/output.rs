//! Output framing.
//!
//! JSON output is canonical and byte-stable; tables are for humans. Either
//! goes to stdout or to `--out`. Diagnostics stay on stderr so stdout can be
//! piped or compared byte-for-byte.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use skillvault_core::{canonical, Result};

use crate::cli::args::{OutputArgs, OutputFormat};

/// Emit a value in the selected format.
pub fn emit<T: Serialize>(args: &OutputArgs, value: &T, table: impl FnOnce() -> String) -> Result<()> {
    let text = match args.format {
        OutputFormat::Json => {
            let mut json = canonical::to_string(value)?;
            json.push('\n');
            json
        }
        OutputFormat::Table => {
            let mut rendered = table();
            if !rendered.ends_with('\n') {
                rendered.push('\n');
            }
            rendered
        }
    };
    write_text(args.out.as_deref(), &text)
}

fn write_text(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(text.as_bytes())?;
        }
    }
    Ok(())
}

/// Render a two-column key/value block with aligned keys.
pub fn kv_table(rows: &[(&str, String)]) -> String {
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in rows {
        out.push_str(&format!("{key:<width$}  {value}\n"));
    }
    out
}

/// Render findings as indented lines.
pub fn findings_lines(findings: &[skillvault_core::Finding]) -> String {
    let mut out = String::new();
    for finding in findings {
        match &finding.path {
            Some(path) => out.push_str(&format!(
                "  [{}] {} ({}): {}\n",
                finding.severity, finding.code, path, finding.message
            )),
            None => out.push_str(&format!(
                "  [{}] {}: {}\n",
                finding.severity, finding.code, finding.message
            )),
        }
    }
    out
}
