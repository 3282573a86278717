//! Subcommands and the helpers they share.

pub mod batch;
pub mod combine;
pub mod compare;
pub mod config;
pub mod extract;
pub mod scan;
pub mod text;

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::debug;

use fintab_core::FintabConfig;

/// `<config_dir>/fintab/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fintab")
        .join("config.json")
}

/// Load the explicit config file, else the default one if it exists, else defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<FintabConfig> {
    if let Some(path) = path {
        return Ok(FintabConfig::from_file(path)?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config {}", default_path.display());
        Ok(FintabConfig::from_file(&default_path)?)
    } else {
        Ok(FintabConfig::default())
    }
}

/// Progress bar on stderr.
pub fn progress_bar(len: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {}",
                unit
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Pretty JSON to a file, or to stdout.
pub fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
            eprintln!("{} Output written to {}", style("✓").green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Report a fatal error as `{"error": ...}` on stdout, then fail.
///
/// Password-protected documents get their own `"encrypted": true` flag.
pub fn json_failure(err: fintab_core::FintabError) -> anyhow::Error {
    let mut body = serde_json::json!({ "error": err.to_string() });
    if err.is_encrypted() {
        body["encrypted"] = serde_json::Value::Bool(true);
    }
    println!("{}", body);
    anyhow::Error::new(err)
}
