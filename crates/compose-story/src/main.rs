mod script;

use std::path::PathBuf;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use crate::script::Script;

const BUILTIN_STORY: &str = include_str!("../stories/compose.json");

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let script = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Script::from_json_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => Script::from_json_str(BUILTIN_STORY).context("built-in story is invalid")?,
    };

    let report = script.run()?;
    tracing::info!(changes = report.changes.len(), "story finished");
    if let Some(view) = report.view {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }
    Ok(())
}
