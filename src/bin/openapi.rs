//! Print the purple OpenAPI document, or write it to the path given as the
//! first argument.

use anyhow::{Context, Result};

fn main() -> Result<()> {
    let json = serde_json::to_string_pretty(&purple::api::openapi())?;
    match std::env::args_os().nth(1) {
        Some(path) => std::fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("Failed to write {}", path.to_string_lossy())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
