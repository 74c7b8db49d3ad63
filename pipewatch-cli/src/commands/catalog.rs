//! Catalog command handler

use anyhow::Result;
use colored::*;

use crate::config::Config;

/// Print the step catalog of the configured pipeline
pub fn show_catalog(config: &Config, json: bool) -> Result<()> {
    let catalog = config.catalog()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "Pipeline {} declares {} step(s):",
            catalog.pipeline_id,
            catalog.len()
        )
        .bold()
    );
    println!();
    for (index, step) in catalog.steps().iter().enumerate() {
        println!(
            "  {:>2}. {:<28} {}",
            index + 1,
            step.display_name,
            step.id.dimmed()
        );
    }

    Ok(())
}
