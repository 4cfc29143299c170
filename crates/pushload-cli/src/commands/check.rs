use std::path::Path;

use anyhow::Result;
use pushload_engine::check_job;

use super::{connect, load_job};

/// Execute the `check` command: validate the job and resolve the dataset.
pub async fn execute(job_path: &Path) -> Result<()> {
    let config = load_job(job_path)?;
    println!("Job structure:     OK");

    let client = connect(&config).await?;
    println!("Credentials:       OK");

    let report = check_job(&config, &client).await?;
    println!("Input tables:      {}", report.local_tables.join(", "));
    match &report.dataset_id {
        Some(id) => println!("Dataset:           {} ({id})", report.dataset),
        None => println!("Dataset:           {} (not found, will be created)", report.dataset),
    }
    if report.found {
        if report.remote_tables.is_empty() {
            println!("Remote tables:     unknown");
        } else {
            println!("Remote tables:     {}", report.remote_tables.join(", "));
        }
        if !report.missing_tables.is_empty() {
            println!(
                "Missing tables:    {} (on_schema_mismatch: {})",
                report.missing_tables.join(", "),
                config.on_schema_mismatch
            );
        }
    }

    println!("\nAll checks passed.");
    Ok(())
}
