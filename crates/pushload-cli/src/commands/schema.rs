use std::path::Path;

use anyhow::{Context, Result};
use pushload_engine::plan_load;

use super::load_job_offline;

/// Execute the `schema` command: print the creation payload without network
/// access. Credentials are neither read nor required.
pub fn execute(job_path: &Path) -> Result<()> {
    let config = load_job_offline(job_path)?;
    let plan = plan_load(&config)?;
    let json =
        serde_json::to_string_pretty(&plan.payload).context("Failed to encode dataset payload")?;
    println!("{json}");
    Ok(())
}
