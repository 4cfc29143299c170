use std::path::Path;

use anyhow::Result;
use pushload_engine::{drop_dataset, DropOutcome};

use super::{connect, load_job};

/// Execute the `drop` command: delete the configured dataset.
///
/// A refused delete is reported but does not fail the command.
pub async fn execute(job_path: &Path) -> Result<()> {
    let config = load_job(job_path)?;
    let client = connect(&config).await?;

    match drop_dataset(&config, &client).await? {
        DropOutcome::Deleted { dataset_id } => {
            println!("Dataset '{}' ({dataset_id}) deleted.", config.dataset.value);
        }
        DropOutcome::NotFound => {
            println!("Dataset '{}' not found, nothing to drop.", config.dataset.value);
        }
        DropOutcome::Failed { dataset_id } => {
            println!(
                "Dataset '{}' ({dataset_id}) could not be deleted; see log for details.",
                config.dataset.value
            );
        }
    }
    Ok(())
}
