use std::path::Path;

use anyhow::Result;
use pushload_engine::{
    dry_run_destination, plan_load, run_load, LoadSummary, ManualClock, SystemClock,
};

use super::{connect, load_job, load_job_offline};

/// Execute the `run` command: parse, validate, and load a job.
pub async fn execute(job_path: &Path, dry_run: bool) -> Result<()> {
    // 1. Parse and validate
    let config = if dry_run {
        load_job_offline(job_path)?
    } else {
        load_job(job_path)?
    };

    // 2. Read manifests and build the creation payload
    let plan = plan_load(&config)?;

    // 3. Run
    let summary = if dry_run {
        tracing::info!("Dry run: using in-memory destination and simulated clock");
        let api = dry_run_destination(&config, &plan);
        run_load(&config, &plan, &api, ManualClock::new()).await?
    } else {
        let client = connect(&config).await?;
        run_load(&config, &plan, &client, SystemClock).await?
    };

    print_summary(&summary, dry_run);
    Ok(())
}

fn print_summary(summary: &LoadSummary, dry_run: bool) {
    let mode = if dry_run { " (dry run)" } else { "" };
    println!("Job '{}' completed successfully{mode}.", summary.job);
    println!("  Dataset:         {}", summary.dataset_id);
    println!("  Created:         {}", summary.created);
    println!("  Purged:          {}", summary.purged);
    for table in &summary.tables {
        println!(
            "  Table {:<12} {} rows in {} batch(es)",
            format!("{}:", table.table),
            table.rows,
            table.batches
        );
    }
    println!("  Rows loaded:     {}", summary.total_rows());
    println!("  Append requests: {}", summary.append_requests);
    println!(
        "  Throttled:       {} time(s), {:.1}s waiting",
        summary.throttled, summary.throttle_wait_secs
    );
    println!("  Duration:        {:.2}s", summary.duration_secs);

    // Machine-readable summary line
    let json = serde_json::json!({
        "job": summary.job,
        "dataset_id": summary.dataset_id,
        "created": summary.created,
        "purged": summary.purged,
        "rows": summary.total_rows(),
        "append_requests": summary.append_requests,
        "throttled": summary.throttled,
        "throttle_wait_secs": summary.throttle_wait_secs,
        "duration_secs": summary.duration_secs,
        "dry_run": dry_run,
        "tables": summary.tables,
    });
    println!("@@LOAD_JSON@@{json}");
}
