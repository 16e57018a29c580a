use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use leadwatch_core::{JobStatus, JobViewModel, ViewCondition};
use leadwatch_engine::{AtomicFileWriter, JobWatcher, LeadsFetchError, WatchSettings};
use leadwatch_logging::leadwatch_info;

use crate::render;

fn start(settings: WatchSettings, job_id: &str) -> Result<JobWatcher> {
    let watcher = JobWatcher::with_reqwest(settings).context("failed to set up the API client")?;
    watcher.open(job_id);
    Ok(watcher)
}

fn is_settled(view: &JobViewModel) -> bool {
    match &view.condition {
        ViewCondition::NotFound => true,
        ViewCondition::Ready(progress) => matches!(
            progress.status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        ),
        ViewCondition::Loading | ViewCondition::Error(_) => false,
    }
}

/// Prints the view each time its rendering changes, until the job reaches a
/// terminal status, vanishes, or the user interrupts.
pub(crate) async fn watch(settings: WatchSettings, job_id: String) -> Result<()> {
    let watcher = start(settings, &job_id)?;
    let mut updates = watcher.subscribe();
    let mut last_lines = Vec::new();

    let outcome = loop {
        let view = updates.borrow_and_update().clone();
        let lines = render::render(&view);
        if lines != last_lines {
            for line in &lines {
                println!("{line}");
            }
            last_lines = lines;
        }
        if is_settled(&view) {
            break view;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break view;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                leadwatch_info!("watch of {} interrupted", job_id);
                break view;
            }
        }
    };

    watcher.shutdown().await;
    if outcome.is_not_found() {
        bail!("job {job_id} not found");
    }
    Ok(())
}

/// Waits for the first answer about the job, then returns its leads.
pub(crate) async fn leads(settings: WatchSettings, job_id: String) -> Result<()> {
    let watcher = start(settings, &job_id)?;
    let view = watcher
        .wait_for(|view| !matches!(view.condition, ViewCondition::Loading))
        .await
        .ok_or_else(|| anyhow!("watcher stopped before job {job_id} was loaded"))?;

    let result = match &view.condition {
        ViewCondition::NotFound => Err(anyhow!("job {job_id} not found")),
        ViewCondition::Error(message) => Err(anyhow!("job {job_id}: {message}")),
        _ => match watcher.fetch_leads_if_needed().await {
            Ok(Some(results)) => {
                for line in render::render_leads(&results) {
                    println!("{line}");
                }
                Ok(())
            }
            Ok(None) => {
                println!("job {job_id} has no leads yet");
                Ok(())
            }
            Err(LeadsFetchError::NotFound) => Err(anyhow!("job {job_id} not found")),
            Err(err) => Err(err.into()),
        },
    };

    watcher.shutdown().await;
    result
}

pub(crate) async fn download(settings: WatchSettings, job_id: String, out: PathBuf) -> Result<()> {
    let watcher =
        JobWatcher::with_reqwest(settings).context("failed to set up the API client")?;
    let csv = watcher
        .download_csv(&job_id)
        .await
        .with_context(|| format!("download of job {job_id} failed"))?;
    watcher.shutdown().await;

    let writer = AtomicFileWriter::new(out);
    let path = writer.write_download(&job_id, &csv)?;
    leadwatch_info!("saved {} bytes to {:?}", csv.len(), path);
    println!("saved {}", path.display());
    Ok(())
}
