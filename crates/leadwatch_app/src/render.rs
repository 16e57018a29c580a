use leadwatch_core::{
    JobResults, JobStatus, JobViewModel, Lead, ReconciledProgressView, SocketActivity,
    ViewCondition,
};

const BAR_WIDTH: usize = 30;

/// Text lines describing the current state of the job view.
pub(crate) fn render(view: &JobViewModel) -> Vec<String> {
    let job = view.job_id.as_deref().unwrap_or("-");
    let mut lines = Vec::new();

    match &view.condition {
        ViewCondition::Loading => lines.push(format!("[{job}] loading...")),
        ViewCondition::NotFound => lines.push(format!(
            "[{job}] Job not found. It may have been cleared after a backend restart."
        )),
        ViewCondition::Error(message) => lines.push(format!("[{job}] error: {message}")),
        ViewCondition::Ready(progress) => {
            lines.push(format!(
                "[{job}] {status} {bar} {percent:.1}%{live}",
                status = status_label(progress.status),
                bar = progress_bar(progress.progress_percent),
                percent = progress.progress_percent,
                live = socket_label(view.socket),
            ));
            lines.push(format_counts(progress));
            if let Some(query) = &progress.current_query {
                lines.push(format!("  current query: {query}"));
            }
            if let Some(timing) = format_timing(progress) {
                lines.push(timing);
            }
            if let Some(message) = &progress.error_message {
                lines.push(format!("  job error: {message}"));
            }
        }
    }

    if let Some(message) = &view.leads_error {
        lines.push(format!("  leads unavailable: {message}"));
    }
    if view.fetching_leads {
        lines.push("  fetching leads...".to_string());
    }
    lines
}

/// One line per lead, preceded by a count line.
pub(crate) fn render_leads(results: &JobResults) -> Vec<String> {
    let mut lines = vec![format!(
        "{} leads for job {}",
        format_with_commas(results.lead_count()),
        results.job_id
    )];
    lines.extend(results.leads.iter().map(format_lead_row));
    lines
}

fn format_counts(progress: &ReconciledProgressView) -> String {
    let leads = if progress.target_leads > 0 {
        format!(
            "{} / {}",
            format_with_commas(progress.effective_leads_collected),
            format_with_commas(progress.target_leads)
        )
    } else {
        format_with_commas(progress.effective_leads_collected)
    };
    let mut line = format!(
        "  leads: {leads} | queries: {} / {}",
        progress.queries_completed, progress.queries_total
    );
    if progress.duplicates_removed > 0 {
        line.push_str(&format!(
            " | duplicates removed: {}",
            format_with_commas(progress.duplicates_removed)
        ));
    }
    if progress.failed_queries > 0 {
        line.push_str(&format!(" | failed queries: {}", progress.failed_queries));
    }
    line
}

fn format_timing(progress: &ReconciledProgressView) -> Option<String> {
    match (&progress.elapsed_time, &progress.estimated_time_remaining) {
        (Some(elapsed), Some(remaining)) => {
            Some(format!("  elapsed: {elapsed} | remaining: {remaining}"))
        }
        (Some(elapsed), None) => Some(format!("  elapsed: {elapsed}")),
        (None, Some(remaining)) => Some(format!("  remaining: {remaining}")),
        (None, None) => None,
    }
}

fn format_lead_row(lead: &Lead) -> String {
    let name = lead.name.as_deref().unwrap_or("(unnamed)");
    let details: Vec<&str> = [&lead.phone, &lead.email, &lead.website, &lead.address]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .filter(|value| !value.is_empty())
        .collect();
    if details.is_empty() {
        format!("  {name}")
    } else {
        format!("  {name} ({})", details.join(", "))
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Pending",
        JobStatus::Running => "Running",
        JobStatus::Completed => "Completed",
        JobStatus::Failed => "Failed",
        JobStatus::Cancelled => "Cancelled",
    }
}

fn socket_label(socket: SocketActivity) -> &'static str {
    match socket {
        SocketActivity::Open => " (live)",
        SocketActivity::Degraded => " (polling)",
        SocketActivity::Closed => "",
    }
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
