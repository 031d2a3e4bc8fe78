// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald status` command implementation.
//!
//! Reads sessions and recent submissions straight from the durable store --
//! the same truth the workers and progress polls use -- so the listing is
//! correct whether or not a serve process is running.

use std::io::IsTerminal;
use std::sync::Arc;

use herald_config::model::HeraldConfig;
use herald_core::{HeraldError, ItemCounts, SessionStatus, StorageAdapter, SubmissionStatus};
use herald_storage::SqliteStorage;
use serde::Serialize;

const RECENT_SUBMISSIONS: i64 = 10;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub sessions: Vec<SessionLine>,
    pub submissions: Vec<SubmissionLine>,
}

#[derive(Debug, Serialize)]
pub struct SessionLine {
    pub id: String,
    pub description: String,
    pub status: SessionStatus,
    pub phone: Option<String>,
    pub last_used_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionLine {
    pub id: String,
    pub session_id: String,
    pub status: SubmissionStatus,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    pub total: i64,
}

/// Run the `herald status` command.
pub async fn run_status(
    config: &HeraldConfig,
    json: bool,
    plain: bool,
) -> Result<(), HeraldError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let sessions = storage.list_sessions(None).await?;
    let mut session_lines = Vec::with_capacity(sessions.len());
    for session in sessions {
        session_lines.push(SessionLine {
            id: session.id,
            description: session.description,
            status: session.status,
            phone: session.phone,
            last_used_at: session.last_used_at,
        });
    }

    let submissions = storage.list_recent_submissions(RECENT_SUBMISSIONS).await?;
    let mut submission_lines = Vec::with_capacity(submissions.len());
    for submission in submissions {
        let counts = storage.counts_for_submission(&submission.id).await?;
        submission_lines.push(SubmissionLine {
            id: submission.id,
            session_id: submission.session_id,
            status: counts.status(),
            sent: counts.sent,
            failed: counts.failed,
            pending: counts.pending + counts.in_progress,
            total: counts.total,
        });
    }

    let report = StatusReport {
        sessions: session_lines,
        submissions: submission_lines,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(&report, use_color);
    }

    storage.close().await?;
    Ok(())
}

fn print_report(report: &StatusReport, use_color: bool) {
    println!();
    println!("  herald status");
    println!("  {}", "-".repeat(55));

    if report.sessions.is_empty() {
        println!("    No sessions.");
    }
    for session in &report.sessions {
        let status = render_session_status(session.status, use_color);
        let phone = session.phone.as_deref().unwrap_or("-");
        println!(
            "    {}  {status}  {phone}  {}",
            short_id(&session.id),
            session.description
        );
    }

    if !report.submissions.is_empty() {
        println!();
        println!("  recent submissions");
        println!("  {}", "-".repeat(55));
        for sub in &report.submissions {
            println!(
                "    {}  {}  {}",
                short_id(&sub.id),
                render_submission_status(sub.status, use_color),
                format_counts(&ItemCounts {
                    sent: sub.sent,
                    failed: sub.failed,
                    pending: sub.pending,
                    in_progress: 0,
                    total: sub.total,
                }),
            );
        }
    }

    println!();
}

/// First segment of a UUID, enough to identify a row in a short listing.
fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

fn format_counts(counts: &ItemCounts) -> String {
    format!(
        "{} sent / {} failed / {} pending of {}",
        counts.sent, counts.failed, counts.pending, counts.total
    )
}

fn render_session_status(status: SessionStatus, use_color: bool) -> String {
    if !use_color {
        return format!("[{status}]");
    }
    use colored::Colorize;
    match status {
        SessionStatus::Paired => status.to_string().green().to_string(),
        SessionStatus::QrPairing => status.to_string().yellow().to_string(),
        SessionStatus::Disconnected => status.to_string().red().to_string(),
        SessionStatus::NotAuth => status.to_string().dimmed().to_string(),
    }
}

fn render_submission_status(status: SubmissionStatus, use_color: bool) -> String {
    if !use_color {
        return format!("[{status}]");
    }
    use colored::Colorize;
    match status {
        SubmissionStatus::Completed => status.to_string().green().to_string(),
        SubmissionStatus::Running => status.to_string().yellow().to_string(),
    }
}
