//! `jw status`

use anyhow::Result;
use colored::*;
use jobwatch_client::DaemonStatus;
use jobwatch_core::domain::job::{JobId, RunState};
use jobwatch_core::dto::control::JobEntry;
use jobwatch_storage::WatchListStore;

use crate::config::Config;

/// Print daemon liveness and the watch-list
pub async fn show_status(config: &Config) -> Result<()> {
    let watched = config.store().load();

    let daemon = match config.daemon_pid() {
        Some(pid) => match config.control().status().await {
            Ok(status) => Some(status),
            Err(e) => {
                println!(
                    "{} {}",
                    format!("Daemon: running (PID {})", pid).yellow(),
                    format!("but not answering: {}", e).dimmed()
                );
                None
            }
        },
        None => {
            println!("{}", "Daemon: not running".red());
            None
        }
    };

    if let Some(status) = &daemon {
        println!(
            "{} {}",
            format!("Daemon: running (PID {})", status.pid).green(),
            format!("up {}", format_duration(status.uptime_secs)).dimmed()
        );
    }

    println!();
    if watched.is_empty() {
        println!("{}", "No jobs watched.".yellow());
        return Ok(());
    }

    println!("{}", format!("Watching {} job(s):", watched.len()).bold());
    for job in watched.iter() {
        let entry = daemon.as_ref().and_then(|status| task_for(status, job));
        let state = job_state(daemon.is_some(), entry);
        match entry {
            Some(entry) => println!(
                "  {} {}  {}  {}",
                "▸".cyan(),
                job.display_name().bold(),
                state,
                job_details(entry)
            ),
            None => println!("  {} {}  {}", "▸".cyan(), job.display_name().bold(), state),
        }
        println!("    {}", job.as_str().dimmed());
    }

    Ok(())
}

fn task_for<'a>(status: &'a DaemonStatus, job: &JobId) -> Option<&'a JobEntry> {
    status.jobs.iter().find(|entry| &entry.id == job)
}

/// Colored run state of one job as reported by the daemon
fn job_state(daemon_answered: bool, entry: Option<&JobEntry>) -> ColoredString {
    match entry {
        Some(entry) if entry.state == RunState::Active => entry.state.to_string().green(),
        Some(entry) => entry.state.to_string().yellow(),
        None if daemon_answered => "pending".dimmed(),
        None => "idle".dimmed(),
    }
}

/// Monitoring time, highlighted when the last check failed
fn job_details(entry: &JobEntry) -> ColoredString {
    let monitored = format!("monitored for {}", format_duration(entry.monitored_secs));
    if entry.last_check_failed {
        format!("{}, last check failed", monitored).yellow()
    } else {
        monitored.dimmed()
    }
}

fn format_duration(secs: u64) -> String {
    let (hours, rest) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &JobId, state: RunState, last_check_failed: bool) -> JobEntry {
        JobEntry {
            id: id.clone(),
            state,
            monitored_secs: 125,
            last_check_failed,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(7260), "2h 1m");
    }

    #[test]
    fn test_job_state() {
        let a = JobId::new("https://ci/job/a");
        let b = JobId::new("https://ci/job/b");
        let status = DaemonStatus {
            pid: 1,
            uptime_secs: 0,
            jobs: vec![entry(&a, RunState::Stopping, false)],
        };

        let stopping = job_state(true, task_for(&status, &a));
        assert!(stopping.to_string().contains("stopping"));
        assert!(job_state(true, task_for(&status, &b)).to_string().contains("pending"));
        assert!(job_state(false, None).to_string().contains("idle"));
    }

    #[test]
    fn test_job_details() {
        let a = JobId::new("https://ci/job/a");

        assert_eq!(
            job_details(&entry(&a, RunState::Active, false)),
            "monitored for 2m 5s".dimmed()
        );
        assert_eq!(
            job_details(&entry(&a, RunState::Active, true)),
            "monitored for 2m 5s, last check failed".yellow()
        );
    }
}
