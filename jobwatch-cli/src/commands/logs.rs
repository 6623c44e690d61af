//! `jw logs`

use anyhow::{Context, Result};
use colored::*;
use std::io::SeekFrom;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::Config;

const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

/// Print the tail of the daemon log, optionally following it
pub async fn show_logs(config: &Config, lines: usize, follow: bool) -> Result<()> {
    let path = &config.paths.log;

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !follow => {
            println!("{}", format!("No daemon log at {}", path.display()).yellow());
            return Ok(());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    for line in last_lines(&contents, lines) {
        println!("{}", line);
    }

    if follow {
        follow_file(config, contents.len() as u64).await?;
    }
    Ok(())
}

/// Print bytes appended after `offset` until interrupted
async fn follow_file(config: &Config, mut offset: u64) -> Result<()> {
    let path = &config.paths.log;
    let mut pending = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(FOLLOW_INTERVAL) => {}
        }

        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
        };

        let len = file.metadata().await?.len();
        if len < offset {
            // Truncated or replaced: start over
            offset = 0;
            pending.clear();
        }
        if len == offset {
            continue;
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let mut chunk = Vec::new();
        file.read_to_end(&mut chunk).await?;
        offset += chunk.len() as u64;

        pending.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = pending.find('\n') {
            println!("{}", &pending[..pos]);
            pending.replace_range(..=pos, "");
        }
    }
}

/// The last `n` lines of `text`
fn last_lines(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}
