//! `housevault audit`: show the vault's event history.
//!
//!   housevault audit                   # this user's last 50 events
//!   housevault audit --failures        # only events that failed
//!   housevault audit --since 1d12h     # events in the last day and a half
//!   housevault audit --all-users

use chrono::{Duration, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::audit::{AuditEntry, AuditFilter, AuditLog, Outcome};
use crate::cli::output;
use crate::cli::{data_dir, load_settings, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `audit` command.
pub fn execute(
    cli: &Cli,
    last: usize,
    since: Option<&str>,
    failures: bool,
    all_users: bool,
) -> Result<()> {
    let filter = AuditFilter {
        limit: last,
        since: since.map(parse_window).transpose()?.map(|w| Utc::now() - w),
        user_id: (!all_users).then(|| cli.user.clone()),
        failures_only: failures,
    };

    let dir = data_dir(cli, &load_settings()?)?;
    if !AuditLog::db_path(&dir).exists() {
        output::info("No vault events recorded yet.");
        return Ok(());
    }

    let entries = AuditLog::open(&dir)?.query(&filter)?;
    if entries.is_empty() {
        output::info("No vault events match.");
        return Ok(());
    }
    print_events(&entries, all_users);
    Ok(())
}

/// Parse a look-back window made of `<n><unit>` parts, units `w d h m s`.
///
/// `"7d"`, `"90m"` and `"1d12h"` are all accepted.
fn parse_window(input: &str) -> Result<Duration> {
    let invalid = || {
        VaultError::InvalidRequest(format!(
            "invalid time window '{input}': use parts like 7d, 12h, 30m or 1d12h"
        ))
    };

    let mut total = Duration::zero();
    let mut digits = String::new();
    for c in input.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: i64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let part = match c {
            'w' => Duration::try_weeks(n),
            'd' => Duration::try_days(n),
            'h' => Duration::try_hours(n),
            'm' => Duration::try_minutes(n),
            's' => Duration::try_seconds(n),
            _ => None,
        }
        .ok_or_else(invalid)?;
        total = total.checked_add(&part).ok_or_else(invalid)?;
    }

    if !digits.is_empty() || total.is_zero() {
        return Err(invalid());
    }
    Ok(total)
}

fn print_events(entries: &[AuditEntry], with_user: bool) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec!["Time", "Event", "Outcome", "Account / passkey", "Details"];
    if with_user {
        header.insert(1, "User");
    }
    table.set_header(header);

    for entry in entries {
        let record = &entry.record;
        let outcome = match record.outcome {
            Outcome::Succeeded => Cell::new("ok").fg(Color::Green),
            Outcome::Failed(kind) if record.event.is_ceremony() => {
                Cell::new(kind.as_str()).fg(Color::Red)
            }
            Outcome::Failed(kind) => Cell::new(kind.as_str()).fg(Color::Yellow),
        };

        let mut row = vec![
            Cell::new(entry.at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(record.event.as_str()),
            outcome,
            Cell::new(record.subject.as_deref().unwrap_or("-")),
            Cell::new(record.details.as_deref().unwrap_or("-")),
        ];
        if with_user {
            row.insert(1, Cell::new(&record.user_id));
        }
        table.add_row(row);
    }

    let failed = entries.iter().filter(|e| e.record.outcome.is_failure()).count();
    println!("{} events, {failed} failed", entries.len());
    println!("{table}");
}
