// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `civica list` command implementation.
//!
//! Fetches one page of messages through the store and prints it as a table,
//! followed by a per-status summary. `--json` prints the raw rows instead.

use chrono::NaiveDate;
use clap::Args;
use civica_core::{CivicaError, Message, MessageQuery, MessageStatus, StatusTab};
use civica_store::{FetchOutcome, MessageStore, StoreSnapshot};

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Status tab: all, in_progress, delivered, read, replied, failed.
    #[arg(long, default_value = "all")]
    pub tab: StatusTab,

    /// Source program tag (`modulo`).
    #[arg(long)]
    pub program: Option<String>,

    /// Only messages created on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Only messages created on or before this date (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Free-text search over name, surname and phone.
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Rows per page. Defaults to `store.page_size`.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Print rows as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn query(&self, default_page_size: u32) -> MessageQuery {
        MessageQuery {
            status: self.tab.query_status(),
            program: self.program.clone(),
            date_from: self.from,
            date_to: self.to,
            search: self.search.clone(),
            page: self.page.max(1),
            page_size: self.page_size.unwrap_or(default_page_size),
        }
    }
}

pub async fn run_list(
    store: &MessageStore,
    args: &ListArgs,
    default_page_size: u32,
    use_color: bool,
) -> Result<(), CivicaError> {
    if let FetchOutcome::Superseded = store.fetch(args.query(default_page_size)).await? {
        return Ok(());
    }
    let snapshot = store.snapshot();
    let rows = snapshot.in_tab(args.tab);

    if args.json {
        let text = serde_json::to_string_pretty(&rows)
            .map_err(|e| CivicaError::Internal(format!("failed to encode rows: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    print_table(&rows, use_color);
    println!();
    println!("  {}", page_footer(&snapshot));
    println!("  {}", summary_line(&snapshot));
    Ok(())
}

fn print_table(rows: &[&Message], use_color: bool) {
    if rows.is_empty() {
        println!("  no messages");
        return;
    }
    println!(
        "  {:<26} {:<28} {:<16} {:<12} DETAIL",
        "ID", "NAME", "PHONE", "STATUS"
    );
    println!("  {}", "-".repeat(96));
    for message in rows {
        println!(
            "  {:<26} {:<28} {:<16} {} {}",
            message.id.as_str(),
            truncate(&message.full_name(), 28),
            message.phone,
            paint(message.status, use_color),
            detail(message),
        );
    }
}

fn page_footer(snapshot: &StoreSnapshot) -> String {
    format!(
        "page {} of {} ({} messages)",
        snapshot.query.page,
        snapshot.total_pages().max(1),
        snapshot.total_count
    )
}

/// `Enviado: 3 · Fallido: 1` over the statuses present on the page.
pub fn summary_line(snapshot: &StoreSnapshot) -> String {
    let counts = snapshot.status_counts();
    if counts.is_empty() {
        return "no rows on this page".to_string();
    }
    MessageStatus::ALL
        .iter()
        .filter_map(|status| counts.get(status).map(|n| format!("{}: {n}", status.label())))
        .collect::<Vec<_>>()
        .join(" · ")
}

/// Failure reason or reply text, whichever applies.
fn detail(message: &Message) -> String {
    match message.status {
        MessageStatus::Replied => message.reply_content.clone().unwrap_or_default(),
        _ => message.status_message.clone().unwrap_or_default(),
    }
}

/// Status label padded to a fixed column, colored when enabled.
pub fn paint(status: MessageStatus, use_color: bool) -> String {
    let label = format!("{:<12}", status.label());
    if !use_color {
        return label;
    }
    use colored::Colorize;
    match status {
        MessageStatus::Pending | MessageStatus::Sending | MessageStatus::Sent => {
            label.yellow().to_string()
        }
        MessageStatus::Delivered => label.blue().to_string(),
        MessageStatus::Read => label.cyan().to_string(),
        MessageStatus::Replied => label.green().to_string(),
        MessageStatus::Failed => label.red().to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
