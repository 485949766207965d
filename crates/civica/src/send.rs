// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `civica send` command implementation.
//!
//! Reads people from a JSON export of a program registry, turns them into
//! recipients (optionally only today's or a given date's birthdays) and
//! submits the batch through the store.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Args;
use civica_core::{CivicaError, Person, RecipientBatch};
use civica_store::MessageStore;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// JSON file holding an array of people.
    pub file: PathBuf,

    /// Only send to people whose birthday falls on this date (YYYY-MM-DD).
    #[arg(long)]
    pub birthdays_on: Option<NaiveDate>,

    /// Print the batch without sending it.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn load_people(path: &Path) -> Result<Vec<Person>, CivicaError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CivicaError::Config(format!("cannot read people file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| CivicaError::Decode {
        message: format!("invalid people file {}: {e}", path.display()),
        source: Some(Box::new(e)),
    })
}

/// Builds the batch. Ages are computed at `birthdays_on` when set, else at `today`.
pub fn build_batch(people: &[Person], birthdays_on: Option<NaiveDate>, today: NaiveDate) -> RecipientBatch {
    match birthdays_on {
        Some(date) => RecipientBatch::birthdays_on(people, date),
        None => RecipientBatch::from_people(people, today),
    }
}

pub async fn run_send(store: &MessageStore, args: &SendArgs) -> Result<(), CivicaError> {
    let people = load_people(&args.file)?;
    let today = chrono::Local::now().date_naive();
    let batch = build_batch(&people, args.birthdays_on, today);
    info!(
        people = people.len(),
        recipients = batch.len(),
        skipped = batch.skipped.len(),
        "send batch prepared"
    );

    for id in &batch.skipped {
        eprintln!("  skipped {id}: no usable phone number");
    }
    if batch.is_empty() {
        println!("  nothing to send");
        return Ok(());
    }

    if args.dry_run {
        for recipient in &batch.recipients {
            println!(
                "  {} {} ({} años) -> {}",
                recipient.name, recipient.surname, recipient.age, recipient.phone
            );
        }
        println!("  {} recipients (dry run, nothing sent)", batch.len());
        return Ok(());
    }

    let receipt = store.send(&batch.recipients).await?;
    println!("  {} messages queued", receipt.count);
    for id in &receipt.message_ids {
        println!("    {id}");
    }
    Ok(())
}
