use std::io::{self, Write};

use serde::Serialize;

use crate::app::MetadataRow;
use crate::batch::BatchOutcome;
use crate::domain::CatalogItem;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub endpoint: String,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct DownloadSummary {
    pub written: Vec<String>,
    pub outcome: BatchOutcome,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_check(result: &CheckResult) {
        if result.connected {
            println!("connected to {}", result.endpoint);
        } else {
            println!(
                "reached {} but the root folder is empty or unreadable",
                result.endpoint
            );
        }
    }

    pub fn print_items(items: &[CatalogItem]) {
        for item in items {
            println!("{:<10} {}", item.item_type.as_str(), item.path);
        }
        println!("{} item(s)", items.len());
    }

    pub fn print_metadata(rows: &[MetadataRow]) {
        for row in rows {
            println!(
                "{}\t{}\tcreated {}\tmodified {}",
                row.name, row.path, row.created_at, row.modified_at
            );
        }
        println!("{} report(s)", rows.len());
    }

    pub fn print_outcome(verb: &str, outcome: &BatchOutcome) {
        println!("{verb} {} report(s)", outcome.succeeded);
        if outcome.failed > 0 {
            println!("{} failed:", outcome.failed);
            for failure in &outcome.failures {
                println!("  {}: {}", failure.item, failure.error);
            }
        }
        if outcome.dropped > 0 {
            println!("{} skipped over the batch limit", outcome.dropped);
        }
    }

    pub fn print_download(summary: &DownloadSummary) {
        Self::print_outcome("downloaded", &summary.outcome);
        for path in &summary.written {
            println!("  wrote {path}");
        }
    }
}
