//! Results ledger listing

use std::path::PathBuf;

use clap::Args;
use vizreg_common::{LedgerEntry, Settings};
use vizreg_engine::{ledger, LoadState};

use crate::output::{print_list, print_warning, OutputFormat};

#[derive(Args, Debug)]
pub struct ResultsArgs {
    /// Output directory holding `results.json`
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Only show entries whose hash starts with this prefix
    #[arg(long)]
    pub hash: Option<String>,
}

pub async fn execute(args: ResultsArgs, settings: Settings, format: OutputFormat) -> anyhow::Result<bool> {
    let dir = args.path.unwrap_or(settings.output_dir);
    let ledger = ledger::read(&dir).await;

    if let LoadState::Recovered(reason) = ledger.state() {
        print_warning(&format!("{} is unreadable: {}", ledger.path().display(), reason));
    }

    let entries: Vec<LedgerEntry> = match &args.hash {
        Some(prefix) => ledger.find(prefix),
        None => ledger.entries(),
    };
    if args.hash.is_none() && entries.len() < ledger.len() {
        print_warning(&format!(
            "{} row(s) in {} are not vizreg entries and are not shown",
            ledger.len() - entries.len(),
            ledger.path().display()
        ));
    }
    print_list(&entries, format);

    Ok(entries.iter().all(|e| e.matched != Some(false)))
}
