//! Pull-rate command implementation.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use cardmatch_core::{pull_rate, Pack};
use colored::Colorize;

use crate::utils::{percent, print_json, read_json};

/// Execute the pull-rate command.
pub fn execute(pack_path: PathBuf, owned_path: Option<PathBuf>, json: bool) -> Result<()> {
    let pack: Pack = read_json(&pack_path, "pack definition")?;
    let owned: HashSet<String> = match &owned_path {
        Some(path) => read_json::<Vec<String>>(path, "owned list")?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    let report = pull_rate(&pack, &owned)?;

    if json {
        return print_json(&report);
    }

    let name = pack
        .name
        .clone()
        .unwrap_or_else(|| pack_path.display().to_string());
    println!("{} {}", "Pack:".dimmed(), name.bold());
    println!(
        "   {} {}/{} cards",
        "Unowned:".dimmed(),
        report.unowned,
        report.total
    );
    let headline = percent(report.probability);
    let headline = if report.unowned == 0 {
        headline.dimmed()
    } else {
        headline.green().bold()
    };
    println!("   {} {}", "New card chance:".dimmed(), headline);
    println!();
    for odds in &report.by_rarity {
        println!(
            "   {:<5} {:>3}/{:<3} owned  {}",
            odds.rarity.to_string(),
            odds.owned,
            odds.total,
            percent(odds.probability)
        );
    }
    Ok(())
}
