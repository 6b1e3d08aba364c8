use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use spherekeep_core::config::StoreConfig;
use spherekeep_core::import::{ImportProgress, ImportSummary};
use spherekeep_core::Store;

fn active_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::with_template(
        "  {bar:30.cyan/blue} {spinner:.green} {pos:>5}/{len:<5} {prefix:.dim} {msg}",
    )?
    .progress_chars("━╸─"))
}

fn done_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::with_template("  {bar:30.green} {prefix:.green} {msg:.dim}")?)
}

/// Drive one progress bar from import events.
struct ImportBar {
    pb: ProgressBar,
    done: ProgressStyle,
}

impl ImportBar {
    fn new() -> Result<Self> {
        let pb = ProgressBar::new(0);
        pb.set_style(active_style()?);
        pb.set_prefix("Importing");
        Ok(Self {
            pb,
            done: done_style()?,
        })
    }

    fn handle(&self, event: ImportProgress) {
        match event {
            ImportProgress::Start { total } => {
                self.pb.set_length(total as u64);
                self.pb.enable_steady_tick(Duration::from_millis(80));
            }
            ImportProgress::Imported { photo_id } => {
                self.pb.set_message(photo_id);
                self.pb.inc(1);
            }
            ImportProgress::Skipped { index, reason } => {
                self.pb.println(format!("  Skipped entry #{index}: {reason}"));
                self.pb.inc(1);
            }
            ImportProgress::Complete { imported, skipped } => {
                self.pb.set_style(self.done.clone());
                self.pb.set_prefix("done");
                self.pb
                    .finish_with_message(format!("Imported {imported} photos, skipped {skipped}"));
            }
        }
    }
}

fn print_summary(summary: &ImportSummary) {
    println!();
    println!(
        "  {} of {} entries imported ({} skipped)",
        summary.imported, summary.total, summary.skipped
    );
}

pub fn import(config: &StoreConfig, file: &Path) -> Result<()> {
    let store = Store::open(config)?;
    let bar = ImportBar::new()?;

    println!();
    println!("  Importing {}", file.display());
    let summary = store.import_json(file, Some(&mut |event| bar.handle(event)))?;
    print_summary(&summary);
    println!();
    Ok(())
}

pub fn sync(config: &StoreConfig, file: &Path) -> Result<()> {
    let store = Store::open(config)?;
    let bar = ImportBar::new()?;

    println!();
    println!("  Syncing with {}", file.display());
    let summary = store.sync_snapshot(file, Some(&mut |event| bar.handle(event)))?;
    print_summary(&summary.import);
    println!("  Removed {} photos no longer in the listing", summary.removed);
    println!();
    Ok(())
}
