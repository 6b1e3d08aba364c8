use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use spherekeep_core::config::StoreConfig;
use spherekeep_core::Store;

use super::open_store;

pub fn init(config: &StoreConfig) -> Result<()> {
    let existed = config.database_path.is_file();
    Store::open(config)?;
    if existed {
        println!("Photo cache already initialized: {}", config.database_path.display());
    } else {
        println!("Created photo cache: {}", config.database_path.display());
    }
    Ok(())
}

/// Parse an authoritative ID list: a JSON array of strings, or one ID per line.
pub(crate) fn parse_id_list(contents: &str) -> Result<HashSet<String>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        let ids: Vec<String> =
            serde_json::from_str(trimmed).context("ID list is not a JSON array of strings")?;
        return Ok(ids.into_iter().filter(|id| !id.is_empty()).collect());
    }
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub fn reconcile(config: &StoreConfig, ids_file: &Path) -> Result<()> {
    let contents = fs::read_to_string(ids_file)
        .with_context(|| format!("failed to read {}", ids_file.display()))?;
    let authoritative = parse_id_list(&contents)?;
    if authoritative.is_empty() {
        bail!(
            "{} lists no photo IDs; refusing to remove every cached photo",
            ids_file.display()
        );
    }

    let store = open_store(config)?;
    let removed = store.catalog().reconcile(&authoritative)?;
    println!(
        "Removed {removed} photos not in the listing ({} listed)",
        authoritative.len()
    );
    Ok(())
}

pub fn stats(config: &StoreConfig) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.catalog().stats()?;

    println!();
    println!("  SphereKeep Status");
    println!("  =================");
    println!();
    println!(
        "   Photos:      {:>8}        Published:   {:>8}",
        stats.photo_count, stats.published_count
    );
    println!(
        "   Places:      {:>8}        Connections: {:>8}",
        stats.place_count, stats.connection_count
    );
    println!("   Total views: {:>8}", stats.total_views);
    println!("   Last update: {}", stats.last_updated);
    println!();
    println!("  Cache: {}", config.database_path.display());
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list_json_array() {
        let ids = parse_id_list(r#"["a", "b", "", "a"]"#).unwrap();
        assert_eq!(ids, ["a".to_string(), "b".to_string()].into());
    }

    #[test]
    fn test_parse_id_list_lines() {
        let ids = parse_id_list("a\n\n  b  \n# comment\n").unwrap();
        assert_eq!(ids, ["a".to_string(), "b".to_string()].into());
    }

    #[test]
    fn test_parse_id_list_empty() {
        assert!(parse_id_list("").unwrap().is_empty());
        assert!(parse_id_list("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_id_list_rejects_non_string_array() {
        assert!(parse_id_list("[1, 2]").is_err());
    }
}
