use std::process;

use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use larder_core::cache::CacheStore;

use crate::lifecycle::{self, STATIC_REGION};
use crate::providers::ApiClient;

pub(crate) async fn cmd_cache_install(
    client: &ApiClient,
    store: &CacheStore,
    base_url: &str,
    json: bool,
) -> Result<()> {
    let count = lifecycle::install(client.http(), store, base_url).await?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "cached": count, "region": STATIC_REGION })
        );
    } else {
        println!("Cached {count} assets into {STATIC_REGION}");
    }
    Ok(())
}

pub(crate) fn cmd_cache_activate(store: &CacheStore, json: bool) -> Result<()> {
    let removed = lifecycle::activate(store)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&removed)?);
    } else if removed.is_empty() {
        println!("No stale cache regions");
    } else {
        for region in &removed {
            println!("Removed {region}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_cache_status(store: &CacheStore, json: bool) -> Result<()> {
    let regions = store.list_regions()?;
    if regions.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No cache regions. Run: larder cache install");
        }
        process::exit(2);
    }

    let mut counts = Vec::with_capacity(regions.len());
    for name in &regions {
        let region = store.region(name)?;
        counts.push((name.clone(), region.entry_count()));
    }

    if json {
        let entries: Vec<serde_json::Value> = counts
            .iter()
            .map(|(name, count)| serde_json::json!({ "region": name, "entries": count }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct RegionRow {
        #[tabled(rename = "Region")]
        region: String,
        #[tabled(rename = "Entries")]
        entries: usize,
    }

    let rows: Vec<RegionRow> = counts
        .into_iter()
        .map(|(region, entries)| RegionRow { region, entries })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

pub(crate) async fn cmd_fetch(
    client: &ApiClient,
    url: &str,
    navigate: bool,
    json: bool,
) -> Result<()> {
    let response = client.router().route(url, navigate).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "url": response.url,
                "status": response.status,
                "source": response.source.to_string(),
                "content_type": response.content_type,
                "bytes": response.body.len(),
            })
        );
        return Ok(());
    }

    let status = response.status;
    let source = response.source;
    let bytes = response.body.len();
    eprintln!("{status} via {source} ({bytes} bytes)");

    if let Ok(text) = std::str::from_utf8(&response.body) {
        print!("{text}");
        if !text.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
