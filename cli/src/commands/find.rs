use std::process;

use anyhow::{Context, Result, anyhow, bail};
use tabled::{Table, Tabled, settings::Style};

use larder_core::models::RecipeHit;
use larder_core::providers::cuisine_for_country;
use larder_core::service::Session;

use super::helpers::{check_coordinates, truncate};
use crate::providers::ApiClient;

pub(crate) async fn cmd_find(session: &Session, client: &ApiClient, json: bool) -> Result<()> {
    if client.is_offline() {
        bail!("You are offline. Recipes cannot be fetched.");
    }

    let ingredients = session.list_ingredients()?;
    if ingredients.is_empty() {
        bail!("Please add at least one ingredient.");
    }

    let hits = client.find_by_ingredients_async(&ingredients).await?;
    print_hits(&hits, "No recipes found.", json)
}

pub(crate) async fn cmd_find_country(
    client: &ApiClient,
    lat: f64,
    lon: f64,
    json: bool,
) -> Result<()> {
    check_coordinates(lat, lon)?;

    let country = client
        .country_at_async(lat, lon)
        .await
        .context("Failed to get country information.")?
        .ok_or_else(|| anyhow!("Could not retrieve country information."))?;
    let cuisine = cuisine_for_country(&country);
    if !json {
        eprintln!("Detected country: {country}");
    }

    let hits = client.find_by_cuisine_async(&cuisine).await?;
    print_hits(&hits, &format!("No recipes found for {country} ({cuisine})."), json)
}

fn print_hits(hits: &[RecipeHit], empty_message: &str, json: bool) -> Result<()> {
    if hits.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("{empty_message}");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct HitRow {
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Link")]
        link: String,
    }

    let rows: Vec<HitRow> = hits
        .iter()
        .map(|h| HitRow {
            title: truncate(&h.title, 40),
            link: h.link.clone(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}
