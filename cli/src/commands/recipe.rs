use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use base64::Engine;
use tabled::{Table, Tabled, settings::Style};
use tracing::warn;

use larder_core::models::NewRecipe;
use larder_core::service::Session;

use super::helpers::{truncate, yes_no};
use crate::sync::{SyncCoordinator, SyncOutcome};

#[derive(Tabled)]
struct RecipeRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Synced")]
    synced: &'static str,
}

fn recipe_rows(recipes: &[larder_core::models::Recipe]) -> Vec<RecipeRow> {
    recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 30),
            description: truncate(&r.description, 40),
            synced: yes_no(r.synced),
        })
        .collect()
}

/// Inline an image file as a `data:` URI, the same form the camera
/// capture flow stores.
fn image_data_uri(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image file: {}", path.display()))?;
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    };
    let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{mime};base64,{payload}"))
}

pub(crate) async fn cmd_recipe_add(
    session: &Session,
    coordinator: &SyncCoordinator,
    offline: bool,
    name: &str,
    description: &str,
    image: Option<&str>,
    json: bool,
) -> Result<()> {
    let image_src = image.map(|p| image_data_uri(Path::new(p))).transpose()?;

    let mut recipe = session.save_recipe(&NewRecipe {
        id: None,
        name: name.to_string(),
        description: description.to_string(),
        image_src,
    })?;

    // The save is done; the push is opportunistic. Failures leave the
    // recipe unsynced for the next sync pass.
    if !offline {
        match coordinator.sync_once(session).await {
            Ok(SyncOutcome::Synced(_)) => {
                recipe.synced = true;
                eprintln!("Recipes synced successfully!");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "opportunistic sync failed");
                eprintln!("Failed to sync recipes. Please try again later.");
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let id = recipe.id;
        println!("Saved recipe: {name} (id: {id})");
        if !recipe.synced {
            println!("Push it to the sync server with: larder sync");
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(session: &Session, json: bool) -> Result<()> {
    let recipes = session.list_recipes()?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found.");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let table = Table::new(recipe_rows(&recipes))
        .with(Style::rounded())
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_recipe_unsynced(session: &Session, json: bool) -> Result<()> {
    let recipes = session.unsynced_recipes()?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            println!("All recipes are synced");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let table = Table::new(recipe_rows(&recipes))
        .with(Style::rounded())
        .to_string();
    println!("{table}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_data_uri_encodes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let uri = image_data_uri(&path).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(decoded, [0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_image_data_uri_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.raw");
        std::fs::write(&path, b"bytes").unwrap();

        let uri = image_data_uri(&path).unwrap();
        assert!(uri.starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn test_image_data_uri_missing_file() {
        let err = image_data_uri(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(err.to_string().contains("Failed to read image file"));
    }
}
