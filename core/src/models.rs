use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// A locally persisted recipe. `image_src` holds a data URI or a remote
/// URL; `synced` flips to true only after the sync endpoint acknowledges
/// the record. Wire field names keep the store's historical spelling
/// (`imageSrc`), which the sync endpoint expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(rename = "imageSrc", default)]
    pub image_src: Option<String>,
    pub synced: bool,
}

/// Input for `put_recipe`. `id` is None for fresh submissions; the store
/// assigns the current timestamp in milliseconds.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    pub image_src: Option<String>,
}

/// Message broadcast to open application instances when a background
/// sync opportunity is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppMessage {
    #[serde(rename = "SYNC_RECIPES")]
    SyncRecipes,
}

/// A recipe search result normalized across providers.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeHit {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub link: String,
}

pub fn validate_recipe_fields(name: &str, description: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Recipe name must not be empty");
    }
    if description.trim().is_empty() {
        bail!("Recipe description must not be empty");
    }
    Ok(())
}

pub fn normalize_ingredient_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Please enter an ingredient.");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_wire_field_names() {
        let recipe = Recipe {
            id: 1700000000000,
            name: "Menemen".to_string(),
            description: "Eggs in tomato".to_string(),
            image_src: Some("data:image/jpeg;base64,xyz".to_string()),
            synced: false,
        };
        let json = serde_json::to_value(&recipe).unwrap();
        assert_eq!(json["imageSrc"], "data:image/jpeg;base64,xyz");
        assert_eq!(json["synced"], false);
        assert!(json.get("image_src").is_none());
    }

    #[test]
    fn test_recipe_deserializes_without_image() {
        let recipe: Recipe =
            serde_json::from_str(r#"{"id":1,"name":"a","description":"b","synced":true}"#).unwrap();
        assert!(recipe.image_src.is_none());
        assert!(recipe.synced);
    }

    #[test]
    fn test_sync_message_wire_format() {
        let json = serde_json::to_string(&AppMessage::SyncRecipes).unwrap();
        assert_eq!(json, r#"{"type":"SYNC_RECIPES"}"#);
        let parsed: AppMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, AppMessage::SyncRecipes);
    }

    #[test]
    fn test_validate_recipe_fields() {
        assert!(validate_recipe_fields("Menemen", "Eggs in tomato").is_ok());
        assert!(validate_recipe_fields("", "desc").is_err());
        assert!(validate_recipe_fields("name", "   ").is_err());
    }

    #[test]
    fn test_normalize_ingredient_name() {
        assert_eq!(normalize_ingredient_name("  egg ").unwrap(), "egg");
        assert!(normalize_ingredient_name("").is_err());
        assert!(normalize_ingredient_name("   ").is_err());
    }
}
