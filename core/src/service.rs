use std::path::Path;

use anyhow::{Result, anyhow, bail};
use tracing::warn;

use crate::db::Database;
use crate::error::StoreError;
use crate::models::{
    NewRecipe, Recipe, RecipeHit, normalize_ingredient_name, validate_recipe_fields,
};
use crate::providers::cuisine_for_country;

/// Remote recipe lookup provider.
///
/// The CLI implements this with reqwest behind its request router; tests
/// use a canned mock. Calls block, so async callers should use their
/// client's async methods directly.
pub trait RecipeProvider: Send + Sync {
    fn find_by_ingredients(&self, ingredients: &[String]) -> Result<Vec<RecipeHit>>;
    fn find_by_cuisine(&self, cuisine: &str) -> Result<Vec<RecipeHit>>;
    fn country_at(&self, lat: f64, lon: f64) -> Result<Option<String>>;
}

/// Result of a location-based recipe search.
#[derive(Debug)]
pub struct CountryRecipes {
    pub country: String,
    pub cuisine: String,
    pub hits: Vec<RecipeHit>,
}

pub struct Session {
    db: Database,
    degraded: bool,
}

impl Session {
    /// Open a session over the persistent store. When the environment
    /// cannot provide one the session degrades to an in-memory store
    /// that lasts for this process only.
    pub fn open(db_path: &Path) -> Result<Self> {
        match Database::open(db_path) {
            Ok(db) => Ok(Self {
                db,
                degraded: false,
            }),
            Err(e @ StoreError::UnsupportedEnvironment(_)) => {
                warn!(error = %e, "persistent store unavailable, falling back to in-memory session");
                let db = Database::open_in_memory()?;
                Ok(Self { db, degraded: true })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            degraded: false,
        })
    }

    /// True when the persistent store could not be opened and nothing
    /// from this session will survive the process.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    // --- Ingredient list ---

    /// Add one ingredient to the shopping list. Rejects blank input and
    /// exact duplicates; the check is case-sensitive.
    pub fn add_ingredient(&self, name: &str) -> Result<String> {
        let name = normalize_ingredient_name(name)?;
        let mut current = self.db.get_all_ingredient_names()?;
        if current.iter().any(|n| n == &name) {
            bail!("{name} is already added.");
        }
        current.push(name.clone());
        self.db.replace_ingredients(&current)?;
        Ok(name)
    }

    /// Remove an ingredient by exact name. Returns false when it was not
    /// on the list.
    pub fn remove_ingredient(&self, name: &str) -> Result<bool, StoreError> {
        let current = self.db.get_all_ingredient_names()?;
        let remaining: Vec<String> = current.iter().filter(|n| *n != name).cloned().collect();
        if remaining.len() == current.len() {
            return Ok(false);
        }
        self.db.replace_ingredients(&remaining)?;
        Ok(true)
    }

    pub fn list_ingredients(&self) -> Result<Vec<String>, StoreError> {
        self.db.get_all_ingredient_names()
    }

    // --- Recipe box ---

    /// Save a recipe locally. New recipes always start unsynced; the
    /// sync pass flips them after the backend accepts them.
    pub fn save_recipe(&self, new: &NewRecipe) -> Result<Recipe> {
        validate_recipe_fields(&new.name, &new.description)?;
        Ok(self.db.put_recipe(new, false)?)
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>, StoreError> {
        self.db.get_all_recipes()
    }

    // --- Sync state ---

    pub fn unsynced_recipes(&self) -> Result<Vec<Recipe>, StoreError> {
        self.db.get_unsynced_recipes()
    }

    /// Re-save each recipe with its synced flag set, keeping its id.
    /// Callers must only do this after the backend accepted the batch.
    pub fn mark_recipes_synced(&self, recipes: &[Recipe]) -> Result<(), StoreError> {
        for recipe in recipes {
            self.db.put_recipe(
                &NewRecipe {
                    id: Some(recipe.id),
                    name: recipe.name.clone(),
                    description: recipe.description.clone(),
                    image_src: recipe.image_src.clone(),
                },
                true,
            )?;
        }
        Ok(())
    }

    // --- Orchestrated finds (provider-backed) ---

    /// Search for recipes matching the saved ingredient list.
    pub fn find_recipes(
        &self,
        provider: &dyn RecipeProvider,
        online: bool,
    ) -> Result<Vec<RecipeHit>> {
        if !online {
            bail!("You are offline. Recipes cannot be fetched.");
        }
        let ingredients = self.list_ingredients()?;
        if ingredients.is_empty() {
            bail!("Please add at least one ingredient.");
        }
        provider.find_by_ingredients(&ingredients)
    }

    /// Reverse-geocode a position to a country, map it to a cuisine,
    /// and search for recipes from that cuisine.
    pub fn find_country_recipes(
        &self,
        provider: &dyn RecipeProvider,
        lat: f64,
        lon: f64,
    ) -> Result<CountryRecipes> {
        let country = provider
            .country_at(lat, lon)?
            .ok_or_else(|| anyhow!("Could not retrieve country information."))?;
        let cuisine = cuisine_for_country(&country);
        let hits = provider.find_by_cuisine(&cuisine)?;
        Ok(CountryRecipes {
            country,
            cuisine,
            hits,
        })
    }
}
