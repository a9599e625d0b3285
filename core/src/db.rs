use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::StoreError;
use crate::models::{NewRecipe, Recipe};

/// The persistent store: one SQLite connection with additive,
/// `user_version`-keyed migrations. Two collections: `recipes` (keyed by
/// a caller timestamp or an assigned one, with a secondary index on the
/// sync flag) and `ingredients` (rewritten as a batch on every change).
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file and bring it to the current
    /// schema version. Any failure here means persistence is unavailable
    /// and is classified as `UnsupportedEnvironment`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(StoreError::UnsupportedEnvironment)?;
        let db = Database { conn };
        db.migrate().map_err(StoreError::UnsupportedEnvironment)?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::UnsupportedEnvironment)?;
        let db = Database { conn };
        db.migrate().map_err(StoreError::UnsupportedEnvironment)?;
        Ok(db)
    }

    fn migrate(&self) -> rusqlite::Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    image_src TEXT,
                    synced INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            // Stores created before v2 have no synced index; reads that
            // need it surface IndexMissing until this runs.
            self.conn.execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_recipes_synced ON recipes(synced);

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            image_src: row.get(3)?,
            synced: row.get(4)?,
        })
    }

    // --- Recipes ---

    /// Insert or overwrite-by-id. A missing id is assigned from the
    /// current UNIX timestamp in milliseconds, the same keying syncing
    /// clients use. Returns the stored record.
    pub fn put_recipe(&self, new: &NewRecipe, synced: bool) -> Result<Recipe, StoreError> {
        let id = new.id.unwrap_or_else(|| Utc::now().timestamp_millis());
        self.conn.execute(
            "INSERT OR REPLACE INTO recipes (id, name, description, image_src, synced)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, new.name, new.description, new.image_src, synced],
        )?;
        Ok(Recipe {
            id,
            name: new.name.clone(),
            description: new.description.clone(),
            image_src: new.image_src.clone(),
            synced,
        })
    }

    pub fn get_all_recipes(&self) -> Result<Vec<Recipe>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, image_src, synced FROM recipes ORDER BY id")?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    /// All recipes not yet acknowledged by the sync endpoint, read
    /// through the synced index. Fails with `IndexMissing` when the
    /// store predates the index; callers that can proceed treat that as
    /// an empty result.
    pub fn get_unsynced_recipes(&self) -> Result<Vec<Recipe>, StoreError> {
        if !self.has_synced_index()? {
            return Err(StoreError::IndexMissing);
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, image_src, synced
             FROM recipes INDEXED BY idx_recipes_synced
             WHERE synced = 0
             ORDER BY id",
        )?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    fn has_synced_index(&self) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_recipes_synced'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // --- Ingredients ---

    /// Clear the collection and insert one row per name, as one
    /// transaction. A concurrent reader sees the pre-clear or the
    /// post-insert state, never a partial batch.
    pub fn replace_ingredients(&self, names: &[String]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM ingredients", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO ingredients (name) VALUES (?1)")?;
            for name in names {
                stmt.execute(params![name])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_all_ingredient_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM ingredients ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}
