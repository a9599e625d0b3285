mod cache;
mod find;
mod helpers;
mod ingredient;
mod recipe;
mod sync;

pub(crate) use cache::{cmd_cache_activate, cmd_cache_install, cmd_cache_status, cmd_fetch};
pub(crate) use find::{cmd_find, cmd_find_country};
pub(crate) use ingredient::{cmd_ingredient_add, cmd_ingredient_list, cmd_ingredient_remove};
pub(crate) use recipe::{cmd_recipe_add, cmd_recipe_list, cmd_recipe_unsynced};
pub(crate) use sync::cmd_sync;
