use std::process;

use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use larder_core::service::Session;

use super::helpers::json_error;

pub(crate) fn cmd_ingredient_add(session: &Session, name: &str, json: bool) -> Result<()> {
    let added = session.add_ingredient(name)?;
    if json {
        println!("{}", serde_json::json!({ "added": added }));
    } else {
        println!("{added} was successfully added!");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_remove(session: &Session, name: &str, json: bool) -> Result<()> {
    if session.remove_ingredient(name)? {
        if json {
            println!("{}", serde_json::json!({ "removed": name }));
        } else {
            println!("Removed {name}");
        }
    } else {
        if json {
            println!("{}", json_error(&format!("Ingredient '{name}' not found")));
        } else {
            eprintln!("Ingredient '{name}' not found");
        }
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(session: &Session, json: bool) -> Result<()> {
    let ingredients = session.list_ingredients()?;
    if ingredients.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No ingredients added yet");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Ingredient")]
        name: String,
    }

    let rows: Vec<IngredientRow> = ingredients
        .iter()
        .enumerate()
        .map(|(i, name)| IngredientRow {
            index: i + 1,
            name: name.clone(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}
