use serde::Deserialize;

use crate::models::RecipeHit;

/// One result from the Spoonacular `findByIngredients` endpoint, which
/// returns a bare JSON array of these.
#[derive(Debug, Deserialize)]
pub struct SpoonacularRecipe {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MealDbResponse {
    /// TheMealDB sends `"meals": null` instead of an empty array when a
    /// cuisine has no entries.
    pub meals: Option<Vec<MealDbMeal>>,
}

#[derive(Debug, Deserialize)]
pub struct MealDbMeal {
    #[serde(rename = "idMeal")]
    pub id_meal: Option<String>,
    #[serde(rename = "strMeal")]
    pub str_meal: Option<String>,
    #[serde(rename = "strMealThumb")]
    pub str_meal_thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub components: GeocodeComponents,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeComponents {
    pub country: Option<String>,
}

#[must_use]
pub fn spoonacular_to_hit(r: SpoonacularRecipe) -> Option<RecipeHit> {
    let id = r.id?;
    let title = r.title.filter(|t| !t.is_empty())?;
    let image = r.image.filter(|i| !i.is_empty())?;

    Some(RecipeHit {
        title,
        image: Some(image),
        link: format!("https://spoonacular.com/recipes/{id}"),
    })
}

#[must_use]
pub fn meal_to_hit(m: MealDbMeal) -> Option<RecipeHit> {
    let id = m.id_meal.filter(|i| !i.is_empty())?;
    let title = m.str_meal.filter(|t| !t.is_empty())?;
    let image = m.str_meal_thumb.filter(|t| !t.is_empty())?;

    Some(RecipeHit {
        title,
        image: Some(image),
        link: format!("https://www.themealdb.com/meal/{id}"),
    })
}

/// First country name in a reverse-geocode response, if any.
#[must_use]
pub fn country_from_geocode(resp: &GeocodeResponse) -> Option<String> {
    resp.results
        .first()
        .and_then(|r| r.components.country.clone())
        .filter(|c| !c.is_empty())
}

/// Map a country name to the cuisine adjective TheMealDB filters on.
/// Unmapped countries fall back to a crude suffix guess.
#[must_use]
pub fn cuisine_for_country(country: &str) -> String {
    let mapped = match country {
        "Poland" => "Polish",
        "Canada" => "Canadian",
        "United States" => "American",
        "United Kingdom" => "British",
        "France" => "French",
        "Italy" => "Italian",
        "Spain" => "Spanish",
        "Germany" => "German",
        "Mexico" => "Mexican",
        "China" => "Chinese",
        "Japan" => "Japanese",
        "India" => "Indian",
        "Thailand" => "Thai",
        "Greece" => "Greek",
        "Turkey" => "Turkish",
        "Brazil" => "Brazilian",
        "Argentina" => "Argentinian",
        "Australia" => "Australian",
        "Russia" => "Russian",
        "Sweden" => "Swedish",
        "Norway" => "Norwegian",
        "Denmark" => "Danish",
        "Netherlands" => "Dutch",
        "Portugal" => "Portuguese",
        "South Korea" => "Korean",
        "Vietnam" => "Vietnamese",
        _ => "",
    };
    if !mapped.is_empty() {
        return mapped.to_string();
    }

    if country.ends_with('a') || country.ends_with('o') || country.ends_with('e') {
        return format!("{country}n");
    }
    format!("{country}ish")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_spoonacular() -> SpoonacularRecipe {
        SpoonacularRecipe {
            id: Some(654959),
            title: Some("Pasta With Tuna".to_string()),
            image: Some("https://img.spoonacular.com/recipes/654959-312x231.jpg".to_string()),
        }
    }

    fn full_meal() -> MealDbMeal {
        MealDbMeal {
            id_meal: Some("52772".to_string()),
            str_meal: Some("Teriyaki Chicken Casserole".to_string()),
            str_meal_thumb: Some(
                "https://www.themealdb.com/images/media/meals/wvpsxx1468256321.jpg".to_string(),
            ),
        }
    }

    #[test]
    fn test_spoonacular_to_hit_complete() {
        let hit = spoonacular_to_hit(full_spoonacular()).unwrap();
        assert_eq!(hit.title, "Pasta With Tuna");
        assert_eq!(
            hit.image.as_deref(),
            Some("https://img.spoonacular.com/recipes/654959-312x231.jpg")
        );
        assert_eq!(hit.link, "https://spoonacular.com/recipes/654959");
    }

    #[test]
    fn test_spoonacular_to_hit_missing_fields() {
        let mut r = full_spoonacular();
        r.title = None;
        assert!(spoonacular_to_hit(r).is_none());

        // Empty image should also be skipped
        let mut r2 = full_spoonacular();
        r2.image = Some(String::new());
        assert!(spoonacular_to_hit(r2).is_none());

        let mut r3 = full_spoonacular();
        r3.id = None;
        assert!(spoonacular_to_hit(r3).is_none());
    }

    #[test]
    fn test_meal_to_hit_complete() {
        let hit = meal_to_hit(full_meal()).unwrap();
        assert_eq!(hit.title, "Teriyaki Chicken Casserole");
        assert_eq!(hit.link, "https://www.themealdb.com/meal/52772");
    }

    #[test]
    fn test_meal_to_hit_missing_thumb() {
        let mut m = full_meal();
        m.str_meal_thumb = None;
        assert!(meal_to_hit(m).is_none());
    }

    #[test]
    fn test_mealdb_null_meals_deserializes() {
        let resp: MealDbResponse = serde_json::from_str(r#"{"meals":null}"#).unwrap();
        assert!(resp.meals.is_none());
    }

    #[test]
    fn test_country_from_geocode() {
        let resp: GeocodeResponse = serde_json::from_str(
            r#"{"results":[{"components":{"country":"Turkey"}}]}"#,
        )
        .unwrap();
        assert_eq!(country_from_geocode(&resp).as_deref(), Some("Turkey"));

        let empty: GeocodeResponse = serde_json::from_str(r#"{"results":[]}"#).unwrap();
        assert!(country_from_geocode(&empty).is_none());
    }

    #[test]
    fn test_cuisine_for_country_mapped() {
        assert_eq!(cuisine_for_country("Turkey"), "Turkish");
        assert_eq!(cuisine_for_country("Netherlands"), "Dutch");
        assert_eq!(cuisine_for_country("United States"), "American");
    }

    #[test]
    fn test_cuisine_for_country_fallback() {
        // Vowel endings get an "n", everything else "ish"
        assert_eq!(cuisine_for_country("Moldova"), "Moldovan");
        assert_eq!(cuisine_for_country("Morocco"), "Moroccon");
        assert_eq!(cuisine_for_country("Kazakhstan"), "Kazakhstanish");
    }
}
