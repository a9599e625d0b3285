use anyhow::{Result, bail};

/// Truncate a string to `max_len` characters, appending "..." when cut.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Render an error as a JSON object, for --json output on stdout.
pub(crate) fn json_error(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub(crate) fn check_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        bail!("Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&lon) {
        bail!("Longitude must be between -180 and 180");
    }
    Ok(())
}
