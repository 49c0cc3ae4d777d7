//! Typed view over the free-form generation recipe stored on variants.
//!
//! The server keeps the recipe as an opaque JSON string. Parsing is
//! lenient: unknown fields are ignored, and anything that is not a JSON
//! object with the expected field types yields `None` instead of an error.

use serde::{Deserialize, Serialize};

use crate::types::VariantId;

/// Maximum recipe string length accepted for parsing.
pub const MAX_RECIPE_LENGTH: usize = 64 * 1024;

/// Generation parameters recorded when a variant was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// Variants used as references or inputs.
    #[serde(default)]
    pub source_variant_ids: Vec<VariantId>,
}

/// Parse a recipe string, returning `None` on any failure.
pub fn parse_recipe(raw: &str) -> Option<Recipe> {
    if raw.trim().is_empty() || raw.len() > MAX_RECIPE_LENGTH {
        return None;
    }
    match serde_json::from_str::<Recipe>(raw) {
        Ok(recipe) => Some(recipe),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable recipe");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_fields() {
        let recipe =
            parse_recipe(r#"{"prompt":"a knight","aspectRatio":"16:9","sourceVariantIds":["v1"]}"#)
                .unwrap();
        assert_eq!(recipe.prompt.as_deref(), Some("a knight"));
        assert_eq!(recipe.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(recipe.source_variant_ids, vec!["v1".to_string()]);
        assert!(recipe.model.is_none());
    }

    #[test]
    fn ignores_unknown_fields() {
        let recipe = parse_recipe(r#"{"prompt":"x","seed":42,"extra":{"a":1}}"#).unwrap();
        assert_eq!(recipe.prompt.as_deref(), Some("x"));
    }

    #[test]
    fn malformed_json_yields_none() {
        assert!(parse_recipe("{not json").is_none());
    }

    #[test]
    fn wrong_shape_yields_none() {
        assert!(parse_recipe(r#"["prompt"]"#).is_none());
        assert!(parse_recipe(r#"{"prompt":12}"#).is_none());
    }

    #[test]
    fn empty_string_yields_none() {
        assert!(parse_recipe("   ").is_none());
    }
}
