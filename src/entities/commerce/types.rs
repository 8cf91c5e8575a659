//! JSON-backed column types shared by the commerce entities.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Language used when a caller does not ask for one
pub const DEFAULT_LANGUAGE: &str = "vi";
const FALLBACK_LANGUAGE: &str = "en";

/// Display text that is either a single string or a per-language map
/// such as `{"vi": "Áo thun", "en": "T-shirt"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedText {
    /// Resolve to a single string: the requested language, then the default
    /// language, then English, then whatever entry comes first.
    pub fn resolve(&self, lang: &str) -> &str {
        match self {
            LocalizedText::Plain(text) => text,
            LocalizedText::Localized(map) => [lang, DEFAULT_LANGUAGE, FALLBACK_LANGUAGE]
                .iter()
                .find_map(|key| map.get(*key))
                .or_else(|| map.values().next())
                .map(String::as_str)
                .unwrap_or(""),
        }
    }

    pub fn resolve_default(&self) -> &str {
        self.resolve(DEFAULT_LANGUAGE)
    }
}

impl From<&str> for LocalizedText {
    fn from(value: &str) -> Self {
        LocalizedText::Plain(value.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn contains_ignore_case(&self, value: &str) -> bool {
        self.find_ignore_case(value).is_some()
    }

    /// The declared spelling of `value`, if present
    pub fn find_ignore_case(&self, value: &str) -> Option<&String> {
        self.0.iter().find(|v| v.eq_ignore_ascii_case(value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&String> {
        self.0.first()
    }
}

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        StringList(values)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct UuidList(pub Vec<Uuid>);

impl UuidList {
    pub fn contains(&self, id: &Uuid) -> bool {
        self.0.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localized(pairs: &[(&str, &str)]) -> LocalizedText {
        LocalizedText::Localized(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn plain_text_ignores_language() {
        let text = LocalizedText::from("Sneaker");
        assert_eq!(text.resolve("ja"), "Sneaker");
    }

    #[test]
    fn localized_text_falls_back_in_order() {
        let text = localized(&[("en", "Shirt"), ("vi", "Áo"), ("ja", "シャツ")]);
        assert_eq!(text.resolve("ja"), "シャツ");
        assert_eq!(text.resolve("fr"), "Áo");

        let english_only = localized(&[("en", "Shirt"), ("ko", "셔츠")]);
        assert_eq!(english_only.resolve("fr"), "Shirt");

        let other = localized(&[("ko", "셔츠")]);
        assert_eq!(other.resolve("fr"), "셔츠");
    }

    #[test]
    fn variant_lookup_returns_declared_spelling() {
        let colors = StringList::from(vec!["Red".to_string(), "Navy Blue".to_string()]);
        assert_eq!(colors.find_ignore_case("navy blue").map(String::as_str), Some("Navy Blue"));
        assert!(colors.contains_ignore_case("RED"));
        assert!(!colors.contains_ignore_case("green"));
    }

    #[test]
    fn deserializes_both_shapes() {
        let plain: LocalizedText = serde_json::from_str(r#""Hat""#).unwrap();
        assert_eq!(plain, LocalizedText::from("Hat"));

        let map: LocalizedText = serde_json::from_str(r#"{"vi":"Mũ","en":"Hat"}"#).unwrap();
        assert_eq!(map.resolve("en"), "Hat");
    }
}
