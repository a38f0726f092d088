use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Identifier of the built-in default source.
pub const DEFAULT_SOURCE_ID: &str = "default";

const SUFFIX_LEN: usize = 5;
const MAX_SLUG_LEN: usize = 40;

/// Identifier of a spec source, e.g. `pet-store-7k2qd`.
///
/// Generated ids are `{slug}-{suffix}` where the suffix comes from the random
/// part of a fresh ULID. Ids read back from disk are taken verbatim.
#[derive(Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    /// Fresh id derived from a display name.
    pub fn generate(name: &str) -> Self {
        let encoded = ulid::Ulid::new().to_string().to_ascii_lowercase();
        let suffix = &encoded[encoded.len() - SUFFIX_LEN..];
        Self(format!("{}-{}", slugify(name), suffix))
    }

    pub fn default_source() -> Self {
        Self(DEFAULT_SOURCE_ID.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SOURCE_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lower-case ASCII slug; `spec` when nothing usable remains.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "spec".to_string()
    } else {
        slug.to_string()
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SourceId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SourceId(s.trim().to_string()))
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        SourceId(s.trim().to_string())
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Err(serde::de::Error::custom("empty source id"));
        }
        Ok(SourceId::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_shape() {
        let id = SourceId::generate("Swagger Petstore - OpenAPI 3.0");
        let (slug, suffix) = id.as_str().rsplit_once('-').unwrap();
        assert_eq!(slug, "swagger-petstore-openapi-3-0");
        assert_eq!(suffix.len(), 5);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, SourceId::generate("Swagger Petstore - OpenAPI 3.0"));
    }

    #[test]
    fn test_slugify_edge_cases() {
        assert_eq!(slugify("  ***  "), "spec");
        assert_eq!(slugify("Ünïcode API"), "n-code-api");
        assert!(slugify(&"x".repeat(100)).len() <= MAX_SLUG_LEN);
    }

    #[test]
    fn test_default_and_serde() {
        assert!(SourceId::default_source().is_default());
        let id: SourceId = serde_json::from_str("\"pets-abcde\"").unwrap();
        assert_eq!(id.to_string(), "pets-abcde");
        assert!(serde_json::from_str::<SourceId>("\"  \"").is_err());
    }
}
