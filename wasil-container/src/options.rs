//! Build options.

use serde::{Deserialize, Serialize};

/// Options controlling how a [`ServiceCollection`](crate::collection::ServiceCollection)
/// is turned into a provider.
///
/// Deserializable, so it can live in an application's config file; missing
/// fields fall back to their defaults.
///
/// # Examples
/// ```
/// use wasil_container::options::ProviderOptions;
///
/// let options = ProviderOptions::default();
/// assert!(options.eager_singletons);
/// assert!(options.allow_override);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Build every singleton while building the provider, in dependency
    /// order, so construction failures surface at startup.
    pub eager_singletons: bool,

    /// Let a later registration of the same key replace the earlier one.
    /// When off, registering a key twice fails the build.
    pub allow_override: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            eager_singletons: true,
            allow_override: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let options: ProviderOptions = serde_json::from_str(r#"{"allow_override": false}"#).unwrap();
        assert!(options.eager_singletons);
        assert!(!options.allow_override);
    }

    #[test]
    fn serializes_field_names() {
        let json = serde_json::to_string(&ProviderOptions::default()).unwrap();
        assert_eq!(json, r#"{"eager_singletons":true,"allow_override":true}"#);
    }
}
