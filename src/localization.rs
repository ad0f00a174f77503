//! # Localization Module
//!
//! User-facing strings live in Fluent resources under `locales/<lang>/main.ftl`
//! and are compiled into the binary. Lookups fall back to Russian, the
//! language the canteen operates in, when the requested language is unknown.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{error, warn};
use unic_langid::LanguageIdentifier;

use crate::config::DEFAULT_LANGUAGE;

const RESOURCES: &[(&str, &str)] = &[
    ("ru", include_str!("../locales/ru/main.ftl")),
    ("en", include_str!("../locales/en/main.ftl")),
];

/// Localization manager holding one Fluent bundle per language
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Build bundles for every embedded language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for &(language, source) in RESOURCES {
            let locale: LanguageIdentifier = language.parse()?;
            bundles.insert(language.to_string(), Self::create_bundle(&locale, source)?);
        }
        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Bidi isolation marks would leak into Telegram messages and callback labels
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid Fluent resource for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate Fluent messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message, falling back to the default language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, String>>,
    ) -> String {
        let Some(bundle) = self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(value.clone()));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key = %key, language = %language, errors = ?errors, "Fluent formatting errors");
        }
        value.into_owned()
    }
}

static LOCALIZATION: LazyLock<Option<LocalizationManager>> =
    LazyLock::new(|| match LocalizationManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            error!(error = %e, "Failed to load localization resources");
            None
        }
    });

/// Force loading of the embedded resources, reporting invalid ones
pub fn init_localization() -> Result<()> {
    match LOCALIZATION.as_ref() {
        Some(_) => Ok(()),
        None => Err(anyhow!("localization resources failed to load")),
    }
}

/// Localized message in `language` (default language when `None`)
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    lookup(key, language, None)
}

/// Localized message with string arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    let args: HashMap<&str, String> = args
        .iter()
        .map(|(name, value)| (*name, value.to_string()))
        .collect();
    lookup(key, language, Some(&args))
}

fn lookup(key: &str, language: Option<&str>, args: Option<&HashMap<&str, String>>) -> String {
    match LOCALIZATION.as_ref() {
        Some(manager) => {
            manager.get_message_in_language(key, language.unwrap_or(DEFAULT_LANGUAGE), args)
        }
        None => format!("Missing translation: {key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_resources_parse() {
        let manager = LocalizationManager::new().expect("resources should parse");
        assert!(manager.is_language_supported("ru"));
        assert!(manager.is_language_supported("en"));
        assert!(!manager.is_language_supported("fr"));
    }

    #[test]
    fn test_no_isolation_marks_around_arguments() {
        let text = t_args_lang("dish-button", &[("dish", "Борщ"), ("price", "150")], Some("ru"));
        assert_eq!(text, "Борщ 150р");
    }

    #[test]
    fn test_every_key_exists_in_both_languages() {
        let manager = LocalizationManager::new().expect("resources should parse");
        let ru = manager.bundles.get("ru").expect("ru bundle");
        let en = manager.bundles.get("en").expect("en bundle");
        for line in include_str!("../locales/ru/main.ftl").lines() {
            let Some((key, _)) = line.split_once(" =") else {
                continue;
            };
            if key.starts_with(' ') || key.starts_with('#') {
                continue;
            }
            assert!(ru.has_message(key), "ru is missing {key}");
            assert!(en.has_message(key), "en is missing {key}");
        }
    }
}
