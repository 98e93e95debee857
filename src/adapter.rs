//! Container adapter and translation dictionary interfaces (§6). Concrete
//! document containers (DOCX/XLSX/ODT/HTML) are out of scope (§1) — this
//! crate only names the boundary as a trait, mirroring the teacher's
//! `adapters/mod.rs` trait-based bridge between representations.

use std::collections::HashMap;

/// What a concrete document container adapter must provide: a text
/// projection of the container's content plus enough structure to reinject
/// processed text (and duplicated iteration regions) back into it.
///
/// `structure` is an opaque, adapter-defined token — the core never
/// interprets it, only threads it from `extract` back into `inject`.
pub trait ContainerAdapter {
    type Structure;

    /// Extracts a flat text projection from `bytes` plus the structural
    /// metadata needed to reinject processed text later.
    fn extract(&self, bytes: &[u8]) -> Result<(String, Self::Structure), String>;

    /// Reinjects `processed_text` into `bytes`'s original structure,
    /// duplicating regions per `expansion_plan` for iteration tags (§4.6,
    /// §9 "Iteration that spans multiple lines").
    fn inject(
        &self,
        processed_text: &str,
        structure: &Self::Structure,
        expansion_plan: &[(u64, usize)],
    ) -> Result<Vec<u8>, String>;
}

/// `locale -> { key -> string }` translation lookup (§6). The translation
/// tag consults `options.locale`, falls back to `default_locale`, then to
/// the key itself.
pub trait TranslationDictionary {
    fn lookup(&self, locale: &str, key: &str) -> Option<&str>;
}

/// The one concrete `TranslationDictionary` this crate owns, since an
/// in-memory map needs no I/O (unlike a real container adapter).
#[derive(Debug, Clone, Default)]
pub struct MapTranslationDictionary {
    entries: HashMap<String, HashMap<String, String>>,
}

impl MapTranslationDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: impl Into<String>, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(locale.into()).or_default().insert(key.into(), value.into());
    }
}

impl TranslationDictionary for MapTranslationDictionary {
    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.entries.get(locale)?.get(key).map(String::as_str)
    }
}

/// Resolves a translation key per §6: `options.locale`, then
/// `default_locale`, then the key itself.
pub fn resolve_translation(
    dict: &dyn TranslationDictionary,
    key: &str,
    locale: Option<&str>,
    default_locale: &str,
) -> String {
    if let Some(locale) = locale {
        if let Some(value) = dict.lookup(locale, key) {
            return value.to_string();
        }
    }
    if let Some(value) = dict.lookup(default_locale, key) {
        return value.to_string();
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_through_locale_then_default_then_key() {
        let mut dict = MapTranslationDictionary::new();
        dict.insert("en", "greeting", "Hello");
        assert_eq!(resolve_translation(&dict, "greeting", Some("fr"), "en"), "Hello");
        assert_eq!(resolve_translation(&dict, "greeting", None, "en"), "Hello");
        assert_eq!(resolve_translation(&dict, "missing", Some("en"), "en"), "missing");
    }

    #[test]
    fn locale_specific_entry_wins_over_default() {
        let mut dict = MapTranslationDictionary::new();
        dict.insert("en", "greeting", "Hello");
        dict.insert("fr", "greeting", "Bonjour");
        assert_eq!(resolve_translation(&dict, "greeting", Some("fr"), "en"), "Bonjour");
    }
}
