//! Exercises the two out-of-scope-but-trait-defined interfaces (§6): a
//! concrete `ContainerAdapter` a host format could implement, and the
//! `TranslationDictionary` contract `MapTranslationDictionary` satisfies.

use tagweave::adapter::{ContainerAdapter, MapTranslationDictionary, TranslationDictionary};

/// A toy container: the "document" is UTF-8 text with `||` separating a
/// header from a body. Enough to prove the adapter boundary round-trips
/// text out and modified text back in without the core crate knowing
/// anything about real document formats.
struct ToyContainer;

struct ToyStructure {
    header: String,
}

impl ContainerAdapter for ToyContainer {
    type Structure = ToyStructure;

    fn extract(&self, bytes: &[u8]) -> Result<(String, Self::Structure), String> {
        let text = String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())?;
        let (header, body) = text.split_once("||").ok_or("missing '||' separator")?;
        Ok((body.to_string(), ToyStructure { header: header.to_string() }))
    }

    fn inject(
        &self,
        processed_text: &str,
        structure: &Self::Structure,
        _expansion_plan: &[(u64, usize)],
    ) -> Result<Vec<u8>, String> {
        Ok(format!("{}||{}", structure.header, processed_text).into_bytes())
    }
}

#[test]
fn extract_then_inject_round_trips_through_the_core_pipeline() {
    let adapter = ToyContainer;
    let doc = b"TITLE||Hello {d.name}!".to_vec();

    let (body, structure) = adapter.extract(&doc).unwrap();
    assert_eq!(body, "Hello {d.name}!");

    let parsed = tagweave::parse_template(&body).unwrap();
    let data = tagweave::Value::from(serde_json::json!({"name": "world"}));
    let (rendered, _report) =
        tagweave::render(&parsed, &data, None, None, None, &tagweave::RenderOptions::default()).unwrap();

    let out = adapter.inject(&rendered, &structure, &[]).unwrap();
    assert_eq!(out, b"TITLE||Hello world!");
}

#[test]
fn extract_rejects_a_document_missing_its_separator() {
    let adapter = ToyContainer;
    assert!(adapter.extract(b"no separator here").is_err());
}

#[test]
fn translation_dictionary_contract_falls_back_to_the_key() {
    let dict = MapTranslationDictionary::new();
    assert_eq!(dict.lookup("en", "greeting"), None);
    assert_eq!(
        tagweave::adapter::resolve_translation(&dict, "greeting", Some("en"), "en"),
        "greeting"
    );
}
