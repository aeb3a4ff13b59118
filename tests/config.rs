use assert_matches::assert_matches;

use placenta_lit::config::{Config, ConfigLoader, default_placenta_keywords};
use placenta_lit::error::LitError;

#[test]
fn explicit_file_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("placenta-lit.json");
    std::fs::write(
        &path,
        r#"{
            "max_threads": 2,
            "column": "Metabolite",
            "query_terms": "placenta",
            "placenta_keywords": ["Trophoblast", "  "],
            "ocr": false
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.max_threads, 2);
    assert_eq!(resolved.column, "Metabolite");
    assert_eq!(resolved.query_terms, "placenta");
    assert_eq!(resolved.placenta_keywords, vec!["trophoblast".to_string()]);
    assert!(!resolved.ocr);
    assert_eq!(resolved.output_file, "analysis_results.xlsx");
    assert_eq!(resolved.request_timeout_secs, 15);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("nope.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, LitError::ConfigRead(_));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("bad.json");
    std::fs::write(&path, "{ max_threads: 2 ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, LitError::ConfigParse(_));
}

#[test]
fn empty_keyword_list_falls_back() {
    let config = Config {
        placenta_keywords: Some(vec![]),
        min_mention_count: Some(5),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config);
    assert_eq!(resolved.placenta_keywords, default_placenta_keywords());
    assert_eq!(resolved.min_mention_count, 5);
    assert_eq!(resolved.max_mentions_per_document, 25);
}
