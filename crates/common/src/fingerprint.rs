//! Test case identity
//!
//! Expands a caller's `{url, options}` pair into a full [`TestCase`]. The
//! fingerprint covers the url and the resolved viewport only, so a case keeps
//! its reference image across runs no matter which threshold or wait it uses.

use serde_json::Value;
use sha2::{Digest, Sha512};
use std::path::{Path, PathBuf};

use crate::config::{working_dir, Settings};
use crate::types::{CaseInput, CaseState, TestCase, Viewport};
use crate::{Error, Result};

/// Hex SHA-512 over `url ++ width ++ height`
pub fn fingerprint(url: &str, width: u32, height: u32) -> String {
    let mut hasher = Sha512::new();
    hasher.update(url.as_bytes());
    hasher.update(width.to_string().as_bytes());
    hasher.update(height.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Read a loosely-typed option as a number.
///
/// Numbers and numeric strings are accepted. Booleans, null, NaN, infinities,
/// zero and anything else yield `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n != 0.0).then_some(n)
}

fn resolve_dimension(value: &Value, default: u32) -> u32 {
    coerce_number(value)
        .filter(|n| *n >= 1.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32)
        .unwrap_or(default)
}

fn resolve_threshold(value: &Value, default: f64) -> f64 {
    coerce_number(value).filter(|n| *n > 0.0).unwrap_or(default)
}

fn resolve_wait(value: &Value, default: u64) -> u64 {
    coerce_number(value)
        .filter(|n| *n > 0.0)
        .map(|n| n as u64)
        .unwrap_or(default)
}

fn resolve_output_dir(value: &Value, default: &Path) -> PathBuf {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            let path = PathBuf::from(s);
            if path.is_absolute() {
                path
            } else {
                working_dir().join(path)
            }
        }
        _ => default.to_path_buf(),
    }
}

/// Builds test cases against one set of settings
#[derive(Debug, Clone, Copy)]
pub struct FingerprintBuilder<'a> {
    settings: &'a Settings,
}

impl<'a> FingerprintBuilder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Expand one input into a pending test case
    pub fn build(&self, input: &CaseInput) -> Result<TestCase> {
        let url = match &input.url {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::String(_) => return Err(Error::InvalidInput("empty url".to_string())),
            Value::Null => return Err(Error::InvalidInput("missing url".to_string())),
            other => {
                return Err(Error::InvalidInput(format!("url must be a string, got {}", other)))
            }
        };

        let options = &input.options;
        let viewport = Viewport::new(
            resolve_dimension(&options.vw, self.settings.viewport_width),
            resolve_dimension(&options.vh, self.settings.viewport_height),
        );
        let fingerprint = fingerprint(&url, viewport.width, viewport.height);

        Ok(TestCase {
            threshold: resolve_threshold(&options.threshold, self.settings.threshold),
            wait_ms: resolve_wait(&options.wait, self.settings.wait_ms),
            output_dir: resolve_output_dir(&options.path, &self.settings.output_dir),
            url,
            viewport,
            fingerprint,
            created_at: chrono::Utc::now(),
            state: CaseState::Pending,
            captured: None,
            reference_fresh: None,
            matched: None,
        })
    }

    /// Expand a batch; the first invalid input rejects the whole batch
    pub fn build_all(&self, inputs: &[CaseInput]) -> Result<Vec<TestCase>> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                self.build(input).map_err(|e| match e {
                    Error::InvalidInput(msg) => Error::InvalidInput(format!("item {}: {}", i, msg)),
                    other => other,
                })
            })
            .collect()
    }
}

/// Validate an untyped batch of `{url, options}` objects
pub fn parse_batch(value: &Value) -> Result<Vec<CaseInput>> {
    let items = match value {
        Value::Null => return Err(Error::InvalidInput("missing items".to_string())),
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidInput(format!(
                "items must be a list, got {}",
                json_kind(other)
            )))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let has_url = item
                .get("url")
                .or_else(|| item.get("uri"))
                .map_or(false, Value::is_string);
            if !has_url {
                return Err(Error::InvalidInput(format!("item {} is missing a url", i)));
            }
            serde_json::from_value(item.clone())
                .map_err(|e| Error::InvalidInput(format!("item {}: {}", i, e)))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    const URL: &str = "http://localhost:3000/static";

    fn settings() -> Settings {
        Settings {
            output_dir: PathBuf::from("/var/vizreg/shots"),
            ..Settings::default()
        }
    }

    fn input(options: Value) -> CaseInput {
        serde_json::from_value(json!({ "url": URL, "options": options })).unwrap()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint(URL, 500, 500);
        let b = fingerprint(URL, 500, 500);
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert_ne!(a, fingerprint(URL, 500, 501));
    }

    #[test]
    fn test_fingerprint_is_hash_of_concatenation() {
        let mut hasher = Sha512::new();
        hasher.update(format!("{}{}{}", URL, 1024, 786).as_bytes());
        assert_eq!(fingerprint(URL, 1024, 786), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_threshold_and_wait_do_not_change_identity() {
        let settings = settings();
        let builder = FingerprintBuilder::new(&settings);
        let a = builder
            .build(&input(json!({ "vw": 500, "vh": 500, "threshold": 0.01 })))
            .unwrap();
        let b = builder
            .build(&input(json!({ "vw": 500, "vh": 500, "threshold": 0.5, "wait": 2000 })))
            .unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.artifacts(), b.artifacts());
        assert_ne!(a.threshold, b.threshold);
    }

    #[test_case(json!(null) ; "null")]
    #[test_case(json!(true) ; "boolean true")]
    #[test_case(json!(false) ; "boolean false")]
    #[test_case(json!("wide") ; "non numeric string")]
    #[test_case(json!("") ; "empty string")]
    #[test_case(json!("NaN") ; "nan string")]
    #[test_case(json!(0) ; "zero")]
    #[test_case(json!(-20) ; "negative")]
    #[test_case(json!([500]) ; "list")]
    #[test_case(json!({}) ; "object")]
    fn test_unusable_options_fall_back_to_defaults(value: Value) {
        let settings = settings();
        let case = FingerprintBuilder::new(&settings)
            .build(&input(json!({ "vw": value, "vh": value, "threshold": value, "wait": value })))
            .unwrap();
        assert_eq!(case.viewport, Viewport::new(1024, 786));
        assert_eq!(case.threshold, 0.01);
        assert_eq!(case.wait_ms, 0);
    }

    #[test]
    fn test_missing_options_fall_back_to_defaults() {
        let settings = settings();
        let case = FingerprintBuilder::new(&settings)
            .build(&CaseInput::new(URL))
            .unwrap();
        assert_eq!(case.viewport, Viewport::new(1024, 786));
        assert_eq!(case.fingerprint, fingerprint(URL, 1024, 786));
        assert_eq!(case.output_dir, settings.output_dir);
        assert_eq!(case.state, CaseState::Pending);
        assert_eq!(case.captured, None);
        assert_eq!(case.reference_fresh, None);
        assert_eq!(case.matched, None);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let settings = settings();
        let case = FingerprintBuilder::new(&settings)
            .build(&input(json!({ "vw": "800", "vh": " 600 ", "threshold": "0.2", "wait": "150" })))
            .unwrap();
        assert_eq!(case.viewport, Viewport::new(800, 600));
        assert_eq!(case.threshold, 0.2);
        assert_eq!(case.wait_ms, 150);
    }

    #[test]
    fn test_settings_supply_defaults() {
        let settings = Settings {
            viewport_width: 320,
            viewport_height: 640,
            threshold: 0.3,
            wait_ms: 50,
            ..settings()
        };
        let case = FingerprintBuilder::new(&settings)
            .build(&input(json!({ "vw": false })))
            .unwrap();
        assert_eq!(case.viewport, Viewport::new(320, 640));
        assert_eq!(case.threshold, 0.3);
        assert_eq!(case.wait_ms, 50);
    }

    #[test]
    fn test_path_option_overrides_settings() {
        let settings = settings();
        let builder = FingerprintBuilder::new(&settings);

        let absolute = builder.build(&input(json!({ "path": "/srv/other" }))).unwrap();
        assert_eq!(absolute.output_dir, PathBuf::from("/srv/other"));

        let relative = builder.build(&input(json!({ "path": "foobar" }))).unwrap();
        assert_eq!(relative.output_dir, working_dir().join("foobar"));

        let ignored = builder.build(&input(json!({ "path": 7 }))).unwrap();
        assert_eq!(ignored.output_dir, settings.output_dir);
    }

    #[test_case(json!({ "options": {} }) ; "missing url")]
    #[test_case(json!({ "url": 42 }) ; "numeric url")]
    #[test_case(json!({ "url": "" }) ; "empty url")]
    fn test_invalid_url_is_rejected(raw: Value) {
        let settings = settings();
        let input: CaseInput = serde_json::from_value(raw).unwrap();
        let err = FingerprintBuilder::new(&settings).build(&input).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_build_all_names_the_failing_item() {
        let settings = settings();
        let inputs = vec![CaseInput::new(URL), CaseInput::default()];
        let err = FingerprintBuilder::new(&settings).build_all(&inputs).unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test_case(json!(null) ; "null")]
    #[test_case(json!({ "url": URL }) ; "object")]
    #[test_case(json!("string") ; "string")]
    #[test_case(json!(1) ; "number")]
    #[test_case(json!(true) ; "boolean")]
    #[test_case(json!([{ "url": URL }, { "options": { "vw": 5 } }]) ; "item without url")]
    fn test_parse_batch_rejects(value: Value) {
        assert!(parse_batch(&value).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_parse_batch_accepts_uri_alias() {
        let batch = parse_batch(&json!([
            { "url": URL },
            { "uri": URL, "options": { "vw": 500 } }
        ]))
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].url, json!(URL));
        assert_eq!(batch[1].options.vw, json!(500));
    }
}
