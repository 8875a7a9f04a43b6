//! Defensive parsing of vision-model output.
//!
//! The service boundary returns loosely-structured text: sometimes clean
//! JSON, sometimes markdown-fenced, sometimes prose around a category name.
//! Everything here is total — parse failures resolve to default-filled
//! values, never errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of defect categories.
pub const DEFECT_CATEGORIES: [&str; 8] = [
    "Vertical Line",
    "Horizontal Line",
    "Vertical Bar",
    "Horizontal Bar",
    "Black Dot",
    "Bright Dot",
    "No Display",
    "Abnormal Display",
];

/// Fallback for unrecognized or degraded classification results.
pub const DEFAULT_DEFECT_CATEGORY: &str = "Abnormal Display";

/// Fields extracted from an OC serial label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcDetails {
    pub oc_serial_number: String,
    /// Week/Cycle code.
    pub wc: String,
    pub model_pn: String,
    pub ver: String,
}

/// Fields extracted from a factory batch label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryDetails {
    pub odf: String,
    pub size: String,
    pub bom: String,
}

/// Strip a markdown code fence (```json ... ```) wrapping, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Resolve a model response to a member of the fixed category set.
///
/// Case-insensitive substring containment, not exact match: a response like
/// "This looks like a Vertical Line defect." resolves to "Vertical Line".
/// Anything unrecognized resolves to [`DEFAULT_DEFECT_CATEGORY`].
pub fn match_defect_category(response: &str) -> &'static str {
    let lowered = response.to_lowercase();
    DEFECT_CATEGORIES
        .iter()
        .find(|category| lowered.contains(&category.to_lowercase()))
        .copied()
        .unwrap_or(DEFAULT_DEFECT_CATEGORY)
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Parse OC label fields from a (possibly fenced) JSON response.
///
/// Missing keys default to empty strings; malformed JSON yields an all-empty
/// struct rather than an error.
pub fn parse_oc_details(text: &str) -> OcDetails {
    let Ok(value) = serde_json::from_str::<Value>(strip_code_fence(text)) else {
        return OcDetails::default();
    };
    OcDetails {
        oc_serial_number: string_field(&value, "ocSerialNumber"),
        wc: string_field(&value, "wc"),
        model_pn: string_field(&value, "modelPN"),
        ver: string_field(&value, "ver"),
    }
}

/// Parse factory label fields from a (possibly fenced) JSON response.
pub fn parse_factory_details(text: &str) -> FactoryDetails {
    let Ok(value) = serde_json::from_str::<Value>(strip_code_fence(text)) else {
        return FactoryDetails::default();
    };
    FactoryDetails {
        odf: string_field(&value, "odf"),
        size: string_field(&value, "size"),
        bom: string_field(&value, "bom"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence_plain() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fence_json_tag() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_match_category_exact_and_contained() {
        assert_eq!(match_defect_category("Vertical Line"), "Vertical Line");
        assert_eq!(
            match_defect_category("The panel shows a bright dot near the corner."),
            "Bright Dot"
        );
        assert_eq!(match_defect_category("HORIZONTAL BAR"), "Horizontal Bar");
    }

    #[test]
    fn test_match_category_fallback() {
        assert_eq!(match_defect_category("shattered glass"), "Abnormal Display");
        assert_eq!(match_defect_category(""), "Abnormal Display");
    }

    #[test]
    fn test_match_category_always_in_set() {
        for input in ["vertical line defect", "nonsense", "no display at all"] {
            assert!(DEFECT_CATEGORIES.contains(&match_defect_category(input)));
        }
    }

    #[test]
    fn test_parse_oc_details_full() {
        let text = r#"```json
        {"ocSerialNumber": "TA5144000123", "wc": "2505", "modelPN": "ST3151A07-2", "ver": "Ver.2.9"}
        ```"#;
        let details = parse_oc_details(text);
        assert_eq!(details.oc_serial_number, "TA5144000123");
        assert_eq!(details.wc, "2505");
        assert_eq!(details.model_pn, "ST3151A07-2");
        assert_eq!(details.ver, "Ver.2.9");
    }

    #[test]
    fn test_parse_oc_details_missing_keys_default_empty() {
        let details = parse_oc_details(r#"{"ocSerialNumber": "X1"}"#);
        assert_eq!(details.oc_serial_number, "X1");
        assert_eq!(details.wc, "");
        assert_eq!(details.model_pn, "");
        assert_eq!(details.ver, "");
    }

    #[test]
    fn test_parse_oc_details_malformed_never_panics() {
        assert_eq!(parse_oc_details("not json at all"), OcDetails::default());
        assert_eq!(parse_oc_details("```json\n{broken\n```"), OcDetails::default());
        assert_eq!(parse_oc_details(""), OcDetails::default());
    }

    #[test]
    fn test_parse_factory_details() {
        let details =
            parse_factory_details(r#"{"odf": "IDL2507002", "size": "32\"", "bom": "2300132VA1Z01510"}"#);
        assert_eq!(details.odf, "IDL2507002");
        assert_eq!(details.size, "32\"");
        assert_eq!(details.bom, "2300132VA1Z01510");

        assert_eq!(parse_factory_details("[1, 2, 3]"), FactoryDetails::default());
    }
}
