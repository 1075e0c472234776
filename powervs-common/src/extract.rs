//! Ordered JSON-pointer lookups for APIs whose response shape varies.
//!
//! Each strategy is a JSON pointer (RFC 6901). Strategies are tried in order
//! and the first one that resolves to a non-empty string wins. `null`,
//! missing keys, empty strings and non-string values are all treated as
//! "not found" so the next strategy gets a chance.
use serde_json::Value;

/// `{"pvmInstanceID": ..}`, `[{"pvmInstanceID": ..}]`, `{"pvmInstance": {"pvmInstanceID": ..}}`
pub const INSTANCE_ID_STRATEGIES: &[&str] = &[
    "/pvmInstanceID",
    "/0/pvmInstanceID",
    "/pvmInstance/pvmInstanceID",
];

pub const NETWORK_ID_STRATEGIES: &[&str] = &["/networkID", "/id"];

pub const JOB_RUN_ID_STRATEGIES: &[&str] = &["/metadata/name", "/name"];

pub fn first_string(doc: &Value, strategies: &[&str]) -> Option<String> {
    strategies.iter().find_map(|ptr| {
        doc.pointer(ptr)
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    })
}

/// Same as [`first_string`] but starting from raw text. Text that is not
/// JSON yields `None`.
pub fn first_string_in_body(body: &str, strategies: &[&str]) -> Option<String> {
    let doc: Value = serde_json::from_str(body.trim()).ok()?;
    first_string(&doc, strategies)
}

/// Instance identifier from a compute API create response.
pub fn instance_id(body: &str) -> Option<String> {
    first_string_in_body(body, INSTANCE_ID_STRATEGIES)
}
