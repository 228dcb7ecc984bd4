//! WebAssembly module for the rental inventory platform
//!
//! Lets the admin screens show sequence details without a server round trip:
//! - Next-ID preview for a stored value, resets included
//! - Letter-run increment
//! - Format validation

use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::sequence::*;

/// Identifier the next allocation will return for `latest_id`
#[wasm_bindgen]
pub fn preview_next_id(latest_id: &str, prefix: &str) -> String {
    preview_next(latest_id, prefix).next_id
}

/// Preview as JSON: `{"next_id": "...", "reset": false}`
#[wasm_bindgen]
pub fn preview_next_json(latest_id: &str, prefix: &str) -> Result<String, JsValue> {
    serde_json::to_string(&preview_next(latest_id, prefix))
        .map_err(|e| JsValue::from_str(&format!("Failed to encode preview: {}", e)))
}

/// Advance a letter run, e.g. `AZ` -> `BA`; `undefined` unless the input
/// is ASCII letters only
#[wasm_bindgen]
pub fn next_letters(letters: &str) -> Option<String> {
    increment_letters(letters).ok()
}

/// Whether `id` is a well-formed identifier of `prefix`'s sequence
#[wasm_bindgen]
pub fn is_valid_identifier(id: &str, prefix: &str) -> bool {
    SequenceParts::parse(id, prefix).is_ok()
}

/// First identifier of a new sequence
#[wasm_bindgen]
pub fn first_identifier(prefix: &str) -> String {
    initial_identifier(prefix)
}
