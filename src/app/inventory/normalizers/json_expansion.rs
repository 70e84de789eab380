//! Policy document decoding
//!
//! IAM returns policy documents (`GetPolicyVersion`, `GetRole`'s trust policy)
//! as URL-encoded JSON, while Lambda's `GetPolicy` returns plain stringified
//! JSON. Both are turned into JSON values here so that statements can be
//! flattened and compared structurally.
//!
//! Input:
//! ```json
//! "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%5D%7D"
//! ```
//!
//! Output:
//! ```json
//! { "Version": "2012-10-17", "Statement": [] }
//! ```

use percent_encoding::percent_decode;
use serde_json::Value;

/// Decode a policy document string into a JSON object
///
/// Returns `None` when the string is neither JSON nor URL-encoded JSON, or
/// decodes to something other than an object.
pub fn decode_policy_document(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let decoded = if looks_url_encoded(trimmed) {
        percent_decode(trimmed.as_bytes())
            .decode_utf8()
            .ok()
            .map(|cow| cow.into_owned())
    } else {
        None
    };
    let to_parse = decoded.as_deref().unwrap_or(trimmed);

    if !looks_like_json_object(to_parse) {
        return None;
    }

    match serde_json::from_str::<Value>(to_parse) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// URL-encoded documents carry `%XX` escapes for `{`, `"`, `:` or `,`
fn looks_url_encoded(s: &str) -> bool {
    ["%7B", "%22", "%3A", "%2C"]
        .iter()
        .any(|escape| s.contains(escape))
}

fn looks_like_json_object(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}
