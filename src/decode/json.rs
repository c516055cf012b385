//! JSON decoding with extraction from surrounding prose.

use serde::de::DeserializeOwned;

use super::extract::{extract_code_block, find_bracketed};
use super::{preprocess, DecodeError};

/// Decode JSON into `T`.
///
/// Candidates, in order: the whole cleaned text, the first fenced code block,
/// the last `{…}` object, the last `[…]` array. The error reports why the
/// first candidate failed.
///
/// # Examples
///
/// ```
/// use llm_harness::decode::json::from_json;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Capital {
///     state: String,
///     city: String,
/// }
///
/// let c: Capital = from_json(r#"Sure: {"state": "California", "city": "Sacramento"}"#).unwrap();
/// assert_eq!(c.city, "Sacramento");
/// ```
pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let cleaned = preprocess(text);
    if cleaned.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }

    let first_err = match serde_json::from_str::<T>(&cleaned) {
        Ok(val) => return Ok(val),
        Err(e) => e.to_string(),
    };

    let candidates = [
        extract_code_block(&cleaned).map(|(_, body)| body),
        find_bracketed(&cleaned, '{', '}'),
        find_bracketed(&cleaned, '[', ']'),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(val) = serde_json::from_str::<T>(candidate) {
            return Ok(val);
        }
    }

    Err(DecodeError::Json(first_err))
}
