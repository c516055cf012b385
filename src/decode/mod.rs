//! Decoding model output into typed values.
//!
//! The retry parser is format-agnostic: all it needs from a target type is
//! the [`Decode`] contract. Helpers for the common formats live in the
//! submodules:
//!
//! | Helper | Format |
//! |--------|--------|
//! | [`xml::from_markup`] | tag-delimited markup, via serde |
//! | [`xml::from_markup_rooted`] | markup with a required root element |
//! | [`json::from_json`] | JSON, with fence and brace extraction |
//! | `yaml::from_yaml` | YAML (feature: `yaml`) |
//!
//! Every helper runs [`preprocess`] first.

pub mod extract;
pub mod json;
pub mod xml;
#[cfg(feature = "yaml")]
pub mod yaml;

pub use extract::{preprocess, strip_think_tags};

/// A type that can be decoded from model output.
///
/// Each call builds a fresh value, so a failed attempt can never leave
/// partially decoded fields behind for the next one.
///
/// # Example
///
/// ```
/// use llm_harness::decode::{xml, Decode, DecodeError};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Answer {
///     city: String,
/// }
///
/// impl Decode for Answer {
///     fn decode(text: &str) -> Result<Self, DecodeError> {
///         xml::from_markup_rooted(text, "answer")
///     }
/// }
///
/// let answer = Answer::decode("<answer><city>Sacramento</city></answer>").unwrap();
/// assert_eq!(answer.city, "Sacramento");
/// ```
pub trait Decode: Sized {
    /// Decode `text` into a value, or explain why it could not be.
    fn decode(text: &str) -> Result<Self, DecodeError>;
}

/// Why a piece of model output could not be decoded.
///
/// The `Display` text is what gets shown back to the model in a corrective
/// turn, so variants carry the underlying parser's message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The response was empty or whitespace-only.
    #[error("empty response")]
    EmptyResponse,

    /// The markup was malformed or did not match the target type.
    #[error("{0}")]
    Markup(String),

    /// The markup was well-formed but the document element had the wrong name.
    #[error("expected root element <{expected}> but found <{found}>")]
    UnexpectedRoot {
        /// The required root element name.
        expected: String,
        /// The root element actually present.
        found: String,
    },

    /// JSON could not be found or did not match the target type.
    #[error("{0}")]
    Json(String),

    /// YAML could not be parsed or did not match the target type.
    #[error("{0}")]
    Yaml(String),

    /// A hand-written decoder rejected the text.
    #[error("{0}")]
    Invalid(String),
}

impl Decode for String {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        let cleaned = preprocess(text);
        if cleaned.is_empty() {
            return Err(DecodeError::EmptyResponse);
        }
        Ok(cleaned)
    }
}

impl Decode for serde_json::Value {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        json::from_json(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_decode_trims_and_rejects_empty() {
        assert_eq!(String::decode("  hello \n").unwrap(), "hello");
        assert_eq!(String::decode("   "), Err(DecodeError::EmptyResponse));
    }

    #[test]
    fn test_value_decode_uses_json() {
        let value = serde_json::Value::decode(r#"Here: {"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_display_is_verbatim_message() {
        let err = DecodeError::Markup("ill-formed document: expected `</item>`".into());
        assert_eq!(err.to_string(), "ill-formed document: expected `</item>`");
        let err = DecodeError::UnexpectedRoot {
            expected: "shopping-list".into(),
            found: "recipe".into(),
        };
        assert_eq!(
            err.to_string(),
            "expected root element <shopping-list> but found <recipe>"
        );
    }
}
