//! Tag-delimited markup decoding.
//!
//! Target types derive `serde::Deserialize`; element names map to fields
//! (use `#[serde(rename = "...")]` for hyphenated or repeated elements).
//! Malformed markup (unclosed or mismatched tags, truncated documents)
//! surfaces as [`DecodeError::Markup`] with quick-xml's message.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::de::DeserializeOwned;

use super::{preprocess, DecodeError};

/// Decode markup into `T`, ignoring the root element's name.
///
/// # Examples
///
/// ```
/// use llm_harness::decode::xml::from_markup;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Item {
///     name: String,
///     quantity: String,
/// }
///
/// #[derive(Deserialize)]
/// struct ShoppingList {
///     #[serde(rename = "item", default)]
///     items: Vec<Item>,
/// }
///
/// let list: ShoppingList = from_markup(
///     "<shopping-list><item><name>salt</name><quantity>to taste</quantity></item></shopping-list>",
/// )
/// .unwrap();
/// assert_eq!(list.items[0].quantity, "to taste");
/// ```
pub fn from_markup<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let cleaned = preprocess(text);
    if cleaned.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }
    let document = match root_element(&cleaned) {
        Ok(Some((_, start))) => &cleaned[start..],
        _ => cleaned.as_str(),
    };
    quick_xml::de::from_str(document).map_err(|e| DecodeError::Markup(e.to_string()))
}

/// Decode markup into `T`, requiring the document element to be `<root>`.
pub fn from_markup_rooted<T: DeserializeOwned>(text: &str, root: &str) -> Result<T, DecodeError> {
    let cleaned = preprocess(text);
    if cleaned.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }
    let start = match root_element(&cleaned)? {
        Some((found, start)) if found == root => start,
        Some((found, _)) => {
            return Err(DecodeError::UnexpectedRoot {
                expected: root.to_string(),
                found,
            })
        }
        None => {
            return Err(DecodeError::Markup(format!(
                "no <{}> element found in response",
                root
            )))
        }
    };
    quick_xml::de::from_str(&cleaned[start..]).map_err(|e| DecodeError::Markup(e.to_string()))
}

/// Name and byte offset of the first element in `text`, skipping leading
/// prose, declarations and comments.
fn root_element(text: &str) -> Result<Option<(String, usize)>, DecodeError> {
    let mut reader = Reader::from_str(text);
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let start = text[before..].find('<').map_or(before, |i| before + i);
                return Ok(Some((name, start)));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => continue,
            Err(e) => return Err(DecodeError::Markup(e.to_string())),
        }
    }
}
