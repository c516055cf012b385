//! YAML decoding (feature-gated behind `yaml`).

use serde::de::DeserializeOwned;

use super::extract::extract_code_block;
use super::{preprocess, DecodeError};

/// Decode YAML into `T`, falling back to the first fenced code block.
pub fn from_yaml<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let cleaned = preprocess(text);
    if cleaned.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }

    let first_err = match serde_yaml::from_str::<T>(&cleaned) {
        Ok(val) => return Ok(val),
        Err(e) => e.to_string(),
    };

    if let Some((_, body)) = extract_code_block(&cleaned) {
        if let Ok(val) = serde_yaml::from_str::<T>(body) {
            return Ok(val);
        }
    }

    Err(DecodeError::Yaml(first_err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Person {
        name: String,
        age: u32,
    }

    #[test]
    fn direct_yaml() {
        let p: Person = from_yaml("name: Josh\nage: 30").unwrap();
        assert_eq!(p.name, "Josh");
        assert_eq!(p.age, 30);
    }

    #[test]
    fn fenced_yaml_after_prose() {
        let p: Person = from_yaml("Sure:\n```yaml\nname: Ann\nage: 41\n```").unwrap();
        assert_eq!(p.age, 41);
    }

    #[test]
    fn wrong_shape_is_yaml_error() {
        assert!(matches!(
            from_yaml::<Person>("name: Josh\nage: thirty"),
            Err(DecodeError::Yaml(_))
        ));
    }
}
