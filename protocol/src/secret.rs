//! Obfuscates `client_token` before a header gets logged, per the secrets
//! handling rule: values become `<first 2>...<last 2>`.

use serde_json::Value;

const TOKEN_FIELD: &str = "client_token";

pub fn obfuscate_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "...".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}...{tail}")
}

fn obfuscate_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == TOKEN_FIELD {
                    if let Value::String(s) = v {
                        *s = obfuscate_token(s);
                    }
                } else {
                    obfuscate_value(v);
                }
            }
        }
        Value::Array(items) => {
            for v in items {
                obfuscate_value(v);
            }
        }
        _ => {}
    }
}

/// Parses `json`, obfuscates any `client_token` field found at any depth,
/// and re-serializes. Returns the input unchanged if it isn't valid JSON.
pub fn obfuscate_json(json: &str) -> String {
    match serde_json::from_str::<Value>(json) {
        Ok(mut value) => {
            obfuscate_value(&mut value);
            serde_json::to_string(&value).unwrap_or_else(|_| json.to_string())
        }
        Err(_) => json.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obfuscates_nested_token() {
        let input = r#"{"auth":{"client_token":"topsecret"}}"#;
        assert_eq!(obfuscate_json(input), r#"{"auth":{"client_token":"to...et"}}"#);
    }

    #[test]
    fn short_tokens_are_fully_masked() {
        assert_eq!(obfuscate_token("ab"), "...");
    }

    #[test]
    fn non_json_input_passes_through() {
        assert_eq!(obfuscate_json("not json"), "not json");
    }
}
