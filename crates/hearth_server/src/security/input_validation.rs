//! Generic JSON payload validation, independent of any game's content.
//! Grounded on `game_server/src/security/input_validation.rs`; trimmed of
//! its ReDoS-pattern heuristic, which guarded a use case (embedding
//! user-supplied regexes) this spec never has.

use serde_json::Value;

use super::SecurityError;
use crate::config::SecurityConfig;

pub fn validate_json_message(message: &[u8], config: &SecurityConfig) -> Result<Value, SecurityError> {
    if message.len() > config.max_message_size {
        return Err(SecurityError::MessageTooLarge(message.len()));
    }

    let json: Value =
        serde_json::from_slice(message).map_err(|e| SecurityError::InvalidMessageFormat(e.to_string()))?;

    validate_json_value(&json, 0, config)?;
    Ok(json)
}

fn validate_json_value(value: &Value, depth: usize, config: &SecurityConfig) -> Result<(), SecurityError> {
    if depth > config.max_json_depth {
        return Err(SecurityError::InvalidMessageFormat("JSON nesting too deep".into()));
    }

    match value {
        Value::String(s) => {
            if s.chars().count() > config.max_string_length {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "string too long: {} characters",
                    s.chars().count()
                )));
            }
            validate_string_content(s)?;
        }
        Value::Array(arr) => {
            if arr.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "array too large: {} elements",
                    arr.len()
                )));
            }
            for item in arr {
                validate_json_value(item, depth + 1, config)?;
            }
        }
        Value::Object(obj) => {
            if obj.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "object too large: {} keys",
                    obj.len()
                )));
            }
            for (key, val) in obj {
                if key.chars().count() > config.max_string_length {
                    return Err(SecurityError::InvalidMessageFormat("object key too long".into()));
                }
                validate_string_content(key)?;
                validate_json_value(val, depth + 1, config)?;
            }
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(SecurityError::InvalidMessageFormat("number not finite".into()));
                }
            }
        }
        Value::Bool(_) | Value::Null => {}
    }

    Ok(())
}

fn validate_string_content(s: &str) -> Result<(), SecurityError> {
    if s.contains('\0') {
        return Err(SecurityError::MaliciousContent);
    }

    let control_char_count = s
        .chars()
        .filter(|c| c.is_control() && *c != '\n' && *c != '\r' && *c != '\t')
        .count();
    if control_char_count > 5 {
        return Err(SecurityError::MaliciousContent);
    }

    let lower = s.to_lowercase();
    let dangerous_patterns = [
        "<script",
        "javascript:",
        "data:text/html",
        "vbscript:",
        "onload=",
        "onerror=",
        "onclick=",
        "eval(",
    ];
    if dangerous_patterns.iter().any(|pattern| lower.contains(pattern)) {
        return Err(SecurityError::MaliciousContent);
    }

    Ok(())
}

/// Namespace strings route a connection's frames to a plugin (spec §4.E);
/// event names key its dispatch table. Both are attacker-controlled input
/// arriving over the wire, so both get the same hygiene check as any other
/// field.
pub fn validate_namespace(namespace: &str) -> Result<(), SecurityError> {
    if namespace.is_empty() || namespace.len() > 64 {
        return Err(SecurityError::InvalidMessageFormat("invalid namespace length".into()));
    }
    if !namespace.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SecurityError::InvalidMessageFormat("invalid namespace characters".into()));
    }
    Ok(())
}

pub fn validate_event_name(event_name: &str) -> Result<(), SecurityError> {
    if event_name.is_empty() || event_name.len() > 64 {
        return Err(SecurityError::InvalidMessageFormat("invalid event name length".into()));
    }
    if !event_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ':')
    {
        return Err(SecurityError::InvalidMessageFormat("invalid event name characters".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SecurityConfig {
        SecurityConfig::default()
    }

    #[test]
    fn accepts_simple_json() {
        let json = br#"{"roomCode": "ABCDEF", "playerName": "Ada"}"#;
        assert!(validate_json_message(json, &config()).is_ok());
    }

    #[test]
    fn rejects_oversized_string() {
        let cfg = SecurityConfig { max_string_length: 5, ..config() };
        let json = br#"{"message": "toolong"}"#;
        assert!(validate_json_message(json, &cfg).is_err());
    }

    #[test]
    fn rejects_deep_nesting() {
        let mut json = String::from("{");
        for _ in 0..15 {
            json.push_str(r#""nested": {"#);
        }
        json.push_str(r#""value": true"#);
        for _ in 0..15 {
            json.push('}');
        }
        json.push('}');
        assert!(validate_json_message(json.as_bytes(), &config()).is_err());
    }

    #[test]
    fn rejects_script_injection() {
        let json = br#"{"message": "<script>alert(1)</script>"}"#;
        assert!(validate_json_message(json, &config()).is_err());
    }

    #[test]
    fn validates_namespace_and_event_name() {
        assert!(validate_namespace("lightcycles").is_ok());
        assert!(validate_namespace("").is_err());
        assert!(validate_event_name("room:create").is_ok());
        assert!(validate_event_name("bad!name").is_err());
    }
}
