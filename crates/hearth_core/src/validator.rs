//! Sanitizes player names, room codes, and chat text, and generates fresh
//! room codes. See spec §4.A.
//!
//! Every function here is pure and total: it never panics and never talks
//! to shared state, so it can be unit tested in isolation and reused from
//! both the lifecycle coordinator and the room registry's code generator.

use rand::Rng;
use thiserror::Error;

/// Alphabet for generated room codes: uppercase letters and digits minus
/// the characters that are easy to misread on a screen or misdial on a
/// keyboard (`0`, `O`, `1`, `I`).
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LEN: usize = 6;
const MAX_PLAYER_NAME_CODEPOINTS: usize = 32;
const MAX_CHAT_CODEPOINTS: usize = 500;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name is too long (max {MAX_PLAYER_NAME_CODEPOINTS} characters)")]
    NameTooLong,
    #[error("name contains control characters")]
    NameHasControlChars,
    #[error("room code must be {ROOM_CODE_LEN} characters")]
    BadRoomCodeLength,
    #[error("room code contains characters outside the unambiguous alphabet")]
    BadRoomCodeAlphabet,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("message is too long (max {MAX_CHAT_CODEPOINTS} characters)")]
    MessageTooLong,
}

/// Trims, collapses internal whitespace, strips control characters, and
/// enforces a code-point length cap on a display name.
pub fn validate_player_name(raw: &str) -> Result<String, ValidationError> {
    let collapsed = collapse_whitespace(raw.trim());
    if collapsed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if collapsed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::NameHasControlChars);
    }
    if collapsed.chars().count() > MAX_PLAYER_NAME_CODEPOINTS {
        return Err(ValidationError::NameTooLong);
    }
    Ok(collapsed)
}

/// Normalizes a client-supplied room code: uppercases it and checks length
/// and alphabet. Does not check whether the room actually exists.
pub fn validate_room_code(raw: &str) -> Result<String, ValidationError> {
    let upper = raw.trim().to_uppercase();
    if upper.chars().count() != ROOM_CODE_LEN {
        return Err(ValidationError::BadRoomCodeLength);
    }
    if !upper.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
        return Err(ValidationError::BadRoomCodeAlphabet);
    }
    Ok(upper)
}

/// Trims, strips control characters, and caps a chat message's length.
/// Rejects messages that are empty once trimmed.
pub fn validate_chat_message(raw: &str) -> Result<String, ValidationError> {
    let trimmed: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();
    let trimmed = trimmed.trim().to_string();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_CHAT_CODEPOINTS {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(trimmed)
}

/// Generates a fresh 6-character room code from the unambiguous alphabet
/// using the operating system's cryptographic RNG.
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Collapses any run of whitespace (including newlines/tabs) into a single
/// ASCII space, matching the "collapses whitespace" requirement in §4.A.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(validate_player_name("  Ada   Lovelace  ").unwrap(), "Ada Lovelace");
    }

    #[test]
    fn rejects_empty_name_after_trim() {
        assert_eq!(validate_player_name("   "), Err(ValidationError::EmptyName));
    }

    #[test]
    fn rejects_control_characters() {
        assert_eq!(
            validate_player_name("Ada\u{0007}Lovelace"),
            Err(ValidationError::NameHasControlChars)
        );
    }

    #[test]
    fn caps_name_length() {
        let long = "a".repeat(33);
        assert_eq!(validate_player_name(&long), Err(ValidationError::NameTooLong));
        let ok = "a".repeat(32);
        assert!(validate_player_name(&ok).is_ok());
    }

    #[test]
    fn validator_is_idempotent() {
        let raw = "  Weird   Name\t\n ";
        let once = validate_player_name(raw).unwrap();
        let twice = validate_player_name(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn room_code_normalizes_case() {
        assert_eq!(validate_room_code("qrxzp7").unwrap(), "QRXZP7");
    }

    #[test]
    fn room_code_rejects_ambiguous_alphabet() {
        // '0', 'O', '1', 'I' are excluded from the generator but a client
        // could still type them; the validator must reject, not silently fix.
        assert_eq!(
            validate_room_code("ABC0EF"),
            Err(ValidationError::BadRoomCodeAlphabet)
        );
    }

    #[test]
    fn room_code_rejects_wrong_length() {
        assert_eq!(validate_room_code("ABCDE"), Err(ValidationError::BadRoomCodeLength));
    }

    #[test]
    fn chat_message_rejects_empty_after_trim() {
        assert_eq!(validate_chat_message("   "), Err(ValidationError::EmptyMessage));
    }

    #[test]
    fn chat_message_caps_length() {
        let long = "x".repeat(501);
        assert_eq!(validate_chat_message(&long), Err(ValidationError::MessageTooLong));
    }

    #[test]
    fn generated_codes_use_only_unambiguous_alphabet() {
        for _ in 0..200 {
            let code = generate_room_code();
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }
}
