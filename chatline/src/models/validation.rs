//! Normalization rules shared by the input DTOs.
//!
//! Length limits are enforced by garde in models/input.rs; the rules here
//! cover what garde cannot express (trimming, self checks, member lists).

use crate::error::ValidationError;

/// Maximum lengths accepted by the backend
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_NICKNAME_LENGTH: usize = 150;
pub const MAX_STATUS_LENGTH: usize = 255;
pub const MAX_GROUP_NAME_LENGTH: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 10000;
pub const MAX_SEARCH_QUERY_LENGTH: usize = 200;

/// Trim a chat target and reject blanks and the current user.
pub fn normalize_target(raw: &str, current_username: &str) -> Result<String, ValidationError> {
    let target = raw.trim();
    if target.is_empty() {
        return Err(ValidationError::EmptyTarget);
    }
    if target.to_lowercase() == current_username.trim().to_lowercase() {
        return Err(ValidationError::SelfChat);
    }
    if target.chars().any(char::is_control) {
        return Err(ValidationError::Field(
            "Username contains invalid characters".to_string(),
        ));
    }
    Ok(target.to_string())
}

/// Trim members, drop blanks and duplicates (case-insensitive, first spelling wins).
pub fn normalize_members<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>, ValidationError> {
    let mut members: Vec<String> = Vec::with_capacity(raw.len());
    for member in raw {
        let member = member.as_ref().trim();
        if member.is_empty() {
            continue;
        }
        if members.iter().any(|m| m.eq_ignore_ascii_case(member)) {
            continue;
        }
        members.push(member.to_string());
    }
    if members.is_empty() {
        return Err(ValidationError::NoMembers);
    }
    Ok(members)
}

/// Trim outgoing message text; blank messages are never sent.
pub fn normalize_message(raw: &str) -> Result<String, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== normalize_target tests ====================

    #[test]
    fn test_target_is_trimmed() {
        assert_eq!(normalize_target("  bob ", "alice").unwrap(), "bob");
    }

    #[test]
    fn test_target_empty() {
        assert_eq!(normalize_target("", "alice"), Err(ValidationError::EmptyTarget));
        assert_eq!(normalize_target("   ", "alice"), Err(ValidationError::EmptyTarget));
    }

    #[test]
    fn test_target_self_is_case_insensitive() {
        assert_eq!(normalize_target("alice", "alice"), Err(ValidationError::SelfChat));
        assert_eq!(normalize_target(" ALICE ", "Alice"), Err(ValidationError::SelfChat));
    }

    #[test]
    fn test_target_control_characters() {
        assert!(matches!(
            normalize_target("bo\u{0}b", "alice"),
            Err(ValidationError::Field(_))
        ));
    }

    // ==================== normalize_members tests ====================

    #[test]
    fn test_members_dedup_and_blanks() {
        let members = normalize_members(&["alice", " bob", "", "Alice", "bob "]).unwrap();
        assert_eq!(members, vec!["alice", "bob"]);
    }

    #[test]
    fn test_members_required() {
        assert_eq!(normalize_members::<&str>(&[]), Err(ValidationError::NoMembers));
        assert_eq!(normalize_members(&["  ", ""]), Err(ValidationError::NoMembers));
    }

    // ==================== normalize_message tests ====================

    #[test]
    fn test_message_trimmed() {
        assert_eq!(normalize_message("  hi there \n").unwrap(), "hi there");
        assert_eq!(normalize_message(" \n\t"), Err(ValidationError::EmptyMessage));
    }
}
