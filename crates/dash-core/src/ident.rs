//! Identifier rules for agents and log queries.
//!
//! These are pure functions: the HTTP layer applies them before any
//! supervisor lock is taken.

/// The fixed set of resource names an agent id may be scoped under.
pub const RESOURCE_NAMES: &[&str] = &["claude-code", "ollama", "codex"];

/// Maximum length of the local part of an agent id.
pub const MAX_LOCAL_LEN: usize = 100;

pub const MIN_LINE_COUNT: usize = 1;
pub const MAX_LINE_COUNT: usize = 10_000;

pub fn is_valid_resource_name(name: &str) -> bool {
    RESOURCE_NAMES.contains(&name)
}

/// Local names match `[A-Za-z0-9._-]{1,100}`.
pub fn is_valid_local_name(local: &str) -> bool {
    !local.is_empty()
        && local.len() <= MAX_LOCAL_LEN
        && local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

/// Agent ids are `<resource>:<local>`.
pub fn is_valid_agent_id(id: &str) -> bool {
    match id.split_once(':') {
        Some((resource, local)) => is_valid_resource_name(resource) && is_valid_local_name(local),
        None => false,
    }
}

/// Parse a line count query value; valid values are integers in `[1, 10000]`.
pub fn parse_line_count(raw: &str) -> Option<usize> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|n| (MIN_LINE_COUNT as i64..=MAX_LINE_COUNT as i64).contains(n))
        .map(|n| n as usize)
}

/// Resolve a client-supplied identifier against the known agent ids.
///
/// A full id that matches the grammar and exists is returned verbatim.
/// Otherwise the input is treated as a short local name and matched against
/// the local part of each known id; the first insertion wins. Empty input
/// and failed lookups resolve to the empty string.
pub fn resolve_agent_identifier(input: &str, known_ids: &[String]) -> String {
    if input.is_empty() {
        return String::new();
    }

    if is_valid_agent_id(input) && known_ids.iter().any(|id| id == input) {
        return input.to_string();
    }

    for id in known_ids {
        if let Some((_, local)) = id.split_once(':') {
            if local == input {
                return id.clone();
            }
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_match_the_fixed_set() {
        assert!(is_valid_resource_name("codex"));
        assert!(is_valid_resource_name("claude-code"));
        assert!(is_valid_resource_name("ollama"));
        assert!(!is_valid_resource_name("gemini"));
        assert!(!is_valid_resource_name("Codex"));
        assert!(!is_valid_resource_name(""));
    }

    #[test]
    fn local_names_accept_the_allowed_character_class() {
        assert!(is_valid_local_name("abc"));
        assert!(is_valid_local_name("a.b_c-d9"));
        assert!(is_valid_local_name(&"x".repeat(100)));

        assert!(!is_valid_local_name(""));
        assert!(!is_valid_local_name(&"x".repeat(101)));
        assert!(!is_valid_local_name("has space"));
        assert!(!is_valid_local_name("bad@char"));
        assert!(!is_valid_local_name("no/slash"));
    }

    #[test]
    fn agent_ids_require_resource_and_local_parts() {
        assert!(is_valid_agent_id("codex:abc"));
        assert!(is_valid_agent_id("claude-code:x.y-z_9"));
        assert!(is_valid_agent_id("ollama:1"));

        assert!(!is_valid_agent_id("codex"));
        assert!(!is_valid_agent_id("codex:"));
        assert!(!is_valid_agent_id(":abc"));
        assert!(!is_valid_agent_id("gemini:abc"));
        assert!(!is_valid_agent_id("invalid@agent#123"));
        assert!(!is_valid_agent_id(&format!("codex:{}", "x".repeat(101))));
    }

    #[test]
    fn line_counts_must_be_in_range() {
        assert_eq!(parse_line_count("1"), Some(1));
        assert_eq!(parse_line_count("100"), Some(100));
        assert_eq!(parse_line_count("10000"), Some(10_000));
        assert_eq!(parse_line_count(" 50 "), Some(50));

        assert_eq!(parse_line_count("0"), None);
        assert_eq!(parse_line_count("-5"), None);
        assert_eq!(parse_line_count("99999"), None);
        assert_eq!(parse_line_count("ten"), None);
        assert_eq!(parse_line_count(""), None);
    }

    #[test]
    fn resolution_returns_existing_full_ids_verbatim() {
        let known = vec!["codex:abc".to_string(), "codex:def".to_string()];
        assert_eq!(resolve_agent_identifier("codex:abc", &known), "codex:abc");
    }

    #[test]
    fn resolution_falls_back_to_local_name_lookup() {
        let known = vec!["codex:abc".to_string(), "claude-code:web".to_string()];
        assert_eq!(resolve_agent_identifier("web", &known), "claude-code:web");
        assert_eq!(resolve_agent_identifier("codex:missing", &known), "");
        assert_eq!(resolve_agent_identifier("missing", &known), "");
    }

    #[test]
    fn resolution_first_insertion_wins_on_duplicate_locals() {
        let known = vec!["codex:dup".to_string(), "ollama:dup".to_string()];
        assert_eq!(resolve_agent_identifier("dup", &known), "codex:dup");
    }

    #[test]
    fn resolution_of_empty_input_is_empty() {
        assert_eq!(resolve_agent_identifier("", &["codex:a".to_string()]), "");
    }
}
