//! Agent identifier normalization.
//!
//! User input goes through here before it is matched against configured
//! agents, so `claude-code` and `claude` address the same registry entry.

/// Normalize a user-provided agent identifier to a built-in agent ID.
pub fn canonical_agent_id(id: &str) -> Option<&'static str> {
    let id = id.trim();
    if id.eq_ignore_ascii_case("claude")
        || id.eq_ignore_ascii_case("claude-code")
        || id.eq_ignore_ascii_case("claude_code")
    {
        Some("claude")
    } else if id.eq_ignore_ascii_case("codex")
        || id.eq_ignore_ascii_case("codex-cli")
        || id.eq_ignore_ascii_case("codex_cli")
    {
        Some("codex")
    } else if id.eq_ignore_ascii_case("gemini")
        || id.eq_ignore_ascii_case("gemini-cli")
        || id.eq_ignore_ascii_case("gemini_cli")
    {
        Some("gemini")
    } else if id.eq_ignore_ascii_case("opencode")
        || id.eq_ignore_ascii_case("open-code")
        || id.eq_ignore_ascii_case("open_code")
    {
        Some("opencode")
    } else {
        None
    }
}

/// Resolve `input` against the configured agent names.
///
/// Known aliases map to their built-in ID first; anything else must match a
/// configured name case-insensitively. No substring matching: an agent
/// filter that names nothing is an input error.
pub fn resolve_agent_name<'a, I>(input: &str, configured: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = canonical_agent_id(input).unwrap_or(input.trim());
    configured
        .into_iter()
        .find(|name| name.eq_ignore_ascii_case(wanted))
        .map(str::to_string)
}
