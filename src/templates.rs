//! Starter content written by `init` and `add`
//!
//! Templates use `{{var}}` placeholders; unknown placeholders are left as-is.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());

/// Shared instructions file created by `init`
pub const STARTER_AGENTS_MD: &str = r#"# Agent Instructions

This file contains shared instructions for all your AI coding agents.
Add your coding preferences, conventions, and project context here.

## Coding Style

- ...

## Project Context

- ...
"#;

/// Ignore rules for the store repository
pub const STORE_GITIGNORE: &str = ".lock\n.tmp*\n";

pub const SKILL_MD: &str = r#"---
name: {{name}}
description: >
  Describe what this skill does and when to use it.
---

## Instructions

Add step-by-step instructions for the agent.
"#;

pub const COMMAND_MD: &str = r#"# {{name}}

Describe what this command does and when to use it.

## Steps

1. ...
2. ...
"#;

pub const AGENT_MD: &str = r#"# {{name}}

Describe this custom agent: its role, expertise, and when to invoke it.

## Instructions

Add detailed instructions for the agent.
"#;

pub const RULE_MD: &str = r#"# {{name}}

Describe this rule and when it applies.

## Rule

Add the rule content here.
"#;

/// Substitutes placeholders in the content with variable values
pub fn substitute(content: &str, vars: &HashMap<String, String>) -> String {
    TEMPLATE_RE
        .replace_all(content, |caps: &regex::Captures| {
            let key = caps[1].trim();
            vars.get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Render `template` for an item called `name`.
pub fn render_named(template: &str, name: &str) -> String {
    let vars = HashMap::from([("name".to_string(), name.to_string())]);
    substitute(template, &vars)
}
