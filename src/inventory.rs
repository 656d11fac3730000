//! Content inventory
//!
//! Enumerates what the store holds, per category, and scaffolds new items.
//! Each category has its own scanning strategy; all of them skip hidden
//! entries and return items sorted by name.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::templates;

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)\A---[ \t]*\r?\n(?P<yaml>.*?)^---[ \t]*\r?$").unwrap());

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]([a-z0-9-]{0,62}[a-z0-9])?$").unwrap());

/// A kind of content held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Skills,
    Commands,
    Agents,
    Rules,
    Instructions,
    Settings,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Skills,
        Category::Commands,
        Category::Agents,
        Category::Rules,
        Category::Instructions,
        Category::Settings,
    ];

    /// Directory under the store root
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Skills => "skills",
            Category::Commands => "commands",
            Category::Agents => "agents",
            Category::Rules => "rules",
            Category::Instructions => "instructions",
            Category::Settings => "settings",
        }
    }

    fn scanner(self) -> &'static dyn Scanner {
        match self {
            Category::Skills => &SkillDirs,
            Category::Settings => &JsonSettings,
            Category::Commands | Category::Agents | Category::Rules | Category::Instructions => {
                &MarkdownFiles
            }
        }
    }

    /// Singular noun used in messages
    fn noun(self) -> &'static str {
        match self {
            Category::Skills => "skill",
            Category::Commands => "command",
            Category::Agents => "agent",
            Category::Rules => "rule",
            Category::Instructions => "instructions file",
            Category::Settings => "settings file",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.dir_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownCategory(s.to_string()))
    }
}

/// One item in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    pub name: String,
    /// One-line description; empty when none could be extracted
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub path: PathBuf,
}

/// Which categories to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// `None` lists every category
    pub category: Option<Category>,
}

impl ListOptions {
    /// Build options from a raw type filter; an empty filter means all.
    pub fn from_type(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            category: Some(raw.parse()?),
        })
    }

    fn includes(&self, category: Category) -> bool {
        self.category.is_none_or(|c| c == category)
    }
}

/// Inventory grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListResult {
    pub skills: Vec<ContentItem>,
    pub commands: Vec<ContentItem>,
    pub agents: Vec<ContentItem>,
    pub rules: Vec<ContentItem>,
    pub instructions: Vec<ContentItem>,
    pub settings: Vec<ContentItem>,
}

impl ListResult {
    pub fn get(&self, category: Category) -> &[ContentItem] {
        match category {
            Category::Skills => &self.skills,
            Category::Commands => &self.commands,
            Category::Agents => &self.agents,
            Category::Rules => &self.rules,
            Category::Instructions => &self.instructions,
            Category::Settings => &self.settings,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut Vec<ContentItem> {
        match category {
            Category::Skills => &mut self.skills,
            Category::Commands => &mut self.commands,
            Category::Agents => &mut self.agents,
            Category::Rules => &mut self.rules,
            Category::Instructions => &mut self.instructions,
            Category::Settings => &mut self.settings,
        }
    }

    /// Categories with their items, in display order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[ContentItem])> {
        Category::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    pub fn total(&self) -> usize {
        self.iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Result of scaffolding a new item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddResult {
    pub category: Category,
    pub name: String,
    /// The item itself (skill directory or markdown file)
    pub path: PathBuf,
    /// Every file and directory created
    pub created: Vec<PathBuf>,
}

trait Scanner: Sync {
    fn scan(&self, dir: &Path) -> Result<Vec<ContentItem>>;
}

/// `skills/<name>/SKILL.md`
struct SkillDirs;

/// `<category>/<name>.md`
struct MarkdownFiles;

/// `settings/<name>.json`
struct JsonSettings;

impl Scanner for SkillDirs {
    fn scan(&self, dir: &Path) -> Result<Vec<ContentItem>> {
        let mut items = Vec::new();
        for (path, name) in visible_entries(dir)? {
            if !path.is_dir() {
                continue;
            }
            let description = fs::read_to_string(path.join("SKILL.md"))
                .map(|content| frontmatter_description(&content))
                .unwrap_or_default();
            items.push(ContentItem {
                name,
                description,
                path,
            });
        }
        Ok(items)
    }
}

impl Scanner for MarkdownFiles {
    fn scan(&self, dir: &Path) -> Result<Vec<ContentItem>> {
        let mut items = Vec::new();
        for (path, file_name) in visible_entries(dir)? {
            let Some(name) = file_name.strip_suffix(".md") else {
                continue;
            };
            if !path.is_file() {
                continue;
            }
            let description = fs::read_to_string(&path)
                .map(|content| markdown_description(&content))
                .unwrap_or_default();
            items.push(ContentItem {
                name: name.to_string(),
                description,
                path,
            });
        }
        Ok(items)
    }
}

impl Scanner for JsonSettings {
    fn scan(&self, dir: &Path) -> Result<Vec<ContentItem>> {
        let mut items = Vec::new();
        for (path, file_name) in visible_entries(dir)? {
            let Some(name) = file_name.strip_suffix(".json") else {
                continue;
            };
            if !path.is_file() {
                continue;
            }
            items.push(ContentItem {
                name: name.to_string(),
                description: format!("{name} agent settings"),
                path,
            });
        }
        Ok(items)
    }
}

/// Non-hidden entries of `dir`; a missing directory is empty.
fn visible_entries(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!(path = %entry.path().display(), "Skipping non-UTF-8 entry");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        out.push((entry.path(), name));
    }
    Ok(out)
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    description: Option<String>,
}

fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    match FRONTMATTER_RE.captures(content) {
        Some(caps) => {
            let yaml = caps.name("yaml").map_or("", |m| m.as_str());
            let end = caps.get(0).map_or(0, |m| m.end());
            (Some(yaml), &content[end..])
        }
        None => (None, content),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The `description` field of a YAML front-matter block, on one line.
pub fn frontmatter_description(content: &str) -> String {
    let (Some(yaml), _) = split_frontmatter(content) else {
        return String::new();
    };
    match serde_yaml::from_str::<FrontMatter>(yaml) {
        Ok(fm) => fm
            .description
            .map(|d| collapse_whitespace(&d))
            .unwrap_or_default(),
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable front-matter");
            String::new()
        }
    }
}

/// Front-matter description if present, else the first line of prose.
pub fn markdown_description(content: &str) -> String {
    let from_frontmatter = frontmatter_description(content);
    if !from_frontmatter.is_empty() {
        return from_frontmatter;
    }
    let (_, body) = split_frontmatter(content);
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Check a content name: lowercase letters, digits and hyphens, 1-64 chars,
/// starting with a letter and not ending with a hyphen.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name is required"));
    }
    if name.len() > 64 {
        return Err(invalid("too long (max 64 chars)"));
    }
    if !NAME_RE.is_match(name) {
        return Err(invalid(
            "must start with a lowercase letter and contain only lowercase letters, digits, and hyphens",
        ));
    }
    Ok(())
}

impl Store {
    /// Enumerate store content. Read-only.
    pub fn list(&self, opts: &ListOptions) -> Result<ListResult> {
        self.ensure_initialized()?;

        let mut result = ListResult::default();
        for category in Category::ALL.into_iter().filter(|c| opts.includes(*c)) {
            let dir = self.dir().join(category.dir_name());
            let mut items = category.scanner().scan(&dir)?;
            items.sort_by(|a, b| a.name.cmp(&b.name));
            tracing::debug!(category = %category, count = items.len(), "Scanned");
            *result.get_mut(category) = items;
        }
        Ok(result)
    }

    /// Scaffold a new skill, command, agent or rule.
    pub fn add(&self, category: Category, name: &str) -> Result<AddResult> {
        let template = match category {
            Category::Skills => templates::SKILL_MD,
            Category::Commands => templates::COMMAND_MD,
            Category::Agents => templates::AGENT_MD,
            Category::Rules => templates::RULE_MD,
            Category::Instructions | Category::Settings => {
                return Err(Error::Unsupported(format!(
                    "cannot scaffold {category}; add supports skills, commands, agents, rules"
                )));
            }
        };
        validate_name(name)?;
        self.ensure_initialized()?;
        let _lock = self.lock()?;

        let category_dir = self.dir().join(category.dir_name());
        let item_path = match category {
            Category::Skills => category_dir.join(name),
            _ => category_dir.join(format!("{name}.md")),
        };
        if fs::symlink_metadata(&item_path).is_ok() {
            return Err(Error::AlreadyExists {
                kind: category.noun(),
                name: name.to_string(),
                path: item_path,
            });
        }

        let mut created = Vec::new();
        let content = templates::render_named(template, name);
        if category == Category::Skills {
            for sub in ["", "scripts", "references", "assets"] {
                let dir = item_path.join(sub);
                fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
                created.push(dir);
            }
            let skill_md = item_path.join("SKILL.md");
            fs::write(&skill_md, content).map_err(|e| Error::io(&skill_md, e))?;
            created.push(skill_md);
        } else {
            fs::create_dir_all(&category_dir).map_err(|e| Error::io(&category_dir, e))?;
            fs::write(&item_path, content).map_err(|e| Error::io(&item_path, e))?;
            created.push(item_path.clone());
        }

        tracing::info!(category = %category, name, "Added content");
        Ok(AddResult {
            category,
            name: name.to_string(),
            path: item_path,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    fn init_store(temp: &TempDir) -> Store {
        let store = Store::new(temp.path().join("store"), temp.path().join("home"))
            .with_search_path(OsString::new());
        store.init().unwrap();
        store
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("skills".parse::<Category>().unwrap(), Category::Skills);
        assert_eq!("RULES".parse::<Category>().unwrap(), Category::Rules);
        assert!(matches!(
            "bogus".parse::<Category>(),
            Err(Error::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_list_options_from_type() {
        assert_eq!(ListOptions::from_type("").unwrap().category, None);
        assert_eq!(
            ListOptions::from_type("settings").unwrap().category,
            Some(Category::Settings)
        );
        assert!(ListOptions::from_type("bogus").is_err());
    }

    #[test]
    fn test_frontmatter_description_folded() {
        let content = "---\nname: pdf\ndescription: >\n  multi-line folded\n  continues here\n---\n\nBody";
        assert_eq!(
            frontmatter_description(content),
            "multi-line folded continues here"
        );
    }

    #[test]
    fn test_frontmatter_description_missing_or_broken() {
        assert_eq!(frontmatter_description("# No front-matter"), "");
        assert_eq!(frontmatter_description("---\nname: [unclosed\n---\n"), "");
        assert_eq!(frontmatter_description("---\nname: x\n---\n"), "");
    }

    #[test]
    fn test_markdown_description_skips_headings() {
        let content = "# Title\n\n## Sub\nFirst real line.\nSecond.";
        assert_eq!(markdown_description(content), "First real line.");
        let with_fm = "---\ndescription: From yaml\n---\n# T\nProse";
        assert_eq!(markdown_description(with_fm), "From yaml");
        let empty_fm = "---\nname: x\n---\n# T\nProse";
        assert_eq!(markdown_description(empty_fm), "Prose");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("my-skill2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("Bad").is_err());
        assert!(validate_name("1abc").is_err());
        assert!(validate_name("trailing-").is_err());
        assert!(validate_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_list_requires_init() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path().join("store"), temp.path().join("home"));
        assert!(matches!(
            store.list(&ListOptions::default()),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn test_list_fresh_store_has_starter_instructions() {
        let temp = TempDir::new().unwrap();
        let store = init_store(&temp);

        let result = store.list(&ListOptions::default()).unwrap();
        assert_eq!(result.total(), 1);
        assert_eq!(result.instructions[0].name, "AGENTS");
        assert_eq!(
            result.instructions[0].description,
            "This file contains shared instructions for all your AI coding agents."
        );
    }

    #[test]
    fn test_list_each_category() {
        let temp = TempDir::new().unwrap();
        let store = init_store(&temp);
        let root = store.dir();

        fs::create_dir_all(root.join("skills/pdf")).unwrap();
        fs::write(
            root.join("skills/pdf/SKILL.md"),
            "---\nname: pdf\ndescription: Work with PDFs\n---\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("skills/.hidden")).unwrap();
        fs::write(root.join("skills/README.md"), "not a skill").unwrap();
        fs::write(root.join("commands/review.md"), "# Review\nReview a diff").unwrap();
        fs::write(root.join("commands/notes.txt"), "ignored").unwrap();
        fs::write(root.join("settings/claude.json"), "{}").unwrap();
        fs::write(root.join("settings/.hidden.json"), "{}").unwrap();

        let result = store.list(&ListOptions::default()).unwrap();
        assert_eq!(result.skills.len(), 1);
        assert_eq!(result.skills[0].description, "Work with PDFs");
        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.commands[0].description, "Review a diff");
        assert_eq!(result.settings.len(), 1);
        assert_eq!(result.settings[0].description, "claude agent settings");
    }

    #[test]
    fn test_filtered_list_is_subset_of_full_list() {
        let temp = TempDir::new().unwrap();
        let store = init_store(&temp);
        store.add(Category::Skills, "beta").unwrap();
        store.add(Category::Skills, "alpha").unwrap();
        store.add(Category::Rules, "no-tabs").unwrap();

        let all = store.list(&ListOptions::default()).unwrap();
        let skills = store
            .list(&ListOptions {
                category: Some(Category::Skills),
            })
            .unwrap();

        assert_eq!(skills.skills, all.skills);
        assert!(skills.rules.is_empty());
        assert!(skills.instructions.is_empty());
        let names: Vec<_> = skills.skills.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_add_skill_scaffolds_directory() {
        let temp = TempDir::new().unwrap();
        let store = init_store(&temp);

        let added = store.add(Category::Skills, "pdf-tools").unwrap();

        assert!(added.path.join("scripts").is_dir());
        assert!(added.path.join("references").is_dir());
        assert!(added.path.join("assets").is_dir());
        let skill_md = fs::read_to_string(added.path.join("SKILL.md")).unwrap();
        assert!(skill_md.contains("name: pdf-tools"));
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_input() {
        let temp = TempDir::new().unwrap();
        let store = init_store(&temp);

        store.add(Category::Commands, "review").unwrap();
        assert!(matches!(
            store.add(Category::Commands, "review"),
            Err(Error::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.add(Category::Commands, "Bad Name"),
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            store.add(Category::Settings, "claude"),
            Err(Error::Unsupported(_))
        ));
    }
}
