//! Front matter: the YAML metadata block of a document.
//!
//! It comes either from an explicit raw cell fenced with `---`, or is
//! inferred from a markdown cell shaped like
//!
//! ```text
//! # Title
//! > description
//!
//! - author: Someone
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Front matter must be a mapping, got: {0}")]
    NotAMapping(String),
}

/// Keys kept in the rendered front matter block
pub const FRONTMATTER_KEYS: &[&str] = &[
    "title",
    "description",
    "author",
    "image",
    "categories",
    "output-file",
    "aliases",
    "search",
    "draft",
    "comments",
];

const COPIED_IMAGE_PREFIX: &str = "images/copied_from_nb/";

static FENCED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^---(.*\S+.*)---").unwrap());

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\A#[ \t]+(.*?)[ \t]*(?:[\r\n]+|\z)(?:^>[ \t]+(.*?)[ \t]*$)?").unwrap()
});

static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^-[ \t]+(.*)$").unwrap());

/// Document metadata, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter(Mapping);

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(mapping)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(Value::String(key.into()), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// String value of `key` (numbers and booleans are rendered)
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<String> {
        self.get_str("title").filter(|t| !t.is_empty())
    }

    /// Truthiness of a flag such as `skip_showdoc: true` or `draft: yes`
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(false),
            Some(Value::String(s)) => str_to_bool(s),
            _ => false,
        }
    }

    /// Add entries of `other` whose keys are not already present
    pub fn merge_missing(&mut self, other: Frontmatter) {
        for (key, value) in other.0 {
            if !self.0.contains_key(&key) {
                self.0.insert(key, value);
            }
        }
    }

    /// Only the keys in [`FRONTMATTER_KEYS`], in that order
    pub fn filtered(&self) -> Frontmatter {
        let mut out = Mapping::new();
        for key in FRONTMATTER_KEYS {
            if let Some(value) = self.0.get(*key) {
                out.insert(Value::String(key.to_string()), value.clone());
            }
        }
        Frontmatter(out)
    }

    /// Serialize as a fenced block, or `None` when empty
    pub fn to_block(&self) -> Result<Option<String>, FrontmatterError> {
        if self.is_empty() {
            return Ok(None);
        }
        let yaml = serde_yaml::to_string(&self.0)?;
        Ok(Some(format!("---\n{}---", yaml)))
    }

    /// Map legacy blog keys onto their current equivalents
    pub fn apply_aliases(&mut self) {
        self.replace_flag("search_exclude", "search", Value::Bool(false));
        self.replace_flag("hide", "draft", Value::Bool(true));

        if let Some(image) = self.get_str("image") {
            if let Some(stripped) = image.strip_prefix(COPIED_IMAGE_PREFIX) {
                self.insert("image", Value::String(stripped.to_string()));
            }
        }
    }

    fn replace_flag(&mut self, key: &str, replacement: &str, value: Value) {
        if self.contains_key(key) && self.flag(key) {
            self.remove(key);
            self.insert(replacement, value);
        }
    }
}

fn str_to_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "y" | "yes" | "t" | "true" | "on" | "1"
    )
}

/// Quote `s` as a YAML double-quoted scalar unless it already is one
pub fn yaml_quote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        if let Ok(inner) = serde_yaml::from_str::<String>(s) {
            if quote(&inner) == s {
                return s.to_string();
            }
        }
    }
    quote(s)
}

fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// True if `source` is a `---` fenced front matter block
pub fn is_frontmatter(source: &str) -> bool {
    FENCED_RE.is_match(source.trim())
}

/// Parse YAML text into front matter, removing `---` fences if present
pub fn parse_yaml(source: &str) -> Result<Frontmatter, FrontmatterError> {
    let trimmed = source.trim();
    let yaml = match FENCED_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => trimmed,
    };

    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(mapping) => Ok(Frontmatter(mapping)),
        Value::Null => Ok(Frontmatter::new()),
        other => Err(FrontmatterError::NotAMapping(format!("{:?}", other))),
    }
}

/// True if a markdown cell starts with a `# Title` heading
pub fn is_title_cell(source: &str) -> bool {
    TITLE_RE.is_match(source.trim_start())
}

/// Infer front matter from a title-shaped markdown cell.
///
/// Title and description are quoted with [`yaml_quote`]; `- key: value`
/// bullets add further keys but never replace the title or description.
pub fn infer_from_markdown(source: &str) -> Result<Option<Frontmatter>, FrontmatterError> {
    let source = source.trim_start();
    let Some(captures) = TITLE_RE.captures(source) else {
        return Ok(None);
    };

    let mut lines: Vec<(String, String)> = Vec::new();
    if let Some(title) = captures.get(1) {
        lines.push(("title".to_string(), yaml_quote(title.as_str())));
    }
    if let Some(desc) = captures.get(2).filter(|d| !d.as_str().is_empty()) {
        lines.push(("description".to_string(), yaml_quote(desc.as_str())));
    }

    for bullet in BULLET_RE.captures_iter(source) {
        let Some((key, value)) = bullet[1].split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() || lines.iter().any(|(k, _)| k == key) {
            continue;
        }
        lines.push((key.to_string(), value.to_string()));
    }

    let yaml: Vec<String> = lines.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    parse_yaml(&yaml.join("\n")).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_quote_escapes() {
        assert_eq!(yaml_quote("plain"), "\"plain\"");
        assert_eq!(yaml_quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(yaml_quote(r"C:\path"), r#""C:\\path""#);
    }

    #[test]
    fn test_yaml_quote_is_idempotent() {
        for s in ["plain", r#"a "b" c"#, r"back\slash", "\"", "", "x\"", "\"already\""] {
            let once = yaml_quote(s);
            assert_eq!(yaml_quote(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_yaml_quote_round_trips_through_yaml() {
        for s in [
            r#"He said "no""#,
            r"a\b",
            r#"mix \ and ""#,
            "colon: inside",
            r#""Hello" and "World""#,
            r#""a" # trailing""#,
        ] {
            let parsed: String = serde_yaml::from_str(&yaml_quote(s)).unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn test_is_frontmatter() {
        assert!(is_frontmatter("---\ntitle: X\n---"));
        assert!(is_frontmatter("  ---\ntitle: X\n---\n"));
        assert!(!is_frontmatter("------"));
        assert!(!is_frontmatter("title: X"));
    }

    #[test]
    fn test_parse_fenced_yaml() {
        let fm = parse_yaml("---\ntitle: Hello\nskip_showdoc: true\n---").unwrap();
        assert_eq!(fm.title(), Some("Hello".to_string()));
        assert!(fm.flag("skip_showdoc"));
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(matches!(
            parse_yaml("---\njust text\n---"),
            Err(FrontmatterError::NotAMapping(_))
        ));
    }

    #[test]
    fn test_infer_title_and_description() {
        let fm = infer_from_markdown("# Foo\n> bar").unwrap().unwrap();
        assert_eq!(fm.title(), Some("Foo".to_string()));
        assert_eq!(fm.get_str("description"), Some("bar".to_string()));
    }

    #[test]
    fn test_infer_title_only() {
        let fm = infer_from_markdown("# Just a title").unwrap().unwrap();
        assert_eq!(fm.title(), Some("Just a title".to_string()));
        assert!(!fm.contains_key("description"));
    }

    #[test]
    fn test_infer_bullets() {
        let src = "# Core\n> The core module\n\n- author: Ada\n- categories: [a, b]\n- title: ignored\n- no colon";
        let fm = infer_from_markdown(src).unwrap().unwrap();
        assert_eq!(fm.title(), Some("Core".to_string()));
        assert_eq!(fm.get_str("author"), Some("Ada".to_string()));
        assert!(matches!(fm.get("categories"), Some(Value::Sequence(s)) if s.len() == 2));
    }

    #[test]
    fn test_infer_quotes_special_characters() {
        let fm = infer_from_markdown("# A \"quoted\" title: yes\n> back\\slash")
            .unwrap()
            .unwrap();
        assert_eq!(fm.title(), Some("A \"quoted\" title: yes".to_string()));
        assert_eq!(fm.get_str("description"), Some("back\\slash".to_string()));
    }

    #[test]
    fn test_infer_title_wrapped_in_quotes() {
        let fm = infer_from_markdown("# \"Hello\" and \"World\"\n> desc")
            .unwrap()
            .unwrap();
        assert_eq!(fm.title(), Some("\"Hello\" and \"World\"".to_string()));
        assert_eq!(fm.get_str("description"), Some("desc".to_string()));
    }

    #[test]
    fn test_not_a_title_cell() {
        assert!(!is_title_cell("Some prose\n# Heading later"));
        assert!(!is_title_cell("## Subheading"));
        assert!(infer_from_markdown("plain text").unwrap().is_none());
    }

    #[test]
    fn test_filtered_keeps_allow_list_order() {
        let fm = parse_yaml("draft: true\nskip_showdoc: true\ntitle: T\nauthor: A").unwrap();
        let filtered = fm.filtered();
        let keys: Vec<&str> = filtered
            .as_mapping()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["title", "author", "draft"]);
    }

    #[test]
    fn test_to_block() {
        let fm = infer_from_markdown("# Foo\n> bar").unwrap().unwrap();
        let block = fm.to_block().unwrap().unwrap();
        insta::assert_snapshot!(block, @r###"
        ---
        title: Foo
        description: bar
        ---
        "###);
        assert_eq!(Frontmatter::new().to_block().unwrap(), None);
    }

    #[test]
    fn test_merge_missing_never_overwrites() {
        let mut explicit = parse_yaml("title: Explicit\nauthor: Me").unwrap();
        let inferred = infer_from_markdown("# Inferred\n> desc").unwrap().unwrap();
        explicit.merge_missing(inferred);
        assert_eq!(explicit.title(), Some("Explicit".to_string()));
        assert_eq!(explicit.get_str("description"), Some("desc".to_string()));
    }

    #[test]
    fn test_aliases() {
        let mut fm =
            parse_yaml("search_exclude: true\nhide: true\nimage: images/copied_from_nb/x.png")
                .unwrap();
        fm.apply_aliases();
        assert!(!fm.contains_key("search_exclude"));
        assert_eq!(fm.get("search"), Some(&Value::Bool(false)));
        assert_eq!(fm.get("draft"), Some(&Value::Bool(true)));
        assert_eq!(fm.get_str("image"), Some("x.png".to_string()));
    }

    #[test]
    fn test_aliases_leave_false_flags() {
        let mut fm = parse_yaml("hide: false").unwrap();
        fm.apply_aliases();
        assert!(fm.contains_key("hide"));
        assert!(!fm.contains_key("draft"));
    }
}
