//! Cell directives: `#| key: value` lines at the top of a code cell.

/// Keys that send a cell's code to the generated module
pub const EXPORT_KEYS: &[&str] = &["export", "exporti", "exports"];

/// Export keys whose declarations get documentation cells
pub const DOCUMENTED_KEYS: &[&str] = &["export", "exports", "exec_doc"];

/// Keys whose cells must be evaluated to render documentation
pub const EVAL_KEYS: &[&str] = &["export", "exports", "exporti", "exec_doc"];

/// Line-comment prefix used for directives in `language`
pub fn comment_prefix(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "javascript" | "js" | "typescript" | "ts" | "rust" | "c" | "cpp" | "c++" | "java"
        | "go" | "swift" | "kotlin" | "scala" => "//",
        "sql" | "lua" | "haskell" => "--",
        _ => "#",
    }
}

/// Ordered directive set of a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    entries: Vec<(String, Vec<String>)>,
}

impl Directives {
    /// Parse the leading directive lines of `source`.
    ///
    /// Scanning stops at the first line that is not a directive. Keys are
    /// lower-cased; `#|eval:false` and `#| eval: false` parse the same.
    pub fn parse(source: &str, language: &str) -> Self {
        let prefix = comment_prefix(language);
        let mut entries: Vec<(String, Vec<String>)> = Vec::new();

        for line in source.lines() {
            let Some(body) = directive_body(line, prefix) else {
                break;
            };
            let Some((key, values)) = split_directive(body) else {
                continue;
            };
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = values,
                None => entries.push((key, values)),
            }
        }

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// True if any of `keys` is present
    pub fn contains_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.contains(k))
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First value of `key`, if any
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(|s| s.as_str())
    }

    /// True when `key` is present with the value `false`
    pub fn is_false(&self, key: &str) -> bool {
        self.value(key)
            .map(|v| v.eq_ignore_ascii_case("false"))
            .unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Text after `<prefix>|` if `line` is a directive line
fn directive_body<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix(prefix)?;
    rest.trim_start().strip_prefix('|')
}

fn split_directive(body: &str) -> Option<(String, Vec<String>)> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let (key, rest) = match body.split_once(':') {
        Some((key, rest)) if !key.trim().contains(char::is_whitespace) => (key.trim(), rest),
        _ => match body.split_once(char::is_whitespace) {
            Some((key, rest)) => (key, rest),
            None => (body, ""),
        },
    };

    let key = key.trim_end_matches(':').to_lowercase();
    if key.is_empty() {
        return None;
    }
    let values = rest.split_whitespace().map(str::to_string).collect();
    Some((key, values))
}
