//! Pattern compilation and matching.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

use super::decode::decode_param;
use super::params::Params;
use crate::error::{HttpError, SetupError};

/// A route pattern as supplied at registration time.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Path string with `:name`, `:name?`, `:name(re)` and `*` tokens
    Path(String),
    /// Raw regular expression, used as supplied
    Regex(Regex),
    /// Alternation of patterns sharing one parameter list
    List(Vec<Pattern>),
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Path(p) => f.write_str(p),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            Pattern::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Pattern {
    fn from(p: &str) -> Self {
        Pattern::Path(p.to_string())
    }
}

impl From<String> for Pattern {
    fn from(p: String) -> Self {
        Pattern::Path(p)
    }
}

impl From<&String> for Pattern {
    fn from(p: &String) -> Self {
        Pattern::Path(p.clone())
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

impl<T: Into<Pattern>> From<Vec<T>> for Pattern {
    fn from(items: Vec<T>) -> Self {
        Pattern::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Pattern>, const N: usize> From<[T; N]> for Pattern {
    fn from(items: [T; N]) -> Self {
        Pattern::List(items.into_iter().map(Into::into).collect())
    }
}

/// Matching knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Case-sensitive comparison of literal segments
    pub sensitive: bool,
    /// Treat a trailing slash as significant
    pub strict: bool,
    /// Anchor at the end of the path (routes) instead of at a segment boundary (use)
    pub end: bool,
}

impl MatchOptions {
    /// Exact match, as used by routes.
    #[must_use]
    pub fn route() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
        }
    }

    /// Prefix match, as used by `use`-style layers.
    #[must_use]
    pub fn prefix() -> Self {
        Self {
            end: false,
            ..Self::route()
        }
    }

    #[must_use]
    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Descriptor of one capture group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamKey {
    /// Parameter name; unnamed captures are numbered `"0"`, `"1"`, ...
    pub name: Arc<str>,
    pub optional: bool,
}

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// The matched portion of the path (the whole path for exact matchers)
    pub path: String,
    pub params: Params,
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: Pattern,
    /// `None` for `/` in prefix mode, which matches everything
    regex: Option<Regex>,
    keys: Vec<ParamKey>,
    options: MatchOptions,
    /// Index of the trailing `(/|$)` group of prefix matchers
    boundary_group: Option<usize>,
}

/// Running key list shared across alternatives of one pattern.
#[derive(Default)]
struct Keys {
    keys: Vec<ParamKey>,
    positional: usize,
}

impl Keys {
    fn named(&mut self, name: &str, optional: bool) {
        self.keys.push(ParamKey {
            name: Arc::from(name),
            optional,
        });
    }

    fn positional(&mut self, optional: bool) {
        let name = self.positional.to_string();
        self.positional += 1;
        self.named(&name, optional);
    }
}

impl PathMatcher {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] for an empty parameter name, an unclosed
    /// custom group, or a regular expression the `regex` crate rejects.
    pub fn compile(pattern: impl Into<Pattern>, options: MatchOptions) -> Result<Self, SetupError> {
        let pattern = pattern.into();
        if !options.end && matches!(&pattern, Pattern::Path(p) if p == "/") {
            return Ok(Self::any(options));
        }

        let mut keys = Keys::default();
        let mut bounded = false;

        let source = match &pattern {
            // A lone raw regex is used verbatim: the caller owns its anchors.
            Pattern::Regex(re) => {
                collect_regex_keys(re, &mut keys);
                re.as_str().to_string()
            }
            _ => {
                let mut body = alternative_source(&pattern, &mut keys)?;
                if !options.strict {
                    if body.ends_with('/') {
                        body.push('?');
                    } else {
                        body.push_str("/?");
                    }
                }

                let mut source = String::with_capacity(body.len() + 16);
                if !options.sensitive {
                    source.push_str("(?i)");
                }
                source.push('^');
                source.push_str(&body);
                if options.end {
                    source.push('$');
                } else {
                    source.push_str("(/|$)");
                    bounded = true;
                }
                source
            }
        };

        let regex = Regex::new(&source)
            .map_err(|e| SetupError::pattern(pattern.to_string(), e.to_string()))?;
        let boundary_group = bounded.then(|| regex.captures_len() - 1);

        Ok(Self {
            pattern,
            regex: Some(regex),
            keys: keys.keys,
            options,
            boundary_group,
        })
    }

    /// Prefix matcher for `/`: matches every path with an empty prefix.
    #[must_use]
    pub fn any(options: MatchOptions) -> Self {
        Self {
            pattern: Pattern::Path("/".to_string()),
            regex: None,
            keys: Vec::new(),
            options: MatchOptions { end: false, ..options },
            boundary_group: None,
        }
    }

    /// Test `path` and extract its parameters.
    ///
    /// `Ok(None)` means no match. A captured value that cannot be
    /// percent-decoded is reported as a 400 [`HttpError`].
    pub fn matches(&self, path: &str) -> Result<Option<PathMatch>, HttpError> {
        let Some(regex) = &self.regex else {
            return Ok(Some(PathMatch {
                path: String::new(),
                params: Params::new(),
            }));
        };

        let Some(caps) = regex.captures(path) else {
            return Ok(None);
        };
        let Some(whole) = caps.get(0) else {
            return Ok(None);
        };

        let matched = if self.options.end {
            whole.as_str()
        } else {
            let end = match self.boundary_group.and_then(|g| caps.get(g)) {
                Some(boundary) => boundary.start(),
                None => whole.end(),
            };
            // Prefix layers must cover a leading run of whole segments.
            let rest = &path[end..];
            if whole.start() != 0 || !(rest.is_empty() || rest.starts_with('/')) {
                return Ok(None);
            }
            &path[..end]
        };

        let mut params = Params::new();
        for (idx, key) in self.keys.iter().enumerate() {
            let value = match caps.get(idx + 1) {
                Some(m) => Some(decode_param(m.as_str())?),
                None => None,
            };
            params.insert(Arc::clone(&key.name), value);
        }

        Ok(Some(PathMatch {
            path: matched.to_string(),
            params,
        }))
    }

    #[must_use]
    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }

    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    #[must_use]
    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// The compiled regular expression source.
    #[must_use]
    pub fn source(&self) -> &str {
        self.regex.as_ref().map_or("", Regex::as_str)
    }
}

fn collect_regex_keys(re: &Regex, keys: &mut Keys) {
    for name in re.capture_names().skip(1) {
        match name {
            Some(name) => keys.named(name, false),
            None => keys.positional(false),
        }
    }
}

/// Source for one pattern without anchors.
fn alternative_source(pattern: &Pattern, keys: &mut Keys) -> Result<String, SetupError> {
    match pattern {
        Pattern::Path(path) => path_source(path, keys),
        Pattern::Regex(re) => {
            collect_regex_keys(re, keys);
            Ok(format!("(?:{})", re.as_str()))
        }
        Pattern::List(items) => {
            if items.is_empty() {
                return Err(SetupError::pattern(pattern.to_string(), "empty pattern list"));
            }
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(format!("(?:{})", alternative_source(item, keys)?));
            }
            Ok(format!("(?:{})", parts.join("|")))
        }
    }
}

fn path_source(path: &str, keys: &mut Keys) -> Result<String, SetupError> {
    let chars: Vec<char> = path.chars().collect();
    let mut out = String::with_capacity(path.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '*' {
            out.push_str("(.*)");
            keys.positional(false);
            i += 1;
            continue;
        }

        let separator = match c {
            '/' | '.' if chars.get(i + 1) == Some(&':') => Some(c),
            ':' => None,
            _ => {
                out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                i += 1;
                continue;
            }
        };
        i += if separator.is_some() { 2 } else { 1 };

        let name_start = i;
        while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
            i += 1;
        }
        if i == name_start {
            return Err(SetupError::pattern(path, "empty parameter name"));
        }
        let name: String = chars[name_start..i].iter().collect();

        let mut capture = match separator {
            Some('.') => "[^/.]+?".to_string(),
            _ => "[^/]+?".to_string(),
        };
        let mut inner_groups = 0;
        if chars.get(i) == Some(&'(') {
            let (custom, next) = custom_group(&chars, i, path)?;
            inner_groups = Regex::new(&custom)
                .map_err(|e| SetupError::pattern(path, e.to_string()))?
                .captures_len()
                - 1;
            capture = custom;
            i = next;
        }

        let optional = chars.get(i) == Some(&'?');
        if optional {
            i += 1;
        }

        keys.named(&name, optional);
        for _ in 0..inner_groups {
            keys.positional(optional);
        }

        let sep = separator
            .map(|s| regex::escape(s.encode_utf8(&mut [0; 4])))
            .unwrap_or_default();
        if optional {
            out.push_str(&format!("(?:{sep}({capture}))?"));
        } else {
            out.push_str(&format!("{sep}({capture})"));
        }
    }

    Ok(out)
}

/// Read a balanced `( ... )` group starting at `start`; returns the inner source
/// and the index just past the closing paren.
fn custom_group(chars: &[char], start: usize, path: &str) -> Result<(String, usize), SetupError> {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[start + 1..i].iter().collect();
                    if inner.is_empty() {
                        return Err(SetupError::pattern(path, "empty custom parameter pattern"));
                    }
                    return Ok((inner, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(SetupError::pattern(path, "unclosed custom parameter pattern"))
}
