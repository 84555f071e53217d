//! Shell-style wildcard matching over full project paths
//!
//! Supports `*`, `?`, `[seq]` and `[!seq]`. Matching applies to the whole
//! path and `*` crosses `/` boundaries, so `*.csv` matches `/data/x.csv`.

use platform_core::{Error, Result};
use regex::Regex;

/// A compiled wildcard pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a wildcard pattern
    ///
    /// A bracket expression whose ranges are all reversed, such as
    /// `[z-a]`, matches nothing.
    ///
    /// # Errors
    /// Returns `Error::Datasets` if the translated expression fails to compile
    pub fn new(pattern: &str) -> Result<Self> {
        let translated = translate(pattern);
        let regex = Regex::new(&translated).map_err(|e| {
            Error::datasets(format!("invalid glob pattern {:?}: {}", pattern, e))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the whole path matches
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Keep the matching paths, preserving order
    pub fn filter<I, S>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        paths
            .into_iter()
            .map(Into::into)
            .filter(|path| self.matches(path))
            .collect()
    }
}

/// Translate a wildcard pattern into an anchored regular expression
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let n = chars.len();
    let mut out = String::from("^(?s:");
    let mut i = 0;

    while i < n {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                // Runs of stars behave like a single star
                while i < n && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }

                if j >= n {
                    // Unclosed bracket is a literal
                    out.push_str("\\[");
                } else {
                    push_class(&mut out, &chars[i..j]);
                    i = j + 1;
                }
            }
            other => push_literal(&mut out, other),
        }
    }

    out.push_str(")\\z");
    out
}

fn push_class(out: &mut String, members: &[char]) {
    let (negated, members) = match members.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, members),
    };

    let mut ranges = Vec::new();
    let mut index = 0;
    while index < members.len() {
        let start = members[index];
        if index + 2 < members.len() && members[index + 1] == '-' {
            let end = members[index + 2];
            // A reversed range is empty
            if start <= end {
                ranges.push((start, end));
            }
            index += 3;
        } else {
            ranges.push((start, start));
            index += 1;
        }
    }

    if ranges.is_empty() {
        out.push_str(if negated { "." } else { "[^\\d\\D]" });
        return;
    }

    out.push('[');
    if negated {
        out.push('^');
    }
    for (start, end) in ranges {
        push_class_char(out, start);
        if end != start {
            out.push('-');
            push_class_char(out, end);
        }
    }
    out.push(']');
}

fn push_class_char(out: &mut String, c: char) {
    if is_class_meta(c) {
        out.push('\\');
    }
    out.push(c);
}

fn is_class_meta(c: char) -> bool {
    matches!(c, '\\' | '[' | ']' | '^' | '&' | '~' | '-')
}

fn push_literal(out: &mut String, c: char) {
    let mut buffer = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buffer)));
}
