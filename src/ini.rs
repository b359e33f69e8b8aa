// Sectioned key/value documents: the game config file and the score file.
//
// Sections and keys keep file order. Lookups of sections are exact, lookups of
// keys go through `Section::get`, which is case-insensitive.

use std::fmt::Write as _;

/// Parsing rules that differ between the config file and the score file.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    /// Accept `key: value` in addition to `key = value`.
    pub colon_delimiter: bool,
    /// Treat lines starting with `#` or `;` as comments.
    pub comments: bool,
}

impl Dialect {
    pub const CONFIG: Dialect = Dialect {
        colon_delimiter: true,
        comments: true,
    };

    /// Owner tokens may start with `#` or contain `:`, so the score file
    /// only splits on `=` and has no comment syntax.
    pub const SCORES: Dialect = Dialect {
        colon_delimiter: false,
        comments: false,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Case-insensitive key lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub sections: Vec<Section>,
}

impl Document {
    pub fn parse(text: &str, dialect: Dialect) -> Result<Self, ParseError> {
        let mut doc = Document::default();
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if dialect.comments && (line.starts_with('#') || line.starts_with(';')) {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim();
                if name.is_empty() {
                    return Err(ParseError {
                        line: line_no,
                        message: "empty section name".to_string(),
                    });
                }
                // A repeated header continues the earlier section.
                if doc.section(name).is_none() {
                    doc.sections.push(Section::new(name));
                }
                current = Some(name.to_string());
                continue;
            }

            let split_at = line
                .char_indices()
                .find(|(_, c)| *c == '=' || (dialect.colon_delimiter && *c == ':'))
                .map(|(i, _)| i);
            let Some(split_at) = split_at else {
                return Err(ParseError {
                    line: line_no,
                    message: format!("expected `key = value`, got `{line}`"),
                });
            };
            let key = line[..split_at].trim();
            let value = line[split_at + 1..].trim();
            if key.is_empty() {
                return Err(ParseError {
                    line: line_no,
                    message: "empty key".to_string(),
                });
            }

            let Some(current) = current.as_deref() else {
                return Err(ParseError {
                    line: line_no,
                    message: "entry before the first section header".to_string(),
                });
            };
            let section = doc.section_mut_or_insert(current);
            match section.entries.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.to_string(),
                None => section.entries.push((key.to_string(), value.to_string())),
            }
        }

        Ok(doc)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut_or_insert(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    /// Render as `[Section]` blocks of `key = value` lines, one blank line
    /// after each section.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let _ = writeln!(out, "[{}]", section.name);
            for (key, value) in &section.entries {
                let _ = writeln!(out, "{key} = {value}");
            }
            out.push('\n');
        }
        out
    }
}
