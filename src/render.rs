// Scoreboard rendering: score tables, template substitution and the
// one-time copy of template assets into the web root.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

use crate::engine::config::{GameConfig, TOTAL_SCOPE};
use crate::engine::store::{write_atomic, ScoreEntry, ScoreStore, Scope};
use crate::error::RenderError;

/// Template file inside the template directory. Every other file there is a
/// static asset.
pub const TEMPLATE_FILE: &str = "template.html";

/// One rendered score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreTable {
    /// Target name, or `Total`.
    pub scope: String,
    /// Placeholder replaced in the template, e.g. `<WEBSERVER>`.
    pub tag: String,
    pub url: Option<String>,
    /// Highest count first; ties keep discovery order.
    pub rows: Vec<ScoreEntry>,
}

impl ScoreTable {
    fn build(scope: &str, url: Option<&str>, entries: Option<&[ScoreEntry]>) -> Self {
        let entries: &[ScoreEntry] = match entries {
            Some(e) => e,
            None => {
                tracing::warn!(scope = %scope, "no score section yet, rendering an empty table");
                &[]
            }
        };
        Self {
            scope: scope.to_string(),
            tag: format!("<{}>", scope.to_uppercase()),
            url: url.map(str::to_string),
            rows: ranked(entries),
        }
    }

    /// The HTML fragment substituted for `tag`.
    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<div class=\"col-md-12\" id=\"{}\"><table class=\"table\" border=\"2\">\n<tr>",
            encode_double_quoted_attribute(&self.scope)
        );
        html.push_str(&format!(
            "<td colspan=\"2\"><center><h3>{}</h3><br>",
            encode_text(&title_case(&self.scope))
        ));
        if let Some(url) = &self.url {
            html.push_str(&format!(
                "<hr style=\"border-top: 1px solid #000;\"/><h4>Server: <a href=\"{}\">{}</a></h4>",
                encode_double_quoted_attribute(url),
                encode_text(url)
            ));
        }
        html.push_str("</center></td></tr>\n");
        for (i, row) in self.rows.iter().enumerate() {
            let class = if i == 0 { "topscore" } else { "otherscore" };
            html.push_str(&format!(
                "<tr><td><div class=\"{class}\">{}</div></td><td><div class=\"{class}\">{}</div></td></tr>\n",
                encode_text(&title_case(&row.owner)),
                row.count
            ));
        }
        html.push_str("</table></div>");
        html
    }
}

/// Everything the page needs after a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Scoreboard {
    pub generated_at: DateTime<Utc>,
    /// One table per target in config order, then the total.
    pub tables: Vec<ScoreTable>,
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self {
            generated_at: Utc::now(),
            tables: Vec::new(),
        }
    }
}

impl Scoreboard {
    pub fn snapshot(config: &GameConfig, store: &ScoreStore) -> Self {
        let mut tables: Vec<ScoreTable> = config
            .targets
            .iter()
            .map(|t| {
                ScoreTable::build(
                    &t.name,
                    Some(t.url.as_str()),
                    store.entries_for(&Scope::target(t.name.clone())),
                )
            })
            .collect();
        tables.push(ScoreTable::build(
            TOTAL_SCOPE,
            None,
            store.entries_for(&Scope::Total),
        ));
        Self {
            generated_at: Utc::now(),
            tables,
        }
    }

    pub fn total(&self) -> Option<&ScoreTable> {
        self.tables.last().filter(|t| t.scope == TOTAL_SCOPE)
    }

    /// Replace every table's tag in `template` with its HTML. Literal,
    /// case-sensitive replacement.
    pub fn fill(&self, template: &str) -> String {
        self.tables.iter().fold(template.to_string(), |page, table| {
            tracing::debug!(tag = %table.tag, "updating tag in the template");
            page.replace(&table.tag, &table.to_html())
        })
    }
}

/// Sort descending by count. `sort_by` is stable, so ties stay in discovery
/// order.
pub fn ranked(entries: &[ScoreEntry]) -> Vec<ScoreEntry> {
    let mut rows = entries.to_vec();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Read the template, fill it and write the page to `outfile`.
pub fn publish(template_path: &Path, outfile: &Path, scoreboard: &Scoreboard) -> Result<(), RenderError> {
    let template = std::fs::read_to_string(template_path).map_err(|source| RenderError::Template {
        path: template_path.to_path_buf(),
        source,
    })?;
    let page = scoreboard.fill(&template);
    write_atomic(outfile, page.as_bytes()).map_err(|source| RenderError::Output {
        path: outfile.to_path_buf(),
        source,
    })?;
    tracing::info!(outfile = %outfile.display(), "updated scoreboard");
    Ok(())
}

/// Copy the template directory into `outdir`, leaving out `template.html`
/// at its top level. Run once before the first cycle.
pub fn materialize(template_dir: &Path, outdir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let map_err = |source: std::io::Error| RenderError::Materialize {
        path: outdir.to_path_buf(),
        source,
    };
    let mut copied = Vec::new();
    std::fs::create_dir_all(outdir).map_err(map_err)?;
    for entry in std::fs::read_dir(template_dir).map_err(map_err)? {
        let entry = entry.map_err(map_err)?;
        if entry.file_name() == TEMPLATE_FILE {
            continue;
        }
        let dst = outdir.join(entry.file_name());
        copy_all(&entry.path(), &dst, &mut copied).map_err(map_err)?;
    }
    Ok(copied)
}

fn copy_all(src: &Path, dst: &Path, copied: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if src.is_dir() {
        std::fs::create_dir_all(dst)?;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            copy_all(&entry.path(), &dst.join(entry.file_name()), copied)?;
        }
    } else {
        std::fs::copy(src, dst)?;
        copied.push(dst.to_path_buf());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(owner: &str, count: u64) -> ScoreEntry {
        ScoreEntry {
            owner: owner.into(),
            count,
        }
    }

    #[test]
    fn test_ranked_is_stable_for_ties() {
        let rows = ranked(&[entry("alice", 3), entry("bob", 5), entry("carol", 5)]);
        let order: Vec<_> = rows.iter().map(|r| r.owner.as_str()).collect();
        assert_eq!(order, vec!["bob", "carol", "alice"]);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("red team"), "Red Team");
        assert_eq!(title_case("WEBSERVER"), "Webserver");
        assert_eq!(title_case("team42rocks"), "Team42Rocks");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_missing_scope_renders_empty_table() {
        let table = ScoreTable::build("web", Some("http://10.0.0.1"), None);
        assert!(table.rows.is_empty());
        assert_eq!(table.tag, "<WEB>");
        let html = table.to_html();
        assert!(html.contains("<h3>Web</h3>"));
        assert!(html.contains("href=\"http://10.0.0.1\""));
        assert!(!html.contains("topscore"));
    }

    #[test]
    fn test_first_row_is_topscore() {
        let table = ScoreTable::build(TOTAL_SCOPE, None, Some(&[entry("alice", 1), entry("bob", 4)][..]));
        let html = table.to_html();
        let top = html.find("<div class=\"topscore\">Bob</div>").unwrap();
        let other = html.find("<div class=\"otherscore\">Alice</div>").unwrap();
        assert!(top < other);
        assert!(!html.contains("Server:"));
    }

    #[test]
    fn test_owner_is_escaped() {
        let table = ScoreTable::build(TOTAL_SCOPE, None, Some(&[entry("a&b", 1)][..]));
        assert!(table.to_html().contains(">A&amp;B</div>"));
    }

    #[test]
    fn test_url_is_escaped_in_attribute_and_text() {
        let table = ScoreTable::build("web", Some("http://x/?a=1&b=\"2\""), None);
        let html = table.to_html();
        assert!(html.contains("href=\"http://x/?a=1&amp;b=&quot;2&quot;\""));
        assert!(html.contains(">http://x/?a=1&amp;b=\"2\"</a>"));
    }

    #[test]
    fn test_fill_replaces_upper_case_tags_only() {
        let scoreboard = Scoreboard {
            generated_at: Utc::now(),
            tables: vec![
                ScoreTable::build("web", Some("http://x"), Some(&[entry("alice", 2)][..])),
                ScoreTable::build(TOTAL_SCOPE, None, Some(&[entry("alice", 2)][..])),
            ],
        };
        let page = scoreboard.fill("<html><WEB> | <web> | <TOTAL></html>");
        assert!(!page.contains("<WEB>"));
        assert!(page.contains("<web>"));
        assert!(!page.contains("<TOTAL>"));
        assert_eq!(page.matches("<table").count(), 2);
    }

    #[test]
    fn test_materialize_skips_template() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join(TEMPLATE_FILE), "<TOTAL>").unwrap();
        std::fs::write(src.path().join("style.css"), "body {}").unwrap();
        std::fs::create_dir(src.path().join("img")).unwrap();
        std::fs::write(src.path().join("img").join("flag.png"), [0u8, 1, 2]).unwrap();

        let copied = materialize(src.path(), out.path()).unwrap();
        assert_eq!(copied.len(), 2);
        assert!(out.path().join("style.css").exists());
        assert!(out.path().join("img").join("flag.png").exists());
        assert!(!out.path().join(TEMPLATE_FILE).exists());
    }

    #[test]
    fn test_publish_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = publish(
            &dir.path().join("missing.html"),
            &dir.path().join("index.html"),
            &Scoreboard::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Template { .. }));
    }
}
