// Cumulative score storage backed by the sectioned score file.
//
// The store lives across cycles. `load` re-reads the file on top of the
// in-memory state, so manual edits between cycles take effect; `save` always
// rewrites the complete state.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::config::TOTAL_SCOPE;
use crate::engine::extractor::OwnerToken;
use crate::error::StoreError;
use crate::ini::{Dialect, Document, Section};

/// A named bucket of scores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Total,
    Target(String),
}

impl Scope {
    pub fn target(name: impl Into<String>) -> Self {
        Scope::Target(name.into())
    }

    /// Section name in the score file: `TotalScores` or `<target>Scores`.
    pub fn section_name(&self) -> String {
        match self {
            Scope::Total => format!("{TOTAL_SCOPE}Scores"),
            Scope::Target(name) => format!("{name}Scores"),
        }
    }
}

/// One owner's count within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    pub owner: String,
    pub count: u64,
}

fn same_owner(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScoreTable {
    section: String,
    /// Discovery order; owners compare case-insensitively and keep the
    /// first-seen spelling.
    entries: Vec<ScoreEntry>,
}

impl ScoreTable {
    fn new(section: String) -> Self {
        Self {
            section,
            entries: Vec::new(),
        }
    }

    fn entry_mut(&mut self, owner: &str) -> &mut ScoreEntry {
        let idx = match self
            .entries
            .iter()
            .position(|e| same_owner(&e.owner, owner))
        {
            Some(i) => i,
            None => {
                self.entries.push(ScoreEntry {
                    owner: owner.to_string(),
                    count: 0,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }
}

#[derive(Debug, Clone)]
pub struct ScoreStore {
    path: PathBuf,
    tables: Vec<ScoreTable>,
}

impl ScoreStore {
    /// An empty store persisting to `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tables: Vec::new(),
        }
    }

    /// Merge the score file into memory. A missing file is an empty file.
    ///
    /// The whole file is validated before anything is merged, so a bad manual
    /// edit leaves the store untouched.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let doc = Document::parse(&text, Dialect::SCORES).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        self.merge(&doc)
    }

    fn merge(&mut self, doc: &Document) -> Result<(), StoreError> {
        let mut staged: Vec<(String, Vec<(String, u64)>)> = Vec::with_capacity(doc.sections.len());
        for section in &doc.sections {
            let mut counts = Vec::with_capacity(section.entries.len());
            for (owner, value) in &section.entries {
                let count = value.parse::<u64>().map_err(|_| StoreError::InvalidCount {
                    section: section.name.clone(),
                    owner: owner.clone(),
                    value: value.clone(),
                })?;
                counts.push((owner.clone(), count));
            }
            staged.push((section.name.clone(), counts));
        }

        for (section, counts) in staged {
            let table = self.table_mut(&section);
            for (owner, count) in counts {
                table.entry_mut(&owner).count = count;
            }
        }
        Ok(())
    }

    /// Write the complete state to the score file via a temp file and rename.
    pub fn save(&self) -> Result<(), StoreError> {
        write_atomic(&self.path, self.to_document().render().as_bytes()).map_err(|source| {
            StoreError::Persistence {
                path: self.path.clone(),
                source,
            }
        })
    }

    pub fn to_document(&self) -> Document {
        Document {
            sections: self
                .tables
                .iter()
                .map(|t| Section {
                    name: t.section.clone(),
                    entries: t
                        .entries
                        .iter()
                        .map(|e| (e.owner.clone(), e.count.to_string()))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Create an empty scope if it does not exist yet.
    pub fn ensure_scope(&mut self, scope: &Scope) {
        self.table_mut(&scope.section_name());
    }

    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.table(&scope.section_name()).is_some()
    }

    /// Add one point to `owner` in `scope`, creating the scope and entry as
    /// needed. Returns the new count.
    pub fn increment(&mut self, scope: &Scope, owner: &str) -> u64 {
        let entry = self.table_mut(&scope.section_name()).entry_mut(owner);
        entry.count += 1;
        entry.count
    }

    /// Credit one claim: the total and the target's own scope move together.
    /// Returns the new (total, target) counts.
    pub fn credit(&mut self, target: &str, owner: &OwnerToken) -> (u64, u64) {
        let total = self.increment(&Scope::Total, owner.as_str());
        let own = self.increment(&Scope::target(target), owner.as_str());
        (total, own)
    }

    /// All (owner, count) pairs for a scope in discovery order, or `None`
    /// if the scope does not exist.
    pub fn entries_for(&self, scope: &Scope) -> Option<&[ScoreEntry]> {
        self.table(&scope.section_name()).map(|t| t.entries.as_slice())
    }

    pub fn count(&self, scope: &Scope, owner: &str) -> Option<u64> {
        self.entries_for(scope)?
            .iter()
            .find(|e| same_owner(&e.owner, owner))
            .map(|e| e.count)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.section.as_str())
    }

    fn table(&self, section: &str) -> Option<&ScoreTable> {
        self.tables.iter().find(|t| t.section == section)
    }

    fn table_mut(&mut self, section: &str) -> &mut ScoreTable {
        let idx = match self.tables.iter().position(|t| t.section == section) {
            Some(i) => i,
            None => {
                self.tables.push(ScoreTable::new(section.to_string()));
                self.tables.len() - 1
            }
        };
        &mut self.tables[idx]
    }
}

/// Write `contents` to a sibling temp file, sync it and rename it over `path`.
/// On failure the temp file is removed and `path` is left as it was.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let written = std::fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp_path, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(s: &str) -> OwnerToken {
        OwnerToken::sanitize(s).unwrap()
    }

    #[test]
    fn test_scope_section_names() {
        assert_eq!(Scope::Total.section_name(), "TotalScores");
        assert_eq!(Scope::target("web").section_name(), "webScores");
    }

    #[test]
    fn test_ensure_scope_is_idempotent() {
        let mut store = ScoreStore::new("unused.txt");
        store.ensure_scope(&Scope::Total);
        store.increment(&Scope::Total, "alice");
        store.ensure_scope(&Scope::Total);
        assert_eq!(store.count(&Scope::Total, "alice"), Some(1));
        assert_eq!(store.section_names().count(), 1);
    }

    #[test]
    fn test_increment_initializes_missing_entry() {
        let mut store = ScoreStore::new("unused.txt");
        assert_eq!(store.increment(&Scope::target("web"), "bob"), 1);
        assert_eq!(store.increment(&Scope::target("web"), "bob"), 2);
        assert_eq!(store.count(&Scope::target("web"), "bob"), Some(2));
    }

    #[test]
    fn test_credit_moves_total_and_target_together() {
        let mut store = ScoreStore::new("unused.txt");
        assert_eq!(store.credit("web", &owner("alice")), (1, 1));
        assert_eq!(store.credit("ftp", &owner("alice")), (2, 1));
        assert_eq!(store.count(&Scope::Total, "alice"), Some(2));
        assert_eq!(store.count(&Scope::target("web"), "alice"), Some(1));
        assert_eq!(store.count(&Scope::target("ftp"), "alice"), Some(1));
    }

    #[test]
    fn test_owner_case_keeps_first_seen_spelling() {
        let mut store = ScoreStore::new("unused.txt");
        store.increment(&Scope::Total, "Alice");
        store.increment(&Scope::Total, "alice");
        let entries = store.entries_for(&Scope::Total).unwrap();
        assert_eq!(
            entries,
            &[ScoreEntry {
                owner: "Alice".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_owner_case_folding_is_unicode_aware() {
        let mut store = ScoreStore::new("unused.txt");
        store.increment(&Scope::Total, "Éve");
        store.increment(&Scope::Total, "éve");
        assert_eq!(store.entries_for(&Scope::Total).unwrap().len(), 1);
        assert_eq!(store.count(&Scope::Total, "ÉVE"), Some(2));
    }

    #[test]
    fn test_entries_for_missing_scope() {
        let store = ScoreStore::new("unused.txt");
        assert!(store.entries_for(&Scope::target("new")).is_none());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ScoreStore::new(dir.path().join("scores.txt"));
        store.load().unwrap();
        assert_eq!(store.section_names().count(), 0);
    }

    #[test]
    fn test_load_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.txt");
        let text = "[TotalScores]\nalice = 3\nbob = 5\n\n[webScores]\nbob = 5\n\n[oldScores]\nalice = 3\n\n";
        std::fs::write(&path, text).unwrap();

        let mut store = ScoreStore::new(&path);
        store.load().unwrap();
        store.save().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_load_merges_over_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.txt");
        let mut store = ScoreStore::new(&path);
        store.increment(&Scope::Total, "alice");
        store.increment(&Scope::Total, "bob");

        std::fs::write(&path, "[TotalScores]\nalice = 10\n").unwrap();
        store.load().unwrap();
        assert_eq!(store.count(&Scope::Total, "alice"), Some(10));
        assert_eq!(store.count(&Scope::Total, "bob"), Some(1));
    }

    #[test]
    fn test_invalid_count_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.txt");
        let mut store = ScoreStore::new(&path);
        store.increment(&Scope::Total, "alice");

        std::fs::write(&path, "[TotalScores]\nalice = 7\nbob = lots\n").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::InvalidCount { .. }));
        assert_eq!(store.count(&Scope::Total, "alice"), Some(1));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ScoreStore::new(dir.path().join("nope").join("scores.txt"));
        store.increment(&Scope::Total, "alice");
        assert!(matches!(
            store.save().unwrap_err(),
            StoreError::Persistence { .. }
        ));
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.txt");
        let mut store = ScoreStore::new(&path);
        store.credit("web", &owner("alice"));
        store.save().unwrap();
        store.credit("web", &owner("alice"));
        store.save().unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["scores.txt".to_string()]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[TotalScores]\nalice = 2\n\n[webScores]\nalice = 2\n\n"
        );
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a non-empty directory fails.
        let path = dir.path().join("scores.txt");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        assert!(write_atomic(&path, b"[TotalScores]\n").is_err());
        assert!(!dir.path().join(".scores.txt.tmp").exists());
        assert!(path.join("keep").exists());
    }
}
