// Optional allow-list gating which owners may be credited.

use std::collections::BTreeSet;

use crate::engine::extractor::OwnerToken;
use crate::error::TargetError;

/// Owner tokens as configured. Membership is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    owners: BTreeSet<String>,
}

impl AllowList {
    /// Build from `[WhiteList]` values; each value is a comma-separated list
    /// where a double-quoted field may itself contain commas. Lines are
    /// unioned.
    pub fn from_entries<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let owners = lines
            .into_iter()
            .flat_map(split_fields)
            .map(|field| field.trim().to_string())
            .filter(|field| !field.is_empty())
            .collect();
        Self { owners }
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.owners.contains(owner)
    }
}

/// Split on commas outside double quotes. Quote characters are dropped.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Decide whether `owner` may be credited. A disabled filter admits everyone.
pub fn check(owner: &OwnerToken, allow_list: &AllowList, enabled: bool) -> Result<(), TargetError> {
    if !enabled || allow_list.contains(owner.as_str()) {
        Ok(())
    } else {
        Err(TargetError::NotAllowed {
            owner: owner.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> OwnerToken {
        OwnerToken::sanitize(s).unwrap()
    }

    #[test]
    fn test_from_entries_unions_lines() {
        let list = AllowList::from_entries(["alice, bob", "\"carol\",dave,"]);
        for name in ["alice", "bob", "carol", "dave"] {
            assert!(list.contains(name), "{name} should be allowed");
        }
        assert!(!list.contains(""));
    }

    #[test]
    fn test_quoted_field_keeps_its_comma() {
        let list = AllowList::from_entries(["\"red, team\",blue"]);
        assert!(list.contains("red, team"));
        assert!(list.contains("blue"));
        assert!(!list.contains("red"));
        assert!(!list.contains("team"));
    }

    #[test]
    fn test_membership_is_case_sensitive() {
        let list = AllowList::from_entries(["Alice"]);
        assert!(list.contains("Alice"));
        assert!(!list.contains("alice"));
    }

    #[test]
    fn test_disabled_admits_everyone() {
        let list = AllowList::default();
        assert!(check(&token("eve"), &list, false).is_ok());
    }

    #[test]
    fn test_enabled_rejects_unlisted() {
        let list = AllowList::from_entries(["alice,bob"]);
        assert!(check(&token("alice"), &list, true).is_ok());
        assert_eq!(
            check(&token("eve"), &list, true),
            Err(TargetError::NotAllowed {
                owner: "eve".into()
            })
        );
    }
}
