// Ownership claim extraction from a target's response body.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::TargetError;

/// Characters that would let a claim inject markup or score-file syntax.
const STRIPPED: [char; 3] = ['=', '<', '>'];

/// A sanitized owner identifier taken from a `<team>` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Trim, drop `=`, `<`, `>` and control characters, trim again.
    /// Returns `None` when nothing is left.
    pub fn sanitize(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !STRIPPED.contains(c) && !c.is_control())
            .collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(Self(cleaned.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

lazy_static! {
    // Lazy match: only the first <team>...</team> pair counts.
    static ref TEAM_MARKER: Regex = Regex::new(r"(?is)<team>(.*?)</team>").unwrap();
}

/// Pull the first claim out of a response body.
pub fn extract(body: &[u8]) -> Result<OwnerToken, TargetError> {
    let text = String::from_utf8_lossy(body);
    TEAM_MARKER
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| OwnerToken::sanitize(m.as_str()))
        .ok_or(TargetError::NoClaim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_claim() {
        let token = extract(b"<html><body><team>alice</team></body></html>").unwrap();
        assert_eq!(token.as_str(), "alice");
    }

    #[test]
    fn test_extract_trims_and_strips_markup() {
        let token = extract(b"<team>  Red<Team  </team>").unwrap();
        assert_eq!(token.as_str(), "RedTeam");
    }

    #[test]
    fn test_extract_strips_equals() {
        let token = extract(b"<team>bob=99</team>").unwrap();
        assert_eq!(token.as_str(), "bob99");
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        let token = extract(b"<TEAM>carol</Team>").unwrap();
        assert_eq!(token.as_str(), "carol");
    }

    #[test]
    fn test_only_first_claim_counts() {
        let token = extract(b"<team>first</team> <team>second</team>").unwrap();
        assert_eq!(token.as_str(), "first");
    }

    #[test]
    fn test_claim_may_span_lines() {
        let token = extract(b"<team>\n  dave\n</team>").unwrap();
        assert_eq!(token.as_str(), "dave");
    }

    #[test]
    fn test_no_marker_is_no_claim() {
        assert_eq!(extract(b"<html>nobody here</html>"), Err(TargetError::NoClaim));
        assert_eq!(extract(b"<team>unterminated"), Err(TargetError::NoClaim));
    }

    #[test]
    fn test_empty_after_sanitizing_is_no_claim() {
        assert_eq!(extract(b"<team> <<>> = </team>"), Err(TargetError::NoClaim));
        assert_eq!(extract(b"<team></team>"), Err(TargetError::NoClaim));
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut body = b"<team>eve".to_vec();
        body.push(0xff);
        body.extend_from_slice(b"</team>");
        let token = extract(&body).unwrap();
        assert!(token.as_str().starts_with("eve"));
    }
}
