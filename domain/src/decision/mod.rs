//! External work items ("Decisions") discovered by news intake.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Closed category enum for a [`Decision`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Fiscal,
    Legal,
    Eu,
    Health,
    Security,
    Education,
    Economy,
    Tourism,
    Environment,
    General,
}

/// An external work item discovered by news intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub full_text: String,
    /// ISO date (`YYYY-MM-DD`).
    pub date: String,
    pub source_url: String,
    pub category: Category,
    pub tags: BTreeSet<String>,
    pub translated_title: Option<String>,
    pub translated_summary: Option<String>,
}

impl Decision {
    /// Build a Decision, deriving its id from `date` and `title` (§4.2).
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        full_text: impl Into<String>,
        date: impl Into<String>,
        source_url: impl Into<String>,
        category: Category,
    ) -> Self {
        let title = title.into();
        let date = date.into();
        let id = derive_decision_id(&date, &title);
        Self {
            id,
            title,
            summary: summary.into(),
            full_text: full_text.into(),
            date,
            source_url: source_url.into(),
            category,
            tags: BTreeSet::new(),
            translated_title: None,
            translated_summary: None,
        }
    }
}

/// Derive the stable, idempotent decision id: `news-{date}-{8 hex}` where
/// the hex suffix is the first 8 lowercase hex characters of
/// `sha256(title)` (§4.2). The regular expression
/// `^news-\d{4}-\d{2}-\d{2}-[0-9a-f]{8}$` must match every value produced
/// here (§8).
pub fn derive_decision_id(date: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{:02x}", b)).collect::<String>();
    format!("news-{}-{}", date, &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_matches_contractual_format() {
        let id = derive_decision_id("2026-03-15", "New VAT rate");
        let re = regex_lite_match(&id);
        assert!(re, "id {id} did not match the contractual pattern");
    }

    fn regex_lite_match(s: &str) -> bool {
        // Hand-rolled check of ^news-\d{4}-\d{2}-\d{2}-[0-9a-f]{8}$ without
        // pulling in a regex dependency just for one test.
        let Some(rest) = s.strip_prefix("news-") else {
            return false;
        };
        let parts: Vec<&str> = rest.splitn(4, '-').collect();
        if parts.len() != 4 {
            return false;
        }
        let digits = |s: &str, n: usize| s.len() == n && s.chars().all(|c| c.is_ascii_digit());
        let hex8 = |s: &str| s.len() == 8 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase());
        digits(parts[0], 4) && digits(parts[1], 2) && digits(parts[2], 2) && hex8(parts[3])
    }

    #[test]
    fn id_derivation_is_idempotent() {
        let a = derive_decision_id("2026-03-15", "New VAT rate");
        let b = derive_decision_id("2026-03-15", "New VAT rate");
        assert_eq!(a, b);
    }

    #[test]
    fn id_differs_by_title() {
        let a = derive_decision_id("2026-03-15", "New VAT rate");
        let b = derive_decision_id("2026-03-15", "New excise duty");
        assert_ne!(a, b);
    }

    #[test]
    fn decision_new_sets_derived_id() {
        let d = Decision::new(
            "New VAT rate",
            "summary",
            "full text",
            "2026-03-15",
            "https://example.gov/vat",
            Category::Fiscal,
        );
        assert_eq!(d.id, derive_decision_id("2026-03-15", "New VAT rate"));
    }
}
