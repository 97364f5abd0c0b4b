//! Best-effort identity for tender records.
//!
//! Upstream case numbers are sometimes missing and sometimes shared by
//! different rows, so every record carries two keys:
//!
//! - the **identity key**: the case number, or the tender name when the
//!   case number is empty
//! - the **composite key**: `name|organization`
//!
//! Both are checked on every exclusion test. Collisions between distinct real
//! tenders are not detected; the later one is treated as already seen.

use crate::types::state::SeenSet;
use crate::types::tender::TenderRecord;

/// Separator between name and organization in the composite key.
pub const COMPOSITE_SEPARATOR: char = '|';

/// Dedup keys for one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenderKeys {
    /// Case number or name. Empty when both are empty.
    pub identity: String,
    /// `name|organization`
    pub composite: String,
}

impl TenderKeys {
    /// Keys worth storing or matching. The empty identity key is skipped so a
    /// record with neither id nor name never collides with another such record.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let identity = (!self.identity.is_empty()).then_some(self.identity.as_str());
        identity.into_iter().chain(std::iter::once(self.composite.as_str()))
    }

    /// True if either key is already in `seen`.
    pub fn is_seen_in(&self, seen: &SeenSet) -> bool {
        self.iter().any(|key| seen.contains(key))
    }
}

/// Resolve both dedup keys for a record.
pub fn resolve(record: &TenderRecord) -> TenderKeys {
    let identity = if record.tender_id.is_empty() {
        record.tender_name.clone()
    } else {
        record.tender_id.clone()
    };

    TenderKeys {
        identity,
        composite: composite_key(&record.tender_name, &record.org_name),
    }
}

/// `name|organization`
pub fn composite_key(name: &str, org: &str) -> String {
    format!("{}{}{}", name, COMPOSITE_SEPARATOR, org)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_prefers_upstream_id() {
        let record = TenderRecord::new("交通部", "道路改善工程").with_id("A-113-0042");
        let keys = resolve(&record);
        assert_eq!(keys.identity, "A-113-0042");
        assert_eq!(keys.composite, "道路改善工程|交通部");
    }

    #[test]
    fn test_identity_falls_back_to_name() {
        let record = TenderRecord::new("交通部", "道路改善工程");
        let keys = resolve(&record);
        assert_eq!(keys.identity, "道路改善工程");
        assert_eq!(keys.iter().count(), 2);
    }

    #[test]
    fn test_empty_identity_degrades_to_composite() {
        let record = TenderRecord::new("交通部", "");
        let keys = resolve(&record);
        assert_eq!(keys.identity, "");
        assert_eq!(keys.iter().collect::<Vec<_>>(), vec!["|交通部"]);

        let mut seen = SeenSet::new();
        seen.insert("");
        assert!(!keys.is_seen_in(&seen));
    }

    #[test]
    fn test_either_key_excludes() {
        let record = TenderRecord::new("經濟部", "資訊系統").with_id("X1");

        let mut by_id = SeenSet::new();
        by_id.insert("X1");
        assert!(resolve(&record).is_seen_in(&by_id));

        let mut by_composite = SeenSet::new();
        by_composite.insert("資訊系統|經濟部");
        assert!(resolve(&record).is_seen_in(&by_composite));

        // Same name, different id and org: not excluded
        let other = TenderRecord::new("教育部", "資訊系統").with_id("X2");
        assert!(!resolve(&other).is_seen_in(&by_composite));
    }
}
