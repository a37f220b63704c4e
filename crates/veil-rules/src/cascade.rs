//! Cascade of a block element deletion into the presets that reference it.

use serde::Serialize;
use veil_core::Preset;

/// What a cascade did to the preset collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    /// Presets that lost the id but still have members
    pub updated: Vec<String>,
    /// Presets removed because the id was their only member
    pub deleted: Vec<String>,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Remove `block_element_id` from every preset. A preset left with no members
/// is dropped. Presets that did not reference the id are untouched, including
/// their `updatedAt`.
pub fn cascade_delete(presets: Vec<Preset>, block_element_id: &str, now: &str) -> (Vec<Preset>, CascadeReport) {
    let mut report = CascadeReport::default();
    let mut kept = Vec::with_capacity(presets.len());

    for mut preset in presets {
        if !preset.contains(block_element_id) {
            kept.push(preset);
            continue;
        }
        preset.block_element_ids.retain(|id| id != block_element_id);
        if preset.block_element_ids.is_empty() {
            report.deleted.push(preset.id);
        } else {
            preset.updated_at = now.to_string();
            report.updated.push(preset.id.clone());
            kept.push(preset);
        }
    }

    (kept, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(id: &str, members: &[&str]) -> Preset {
        Preset {
            id: id.to_string(),
            name: id.to_string(),
            block_element_ids: members.iter().map(|m| m.to_string()).collect(),
            enabled: true,
            icon: None,
            created_at: "t0".to_string(),
            updated_at: "t0".to_string(),
        }
    }

    #[test]
    fn test_sole_member_deletes_preset() {
        let (kept, report) = cascade_delete(vec![preset("p1", &["a"]), preset("p2", &["b"])], "a", "t1");
        assert_eq!(kept, vec![preset("p2", &["b"])]);
        assert_eq!(report.deleted, vec!["p1".to_string()]);
        assert!(report.updated.is_empty());
    }

    #[test]
    fn test_shared_member_is_stripped() {
        let (kept, report) = cascade_delete(vec![preset("p1", &["a", "b", "c"])], "b", "t1");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].block_element_ids, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(kept[0].updated_at, "t1");
        assert_eq!(report.updated, vec!["p1".to_string()]);
    }

    #[test]
    fn test_unreferenced_id_is_a_no_op() {
        let presets = vec![preset("p1", &["a"])];
        let (kept, report) = cascade_delete(presets.clone(), "zzz", "t1");
        assert_eq!(kept, presets);
        assert!(report.is_empty());
    }
}
