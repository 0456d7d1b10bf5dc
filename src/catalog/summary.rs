//! Pack overview shown when a pack-level node is selected

use super::record::ModList;
use super::tree::STANDALONE_NAME;
use std::fmt;

const NOT_AVAILABLE: &str = "[ N/A ]";

/// What toggling the whole pack would do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Enable,
    Disable,
}

impl ToggleAction {
    /// Value `enabled` takes when the action is applied
    pub fn target_state(&self) -> bool {
        matches!(self, ToggleAction::Enable)
    }
}

impl fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleAction::Enable => f.write_str("Enable"),
            ToggleAction::Disable => f.write_str("Disable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub title: String,
    pub author: String,
    pub version: String,
    pub record_count: usize,
    pub enabled: usize,
    pub disabled: usize,
    /// (item name, number of records), in first-seen order
    pub contents: Vec<(String, usize)>,
}

impl PackSummary {
    /// Summarize a pack by name. `None` summarizes records that belong to
    /// no pack.
    pub fn collect(list: &ModList, pack: Option<&str>) -> Self {
        let records: Vec<_> = match pack {
            None => list
                .mods
                .iter()
                .filter(|m| !m.name.is_empty() && m.mod_pack.is_none())
                .collect(),
            Some(name) => list
                .mods
                .iter()
                .filter(|m| m.pack_name() == Some(name))
                .collect(),
        };

        let (title, author, version) = match pack {
            None => (
                STANDALONE_NAME.to_string(),
                NOT_AVAILABLE.to_string(),
                NOT_AVAILABLE.to_string(),
            ),
            Some(name) => {
                let info = list
                    .find_pack(name)
                    .cloned()
                    .or_else(|| records.first().and_then(|m| m.mod_pack.clone()))
                    .unwrap_or_default();
                (name.to_string(), info.author, info.version)
            }
        };

        let mut contents: Vec<(String, usize)> = Vec::new();
        let mut enabled = 0;
        for record in &records {
            if record.enabled {
                enabled += 1;
            }
            match contents.iter_mut().find(|(name, _)| *name == record.name) {
                Some((_, count)) => *count += 1,
                None => contents.push((record.name.clone(), 1)),
            }
        }

        Self {
            title,
            author,
            version,
            record_count: records.len(),
            enabled,
            disabled: records.len() - enabled,
            contents,
        }
    }

    /// Disable when most records are enabled, otherwise Enable
    pub fn suggested_action(&self) -> ToggleAction {
        if self.enabled > self.disabled {
            ToggleAction::Disable
        } else {
            ToggleAction::Enable
        }
    }

    /// Content listing, one `[count] name` line per item
    pub fn content_text(&self) -> String {
        self.contents
            .iter()
            .map(|(name, count)| format!("[{}] {}\n", count, name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record::ModPackRef;
    use crate::catalog::tree::tests::{record, sample_records};

    fn sample_list() -> ModList {
        let mut list = ModList {
            mod_packs: vec![ModPackRef {
                name: "Glam Pack".into(),
                author: "Someone".into(),
                version: "2.1".into(),
                url: String::new(),
            }],
            mods: sample_records(),
            ..Default::default()
        };
        list.mods[1].enabled = false;
        list.refresh_counts();
        list
    }

    #[test]
    fn test_pack_summary() {
        let summary = PackSummary::collect(&sample_list(), Some("Glam Pack"));
        assert_eq!(summary.title, "Glam Pack");
        assert_eq!(summary.author, "Someone");
        assert_eq!(summary.version, "2.1");
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.enabled, 2);
        assert_eq!(summary.disabled, 1);
        assert_eq!(summary.content_text(), "[2] Cotton Shirt\n[1] Leather Boots\n");
        assert_eq!(summary.suggested_action(), ToggleAction::Disable);
    }

    #[test]
    fn test_standalone_summary() {
        let summary = PackSummary::collect(&sample_list(), None);
        assert_eq!(summary.title, STANDALONE_NAME);
        assert_eq!(summary.author, NOT_AVAILABLE);
        assert_eq!(summary.record_count, 2);
    }

    #[test]
    fn test_pack_named_like_standalone_is_a_pack() {
        let mut list = sample_list();
        list.mods.push(record(
            "Lamp",
            "Housing",
            "bgcommon/hou/indoor/general/0042/texture/fun_b0_m0042_0a_d.tex",
            Some(STANDALONE_NAME),
        ));

        let summary = PackSummary::collect(&list, Some(STANDALONE_NAME));
        assert_eq!(summary.title, STANDALONE_NAME);
        assert_eq!(summary.author, "author");
        assert_eq!(summary.record_count, 1);
        assert_eq!(summary.content_text(), "[1] Lamp\n");
        assert_eq!(PackSummary::collect(&list, None).record_count, 2);
    }

    #[test]
    fn test_pack_missing_from_table_uses_record_ref() {
        let summary = PackSummary::collect(&sample_list(), Some("Hair Pack"));
        assert_eq!(summary.author, "author");
        assert_eq!(summary.record_count, 1);
    }

    #[test]
    fn test_mostly_disabled_suggests_enable() {
        let mut list = sample_list();
        for m in &mut list.mods {
            m.enabled = false;
        }
        let summary = PackSummary::collect(&list, Some("Glam Pack"));
        assert_eq!(summary.suggested_action(), ToggleAction::Enable);
        assert!(ToggleAction::Enable.target_state());
    }
}
