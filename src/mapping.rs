//! Detector vocabulary → target category mapping.
//!
//! Upstream detectors speak a generic vocabulary (COCO classes, free-text
//! names). `CategoryMapping` folds that vocabulary onto the three target
//! categories. Rules are tried in priority order and the first match wins:
//!
//! 1. A target category name appears in the lowercased raw label.
//! 2. The raw class id is listed in the id table.
//! 3. The lowercased raw label contains a synonym of a category.
//!
//! Anything else is unmapped and must be dropped by the caller.

use std::sync::OnceLock;

use crate::category::TargetCategory;

/// Class ids (COCO numbering) folded onto target categories.
const CLASS_ID_TABLE: &[(i64, TargetCategory)] = &[
    // container-like
    (24, TargetCategory::Toolbox),
    (26, TargetCategory::Toolbox),
    (28, TargetCategory::Toolbox),
    (33, TargetCategory::Toolbox),
    (73, TargetCategory::Toolbox),
    // cylinder-like
    (39, TargetCategory::FireExtinguisher),
    (41, TargetCategory::FireExtinguisher),
    (44, TargetCategory::FireExtinguisher),
    (76, TargetCategory::FireExtinguisher),
    // round
    (32, TargetCategory::OxygenTank),
    (45, TargetCategory::OxygenTank),
];

const SYNONYM_TABLE: &[(TargetCategory, &[&str])] = &[
    (
        TargetCategory::Toolbox,
        &["tool", "box", "container", "kit", "bag"],
    ),
    (
        TargetCategory::FireExtinguisher,
        &["fire", "extinguisher", "bottle", "cylinder"],
    ),
    (
        TargetCategory::OxygenTank,
        &["oxygen", "tank", "gas", "canister", "tube"],
    ),
];

/// Which rule produced a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchRule {
    DirectName,
    ClassId,
    Synonym,
}

/// Result of mapping a raw detector class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mapped {
    Target {
        category: TargetCategory,
        rule: MatchRule,
    },
    Unmapped,
}

impl Mapped {
    pub fn category(self) -> Option<TargetCategory> {
        match self {
            Mapped::Target { category, .. } => Some(category),
            Mapped::Unmapped => None,
        }
    }
}

/// Immutable, priority-ordered mapping rules.
#[derive(Clone, Debug)]
pub struct CategoryMapping {
    class_ids: Vec<(i64, TargetCategory)>,
    synonyms: Vec<(TargetCategory, Vec<&'static str>)>,
}

impl CategoryMapping {
    /// Builds the built-in rule set.
    pub fn new() -> Self {
        Self {
            class_ids: CLASS_ID_TABLE.to_vec(),
            synonyms: SYNONYM_TABLE
                .iter()
                .map(|(category, words)| (*category, words.to_vec()))
                .collect(),
        }
    }

    /// Shared process-wide instance. Never mutated after first use.
    pub fn shared() -> &'static CategoryMapping {
        static MAPPING: OnceLock<CategoryMapping> = OnceLock::new();
        MAPPING.get_or_init(CategoryMapping::new)
    }

    /// Maps a raw label and optional class id onto a target category.
    pub fn map(&self, raw_label: &str, raw_class_id: Option<i64>) -> Mapped {
        let lowered = raw_label.to_lowercase();

        for category in TargetCategory::ALL {
            if lowered.contains(category.display_name()) || lowered.contains(category.as_str()) {
                return Mapped::Target {
                    category,
                    rule: MatchRule::DirectName,
                };
            }
        }

        if let Some(id) = raw_class_id {
            if let Some((_, category)) = self.class_ids.iter().find(|(known, _)| *known == id) {
                return Mapped::Target {
                    category: *category,
                    rule: MatchRule::ClassId,
                };
            }
        }

        for (category, words) in &self.synonyms {
            if words.iter().any(|word| lowered.contains(word)) {
                return Mapped::Target {
                    category: *category,
                    rule: MatchRule::Synonym,
                };
            }
        }

        Mapped::Unmapped
    }
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_name_wins_over_class_id() {
        let mapping = CategoryMapping::new();
        let mapped = mapping.map("Oxygen Tank (spare)", Some(28));
        assert_eq!(
            mapped,
            Mapped::Target {
                category: TargetCategory::OxygenTank,
                rule: MatchRule::DirectName,
            }
        );
        assert_eq!(
            mapping.map("fire_extinguisher", None).category(),
            Some(TargetCategory::FireExtinguisher)
        );
    }

    #[test]
    fn class_id_table_is_consulted_before_synonyms() {
        let mapping = CategoryMapping::new();
        let mapped = mapping.map("suitcase", Some(28));
        assert_eq!(
            mapped,
            Mapped::Target {
                category: TargetCategory::Toolbox,
                rule: MatchRule::ClassId,
            }
        );
        // "sports ball" has no synonym, only the id rule reaches it.
        assert_eq!(
            mapping.map("sports ball", Some(32)).category(),
            Some(TargetCategory::OxygenTank)
        );
        assert_eq!(mapping.map("suitcase", None), Mapped::Unmapped);
    }

    #[test]
    fn bottle_maps_through_synonym() {
        let mapping = CategoryMapping::new();
        let mapped = mapping.map("bottle", Some(999));
        assert_eq!(
            mapped,
            Mapped::Target {
                category: TargetCategory::FireExtinguisher,
                rule: MatchRule::Synonym,
            }
        );
    }

    #[test]
    fn unknown_classes_stay_unmapped() {
        let mapping = CategoryMapping::new();
        assert_eq!(mapping.map("person", Some(0)), Mapped::Unmapped);
        assert_eq!(mapping.map("", None), Mapped::Unmapped);
    }

    #[test]
    fn mapping_is_stable_across_calls() {
        let mapping = CategoryMapping::shared();
        let inputs = [
            ("handbag", Some(26)),
            ("gas canister", None),
            ("Toolkit", None),
            ("dog", Some(16)),
        ];
        for (label, id) in inputs {
            let first = mapping.map(label, id);
            for _ in 0..5 {
                assert_eq!(mapping.map(label, id), first);
            }
        }
    }
}
