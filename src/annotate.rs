use crate::category::TargetCategory;

pub const DEFAULT_COLOR: &str = "#9c27b0";
pub const DEFAULT_CONTEXT: &str = "Space station component. Monitor for proper functionality.";

/// Display color and advisory note for a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub color: &'static str,
    pub context: &'static str,
}

/// Fixed annotation for a target category.
pub fn annotate(category: TargetCategory) -> Annotation {
    match category {
        TargetCategory::FireExtinguisher => Annotation {
            color: "#f44336",
            context: "Critical safety equipment. Check pressure gauge and ensure easy access.",
        },
        TargetCategory::OxygenTank => Annotation {
            color: "#2196f3",
            context: "Life support equipment. Verify pressure levels and connection integrity.",
        },
        TargetCategory::Toolbox => Annotation {
            color: "#ffc107",
            context: "Equipment storage. Ensure proper organization and inventory completion.",
        },
    }
}

/// Annotation for a free-text label, falling back to the default entry.
pub fn annotate_label(label: &str) -> Annotation {
    let lowered = label.to_lowercase();
    let category = if lowered.contains("fire") || lowered.contains("extinguisher") {
        Some(TargetCategory::FireExtinguisher)
    } else if lowered.contains("oxygen") || lowered.contains("tank") {
        Some(TargetCategory::OxygenTank)
    } else if lowered.contains("tool") || lowered.contains("box") {
        Some(TargetCategory::Toolbox)
    } else {
        None
    };
    category.map(annotate).unwrap_or(Annotation {
        color: DEFAULT_COLOR,
        context: DEFAULT_CONTEXT,
    })
}
