use serde::{Deserialize, Serialize};

/// The only labels the scanner ever reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCategory {
    Toolbox,
    FireExtinguisher,
    OxygenTank,
}

impl TargetCategory {
    /// All categories in reporting order.
    pub const ALL: [TargetCategory; 3] = [
        TargetCategory::Toolbox,
        TargetCategory::FireExtinguisher,
        TargetCategory::OxygenTank,
    ];

    /// Wire name, as serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetCategory::Toolbox => "toolbox",
            TargetCategory::FireExtinguisher => "fire_extinguisher",
            TargetCategory::OxygenTank => "oxygen_tank",
        }
    }

    /// Human-readable name ("fire extinguisher").
    pub fn display_name(self) -> &'static str {
        match self {
            TargetCategory::Toolbox => "toolbox",
            TargetCategory::FireExtinguisher => "fire extinguisher",
            TargetCategory::OxygenTank => "oxygen tank",
        }
    }
}

impl std::fmt::Display for TargetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
