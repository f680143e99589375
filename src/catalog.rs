use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefectCategory {
    pub id: i64,
    pub name: &'static str,
}

pub const DEFECT_CATEGORIES: [DefectCategory; 5] = [
    DefectCategory {
        id: 1,
        name: "Incorrect Colors",
    },
    DefectCategory {
        id: 2,
        name: "Damage",
    },
    DefectCategory {
        id: 3,
        name: "Print Errors",
    },
    DefectCategory {
        id: 4,
        name: "Embroidery Issues",
    },
    DefectCategory { id: 5, name: "Other" },
];

pub fn category_name(id: i64) -> &'static str {
    DEFECT_CATEGORIES
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.name)
        .unwrap_or("Unknown")
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Lenient parse of a server-side severity; unknown values are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteColor {
    pub label: &'static str,
    pub value: &'static str,
}

pub const DEFECT_COLORS: [PaletteColor; 6] = [
    PaletteColor {
        label: "Red",
        value: "#ef4444",
    },
    PaletteColor {
        label: "Orange",
        value: "#f97316",
    },
    PaletteColor {
        label: "Yellow",
        value: "#eab308",
    },
    PaletteColor {
        label: "Green",
        value: "#22c55e",
    },
    PaletteColor {
        label: "Purple",
        value: "#a855f7",
    },
    PaletteColor {
        label: "Pink",
        value: "#ec4899",
    },
];

pub const DEFAULT_STROKE_HEX: &str = "#ef4444";
pub const SELECTED_STROKE_HEX: &str = "#3b82f6";

/// `in_process` -> `In process`.
pub fn format_enum_label(value: &str) -> String {
    let normalized = value.replace('_', " ");
    let mut chars = normalized.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn parse_hex_color(hex: &str) -> Option<egui::Color32> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some(egui::Color32::from_rgb(
        channel(0..2)?,
        channel(2..4)?,
        channel(4..6)?,
    ))
}
