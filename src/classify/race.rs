//! Race codes found in character and equipment paths (`c0101`, `c1401`, ...)

/// A playable or NPC race/gender combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Race {
    pub code: &'static str,
    pub name: &'static str,
}

/// Known race codes.
pub const RACES: &[Race] = &[
    Race { code: "0101", name: "Hyur Midlander Male" },
    Race { code: "0104", name: "Hyur Midlander Male NPC" },
    Race { code: "0201", name: "Hyur Midlander Female" },
    Race { code: "0204", name: "Hyur Midlander Female NPC" },
    Race { code: "0301", name: "Hyur Highlander Male" },
    Race { code: "0304", name: "Hyur Highlander Male NPC" },
    Race { code: "0401", name: "Hyur Highlander Female" },
    Race { code: "0404", name: "Hyur Highlander Female NPC" },
    Race { code: "0501", name: "Elezen Male" },
    Race { code: "0504", name: "Elezen Male NPC" },
    Race { code: "0601", name: "Elezen Female" },
    Race { code: "0604", name: "Elezen Female NPC" },
    Race { code: "0701", name: "Miqo'te Male" },
    Race { code: "0704", name: "Miqo'te Male NPC" },
    Race { code: "0801", name: "Miqo'te Female" },
    Race { code: "0804", name: "Miqo'te Female NPC" },
    Race { code: "0901", name: "Roegadyn Male" },
    Race { code: "0904", name: "Roegadyn Male NPC" },
    Race { code: "1001", name: "Roegadyn Female" },
    Race { code: "1004", name: "Roegadyn Female NPC" },
    Race { code: "1101", name: "Lalafell Male" },
    Race { code: "1104", name: "Lalafell Male NPC" },
    Race { code: "1201", name: "Lalafell Female" },
    Race { code: "1204", name: "Lalafell Female NPC" },
    Race { code: "1301", name: "Au Ra Male" },
    Race { code: "1304", name: "Au Ra Male NPC" },
    Race { code: "1401", name: "Au Ra Female" },
    Race { code: "1404", name: "Au Ra Female NPC" },
    Race { code: "1501", name: "Hrothgar" },
    Race { code: "1504", name: "Hrothgar NPC" },
    Race { code: "1801", name: "Viera" },
    Race { code: "1804", name: "Viera NPC" },
    Race { code: "9104", name: "NPC Male Child" },
    Race { code: "9204", name: "NPC Female Child" },
    Race { code: "0000", name: "All" },
];

/// Label used when a code is well-formed but not in the table
pub const UNKNOWN_RACE: &str = "Unknown";

impl Race {
    /// Look up a 4-character race code
    pub fn from_code(code: &str) -> Option<Race> {
        RACES.iter().copied().find(|race| race.code == code)
    }

    /// Display name for a code, falling back to `Unknown`
    pub fn display_name(code: &str) -> &'static str {
        Self::from_code(code).map(|race| race.name).unwrap_or(UNKNOWN_RACE)
    }
}
