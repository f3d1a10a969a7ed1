// sprig-common/src/model/manpage.rs
// Structured manual page definition; rendered to roff by sprig-core's docs module.

use serde::{Deserialize, Serialize};

fn default_section() -> u8 {
    1
}

fn default_exit_status() -> Vec<ExitStatusEntry> {
    vec![
        ExitStatusEntry {
            code: 0,
            meaning: "Successful completion".to_string(),
        },
        ExitStatusEntry {
            code: 1,
            meaning: "General error or user cancellation".to_string(),
        },
    ]
}

/// A term/description pair (`.TP` block).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManEntry {
    pub term: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatusEntry {
    pub code: i32,
    pub meaning: String,
}

/// Where an extra section is placed within the fixed page structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionAnchor {
    Description,
    Commands,
    Files,
    #[default]
    Examples,
    ExitStatus,
}

/// A free-form section such as "INTERACTIVE CONTROLS" or "NOTES".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManSection {
    pub title: String,
    #[serde(default)]
    pub after: SectionAnchor,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    /// Bullet list rendered after the paragraphs.
    #[serde(default)]
    pub items: Vec<String>,
    /// Number the list (`1.`, `2.`, ...) instead of bulleting it.
    #[serde(default)]
    pub numbered: bool,
    #[serde(default)]
    pub entries: Vec<ManEntry>,
    /// Paragraphs rendered after the bullet list.
    #[serde(default)]
    pub trailer: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManPage {
    #[serde(default = "default_section")]
    pub section: u8,
    /// One-line summary for the NAME section.
    pub summary: String,
    /// Arguments shown after the program name in SYNOPSIS.
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub options: Vec<ManEntry>,
    /// Rendered under the `commands_title` heading (COMMANDS, MODULES, ...).
    #[serde(default)]
    pub commands: Vec<ManEntry>,
    #[serde(default)]
    pub commands_title: Option<String>,
    #[serde(default)]
    pub files: Vec<ManEntry>,
    #[serde(default)]
    pub examples: Vec<ManEntry>,
    #[serde(default)]
    pub sections: Vec<ManSection>,
    #[serde(default = "default_exit_status")]
    pub exit_status: Vec<ExitStatusEntry>,
    #[serde(default)]
    pub see_also: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Bug-report link.
    #[serde(default)]
    pub bugs: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
}

impl ManPage {
    pub fn sections_after(&self, anchor: SectionAnchor) -> impl Iterator<Item = &ManSection> {
        self.sections.iter().filter(move |s| s.after == anchor)
    }
}
