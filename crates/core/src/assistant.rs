//! Assistant identifiers.
//!
//! Each assistant owns an independent quota namespace, transcript, and
//! continuity record. The string form is the storage key.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantId {
    /// Research-capable assistant (web search, documents, code interpreter).
    Nora,
    /// Coaching-only assistant.
    Patrick,
}

impl AssistantId {
    pub const ALL: [AssistantId; 2] = [AssistantId::Nora, AssistantId::Patrick];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nora => "nora",
            Self::Patrick => "patrick",
        }
    }

    /// The persona name shown to students.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Nora => "Nora",
            Self::Patrick => "Patrick",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nora" => Some(Self::Nora),
            "patrick" => Some(Self::Patrick),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssistantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(AssistantId::parse("Nora"), Some(AssistantId::Nora));
        assert_eq!(AssistantId::parse(" PATRICK "), Some(AssistantId::Patrick));
        assert_eq!(AssistantId::parse("whisper"), None);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&AssistantId::Patrick).unwrap();
        assert_eq!(json, "\"patrick\"");
    }
}
