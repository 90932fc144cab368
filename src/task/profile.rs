//! User profile context used to tailor extraction.

use serde::{Deserialize, Serialize};

/// What the extractor knows about the person whose text it is reading.
///
/// Deserializes from the stored profile-analysis document; every field is
/// optional and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, alias = "user_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub work_style: Option<String>,
    #[serde(default)]
    pub preferred_task_types: Vec<String>,
}

impl UserProfile {
    /// True when no field carries anything worth putting in a prompt.
    pub fn is_empty(&self) -> bool {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map_or(true, |s| s.trim().is_empty())
        }

        blank(&self.name)
            && blank(&self.role)
            && blank(&self.work_style)
            && self.skills.iter().all(|s| s.trim().is_empty())
            && self.interests.iter().all(|s| s.trim().is_empty())
            && self.preferred_task_types.iter().all(|s| s.trim().is_empty())
    }
}
