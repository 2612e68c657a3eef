//! Editor settings
//!
//! Settings are stored as JSON. Input that cannot be read falls back to the
//! defaults with a warning, the same way a broken settings file is treated.

use crate::Result;
use math::AttachPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings container
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorSettings {
    /// Math editing settings
    pub math: MathSettings,
    /// Cursor and history settings
    pub cursor: CursorSettings,
}

/// Math editing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MathSettings {
    /// Whether a macro created by typing pulls the following atoms in as
    /// its arguments
    pub greedy_interactive_macros: bool,
    /// Bound on nested macro expansion
    pub max_macro_depth: usize,
    /// How macro instances with arguments are edited
    pub macro_edit_style: MacroEditStyle,
    /// Whether load and paste keep parse diagnostics out of the log
    pub quiet_parse: bool,
}

impl Default for MathSettings {
    fn default() -> Self {
        Self {
            greedy_interactive_macros: false,
            max_macro_depth: math::macros::DEFAULT_MAX_DEPTH,
            macro_edit_style: MacroEditStyle::Inline,
            quiet_parse: false,
        }
    }
}

impl MathSettings {
    /// Attachment policy for interactively created macros
    pub fn attach_policy(&self) -> AttachPolicy {
        if self.greedy_interactive_macros {
            AttachPolicy::Greedy
        } else {
            AttachPolicy::NonGreedy
        }
    }
}

/// Editing representation of macro instances
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MacroEditStyle {
    /// Arguments are edited in place inside the expansion
    #[default]
    Inline,
    /// Arguments are edited as a list under the macro name
    List,
}

/// Cursor and history settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CursorSettings {
    /// Left/right follow screen order in mixed-direction text
    pub visual_movement: bool,
    /// Maximum number of undo steps kept
    pub undo_limit: usize,
}

impl Default for CursorSettings {
    fn default() -> Self {
        Self {
            visual_movement: true,
            undo_limit: 100,
        }
    }
}

impl EditorSettings {
    /// Parse settings, falling back to defaults on bad input
    pub fn from_json_str(json: &str) -> Self {
        match serde_json::from_str::<EditorSettings>(json) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to parse settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a file; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&content))
    }

    /// Save settings to a file, creating its directory
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EditorSettings::default();
        assert!(!settings.math.greedy_interactive_macros);
        assert_eq!(settings.math.max_macro_depth, 32);
        assert_eq!(settings.math.attach_policy(), AttachPolicy::NonGreedy);
        assert!(settings.cursor.visual_movement);
        assert_eq!(settings.cursor.undo_limit, 100);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut settings = EditorSettings::default();
        settings.math.macro_edit_style = MacroEditStyle::List;
        settings.cursor.undo_limit = 7;
        let json = settings.to_json_string().unwrap();
        assert!(json.contains("\"list\""));
        assert_eq!(EditorSettings::from_json_str(&json), settings);
    }

    #[test]
    fn test_partial_and_broken_input() {
        let partial = EditorSettings::from_json_str(r#"{"math": {"greedy_interactive_macros": true}}"#);
        assert!(partial.math.greedy_interactive_macros);
        assert_eq!(partial.math.max_macro_depth, 32);
        assert_eq!(partial.cursor, CursorSettings::default());

        assert_eq!(EditorSettings::from_json_str("not json"), EditorSettings::default());
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("math-editor-settings-missing").join("none.json");
        assert_eq!(EditorSettings::load(&path).unwrap(), EditorSettings::default());
    }
}
