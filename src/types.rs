use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Name of the export the dialog registry is stored under.
    pub registry: String,
    pub module_format: ModuleFormat,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            registry: "dialogs".to_string(),
            module_format: ModuleFormat::default(),
        }
    }
}

impl CompileOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// What the generated module attaches its registry to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// `exports`, for CommonJS loaders.
    #[default]
    CommonJs,
    /// `globalThis`, for plain `<script>` inclusion.
    Global,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        assert_eq!(CompileOptions::from_json("{}").unwrap(), CompileOptions::default());

        let options = CompileOptions::from_json(r#"{"module_format": "global"}"#).unwrap();
        assert_eq!(options.registry, "dialogs");
        assert_eq!(options.module_format, ModuleFormat::Global);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(CompileOptions::from_json(r#"{"registy": "talk"}"#).is_err());
        assert!(CompileOptions::from_json(r#"{"module_format": "esm"}"#).is_err());
    }
}
