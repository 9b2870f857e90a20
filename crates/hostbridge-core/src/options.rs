//! Bridge configuration

use serde::Deserialize;

/// Unit name whose types are always treated as tool scripts
pub const DEFAULT_EDITOR_UNIT: &str = "GodotTools";

/// Native class instantiated for static wrapper types
pub const DEFAULT_ROOT_NATIVE_TYPE: &str = "Object";

/// Options for a `ScriptBridge`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Track script types for unload eviction and reload records
    pub reload_enabled: bool,

    /// Units whose types are always tool scripts
    pub editor_units: Vec<String>,

    /// Native class name of the host root object type
    pub root_native_type: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            reload_enabled: true,
            editor_units: vec![DEFAULT_EDITOR_UNIT.to_string()],
            root_native_type: DEFAULT_ROOT_NATIVE_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OptionsDocument {
    #[serde(default)]
    bridge: BridgeOptions,
}

impl BridgeOptions {
    /// Options with unload tracking disabled
    pub fn without_reload() -> Self {
        Self {
            reload_enabled: false,
            ..Default::default()
        }
    }

    /// Parse the `[bridge]` table of a TOML document.
    ///
    /// A missing table or missing keys fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        let document: OptionsDocument = toml::from_str(source)?;
        Ok(document.bridge)
    }

    /// Check whether a unit name is an editor unit
    pub fn is_editor_unit(&self, unit_name: &str) -> bool {
        self.editor_units.iter().any(|name| name == unit_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert!(options.reload_enabled);
        assert!(options.is_editor_unit("GodotTools"));
        assert!(!options.is_editor_unit("Game"));
        assert_eq!(options.root_native_type, "Object");
    }

    #[test]
    fn test_from_toml_partial() {
        let options = BridgeOptions::from_toml_str(
            r#"
            [bridge]
            reload_enabled = false
            "#,
        )
        .unwrap();
        assert!(!options.reload_enabled);
        assert_eq!(options.editor_units, vec!["GodotTools".to_string()]);
    }

    #[test]
    fn test_from_toml_missing_table() {
        let options = BridgeOptions::from_toml_str("[other]\nkey = 1\n").unwrap();
        assert_eq!(options, BridgeOptions::default());
    }

    #[test]
    fn test_from_toml_editor_units() {
        let options = BridgeOptions::from_toml_str(
            r#"
            [bridge]
            editor_units = ["EditorPlugins", "GodotTools"]
            root_native_type = "RefCounted"
            "#,
        )
        .unwrap();
        assert!(options.is_editor_unit("EditorPlugins"));
        assert_eq!(options.root_native_type, "RefCounted");
    }

    #[test]
    fn test_from_toml_rejects_bad_type() {
        assert!(BridgeOptions::from_toml_str("[bridge]\nreload_enabled = \"yes\"\n").is_err());
    }
}
