//! Tool configuration management
//!
//! Every setting has a built-in default, so the config file is optional and
//! may set any subset of keys.

use anyhow::{Context, Result, anyhow};
use common::SessionConfig;
use protocol::EepromProtocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub tool: ToolSettings,
    pub usb: UsbSettings,
    /// Vendor request parameters
    pub protocol: EepromProtocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub log_level: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbSettings {
    /// Interface claimed for the control transfers
    pub interface: u8,
    /// Hand the interface back to the kernel driver when done
    pub reattach_kernel_driver: bool,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            interface: 0,
            reattach_kernel_driver: true,
        }
    }
}

impl ToolConfig {
    /// Load configuration from the specified path
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ToolConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        tracing::debug!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load the explicit path, else the first existing standard location,
    /// else the defaults
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::candidates().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Standard config locations, in search order
    pub fn candidates() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/fx2eeprom/config.toml"),
        ]
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("fx2eeprom").join("config.toml")
        } else {
            PathBuf::from(".config/fx2eeprom/config.toml")
        }
    }

    /// Device selection and teardown behavior for a session
    pub fn session_config(&self, vendor_id: u16, product_id: u16) -> SessionConfig {
        SessionConfig {
            vendor_id,
            product_id,
            interface: self.usb.interface,
            reattach_kernel_driver: self.usb.reattach_kernel_driver,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.tool.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.tool.log_level,
                valid_levels.join(", ")
            ));
        }

        self.protocol
            .validate()
            .context("Invalid [protocol] settings")?;

        Ok(())
    }
}

/// Expand `~` in a user-supplied config path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ToolConfig::default();
        assert_eq!(config.tool.log_level, "info");
        assert_eq!(config.usb.interface, 0);
        assert!(config.usb.reattach_kernel_driver);
        assert_eq!(config.protocol, EepromProtocol::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let file = write_config("");
        let config = ToolConfig::load(file.path()).unwrap();
        assert_eq!(config, ToolConfig::default());
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
[tool]
log_level = "debug"

[usb]
interface = 1
reattach_kernel_driver = false

[protocol]
read_request_type = 0xC0
write_request_type = 0x40
request = 0xA3
location = 0x00
timeout_ms = 1000
chunk_size = 1024
"#,
        );
        let config = ToolConfig::load(file.path()).unwrap();

        assert_eq!(config.tool.log_level, "debug");
        assert_eq!(config.usb.interface, 1);
        assert!(!config.usb.reattach_kernel_driver);
        assert_eq!(config.protocol.request, 0xA3);
        assert_eq!(config.protocol.location, 0);
        assert_eq!(config.protocol.timeout_ms, 1000);
        assert_eq!(config.protocol.chunk_size, 1024);
    }

    #[test]
    fn test_partial_protocol_section() {
        let file = write_config("[protocol]\nchunk_size = 512\n");
        let config = ToolConfig::load(file.path()).unwrap();
        assert_eq!(config.protocol.chunk_size, 512);
        assert_eq!(config.protocol.request, 0xA2);
        assert_eq!(config.tool.log_level, "info");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let file = write_config("[tool]\nlog_level = \"loud\"\n");
        assert!(ToolConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_invalid_chunk_size_rejected() {
        let file = write_config("[protocol]\nchunk_size = 0\n");
        let err = ToolConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("chunk_size"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let file = write_config("[tool\n");
        assert!(ToolConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_discover_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(ToolConfig::discover(Some(&missing)).is_err());
    }

    #[test]
    fn test_discover_explicit_file() {
        let file = write_config("[usb]\ninterface = 3\n");
        let config = ToolConfig::discover(Some(file.path())).unwrap();
        assert_eq!(config.usb.interface, 3);
    }

    #[test]
    fn test_session_config() {
        let mut config = ToolConfig::default();
        config.usb.interface = 2;
        let session = config.session_config(0x04b4, 0x8613);
        assert_eq!(session.vendor_id, 0x04b4);
        assert_eq!(session.product_id, 0x8613);
        assert_eq!(session.interface, 2);
        assert!(session.reattach_kernel_driver);
    }

    #[test]
    fn test_config_serialization() {
        let config = ToolConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ToolConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_expand_path_plain() {
        assert_eq!(expand_path("/etc/x.toml"), PathBuf::from("/etc/x.toml"));
    }
}
