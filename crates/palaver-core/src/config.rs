use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PalaverError, Result};
use crate::types::DEFAULT_TIME_FORMAT;

/// Top-level configuration for the Palaver client.
///
/// Loaded from `~/.palaver/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PalaverConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl PalaverConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PalaverConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PalaverError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check values that serde cannot express as types.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.base_url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(PalaverError::Config(format!(
                "backend.base_url must start with http:// or https://, got '{}'",
                self.backend.base_url
            )));
        }
        if self.voice.locale.trim().is_empty() {
            return Err(PalaverError::Config(
                "voice.locale must not be empty".to_string(),
            ));
        }
        for (name, command) in [
            ("voice.stt_command", &self.voice.stt_command),
            ("voice.tts_command", &self.voice.tts_command),
        ] {
            if let Some(cmd) = command {
                if cmd.program.trim().is_empty() {
                    return Err(PalaverError::Config(format!(
                        "{}.program must not be empty",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Assistant backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the assistant service, without a trailing path.
    pub base_url: String,
    /// Path of the chat exchange endpoint.
    pub chat_path: String,
    /// Request timeout in seconds. `0` disables the timeout.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            chat_path: "/api/chat".to_string(),
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    /// Full URL of the chat exchange endpoint.
    pub fn chat_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = self.chat_path.trim();
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// External program used as a speech device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Speech capture and playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// BCP 47 locale passed to both speech devices.
    pub locale: String,
    /// Speak assistant replies aloud.
    pub output_enabled: bool,
    /// Submit a recognized transcript immediately instead of leaving it in the draft.
    pub auto_submit_transcripts: bool,
    /// Speech-to-text program. Prints one transcript line on stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_command: Option<CommandConfig>,
    /// Text-to-speech program. Receives the text to speak on stdin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_command: Option<CommandConfig>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            output_enabled: true,
            auto_submit_transcripts: false,
            stt_command: None,
            tts_command: None,
        }
    }
}

/// Rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// `strftime` pattern for message timestamps.
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = PalaverConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.backend.base_url, "http://localhost:8080");
        assert_eq!(config.backend.chat_path, "/api/chat");
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(config.voice.locale, "en-US");
        assert!(config.voice.output_enabled);
        assert!(!config.voice.auto_submit_transcripts);
        assert!(config.voice.stt_command.is_none());
        assert!(config.voice.tts_command.is_none());
        assert_eq!(config.display.time_format, "%I:%M %p");
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[backend]
base_url = "https://assistant.example.com"
chat_path = "/v2/chat"
timeout_secs = 15

[voice]
locale = "en-GB"
output_enabled = false
auto_submit_transcripts = true

[voice.tts_command]
program = "espeak"
args = ["-v", "en-gb"]

[display]
time_format = "%H:%M"
"#;
        let file = create_temp_config(content);
        let config = PalaverConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.backend.base_url, "https://assistant.example.com");
        assert_eq!(config.backend.timeout_secs, 15);
        assert_eq!(config.voice.locale, "en-GB");
        assert!(!config.voice.output_enabled);
        assert!(config.voice.auto_submit_transcripts);
        let tts = config.voice.tts_command.unwrap();
        assert_eq!(tts.program, "espeak");
        assert_eq!(tts.args, vec!["-v".to_string(), "en-gb".to_string()]);
        assert_eq!(config.display.time_format, "%H:%M");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[backend]
base_url = "http://10.0.0.5:5000"
"#;
        let file = create_temp_config(content);
        let config = PalaverConfig::load(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://10.0.0.5:5000");
        assert_eq!(config.backend.chat_path, "/api/chat");
        assert_eq!(config.voice.locale, "en-US");
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = PalaverConfig::load(file.path()).unwrap();
        assert_eq!(config.backend.chat_url(), "http://localhost:8080/api/chat");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = PalaverConfig::load_or_default(Path::new("/nonexistent/palaver.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = PalaverConfig::load(file.path());
        assert!(matches!(result, Err(PalaverError::Config(_))));
    }

    #[test]
    fn test_load_rejects_non_http_base_url() {
        let file = create_temp_config("[backend]\nbase_url = \"ftp://example.com\"\n");
        let err = PalaverConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("backend.base_url"));
    }

    #[test]
    fn test_load_rejects_empty_command_program() {
        let file = create_temp_config("[voice.stt_command]\nprogram = \"  \"\n");
        let err = PalaverConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("voice.stt_command.program"));
    }

    #[test]
    fn test_load_rejects_empty_locale() {
        let file = create_temp_config("[voice]\nlocale = \"\"\n");
        assert!(PalaverConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PalaverConfig::default();
        config.backend.base_url = "https://chat.internal".to_string();
        config.voice.stt_command = Some(CommandConfig {
            program: "whisper-listen".to_string(),
            args: vec!["--once".to_string()],
        });
        config.save(&path).unwrap();

        let loaded = PalaverConfig::load(&path).unwrap();
        assert_eq!(loaded.backend.base_url, "https://chat.internal");
        assert_eq!(loaded.voice.stt_command, config.voice.stt_command);
        assert!(loaded.voice.tts_command.is_none());
    }

    #[test]
    fn test_chat_url_joins_slashes() {
        let mut backend = BackendConfig::default();
        backend.base_url = "http://host:3000/".to_string();
        assert_eq!(backend.chat_url(), "http://host:3000/api/chat");

        backend.chat_path = "chat".to_string();
        assert_eq!(backend.chat_url(), "http://host:3000/chat");

        backend.chat_path = String::new();
        assert_eq!(backend.chat_url(), "http://host:3000");
    }
}
