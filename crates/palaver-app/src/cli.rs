//! CLI argument definitions for the Palaver client.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PALAVER_CONFIG";
/// Environment variable overriding the backend base URL.
pub const API_URL_ENV: &str = "PALAVER_API_URL";

/// Palaver - a terminal chat client for a remote assistant, with optional speech.
#[derive(Parser, Debug)]
#[command(name = "palaver", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the assistant backend.
    #[arg(short = 'u', long = "api-url")]
    pub api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Do not speak replies aloud.
    #[arg(long = "no-voice")]
    pub no_voice: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PALAVER_CONFIG env var > platform default (~/.palaver/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --api-url flag > PALAVER_API_URL env var > config file value.
    pub fn resolve_api_url(&self, config_url: &str) -> String {
        pick_api_url(
            self.api_url.as_deref(),
            std::env::var(API_URL_ENV).ok().as_deref(),
            config_url,
        )
    }

    /// Resolve the log filter.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            if !filter.trim().is_empty() {
                return filter;
            }
        }
        config_level.to_string()
    }

    /// Whether replies should be spoken, given the config value.
    pub fn resolve_voice_output(&self, config_enabled: bool) -> bool {
        config_enabled && !self.no_voice
    }
}

fn pick_api_url(flag: Option<&str>, env: Option<&str>, config_url: &str) -> String {
    flag.or(env)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(config_url)
        .to_string()
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".palaver").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".palaver").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("palaver").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_flags() {
        let args = parse(&[
            "--config",
            "/tmp/p.toml",
            "--api-url",
            "http://10.0.0.2:8080",
            "-l",
            "debug",
            "--no-voice",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/p.toml")));
        assert_eq!(args.api_url.as_deref(), Some("http://10.0.0.2:8080"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.no_voice);
    }

    #[test]
    fn test_config_flag_wins() {
        let args = parse(&["-c", "custom.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("custom.toml"));
    }

    #[test]
    fn test_api_url_priority() {
        assert_eq!(
            pick_api_url(Some("http://flag"), Some("http://env"), "http://config"),
            "http://flag"
        );
        assert_eq!(
            pick_api_url(None, Some("http://env"), "http://config"),
            "http://env"
        );
        assert_eq!(pick_api_url(None, None, "http://config"), "http://config");
        assert_eq!(pick_api_url(None, Some("  "), "http://config"), "http://config");
    }

    #[test]
    fn test_log_level_flag_wins() {
        let args = parse(&["--log-level", "trace"]);
        assert_eq!(args.resolve_log_filter("info"), "trace");
    }

    #[test]
    fn test_no_voice_overrides_config() {
        assert!(!parse(&["--no-voice"]).resolve_voice_output(true));
        assert!(parse(&[]).resolve_voice_output(true));
        assert!(!parse(&[]).resolve_voice_output(false));
    }
}
