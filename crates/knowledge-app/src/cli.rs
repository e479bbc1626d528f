//! CLI argument definitions for the Knowledge terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use knowledge_core::config::{KnowledgeConfig, ResolverBackend};
use knowledge_core::types::SubmissionPolicy;

/// Knowledge: ask study questions from the terminal.
#[derive(Parser, Debug)]
#[command(name = "knowledge", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Answer backend.
    #[arg(long = "resolver", value_parser = ["demo", "http"])]
    pub resolver: Option<String>,

    /// Answering service URL for the http backend.
    #[arg(long = "endpoint")]
    pub endpoint: Option<String>,

    /// Refuse new questions while an answer is pending.
    #[arg(long = "single-flight")]
    pub single_flight: bool,

    /// Disable speech input and output.
    #[arg(long = "no-speech")]
    pub no_speech: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > KNOWLEDGE_CONFIG env var > ~/.knowledge/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("KNOWLEDGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value. `RUST_LOG` beats both
    /// and is handled by the subscriber's env filter.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    fn resolve_backend(&self) -> Option<ResolverBackend> {
        match self.resolver.as_deref() {
            Some("http") => Some(ResolverBackend::Http),
            Some("demo") => Some(ResolverBackend::Demo),
            _ => None,
        }
    }

    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut KnowledgeConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(backend) = self.resolve_backend() {
            config.resolver.backend = backend;
        }
        if let Some(endpoint) = &self.endpoint {
            config.resolver.endpoint = endpoint.clone();
        }
        if self.single_flight {
            config.chat.submission_policy = SubmissionPolicy::SingleFlight;
        }
        if self.no_speech {
            config.speech.enabled = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".knowledge").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".knowledge").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let args = CliArgs::parse_from([
            "knowledge",
            "--resolver",
            "http",
            "--endpoint",
            "http://localhost:9000/api/ask",
            "--single-flight",
            "--no-speech",
            "-l",
            "debug",
        ]);
        let mut config = KnowledgeConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.resolver.backend, ResolverBackend::Http);
        assert_eq!(config.resolver.endpoint, "http://localhost:9000/api/ask");
        assert_eq!(config.chat.submission_policy, SubmissionPolicy::SingleFlight);
        assert!(!config.speech.enabled);
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = CliArgs::parse_from(["knowledge"]);
        let mut config = KnowledgeConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.resolver.backend, ResolverBackend::Demo);
        assert_eq!(config.chat.submission_policy, SubmissionPolicy::Concurrent);
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::parse_from(["knowledge", "-c", "/tmp/k.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/k.toml"));
    }

    #[test]
    fn test_unknown_resolver_rejected() {
        assert!(CliArgs::try_parse_from(["knowledge", "--resolver", "oracle"]).is_err());
    }
}
