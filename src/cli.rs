//! CLI argument parsing for cnfprobe

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{self, ProbeConfig, ReadMode};

/// Output format for the probe result
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// `(cnfprobe)` header line plus the delimited path list (default)
    Text,
    /// JSON object for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "cnfprobe")]
#[command(version)]
#[command(
    about = "List the option files a MySQL/MariaDB Connector C library actually reads",
    long_about = None
)]
pub struct Cli {
    /// Path of the Connector C shared library (e.g. libmariadb.so)
    #[arg(value_name = "LIBRARY")]
    pub library: PathBuf,

    /// Delimiter between file names: a single character, or one of
    /// newline, comma, colon, semicolon
    #[arg(short = 'd', long = "delimiter", value_name = "CHAR", value_parser = parse_delimiter)]
    pub delimiter: Option<char>,

    /// Let the connector really read the option files (finds !include targets)
    #[arg(long = "read")]
    pub read: bool,

    /// Give up if the library stops making progress for about four seconds
    #[arg(long = "timeout")]
    pub timeout: bool,

    /// File name substring that marks an option file
    #[arg(long = "pattern", value_name = "TEXT", default_value = config::DEFAULT_PATTERN)]
    pub pattern: String,

    /// Maximum size of the path list in bytes
    #[arg(long = "max-list-size", value_name = "BYTES", default_value_t = config::DEFAULT_MAX_LIST_SIZE)]
    pub max_list_size: usize,

    /// Maximum length of a single path in bytes
    #[arg(long = "max-path-len", value_name = "BYTES", default_value_t = config::DEFAULT_MAX_PATH_LEN)]
    pub max_path_len: usize,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Run the library calls without tracing (compare with strace)
    #[arg(long = "tracee-only")]
    pub tracee_only: bool,

    /// Debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Probe configuration from build-time defaults and these flags
    pub fn probe_config(&self) -> ProbeConfig {
        let mut config = ProbeConfig::new()
            .with_pattern(self.pattern.clone())
            .with_max_list_size(self.max_list_size)
            .with_max_path_len(self.max_path_len);
        if let Some(delimiter) = self.delimiter {
            config = config.with_delimiter(delimiter);
        }
        if self.read {
            config = config.with_read_mode(ReadMode::Real);
        }
        if self.timeout {
            config = config.with_timeout();
        }
        config
    }
}

fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "newline" | "\\n" => return Ok('\n'),
        "comma" => return Ok(','),
        "colon" => return Ok(':'),
        "semicolon" => return Ok(';'),
        "tab" | "\\t" => return Ok('\t'),
        _ => {}
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!(
            "expected a single character or newline/comma/colon/semicolon, got {value:?}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_library() {
        let cli = Cli::parse_from(["cnfprobe", "/usr/lib/libmariadb.so"]);
        assert_eq!(cli.library, PathBuf::from("/usr/lib/libmariadb.so"));
        assert!(!cli.read);
        assert!(!cli.timeout);
        assert!(cli.delimiter.is_none());
    }

    #[test]
    fn test_cli_requires_library() {
        assert!(Cli::try_parse_from(["cnfprobe"]).is_err());
    }

    #[test]
    fn test_cli_delimiter_names() {
        let cli = Cli::parse_from(["cnfprobe", "-d", "semicolon", "lib.so"]);
        assert_eq!(cli.delimiter, Some(';'));
        let cli = Cli::parse_from(["cnfprobe", "--delimiter", ",", "lib.so"]);
        assert_eq!(cli.delimiter, Some(','));
        let cli = Cli::parse_from(["cnfprobe", "--delimiter", "newline", "lib.so"]);
        assert_eq!(cli.delimiter, Some('\n'));
    }

    #[test]
    fn test_cli_rejects_long_delimiter() {
        assert!(Cli::try_parse_from(["cnfprobe", "-d", "ab", "lib.so"]).is_err());
        assert!(Cli::try_parse_from(["cnfprobe", "-d", "", "lib.so"]).is_err());
    }

    #[test]
    fn test_cli_builds_config() {
        let cli = Cli::parse_from([
            "cnfprobe",
            "--read",
            "--timeout",
            "-d",
            ":",
            "--pattern",
            ".cnf",
            "--max-list-size",
            "1024",
            "lib.so",
        ]);
        let config = cli.probe_config();
        assert_eq!(config.delimiter, ':');
        assert_eq!(config.read_mode, ReadMode::Real);
        assert!(matches!(
            config.wait_policy,
            crate::config::WaitPolicy::Backoff { .. }
        ));
        assert_eq!(config.pattern, ".cnf");
        assert_eq!(config.max_list_size, 1024);
    }

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let cli = Cli::parse_from(["cnfprobe", "lib.so"]);
        let config = cli.probe_config();
        let defaults = ProbeConfig::new();
        assert_eq!(config.pattern, defaults.pattern);
        assert_eq!(config.max_list_size, defaults.max_list_size);
        assert_eq!(config.max_path_len, defaults.max_path_len);
        assert_eq!(config.read_mode, defaults.read_mode);
        assert_eq!(config.delimiter, defaults.delimiter);
    }
}
