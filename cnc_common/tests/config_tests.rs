//! machine.toml loading tests.
//!
//! Tests for `MachineConfig` through `ConfigLoader`: defaults, board
//! entries, options tables handed through untouched, and validation of
//! names, period and board count.

use cnc_common::config::{ConfigError, ConfigLoader, LogLevel};
use cnc_common::consts::{DEFAULT_PERIOD_NS, MAX_BOARDS};
use cnc_common::hal::config::{Access, MachineConfig};
use cnc_common::hal::driver::HalError;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write `content` as machine.toml in `dir`.
fn write_machine_toml(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("machine.toml");
    fs::write(&path, content).unwrap();
    path
}

/// `n` boards named `stg.0` .. with no options.
fn boards_toml(n: usize) -> String {
    (0..n)
        .map(|i| format!("[[boards]]\nname = \"stg.{i}\"\nfamily = \"stg\"\naddress = {}\n\n", 0x200 + 0x40 * i))
        .collect()
}

#[test]
fn test_full_machine_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_machine_toml(
        &dir,
        r#"
period_ns = 500000

[shared]
service_name = "lathe"
log_level = "warn"

[[boards]]
name = "parport.0"
family = "parport"
address = 0x378

[boards.options]
data_dir = "in"

[[boards]]
name = "motenc.0"
family = "motenc"
address = 0xfeb00000
access = "mmio"
"#,
    );

    let config = MachineConfig::load(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(config.period_ns, 500_000);
    assert_eq!(config.shared.service_name, "lathe");
    assert_eq!(config.shared.log_level, LogLevel::Warn);
    assert_eq!(config.boards.len(), 2);

    let parport = &config.boards[0];
    assert_eq!(parport.address, 0x378);
    assert_eq!(parport.access, Access::Port);
    assert_eq!(parport.options.get("data_dir").and_then(|v| v.as_str()), Some("in"));

    let motenc = &config.boards[1];
    assert_eq!(motenc.access, Access::Mmio);
    assert!(motenc.options.is_empty());
}

#[test]
fn test_empty_file_takes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_machine_toml(&dir, "");
    let config = MachineConfig::load(&path).unwrap();

    assert_eq!(config.period_ns, DEFAULT_PERIOD_NS);
    assert_eq!(config.shared.log_level, LogLevel::Info);
    assert!(config.boards.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = MachineConfig::load(&dir.path().join("machine.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn test_syntax_and_type_errors() {
    for bad in ["period_ns = ", "period_ns = \"1ms\"", "[[boards]]\nname = \"x\"", "boards = 3"] {
        assert!(
            matches!(MachineConfig::parse(bad), Err(ConfigError::ParseError(_))),
            "{bad:?} should not parse"
        );
    }
}

#[test]
fn test_validation_rules() {
    let zero_period = MachineConfig::parse("period_ns = 0").unwrap();
    assert!(matches!(zero_period.validate(), Err(HalError::ConfigError(_))));

    let duplicate = MachineConfig::parse(&format!("{}{}", boards_toml(1), boards_toml(1))).unwrap();
    assert!(matches!(duplicate.validate(), Err(HalError::ConfigError(_))));

    let spaced = MachineConfig::parse("[[boards]]\nname = \"stg 0\"\nfamily = \"stg\"").unwrap();
    assert!(matches!(spaced.validate(), Err(HalError::ConfigError(_))));

    let no_family = MachineConfig::parse("[[boards]]\nname = \"stg.0\"\nfamily = \"\"").unwrap();
    assert!(matches!(no_family.validate(), Err(HalError::ConfigError(_))));

    let no_service = MachineConfig::parse("[shared]\nservice_name = \"\"").unwrap();
    assert!(matches!(no_service.validate(), Err(HalError::ConfigError(_))));
}

#[test]
fn test_board_count_limit() {
    let at_limit = MachineConfig::parse(&boards_toml(MAX_BOARDS)).unwrap();
    assert!(at_limit.validate().is_ok());

    let over = MachineConfig::parse(&boards_toml(MAX_BOARDS + 1)).unwrap();
    assert!(matches!(over.validate(), Err(HalError::ConfigError(_))));
}

#[test]
fn test_board_options_deserialize_per_family() {
    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Opts {
        channels: usize,
        dio_dirs: String,
    }

    let config = MachineConfig::parse(
        r#"
[[boards]]
name = "stg.0"
family = "stg"

[boards.options]
channels = 4
dio_dirs = "IOIO"
"#,
    )
    .unwrap();

    let opts: Opts = config.boards[0].options().unwrap();
    assert_eq!(opts, Opts { channels: 4, dio_dirs: "IOIO".to_string() });

    let mut extra = config.boards[0].clone();
    extra.options.insert("turbo".to_string(), toml::Value::Boolean(true));
    assert!(matches!(extra.options::<Opts>(), Err(HalError::ConfigError(_))));
}
