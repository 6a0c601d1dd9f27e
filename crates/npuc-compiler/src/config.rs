//! Compiler configuration and device strings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const KEY_COMPILER_TYPE: &str = "NPU_COMPILER_TYPE";
pub const KEY_PLATFORM: &str = "NPU_PLATFORM";
pub const KEY_DRIVER_OPSET: &str = "NPU_DRIVER_OPSET";
pub const KEY_LOG_LEVEL: &str = "LOG_LEVEL";

/// Opset the driver compiler reports when not overridden.
pub const DEFAULT_DRIVER_OPSET: u32 = 10;

/// Device name accepted by [`Device::from_str`].
pub const DEVICE_NPU: &str = "NPU";

/// Errors from parsing configuration options or device strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("expected KEY=VALUE, got '{0}'")]
    Malformed(String),
    #[error("configuration key {0} given more than once")]
    Duplicate(String),
    #[error("unknown device '{0}'")]
    UnknownDevice(String),
}

/// Which compiler turns the graph into a blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompilerType {
    /// Compiler shipped with the NPU driver; supports a limited opset.
    #[default]
    Driver,
    /// Graph compiler linked into the plugin.
    Mlir,
}

impl CompilerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "DRIVER",
            Self::Mlir => "MLIR",
        }
    }
}

impl fmt::Display for CompilerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompilerType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRIVER" => Ok(Self::Driver),
            "MLIR" => Ok(Self::Mlir),
            _ => Err(invalid(KEY_COMPILER_TYPE, s)),
        }
    }
}

/// Target NPU generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Platform {
    #[default]
    AutoDetect,
    Npu3720,
    Npu4000,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoDetect => "AUTO_DETECT",
            Self::Npu3720 => "3720",
            Self::Npu4000 => "4000",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTO_DETECT" => Ok(Self::AutoDetect),
            "3720" | "NPU3720" => Ok(Self::Npu3720),
            "4000" | "NPU4000" => Ok(Self::Npu4000),
            _ => Err(invalid(KEY_PLATFORM, s)),
        }
    }
}

/// Log verbosity option, mapped onto [`log::LevelFilter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LogLevel {
    #[default]
    None,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "LOG_NONE",
            Self::Error => "LOG_ERROR",
            Self::Warning => "LOG_WARNING",
            Self::Info => "LOG_INFO",
            Self::Debug => "LOG_DEBUG",
            Self::Trace => "LOG_TRACE",
        }
    }

    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::None => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warning => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOG_NONE" => Ok(Self::None),
            "LOG_ERROR" => Ok(Self::Error),
            "LOG_WARNING" => Ok(Self::Warning),
            "LOG_INFO" => Ok(Self::Info),
            "LOG_DEBUG" => Ok(Self::Debug),
            "LOG_TRACE" => Ok(Self::Trace),
            _ => Err(invalid(KEY_LOG_LEVEL, s)),
        }
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

/// Immutable compiler configuration.
///
/// Only the options given explicitly are remembered for [`entries`]; the
/// accessors fall back to defaults for the rest.
///
/// [`entries`]: CompilerConfig::entries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerConfig {
    compiler_type: CompilerType,
    platform: Platform,
    driver_opset: u32,
    log_level: LogLevel,
    explicit: BTreeMap<&'static str, String>,
}

impl CompilerConfig {
    /// Default configuration (driver compiler, auto-detected platform).
    pub fn new() -> Self {
        Self {
            compiler_type: CompilerType::default(),
            platform: Platform::default(),
            driver_opset: DEFAULT_DRIVER_OPSET,
            log_level: LogLevel::default(),
            explicit: BTreeMap::new(),
        }
    }

    /// Default configuration with only the compiler type set.
    pub fn with_compiler(compiler_type: CompilerType) -> Self {
        let mut explicit = BTreeMap::new();
        explicit.insert(KEY_COMPILER_TYPE, compiler_type.to_string());
        Self {
            compiler_type,
            explicit,
            ..Self::new()
        }
    }

    /// Build a configuration from `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref().trim(), value.as_ref().trim());
            let key: &'static str = match key {
                KEY_COMPILER_TYPE => {
                    config.compiler_type = value.parse()?;
                    KEY_COMPILER_TYPE
                }
                KEY_PLATFORM => {
                    config.platform = value.parse()?;
                    KEY_PLATFORM
                }
                KEY_DRIVER_OPSET => {
                    config.driver_opset = match value.parse::<u32>() {
                        Ok(n) if n > 0 => n,
                        _ => return Err(invalid(KEY_DRIVER_OPSET, value)),
                    };
                    KEY_DRIVER_OPSET
                }
                KEY_LOG_LEVEL => {
                    config.log_level = value.parse()?;
                    KEY_LOG_LEVEL
                }
                other => return Err(ConfigError::UnknownKey(other.into())),
            };
            if config.explicit.insert(key, value.to_string()).is_some() {
                return Err(ConfigError::Duplicate(key.into()));
            }
        }
        Ok(config)
    }

    /// Build a configuration from `KEY=VALUE` strings.
    pub fn from_options<S: AsRef<str>>(options: &[S]) -> Result<Self, ConfigError> {
        let pairs = options
            .iter()
            .map(|o| parse_option(o.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_pairs(pairs)
    }

    pub fn compiler_type(&self) -> CompilerType {
        self.compiler_type
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Opset the driver compiler reports as supported.
    pub fn driver_opset(&self) -> u32 {
        self.driver_opset
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Explicitly set options in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.explicit.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a `KEY=VALUE` option.
pub fn parse_option(option: &str) -> Result<(String, String), ConfigError> {
    match option.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ConfigError::Malformed(option.into())),
    }
}

/// Target device, `NPU` or `NPU.<platform>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Device {
    pub platform: Option<Platform>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.platform {
            Some(p) => write!(f, "{DEVICE_NPU}.{p}"),
            None => f.write_str(DEVICE_NPU),
        }
    }
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ConfigError::UnknownDevice(s.into());
        match s.split_once('.') {
            None if s == DEVICE_NPU => Ok(Self { platform: None }),
            Some((DEVICE_NPU, platform)) => platform
                .parse()
                .map(|p| Self { platform: Some(p) })
                .map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CompilerConfig::new();
        assert_eq!(config.compiler_type(), CompilerType::Driver);
        assert_eq!(config.platform(), Platform::AutoDetect);
        assert_eq!(config.driver_opset(), DEFAULT_DRIVER_OPSET);
        assert_eq!(config.log_level().to_level_filter(), log::LevelFilter::Off);
        assert_eq!(config.entries().count(), 0);
    }

    #[test]
    fn parses_known_options() {
        let config = CompilerConfig::from_options(&[
            "NPU_PLATFORM=4000",
            "NPU_COMPILER_TYPE=MLIR",
            "LOG_LEVEL=LOG_DEBUG",
            "NPU_DRIVER_OPSET = 9",
        ])
        .unwrap();
        assert_eq!(config.compiler_type(), CompilerType::Mlir);
        assert_eq!(config.platform(), Platform::Npu4000);
        assert_eq!(config.driver_opset(), 9);
        assert_eq!(config.log_level(), LogLevel::Debug);

        let keys: Vec<_> = config.entries().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            [KEY_LOG_LEVEL, KEY_COMPILER_TYPE, KEY_DRIVER_OPSET, KEY_PLATFORM]
        );
    }

    #[test]
    fn rejects_bad_options() {
        assert_eq!(
            CompilerConfig::from_options(&["NPU_COMPILER_TYPE=CLANG"]),
            Err(ConfigError::InvalidValue {
                key: KEY_COMPILER_TYPE.into(),
                value: "CLANG".into()
            })
        );
        assert_eq!(
            CompilerConfig::from_options(&["FOO=1"]),
            Err(ConfigError::UnknownKey("FOO".into()))
        );
        assert_eq!(
            CompilerConfig::from_options(&["NPU_COMPILER_TYPE"]),
            Err(ConfigError::Malformed("NPU_COMPILER_TYPE".into()))
        );
        assert!(matches!(
            CompilerConfig::from_options(&["NPU_DRIVER_OPSET=0"]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            CompilerConfig::from_options(&["NPU_COMPILER_TYPE=MLIR", "NPU_COMPILER_TYPE=DRIVER"]),
            Err(ConfigError::Duplicate(KEY_COMPILER_TYPE.into()))
        );
    }

    #[test]
    fn with_compiler_records_entry() {
        let config = CompilerConfig::with_compiler(CompilerType::Driver);
        let entries: Vec<_> = config.entries().collect();
        assert_eq!(entries, [(KEY_COMPILER_TYPE, "DRIVER")]);
        assert_eq!(config.driver_opset(), DEFAULT_DRIVER_OPSET);
    }

    #[test]
    fn device_strings() {
        assert_eq!("NPU".parse::<Device>().unwrap(), Device { platform: None });
        assert_eq!(
            "NPU.3720".parse::<Device>().unwrap().platform,
            Some(Platform::Npu3720)
        );
        assert_eq!(Device { platform: Some(Platform::Npu4000) }.to_string(), "NPU.4000");
        assert!("GPU".parse::<Device>().is_err());
        assert!("NPU.9999".parse::<Device>().is_err());
        assert!("NPU.".parse::<Device>().is_err());
    }
}
