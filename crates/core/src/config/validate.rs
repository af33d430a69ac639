use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashSet;

use super::{types::Config, ConfigError};

static TRANSFORM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _-]{0,63}$").expect("valid pattern"));

/// Whether a transform name only uses the characters the registry allows.
pub fn is_valid_transform_name(name: &str) -> bool {
    TRANSFORM_NAME.is_match(name)
}

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Executor limits are non-zero
/// - Rate limit window is non-zero
/// - Transform names are well-formed and unique, arguments are not option-like
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.executor.executable_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "executor.executable_path cannot be empty".to_string(),
        ));
    }

    if config.executor.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "executor.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.executor.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "executor.max_concurrent cannot be 0".to_string(),
        ));
    }

    if config.rate_limit.window_secs == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.window_secs cannot be 0".to_string(),
        ));
    }

    if config.transforms.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one transform must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for transform in &config.transforms {
        if !is_valid_transform_name(&transform.name) {
            return Err(ConfigError::ValidationError(format!(
                "invalid transform name: {:?}",
                transform.name
            )));
        }
        if !seen.insert(transform.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate transform name: {:?}",
                transform.name
            )));
        }
        let argument = transform.argument();
        if argument.is_empty() || argument.starts_with('-') || argument.contains('\0') {
            return Err(ConfigError::ValidationError(format!(
                "invalid argument for transform {:?}",
                transform.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, TransformEntry};

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[executor]
executable_path = "/opt/op"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_limits_fail() {
        let mut config = base_config();
        config.executor.max_concurrent = 0;
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.executor.timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.rate_limit.window_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_shell_like_names() {
        let mut config = base_config();
        config.transforms = vec![TransformEntry::new("; rm -rf /")];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = base_config();
        config.transforms = vec![TransformEntry::new("prewitt"), TransformEntry::new("prewitt")];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_option_like_argument() {
        let mut config = base_config();
        config.transforms = vec![TransformEntry {
            name: "prewitt".to_string(),
            argument: Some("--help".to_string()),
        }];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_transform_name_pattern() {
        assert!(is_valid_transform_name("prewitt"));
        assert!(is_valid_transform_name("opencv sobel"));
        assert!(is_valid_transform_name("roberts-cross_2"));
        assert!(!is_valid_transform_name(""));
        assert!(!is_valid_transform_name(" leading"));
        assert!(!is_valid_transform_name("a;b"));
        assert!(!is_valid_transform_name("$(reboot)"));
        assert!(!is_valid_transform_name(&"x".repeat(65)));
    }
}
