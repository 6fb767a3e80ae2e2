use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Loads, validates and prepares a config file.
///
/// On success the input directory exists.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = load_config_from_str(&content)?;
    prepare_input_dir(&config)?;
    Ok(config)
}

/// Parses and validates config YAML without touching the filesystem.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let value: serde_json::Value = serde_yaml::from_str(content)?;

    validate_schema(&value)?;

    let config: Config = serde_json::from_value(value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let imap = &config.input.imap;

    if config.input.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "input.dir is not configured".to_string(),
        });
    }

    if imap.server.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "input.imap.server is not configured".to_string(),
        });
    }

    if imap.username.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "input.imap.username is not configured".to_string(),
        });
    }

    if !imap.password_source().is_configured() {
        return Err(ConfigError::Validation {
            message: "input.imap needs one of password, passwordFile or passwordEnvVar"
                .to_string(),
        });
    }

    imap.address()?;

    Ok(())
}

fn prepare_input_dir(config: &Config) -> Result<(), ConfigError> {
    let dir = &config.input.dir;
    std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDirectory {
        path: dir.clone(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Security;

    const MINIMAL: &str = r#"
input:
  dir: ./reports
  imap:
    server: imap.example.com
    username: dmarc@example.com
    password: hunter2
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        let imap = &config.input.imap;
        assert_eq!(imap.mailbox, "INBOX");
        assert_eq!(imap.security, Security::Tls);
        assert!(!imap.delete);
        assert!(!imap.debug);
        assert_eq!(imap.address().unwrap(), ("imap.example.com".to_string(), 993));
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
input:
  dir: /var/spool/dmarc
  imap:
    server: mail.example.org:143
    username: dmarc
    passwordEnvVar: DMARC_IMAP_PASSWORD
    mailbox: Reports
    debug: true
    delete: true
    security: starttls
"#;
        let config = load_config_from_str(yaml).unwrap();
        let imap = &config.input.imap;
        assert_eq!(imap.mailbox, "Reports");
        assert_eq!(imap.security, Security::StartTls);
        assert!(imap.delete);
        assert!(imap.debug);
        assert_eq!(imap.password_env_var.as_deref(), Some("DMARC_IMAP_PASSWORD"));
    }

    #[test]
    fn test_empty_security_means_tls() {
        let yaml = MINIMAL.replace("password: hunter2", "password: hunter2\n    security: \"\"");
        let config = load_config_from_str(&yaml).unwrap();
        assert_eq!(config.input.imap.security, Security::Tls);
    }

    #[test]
    fn test_unknown_security_rejected() {
        let yaml = MINIMAL.replace("password: hunter2", "password: hunter2\n    security: ssl");
        let result = load_config_from_str(&yaml);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_missing_dir_rejected() {
        let yaml = MINIMAL.replace("  dir: ./reports\n", "");
        let result = load_config_from_str(&yaml);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_missing_password_rejected() {
        let yaml = MINIMAL.replace("    password: hunter2\n", "");
        let result = load_config_from_str(&yaml);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_bad_port_rejected() {
        let yaml = MINIMAL.replace("imap.example.com", "imap.example.com:imaps");
        let result = load_config_from_str(&yaml);
        assert!(matches!(result, Err(ConfigError::InvalidAddress { .. })));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = load_config_from_str("input: [unclosed");
        assert!(matches!(result, Err(ConfigError::ParseYaml(_))));
    }

    #[test]
    fn test_load_config_creates_input_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("reports");
        let yaml = MINIMAL.replace("./reports", &dir.to_string_lossy());
        let config_path = temp.path().join("config.yaml");
        std::fs::write(&config_path, yaml).unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.input.dir, dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/mailgrab.yaml");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
