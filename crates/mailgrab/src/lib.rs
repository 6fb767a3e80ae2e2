pub mod config;
pub mod email;
pub mod error;
pub mod secrets;

pub use config::{load_config, load_config_from_str, Config, ImapConfig, InputConfig, Security};
pub use email::{run, EmailError, MailboxScanner, ScanReport};
pub use error::{ConfigError, MailgrabError, Result};
pub use secrets::SecretError;
