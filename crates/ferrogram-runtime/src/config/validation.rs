//! Checks that loaded values are usable before anything starts.
//!
//! Figment only guarantees that values have the right types. The checks here
//! cover ranges and formats, and stop at the first problem found. The bot
//! token is not checked: it may be supplied after loading.

use super::error::{ConfigError, ConfigResult};
use super::schema::{FerrogramConfig, LogOutput, WebhookConfig};
use ferrogram_transport::PollConfig;

/// Largest batch the Bot API hands out per `getUpdates` call.
const MAX_POLL_LIMIT: u32 = 100;

pub fn validate_config(config: &FerrogramConfig) -> ConfigResult<()> {
    check_url("bot.api_url", &config.bot.api_url)?;
    if config.bot.request_timeout_ms == 0 {
        return Err(ConfigError::invalid("bot.request_timeout_ms", "must be greater than 0"));
    }

    check_prefix(&config.commands.prefix)?;
    check_polling(&config.polling)?;
    check_webhook(&config.webhook)?;

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::invalid(
            "logging.file_path",
            "required when logging.output is \"file\"",
        ));
    }
    Ok(())
}

fn check_prefix(prefix: &str) -> ConfigResult<()> {
    if prefix.is_empty() {
        return Err(ConfigError::invalid("commands.prefix", "must not be empty"));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid(
            "commands.prefix",
            format!("{prefix:?} contains whitespace"),
        ));
    }
    Ok(())
}

fn check_polling(polling: &PollConfig) -> ConfigResult<()> {
    if polling.interval_ms == 0 {
        return Err(ConfigError::invalid("polling.interval_ms", "must be greater than 0"));
    }
    if !(1..=MAX_POLL_LIMIT).contains(&polling.limit) {
        return Err(ConfigError::invalid(
            "polling.limit",
            format!("{} is outside 1..={MAX_POLL_LIMIT}", polling.limit),
        ));
    }
    Ok(())
}

fn check_webhook(webhook: &WebhookConfig) -> ConfigResult<()> {
    if !webhook.path.starts_with('/') {
        return Err(ConfigError::invalid(
            "webhook.path",
            format!("{:?} does not start with '/'", webhook.path),
        ));
    }
    if webhook.port == 0 {
        return Err(ConfigError::invalid("webhook.port", "must not be 0"));
    }
    if webhook.max_body_bytes == 0 {
        return Err(ConfigError::invalid("webhook.max_body_bytes", "must be greater than 0"));
    }
    match &webhook.url {
        Some(url) => check_url("webhook.url", url),
        None => Ok(()),
    }
}

fn check_url(key: &'static str, url: &str) -> ConfigResult<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        None => Err(ConfigError::InvalidUrl {
            key,
            url: url.to_owned(),
            reason: "scheme must be http or https",
        }),
        Some(host) if host.is_empty() || host.starts_with('/') => Err(ConfigError::InvalidUrl {
            key,
            url: url.to_owned(),
            reason: "host is missing",
        }),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_validate_default_config() {
        assert_ok!(validate_config(&FerrogramConfig::default()));
    }

    #[test]
    fn test_validate_prefix() {
        let mut config = FerrogramConfig::default();
        config.commands.prefix = String::new();
        let err = assert_err!(validate_config(&config));
        assert_eq!(err.key(), Some("commands.prefix"));

        config.commands.prefix = "! ".into();
        assert_err!(validate_config(&config));

        config.commands.prefix = "!!".into();
        assert_ok!(validate_config(&config));
    }

    #[test]
    fn test_validate_webhook() {
        let mut config = FerrogramConfig::default();
        config.webhook.path = "hook".into();
        assert_eq!(assert_err!(validate_config(&config)).key(), Some("webhook.path"));

        config.webhook.path = "/hook".into();
        config.webhook.port = 0;
        assert_eq!(assert_err!(validate_config(&config)).key(), Some("webhook.port"));

        config.webhook.port = 8443;
        config.webhook.url = Some("example.com/hook".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { key: "webhook.url", .. })
        ));

        config.webhook.url = Some("https://example.com/hook".into());
        assert_ok!(validate_config(&config));
    }

    #[test]
    fn test_validate_polling_and_api() {
        let mut config = FerrogramConfig::default();
        config.polling.interval_ms = 0;
        assert_eq!(assert_err!(validate_config(&config)).key(), Some("polling.interval_ms"));

        let mut config = FerrogramConfig::default();
        config.polling.limit = 101;
        assert_eq!(assert_err!(validate_config(&config)).key(), Some("polling.limit"));

        let mut config = FerrogramConfig::default();
        config.bot.api_url = "ftp://api.telegram.org".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { key: "bot.api_url", .. })
        ));

        config.bot.api_url = "https://".into();
        assert_err!(validate_config(&config));
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = FerrogramConfig::default();
        config.logging.output = LogOutput::File;
        assert_eq!(assert_err!(validate_config(&config)).key(), Some("logging.file_path"));

        config.logging.file_path = Some("logs/bot.log".into());
        assert_ok!(validate_config(&config));
    }
}
