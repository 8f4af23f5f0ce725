use crate::config::types::{Config, CrawlerConfig, GroupConfig, TargetConfig, UserAgentConfig};
use crate::crawler::{ParseError, SelectorParser};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_groups(&config.groups)?;
    Ok(())
}

fn validate_concurrency(field: &str, value: usize) -> Result<(), ConfigError> {
    if !(1..=100).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and 100, got {}",
            field, value
        )));
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_concurrency("max_concurrency", config.max_concurrency)?;

    if !(1..=10).contains(&config.retry_attempts) {
        return Err(ConfigError::Validation(format!(
            "retry_attempts must be between 1 and 10, got {}",
            config.retry_attempts
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates every group and its targets
fn validate_groups(groups: &[GroupConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for group in groups {
        if group.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "group name cannot be empty".to_string(),
            ));
        }

        if !names.insert(group.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate group name '{}'",
                group.name
            )));
        }

        if let Some(concurrency) = group.max_concurrency {
            validate_concurrency(&format!("group '{}' max_concurrency", group.name), concurrency)?;
        }

        for target in &group.targets {
            validate_target(&group.name, target)?;
        }
    }

    Ok(())
}

/// Validates one target's URL and extraction rules
fn validate_target(group: &str, target: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&target.url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid target URL '{}' in group '{}': {}",
            target.url, group, e
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "Target URL '{}' must use HTTP or HTTPS",
            target.url
        )));
    }

    for required in &target.detail.required {
        if !target.detail.fields.contains_key(required) {
            return Err(ConfigError::Validation(format!(
                "Required field '{}' of target '{}' has no detail selector",
                required, target.url
            )));
        }
    }

    SelectorParser::from_config(target).map_err(|e| match e {
        ParseError::InvalidUrl { url, message } => {
            ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", url, message))
        }
        other => ConfigError::InvalidSelector(format!("Target '{}': {}", target.url, other)),
    })?;

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
