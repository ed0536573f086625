use crate::config::types::{
    AssetConfig, BrowserConfig, CommandTemplate, Config, CrawlerConfig, FetchConfig, MergeConfig,
    RenderConfig,
};
use crate::ConfigError;
use std::collections::HashSet;

/// Upper bound for any worker pool
const MAX_WORKERS: u32 = 64;

/// Upper bound for HTTP retries
const MAX_RETRIES: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_browser_config(&config.browser)?;
    validate_asset_config(&config.assets)?;
    validate_render_config(&config.render)?;
    validate_merge_config(&config.merge)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u32, so no check needed

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    validate_workers("crawler.workers", config.workers)
}

/// Validates HTTP fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    validate_timeout("fetch.request_timeout_secs", config.request_timeout_secs)?;
    validate_timeout("fetch.connect_timeout_secs", config.connect_timeout_secs)?;

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser collaborator configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    validate_timeout("browser.timeout_secs", config.timeout_secs)?;
    validate_template("browser.command", &config.command, &["{url}", "{output}"])
}

/// Validates asset localization configuration
fn validate_asset_config(config: &AssetConfig) -> Result<(), ConfigError> {
    validate_timeout("assets.timeout_secs", config.timeout_secs)
}

/// Validates render pipeline configuration
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    validate_timeout("render.timeout_secs", config.timeout_secs)?;
    validate_workers("render.workers", config.workers)?;

    if config.media.trim().is_empty() {
        return Err(ConfigError::Validation(
            "render.media cannot be empty".to_string(),
        ));
    }

    if config.strategies.is_empty() {
        return Err(ConfigError::Validation(
            "at least one render strategy is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for strategy in &config.strategies {
        if strategy.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "render strategy name cannot be empty".to_string(),
            ));
        }

        if !names.insert(strategy.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate render strategy '{}'",
                strategy.name
            )));
        }

        validate_template(
            &format!("render.strategies.{}", strategy.name),
            &strategy.command,
            &["{html}", "{output}"],
        )?;
    }

    Ok(())
}

/// Validates merge collaborator configuration
fn validate_merge_config(config: &MergeConfig) -> Result<(), ConfigError> {
    validate_timeout("merge.timeout_secs", config.timeout_secs)?;
    validate_template("merge.command", &config.command, &["{inputs}", "{output}"])?;

    if !config.command.args.iter().any(|a| a == "{inputs}") {
        return Err(ConfigError::InvalidTemplate(
            "merge.command: {inputs} must be a whole argument".to_string(),
        ));
    }

    Ok(())
}

fn validate_workers(field: &str, workers: u32) -> Result<(), ConfigError> {
    if workers < 1 || workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            field, MAX_WORKERS, workers
        )));
    }
    Ok(())
}

fn validate_timeout(field: &str, secs: u64) -> Result<(), ConfigError> {
    if secs < 1 {
        return Err(ConfigError::Validation(format!(
            "{} must be >= 1 second, got {}",
            field, secs
        )));
    }
    Ok(())
}

/// Checks that a command template names a program and mentions every required placeholder
fn validate_template(
    field: &str,
    template: &CommandTemplate,
    required: &[&str],
) -> Result<(), ConfigError> {
    if template.program.trim().is_empty() {
        return Err(ConfigError::InvalidTemplate(format!(
            "{}: program cannot be empty",
            field
        )));
    }

    for placeholder in required {
        if !template.mentions(placeholder) {
            return Err(ConfigError::InvalidTemplate(format!(
                "{}: missing required placeholder {}",
                field, placeholder
            )));
        }
    }

    Ok(())
}
