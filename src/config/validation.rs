use crate::config::types::{AppConfig, FeedConfig, RuleConfig, TemplateConfig};
use crate::crawler::resolve_encoding;
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashMap;
use url::Url;

/// Validates the base configuration
pub fn validate_app(config: &AppConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.period == 0 {
        return Err(ConfigError::Validation(
            "period must be at least 1 second".to_string(),
        ));
    }

    if let Some(proxy) = config.http_proxy.as_deref().filter(|p| !p.is_empty()) {
        Url::parse(proxy).map_err(|e| {
            ConfigError::Validation(format!("Invalid http_proxy '{}': {}", proxy, e))
        })?;
    }

    Ok(())
}

/// Validates a feed file
pub fn validate_feed(config: &FeedConfig) -> Result<(), ConfigError> {
    if config.desc.title.trim().is_empty() {
        return Err(ConfigError::Validation(
            "desc.title cannot be empty".to_string(),
        ));
    }

    if config.period == Some(0) {
        return Err(ConfigError::Validation(
            "period must be at least 1 second".to_string(),
        ));
    }

    validate_rule(&config.rule)
}

fn validate_rule(rule: &RuleConfig) -> Result<(), ConfigError> {
    let urls = rule.listing_urls();
    if urls.is_empty() {
        return Err(ConfigError::Validation(
            "rule needs at least one of toc_url or toc_urls".to_string(),
        ));
    }
    for url in &urls {
        Url::parse(url).map_err(|e| {
            ConfigError::Validation(format!("Invalid listing URL '{}': {}", url, e))
        })?;
    }

    if rule.item_selector.trim().is_empty() {
        return Err(ConfigError::Validation(
            "item_selector cannot be empty".to_string(),
        ));
    }

    // The key is read right after primary extraction, before any secondary
    // source runs, so it has to come from there.
    if rule.key.is_empty() {
        return Err(ConfigError::Validation("key cannot be empty".to_string()));
    }
    if !rule.selectors.contains_key(&rule.key) && !rule.constants.contains_key(&rule.key) {
        return Err(ConfigError::Validation(format!(
            "key '{}' must name a selector or a constant",
            rule.key
        )));
    }

    if rule.concurrency < 1 {
        return Err(ConfigError::Validation(
            "concurrency must be at least 1".to_string(),
        ));
    }

    if let Some(label) = rule.encoding.as_deref().filter(|e| !e.is_empty()) {
        if resolve_encoding(label).is_none() {
            return Err(ConfigError::Validation(format!(
                "Unknown encoding '{}'",
                label
            )));
        }
    }

    validate_headers(&rule.headers)?;

    match (&rule.extra_page, &rule.script) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::Validation(
                "extra_page and script are mutually exclusive".to_string(),
            ));
        }
        (Some(page), None) => {
            if page.url.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "extra_page.url cannot be empty".to_string(),
                ));
            }
            validate_headers(&page.headers)?;
        }
        (None, Some(script)) => {
            if script.command.first().map_or(true, |c| c.is_empty()) {
                return Err(ConfigError::Validation(
                    "script.command cannot be empty".to_string(),
                ));
            }
        }
        (None, None) => {}
    }

    validate_template(&rule.template)
}

fn validate_headers(headers: &HashMap<String, String>) -> Result<(), ConfigError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("Invalid header name '{}'", name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }
    Ok(())
}

fn validate_template(template: &TemplateConfig) -> Result<(), ConfigError> {
    for (field, source) in [
        ("title", &template.title),
        ("link", &template.link),
        ("body", &template.body),
    ] {
        if source.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "template.{} cannot be empty",
                field
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ExtraPageConfig, ScriptConfig, SelectorConfig};

    fn feed() -> FeedConfig {
        toml::from_str(
            r#"
[desc]
title = "demo"

[rule]
toc_url = "https://example.com/news"
item_selector = "li.item"
key = "href"

[rule.selectors.href]
selector = "a"
attr = "href"

[rule.template]
title = "{{ .href }}"
link = "{{ .href }}"
body = "{{ .href }}"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_feed() {
        assert!(validate_feed(&feed()).is_ok());
    }

    #[test]
    fn test_empty_title() {
        let mut config = feed();
        config.desc.title = " ".to_string();
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_no_listing_urls() {
        let mut config = feed();
        config.rule.toc_url.clear();
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_invalid_listing_url() {
        let mut config = feed();
        config.rule.toc_urls.push("not a url".to_string());
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_key_must_be_primary_field() {
        let mut config = feed();
        config.rule.key = "missing".to_string();
        assert!(validate_feed(&config).is_err());

        config
            .rule
            .constants
            .insert("missing".to_string(), "v".to_string());
        assert!(validate_feed(&config).is_ok());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = feed();
        config.rule.concurrency = 0;
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_encoding_labels() {
        let mut config = feed();
        config.rule.encoding = Some("gbk".to_string());
        assert!(validate_feed(&config).is_ok());

        config.rule.encoding = Some("no-such-charset".to_string());
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_invalid_header_name() {
        let mut config = feed();
        config
            .rule
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_secondary_sources_are_exclusive() {
        let mut config = feed();
        config.rule.extra_page = Some(ExtraPageConfig {
            url: "{{ .href }}".to_string(),
            headers: HashMap::new(),
            selectors: HashMap::from([("body".to_string(), SelectorConfig::default())]),
        });
        assert!(validate_feed(&config).is_ok());

        config.rule.script = Some(ScriptConfig {
            command: vec!["enrich".to_string()],
            argument: None,
        });
        assert!(validate_feed(&config).is_err());

        config.rule.extra_page = None;
        assert!(validate_feed(&config).is_ok());

        config.rule.script = Some(ScriptConfig {
            command: vec![],
            argument: None,
        });
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_required_templates() {
        let mut config = feed();
        config.rule.template.body.clear();
        assert!(validate_feed(&config).is_err());
    }

    #[test]
    fn test_app_config() {
        let mut config = AppConfig::default();
        assert!(validate_app(&config).is_ok());

        config.http_proxy = Some("::nope".to_string());
        assert!(validate_app(&config).is_err());

        config.http_proxy = None;
        config.period = 0;
        assert!(validate_app(&config).is_err());
    }
}
