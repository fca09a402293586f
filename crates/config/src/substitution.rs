use anyhow::Result;
use regex::Regex;
use std::env;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("placeholder pattern is valid"))
}

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
///
/// Unset variables keep their placeholder; the validator reports them.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    substitute_with(content, |name| env::var(name).ok())
}

/// Substitution with an explicit variable lookup
pub fn substitute_with<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing_vars = Vec::new();

    let result = placeholder_regex().replace_all(content, |caps: &regex::Captures<'_>| {
        let placeholder = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let Some(var_name) = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()) else {
            return placeholder.to_string();
        };

        match lookup(var_name) {
            Some(value) => {
                debug!("Substituting environment variable: {} = \"{}\"", var_name, value);
                value
            }
            None => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
                placeholder.to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may use defaults or fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result.into_owned())
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    placeholder_regex().is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "GATEWAY_HOST" => Some("10.0.0.5".to_string()),
            "GATEWAY_PORT" => Some("4002".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_substitutes_both_forms() {
        let out = substitute_with("host: ${GATEWAY_HOST}\nport: $GATEWAY_PORT", lookup).unwrap();
        assert_eq!(out, "host: 10.0.0.5\nport: 4002");
    }

    #[test]
    fn test_missing_variable_keeps_placeholder() {
        let out = substitute_with("host: ${UNSET_HOST}", lookup).unwrap();
        assert_eq!(out, "host: ${UNSET_HOST}");
        assert!(has_unresolved_env_vars(&out));
    }

    #[test]
    fn test_plain_text_untouched() {
        let out = substitute_with("bar_size: 1 day", lookup).unwrap();
        assert!(!has_unresolved_env_vars(&out));
        assert_eq!(out, "bar_size: 1 day");
    }
}
