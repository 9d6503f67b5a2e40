//! `$placeholder` substitution for rendered artifacts
//!
//! Supports `$name`, `${name}` and `$$` for a literal dollar sign. Any other
//! use of `$` is rejected so that a typo in a template fails the pass instead
//! of shipping a half-rendered file.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::error::CoreError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|\{(?P<braced>[_a-zA-Z][_a-zA-Z0-9]*)\}|(?P<invalid>))",
    )
    .expect("placeholder pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template `{template}` has no value for placeholder `{key}`")]
    MissingKey { template: String, key: String },

    #[error("template `{template}` has an invalid placeholder at line {line}, column {column}")]
    InvalidPlaceholder {
        template: String,
        line: usize,
        column: usize,
    },
}

impl From<TemplateError> for CoreError {
    fn from(err: TemplateError) -> Self {
        CoreError::ConfigRender(err.to_string())
    }
}

/// A named template source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
}

impl Template {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Substitute every placeholder from `params`
    ///
    /// # Errors
    /// Returns `TemplateError` for a placeholder without a value or a stray `$`
    pub fn substitute(&self, params: &BTreeMap<&str, String>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.source) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&self.source[last..whole.start()]);
            last = whole.end();

            if caps.name("escaped").is_some() {
                out.push('$');
                continue;
            }

            let Some(key) = caps.name("named").or_else(|| caps.name("braced")) else {
                let (line, column) = self.position(whole.start());
                return Err(TemplateError::InvalidPlaceholder {
                    template: self.name.clone(),
                    line,
                    column,
                });
            };

            let value = params
                .get(key.as_str())
                .ok_or_else(|| TemplateError::MissingKey {
                    template: self.name.clone(),
                    key: key.as_str().to_string(),
                })?;
            out.push_str(value);
        }

        out.push_str(&self.source[last..]);
        Ok(out)
    }

    /// 1-based line and column of a byte offset
    fn position(&self, offset: usize) -> (usize, usize) {
        let before = &self.source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            + 1;
        (line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&'static str, &str)]) -> BTreeMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, (*v).to_string())).collect()
    }

    #[test]
    fn test_named_and_braced() {
        let template = Template::new("t", "dir=$dir owner=${owner}suffix");
        let out = template
            .substitute(&params(&[("dir", "/srv/x"), ("owner", "warren")]))
            .unwrap();

        assert_eq!(out, "dir=/srv/x owner=warrensuffix");
    }

    #[test]
    fn test_escaped_dollar() {
        let template = Template::new("t", "cost: $$5 and $$$name");
        let out = template.substitute(&params(&[("name", "x")])).unwrap();

        assert_eq!(out, "cost: $5 and $x");
    }

    #[test]
    fn test_missing_key() {
        let template = Template::new("config.yaml", "key: $session_auth_key\n");
        let err = template.substitute(&BTreeMap::new()).unwrap_err();

        assert_eq!(
            err,
            TemplateError::MissingKey {
                template: "config.yaml".to_string(),
                key: "session_auth_key".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_placeholder_position() {
        let template = Template::new("upstart.conf", "ok\nexec $ 1\n");
        let err = template.substitute(&BTreeMap::new()).unwrap_err();

        assert_eq!(
            err,
            TemplateError::InvalidPlaceholder {
                template: "upstart.conf".to_string(),
                line: 2,
                column: 6,
            }
        );
    }

    #[test]
    fn test_unused_params_are_ignored() {
        let template = Template::new("t", "plain text");
        let out = template.substitute(&params(&[("dir", "/srv")])).unwrap();

        assert_eq!(out, "plain text");
    }
}
