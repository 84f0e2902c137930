use regex::Regex;

use crate::error::ConfigError;

/// Regex filter plus the payload template its capture groups are rendered into.
///
/// `$1`, `$2`, ... in the template are replaced with the matching capture
/// group. Placeholders without a group stay as written.
#[derive(Debug, Clone)]
pub struct Filter {
    pattern: Regex,
    template: String,
    upper: bool,
    trim: bool,
}

impl Filter {
    pub fn new(
        pattern: &str,
        template: impl Into<String>,
        upper: bool,
        trim: bool,
    ) -> Result<Self, ConfigError> {
        let compiled = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            template: template.into(),
            upper,
            trim,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Render the template for `text`, or `None` when the pattern does not match.
    pub fn apply(&self, text: &str) -> Option<String> {
        let captures = self.pattern.captures(text)?;

        let mut rendered = self.template.clone();
        for (index, group) in captures.iter().enumerate().skip(1) {
            let mut value = group.map_or("", |m| m.as_str()).to_string();
            if self.upper {
                value = value.to_uppercase();
            }
            if self.trim {
                value = value.trim().to_string();
            }
            rendered = rendered.replace(&format!("${index}"), &value);
        }
        Some(rendered)
    }
}
