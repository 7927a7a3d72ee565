//! This module provides a service for rendering alert text using the
//! minijinja templating engine.

use minijinja::Environment;
use thiserror::Error;

/// Maximum length of the short message form, in characters.
pub const SMS_MAX_CHARS: usize = 160;

/// A service for rendering templates using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// An error occurred while rendering the template.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a number with a fixed count of decimals: `{{ value | fixed(1) }}`.
fn fixed(value: f64, digits: Option<u32>) -> String {
    format!("{:.*}", digits.unwrap_or(1) as usize, value)
}

impl TemplateService {
    /// Creates a new instance of `TemplateService`. Undefined variables are
    /// errors so that a typo in a configured template fails loudly.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_filter("fixed", fixed);
        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(
        &self,
        template_str: &str,
        context: &serde_json::Value,
    ) -> Result<String, TemplateServiceError> {
        tracing::debug!(template = template_str, context = %context, "Rendering template with context.");

        self.env.render_str(template_str, context).map_err(|e| {
            tracing::warn!("Failed to render template '{}': {}", template_str, e);
            TemplateServiceError::RenderError(e)
        })
    }

    /// Checks that a template parses.
    pub fn validate(&self, template_str: &str) -> Result<(), TemplateServiceError> {
        self.env.template_from_str(template_str)?;
        Ok(())
    }
}

/// Collapses whitespace and cuts `text` to at most `max_chars` characters,
/// ending with an ellipsis when something was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}
