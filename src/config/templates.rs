use serde::Deserialize;

use crate::models::{MetricKind, Severity};

/// Recommended action text per severity.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RecommendedActions {
    /// Action for low severity.
    #[serde(default)]
    pub low: Option<String>,
    /// Action for medium severity.
    #[serde(default)]
    pub medium: Option<String>,
    /// Action for high severity.
    #[serde(default)]
    pub high: Option<String>,
    /// Action for critical severity.
    #[serde(default)]
    pub critical: Option<String>,
}

impl RecommendedActions {
    /// The configured action for `severity`.
    pub fn for_severity(&self, severity: Severity) -> Option<&str> {
        match severity {
            Severity::Low => self.low.as_deref(),
            Severity::Medium => self.medium.as_deref(),
            Severity::High => self.high.as_deref(),
            Severity::Critical => self.critical.as_deref(),
        }
    }
}

/// `minijinja` templates for the text of alerts raised from one metric.
///
/// Available variables: `region_id`, `region_name`, `metric`, `value`,
/// `severity`, `observed_at` and `recommended_action`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MessageTemplate {
    /// Alert title.
    pub title: String,
    /// Full message body for the feed and WhatsApp.
    pub body: String,
    /// Short form for SMS and USSD; truncated to 160 characters after
    /// rendering.
    pub sms: String,
    /// Action text appended per severity.
    #[serde(default)]
    pub recommended_actions: RecommendedActions,
}

/// Message templates per metric.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AlertTemplates {
    /// Drought risk index.
    #[serde(default = "default_drought_risk")]
    pub drought_risk: MessageTemplate,
    /// Rainfall in millimetres.
    #[serde(default = "default_rainfall")]
    pub rainfall: MessageTemplate,
    /// Temperature in degrees Celsius.
    #[serde(default = "default_temperature")]
    pub temperature: MessageTemplate,
}

impl Default for AlertTemplates {
    fn default() -> Self {
        Self {
            drought_risk: default_drought_risk(),
            rainfall: default_rainfall(),
            temperature: default_temperature(),
        }
    }
}

impl AlertTemplates {
    /// Template for `metric`.
    pub fn for_metric(&self, metric: MetricKind) -> &MessageTemplate {
        match metric {
            MetricKind::DroughtRisk => &self.drought_risk,
            MetricKind::Rainfall => &self.rainfall,
            MetricKind::Temperature => &self.temperature,
        }
    }
}

fn default_drought_risk() -> MessageTemplate {
    MessageTemplate {
        title: "{{ severity | upper }} drought risk in {{ region_name }}".into(),
        body: "The drought risk score for {{ region_name }} reached {{ value | fixed(1) }} \
               on {{ observed_at }}."
            .into(),
        sms: "{{ severity | upper }}: drought risk {{ value | fixed(1) }} in {{ region_name }}. \
              {{ recommended_action }}"
            .into(),
        recommended_actions: RecommendedActions {
            low: None,
            medium: Some("Monitor soil moisture and plan water use.".into()),
            high: Some("Conserve water and consider drought-tolerant varieties.".into()),
            critical: Some(
                "Start water rationing and protect livestock feed reserves now.".into(),
            ),
        },
    }
}

fn default_rainfall() -> MessageTemplate {
    MessageTemplate {
        title: "{{ severity | upper }} rainfall deficit in {{ region_name }}".into(),
        body: "Only {{ value | fixed(1) }} mm of rainfall was recorded in {{ region_name }} \
               as of {{ observed_at }}."
            .into(),
        sms: "{{ severity | upper }}: {{ value | fixed(1) }}mm rain in {{ region_name }}. \
              {{ recommended_action }}"
            .into(),
        recommended_actions: RecommendedActions {
            low: None,
            medium: Some("Delay planting until rains stabilise.".into()),
            high: Some("Irrigate critical crops and mulch to retain moisture.".into()),
            critical: Some("Prioritise irrigation for food crops and seek extension advice.".into()),
        },
    }
}

fn default_temperature() -> MessageTemplate {
    MessageTemplate {
        title: "{{ severity | upper }} heat warning for {{ region_name }}".into(),
        body: "Temperatures of {{ value | fixed(1) }} C were observed in {{ region_name }} \
               on {{ observed_at }}."
            .into(),
        sms: "{{ severity | upper }}: {{ value | fixed(1) }}C heat in {{ region_name }}. \
              {{ recommended_action }}"
            .into(),
        recommended_actions: RecommendedActions {
            low: None,
            medium: Some("Water crops early in the morning.".into()),
            high: Some("Provide shade and extra water for livestock.".into()),
            critical: Some("Avoid field work at midday and protect seedlings from heat.".into()),
        },
    }
}
