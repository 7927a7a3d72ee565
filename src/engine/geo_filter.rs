//! Geographic relevance of alerts to subscribers.

use crate::models::{Alert, Subscriber};

/// Decides whether an alert concerns a subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoRelevanceFilter {
    include_unlocated_subscribers: bool,
}

impl GeoRelevanceFilter {
    /// `include_unlocated_subscribers` lets subscribers without a location
    /// receive alerts that carry a radius constraint.
    pub fn new(include_unlocated_subscribers: bool) -> Self {
        Self { include_unlocated_subscribers }
    }

    /// Whether `alert` is relevant to `subscriber`.
    ///
    /// The subscriber's minimum severity is applied first. Then the alert
    /// matches by declared region, by distance from the alert center, or, for
    /// subscribers without a location, when the alert is region-only (or the
    /// unlocated flag is set). A located subscriber is never matched by a
    /// region-only alert except through its declared region.
    pub fn is_relevant(&self, alert: &Alert, subscriber: &Subscriber) -> bool {
        if alert.severity < subscriber.min_severity {
            return false;
        }

        if subscriber.region_id.as_deref() == Some(alert.source.region_id.as_str()) {
            return true;
        }

        let constraint = alert.source.radius_constraint();
        match (subscriber.location, constraint) {
            (Some(location), Some((center, radius_km))) => {
                location.distance_km(&center) <= radius_km
            }
            (Some(_), None) => false,
            (None, None) => true,
            (None, Some(_)) => self.include_unlocated_subscribers,
        }
    }

    /// The subscribers `alert` is relevant to.
    pub fn relevant_subscribers<'a>(
        &self,
        alert: &Alert,
        subscribers: &'a [Subscriber],
    ) -> Vec<&'a Subscriber> {
        subscribers.iter().filter(|s| self.is_relevant(alert, s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{GeoPoint, Severity},
        test_helpers::{AlertBuilder, SubscriberBuilder},
    };

    fn radius_alert() -> Alert {
        AlertBuilder::new(1, "nairobi").center(-1.29, 36.82).radius_km(10.0).build()
    }

    #[test]
    fn test_subscriber_within_radius_is_included() {
        let filter = GeoRelevanceFilter::default();
        let subscriber = SubscriberBuilder::new("s").location(-1.30, 36.80).build();

        let distance =
            GeoPoint::new(-1.30, 36.80).distance_km(&GeoPoint::new(-1.29, 36.82));
        assert!((distance - 2.49).abs() < 0.05, "distance {distance}");
        assert!(filter.is_relevant(&radius_alert(), &subscriber));
    }

    #[test]
    fn test_subscriber_outside_radius_is_excluded() {
        let filter = GeoRelevanceFilter::default();
        // Machakos town is roughly 50 km from Nairobi.
        let subscriber = SubscriberBuilder::new("s").location(-1.5177, 37.2634).build();
        assert!(!filter.is_relevant(&radius_alert(), &subscriber));
    }

    #[test]
    fn test_declared_region_matches_regardless_of_distance() {
        let filter = GeoRelevanceFilter::default();
        let subscriber =
            SubscriberBuilder::new("s").location(-1.5177, 37.2634).region("nairobi").build();
        assert!(filter.is_relevant(&radius_alert(), &subscriber));
    }

    #[test]
    fn test_min_severity_is_applied_first() {
        let filter = GeoRelevanceFilter::default();
        let subscriber = SubscriberBuilder::new("s")
            .region("nairobi")
            .min_severity(Severity::High)
            .build();
        let medium = AlertBuilder::new(1, "nairobi").severity(Severity::Medium).build();
        let critical = AlertBuilder::new(2, "nairobi").severity(Severity::Critical).build();
        assert!(!filter.is_relevant(&medium, &subscriber));
        assert!(filter.is_relevant(&critical, &subscriber));
    }

    #[test]
    fn test_unlocated_subscribers() {
        let region_only = AlertBuilder::new(1, "turkana").build();
        let unlocated = SubscriberBuilder::new("s").build();
        let located = SubscriberBuilder::new("t").location(3.1, 35.6).build();

        let filter = GeoRelevanceFilter::default();
        assert!(filter.is_relevant(&region_only, &unlocated));
        assert!(!filter.is_relevant(&region_only, &located));
        assert!(!filter.is_relevant(&radius_alert(), &unlocated));

        let inclusive = GeoRelevanceFilter::new(true);
        assert!(inclusive.is_relevant(&radius_alert(), &unlocated));
        assert!(!inclusive.is_relevant(&region_only, &located));
    }

    #[test]
    fn test_relevant_subscribers() {
        let filter = GeoRelevanceFilter::default();
        let subscribers = vec![
            SubscriberBuilder::new("near").location(-1.30, 36.80).build(),
            SubscriberBuilder::new("far").location(0.5, 35.3).build(),
            SubscriberBuilder::new("declared").region("nairobi").build(),
        ];
        let ids: Vec<&str> = filter
            .relevant_subscribers(&radius_alert(), &subscribers)
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["near", "declared"]);
    }
}
