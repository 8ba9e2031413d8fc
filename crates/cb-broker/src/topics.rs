//! Topic identifiers used across the cloudbuild transports.

/// Topic carrying build accept/reject responses from schedulers.
pub const RESPONSE_TOPIC: &str = "cb-response";

/// Topic carrying info requests from the control client.
pub const INFO_REQUEST_TOPIC: &str = "cb-info-request";

/// Topic carrying info responses from info services.
pub const INFO_RESPONSE_TOPIC: &str = "cb-info-response";

/// Package-request topic for a runner group. Every scheduler of the group
/// reads this topic as a competing consumer.
#[must_use]
pub fn package_request_topic(runner_group: &str) -> String {
    format!("cb-request-{runner_group}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_topics_are_partitioned_by_runner_group() {
        assert_eq!(package_request_topic("suse"), "cb-request-suse");
        assert_ne!(package_request_topic("suse"), package_request_topic("arm"));
    }
}
