//! Response watching with optional filters.

use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use cb_broker::{MessageBroker, topics};
use cb_protocol::Response;

use crate::client::{AppContext, CliError, CliResult};
use crate::output;

/// Predicate applied to each response before printing.
enum ResponseFilter {
    All,
    RequestId(Uuid),
    ServiceName(String),
}

impl ResponseFilter {
    fn matches(&self, response: &Response) -> bool {
        match self {
            Self::All => true,
            Self::RequestId(request_id) => response.request_id == *request_id,
            Self::ServiceName(name) => response.identity.starts_with(name.as_str()),
        }
    }
}

/// Drain the response topic until it goes quiet, printing matching records.
///
/// This is not an infinite stream: the watch returns once a full poll
/// window passes without traffic.
pub(crate) async fn watch(
    context: &AppContext,
    filter_request_id: Option<Uuid>,
    filter_service_name: Option<String>,
    timeout: u64,
) -> CliResult<()> {
    let filter = match (filter_request_id, filter_service_name) {
        (Some(request_id), _) => ResponseFilter::RequestId(request_id),
        (None, Some(name)) => ResponseFilter::ServiceName(name),
        (None, None) => ResponseFilter::All,
    };

    let broker = context.connector.connect().await.map_err(CliError::failure)?;
    let collected = collect_responses(
        broker.as_ref(),
        &AppContext::group(),
        &filter,
        Duration::from_secs(timeout),
    )
    .await;
    broker.close().await.map_err(CliError::failure)?;

    for response in collected? {
        output::print_json(&response)?;
    }
    Ok(())
}

/// Read the response topic until an empty poll, acknowledging each decoded
/// message before applying the filter.
async fn collect_responses(
    broker: &dyn MessageBroker,
    group: &str,
    filter: &ResponseFilter,
    timeout: Duration,
) -> CliResult<Vec<Response>> {
    let mut matched = Vec::new();
    loop {
        let batch = broker
            .read(topics::RESPONSE_TOPIC, group, timeout)
            .await
            .map_err(CliError::failure)?;
        if batch.is_empty() {
            return Ok(matched);
        }
        for message in batch {
            match Response::decode(&message.payload) {
                Ok(response) => {
                    broker.acknowledge().await.map_err(CliError::failure)?;
                    if filter.matches(&response) {
                        matched.push(response);
                    }
                }
                Err(error) => warn!(%error, "skipping malformed response"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_broker::memory::{MemoryBroker, MemoryBus};
    use cb_protocol::ResponseCode;

    fn response(request_id: Uuid, identity: &str) -> Response {
        Response {
            request_id,
            identity: identity.to_owned(),
            response_code: ResponseCode::PackageRequestAccepted,
            message: "accepted".to_owned(),
            package: "projects/demo/xclock".to_owned(),
            arch: Some("x86_64".to_owned()),
            dist: Some("TW".to_owned()),
        }
    }

    async fn seeded_bus(responses: &[Response]) -> MemoryBus {
        let bus = MemoryBus::new();
        let producer = MemoryBroker::connect(bus.clone());
        for record in responses {
            producer
                .send(topics::RESPONSE_TOPIC, &record.encode().expect("encode"))
                .await
                .expect("send");
        }
        bus
    }

    #[tokio::test]
    async fn request_id_filter_keeps_one_exchange() {
        let wanted = Uuid::new_v4();
        let bus = seeded_bus(&[
            response(wanted, "cb-scheduler:suse"),
            response(Uuid::new_v4(), "cb-scheduler:suse"),
            response(wanted, "cb-info:runner-a"),
        ])
        .await;

        let consumer = MemoryBroker::connect(bus);
        let matched = collect_responses(
            &consumer,
            "cb-ctl:test",
            &ResponseFilter::RequestId(wanted),
            Duration::from_millis(50),
        )
        .await
        .expect("collect");

        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|record| record.request_id == wanted));
    }

    #[tokio::test]
    async fn service_name_filter_matches_identity_prefixes() {
        let bus = seeded_bus(&[
            response(Uuid::new_v4(), "cb-scheduler:suse"),
            response(Uuid::new_v4(), "cb-info:runner-a"),
            response(Uuid::new_v4(), "cb-scheduler:arm"),
        ])
        .await;

        let consumer = MemoryBroker::connect(bus);
        let matched = collect_responses(
            &consumer,
            "cb-ctl:test",
            &ResponseFilter::ServiceName("cb-scheduler".to_owned()),
            Duration::from_millis(50),
        )
        .await
        .expect("collect");

        assert_eq!(matched.len(), 2);
    }

    #[tokio::test]
    async fn unfiltered_watch_acknowledges_everything_it_reads() {
        let bus = seeded_bus(&[
            response(Uuid::new_v4(), "cb-scheduler:suse"),
            response(Uuid::new_v4(), "cb-info:runner-a"),
        ])
        .await;

        let consumer = MemoryBroker::connect(bus.clone());
        let matched = collect_responses(
            &consumer,
            "cb-ctl:test",
            &ResponseFilter::All,
            Duration::from_millis(50),
        )
        .await
        .expect("collect");

        assert_eq!(matched.len(), 2);
        assert_eq!(bus.committed(topics::RESPONSE_TOPIC, "cb-ctl:test"), 2);
    }
}
