//! Info requests and artifact fetches.
//!
//! Every command here performs the same exchange: publish an info request,
//! drain the info-response topic until it goes quiet, keep the responses
//! answering our request id, and pick the record with the latest
//! modification time when several info services answered.

use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{info, warn};
use uuid::Uuid;

use cb_broker::{MessageBroker, topics};
use cb_protocol::{InfoRequest, InfoResponse};

use crate::cli::TargetArgs;
use crate::client::{self, AppContext, CliError, CliResult};
use crate::output;

/// Print the latest build status record for a package.
pub(crate) async fn build_info(
    context: &AppContext,
    target: &TargetArgs,
    timeout: u64,
) -> CliResult<()> {
    let record = get_info(context, target, timeout).await?;
    output::print_json(&record)
}

/// Fetch and print the latest raw build log for a package.
pub(crate) async fn build_log(
    context: &AppContext,
    target: &TargetArgs,
    timeout: u64,
) -> CliResult<()> {
    let config = context.load_config()?;
    let record = get_info(context, target, timeout).await?;
    let log = client::ssh_cat(&config, &record.source_ip, &record.log_file).await?;
    output::print_raw(&log);
    Ok(())
}

/// Fetch and print the latest dependency-solver report for a package.
pub(crate) async fn build_dependencies(
    context: &AppContext,
    target: &TargetArgs,
    timeout: u64,
) -> CliResult<()> {
    let config = context.load_config()?;
    let record = get_info(context, target, timeout).await?;
    let solver_data = client::ssh_cat(&config, &record.source_ip, &record.solver_file).await?;
    let solver_data: serde_json::Value = serde_json::from_str(&solver_data)
        .map_err(|error| CliError::failure(anyhow!("malformed solver report: {error}")))?;
    output::print_json(&solver_data)
}

/// Download the latest binary packages of a package into a local directory.
pub(crate) async fn get_binaries(
    context: &AppContext,
    target: &TargetArgs,
    target_dir: &Path,
    timeout: u64,
) -> CliResult<()> {
    let config = context.load_config()?;
    let record = get_info(context, target, timeout).await?;
    std::fs::create_dir_all(target_dir).map_err(|error| {
        CliError::failure(anyhow!(
            "creating target directory {}: {error}",
            target_dir.display()
        ))
    })?;
    for binary in &record.binary_packages {
        info!(binary = %binary, target_dir = %target_dir.display(), "fetching binary package");
        client::scp_fetch(&config, &record.source_ip, binary, target_dir).await?;
    }
    Ok(())
}

/// Run one info exchange and return the winning record.
async fn get_info(
    context: &AppContext,
    target: &TargetArgs,
    timeout: u64,
) -> CliResult<InfoResponse> {
    let request_id = send_info_request(context, target).await?;

    let broker = context.connector.connect().await.map_err(CliError::failure)?;
    let collected = collect_info(
        broker.as_ref(),
        &AppContext::group(),
        request_id,
        Duration::from_secs(timeout),
    )
    .await;
    broker.close().await.map_err(CliError::failure)?;

    select_latest(collected?)?.ok_or_else(|| {
        CliError::validation(format!(
            "no info response for {} within {timeout}s",
            target.package_path()
        ))
    })
}

async fn send_info_request(context: &AppContext, target: &TargetArgs) -> CliResult<Uuid> {
    let request = InfoRequest::new(
        target.package_path(),
        target.arch.clone(),
        target.dist.clone(),
    );
    let broker = context.connector.connect().await.map_err(CliError::failure)?;
    let send = async {
        let payload = request.encode().map_err(CliError::failure)?;
        broker
            .send(topics::INFO_REQUEST_TOPIC, &payload)
            .await
            .map_err(CliError::failure)
    }
    .await;
    broker.close().await.map_err(CliError::failure)?;
    send?;
    Ok(request.request_id)
}

/// Drain the info-response topic until idle, keeping responses for one
/// request id. Every decodable message is acknowledged before filtering so
/// a later exchange does not see it again.
async fn collect_info(
    broker: &dyn MessageBroker,
    group: &str,
    request_id: Uuid,
    timeout: Duration,
) -> CliResult<Vec<InfoResponse>> {
    let mut records = Vec::new();
    loop {
        let batch = broker
            .read(topics::INFO_RESPONSE_TOPIC, group, timeout)
            .await
            .map_err(CliError::failure)?;
        if batch.is_empty() {
            return Ok(records);
        }
        for message in batch {
            match InfoResponse::decode(&message.payload) {
                Ok(response) => {
                    broker.acknowledge().await.map_err(CliError::failure)?;
                    if response.request_id == request_id {
                        records.push(response);
                    }
                }
                Err(error) => warn!(%error, "skipping malformed info response"),
            }
        }
    }
}

/// Pick the record with the latest modification time.
///
/// With a single record no timestamp parsing happens at all; ordering ties
/// between distinct records keep the earlier-received one.
fn select_latest(records: Vec<InfoResponse>) -> CliResult<Option<InfoResponse>> {
    let mut records = records.into_iter();
    let Some(first) = records.next() else {
        return Ok(None);
    };
    let mut latest = first;
    for record in records {
        let newer = record.modification_time().map_err(CliError::failure)?
            > latest.modification_time().map_err(CliError::failure)?;
        if newer {
            latest = record;
        }
    }
    Ok(Some(latest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_broker::memory::{MemoryBroker, MemoryBus};

    fn info_record(request_id: Uuid, timestamp: &str) -> InfoResponse {
        InfoResponse {
            request_id,
            identity: "cb-info:runner-a".to_owned(),
            package: "projects/demo/xclock".to_owned(),
            arch: "x86_64".to_owned(),
            dist: "TW".to_owned(),
            source_ip: "192.168.1.10".to_owned(),
            solver_file: "/var/lib/cloudbuild/x.solver.json".to_owned(),
            log_file: "/var/lib/cloudbuild/x.build.log".to_owned(),
            binary_packages: vec!["/var/lib/cloudbuild/x.rpm".to_owned()],
            utc_modification_time: timestamp.to_owned(),
        }
    }

    #[test]
    fn latest_modification_time_wins() {
        let id = Uuid::new_v4();
        let records = vec![
            info_record(id, "2021-01-01 00:00:00.000000"),
            info_record(id, "2021-01-02 00:00:00.000000"),
            info_record(id, "2021-01-01 12:00:00.000000"),
        ];
        let winner = select_latest(records).expect("select").expect("some");
        assert_eq!(winner.utc_modification_time, "2021-01-02 00:00:00.000000");
    }

    #[test]
    fn single_record_is_selected_without_parsing() {
        let record = info_record(Uuid::new_v4(), "not a timestamp");
        let winner = select_latest(vec![record.clone()]).expect("select");
        assert_eq!(winner, Some(record));
    }

    #[test]
    fn empty_collection_selects_nothing() {
        assert_eq!(select_latest(Vec::new()).expect("select"), None);
    }

    #[tokio::test]
    async fn collect_keeps_only_matching_request_ids() {
        let bus = MemoryBus::new();
        let broker = MemoryBroker::connect(bus.clone());
        let wanted = Uuid::new_v4();

        for record in [
            info_record(wanted, "2021-01-01 00:00:00.000000"),
            info_record(Uuid::new_v4(), "2021-01-03 00:00:00.000000"),
            info_record(wanted, "2021-01-02 00:00:00.000000"),
        ] {
            broker
                .send(topics::INFO_RESPONSE_TOPIC, &record.encode().expect("encode"))
                .await
                .expect("send");
        }
        broker
            .send(topics::INFO_RESPONSE_TOPIC, b"garbage")
            .await
            .expect("send");

        let consumer = MemoryBroker::connect(bus.clone());
        let records = collect_info(&consumer, "cb-ctl:test", wanted, Duration::from_millis(50))
            .await
            .expect("collect");

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.request_id == wanted));
        // Decodable messages were committed for this group.
        assert!(bus.committed(topics::INFO_RESPONSE_TOPIC, "cb-ctl:test") >= 3);
    }
}
