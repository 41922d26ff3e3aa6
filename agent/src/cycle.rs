//! One poll cycle: list units, fetch and type their variables, derive power,
//! publish the batch.
use crate::normalize::normalize_vars;
use crate::nut::{NutError, UpsDaemon, VariableSet};
use crate::power::derive_real_power;
use crate::publish::{publish_contained, Publisher};
use crate::record::{MetricBatch, MetricRecord};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Rated wattage per UPS name, loaded once at startup.
pub type MaxWatts = BTreeMap<String, u32>;

#[derive(Debug)]
pub enum CycleOutcome {
    Published { records: usize },
    PublishFailed { records: usize },
    /// The daemon reported stale data; nothing was published.
    Stale,
    /// A daemon query failed; the partial batch was dropped.
    Aborted(NutError),
}

pub fn build_record(ups: &str, raw: VariableSet, max_watts: Option<u32>) -> MetricRecord {
    let variables = normalize_vars(raw);
    let real_power = derive_real_power(&variables, max_watts);
    MetricRecord::new(ups, variables).with_real_power(real_power)
}

/// Query every unit in the order the daemon lists them.
pub async fn collect_batch<D: UpsDaemon>(daemon: &mut D, max_watts: &MaxWatts) -> Result<MetricBatch, NutError> {
    let units = daemon.list_ups().await?;
    let mut batch = Vec::with_capacity(units.len());
    for unit in units {
        let raw = daemon.list_vars(&unit.name).await?;
        batch.push(build_record(&unit.name, raw, max_watts.get(&unit.name).copied()));
    }
    Ok(batch)
}

pub async fn poll_cycle<D: UpsDaemon, P: Publisher>(
    daemon: &mut D,
    max_watts: &MaxWatts,
    publisher: &P,
) -> CycleOutcome {
    info!("polling");
    let batch = match collect_batch(daemon, max_watts).await {
        Ok(batch) => batch,
        Err(e) if e.is_stale() => {
            debug!("daemon data is stale, skipping cycle");
            return CycleOutcome::Stale;
        }
        Err(e) => {
            error!(error = %e, "poll cycle aborted");
            return CycleOutcome::Aborted(e);
        }
    };

    match serde_json::to_string(&batch) {
        Ok(json) => info!(records = batch.len(), batch = %json, "collected metrics"),
        Err(e) => warn!(error = %e, "could not render batch for logging"),
    }

    let records = batch.len();
    if publish_contained(publisher, &batch).await {
        CycleOutcome::Published { records }
    } else {
        CycleOutcome::PublishFailed { records }
    }
}
