//! Cost report of persisted rounds

use ecsub_core::cost::{CostReport, aggregate_cost};
use std::path::Path;

use crate::error::SummaryError;
use crate::repository::SummaryStore;

/// Cost of one persisted round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundCost {
    pub cluster_name: String,
    pub round: u32,
    pub report: CostReport,
}

/// Costs of every round of a task, in round order
pub fn round_costs(
    store: &dyn SummaryStore,
    workdir: &Path,
    task_name: &str,
) -> Result<Vec<RoundCost>, SummaryError> {
    let mut costs: Vec<RoundCost> = store
        .load_all(workdir, task_name)?
        .iter()
        .map(|summary| RoundCost {
            cluster_name: summary.cluster_name.clone(),
            round: summary.round,
            report: aggregate_cost(summary),
        })
        .collect();

    costs.sort_by_key(|c| c.round);
    Ok(costs)
}
