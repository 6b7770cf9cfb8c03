//! Metrics aggregation and configuration comparison.

use std::cmp::Ordering;

use qnet_compile::PartitionStats;
use qnet_sched::{Outcome, Scheduler};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Average communication latency above which the network counts as slow.
pub const HIGH_LATENCY_THRESHOLD: f64 = 0.2;

/// Average fidelity below which results count as degraded.
pub const LOW_FIDELITY_THRESHOLD: f64 = 0.95;

/// Links per qubit slot above which resource pressure counts as high.
pub const HIGH_RESOURCE_USAGE_RATIO: f64 = 0.6;

/// Headline figures for one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    /// Mean duration of completed communication operations, or of all
    /// completed operations when none communicated.
    pub latency: f64,
    /// Mean fidelity of completed operations, same selection as `latency`.
    pub fidelity: f64,
    /// Lowest fidelity among the selected operations.
    pub min_fidelity: f64,
    /// Completed operations per simulated second.
    pub throughput: f64,
    /// Communication operations over all operations, across every
    /// partitioned circuit.
    pub communication_overhead_ratio: f64,
    /// Busy node time over available node time.
    pub scheduling_efficiency: f64,
    /// Submitted operations.
    pub total_operations: usize,
    /// Completed operations.
    pub completed: usize,
    /// Failed operations.
    pub failed: usize,
    /// Cancelled operations.
    pub cancelled: usize,
    /// Entanglement links created.
    pub links_created: u64,
    /// Link-generation attempts that failed.
    pub failed_attempts: u64,
    /// Links created per qubit slot.
    pub resource_utilization: f64,
    /// Simulated seconds until the last operation ended.
    pub horizon: f64,
    /// Busy time per node, in node order.
    pub node_busy_time: Vec<f64>,
    /// Flags derived from the figures above.
    pub bottlenecks: Bottlenecks,
}

/// Simple threshold checks on a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bottlenecks {
    /// Average communication latency above [`HIGH_LATENCY_THRESHOLD`].
    pub high_communication_latency: bool,
    /// Average fidelity below [`LOW_FIDELITY_THRESHOLD`].
    pub low_fidelity: bool,
    /// Links per slot above [`HIGH_RESOURCE_USAGE_RATIO`].
    pub high_resource_usage: bool,
}

impl Bottlenecks {
    /// Whether any flag is raised.
    pub fn any(&self) -> bool {
        self.high_communication_latency || self.low_fidelity || self.high_resource_usage
    }
}

impl SimulationMetrics {
    /// Collect metrics from a scheduler and the stats of the partitioned
    /// circuits it ran.
    pub fn collect(scheduler: &Scheduler, plans: &[PartitionStats]) -> Self {
        let ledger = scheduler.ledger();
        let completed: Vec<_> = ledger.completed().collect();
        let communication: Vec<_> = completed
            .iter()
            .copied()
            .filter(|e| e.communication)
            .collect();
        let selected = if communication.is_empty() {
            &completed
        } else {
            &communication
        };

        let latency = mean(selected.iter().map(|e| e.duration()));
        let fidelities: Vec<f64> = selected.iter().filter_map(|e| e.fidelity).collect();
        let fidelity = mean(fidelities.iter().copied());
        let min_fidelity = fidelities.iter().copied().reduce(f64::min).unwrap_or(0.0);

        let horizon = scheduler.now().as_secs();
        let throughput = if horizon > 0.0 {
            completed.len() as f64 / horizon
        } else {
            0.0
        };

        let (cross, total) = plans.iter().fold((0, 0), |(c, t), s| {
            (c + s.cross_node_operation_count, t + s.total_operation_count)
        });
        let communication_overhead_ratio = if total > 0 {
            cross as f64 / total as f64
        } else {
            0.0
        };

        let stats = scheduler.network().entanglement().stats();
        let capacity = f64::from(scheduler.registry().total_capacity().max(1));
        let resource_utilization = stats.links_created as f64 / capacity;

        let bottlenecks = Bottlenecks {
            high_communication_latency: latency > HIGH_LATENCY_THRESHOLD,
            low_fidelity: !selected.is_empty() && fidelity < LOW_FIDELITY_THRESHOLD,
            high_resource_usage: resource_utilization > HIGH_RESOURCE_USAGE_RATIO,
        };

        let metrics = Self {
            latency,
            fidelity,
            min_fidelity,
            throughput,
            communication_overhead_ratio,
            scheduling_efficiency: scheduler.efficiency(),
            total_operations: scheduler.operations().len(),
            completed: completed.len(),
            failed: ledger.failed().count(),
            cancelled: ledger
                .iter()
                .filter(|e| e.outcome == Outcome::Cancelled)
                .count(),
            links_created: stats.links_created,
            failed_attempts: stats.failed_attempts,
            resource_utilization,
            horizon,
            node_busy_time: scheduler
                .node_busy_times()
                .into_iter()
                .map(|(_, busy)| busy)
                .collect(),
            bottlenecks,
        };
        info!(
            latency = metrics.latency,
            fidelity = metrics.fidelity,
            throughput = metrics.throughput,
            efficiency = metrics.scheduling_efficiency,
            overhead = metrics.communication_overhead_ratio,
            "Metrics collected"
        );
        metrics
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// One configuration's row in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    /// Configuration name.
    pub name: String,
    /// Mean communication latency.
    pub avg_latency: f64,
    /// Mean fidelity.
    pub avg_fidelity: f64,
    /// Completed operations per second.
    pub throughput: f64,
    /// Links created per qubit slot.
    pub resource_efficiency: f64,
    /// Busy time over available node time.
    pub scheduling_efficiency: f64,
    /// Operations submitted.
    pub total_operations: usize,
}

/// Ranked comparison of several runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Rows in input order.
    pub entries: Vec<ComparisonEntry>,
    /// Names, best first.
    pub ranking: Vec<String>,
}

impl Comparison {
    /// Best configuration, if any.
    pub fn best(&self) -> Option<&str> {
        self.ranking.first().map(String::as_str)
    }
}

/// Rank runs by fidelity (higher first), then latency (lower first), then
/// throughput (higher first). Full ties keep input order.
pub fn compare_configurations<'a>(
    results: impl IntoIterator<Item = (&'a str, &'a SimulationMetrics)>,
) -> Comparison {
    let entries: Vec<ComparisonEntry> = results
        .into_iter()
        .map(|(name, m)| ComparisonEntry {
            name: name.to_string(),
            avg_latency: m.latency,
            avg_fidelity: m.fidelity,
            throughput: m.throughput,
            resource_efficiency: m.resource_utilization,
            scheduling_efficiency: m.scheduling_efficiency,
            total_operations: m.total_operations,
        })
        .collect();

    let mut order: Vec<&ComparisonEntry> = entries.iter().collect();
    order.sort_by(|a, b| rank(a, b));
    let ranking = order.into_iter().map(|e| e.name.clone()).collect();

    Comparison { entries, ranking }
}

fn rank(a: &ComparisonEntry, b: &ComparisonEntry) -> Ordering {
    b.avg_fidelity
        .total_cmp(&a.avg_fidelity)
        .then_with(|| a.avg_latency.total_cmp(&b.avg_latency))
        .then_with(|| b.throughput.total_cmp(&a.throughput))
}
