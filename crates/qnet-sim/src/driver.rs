//! Simulation driver.
//!
//! Ties the pieces together: builds the network from a [`SimConfig`],
//! partitions circuits, submits their operations to the scheduler and
//! collects metrics once the schedule drains.

use std::fmt;

use qnet_compile::{PartitionPlan, PartitionStats, Partitioner, PlannedOpKind};
use qnet_core::{ProtocolEngine, ProtocolKind, SimTime};
use qnet_ir::{Circuit, GateKind};
use qnet_sched::{
    Endpoint, OperationId, OperationRequest, OperationStatus, Outcome, Priority, ScheduleLedger,
    Scheduler,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::metrics::SimulationMetrics;
use crate::report::SimulationReport;
use crate::workload;

/// Handle to one submission: a circuit or a single protocol request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleHandle(pub u64);

impl fmt::Display for ScheduleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// What a handle refers to.
#[derive(Debug, Clone)]
struct Submission {
    name: String,
    operations: Vec<OperationId>,
    plan: Option<PartitionStats>,
}

/// Progress and results of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleSummary {
    /// The handle.
    pub handle: ScheduleHandle,
    /// Circuit name or operation label.
    pub name: String,
    /// Operations submitted under the handle.
    pub operations: usize,
    /// Completed operations.
    pub completed: usize,
    /// Failed operations.
    pub failed: usize,
    /// Cancelled operations.
    pub cancelled: usize,
    /// Operations not yet terminal.
    pub outstanding: usize,
    /// Earliest start among operations that ran.
    pub start_time: Option<SimTime>,
    /// Latest end among terminal operations.
    pub end_time: Option<SimTime>,
    /// Product of completed operation fidelities.
    pub fidelity: Option<f64>,
    /// Partition stats for circuit submissions.
    pub partition: Option<PartitionStats>,
}

impl HandleSummary {
    /// Whether every operation completed.
    pub fn succeeded(&self) -> bool {
        self.completed == self.operations
    }
}

/// One simulation run.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    scheduler: Scheduler,
    partitioner: Partitioner,
    submissions: Vec<Submission>,
    rng: StdRng,
}

impl Simulation {
    /// Validate `config` and build the network it describes.
    pub fn build_network(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let network = config.network.build_network()?;
        let engine = ProtocolEngine::new(config.protocol.clone());
        let scheduler = Scheduler::new(network, engine, config.scheduler.clone());
        let partitioner = Partitioner::new(config.partition.partitioner_config());
        let rng = match config.network.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            nodes = config.network.nodes,
            capacity = scheduler.registry().total_capacity(),
            seed = ?config.network.seed,
            "Simulation ready"
        );
        Ok(Self {
            config,
            scheduler,
            partitioner,
            submissions: Vec::new(),
            rng,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable access to the scheduler, for cancellation and manual ticks.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Partition a circuit against the network, without submitting it.
    pub fn plan(&self, circuit: &Circuit) -> SimResult<PartitionPlan> {
        let capacities = self.scheduler.registry().capacities();
        let plan = match self.config.partition.partitions {
            Some(k) => self.partitioner.partition_into(circuit, &capacities, k)?,
            None => self.partitioner.partition(circuit, &capacities)?,
        };
        Ok(plan)
    }

    /// Partition a circuit and submit its operations.
    pub fn submit_circuit(
        &mut self,
        circuit: &Circuit,
        priority: Priority,
    ) -> SimResult<ScheduleHandle> {
        let plan = self.plan(circuit)?;
        let mut ids: Vec<OperationId> = Vec::with_capacity(plan.operations.len());

        for op in &plan.operations {
            let request = match &op.kind {
                PlannedOpKind::Local { gate } => OperationRequest::step(gate.clone(), op.qubits.clone()),
                PlannedOpKind::Communication { protocol, gate } => {
                    let &[source, target] = op.qubits.as_slice() else {
                        return Err(SimError::Config(format!(
                            "{} carries {} qubits",
                            op.id,
                            op.qubits.len()
                        )));
                    };
                    match protocol {
                        ProtocolKind::TeleData => OperationRequest::teleport(source, target),
                        ProtocolKind::TeleGate => {
                            OperationRequest::remote_gate(gate.clone(), source, target)
                        }
                    }
                }
            };
            let predecessors = op
                .predecessors
                .iter()
                .map(|p| {
                    ids.get(p.0).copied().ok_or_else(|| {
                        SimError::Config(format!("{} depends on later {}", op.id, p))
                    })
                })
                .collect::<SimResult<Vec<_>>>()?;

            let request = request
                .with_priority(priority)
                .with_predecessors(predecessors)
                .with_label(format!("{}:{}", circuit.name(), op.id));
            ids.push(self.scheduler.submit(request)?);
        }

        info!(
            circuit = circuit.name(),
            operations = ids.len(),
            overhead = plan.stats.communication_overhead_ratio,
            "Circuit submitted"
        );
        Ok(self.register(circuit.name().to_string(), ids, Some(plan.stats)))
    }

    /// Submit one protocol run between two endpoints.
    ///
    /// TeleGate requests apply a CNOT.
    pub fn submit_protocol(
        &mut self,
        kind: ProtocolKind,
        source: impl Into<Endpoint>,
        target: impl Into<Endpoint>,
    ) -> SimResult<ScheduleHandle> {
        let request = match kind {
            ProtocolKind::TeleData => OperationRequest::teleport(source, target),
            ProtocolKind::TeleGate => OperationRequest::remote_gate(GateKind::CX, source, target),
        };
        self.submit_request(request)
    }

    /// Submit an arbitrary operation request under its own handle.
    pub fn submit_request(&mut self, request: OperationRequest) -> SimResult<ScheduleHandle> {
        let name = request
            .label
            .clone()
            .unwrap_or_else(|| request.kind.name());
        let request = if request.priority == Priority::DEFAULT {
            request.with_priority(self.config.scheduler.default_priority)
        } else {
            request
        };
        let id = self.scheduler.submit(request)?;
        Ok(self.register(name, vec![id], None))
    }

    /// Submit the configured protocol workload. One handle per operation.
    pub fn submit_protocol_workload(&mut self) -> SimResult<Vec<ScheduleHandle>> {
        let requests = workload::protocol_workload(
            self.scheduler.registry(),
            self.config.workload.operations,
            self.config.workload.remote_gate_share,
            &mut self.rng,
        )?;
        requests
            .into_iter()
            .map(|request| self.submit_request(request))
            .collect()
    }

    /// Submit the configured algorithm circuits. One handle per circuit.
    pub fn submit_algorithm_workload(&mut self) -> SimResult<Vec<ScheduleHandle>> {
        let circuits = workload::algorithm_circuits(&self.config.workload)?;
        let priority = self.config.scheduler.default_priority;
        circuits
            .iter()
            .map(|circuit| self.submit_circuit(circuit, priority))
            .collect()
    }

    /// Run the schedule to completion.
    pub fn run_until_idle(&mut self) -> SimResult<&ScheduleLedger> {
        Ok(self.scheduler.run_until_idle()?)
    }

    /// The ledger so far.
    pub fn ledger(&self) -> &ScheduleLedger {
        self.scheduler.ledger()
    }

    /// Metrics over everything run so far.
    pub fn get_metrics(&self) -> SimulationMetrics {
        let plans: Vec<PartitionStats> = self.submissions.iter().filter_map(|s| s.plan).collect();
        SimulationMetrics::collect(&self.scheduler, &plans)
    }

    /// Issued handles, in submission order.
    pub fn handles(&self) -> impl Iterator<Item = ScheduleHandle> + '_ {
        (0..self.submissions.len()).map(|i| ScheduleHandle(i as u64))
    }

    /// Operations submitted under a handle.
    pub fn handle_operations(&self, handle: ScheduleHandle) -> SimResult<&[OperationId]> {
        Ok(&self.submission(handle)?.operations)
    }

    /// Summarise one submission.
    pub fn handle_summary(&self, handle: ScheduleHandle) -> SimResult<HandleSummary> {
        let submission = self.submission(handle)?;
        let ledger = self.scheduler.ledger();

        let mut summary = HandleSummary {
            handle,
            name: submission.name.clone(),
            operations: submission.operations.len(),
            completed: 0,
            failed: 0,
            cancelled: 0,
            outstanding: 0,
            start_time: None,
            end_time: None,
            fidelity: None,
            partition: submission.plan,
        };
        for id in &submission.operations {
            let terminal = self
                .scheduler
                .status(*id)
                .is_some_and(OperationStatus::is_terminal);
            let Some(entry) = ledger.get(*id).filter(|_| terminal) else {
                summary.outstanding += 1;
                continue;
            };
            match &entry.outcome {
                Outcome::Completed => summary.completed += 1,
                Outcome::Failed { .. } => summary.failed += 1,
                Outcome::Cancelled => summary.cancelled += 1,
            }
            if entry.ran() {
                summary.start_time = Some(
                    summary
                        .start_time
                        .map_or(entry.start_time, |t| t.min(entry.start_time)),
                );
            }
            summary.end_time = Some(
                summary
                    .end_time
                    .map_or(entry.end_time, |t| t.max(entry.end_time)),
            );
            if let Some(f) = entry.fidelity {
                summary.fidelity = Some(summary.fidelity.unwrap_or(1.0) * f);
            }
        }
        Ok(summary)
    }

    /// Full report of the run so far.
    pub fn report(&self) -> SimResult<SimulationReport> {
        let handles = self
            .handles()
            .map(|h| self.handle_summary(h))
            .collect::<SimResult<Vec<_>>>()?;
        Ok(SimulationReport::new(
            self.config.clone(),
            self.get_metrics(),
            handles,
            self.scheduler.ledger().clone(),
        ))
    }

    fn register(
        &mut self,
        name: String,
        operations: Vec<OperationId>,
        plan: Option<PartitionStats>,
    ) -> ScheduleHandle {
        let handle = ScheduleHandle(self.submissions.len() as u64);
        self.submissions.push(Submission {
            name,
            operations,
            plan,
        });
        handle
    }

    fn submission(&self, handle: ScheduleHandle) -> SimResult<&Submission> {
        self.submissions
            .get(handle.0 as usize)
            .ok_or(SimError::HandleNotFound(handle))
    }
}
