//! Node topology updater
//!
//! Long-running reconciliation loop. Each cycle asks the hinter for the
//! required frequencies, takes a snapshot of eligible nodes and patches the
//! frequency labels of every node that drifted. Runs as a tokio event loop
//! on a jittered schedule.

use super::jitter::{deadline_after, JitterSchedule, DEFAULT_JITTER_FACTOR};
use super::metrics;
use super::stats::{CycleReport, CycleStats};
use crate::client::{NodePatcher, NodeStore};
use crate::node::{Frequency, Node};
use crate::topology::{
    build_node_patch, calculate_node_label_changes, filter_nodes, has_invtsc_frequency,
    patched_label_keys, required_frequencies, Hinter, ScalingPolicy,
};
use crate::{FreqSyncError, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

/// Default reconciliation interval (30 seconds)
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Default event channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Updater configuration
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Maximum jitter as a multiple of the interval
    pub jitter_factor: f64,

    /// Which required frequencies scalable nodes advertise
    pub scaling_policy: ScalingPolicy,

    /// Compute patches without submitting them
    pub dry_run: bool,

    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            jitter_factor: DEFAULT_JITTER_FACTOR,
            scaling_policy: ScalingPolicy::default(),
            dry_run: false,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl UpdaterConfig {
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    pub fn with_scaling_policy(mut self, policy: ScalingPolicy) -> Self {
        self.scaling_policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Events emitted by the updater
#[derive(Debug, Clone)]
pub enum UpdaterEvent {
    /// Loop started
    Started,

    /// Loop stopped
    Stopped,

    /// Cycle started
    CycleStarted,

    /// A node was patched (or would have been, in dry-run mode)
    NodeUpdated {
        node: String,
        /// Label keys set or removed by the patch
        labels: BTreeSet<String>,
        dry_run: bool,
    },

    /// A node could not be reconciled
    NodeFailed { node: String, message: String },

    /// Cycle completed
    CycleCompleted(CycleReport),
}

/// Commands accepted while the loop is running
#[derive(Debug, Clone)]
pub enum UpdaterCommand {
    /// Run a cycle now; the next scheduled cycle is measured from its end
    SyncNow,

    /// Stop the loop
    Shutdown,

    /// Change the reconciliation interval
    SetInterval(Duration),
}

/// What happened to a single node
#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeOutcome {
    Updated { labels: BTreeSet<String> },
    Skipped,
}

/// Reconciles TSC frequency labels on every eligible node
pub struct NodeTopologyUpdater {
    config: UpdaterConfig,
    nodes: Arc<dyn NodeStore>,
    hinter: Arc<dyn Hinter>,
    patcher: Arc<dyn NodePatcher>,
    event_tx: broadcast::Sender<UpdaterEvent>,
    command_rx: Option<mpsc::Receiver<UpdaterCommand>>,
    command_tx: mpsc::Sender<UpdaterCommand>,
    last_report: Option<CycleReport>,
    running: bool,
}

impl NodeTopologyUpdater {
    pub fn new(
        config: UpdaterConfig,
        nodes: Arc<dyn NodeStore>,
        hinter: Arc<dyn Hinter>,
        patcher: Arc<dyn NodePatcher>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(10);

        Self {
            config,
            nodes,
            hinter,
            patcher,
            event_tx,
            command_rx: Some(command_rx),
            command_tx,
            last_report: None,
            running: false,
        }
    }

    /// Get an event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<UpdaterEvent> {
        self.event_tx.subscribe()
    }

    /// Get a command sender
    pub fn command_sender(&self) -> mpsc::Sender<UpdaterCommand> {
        self.command_tx.clone()
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Report of the most recent cycle
    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn send_event(&self, event: UpdaterEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("Event sent but no receivers subscribed");
        }
    }

    /// Run cycles every `interval` (plus jitter) until `stop` resolves
    ///
    /// The first cycle starts immediately. `stop` is observed between
    /// cycles only: a running cycle always completes.
    pub async fn run<F>(&mut self, interval: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| FreqSyncError::Config("Updater already running".to_string()))?;

        self.running = true;
        metrics::set_health_status(true);
        self.send_event(UpdaterEvent::Started);
        tracing::info!(
            interval_secs = interval.as_secs_f64(),
            jitter_factor = self.config.jitter_factor,
            dry_run = self.config.dry_run,
            "Node topology updater started"
        );

        let mut schedule = JitterSchedule::new(interval, self.config.jitter_factor);
        tokio::pin!(stop);

        'cycles: loop {
            tokio::select! {
                biased;
                _ = &mut stop => break 'cycles,
                _ = std::future::ready(()) => {}
            }

            self.run_cycle().await;

            let sleep = tokio::time::sleep_until(deadline_after(schedule.next_delay()));
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop => break 'cycles,
                    _ = &mut sleep => break,
                    Some(cmd) = command_rx.recv() => match cmd {
                        UpdaterCommand::SyncNow => {
                            self.run_cycle().await;
                            sleep.as_mut().reset(deadline_after(schedule.next_delay()));
                        }
                        UpdaterCommand::Shutdown => {
                            tracing::info!("Received shutdown command");
                            break 'cycles;
                        }
                        UpdaterCommand::SetInterval(period) => {
                            tracing::info!(interval_secs = period.as_secs_f64(), "Interval changed");
                            schedule = JitterSchedule::new(period, self.config.jitter_factor);
                            sleep.as_mut().reset(deadline_after(schedule.next_delay()));
                        }
                    },
                }
            }
        }

        self.command_rx = Some(command_rx);
        self.running = false;
        metrics::set_health_status(false);
        self.send_event(UpdaterEvent::Stopped);
        tracing::info!("Node topology updater stopped");
        Ok(())
    }

    /// Execute a single reconciliation cycle
    ///
    /// Nodes are processed one after another; a failure on one node is
    /// counted and logged, and the cycle carries on with the next.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.send_event(UpdaterEvent::CycleStarted);
        let started_at = Utc::now();
        let start = Instant::now();

        let required = required_frequencies(self.hinter.as_ref());
        let nodes = filter_nodes(&self.nodes.list(), &[has_invtsc_frequency]);
        tracing::debug!(
            eligible = nodes.len(),
            required = ?required,
            "Starting TSC frequency reconciliation"
        );

        let mut stats = CycleStats::default();
        for node in &nodes {
            match self.reconcile_node(node, &required).await {
                Ok(NodeOutcome::Updated { labels }) => {
                    stats.record_updated();
                    self.send_event(UpdaterEvent::NodeUpdated {
                        node: node.name().to_string(),
                        labels,
                        dry_run: self.config.dry_run,
                    });
                }
                Ok(NodeOutcome::Skipped) => stats.record_skipped(),
                Err(e) => {
                    stats.record_error();
                    if e.is_capability_error() {
                        tracing::error!(node = node.name(), error = %e, "Could not calculate TSC frequencies for node");
                    } else {
                        tracing::error!(node = node.name(), error = %e, "Could not patch TSC frequencies for node");
                    }
                    metrics::record_node_error(e.kind());
                    self.send_event(UpdaterEvent::NodeFailed {
                        node: node.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let report = CycleReport {
            stats,
            eligible: nodes.len(),
            required: required.into_iter().collect(),
            started_at,
            duration: start.elapsed(),
            dry_run: self.config.dry_run,
        };

        tracing::info!(
            updated = stats.updated,
            skipped = stats.skipped,
            errors = stats.error,
            dry_run = report.dry_run,
            "{}",
            report.summary()
        );
        metrics::record_cycle(&report);
        self.send_event(UpdaterEvent::CycleCompleted(report.clone()));
        self.last_report = Some(report.clone());

        report
    }

    /// Reconcile one node
    async fn reconcile_node(
        &self,
        node: &Node,
        required: &BTreeSet<Frequency>,
    ) -> Result<NodeOutcome> {
        let modified = calculate_node_label_changes(node, required, self.config.scaling_policy)?;

        let Some(patch) = build_node_patch(node, &modified)? else {
            return Ok(NodeOutcome::Skipped);
        };
        let labels = patched_label_keys(&patch);

        if self.config.dry_run {
            tracing::info!(node = node.name(), patch = %patch, "Dry run: would patch node");
            return Ok(NodeOutcome::Updated { labels });
        }

        self.patcher.patch_node(node.name(), &patch).await?;
        tracing::debug!(node = node.name(), labels = ?labels, "Patched TSC frequency labels");

        Ok(NodeOutcome::Updated { labels })
    }
}
