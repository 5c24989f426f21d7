//! Polling engine - bounded fan-out of probes across the fleet
//!
//! - One task per host, admitted through a counting semaphore (`concurrency_limit`)
//! - Per-host bounded retry loop driven by `RetryPolicy`
//! - Exactly one recorded observation per host and run, success or failure
//! - Host failures stay host-scoped; only an unreachable inventory or store aborts a run

use crate::classifier::classify;
use crate::probe::Probe;
use crate::recorder::Recorder;
use crate::retry::RetryPolicy;
use crate::transport::{FailureKind, RemoteShell};
use netwatch_common::{ConnectionState, HostTarget, InventoryError, InventorySource, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub concurrency_limit: usize,
    pub retry: RetryPolicy,
    pub probe_timeout: Duration,
}

/// Configuration-level failures that abort a run before any host is polled
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot obtain inventory: {0}")]
    Inventory(#[from] InventoryError),
    #[error("history store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Terminal result for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutcome {
    pub alias: String,
    pub state: ConnectionState,
    pub attempts: u32,
    pub recorded: bool,
}

/// Aggregated counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub hosts: usize,
    pub established: usize,
    pub syn_sent: usize,
    pub no_master: usize,
    pub invalid_address: usize,
    pub connect_failed: usize,
    pub command_failed: usize,
    pub other: usize,
    pub probe_attempts: u64,
    pub record_failures: usize,
    pub aborted_tasks: usize,
}

impl RunSummary {
    fn add(&mut self, outcome: &HostOutcome) {
        self.hosts += 1;
        self.probe_attempts += u64::from(outcome.attempts);
        if !outcome.recorded {
            self.record_failures += 1;
        }
        match outcome.state {
            ConnectionState::Established => self.established += 1,
            ConnectionState::SynSent => self.syn_sent += 1,
            ConnectionState::NoMaster => self.no_master += 1,
            ConnectionState::InvalidAddress => self.invalid_address += 1,
            ConnectionState::ConnectFailed => self.connect_failed += 1,
            ConnectionState::CommandFailed => self.command_failed += 1,
            ConnectionState::Other(_) => self.other += 1,
        }
    }
}

pub struct PollingEngine<S> {
    probe: Arc<Probe<S>>,
    recorder: Recorder,
    settings: Arc<EngineSettings>,
}

impl<S: RemoteShell> PollingEngine<S> {
    pub fn new(probe: Probe<S>, recorder: Recorder, settings: EngineSettings) -> Self {
        let settings = EngineSettings {
            concurrency_limit: settings.concurrency_limit.clamp(1, Semaphore::MAX_PERMITS),
            retry: settings.retry.normalized(),
            probe_timeout: settings.probe_timeout,
        };
        Self { probe: Arc::new(probe), recorder, settings: Arc::new(settings) }
    }

    /// Full run: checks the store, fetches the inventory, then polls every host
    pub async fn poll_fleet(&self, inventory: &InventorySource) -> Result<RunSummary, EngineError> {
        let store = self.recorder.store().clone();
        match tokio::task::spawn_blocking(move || store.ping()).await {
            Ok(result) => result?,
            Err(e) => return Err(StoreError::Unreachable(format!("ping task aborted: {e}")).into()),
        }

        let targets = inventory.fetch().await?;
        Ok(self.run(targets).await)
    }

    /// Repeats `poll_fleet` every `period` until `shutdown` resolves.
    /// `shutdown` is watched during runs too: an in-flight run is dropped, which aborts its
    /// host tasks and kills their remote sessions.
    pub async fn run_periodic<F>(&self, inventory: &InventorySource, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = interval(period);
        // a run longer than the period delays the next one instead of stacking
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping poller");
                    return;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                result = self.poll_fleet(inventory) => {
                    if let Err(e) = result {
                        error!("Poll run aborted: {}", e);
                    }
                }
                _ = &mut shutdown => {
                    warn!("Shutdown requested during a poll run, abandoning it");
                    return;
                }
            }
        }
    }

    /// Polls every target; returns once each admitted task has finished
    pub async fn run(&self, targets: Vec<HostTarget>) -> RunSummary {
        let limiter = Arc::new(Semaphore::new(self.settings.concurrency_limit));
        let mut tasks = JoinSet::new();
        info!(
            hosts = targets.len(),
            concurrency = self.settings.concurrency_limit,
            max_attempts = self.settings.retry.max_attempts,
            "starting poll run"
        );

        for target in targets {
            // the permit moves into the task and is released when it ends, panics included
            let permit = match limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("admission semaphore closed, stopping admission");
                    break;
                }
            };
            let probe = self.probe.clone();
            let recorder = self.recorder.clone();
            let settings = self.settings.clone();
            tasks.spawn(async move {
                let _permit = permit;
                poll_host(&probe, &recorder, &settings, target).await
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    debug!(host = %outcome.alias, attempts = outcome.attempts, state = outcome.state.as_str(), "host done");
                    summary.add(&outcome);
                }
                Err(e) => {
                    error!("host task aborted: {e}");
                    summary.aborted_tasks += 1;
                }
            }
        }

        info!(
            hosts = summary.hosts,
            established = summary.established,
            syn_sent = summary.syn_sent,
            no_master = summary.no_master,
            invalid_address = summary.invalid_address,
            connect_failed = summary.connect_failed,
            command_failed = summary.command_failed,
            other = summary.other,
            probe_attempts = summary.probe_attempts,
            record_failures = summary.record_failures,
            aborted_tasks = summary.aborted_tasks,
            "poll run complete"
        );
        summary
    }
}

async fn poll_host<S: RemoteShell>(
    probe: &Probe<S>,
    recorder: &Recorder,
    settings: &EngineSettings,
    target: HostTarget,
) -> HostOutcome {
    let Some(address) = target.probe_address().map(str::to_owned) else {
        warn!(host = %target.alias, address = %target.address.value, "invalid address, skipping probe");
        let recorded = recorder
            .record(&target, String::new(), ConnectionState::InvalidAddress)
            .await
            .is_ok();
        return HostOutcome {
            alias: target.alias,
            state: ConnectionState::InvalidAddress,
            attempts: 0,
            recorded,
        };
    };

    let mut attempts = 0;
    let (peer_address, state) = loop {
        attempts += 1;
        debug!(host = %target.alias, %address, attempt = attempts, "connecting");

        match probe.probe(&address, settings.probe_timeout).await {
            Ok(raw) => {
                let found = classify(&raw);
                break (found.peer_address, found.state);
            }
            Err(failure) => {
                let state = match failure.kind {
                    FailureKind::Connect => ConnectionState::ConnectFailed,
                    FailureKind::Command => ConnectionState::CommandFailed,
                };
                if !settings.retry.should_retry(attempts) {
                    warn!(
                        host = %target.alias,
                        %address,
                        attempts,
                        state = state.as_str(),
                        "giving up: {}",
                        failure.cause
                    );
                    break (String::new(), state);
                }
                let delay = settings.retry.delay_for(attempts);
                warn!(
                    host = %target.alias,
                    %address,
                    attempt = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "probe failed: {}",
                    failure.cause
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    let recorded = recorder.record(&target, peer_address, state.clone()).await.is_ok();
    HostOutcome { alias: target.alias, state, attempts, recorded }
}
