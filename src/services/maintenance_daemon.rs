//! Background maintenance daemon.
//!
//! Runs the periodic, idempotent sweeps the subsystem relies on:
//! - Expiring overdue sessions
//! - Draining the archive outbox (with retry of failed writes)
//! - Expiring overdue invitations
//!
//! Every sweep is safe to run repeatedly and concurrently with live
//! request traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Instant};
use tracing::{error, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::MaintenanceConfig;
use crate::services::archiver::{ArchiveReport, Archiver};
use crate::services::invitation_service::InvitationService;
use crate::services::session_service::SessionService;

/// What one maintenance cycle accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired_sessions: u64,
    pub archive: ArchiveReport,
    pub expired_invitations: u64,
}

/// Event emitted by the maintenance daemon.
#[derive(Debug, Clone)]
pub enum MaintenanceEvent {
    Started,
    CycleStarted { run_number: u64 },
    CycleCompleted {
        run_number: u64,
        report: MaintenanceReport,
        duration_ms: u64,
    },
    CycleFailed { run_number: u64, error: String },
    Stopped { reason: StopReason },
}

/// Reason the daemon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TooManyFailures,
}

/// Status of the maintenance daemon.
#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub running: bool,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<Instant>,
}

/// Handle to control the daemon.
pub struct DaemonHandle {
    stop_flag: Arc<AtomicBool>,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    /// Request the daemon to stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

/// Periodic maintenance loop.
pub struct MaintenanceDaemon {
    sessions: Arc<SessionService>,
    archiver: Arc<Archiver>,
    invitations: Arc<InvitationService>,
    config: MaintenanceConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
}

impl MaintenanceDaemon {
    pub fn new(
        sessions: Arc<SessionService>,
        archiver: Arc<Archiver>,
        invitations: Arc<InvitationService>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            sessions,
            archiver,
            invitations,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle to control the daemon.
    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
        }
    }

    /// Run one maintenance cycle immediately.
    pub async fn run_cycle(&self) -> DomainResult<MaintenanceReport> {
        let now = Utc::now();
        let expired_sessions = self.sessions.expire_overdue(now).await?;
        let archive = self.archiver.process_pending().await?;
        let expired_invitations = self.invitations.expire_overdue(now).await?;

        Ok(MaintenanceReport {
            expired_sessions,
            archive,
            expired_invitations,
        })
    }

    /// Run the daemon, returning a channel for events.
    pub async fn run(self) -> mpsc::Receiver<MaintenanceEvent> {
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            self.run_loop(tx).await;
        });

        rx
    }

    async fn run_loop(self, tx: mpsc::Sender<MaintenanceEvent>) {
        {
            let mut status = self.status.write().await;
            status.running = true;
        }

        let _ = tx.send(MaintenanceEvent::Started).await;

        let mut consecutive_failures = 0u32;
        let mut interval_timer =
            interval(Duration::from_secs(u64::from(self.config.interval_seconds)));
        // The first tick completes immediately; consume it so the
        // startup cycle does not run twice.
        interval_timer.tick().await;

        if self.config.run_on_startup {
            self.run_one(&tx, &mut consecutive_failures).await;
        }

        let mut reason = StopReason::Requested;

        loop {
            interval_timer.tick().await;

            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }

            self.run_one(&tx, &mut consecutive_failures).await;

            if consecutive_failures >= self.config.max_consecutive_failures {
                reason = StopReason::TooManyFailures;
                break;
            }
        }

        {
            let mut status = self.status.write().await;
            status.running = false;
        }

        let _ = tx.send(MaintenanceEvent::Stopped { reason }).await;
    }

    async fn run_one(
        &self,
        tx: &mpsc::Sender<MaintenanceEvent>,
        consecutive_failures: &mut u32,
    ) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.last_run = Some(Instant::now());
            status.total_runs
        };

        let _ = tx.send(MaintenanceEvent::CycleStarted { run_number }).await;
        let started = Instant::now();

        match self.run_cycle().await {
            Ok(report) => {
                *consecutive_failures = 0;
                {
                    let mut status = self.status.write().await;
                    status.successful_runs += 1;
                }
                info!(
                    run_number,
                    expired_sessions = report.expired_sessions,
                    archived = report.archive.archived,
                    expired_invitations = report.expired_invitations,
                    "Maintenance cycle finished"
                );
                let _ = tx
                    .send(MaintenanceEvent::CycleCompleted {
                        run_number,
                        report,
                        duration_ms: started.elapsed().as_millis() as u64,
                    })
                    .await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                {
                    let mut status = self.status.write().await;
                    status.failed_runs += 1;
                }
                error!(run_number, error = %e, "Maintenance cycle failed");
                let _ = tx
                    .send(MaintenanceEvent::CycleFailed {
                        run_number,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }
}
