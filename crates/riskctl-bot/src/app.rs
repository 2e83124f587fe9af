//! Main application orchestration.
//!
//! Builds the shared job context from configuration, registers every
//! enabled job with the scheduler, and runs until a shutdown signal:
//! - Broker gateway, account store and audit log
//! - Monitors, session jobs, order history and heartbeat
//! - Prometheus endpoint
//! - Bounded shutdown of in-flight job instances

use std::sync::Arc;
use std::time::Duration;

use riskctl_broker::DhanClient;
use riskctl_core::SessionCalendar;
use riskctl_jobs::{
    AccountLogger, AutoStopLossMonitor, HeartbeatJob, JobContext, OrderCountMonitor,
    OrderHistoryJob, QuickExitMonitor, SessionCloseRestore, SessionOpenReset,
};
use riskctl_persistence::{AccountStore, DynAccountRepository, JsonLinesAuditLog};
use riskctl_risk::StopLossCalculator;
use riskctl_scheduler::{DynScheduledJob, Scheduler, Trigger};
use riskctl_telemetry::serve_metrics;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, JobSettings};
use crate::error::AppResult;

/// Main application.
pub struct Application {
    config: AppConfig,
    ctx: JobContext,
    accounts: DynAccountRepository,
    run_id: Uuid,
}

impl Application {
    /// Create a new application. Opens the account store and audit log;
    /// no broker call is made until the scheduler starts.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let broker = Arc::new(DhanClient::new(&config.broker)?);
        let accounts: DynAccountRepository =
            Arc::new(AccountStore::open(&config.persistence.accounts_file)?);
        let audit = Arc::new(JsonLinesAuditLog::open(&config.persistence.audit_dir)?);
        let calendar = SessionCalendar::new(config.session.clone())?;
        let stop_loss = StopLossCalculator::new(&config.stop_loss)?;

        let ctx = JobContext::new(broker, accounts.clone(), audit, calendar, stop_loss)
            .with_accounting(config.accounting.clone())
            .with_fan_out(config.jobs.fan_out)
            .with_call_timeout(Duration::from_secs(config.broker.timeout_secs));

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            accounts_file = %config.persistence.accounts_file,
            audit_dir = %config.persistence.audit_dir,
            broker = %config.broker.base_url,
            "Application initialized"
        );

        Ok(Self {
            config,
            ctx,
            accounts,
            run_id,
        })
    }

    /// Scheduler with every enabled job registered, not yet started.
    pub fn build_scheduler(&self) -> AppResult<Scheduler> {
        let jobs = &self.config.jobs;
        let mut scheduler = Scheduler::new();

        register(
            &mut scheduler,
            Arc::new(OrderCountMonitor::new(self.ctx.clone())),
            &jobs.order_count,
        )?;
        register(
            &mut scheduler,
            Arc::new(QuickExitMonitor::new(self.ctx.clone())),
            &jobs.quick_exit,
        )?;
        register(
            &mut scheduler,
            Arc::new(AutoStopLossMonitor::new(self.ctx.clone())),
            &jobs.auto_stop_loss,
        )?;
        register(
            &mut scheduler,
            Arc::new(AccountLogger::new(self.ctx.clone())),
            &jobs.account_logger,
        )?;
        register(
            &mut scheduler,
            Arc::new(SessionOpenReset::new(self.accounts.clone())),
            &jobs.session_open,
        )?;
        register(
            &mut scheduler,
            Arc::new(SessionCloseRestore::new(
                self.accounts.clone(),
                self.config.operator.dev_admin.clone(),
            )),
            &jobs.session_close,
        )?;
        register(
            &mut scheduler,
            Arc::new(OrderHistoryJob::new(self.ctx.clone())),
            &jobs.order_history,
        )?;

        let heartbeat = &self.config.heartbeat;
        match &heartbeat.url {
            Some(url) => {
                let job = HeartbeatJob::new(url.as_str(), Duration::from_secs(heartbeat.timeout_secs))?;
                scheduler.register_job(
                    Arc::new(job),
                    Trigger::every_secs(heartbeat.interval_secs)?,
                    1,
                )?;
            }
            None => info!("Heartbeat disabled, no URL configured"),
        }

        Ok(scheduler)
    }

    /// Run until Ctrl-C, then drain in-flight job instances.
    pub async fn run(self) -> AppResult<()> {
        let mut scheduler = self.build_scheduler()?;
        let shutdown = CancellationToken::new();

        let metrics_port = self.config.telemetry.metrics_port;
        let metrics_server = (metrics_port != 0)
            .then(|| tokio::spawn(serve_metrics(metrics_port, shutdown.clone())));

        scheduler.start()?;
        info!(
            run_id = %self.run_id,
            jobs = ?scheduler.job_names(),
            "Scheduler started"
        );

        tokio::signal::ctrl_c().await?;
        info!(run_id = %self.run_id, "Shutdown signal received");

        let grace = Duration::from_secs(self.config.shutdown.grace_secs);
        let report = scheduler.shutdown(true, grace).await;
        if report.completed_cleanly {
            info!("All job instances finished");
        } else {
            warn!(
                abandoned = report.abandoned,
                grace_secs = self.config.shutdown.grace_secs,
                "Shutdown grace period elapsed with job instances still running"
            );
        }

        shutdown.cancel();
        if let Some(handle) = metrics_server {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Metrics server failed"),
                Err(e) => error!(error = %e, "Metrics server task panicked"),
            }
        }

        info!(run_id = %self.run_id, "Application stopped");
        Ok(())
    }
}

fn register(
    scheduler: &mut Scheduler,
    job: DynScheduledJob,
    settings: &JobSettings,
) -> AppResult<()> {
    if !settings.enabled {
        info!(job = job.name(), "Job disabled");
        return Ok(());
    }
    let trigger = settings.trigger.build()?;
    scheduler.register_job(job, trigger, settings.max_instances)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.persistence.accounts_file = dir
            .path()
            .join("accounts.json")
            .to_string_lossy()
            .into_owned();
        config.persistence.audit_dir = dir.path().join("audit").to_string_lossy().into_owned();
        config.telemetry.metrics_port = 0;
        config
    }

    #[test]
    fn test_registers_every_enabled_job() {
        let dir = TempDir::new().unwrap();
        let app = Application::new(config_in(&dir)).unwrap();

        let scheduler = app.build_scheduler().unwrap();
        let mut names = scheduler.job_names();
        names.sort();

        assert_eq!(
            names,
            vec![
                AccountLogger::NAME,
                AutoStopLossMonitor::NAME,
                OrderCountMonitor::NAME,
                OrderHistoryJob::NAME,
                QuickExitMonitor::NAME,
                SessionCloseRestore::NAME,
                SessionOpenReset::NAME,
            ]
        );
    }

    #[test]
    fn test_disabled_job_and_heartbeat() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.jobs.auto_stop_loss.enabled = false;
        config.heartbeat.url = Some("http://127.0.0.1:9/ping".to_string());
        let app = Application::new(config).unwrap();

        let names = app.build_scheduler().unwrap().job_names();

        assert!(!names.iter().any(|n| n == AutoStopLossMonitor::NAME));
        assert!(names.iter().any(|n| n == HeartbeatJob::NAME));
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn test_invalid_trigger_fails_startup() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.jobs.session_open.trigger = riskctl_scheduler::TriggerConfig::weekdays_at(24, 0);
        let app = Application::new(config).unwrap();

        assert!(app.build_scheduler().is_err());
    }
}
