//! Background job scheduler owned by the process's composition root.
//!
//! One interval loop per job; a job's next tick waits for the previous run
//! to finish, so at most one instance of a job is in flight at a time.

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cleanup;

pub const DISCOUNT_SWEEP_ID: &str = "discount_sweep";
pub const RETENTION_SWEEP_ID: &str = "retention_sweep";

const DISCOUNT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60); // hourly
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24 * 30); // monthly

#[derive(Clone, Copy, Debug)]
pub struct JobSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub interval: Duration,
}

#[derive(Clone, Debug)]
pub struct JobInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub interval_secs: u64,
    pub running: bool,
}

pub struct Scheduler {
    pool: SqlitePool,
    jobs: Vec<JobSpec>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            jobs: vec![
                JobSpec {
                    id: DISCOUNT_SWEEP_ID,
                    name: "Expired discount sweep",
                    interval: DISCOUNT_SWEEP_INTERVAL,
                },
                JobSpec {
                    id: RETENTION_SWEEP_ID,
                    name: "Ledger and unconfirmed-user retention sweep",
                    interval: RETENTION_SWEEP_INTERVAL,
                },
            ],
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Spawn one interval loop per job. Idempotent: a started scheduler
    /// ignores further calls.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }
        for job in self.jobs.clone() {
            let pool = self.pool.clone();
            let cancel = self.cancel.clone();
            self.handles.push(tokio::spawn(run_job(job, pool, cancel)));
        }
        log::info!("Scheduler started with {} jobs", self.jobs.len());
    }

    /// Cancel all job loops and wait for them to wind down.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        log::info!("Scheduler stopped");
    }

    pub fn list_jobs(&self) -> Vec<JobInfo> {
        let running = !self.handles.is_empty();
        self.jobs
            .iter()
            .map(|job| JobInfo {
                id: job.id,
                name: job.name,
                interval_secs: job.interval.as_secs(),
                running,
            })
            .collect()
    }
}

async fn run_job(job: JobSpec, pool: SqlitePool, cancel: CancellationToken) {
    log::info!(
        "Job {} scheduled every {} seconds",
        job.id,
        job.interval.as_secs()
    );
    let mut interval = tokio::time::interval(job.interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("Job {} stopping", job.id);
                break;
            }
            _ = interval.tick() => {
                dispatch(&job, &pool).await;
            }
        }
    }
}

async fn dispatch(job: &JobSpec, pool: &SqlitePool) {
    match job.id {
        DISCOUNT_SWEEP_ID => cleanup::run_discount_sweep(pool).await,
        RETENTION_SWEEP_ID => cleanup::run_retention_sweep(pool).await,
        other => log::error!("Unknown job id {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn jobs_are_listed_with_their_running_state() {
        let pool = test_pool().await;
        let mut scheduler = Scheduler::new(pool);

        let before = scheduler.list_jobs();
        assert_eq!(before.len(), 2);
        assert!(before.iter().all(|job| !job.running));

        scheduler.start();
        scheduler.start(); // second start is a no-op
        let after = scheduler.list_jobs();
        assert!(after.iter().all(|job| job.running));
        assert_eq!(
            after.iter().map(|job| job.id).collect::<Vec<_>>(),
            vec![DISCOUNT_SWEEP_ID, RETENTION_SWEEP_ID]
        );

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn first_tick_runs_the_sweeps_immediately() {
        let pool = test_pool().await;
        // An expired discount that the first discount-sweep tick must remove.
        sqlx::query(
            r#"INSERT INTO discounts (id, title, description, is_active, expires_at, created_at)
               VALUES ('d1', 'old', '', 1, '2020-01-01', '2020-01-01T00:00:00+00:00')"#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let mut scheduler = Scheduler::new(pool.clone());
        scheduler.start();
        // The interval's first tick fires straight away; give it a moment.
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.stop().await;

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discounts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
