//! The dispatcher engine
//!
//! One `Engine` value owns the whole mutable world: the file store, the
//! ready queue, the pause flag, the in-flight counter, the cron
//! deduplication index, the rate limiter and the delivery client. The
//! admission surface and every worker share it behind an `Arc`.
//!
//! A single mutex guards the queue/flag/counter/index cluster; it is only
//! ever held for plain memory operations, never across an await. File I/O
//! always happens outside it, so a slow disk cannot stall the other
//! workers. Between dequeue and the persisted transition a task lives only
//! on its worker's stack, which is the at-most-one-in-flight guarantee.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::cron::CronSchedule;
use crate::delivery::{DeliveryClient, DeliveryOutcome};
use crate::error::EngineResult;
use crate::queue::ReadyQueue;
use crate::rate_limit::RateLimiter;
use crate::retry;
use crate::store::TaskStore;
use crate::task::{
    datetime_to_nanos, nanos_to_datetime, now_nanos, random_id, scheduled_id, Bucket,
    DeliveryEnvelope, Task,
};

/// Admission input for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub url: String,
    pub payload: Vec<u8>,
    /// Success status; 0 defaults to 200.
    pub expected: i32,
    /// Cron expression; empty for a one-shot task.
    pub schedule: String,
    /// Initial delay in minutes before the first eligible run.
    pub delay_minutes: i64,
}

/// Snapshot returned by the status endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineStatus {
    pub paused: bool,
    pub in_flight: u32,
}

/// Everything guarded by the engine lock.
#[derive(Debug)]
struct EngineState {
    queue: ReadyQueue,
    paused: bool,
    in_flight: u32,
    /// Content-hash ids of live cron tasks, for submit deduplication.
    scheduled_index: HashSet<String>,
}

pub struct Engine {
    config: EngineConfig,
    store: TaskStore,
    delivery: DeliveryClient,
    limiter: RateLimiter,
    state: Mutex<EngineState>,
}

impl Engine {
    /// Open the store and build an engine. The engine comes up paused; an
    /// explicit [`Engine::resume`] is required before anything is
    /// delivered.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        let store = TaskStore::open(&config.data_dir).await?;
        let delivery = DeliveryClient::new(config.auth_key.clone());
        let limiter = RateLimiter::new(config.rate_limit);
        Ok(Self {
            config,
            store,
            delivery,
            limiter,
            state: Mutex::new(EngineState {
                queue: ReadyQueue::new(),
                paused: true,
                in_flight: 0,
                scheduled_index: HashSet::new(),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().expect("engine state lock poisoned")
    }

    /// Boot-time recovery: trim the success archive, then replay the
    /// waiting bucket into the ready queue.
    pub async fn recover(&self) -> EngineResult<()> {
        let removed = self.store.trim_success(self.config.max_success).await?;
        if removed > 0 {
            tracing::info!(removed, "trimmed success archive");
        }
        self.replay_waiting().await?;
        let queued = self.state().queue.len();
        tracing::info!(queued, "recovery complete, engine paused until resumed");
        Ok(())
    }

    /// Load the waiting bucket into memory. Cron tasks are not restored:
    /// their file is deleted and the operator is expected to resubmit,
    /// which re-establishes the content-hash index and recomputes the next
    /// occurrence. Persisted `next_run` values are honored as-is, so an
    /// overdue task becomes immediately eligible.
    async fn replay_waiting(&self) -> EngineResult<()> {
        let waiting = self.store.list(Bucket::Waiting).await?;
        for task in waiting {
            if task.is_cron() {
                tracing::info!(
                    task_id = %task.id,
                    schedule = %task.schedule,
                    "dropping persisted cron task, resubmission required"
                );
                self.store.remove(&task.id, Bucket::Waiting).await?;
                continue;
            }
            self.enqueue(task);
        }
        Ok(())
    }

    /// Admit a task: validate, persist to `waiting`, enqueue. Returns the
    /// task id. Resubmitting a cron task with identical
    /// `(url, payload, schedule)` is a no-op that returns the existing id.
    pub async fn submit(&self, new: NewTask) -> EngineResult<String> {
        let eligible_from = Utc::now() + ChronoDuration::minutes(new.delay_minutes);

        let (id, first_run) = if new.schedule.is_empty() {
            (random_id(16), eligible_from)
        } else {
            let schedule = CronSchedule::parse(&new.schedule)?;
            let first_run = schedule.next_after(eligible_from)?;
            let id = scheduled_id(&new.url, &new.payload, &new.schedule);
            {
                let mut state = self.state();
                if state.scheduled_index.contains(&id) {
                    tracing::debug!(task_id = %id, "cron task already registered");
                    return Ok(id);
                }
                state.scheduled_index.insert(id.clone());
            }
            (id, first_run)
        };

        let next_run = datetime_to_nanos(first_run);
        let task = Task {
            id: id.clone(),
            url: new.url,
            payload: new.payload,
            expected: if new.expected == 0 { 200 } else { new.expected },
            schedule: new.schedule,
            next_scheduled_run: next_run,
            next_run,
            tries: 0,
            last_run: 0,
            last_error_body: Vec::new(),
            last_error_status_code: 0,
        };

        if let Err(e) = self.store.put(&task, Bucket::Waiting).await {
            // Roll the index back so a later resubmission is not a no-op.
            if task.is_cron() {
                self.state().scheduled_index.remove(&task.id);
            }
            return Err(e);
        }

        tracing::info!(task_id = %task.id, url = %task.url, cron = task.is_cron(), "task admitted");
        self.enqueue(task);
        Ok(id)
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        EngineStatus { paused: state.paused, in_flight: state.in_flight }
    }

    pub fn pause(&self) {
        self.state().paused = true;
        tracing::info!("deliveries paused");
    }

    pub fn resume(&self) {
        self.state().paused = false;
        tracing::info!("deliveries resumed");
    }

    /// On-disk contents of a bucket, sorted by `next_run` ascending.
    pub async fn list(&self, bucket: Bucket) -> EngineResult<Vec<Task>> {
        let mut tasks = self.store.list(bucket).await?;
        tasks.sort_by_key(|t| t.next_run);
        Ok(tasks)
    }

    /// The waiting bucket filtered to cron tasks.
    pub async fn list_cron(&self) -> EngineResult<Vec<Task>> {
        let mut tasks = self.list(Bucket::Waiting).await?;
        tasks.retain(Task::is_cron);
        Ok(tasks)
    }

    /// Drop all in-memory cron state and rebuild from disk. Cron files in
    /// the waiting bucket are deleted in the process (same rule as boot);
    /// callers resubmit them to get fresh occurrences.
    pub async fn reload_cron(&self) -> EngineResult<()> {
        {
            let mut state = self.state();
            state.queue.clear();
            state.scheduled_index.clear();
        }
        self.replay_waiting().await
    }

    /// Pop the next due task, unless paused or nothing is due. A returned
    /// task is owned exclusively by the calling worker until its attempt
    /// settles.
    pub(crate) fn dequeue_ready(&self) -> Option<Task> {
        let mut state = self.state();
        if state.paused {
            return None;
        }
        state.queue.pop_ready(now_nanos())
    }

    pub(crate) fn enqueue(&self, task: Task) {
        self.state().queue.push(task);
    }

    /// Block until the shared rate limiter grants a delivery token.
    pub(crate) async fn throttle(&self) {
        self.limiter.acquire().await;
    }

    /// Run one delivery attempt for a dequeued task and persist the
    /// resulting state transition.
    pub(crate) async fn attempt(&self, mut task: Task) -> EngineResult<()> {
        self.state().in_flight += 1;

        task.last_run = now_nanos();
        task.tries += 1;
        let envelope = DeliveryEnvelope {
            payload: task.payload.clone(),
            tries: task.tries,
            req_id: random_id(6),
        };
        tracing::debug!(
            task_id = %task.id,
            url = %task.url,
            tries = task.tries,
            req_id = %envelope.req_id,
            "delivering"
        );

        let outcome = self.delivery.post(&task.url, task.expected, &envelope).await;
        let settled = match outcome {
            DeliveryOutcome::Delivered => self.complete(task).await,
            DeliveryOutcome::Rejected { status, body } => self.fail(task, status, body).await,
        };

        self.state().in_flight -= 1;
        settled
    }

    /// Success path: archive the task; a cron task is additionally
    /// rescheduled for its next occurrence with its retry state reset.
    /// Jitter never applies here; only failed attempts back off.
    async fn complete(&self, mut task: Task) -> EngineResult<()> {
        tracing::info!(task_id = %task.id, tries = task.tries, "task delivered");
        self.store.transfer(&task, Bucket::Waiting, Bucket::Success).await?;

        if task.is_cron() {
            let schedule = CronSchedule::parse(&task.schedule)?;
            // Advance from the previous cron-computed fire time, not from
            // now, so a slow delivery cannot skip occurrences.
            let next = schedule.next_after(nanos_to_datetime(task.next_scheduled_run))?;
            task.next_scheduled_run = datetime_to_nanos(next);
            task.next_run = task.next_scheduled_run;
            task.tries = 0;
            task.last_error_body.clear();
            task.last_error_status_code = 0;

            tracing::info!(task_id = %task.id, next_run = %next, "cron task rescheduled");
            self.store.put(&task, Bucket::Waiting).await?;
            self.enqueue(task);
        }
        Ok(())
    }

    /// Failure path: record the error, then either schedule a jittered
    /// retry or dead-letter the task once all attempts are spent.
    async fn fail(&self, mut task: Task, status: i32, body: Vec<u8>) -> EngineResult<()> {
        task.last_error_status_code = status;
        task.last_error_body = body;

        if retry::should_retry(task.tries) {
            let delay = retry::backoff_delay(task.tries);
            tracing::warn!(
                task_id = %task.id,
                tries = task.tries,
                status,
                retry_in_secs = delay.as_secs(),
                "delivery failed, retrying"
            );
            task.next_run = now_nanos() + delay.as_nanos() as i64;
            self.store.put(&task, Bucket::Waiting).await?;
            self.enqueue(task);
        } else {
            tracing::warn!(
                task_id = %task.id,
                tries = task.tries,
                status,
                "retries exhausted, moving to dead letter"
            );
            self.store.transfer(&task, Bucket::Waiting, Bucket::Dead).await?;
        }
        Ok(())
    }
}
