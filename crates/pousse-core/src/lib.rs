//! # pousse-core
//!
//! The poussetaches dispatcher engine: a single-process, push-mode task
//! queue. Clients hand over an opaque payload and a callback URL; the
//! engine persists the task and POSTs the payload to the callback until it
//! answers with the expected HTTP status, backing off exponentially (with
//! jitter) between failed attempts and dead-lettering after 12 of them.
//! Tasks with a cron schedule recur on every fire.
//!
//! Durability is three directories of per-task JSON files (`waiting`,
//! `success`, `dead`); delivery is at-least-once.

pub mod config;
pub mod cron;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod queue;
pub mod rate_limit;
pub mod retry;
pub mod store;
pub mod task;
pub mod worker;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStatus, NewTask};
pub use error::{EngineError, EngineResult};
pub use task::{Bucket, DeliveryEnvelope, Task};
