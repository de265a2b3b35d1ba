//! Background tasks and scheduled jobs.
//!
//! Each submodule provides a long-running `run` function meant to be
//! spawned with `tokio::spawn`, plus a single-pass function the tests call
//! directly. All tasks stop when their [`CancellationToken`] fires.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod reservation_sweeper;
pub mod subscription_expiry;
