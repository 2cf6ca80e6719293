//! Timer-driven services.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::*;

use crate::{
    BasicService, OneIteration, ServiceBuilder, ServiceContext, ServiceError, StartingFn,
    StoppingFn, hook,
};

/// Creates a service that calls `iter` once every `interval` while running.
///
/// The first call happens one full interval after the service reaches
/// `Running`.  If a call returns an error the service fails with it and no
/// further calls are made.  Retrying, if wanted, is up to `iter` itself.
///
/// Errors immediately if `interval` is zero.
pub fn new_timer_service(
    interval: Duration,
    starting: StartingFn,
    iter: OneIteration,
    stopping: StoppingFn,
) -> Result<BasicService, ServiceError> {
    Ok(timer_builder(interval, starting, iter, stopping)?.build())
}

/// Like [`new_timer_service`], but returns the builder so a name or listeners
/// can be attached first.
pub fn timer_builder(
    interval: Duration,
    starting: StartingFn,
    mut iter: OneIteration,
    stopping: StoppingFn,
) -> Result<ServiceBuilder, ServiceError> {
    if interval.is_zero() {
        return Err(ServiceError::InvalidInterval(interval));
    }

    let running = hook(move |ctx: ServiceContext| async move {
        run_ticks(interval, &mut iter, &ctx).await
    });

    Ok(ServiceBuilder::new()
        .with_starting(starting)
        .with_running(running)
        .with_stopping(stopping))
}

/// Furthest out we schedule a first tick.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline of the first tick, one interval after `now`.
///
/// Intervals past what an [`Instant`] can hold are clamped to [`FAR_FUTURE`],
/// which is as good as never for a running service.
fn first_tick(now: Instant, interval: Duration) -> Instant {
    now.checked_add(interval)
        .filter(|_| interval <= FAR_FUTURE)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

async fn run_ticks(
    interval: Duration,
    iter: &mut OneIteration,
    ctx: &ServiceContext,
) -> anyhow::Result<()> {
    // Owned by this call and dropped on every way out of it.
    let mut ticker = time::interval_at(first_tick(Instant::now(), interval), interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut n: u64 = 0;
    loop {
        tokio::select! {
            biased;

            _ = ctx.cancelled() => return Ok(()),

            _ = ticker.tick() => {
                n += 1;
                if let Err(e) = iter(ctx.clone()).await {
                    warn!(iteration = n, %e, "timer iteration failed");
                    return Err(e);
                }
                trace!(iteration = n, "timer iteration done");
            }
        }
    }
}
