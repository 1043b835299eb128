//! Async protocol loop

use std::time::Duration;

use edge_api::{AsyncPollRequest, AsyncPollResponse};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::errors::AgentError;
use crate::poll::coalescer::{CoalesceAction, CoalesceEvent, Coalescer, Flags};
use crate::poll::dispatch::dispatch_commands;
use crate::poll::snapshot::build_snapshot;
use crate::poll::{PollContext, PollOptions};
use crate::utils::bounded_interval;
use crate::workers::group::ShutdownSignal;

/// Ping interval used when the server disables every channel
pub const FAILSAFE_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Async channel intervals; zero disables a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub ping: Duration,
    pub snapshot: Duration,
    pub command: Duration,
}

impl Intervals {
    pub fn new(ping: Duration, snapshot: Duration, command: Duration) -> Self {
        let (ping, snapshot, command) = (
            bounded_interval(ping),
            bounded_interval(snapshot),
            bounded_interval(command),
        );
        let ping = if ping.is_zero() && snapshot.is_zero() && command.is_zero() {
            FAILSAFE_PING_INTERVAL
        } else {
            ping
        };
        Self {
            ping,
            snapshot,
            command,
        }
    }

    pub fn from_response(response: &AsyncPollResponse) -> Self {
        Self::new(
            Duration::from_secs(response.ping_interval),
            Duration::from_secs(response.snapshot_interval),
            Duration::from_secs(response.command_interval),
        )
    }

    /// Request timeout: the shortest active interval
    pub fn timeout(&self) -> Duration {
        [self.ping, self.snapshot, self.command]
            .into_iter()
            .filter(|d| !d.is_zero())
            .min()
            .unwrap_or(FAILSAFE_PING_INTERVAL)
    }
}

/// A ticker that never fires when its period is zero
pub struct Ticker {
    period: Duration,
    interval: Option<Interval>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let period = bounded_interval(period);
        let interval = (!period.is_zero()).then(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { period, interval }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    pub async fn tick(&mut self) {
        match &mut self.interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Restart the period from now
    pub fn reset(&mut self) {
        if let Some(interval) = &mut self.interval {
            interval.reset();
        }
    }

    fn retarget(&mut self, period: Duration) {
        if period != self.period {
            *self = Ticker::new(period);
        }
    }
}

struct Tickers {
    ping: Ticker,
    snapshot: Ticker,
    command: Ticker,
}

impl Tickers {
    fn new(intervals: Intervals) -> Self {
        Self {
            ping: Ticker::new(intervals.ping),
            snapshot: Ticker::new(intervals.snapshot),
            command: Ticker::new(intervals.command),
        }
    }

    fn retarget(&mut self, intervals: Intervals) {
        self.ping.retarget(intervals.ping);
        self.snapshot.retarget(intervals.snapshot);
        self.command.retarget(intervals.command);
    }

    fn reset(&mut self) {
        self.ping.reset();
        self.snapshot.reset();
        self.command.reset();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run the async poll loop
pub async fn run(options: &PollOptions, ctx: &PollContext, mut shutdown_signal: ShutdownSignal) {
    info!("Async poll loop starting...");

    let period = options.poll_interval;
    let mut intervals = Intervals::new(period, period, period);
    let mut tickers = Tickers::new(intervals);
    let mut coalescer = Coalescer::default();
    ctx.client.set_timeout(intervals.timeout());

    loop {
        let deadline = coalescer.deadline();
        let event = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Async poll loop shutting down...");
                return;
            }
            _ = tickers.ping.tick() => CoalesceEvent::PingTick,
            _ = tickers.snapshot.tick() => CoalesceEvent::SnapshotTick,
            _ = tickers.command.tick() => CoalesceEvent::CommandTick,
            _ = sleep_until(deadline) => CoalesceEvent::Fire,
        };

        let CoalesceAction::Send(flags) = coalescer.handle(event, Instant::now()) else {
            continue;
        };

        match exchange(ctx, flags).await {
            Ok(response) => {
                let next = Intervals::from_response(&response);
                if next != intervals {
                    info!("Async intervals changed: {:?}", next);
                    intervals = next;
                    tickers.retarget(intervals);
                    ctx.client.set_timeout(intervals.timeout());
                }
                if !response.commands.is_empty() {
                    debug!("Received {} commands", response.commands.len());
                    dispatch_commands(ctx, response.commands).await;
                }
            }
            Err(e) => error!("Async exchange failed: {}", e),
        }

        tickers.reset();
    }
}

/// Send one request carrying what `flags` asks for
pub async fn exchange(ctx: &PollContext, flags: Flags) -> Result<AsyncPollResponse, AgentError> {
    let mut request = AsyncPollRequest::default();
    if flags.command {
        request.command_timestamp = Some(ctx.client.last_command_timestamp().unwrap_or_default());
    }
    if flags.snapshot {
        request.snapshot = Some(build_snapshot(ctx).await);
    }
    debug!(
        "Async exchange (ping: {}, snapshot: {}, command: {})",
        flags.ping, flags.snapshot, flags.command
    );
    ctx.client.exchange_async(request).await
}
