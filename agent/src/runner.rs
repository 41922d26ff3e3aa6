//! The poll loop and its stop signal.
use crate::connection::{ConnectionManager, Connector};
use crate::cycle::{poll_cycle, CycleOutcome, MaxWatts};
use crate::publish::Publisher;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Upper bound on the LOGOUT exchange during shutdown.
const LOGOUT_GRACE: Duration = Duration::from_secs(2);

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

#[derive(Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once stop is requested; never if the handle is dropped first.
    pub async fn stopped(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `fut` unless a stop arrives first.
    pub async fn until_stopped<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.stopped() => None,
            out = fut => Some(out),
        }
    }
}

pub struct PollLoop<C: Connector, P: Publisher> {
    connection: ConnectionManager<C>,
    publisher: P,
    max_watts: MaxWatts,
    interval: Duration,
}

impl<C: Connector, P: Publisher> PollLoop<C, P> {
    pub fn new(connection: ConnectionManager<C>, publisher: P, max_watts: MaxWatts, interval: Duration) -> Self {
        Self {
            connection,
            publisher,
            max_watts,
            interval,
        }
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    /// Ensure a session and run one cycle. `None` when the daemon is unreachable.
    pub async fn run_once(&mut self) -> Option<CycleOutcome> {
        self.connection.connect().await.ok()?;
        let session = self.connection.session()?;
        let outcome = poll_cycle(session, &self.max_watts, &self.publisher).await;
        if let CycleOutcome::Aborted(e) = &outcome {
            self.connection.note_error(e);
        }
        Some(outcome)
    }

    /// Connect, then poll every interval until `stop` fires.
    ///
    /// The first connect is retried each interval. Later cycles reconnect on
    /// their own when the previous session broke.
    pub async fn run(&mut self, mut stop: StopSignal) {
        loop {
            if stop.is_stopped() {
                return self.shutdown().await;
            }
            match stop.until_stopped(self.connection.connect()).await {
                None => return self.shutdown().await,
                Some(Ok(())) => break,
                Some(Err(_)) => {
                    if stop.until_stopped(tokio::time::sleep(self.interval)).await.is_none() {
                        return self.shutdown().await;
                    }
                }
            }
        }

        while !stop.is_stopped() {
            if stop.until_stopped(self.run_once()).await.is_none() {
                break;
            }
            if stop.until_stopped(tokio::time::sleep(self.interval)).await.is_none() {
                break;
            }
        }
        self.shutdown().await
    }

    pub async fn shutdown(&mut self) {
        info!("stopping poll loop");
        let _ = tokio::time::timeout(LOGOUT_GRACE, self.connection.close()).await;
    }
}
