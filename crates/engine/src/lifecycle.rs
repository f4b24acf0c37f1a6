use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use common::OrderEvent;

use crate::trader::CrossoverTrader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Stopped,
}

/// Commands accepted by a running engine.
#[derive(Debug)]
pub enum EngineCommand {
    /// Render the status report and send it back.
    Status(oneshot::Sender<String>),
    Stop,
}

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// The current status report, or `None` once the engine has stopped.
    pub async fn status(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::Status(tx)).await.ok()?;
        rx.await.ok()
    }

    pub async fn stop(&self) {
        self.send(EngineCommand::Stop).await;
    }
}

/// Drives one trader. Ticks, order events and operator commands are all
/// handled on this task one at a time, polled in that order.
pub struct Engine {
    trader: CrossoverTrader,
    tick_interval: Duration,
    event_rx: mpsc::Receiver<OrderEvent>,
    command_rx: mpsc::Receiver<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
}

impl Engine {
    pub fn new(
        trader: CrossoverTrader,
        tick_interval: Duration,
        event_rx: mpsc::Receiver<OrderEvent>,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
        };

        let engine = Engine {
            trader,
            tick_interval,
            event_rx,
            command_rx,
            state,
        };

        (engine, handle)
    }

    /// Run until a `Stop` command arrives or every handle is dropped.
    /// Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            pair = %self.trader.config().trading_pair,
            tick_secs = self.tick_interval.as_secs_f64(),
            "Engine started"
        );
        *self.state.write().await = EngineState::Running;

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;

                _ = ticker.tick() => {
                    if let Err(e) = self.trader.tick(epoch_secs()).await {
                        error!(error = %e, "Tick failed");
                    }
                }

                event = self.event_rx.recv(), if events_open => match event {
                    Some(event) => {
                        let order_id = event.order_id().to_string();
                        if let Err(e) = self.trader.on_event(event).await {
                            error!(order_id = %order_id, error = %e, "Order event handling failed");
                        }
                    }
                    None => {
                        warn!("Order event channel closed; fills will no longer be seen");
                        events_open = false;
                    }
                },

                cmd = self.command_rx.recv() => match cmd {
                    Some(EngineCommand::Status(reply)) => {
                        let text = match self.trader.status().await {
                            Ok(report) => report.to_string(),
                            Err(e) => format!("Status unavailable: {e}"),
                        };
                        let _ = reply.send(text);
                    }
                    Some(EngineCommand::Stop) => {
                        info!("Engine stopping");
                        break;
                    }
                    None => {
                        warn!("Engine command channel closed, shutting down");
                        break;
                    }
                },
            }
        }

        *self.state.write().await = EngineState::Stopped;
    }
}

fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
