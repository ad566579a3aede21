//! Worker pipeline: a bounded signal queue drained by N concurrent cycles.
//!
//! Each worker runs one cycle to completion before taking the next signal,
//! so fan-out of one signal overlaps the decision cycle of the next.

use crate::cycle::{CycleError, CycleOutcome, DecisionCycle};
use pulse_trade_core::{CycleConfig, TradingSignal};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("signal queue is full")]
    QueueFull,

    #[error("pipeline is shut down")]
    Closed,

    #[error("cycle {correlation_id} failed: {source}")]
    Cycle {
        correlation_id: String,
        #[source]
        source: CycleError,
    },
}

/// Returned to the submitter as soon as the signal is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub correlation_id: String,
    pub status: &'static str,
}

/// Published after each signal leaves a worker.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Completed {
        correlation_id: String,
        outcome: Box<CycleOutcome>,
    },
    Failed {
        correlation_id: String,
        error: PipelineError,
    },
}

impl PipelineEvent {
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Completed { correlation_id, .. } | Self::Failed { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

/// Cloneable submission side of the pipeline.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<TradingSignal>,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineHandle {
    /// Queues `signal` without waiting for it to be processed.
    ///
    /// # Errors
    /// `QueueFull` when the bounded queue is at capacity, `Closed` after shutdown.
    pub fn submit(&self, signal: TradingSignal) -> Result<Acknowledgement, PipelineError> {
        let correlation_id = signal.correlation_id.clone();
        self.tx.try_send(signal).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PipelineError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PipelineError::Closed,
        })?;
        tracing::debug!("[{}] queued", correlation_id);
        Ok(Acknowledgement {
            correlation_id,
            status: "accepted",
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }
}

pub struct SignalPipeline {
    handle: PipelineHandle,
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl SignalPipeline {
    /// Spawns `config.workers` workers over a queue of `config.queue_capacity`.
    #[must_use]
    pub fn spawn(cycle: Arc<DecisionCycle>, config: &CycleConfig, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (events, _) = broadcast::channel(256);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..config.workers.max(1))
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&cycle),
                    Arc::clone(&rx),
                    events.clone(),
                    token.clone(),
                ))
            })
            .collect();

        tracing::info!(
            "Signal pipeline started: {} workers, queue capacity {}",
            config.workers.max(1),
            config.queue_capacity.max(1)
        );

        Self {
            handle: PipelineHandle { tx, events },
            token,
            workers,
        }
    }

    #[must_use]
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    /// Stops taking new signals, then waits until every accepted signal has
    /// been processed.
    pub async fn shutdown(self) {
        self.token.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Pipeline worker panicked: {}", e);
            }
        }
        tracing::info!("Signal pipeline stopped");
    }
}

async fn worker(
    id: usize,
    cycle: Arc<DecisionCycle>,
    rx: Arc<Mutex<mpsc::Receiver<TradingSignal>>>,
    events: broadcast::Sender<PipelineEvent>,
    token: CancellationToken,
) {
    loop {
        // Queued signals win over cancellation. Once cancelled the queue is
        // closed to new submissions and drained before the worker exits.
        let next = tokio::select! {
            biased;
            signal = async { rx.lock().await.recv().await } => signal,
            () = token.cancelled() => {
                let mut rx = rx.lock().await;
                rx.close();
                rx.recv().await
            }
        };
        let Some(signal) = next else {
            break;
        };

        let correlation_id = signal.correlation_id.clone();
        tracing::debug!("worker {} took [{}]", id, correlation_id);

        let event = match cycle.process(&signal).await {
            Ok(outcome) => PipelineEvent::Completed {
                correlation_id,
                outcome: Box::new(outcome),
            },
            Err(source) => {
                tracing::error!("[{}] cycle failed: {}", correlation_id, source);
                PipelineEvent::Failed {
                    correlation_id: correlation_id.clone(),
                    error: PipelineError::Cycle {
                        correlation_id,
                        source,
                    },
                }
            }
        };
        // No subscribers is fine
        let _ = events.send(event);
    }
    tracing::debug!("worker {} exiting", id);
}
