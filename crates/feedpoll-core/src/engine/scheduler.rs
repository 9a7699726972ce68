// # Poll Scheduling
//
// One task per source. Each task owns a repeating timer whose first tick
// fires immediately; ticks of the same source never overlap because the
// task awaits each tick before taking the next one. A tick that is running
// when a stop arrives is allowed to finish.

use super::{EngineEvent, FeedEngine, FeedSource};
use crate::error::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info};

/// Handle to a running source timer
///
/// Dropping the handle also stops the timer.
#[derive(Debug)]
pub struct SourceHandle {
    source_id: String,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SourceHandle {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Whether the timer task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the timer and wait for any in-flight tick to finish
    pub async fn stop(self) {
        let SourceHandle {
            source_id,
            stop_tx,
            task,
        } = self;

        // The task may already be gone if it panicked
        let _ = stop_tx.send(());
        if let Err(e) = task.await {
            error!("Poll task for {} ended abnormally: {}", source_id, e);
        }
    }
}

impl FeedEngine {
    /// Start polling one source on the configured interval
    ///
    /// The first tick runs immediately.
    pub fn start_source(&self, source: FeedSource) -> SourceHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let source_id = source.id.clone();
        let engine = self.clone();

        let task = tokio::spawn(async move {
            let period = engine.config().poll_interval();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = IntervalStream::new(interval);

            info!("Polling {} every {:?}", source.id, period);
            engine.emit_event(EngineEvent::SourceStarted {
                source_id: source.id.clone(),
            });

            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => break,

                    Some(_) = ticks.next() => {
                        debug!("Tick for {}", source.id);
                        if let Err(e) = engine.poll_source(&source).await {
                            error!("Poll of {} failed: {}", source.id, e);
                            engine.emit_event(EngineEvent::PollFailed {
                                source_id: source.id.clone(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }

            info!("Stopped polling {}", source.id);
            engine.emit_event(EngineEvent::SourceStopped {
                source_id: source.id.clone(),
            });
        });

        SourceHandle {
            source_id,
            stop_tx,
            task,
        }
    }

    /// Run the engine
    ///
    /// Starts every enabled source, waits for Ctrl-C, stops all sources and
    /// flushes the watermark store.
    pub async fn run(&self) -> Result<()> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Run with an explicit shutdown signal
    ///
    /// # Parameters
    ///
    /// - `shutdown_rx`: Optional oneshot receiver to trigger shutdown; `None` waits for Ctrl-C
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        match shutdown_rx {
            // A dropped sender counts as a shutdown request
            Some(rx) => {
                self.run_until(async {
                    let _ = rx.await;
                    Ok(())
                })
                .await
            }
            None => self.run().await,
        }
    }

    /// Run until `shutdown` resolves
    ///
    /// Sources are stopped and the store is flushed even when waiting for the
    /// shutdown signal itself fails; that failure is returned afterwards.
    async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let handles: Vec<SourceHandle> = self
            .sources()
            .iter()
            .filter(|config| {
                if !config.enabled {
                    info!("Source {} is disabled, not scheduling", config.id);
                }
                config.enabled
            })
            .map(|config| self.start_source(FeedSource::from(config)))
            .collect();

        self.emit_event(EngineEvent::Started {
            sources_count: handles.len(),
        });

        let waited = shutdown.await;
        let reason = match &waited {
            Ok(()) => {
                info!("Shutdown signal received");
                "Shutdown signal".to_string()
            }
            Err(e) => {
                error!("Failed to wait for shutdown signal: {}", e);
                format!("Signal handling failed: {}", e)
            }
        };

        for handle in handles {
            handle.stop().await;
        }

        self.emit_event(EngineEvent::Stopped { reason });

        self.inner.store.flush().await?;
        info!("State flushed, engine stopped");

        waited?;
        Ok(())
    }
}
