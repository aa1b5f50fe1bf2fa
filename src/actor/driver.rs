//! Reveal Actor: Dedicated thread that owns a reveal engine.
//!
//! The actor receives [`StreamCommand`]s, sleeps until the next reveal is
//! due, and publishes [`RevealEvent`]s. Only this thread ever touches the
//! engine, so playback state needs no locking.

use super::messages::StreamCommand;
use crate::error::RevealError;
use crate::message::{Fragment, MessageId, StructuralFields};
use crate::reveal::{RevealConfig, RevealEngine, RevealEvent};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Longest time the loop waits before re-checking the shutdown flag.
const IDLE_POLL: Duration = Duration::from_millis(16);

/// Handle to the reveal thread.
pub struct RevealActor {
    /// Handle to the reveal thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
    /// Command sender.
    command_tx: Sender<StreamCommand>,
    /// Event receiver.
    event_rx: Receiver<RevealEvent>,
}

impl RevealActor {
    /// Spawn the reveal thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to spawn the thread.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn(config: RevealConfig) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let (command_tx, command_rx) = unbounded::<StreamCommand>();
        let (event_tx, event_rx) = unbounded::<RevealEvent>();

        let handle = thread::Builder::new()
            .name("flywheel-reveal".to_string())
            .spawn(move || {
                Self::run_loop(&command_rx, event_tx, &shutdown_clone, config);
            })
            .expect("Failed to spawn reveal thread");

        Self {
            handle: Some(handle),
            shutdown,
            command_tx,
            event_rx,
        }
    }

    /// Receiver of render events.
    ///
    /// Use this with `select!` alongside other event sources:
    ///
    /// ```ignore
    /// loop {
    ///     select! {
    ///         recv(actor.events()) -> event => render(event?),
    ///         recv(network) -> chunk => actor.ingest(id.clone(), chunk?)?,
    ///     }
    /// }
    /// ```
    #[inline]
    pub const fn events(&self) -> &Receiver<RevealEvent> {
        &self.event_rx
    }

    /// A cloneable command sender, for feeding the actor from other threads.
    pub fn commands(&self) -> Sender<StreamCommand> {
        self.command_tx.clone()
    }

    /// Send a raw command.
    pub fn send(&self, command: StreamCommand) -> Result<(), RevealError> {
        self.command_tx
            .send(command)
            .map_err(|_| RevealError::ActorDisconnected)
    }

    /// Register a message.
    pub fn open(&self, id: impl Into<MessageId>) -> Result<(), RevealError> {
        self.send(StreamCommand::Open { id: id.into() })
    }

    /// Forward a fragment.
    pub fn ingest(&self, id: impl Into<MessageId>, fragment: Fragment) -> Result<(), RevealError> {
        self.send(StreamCommand::Ingest {
            id: id.into(),
            fragment,
        })
    }

    /// End a message's stream.
    pub fn end_stream(
        &self,
        id: impl Into<MessageId>,
        final_fields: Option<StructuralFields>,
    ) -> Result<(), RevealError> {
        self.send(StreamCommand::EndStream {
            id: id.into(),
            final_fields,
        })
    }

    /// Dispose a message.
    pub fn dispose(&self, id: impl Into<MessageId>) -> Result<(), RevealError> {
        self.send(StreamCommand::Dispose { id: id.into() })
    }

    /// Change pacing.
    pub fn configure(&self, config: RevealConfig) -> Result<(), RevealError> {
        self.send(StreamCommand::Configure(config))
    }

    /// Signal the reveal thread to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.command_tx.send(StreamCommand::Shutdown);
    }

    /// Wait for the reveal thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Main reveal loop.
    fn run_loop(
        command_rx: &Receiver<StreamCommand>,
        event_tx: Sender<RevealEvent>,
        shutdown: &Arc<AtomicBool>,
        config: RevealConfig,
    ) {
        let mut engine = RevealEngine::with_system_clock(config, event_tx);

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Sleep until the next reveal, a command, or the poll interval
            let timeout = engine
                .time_until_next()
                .map_or(IDLE_POLL, |wait| wait.min(IDLE_POLL));

            match command_rx.recv_timeout(timeout) {
                Ok(StreamCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => Self::apply(&mut engine, command),
                Err(RecvTimeoutError::Timeout) => {}
            }

            engine.advance();
        }

        debug!(live = engine.len(), "Reveal thread stopped");
    }

    /// Apply one command. Ignored calls were already logged by the engine.
    fn apply(engine: &mut RevealEngine<Sender<RevealEvent>>, command: StreamCommand) {
        match command {
            StreamCommand::Open { id } => engine.open(id),
            StreamCommand::Ingest { id, fragment } => {
                let _ = engine.ingest(id, fragment);
            }
            StreamCommand::EndStream { id, final_fields } => {
                let _ = engine.end_stream(id, final_fields);
            }
            StreamCommand::Dispose { id } => {
                let _ = engine.dispose(id);
            }
            StreamCommand::Reset => engine.reset(),
            StreamCommand::Configure(config) => engine.configure(config),
            StreamCommand::Shutdown => {}
        }
    }
}

impl Drop for RevealActor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
