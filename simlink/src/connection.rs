//! Connection lifecycle manager.
//!
//! A single background thread owns the session to the simulation host and
//! drives this state machine:
//!
//! ```text
//!            open ok                quit / failure
//! Disconnected ──> Connecting ──> Connected ──────────> Disconnected
//!      ^              │ open failed                          │
//!      └── backoff ───┘                                      │
//!      └──────────────── (quit: reconnect at once) ──────────┘
//!
//! any state ── dispose() ──> Disposed   (absorbing)
//! ```
//!
//! On every new session the loop snapshots the schema and event registries
//! and replays them onto the connection in registration order. Registrations
//! made while a session is open therefore take effect at the next reconnect.
//! Each tick then issues the due sample requests, transmits queued events,
//! drains inbound messages into the [`DataStore`] and waits for the tick
//! interval.
//!
//! Connection failures never leave the loop. They are logged, the session is
//! closed and the loop retries after the configured backoff, indefinitely.
//! A panic raised on the loop thread, by a provider or a schema decoder, is
//! caught at the session boundary and handled like any other failure.
//! Both the backoff and the tick wait block on the shutdown channel, so a
//! [`dispose`](ConnectionManager::dispose) is observed within one wait.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::config::ClientConfig;
use crate::error::{ConnectionError, Result, SimlinkError};
use crate::event::{EventRegistry, EventSetDescriptor};
use crate::provider::{
    Connection, ConnectionProvider, DefinitionId, EventFlags, EventId, Message, ObjectId, Sample,
    TargetScope,
};
use crate::scheduler::SamplingScheduler;
use crate::schema::{SchemaDescriptor, SchemaRegistry};
use crate::store::DataStore;

/// Name of the background thread.
const THREAD_NAME: &str = "simlink-connection";

/// Lifecycle state of the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// No session is open.
    Disconnected = 0,
    /// A session is being opened.
    Connecting = 1,
    /// A session is open and being polled.
    Connected = 2,
    /// The manager has been disposed. Absorbing.
    Disposed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disposed,
        }
    }
}

/// State shared between callers and the loop thread.
#[derive(Debug)]
pub(crate) struct Shared {
    state: AtomicU8,
    pub(crate) schemas: RwLock<SchemaRegistry>,
    pub(crate) events: RwLock<EventRegistry>,
    pub(crate) store: DataStore,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            schemas: RwLock::new(SchemaRegistry::new()),
            events: RwLock::new(EventRegistry::new()),
            store: DataStore::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state() == ConnectionState::Disposed
    }

    /// Moves to `next` unless already disposed. Returns `false` if disposed.
    fn transition(&self, next: ConnectionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ConnectionState::Disposed as u8).then_some(next as u8)
            })
            .is_ok()
    }

    fn dispose(&self) -> bool {
        self.state.swap(ConnectionState::Disposed as u8, Ordering::AcqRel)
            != ConnectionState::Disposed as u8
    }
}

/// An event waiting to be transmitted by the loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueuedEvent {
    event: EventId,
    data: u32,
}

/// Owns the background connection loop and its lifecycle.
///
/// The manager is `Sync`; every method takes `&self` so it can be shared
/// behind an `Arc` between the thread that disposes it and the threads that
/// send events.
pub struct ConnectionManager {
    config: ClientConfig,
    shared: Arc<Shared>,
    provider: Mutex<Option<Box<dyn ConnectionProvider>>>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    events_tx: Sender<QueuedEvent>,
    events_rx: Receiver<QueuedEvent>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("client_name", &self.config.client_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager for `provider`. Nothing runs until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if `config` is invalid.
    pub fn new<P: ConnectionProvider>(provider: P, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (events_tx, events_rx) = crossbeam_channel::bounded(config.event_queue_capacity);

        Ok(Self {
            config,
            shared: Arc::new(Shared::new()),
            provider: Mutex::new(Some(Box::new(provider))),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            events_tx,
            events_rx,
            thread: Mutex::new(None),
        })
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// The configuration the manager was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Spawns the connection loop.
    ///
    /// # Errors
    ///
    /// - [`SimlinkError::AlreadyStarted`] if the loop was started before
    /// - [`SimlinkError::Disposed`] if the manager has been disposed
    /// - [`SimlinkError::Spawn`] if the thread cannot be created
    pub fn start(&self) -> Result<()> {
        // dispose() also takes the provider, so an empty slot is either case.
        let Some(provider) = self.provider.lock().take() else {
            return Err(if self.shared.is_disposed() {
                SimlinkError::Disposed
            } else {
                SimlinkError::AlreadyStarted
            });
        };

        let worker = Worker {
            provider,
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            shutdown: self.shutdown_rx.clone(),
            events: self.events_rx.clone(),
        };

        let handle = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(SimlinkError::Spawn)?;

        *self.thread.lock() = Some(handle);
        tracing::info!(client = %self.config.client_name, "connection loop started");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Returns `true` iff a session is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Queues `event` for transmission on the open session.
    ///
    /// A no-op when no session is open. Events are transmitted by the loop
    /// thread on its next tick with the configured priority and
    /// [`EventFlags::GROUP_ID_IS_PRIORITY`]. There is no delivery guarantee:
    /// events still queued when the session ends are discarded, and events
    /// sent while the queue is full are dropped.
    pub fn send_event(&self, event: EventId, data: u32) {
        if !self.is_connected() {
            tracing::trace!(%event, "not connected, event ignored");
            return;
        }

        match self.events_tx.try_send(QueuedEvent { event, data }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%event, "event queue full, event dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!(%event, "connection loop gone, event ignored");
            }
        }
    }

    /// Disposes the manager.
    ///
    /// Marks the state [`ConnectionState::Disposed`] and signals the loop,
    /// which closes its session and exits at its next wait. Does not block;
    /// use [`join`](Self::join) to wait for the thread. Calling it again has
    /// no further effect.
    pub fn dispose(&self) {
        if !self.shared.dispose() {
            return;
        }

        // Dropping the only sender wakes every pending `recv_timeout`.
        self.shutdown_tx.lock().take();
        self.provider.lock().take();
        tracing::info!(client = %self.config.client_name, "client disposed");
    }

    /// Returns `true` while the loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Blocks until the loop thread has exited.
    ///
    /// Returns immediately if the loop was never started or has already been
    /// joined. The loop only exits after [`dispose`](Self::dispose).
    pub fn join(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!("connection loop panicked");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// How a wait on the shutdown channel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Elapsed,
    Shutdown,
}

/// How a session ended.
#[derive(Debug)]
enum SessionEnd {
    Quit,
    Failed(ConnectionError),
    Shutdown,
}

/// An open session and the registries captured when it was opened.
///
/// Dropping it closes the connection, including while unwinding from a
/// panic on the loop thread.
struct Session {
    connection: Box<dyn Connection>,
    schemas: Vec<SchemaDescriptor>,
    scheduler: SamplingScheduler,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.connection.close();
    }
}

/// The loop thread's half of the manager.
struct Worker {
    provider: Box<dyn ConnectionProvider>,
    config: ClientConfig,
    shared: Arc<Shared>,
    shutdown: Receiver<()>,
    events: Receiver<QueuedEvent>,
}

impl Worker {
    fn run(mut self) {
        let mut attempt: u64 = 0;

        while !self.shared.is_disposed() {
            attempt += 1;
            let attempted = catch_unwind(AssertUnwindSafe(|| self.run_attempt(&mut attempt)));
            let outcome = match attempted {
                Ok(end) => end,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    tracing::error!(%reason, "connection loop panicked, dropping session");
                    SessionEnd::Failed(ConnectionError::Panicked { reason })
                }
            };
            self.discard_queued_events();

            match outcome {
                SessionEnd::Quit => {
                    tracing::info!("host closed the session, reconnecting");
                    self.shared.transition(ConnectionState::Disconnected);
                }
                SessionEnd::Failed(_) if self.shared.is_disposed() => break,
                SessionEnd::Failed(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        backoff = ?self.config.retry_backoff,
                        "connection failed, retrying"
                    );
                    self.shared.transition(ConnectionState::Disconnected);
                    if self.wait(self.config.retry_backoff) == Wait::Shutdown {
                        break;
                    }
                }
                SessionEnd::Shutdown => break,
            }
        }

        tracing::info!("connection loop stopped");
    }

    /// Connects and runs one session to its end. The session is closed on
    /// return.
    fn run_attempt(&mut self, attempt: &mut u64) -> SessionEnd {
        match self.connect() {
            Ok(mut session) => {
                *attempt = 0;
                self.run_session(&mut session)
            }
            Err(end) => end,
        }
    }

    /// Opens a session and replays both registries onto it.
    fn connect(&mut self) -> std::result::Result<Session, SessionEnd> {
        if !self.shared.transition(ConnectionState::Connecting) {
            return Err(SessionEnd::Shutdown);
        }

        let connection = self
            .provider
            .open(&self.config.client_name)
            .map_err(SessionEnd::Failed)?;
        let mut session = Session {
            connection,
            schemas: self.shared.schemas.read().descriptors().to_vec(),
            scheduler: SamplingScheduler::default(),
        };
        let event_sets = self.shared.events.read().sets().to_vec();

        replay(session.connection.as_mut(), &event_sets, &session.schemas)
            .map_err(SessionEnd::Failed)?;

        self.discard_queued_events();
        if !self.shared.transition(ConnectionState::Connected) {
            return Err(SessionEnd::Shutdown);
        }

        tracing::info!(
            client = %self.config.client_name,
            schemas = session.schemas.len(),
            event_sets = event_sets.len(),
            "session established"
        );

        session.scheduler = SamplingScheduler::new(&session.schemas);
        Ok(session)
    }

    fn run_session(&self, session: &mut Session) -> SessionEnd {
        let Session {
            connection,
            schemas,
            scheduler,
        } = session;

        loop {
            let now = Instant::now();
            let requested = scheduler.poll(now, |definition| {
                tracing::trace!(%definition, "requesting sample");
                connection.request_data(definition, TargetScope::User)
            });
            if let Err(e) = requested {
                return SessionEnd::Failed(e);
            }

            for queued in self.events.try_iter() {
                let sent = connection.transmit_client_event(
                    ObjectId::USER,
                    queued.event,
                    queued.data,
                    self.config.event_priority,
                    EventFlags::GROUP_ID_IS_PRIORITY,
                );
                if let Err(e) = sent {
                    return SessionEnd::Failed(e);
                }
            }

            let messages = match connection.receive_messages() {
                Ok(messages) => messages,
                Err(e) => return SessionEnd::Failed(e),
            };

            let mut quit = false;
            for message in messages {
                match message {
                    Message::Quit => quit = true,
                    Message::Data { definition, sample } => {
                        self.store_sample(schemas, definition, &sample);
                    }
                }
            }
            if quit {
                return SessionEnd::Quit;
            }

            if self.wait(self.config.tick_interval) == Wait::Shutdown {
                return SessionEnd::Shutdown;
            }
        }
    }

    fn store_sample(&self, schemas: &[SchemaDescriptor], definition: DefinitionId, sample: &Sample) {
        let Some(descriptor) = schemas.iter().find(|d| d.id() == definition) else {
            tracing::debug!(%definition, "sample for unknown definition ignored");
            return;
        };

        match descriptor.decode(sample) {
            Ok(value) => self.shared.store.put(definition, value),
            Err(e) => {
                tracing::warn!(
                    schema = descriptor.name(),
                    %definition,
                    error = %e,
                    "failed to decode sample"
                );
            }
        }
    }

    fn discard_queued_events(&self) {
        let dropped = self.events.try_iter().count();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded events queued for a closed session");
        }
    }

    /// Sleeps for `timeout` unless shutdown is signalled first.
    fn wait(&self, timeout: Duration) -> Wait {
        match self.shutdown.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) if !self.shared.is_disposed() => Wait::Elapsed,
            _ => Wait::Shutdown,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Replays event sets, then schemas, in registration order.
fn replay(
    connection: &mut dyn Connection,
    event_sets: &[EventSetDescriptor],
    schemas: &[SchemaDescriptor],
) -> std::result::Result<(), ConnectionError> {
    for set in event_sets {
        tracing::debug!(set = set.set(), "mapping event set");
        set.apply(connection)?;
    }
    for schema in schemas {
        tracing::debug!(schema = schema.name(), id = %schema.id(), "declaring schema");
        schema.apply(connection)?;
    }
    Ok(())
}
