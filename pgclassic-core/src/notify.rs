use crate::{Connection, DbError, Notification, Result};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Channel name prefix of the reserved stop sibling: listening on `event`
/// also listens on `stop_event`, and a notification there terminates the
/// loop after one final dispatch.
pub const STOP_PREFIX: &str = "stop_";

/// Typed outcome of one wait-loop wakeup, emitted in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyEvent {
    /// A notification arrived on the subscribed channel; the loop keeps
    /// running.
    Delivered(Notification),
    /// A notification arrived on the stop sibling channel; the loop
    /// terminates after emitting this.
    Stopped(Notification),
    /// The optional timeout elapsed with no traffic. A normal termination,
    /// not an error.
    TimedOut,
}

#[derive(Debug, Default)]
struct HandlerState {
    listening: AtomicBool,
    closed: AtomicBool,
}

enum NotifySink {
    Events(UnboundedSender<NotifyEvent>),
    Callback(Box<dyn FnMut(NotifyEvent) + Send>),
}

/// A subscription to one notification channel on a dedicated connection.
///
/// The handler owns its connection for the whole subscription lifetime.
/// [`run`](NotificationHandler::run) consumes the handler and drives the
/// wait loop on whatever task the caller spawns it on; lifecycle control
/// from other tasks goes through the cloneable [`NotifyHandle`].
///
/// ```rust,ignore
/// let (handler, mut events) = NotificationHandler::new(listen_conn, "event_1")?;
/// let handle = handler.handle();
/// let worker = tokio::spawn(handler.run());
/// handle.notify(&mut other_conn, false, "payload 1").await?;
/// assert!(matches!(events.recv().await, Some(NotifyEvent::Delivered(..))));
/// handle.notify(&mut other_conn, true, "").await?;
/// worker.await??;
/// ```
pub struct NotificationHandler<C: Connection> {
    connection: C,
    event: String,
    stop_event: String,
    timeout: Option<Duration>,
    sink: NotifySink,
    state: Arc<HandlerState>,
}

impl<C: Connection> NotificationHandler<C> {
    /// Subscribe in typed-event mode: wake-ups are emitted as
    /// [`NotifyEvent`]s over the returned channel.
    pub fn new(connection: C, event: &str) -> Result<(Self, UnboundedReceiver<NotifyEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((
            Self::build(connection, event, NotifySink::Events(tx))?,
            rx,
        ))
    }

    /// Subscribe in callback mode: `callback` is invoked from the wait loop
    /// for every wake-up. See [`arg_map_callback`] for the legacy
    /// shared-map flavor.
    pub fn with_callback(
        connection: C,
        event: &str,
        callback: impl FnMut(NotifyEvent) + Send + 'static,
    ) -> Result<Self> {
        Self::build(connection, event, NotifySink::Callback(Box::new(callback)))
    }

    fn build(connection: C, event: &str, sink: NotifySink) -> Result<Self> {
        if event.is_empty() {
            return Err(DbError::usage("notification event name must not be empty").into());
        }
        Ok(Self {
            connection,
            event: event.to_owned(),
            stop_event: format!("{}{}", STOP_PREFIX, event),
            timeout: None,
            sink,
            state: Arc::new(HandlerState::default()),
        })
    }

    /// Terminate with a [`NotifyEvent::TimedOut`] dispatch when no
    /// notification arrives within `timeout`. Without this the loop waits
    /// indefinitely.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The subscribed channel name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// A cloneable control handle for use from other tasks.
    pub fn handle(&self) -> NotifyHandle {
        NotifyHandle {
            event: self.event.clone(),
            stop_event: self.stop_event.clone(),
            listener_pid: self.connection.backend_pid(),
            state: self.state.clone(),
        }
    }

    /// Run the subscription until a stop notification, timeout expiry or
    /// [`NotifyHandle::close`]. Consuming `self` makes a reentrant start
    /// unrepresentable.
    ///
    /// Connection faults and LISTEN/UNLISTEN failures propagate out as
    /// errors (the owning task observes the failure); timeout expiry does
    /// not.
    pub async fn run(mut self) -> Result<()> {
        let result = self.listen_loop().await;
        self.state.listening.store(false, Ordering::Relaxed);
        if let Err(e) = &result {
            log::error!("notification handler for `{}` failed: {:#}", self.event, e);
        }
        result
    }

    async fn listen_loop(&mut self) -> Result<()> {
        self.connection.listen(&self.event).await?;
        self.connection.listen(&self.stop_event).await?;
        self.state.listening.store(true, Ordering::Relaxed);
        loop {
            let notification = self.connection.wait_for_notification(self.timeout).await?;
            if self.state.closed.load(Ordering::Relaxed) {
                // Closed while blocked: skip dispatch, fall through to the
                // unlisten pair below.
                break;
            }
            match notification {
                None => {
                    self.dispatch(NotifyEvent::TimedOut);
                    break;
                }
                Some(n) if n.channel == self.stop_event => {
                    self.dispatch(NotifyEvent::Stopped(n));
                    break;
                }
                Some(n) if n.channel == self.event => self.dispatch(NotifyEvent::Delivered(n)),
                Some(n) => {
                    log::debug!("ignoring notification on unrelated channel `{}`", n.channel);
                }
            }
        }
        self.state.listening.store(false, Ordering::Relaxed);
        self.connection.unlisten(&self.event).await?;
        self.connection.unlisten(&self.stop_event).await?;
        Ok(())
    }

    fn dispatch(&mut self, event: NotifyEvent) {
        match &mut self.sink {
            NotifySink::Events(tx) => {
                if tx.send(event).is_err() {
                    log::warn!("notification receiver for `{}` dropped, event discarded", self.event);
                }
            }
            NotifySink::Callback(callback) => callback(event),
        }
    }
}

/// Control surface of a running [`NotificationHandler`], safe to clone and
/// use from any task.
#[derive(Debug, Clone)]
pub struct NotifyHandle {
    event: String,
    stop_event: String,
    listener_pid: i32,
    state: Arc<HandlerState>,
}

impl NotifyHandle {
    /// True exactly between successful subscription and termination (stop,
    /// timeout or close).
    pub fn listening(&self) -> bool {
        self.state.listening.load(Ordering::Relaxed)
    }

    /// Mark the subscription closed. Idempotent; calling it after natural
    /// termination is a no-op.
    ///
    /// Cancellation is cooperative: a blocked wait is not interrupted. The
    /// loop observes the close on its next wake-up (stop notification or
    /// timeout) and performs the single UNLISTEN pair then.
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::Relaxed);
        self.state.listening.store(false, Ordering::Relaxed);
    }

    /// Send a notification towards this subscription from a *different*
    /// connection: `stop_<event>` when `stop`, else `<event>`.
    ///
    /// Listening and notifying on the same connection cannot work (the
    /// listener's wait loop owns that connection), so a sender whose backend
    /// pid matches the listener's is rejected as a usage error.
    pub async fn notify(
        &self,
        connection: &mut impl Connection,
        stop: bool,
        payload: &str,
    ) -> Result<()> {
        if connection.backend_pid() == self.listener_pid {
            return Err(DbError::usage(format!(
                "cannot notify `{}` on the connection listening to it",
                self.event
            ))
            .into());
        }
        let channel = if stop { &self.stop_event } else { &self.event };
        connection.send_notification(channel, payload).await
    }
}

/// Arguments shared between the caller and the legacy callback mode.
pub type NotifyArgs = Arc<Mutex<HashMap<String, String>>>;

/// Adapter for the legacy "mutate a shared map" callback contract.
///
/// On `Delivered` and `Stopped` the map gains `event` (full channel name,
/// including the `stop_` prefix on stop), `pid` and `extra` (payload), and
/// `callback` runs with the map borrowed. On `TimedOut` the map is left
/// untouched and `callback` runs with `None`, which is how callbacks tell
/// the two termination paths apart.
///
/// The map is only mutated from the subscription's own task during
/// dispatch; callers must not write to it while listening.
pub fn arg_map_callback<F>(args: NotifyArgs, mut callback: F) -> impl FnMut(NotifyEvent) + Send
where
    F: FnMut(Option<&mut HashMap<String, String>>) + Send + 'static,
{
    move |event| match event {
        NotifyEvent::Delivered(n) | NotifyEvent::Stopped(n) => {
            let mut map = args.lock().unwrap_or_else(PoisonError::into_inner);
            map.insert("event".to_owned(), n.channel);
            map.insert("pid".to_owned(), n.pid.to_string());
            map.insert("extra".to_owned(), n.payload);
            callback(Some(&mut map));
        }
        NotifyEvent::TimedOut => callback(None),
    }
}
