// Client side of the map event channel.
//
// `LiveUpdateBridge` owns one long-lived connection and a single active map
// subscription. The subscription is an explicit field and is re-sent from
// `on_connect`, so a reconnect restores it without any help from the caller.
// Network I/O sits behind the `Transport` and `Connector` traits.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};

use crate::hub::{outbound_channel, MapHub, Membership};
use crate::protocol::{ClientMessage, ServerEvent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("connection closed")]
    Closed,
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("map id must not be empty")]
    EmptyMapId,
}

/// Outbound half of an open connection.
pub trait Transport: Send {
    fn send(&mut self, msg: &ClientMessage) -> Result<(), BridgeError>;
    fn close(&mut self);
}

/// An open connection: the outbound transport plus inbound text frames.
/// The inbound receiver yielding `None` means the connection dropped.
pub struct Connection<T> {
    pub transport: T,
    pub inbound: mpsc::Receiver<String>,
}

/// Opens connections for the reconnect driver.
pub trait Connector: Send {
    type Transport: Transport + 'static;

    fn connect(
        &mut self,
    ) -> impl Future<Output = Result<Connection<Self::Transport>, BridgeError>> + Send;
}

type EventHandler = Box<dyn FnMut(&ServerEvent) + Send>;

pub struct LiveUpdateBridge<T: Transport> {
    transport: Option<T>,
    active_map: Option<String>,
    status: watch::Sender<bool>,
    handler: EventHandler,
    shutdown: Arc<Notify>,
    /// Fresh per connection; fired when the current connection is lost.
    link_lost: Arc<Notify>,
    torn_down: bool,
}

impl<T: Transport> LiveUpdateBridge<T> {
    /// `handler` receives every inbound event for the active map.
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(&ServerEvent) + Send + 'static,
    {
        Self {
            transport: None,
            active_map: None,
            status: watch::channel(false).0,
            handler: Box::new(handler),
            shutdown: Arc::new(Notify::new()),
            link_lost: Arc::new(Notify::new()),
            torn_down: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    /// Observe connection status changes.
    pub fn status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    pub fn active_map(&self) -> Option<&str> {
        self.active_map.as_deref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Install a freshly opened connection and re-join the active map.
    pub fn on_connect(&mut self, transport: T) {
        if self.torn_down {
            let mut transport = transport;
            transport.close();
            return;
        }
        self.transport = Some(transport);
        self.link_lost = Arc::new(Notify::new());
        if let Some(map_id) = self.active_map.clone() {
            self.send(&ClientMessage::join(&map_id));
        }
        // Report connected only once the re-join went out
        if self.transport.is_some() {
            self.status.send_replace(true);
            tracing::info!(active_map = ?self.active_map, "Live update channel connected");
        }
    }

    /// The connection went away. The active map is kept for the next connect,
    /// and a running reconnect driver is woken to open a new connection.
    pub fn on_disconnect(&mut self) {
        if self.transport.take().is_some() {
            tracing::warn!("Live update channel disconnected");
            self.link_lost.notify_one();
        }
        self.status.send_replace(false);
    }

    /// Switch the active map: leave the previous one, then join the new one.
    /// While offline only the field changes; `on_connect` sends the join.
    /// A blank map id is rejected and leaves the subscription as it was.
    pub fn set_active_map(&mut self, map_id: Option<&str>) -> Result<(), BridgeError> {
        if map_id.is_some_and(|id| id.trim().is_empty()) {
            return Err(BridgeError::EmptyMapId);
        }
        self.switch_map(map_id);
        Ok(())
    }

    pub fn subscribe(&mut self, map_id: &str) -> Result<(), BridgeError> {
        self.set_active_map(Some(map_id))
    }

    /// Drop the subscription if `map_id` is the active one.
    pub fn unsubscribe(&mut self, map_id: &str) {
        if self.active_map.as_deref() == Some(map_id) {
            self.switch_map(None);
        }
    }

    fn switch_map(&mut self, map_id: Option<&str>) {
        if self.active_map.as_deref() == map_id {
            return;
        }
        if let Some(previous) = self.active_map.take() {
            self.send(&ClientMessage::leave(&previous));
        }
        self.active_map = map_id.map(str::to_string);
        if let Some(next) = map_id {
            self.send(&ClientMessage::join(next));
        }
    }

    /// Decode an inbound frame and dispatch it if it belongs to the active
    /// map. Returns whether the handler ran.
    pub fn handle_inbound(&mut self, frame: &str) -> bool {
        let event = match ServerEvent::parse(frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping inbound frame: {e}");
                return false;
            }
        };
        self.dispatch(&event)
    }

    /// Run the handler for `event` if its map is the active one. Stale events
    /// for a map we already switched away from are dropped.
    pub fn dispatch(&mut self, event: &ServerEvent) -> bool {
        if self.active_map.as_deref() != Some(event.map_id()) {
            tracing::debug!(
                map_id = event.map_id(),
                event = event.name(),
                "Ignoring event for inactive map"
            );
            return false;
        }
        (self.handler)(event);
        true
    }

    /// Leave the active map and close the connection for good.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(map_id) = self.active_map.take() {
            self.send(&ClientMessage::leave(&map_id));
        }
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.torn_down = true;
        self.status.send_replace(false);
        self.shutdown.notify_one();
    }

    fn shutdown_signal(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    fn link_signal(&self) -> Arc<Notify> {
        self.link_lost.clone()
    }

    /// Send over the open connection. A failed send counts as a disconnect;
    /// nothing is sent while offline.
    fn send(&mut self, msg: &ClientMessage) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send(msg) {
            tracing::warn!(map_id = msg.map_id(), "Send failed: {e}");
            self.on_disconnect();
        }
    }
}

impl<T: Transport> Drop for LiveUpdateBridge<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Fixed attempt count, fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Consecutive failed connects before giving up.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Keep the bridge connected until it is torn down or `policy` runs out of
/// attempts. Inbound frames are pumped into `handle_inbound`.
pub async fn run_with_reconnect<C>(
    bridge: Arc<Mutex<LiveUpdateBridge<C::Transport>>>,
    mut connector: C,
    policy: ReconnectPolicy,
) -> Result<(), BridgeError>
where
    C: Connector,
{
    let shutdown = bridge.lock().unwrap().shutdown_signal();
    let mut failures = 0u32;

    loop {
        if bridge.lock().unwrap().is_torn_down() {
            return Ok(());
        }

        match connector.connect().await {
            Ok(Connection {
                transport,
                mut inbound,
            }) => {
                failures = 0;
                let link_lost = {
                    let mut bridge = bridge.lock().unwrap();
                    bridge.on_connect(transport);
                    bridge.link_signal()
                };
                loop {
                    tokio::select! {
                        frame = inbound.recv() => match frame {
                            Some(frame) => {
                                bridge.lock().unwrap().handle_inbound(&frame);
                            }
                            None => break,
                        },
                        // A failed send or an explicit disconnect
                        _ = link_lost.notified() => break,
                        _ = shutdown.notified() => return Ok(()),
                    }
                }
                bridge.lock().unwrap().on_disconnect();
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(attempt = failures, "Live update connect failed: {e}");
                if failures >= policy.max_attempts {
                    tracing::error!("Giving up after {failures} connect attempts");
                    return Err(e);
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = shutdown.notified() => return Ok(()),
        }
    }
}

/// In-process transport straight into a `MapHub`, for embedding the editor
/// next to the hub and for tests.
pub struct HubTransport {
    membership: Option<Membership>,
}

impl Transport for HubTransport {
    fn send(&mut self, msg: &ClientMessage) -> Result<(), BridgeError> {
        let membership = self.membership.as_mut().ok_or(BridgeError::Closed)?;
        membership.apply(msg);
        Ok(())
    }

    fn close(&mut self) {
        self.membership = None;
    }
}

pub struct HubConnector {
    hub: Arc<MapHub>,
}

impl HubConnector {
    pub fn new(hub: Arc<MapHub>) -> Self {
        Self { hub }
    }
}

impl Connector for HubConnector {
    type Transport = HubTransport;

    fn connect(
        &mut self,
    ) -> impl Future<Output = Result<Connection<HubTransport>, BridgeError>> + Send {
        let hub = self.hub.clone();
        async move {
            let (tx, rx) = outbound_channel();
            Ok(Connection {
                transport: HubTransport {
                    membership: Some(Membership::new(hub, tx)),
                },
                inbound: rx,
            })
        }
    }
}
