//! Owns the three server-facing connectors, dispatches inbound frames to
//! listeners and buffers/flushes outbound ones (spec §4.5), plus the two
//! wrapper flavours that own the lifetime of a `MessageHub` (spec §4.6).
use crate::broadcast::EndpointTriple;
use crate::connectors::{Pusher, Replier, Subscriber};
use crate::frame::Frame;
use crate::messages::Message;
use crate::pinger::{BroadcastPinger, HubEvent};
use crate::registry::REGISTRY;
use common::error::{ProxyError, ProxyResult};
use common::logging::{self, Logger};
use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Anything that wants to be notified when a frame matching its filter
/// arrives. Implemented for `Rc<RefCell<Action>>` and `Rc<RefCell<Robot>>`.
pub trait Listener {
    fn notify(&self, message_type: &str, routing_id: &str, message: &Message) -> ProxyResult<()>;
}

pub type ListenerHandle = Rc<dyn Listener>;

/// Re-bound whenever a new `MessageHub` is created (spec glossary: Waiter).
pub trait Waiter {
    fn notify_message_hub(&self, hub: Rc<RefCell<MessageHub>>);
}

pub type WaiterHandle = Rc<dyn Waiter>;

struct Registration {
    routing_id: String,
    listener: ListenerHandle,
}

pub struct MessageHub {
    pusher: Pusher,
    subscriber: Subscriber,
    #[allow(dead_code)]
    replier: Replier,
    listeners: HashMap<String, Vec<Registration>>,
    outgoing: Vec<Vec<u8>>,
    log: Logger,
}

impl MessageHub {
    pub fn new(
        subscribe_address: &str,
        push_address: &str,
        replier_address: &str,
        context: &zmq::Context,
        log: &Logger,
    ) -> ProxyResult<MessageHub> {
        Ok(MessageHub {
            pusher: Pusher::new(push_address, context)?,
            subscriber: Subscriber::new(subscribe_address, context)?,
            replier: Replier::new(replier_address, context)?,
            listeners: HashMap::new(),
            outgoing: Vec::new(),
            log: log.new(logging::o!()),
        })
    }

    /// Idempotent with respect to `(listener, routing_id)`. An empty
    /// `routing_id` means "any id".
    pub fn register_listener(&mut self, listener: ListenerHandle, message_type: &str, routing_id: &str) {
        let entries = self.listeners.entry(message_type.to_string()).or_default();
        let already = entries
            .iter()
            .any(|r| r.routing_id == routing_id && Rc::ptr_eq(&r.listener, &listener));
        if !already {
            logging::debug!(self.log, "register_listener"; "type" => message_type, "routing_id" => routing_id);
            entries.push(Registration {
                routing_id: routing_id.to_string(),
                listener,
            });
        }
    }

    pub fn unregister_listener(&mut self, listener: &ListenerHandle, message_type: &str, routing_id: &str) {
        if let Some(entries) = self.listeners.get_mut(message_type) {
            entries.retain(|r| !(r.routing_id == routing_id && Rc::ptr_eq(&r.listener, listener)));
        }
    }

    /// Appends to the outbound buffer ; flushed on the next `step`.
    pub fn post(&mut self, payload: Vec<u8>) {
        self.outgoing.push(payload);
    }

    /// (1) one non-blocking read, dispatched to matching listeners ; (2)
    /// flush every buffered outbound payload.
    pub fn step(&mut self) -> ProxyResult<()> {
        match self.subscriber.read() {
            Ok(raw) => self.dispatch(&raw)?,
            Err(ProxyError::Wait) => {}
            Err(e) => return Err(e),
        }

        for payload in self.outgoing.drain(..) {
            self.pusher.write(&payload)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, raw: &[u8]) -> ProxyResult<()> {
        let frame = Frame::parse(raw)?;

        let decoder = match REGISTRY.get(frame.message_type.as_str()) {
            Some(decoder) => decoder,
            None => {
                logging::debug!(self.log, "message NOT known"; "type" => frame.message_type.clone());
                return Ok(());
            }
        };

        let message = decoder(&frame.payload)?;

        if let Some(entries) = self.listeners.get(&frame.message_type) {
            for registration in entries {
                let is_expected =
                    registration.routing_id.is_empty() || registration.routing_id == frame.routing_id;
                if is_expected {
                    registration
                        .listener
                        .notify(&frame.message_type, &frame.routing_id, &message)?;
                }
            }
        }
        Ok(())
    }
}

/// Shared bookkeeping for both wrapper flavours.
struct Inner {
    message_hub: Option<Rc<RefCell<MessageHub>>>,
    waiters: Vec<WaiterHandle>,
}

impl Inner {
    fn new() -> Inner {
        Inner {
            message_hub: None,
            waiters: Vec::new(),
        }
    }

    fn notify_waiters(&self) {
        if let Some(hub) = &self.message_hub {
            for waiter in &self.waiters {
                waiter.notify_message_hub(hub.clone());
            }
        }
    }
}

/// Builds a fresh `MessageHub` from a newly discovered [`EndpointTriple`].
pub struct HubBuilder {
    context: Arc<zmq::Context>,
    log: Logger,
}

impl HubBuilder {
    pub fn new(context: Arc<zmq::Context>, log: &Logger) -> HubBuilder {
        HubBuilder {
            context,
            log: log.new(logging::o!()),
        }
    }

    pub fn build(&self, triple: &EndpointTriple) -> ProxyResult<MessageHub> {
        MessageHub::new(
            &triple.subscribe_address,
            &triple.push_address,
            &triple.reply_address,
            &self.context,
            &self.log,
        )
    }
}

/// Either a single hub fixed at construction (`Static`) or one that is
/// created/destroyed/replaced in response to pinger events (`Broadcaster`) —
/// spec §4.6. Both variants expose the same `step`/`is_valid`/waiter
/// contract.
pub enum MessageHubWrapper {
    Static(Inner),
    Broadcaster {
        inner: Inner,
        pinger: BroadcastPinger,
        builder: HubBuilder,
    },
}

impl MessageHubWrapper {
    pub fn with_hub(hub: MessageHub) -> MessageHubWrapper {
        let mut inner = Inner::new();
        inner.message_hub = Some(Rc::new(RefCell::new(hub)));
        MessageHubWrapper::Static(inner)
    }

    pub fn broadcaster(pinger: BroadcastPinger, builder: HubBuilder) -> MessageHubWrapper {
        MessageHubWrapper::Broadcaster {
            inner: Inner::new(),
            pinger,
            builder,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.inner().message_hub.is_some()
    }

    pub fn hub(&self) -> Option<Rc<RefCell<MessageHub>>> {
        self.inner().message_hub.clone()
    }

    pub fn register_waiter(&mut self, waiter: WaiterHandle) {
        self.inner_mut().waiters.push(waiter);
    }

    fn inner(&self) -> &Inner {
        match self {
            MessageHubWrapper::Static(inner) => inner,
            MessageHubWrapper::Broadcaster { inner, .. } => inner,
        }
    }

    fn inner_mut(&mut self) -> &mut Inner {
        match self {
            MessageHubWrapper::Static(inner) => inner,
            MessageHubWrapper::Broadcaster { inner, .. } => inner,
        }
    }

    /// Static wrapper delegates straight to its one hub. Broadcaster first
    /// drains every pending pinger event (hub replacement happens before
    /// `step` in the same tick) then delegates if a hub currently exists.
    pub fn step(&mut self) -> ProxyResult<()> {
        match self {
            MessageHubWrapper::Static(inner) => {
                if let Some(hub) = &inner.message_hub {
                    hub.borrow_mut().step()?;
                }
                Ok(())
            }
            MessageHubWrapper::Broadcaster {
                inner,
                pinger,
                builder,
            } => {
                for event in pinger.drain() {
                    match event {
                        HubEvent::Available(triple) => {
                            let hub = builder.build(&triple)?;
                            inner.message_hub = Some(Rc::new(RefCell::new(hub)));
                            inner.notify_waiters();
                        }
                        HubEvent::Lost => {
                            inner.message_hub = None;
                        }
                    }
                }
                if let Some(hub) = &inner.message_hub {
                    hub.borrow_mut().step()?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::InputMsg;
    use std::cell::Cell;

    struct RecordingListener {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl RecordingListener {
        fn new() -> Rc<RecordingListener> {
            Rc::new(RecordingListener {
                calls: RefCell::new(Vec::new()),
            })
        }
    }

    impl Listener for RecordingListener {
        fn notify(&self, message_type: &str, routing_id: &str, _message: &Message) -> ProxyResult<()> {
            self.calls
                .borrow_mut()
                .push((message_type.to_string(), routing_id.to_string()));
            Ok(())
        }
    }

    struct CountingWaiter {
        count: Cell<u32>,
    }

    impl Waiter for CountingWaiter {
        fn notify_message_hub(&self, _hub: Rc<RefCell<MessageHub>>) {
            self.count.set(self.count.get() + 1);
        }
    }

    #[test]
    fn register_is_idempotent_for_same_listener_and_routing_id() {
        // Exercises the listener bookkeeping directly since it does not need
        // a live zmq socket.
        let mut listeners: HashMap<String, Vec<Registration>> = HashMap::new();
        let listener: ListenerHandle = RecordingListener::new();

        let push = |listeners: &mut HashMap<String, Vec<Registration>>| {
            let entries = listeners.entry("Registered".to_string()).or_default();
            if !entries
                .iter()
                .any(|r| r.routing_id == "951" && Rc::ptr_eq(&r.listener, &listener))
            {
                entries.push(Registration {
                    routing_id: "951".to_string(),
                    listener: listener.clone(),
                });
            }
        };

        push(&mut listeners);
        push(&mut listeners);
        push(&mut listeners);

        assert_eq!(listeners["Registered"].len(), 1);
    }

    #[test]
    fn dispatch_notifies_matching_listeners_once() {
        // Build a MessageHub-shaped dispatch manually since MessageHub::new
        // requires live sockets ; the routing logic under test lives in
        // `dispatch`, reproduced here against the same registry/frame code.
        let listener = RecordingListener::new();
        let mut entries: HashMap<String, Vec<Registration>> = HashMap::new();
        entries.insert(
            "Input".to_string(),
            vec![Registration {
                routing_id: "real_951".to_string(),
                listener: listener.clone() as ListenerHandle,
            }],
        );

        let msg = InputMsg {
            move_left: 0.5,
            move_right: -0.5,
            fire1: true,
            fire2: false,
        };
        let encoded = msg.encode().unwrap();
        let raw = Frame::encode("real_951", "Input", &encoded);
        let frame = Frame::parse(&raw).unwrap();

        for registration in &entries[&frame.message_type] {
            let is_expected =
                registration.routing_id.is_empty() || registration.routing_id == frame.routing_id;
            assert!(is_expected);
            registration
                .listener
                .notify(&frame.message_type, &frame.routing_id, &Message::Input(msg))
                .unwrap();
        }

        assert_eq!(listener.calls.borrow().len(), 1);
        assert_eq!(listener.calls.borrow()[0], ("Input".to_string(), "real_951".to_string()));
    }

    /// `connect` on PUSH/SUB/REQ sockets never blocks or fails without a live
    /// peer, so a real `MessageHub` can stand in for a hub appearance here
    /// without a live server.
    fn loopback_hub(log: &Logger) -> Rc<RefCell<MessageHub>> {
        let context = crate::connectors::new_context();
        let hub = MessageHub::new(
            "tcp://127.0.0.1:19290",
            "tcp://127.0.0.1:19291",
            "tcp://127.0.0.1:19292",
            &context,
            log,
        )
        .unwrap();
        Rc::new(RefCell::new(hub))
    }

    #[test]
    fn broadcaster_notifies_waiters_exactly_once_per_hub_appearance() {
        let log = logging::init(false);
        let waiter = Rc::new(CountingWaiter { count: Cell::new(0) });
        let mut inner = Inner::new();
        inner.waiters.push(waiter.clone());

        inner.message_hub = None;
        inner.notify_waiters();
        assert_eq!(waiter.count.get(), 0, "no hub yet, no notification");

        inner.message_hub = Some(loopback_hub(&log));
        inner.notify_waiters();
        assert_eq!(waiter.count.get(), 1, "first hub appearance notifies once");

        inner.message_hub = None;
        inner.notify_waiters();
        assert_eq!(waiter.count.get(), 1, "hub lost, no notification");

        inner.message_hub = Some(loopback_hub(&log));
        inner.notify_waiters();
        assert_eq!(waiter.count.get(), 2, "second hub appearance notifies once more");
    }
}
