//! A retry-capable functor driven by the `Engine` (spec §4.8). Pairs a
//! *doer* and a *success* predicate, optionally bound to a [`crate::proxy::Proxy`]
//! that subscribes it to exactly one message.
use crate::message_hub::{Listener, ListenerHandle};
use crate::messages::Message;
use crate::proxy::Proxy;
use crate::status::Status;
use common::error::{ErrorKind, ProxyError, ProxyResult};
use std::cell::RefCell;
use std::rc::Rc;

pub struct Action {
    doer: Box<dyn FnMut()>,
    success: Box<dyn Fn() -> bool>,
    proxy: Option<Rc<RefCell<Proxy>>>,
    repeat: bool,
    status: Status,
}

impl Action {
    /// Constructs the action and, if a proxy was supplied, registers it as a
    /// listener immediately (deferred internally by the proxy if the hub
    /// isn't valid yet).
    pub fn new(
        doer: impl FnMut() + 'static,
        success: impl Fn() -> bool + 'static,
        proxy: Option<Rc<RefCell<Proxy>>>,
        repeat: bool,
    ) -> Rc<RefCell<Action>> {
        let action = Rc::new(RefCell::new(Action {
            doer: Box::new(doer),
            success: Box::new(success),
            proxy: proxy.clone(),
            repeat,
            status: Status::Created,
        }));

        if let Some(proxy) = &proxy {
            let handle: ListenerHandle = action.clone();
            proxy.borrow_mut().register_listener(handle);
        }

        action
    }

    /// Invokes the doer, then advances the status machine.
    pub fn call(&mut self) {
        (self.doer)();
        self.update_status();
    }

    /// Advances the status machine without calling the doer again ; used by
    /// the engine to resolve a notified action and by retry to cycle back
    /// to `created`.
    pub fn reset(&mut self) {
        self.update_status();
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    fn update_status(&mut self) {
        let mut updated = false;

        if self.status == Status::Created {
            self.status = if self.proxy.is_some() {
                Status::Pending
            } else {
                Status::Waiting
            };
            updated = true;
        }

        if !updated {
            match self.status {
                Status::Pending => self.status = Status::Waiting,
                Status::Successful | Status::Failed => self.status = Status::Created,
                _ => {}
            }
        }

        if self.status == Status::Waiting && self.proxy.is_none() {
            self.status = if (self.success)() {
                Status::Successful
            } else {
                Status::Failed
            };
        }
    }
}

impl Listener for Rc<RefCell<Action>> {
    /// May only be invoked on an action bound to a proxy. Validates that the
    /// notification matches the proxy's filter — a mismatch is a fatal
    /// programmer error, not a retryable one (spec §4.8, design note).
    fn notify(&self, message_type: &str, routing_id: &str, message: &Message) -> ProxyResult<()> {
        let proxy = self
            .borrow()
            .proxy
            .clone()
            .expect("Action::notify called on an action with no proxy");

        {
            let proxy_ref = proxy.borrow();
            if !proxy_ref.message_type.is_empty() && proxy_ref.message_type != message_type {
                return Err(ProxyError::Fatal(ErrorKind::FilterMismatch(format!(
                    "expected message type {} but got {}",
                    proxy_ref.message_type, message_type
                ))));
            }
            if !proxy_ref.routing_id.is_empty() && proxy_ref.routing_id != routing_id {
                return Err(ProxyError::Fatal(ErrorKind::FilterMismatch(format!(
                    "expected routing id {} but got {}",
                    proxy_ref.routing_id, routing_id
                ))));
            }
        }

        self.borrow_mut().update_status();

        let callback_result = {
            let proxy_ref = proxy.borrow();
            (proxy_ref.callback)(message_type, routing_id, message)
        };
        callback_result?;

        self.borrow_mut().update_status();

        let handle: ListenerHandle = self.clone();
        proxy.borrow().unregister(handle);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn action_without_proxy_resolves_synchronously() {
        let called = Rc::new(Cell::new(0));
        let called_clone = called.clone();
        let action = Action::new(move || called_clone.set(called_clone.get() + 1), || true, None, false);
        action.borrow_mut().call();
        assert_eq!(action.borrow().status(), Status::Successful);
        assert_eq!(called.get(), 1);
    }

    #[test]
    fn action_without_proxy_fails_when_predicate_false() {
        let action = Action::new(|| {}, || false, None, false);
        action.borrow_mut().call();
        assert_eq!(action.borrow().status(), Status::Failed);
    }

    #[test]
    fn successful_action_resets_to_created_when_repeat() {
        let action = Action::new(|| {}, || true, None, true);
        action.borrow_mut().call();
        assert_eq!(action.borrow().status(), Status::Successful);
        action.borrow_mut().reset();
        assert_eq!(action.borrow().status(), Status::Created);
    }
}
