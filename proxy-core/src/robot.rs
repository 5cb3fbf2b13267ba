//! Per-robot state machine: registration handshake, then edge-triggered
//! input-to-device translation (spec §4.9).
use crate::device::Device;
use crate::engine::Engine;
use crate::message_hub::{Listener, ListenerHandle, MessageHubWrapper};
use crate::messages::{Message, RegisterMsg};
use crate::action::Action;
use crate::proxy::Proxy;
use common::error::{ErrorKind, ProxyError, ProxyResult};
use common::logging::{self, Logger};
use serde_derive::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const REGISTER_IMAGE_PLACEHOLDER: &str = "no image";

/// Self-description handed to the admin endpoint's `json list robot` reply.
#[derive(Debug, Serialize)]
pub struct RobotView {
    pub robot_id: String,
    pub registered: bool,
    pub left: f32,
    pub right: f32,
    pub fire1: bool,
    pub fire2: bool,
}

pub struct Robot {
    robot_id: RefCell<String>,
    registered: Cell<bool>,
    left: Cell<f32>,
    right: Cell<f32>,
    fire1: Cell<bool>,
    fire2: Cell<bool>,
    previous_left: Cell<f32>,
    previous_right: Cell<f32>,
    previous_fire1: Cell<bool>,
    previous_fire2: Cell<bool>,
    device: RefCell<Device>,
    wrapper: Rc<RefCell<MessageHubWrapper>>,
    /// Server-assigned id to subscribe `Input` to, set by `notify` on
    /// `Registered` and applied by `step` — never actioned during dispatch
    /// itself, since the hub/wrapper are already borrowed by the `step` that
    /// is in the middle of delivering this very notification.
    pending_input_subscription: RefCell<Option<String>>,
    log: Logger,
}

impl Robot {
    pub fn new(robot_id: &str, wrapper: Rc<RefCell<MessageHubWrapper>>, device: Device, log: &Logger) -> Rc<Robot> {
        Rc::new(Robot {
            robot_id: RefCell::new(robot_id.to_string()),
            registered: Cell::new(false),
            left: Cell::new(0.0),
            right: Cell::new(0.0),
            fire1: Cell::new(false),
            fire2: Cell::new(false),
            previous_left: Cell::new(0.0),
            previous_right: Cell::new(0.0),
            previous_fire1: Cell::new(false),
            previous_fire2: Cell::new(false),
            device: RefCell::new(device),
            wrapper,
            pending_input_subscription: RefCell::new(None),
            log: log.new(logging::o!("robot_id" => robot_id.to_string())),
        })
    }

    pub fn robot_id(&self) -> String {
        self.robot_id.borrow().clone()
    }

    pub fn registered(&self) -> bool {
        self.registered.get()
    }

    pub fn describe(&self) -> RobotView {
        RobotView {
            robot_id: self.robot_id(),
            registered: self.registered.get(),
            left: self.left.get(),
            right: self.right.get(),
            fire1: self.fire1.get(),
            fire2: self.fire2.get(),
        }
    }

    /// Binds a proxy filtered to `Registered` at the current id, and an
    /// action whose doer posts a `Register` frame; the action retries until
    /// the server responds (spec §4.9).
    pub fn queue_register(robot: &Rc<Robot>, engine: &mut Engine) {
        let temporary_id = robot.robot_id();
        let proxy = Proxy::new(robot.wrapper.clone(), "Registered", &temporary_id, {
            let robot = robot.clone();
            move |message_type, routing_id, message| Listener::notify(&robot, message_type, routing_id, message)
        });

        let wrapper = robot.wrapper.clone();
        let robot_for_doer = robot.clone();
        let robot_for_success = robot.clone();

        let action = Action::new(
            move || {
                let register = RegisterMsg {
                    temporary_robot_id: robot_for_doer.robot_id(),
                    image: REGISTER_IMAGE_PLACEHOLDER.to_string(),
                };
                if let Ok(encoded) = register.encode() {
                    let frame = crate::frame::Frame::encode(&robot_for_doer.robot_id(), "Register", &encoded);
                    if let Some(hub) = wrapper.borrow().hub() {
                        hub.borrow_mut().post(frame);
                    }
                }
            },
            move || robot_for_success.registered(),
            Some(proxy),
            true,
        );

        engine.add_action(action);
    }

    /// Edge-triggered: calls the device only when `(left,right)` or
    /// `(fire1,fire2)` differ from the previously committed values, and
    /// only while the device reports `ready` (spec §4.9, §8). Also applies
    /// any `Input` re-subscription left pending by `notify` — deferred here
    /// because by the time `Program::tick` reaches `step`, the hub/wrapper
    /// borrows held by message dispatch have already been released.
    pub fn step(robot: &Rc<Robot>) -> ProxyResult<()> {
        if let Some(routing_id) = robot.pending_input_subscription.borrow_mut().take() {
            match robot.wrapper.borrow().hub() {
                Some(hub) => {
                    let handle: ListenerHandle = robot.clone();
                    hub.borrow_mut().register_listener(handle, "Input", &routing_id);
                }
                None => *robot.pending_input_subscription.borrow_mut() = Some(routing_id),
            }
        }

        let mut device = robot.device.borrow_mut();
        device.poll();

        if !device.ready() {
            return Ok(());
        }

        let (left, right) = (robot.left.get(), robot.right.get());
        if left != robot.previous_left.get() || right != robot.previous_right.get() {
            device.move_to(left, right)?;
            robot.previous_left.set(left);
            robot.previous_right.set(right);
        }

        let (fire1, fire2) = (robot.fire1.get(), robot.fire2.get());
        if fire1 != robot.previous_fire1.get() || fire2 != robot.previous_fire2.get() {
            device.fire(fire1, fire2)?;
            robot.previous_fire1.set(fire1);
            robot.previous_fire2.set(fire2);
        }

        Ok(())
    }
}

impl Listener for Rc<Robot> {
    /// Handles a message that this robot's proxies subscribed it to.
    /// `Registered` completes the handshake and records the server-assigned
    /// id for `step` to subscribe `Input` to next tick (notify runs nested
    /// inside the hub/wrapper's own borrow, so it must not re-enter either);
    /// `Input` updates the live input values. Anything else is a fatal error
    /// — the core never subscribes itself to other types.
    fn notify(&self, _message_type: &str, _routing_id: &str, message: &Message) -> ProxyResult<()> {
        match message {
            Message::Registered(registered) => {
                *self.robot_id.borrow_mut() = registered.robot_id.clone();
                self.registered.set(true);
                logging::info!(self.log, "registered"; "robot_id" => registered.robot_id.clone());
                *self.pending_input_subscription.borrow_mut() = Some(registered.robot_id.clone());
                Ok(())
            }
            Message::Input(input) => {
                self.left.set(input.move_left);
                self.right.set(input.move_right);
                self.fire1.set(input.fire1);
                self.fire2.set(input.fire2);
                Ok(())
            }
            Message::Register(_) => Err(ProxyError::Fatal(ErrorKind::Malformed(
                "robot received a Register message, which is server-bound only".into(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a `Static` wrapper over a real `MessageHub` pointed at
    /// loopback addresses nothing listens on — `connect` on PUSH/SUB/REQ
    /// sockets never blocks or fails just because the peer is absent, so
    /// this needs no live server and no background thread.
    fn test_wrapper(log: &Logger) -> Rc<RefCell<MessageHubWrapper>> {
        let context = crate::connectors::new_context();
        let hub = crate::message_hub::MessageHub::new(
            "tcp://127.0.0.1:19190",
            "tcp://127.0.0.1:19191",
            "tcp://127.0.0.1:19192",
            &context,
            log,
        )
        .unwrap();
        Rc::new(RefCell::new(MessageHubWrapper::with_hub(hub)))
    }

    #[test]
    fn input_notification_updates_the_four_live_values() {
        let log = logging::init(false);
        let wrapper = test_wrapper(&log);
        let robot = Robot::new("951", wrapper, Device::Stub, &log);

        let input = crate::messages::InputMsg {
            move_left: 0.5,
            move_right: -0.5,
            fire1: true,
            fire2: false,
        };
        Listener::notify(&robot, "Input", "951", &Message::Input(input)).unwrap();

        assert_eq!(robot.left.get(), 0.5);
        assert_eq!(robot.right.get(), -0.5);
        assert!(robot.fire1.get());
        assert!(!robot.fire2.get());
    }

    #[test]
    fn registered_notification_flips_the_flag_and_adopts_the_server_id() {
        let log = logging::init(false);
        let wrapper = test_wrapper(&log);
        let robot = Robot::new("951", wrapper, Device::Stub, &log);

        let registered = crate::messages::RegisteredMsg {
            robot_id: "real_951".into(),
        };
        Listener::notify(&robot, "Registered", "951", &Message::Registered(registered)).unwrap();

        assert!(robot.registered());
        assert_eq!(robot.robot_id(), "real_951");
        assert_eq!(
            robot.pending_input_subscription.borrow().as_deref(),
            Some("real_951"),
            "notify must not touch the hub itself; step applies this"
        );
    }

    #[test]
    fn step_applies_the_deferred_input_subscription_without_reentering_the_hub() {
        let log = logging::init(false);
        let wrapper = test_wrapper(&log);
        let robot = Robot::new("951", wrapper, Device::Stub, &log);

        let registered = crate::messages::RegisteredMsg {
            robot_id: "real_951".into(),
        };
        Listener::notify(&robot, "Registered", "951", &Message::Registered(registered)).unwrap();
        assert!(robot.pending_input_subscription.borrow().is_some());

        Robot::step(&robot).unwrap();

        assert!(robot.pending_input_subscription.borrow().is_none());
    }

    #[test]
    fn register_message_to_a_robot_is_a_fatal_error() {
        let log = logging::init(false);
        let wrapper = test_wrapper(&log);
        let robot = Robot::new("951", wrapper, Device::Stub, &log);

        let register = RegisterMsg {
            temporary_robot_id: "951".into(),
            image: "x".into(),
        };
        let result = Listener::notify(&robot, "Register", "951", &Message::Register(register));
        assert!(result.is_err());
    }
}
