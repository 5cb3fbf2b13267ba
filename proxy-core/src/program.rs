//! Composition root: owns the hub wrapper, engine, beacon listener, admin
//! endpoint, socket pool and robot registry, and drives one tick (spec
//! §4.13). `proxy-runner` is the only caller ; it parses CLI flags, builds
//! a `Program`, and calls `tick()` in a loop sleeping ~10ms in between.
use crate::admin::Admin;
use crate::beacon::{self, BroadcastListener, PortQueue};
use crate::device::{Device, UdpRobot};
use crate::engine::Engine;
use crate::message_hub::MessageHubWrapper;
use crate::robot::Robot;
use crate::sockets::SocketsLister;
use common::error::ProxyResult;
use common::logging::{self, Logger};
use std::rc::Rc;

pub struct Program {
    hub_wrapper: Rc<std::cell::RefCell<MessageHubWrapper>>,
    engine: Engine,
    admin: Admin,
    sockets: SocketsLister,
    robots: Vec<Rc<Robot>>,
    _beacon: Option<BroadcastListener>,
    log: Logger,
}

impl Program {
    pub fn new(
        hub_wrapper: Rc<std::cell::RefCell<MessageHubWrapper>>,
        admin: Admin,
        sockets: SocketsLister,
        beacon: Option<BroadcastListener>,
        log: &Logger,
    ) -> Program {
        Program {
            hub_wrapper,
            engine: Engine::new(),
            admin,
            sockets,
            robots: Vec::new(),
            _beacon: beacon,
            log: log.clone(),
        }
    }

    /// Draws one socket from the pool for the robot's device, queues its
    /// registration handshake, and adds it to the tick order.
    pub fn add_robot(&mut self, robot_id: &str) -> ProxyResult<()> {
        let device = match self.sockets.pop_available_socket() {
            Some(socket) => Device::UdpRobot(UdpRobot::new(socket, &self.log)),
            None => {
                logging::warn!(self.log, "socket pool exhausted"; "robot_id" => robot_id.to_string());
                Device::Stub
            }
        };

        let robot = Robot::new(robot_id, self.hub_wrapper.clone(), device, &self.log);
        Robot::queue_register(&robot, &mut self.engine);
        self.robots.push(robot);
        Ok(())
    }

    /// One full tick: advance the hub wrapper, the engine, service the
    /// admin endpoint, then step every robot in insertion order.
    pub fn tick(&mut self) -> ProxyResult<()> {
        self.hub_wrapper.borrow_mut().step()?;
        self.engine.step();
        self.admin.step(&self.robots)?;
        for robot in &self.robots {
            Robot::step(robot)?;
        }
        Ok(())
    }
}

/// Builds the shared beacon port queue from the socket pool's bound local
/// ports, letting the beacon hand out exactly the ports `SocketsLister`
/// actually owns.
pub fn port_queue_from_pool(sockets: &SocketsLister) -> ProxyResult<PortQueue> {
    Ok(beacon::new_port_queue(sockets.available_ports()?))
}
