//! UDP presence beacon: a background worker that answers any probe on the
//! proxy's beacon port with the next unused local port, or `Goodbye` once
//! the queue is empty (spec §4.10).
use common::logging::{self, Logger};
use std::collections::VecDeque;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const GOODBYE: &str = "Goodbye";

/// FIFO of local ports awaiting distribution, shared between the Program
/// (which populates it as robots are added) and the listener thread.
pub type PortQueue = Arc<Mutex<VecDeque<u16>>>;

pub fn new_port_queue(ports: impl IntoIterator<Item = u16>) -> PortQueue {
    Arc::new(Mutex::new(ports.into_iter().collect()))
}

/// Computes the reply for one probe: the decimal ascii of the next queued
/// port, or `Goodbye` if none remain.
fn next_reply(queue: &PortQueue) -> String {
    match queue.lock().unwrap().pop_front() {
        Some(port) => port.to_string(),
        None => GOODBYE.to_string(),
    }
}

pub struct BroadcastListener {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BroadcastListener {
    pub fn start(port: u16, queue: PortQueue, log: &Logger) -> std::io::Result<BroadcastListener> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker_log = log.new(logging::o!());

        let handle = thread::spawn(move || run(socket, queue, worker_stop, worker_log));

        Ok(BroadcastListener {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BroadcastListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(socket: UdpSocket, queue: PortQueue, stop: Arc<AtomicBool>, log: Logger) {
    let mut buf = [0u8; 64];
    while !stop.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((_, from)) => {
                let reply = next_reply(&queue);
                logging::debug!(log, "beacon probe"; "from" => from.to_string(), "reply" => reply.clone());
                if let Err(e) = socket.send_to(reply.as_bytes(), from) {
                    logging::warn!(log, "beacon reply failed"; "error" => e.to_string());
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => logging::warn!(log, "beacon recv error"; "error" => e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_with_queued_ports_in_order_then_goodbye() {
        let queue = new_port_queue(vec![40001, 40002]);

        assert_eq!(next_reply(&queue), "40001");
        assert_eq!(next_reply(&queue), "40002");
        assert_eq!(next_reply(&queue), GOODBYE);
    }

    #[test]
    fn empty_queue_replies_goodbye() {
        let queue = new_port_queue(Vec::new());
        assert_eq!(next_reply(&queue), GOODBYE);
    }
}
