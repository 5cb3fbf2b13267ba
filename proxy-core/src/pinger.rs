//! Background worker that periodically probes the game server and reports
//! liveness to the `MessageHubWrapper` over a channel (spec §4.4, §5).
use crate::broadcast::{Broadcast, EndpointTriple};
use common::logging::{self, Logger};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Emitted on the pinger -> wrapper channel.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// The server was found (or re-found); here are its endpoints.
    Available(EndpointTriple),
    /// The server that used to respond no longer does.
    Lost,
}

/// Handle to the running pinger thread. Dropping it does not stop the
/// thread ; call `stop` (or let the `Arc<AtomicBool>` be dropped elsewhere)
/// to do that explicitly.
pub struct BroadcastPinger {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    events: Receiver<HubEvent>,
}

impl BroadcastPinger {
    pub fn start(broadcast: Broadcast, sleep_duration: Duration, log: &Logger) -> BroadcastPinger {
        let (tx, rx) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker_log = log.new(logging::o!());

        let handle = thread::spawn(move || run(broadcast, sleep_duration, tx, worker_stop, worker_log));

        BroadcastPinger {
            stop,
            handle: Some(handle),
            events: rx,
        }
    }

    /// Drains every pending event without blocking ; the wrapper never waits
    /// on the pinger (spec §5: "the wrapper drains all pending items per
    /// tick so the pinger never blocks on enqueue").
    pub fn drain(&self) -> Vec<HubEvent> {
        self.events.try_iter().collect()
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BroadcastPinger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    broadcast: Broadcast,
    sleep_duration: Duration,
    tx: Sender<HubEvent>,
    stop: Arc<AtomicBool>,
    log: Logger,
) {
    let mut last_group: Option<Ipv4Addr> = None;

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(sleep_duration);
        if stop.load(Ordering::SeqCst) {
            break;
        }

        match last_group {
            None => match broadcast.discover() {
                Ok(Some(triple)) => {
                    logging::info!(log, "found game server");
                    last_group = parse_group(&triple);
                    if tx.send(HubEvent::Available(triple)).is_err() {
                        break;
                    }
                }
                Ok(None) => logging::debug!(log, "game server not found"),
                Err(e) => logging::warn!(log, "discovery error"; "error" => format!("{:?}", e)),
            },
            Some(ip) => match broadcast.probe(ip) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    logging::info!(log, "lost contact with game server");
                    last_group = None;
                    if tx.send(HubEvent::Lost).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    logging::warn!(log, "liveness probe error"; "error" => format!("{:?}", e));
                    last_group = None;
                    if tx.send(HubEvent::Lost).is_err() {
                        break;
                    }
                }
            },
        }
    }
}

fn parse_group(triple: &EndpointTriple) -> Option<Ipv4Addr> {
    triple
        .subscribe_address
        .rsplit(':')
        .nth(1)
        .and_then(|rest| rest.rsplit('/').next())
        .and_then(|ip| ip.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ip_out_of_a_tcp_url() {
        let triple = EndpointTriple {
            push_address: "tcp://10.0.0.7:9001".into(),
            subscribe_address: "tcp://10.0.0.7:9000".into(),
            reply_address: "tcp://10.0.0.7:9004".into(),
        };
        assert_eq!(parse_group(&triple), Some("10.0.0.7".parse().unwrap()));
    }
}
