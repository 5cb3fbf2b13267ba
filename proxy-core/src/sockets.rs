//! Pre-allocated pool of bound, non-blocking UDP sockets handed out one at a
//! time to robots as they're added (spec §3 "Socket pool", §4.11).
use common::error::ProxyResult;
use std::net::UdpSocket;

pub struct SocketsLister {
    available: Vec<UdpSocket>,
    in_use: Vec<UdpSocket>,
}

impl SocketsLister {
    /// Binds `count` sockets to ephemeral local ports.
    pub fn new(count: usize) -> ProxyResult<SocketsLister> {
        let mut available = Vec::with_capacity(count);
        for _ in 0..count {
            let socket = UdpSocket::bind("0.0.0.0:0")?;
            socket.set_nonblocking(true)?;
            available.push(socket);
        }
        Ok(SocketsLister {
            available,
            in_use: Vec::new(),
        })
    }

    /// Moves one socket from available to in-use and returns it, or `None`
    /// if the pool is exhausted.
    pub fn pop_available_socket(&mut self) -> Option<UdpSocket> {
        let socket = self.available.pop()?;
        let handle = socket.try_clone().ok()?;
        self.in_use.push(socket);
        Some(handle)
    }

    /// Total sockets the pool started with, still true after handouts
    /// (conservation invariant — spec §8).
    pub fn total(&self) -> usize {
        self.available.len() + self.in_use.len()
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Local ports of every socket still available, used to seed the
    /// beacon's port queue so it only ever hands out ports the pool backs.
    pub fn available_ports(&self) -> ProxyResult<Vec<u16>> {
        self.available
            .iter()
            .map(|socket| Ok(socket.local_addr()?.port()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_moves_sockets_from_available_to_in_use_conserving_the_total() {
        let mut pool = SocketsLister::new(3).unwrap();
        let total_before = pool.total();

        assert!(pool.pop_available_socket().is_some());
        assert!(pool.pop_available_socket().is_some());
        assert_eq!(pool.total(), total_before);
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut pool = SocketsLister::new(1).unwrap();
        assert!(pool.pop_available_socket().is_some());
        assert!(pool.pop_available_socket().is_none());
    }
}
