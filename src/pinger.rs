// vim: noet

use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::udpproto::{self, PING_REPLY_AVAILABLE};

/// Liveness hint for the LED driver, shared between the ping loop and its readers.
#[derive(Debug, Clone)]
pub struct Reachability
{
	flag: Arc<AtomicBool>,
}

impl Reachability
{
	pub fn new() -> Reachability
	{
		Reachability { flag: Arc::new(AtomicBool::new(true)) }
	}

	pub fn is_reachable(&self) -> bool
	{
		self.flag.load(Ordering::Relaxed)
	}

	/// Returns true if the value changed.
	pub fn set(&self, reachable: bool) -> bool
	{
		self.flag.swap(reachable, Ordering::Relaxed) != reachable
	}
}

#[derive(Debug, Error)]
pub enum PingError
{
	#[error("could not write ping payload: {0}")]
	Send(std::io::Error),

	#[error("could not set ping deadline: {0}")]
	Deadline(std::io::Error),

	#[error("could not read ping response: {0}")]
	Read(std::io::Error),

	#[error("ping response has unexpected length {0}")]
	Length(usize),

	#[error("ping response is unexpected: {0:#04x}")]
	Reply(u8),
}

pub struct Pinger
{
	socket:   UdpSocket,
	interval: Duration,
	timeout:  Duration,

	payload:      Vec<u8>,
	reachability: Reachability,
}

impl Pinger
{
	/// `socket` must already be connected to the LED driver.
	pub fn new(socket: UdpSocket, interval: Duration, timeout: Duration, reachability: Reachability) -> Pinger
	{
		Pinger {
			socket,
			interval,
			timeout,
			payload: udpproto::make_ping_payload(),
			reachability,
		}
	}

	/// One ping round trip, without touching the reachability flag.
	pub fn ping(&self) -> Result<(), PingError>
	{
		self.socket.send(&self.payload).map_err(PingError::Send)?;
		self.socket.set_read_timeout(Some(self.timeout)).map_err(PingError::Deadline)?;

		// larger than one byte so oversized replies are detected
		let mut reply = [0u8; 16];
		let n = self.socket.recv(&mut reply).map_err(PingError::Read)?;

		if n != 1 {
			return Err(PingError::Length(n));
		}
		if reply[0] != PING_REPLY_AVAILABLE {
			return Err(PingError::Reply(reply[0]));
		}

		Ok( () )
	}

	/// Ping once and update the flag. Only transitions are logged at info level.
	pub fn check(&self) -> bool
	{
		let reachable = match self.ping() {
			Ok(()) => true,
			Err(e) => {
				debug!("{}", e);
				false
			},
		};

		if self.reachability.set(reachable) {
			info!("Reachable = {}", reachable);
		}

		reachable
	}

	/// Ping every `interval` for the lifetime of the process.
	pub fn spawn(self) -> std::io::Result<thread::JoinHandle<()>>
	{
		thread::Builder::new()
			.name("pinger".to_string())
			.spawn(move || loop {
				thread::sleep(self.interval);
				self.check();
			})
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn responder(reply: &'static [u8]) -> (UdpSocket, thread::JoinHandle<Vec<u8>>)
	{
		let server = UdpSocket::bind("127.0.0.1:0").unwrap();
		let client = UdpSocket::bind("127.0.0.1:0").unwrap();
		client.connect(server.local_addr().unwrap()).unwrap();

		let handle = thread::spawn(move || {
			let mut buf = [0u8; 64];
			let (n, addr) = server.recv_from(&mut buf).unwrap();
			server.send_to(reply, addr).unwrap();
			buf[..n].to_vec()
		});

		(client, handle)
	}

	fn pinger(socket: UdpSocket) -> (Pinger, Reachability)
	{
		let reachability = Reachability::new();
		(Pinger::new(socket, Duration::from_millis(10), Duration::from_millis(500), reachability.clone()), reachability)
	}

	#[test]
	fn reachability_reports_transitions()
	{
		let r = Reachability::new();
		assert!(r.is_reachable());
		assert!(!r.set(true));
		assert!(r.set(false));
		assert!(!r.is_reachable());
		assert!(!r.set(false));
		assert!(r.clone().set(true));
		assert!(r.is_reachable());
	}

	#[test]
	fn reply_one_keeps_reachable()
	{
		let (client, server) = responder(b"1");
		let (p, reachability) = pinger(client);

		reachability.set(false);
		assert!(p.check());
		assert!(reachability.is_reachable());
		assert_eq!(server.join().unwrap(), vec![0x4C, 0x58, 0x01]);
	}

	#[test]
	fn reply_zero_marks_unreachable()
	{
		let (client, server) = responder(b"0");
		let (p, reachability) = pinger(client);

		assert!(!p.check());
		assert!(!reachability.is_reachable());
		server.join().unwrap();
	}

	#[test]
	fn oversized_reply_marks_unreachable()
	{
		let (client, server) = responder(b"11");
		let (p, _) = pinger(client);

		match p.ping() {
			Err(PingError::Length(2)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		server.join().unwrap();
	}

	#[test]
	fn silence_times_out()
	{
		let server = UdpSocket::bind("127.0.0.1:0").unwrap();
		let client = UdpSocket::bind("127.0.0.1:0").unwrap();
		client.connect(server.local_addr().unwrap()).unwrap();

		let reachability = Reachability::new();
		let p = Pinger::new(client, Duration::from_millis(10), Duration::from_millis(50), reachability.clone());

		assert!(!p.check());
		assert!(!reachability.is_reachable());
		drop(server);
	}
}
