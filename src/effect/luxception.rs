// vim: noet

/*
 * Colors are pushed by a remote peer using Raw Lux packets. The same listener
 * answers Ping packets with the local reachability of the LED driver, so a
 * peer can chain itself in front of this process.
 */

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::Rgb;
use crate::effect::ColorState;
use crate::pinger::Reachability;
use crate::udpproto::{self, Packet, ProtocolError, PING_REPLY_AVAILABLE, PING_REPLY_UNAVAILABLE};

const MAX_PACKET_LEN: usize = 1024;

// delay before the next receive after a socket error
const RECV_BACKOFF: Duration = Duration::from_millis(100);

/// Validates control packets and applies them to the shared color state.
#[derive(Debug, Clone)]
pub struct ControlHandler
{
	led_count:    usize,
	colors:       ColorState,
	reachability: Reachability,
}

impl ControlHandler
{
	pub fn new(led_count: usize, colors: ColorState, reachability: Reachability) -> ControlHandler
	{
		ControlHandler { led_count, colors, reachability }
	}

	/// Returns the reply to send back, if any.
	pub fn handle(&self, data: &[u8]) -> Result<Option<u8>, ProtocolError>
	{
		match udpproto::parse(data, self.led_count)? {
			Packet::Raw { grb, .. } => {
				self.colors.copy_from(grb);
				Ok(None)
			},
			Packet::Ping => {
				if self.reachability.is_reachable() {
					Ok(Some(PING_REPLY_AVAILABLE))
				} else {
					Ok(Some(PING_REPLY_UNAVAILABLE))
				}
			},
		}
	}
}

pub struct Luxception
{
	colors:     ColorState,
	led_data:   Vec<u8>,

	#[cfg(test)]
	local_addr: SocketAddr,
}

impl Luxception
{
	/// Binds the control listener on `listen_address` and starts accepting packets.
	pub fn new(led_count: usize, default_color: Rgb, listen_address: &str, reachability: Reachability) -> std::io::Result<Luxception>
	{
		let colors = ColorState::uniform(led_count, default_color);
		let handler = ControlHandler::new(led_count, colors.clone(), reachability);

		let socket = Arc::new(UdpSocket::bind(listen_address)?);
		let local_addr = socket.local_addr()?;

		thread::Builder::new()
			.name("luxception".to_string())
			.spawn(move || listen(socket, handler))?;

		info!("Luxception listening on {}", local_addr);

		Ok(Luxception {
			colors,
			led_data: vec![0; 3*led_count],
			#[cfg(test)]
			local_addr,
		})
	}

	#[cfg(test)]
	pub fn local_addr(&self) -> SocketAddr
	{
		self.local_addr
	}

	pub fn apply(&mut self, intensities: &[f64]) -> &[u8]
	{
		self.colors.scale_into(intensities, &mut self.led_data);
		&self.led_data
	}
}

/// Waits for the next control packet. On error, logs it and sleeps `RECV_BACKOFF` before returning `None`.
fn receive(socket: &UdpSocket) -> Option<(Vec<u8>, SocketAddr)>
{
	let mut buf = vec![0u8; MAX_PACKET_LEN];

	match socket.recv_from(&mut buf) {
		Ok((n, peer)) => {
			buf.truncate(n);
			Some((buf, peer))
		},
		Err(e) => {
			warn!("Control receive failed: {}", e);
			thread::sleep(RECV_BACKOFF);
			None
		},
	}
}

fn listen(socket: Arc<UdpSocket>, handler: ControlHandler)
{
	loop {
		let (buf, peer) = match receive(&socket) {
			Some(r) => r,
			None    => continue,
		};

		let socket = Arc::clone(&socket);
		let handler = handler.clone();

		let spawned = thread::Builder::new()
			.name("luxception-packet".to_string())
			.spawn(move || handle_packet(&socket, &handler, peer, &buf));

		if let Err(e) = spawned {
			warn!("Could not dispatch control packet: {}", e);
		}
	}
}

fn handle_packet(socket: &UdpSocket, handler: &ControlHandler, peer: SocketAddr, data: &[u8])
{
	match handler.handle(data) {
		Ok(Some(reply)) => {
			if let Err(e) = socket.send_to(&[reply], peer) {
				debug!("Could not answer ping from {}: {}", peer, e);
			}
		},
		Ok(None) => (),
		Err(e)   => warn!("Rejected packet from {}: {}", peer, e),
	}
}
