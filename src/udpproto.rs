// vim: noet

/*
 * Lux wire protocol.
 *
 * Every packet starts with the two byte magic "LX" followed by a mode byte:
 *
 *   Raw:  'L' 'X' 0x00 <led count> <G R B> * led count
 *   Ping: 'L' 'X' 0x01
 *
 * A Ping is answered with a single ASCII byte, '1' when the responder
 * considers itself available and '0' otherwise.
 */

use std::net::UdpSocket;
use std::net::SocketAddrV4;
use std::net::Ipv4Addr;

use thiserror::Error;

pub const HEADER: [u8; 2] = [0x4C, 0x58];

/// Offset of the mode specific body.
pub const BODY_OFFSET: usize = 3;

pub const PING_REPLY_AVAILABLE: u8 = b'1';
pub const PING_REPLY_UNAVAILABLE: u8 = b'0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode
{
	Raw  = 0,
	Ping = 1,
}

impl Mode
{
	pub fn from_byte(b: u8) -> Option<Mode>
	{
		match b {
			0 => Some(Mode::Raw),
			1 => Some(Mode::Ping),
			_ => None
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError
{
	#[error("message has invalid length: {0}")]
	TooShort(usize),

	#[error("invalid header")]
	BadMagic,

	#[error("unsupported mode: {0}")]
	UnsupportedMode(u8),

	#[error("expected {expected} LEDs, got {got}")]
	LedCountMismatch { expected: usize, got: usize },

	#[error("expected {expected} bytes, got {got}")]
	LengthMismatch { expected: usize, got: usize },
}

/// A validated inbound packet. Raw color data borrows from the receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Packet<'a>
{
	Raw { led_count: usize, grb: &'a [u8] },
	Ping,
}

/// Total length of a Raw packet carrying `led_count` LEDs.
pub fn raw_payload_len(led_count: usize) -> usize
{
	BODY_OFFSET + 1 + 3*led_count
}

pub fn make_lux_payload(mode: Mode, body: &[u8]) -> Vec<u8>
{
	let mut payload = Vec::with_capacity(BODY_OFFSET + body.len());

	payload.extend_from_slice(&HEADER);
	payload.push(mode as u8);
	payload.extend_from_slice(body);

	payload
}

pub fn make_raw_payload(led_count: u8, grb: &[u8]) -> Vec<u8>
{
	let mut payload = Vec::with_capacity(raw_payload_len(led_count as usize));

	payload.extend_from_slice(&HEADER);
	payload.push(Mode::Raw as u8);
	payload.push(led_count);
	payload.extend_from_slice(grb);

	payload
}

pub fn make_ping_payload() -> Vec<u8>
{
	make_lux_payload(Mode::Ping, &[])
}

/// Validate an inbound packet for a receiver driving `expected_leds` LEDs.
pub fn parse(data: &[u8], expected_leds: usize) -> Result<Packet<'_>, ProtocolError>
{
	if data.len() < BODY_OFFSET {
		return Err(ProtocolError::TooShort(data.len()));
	}

	if data[0..2] != HEADER {
		return Err(ProtocolError::BadMagic);
	}

	match Mode::from_byte(data[2]) {
		Some(Mode::Raw) => {
			let led_count = match data.get(BODY_OFFSET) {
				Some(&n) => n as usize,
				None     => return Err(ProtocolError::TooShort(data.len())),
			};

			if led_count != expected_leds {
				return Err(ProtocolError::LedCountMismatch { expected: expected_leds, got: led_count });
			}

			let expected_len = raw_payload_len(led_count);
			if data.len() != expected_len {
				return Err(ProtocolError::LengthMismatch { expected: expected_len, got: data.len() });
			}

			Ok(Packet::Raw { led_count, grb: &data[BODY_OFFSET + 1 ..] })
		},
		Some(Mode::Ping) => Ok(Packet::Ping),
		None             => Err(ProtocolError::UnsupportedMode(data[2])),
	}
}

/*
 * Data-push side: a connected socket and a pre-built Raw packet whose color
 * bytes are overwritten on every send.
 */
pub struct UdpProto
{
	socket:        UdpSocket,
	packet:        Vec<u8>,
}

impl UdpProto
{
	pub fn new(target_address: &str, num_leds: u8) -> std::io::Result<UdpProto>
	{
		let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
		socket.connect(target_address)?;

		Ok(UdpProto::with_socket(socket, num_leds))
	}

	pub fn with_socket(socket: UdpSocket, num_leds: u8) -> UdpProto
	{
		UdpProto {
			socket,
			packet: make_raw_payload(num_leds, &vec![0; 3*num_leds as usize]),
		}
	}

	pub fn set_colors(&mut self, grb: &[u8]) -> std::io::Result<()>
	{
		let data = &mut self.packet[BODY_OFFSET + 1 ..];
		if grb.len() != data.len() {
			return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "color data does not match LED count"));
		}

		data.copy_from_slice(grb);
		Ok( () )
	}

	pub fn commit(&mut self) -> std::io::Result<()>
	{
		self.socket.send(&self.packet)?;
		Ok( () )
	}
}
