// vim: noet

use byteorder::{ByteOrder, LittleEndian};
use log::warn;
use thiserror::Error;

use crate::config::SampleFormat;
use crate::pinger::Reachability;
use crate::queue::{Drained, FrameQueue, PayloadSender};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError
{
	#[error("buffer of {len} bytes is not a whole number of {frame_size}-byte frames")]
	PartialFrame { len: usize, frame_size: usize },
}

/*
 * Turns interleaved little-endian PCM into mono f64 samples by averaging all
 * channels of a frame. 16 bit input is scaled to [-1, 1) like float input.
 */
pub struct Downmixer
{
	format:   SampleFormat,
	channels: usize,

	decoded: Vec<f32>,
	raw_i16: Vec<i16>,
}

impl Downmixer
{
	pub fn new(format: SampleFormat, channels: usize) -> Downmixer
	{
		Downmixer {
			format,
			channels,
			decoded: Vec::new(),
			raw_i16: Vec::new(),
		}
	}

	pub fn frame_size(&self) -> usize
	{
		self.format.size_in_bytes() * self.channels
	}

	fn decode(&mut self, data: &[u8]) -> Result<(), DecodeError>
	{
		let frame_size = self.frame_size();
		if data.len() % frame_size != 0 {
			return Err(DecodeError::PartialFrame { len: data.len(), frame_size });
		}

		let num_samples = data.len() / self.format.size_in_bytes();
		self.decoded.resize(num_samples, 0.0);

		match self.format {
			SampleFormat::F32 => LittleEndian::read_f32_into(data, &mut self.decoded),
			SampleFormat::S16 => {
				self.raw_i16.resize(num_samples, 0);
				LittleEndian::read_i16_into(data, &mut self.raw_i16);

				self.raw_i16.iter()
					.map(|&s| s as f32 / 32768.0)
					.zip(self.decoded.iter_mut())
					.for_each(|(s, t)| *t = s);
			},
		}

		Ok( () )
	}

	/// Decode `data` and append one mono sample per frame to `out`.
	pub fn downmix_into(&mut self, data: &[u8], out: &mut Vec<f64>) -> Result<(), DecodeError>
	{
		self.decode(data)?;

		let channels = self.channels;
		out.extend(self.decoded
			.chunks_exact(channels)
			.map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / channels as f64));

		Ok( () )
	}

	#[cfg(test)]
	pub fn downmix(&mut self, data: &[u8]) -> Result<Vec<f64>, DecodeError>
	{
		let mut mono = Vec::with_capacity(data.len() / self.frame_size().max(1));
		self.downmix_into(data, &mut mono)?;
		Ok(mono)
	}
}

/*
 * Entry point for the audio callback. Drops everything while the LED driver
 * is unreachable, otherwise downmixes and feeds the frame queue.
 */
pub struct FrameReceiver<S: PayloadSender>
{
	downmixer:    Downmixer,
	queue:        FrameQueue<S>,
	reachability: Reachability,

	mono: Vec<f64>,
}

impl<S: PayloadSender> FrameReceiver<S>
{
	pub fn new(downmixer: Downmixer, queue: FrameQueue<S>, reachability: Reachability) -> FrameReceiver<S>
	{
		FrameReceiver {
			downmixer,
			queue,
			reachability,
			mono: Vec::new(),
		}
	}

	pub fn queue(&self) -> &FrameQueue<S>
	{
		&self.queue
	}

	/// Reports what the queue did with this buffer; nothing when it was gated or dropped.
	pub fn on_receive(&mut self, data: &[u8], frame_count: usize) -> Drained
	{
		if !self.reachability.is_reachable() {
			return Drained::default();
		}

		self.mono.clear();
		if let Err(e) = self.downmixer.downmix_into(data, &mut self.mono) {
			warn!("Dropping audio buffer ({} frames announced): {}", frame_count, e);
			return Drained::default();
		}

		self.queue.enqueue(&self.mono)
	}
}
