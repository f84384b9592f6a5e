// vim: noet

use std::collections::VecDeque;

use log::{error, warn};
use thiserror::Error;

use crate::effect::Effect;
use crate::signal_processing::SpectralAnalyzer;
use crate::udpproto::UdpProto;

/// Destination for the colorized LED data of each analysis window.
pub trait PayloadSender
{
	fn send(&mut self, led_data: &[u8]) -> std::io::Result<()>;
}

impl PayloadSender for UdpProto
{
	fn send(&mut self, led_data: &[u8]) -> std::io::Result<()>
	{
		self.set_colors(led_data)?;
		self.commit()
	}
}

#[derive(Debug, Error)]
pub enum QueueError
{
	#[error("could not send LED data: {0}")]
	Send(#[source] std::io::Error),
}

/// What a single `enqueue` call did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Drained
{
	/// Complete windows analyzed and sent.
	pub windows:  usize,
	/// Windows that started with samples still pending behind them.
	pub leftover: usize,
	/// Windows whose LED data could not be sent.
	pub failed:   usize,
}

/*
 * Collects mono samples into non-overlapping windows. Every complete window
 * runs through analyzer, effect and sender right away.
 */
pub struct FrameQueue<S: PayloadSender>
{
	analyzer: SpectralAnalyzer,
	effect:   Effect,
	sender:   S,

	samples: VecDeque<f64>,
	window:  Vec<f64>,
}

impl<S: PayloadSender> FrameQueue<S>
{
	pub fn new(analyzer: SpectralAnalyzer, effect: Effect, sender: S) -> FrameQueue<S>
	{
		let window_size = analyzer.window_size();

		FrameQueue {
			analyzer,
			effect,
			sender,
			samples: VecDeque::with_capacity(2 * window_size),
			window:  vec![0.0; window_size],
		}
	}

	/// Number of samples waiting for a complete window.
	pub fn size(&self) -> usize
	{
		self.samples.len()
	}

	#[cfg(test)]
	pub fn sender(&self) -> &S
	{
		&self.sender
	}

	fn send_window(&mut self) -> Result<(), QueueError>
	{
		let intensities = self.analyzer.analyze(&mut self.window);
		let led_data = self.effect.apply(intensities);

		self.sender.send(led_data).map_err(QueueError::Send)
	}

	/// Appends `mono` and drains every complete window.
	pub fn enqueue(&mut self, mono: &[f64]) -> Drained
	{
		self.samples.extend(mono.iter());

		let window_size = self.window.len();
		let mut drained = Drained::default();

		while self.samples.len() >= window_size {
			if drained.windows > 0 {
				warn!("Leftover samples: {} pending", self.samples.len());
				drained.leftover += 1;
			}

			// the analyzer windows its input in place, so work on a copy
			for (w, s) in self.window.iter_mut().zip(self.samples.iter()) {
				*w = *s;
			}
			self.samples.drain(..window_size);

			if let Err(e) = self.send_window() {
				error!("{}", e);
				drained.failed += 1;
			}

			drained.windows += 1;
		}

		drained
	}
}

#[cfg(test)]
impl PayloadSender for Vec<Vec<u8>>
{
	fn send(&mut self, led_data: &[u8]) -> std::io::Result<()>
	{
		self.push(led_data.to_vec());
		Ok( () )
	}
}
