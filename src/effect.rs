// vim: noet

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Rgb;

pub mod solid;
pub mod rainbow;
pub mod luxception;

use solid::Solid;
use rainbow::Rainbow;
use luxception::Luxception;

/////////// Color State ////////////

/// Per-LED base colors, three bytes per LED in G, R, B order.
///
/// Writers build a complete frame first and swap it in, so the lock is only
/// ever held for a copy or a swap.
#[derive(Debug, Clone)]
pub struct ColorState
{
	grb: Arc<Mutex<Vec<u8>>>,
}

impl ColorState
{
	pub fn new(grb: Vec<u8>) -> ColorState
	{
		ColorState { grb: Arc::new(Mutex::new(grb)) }
	}

	pub fn uniform(led_count: usize, color: Rgb) -> ColorState
	{
		ColorState::new(uniform_grb(led_count, color))
	}

	fn lock(&self) -> MutexGuard<'_, Vec<u8>>
	{
		// a panicking writer cannot leave a half-written frame behind
		self.grb.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Replaces the whole frame. Length must match the current one.
	pub fn replace(&self, grb: Vec<u8>)
	{
		let mut current = self.lock();
		debug_assert_eq!(current.len(), grb.len());
		*current = grb;
	}

	/// Overwrites the frame from a slice of the same length.
	pub fn copy_from(&self, grb: &[u8])
	{
		self.lock().copy_from_slice(grb);
	}

	#[cfg(test)]
	pub fn snapshot(&self) -> Vec<u8>
	{
		self.lock().clone()
	}

	/// Scales every base color by the intensity of its LED.
	pub fn scale_into(&self, intensities: &[f64], out: &mut [u8])
	{
		scale_colors(&self.lock(), intensities, out);
	}
}

pub fn uniform_grb(led_count: usize, color: Rgb) -> Vec<u8>
{
	let mut grb = Vec::with_capacity(3*led_count);

	for _ in 0..led_count {
		grb.extend_from_slice(&[color.g, color.r, color.b]);
	}

	grb
}

/// `out[3i + c] = colors[3i + c] * intensities[i]`, truncated.
pub fn scale_colors(colors: &[u8], intensities: &[f64], out: &mut [u8])
{
	for ((led, color), &x) in out.chunks_exact_mut(3)
	                            .zip(colors.chunks_exact(3))
	                            .zip(intensities.iter()) {
		led[0] = (color[0] as f64 * x) as u8;
		led[1] = (color[1] as f64 * x) as u8;
		led[2] = (color[2] as f64 * x) as u8;
	}
}

/////////// Effect ////////////

pub enum Effect
{
	Solid(Solid),
	Rainbow(Rainbow),
	Luxception(Luxception),
}

impl Effect
{
	/// Colorizes one intensity per LED. The returned buffer is reused by the next call.
	pub fn apply(&mut self, intensities: &[f64]) -> &[u8]
	{
		match self {
			Effect::Solid(e)      => e.apply(intensities),
			Effect::Rainbow(e)    => e.apply(intensities),
			Effect::Luxception(e) => e.apply(intensities),
		}
	}

	pub fn name(&self) -> &'static str
	{
		match self {
			Effect::Solid(_)      => "solid",
			Effect::Rainbow(_)    => "rainbow",
			Effect::Luxception(_) => "luxception",
		}
	}
}
