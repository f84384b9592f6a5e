// vim: noet

use std::thread;
use std::time::Duration;

use crate::config::Rgb;
use crate::effect::ColorState;

/*
 * A color wheel rotating along the strip, driven by its own timer thread.
 * Audio only scales whatever colors the wheel currently shows.
 */
pub struct Rainbow
{
	colors:   ColorState,
	led_data: Vec<u8>,
}

/// Three 85-step ramps: red rises while green falls, then blue takes over
/// from red, then green from blue.
pub fn wheel(pos: u8) -> Rgb
{
	if pos < 85 {
		return Rgb { r: pos * 3, g: 255 - pos * 3, b: 0 };
	}

	if pos < 170 {
		let pos = pos - 85;
		return Rgb { r: 255 - pos * 3, g: 0, b: pos * 3 };
	}

	let pos = pos - 170;
	Rgb { r: 0, g: pos * 3, b: 255 - pos * 3 }
}

/// Base colors for all LEDs at the given rotation.
pub fn rainbow_frame(offset: usize, led_count: usize) -> Vec<u8>
{
	let mut grb = Vec::with_capacity(3*led_count);

	for i in 0..led_count {
		let c = wheel(((offset + i) & 255) as u8);
		grb.extend_from_slice(&[c.g, c.r, c.b]);
	}

	grb
}

impl Rainbow
{
	/// Starts the color timer, advancing the wheel once per `period`.
	pub fn new(led_count: usize, period: Duration) -> std::io::Result<Rainbow>
	{
		let colors = ColorState::new(rainbow_frame(0, led_count));

		let writer = colors.clone();

		thread::Builder::new()
			.name("rainbow".to_string())
			.spawn(move || {
				let mut offset = 0;
				loop {
					thread::sleep(period);

					offset = (offset + 1) % 256;
					writer.replace(rainbow_frame(offset, led_count));
				}
			})?;

		Ok(Rainbow {
			colors,
			led_data: vec![0; 3*led_count],
		})
	}

	pub fn apply(&mut self, intensities: &[f64]) -> &[u8]
	{
		self.colors.scale_into(intensities, &mut self.led_data);
		&self.led_data
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	use crate::config::rainbow_period;

	#[test]
	fn wheel_segments()
	{
		assert_eq!(wheel(0),   Rgb { r: 0,   g: 255, b: 0 });
		assert_eq!(wheel(84),  Rgb { r: 252, g: 3,   b: 0 });
		assert_eq!(wheel(85),  Rgb { r: 255, g: 0,   b: 0 });
		assert_eq!(wheel(170), Rgb { r: 0,   g: 0,   b: 255 });
		assert_eq!(wheel(255), Rgb { r: 0,   g: 255, b: 0 });
	}

	#[test]
	fn frame_rotates_with_offset()
	{
		let a = rainbow_frame(0, 4);
		let b = rainbow_frame(1, 4);

		assert_eq!(a.len(), 12);
		assert_eq!(&a[3..], &b[..9]);

		// wraps around the wheel
		assert_eq!(&rainbow_frame(255, 2)[3..], &rainbow_frame(0, 1)[..]);
	}

	#[test]
	fn apply_scales_current_wheel_colors()
	{
		let mut rainbow = Rainbow::new(2, Duration::from_secs(1)).unwrap();

		// first tick is a second away
		assert_eq!(rainbow.apply(&[1.0, 0.5]), &[255, 0, 0, 126, 1, 0]);
	}

	#[test]
	fn timer_advances_colors()
	{
		let mut rainbow = Rainbow::new(1, rainbow_period(200.0).unwrap()).unwrap();
		let initial = rainbow.apply(&[1.0]).to_vec();

		let mut changed = false;
		for _ in 0..100 {
			thread::sleep(Duration::from_millis(10));
			if rainbow.apply(&[1.0]) != &initial[..] {
				changed = true;
				break;
			}
		}
		assert!(changed);
	}
}
