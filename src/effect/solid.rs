// vim: noet

use crate::config::Rgb;
use crate::effect::{scale_colors, uniform_grb};

/// One fixed color on every LED, scaled by intensity.
pub struct Solid
{
	colors:   Vec<u8>,
	led_data: Vec<u8>,
}

impl Solid
{
	pub fn new(led_count: usize, color: Rgb) -> Solid
	{
		Solid {
			colors:   uniform_grb(led_count, color),
			led_data: vec![0; 3*led_count],
		}
	}

	pub fn apply(&mut self, intensities: &[f64]) -> &[u8]
	{
		scale_colors(&self.colors, intensities, &mut self.led_data);
		&self.led_data
	}
}
