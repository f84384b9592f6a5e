// vim: noet

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner};
use rustfft::num_complex::Complex;

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig
{
	pub window_size:  usize,
	pub sample_rate:  f64,
	pub led_count:    usize,
	/// Factor in [0, 1) applied to a bin whose new value does not exceed the previous one. 0 disables decay.
	pub decay:        f64,
	/// Negative dBFS value that maps to intensity 0.
	pub dbfs_floor:   f64,
	pub audible_low:  f64,
	pub audible_high: f64,
	pub mirror:       bool,
}

pub struct SpectralAnalyzer
{
	cfg: AnalyzerConfig,

	fft_window: Vec<f64>,
	fft_plan:   Arc<dyn Fft<f64>>,
	fft_buffer: Vec<Complex<f64>>,
	fft_scratch: Vec<Complex<f64>>,

	intensities: Vec<f64>,

	lo_f: usize,
	hi_f: usize,

	band:   Vec<f64>,
	output: Vec<f64>,
}

impl SpectralAnalyzer
{
	pub fn hann_window(block_size: usize) -> Vec<f64>
	{
		if block_size == 1 {
			return vec![1.0];
		}

		let denom = (block_size - 1) as f64;

		(0..block_size)
			.map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos()))
			.collect()
	}

	pub fn new(cfg: AnalyzerConfig) -> SpectralAnalyzer
	{
		let freq_domain_size = cfg.window_size/2 + 1;

		let fft_plan = FftPlanner::<f64>::new().plan_fft_forward(cfg.window_size);
		let scratch_len = fft_plan.get_inplace_scratch_len();

		let freqs: Vec<f64> = (0..freq_domain_size)
			.map(|i| i as f64 * cfg.sample_rate / cfg.window_size as f64)
			.collect();

		let (lo_f, hi_f) = frequency_bounds(&freqs, cfg.audible_low, cfg.audible_high);

		let band_len = (hi_f - lo_f + 1) * if cfg.mirror { 2 } else { 1 };

		SpectralAnalyzer {
			cfg,
			fft_window:  SpectralAnalyzer::hann_window(cfg.window_size),
			fft_plan,
			fft_buffer:  vec![Complex::new(0.0, 0.0); cfg.window_size],
			fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],

			intensities: vec![0.0; freq_domain_size],

			lo_f,
			hi_f,

			band:   Vec::with_capacity(band_len),
			output: Vec::with_capacity(cfg.led_count),
		}
	}

	pub fn window_size(&self) -> usize
	{
		self.cfg.window_size
	}

	/// Inclusive range of bins inside the audible range.
	pub fn bin_bounds(&self) -> (usize, usize)
	{
		(self.lo_f, self.hi_f)
	}

	/// Smoothed per-bin intensities, one per non-negative frequency bin.
	#[cfg(test)]
	pub fn intensities(&self) -> &[f64]
	{
		&self.intensities
	}

	fn apply_window(&self, samples: &mut [f64])
	{
		samples.iter_mut()
		       .zip(self.fft_window.iter())
		       .for_each(|(s, w)| *s *= w);
	}

	fn update_intensities(&mut self)
	{
		let reference = self.cfg.window_size as f64 / 4.0;
		let floor = self.cfg.dbfs_floor;
		let decay = self.cfg.decay;

		for (intensity, bin) in self.intensities.iter_mut().zip(self.fft_buffer.iter()) {
			let db = 20.0 * (bin.norm() / reference).log10();
			let raw = normalize_db(db, floor);

			*intensity = smooth(*intensity, raw, decay);
		}
	}

	/// Windows `samples` in place, transforms them and returns one intensity in [0, 1] per LED.
	///
	/// The returned slice is only valid until the next call.
	pub fn analyze(&mut self, samples: &mut [f64]) -> &[f64]
	{
		assert_eq!(samples.len(), self.cfg.window_size, "analysis window has wrong length");

		self.apply_window(samples);

		for (c, &s) in self.fft_buffer.iter_mut().zip(samples.iter()) {
			*c = Complex::new(s, 0.0);
		}
		self.fft_plan.process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

		self.update_intensities();

		let sub_band = &self.intensities[self.lo_f ..= self.hi_f];

		self.band.clear();
		if self.cfg.mirror {
			self.band.extend(sub_band.iter().rev());
		}
		self.band.extend_from_slice(sub_band);

		chunked_mean_into(&self.band, self.cfg.led_count, &mut self.output);
		center_in_place(&mut self.output, self.cfg.led_count);

		&self.output
	}
}

/// Finds the first bin at or above `low` and the first bin at or above `high`
/// (the last bin if none is).
pub fn frequency_bounds(freqs: &[f64], low: f64, high: f64) -> (usize, usize)
{
	let last = freqs.len().saturating_sub(1);

	let lo = freqs.iter().position(|&f| f >= low).unwrap_or(0);
	let hi = freqs.iter().position(|&f| f >= high).unwrap_or(last);

	(lo, hi.max(lo))
}

/// Maps [floor, 0] dB onto [0, 1].
pub fn normalize_db(db: f64, floor: f64) -> f64
{
	((db.max(floor) - floor) / -floor).clamp(0.0, 1.0)
}

/// Instant attack, exponential release.
pub fn smooth(previous: f64, raw: f64, decay: f64) -> f64
{
	if decay != 0.0 && raw <= previous {
		previous * decay
	} else {
		raw
	}
}

/// Splits `data` into `chunks` pieces of `ceil(len / chunks)` values and
/// writes the mean of each piece to `out`. `out` may end up shorter than `chunks`.
pub fn chunked_mean_into(data: &[f64], chunks: usize, out: &mut Vec<f64>)
{
	out.clear();

	if data.is_empty() || chunks == 0 {
		return;
	}

	let chunk_size = (data.len() + chunks - 1) / chunks;

	out.extend(data.chunks(chunk_size)
	               .map(|c| c.iter().sum::<f64>() / c.len() as f64));
}

/// Pads `values` with zeros to `total` entries, keeping the original values in
/// the middle. Extra padding goes to the right.
pub fn center_in_place(values: &mut Vec<f64>, total: usize)
{
	let len = values.len();
	if total <= len {
		return;
	}

	let offset = (total - len) / 2;

	values.resize(total, 0.0);
	values.copy_within(0..len, offset);
	values[..offset].iter_mut().for_each(|v| *v = 0.0);
	values[offset + len ..].iter_mut().for_each(|v| *v = 0.0);
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn config(window_size: usize, sample_rate: f64, led_count: usize) -> AnalyzerConfig
	{
		AnalyzerConfig {
			window_size,
			sample_rate,
			led_count,
			decay:        0.0,
			dbfs_floor:   -75.0,
			audible_low:  20.0,
			audible_high: 20000.0,
			mirror:       false,
		}
	}

	fn sine(len: usize, bin: usize, amplitude: f64) -> Vec<f64>
	{
		(0..len)
			.map(|i| amplitude * (2.0 * PI * (bin * i) as f64 / len as f64).sin())
			.collect()
	}

	#[test]
	fn hann_window_shape()
	{
		assert_eq!(SpectralAnalyzer::hann_window(1), vec![1.0]);

		let w = SpectralAnalyzer::hann_window(5);
		assert!(w[0].abs() < 1e-12);
		assert!((w[2] - 1.0).abs() < 1e-12);
		assert!(w[4].abs() < 1e-12);
		assert!((w[1] - w[3]).abs() < 1e-12);
	}

	#[test]
	fn silent_window_yields_zero()
	{
		let mut cfg = config(4, 8.0, 2);
		cfg.audible_low = 0.0;
		cfg.audible_high = 4.0;

		let mut analyzer = SpectralAnalyzer::new(cfg);
		assert_eq!(analyzer.bin_bounds(), (0, 2));

		let mut window = vec![0.0; 4];
		assert_eq!(analyzer.analyze(&mut window), &[0.0, 0.0]);
	}

	#[test]
	fn output_has_led_count_values_in_unit_range()
	{
		let mut analyzer = SpectralAnalyzer::new(config(1024, 44100.0, 60));

		for round in 0..4 {
			let mut window: Vec<f64> = sine(1024, 10 + round, 0.8).iter()
				.zip(sine(1024, 200, 0.3))
				.map(|(a, b)| a + b)
				.collect();

			let out = analyzer.analyze(&mut window);
			assert_eq!(out.len(), 60);
			assert!(out.iter().all(|&x| (0.0..=1.0).contains(&x)));
			assert!(out.iter().any(|&x| x > 0.0));
		}
	}

	#[test]
	fn full_scale_sine_reaches_top_of_range()
	{
		let mut analyzer = SpectralAnalyzer::new(config(64, 64.0, 4));

		analyzer.analyze(&mut sine(64, 8, 1.0));
		assert!(analyzer.intensities()[8] > 0.95);
	}

	#[test]
	fn decaying_bin_follows_previous_value()
	{
		let mut cfg = config(64, 64.0, 4);
		cfg.decay = 0.5;
		let mut analyzer = SpectralAnalyzer::new(cfg);

		analyzer.analyze(&mut sine(64, 8, 1.0));
		let loud = analyzer.intensities()[8];

		analyzer.analyze(&mut sine(64, 8, 0.1));
		let first = analyzer.intensities()[8];
		assert_eq!(first, loud * 0.5);

		analyzer.analyze(&mut vec![0.0; 64]);
		assert_eq!(analyzer.intensities()[8], first * 0.5);
	}

	#[test]
	fn rising_bin_attacks_immediately()
	{
		let mut cfg = config(64, 64.0, 4);
		cfg.decay = 0.9;
		let mut smoothed = SpectralAnalyzer::new(cfg);
		let mut direct = SpectralAnalyzer::new(config(64, 64.0, 4));

		smoothed.analyze(&mut vec![0.0; 64]);
		smoothed.analyze(&mut sine(64, 8, 0.25));
		direct.analyze(&mut sine(64, 8, 0.25));

		assert!(smoothed.intensities()[8] > 0.0);
		assert_eq!(smoothed.intensities()[8], direct.intensities()[8]);
	}

	#[test]
	fn smoothing_rules()
	{
		assert_eq!(smooth(0.8, 0.3, 0.5), 0.4);
		assert_eq!(smooth(0.8, 0.8, 0.5), 0.4);
		assert_eq!(smooth(0.2, 0.3, 0.5), 0.3);
		assert_eq!(smooth(0.8, 0.3, 0.0), 0.3);
	}

	#[test]
	fn db_normalization()
	{
		assert_eq!(normalize_db(f64::NEG_INFINITY, -75.0), 0.0);
		assert_eq!(normalize_db(-100.0, -75.0), 0.0);
		assert_eq!(normalize_db(-37.5, -75.0), 0.5);
		assert_eq!(normalize_db(0.0, -75.0), 1.0);
		assert_eq!(normalize_db(6.0, -75.0), 1.0);
	}

	#[test]
	fn bounds_within_audible_range()
	{
		let freqs: Vec<f64> = (0..9).map(|i| i as f64 * 1000.0).collect();

		assert_eq!(frequency_bounds(&freqs, 20.0, 20000.0), (1, 8));
		assert_eq!(frequency_bounds(&freqs, 0.0, 3000.0), (0, 3));
		assert_eq!(frequency_bounds(&freqs, 2500.0, 5500.0), (3, 6));
	}

	#[test]
	fn chunked_mean_downsamples_in_order()
	{
		let mut out = Vec::new();

		// ceil(5/2) = 3: [1, 3, 5] and [7, 9]
		chunked_mean_into(&[1.0, 3.0, 5.0, 7.0, 9.0], 2, &mut out);
		assert_eq!(out, vec![3.0, 8.0]);

		chunked_mean_into(&[1.0, 2.0, 3.0], 3, &mut out);
		assert_eq!(out, vec![1.0, 2.0, 3.0]);

		// ceil(5/4) = 2 leaves only three chunks
		chunked_mean_into(&[1.0, 1.0, 2.0, 2.0, 3.0], 4, &mut out);
		assert_eq!(out, vec![1.0, 2.0, 3.0]);

		chunked_mean_into(&[], 4, &mut out);
		assert!(out.is_empty());
	}

	#[test]
	fn centering_pads_both_sides()
	{
		let mut v = vec![1.0, 2.0, 3.0];
		center_in_place(&mut v, 3);
		assert_eq!(v, vec![1.0, 2.0, 3.0]);

		let mut v = vec![1.0, 2.0];
		center_in_place(&mut v, 5);
		assert_eq!(v, vec![0.0, 1.0, 2.0, 0.0, 0.0]);

		let mut v = vec![1.0, 2.0, 3.0];
		center_in_place(&mut v, 6);
		assert_eq!(v, vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);

		let mut v = vec![];
		center_in_place(&mut v, 2);
		assert_eq!(v, vec![0.0, 0.0]);
	}

	#[test]
	fn few_bins_are_centered_on_the_strip()
	{
		// 9 bins at 0, 1000, ..., 8000 Hz; bins 1..=8 are audible
		let mut analyzer = SpectralAnalyzer::new(config(16, 16000.0, 30));
		assert_eq!(analyzer.bin_bounds(), (1, 8));

		let out = analyzer.analyze(&mut sine(16, 4, 1.0)).to_vec();
		assert_eq!(out.len(), 30);
		assert!(out[..11].iter().all(|&x| x == 0.0));
		assert!(out[19..].iter().all(|&x| x == 0.0));
		assert!(out[11 + 3] > 0.9);
	}

	#[test]
	fn mirrored_output_is_palindromic()
	{
		let mut cfg = config(16, 16.0, 18);
		cfg.audible_low = 0.0;
		cfg.audible_high = 8.0;
		cfg.mirror = true;

		let mut analyzer = SpectralAnalyzer::new(cfg);
		assert_eq!(analyzer.bin_bounds(), (0, 8));

		let out = analyzer.analyze(&mut sine(16, 3, 0.7)).to_vec();
		assert_eq!(out.len(), 18);
		for i in 0..9 {
			assert_eq!(out[i], out[17 - i]);
		}
		assert!(out[8 - 3] > 0.0);
	}
}
