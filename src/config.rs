// vim: noet

use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

// network configuration
pub const DEFAULT_PORT: u16 = 42170;
pub const LISTEN_HOST: &str = "0.0.0.0";

// definitions for the FFT
pub const DEFAULT_FFT_SIZE: usize = 1024;

// audible range
pub const AUDIBLE_LOW:  f64 =    20.0;
pub const AUDIBLE_HIGH: f64 = 20000.0;

pub const DEFAULT_DECAY: f64 = 0.5;
pub const RAINBOW_RATE:  f64 = 30.0;
pub const MAX_RAINBOW_RATE: f64 = 1000.0;

// reachability pings
pub const PING_INTERVAL_MS: u64 = 2000;
pub const PING_TIMEOUT_MS:  u64 = 1000;

// frames handed to the receiver per read from stdin
pub const BUFFER_FRAMES: usize = 512;

/// Signal to quantization noise ratio of an ideal `bits`-bit converter, in dB.
pub fn sqnr(bits: u32) -> f64
{
	20.0 * 2f64.powi(bits as i32).log10()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EffectKind
{
	Solid,
	Rainbow,
	Luxception,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SampleFormat
{
	/// 32-bit float, little endian
	F32,
	/// 16-bit signed integer, little endian
	S16,
}

impl SampleFormat
{
	pub fn size_in_bytes(self) -> usize
	{
		match self {
			SampleFormat::F32 => 4,
			SampleFormat::S16 => 2,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb
{
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError
{
	#[error("invalid hex color '{0}', expected RRGGBB")]
	BadColor(String),

	#[error("LED count must be within 1..=255, got {0}")]
	LedCount(usize),

	#[error("FFT size must be at least 2, got {0}")]
	FftSize(usize),

	#[error("sample rate must be positive, got {0}")]
	SampleRate(u32),

	#[error("channel count must be positive")]
	Channels,

	#[error("buffer frame count must be positive")]
	BufferFrames,

	#[error("decay factor must be within [0, 1), got {0}")]
	Decay(f64),

	#[error("dBFS threshold must be negative, got {0}")]
	DbfsThreshold(f64),

	#[error("audible range {low} Hz .. {high} Hz is empty")]
	AudibleRange { low: f64, high: f64 },

	#[error("rainbow rate must be within (0, {max}] Hz, got {0}", max = MAX_RAINBOW_RATE)]
	RainbowRate(f64),

	#[error("ping interval and timeout must be positive")]
	PingTiming,
}

pub fn parse_color(s: &str) -> Result<Rgb, ConfigError>
{
	let hex = s.strip_prefix('#').unwrap_or(s);

	if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(ConfigError::BadColor(s.to_string()));
	}

	let c = u32::from_str_radix(hex, 16).map_err(|_| ConfigError::BadColor(s.to_string()))?;

	Ok(Rgb {
		r: ((c & 0xFF0000) >> 16) as u8,
		g: ((c & 0x00FF00) >>  8) as u8,
		b:  (c & 0x0000FF)        as u8,
	})
}

/// Converts an update rate in Hz into a timer period. NaN, infinite, non-positive
/// and out of range rates are rejected, as are rates whose period does not fit a `Duration`.
pub fn rainbow_period(rate: f64) -> Result<Duration, ConfigError>
{
	if !(rate > 0.0 && rate <= MAX_RAINBOW_RATE) {
		return Err(ConfigError::RainbowRate(rate));
	}

	Duration::try_from_secs_f64(1.0 / rate).map_err(|_| ConfigError::RainbowRate(rate))
}

#[derive(Parser, Debug, Clone)]
#[command(name = "luxaudio", about = "Stream an audio spectrum to a Lux LED driver over UDP")]
pub struct Config
{
	/// Host of the LED driver
	#[arg(long)]
	pub host: String,

	/// UDP port of the LED driver
	#[arg(long, default_value_t = DEFAULT_PORT)]
	pub port: u16,

	/// Number of LEDs to be driven (max 255)
	#[arg(long)]
	pub leds: usize,

	/// FFT window size in samples
	#[arg(long = "fft", default_value_t = DEFAULT_FFT_SIZE)]
	pub fft_size: usize,

	/// Sample rate of the incoming PCM stream
	#[arg(long)]
	pub sample_rate: u32,

	/// Number of interleaved channels
	#[arg(long, default_value_t = 2)]
	pub channels: usize,

	/// Sample encoding of the PCM stream on stdin
	#[arg(long, value_enum, default_value_t = SampleFormat::F32)]
	pub format: SampleFormat,

	/// Frames read from stdin per callback
	#[arg(long, default_value_t = BUFFER_FRAMES)]
	pub buffer_frames: usize,

	/// Decay factor [0,1), controls the smoothness of the visualization
	#[arg(long, default_value_t = DEFAULT_DECAY)]
	pub decay: f64,

	/// dBFS threshold, everything below is treated as silence
	#[arg(long, allow_negative_numbers = true, default_value_t = -sqnr(16))]
	pub dbfs_threshold: f64,

	/// Lower audible frequency
	#[arg(long, default_value_t = AUDIBLE_LOW)]
	pub audible_low: f64,

	/// Upper audible frequency
	#[arg(long, default_value_t = AUDIBLE_HIGH)]
	pub audible_high: f64,

	/// Mirror mode with lower frequencies at the middle
	#[arg(long)]
	pub mirror: bool,

	/// Color effect
	#[arg(long, value_enum, default_value_t = EffectKind::Solid)]
	pub effect: EffectKind,

	/// Base color as hex RRGGBB
	#[arg(long, default_value = "ff00ff")]
	pub color: String,

	/// Update rate of the rainbow effect in Hz
	#[arg(long, default_value_t = RAINBOW_RATE)]
	pub rainbow_rate: f64,

	/// Port the luxception effect listens on
	#[arg(long, default_value_t = DEFAULT_PORT)]
	pub listen_port: u16,

	/// Interval between reachability pings
	#[arg(long, default_value_t = PING_INTERVAL_MS)]
	pub ping_interval_ms: u64,

	/// How long to wait for a ping reply
	#[arg(long, default_value_t = PING_TIMEOUT_MS)]
	pub ping_timeout_ms: u64,

	/// Print verbose messages
	#[arg(short, long)]
	pub verbose: bool,
}

impl Config
{
	pub fn target_address(&self) -> String
	{
		format!("{}:{}", self.host, self.port)
	}

	pub fn base_color(&self) -> Result<Rgb, ConfigError>
	{
		parse_color(&self.color)
	}

	/// Tick period of the rainbow timer.
	pub fn rainbow_period(&self) -> Result<Duration, ConfigError>
	{
		rainbow_period(self.rainbow_rate)
	}

	pub fn validate(&self) -> Result<(), ConfigError>
	{
		if self.leds == 0 || self.leds > 255 {
			return Err(ConfigError::LedCount(self.leds));
		}
		if self.fft_size < 2 {
			return Err(ConfigError::FftSize(self.fft_size));
		}
		if self.sample_rate == 0 {
			return Err(ConfigError::SampleRate(self.sample_rate));
		}
		if self.channels == 0 {
			return Err(ConfigError::Channels);
		}
		if self.buffer_frames == 0 {
			return Err(ConfigError::BufferFrames);
		}
		if !(0.0..1.0).contains(&self.decay) {
			return Err(ConfigError::Decay(self.decay));
		}
		if !(self.dbfs_threshold < 0.0) {
			return Err(ConfigError::DbfsThreshold(self.dbfs_threshold));
		}
		if !(self.audible_low >= 0.0 && self.audible_low < self.audible_high) {
			return Err(ConfigError::AudibleRange { low: self.audible_low, high: self.audible_high });
		}
		self.rainbow_period()?;
		if self.ping_interval_ms == 0 || self.ping_timeout_ms == 0 {
			return Err(ConfigError::PingTiming);
		}

		self.base_color()?;

		Ok( () )
	}
}
