// vim: noet

use std::io::Read;
use std::net::UdpSocket;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

mod config;
mod downmix;
mod effect;
mod pinger;
mod queue;
mod signal_processing;
mod udpproto;

use crate::config::{Config, EffectKind};
use crate::downmix::{Downmixer, FrameReceiver};
use crate::effect::{Effect, solid::Solid, rainbow::Rainbow, luxception::Luxception};
use crate::pinger::{Pinger, Reachability};
use crate::queue::FrameQueue;
use crate::signal_processing::{AnalyzerConfig, SpectralAnalyzer};
use crate::udpproto::UdpProto;

fn make_effect(cfg: &Config, reachability: &Reachability) -> Result<Effect>
{
	let color = cfg.base_color()?;

	let effect = match cfg.effect {
		EffectKind::Solid => Effect::Solid(Solid::new(cfg.leds, color)),
		EffectKind::Rainbow => Effect::Rainbow(
			Rainbow::new(cfg.leds, cfg.rainbow_period()?).context("could not start rainbow timer")?),
		EffectKind::Luxception => {
			let listen_address = format!("{}:{}", config::LISTEN_HOST, cfg.listen_port);
			Effect::Luxception(
				Luxception::new(cfg.leds, color, &listen_address, reachability.clone())
					.with_context(|| format!("could not listen on {}", listen_address))?)
		},
	};

	Ok(effect)
}

fn main() -> Result<()>
{
	let cfg = Config::parse();

	let default_filter = if cfg.verbose { "debug" } else { "info" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

	cfg.validate()?;

	let target = cfg.target_address();

	// pings and data push use separate sockets so ping replies never mix with data
	let sender = UdpProto::new(&target, cfg.leds as u8)
		.with_context(|| format!("could not connect to {}", target))?;

	let ping_socket = UdpSocket::bind("0.0.0.0:0").context("could not bind ping socket")?;
	ping_socket.connect(&target).with_context(|| format!("could not connect to {}", target))?;

	let reachability = Reachability::new();
	Pinger::new(
		ping_socket,
		Duration::from_millis(cfg.ping_interval_ms),
		Duration::from_millis(cfg.ping_timeout_ms),
		reachability.clone(),
	).spawn().context("could not start pinger")?;

	let analyzer = SpectralAnalyzer::new(AnalyzerConfig {
		window_size:  cfg.fft_size,
		sample_rate:  cfg.sample_rate as f64,
		led_count:    cfg.leds,
		decay:        cfg.decay,
		dbfs_floor:   cfg.dbfs_threshold,
		audible_low:  cfg.audible_low,
		audible_high: cfg.audible_high,
		mirror:       cfg.mirror,
	});

	let (lo_f, hi_f) = analyzer.bin_bounds();
	info!("Analyzing bins {}..={} of {}", lo_f, hi_f, cfg.fft_size/2 + 1);

	let effect = make_effect(&cfg, &reachability)?;
	info!("Using {} effect for {} LEDs", effect.name(), cfg.leds);

	let queue = FrameQueue::new(analyzer, effect, sender);
	let downmixer = Downmixer::new(cfg.format, cfg.channels);
	let mut buffer = vec![0u8; cfg.buffer_frames * downmixer.frame_size()];
	let mut receiver = FrameReceiver::new(downmixer, queue, reachability);

	let mut stdin = std::io::stdin().lock();
	let mut last_report = Instant::now();
	let (mut leftover, mut failed) = (0, 0);

	info!("Listening...");

	// main loop
	loop {
		// read a block of frames and exit gracefully on EOF
		match stdin.read_exact(&mut buffer) {
			Ok(()) => (),
			Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
				info!("End of stream. Exiting.");
				return Ok(());
			},
			Err(e) => return Err(e).context("could not read audio from stdin"),
		}

		let drained = receiver.on_receive(&buffer, cfg.buffer_frames);
		leftover += drained.leftover;
		failed += drained.failed;

		if cfg.verbose && last_report.elapsed() >= Duration::from_secs(1) {
			info!("queue size = {}, backlogged windows = {}, failed sends = {}",
				receiver.queue().size(), leftover, failed);
			leftover = 0;
			failed = 0;
			last_report = Instant::now();
		}
	}
}
