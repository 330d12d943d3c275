pub(crate) mod api;
pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod hl7;
pub(crate) mod openmrs;
pub(crate) mod rendering;
pub(crate) mod types;
pub(crate) mod views;

use crate::cli::Cli;
use crate::config::AppConfig;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logger(level: tracing::Level) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false)
				.with_writer(std::io::stderr),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// An empty string will disable Sentry
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = &config.telemetry.sentry {
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	};

	guard
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
	let cli = Cli::parse();
	let config = AppConfig::new()?;
	init_logger(config.telemetry.level);

	// The Sentry client has to exist before the Tokio runtime, so no #[tokio::main].
	let _sentry = init_sentry(&config);

	let outcome = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(cli::run(cli.command, config));

	Ok(match outcome {
		Ok(()) => ExitCode::SUCCESS,
		Err(alert) => {
			error!("{alert:#}");
			ExitCode::FAILURE
		}
	})
}
