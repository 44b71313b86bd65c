use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Error};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

const SERVICE_NAME: &str = "transit_stops";

/// Keeps the log writer and span exporter alive until shutdown
pub struct Telemetry {
    _guard: WorkerGuard,
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Flushes pending spans
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                tracing::error!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

fn tracer_provider(endpoint: &str) -> Result<SdkTracerProvider, Error> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_millis(1000))
        .build()
        .context("Error building span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .build())
}

/// Logs to stdout and to a daily rolling file in `log_dir`. Spans are also
/// exported over OTLP when `otlp_endpoint` is set.
pub fn init(log_dir: &Path, otlp_endpoint: Option<&str>) -> Result<Telemetry, Error> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let appender = tracing_appender::rolling::daily(log_dir, "transit_stops.log");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(appender);

    // A layer that logs events to rolling files.
    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .pretty();

    let stdout_log = tracing_subscriber::fmt::layer().compact();

    let provider = otlp_endpoint.map(tracer_provider).transpose()?;
    let telemetry_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(SERVICE_NAME)));

    Registry::default()
        .with(telemetry_layer)
        .with(file_log)
        .with(stdout_log)
        .with(env_filter)
        .try_init()
        .context("Error installing tracing subscriber")?;

    Ok(Telemetry {
        _guard: guard,
        provider,
    })
}
