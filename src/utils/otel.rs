//! Observability
//!
//! Installs the global `tracing` subscriber. With an OTLP endpoint configured,
//! spans are also exported over OpenTelemetry; otherwise plain fmt logging.

use opentelemetry::trace::TracerProvider;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "derator_portal=info,tower_http=info";

/// Flushes pending spans when dropped.
pub struct OtelGuard {
    exporting: bool,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if self.exporting {
            global::shutdown_tracer_provider();
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Fmt-only logging.
pub fn init_logging() -> OtelGuard {
    Registry::default()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
    OtelGuard { exporting: false }
}

pub fn init_telemetry(service_name: &str, endpoint: &str) -> anyhow::Result<OtelGuard> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()?;

    let trace_config = sdktrace::Config::default().with_resource(Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]));

    let provider = sdktrace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(trace_config)
        .build();
    global::set_tracer_provider(provider.clone());

    // sdktrace::Tracer implements PreSampledTracer, the global BoxedTracer does not
    let tracer = provider.tracer(service_name.to_string());
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    Registry::default()
        .with(env_filter())
        .with(telemetry)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(OtelGuard { exporting: true })
}
