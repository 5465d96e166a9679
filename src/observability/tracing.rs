use anyhow::{Context, Error, Result};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "relevance-worker";

static TRACING_INIT: OnceCell<()> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Tracing サブスクライバを一度だけ初期化する。
///
/// `RUST_LOG_FORMAT=pretty` の場合は人間向けの fmt レイヤー、それ以外は JSON を使う。
/// `OTEL_EXPORTER_OTLP_ENDPOINT` が設定されている場合は OTLP エクスポーターも有効化する。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init() -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let otel_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        let mut layers: Vec<BoxedLayer> = vec![fmt_layer()];
        let mut otel_error = None;
        if let Some(endpoint) = otel_endpoint.as_deref() {
            match init_tracer(endpoint) {
                Ok(tracer) => layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed()),
                Err(e) => otel_error = Some(e),
            }
        }
        let otel_enabled = otel_endpoint.is_some() && otel_error.is_none();

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;

        match otel_error {
            Some(e) => info!(
                otel_enabled,
                error = %e,
                "tracing initialized without OpenTelemetry (init failed)"
            ),
            None => info!(otel_enabled, "tracing initialized"),
        }

        Ok::<(), Error>(())
    })?;
    Ok(())
}

fn fmt_layer() -> BoxedLayer {
    let pretty = std::env::var("RUST_LOG_FORMAT").is_ok_and(|v| v == "pretty");
    if pretty {
        tracing_subscriber::fmt::layer().boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed()
    }
}

/// OTLPエクスポーター経由でOpenTelemetryトレーサーを初期化する。
///
/// サンプリング比率は `OTEL_SAMPLING_RATIO` 環境変数で制御（デフォルト1.0 = 全トレース）。
fn init_tracer(endpoint: &str) -> Result<SdkTracer> {
    let sampling_ratio = std::env::var("OTEL_SAMPLING_RATIO")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(1.0);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}
