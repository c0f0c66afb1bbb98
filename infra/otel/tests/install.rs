use cmdkit_otel::{PropagatorKind, Provider, TracingConfig};
use opentelemetry::global;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{Tracer, TracerProvider};
use serial_test::serial;
use std::collections::HashMap;

fn config(provider: Provider, endpoint: &str) -> TracingConfig {
    let mut config = TracingConfig::new("install-test");
    config.provider = provider;
    config.endpoint = endpoint.to_owned();
    config.insecure = true;
    config.sample_ratio = 1.0;
    config
}

#[test]
#[serial]
fn otlp_http_installs_provider_and_propagators() {
    let mut config = config(Provider::OtlpHttp, "127.0.0.1:4318");
    config.propagators = vec![PropagatorKind::B3, PropagatorKind::Baggage, PropagatorKind::TraceContext];

    let telemetry = config.init().expect("otlphttp init");
    assert!(telemetry.is_enabled());
    assert_eq!(telemetry.propagators().len(), 3);

    let tracer = telemetry.provider().expect("provider").tracer("install-test");
    tracer.in_span("request", |cx| {
        let mut headers: HashMap<String, String> = HashMap::new();
        global::get_text_map_propagator(|propagator| propagator.inject_context(&cx, &mut headers));
        assert!(headers.contains_key("traceparent"));
        assert!(headers.contains_key("x-b3-traceid"));
        assert!(headers.contains_key("b3"));
    });
}

#[test]
#[serial]
fn none_provider_leaves_globals_untouched() {
    let telemetry = config(Provider::None, "").init().expect("none init");
    assert!(!telemetry.is_enabled());
    assert!(telemetry.provider().is_none());
}

#[test]
#[serial]
fn otlp_grpc_outside_runtime_is_rejected() {
    let err = config(Provider::OtlpGrpc, "127.0.0.1:4317").init().expect_err("needs runtime");
    assert!(err.to_string().contains("Tokio runtime"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn otlp_grpc_inside_runtime_succeeds() {
    let telemetry = config(Provider::OtlpGrpc, "127.0.0.1:4317").init().expect("otlpgrpc init");
    assert!(telemetry.is_enabled());
    tokio::task::spawn_blocking(move || drop(telemetry)).await.expect("shutdown");
}
