//! OpenTracing (`ot-tracer-*`) context propagation.

use super::{parse_span_id, parse_trace_id, remote_span_context};
use opentelemetry::Context;
use opentelemetry::propagation::text_map_propagator::FieldIter;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, TraceContextExt, TraceFlags};
use std::sync::LazyLock;

const OT_TRACE_ID_HEADER: &str = "ot-tracer-traceid";
const OT_SPAN_ID_HEADER: &str = "ot-tracer-spanid";
const OT_SAMPLED_HEADER: &str = "ot-tracer-sampled";

static OT_FIELDS: LazyLock<[String; 3]> = LazyLock::new(|| {
    [OT_TRACE_ID_HEADER.to_owned(), OT_SPAN_ID_HEADER.to_owned(), OT_SAMPLED_HEADER.to_owned()]
});

/// OpenTracing uses 64-bit trace ids, so only the low half of the trace id is
/// injected; shorter ids are zero-padded on extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtTracePropagator;

impl OtTracePropagator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn extract_span_context(extractor: &dyn Extractor) -> Option<SpanContext> {
        let trace_id = parse_trace_id(extractor.get(OT_TRACE_ID_HEADER)?)?;
        let span_id = parse_span_id(extractor.get(OT_SPAN_ID_HEADER)?)?;
        let flags = match extractor.get(OT_SAMPLED_HEADER).map(str::trim) {
            Some(sampled) if sampled.eq_ignore_ascii_case("true") || sampled == "1" => {
                TraceFlags::SAMPLED
            }
            Some(sampled) if sampled.eq_ignore_ascii_case("false") || sampled == "0" => {
                TraceFlags::default()
            }
            Some(_) => return None,
            None => TraceFlags::default(),
        };
        Some(remote_span_context(trace_id, span_id, flags))
    }
}

impl TextMapPropagator for OtTracePropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return;
        }

        let trace_id = span_context.trace_id().to_string();
        injector.set(OT_TRACE_ID_HEADER, trace_id[trace_id.len() - 16..].to_owned());
        injector.set(OT_SPAN_ID_HEADER, span_context.span_id().to_string());
        injector.set(OT_SAMPLED_HEADER, span_context.is_sampled().to_string());
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        Self::extract_span_context(extractor)
            .map_or_else(|| cx.clone(), |span_context| cx.with_remote_span_context(span_context))
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(OT_FIELDS.as_slice())
    }
}
