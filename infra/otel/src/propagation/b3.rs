//! Zipkin B3 context propagation.
//!
//! Extraction understands both the single `b3` header and the
//! `x-b3-*` header family; injection writes whichever [`B3Encoding`] selects.

use super::{parse_span_id, parse_trace_id, remote_span_context};
use opentelemetry::Context;
use opentelemetry::propagation::text_map_propagator::FieldIter;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, TraceContextExt, TraceFlags};
use std::sync::LazyLock;

const B3_SINGLE_HEADER: &str = "b3";
const B3_TRACE_ID_HEADER: &str = "x-b3-traceid";
const B3_SPAN_ID_HEADER: &str = "x-b3-spanid";
const B3_SAMPLED_HEADER: &str = "x-b3-sampled";
const B3_FLAGS_HEADER: &str = "x-b3-flags";
const B3_PARENT_SPAN_ID_HEADER: &str = "x-b3-parentspanid";

static B3_FIELDS: LazyLock<[String; 6]> = LazyLock::new(|| {
    [
        B3_SINGLE_HEADER.to_owned(),
        B3_TRACE_ID_HEADER.to_owned(),
        B3_SPAN_ID_HEADER.to_owned(),
        B3_SAMPLED_HEADER.to_owned(),
        B3_FLAGS_HEADER.to_owned(),
        B3_PARENT_SPAN_ID_HEADER.to_owned(),
    ]
});

/// Headers written on injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum B3Encoding {
    /// `x-b3-traceid`, `x-b3-spanid` and `x-b3-sampled`.
    #[default]
    MultipleHeader,
    /// `b3: {trace_id}-{span_id}-{sampled}`.
    SingleHeader,
    SingleAndMultipleHeader,
}

#[derive(Debug, Clone, Default)]
pub struct B3Propagator {
    encoding: B3Encoding,
}

impl B3Propagator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_encoding(encoding: B3Encoding) -> Self {
        Self { encoding }
    }

    fn extract_span_context(extractor: &dyn Extractor) -> Option<SpanContext> {
        extractor.get(B3_SINGLE_HEADER).and_then(extract_single).or_else(|| extract_multiple(extractor))
    }
}

impl TextMapPropagator for B3Propagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return;
        }

        let sampled = if span_context.is_sampled() { "1" } else { "0" };

        if matches!(self.encoding, B3Encoding::SingleHeader | B3Encoding::SingleAndMultipleHeader) {
            injector.set(
                B3_SINGLE_HEADER,
                format!("{}-{}-{sampled}", span_context.trace_id(), span_context.span_id()),
            );
        }

        if matches!(self.encoding, B3Encoding::MultipleHeader | B3Encoding::SingleAndMultipleHeader)
        {
            injector.set(B3_TRACE_ID_HEADER, span_context.trace_id().to_string());
            injector.set(B3_SPAN_ID_HEADER, span_context.span_id().to_string());
            injector.set(B3_SAMPLED_HEADER, sampled.to_owned());
        }
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        Self::extract_span_context(extractor)
            .map_or_else(|| cx.clone(), |span_context| cx.with_remote_span_context(span_context))
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(B3_FIELDS.as_slice())
    }
}

fn sampling_flags(value: &str) -> Option<TraceFlags> {
    match value {
        "1" | "d" | "true" => Some(TraceFlags::SAMPLED),
        "0" | "false" => Some(TraceFlags::default()),
        _ => None,
    }
}

fn extract_single(value: &str) -> Option<SpanContext> {
    let mut parts = value.trim().split('-');
    let trace_id = parse_trace_id(parts.next()?)?;
    let span_id = parse_span_id(parts.next()?)?;
    let flags = match parts.next() {
        Some(sampling) => sampling_flags(sampling)?,
        None => TraceFlags::default(),
    };
    if let Some(parent) = parts.next() {
        parse_span_id(parent)?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(remote_span_context(trace_id, span_id, flags))
}

fn extract_multiple(extractor: &dyn Extractor) -> Option<SpanContext> {
    let trace_id = parse_trace_id(extractor.get(B3_TRACE_ID_HEADER)?)?;
    let span_id = parse_span_id(extractor.get(B3_SPAN_ID_HEADER)?)?;

    let debug = extractor.get(B3_FLAGS_HEADER).is_some_and(|flags| flags.trim() == "1");
    let flags = if debug {
        TraceFlags::SAMPLED
    } else {
        match extractor.get(B3_SAMPLED_HEADER) {
            Some(sampled) => sampling_flags(sampled.trim())?,
            None => TraceFlags::default(),
        }
    };

    Some(remote_span_context(trace_id, span_id, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    fn extracted(headers: &HashMap<String, String>) -> SpanContext {
        B3Propagator::new().extract(headers).span().span_context().clone()
    }

    #[test]
    fn test_extract_single_header() {
        let single = format!("{TRACE_ID}-{SPAN_ID}-1");
        let sc = extracted(&headers(&[("b3", single.as_str())]));
        assert!(sc.is_valid() && sc.is_remote() && sc.is_sampled());
        assert_eq!(sc.trace_id().to_string(), TRACE_ID);
        assert_eq!(sc.span_id().to_string(), SPAN_ID);
    }

    #[test]
    fn test_extract_multiple_headers_with_short_trace_id() {
        let sc = extracted(&headers(&[
            ("x-b3-traceid", "a3ce929d0e0e4736"),
            ("x-b3-spanid", SPAN_ID),
            ("x-b3-sampled", "0"),
        ]));
        assert!(sc.is_valid());
        assert!(!sc.is_sampled());
        assert_eq!(sc.trace_id().to_string(), "0000000000000000a3ce929d0e0e4736");
    }

    #[test]
    fn test_debug_flag_implies_sampled() {
        let sc = extracted(&headers(&[
            ("x-b3-traceid", TRACE_ID),
            ("x-b3-spanid", SPAN_ID),
            ("x-b3-flags", "1"),
        ]));
        assert!(sc.is_sampled());
    }

    #[test]
    fn test_malformed_headers_leave_context_empty() {
        assert!(!extracted(&headers(&[("b3", "0")])).is_valid());
        assert!(!extracted(&headers(&[("b3", "nothex-00f067aa0ba902b7-1")])).is_valid());
        assert!(!extracted(&headers(&[("x-b3-traceid", TRACE_ID)])).is_valid());
    }

    #[test]
    fn test_inject_respects_encoding() {
        let sc = remote_span_context(
            parse_trace_id(TRACE_ID).expect("trace id"),
            parse_span_id(SPAN_ID).expect("span id"),
            TraceFlags::SAMPLED,
        );
        let cx = Context::new().with_remote_span_context(sc);

        let mut single: HashMap<String, String> = HashMap::new();
        B3Propagator::with_encoding(B3Encoding::SingleHeader).inject_context(&cx, &mut single);
        assert_eq!(single.get("b3").map(String::as_str), Some(&*format!("{TRACE_ID}-{SPAN_ID}-1")));
        assert!(!single.contains_key("x-b3-traceid"));

        let mut multiple: HashMap<String, String> = HashMap::new();
        B3Propagator::new().inject_context(&cx, &mut multiple);
        assert_eq!(multiple.get("x-b3-traceid").map(String::as_str), Some(TRACE_ID));
        assert_eq!(multiple.get("x-b3-sampled").map(String::as_str), Some("1"));
        assert!(!multiple.contains_key("b3"));
    }
}
