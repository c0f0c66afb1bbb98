//! Trace context propagators selectable through `--<prefix>-trace-propagator`.

pub mod b3;
pub mod ot;

use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use std::fmt;

pub use self::b3::{B3Encoding, B3Propagator};
pub use self::ot::OtTracePropagator;

/// One propagation format. `w3c` expands to [`Baggage`](Self::Baggage) and
/// [`TraceContext`](Self::TraceContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropagatorKind {
    B3,
    OtTrace,
    Baggage,
    TraceContext,
}

impl PropagatorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::B3 => "b3",
            Self::OtTrace => "ottrace",
            Self::Baggage => "baggage",
            Self::TraceContext => "tracecontext",
        }
    }

    fn build(self) -> Box<dyn TextMapPropagator + Send + Sync> {
        match self {
            Self::B3 => Box::new(B3Propagator::with_encoding(B3Encoding::SingleAndMultipleHeader)),
            Self::OtTrace => Box::new(OtTracePropagator::new()),
            Self::Baggage => Box::new(BaggagePropagator::new()),
            Self::TraceContext => Box::new(TraceContextPropagator::new()),
        }
    }
}

impl fmt::Display for PropagatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a comma separated propagator list such as `b3,w3c`.
///
/// `w3c` and any unrecognized token contribute baggage and trace-context.
/// Duplicates are dropped, first occurrence wins the position.
#[must_use]
pub fn parse_propagators(list: &str) -> Vec<PropagatorKind> {
    let mut kinds = Vec::new();
    let mut push = |kind: PropagatorKind| {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    };

    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.to_ascii_lowercase().as_str() {
            "b3" => push(PropagatorKind::B3),
            "ottrace" => push(PropagatorKind::OtTrace),
            "w3c" => {
                push(PropagatorKind::Baggage);
                push(PropagatorKind::TraceContext);
            }
            unknown => {
                tracing::warn!(propagator = unknown, "Unknown trace propagator, using w3c");
                push(PropagatorKind::Baggage);
                push(PropagatorKind::TraceContext);
            }
        }
    }

    if kinds.is_empty() {
        kinds.extend([PropagatorKind::Baggage, PropagatorKind::TraceContext]);
    }
    kinds
}

/// Builds one propagator that injects and extracts every format in `kinds`.
#[must_use]
pub fn composite_propagator(kinds: &[PropagatorKind]) -> TextMapCompositePropagator {
    TextMapCompositePropagator::new(kinds.iter().map(|kind| kind.build()).collect())
}

fn is_hex(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Accepts 16 or 32 hex digits; 64-bit ids are left-padded with zeros.
pub(crate) fn parse_trace_id(value: &str) -> Option<TraceId> {
    let value = value.trim();
    if !is_hex(value) {
        return None;
    }
    let trace_id = match value.len() {
        32 => TraceId::from_hex(value).ok()?,
        16 => TraceId::from_hex(&format!("{value:0>32}")).ok()?,
        _ => return None,
    };
    (trace_id != TraceId::INVALID).then_some(trace_id)
}

pub(crate) fn parse_span_id(value: &str) -> Option<SpanId> {
    let value = value.trim();
    if value.len() != 16 || !is_hex(value) {
        return None;
    }
    let span_id = SpanId::from_hex(value).ok()?;
    (span_id != SpanId::INVALID).then_some(span_id)
}

pub(crate) fn remote_span_context(
    trace_id: TraceId,
    span_id: SpanId,
    flags: TraceFlags,
) -> SpanContext {
    SpanContext::new(trace_id, span_id, flags, true, TraceState::default())
}
