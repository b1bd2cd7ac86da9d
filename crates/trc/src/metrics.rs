//! Metrics emitted by the trace engine.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use std::time::Duration;

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};

use crate::resolver::Provenance;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "trc_resolutions_total",
        Unit::Count,
        "Tracer resolutions by provenance and outcome"
    );
    describe_counter!(
        "trc_stops_total",
        Unit::Count,
        "Tracers stopped before completion"
    );
    describe_histogram!(
        "trc_trace_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of traced call batches"
    );
}

pub fn record_resolution(provenance: Provenance, ok: bool) {
    counter!(
        "trc_resolutions_total",
        "provenance" => provenance.as_str(),
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

pub fn record_stop() {
    counter!("trc_stops_total").increment(1);
}

pub fn record_batch(elapsed: Duration) {
    histogram!("trc_trace_duration_seconds").record(elapsed.as_secs_f64());
}
