//! Tracer scripts compiled into the binary.

/// File suffix of tracer script assets.
pub const SCRIPT_SUFFIX: &str = ".js";

const BUNDLED: &[(&str, &str)] = &[
    ("call_counter.js", include_str!("../scripts/call_counter.js")),
    ("four_byte_tracer.js", include_str!("../scripts/four_byte_tracer.js")),
    ("noop.js", include_str!("../scripts/noop.js")),
    ("opcount_tracer.js", include_str!("../scripts/opcount_tracer.js")),
    (
        "storage_access_tracer.js",
        include_str!("../scripts/storage_access_tracer.js"),
    ),
];

/// Bundled assets as `(file name, source)` pairs.
pub fn bundled_assets() -> impl Iterator<Item = (&'static str, &'static str)> {
    BUNDLED.iter().copied()
}
