//! Script tracers.
//!
//! Source text goes in, a running [`Tracer`](trc_collect::Tracer) comes out.
//! The [`ScriptEngine`] trait is the only thing the resolver depends on; the
//! [`RuleEngine`] is the engine shipped with `trc`.
//!
//! # Rule scripts
//!
//! ```text
//! // comments start with `//` or `#`
//! require tx_index
//! label block_number as block
//! on enter count selector as selectors
//! on step sum gas_cost
//! return selectors
//! ```

mod bundled;
mod engine;
mod rules;

pub use bundled::{SCRIPT_SUFFIX, bundled_assets};
pub use engine::ScriptEngine;
pub use rules::{Aggregate, EventKind, Program, RuleEngine, RuleTracer};
