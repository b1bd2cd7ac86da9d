//! Tracer capability contract for historical call tracing.
//!
//! Every collector, whether compiled into the binary or interpreted from
//! script source, implements [`Tracer`]. The execution collaborator pushes
//! [`Event`]s into it in program order and finally asks for its
//! [`result`](Tracer::result).
//!
//! # Cancellation
//!
//! Collectors expose a [`StopHandle`] that can be cloned and moved to another
//! thread. Stopping is cooperative: the collector observes the request at its
//! next event boundary and reports [`TraceError::Cancelled`] from `result`.
//!
//! ```ignore
//! use trc_collect::{native, StopReason, TraceContext, Tracer};
//!
//! let mut tracer = native::ParityCallTracer::new(&TraceContext::default());
//! let stop = tracer.stop_handle().clone();
//! std::thread::spawn(move || stop.stop(StopReason::Interrupted("shutdown".into())));
//! ```

mod context;
mod error;
mod event;
mod stop;
mod tracer;

pub mod native;

pub use context::{ContextField, TraceContext};
pub use error::{Result, StopReason, TraceError};
pub use event::{
    BalanceChange, CallExit, CallFrame, CallKind, Event, Step, StorageAccess, TxEnv, TxOutcome,
    hex_address, hex_bytes, hex_quantity, hex_word,
};
pub use stop::StopHandle;
pub use tracer::Tracer;
