//! The tracer capability.

use serde_json::Value;

use crate::{
    BalanceChange, CallExit, CallFrame, Result, StopHandle, StopReason, Step, StorageAccess,
    TxEnv, TxOutcome,
};

/// Tracer behavior trait.
///
/// Compiled and scripted collectors are interchangeable behind this trait.
/// All event hooks have default no-op implementations, so a collector only
/// implements the ones it cares about.
///
/// An instance traces exactly one execution and is then dropped.
pub trait Tracer: Send {
    /// Called when the transaction starts executing.
    fn on_tx_start(&mut self, _tx: &TxEnv) {}

    /// Called when the transaction finishes.
    fn on_tx_end(&mut self, _outcome: &TxOutcome) {}

    /// Called when a nested call frame opens.
    fn on_enter(&mut self, _frame: &CallFrame) {}

    /// Called when the innermost open frame closes.
    fn on_exit(&mut self, _exit: &CallExit) {}

    /// Called after each opcode.
    fn on_step(&mut self, _step: &Step) {}

    /// Called on storage reads and writes.
    fn on_storage(&mut self, _access: &StorageAccess) {}

    /// Called on balance transitions.
    fn on_balance(&mut self, _change: &BalanceChange) {}

    /// Finalized result of the traced execution.
    ///
    /// Before completion this returns whatever partial state the collector
    /// holds. After a stop it returns [`TraceError::Cancelled`](crate::TraceError::Cancelled).
    fn result(&mut self) -> Result<Value>;

    /// Stop slot shared with watchdogs.
    fn stop_handle(&self) -> &StopHandle;

    /// Terminate tracing at the first opportune moment.
    fn stop(&self, reason: StopReason) {
        self.stop_handle().stop(reason);
    }
}
