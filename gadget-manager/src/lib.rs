//! Gadget execution against a remote gadget runtime.
//!
//! [`GadgetManager`] is the seam the rest of the workspace programs against.
//! [`RemoteGadgetManager`] implements it on top of any [`GadgetRuntime`],
//! capturing emitted records through an [`OutputCapture`] and bounding what
//! is handed back to callers with the [`ResultGovernor`].

#![warn(missing_docs, clippy::pedantic)]

mod capture;
mod error;
mod governor;
mod instance;
mod manager;
mod runtime;

pub use capture::OutputCapture;
pub use error::{GadgetError, GadgetResult};
pub use governor::{ExecutionResult, MAX_RESULT_LEN, ResultGovernor, TruncationMode};
pub use instance::GadgetInstance;
pub use manager::{
    ATTACH_TIMEOUT, COLLECT_TIMEOUT, CREATED_BY, GadgetManager, ManagerConfig,
    RemoteGadgetManager,
};
pub use runtime::{
    GadgetRuntime, Record, RecordSink, RunRequest, RunTarget, RuntimeError, RuntimeInstance,
    RuntimeResult,
};
