//! Diagnostics and threshold notifications
//!
//! This module provides:
//! - the [`Observer`] hooks called by the domain and the path engine
//! - a recording observer keeping diagnoses and the branch trace
//! - JSON-lines trace files and replay checking

pub mod observer;
pub mod recorder;
pub mod trace;

pub use observer::{BranchEvent, CompareEvent, DomainEvent, NoopObserver, Observer, ObserverSet};
pub use recorder::{DiagnosticLog, DiagnosticRecorder};
pub use trace::{LoadedTrace, TraceEntry, TraceHeader, TraceId, TraceMismatch, TraceReplayer, TraceStore};
