//! Recording observer.
//!
//! [`DiagnosticRecorder`] keeps the branch trace, human-readable diagnoses
//! and the worst relative error seen on compared values. The recorder is a
//! shared handle: hand one clone to the context and read the log through
//! another.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use serde::Serialize;

use super::observer::{BranchEvent, CompareEvent, DomainEvent, Observer};
use super::trace::TraceEntry;
use crate::path::BranchOption;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticLog {
    pub trace: Vec<TraceEntry>,
    pub diagnoses: Vec<String>,
    pub worst_relative_error: f64,
    pub compare_count: usize,
    pub unstable_count: usize,
    pub division_by_zero_count: usize,
    pub negative_sqrt_count: usize,
    pub negative_log_count: usize,
    pub negative_pow_count: usize,
}

impl DiagnosticLog {
    /// Total number of domain violations
    pub fn domain_violations(&self) -> usize {
        self.division_by_zero_count
            + self.negative_sqrt_count
            + self.negative_log_count
            + self.negative_pow_count
    }

    fn observe_relative_error(&mut self, value: f64) {
        if !value.is_nan() && value > self.worst_relative_error {
            self.worst_relative_error = value;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosticRecorder {
    log: Rc<RefCell<DiagnosticLog>>,
}

impl DiagnosticRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Ref<'_, DiagnosticLog> {
        self.log.borrow()
    }

    /// Copy of the log, leaving the recorder empty
    pub fn take(&self) -> DiagnosticLog {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    fn domain(&self, event: &DomainEvent<'_>, count: impl FnOnce(&mut DiagnosticLog) -> &mut usize) {
        let mut log = self.log.borrow_mut();
        *count(&mut *log) += 1;
        log.diagnoses.push(format!(
            "{} applied outside its domain on {}",
            event.operation, event.argument
        ));
    }
}

impl Observer for DiagnosticRecorder {
    fn on_compare(&mut self, event: &CompareEvent<'_>) {
        let mut log = self.log.borrow_mut();
        log.compare_count += 1;
        log.observe_relative_error(event.lhs.relative_error());
        log.observe_relative_error(event.rhs.relative_error());
        if !event.outcome.is_stable() {
            log.unstable_count += 1;
            log.diagnoses.push(format!(
                "unstable comparison {} {} {}: float {}, real {:?}",
                event.lhs, event.outcome.op, event.rhs, event.outcome.implementation, event.outcome.real
            ));
        }
    }

    fn on_branch(&mut self, event: &BranchEvent<'_>) {
        let mut log = self.log.borrow_mut();
        let sequence = log.trace.len() as u64;
        log.trace.push(TraceEntry::from_event(sequence, event));
        if !matches!(event.option, BranchOption::Consistent(_)) {
            log.diagnoses.push(format!(
                "{}: float and real executions diverge, following {}",
                event.site, event.option
            ));
        }
    }

    fn on_division_by_zero(&mut self, event: &DomainEvent<'_>) {
        self.domain(event, |log| &mut log.division_by_zero_count);
    }

    fn on_negative_sqrt(&mut self, event: &DomainEvent<'_>) {
        self.domain(event, |log| &mut log.negative_sqrt_count);
    }

    fn on_negative_log(&mut self, event: &DomainEvent<'_>) {
        self.domain(event, |log| &mut log.negative_log_count);
    }

    fn on_negative_pow(&mut self, event: &DomainEvent<'_>) {
        self.domain(event, |log| &mut log.negative_pow_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AnalysisContext;
    use crate::domain::{CompareOp, Zonotope};
    use crate::numerics::FloatFormat;

    #[test]
    fn test_records_unstable_comparison() {
        let recorder = DiagnosticRecorder::new();
        let mut ctx = AnalysisContext::default().with_observer(recorder.clone());
        let x = Zonotope::input_f64(&mut ctx, 0.05, 0.3, FloatFormat::DOUBLE);
        let zero = Zonotope::from_f64(&mut ctx, 0.0, FloatFormat::DOUBLE);
        let outcome = x.compare(&mut ctx, &zero, CompareOp::Gt);
        let taken = ctx.branch("if@0", &outcome).unwrap();
        assert!(taken);

        let log = recorder.log();
        assert_eq!(log.compare_count, 1);
        assert_eq!(log.unstable_count, 1);
        assert_eq!(log.trace.len(), 1);
        assert_eq!(log.trace[0].site, "if@0");
        assert!(log.trace[0].unstable);
        assert!(log.worst_relative_error > 5.0);
        assert!(log.diagnoses[0].starts_with("unstable comparison"));
    }

    #[test]
    fn test_division_by_zero_counted() {
        let recorder = DiagnosticRecorder::new();
        let mut ctx = AnalysisContext::default().with_observer(recorder.clone());
        let one = Zonotope::from_f64(&mut ctx, 1.0, FloatFormat::DOUBLE);
        let x = Zonotope::input_f64(&mut ctx, 0.0, 1.0, FloatFormat::DOUBLE);
        let _ = one.div(&mut ctx, &x);
        assert_eq!(recorder.log().division_by_zero_count, 1);
        assert_eq!(recorder.log().domain_violations(), 1);
        let taken = recorder.take();
        assert_eq!(taken.diagnoses.len(), 1);
        assert!(recorder.log().diagnoses.is_empty());
    }
}
