//! Background risk worker.
//!
//! Runs a calculation on its own thread so an interactive caller can keep
//! drawing while the first call waits on model loading or the fallback's
//! simulated latency.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::domain::{PatientInput, RiskResult};
use crate::ports::RiskEngine;

use super::HybridRiskCalculator;

/// Progress updates from the risk worker.
#[derive(Debug, Clone)]
pub enum RiskProgress {
    /// Engines are being selected and loaded
    Initializing,
    /// Inference is running
    Calculating,
    /// Calculation finished
    Complete(RiskResult),
    /// Calculation failed; carries the user-facing message
    Error(String),
}

/// Handle to a running risk worker.
pub struct RiskWorkerHandle {
    progress_rx: Receiver<RiskProgress>,
    _handle: JoinHandle<()>,
}

impl RiskWorkerHandle {
    /// Block until the calculation finishes, passing intermediate updates to
    /// `on_progress`.
    pub fn wait_with<F>(self, mut on_progress: F) -> Result<RiskResult, String>
    where
        F: FnMut(&RiskProgress),
    {
        loop {
            match self.progress_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(RiskProgress::Complete(result)) => return Ok(result),
                Ok(RiskProgress::Error(message)) => return Err(message),
                Ok(progress) => on_progress(&progress),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err("Risk worker exited without a result".to_string());
                }
            }
        }
    }
}

/// Spawns risk calculations on background threads.
pub struct RiskWorker;

impl RiskWorker {
    pub fn spawn<P, D>(
        calculator: Arc<HybridRiskCalculator<P, D>>,
        input: PatientInput,
    ) -> RiskWorkerHandle
    where
        P: RiskEngine + 'static,
        D: RiskEngine + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            Self::run_with_progress(&calculator, &input, &tx);
        });

        RiskWorkerHandle {
            progress_rx: rx,
            _handle: handle,
        }
    }

    fn run_with_progress<P, D>(
        calculator: &HybridRiskCalculator<P, D>,
        input: &PatientInput,
        tx: &Sender<RiskProgress>,
    ) where
        P: RiskEngine,
        D: RiskEngine,
    {
        // Send failures mean the receiver was dropped; nothing left to report to.
        let _ = tx.send(RiskProgress::Initializing);
        if let Err(e) = calculator.initialize() {
            let _ = tx.send(RiskProgress::Error(e.to_string()));
            return;
        }

        let _ = tx.send(RiskProgress::Calculating);
        let progress = match calculator.calculate_risk(input) {
            Ok(result) => RiskProgress::Complete(result),
            Err(e) => RiskProgress::Error(e.to_string()),
        };
        let _ = tx.send(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::hybrid::tests::StubEngine;
    use crate::application::MockRiskEngine;
    use crate::config::MockConfig;
    use crate::domain::Sex;

    fn patient() -> PatientInput {
        PatientInput::new(72.0, Sex::Female, 10.1, 0.95, 39.0, 12.8)
    }

    #[test]
    fn test_worker_reports_phases_in_order() {
        let calculator = Arc::new(HybridRiskCalculator::new(
            StubEngine::default(),
            MockRiskEngine::new(MockConfig::instant()),
        ));
        let handle = RiskWorker::spawn(calculator, patient());

        let mut seen = Vec::new();
        let result = handle
            .wait_with(|p| seen.push(format!("{p:?}")))
            .expect("stub result");

        assert_eq!(seen, vec!["Initializing", "Calculating"]);
        assert_eq!(result.model_versions.binary, "stub");
    }

    #[test]
    fn test_worker_falls_back_when_primary_fails() {
        let calculator = Arc::new(HybridRiskCalculator::new(
            StubEngine {
                init_fails: true,
                ..StubEngine::default()
            },
            MockRiskEngine::new(MockConfig::instant().with_seed(4)),
        ));
        let result = RiskWorker::spawn(calculator.clone(), patient())
            .wait_with(|_| {})
            .unwrap();

        assert!(result.model_versions.binary.contains("(Mock)"));
        assert!(!calculator.is_using_real_models());
    }
}
