//! Native shell for [`App`]: holds the crux [`Core`], runs inference requests
//! on the tokio runtime and resolves them back into the core one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use crux_core::{Core, Request};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument};

use crate::app::{AnalyzeRejection, App, ViewModel};
use crate::capabilities::{Analyzer, Capabilities, Effect, HttpClient, InferenceOperation};
use crate::event::{AnalysisOutcome, Event};
use crate::model::{AttemptId, ScanFailure};
use crate::{AppError, ErrorKind};

/// Single consumer of every [`Effect`]. Analysis calls run as spawned tasks
/// and their outcomes are resolved only when [`ScanSession::next_completion`]
/// collects them, so the core is never driven concurrently.
///
/// Must be used from within a tokio runtime.
pub struct ScanSession<C: HttpClient + 'static> {
    core: Core<Effect, App>,
    analyzer: Arc<Analyzer<C>>,
    requests: HashMap<AttemptId, Request<InferenceOperation>>,
    tasks: JoinSet<(AttemptId, AnalysisOutcome)>,
    view_tx: watch::Sender<ViewModel>,
}

impl<C: HttpClient + 'static> ScanSession<C> {
    pub fn new(analyzer: Analyzer<C>) -> Self {
        let core = Core::new::<Capabilities>();
        let (view_tx, _) = watch::channel(core.view());
        Self {
            core,
            analyzer: Arc::new(analyzer),
            requests: HashMap::new(),
            tasks: JoinSet::new(),
            view_tx,
        }
    }

    /// Receives a fresh [`ViewModel`] after every render.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view_tx.subscribe()
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    /// Analysis tasks whose outcome has not been resolved yet, stale ones included.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn select_image(&mut self, bytes: Vec<u8>, media_type: impl Into<String>) {
        self.dispatch(Event::image_selected(bytes, media_type));
    }

    pub fn analyze(&mut self) -> Result<(), AnalyzeRejection> {
        if let Some(rejection) = self.view().analyze_rejection() {
            return Err(rejection);
        }
        self.dispatch(Event::AnalyzeRequested);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.dispatch(Event::ResetRequested);
    }

    #[instrument(skip(self), fields(event = event.name()))]
    pub fn dispatch(&mut self, event: Event) {
        let effects = self.core.process_event(event);
        self.process(effects);
    }

    fn process(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Render(_) => {
                    self.view_tx.send_replace(self.core.view());
                }
                Effect::Inference(request) => self.spawn_analysis(request),
            }
        }
    }

    fn spawn_analysis(&mut self, request: Request<InferenceOperation>) {
        let InferenceOperation {
            attempt,
            request: body,
        } = request.operation.clone();

        let analyzer = Arc::clone(&self.analyzer);
        let handle = tokio::spawn(async move { analyzer.analyze(&body).await });

        // A panicking analysis still has to settle its attempt.
        self.tasks.spawn(async move {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%attempt, error = %e, "analysis task did not finish");
                    AnalysisOutcome::Failure(ScanFailure::from(
                        AppError::new(ErrorKind::Internal, "Analysis task failed")
                            .with_internal(e.to_string()),
                    ))
                }
            };
            (attempt, outcome)
        });

        self.requests.insert(attempt, request);
        debug!(%attempt, pending = self.tasks.len(), "analysis task spawned");
    }

    /// Waits for the next analysis task to finish and resolves its request.
    /// Returns `false` at once when nothing is pending.
    pub async fn next_completion(&mut self) -> bool {
        let Some(joined) = self.tasks.join_next().await else {
            return false;
        };

        match joined {
            Ok((attempt, outcome)) => match self.requests.remove(&attempt) {
                Some(mut request) => {
                    let effects = self.core.resolve(&mut request, outcome);
                    self.process(effects);
                }
                None => error!(%attempt, "no open request for finished analysis"),
            },
            Err(e) => error!(error = %e, "analysis watcher did not finish"),
        }
        true
    }

    /// Resolves completions until no task is outstanding.
    pub async fn run_until_settled(&mut self) {
        while self.next_completion().await {}
    }
}

#[cfg(feature = "native-client")]
impl ScanSession<crate::capabilities::ReqwestClient> {
    pub fn from_config(config: &crate::ScanConfig) -> Result<Self, crate::AppError> {
        Ok(Self::new(config.build_analyzer()?))
    }
}
