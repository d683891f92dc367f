use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::event::AnalysisOutcome;
use crate::model::AttemptId;
use crate::request::AnalysisRequest;

/// One analysis attempt handed to the shell. The shell owns delivery,
/// retries and timeouts, and answers with a single [`AnalysisOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InferenceOperation {
    pub attempt: AttemptId,
    pub request: AnalysisRequest,
}

impl Operation for InferenceOperation {
    type Output = AnalysisOutcome;
}

#[derive(Clone)]
pub struct Inference<Ev> {
    context: CapabilityContext<InferenceOperation, Ev>,
}

impl<Ev> Capability<Ev> for Inference<Ev> {
    type Operation = InferenceOperation;
    type MappedSelf<MappedEv> = Inference<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Inference::new(self.context.map_event(f))
    }
}

impl<Ev> Inference<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<InferenceOperation, Ev>) -> Self {
        Self { context }
    }

    /// Ask the shell to run `request`; `callback` turns the outcome into the
    /// event fed back to the app.
    pub fn analyze<F>(&self, attempt: AttemptId, request: AnalysisRequest, callback: F)
    where
        F: FnOnce(AnalysisOutcome) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let outcome = ctx
                .request_from_shell(InferenceOperation { attempt, request })
                .await;
            ctx.update_app(callback(outcome));
        });
    }
}
