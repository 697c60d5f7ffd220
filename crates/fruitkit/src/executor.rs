//! Execution engine - runs ordered steps one at a time

use crate::context::ProgressCallback;
use crate::error::Result;
use crate::types::{ExecuteSummary, Step};

/// Execute steps in order with a progress callback
///
/// Each step is awaited fully before the next starts. The first failure
/// stops the run and is returned as-is; steps already executed are not
/// rolled back.
pub async fn execute<P>(steps: &[Step], progress: &mut P) -> Result<ExecuteSummary>
where
    P: ProgressCallback + ?Sized,
{
    let mut summary = ExecuteSummary::default();
    if steps.is_empty() {
        return Ok(summary);
    }

    progress.on_run_start(steps.len());
    for step in steps {
        progress.on_step_start(step);
        log::debug!("Executing {step}");

        let result = match step {
            Step::Deploy { config, .. } => config.deploy().await.map(|_| ()),
            Step::Undeploy { config, .. } => config.undeploy().await,
        };
        if let Err(e) = result {
            progress.on_step_failed(step, &e);
            return Err(e);
        }

        summary.record(step.kind());
        progress.on_step_complete(step);
    }
    progress.on_run_complete(&summary);

    Ok(summary)
}

/// Simple execution without callbacks
pub async fn execute_simple(steps: &[Step]) -> Result<ExecuteSummary> {
    use crate::context::NoProgress;

    execute(steps, &mut NoProgress).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{LiveResources, ResourceClass};
    use crate::error::Error;
    use crate::resource::DeploymentState;
    use crate::value::{Outputs, Props};
    use std::sync::{Arc, Mutex};

    fn recording_class(log: Arc<Mutex<Vec<String>>>, fail_on: &'static str) -> Arc<ResourceClass> {
        let undeploy_log = Arc::clone(&log);
        ResourceClass::builder("test")
            .deploy(move |resource| {
                let log = Arc::clone(&log);
                async move {
                    if resource.name() == fail_on {
                        anyhow::bail!("boom");
                    }
                    log.lock().unwrap().push(format!("deploy {}", resource.name()));
                    Ok(Outputs::new())
                }
            })
            .undeploy(move |resource| {
                let log = Arc::clone(&undeploy_log);
                async move {
                    log.lock().unwrap().push(format!("undeploy {}", resource.name()));
                    Ok(())
                }
            })
            .fetch_currently_deployed(|| async { Ok(LiveResources::new()) })
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_run_start(&mut self, count: usize) {
            self.events.push(format!("start {count}"));
        }
        fn on_step_start(&mut self, step: &Step) {
            self.events.push(format!("begin {step}"));
        }
        fn on_step_complete(&mut self, step: &Step) {
            self.events.push(format!("done {step}"));
        }
        fn on_step_failed(&mut self, step: &Step, _error: &Error) {
            self.events.push(format!("failed {step}"));
        }
        fn on_run_complete(&mut self, summary: &ExecuteSummary) {
            self.events.push(format!("complete {}", summary.total_changes()));
        }
    }

    #[tokio::test]
    async fn test_execute_empty() {
        let summary = execute_simple(&[]).await.unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[tokio::test]
    async fn test_execute_runs_steps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let class = recording_class(Arc::clone(&log), "");
        let old = class.instantiate("a", Props::new()).unwrap();
        let new = class.instantiate("a", Props::new()).unwrap();
        let other = class.instantiate("b", Props::new()).unwrap();
        let steps = vec![Step::undeploy(old), Step::deploy(new.clone()), Step::deploy(other)];

        let mut recorder = Recorder::default();
        let summary = execute(&steps, &mut recorder).await.unwrap();

        assert_eq!(summary.deployed, 2);
        assert_eq!(summary.undeployed, 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["undeploy a", "deploy a", "deploy b"]
        );
        assert_eq!(new.state(), DeploymentState::Deployed);
        assert_eq!(recorder.events.first().unwrap(), "start 3");
        assert_eq!(recorder.events.last().unwrap(), "complete 3");
    }

    #[tokio::test]
    async fn test_execute_fails_fast() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let class = recording_class(Arc::clone(&log), "b");
        let steps: Vec<Step> = ["a", "b", "c"]
            .into_iter()
            .map(|name| Step::deploy(class.instantiate(name, Props::new()).unwrap()))
            .collect();

        let mut recorder = Recorder::default();
        let err = execute(&steps, &mut recorder).await.unwrap_err();

        assert!(matches!(err, Error::Deploy { ref resource, .. } if resource == "b"));
        assert_eq!(*log.lock().unwrap(), vec!["deploy a"]);
        assert!(steps[0].config().is_deployed());
        assert!(!steps[2].config().is_deployed());
        assert_eq!(recorder.events.last().unwrap(), "failed deploy b");
    }
}
