//! Then steps for pipeline lifecycle BDD scenarios.

use super::world::PipelineWorld;
use pipeline_control::pipeline::domain::RunStatus;
use rstest_bdd_macros::then;

#[then(r#"the run status is "{status}""#)]
fn run_status_is(world: &PipelineWorld, status: String) -> Result<(), eyre::Report> {
    let expected = RunStatus::try_from(status.as_str())?;
    let run = world.run()?;
    if run.status() != expected {
        return Err(eyre::eyre!(
            "expected status {}, found {}",
            expected.as_str(),
            run.status().as_str()
        ));
    }
    Ok(())
}

#[then(r#"the submission fails with a "{kind}" error"#)]
fn submission_fails(world: &PipelineWorld, kind: String) -> Result<(), eyre::Report> {
    let error = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("expected a submission error, got {:?}", world.last_run))?;
    if error.kind().as_str() != kind {
        return Err(eyre::eyre!(
            "expected {kind} error, got {} ({error})",
            error.kind().as_str()
        ));
    }
    Ok(())
}

#[then(r#"the run has stages "{stages}""#)]
fn run_has_stages(world: &PipelineWorld, stages: String) -> Result<(), eyre::Report> {
    let expected: Vec<&str> = stages.split(',').collect();
    let actual: Vec<&str> = world
        .run()?
        .stages()
        .iter()
        .map(|stage| stage.name.as_str())
        .collect();
    if actual != expected {
        return Err(eyre::eyre!("expected stages {expected:?}, found {actual:?}"));
    }
    Ok(())
}
