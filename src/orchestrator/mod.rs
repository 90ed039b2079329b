//! Build orchestration: request validation -> workspace -> project setup ->
//! synthesis -> implementation -> artifact emission.
//!
//! The pipeline is strictly sequential and fail-fast. Each stage runs as a
//! blocking-wait job through the [`Toolchain`] abstraction; implementation
//! is gated on synthesis reaching `succeeded`, enforced both by control
//! flow and by the [`PipelineState`] machine.

pub mod executor;
pub mod state;

pub use executor::{
    classify_stage_failure, prepare_workspace, resolve_constraints, resolve_jobs, validate_request,
};
pub use state::{PipelineState, StageState};

use log::{info, warn};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::BuildError;
use crate::models::{Artifact, BuildProfile, BuildRequest, StageKind};
use crate::sources::collect_sources;
use crate::toolchain::{ProjectHandle, Toolchain};

/// Drives one build request through the full pipeline.
#[derive(Clone)]
pub struct BuildOrchestrator {
    /// Engine the stages run on
    toolchain: Arc<dyn Toolchain>,

    /// The normalized build request
    request: BuildRequest,

    /// Effective knobs: top module, parallelism, extension allow-list
    profile: BuildProfile,

    /// Shared mutable state protected by RwLock for thread safety
    state: Arc<RwLock<PipelineState>>,
}

impl BuildOrchestrator {
    /// Create an orchestrator with both stages pending.
    pub fn new(toolchain: Arc<dyn Toolchain>, request: BuildRequest, profile: BuildProfile) -> Self {
        let state = PipelineState::new(&request.project_name, &request.part);
        BuildOrchestrator {
            toolchain,
            request,
            profile,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Snapshot of the pipeline state.
    pub async fn pipeline_state(&self) -> PipelineState {
        self.state.read().await.clone()
    }

    /// Run the pipeline to completion.
    ///
    /// The first error aborts the rest of the pipeline and is recorded in
    /// the state snapshot before being returned.
    pub async fn run(&self) -> Result<Artifact, BuildError> {
        match self.execute_pipeline().await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                self.state.write().await.record_error(e.to_string());
                Err(e)
            }
        }
    }

    async fn execute_pipeline(&self) -> Result<Artifact, BuildError> {
        executor::validate_request(&self.request)?;
        let constraints = executor::resolve_constraints(&self.request);
        executor::prepare_workspace(&self.request)?;

        let sources = collect_sources(&self.request.rtl_dir, &self.profile.source_extensions)?;
        if sources.is_empty() {
            // Not fatal here: the toolchain reports the real problem when it
            // tries to elaborate an empty design.
            warn!(
                "No design sources found under {}",
                self.request.rtl_dir.display()
            );
        }
        let jobs = executor::resolve_jobs(self.profile.jobs);

        let mut project = self.toolchain.create_project(
            &self.request.project_name,
            &self.request.part,
            &self.request.out_dir,
        )?;
        for file in sources.files() {
            self.toolchain.register_source(&mut project, file)?;
        }
        if let Some(xdc) = &constraints {
            self.toolchain.register_constraints(&mut project, xdc)?;
        }
        self.toolchain
            .set_top_module(&mut project, &self.profile.top_module)?;
        info!(
            "Project '{}' prepared on {}: {} sources, {} constraints file(s), top '{}'",
            self.request.project_name,
            self.toolchain.name(),
            sources.len(),
            project.constraints().len(),
            self.profile.top_module
        );

        self.run_gated_stage(&project, StageKind::Synthesis, jobs)
            .await?;
        self.run_gated_stage(&project, StageKind::Implementation, jobs)
            .await?;

        let path = self.toolchain.emit_artifact(&project, true).await?;
        let artifact = Artifact::new(path);
        let elapsed = self.state.read().await.elapsed_since_start();
        match elapsed {
            Ok(duration) => info!(
                "Build complete in {:.1}s: {}",
                duration.as_secs_f64(),
                artifact.path.display()
            ),
            Err(_) => info!("Build complete: {}", artifact.path.display()),
        }
        Ok(artifact)
    }

    /// Launch a stage and block until its terminal outcome.
    async fn run_gated_stage(
        &self,
        project: &ProjectHandle,
        stage: StageKind,
        jobs: usize,
    ) -> Result<(), BuildError> {
        {
            let state = self.state.read().await;
            if !state.can_start(stage) {
                return Err(BuildError::StageFailed {
                    stage,
                    diagnostic: format!(
                        "{} cannot start: synthesis is {}, implementation is {}",
                        stage,
                        state.synthesis.as_str(),
                        state.implementation.as_str()
                    ),
                });
            }
        }
        self.transition(stage, StageState::Running).await?;
        info!("{} started ({} jobs)", stage, jobs);

        let job = self.toolchain.run_stage(project, stage, jobs)?;
        let report = self.toolchain.wait(job).await?;

        if report.succeeded() {
            self.transition(stage, StageState::Succeeded).await?;
            info!("{} succeeded", stage);
            Ok(())
        } else {
            self.transition(stage, StageState::Failed).await?;
            Err(executor::classify_stage_failure(stage, &report.diagnostics))
        }
    }

    async fn transition(&self, stage: StageKind, next: StageState) -> Result<(), BuildError> {
        self.state
            .write()
            .await
            .transition(stage, next)
            .map_err(|diagnostic| BuildError::StageFailed { stage, diagnostic })
    }
}
