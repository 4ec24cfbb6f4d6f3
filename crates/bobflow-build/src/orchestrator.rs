//! パイプライン実行
//!
//! BuildSpecification の各 SubBuild を宣言順に
//! clean → assemble → build → resolve → tag → push の順で実行します。
//! 最初の失敗で実行全体を中断し、残りの SubBuild は開始しません。リトライは行いません。

use crate::backend::{Backend, CommandStatus};
use crate::context::ContextAssembler;
use crate::error::{BuildError, RunError};
use crate::progress::{NoopReporter, Reporter};
use crate::tracker::{ArtifactTracker, DEFAULT_LABEL_KEY, RunToken};
use crate::workdir::Workdir;
use bobflow_core::{ARTIFACT_VAR, BuildSpecification, CommandLine, RUN_TOKEN_VAR, SubBuild, Substitutions};
use std::fmt;
use std::path::{Path, PathBuf};

/// SubBuild 内のステップ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Clean,
    Assemble,
    Build,
    Resolve,
    Tag,
    Push,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Clean => "clean",
            Step::Assemble => "assemble",
            Step::Build => "build",
            Step::Resolve => "resolve",
            Step::Tag => "tag",
            Step::Push => "push",
        };
        f.write_str(name)
    }
}

/// 実行の状態
///
/// `Idle → Cleaning → Assembling → Building → Resolving → Tagging → Pushing → Idle`
/// の順に遷移し、失敗時は `Failed` で終了します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Cleaning,
    Assembling,
    Building,
    Resolving,
    Tagging,
    Pushing,
    Failed,
}

impl From<Step> for RunState {
    fn from(step: Step) -> Self {
        match step {
            Step::Clean => RunState::Cleaning,
            Step::Assemble => RunState::Assembling,
            Step::Build => RunState::Building,
            Step::Resolve => RunState::Resolving,
            Step::Tag => RunState::Tagging,
            Step::Push => RunState::Pushing,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Cleaning => "cleaning",
            RunState::Assembling => "assembling",
            RunState::Building => "building",
            RunState::Resolving => "resolving",
            RunState::Tagging => "tagging",
            RunState::Pushing => "pushing",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 実行ごとの設定
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// true の場合 push コマンドを実行しない（エラーではない）
    pub skip_push: bool,
    /// RunToken を付与するラベルのキー
    pub label_key: String,
    /// 作業ディレクトリを作成する場所（None はシステムの一時ディレクトリ）
    pub workdir_parent: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            skip_push: false,
            label_key: DEFAULT_LABEL_KEY.to_string(),
            workdir_parent: None,
        }
    }
}

/// ビルド済み SubBuild の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    pub index: usize,
    pub name: String,
    pub token: RunToken,
    pub artifact: String,
    pub tagged: usize,
    pub pushed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sub_builds: Vec<BuiltImage>,
}

type StepResult<T> = Result<T, (Step, BuildError)>;

fn at(step: Step) -> impl FnOnce(BuildError) -> (Step, BuildError) {
    move |e| (step, e)
}

pub struct Orchestrator<B, R = NoopReporter> {
    backend: B,
    reporter: R,
    config: OrchestratorConfig,
    tracker: ArtifactTracker,
}

impl<B: Backend> Orchestrator<B, NoopReporter> {
    pub fn new(backend: B, config: OrchestratorConfig) -> Self {
        Self::with_reporter(backend, config, NoopReporter)
    }
}

impl<B: Backend, R: Reporter> Orchestrator<B, R> {
    pub fn with_reporter(backend: B, config: OrchestratorConfig, reporter: R) -> Self {
        let tracker = ArtifactTracker::new(config.label_key.clone());
        Self {
            backend,
            reporter,
            config,
            tracker,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// ビルド仕様全体を実行
    ///
    /// 作業ディレクトリはこの実行専用に作成され、戻る時点で削除されます。
    pub async fn run(
        &self,
        spec: &BuildSpecification,
        source_root: &Path,
    ) -> Result<RunSummary, RunError> {
        tracing::info!(
            containers = spec.len(),
            source_root = %source_root.display(),
            "Starting build run"
        );
        self.reporter.run_started(spec.len());

        let result = self.run_all(spec, source_root).await;

        match &result {
            Ok(summary) => {
                tracing::info!(built = summary.sub_builds.len(), "Build run completed");
            }
            Err(e) => {
                tracing::error!(index = e.index, step = %e.step, "Build run failed: {}", e);
            }
        }
        self.reporter.run_finished(result.as_ref());

        result
    }

    async fn run_all(
        &self,
        spec: &BuildSpecification,
        source_root: &Path,
    ) -> Result<RunSummary, RunError> {
        let workdir = Workdir::create(self.config.workdir_parent.as_deref()).map_err(|source| {
            RunError {
                index: 0,
                name: spec
                    .sub_builds()
                    .first()
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
                step: Step::Clean,
                source,
            }
        })?;

        let mut summary = RunSummary::default();

        for (index, sub_build) in spec.sub_builds().iter().enumerate() {
            match self
                .run_sub_build(index, sub_build, source_root, &workdir)
                .await
            {
                Ok(built) => summary.sub_builds.push(built),
                Err((step, source)) => {
                    self.transition(index, &sub_build.name, RunState::Failed);
                    return Err(RunError {
                        index,
                        name: sub_build.name.clone(),
                        step,
                        source,
                    });
                }
            }
        }

        Ok(summary)
    }

    async fn run_sub_build(
        &self,
        index: usize,
        sub_build: &SubBuild,
        source_root: &Path,
        workdir: &Workdir,
    ) -> StepResult<BuiltImage> {
        let name = sub_build.name.as_str();

        self.enter(index, name, Step::Clean);
        workdir.clean().map_err(at(Step::Clean))?;

        self.enter(index, name, Step::Assemble);
        ContextAssembler::assemble(&sub_build.metadata, source_root, workdir.path())
            .map_err(at(Step::Assemble))?;

        self.enter(index, name, Step::Build);
        let token = self.tracker.mint_token();
        tracing::debug!(index, token = %token, "Minted run token");

        let substitutions = Substitutions::new().with(RUN_TOKEN_VAR, token.as_str());
        let build_command = render(&sub_build.build_command, &substitutions, Step::Build)?;
        let labels = self.tracker.labels_for(&token);
        let status = self
            .backend
            .build(&build_command, workdir.path(), &labels)
            .await
            .map_err(at(Step::Build))?;
        check(Step::Build, &build_command, status)?;

        self.enter(index, name, Step::Resolve);
        let artifact = self
            .tracker
            .resolve(&self.backend, &token)
            .await
            .map_err(at(Step::Resolve))?;
        tracing::info!(index, token = %token, artifact = %artifact, "Resolved artifact");

        let substitutions = substitutions.with(ARTIFACT_VAR, &artifact);

        self.enter(index, name, Step::Tag);
        for template in &sub_build.tag_commands {
            let command = render(template, &substitutions, Step::Tag)?;
            let status = self
                .backend
                .tag(&command, workdir.path())
                .await
                .map_err(at(Step::Tag))?;
            check(Step::Tag, &command, status)?;
        }

        let mut pushed = 0;
        if self.config.skip_push {
            tracing::info!(index, "Skipping push (skip_push enabled)");
        } else {
            self.enter(index, name, Step::Push);
            for template in &sub_build.push_commands {
                let command = render(template, &substitutions, Step::Push)?;
                let status = self
                    .backend
                    .push(&command, workdir.path())
                    .await
                    .map_err(at(Step::Push))?;
                check(Step::Push, &command, status)?;
                pushed += 1;
            }
        }

        self.transition(index, name, RunState::Idle);

        Ok(BuiltImage {
            index,
            name: sub_build.name.clone(),
            token,
            artifact,
            tagged: sub_build.tag_commands.len(),
            pushed,
        })
    }

    fn enter(&self, index: usize, name: &str, step: Step) {
        self.transition(index, name, step.into());
    }

    fn transition(&self, index: usize, name: &str, state: RunState) {
        tracing::debug!(index, container = name, state = %state, "State changed");
        self.reporter.state_changed(index, name, state);
    }
}

fn render(template: &CommandLine, substitutions: &Substitutions, step: Step) -> StepResult<CommandLine> {
    template
        .render(substitutions)
        .map_err(|e| (step, BuildError::from(e)))
}

fn check(step: Step, command: &CommandLine, status: CommandStatus) -> StepResult<()> {
    if status.success() {
        return Ok(());
    }

    Err((
        step,
        BuildError::CommandFailed {
            step,
            command: command.to_string(),
            code: status.code,
        },
    ))
}
