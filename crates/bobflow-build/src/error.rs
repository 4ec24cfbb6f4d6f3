use crate::orchestrator::Step;
use crate::tracker::RunToken;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Source file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Refusing to copy symlink: {0}")]
    SymlinkRejected(PathBuf),

    #[error("Workdir {workdir} is inside the build context of {source_root}")]
    WorkdirInsideContext {
        workdir: PathBuf,
        source_root: PathBuf,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No image labeled with run token {0}")]
    ArtifactNotFound(RunToken),

    #[error("{step} command failed with {}: {command}", exit_code_label(.code))]
    CommandFailed {
        step: Step,
        command: String,
        code: Option<i32>,
    },

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error(transparent)]
    Spec(#[from] bobflow_core::SpecError),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "signal".to_string(),
    }
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfileが見つかりません: {}\n\
                     \n\
                     解決方法:\n\
                     1. Dockerfileのパスを確認してください\n\
                     2. Bobfileで明示的にパスを指定してください:\n\
                        dockerfile \"path/to/Dockerfile\"",
                    path.display()
                )
            }
            BuildError::MissingFile(path) => {
                format!(
                    "ビルドコンテキストに含めるファイルが見つかりません: {}\n\
                     \n\
                     Bobfileの included を確認してください。",
                    path.display()
                )
            }
            BuildError::ArtifactNotFound(token) => {
                format!(
                    "ビルドは成功しましたが、イメージが見つかりません (run token: {})\n\
                     \n\
                     Dockerデーモンの状態を確認してください。",
                    token
                )
            }
            BuildError::WorkdirInsideContext {
                workdir,
                source_root,
            } => {
                format!(
                    "作業ディレクトリがビルドコンテキストの中にあります: {}\n\
                     \n\
                     BOB_WORKDIR_PARENT（または config.yaml の workdir_parent）を\n\
                     ソースルート {} の外に設定してください。",
                    workdir.display(),
                    source_root.display()
                )
            }
            BuildError::CommandFailed { step, command, .. } => {
                format!(
                    "{} コマンドが失敗しました:\n  {}\n\
                     \n\
                     上記の出力を確認してください。",
                    step, command
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// パイプライン実行の失敗
///
/// どの SubBuild のどのステップで止まったかを保持します。
#[derive(Debug, Error)]
#[error("container '{name}' (#{index}) failed at {step}: {source}")]
pub struct RunError {
    pub index: usize,
    pub name: String,
    pub step: Step,
    #[source]
    pub source: BuildError,
}

impl RunError {
    pub fn user_message(&self) -> String {
        format!(
            "container '{}' (#{}) の {} ステップで失敗しました\n{}",
            self.name,
            self.index,
            self.step,
            self.source.user_message()
        )
    }
}
