//! コンテナビルドバックエンド
//!
//! build / tag / push コマンドの実行と、ラベルによるイメージ検索を抽象化します。

use crate::error::BuildResult;
use bobflow_core::CommandLine;
use bollard::Docker;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// コマンドの終了状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// シグナルで終了した場合は None
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// バックエンドが保持するイメージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    pub created: DateTime<Utc>,
    pub labels: HashMap<String, String>,
}

pub trait Backend {
    /// `context` を作業ディレクトリとしてビルドコマンドを実行し、`labels` をイメージに付与
    fn build(
        &self,
        command: &CommandLine,
        context: &Path,
        labels: &HashMap<String, String>,
    ) -> impl Future<Output = BuildResult<CommandStatus>> + Send;

    fn tag(
        &self,
        command: &CommandLine,
        context: &Path,
    ) -> impl Future<Output = BuildResult<CommandStatus>> + Send;

    fn push(
        &self,
        command: &CommandLine,
        context: &Path,
    ) -> impl Future<Output = BuildResult<CommandStatus>> + Send;

    /// ラベル `key=value` を持つイメージの一覧
    fn find_by_label(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = BuildResult<Vec<Artifact>>> + Send;
}

/// docker CLI と Docker Engine API を使うバックエンド
///
/// コマンドの実行は CLI、イメージの検索は bollard 経由で行います。
#[derive(Clone)]
pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// ローカルのDockerデーモンに接続
    pub fn connect() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker))
    }

    async fn run(&self, command: &CommandLine, context: &Path) -> BuildResult<CommandStatus> {
        tracing::info!("Running: {}", command);

        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(context)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        Ok(CommandStatus {
            code: status.code(),
        })
    }
}

/// `--label key=value` を末尾のビルドコンテキスト引数の直前に挿入
pub fn with_labels(command: &CommandLine, labels: &HashMap<String, String>) -> CommandLine {
    let mut sorted: Vec<_> = labels.iter().collect();
    sorted.sort();

    let mut label_args = Vec::with_capacity(sorted.len() * 2);
    for (key, value) in sorted {
        label_args.push("--label".to_string());
        label_args.push(format!("{}={}", key, value));
    }

    let mut args = command.args.clone();
    let at = args.len().saturating_sub(1);
    args.splice(at..at, label_args);

    CommandLine {
        program: command.program.clone(),
        args,
    }
}

impl Backend for DockerBackend {
    async fn build(
        &self,
        command: &CommandLine,
        context: &Path,
        labels: &HashMap<String, String>,
    ) -> BuildResult<CommandStatus> {
        self.run(&with_labels(command, labels), context).await
    }

    async fn tag(&self, command: &CommandLine, context: &Path) -> BuildResult<CommandStatus> {
        self.run(command, context).await
    }

    async fn push(&self, command: &CommandLine, context: &Path) -> BuildResult<CommandStatus> {
        self.run(command, context).await
    }

    async fn find_by_label(&self, key: &str, value: &str) -> BuildResult<Vec<Artifact>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{}={}", key, value)]);

        let options = bollard::query_parameters::ListImagesOptions {
            filters: Some(filters),
            ..Default::default()
        };

        let images = self.docker.list_images(Some(options)).await?;

        Ok(images
            .into_iter()
            .map(|image| Artifact {
                id: image.id,
                created: DateTime::from_timestamp(image.created, 0).unwrap_or_default(),
                labels: image.labels,
            })
            .collect())
    }
}
