use bobflow_build::{
    Artifact, Backend, BuildResult, CommandStatus, Reporter, RunState,
};
use bobflow_core::{BuildSpecification, CommandLine, FileSetMetadata, SubBuild};
use chrono::DateTime;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Build(String),
    Tag(String),
    Push(String),
    Find(String),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    images: Vec<Artifact>,
    contexts: Vec<Vec<String>>,
    failures: Vec<(String, i32)>,
    forget_images: bool,
    clock: i64,
}

/// 呼び出しを記録するテスト用バックエンド
///
/// build 成功時にラベル付きのイメージを登録し、find_by_label で返します。
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// コマンド文字列に `pattern` を含む呼び出しを `code` で失敗させる
    pub fn fail_when(&self, pattern: &str, code: i32) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((pattern.to_string(), code));
    }

    /// build は成功するがイメージを登録しない
    pub fn forget_images(&self) {
        self.state.lock().unwrap().forget_images = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn images(&self) -> Vec<Artifact> {
        self.state.lock().unwrap().images.clone()
    }

    /// build 実行時点の作業ディレクトリの内容
    pub fn contexts(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().contexts.clone()
    }

    fn status_for(&self, command: &str) -> CommandStatus {
        let state = self.state.lock().unwrap();
        state
            .failures
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, code)| CommandStatus::from_code(*code))
            .unwrap_or(CommandStatus::from_code(0))
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    entries
}

impl Backend for FakeBackend {
    async fn build(
        &self,
        command: &CommandLine,
        context: &Path,
        labels: &HashMap<String, String>,
    ) -> BuildResult<CommandStatus> {
        let line = command.to_string();
        self.record(Call::Build(line.clone()));
        let entries = list_dir(context);

        // 並行実行時に他の実行と交互になるようにする
        tokio::task::yield_now().await;

        let status = self.status_for(&line);
        let mut state = self.state.lock().unwrap();
        state.contexts.push(entries);
        if status.success() && !state.forget_images {
            state.clock += 1;
            let id = format!("sha256:{:04}", state.clock);
            let created = DateTime::from_timestamp(1_700_000_000 + state.clock, 0).unwrap();
            state.images.push(Artifact {
                id,
                created,
                labels: labels.clone(),
            });
        }
        Ok(status)
    }

    async fn tag(&self, command: &CommandLine, _context: &Path) -> BuildResult<CommandStatus> {
        let line = command.to_string();
        self.record(Call::Tag(line.clone()));
        Ok(self.status_for(&line))
    }

    async fn push(&self, command: &CommandLine, _context: &Path) -> BuildResult<CommandStatus> {
        let line = command.to_string();
        self.record(Call::Push(line.clone()));
        Ok(self.status_for(&line))
    }

    async fn find_by_label(&self, key: &str, value: &str) -> BuildResult<Vec<Artifact>> {
        self.record(Call::Find(value.to_string()));
        tokio::task::yield_now().await;

        let state = self.state.lock().unwrap();
        Ok(state
            .images
            .iter()
            .filter(|image| image.labels.get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }
}

/// 状態遷移を記録する Reporter
#[derive(Default)]
pub struct RecordingReporter {
    pub states: Mutex<Vec<(usize, RunState)>>,
}

impl Reporter for RecordingReporter {
    fn state_changed(&self, index: usize, _name: &str, state: RunState) {
        self.states.lock().unwrap().push((index, state));
    }
}

/// テスト用のソースツリー
pub struct SourceTree {
    pub root: TempDir,
}

#[allow(dead_code)]
impl SourceTree {
    pub fn new(files: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        for file in files {
            let path = root.path().join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, format!("contents of {}", file)).unwrap();
        }
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}

#[allow(dead_code)]
pub fn metadata(included: &[&str], excluded: &[&str], dockerfile: &str) -> FileSetMetadata {
    FileSetMetadata {
        included: included.iter().map(PathBuf::from).collect(),
        excluded: excluded.iter().map(PathBuf::from).collect(),
        dockerfile: PathBuf::from(dockerfile),
    }
}

/// Bobfile パーサーと同じ形のコマンドを持つ SubBuild
pub fn sub_build(name: &str, metadata: FileSetMetadata, tags: &[&str]) -> SubBuild {
    let image = format!("registry.test/{}", name);
    SubBuild {
        name: name.to_string(),
        metadata,
        build_command: CommandLine::new("docker").args([
            "build".to_string(),
            "-t".to_string(),
            format!("{}:{{{{ run_token }}}}", image),
            ".".to_string(),
        ]),
        tag_commands: tags
            .iter()
            .map(|tag| {
                CommandLine::new("docker").args([
                    "tag".to_string(),
                    "{{ artifact }}".to_string(),
                    format!("{}:{}", image, tag),
                ])
            })
            .collect(),
        push_commands: tags
            .iter()
            .map(|tag| CommandLine::new("docker").args(["push".to_string(), format!("{}:{}", image, tag)]))
            .collect(),
    }
}

pub fn spec(sub_builds: Vec<SubBuild>) -> BuildSpecification {
    BuildSpecification::new(sub_builds).unwrap()
}
