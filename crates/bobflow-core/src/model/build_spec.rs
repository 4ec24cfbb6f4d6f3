//! ビルド仕様定義

use super::command::CommandLine;
use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// バックエンドが要求するビルド記述ファイル名
pub const CANONICAL_DOCKERFILE: &str = "Dockerfile";

/// dockerfile 未指定時のデフォルト
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// ビルドコンテキストに含めるファイル集合のメタデータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSetMetadata {
    /// 空の場合はソースルート直下の全エントリ
    #[serde(default)]
    pub included: BTreeSet<PathBuf>,
    #[serde(default)]
    pub excluded: BTreeSet<PathBuf>,
    /// コンテキスト内では常に `Dockerfile` として配置される
    pub dockerfile: PathBuf,
}

impl Default for FileSetMetadata {
    fn default() -> Self {
        Self {
            included: BTreeSet::new(),
            excluded: BTreeSet::new(),
            dockerfile: PathBuf::from(DEFAULT_DOCKERFILE),
        }
    }
}

impl FileSetMetadata {
    /// 全エントリがソースルート相対の単純なパスであることを検証
    pub fn validate(&self) -> Result<()> {
        validate_entry(&self.dockerfile)?;
        for entry in self.included.iter().chain(self.excluded.iter()) {
            validate_entry(entry)?;
        }
        Ok(())
    }
}

fn validate_entry(entry: &Path) -> Result<()> {
    if entry.as_os_str().is_empty() {
        return Err(SpecError::InvalidConfig(
            "ファイル名が空です".to_string(),
        ));
    }

    let simple = entry
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !simple || entry.to_string_lossy().contains("..") {
        return Err(SpecError::InvalidConfig(format!(
            "ファイル名はソースルート相対で指定してください: {}",
            entry.display()
        )));
    }

    Ok(())
}

/// ビルド仕様の1ステージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubBuild {
    /// 宣言されたコンテナ名（ログとエラー表示用）
    pub name: String,
    pub metadata: FileSetMetadata,
    pub build_command: CommandLine,
    #[serde(default)]
    pub tag_commands: Vec<CommandLine>,
    #[serde(default)]
    pub push_commands: Vec<CommandLine>,
}

/// パース済みのビルド仕様
///
/// 宣言順に並んだ SubBuild の列。構築後は変更できません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSpecification {
    sub_builds: Vec<SubBuild>,
}

impl BuildSpecification {
    pub fn new(sub_builds: Vec<SubBuild>) -> Result<Self> {
        for sub_build in &sub_builds {
            sub_build.metadata.validate().map_err(|e| match e {
                SpecError::InvalidConfig(msg) => {
                    SpecError::InvalidConfig(format!("container '{}': {}", sub_build.name, msg))
                }
                other => other,
            })?;
        }
        Ok(Self { sub_builds })
    }

    pub fn sub_builds(&self) -> &[SubBuild] {
        &self.sub_builds
    }

    pub fn len(&self) -> usize {
        self.sub_builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_builds.is_empty()
    }
}
