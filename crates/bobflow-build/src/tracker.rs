//! アーティファクト追跡
//!
//! SubBuild ごとに一意な RunToken を発行してビルド時のラベルに埋め込み、
//! 後続の tag / push ステップで「直前にビルドしたイメージ」を特定します。
//! 同じバックエンドを並行して使う実行同士は、トークンの一意性で区別されます。

use crate::backend::{Artifact, Backend};
use crate::error::{BuildError, BuildResult};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// イメージに付与するラベルのデフォルトキー
pub const DEFAULT_LABEL_KEY: &str = "bobflow.run-token";

/// SubBuild 1回分の実行トークン
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunToken(String);

impl RunToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactTracker {
    label_key: String,
}

impl Default for ArtifactTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_KEY)
    }
}

impl ArtifactTracker {
    pub fn new(label_key: impl Into<String>) -> Self {
        Self {
            label_key: label_key.into(),
        }
    }

    pub fn label_key(&self) -> &str {
        &self.label_key
    }

    /// 新しい RunToken を発行（UUID v4）
    pub fn mint_token(&self) -> RunToken {
        RunToken(Uuid::new_v4().to_string())
    }

    /// ビルドコマンドに渡すラベル
    pub fn labels_for(&self, token: &RunToken) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(self.label_key.clone(), token.0.clone());
        labels
    }

    /// トークンを持つ最新のイメージ ID を解決
    ///
    /// 再ビルドなどで複数見つかった場合は作成日時が最も新しいものを選び、
    /// 同時刻なら ID の大きい方を選びます。
    pub async fn resolve<B: Backend>(&self, backend: &B, token: &RunToken) -> BuildResult<String> {
        let artifacts = backend.find_by_label(&self.label_key, token.as_str()).await?;
        tracing::debug!(
            token = %token,
            candidates = artifacts.len(),
            "Resolving artifact"
        );

        self.pick_latest(artifacts, token)
            .map(|artifact| artifact.id)
            .ok_or_else(|| BuildError::ArtifactNotFound(token.clone()))
    }

    fn pick_latest(&self, artifacts: Vec<Artifact>, token: &RunToken) -> Option<Artifact> {
        artifacts
            .into_iter()
            // ラベルが一致しないものは除外
            .filter(|artifact| {
                artifact.labels.get(&self.label_key).map(String::as_str) == Some(token.as_str())
            })
            .filter(|artifact| !artifact.id.is_empty())
            .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)))
    }
}
