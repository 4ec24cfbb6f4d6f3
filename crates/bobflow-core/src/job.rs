//! ジョブ引数
//!
//! キューから受け取ったジョブ引数をビルドジョブ仕様として検証します。

use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};

/// ビルドジョブの仕様
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(rename = "account", default)]
    pub repo_owner: String,
    #[serde(rename = "repo", default)]
    pub repo_name: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    #[serde(default)]
    pub sync: bool,
}

impl JobSpec {
    /// ジョブ引数の先頭要素から JobSpec を生成して検証
    pub fn from_args(args: &[serde_json::Value]) -> Result<Self> {
        let raw = args.first().ok_or_else(|| {
            SpecError::Validation("a single build spec object argument is required".to_string())
        })?;

        if !raw.is_object() {
            return Err(SpecError::Validation(
                "build spec args must be an object".to_string(),
            ));
        }

        let spec: JobSpec = serde_json::from_value(raw.clone()).map_err(|e| {
            SpecError::Validation(format!("failed to deserialize build job spec: {}", e))
        })?;

        spec.validate()?;
        Ok(spec)
    }

    /// 必須フィールドの存在チェック
    pub fn validate(&self) -> Result<()> {
        if self.repo_owner.is_empty() {
            return Err(SpecError::Validation(
                "account must be provided for job spec".to_string(),
            ));
        }
        if self.repo_name.is_empty() {
            return Err(SpecError::Validation(
                "repo must be provided for job spec".to_string(),
            ));
        }
        if self.git_ref.is_empty() {
            return Err(SpecError::Validation(
                "ref must be provided for job spec".to_string(),
            ));
        }
        Ok(())
    }
}
