pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bobfile の候補ファイル名（優先順）
pub const BOBFILE_CANDIDATES: [&str; 3] = ["Bobfile", "Bobfile.kdl", "bob.kdl"];

/// 実行設定
///
/// 設定ファイル → 環境変数 → CLIフラグ の順に上書きされます。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// push ステップを実行しない
    pub skip_push: bool,
    /// RunToken を付与するラベルのキー（未指定時はビルド側のデフォルト）
    pub label_key: Option<String>,
    /// 作業ディレクトリの作成先
    pub workdir_parent: Option<PathBuf>,
}

impl Settings {
    /// YAML設定ファイルを読み込む
    ///
    /// 空の label_key は未指定として扱います（環境変数と同じ）。
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::InvalidSettings {
                path: path.to_path_buf(),
                source,
            })?;
        settings.label_key = settings.label_key.filter(|key| !key.trim().is_empty());
        Ok(settings)
    }

    /// 環境変数で上書き
    ///
    /// - BOB_SKIP_PUSH: true/false, 1/0, yes/no
    /// - BOB_LABEL_KEY
    /// - BOB_WORKDIR_PARENT
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("BOB_SKIP_PUSH") {
            self.skip_push = parse_bool("BOB_SKIP_PUSH", &value)?;
        }
        if let Ok(value) = std::env::var("BOB_LABEL_KEY")
            && !value.trim().is_empty()
        {
            self.label_key = Some(value);
        }
        if let Ok(value) = std::env::var("BOB_WORKDIR_PARENT")
            && !value.is_empty()
        {
            self.workdir_parent = Some(PathBuf::from(value));
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// 設定ディレクトリ（~/.config/bobflow など）
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("bobflow"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// 設定ファイルを読み込み、環境変数を適用
///
/// 設定ファイル（<config_dir>/bobflow/config.yaml）が無ければデフォルト値を使います。
pub fn load_settings() -> Result<Settings> {
    let mut settings = match get_config_dir() {
        Ok(dir) if dir.join("config.yaml").is_file() => {
            let path = dir.join("config.yaml");
            tracing::debug!("Loading settings from {}", path.display());
            Settings::from_file(&path)?
        }
        _ => Settings::default(),
    };
    settings.apply_env()?;
    Ok(settings)
}

/// Bobfile を探す
///
/// 以下の優先順位で検索し、カレントディレクトリ相対のパスを返します:
/// 1. 環境変数 BOB_FILE（存在チェックはサニタイズ時に行う）
/// 2. カレントディレクトリ: Bobfile, Bobfile.kdl, bob.kdl
pub fn find_bobfile() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("BOB_FILE")
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &BOBFILE_CANDIDATES {
        if current_dir.join(filename).is_file() {
            return Ok(PathBuf::from(filename));
        }
    }

    Err(ConfigError::BobfileNotFound)
}
