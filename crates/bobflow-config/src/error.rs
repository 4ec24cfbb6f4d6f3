use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "Bobfile が見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: Bobfile, Bobfile.kdl, bob.kdl\n\
        または BOB_FILE 環境変数で直接指定できます"
    )]
    BobfileNotFound,

    #[error("設定ファイルの読み込みに失敗しました: {path}\n理由: {source}")]
    InvalidSettings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("環境変数 {name} の値が不正です: {value}")]
    InvalidEnv { name: String, value: String },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
