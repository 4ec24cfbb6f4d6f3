use std::path::PathBuf;
use thiserror::Error;

/// Bobfile パスのサニタイズエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("Bobfile のパスに .. を含めることはできません: {0}")]
    PathTraversal(String),

    #[error("Bobfile のパスが無効です: {0}")]
    InvalidPath(String),

    #[error("Bobfile のパスにシンボリックリンクを含めることはできません: {0}")]
    Symlink(PathBuf),
}

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("入力検証エラー: {0}")]
    Validation(String),

    #[error("テンプレート展開エラー: {0}")]
    Template(String),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
}

pub type Result<T> = std::result::Result<T, SpecError>;
