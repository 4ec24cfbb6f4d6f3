//! Bobfile パスのサニタイズ
//!
//! Webhook やCLIから渡されたパスを開く前に検証し、正規化された絶対パスを返します。

use crate::error::SanitizeError;
use std::path::{Component, Path, PathBuf};

/// カレントディレクトリを基準に Bobfile パスをサニタイズ
pub fn sanitize(path: &str) -> Result<PathBuf, SanitizeError> {
    // .. の検査はファイルシステムに触れる前に行う
    reject_traversal(path)?;

    let root = std::env::current_dir().map_err(|e| SanitizeError::InvalidPath(e.to_string()))?;
    sanitize_in(&root, path)
}

/// 指定したルートを基準に Bobfile パスをサニタイズ
///
/// チェック順序:
/// 1. `..` を含むパスは拒否
/// 2. ルート配下の絶対パスへ解決（先頭の `/` もルート相対として扱う）
/// 3. シンボリックリンクを解決し、解決前と異なれば拒否
/// 4. 正規化した絶対パスを返す
pub fn sanitize_in(root: &Path, path: &str) -> Result<PathBuf, SanitizeError> {
    reject_traversal(path)?;

    let root = root
        .canonicalize()
        .map_err(|_| SanitizeError::InvalidPath(root.display().to_string()))?;

    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        return Err(SanitizeError::InvalidPath(path.to_string()));
    }

    let absolute = normalize(&root.join(relative));

    let resolved = absolute
        .canonicalize()
        .map_err(|_| SanitizeError::InvalidPath(path.to_string()))?;

    if resolved != absolute {
        return Err(SanitizeError::Symlink(absolute));
    }

    Ok(absolute)
}

fn reject_traversal(path: &str) -> Result<(), SanitizeError> {
    if path.contains("..") {
        return Err(SanitizeError::PathTraversal(path.to_string()));
    }
    Ok(())
}

/// `.` と重複した区切り文字を取り除く（字句的な正規化のみ）
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
