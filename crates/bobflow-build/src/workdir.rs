//! 作業ディレクトリ
//!
//! 1回のパイプライン実行につき1つ作成され、SubBuild ごとにクリーンされて再利用されます。
//! ドロップ時に削除されるため、成功・失敗にかかわらず後始末されます。

use crate::error::BuildResult;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORKDIR_PREFIX: &str = "bob-";

pub struct Workdir {
    dir: TempDir,
}

impl Workdir {
    /// 一時ディレクトリに作業ディレクトリを作成
    ///
    /// `parent` が None の場合はシステムの一時ディレクトリを使用します。
    pub fn create(parent: Option<&Path>) -> BuildResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);

        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        tracing::debug!("Created workdir: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// rm -rf と mkdir -p 相当（冪等）
    pub fn clean(&self) -> BuildResult<()> {
        let path = self.dir.path();
        match fs::remove_dir_all(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(path)?;
        Ok(())
    }

    /// 作業ディレクトリ直下のエントリ一覧（ソート済み）
    pub fn entries(&self) -> BuildResult<Vec<PathBuf>> {
        let mut entries = fs::read_dir(self.path())?
            .map(|entry| entry.map(|e| PathBuf::from(e.file_name())))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        Ok(entries)
    }
}

impl Drop for Workdir {
    fn drop(&mut self) {
        tracing::debug!("Removing workdir: {}", self.dir.path().display());
    }
}
