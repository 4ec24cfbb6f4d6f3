//! ビルドコンテキストの組み立て
//!
//! FileSetMetadata からファイル集合を計算し、ソースルートから作業ディレクトリへコピーします。

use crate::error::{BuildError, BuildResult};
use bobflow_core::{CANONICAL_DOCKERFILE, FileSetMetadata};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ContextAssembler;

impl ContextAssembler {
    /// コピー対象のファイル集合を計算
    ///
    /// 1. included が空ならソースルート直下の全エントリ（再帰しない）
    /// 2. excluded を除外
    /// 3. 正規名の Dockerfile を除外し、指定された dockerfile を追加
    pub fn file_set(
        metadata: &FileSetMetadata,
        source_root: &Path,
    ) -> BuildResult<BTreeSet<PathBuf>> {
        let mut files: BTreeSet<PathBuf> = if metadata.included.is_empty() {
            fs::read_dir(source_root)?
                .map(|entry| entry.map(|e| PathBuf::from(e.file_name())))
                .collect::<Result<_, _>>()?
        } else {
            metadata.included.clone()
        };

        for excluded in &metadata.excluded {
            files.remove(excluded);
        }

        // 正規名の Dockerfile は宣言された dockerfile で置き換える
        files.remove(Path::new(CANONICAL_DOCKERFILE));
        files.insert(metadata.dockerfile.clone());

        Ok(files)
    }

    /// ファイル集合を作業ディレクトリにコピー
    ///
    /// 作業ディレクトリは事前にクリーンされている前提です。
    /// 失敗時のコピー途中のファイルはそのまま残ります。
    pub fn assemble(
        metadata: &FileSetMetadata,
        source_root: &Path,
        workdir: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        tracing::debug!(
            "Assembling build context from {} into {}",
            source_root.display(),
            workdir.display()
        );

        let files = Self::file_set(metadata, source_root)?;
        reject_workdir_in_candidates(&files, source_root, workdir)?;
        let mut copied = Vec::with_capacity(files.len());

        for file in &files {
            let src = source_root.join(file);
            let is_dockerfile = *file == metadata.dockerfile;
            let dest_name = if is_dockerfile {
                PathBuf::from(CANONICAL_DOCKERFILE)
            } else {
                file.clone()
            };
            let dest = workdir.join(&dest_name);

            let file_type = match fs::symlink_metadata(&src) {
                Ok(meta) => meta.file_type(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(if is_dockerfile {
                        BuildError::DockerfileNotFound(src)
                    } else {
                        BuildError::MissingFile(src)
                    });
                }
                Err(e) => return Err(e.into()),
            };

            if file_type.is_symlink() {
                return Err(BuildError::SymlinkRejected(src));
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }

            if file_type.is_dir() {
                copy_dir(&src, &dest, file, &metadata.excluded)?;
            } else {
                fs::copy(&src, &dest)?;
            }

            tracing::debug!("Copied {} -> {}", file.display(), dest_name.display());
            copied.push(dest_name);
        }

        Ok(copied)
    }
}

/// コピー対象のディレクトリが作業ディレクトリ自身を含む場合は拒否
///
/// 作業ディレクトリがソースルート配下にあっても、コピー対象に含まれなければ問題ありません。
fn reject_workdir_in_candidates(
    files: &BTreeSet<PathBuf>,
    source_root: &Path,
    workdir: &Path,
) -> BuildResult<()> {
    let (Ok(root), Ok(dir)) = (source_root.canonicalize(), workdir.canonicalize()) else {
        return Ok(());
    };
    if !dir.starts_with(&root) {
        return Ok(());
    }

    if dir == root || files.iter().any(|file| dir.starts_with(root.join(file))) {
        return Err(BuildError::WorkdirInsideContext {
            workdir: dir,
            source_root: root,
        });
    }
    Ok(())
}

/// ディレクトリを再帰的にコピー
///
/// `relative` はソースルートからの相対パスで、`excluded` に一致する子孫はコピーしません。
/// ネストしたシンボリックリンクは警告を出してスキップします。
fn copy_dir(
    src: &Path,
    dest: &Path,
    relative: &Path,
    excluded: &BTreeSet<PathBuf>,
) -> BuildResult<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let nested = relative.join(entry.file_name());

        if excluded.contains(&nested) {
            tracing::debug!("Excluded {}", nested.display());
        } else if file_type.is_symlink() {
            tracing::warn!("Skipping symlink in build context: {}", from.display());
        } else if file_type.is_dir() {
            copy_dir(&from, &to, &nested, excluded)?;
        } else {
            // fs::copy はパーミッションビットも複製する
            fs::copy(&from, &to)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    fn metadata(included: &[&str], excluded: &[&str], dockerfile: &str) -> FileSetMetadata {
        FileSetMetadata {
            included: names(included),
            excluded: names(excluded),
            dockerfile: PathBuf::from(dockerfile),
        }
    }

    fn list(dir: &Path) -> Vec<String> {
        let mut entries: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_empty_included_uses_shallow_listing() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::write(source.path().join("app.py"), "print('hi')").unwrap();
        fs::write(source.path().join("README.md"), "# readme").unwrap();
        fs::write(source.path().join("Dockerfile.prod"), "FROM python:3").unwrap();

        let meta = metadata(&[], &["README.md"], "Dockerfile.prod");
        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        assert_eq!(list(workdir.path()), vec!["Dockerfile", "app.py"]);
        assert_eq!(
            fs::read_to_string(workdir.path().join("Dockerfile")).unwrap(),
            "FROM python:3"
        );
    }

    #[test]
    fn test_included_minus_excluded() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        for name in ["a", "b", "c", "d", "Dockerfile"] {
            fs::write(source.path().join(name), name).unwrap();
        }

        let meta = metadata(&["a", "b", "c"], &["b"], "Dockerfile");
        let files = ContextAssembler::file_set(&meta, source.path()).unwrap();
        assert_eq!(files, names(&["a", "c", "Dockerfile"]));

        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();
        assert_eq!(list(workdir.path()), vec!["Dockerfile", "a", "c"]);
    }

    #[test]
    fn test_stray_dockerfile_is_replaced_by_declared_one() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::write(source.path().join("Dockerfile"), "FROM stray").unwrap();
        fs::write(source.path().join("Dockerfile.prod"), "FROM declared").unwrap();

        let meta = metadata(&[], &[], "Dockerfile.prod");
        let files = ContextAssembler::file_set(&meta, source.path()).unwrap();
        assert_eq!(files, names(&["Dockerfile.prod"]));

        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();
        assert_eq!(list(workdir.path()), vec!["Dockerfile"]);
        assert_eq!(
            fs::read_to_string(workdir.path().join("Dockerfile")).unwrap(),
            "FROM declared"
        );
    }

    #[test]
    fn test_dockerfile_cannot_be_excluded() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("Dockerfile.prod"), "FROM alpine").unwrap();

        let meta = metadata(&[], &["Dockerfile.prod"], "Dockerfile.prod");
        let files = ContextAssembler::file_set(&meta, source.path()).unwrap();
        assert!(files.contains(Path::new("Dockerfile.prod")));
    }

    #[test]
    fn test_directories_are_copied_recursively() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::create_dir_all(source.path().join("lib/nested")).unwrap();
        fs::write(source.path().join("lib/mod.py"), "x = 1").unwrap();
        fs::write(source.path().join("lib/nested/deep.py"), "y = 2").unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();

        let meta = metadata(&["lib"], &[], "Dockerfile");
        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        assert_eq!(
            fs::read_to_string(workdir.path().join("lib/nested/deep.py")).unwrap(),
            "y = 2"
        );
        assert!(workdir.path().join("lib/mod.py").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        let script = source.path().join("entrypoint.sh");
        fs::write(&script, "#!/bin/sh\necho hi").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir(source.path().join("bin")).unwrap();
        let nested = source.path().join("bin/run");
        fs::write(&nested, "#!/bin/sh").unwrap();
        fs::set_permissions(&nested, fs::Permissions::from_mode(0o750)).unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();

        let meta = metadata(&[], &[], "Dockerfile");
        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        let mode = fs::metadata(workdir.path().join("entrypoint.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);

        let mode = fs::metadata(workdir.path().join("bin/run"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn test_missing_dockerfile() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();
        fs::write(source.path().join("app.py"), "").unwrap();

        let meta = metadata(&[], &[], "Dockerfile.prod");
        let result = ContextAssembler::assemble(&meta, source.path(), workdir.path());
        assert!(matches!(result, Err(BuildError::DockerfileNotFound(p)) if p.ends_with("Dockerfile.prod")));
    }

    #[test]
    fn test_missing_included_file() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();

        let meta = metadata(&["ghost.txt"], &[], "Dockerfile");
        let result = ContextAssembler::assemble(&meta, source.path(), workdir.path());
        assert!(matches!(result, Err(BuildError::MissingFile(p)) if p.ends_with("ghost.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_top_level_symlink_is_rejected() {
        let source = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::write(outside.path().join("secret"), "token").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), source.path().join("secret"))
            .unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();

        let meta = metadata(&[], &[], "Dockerfile");
        let result = ContextAssembler::assemble(&meta, source.path(), workdir.path());
        assert!(matches!(result, Err(BuildError::SymlinkRejected(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_nested_symlink_is_skipped() {
        let source = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::write(outside.path().join("secret"), "token").unwrap();
        fs::create_dir(source.path().join("lib")).unwrap();
        fs::write(source.path().join("lib/ok.txt"), "ok").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), source.path().join("lib/link"))
            .unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();

        let meta = metadata(&["lib"], &[], "Dockerfile");
        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        assert!(workdir.path().join("lib/ok.txt").exists());
        assert!(!workdir.path().join("lib/link").exists());
    }

    #[test]
    fn test_nested_excluded_entry_is_skipped() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::create_dir_all(source.path().join("config/env")).unwrap();
        fs::write(source.path().join("config/app.yml"), "port: 80").unwrap();
        fs::write(source.path().join("config/secrets.yml"), "token: x").unwrap();
        fs::write(source.path().join("config/env/prod.yml"), "debug: false").unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();

        let meta = metadata(&[], &["config/secrets.yml", "config/env"], "Dockerfile");
        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        assert_eq!(list(&workdir.path().join("config")), vec!["app.yml"]);
    }

    #[test]
    fn test_nested_excluded_entry_under_included_dir() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::create_dir_all(source.path().join("config")).unwrap();
        fs::write(source.path().join("config/app.yml"), "port: 80").unwrap();
        fs::write(source.path().join("config/secrets.yml"), "token: x").unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();

        let meta = metadata(&["config"], &["config/secrets.yml"], "Dockerfile");
        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        assert!(workdir.path().join("config/app.yml").is_file());
        assert!(!workdir.path().join("config/secrets.yml").exists());
    }

    #[test]
    fn test_nested_dockerfile_lands_at_root() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();

        fs::create_dir_all(source.path().join("docker")).unwrap();
        fs::write(source.path().join("docker/Dockerfile.prod"), "FROM declared").unwrap();
        fs::write(source.path().join("docker/entrypoint.sh"), "#!/bin/sh").unwrap();
        fs::write(source.path().join("app.py"), "").unwrap();

        let meta = metadata(&[], &[], "docker/Dockerfile.prod");
        let copied = ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        assert!(copied.contains(&PathBuf::from("Dockerfile")));
        assert_eq!(list(workdir.path()), vec!["Dockerfile", "app.py", "docker"]);
        assert_eq!(
            fs::read_to_string(workdir.path().join("Dockerfile")).unwrap(),
            "FROM declared"
        );
        assert!(workdir.path().join("docker/entrypoint.sh").is_file());
    }

    #[test]
    fn test_workdir_inside_copied_dir_is_rejected() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();
        fs::write(source.path().join("app.py"), "").unwrap();
        let workdir = source.path().join(".work/bob-run");
        fs::create_dir_all(&workdir).unwrap();

        let meta = metadata(&[], &[], "Dockerfile");
        let result = ContextAssembler::assemble(&meta, source.path(), &workdir);
        assert!(matches!(result, Err(BuildError::WorkdirInsideContext { .. })));
        assert!(!workdir.join(".work").exists());
    }

    #[test]
    fn test_workdir_inside_source_but_not_copied() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("Dockerfile"), "FROM alpine").unwrap();
        fs::write(source.path().join("app.py"), "").unwrap();
        let workdir = source.path().join(".work/bob-run");
        fs::create_dir_all(&workdir).unwrap();

        let meta = metadata(&["app.py"], &[], "Dockerfile");
        ContextAssembler::assemble(&meta, source.path(), &workdir).unwrap();
        assert_eq!(list(&workdir), vec!["Dockerfile", "app.py"]);
    }

    #[test]
    fn test_source_root_is_not_modified() {
        let source = tempdir().unwrap();
        let workdir = tempdir().unwrap();
        fs::write(source.path().join("app.py"), "").unwrap();
        fs::write(source.path().join("Dockerfile.prod"), "FROM alpine").unwrap();

        let before = list(source.path());
        let meta = metadata(&[], &[], "Dockerfile.prod");
        ContextAssembler::assemble(&meta, source.path(), workdir.path()).unwrap();

        assert_eq!(list(source.path()), before);
    }
}
