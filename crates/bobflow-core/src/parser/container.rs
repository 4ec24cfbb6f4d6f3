//! container ノードのパース

use crate::error::{Result, SpecError};
use crate::model::{CommandLine, FileSetMetadata, SubBuild};
use kdl::KdlNode;
use std::path::PathBuf;

/// docker ノードで指定する全体オプション
#[derive(Debug, Clone, Default)]
pub struct DockerOptions {
    pub build_opts: Vec<String>,
    pub tag_opts: Vec<String>,
}

/// docker ノードをパース
pub fn parse_docker_options(node: &KdlNode) -> DockerOptions {
    let mut options = DockerOptions::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "build_opts" => options.build_opts = string_args(child),
                "tag_opts" => options.tag_opts = string_args(child),
                _ => {}
            }
        }
    }

    options
}

/// container ノードをパースして SubBuild を生成
pub fn parse_container(node: &KdlNode, options: &DockerOptions) -> Result<SubBuild> {
    let name = first_string(node)
        .ok_or_else(|| SpecError::InvalidConfig("container requires a name".to_string()))?;

    let mut metadata = FileSetMetadata::default();
    let mut registry: Option<String> = None;
    let mut project: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut skip_push = false;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "dockerfile" => {
                    if let Some(path) = first_string(child) {
                        metadata.dockerfile = PathBuf::from(path);
                    }
                }
                "included" => {
                    metadata
                        .included
                        .extend(string_args(child).into_iter().map(PathBuf::from));
                }
                "excluded" => {
                    metadata
                        .excluded
                        .extend(string_args(child).into_iter().map(PathBuf::from));
                }
                "registry" => registry = first_string(child),
                "project" => project = first_string(child),
                "tags" => tags.extend(string_args(child)),
                "skip_push" => {
                    skip_push = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_bool())
                        .unwrap_or(true);
                }
                _ => {}
            }
        }
    }

    let project = project.unwrap_or_else(|| name.clone());
    let image = match registry.as_deref() {
        Some(reg) if !reg.is_empty() => format!("{}/{}", reg.trim_end_matches('/'), project),
        _ => project,
    };
    validate_image(&name, &image)?;
    for tag in &tags {
        validate_tag(&name, tag)?;
    }

    // tag は RunToken でビルドし、アーティファクト解決後に付け替える
    let build_command = CommandLine::new("docker")
        .arg("build")
        .arg("-t")
        .arg(format!("{}:{{{{ run_token }}}}", image))
        .args(options.build_opts.iter().cloned())
        .arg(".");

    let tag_commands = tags
        .iter()
        .map(|tag| {
            CommandLine::new("docker")
                .arg("tag")
                .args(options.tag_opts.iter().cloned())
                .arg("{{ artifact }}")
                .arg(format!("{}:{}", image, tag))
        })
        .collect();

    let push_commands = if skip_push {
        Vec::new()
    } else {
        tags.iter()
            .map(|tag| {
                CommandLine::new("docker")
                    .arg("push")
                    .arg(format!("{}:{}", image, tag))
            })
            .collect()
    };

    Ok(SubBuild {
        name,
        metadata,
        build_command,
        tag_commands,
        push_commands,
    })
}

/// イメージ名の検証
///
/// 先頭要素が `.` `:` を含むか `localhost` の場合はレジストリホストとして扱います。
/// それ以外の要素は小文字英数字を `.` `_` `-` で区切ったものに限ります。
fn validate_image(container: &str, image: &str) -> Result<()> {
    let invalid = || {
        SpecError::InvalidConfig(format!(
            "container '{}': 無効なイメージ名です: {}（小文字英数字と . _ - / のみ使用できます）",
            container, image
        ))
    };

    let mut components: Vec<&str> = image.split('/').collect();
    if components.len() > 1 {
        let host = components[0];
        if host.contains('.') || host.contains(':') || host == "localhost" {
            let valid_host = !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
            if !valid_host {
                return Err(invalid());
            }
            components.remove(0);
        }
    }

    if components.iter().all(|c| is_path_component(c)) {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn is_path_component(component: &str) -> bool {
    let is_lower_alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();

    !component.is_empty()
        && component.chars().all(|c| is_lower_alnum(c) || matches!(c, '.' | '_' | '-'))
        && component.starts_with(is_lower_alnum)
        && component.ends_with(is_lower_alnum)
}

/// タグの検証（128文字以内、英数字と `_` `.` `-`、先頭は英数字か `_`）
fn validate_tag(container: &str, tag: &str) -> Result<()> {
    let valid = !tag.is_empty()
        && tag.len() <= 128
        && tag.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid {
        Ok(())
    } else {
        Err(SpecError::InvalidConfig(format!(
            "container '{}': 無効なタグです: {}",
            container, tag
        )))
    }
}

fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// 名前なしの文字列引数をすべて取得
fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}
