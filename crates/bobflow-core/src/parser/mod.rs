//! KDLパーサー
//!
//! Bobfile（KDL形式）をパースして BuildSpecification を生成します。

mod container;

use container::{DockerOptions, parse_container, parse_docker_options};

use crate::error::{Result, SpecError};
use crate::model::{BuildSpecification, SubBuild};
use kdl::KdlDocument;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Bobfile をパースしてビルド仕様を生成
pub fn parse_bobfile<P: AsRef<Path>>(path: P) -> Result<BuildSpecification> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_bobfile_str(&content)
}

/// KDL文字列をパース
///
/// `docker` ノードはどこに書いても全コンテナに適用されます。
pub fn parse_bobfile_str(content: &str) -> Result<BuildSpecification> {
    let doc: KdlDocument = content.parse()?;

    let mut options = DockerOptions::default();
    for node in doc.nodes() {
        if node.name().value() == "docker" {
            options = parse_docker_options(node);
        }
    }

    let mut seen = HashSet::new();
    let mut sub_builds: Vec<SubBuild> = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "container" => {
                let sub_build = parse_container(node, &options)?;
                if !seen.insert(sub_build.name.clone()) {
                    return Err(SpecError::InvalidConfig(format!(
                        "container '{}' が重複しています",
                        sub_build.name
                    )));
                }
                sub_builds.push(sub_build);
            }
            "docker" => {}
            other => {
                tracing::debug!("Ignoring unknown node: {}", other);
            }
        }
    }

    BuildSpecification::new(sub_builds)
}
