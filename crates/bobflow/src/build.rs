use bobflow_build::{
    ConsoleReporter, DEFAULT_LABEL_KEY, DockerBackend, Orchestrator, OrchestratorConfig,
};
use bobflow_core::BuildSpecification;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Bobfile のパスを決定してサニタイズ
///
/// 明示指定が無ければ bobflow_config::find_bobfile で検出します。
fn resolve_bobfile(file: Option<&str>) -> anyhow::Result<PathBuf> {
    let candidate = match file {
        Some(file) => PathBuf::from(file),
        None => bobflow_config::find_bobfile()?,
    };
    let path = bobflow_core::sanitize(&candidate.to_string_lossy())?;
    tracing::debug!(bobfile = %path.display(), "Resolved Bobfile");
    Ok(path)
}

fn load_spec(file: Option<&str>) -> anyhow::Result<(PathBuf, BuildSpecification)> {
    let bobfile = resolve_bobfile(file)?;
    let spec = bobflow_core::parse_bobfile(&bobfile)?;
    Ok((bobfile, spec))
}

/// ソースルートは Bobfile のあるディレクトリ
fn source_root(bobfile: &Path) -> PathBuf {
    bobfile
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub async fn handle_build_command(file: Option<&str>, skip_push: bool) -> anyhow::Result<()> {
    let (bobfile, spec) = load_spec(file)?;
    let settings = bobflow_config::load_settings()?;

    let config = OrchestratorConfig {
        skip_push: skip_push || settings.skip_push,
        label_key: settings
            .label_key
            .unwrap_or_else(|| DEFAULT_LABEL_KEY.to_string()),
        workdir_parent: settings.workdir_parent,
    };

    if spec.is_empty() {
        println!(
            "{}",
            format!("⚠ {} にコンテナが定義されていません", bobfile.display()).yellow()
        );
        return Ok(());
    }

    let backend = match DockerBackend::connect() {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e.user_message());
            std::process::exit(1);
        }
    };

    let orchestrator = Orchestrator::with_reporter(backend, config, ConsoleReporter::new());
    if orchestrator.run(&spec, &source_root(&bobfile)).await.is_err() {
        // エラー内容は ConsoleReporter が表示済み
        std::process::exit(1);
    }

    Ok(())
}

pub fn handle_lint_command(file: Option<&str>) -> anyhow::Result<()> {
    let (bobfile, spec) = load_spec(file)?;

    println!(
        "{} {}",
        "✓ Bobfile は有効です:".green().bold(),
        bobfile.display()
    );
    println!("  コンテナ数: {}", spec.len());

    for (index, sub_build) in spec.sub_builds().iter().enumerate() {
        println!();
        println!("{} {}", format!("#{}", index).dimmed(), sub_build.name.cyan().bold());
        println!("  dockerfile: {}", sub_build.metadata.dockerfile.display());
        if !sub_build.metadata.included.is_empty() {
            let included: Vec<String> = sub_build
                .metadata
                .included
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            println!("  included:   {}", included.join(", "));
        }
        if !sub_build.metadata.excluded.is_empty() {
            let excluded: Vec<String> = sub_build
                .metadata
                .excluded
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            println!("  excluded:   {}", excluded.join(", "));
        }
        println!("  build: {}", sub_build.build_command);
        for command in &sub_build.tag_commands {
            println!("  tag:   {}", command);
        }
        for command in &sub_build.push_commands {
            println!("  push:  {}", command);
        }
    }

    Ok(())
}
