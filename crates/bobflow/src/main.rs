mod build;

use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser)]
#[command(name = "bob")]
#[command(about = "Bobfile から、同じイメージを何度でも。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bobfile のコンテナをビルドしてタグ付け・プッシュ
    Build {
        /// Bobfile のパス（省略時は自動検出）
        file: Option<String>,
        /// push をスキップ
        #[arg(long)]
        skip_push: bool,
    },
    /// Bobfile を検証してビルド計画を表示
    Lint {
        /// Bobfile のパス（省略時は自動検出）
        file: Option<String>,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrに出力（RUST_LOG 未指定時は info）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Build { file, skip_push } => {
            build::handle_build_command(file.as_deref(), skip_push).await?;
        }
        Commands::Lint { file } => {
            build::handle_lint_command(file.as_deref())?;
        }
        Commands::Version => {
            println!("{} {}", "bobflow".bold(), env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
