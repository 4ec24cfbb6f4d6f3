//! 進捗通知
//!
//! Orchestrator は状態遷移を Reporter に通知します。
//! CLI では ConsoleReporter、テストや組み込み用途では NoopReporter を使います。

use crate::error::RunError;
use crate::orchestrator::{RunState, RunSummary};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

pub trait Reporter {
    fn run_started(&self, _total: usize) {}

    fn state_changed(&self, _index: usize, _name: &str, _state: RunState) {}

    fn run_finished(&self, _result: Result<&RunSummary, &RunError>) {}
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn run_started(&self, total: usize) {
        (**self).run_started(total)
    }

    fn state_changed(&self, index: usize, name: &str, state: RunState) {
        (**self).state_changed(index, name, state)
    }

    fn run_finished(&self, result: Result<&RunSummary, &RunError>) {
        (**self).run_finished(result)
    }
}

/// 何もしない Reporter
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// スピナーとカラー出力で進捗を表示
pub struct ConsoleReporter {
    progress_bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            progress_bar: Mutex::new(None),
        }
    }

    fn spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb.set_message(message);
        pb
    }

    fn finish_current(&self, message: String) {
        if let Ok(mut guard) = self.progress_bar.lock()
            && let Some(pb) = guard.take()
        {
            pb.finish_with_message(message);
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn run_started(&self, total: usize) {
        println!(
            "{}",
            format!("ビルド対象コンテナ ({} 個)", total).bold()
        );
    }

    fn state_changed(&self, index: usize, name: &str, state: RunState) {
        match state {
            RunState::Cleaning => {
                println!();
                println!("{}", format!("🔨 {} をビルド中...", name).green().bold());
            }
            RunState::Idle => {
                self.finish_current(format!("{} {} 完了", "✓".green(), name));
            }
            RunState::Failed => {
                self.finish_current(format!("{} {} 失敗", "✗".red(), name));
            }
            state => {
                let message = format!("#{} {}: {}", index, name, state);
                if let Ok(mut guard) = self.progress_bar.lock() {
                    match guard.as_ref() {
                        Some(pb) => pb.set_message(message),
                        None => *guard = Some(Self::spinner(message)),
                    }
                }
            }
        }
    }

    fn run_finished(&self, result: Result<&RunSummary, &RunError>) {
        println!();
        match result {
            Ok(summary) => {
                println!("{}", "✓ すべてのビルドが完了しました".green().bold());
                for built in &summary.sub_builds {
                    println!("  • {} → {}", built.name.cyan(), built.artifact);
                }
            }
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e.user_message());
            }
        }
    }
}
