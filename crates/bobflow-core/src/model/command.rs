//! コマンドライン定義

use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tera::{Context, Tera};

/// ビルドステップで発行された RunToken のテンプレート変数名
pub const RUN_TOKEN_VAR: &str = "run_token";

/// 解決済みアーティファクト ID のテンプレート変数名
pub const ARTIFACT_VAR: &str = "artifact";

/// バックエンドに渡すコマンドライン
///
/// 引数は Tera テンプレートとして扱われ、実行直前に
/// `{{ run_token }}` と `{{ artifact }}` が置換されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// 引数を追加（ビルダー形式）
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 変数を展開したコマンドラインを返す
    ///
    /// テンプレートを含まない引数はそのままコピーされます。
    pub fn render(&self, substitutions: &Substitutions) -> Result<CommandLine> {
        let args = self
            .args
            .iter()
            .map(|arg| substitutions.apply(arg))
            .collect::<Result<Vec<_>>>()?;

        Ok(CommandLine {
            program: self.program.clone(),
            args,
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// テンプレート変数の集合
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    context: Context,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key, value);
        self
    }

    fn apply(&self, template: &str) -> Result<String> {
        if !template.contains("{{") && !template.contains("{%") {
            return Ok(template.to_string());
        }

        Tera::one_off(template, &self.context, false)
            .map_err(|e| SpecError::Template(format!("{}: {}", template, e)))
    }
}
