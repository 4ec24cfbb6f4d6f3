//! モデル定義
//!
//! Bobfile から得られるビルド仕様のデータモデルを定義します。

mod build_spec;
mod command;

// Re-exports
pub use build_spec::*;
pub use command::*;
