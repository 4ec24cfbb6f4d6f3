//! bobflow core
//!
//! Bobfile のデータモデル、KDL パーサー、パスのサニタイズ、
//! ジョブ引数の検証を提供します。

pub mod error;
pub mod job;
pub mod model;
pub mod parser;
pub mod sanitize;

pub use error::*;
pub use job::JobSpec;
pub use model::*;
pub use parser::{parse_bobfile, parse_bobfile_str};
pub use sanitize::{sanitize, sanitize_in};
