//! A compiler for DSN descriptions.
//!
//! A DSN description declares a data-distribution overlay: the services to discover
//! (`state do`), the data paths between them together with their in-network processing,
//! and the triggers and events that switch paths on and off (`bloom do`). The compiler
//! turns the text into [`IntermediateCode`](backend::IntermediateCode), or reports the
//! first error with its line range.
//!
//! Compilation is a pure function of its input, so independent calls may run in parallel.

#![deny(missing_docs)]

pub mod backend;
pub mod error;
pub mod frontend;
pub mod options;
pub mod runtime;
mod utils;

pub use utils::Span;

use anyhow::Result;
use backend::{IntermediateBuilder, IntermediateCode};
use error::CompileError;
use options::Options;

/// 编译器上下文
#[derive(Default)]
pub struct Context {
    options: Options,
}

impl Context {
    /// 创建一个新的编译器上下文。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置编译选项。
    pub fn set_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// 编译选项。
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// 编译源代码。
    pub fn compile(&self, source: &str) -> Result<IntermediateCode, CompileError> {
        tracing::debug!(overlay = %self.options.overlay, "compile start");
        let dsn = frontend::parse(source)?;
        let code = IntermediateBuilder::build_code(&self.options.overlay, &dsn);
        tracing::debug!(
            overlay = %code.overlay,
            services = code.services.len(),
            service_links = code.service_links.len(),
            events = code.events.len(),
            "compile finish"
        );
        Ok(code)
    }

    /// 将中间代码以 JSON 输出到流。
    pub fn write(&self, code: &IntermediateCode, mut output: impl std::io::Write) -> Result<()> {
        if self.options.pretty {
            serde_json::to_writer_pretty(&mut output, code)?;
        } else {
            serde_json::to_writer(&mut output, code)?;
        }
        writeln!(output)?;
        Ok(())
    }
}

/// 以 `overlay` 为名编译 DSN 描述。
pub fn compile(overlay: &str, source: &str) -> Result<IntermediateCode, CompileError> {
    Context::new()
        .set_options(Options {
            overlay: overlay.to_string(),
            ..Default::default()
        })
        .compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_honours_pretty() {
        let code = compile("o", "state do\nend\nbloom do\nend").unwrap();

        let mut compact = Vec::new();
        Context::new().write(&code, &mut compact).unwrap();
        let compact = String::from_utf8(compact).unwrap();
        assert_eq!(compact.lines().count(), 1);

        let mut pretty = Vec::new();
        Context::new()
            .set_options(Options {
                pretty: true,
                ..Default::default()
            })
            .write(&code, &mut pretty)
            .unwrap();
        let pretty = String::from_utf8(pretty).unwrap();
        assert!(pretty.lines().count() > 1);

        let parsed: IntermediateCode = serde_json::from_str(&pretty).unwrap();
        assert_eq!(parsed, code);
    }
}
