//! 源代码单元。

use crate::{
    error::{CompileError, ParseError},
    utils::Span,
};

use super::scanner;

/// 一段带行号的源代码。
///
/// 保存原始的多行文本、行范围，以及去除注释与空白后拼接成的单行形式。
/// 所有匹配与切分都作用于单行形式。
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    lines: Vec<String>,
    span: Span,
    text: String,
}

impl SourceUnit {
    /// 从整段文本创建，`offset` 为第一行之前的行数。
    pub fn new(text: &str, offset: usize) -> Result<Self, CompileError> {
        let lines = text.lines().map(str::to_string).collect();
        Self::from_lines(lines, offset + 1)
    }

    /// 从若干行创建，`first_line` 为第一行的行号。
    pub fn from_lines(lines: Vec<String>, first_line: usize) -> Result<Self, CompileError> {
        let mut stripped = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let line = scanner::strip_comment(line)
                .map_err(|e| CompileError::new(Span::line(first_line + i), line.trim(), e))?;
            if !line.is_empty() {
                stripped.push(line);
            }
        }

        let span = Span::new(first_line, first_line + lines.len().saturating_sub(1));
        Ok(Self {
            lines,
            span,
            text: stripped.join(" "),
        })
    }

    /// 同一位置上的一段子文本，例如方法调用的某个参数。
    pub fn fragment(&self, text: impl AsRef<str>) -> Self {
        Self {
            lines: self.lines.clone(),
            span: self.span,
            text: text.as_ref().trim().to_string(),
        }
    }

    /// 单行形式。
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 原始行。
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 行范围。
    pub fn span(&self) -> Span {
        self.span
    }

    /// 原始文本。
    pub fn source(&self) -> String {
        self.lines.join("\n")
    }

    /// 带行号的原始行。
    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        let start = self.span.start;
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, line)| (start + i, line.as_str()))
    }

    /// 第 `from..to` 行（下标从 0 开始）组成的新单元。
    pub fn slice(&self, from: usize, to: usize) -> Result<Self, CompileError> {
        let to = to.min(self.lines.len());
        let from = from.min(to);
        Self::from_lines(self.lines[from..to].to_vec(), self.span.start + from)
    }

    /// 将内部错误限定到本单元。
    pub fn error(&self, reason: ParseError) -> CompileError {
        CompileError::new(self.span, self.source(), reason)
    }
}
