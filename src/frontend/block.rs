//! 按行驱动的语法块识别。
//!
//! 第一阶段只按起始行模式与 `do`/`end` 配对切出每个语法单元的原始文本，
//! 不做语义分析；第二阶段由 [`ast`](super::ast) 中各节点的 `parse` 完成。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompileError, ParseError};
use crate::utils::Span;

use super::{scanner, source::SourceUnit};

static STATE_DO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^state\s+do$").unwrap());
static BLOOM_DO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^bloom\s+do$").unwrap());
static EVENTS_DO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s+do$").unwrap());
static SERVICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@\w+\s*:").unwrap());
static SCRATCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^scratch\s+\w+").unwrap());
static CHANNEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^channel\s+\w+").unwrap());
static MERGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+\s*<~\s*(merge|join)\(").unwrap());
static TRANSMISSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+\s*(<~|\.\s*\w+\s*\()").unwrap());
static TRIGGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+\s*<[+-]").unwrap());
static END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^end$").unwrap());

/// 语法种类
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    StateDo,
    BloomDo,
    EventsDo,
    Service,
    Scratch,
    Channel,
    Transmission,
    Trigger,
    Merge,
}

/// 顶层的候选语法
pub const TOP_LEVEL: &[SyntaxKind] = &[SyntaxKind::StateDo, SyntaxKind::BloomDo];

/// `state do` 内的候选语法
pub const STATE: &[SyntaxKind] = &[SyntaxKind::Service, SyntaxKind::Scratch, SyntaxKind::Channel];

/// `bloom do` 内的候选语法
pub const BLOOM: &[SyntaxKind] = &[
    SyntaxKind::Merge,
    SyntaxKind::Transmission,
    SyntaxKind::Trigger,
    SyntaxKind::EventsDo,
];

/// 事件块内的候选语法，事件块不能嵌套。
pub const EVENTS: &[SyntaxKind] = &[
    SyntaxKind::Merge,
    SyntaxKind::Transmission,
    SyntaxKind::Trigger,
];

impl SyntaxKind {
    /// 名称，用于错误信息。
    pub fn name(self) -> &'static str {
        match self {
            SyntaxKind::StateDo => "state do",
            SyntaxKind::BloomDo => "bloom do",
            SyntaxKind::EventsDo => "event block",
            SyntaxKind::Service => "service",
            SyntaxKind::Scratch => "scratch",
            SyntaxKind::Channel => "channel",
            SyntaxKind::Transmission => "transmission",
            SyntaxKind::Trigger => "trigger",
            SyntaxKind::Merge => "merge",
        }
    }

    /// 是否是以 `end` 结束的块。
    pub fn is_block(self) -> bool {
        matches!(
            self,
            SyntaxKind::StateDo | SyntaxKind::BloomDo | SyntaxKind::EventsDo
        )
    }

    /// 去除注释后的一行是否是本语法的起始行。
    pub fn start_line(self, line: &str) -> bool {
        let pattern = match self {
            SyntaxKind::StateDo => &STATE_DO,
            SyntaxKind::BloomDo => &BLOOM_DO,
            SyntaxKind::EventsDo => &EVENTS_DO,
            SyntaxKind::Service => &SERVICE,
            SyntaxKind::Scratch => &SCRATCH,
            SyntaxKind::Channel => &CHANNEL,
            SyntaxKind::Transmission => &TRANSMISSION,
            SyntaxKind::Trigger => &TRIGGER,
            SyntaxKind::Merge => &MERGE,
        };
        pattern.is_match(line)
    }
}

/// 已识别但尚未分析的语法单元。
#[derive(Debug, Clone, PartialEq)]
pub struct RawSyntax {
    kind: SyntaxKind,
    unit: SourceUnit,
}

impl RawSyntax {
    /// 语法种类
    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    /// 全部源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }

    /// 块的首行，对于单行语法即全部文本。
    pub fn header(&self) -> Result<SourceUnit, CompileError> {
        if self.kind.is_block() {
            self.unit.slice(0, 1)
        } else {
            Ok(self.unit.clone())
        }
    }

    /// 块的首行与 `end` 之间的内容。
    pub fn body(&self) -> Result<SourceUnit, CompileError> {
        let len = self.unit.lines().len();
        self.unit.slice(1, len.saturating_sub(1))
    }
}

/// 正在积累的语法单元
struct Open {
    kind: SyntaxKind,
    start: usize,
    lines: Vec<String>,
    /// 块的嵌套深度
    depth: usize,
    /// 单行语法积累的文本
    text: String,
}

impl Open {
    fn new(kind: SyntaxKind, start: usize, line: &str, stripped: &str) -> Self {
        Self {
            kind,
            start,
            lines: vec![line.to_string()],
            depth: 1,
            text: stripped.to_string(),
        }
    }

    /// 送入一行，返回语法是否已经结束。
    fn feed(&mut self, line: &str, stripped: &str) -> Result<bool, ParseError> {
        self.lines.push(line.to_string());
        if self.kind.is_block() {
            if END.is_match(stripped) {
                self.depth -= 1;
            } else if EVENTS_DO.is_match(stripped) {
                self.depth += 1;
            }
            Ok(self.depth == 0)
        } else {
            if !stripped.is_empty() {
                self.text.push(' ');
                self.text.push_str(stripped);
            }
            self.complete()
        }
    }

    fn complete(&self) -> Result<bool, ParseError> {
        if self.kind.is_block() {
            return Ok(false);
        }
        Ok(scanner::bracket_depth(&self.text)? == 0)
    }

    fn close(self) -> Result<RawSyntax, CompileError> {
        tracing::trace!(kind = self.kind.name(), line = self.start, "close syntax");
        Ok(RawSyntax {
            kind: self.kind,
            unit: SourceUnit::from_lines(self.lines, self.start)?,
        })
    }

    fn error(&self, reason: ParseError) -> CompileError {
        let end = self.start + self.lines.len().saturating_sub(1);
        CompileError::new(Span::new(self.start, end), self.lines.join("\n"), reason)
    }
}

/// 按 `candidates` 的顺序识别 `unit` 中的语法单元。
pub fn parse_lines(
    unit: &SourceUnit,
    candidates: &[SyntaxKind],
) -> Result<Vec<RawSyntax>, CompileError> {
    let mut nodes = Vec::new();
    let mut open: Option<Open> = None;

    for (number, line) in unit.numbered_lines() {
        let stripped = scanner::strip_comment(line)
            .map_err(|e| CompileError::new(Span::line(number), line.trim(), e))?;

        let done = match open.as_mut() {
            Some(node) => node.feed(line, &stripped).map_err(|e| node.error(e))?,
            None => {
                if stripped.is_empty() {
                    continue;
                }
                let kind = candidates
                    .iter()
                    .copied()
                    .find(|kind| kind.start_line(&stripped))
                    .ok_or_else(|| {
                        CompileError::new(Span::line(number), stripped.as_str(), ParseError::NoConstruct)
                    })?;
                tracing::trace!(kind = kind.name(), line = number, "open syntax");
                let node = Open::new(kind, number, line, &stripped);
                let done = node.complete().map_err(|e| node.error(e))?;
                open = Some(node);
                done
            }
        };

        if done {
            if let Some(node) = open.take() {
                nodes.push(node.close()?);
            }
        }
    }

    if let Some(node) = open {
        return Err(node.error(ParseError::MissingTerminator {
            construct: node.kind.name(),
            line: node.start,
        }));
    }
    Ok(nodes)
}
