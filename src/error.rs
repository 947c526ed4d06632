//! 编译错误。
//!
//! 错误分为两层：扫描器、方法调用与条件语法等底层组件只产生不带位置信息的
//! [`ParseError`]；每个语法单元的语义分析入口将其包装为带行号和源代码片段的
//! [`CompileError`]，这也是 [`compile`](crate::compile) 唯一会返回的错误类型。

use annotate_snippets::{
    display_list::{DisplayList, FormatOptions},
    snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation},
};
use thiserror::Error;

use crate::utils::Span;

/// 内部错误，不带位置信息。
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unterminated string literal")]
    UnterminatedQuote,

    #[error("escaped quote `\\\"` is only allowed inside a string literal")]
    EscapedQuoteOutsideString,

    #[error("unmatched closing bracket `{0}`")]
    UnmatchedClosing(char),

    #[error("missing closing bracket `{0}`")]
    UnmatchedOpening(char),

    #[error("line matches no known construct")]
    NoConstruct,

    #[error("missing `end` for {construct} started at line {line}")]
    MissingTerminator {
        construct: &'static str,
        line: usize,
    },

    #[error("`{block}` must be defined exactly once, found {count}")]
    Cardinality { block: &'static str, count: usize },

    #[error("expected `{expected}`")]
    MethodFormat { expected: &'static str },

    #[error("`{method}` takes {expected} argument(s) but {found} were given, expected `{usage}`")]
    ArgumentCount {
        method: &'static str,
        usage: &'static str,
        expected: String,
        found: usize,
    },

    #[error("{position} argument `{text}` of `{method}` must be {allowed}")]
    ArgumentType {
        method: &'static str,
        position: String,
        text: String,
        allowed: String,
    },

    #[error("invalid time literal `{0}`, expected `YYYYMMDDTHHMMSS`")]
    TimeLiteral(String),

    #[error("time unit must be one of day, hour, minute, second, found `{0}`")]
    TimeUnit(String),

    #[error("time start `{start}` is later than end `{end}`")]
    TimeOrder { start: String, end: String },

    #[error("{what} must be greater than 0, found {value}")]
    NotPositive { what: &'static str, value: String },

    #[error("{what} must be within [{min}, {max}], found {value}")]
    SpaceRange {
        what: &'static str,
        min: i32,
        max: i32,
        value: String,
    },

    #[error("{low} must not be greater than {high}")]
    SpaceOrder {
        low: &'static str,
        high: &'static str,
    },

    #[error("cull value must satisfy 0 < numerator <= denominator, found {numerator}/{denominator}")]
    CullValue { numerator: i64, denominator: i64 },

    #[error("range bounds `{min}` and `{max}` must have the same type")]
    RangeType { min: String, max: String },

    #[error("range minimum `{min}` is greater than maximum `{max}`")]
    RangeOrder { min: String, max: String },

    #[error("invalid regular expression `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("invalid literal `{0}`")]
    InvalidLiteral(String),

    #[error("`{0}` is not a valid name")]
    InvalidName(String),

    #[error("`{0}` is a reserved word")]
    ReservedWord(String),

    #[error("invalid attribute `{0}`, expected `key=value`")]
    InvalidAttribute(String),

    #[error("`{0}` is not a condition")]
    NoCondition(String),

    #[error("malformed condition map: {0}")]
    MalformedCondition(String),

    #[error("trigger condition must be a single comparison on `count`, found `{0}`")]
    TriggerCondition(String),

    #[error("`{0}` is defined more than once")]
    DuplicateDefinition(String),

    #[error("`{0}` may appear at most once")]
    DuplicateModifier(&'static str),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("service `{0}` is undefined")]
    UndefinedService(String),

    #[error("scratch `{0}` is undefined")]
    UndefinedScratch(String),

    #[error("channel `{0}` is undefined")]
    UndefinedChannel(String),

    #[error("event `{0}` is undefined")]
    UndefinedEvent(String),

    #[error("{0}")]
    Invalid(String),
}

/// 编译错误，携带出错语法单元的行范围与源代码。
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {span}: {reason}")]
pub struct CompileError {
    span: Span,
    text: String,
    #[source]
    reason: ParseError,
}

impl CompileError {
    /// 创建编译错误，并以 error 级别记录日志。
    pub fn new(span: Span, text: impl Into<String>, reason: ParseError) -> Self {
        let text = text.into();
        tracing::error!(line = %span, source = %text, "{}", reason);
        Self { span, text, reason }
    }

    /// 出错的行范围。
    pub fn span(&self) -> Span {
        self.span
    }

    /// 出错语法单元的源代码。
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 错误原因。
    pub fn reason(&self) -> &ParseError {
        &self.reason
    }

    /// 生成带源代码标注的错误信息。
    pub fn to_snippet(&self, origin: Option<&str>, color: bool) -> String {
        let message = self.reason.to_string();
        let slices = if self.text.is_empty() {
            vec![]
        } else {
            vec![Slice {
                source: &self.text,
                line_start: self.span.start,
                origin,
                annotations: vec![SourceAnnotation {
                    range: (0, self.text.chars().count()),
                    label: &message,
                    annotation_type: AnnotationType::Error,
                }],
                fold: false,
            }]
        };

        let snippet = Snippet {
            title: Some(Annotation {
                id: None,
                label: Some(if slices.is_empty() {
                    message.as_str()
                } else {
                    "compile error"
                }),
                annotation_type: AnnotationType::Error,
            }),
            footer: vec![],
            slices,
            opt: FormatOptions {
                color,
                ..Default::default()
            },
        };

        DisplayList::from(snippet).to_string()
    }
}
