//! 方法调用语法。
//!
//! 解析 `name(arg, arg, ...)` 形式的调用，检查参数个数，并按每个位置允许的类型依次尝试转换。

use std::fmt::Display;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{error::ParseError, utils::ordinal};

use super::{scanner, source::SourceUnit};

/// 保留字，不能用作服务、scratch、channel 与事件的名称。
pub const RESERVED_WORDS: &[&str] = &[
    "state",
    "bloom",
    "do",
    "end",
    "scratch",
    "channel",
    "discovery",
    "select",
    "meta",
    "qos",
    "id",
    "filter",
    "cull_time",
    "cull_space",
    "aggregate",
    "string",
    "virtual",
    "time",
    "space",
    "range",
    "like",
    "not",
    "merge",
    "join",
    "trigger",
    "count",
    "on",
    "off",
    "multi",
];

/// 时间字面量格式
pub const TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

static DATA_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+\.\d+$").unwrap());
static CALL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\(").unwrap());

/// 检查名称是否为合法且非保留字的数据名。
pub fn check_name(name: &str) -> Result<(), ParseError> {
    if !DATA_NAME.is_match(name) {
        return Err(ParseError::InvalidName(name.to_string()));
    }
    if RESERVED_WORDS.contains(&name) {
        return Err(ParseError::ReservedWord(name.to_string()));
    }
    Ok(())
}

/// 解析时间字面量，要求能够原样格式化回去。
pub fn parse_time_literal(text: &str) -> Option<NaiveDateTime> {
    let time = NaiveDateTime::parse_from_str(text, TIME_FORMAT).ok()?;
    (time.format(TIME_FORMAT).to_string() == text).then_some(time)
}

/// 字面量
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// 整数
    Integer(i64),
    /// 浮点数
    Float(f64),
    /// 字符串
    String(String),
}

impl Literal {
    /// 数值字面量的值。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Integer(n) => Some(*n as f64),
            Literal::Float(f) => Some(*f),
            Literal::String(_) => None,
        }
    }

    /// 是否与另一个字面量类型相同。
    pub fn same_type(&self, other: &Literal) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// 转换为 JSON 值。
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Integer(n) => Value::from(*n),
            Literal::Float(f) => Value::from(*f),
            Literal::String(s) => Value::from(s.as_str()),
        }
    }

    /// 从 JSON 值读取字面量。
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Literal::Integer)
                .or_else(|| n.as_f64().map(Literal::Float)),
            Value::String(s) => Some(Literal::String(s.clone())),
            _ => None,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// 数据名，`^\w+$`
    DataName,
    /// 整数
    Integer,
    /// 浮点数，必须带小数点
    Float,
    /// 双引号字符串
    String,
    /// 时间字面量字符串
    Time,
    /// 不做转换
    Untyped,
}

impl ArgType {
    fn describe(self) -> &'static str {
        match self {
            ArgType::DataName => "a data name",
            ArgType::Integer => "an integer",
            ArgType::Float => "a float",
            ArgType::String => "a string",
            ArgType::Time => "a time literal",
            ArgType::Untyped => "any expression",
        }
    }

    /// 尝试将参数转换为本类型。
    pub fn convert(self, unit: &SourceUnit) -> Option<Argument> {
        let text = unit.text();
        match self {
            ArgType::DataName => DATA_NAME
                .is_match(text)
                .then(|| Argument::DataName(text.to_string())),
            ArgType::Integer if INTEGER.is_match(text) => {
                text.parse().ok().map(Argument::Integer)
            }
            ArgType::Float if FLOAT.is_match(text) => text.parse().ok().map(Argument::Float),
            ArgType::Integer | ArgType::Float => None,
            ArgType::String => unquote(text).map(Argument::String),
            ArgType::Time => {
                let literal = unquote(text)?;
                parse_time_literal(&literal).map(|_| Argument::Time(literal))
            }
            ArgType::Untyped => Some(Argument::Untyped(unit.clone())),
        }
    }
}

/// 去掉字符串两侧的引号并还原 `\"`。
fn unquote(text: &str) -> Option<String> {
    match scanner::split_quotes(text).ok()?.as_slice() {
        [(s, true)] => Some(s[1..s.len() - 1].replace("\\\"", "\"")),
        _ => None,
    }
}

/// 转换后的参数
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// 数据名
    DataName(String),
    /// 整数
    Integer(i64),
    /// 浮点数
    Float(f64),
    /// 字符串，不含引号
    String(String),
    /// 时间字面量，不含引号
    Time(String),
    /// 未转换的参数
    Untyped(SourceUnit),
}

impl Argument {
    /// 数据名、字符串或时间字面量的文本。
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::DataName(s) | Argument::String(s) | Argument::Time(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 整数值。
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Argument::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// 未转换参数的源代码单元。
    pub fn as_unit(&self) -> Option<&SourceUnit> {
        match self {
            Argument::Untyped(unit) => Some(unit),
            _ => None,
        }
    }

    /// 数值或字符串参数对应的字面量。
    pub fn to_literal(&self) -> Option<Literal> {
        match self {
            Argument::Integer(n) => Some(Literal::Integer(*n)),
            Argument::Float(f) => Some(Literal::Float(*f)),
            Argument::String(s) | Argument::Time(s) => Some(Literal::String(s.clone())),
            _ => None,
        }
    }

    fn expect_str(&self) -> Result<String, ParseError> {
        self.as_str()
            .map(str::to_string)
            .ok_or_else(|| ParseError::Invalid(format!("unexpected argument {:?}", self)))
    }

    fn expect_literal(&self) -> Result<Literal, ParseError> {
        self.to_literal()
            .ok_or_else(|| ParseError::Invalid(format!("unexpected argument {:?}", self)))
    }
}

/// 取出字符串类参数。
pub(crate) fn take_str(args: &[Argument], index: usize) -> Result<String, ParseError> {
    args.get(index)
        .ok_or_else(|| ParseError::Invalid(format!("missing argument {}", index + 1)))?
        .expect_str()
}

/// 取出字面量参数。
pub(crate) fn take_literal(args: &[Argument], index: usize) -> Result<Literal, ParseError> {
    args.get(index)
        .ok_or_else(|| ParseError::Invalid(format!("missing argument {}", index + 1)))?
        .expect_literal()
}

/// 取出未转换参数。
pub(crate) fn take_unit(args: &[Argument], index: usize) -> Result<&SourceUnit, ParseError> {
    args.get(index)
        .and_then(Argument::as_unit)
        .ok_or_else(|| ParseError::Invalid(format!("missing argument {}", index + 1)))
}

/// 将参数解析为字面量：整数、浮点数或字符串。
pub fn parse_literal(unit: &SourceUnit) -> Result<Literal, ParseError> {
    [ArgType::Integer, ArgType::Float, ArgType::String]
        .into_iter()
        .find_map(|ty| ty.convert(unit))
        .and_then(|arg| arg.to_literal())
        .ok_or_else(|| ParseError::InvalidLiteral(unit.text().to_string()))
}

/// 方法种类
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Discovery,
    Select,
    Meta,
    Qos,
    Id,
    Filter,
    CullTime,
    CullSpace,
    Aggregate,
    String,
    Virtual,
    Time,
    Space,
    Range,
    Like,
    Merge,
    Join,
    Trigger,
}

impl MethodKind {
    /// 所有方法，按匹配优先级排列。
    pub const ALL: [MethodKind; 18] = [
        MethodKind::Discovery,
        MethodKind::Select,
        MethodKind::Meta,
        MethodKind::Qos,
        MethodKind::Id,
        MethodKind::Filter,
        MethodKind::CullTime,
        MethodKind::CullSpace,
        MethodKind::Aggregate,
        MethodKind::String,
        MethodKind::Virtual,
        MethodKind::Time,
        MethodKind::Space,
        MethodKind::Range,
        MethodKind::Like,
        MethodKind::Merge,
        MethodKind::Join,
        MethodKind::Trigger,
    ];

    /// 方法名
    pub fn name(self) -> &'static str {
        match self {
            MethodKind::Discovery => "discovery",
            MethodKind::Select => "select",
            MethodKind::Meta => "meta",
            MethodKind::Qos => "qos",
            MethodKind::Id => "id",
            MethodKind::Filter => "filter",
            MethodKind::CullTime => "cull_time",
            MethodKind::CullSpace => "cull_space",
            MethodKind::Aggregate => "aggregate",
            MethodKind::String => "string",
            MethodKind::Virtual => "virtual",
            MethodKind::Time => "time",
            MethodKind::Space => "space",
            MethodKind::Range => "range",
            MethodKind::Like => "like",
            MethodKind::Merge => "merge",
            MethodKind::Join => "join",
            MethodKind::Trigger => "trigger",
        }
    }

    /// 正确的调用形式，用于错误信息。
    pub fn usage(self) -> &'static str {
        match self {
            MethodKind::Discovery => "discovery(key=value, ...)",
            MethodKind::Select => "select(name, ...)",
            MethodKind::Meta => "meta(key=value, ...)",
            MethodKind::Qos => "qos(bandwidth, priority)",
            MethodKind::Id => "id(\"identifier\")",
            MethodKind::Filter => "filter(condition)",
            MethodKind::CullTime => "cull_time(numerator, denominator, time(...))",
            MethodKind::CullSpace => "cull_space(numerator, denominator, space(...))",
            MethodKind::Aggregate => "aggregate(name, \"function\", time(...), space(...))",
            MethodKind::String => "string(name, \"pattern\", \"replacement\")",
            MethodKind::Virtual => "virtual(name, \"expression\")",
            MethodKind::Time => "time(name, \"start\", \"end\", interval, \"unit\")",
            MethodKind::Space => {
                "space(lat, long, west, south, east, north, lat_interval, long_interval)"
            }
            MethodKind::Range => "range(name, min, max)",
            MethodKind::Like => "like(name, \"pattern\")",
            MethodKind::Merge => "merge(delay, channel, ...)",
            MethodKind::Join => "join(delay, channel, channel, ..., virtual(name, \"expression\"))",
            MethodKind::Trigger => "trigger(interval, count <sign> n, condition)",
        }
    }

    /// 按方法名查找。
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// 识别调用文本所调用的方法。
    pub fn of_call(text: &str) -> Option<Self> {
        CALL_NAME
            .captures(text)
            .and_then(|caps| Self::from_name(&caps[1]))
    }

    /// 文本是否是对本方法的调用（不检查参数）。
    pub fn matches(self, text: &str) -> bool {
        Self::of_call(text) == Some(self)
    }

    fn format_error(self) -> ParseError {
        ParseError::MethodFormat {
            expected: self.usage(),
        }
    }

    fn count_error(self, expected: impl Into<String>, found: usize) -> ParseError {
        ParseError::ArgumentCount {
            method: self.name(),
            usage: self.usage(),
            expected: expected.into(),
            found,
        }
    }
}

/// 检查调用形式并取出未转换的参数。
///
/// 用于可变参数的方法先确定参数个数，再以推导出的格式调用 [`parse`]。
pub fn arguments(unit: &SourceUnit, method: MethodKind) -> Result<Vec<SourceUnit>, ParseError> {
    let rest = unit
        .text()
        .strip_prefix(method.name())
        .ok_or_else(|| method.format_error())?;

    let segments = scanner::split_brackets(rest).map_err(|_| method.format_error())?;
    let inner = match segments.as_slice() {
        [(group, false)] if group.starts_with('(') && group.ends_with(')') => {
            &group[1..group.len() - 1]
        }
        _ => return Err(method.format_error()),
    };

    if inner.trim().is_empty() {
        return Ok(vec![]);
    }
    Ok(scanner::split(inner, ",", None)?
        .into_iter()
        .map(|arg| unit.fragment(arg))
        .collect())
}

/// 解析方法调用，`format` 的每一项是该位置可接受的类型，按顺序尝试。
pub fn parse(
    unit: &SourceUnit,
    method: MethodKind,
    format: &[&[ArgType]],
) -> Result<Vec<Argument>, ParseError> {
    let args = arguments(unit, method)?;
    if args.len() != format.len() {
        return Err(method.count_error(format.len().to_string(), args.len()));
    }
    convert(method, &args, format)
}

/// 按 `format` 转换已取出的参数。
pub fn convert(
    method: MethodKind,
    args: &[SourceUnit],
    format: &[&[ArgType]],
) -> Result<Vec<Argument>, ParseError> {
    args.iter()
        .zip(format)
        .enumerate()
        .map(|(i, (arg, types))| {
            types
                .iter()
                .find_map(|ty| ty.convert(arg))
                .ok_or_else(|| ParseError::ArgumentType {
                    method: method.name(),
                    position: ordinal(i + 1),
                    text: arg.text().to_string(),
                    allowed: types
                        .iter()
                        .map(|ty| ty.describe())
                        .collect::<Vec<_>>()
                        .join(" or "),
                })
        })
        .collect()
}

/// 检查可变参数方法的参数个数下限。
pub fn expect_at_least(
    method: MethodKind,
    args: &[SourceUnit],
    min: usize,
) -> Result<(), ParseError> {
    if args.len() < min {
        return Err(method.count_error(format!("at least {}", min), args.len()));
    }
    Ok(())
}

/// 检查可变参数方法的参数个数范围。
pub fn expect_between(
    method: MethodKind,
    args: &[SourceUnit],
    min: usize,
    max: usize,
) -> Result<(), ParseError> {
    if args.len() < min || args.len() > max {
        return Err(method.count_error(format!("{} to {}", min, max), args.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit::new(text, 0).unwrap()
    }

    const NUMBER: &[ArgType] = &[ArgType::Integer, ArgType::Float];

    #[test]
    fn raw_arguments() {
        let args = arguments(&unit(r#"merge(10, ch1, f(a, b), "x,y")"#), MethodKind::Merge)
            .unwrap();
        let texts: Vec<_> = args.iter().map(|a| a.text()).collect();
        assert_eq!(texts, vec!["10", "ch1", "f(a, b)", "\"x,y\""]);
        assert!(arguments(&unit("merge()"), MethodKind::Merge)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn shape_must_match_exactly() {
        for text in ["merge 10", "merges(1)", "merge(1)(2)", "merge(1) x", "join(1)"] {
            assert_eq!(
                arguments(&unit(text), MethodKind::Merge),
                Err(ParseError::MethodFormat {
                    expected: MethodKind::Merge.usage()
                }),
                "{}",
                text
            );
        }
    }

    #[test]
    fn typed_conversion() {
        let args = parse(
            &unit(r#"f(name, 3, 2.5, "s", "20200101T000000", g(x))"#),
            MethodKind::Filter,
            &[
                &[ArgType::DataName],
                NUMBER,
                NUMBER,
                &[ArgType::String],
                &[ArgType::Time],
                &[ArgType::Untyped],
            ],
        );
        // `f` is not the filter method
        assert!(matches!(args, Err(ParseError::MethodFormat { .. })));

        let args = parse(
            &unit(r#"time(name, 3, 2.5, "s", "20200101T000000", g(x))"#),
            MethodKind::Time,
            &[
                &[ArgType::DataName],
                NUMBER,
                NUMBER,
                &[ArgType::String],
                &[ArgType::Time],
                &[ArgType::Untyped],
            ],
        )
        .unwrap();
        assert_eq!(args[0], Argument::DataName("name".to_string()));
        assert_eq!(args[1], Argument::Integer(3));
        assert_eq!(args[2], Argument::Float(2.5));
        assert_eq!(args[3], Argument::String("s".to_string()));
        assert_eq!(args[4], Argument::Time("20200101T000000".to_string()));
        assert_eq!(args[5].as_unit().map(|u| u.text()), Some("g(x)"));
    }

    #[test]
    fn argument_count_mismatch() {
        let err = parse(&unit("qos(1)"), MethodKind::Qos, &[NUMBER, NUMBER]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::ArgumentCount { method: "qos", found: 1, .. }
        ));
    }

    #[test]
    fn argument_type_error_names_position_and_text() {
        let err = parse(&unit("qos(1, fast)"), MethodKind::Qos, &[NUMBER, NUMBER]).unwrap_err();
        assert_eq!(
            err,
            ParseError::ArgumentType {
                method: "qos",
                position: "2nd".to_string(),
                text: "fast".to_string(),
                allowed: "an integer or a float".to_string(),
            }
        );
    }

    #[test]
    fn exponent_notation_is_rejected() {
        let err = parse(&unit("qos(1e3, 1)"), MethodKind::Qos, &[NUMBER, NUMBER]).unwrap_err();
        assert!(matches!(err, ParseError::ArgumentType { .. }));
    }

    #[test]
    fn strings_are_unescaped() {
        let args = parse(&unit(r#"id("a \"b\"")"#), MethodKind::Id, &[&[ArgType::String]]).unwrap();
        assert_eq!(args[0], Argument::String("a \"b\"".to_string()));
        assert!(ArgType::String.convert(&unit("abc")).is_none());
        assert!(ArgType::String.convert(&unit(r#""a" + "b""#)).is_none());
    }

    #[test]
    fn time_literals_must_round_trip() {
        assert!(parse_time_literal("20200101T000000").is_some());
        assert!(parse_time_literal("20200230T000000").is_none());
        assert!(parse_time_literal("2020-01-01T00:00:00").is_none());
        assert!(ArgType::Time.convert(&unit("\"20201301T000000\"")).is_none());
    }

    #[test]
    fn names_and_reserved_words() {
        assert!(check_name("sensor_1").is_ok());
        assert_eq!(
            check_name("filter"),
            Err(ParseError::ReservedWord("filter".to_string()))
        );
        assert_eq!(
            check_name("a-b"),
            Err(ParseError::InvalidName("a-b".to_string()))
        );
    }

    #[test]
    fn literals() {
        assert_eq!(parse_literal(&unit("-3")).unwrap(), Literal::Integer(-3));
        assert_eq!(parse_literal(&unit("0.5")).unwrap(), Literal::Float(0.5));
        assert_eq!(
            parse_literal(&unit("\"x\"")).unwrap(),
            Literal::String("x".to_string())
        );
        assert!(matches!(
            parse_literal(&unit("x")),
            Err(ParseError::InvalidLiteral(_))
        ));
    }

    #[test]
    fn method_lookup() {
        assert_eq!(MethodKind::of_call("cull_time(1, 2)"), Some(MethodKind::CullTime));
        assert_eq!(MethodKind::of_call("unknown(1)"), None);
        assert!(MethodKind::Like.matches("like(a, \"b\")"));
        assert!(!MethodKind::Like.matches("likely(a)"));
    }
}
