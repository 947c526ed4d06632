//! 条件语法。
//!
//! 条件由比较、`like`、`range`、`not` 与事件状态测试组成，用 `&&`、`||` 和括号组合。
//! 解析结果可以转换为中间代码中的嵌套映射，运行时再从映射读回求值，见
//! [`runtime`](crate::runtime)。

use std::collections::BTreeSet;
use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::ParseError;

use super::{
    method::{self, parse_literal, take_literal, take_str, ArgType, Literal, MethodKind},
    scanner,
    source::SourceUnit,
};

static EVENT_STATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\.(on|off)$").unwrap());
static COMPARISON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*(<=|>=|==|!=|<|>)\s*(.+)$").unwrap());
static NOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^not\s+(.+)$").unwrap());

/// 比较符号
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Le,
    Lt,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl Sign {
    /// 符号文本
    pub fn token(self) -> &'static str {
        match self {
            Sign::Le => "<=",
            Sign::Lt => "<",
            Sign::Eq => "==",
            Sign::Ne => "!=",
            Sign::Ge => ">=",
            Sign::Gt => ">",
        }
    }

    /// 从符号文本解析。
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<=" => Some(Sign::Le),
            "<" => Some(Sign::Lt),
            "==" => Some(Sign::Eq),
            "!=" => Some(Sign::Ne),
            ">=" => Some(Sign::Ge),
            ">" => Some(Sign::Gt),
            _ => None,
        }
    }
}

/// 已编译的正则表达式，按源文本比较相等。
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// 编译正则表达式。
    pub fn new(pattern: &str) -> Result<Self, ParseError> {
        Regex::new(pattern)
            .map(Pattern)
            .map_err(|e| ParseError::InvalidRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    /// 源文本
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// 是否匹配。
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// 叶子条件对数据值所做的测试。
#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    /// `name <sign> threshold`，事件状态测试 `name.on` 也表示为 `== "on"`
    Compare {
        /// 比较符号
        sign: Sign,
        /// 阈值
        threshold: Literal,
    },
    /// `like(name, "pattern")`
    Like(Pattern),
    /// `range(name, min, max)`，两端均包含
    Range {
        /// 下界
        min: Literal,
        /// 上界
        max: Literal,
    },
    /// `not <test>`
    Not(Box<Test>),
}

impl Test {
    /// 中间代码中的 `[sign, ...thresholds]` 形式。
    ///
    /// `not` 的阈值是被否定测试自身的数组，比其他测试多一层。
    pub fn to_value(&self) -> Value {
        match self {
            Test::Compare { sign, threshold } => json!([sign.token(), threshold.to_value()]),
            Test::Like(pattern) => json!(["like", pattern.as_str()]),
            Test::Range { min, max } => json!(["range", min.to_value(), max.to_value()]),
            Test::Not(inner) => json!(["not", inner.to_value()]),
        }
    }
}

/// 叶子条件
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// 数据名
    pub data_name: String,
    /// 测试
    pub test: Test,
}

impl Leaf {
    /// 按固定优先级识别叶子条件：事件状态、比较、`like`、`range`、`not`。
    pub fn parse(unit: &SourceUnit) -> Result<Self, ParseError> {
        let text = unit.text();

        if let Some(caps) = EVENT_STATE.captures(text) {
            return Ok(Leaf {
                data_name: caps[1].to_string(),
                test: Test::Compare {
                    sign: Sign::Eq,
                    threshold: Literal::String(caps[2].to_string()),
                },
            });
        }

        if COMPARISON.is_match(text) {
            return Leaf::parse_comparison(unit);
        }

        if MethodKind::Like.matches(text) {
            return parse_like(unit);
        }

        if MethodKind::Range.matches(text) {
            return parse_range(unit);
        }

        if let Some(caps) = NOT.captures(text) {
            let inner = Leaf::parse(&unit.fragment(&caps[1]))?;
            return Ok(Leaf {
                data_name: inner.data_name,
                test: Test::Not(Box::new(inner.test)),
            });
        }

        Err(ParseError::NoCondition(text.to_string()))
    }

    /// 只接受 `name <sign> literal` 形式的比较。
    pub fn parse_comparison(unit: &SourceUnit) -> Result<Self, ParseError> {
        let text = unit.text();
        let caps = COMPARISON
            .captures(text)
            .ok_or_else(|| ParseError::NoCondition(text.to_string()))?;
        let sign =
            Sign::from_token(&caps[2]).ok_or_else(|| ParseError::NoCondition(text.to_string()))?;
        let threshold = parse_literal(&unit.fragment(&caps[3]))?;
        Ok(Leaf {
            data_name: caps[1].to_string(),
            test: Test::Compare { sign, threshold },
        })
    }

    /// 中间代码形式 `{data_name: [sign, ...thresholds]}`。
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.data_name.clone(), self.test.to_value());
        Value::Object(map)
    }
}

/// `like(name, "pattern")`
pub fn parse_like(unit: &SourceUnit) -> Result<Leaf, ParseError> {
    let args = method::parse(
        unit,
        MethodKind::Like,
        &[&[ArgType::DataName], &[ArgType::String]],
    )?;
    Ok(Leaf {
        data_name: take_str(&args, 0)?,
        test: Test::Like(Pattern::new(&take_str(&args, 1)?)?),
    })
}

/// `range(name, min, max)`，两端类型相同且 `min <= max`。
pub fn parse_range(unit: &SourceUnit) -> Result<Leaf, ParseError> {
    const BOUND: &[ArgType] = &[ArgType::Integer, ArgType::Float, ArgType::String];
    let args = method::parse(unit, MethodKind::Range, &[&[ArgType::DataName], BOUND, BOUND])?;
    let min = take_literal(&args, 1)?;
    let max = take_literal(&args, 2)?;

    if !min.same_type(&max) {
        return Err(ParseError::RangeType {
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    let ordered = match (&min, &max) {
        (Literal::String(a), Literal::String(b)) => a <= b,
        _ => min.as_f64() <= max.as_f64(),
    };
    if !ordered {
        return Err(ParseError::RangeOrder {
            min: min.to_string(),
            max: max.to_string(),
        });
    }

    Ok(Leaf {
        data_name: take_str(&args, 0)?,
        test: Test::Range { min, max },
    })
}

/// 条件树
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// 所有子条件成立
    And(Vec<Condition>),
    /// 任一子条件成立
    Or(Vec<Condition>),
    /// 叶子条件
    Leaf(Leaf),
}

impl Condition {
    /// 解析条件表达式。`||` 的优先级低于 `&&`。
    pub fn parse(unit: &SourceUnit) -> Result<Self, ParseError> {
        let text = unit.text();

        let parts = scanner::split(text, "||", None)?;
        if parts.len() >= 2 {
            return Ok(Condition::Or(Self::parse_all(unit, &parts)?));
        }

        let parts = scanner::split(text, "&&", None)?;
        if parts.len() >= 2 {
            return Ok(Condition::And(Self::parse_all(unit, &parts)?));
        }

        if let Some(inner) = scanner::strip_parens(text)? {
            return Self::parse(&unit.fragment(inner));
        }

        Leaf::parse(unit).map(Condition::Leaf)
    }

    fn parse_all(unit: &SourceUnit, parts: &[String]) -> Result<Vec<Self>, ParseError> {
        parts
            .iter()
            .map(|part| Self::parse(&unit.fragment(part)))
            .collect()
    }

    /// 叶子条件引用的数据名，去重。
    pub fn data_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Condition::And(children) | Condition::Or(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
            Condition::Leaf(leaf) => {
                names.insert(leaf.data_name.clone());
            }
        }
    }

    /// 中间代码形式。
    pub fn to_value(&self) -> Value {
        match self {
            Condition::And(children) => {
                json!({ "-and": children.iter().map(Self::to_value).collect::<Vec<_>>() })
            }
            Condition::Or(children) => {
                json!({ "-or": children.iter().map(Self::to_value).collect::<Vec<_>>() })
            }
            Condition::Leaf(leaf) => leaf.to_value(),
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
