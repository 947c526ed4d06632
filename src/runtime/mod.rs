//! 条件求值。
//!
//! 运行时只拿到中间代码，因此这里从中间代码中的条件映射重新构造 [`Condition`]，
//! 再对数据记录求值。记录中缺少数据，或数据类型与阈值不兼容时，叶子条件不成立，而不是报错。

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::ParseError;
use crate::frontend::{
    condition::{Condition, Leaf, Pattern, Sign, Test},
    method::Literal,
};

fn malformed(value: &Value) -> ParseError {
    ParseError::MalformedCondition(value.to_string())
}

impl Condition {
    /// 从中间代码中的条件映射构造条件树。
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let map = match value.as_object() {
            Some(map) if map.len() == 1 => map,
            _ => return Err(malformed(value)),
        };
        let (key, inner) = map.iter().next().ok_or_else(|| malformed(value))?;

        match key.as_str() {
            "-and" | "-or" => {
                let children = inner
                    .as_array()
                    .filter(|children| children.len() >= 2)
                    .ok_or_else(|| malformed(value))?
                    .iter()
                    .map(Condition::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if key == "-and" {
                    Condition::And(children)
                } else {
                    Condition::Or(children)
                })
            }
            name => Ok(Condition::Leaf(Leaf {
                data_name: name.to_string(),
                test: Test::from_value(inner)?,
            })),
        }
    }

    /// 记录是否满足条件。
    pub fn ok(&self, record: &Value) -> bool {
        match self {
            Condition::And(children) => children.iter().all(|c| c.ok(record)),
            Condition::Or(children) => children.iter().any(|c| c.ok(record)),
            Condition::Leaf(leaf) => leaf.ok(record),
        }
    }
}

impl Leaf {
    /// 记录中对应的数据是否通过测试。
    pub fn ok(&self, record: &Value) -> bool {
        record
            .get(&self.data_name)
            .and_then(|value| self.test.check(value))
            .unwrap_or(false)
    }
}

impl Test {
    /// 从 `[sign, ...thresholds]` 构造测试。
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let items = value.as_array().ok_or_else(|| malformed(value))?;
        let literal = |index: usize| {
            items
                .get(index)
                .and_then(Literal::from_value)
                .ok_or_else(|| malformed(value))
        };

        match (items.first().and_then(Value::as_str), items.len()) {
            (Some("like"), 2) => {
                let pattern = items[1].as_str().ok_or_else(|| malformed(value))?;
                Ok(Test::Like(Pattern::new(pattern)?))
            }
            (Some("range"), 3) => Ok(Test::Range {
                min: literal(1)?,
                max: literal(2)?,
            }),
            (Some("not"), 2) => Ok(Test::Not(Box::new(Test::from_value(&items[1])?))),
            (Some(token), 2) => Ok(Test::Compare {
                sign: Sign::from_token(token).ok_or_else(|| malformed(value))?,
                threshold: literal(1)?,
            }),
            _ => Err(malformed(value)),
        }
    }

    /// 测试一个数据值。类型不兼容时返回 `None`。
    pub fn check(&self, value: &Value) -> Option<bool> {
        match self {
            Test::Compare { sign, threshold } => {
                let ordering = compare(value, threshold)?;
                Some(match sign {
                    Sign::Le => ordering != Ordering::Greater,
                    Sign::Lt => ordering == Ordering::Less,
                    Sign::Eq => ordering == Ordering::Equal,
                    Sign::Ne => ordering != Ordering::Equal,
                    Sign::Ge => ordering != Ordering::Less,
                    Sign::Gt => ordering == Ordering::Greater,
                })
            }
            Test::Like(pattern) => value.as_str().map(|s| pattern.is_match(s)),
            Test::Range { min, max } => {
                let low = compare(value, min)?;
                let high = compare(value, max)?;
                Some(low != Ordering::Less && high != Ordering::Greater)
            }
            Test::Not(inner) => inner.check(value).map(|b| !b),
        }
    }
}

/// 比较数据值与阈值。整数与浮点数按数值比较，字符串按字典序比较。
fn compare(value: &Value, threshold: &Literal) -> Option<Ordering> {
    match (value, threshold) {
        (Value::String(s), Literal::String(t)) => Some(s.as_str().cmp(t.as_str())),
        (Value::Number(n), Literal::Integer(t)) if n.is_i64() => n.as_i64().map(|n| n.cmp(t)),
        (Value::Number(n), _) => n.as_f64()?.partial_cmp(&threshold.as_f64()?),
        _ => None,
    }
}

/// 对中间代码中的条件映射求值。
pub fn ok(tree: &Value, record: &Value) -> Result<bool, ParseError> {
    Ok(Condition::from_value(tree)?.ok(record))
}
