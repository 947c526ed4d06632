//! 语法树。
//!
//! 每个节点由 [`RawSyntax`] 一次性解析得到，解析完成即是合法节点，
//! 并保留自己的源代码单元用于报告错误。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{CompileError, ParseError};

use super::{
    block::{RawSyntax, SyntaxKind},
    bloom::EventsDo,
    condition::{Condition, Leaf, Test},
    method::{self, arguments, check_name, convert, expect_at_least, take_literal, take_str,
        take_unit, ArgType, Literal, MethodKind},
    methods::{parse_id, parse_meta, parse_select, Processing, Qos, VirtualProperty,
        PROCESSING_METHODS},
    scanner,
    source::SourceUnit,
    state::{Endpoint, EndpointKind, Service, StateDo},
};

static TRIGGER_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\s*<([+-])\s*(.+)$").unwrap());
static MERGE_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\s*<~\s*(.+)$").unwrap());

const NUMBER: &[ArgType] = &[ArgType::Integer, ArgType::Float];
const NAME: &[ArgType] = &[ArgType::DataName];

/// 语法节点
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    EventsDo(EventsDo),
    Service(Service),
    Scratch(Endpoint),
    Channel(Endpoint),
    Transmission(Transmission),
    Trigger(Trigger),
    Merge(Merge),
}

impl SyntaxNode {
    /// 解析一个语法单元。`bloom do` 内的规则需要 `state` 来解析名称。
    pub fn parse(raw: &RawSyntax, state: Option<&StateDo>) -> Result<Self, CompileError> {
        let unit = raw.unit();
        let scope = || {
            state.ok_or_else(|| {
                unit.error(ParseError::Invalid(format!(
                    "{} is only allowed inside `bloom do`",
                    raw.kind().name()
                )))
            })
        };

        match raw.kind() {
            SyntaxKind::StateDo | SyntaxKind::BloomDo => Err(unit.error(ParseError::NoConstruct)),
            SyntaxKind::Service => Service::parse(unit).map(SyntaxNode::Service),
            SyntaxKind::Scratch => {
                Endpoint::parse(unit, EndpointKind::Scratch).map(SyntaxNode::Scratch)
            }
            SyntaxKind::Channel => {
                Endpoint::parse(unit, EndpointKind::Channel).map(SyntaxNode::Channel)
            }
            SyntaxKind::EventsDo => EventsDo::parse(raw, scope()?).map(SyntaxNode::EventsDo),
            SyntaxKind::Transmission => {
                Transmission::parse(unit, scope()?).map(SyntaxNode::Transmission)
            }
            SyntaxKind::Trigger => Trigger::parse(unit, scope()?).map(SyntaxNode::Trigger),
            SyntaxKind::Merge => Merge::parse(unit, scope()?).map(SyntaxNode::Merge),
        }
    }
}

/// 方法调用的名称，用于报告未知方法。
fn call_name(text: &str) -> String {
    text.split('(').next().unwrap_or(text).trim().to_string()
}

fn set_once<T>(slot: &mut Option<T>, value: T, what: &'static str) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicateModifier(what));
    }
    *slot = Some(value);
    Ok(())
}

/// 传输一端的名称、`select` 与 `meta`。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndpointRef {
    /// scratch 或 channel 的名称
    pub name: String,
    /// 选取的数据名，为空表示全部
    pub select: Vec<String>,
    /// 元数据
    pub meta: Map<String, Value>,
}

/// 在一端上累积修饰方法。
#[derive(Default)]
struct Modifiers {
    select: Option<Vec<String>>,
    meta: Option<Map<String, Value>>,
    qos: Option<Qos>,
    id: Option<String>,
}

impl Modifiers {
    /// 尝试作为修饰方法解析，不是修饰方法时返回 `false`。
    fn apply(&mut self, unit: &SourceUnit, kind: MethodKind, full: bool) -> Result<bool, ParseError> {
        match kind {
            MethodKind::Select => set_once(&mut self.select, parse_select(unit)?, "select")?,
            MethodKind::Meta => set_once(&mut self.meta, parse_meta(unit)?, "meta")?,
            MethodKind::Qos if full => set_once(&mut self.qos, Qos::parse(unit)?, "qos")?,
            MethodKind::Id if full => set_once(&mut self.id, parse_id(unit)?, "id")?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn endpoint(&mut self, name: String) -> EndpointRef {
        EndpointRef {
            name,
            select: self.select.take().unwrap_or_default(),
            meta: self.meta.take().unwrap_or_default(),
        }
    }
}

/// 传输 `channel[.select(..)][.meta(..)] <~ scratch.method(..)...`
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    /// 接收端
    pub channel: EndpointRef,
    /// 发送端
    pub scratch: EndpointRef,
    /// 发送端所属服务，不含 `@`
    pub source: String,
    /// 接收端所属服务，不含 `@`
    pub destination: String,
    /// 处理方法，按书写顺序
    pub processing: Vec<Processing>,
    /// 服务质量
    pub qos: Option<Qos>,
    /// 标识
    pub id: Option<String>,
    unit: SourceUnit,
}

impl Transmission {
    /// 解析传输规则，并在 `state` 中查找两端。
    pub fn parse(unit: &SourceUnit, state: &StateDo) -> Result<Self, CompileError> {
        Self::parse_inner(unit, state).map_err(|e| unit.error(e))
    }

    fn parse_inner(unit: &SourceUnit, state: &StateDo) -> Result<Self, ParseError> {
        let (lhs, rhs) = match scanner::split(unit.text(), "<~", Some(2))?.as_slice() {
            [lhs, rhs] => (lhs.clone(), rhs.clone()),
            _ => return Err(ParseError::Invalid("expected `channel <~ scratch`".to_string())),
        };

        let mut channel_side = Modifiers::default();
        let mut parts = scanner::split(&lhs, ".", None)?.into_iter();
        let channel = parts.next().unwrap_or_default();
        check_name(&channel)?;
        for part in parts {
            let call = unit.fragment(&part);
            let applied = match MethodKind::of_call(call.text()) {
                Some(kind) => channel_side.apply(&call, kind, false)?,
                None => false,
            };
            if !applied {
                return Err(ParseError::UnknownMethod(call_name(&part)));
            }
        }

        let mut scratch_side = Modifiers::default();
        let mut processing = Vec::new();
        let mut parts = scanner::split(&rhs, ".", None)?.into_iter();
        let scratch = parts.next().unwrap_or_default();
        check_name(&scratch)?;
        for part in parts {
            let call = unit.fragment(&part);
            let kind = MethodKind::of_call(call.text())
                .ok_or_else(|| ParseError::UnknownMethod(call_name(&part)))?;
            if scratch_side.apply(&call, kind, true)? {
                continue;
            }
            if !PROCESSING_METHODS.contains(&kind) {
                return Err(ParseError::UnknownMethod(kind.name().to_string()));
            }
            processing.push(Processing::parse(&call, kind)?);
        }

        let destination = state
            .channel(&channel)
            .ok_or_else(|| ParseError::UndefinedChannel(channel.clone()))?
            .service
            .clone();
        let source = state
            .scratch(&scratch)
            .ok_or_else(|| ParseError::UndefinedScratch(scratch.clone()))?
            .service
            .clone();

        Ok(Self {
            channel: channel_side.endpoint(channel),
            source,
            destination,
            processing,
            qos: scratch_side.qos.take(),
            id: scratch_side.id.take(),
            scratch: scratch_side.endpoint(scratch),
            unit: unit.clone(),
        })
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}

/// 触发器的开关方向
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

/// 触发器 `event <+ channel.trigger(interval, count <sign> n, condition)`
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// 事件名
    pub event: String,
    /// `<+` 打开，`<-` 关闭
    pub switch: Switch,
    /// 监视的 channel
    pub channel: String,
    /// 统计间隔，大于 0
    pub interval: Literal,
    /// 对 `count` 的比较
    pub trigger_condition: Leaf,
    /// 计数的记录需满足的条件
    pub condition: Condition,
    unit: SourceUnit,
}

impl Trigger {
    /// 解析触发器。
    pub fn parse(unit: &SourceUnit, state: &StateDo) -> Result<Self, CompileError> {
        Self::parse_inner(unit, state).map_err(|e| unit.error(e))
    }

    fn parse_inner(unit: &SourceUnit, state: &StateDo) -> Result<Self, ParseError> {
        let caps = TRIGGER_HEAD
            .captures(unit.text())
            .ok_or_else(|| ParseError::MethodFormat {
                expected: MethodKind::Trigger.usage(),
            })?;
        let event = caps[1].to_string();
        check_name(&event)?;
        let switch = if &caps[2] == "+" { Switch::On } else { Switch::Off };

        let (channel, call) = match scanner::split(&caps[3], ".", Some(2))?.as_slice() {
            [channel, call] => (channel.clone(), unit.fragment(call)),
            _ => {
                return Err(ParseError::MethodFormat {
                    expected: MethodKind::Trigger.usage(),
                })
            }
        };
        check_name(&channel)?;

        let args = method::parse(
            &call,
            MethodKind::Trigger,
            &[NUMBER, &[ArgType::Untyped], &[ArgType::Untyped]],
        )?;
        let interval = take_literal(&args, 0)?;
        if !interval.as_f64().map_or(false, |v| v > 0.0) {
            return Err(ParseError::NotPositive {
                what: "trigger interval",
                value: interval.to_string(),
            });
        }

        let count = take_unit(&args, 1)?;
        let trigger_condition = match Leaf::parse_comparison(count) {
            Ok(
                leaf @ Leaf {
                    test:
                        Test::Compare {
                            threshold: Literal::Integer(_) | Literal::Float(_),
                            ..
                        },
                    ..
                },
            ) if leaf.data_name == "count" => leaf,
            _ => return Err(ParseError::TriggerCondition(count.text().to_string())),
        };
        let condition = Condition::parse(take_unit(&args, 2)?)?;

        if state.channel(&channel).is_none() {
            return Err(ParseError::UndefinedChannel(channel));
        }

        Ok(Self {
            event,
            switch,
            channel,
            interval,
            trigger_condition,
            condition,
            unit: unit.clone(),
        })
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}

/// 合并方式
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    Merge,
    Join,
}

impl MergeKind {
    /// 名称
    pub fn name(self) -> &'static str {
        match self {
            MergeKind::Merge => "merge",
            MergeKind::Join => "join",
        }
    }
}

/// `dst <~ merge(delay, src, ...)` 或 `dst <~ join(delay, src, src, ..., virtual(..))`
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    /// 合并方式
    pub kind: MergeKind,
    /// 延迟，不小于 0
    pub delay: Literal,
    /// 源 channel
    pub sources: Vec<String>,
    /// 目标 channel
    pub destination: String,
    /// `join` 的虚拟属性
    pub virtual_property: Option<VirtualProperty>,
    unit: SourceUnit,
}

impl Merge {
    /// 解析合并规则。
    pub fn parse(unit: &SourceUnit, state: &StateDo) -> Result<Self, CompileError> {
        Self::parse_inner(unit, state).map_err(|e| unit.error(e))
    }

    fn parse_inner(unit: &SourceUnit, state: &StateDo) -> Result<Self, ParseError> {
        let caps = MERGE_HEAD
            .captures(unit.text())
            .ok_or_else(|| ParseError::MethodFormat {
                expected: MethodKind::Merge.usage(),
            })?;
        let destination = caps[1].to_string();
        let call = unit.fragment(&caps[2]);

        let (kind, method) = match MethodKind::of_call(call.text()) {
            Some(MethodKind::Merge) => (MergeKind::Merge, MethodKind::Merge),
            Some(MethodKind::Join) => (MergeKind::Join, MethodKind::Join),
            _ => {
                return Err(ParseError::MethodFormat {
                    expected: MethodKind::Merge.usage(),
                })
            }
        };

        let mut raw = arguments(&call, method)?;
        let has_virtual = kind == MergeKind::Join
            && raw
                .last()
                .map_or(false, |last| MethodKind::Virtual.matches(last.text()));
        let virtual_property = if has_virtual {
            raw.pop()
                .map(|last| VirtualProperty::parse(&last))
                .transpose()?
        } else {
            None
        };

        let min_sources = match kind {
            MergeKind::Merge => 1,
            MergeKind::Join => 2,
        };
        expect_at_least(method, &raw, min_sources + 1)?;

        let mut format = vec![NUMBER];
        format.resize(raw.len(), NAME);
        let args = convert(method, &raw, &format)?;

        let delay = take_literal(&args, 0)?;
        if !delay.as_f64().map_or(false, |v| v >= 0.0) {
            return Err(ParseError::Invalid(format!(
                "{} delay must not be negative, found {}",
                kind.name(),
                delay
            )));
        }

        let sources = (1..args.len())
            .map(|i| take_str(&args, i))
            .collect::<Result<Vec<_>, _>>()?;
        for name in sources.iter().chain(std::iter::once(&destination)) {
            if state.channel(name).is_none() {
                return Err(ParseError::UndefinedChannel(name.clone()));
            }
        }

        Ok(Self {
            kind,
            delay,
            sources,
            destination,
            virtual_property,
            unit: unit.clone(),
        })
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}
