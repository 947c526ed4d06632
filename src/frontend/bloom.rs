//! `bloom do` 块与其中的事件块。

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompileError, ParseError};

use super::{
    ast::{Merge, SyntaxNode, Transmission, Trigger},
    block::{self, RawSyntax, SyntaxKind},
    condition::Condition,
    source::SourceUnit,
    state::StateDo,
};

static EVENTS_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s+do$").unwrap());

/// 一组规则：传输、触发器与合并。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rules {
    /// 传输
    pub transmissions: Vec<Transmission>,
    /// 触发器
    pub triggers: Vec<Trigger>,
    /// 合并
    pub merges: Vec<Merge>,
}

impl Rules {
    /// 解析 `body` 中 `candidates` 允许的规则，事件块另行返回。
    fn parse(
        body: &SourceUnit,
        candidates: &[SyntaxKind],
        state: &StateDo,
    ) -> Result<(Self, Vec<EventsDo>), CompileError> {
        let mut rules = Self::default();
        let mut events = Vec::new();

        for syntax in block::parse_lines(body, candidates)? {
            match SyntaxNode::parse(&syntax, Some(state))? {
                SyntaxNode::Transmission(t) => rules.transmissions.push(t),
                SyntaxNode::Trigger(t) => rules.triggers.push(t),
                SyntaxNode::Merge(m) => rules.merges.push(m),
                SyntaxNode::EventsDo(e) => events.push(e),
                _ => return Err(syntax.unit().error(ParseError::NoConstruct)),
            }
        }

        Ok((rules, events))
    }

    /// 触发器定义的事件名。
    pub fn events(&self) -> impl Iterator<Item = &str> + '_ {
        self.triggers.iter().map(|t| t.event.as_str())
    }
}

/// 事件块 `<condition> do ... end`，仅在条件成立时生效。
#[derive(Debug, Clone, PartialEq)]
pub struct EventsDo {
    /// 关于事件状态的条件
    pub condition: Condition,
    /// 块内的规则
    pub rules: Rules,
    unit: SourceUnit,
}

impl EventsDo {
    /// 解析事件块。
    pub fn parse(raw: &RawSyntax, state: &StateDo) -> Result<Self, CompileError> {
        let header = raw.header()?;
        let condition = EVENTS_HEADER
            .captures(header.text())
            .ok_or_else(|| ParseError::NoCondition(header.text().to_string()))
            .and_then(|caps| Condition::parse(&header.fragment(&caps[1])))
            .map_err(|e| header.error(e))?;

        let (rules, _) = Rules::parse(&raw.body()?, block::EVENTS, state)?;
        Ok(Self {
            condition,
            rules,
            unit: raw.unit().clone(),
        })
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}

/// `bloom do ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct BloomDo {
    /// 始终生效的规则
    pub rules: Rules,
    /// 事件块，按书写顺序
    pub events: Vec<EventsDo>,
    unit: SourceUnit,
}

impl BloomDo {
    /// 解析 `bloom do` 块，并检查事件块引用的事件都由某个触发器定义。
    pub fn parse(raw: &RawSyntax, state: &StateDo) -> Result<Self, CompileError> {
        let (rules, events) = Rules::parse(&raw.body()?, block::BLOOM, state)?;

        let defined: BTreeSet<&str> = rules
            .events()
            .chain(events.iter().flat_map(|e| e.rules.events()))
            .collect();
        for event in &events {
            if let Some(name) = event
                .condition
                .data_names()
                .into_iter()
                .find(|name| !defined.contains(name.as_str()))
            {
                return Err(event.unit().error(ParseError::UndefinedEvent(name)));
            }
        }

        tracing::debug!(
            transmissions = rules.transmissions.len(),
            triggers = rules.triggers.len(),
            merges = rules.merges.len(),
            events = events.len(),
            "parsed bloom block"
        );
        Ok(Self {
            rules,
            events,
            unit: raw.unit().clone(),
        })
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}
