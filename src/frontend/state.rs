//! `state do` 块：服务发现与 scratch/channel 声明。

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::{CompileError, ParseError};

use super::{
    ast::SyntaxNode,
    block::{self, RawSyntax},
    method::check_name,
    methods::parse_discovery,
    scanner,
    source::SourceUnit,
};

/// 拆分 `name: value`。
fn split_declaration(unit: &SourceUnit) -> Result<(String, SourceUnit), ParseError> {
    match scanner::split(unit.text(), ":", Some(2))?.as_slice() {
        [name, value] if !name.is_empty() && !value.is_empty() => {
            Ok((name.clone(), unit.fragment(value)))
        }
        _ => Err(ParseError::Invalid(format!(
            "expected `name: value`, found `{}`",
            unit.text()
        ))),
    }
}

/// 去掉服务名的 `@` 前缀并检查名称。
fn service_name(text: &str) -> Result<&str, ParseError> {
    let name = text
        .strip_prefix('@')
        .ok_or_else(|| ParseError::InvalidName(text.to_string()))?;
    check_name(name)?;
    Ok(name)
}

/// 服务 `@name: discovery(...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    /// 名称，不含 `@`
    pub name: String,
    /// 服务发现查询
    pub discovery: BTreeMap<String, Value>,
    unit: SourceUnit,
}

impl Service {
    /// 解析服务声明。
    pub fn parse(unit: &SourceUnit) -> Result<Self, CompileError> {
        Self::parse_inner(unit).map_err(|e| unit.error(e))
    }

    fn parse_inner(unit: &SourceUnit) -> Result<Self, ParseError> {
        let (name, query) = split_declaration(unit)?;
        let name = service_name(&name)?.to_string();
        Ok(Self {
            name,
            discovery: parse_discovery(&query)?,
            unit: unit.clone(),
        })
    }

    /// 带 `@` 的名称，中间代码中使用这一形式。
    pub fn reference(&self) -> String {
        format!("@{}", self.name)
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}

/// 端点种类
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Scratch,
    Channel,
}

impl EndpointKind {
    /// 关键字
    pub fn keyword(self) -> &'static str {
        match self {
            EndpointKind::Scratch => "scratch",
            EndpointKind::Channel => "channel",
        }
    }
}

/// `scratch name: @service` 或 `channel name: @service`
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// 种类
    pub kind: EndpointKind,
    /// 名称
    pub name: String,
    /// 所属服务，不含 `@`
    pub service: String,
    unit: SourceUnit,
}

impl Endpoint {
    /// 解析端点声明。
    pub fn parse(unit: &SourceUnit, kind: EndpointKind) -> Result<Self, CompileError> {
        Self::parse_inner(unit, kind).map_err(|e| unit.error(e))
    }

    fn parse_inner(unit: &SourceUnit, kind: EndpointKind) -> Result<Self, ParseError> {
        let rest = unit
            .text()
            .strip_prefix(kind.keyword())
            .ok_or_else(|| ParseError::Invalid(format!("expected `{}`", kind.keyword())))?;
        let (name, owner) = split_declaration(&unit.fragment(rest))?;
        check_name(&name)?;
        let service = service_name(owner.text())?.to_string();
        Ok(Self {
            kind,
            name,
            service,
            unit: unit.clone(),
        })
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}

/// `state do ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct StateDo {
    /// 服务，按声明顺序
    pub services: Vec<Service>,
    /// scratch，按声明顺序
    pub scratches: Vec<Endpoint>,
    /// channel，按声明顺序
    pub channels: Vec<Endpoint>,
    unit: SourceUnit,
}

impl StateDo {
    /// 解析 `state do` 块并检查名称。
    pub fn parse(raw: &RawSyntax) -> Result<Self, CompileError> {
        let body = raw.body()?;
        let mut state = Self {
            services: vec![],
            scratches: vec![],
            channels: vec![],
            unit: raw.unit().clone(),
        };

        let mut names = BTreeSet::new();
        for syntax in block::parse_lines(&body, block::STATE)? {
            let node = SyntaxNode::parse(&syntax, None)?;
            let (name, unit) = match &node {
                SyntaxNode::Service(service) => (service.name.clone(), service.unit()),
                SyntaxNode::Scratch(endpoint) | SyntaxNode::Channel(endpoint) => {
                    (endpoint.name.clone(), endpoint.unit())
                }
                _ => return Err(syntax.unit().error(ParseError::NoConstruct)),
            };
            if !names.insert(name.clone()) {
                return Err(unit.error(ParseError::DuplicateDefinition(name)));
            }

            match node {
                SyntaxNode::Service(service) => state.services.push(service),
                SyntaxNode::Scratch(endpoint) => state.scratches.push(endpoint),
                SyntaxNode::Channel(endpoint) => state.channels.push(endpoint),
                _ => {}
            }
        }

        for endpoint in state.scratches.iter().chain(&state.channels) {
            if state.service(&endpoint.service).is_none() {
                return Err(endpoint
                    .unit()
                    .error(ParseError::UndefinedService(format!("@{}", endpoint.service))));
            }
        }

        tracing::debug!(
            services = state.services.len(),
            scratches = state.scratches.len(),
            channels = state.channels.len(),
            "parsed state block"
        );
        Ok(state)
    }

    /// 按名称查找服务。
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// 按名称查找 scratch。
    pub fn scratch(&self, name: &str) -> Option<&Endpoint> {
        self.scratches.iter().find(|s| s.name == name)
    }

    /// 按名称查找 channel。
    pub fn channel(&self, name: &str) -> Option<&Endpoint> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// 源代码
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Span;
    use serde_json::json;

    fn state(text: &str) -> Result<StateDo, CompileError> {
        let unit = SourceUnit::new(text, 0).unwrap();
        let raw = block::parse_lines(&unit, block::TOP_LEVEL).unwrap();
        StateDo::parse(&raw[0])
    }

    #[test]
    fn declarations() {
        let state = state(
            r#"state do
  @weather: discovery(type="weather", multi=2)
  @storage : discovery(type = "storage")
  scratch s1: @weather
  channel c1 : @storage
end"#,
        )
        .unwrap();
        assert_eq!(state.services.len(), 2);
        assert_eq!(state.services[0].reference(), "@weather");
        assert_eq!(state.services[1].discovery["type"], json!(["storage"]));
        assert_eq!(state.scratch("s1").map(|s| s.service.as_str()), Some("weather"));
        assert_eq!(state.channel("c1").map(|c| c.service.as_str()), Some("storage"));
        assert!(state.channel("s1").is_none());
    }

    #[test]
    fn duplicate_names() {
        let err = state("state do\n  @a: discovery()\n  scratch x: @a\n  channel x: @a\nend")
            .unwrap_err();
        assert_eq!(err.reason(), &ParseError::DuplicateDefinition("x".to_string()));
        assert_eq!(err.span(), Span::line(4));
    }

    #[test]
    fn undefined_owner() {
        let err = state("state do\n  @a: discovery()\n  scratch x: @b\nend").unwrap_err();
        assert_eq!(err.reason(), &ParseError::UndefinedService("@b".to_string()));
        assert_eq!(err.span(), Span::line(3));
    }

    #[test]
    fn reserved_and_invalid_names() {
        let err = state("state do\n  @a: discovery()\n  channel count: @a\nend").unwrap_err();
        assert_eq!(err.reason(), &ParseError::ReservedWord("count".to_string()));

        let err = state("state do\n  @a: discovery()\n  channel c: a\nend").unwrap_err();
        assert_eq!(err.reason(), &ParseError::InvalidName("a".to_string()));

        let err = state("state do\n  @select: discovery()\nend").unwrap_err();
        assert_eq!(err.reason(), &ParseError::ReservedWord("select".to_string()));
    }

    #[test]
    fn rules_are_not_declarations() {
        let err = state("state do\n  c <~ s\nend").unwrap_err();
        assert_eq!(err.reason(), &ParseError::NoConstruct);
    }
}
