//! 编译器前端

pub mod ast;
pub mod block;
pub mod bloom;
pub mod condition;
pub mod method;
pub mod methods;
pub mod scanner;
pub mod source;
pub mod state;

use crate::error::{CompileError, ParseError};

use self::{
    block::{RawSyntax, SyntaxKind},
    bloom::BloomDo,
    source::SourceUnit,
    state::StateDo,
};

/// 完整的 DSN 描述
#[derive(Debug, Clone, PartialEq)]
pub struct Dsn {
    /// `state do` 块
    pub state: StateDo,
    /// `bloom do` 块
    pub bloom: BloomDo,
}

/// 取出唯一的 `kind` 块。
fn exactly_one<'a>(
    unit: &SourceUnit,
    nodes: &'a [RawSyntax],
    kind: SyntaxKind,
) -> Result<&'a RawSyntax, CompileError> {
    let mut found = nodes.iter().filter(|node| node.kind() == kind);
    match (found.next(), found.count()) {
        (Some(node), 0) => Ok(node),
        (first, rest) => Err(unit.error(ParseError::Cardinality {
            block: kind.name(),
            count: usize::from(first.is_some()) + rest,
        })),
    }
}

/// 解析整段 DSN 描述。
///
/// 先切分出顶层块并检查 `state do` 与 `bloom do` 各恰好一个，再依次分析两个块。
pub fn parse(text: &str) -> Result<Dsn, CompileError> {
    let unit = SourceUnit::new(text, 0)?;
    let nodes = block::parse_lines(&unit, block::TOP_LEVEL)?;

    let state = exactly_one(&unit, &nodes, SyntaxKind::StateDo)?;
    let bloom = exactly_one(&unit, &nodes, SyntaxKind::BloomDo)?;

    let state = StateDo::parse(state)?;
    let bloom = BloomDo::parse(bloom, &state)?;
    Ok(Dsn { state, bloom })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_is_checked_first() {
        let err = parse("state do\nend\nstate do\nend\nbloom do\nend").unwrap_err();
        assert_eq!(
            err.reason(),
            &ParseError::Cardinality {
                block: "state do",
                count: 2
            }
        );

        // `@a` is invalid in the state block, but the missing bloom block is reported
        let err = parse("state do\n  @a: nonsense\nend").unwrap_err();
        assert_eq!(
            err.reason(),
            &ParseError::Cardinality {
                block: "bloom do",
                count: 0
            }
        );
    }

    #[test]
    fn minimal_document() {
        let dsn = parse("state do\nend\nbloom do\nend\n").unwrap();
        assert!(dsn.state.services.is_empty());
        assert!(dsn.bloom.events.is_empty());
    }
}
