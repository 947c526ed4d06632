use std::fmt::Display;

/// 源代码中的行范围，行号从 1 开始，两端均包含。
///
/// `start == end` 表示单行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// 起始行号
    pub start: usize,
    /// 结束行号
    pub end: usize,
}

impl Span {
    /// 创建一个新的 `Span`，`end` 不会小于 `start`。
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// 单行范围。
    pub fn line(line: usize) -> Self {
        Self::new(line, line)
    }

    /// 是否只有一行。
    pub fn is_single_line(&self) -> bool {
        self.start == self.end
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single_line() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// 英文序数词，用于参数位置的错误信息。
pub(crate) fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}
