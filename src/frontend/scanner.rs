//! 引号与括号感知的文本扫描器。
//!
//! 所有按分隔符切分的操作都建立在 [`split_quotes`] 与 [`split_brackets`] 之上：
//! 分隔符只在引号和括号之外生效。

use crate::error::ParseError;

/// 按双引号切分一行文本。
///
/// 返回 `(片段, 是否在引号内)` 序列，引号内的片段保留两侧的引号。
/// 字符串内允许使用 `\"` 表示引号本身，字符串外出现 `\"` 视为错误。
pub fn split_quotes(line: &str) -> Result<Vec<(String, bool)>, ParseError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut inside = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                if !inside {
                    return Err(ParseError::EscapedQuoteOutsideString);
                }
                chars.next();
                current.push_str("\\\"");
            }
            '"' if inside => {
                current.push(c);
                parts.push((std::mem::take(&mut current), true));
                inside = false;
            }
            '"' => {
                if !current.is_empty() {
                    parts.push((std::mem::take(&mut current), false));
                }
                current.push(c);
                inside = true;
            }
            _ => current.push(c),
        }
    }

    if inside {
        return Err(ParseError::UnterminatedQuote);
    }
    if !current.is_empty() {
        parts.push((current, false));
    }
    Ok(parts)
}

/// 去掉注释（引号外 `#` 之后的内容）并去除首尾空白。
pub fn strip_comment(line: &str) -> Result<String, ParseError> {
    let mut inside = false;
    let mut escaped = false;
    let mut end = line.len();
    for (i, c) in line.char_indices() {
        match c {
            '\\' if inside => escaped = !escaped,
            '"' if !escaped => inside = !inside,
            '#' if !inside => {
                end = i;
                break;
            }
            _ => escaped = false,
        }
        if c == '"' {
            escaped = false;
        }
    }

    let kept = &line[..end];
    split_quotes(kept)?;
    Ok(kept.trim().to_string())
}

fn closer_of(c: char) -> char {
    match c {
        '(' => ')',
        _ => ']',
    }
}

/// 括号扫描状态
#[derive(Default)]
struct BracketScan {
    parts: Vec<(String, bool)>,
    current: String,
    outside: bool,
    /// 尚未闭合的括号所期待的右括号
    expected: Vec<char>,
}

impl BracketScan {
    fn scan(text: &str) -> Result<Self, ParseError> {
        let mut scan = Self {
            outside: true,
            ..Default::default()
        };
        for (part, quoted) in split_quotes(text)? {
            if quoted {
                scan.push(&part, false);
                if scan.expected.is_empty() {
                    scan.flush();
                }
                continue;
            }
            for c in part.chars() {
                scan.push_char(c)?;
            }
        }
        Ok(scan)
    }

    fn push(&mut self, s: &str, outside: bool) {
        if outside != self.outside && !self.current.is_empty() {
            self.flush();
        }
        self.outside = outside;
        self.current.push_str(s);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.parts
                .push((std::mem::take(&mut self.current), self.outside));
        }
    }

    fn push_char(&mut self, c: char) -> Result<(), ParseError> {
        let mut buf = [0u8; 4];
        let s = c.encode_utf8(&mut buf);
        match c {
            '(' | '[' => {
                self.push(s, false);
                self.expected.push(closer_of(c));
            }
            ')' | ']' => {
                if self.expected.pop() != Some(c) {
                    return Err(ParseError::UnmatchedClosing(c));
                }
                self.push(s, false);
                if self.expected.is_empty() {
                    self.flush();
                }
            }
            _ => self.push(s, self.expected.is_empty()),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<(String, bool)>, ParseError> {
        if let Some(&closer) = self.expected.last() {
            return Err(ParseError::UnmatchedOpening(closer));
        }
        self.flush();
        Ok(self.parts)
    }
}

/// 在 [`split_quotes`] 的基础上按圆括号和方括号切分。
///
/// 返回 `(片段, 是否在所有括号与引号之外)` 序列。每个顶层括号组
/// （以及括号外的每个字符串）单独成为一个片段。
pub fn split_brackets(text: &str) -> Result<Vec<(String, bool)>, ParseError> {
    BracketScan::scan(text)?.finish()
}

/// 尚未闭合的括号数量。
///
/// 与 [`split_brackets`] 不同，未闭合的左括号不是错误，用于判断多行语法是否结束。
pub fn bracket_depth(text: &str) -> Result<usize, ParseError> {
    Ok(BracketScan::scan(text)?.expected.len())
}

/// 在引号与括号之外按 `delimiter` 切分，每一部分去除首尾空白。
///
/// `limit` 限制最多切分出的部分数，剩余文本全部归入最后一部分。
pub fn split(text: &str, delimiter: &str, limit: Option<usize>) -> Result<Vec<String>, ParseError> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (segment, outside) in split_brackets(text)? {
        if !outside {
            current.push_str(&segment);
            continue;
        }
        let mut rest = segment.as_str();
        while let Some(pos) = rest.find(delimiter) {
            if limit.map_or(false, |n| parts.len() + 1 >= n) {
                break;
            }
            current.push_str(&rest[..pos]);
            parts.push(current.trim().to_string());
            current.clear();
            rest = &rest[pos + delimiter.len()..];
        }
        current.push_str(rest);
    }

    parts.push(current.trim().to_string());
    Ok(parts)
}

/// 整段文本恰好被一对圆括号包围时，返回括号内的文本。
pub fn strip_parens(text: &str) -> Result<Option<String>, ParseError> {
    let text = text.trim();
    let segments = split_brackets(text)?;
    Ok(match segments.as_slice() {
        [(group, false)] if group.starts_with('(') && group.ends_with(')') => {
            Some(group[1..group.len() - 1].trim().to_string())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_split_and_kept() {
        let parts = split_quotes(r#"a = "x, y" + b"#).unwrap();
        assert_eq!(
            parts,
            vec![
                ("a = ".to_string(), false),
                ("\"x, y\"".to_string(), true),
                (" + b".to_string(), false),
            ]
        );
    }

    #[test]
    fn escaped_quote_inside_string() {
        let parts = split_quotes(r#""say \"hi\"""#).unwrap();
        assert_eq!(parts, vec![(r#""say \"hi\"""#.to_string(), true)]);
    }

    #[test]
    fn escaped_quote_outside_string() {
        assert_eq!(
            split_quotes(r#"a \" b"#),
            Err(ParseError::EscapedQuoteOutsideString)
        );
    }

    #[test]
    fn unterminated_quote() {
        assert_eq!(split_quotes(r#"a "b"#), Err(ParseError::UnterminatedQuote));
    }

    #[test]
    fn comments_are_stripped_outside_strings() {
        assert_eq!(strip_comment("  a <~ b # tail").unwrap(), "a <~ b");
        assert_eq!(
            strip_comment(r##"id("#1") # tail"##).unwrap(),
            r##"id("#1")"##
        );
        assert_eq!(strip_comment("# whole line").unwrap(), "");
        assert_eq!(strip_comment(r#"a # it's "odd"#).unwrap(), "a");
    }

    #[test]
    fn brackets_group_segments() {
        let parts = split_brackets(r#"f(a, [b]) + "c" x"#).unwrap();
        assert_eq!(
            parts,
            vec![
                ("f".to_string(), true),
                ("(a, [b])".to_string(), false),
                (" + ".to_string(), true),
                ("\"c\"".to_string(), false),
                (" x".to_string(), true),
            ]
        );
    }

    #[test]
    fn bracket_errors() {
        assert_eq!(split_brackets("a)"), Err(ParseError::UnmatchedClosing(')')));
        assert_eq!(split_brackets("(a]"), Err(ParseError::UnmatchedClosing(']')));
        assert_eq!(split_brackets("f(a"), Err(ParseError::UnmatchedOpening(')')));
        assert_eq!(bracket_depth("f(a, [b").unwrap(), 2);
        assert_eq!(bracket_depth("f(a)").unwrap(), 0);
    }

    #[test]
    fn split_ignores_quoted_and_bracketed_delimiters() {
        let parts = split(r#"a, (b, c), "d,e""#, ",", None).unwrap();
        assert_eq!(parts, vec!["a", "(b, c)", "\"d,e\""]);
    }

    #[test]
    fn split_with_limit() {
        let parts = split("k = v = w", "=", Some(2)).unwrap();
        assert_eq!(parts, vec!["k", "v = w"]);
        let parts = split("@s: discovery(a=1)", ":", Some(2)).unwrap();
        assert_eq!(parts, vec!["@s", "discovery(a=1)"]);
    }

    #[test]
    fn split_without_delimiter() {
        assert_eq!(split("abc", "&&", None).unwrap(), vec!["abc"]);
        assert_eq!(split("", ",", None).unwrap(), vec![""]);
    }

    #[test]
    fn multi_char_delimiters() {
        let parts = split("a > 1 && (b < 2 || c) && d.on", "&&", None).unwrap();
        assert_eq!(parts, vec!["a > 1", "(b < 2 || c)", "d.on"]);
        let parts = split("ev <- ch.trigger(1, count <-1, x)", "<-", Some(2)).unwrap();
        assert_eq!(parts, vec!["ev", "ch.trigger(1, count <-1, x)"]);
    }

    #[test]
    fn parens_are_stripped_only_when_enclosing() {
        assert_eq!(strip_parens("(a > 1)").unwrap(), Some("a > 1".to_string()));
        assert_eq!(strip_parens("(a) && (b)").unwrap(), None);
        assert_eq!(strip_parens("(a)(b)").unwrap(), None);
        assert_eq!(strip_parens("f(a)").unwrap(), None);
    }
}
