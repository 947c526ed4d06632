//! 编译选项。

/// 编译选项。
#[derive(Clone, Debug)]
pub struct Options {
    /// overlay 名称，写入中间代码的 `overlay` 字段。
    pub overlay: String,
    /// 输出带缩进的 JSON。
    pub pretty: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            overlay: "default".to_string(),
            pretty: false,
        }
    }
}
