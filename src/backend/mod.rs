//! 编译器后端：中间代码。
//!
//! 中间代码是编译器唯一的输出，由运行时的 overlay 管理器读取。
//! 其中的映射都使用 [`BTreeMap`]，保证相同输入的序列化结果逐字节相同。

mod builder;

pub use builder::IntermediateBuilder;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 中间代码
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateCode {
    /// overlay 名称，由调用者提供
    pub overlay: String,
    /// `@service` 到服务发现查询的映射
    pub services: BTreeMap<String, BTreeMap<String, Value>>,
    /// 始终生效的服务链路
    pub service_links: Vec<ServiceLink>,
    /// 事件名到开关触发器的映射
    pub trigger: BTreeMap<String, TriggerSwitch>,
    /// 始终生效的合并
    pub merges: Vec<MergeCode>,
    /// 事件块
    pub events: Vec<EventCode>,
}

/// 服务之间的一条链路
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLink {
    /// 发送端服务，带 `@`
    pub src: String,
    /// 接收端服务，带 `@`
    pub dst: String,
    /// 应用层请求
    pub app_request: AppRequest,
}

/// 链路上的处理与端点信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRequest {
    /// 处理方法，按书写顺序
    pub processing: Vec<Value>,
    /// 接收端
    pub channel: EndpointRequest,
    /// 发送端
    pub scratch: EndpointRequest,
    /// 服务质量，未指定时为空映射
    pub qos: Map<String, Value>,
    /// 标识，未指定时为空字符串
    pub id: String,
}

/// 端点信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRequest {
    /// scratch 或 channel 名称
    pub name: String,
    /// 选取的数据名
    pub select: Vec<String>,
    /// 元数据
    pub meta: Map<String, Value>,
}

/// 一个事件的打开与关闭触发器
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TriggerSwitch {
    /// 打开事件的触发器
    pub on: Vec<TriggerCode>,
    /// 关闭事件的触发器
    pub off: Vec<TriggerCode>,
}

/// 触发器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCode {
    /// 统计间隔
    pub trigger_interval: Value,
    /// 对计数的条件
    pub trigger_conditions: Value,
    /// 计数的记录需满足的条件
    pub conditions: Value,
    /// 监视的 channel
    pub channel: String,
}

/// 合并
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCode {
    /// `merge` 或 `join`
    #[serde(rename = "type")]
    pub kind: String,
    /// 延迟
    pub delay: Value,
    /// 源 channel
    pub src: Vec<String>,
    /// 目标 channel
    pub dst: String,
    /// `join` 的虚拟属性
    #[serde(rename = "virtual", default, skip_serializing_if = "Option::is_none")]
    pub virtual_property: Option<Value>,
}

/// 事件块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCode {
    /// 关于事件状态的条件
    pub conditions: Value,
    /// 事件成立时的服务链路
    pub service_links: Vec<ServiceLink>,
    /// 事件成立时的触发器
    pub trigger: BTreeMap<String, TriggerSwitch>,
    /// 事件成立时的合并
    pub merges: Vec<MergeCode>,
}
