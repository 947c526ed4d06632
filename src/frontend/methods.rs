//! 各个方法的参数约定与中间代码形式。

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};

use crate::error::ParseError;

use super::{
    condition::{Condition, Pattern},
    method::{
        self, arguments, convert, expect_at_least, expect_between, parse_literal,
        parse_time_literal, take_literal, take_str, take_unit, ArgType, Argument, Literal,
        MethodKind, TIME_FORMAT,
    },
    scanner,
    source::SourceUnit,
};

const NUMBER: &[ArgType] = &[ArgType::Integer, ArgType::Float];
const NAME: &[ArgType] = &[ArgType::DataName];
const STRING: &[ArgType] = &[ArgType::String];
const INTEGER: &[ArgType] = &[ArgType::Integer];
const UNTYPED: &[ArgType] = &[ArgType::Untyped];

/// 时间粒度
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    /// 从文本解析。
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "day" => Some(TimeUnit::Day),
            "hour" => Some(TimeUnit::Hour),
            "minute" => Some(TimeUnit::Minute),
            "second" => Some(TimeUnit::Second),
            _ => None,
        }
    }

    /// 名称
    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
        }
    }
}

/// `time(name, start, end, interval, unit)`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    /// 时间戳的数据名
    pub name: String,
    /// 起始时间
    pub start: NaiveDateTime,
    /// 结束时间
    pub end: NaiveDateTime,
    /// 间隔
    pub interval: i64,
    /// 间隔单位
    pub unit: TimeUnit,
}

impl TimeWindow {
    /// 解析并检查 `unit`、`start <= end` 与 `interval > 0`。
    pub fn parse(unit: &SourceUnit) -> Result<Self, ParseError> {
        let args = method::parse(
            unit,
            MethodKind::Time,
            &[NAME, &[ArgType::Time], &[ArgType::Time], INTEGER, STRING],
        )?;

        let literal = |index| -> Result<NaiveDateTime, ParseError> {
            let text = take_str(&args, index)?;
            parse_time_literal(&text).ok_or(ParseError::TimeLiteral(text))
        };
        let start = literal(1)?;
        let end = literal(2)?;
        let interval = args[3].as_i64().unwrap_or_default();
        let unit_name = take_str(&args, 4)?;

        let time_unit =
            TimeUnit::from_name(&unit_name).ok_or_else(|| ParseError::TimeUnit(unit_name))?;
        if start > end {
            return Err(ParseError::TimeOrder {
                start: start.format(TIME_FORMAT).to_string(),
                end: end.format(TIME_FORMAT).to_string(),
            });
        }
        if interval <= 0 {
            return Err(ParseError::NotPositive {
                what: "time interval",
                value: interval.to_string(),
            });
        }

        Ok(Self {
            name: take_str(&args, 0)?,
            start,
            end,
            interval,
            unit: time_unit,
        })
    }

    /// 中间代码形式
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "start": self.start.format(TIME_FORMAT).to_string(),
            "end": self.end.format(TIME_FORMAT).to_string(),
            "interval": self.interval,
            "unit": self.unit.name(),
        })
    }
}

/// `space(lat, long, west, south, east, north, lat_interval, long_interval)`
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceWindow {
    pub lat: String,
    pub long: String,
    pub west: Literal,
    pub south: Literal,
    pub east: Literal,
    pub north: Literal,
    pub lat_interval: Literal,
    pub long_interval: Literal,
}

impl SpaceWindow {
    /// 解析并检查经纬度范围与方向。
    pub fn parse(unit: &SourceUnit) -> Result<Self, ParseError> {
        let args = method::parse(
            unit,
            MethodKind::Space,
            &[NAME, NAME, NUMBER, NUMBER, NUMBER, NUMBER, NUMBER, NUMBER],
        )?;

        let space = Self {
            lat: take_str(&args, 0)?,
            long: take_str(&args, 1)?,
            west: take_literal(&args, 2)?,
            south: take_literal(&args, 3)?,
            east: take_literal(&args, 4)?,
            north: take_literal(&args, 5)?,
            lat_interval: take_literal(&args, 6)?,
            long_interval: take_literal(&args, 7)?,
        };

        check_bound("west", &space.west, 180)?;
        check_bound("south", &space.south, 90)?;
        check_bound("east", &space.east, 180)?;
        check_bound("north", &space.north, 90)?;
        if space.west.as_f64() > space.east.as_f64() {
            return Err(ParseError::SpaceOrder {
                low: "west",
                high: "east",
            });
        }
        if space.south.as_f64() > space.north.as_f64() {
            return Err(ParseError::SpaceOrder {
                low: "south",
                high: "north",
            });
        }
        check_positive("latitude interval", &space.lat_interval)?;
        check_positive("longitude interval", &space.long_interval)?;

        Ok(space)
    }

    /// 中间代码形式
    pub fn to_value(&self) -> Value {
        json!({
            "lat": self.lat,
            "long": self.long,
            "west": self.west.to_value(),
            "south": self.south.to_value(),
            "east": self.east.to_value(),
            "north": self.north.to_value(),
            "lat_interval": self.lat_interval.to_value(),
            "long_interval": self.long_interval.to_value(),
        })
    }
}

fn check_bound(what: &'static str, value: &Literal, limit: i32) -> Result<(), ParseError> {
    let v = value.as_f64().unwrap_or(f64::NAN);
    if !(-(limit as f64)..=limit as f64).contains(&v) {
        return Err(ParseError::SpaceRange {
            what,
            min: -limit,
            max: limit,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_positive(what: &'static str, value: &Literal) -> Result<(), ParseError> {
    if !value.as_f64().map_or(false, |v| v > 0.0) {
        return Err(ParseError::NotPositive {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_cull(numerator: i64, denominator: i64) -> Result<(), ParseError> {
    if numerator > 0 && denominator > 0 && numerator <= denominator {
        Ok(())
    } else {
        Err(ParseError::CullValue {
            numerator,
            denominator,
        })
    }
}

/// 剔除比例 `numerator / denominator`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    /// 分子
    pub numerator: i64,
    /// 分母
    pub denominator: i64,
}

fn parse_ratio(args: &[Argument]) -> Result<Ratio, ParseError> {
    let numerator = args[0].as_i64().unwrap_or_default();
    let denominator = args[1].as_i64().unwrap_or_default();
    check_cull(numerator, denominator)?;
    Ok(Ratio {
        numerator,
        denominator,
    })
}

/// 处理方法
#[derive(Debug, Clone, PartialEq)]
pub enum Processing {
    /// `filter(condition)`
    Filter(Condition),
    /// `cull_time(numerator, denominator, time(...))`
    CullTime(Ratio, TimeWindow),
    /// `cull_space(numerator, denominator, space(...))`
    CullSpace(Ratio, SpaceWindow),
    /// `aggregate(name, "function", time(...), space(...))`
    Aggregate(Aggregate),
    /// `string(name, "pattern", "replacement")`
    String {
        /// 数据名
        name: String,
        /// 正则表达式
        pattern: Pattern,
        /// 替换文本
        replacement: String,
    },
    /// `virtual(name, "expression")`
    Virtual(VirtualProperty),
}

/// 处理方法的种类
pub const PROCESSING_METHODS: &[MethodKind] = &[
    MethodKind::Filter,
    MethodKind::CullTime,
    MethodKind::CullSpace,
    MethodKind::Aggregate,
    MethodKind::String,
    MethodKind::Virtual,
];

impl Processing {
    /// 按方法种类解析。
    pub fn parse(unit: &SourceUnit, kind: MethodKind) -> Result<Self, ParseError> {
        match kind {
            MethodKind::Filter => {
                let args = method::parse(unit, kind, &[UNTYPED])?;
                Ok(Processing::Filter(Condition::parse(take_unit(&args, 0)?)?))
            }
            MethodKind::CullTime => {
                let args = method::parse(unit, kind, &[INTEGER, INTEGER, UNTYPED])?;
                let ratio = parse_ratio(&args)?;
                Ok(Processing::CullTime(
                    ratio,
                    TimeWindow::parse(take_unit(&args, 2)?)?,
                ))
            }
            MethodKind::CullSpace => {
                let args = method::parse(unit, kind, &[INTEGER, INTEGER, UNTYPED])?;
                let ratio = parse_ratio(&args)?;
                Ok(Processing::CullSpace(
                    ratio,
                    SpaceWindow::parse(take_unit(&args, 2)?)?,
                ))
            }
            MethodKind::Aggregate => Aggregate::parse(unit).map(Processing::Aggregate),
            MethodKind::String => {
                let args = method::parse(unit, kind, &[NAME, STRING, STRING])?;
                Ok(Processing::String {
                    name: take_str(&args, 0)?,
                    pattern: Pattern::new(&take_str(&args, 1)?)?,
                    replacement: take_str(&args, 2)?,
                })
            }
            MethodKind::Virtual => VirtualProperty::parse(unit).map(Processing::Virtual),
            other => Err(ParseError::UnknownMethod(other.name().to_string())),
        }
    }

    /// 中间代码形式 `{method: ...}`。
    pub fn to_value(&self) -> Value {
        match self {
            Processing::Filter(condition) => json!({ "filter": condition.to_value() }),
            Processing::CullTime(ratio, time) => json!({
                "cull_time": {
                    "numerator": ratio.numerator,
                    "denominator": ratio.denominator,
                    "time": time.to_value(),
                }
            }),
            Processing::CullSpace(ratio, space) => json!({
                "cull_space": {
                    "numerator": ratio.numerator,
                    "denominator": ratio.denominator,
                    "space": space.to_value(),
                }
            }),
            Processing::Aggregate(aggregate) => json!({ "aggregate": aggregate.to_value() }),
            Processing::String {
                name,
                pattern,
                replacement,
            } => json!({
                "string": {
                    "name": name,
                    "pattern": pattern.as_str(),
                    "replacement": replacement,
                }
            }),
            Processing::Virtual(property) => json!({ "virtual": property.to_value() }),
        }
    }
}

/// 聚合函数
pub const AGGREGATE_FUNCTIONS: &[&str] = &["avg", "sum", "min", "max", "count"];

/// `aggregate(name, "function", time(...), space(...))`，时间与空间窗口至少一个。
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// 数据名
    pub name: String,
    /// 聚合函数
    pub function: String,
    /// 时间窗口
    pub time: Option<TimeWindow>,
    /// 空间窗口
    pub space: Option<SpaceWindow>,
}

impl Aggregate {
    fn parse(unit: &SourceUnit) -> Result<Self, ParseError> {
        let kind = MethodKind::Aggregate;
        let raw = arguments(unit, kind)?;
        expect_between(kind, &raw, 3, 4)?;

        let mut format = vec![NAME, STRING];
        format.resize(raw.len(), UNTYPED);
        let args = convert(kind, &raw, &format)?;

        let function = take_str(&args, 1)?;
        if !AGGREGATE_FUNCTIONS.contains(&function.as_str()) {
            return Err(ParseError::Invalid(format!(
                "aggregate function must be one of {}, found `{}`",
                AGGREGATE_FUNCTIONS.join(", "),
                function
            )));
        }

        let mut time = None;
        let mut space = None;
        for window in args[2..].iter().filter_map(Argument::as_unit) {
            match MethodKind::of_call(window.text()) {
                Some(MethodKind::Time) if time.is_none() => {
                    time = Some(TimeWindow::parse(window)?)
                }
                Some(MethodKind::Space) if space.is_none() => {
                    space = Some(SpaceWindow::parse(window)?)
                }
                Some(MethodKind::Time) => return Err(ParseError::DuplicateModifier("time")),
                Some(MethodKind::Space) => return Err(ParseError::DuplicateModifier("space")),
                _ => {
                    return Err(ParseError::MethodFormat {
                        expected: kind.usage(),
                    })
                }
            }
        }

        Ok(Self {
            name: take_str(&args, 0)?,
            function,
            time,
            space,
        })
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), json!(self.name));
        map.insert("function".to_string(), json!(self.function));
        if let Some(time) = &self.time {
            map.insert("time".to_string(), time.to_value());
        }
        if let Some(space) = &self.space {
            map.insert("space".to_string(), space.to_value());
        }
        Value::Object(map)
    }
}

/// 虚拟属性 `virtual(name, "expression")`
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualProperty {
    /// 属性名
    pub name: String,
    /// 计算表达式
    pub expression: String,
}

impl VirtualProperty {
    /// 解析虚拟属性。
    pub fn parse(unit: &SourceUnit) -> Result<Self, ParseError> {
        let args = method::parse(unit, MethodKind::Virtual, &[NAME, STRING])?;
        let expression = take_str(&args, 1)?;
        if expression.trim().is_empty() {
            return Err(ParseError::Invalid(
                "virtual property expression must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name: take_str(&args, 0)?,
            expression,
        })
    }

    /// 中间代码形式
    pub fn to_value(&self) -> Value {
        json!({ "name": self.name, "expression": self.expression })
    }
}

/// `select(name, ...)`
pub fn parse_select(unit: &SourceUnit) -> Result<Vec<String>, ParseError> {
    let kind = MethodKind::Select;
    let raw = arguments(unit, kind)?;
    expect_at_least(kind, &raw, 1)?;
    let format = vec![NAME; raw.len()];
    convert(kind, &raw, &format)?
        .iter()
        .map(|arg| arg.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ParseError::MethodFormat {
            expected: kind.usage(),
        })
}

/// 拆分 `key=value`，`key` 必须是数据名。
fn split_attribute(unit: &SourceUnit) -> Result<(String, SourceUnit), ParseError> {
    match scanner::split(unit.text(), "=", Some(2))?.as_slice() {
        [key, value] if !value.is_empty() => {
            match ArgType::DataName.convert(&unit.fragment(key)) {
                Some(Argument::DataName(key)) => Ok((key, unit.fragment(value))),
                _ => Err(ParseError::InvalidAttribute(unit.text().to_string())),
            }
        }
        _ => Err(ParseError::InvalidAttribute(unit.text().to_string())),
    }
}

/// `meta(key=value, ...)`，值为字面量。
pub fn parse_meta(unit: &SourceUnit) -> Result<Map<String, Value>, ParseError> {
    let kind = MethodKind::Meta;
    let raw = arguments(unit, kind)?;
    expect_at_least(kind, &raw, 1)?;

    let mut meta = Map::new();
    for arg in &raw {
        let (key, value) = split_attribute(arg)?;
        let value = parse_literal(&value)?.to_value();
        if meta.insert(key.clone(), value).is_some() {
            return Err(ParseError::DuplicateDefinition(key));
        }
    }
    Ok(meta)
}

/// 服务质量要求
#[derive(Debug, Clone, PartialEq)]
pub struct Qos {
    /// 带宽，大于 0
    pub bandwidth: Literal,
    /// 优先级
    pub priority: i64,
}

impl Qos {
    /// `qos(bandwidth, priority)`
    pub fn parse(unit: &SourceUnit) -> Result<Self, ParseError> {
        let args = method::parse(unit, MethodKind::Qos, &[NUMBER, INTEGER])?;
        let bandwidth = take_literal(&args, 0)?;
        check_positive("bandwidth", &bandwidth)?;
        Ok(Self {
            bandwidth,
            priority: args[1].as_i64().unwrap_or_default(),
        })
    }

    /// 中间代码形式
    pub fn to_value(&self) -> Value {
        json!({ "bandwidth": self.bandwidth.to_value(), "priority": self.priority })
    }
}

/// `id("identifier")`
pub fn parse_id(unit: &SourceUnit) -> Result<String, ParseError> {
    let args = method::parse(unit, MethodKind::Id, &[STRING])?;
    let id = take_str(&args, 0)?;
    if id.is_empty() {
        return Err(ParseError::Invalid("id must not be empty".to_string()));
    }
    Ok(id)
}

/// 服务发现查询的保留键
pub const MULTI: &str = "multi";

/// `discovery(key=value, ...)`
///
/// 每个值都规范化为数组，`multi` 除外：它是不小于 1 的整数，默认为 1。
pub fn parse_discovery(unit: &SourceUnit) -> Result<BTreeMap<String, Value>, ParseError> {
    let raw = arguments(unit, MethodKind::Discovery)?;

    let mut attributes = BTreeMap::new();
    for arg in &raw {
        let (key, value) = split_attribute(arg)?;
        let value = if key == MULTI {
            match parse_literal(&value)? {
                Literal::Integer(n) if n >= 1 => json!(n),
                other => {
                    return Err(ParseError::NotPositive {
                        what: "multi",
                        value: other.to_string(),
                    })
                }
            }
        } else {
            Value::Array(parse_attribute_values(&value)?)
        };
        if attributes.insert(key.clone(), value).is_some() {
            return Err(ParseError::DuplicateDefinition(key));
        }
    }

    attributes
        .entry(MULTI.to_string())
        .or_insert_with(|| json!(1));
    Ok(attributes)
}

/// 单个字面量或 `[literal, ...]` 列表。
fn parse_attribute_values(unit: &SourceUnit) -> Result<Vec<Value>, ParseError> {
    let text = unit.text();
    let inner = match text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        Some(inner) => inner,
        None => return Ok(vec![parse_literal(unit)?.to_value()]),
    };
    if inner.trim().is_empty() {
        return Err(ParseError::InvalidLiteral(text.to_string()));
    }
    scanner::split(inner, ",", None)?
        .iter()
        .map(|item| parse_literal(&unit.fragment(item)).map(|literal| literal.to_value()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit::new(text, 0).unwrap()
    }

    #[test]
    fn time_with_equal_bounds() {
        let time = TimeWindow::parse(&unit(
            r#"time(ts, "20200101T000000", "20200101T000000", 1, "second")"#,
        ))
        .unwrap();
        assert_eq!(time.unit, TimeUnit::Second);
        assert_eq!(
            time.to_value(),
            json!({
                "name": "ts",
                "start": "20200101T000000",
                "end": "20200101T000000",
                "interval": 1,
                "unit": "second",
            })
        );
    }

    #[test]
    fn time_errors() {
        let err = TimeWindow::parse(&unit(
            r#"time(ts, "20200102T000000", "20200101T000000", 1, "second")"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ParseError::TimeOrder { .. }));

        let err = TimeWindow::parse(&unit(
            r#"time(ts, "20200101T000000", "20200102T000000", 0, "hour")"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ParseError::NotPositive { what: "time interval", .. }));

        let err = TimeWindow::parse(&unit(
            r#"time(ts, "20200101T000000", "20200102T000000", 1, "week")"#,
        ))
        .unwrap_err();
        assert_eq!(err, ParseError::TimeUnit("week".to_string()));

        let err = TimeWindow::parse(&unit(
            r#"time(ts, "2020-01-01", "20200102T000000", 1, "hour")"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ParseError::ArgumentType { .. }));
    }

    #[test]
    fn space_bounds() {
        let ok = SpaceWindow::parse(&unit("space(lat, long, -180, -90, 180, 90, 0.5, 1)"));
        assert!(ok.is_ok());

        let err = SpaceWindow::parse(&unit("space(lat, long, 181, 0, 180, 10, 1, 1)")).unwrap_err();
        assert!(matches!(err, ParseError::SpaceRange { what: "west", .. }));

        let err = SpaceWindow::parse(&unit("space(lat, long, 0, -91, 10, 10, 1, 1)")).unwrap_err();
        assert!(matches!(err, ParseError::SpaceRange { what: "south", .. }));

        let err = SpaceWindow::parse(&unit("space(lat, long, 10, 0, 0, 10, 1, 1)")).unwrap_err();
        assert_eq!(
            err,
            ParseError::SpaceOrder {
                low: "west",
                high: "east"
            }
        );

        let err = SpaceWindow::parse(&unit("space(lat, long, 0, 10, 10, 0, 1, 1)")).unwrap_err();
        assert_eq!(
            err,
            ParseError::SpaceOrder {
                low: "south",
                high: "north"
            }
        );
    }

    #[test]
    fn cull_values() {
        let time = r#"time(ts, "20200101T000000", "20200102T000000", 1, "hour")"#;
        let ok = Processing::parse(&unit(&format!("cull_time(1, 10, {})", time)), MethodKind::CullTime);
        assert!(ok.is_ok());

        let err = Processing::parse(&unit(&format!("cull_time(3, 2, {})", time)), MethodKind::CullTime)
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::CullValue {
                numerator: 3,
                denominator: 2
            }
        );

        let err = Processing::parse(
            &unit("cull_space(0, 2, space(lat, long, 0, 0, 1, 1, 1, 1))"),
            MethodKind::CullSpace,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::CullValue { numerator: 0, .. }));
    }

    #[test]
    fn aggregate_windows() {
        let time = r#"time(ts, "20200101T000000", "20200102T000000", 1, "hour")"#;
        let space = "space(lat, long, 0, 0, 10, 10, 1, 1)";

        let agg = Processing::parse(
            &unit(&format!(r#"aggregate(temp, "avg", {}, {})"#, time, space)),
            MethodKind::Aggregate,
        )
        .unwrap();
        let value = agg.to_value();
        assert_eq!(value["aggregate"]["function"], json!("avg"));
        assert!(value["aggregate"].get("time").is_some());
        assert!(value["aggregate"].get("space").is_some());

        let agg = Processing::parse(
            &unit(&format!(r#"aggregate(temp, "max", {})"#, space)),
            MethodKind::Aggregate,
        )
        .unwrap();
        assert!(agg.to_value()["aggregate"].get("time").is_none());

        let err = Processing::parse(&unit(r#"aggregate(temp, "avg")"#), MethodKind::Aggregate)
            .unwrap_err();
        assert!(matches!(err, ParseError::ArgumentCount { .. }));

        let err = Processing::parse(
            &unit(&format!(r#"aggregate(temp, "median", {})"#, time)),
            MethodKind::Aggregate,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)));

        let err = Processing::parse(
            &unit(&format!(r#"aggregate(temp, "avg", {}, {})"#, time, time)),
            MethodKind::Aggregate,
        )
        .unwrap_err();
        assert_eq!(err, ParseError::DuplicateModifier("time"));
    }

    #[test]
    fn filter_and_string() {
        let filter =
            Processing::parse(&unit("filter(temp > 20 && humid < 50)"), MethodKind::Filter).unwrap();
        assert_eq!(
            filter.to_value(),
            json!({ "filter": { "-and": [ { "temp": [">", 20] }, { "humid": ["<", 50] } ] } })
        );

        let string = Processing::parse(
            &unit(r#"string(city, "^(\w+)-.*$", "$1")"#),
            MethodKind::String,
        )
        .unwrap();
        assert_eq!(string.to_value()["string"]["replacement"], json!("$1"));
    }

    #[test]
    fn select_meta_qos_id() {
        assert_eq!(
            parse_select(&unit("select(temp, humid)")).unwrap(),
            vec!["temp", "humid"]
        );
        assert!(matches!(
            parse_select(&unit("select()")),
            Err(ParseError::ArgumentCount { .. })
        ));

        let meta = parse_meta(&unit(r#"meta(owner="lab", version=2)"#)).unwrap();
        assert_eq!(meta["owner"], json!("lab"));
        assert_eq!(meta["version"], json!(2));
        assert_eq!(
            parse_meta(&unit("meta(a=1, a=2)")),
            Err(ParseError::DuplicateDefinition("a".to_string()))
        );

        let qos = Qos::parse(&unit("qos(1000, 1)")).unwrap();
        assert_eq!(qos.to_value(), json!({ "bandwidth": 1000, "priority": 1 }));
        assert!(matches!(
            Qos::parse(&unit("qos(0, 1)")),
            Err(ParseError::NotPositive { what: "bandwidth", .. })
        ));

        assert_eq!(parse_id(&unit(r#"id("link-1")"#)).unwrap(), "link-1");
    }

    #[test]
    fn discovery_normalizes_values() {
        let attrs = parse_discovery(&unit(
            r#"discovery(type="weather", area=["tokyo", "osaka"], multi=2)"#,
        ))
        .unwrap();
        assert_eq!(attrs["type"], json!(["weather"]));
        assert_eq!(attrs["area"], json!(["tokyo", "osaka"]));
        assert_eq!(attrs["multi"], json!(2));

        let attrs = parse_discovery(&unit(r#"discovery(type="storage")"#)).unwrap();
        assert_eq!(attrs["multi"], json!(1));

        assert!(matches!(
            parse_discovery(&unit("discovery(multi=0)")),
            Err(ParseError::NotPositive { what: "multi", .. })
        ));
        assert!(matches!(
            parse_discovery(&unit("discovery(type)")),
            Err(ParseError::InvalidAttribute(_))
        ));
        assert!(matches!(
            parse_discovery(&unit("discovery(area=[])")),
            Err(ParseError::InvalidLiteral(_))
        ));
    }
}
