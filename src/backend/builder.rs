//! 中间代码构建器。

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::frontend::{
    ast::{EndpointRef, Merge, Switch, Transmission, Trigger},
    bloom::Rules,
    Dsn,
};

use super::{
    AppRequest, EndpointRequest, EventCode, IntermediateCode, MergeCode, ServiceLink, TriggerCode,
    TriggerSwitch,
};

/// 用于构建中间代码的构建器。
#[derive(Default)]
pub struct IntermediateBuilder {
    overlay: String,
    services: BTreeMap<String, BTreeMap<String, Value>>,
    rules: RulesBuilder,
    events: Vec<EventCode>,
}

impl IntermediateBuilder {
    /// 创建一个新的 `IntermediateBuilder`。
    pub fn new(overlay: impl Into<String>) -> Self {
        Self {
            overlay: overlay.into(),
            ..Default::default()
        }
    }

    /// 加入一个已分析的 DSN 描述。
    pub fn dsn(&mut self, dsn: &Dsn) -> &mut Self {
        for service in &dsn.state.services {
            self.services
                .insert(service.reference(), service.discovery.clone());
        }

        self.rules.rules(&dsn.bloom.rules);
        for event in &dsn.bloom.events {
            let mut rules = RulesBuilder::default();
            rules.rules(&event.rules);
            let (service_links, trigger, merges) = rules.build();
            self.events.push(EventCode {
                conditions: event.condition.to_value(),
                service_links,
                trigger,
                merges,
            });
        }
        self
    }

    /// 构建中间代码。
    pub fn build(self) -> IntermediateCode {
        let (service_links, trigger, merges) = self.rules.build();
        IntermediateCode {
            overlay: self.overlay,
            services: self.services,
            service_links,
            trigger,
            merges,
            events: self.events,
        }
    }

    /// 从 DSN 描述构建中间代码。
    pub fn build_code(overlay: &str, dsn: &Dsn) -> IntermediateCode {
        let mut builder = Self::new(overlay);
        builder.dsn(dsn);
        builder.build()
    }
}

#[derive(Default)]
struct RulesBuilder {
    service_links: Vec<ServiceLink>,
    trigger: BTreeMap<String, TriggerSwitch>,
    merges: Vec<MergeCode>,
}

impl RulesBuilder {
    fn rules(&mut self, rules: &Rules) -> &mut Self {
        for transmission in &rules.transmissions {
            self.transmission(transmission);
        }
        for trigger in &rules.triggers {
            self.trigger(trigger);
        }
        for merge in &rules.merges {
            self.merge(merge);
        }
        self
    }

    fn transmission(&mut self, t: &Transmission) {
        let qos = match t.qos.as_ref().map(|qos| qos.to_value()) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        self.service_links.push(ServiceLink {
            src: format!("@{}", t.source),
            dst: format!("@{}", t.destination),
            app_request: AppRequest {
                processing: t.processing.iter().map(|p| p.to_value()).collect(),
                channel: endpoint(&t.channel),
                scratch: endpoint(&t.scratch),
                qos,
                id: t.id.clone().unwrap_or_default(),
            },
        });
    }

    fn trigger(&mut self, t: &Trigger) {
        let code = TriggerCode {
            trigger_interval: t.interval.to_value(),
            trigger_conditions: t.trigger_condition.to_value(),
            conditions: t.condition.to_value(),
            channel: t.channel.clone(),
        };
        let switch = self.trigger.entry(t.event.clone()).or_default();
        match t.switch {
            Switch::On => switch.on.push(code),
            Switch::Off => switch.off.push(code),
        }
    }

    fn merge(&mut self, m: &Merge) {
        self.merges.push(MergeCode {
            kind: m.kind.name().to_string(),
            delay: m.delay.to_value(),
            src: m.sources.clone(),
            dst: m.destination.clone(),
            virtual_property: m.virtual_property.as_ref().map(|v| v.to_value()),
        });
    }

    fn build(
        self,
    ) -> (
        Vec<ServiceLink>,
        BTreeMap<String, TriggerSwitch>,
        Vec<MergeCode>,
    ) {
        (self.service_links, self.trigger, self.merges)
    }
}

fn endpoint(e: &EndpointRef) -> EndpointRequest {
    EndpointRequest {
        name: e.name.clone(),
        select: e.select.clone(),
        meta: e.meta.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend;
    use serde_json::json;

    const TEXT: &str = r#"
state do
  @a: discovery(type="a")
  @b: discovery(type=["b", "c"], multi=3)
  scratch s1: @a
  channel c1: @b
  channel c2: @b
end

bloom do
  c1 <~ s1.filter(t > 1).qos(10, 1)
  ev <+ c1.trigger(5, count > 2, t > 3)
  c2 <~ join(0, c1, c2, virtual(v, "t * 2"))
  ev.on do
    c2 <~ s1.id("x")
    ev <- c2.trigger(5, count < 1, t > 3)
  end
end
"#;

    #[test]
    fn builds_the_fixed_shape() {
        let dsn = frontend::parse(TEXT).unwrap();
        let code = IntermediateBuilder::build_code("demo", &dsn);
        let value = serde_json::to_value(&code).unwrap();

        assert_eq!(value["overlay"], json!("demo"));
        assert_eq!(
            value["services"],
            json!({
                "@a": { "type": ["a"], "multi": 1 },
                "@b": { "type": ["b", "c"], "multi": 3 },
            })
        );
        assert_eq!(
            value["service_links"],
            json!([{
                "src": "@a",
                "dst": "@b",
                "app_request": {
                    "processing": [ { "filter": { "t": [">", 1] } } ],
                    "channel": { "name": "c1", "select": [], "meta": {} },
                    "scratch": { "name": "s1", "select": [], "meta": {} },
                    "qos": { "bandwidth": 10, "priority": 1 },
                    "id": "",
                }
            }])
        );
        assert_eq!(
            value["trigger"],
            json!({
                "ev": {
                    "on": [{
                        "trigger_interval": 5,
                        "trigger_conditions": { "count": [">", 2] },
                        "conditions": { "t": [">", 3] },
                        "channel": "c1",
                    }],
                    "off": [],
                }
            })
        );
        assert_eq!(
            value["merges"],
            json!([{
                "type": "join",
                "delay": 0,
                "src": ["c1", "c2"],
                "dst": "c2",
                "virtual": { "name": "v", "expression": "t * 2" },
            }])
        );

        let event = &value["events"][0];
        assert_eq!(event["conditions"], json!({ "ev": ["==", "on"] }));
        assert_eq!(event["service_links"][0]["app_request"]["qos"], json!({}));
        assert_eq!(event["service_links"][0]["app_request"]["id"], json!("x"));
        assert_eq!(event["trigger"]["ev"]["off"][0]["channel"], json!("c2"));
        assert_eq!(event["merges"], json!([]));
    }

    #[test]
    fn merge_without_virtual_omits_the_key() {
        let text = TEXT.replace(r#"join(0, c1, c2, virtual(v, "t * 2"))"#, "merge(1, c1)");
        let dsn = frontend::parse(&text).unwrap();
        let value = serde_json::to_value(IntermediateBuilder::build_code("demo", &dsn)).unwrap();
        assert!(value["merges"][0].get("virtual").is_none());
        assert_eq!(value["merges"][0]["type"], json!("merge"));
    }
}
