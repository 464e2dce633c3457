//! HTSP 消息模型
//!
//! 后端协议使用自描述的二进制 map（htsmsg）。二进制编解码由传输层负责，
//! 这里只定义解码后的内存形态和带类型的字段访问。线上所有整数都是 s64，
//! 因此 u32/s32 访问器需要做范围检查。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 二进制字段（JSON 中写作 `{"bin": [..]}`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Binary {
    pub bin: Vec<u8>,
}

/// 单个字段值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HtsField {
    S64(i64),
    Str(String),
    Bin(Binary),
    List(Vec<HtsField>),
    Map(HtsMsg),
}

impl HtsField {
    pub fn as_map(&self) -> Option<&HtsMsg> {
        match self {
            HtsField::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// 一条 HTSP 消息（字段名 → 值）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HtsMsg {
    fields: BTreeMap<String, HtsField>,
}

impl HtsMsg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&HtsField> {
        self.fields.get(name)
    }

    // ============= 构造 =============

    pub fn add_s64(mut self, name: &str, value: i64) -> Self {
        self.fields.insert(name.to_string(), HtsField::S64(value));
        self
    }

    pub fn add_s32(self, name: &str, value: i32) -> Self {
        self.add_s64(name, i64::from(value))
    }

    pub fn add_u32(self, name: &str, value: u32) -> Self {
        self.add_s64(name, i64::from(value))
    }

    pub fn add_str(mut self, name: &str, value: &str) -> Self {
        self.fields
            .insert(name.to_string(), HtsField::Str(value.to_string()));
        self
    }

    pub fn add_bin(mut self, name: &str, value: &[u8]) -> Self {
        self.fields.insert(
            name.to_string(),
            HtsField::Bin(Binary {
                bin: value.to_vec(),
            }),
        );
        self
    }

    pub fn add_map(mut self, name: &str, value: HtsMsg) -> Self {
        self.fields.insert(name.to_string(), HtsField::Map(value));
        self
    }

    pub fn add_list(mut self, name: &str, value: Vec<HtsField>) -> Self {
        self.fields.insert(name.to_string(), HtsField::List(value));
        self
    }

    // ============= 读取 =============

    pub fn get_s64(&self, name: &str) -> Option<i64> {
        match self.fields.get(name)? {
            HtsField::S64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.get_s64(name).and_then(|v| u32::try_from(v).ok())
    }

    pub fn get_s32(&self, name: &str) -> Option<i32> {
        self.get_s64(name).and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_u32_or_default(&self, name: &str, default: u32) -> u32 {
        self.get_u32(name).unwrap_or(default)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            HtsField::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_bin(&self, name: &str) -> Option<&[u8]> {
        match self.fields.get(name)? {
            HtsField::Bin(b) => Some(b.bin.as_slice()),
            _ => None,
        }
    }

    pub fn get_list(&self, name: &str) -> Option<&[HtsField]> {
        match self.fields.get(name)? {
            HtsField::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    pub fn get_map(&self, name: &str) -> Option<&HtsMsg> {
        self.fields.get(name)?.as_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let msg = HtsMsg::new()
            .add_u32("stream", 3)
            .add_s64("pts", -5)
            .add_str("type", "H264")
            .add_bin("payload", &[1, 2, 3]);

        assert_eq!(msg.get_u32("stream"), Some(3));
        assert_eq!(msg.get_s64("pts"), Some(-5));
        assert_eq!(msg.get_u32("pts"), None);
        assert_eq!(msg.get_str("type"), Some("H264"));
        assert_eq!(msg.get_bin("payload"), Some(&[1u8, 2, 3][..]));
        assert_eq!(msg.get_bin("type"), None);
        assert_eq!(msg.get_u32_or_default("missing", 7), 7);
    }

    #[test]
    fn test_u32_range_checked() {
        let msg = HtsMsg::new().add_s64("big", i64::from(u32::MAX) + 1);
        assert_eq!(msg.get_u32("big"), None);
        assert_eq!(msg.get_s32("big"), None);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "subscriptionId": 1,
            "payload": { "bin": [0, 255] },
            "streams": [ { "index": 0, "type": "AAC" } ],
            "sourceinfo": { "service": "Das Erste" }
        }"#;
        let msg: HtsMsg = serde_json::from_str(json).unwrap();

        assert_eq!(msg.get_u32("subscriptionId"), Some(1));
        assert_eq!(msg.get_bin("payload"), Some(&[0u8, 255][..]));
        let streams = msg.get_list("streams").unwrap();
        assert_eq!(streams[0].as_map().unwrap().get_str("type"), Some("AAC"));
        assert_eq!(
            msg.get_map("sourceinfo").unwrap().get_str("service"),
            Some("Das Erste")
        );
    }
}
