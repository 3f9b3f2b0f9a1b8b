use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// 缓存值
///
/// 编码器能处理的封闭类型集合。未知形状通过 `from_serialize`
/// 归入 `Record`，实在无法编码的退化为 `Opaque` 字符串表示，
/// 编码过程对未见过的类型永不报错。
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// 定点十进制数，编码为浮点（调用方需容忍可表示精度的损失）
    Decimal(String),
    /// 枚举，编码为其底层值
    Enum(Box<CacheValue>),
    List(Vec<CacheValue>),
    Map(BTreeMap<String, CacheValue>),
    /// 结构化领域记录，逐字段编码
    Record(BTreeMap<String, CacheValue>),
    /// 不可序列化值的字符串兜底表示
    Opaque(String),
}

impl CacheValue {
    /// 通过 serde 反射转换任意可序列化值
    ///
    /// 转换失败时退化为 `Opaque` 并记录告警，从不向调用方报错。
    pub fn from_serialize<T: Serialize + std::fmt::Debug>(value: &T) -> CacheValue {
        match serde_json::to_value(value) {
            Ok(Value::Object(fields)) => CacheValue::Record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, CacheValue::from_json(v)))
                    .collect(),
            ),
            Ok(other) => CacheValue::from_json(other),
            Err(e) => {
                tracing::warn!(
                    "Falling back to string representation for {}: {}",
                    std::any::type_name::<T>(),
                    e
                );
                CacheValue::Opaque(format!("{:?}", value))
            }
        }
    }

    pub fn from_json(value: Value) -> CacheValue {
        match value {
            Value::Null => CacheValue::Null,
            Value::Bool(b) => CacheValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CacheValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    CacheValue::Float(f)
                } else {
                    CacheValue::Text(n.to_string())
                }
            }
            Value::String(s) => CacheValue::Text(s),
            Value::Array(items) => {
                CacheValue::List(items.into_iter().map(CacheValue::from_json).collect())
            }
            Value::Object(fields) => CacheValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, CacheValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CacheValue::Null => Value::Null,
            CacheValue::Bool(b) => Value::Bool(*b),
            CacheValue::Int(i) => Value::from(*i),
            CacheValue::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Value::Number(n),
                None => {
                    tracing::warn!("Falling back to string representation for float {}", f);
                    Value::String(f.to_string())
                }
            },
            CacheValue::Text(s) => Value::String(s.clone()),
            CacheValue::Decimal(s) => match s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Some(n) => Value::Number(n),
                None => {
                    tracing::warn!("Falling back to string representation for decimal {}", s);
                    Value::String(s.clone())
                }
            },
            CacheValue::Enum(inner) => inner.to_json(),
            CacheValue::List(items) => Value::Array(items.iter().map(CacheValue::to_json).collect()),
            CacheValue::Map(fields) | CacheValue::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            CacheValue::Opaque(s) => Value::String(s.clone()),
        }
    }
}

/// 编码为存入存储的字符串
pub fn serialize(value: &CacheValue) -> Result<String, StoreError> {
    serde_json::to_string(&value.to_json()).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// 从存储的字符串解码
///
/// 非 JSON 负载原样退化为 `Text`，不报错。
pub fn deserialize(raw: &str) -> CacheValue {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => CacheValue::from_json(value),
        Err(_) => CacheValue::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &CacheValue) -> CacheValue {
        deserialize(&serialize(value).unwrap())
    }

    #[test]
    fn primitives_round_trip() {
        assert_eq!(round_trip(&CacheValue::Null), CacheValue::Null);
        assert_eq!(round_trip(&CacheValue::Bool(true)), CacheValue::Bool(true));
        assert_eq!(round_trip(&CacheValue::Int(-42)), CacheValue::Int(-42));
        assert_eq!(round_trip(&CacheValue::Float(1.5)), CacheValue::Float(1.5));
        assert_eq!(
            round_trip(&CacheValue::Text("hello".to_string())),
            CacheValue::Text("hello".to_string())
        );
    }

    #[test]
    fn containers_round_trip() {
        let list = CacheValue::List(vec![CacheValue::Int(1), CacheValue::Text("x".to_string())]);
        assert_eq!(round_trip(&list), list);

        let map = CacheValue::Map(BTreeMap::from([
            ("a".to_string(), CacheValue::Int(1)),
            ("b".to_string(), CacheValue::Null),
        ]));
        assert_eq!(round_trip(&map), map);
    }

    #[test]
    fn decimal_encodes_as_float() {
        let got = round_trip(&CacheValue::Decimal("99.99".to_string()));
        match got {
            CacheValue::Float(f) => assert!((f - 99.99).abs() < 1e-9),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn unparseable_decimal_degrades_to_text() {
        let got = round_trip(&CacheValue::Decimal("not-a-number".to_string()));
        assert_eq!(got, CacheValue::Text("not-a-number".to_string()));
    }

    #[test]
    fn enum_encodes_as_underlying_value() {
        let status = CacheValue::Enum(Box::new(CacheValue::Text("active".to_string())));
        assert_eq!(
            serialize(&status).unwrap(),
            serialize(&CacheValue::Text("active".to_string())).unwrap()
        );
    }

    #[test]
    fn record_encodes_field_by_field() {
        #[derive(Debug, serde::Serialize)]
        struct Product {
            id: i64,
            name: String,
            price: f64,
            is_active: bool,
        }

        let value = CacheValue::from_serialize(&Product {
            id: 1,
            name: "Test Product".to_string(),
            price: 99.99,
            is_active: true,
        });
        match &value {
            CacheValue::Record(fields) => {
                assert_eq!(fields.get("id"), Some(&CacheValue::Int(1)));
                assert_eq!(
                    fields.get("name"),
                    Some(&CacheValue::Text("Test Product".to_string()))
                );
                assert_eq!(fields.get("price"), Some(&CacheValue::Float(99.99)));
                assert_eq!(fields.get("is_active"), Some(&CacheValue::Bool(true)));
            }
            other => panic!("expected record, got {:?}", other),
        }

        // 记录经编码后以 Map 形态读回，字段不变
        match round_trip(&value) {
            CacheValue::Map(fields) => {
                assert_eq!(fields.get("id"), Some(&CacheValue::Int(1)));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn nan_float_degrades_to_text() {
        let got = round_trip(&CacheValue::Float(f64::NAN));
        assert_eq!(got, CacheValue::Text("NaN".to_string()));
    }

    #[test]
    fn opaque_survives_as_text() {
        let got = round_trip(&CacheValue::Opaque("<object at 0x1>".to_string()));
        assert_eq!(got, CacheValue::Text("<object at 0x1>".to_string()));
    }

    #[test]
    fn non_json_payload_deserializes_to_raw_text() {
        assert_eq!(
            deserialize("plain cached string"),
            CacheValue::Text("plain cached string".to_string())
        );
    }
}
