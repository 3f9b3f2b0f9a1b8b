use md5::{Digest, Md5};

use super::serialize::CacheValue;

/// 单个参数在键中的文本形态
///
/// 复合值取其 JSON 形态（与记录的编码一致），枚举取底层值。
fn key_fragment(value: &CacheValue) -> String {
    match value {
        CacheValue::Null => "null".to_string(),
        CacheValue::Bool(b) => b.to_string(),
        CacheValue::Int(i) => i.to_string(),
        CacheValue::Float(f) => f.to_string(),
        CacheValue::Text(s) => s.clone(),
        CacheValue::Decimal(s) => s.clone(),
        CacheValue::Enum(inner) => key_fragment(inner),
        CacheValue::Opaque(s) => s.clone(),
        CacheValue::List(_) | CacheValue::Map(_) | CacheValue::Record(_) => {
            value.to_json().to_string()
        }
    }
}

/// 从操作标识与实参生成缓存键
///
/// 键形如 `{prefix}:{md5hex}`。命名参数按名称排序后以 `名:值` 形态参与
/// 指纹，位置参数只取值本身，因此同一逻辑值按位置或按名称传入会得到
/// 不同的键（既有行为，保持不变）。
pub fn generate_cache_key(
    prefix: &str,
    args: &[CacheValue],
    kwargs: &[(String, CacheValue)],
) -> String {
    let mut parts = vec![prefix.to_string()];

    for arg in args {
        parts.push(key_fragment(arg));
    }

    let mut named: Vec<&(String, CacheValue)> = kwargs.iter().collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in named {
        parts.push(format!("{}:{}", name, key_fragment(value)));
    }

    let key_str = parts.join(":");
    format!("{}:{:x}", prefix, Md5::digest(key_str.as_bytes()))
}

/// 一次请求提供的参数上下文（由路由层传入）
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub path_params: Vec<(String, String)>,
    pub query_params: Vec<(String, String)>,
}

/// 从请求上下文派生操作的缓存键
///
/// 路径参数与查询参数各自按名称排序后以 `名:值` 片段参与指纹，
/// 是否纳入由调用方的策略开关决定。参数集相同则键必然相同。
pub fn request_cache_key(
    prefix: &str,
    params: &RequestParams,
    include_path_params: bool,
    include_query_params: bool,
) -> String {
    let mut args = Vec::new();

    if include_path_params {
        let mut pairs = params.path_params.clone();
        pairs.sort();
        for (name, value) in pairs {
            args.push(CacheValue::Text(format!("{}:{}", name, value)));
        }
    }

    if include_query_params {
        let mut pairs = params.query_params.clone();
        pairs.sort();
        for (name, value) in pairs {
            args.push(CacheValue::Text(format!("{}:{}", name, value)));
        }
    }

    generate_cache_key(prefix, &args, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_carries_prefix_and_digest() {
        let key = generate_cache_key("products_all", &[CacheValue::Int(1)], &[]);
        assert!(key.starts_with("products_all:"));
        // md5 十六进制摘要固定 32 位
        assert_eq!(key.len(), "products_all:".len() + 32);
    }

    #[test]
    fn kwarg_order_does_not_change_key() {
        let forward = [
            ("page".to_string(), CacheValue::Int(2)),
            ("size".to_string(), CacheValue::Int(50)),
        ];
        let reversed = [
            ("size".to_string(), CacheValue::Int(50)),
            ("page".to_string(), CacheValue::Int(2)),
        ];
        assert_eq!(
            generate_cache_key("products", &[], &forward),
            generate_cache_key("products", &[], &reversed)
        );
    }

    #[test]
    fn positional_and_named_of_equal_value_stay_distinct() {
        let positional = generate_cache_key("products", &[CacheValue::Int(7)], &[]);
        let named = generate_cache_key(
            "products",
            &[],
            &[("id".to_string(), CacheValue::Int(7))],
        );
        assert_ne!(positional, named);
    }

    #[test]
    fn differing_params_produce_differing_keys() {
        let a = generate_cache_key("products", &[CacheValue::Int(1)], &[]);
        let b = generate_cache_key("products", &[CacheValue::Int(2)], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn enum_fragment_is_its_underlying_value() {
        let direct = generate_cache_key("orders", &[CacheValue::Text("paid".to_string())], &[]);
        let wrapped = generate_cache_key(
            "orders",
            &[CacheValue::Enum(Box::new(CacheValue::Text(
                "paid".to_string(),
            )))],
            &[],
        );
        assert_eq!(direct, wrapped);
    }

    #[test]
    fn request_key_is_stable_under_param_order() {
        let forward = RequestParams {
            path_params: vec![("product_id".to_string(), "3".to_string())],
            query_params: vec![
                ("page".to_string(), "1".to_string()),
                ("size".to_string(), "20".to_string()),
            ],
        };
        let reversed = RequestParams {
            path_params: forward.path_params.clone(),
            query_params: forward.query_params.iter().rev().cloned().collect(),
        };
        assert_eq!(
            request_cache_key("products_all", &forward, true, true),
            request_cache_key("products_all", &reversed, true, true)
        );
    }

    #[test]
    fn excluded_query_params_do_not_affect_key() {
        let with_query = RequestParams {
            path_params: vec![("id".to_string(), "9".to_string())],
            query_params: vec![("page".to_string(), "4".to_string())],
        };
        let without_query = RequestParams {
            path_params: with_query.path_params.clone(),
            query_params: Vec::new(),
        };
        assert_eq!(
            request_cache_key("product_id", &with_query, true, false),
            request_cache_key("product_id", &without_query, true, true)
        );
        assert_ne!(
            request_cache_key("product_id", &with_query, true, true),
            request_cache_key("product_id", &without_query, true, true)
        );
    }

    proptest! {
        #[test]
        fn key_is_deterministic(prefix in "[a-z_]{1,12}", n in any::<i64>(), s in "[a-zA-Z0-9]{0,16}") {
            let args = [CacheValue::Int(n), CacheValue::Text(s)];
            prop_assert_eq!(
                generate_cache_key(&prefix, &args, &[]),
                generate_cache_key(&prefix, &args, &[])
            );
        }

        #[test]
        fn named_params_are_order_insensitive(
            a in "[a-m]{1,6}",
            b in "[n-z]{1,6}",
            va in any::<i64>(),
            vb in any::<i64>(),
        ) {
            let forward = [
                (a.clone(), CacheValue::Int(va)),
                (b.clone(), CacheValue::Int(vb)),
            ];
            let reversed = [
                (b, CacheValue::Int(vb)),
                (a, CacheValue::Int(va)),
            ];
            prop_assert_eq!(
                generate_cache_key("p", &[], &forward),
                generate_cache_key("p", &[], &reversed)
            );
        }
    }
}
