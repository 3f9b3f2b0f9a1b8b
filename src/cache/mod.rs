// 缓存模块
// 序列化、键派生、cache-aside 协调与失效

pub mod aside;
pub mod invalidate;
pub mod keys;
pub mod serialize;

// 重新导出常用类型和函数，方便其他模块使用
pub use aside::{CacheAside, CachePolicy};
pub use invalidate::CacheInvalidator;
pub use keys::{RequestParams, generate_cache_key, request_cache_key};
pub use serialize::{CacheValue, deserialize, serialize};
