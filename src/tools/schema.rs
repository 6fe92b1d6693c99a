//! 工具参数 JSON Schema 生成（schemars 自动生成，注入模型请求减少参数格式错误）

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 由参数结构体派生 JSON Schema；失败时退回空对象 schema
pub fn schema_value<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(schema).unwrap_or_else(|_| {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    })
}
