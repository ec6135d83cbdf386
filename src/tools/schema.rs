//! 工具参数 Schema 与校验（schemars 自动生成参数 Schema）
//!
//! 每个工具用一个 `#[derive(Deserialize, JsonSchema)]` 结构体声明参数（类型与默认值），
//! parameters_schema_for 生成传给模型的 JSON Schema，parse_args 做实际校验。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::ToolFailure;

/// 生成参数 JSON Schema（去掉 `$schema` / `title` 等对模型无用的元字段）
pub fn parameters_schema_for<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// 将模型给出的参数解析为强类型结构
///
/// - `null` 视为空对象（便于只有默认值参数的工具）
/// - 字符串先尝试按 JSON 解析（部分模型把参数当成字符串返回）
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolFailure> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        Value::String(raw) => serde_json::from_str(&raw).map_err(|_| {
            ToolFailure::InvalidArguments(format!("arguments must be a JSON object, got: {}", raw))
        })?,
        other => other,
    };
    if !args.is_object() {
        return Err(ToolFailure::InvalidArguments(format!(
            "arguments must be a JSON object, got: {}",
            args
        )));
    }
    serde_json::from_value(args).map_err(|e| ToolFailure::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Debug, Deserialize, JsonSchema)]
    struct SampleArgs {
        /// City name
        location: String,
        #[serde(default = "default_days")]
        days: u32,
    }

    fn default_days() -> u32 {
        5
    }

    #[test]
    fn test_schema_lists_required_and_defaults() {
        let schema = parameters_schema_for::<SampleArgs>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["location"]["type"], "string");
        assert_eq!(schema["properties"]["days"]["default"], 5);
        assert_eq!(schema["required"], json!(["location"]));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_parse_args_applies_defaults() {
        let args: SampleArgs = parse_args(json!({"location": "Rome"})).unwrap();
        assert_eq!(args.location, "Rome");
        assert_eq!(args.days, 5);
    }

    #[test]
    fn test_parse_args_accepts_json_string() {
        let args: SampleArgs = parse_args(Value::String(r#"{"location": "Oslo", "days": 2}"#.into())).unwrap();
        assert_eq!(args.days, 2);
    }

    #[test]
    fn test_parse_args_reports_missing_field() {
        let err = parse_args::<SampleArgs>(json!({"days": 3})).unwrap_err();
        match err {
            ToolFailure::InvalidArguments(msg) => assert!(msg.contains("location")),
            other => panic!("Expected InvalidArguments, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_args_rejects_non_object() {
        assert!(parse_args::<SampleArgs>(json!([1, 2])).is_err());
        assert!(parse_args::<SampleArgs>(Value::String("{broken".into())).is_err());
    }
}
