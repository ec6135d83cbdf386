//! 天气工具：OpenWeatherMap 5 天 / 3 小时预报接口
//!
//! OpenWeatherClient 被 get_weather 与 get_weather_forecast 共享。
//! 上游温度单位为开尔文，统一换算为摄氏度（k - 273.15，保留一位小数）。
//! HTTP 状态映射：401/404 为 Rejected；429、5xx、网络错误、超时、响应格式错误为 Transient。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolFailure;
use crate::tools::output::{sanitize_text, Field};
use crate::tools::{parameters_schema_for, parse_args, Tool, ToolOutput};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// 开尔文转摄氏度，保留一位小数
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    ((kelvin - 273.15) * 10.0).round() / 10.0
}

/// /data/2.5/forecast 响应中用到的字段
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
    #[serde(default)]
    pub city: Option<City>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct City {
    #[serde(default)]
    pub name: String,
}

/// 单个 3 小时预报点
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEntry {
    pub main: Readings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub dt_txt: String,
    /// 降水概率（0..1）
    #[serde(default)]
    pub pop: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Readings {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub humidity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub description: String,
}

impl ForecastEntry {
    pub fn description(&self) -> &str {
        self.weather.first().map(|w| w.description.as_str()).unwrap_or("unknown")
    }
}

/// OpenWeatherMap HTTP 客户端；api_key 为 None 时所有请求返回 NotConfigured
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    pub fn new(base_url: Option<&str>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            base_url: base_url
                .unwrap_or(OPENWEATHER_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// 从环境变量读取 API key（变量缺失不是启动错误）
    pub fn from_env(base_url: Option<&str>, api_key_env: &str, timeout: Duration) -> Self {
        Self::new(base_url, std::env::var(api_key_env).ok(), timeout)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn fetch_forecast(&self, location: &str) -> Result<ForecastResponse, ToolFailure> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolFailure::NotConfigured("API key not configured".to_string()))?;
        let url = format!("{}/data/2.5/forecast", self.base_url);
        tracing::debug!(location = %location, "openweather request");

        let resp = self
            .client
            .get(&url)
            .query(&[("q", location), ("appid", api_key)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolFailure::Transient("request timed out".to_string())
                } else {
                    ToolFailure::Transient("network error".to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(map_status(status));
        }
        resp.json::<ForecastResponse>()
            .await
            .map_err(|_| ToolFailure::Transient("invalid response format".to_string()))
    }
}

fn map_status(status: StatusCode) -> ToolFailure {
    let code = status.as_u16();
    match code {
        401 => ToolFailure::Rejected("invalid API key (HTTP 401)".to_string()),
        404 => ToolFailure::Rejected("location not found (HTTP 404)".to_string()),
        429 => ToolFailure::Transient("rate limited (HTTP 429)".to_string()),
        500..=599 => ToolFailure::Transient(format!("upstream error (HTTP {})", code)),
        _ => ToolFailure::Rejected(format!("HTTP {}", code)),
    }
}

/// 地点参数校验：去除首尾空白后至少 2 个字符
pub(crate) fn validate_location(raw: &str) -> Result<String, ToolFailure> {
    let location = raw.trim();
    if location.chars().count() < 2 {
        return Err(ToolFailure::InvalidArguments(
            "location must be a city or place name of at least 2 characters".to_string(),
        ));
    }
    Ok(location.to_string())
}

pub(crate) fn location_subject(args: &Value) -> String {
    args.get("location")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown location".to_string())
}

#[allow(dead_code)]
#[derive(Debug, Deserialize, JsonSchema)]
struct WeatherArgs {
    /// City or location name, e.g. "Paris" or "New York"
    location: String,
}

/// 当前天气：取预报列表的第一条
pub struct WeatherTool {
    client: Arc<OpenWeatherClient>,
}

impl WeatherTool {
    pub fn new(client: Arc<OpenWeatherClient>) -> Self {
        Self { client }
    }
}

/// 把第一条预报渲染为 `weather: {...}`；同样的上游数据总是得到同样的字节
pub fn render_current(location: &str, forecast: &ForecastResponse) -> ToolOutput {
    let Some(entry) = forecast.list.first() else {
        return ToolOutput::plain(format!("No weather data available for {}", sanitize_text(location)));
    };
    let feels_like = entry.main.feels_like.unwrap_or(entry.main.temp);
    ToolOutput::structured(
        "weather",
        Field::record([
            ("temp_c", Field::Decimal(kelvin_to_celsius(entry.main.temp))),
            ("feels_like_c", Field::Decimal(kelvin_to_celsius(feels_like))),
            ("description", Field::text(entry.description())),
            ("humidity", Field::Int(entry.main.humidity.round() as i64)),
            ("timestamp", Field::text(entry.dt_txt.clone())),
        ]),
    )
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather (temperature, feels-like, conditions, humidity) for a city. \
         Use for questions about weather right now or packing for an imminent trip."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<WeatherArgs>()
    }

    fn capability(&self) -> &str {
        "Weather data"
    }

    fn subject(&self, args: &Value) -> String {
        location_subject(args)
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let args: WeatherArgs = parse_args(args)?;
        let location = validate_location(&args.location)?;
        let forecast = self.client.fetch_forecast(&location).await?;
        tracing::info!(location = %location, entries = forecast.list.len(), "weather retrieved");
        Ok(render_current(&location, &forecast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn paris_payload() -> Value {
        json!({
            "cod": "200",
            "list": [
                {
                    "dt": 1714564800,
                    "main": {"temp": 291.35, "feels_like": 290.65, "humidity": 61},
                    "weather": [{"id": 800, "main": "Clear", "description": "clear sky"}],
                    "pop": 0.0,
                    "dt_txt": "2024-05-01 12:00:00"
                },
                {
                    "dt": 1714575600,
                    "main": {"temp": 289.0, "feels_like": 288.0, "humidity": 70},
                    "weather": [{"description": "few clouds"}],
                    "dt_txt": "2024-05-01 15:00:00"
                }
            ],
            "city": {"name": "Paris"}
        })
    }

    fn client_for(server: &MockServer, key: Option<&str>) -> Arc<OpenWeatherClient> {
        Arc::new(OpenWeatherClient::new(
            Some(&server.uri()),
            key.map(str::to_string),
            Duration::from_secs(5),
        ))
    }

    #[test]
    fn test_kelvin_to_celsius() {
        assert_eq!(kelvin_to_celsius(291.35), 18.2);
        assert_eq!(kelvin_to_celsius(273.15), 0.0);
    }

    #[tokio::test]
    async fn test_paris_weather_exact_format() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("q", "Paris"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_payload()))
            .mount(&server)
            .await;

        let tool = WeatherTool::new(client_for(&server, Some("test-key")));
        let out = tool.invoke(json!({"location": "Paris"})).await.unwrap().render();
        assert_eq!(
            out,
            r#"weather: {temp_c: 18.2, feels_like_c: 17.5, description: "clear sky", humidity: 61, timestamp: "2024-05-01 12:00:00"}"#
        );

        let again = tool.invoke(json!({"location": "  Paris "})).await.unwrap().render();
        assert_eq!(out, again);
    }

    #[tokio::test]
    async fn test_empty_list_is_plain_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
            .mount(&server)
            .await;

        let tool = WeatherTool::new(client_for(&server, Some("k")));
        let out = tool.invoke(json!({"location": "Atlantis"})).await.unwrap();
        assert_eq!(out.render(), "No weather data available for Atlantis");
    }

    #[test]
    fn test_no_data_location_is_sanitized() {
        let out = render_current("Lost\r\nCity \"X\"", &ForecastResponse { list: vec![], city: None });
        assert_eq!(out.render(), "No weather data available for Lost  City 'X'");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let server = MockServer::start().await;
        let tool = WeatherTool::new(client_for(&server, None));
        let err = tool.invoke(json!({"location": "Paris"})).await.unwrap_err();
        assert_eq!(err, ToolFailure::NotConfigured("API key not configured".into()));
    }

    #[tokio::test]
    async fn test_short_location_rejected() {
        let server = MockServer::start().await;
        let tool = WeatherTool::new(client_for(&server, Some("k")));
        let err = tool.invoke(json!({"location": " P "})).await.unwrap_err();
        assert!(matches!(err, ToolFailure::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "Nowhere"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "Busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "Garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        assert!(matches!(client.fetch_forecast("Nowhere").await, Err(ToolFailure::Rejected(_))));
        assert!(matches!(client.fetch_forecast("Busy").await, Err(ToolFailure::Transient(_))));
        assert_eq!(
            client.fetch_forecast("Garbled").await.unwrap_err(),
            ToolFailure::Transient("invalid response format".into())
        );
    }

    #[test]
    fn test_subject_uses_location() {
        assert_eq!(location_subject(&json!({"location": " Rome "})), "Rome");
        assert_eq!(location_subject(&json!({})), "unknown location");
    }
}
