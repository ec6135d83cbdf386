//! 多日天气预报：把 3 小时粒度的预报点按日期聚合为每日摘要

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolFailure;
use crate::tools::output::{sanitize_text, Field};
use crate::tools::weather::{kelvin_to_celsius, location_subject, validate_location, ForecastEntry, OpenWeatherClient};
use crate::tools::{parameters_schema_for, parse_args, Tool, ToolOutput};

pub const MAX_FORECAST_DAYS: i64 = 5;

#[derive(Debug, Deserialize, JsonSchema)]
struct ForecastArgs {
    /// City or location name, e.g. "Tokyo"
    location: String,
    /// Number of days to forecast (1-5)
    #[serde(default)]
    #[schemars(with = "Option<i64>")]
    days: Option<Value>,
}

/// 单日摘要
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub label: String,
    pub date: NaiveDate,
    pub min_c: f64,
    pub max_c: f64,
    pub description: String,
    pub humidity: i64,
    pub precipitation_pct: i64,
}

impl DaySummary {
    fn to_field(&self) -> Field {
        Field::record([
            ("label", Field::text(self.label.clone())),
            ("date", Field::text(self.date.format("%Y-%m-%d").to_string())),
            ("min_c", Field::Decimal(self.min_c)),
            ("max_c", Field::Decimal(self.max_c)),
            ("description", Field::text(self.description.clone())),
            ("humidity", Field::Int(self.humidity)),
            ("precipitation_pct", Field::Int(self.precipitation_pct)),
        ])
    }
}

/// 超出 1..=5 的天数按 5 处理
pub fn normalize_days(days: i64) -> i64 {
    if (1..=MAX_FORECAST_DAYS).contains(&days) {
        days
    } else {
        MAX_FORECAST_DAYS
    }
}

/// 宽松解析 days：整数、整数值的浮点数和数字字符串按 normalize_days 处理，其余（含缺省、null）一律取 5
pub fn days_from_value(raw: Option<&Value>) -> i64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 1e9).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.map(normalize_days).unwrap_or(MAX_FORECAST_DAYS)
}

/// 按日期聚合：只保留 [today, today + days) 范围内的预报点；无法解析时间的点跳过
pub fn summarize_days(entries: &[ForecastEntry], today: NaiveDate, days: i64) -> Vec<DaySummary> {
    let mut grouped: BTreeMap<NaiveDate, Vec<&ForecastEntry>> = BTreeMap::new();
    for entry in entries {
        let Ok(at) = NaiveDateTime::parse_from_str(&entry.dt_txt, "%Y-%m-%d %H:%M:%S") else {
            tracing::debug!(dt_txt = %entry.dt_txt, "skipping forecast entry with unparseable time");
            continue;
        };
        let date = at.date();
        let offset = (date - today).num_days();
        if offset < 0 || offset >= days {
            continue;
        }
        grouped.entry(date).or_default().push(entry);
    }

    grouped
        .into_iter()
        .map(|(date, points)| {
            let temps: Vec<f64> = points.iter().map(|p| kelvin_to_celsius(p.main.temp)).collect();
            let min_c = temps.iter().copied().fold(f64::INFINITY, f64::min);
            let max_c = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let humidity = points.iter().map(|p| p.main.humidity).sum::<f64>() / points.len() as f64;
            let pop = points.iter().map(|p| p.pop * 100.0).fold(0.0, f64::max);
            let label = match (date - today).num_days() {
                0 => "Today".to_string(),
                1 => "Tomorrow".to_string(),
                _ => date.format("%A").to_string(),
            };
            DaySummary {
                label,
                date,
                min_c,
                max_c,
                description: most_common(points.iter().map(|p| p.description())),
                humidity: humidity.round() as i64,
                precipitation_pct: pop.round() as i64,
            }
        })
        .collect()
}

/// 出现次数最多的描述；并列时取最先出现者
fn most_common<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(d, _)| *d == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (desc, n) in counts {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((desc, n));
        }
    }
    best.map(|(d, _)| d.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// get_weather_forecast 工具
pub struct ForecastTool {
    client: Arc<OpenWeatherClient>,
    /// 固定“今天”（测试用）；None 时取本地日期
    today: Option<NaiveDate>,
}

impl ForecastTool {
    pub fn new(client: Arc<OpenWeatherClient>) -> Self {
        Self { client, today: None }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

#[async_trait]
impl Tool for ForecastTool {
    fn name(&self) -> &str {
        "get_weather_forecast"
    }

    fn description(&self) -> &str {
        "Get a daily weather forecast for the next 1-5 days (min/max temperature, conditions, \
         humidity, precipitation chance). Use for trip planning, packing, or weather over several days."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<ForecastArgs>()
    }

    fn capability(&self) -> &str {
        "Weather forecast"
    }

    fn subject(&self, args: &Value) -> String {
        location_subject(args)
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let args: ForecastArgs = parse_args(args)?;
        let location = validate_location(&args.location)?;
        let days = days_from_value(args.days.as_ref());
        if let Some(requested) = args.days.as_ref().filter(|v| !v.is_null()) {
            if requested.as_i64() != Some(days) {
                tracing::info!(requested = %requested, days, "forecast days normalized");
            }
        }

        let forecast = self.client.fetch_forecast(&location).await?;
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let summaries = summarize_days(&forecast.list, today, days);
        if summaries.is_empty() {
            return Ok(ToolOutput::plain(format!(
                "No weather forecast available for {}",
                sanitize_text(&location)
            )));
        }

        let city = forecast
            .city
            .as_ref()
            .map(|c| c.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| location.clone());
        tracing::info!(location = %location, days = summaries.len(), "forecast retrieved");
        Ok(ToolOutput::structured(
            "forecast",
            Field::record([
                ("location", Field::text(city)),
                ("days", Field::List(summaries.iter().map(DaySummary::to_field).collect())),
            ]),
        ))
    }
}
