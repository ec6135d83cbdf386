//! 工具结果的结构化表示与唯一的规范格式化器
//!
//! 工具返回 ToolOutput，而不是手工拼接的字符串；render() 输出单行、可被模型稳定解析的伪结构文本：
//! `weather: {temp_c: 18.2, description: "clear sky", humidity: 61}`。
//! 文本字段统一在这里做清洗（双引号替换为单引号、换行折叠为空格），工具内部不再手工转义。

/// 结构化字段值
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i64),
    /// 保留一位小数输出
    Decimal(f64),
    Text(String),
    Record(Vec<(String, Field)>),
    List(Vec<Field>),
}

impl Field {
    pub fn text(s: impl Into<String>) -> Self {
        Field::Text(s.into())
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Field)>) -> Self {
        Field::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Field::Int(n) => out.push_str(&n.to_string()),
            Field::Decimal(v) => {
                // 先按一位小数取整（远离零），再避免输出 -0.0
                let v = (*v * 10.0).round() / 10.0;
                let v = if v == 0.0 { 0.0 } else { v };
                out.push_str(&format!("{:.1}", v));
            }
            Field::Text(s) => {
                out.push('"');
                out.push_str(&sanitize_text(s));
                out.push('"');
            }
            Field::Record(fields) => {
                out.push('{');
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    value.render_into(out);
                }
                out.push('}');
            }
            Field::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render_into(out);
                }
                out.push(']');
            }
        }
    }
}

/// 双引号替换为单引号，换行与制表符折叠为空格，保证结果为单行
pub fn sanitize_text(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .collect()
}

/// 工具成功输出
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// `label: value`
    Structured { label: String, value: Field },
    /// 原样输出的短文本（如 CONTINUE_CHAT、无数据提示）
    Plain(String),
}

impl ToolOutput {
    pub fn structured(label: impl Into<String>, value: Field) -> Self {
        ToolOutput::Structured {
            label: label.into(),
            value,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        ToolOutput::Plain(text.into())
    }

    pub fn render(&self) -> String {
        match self {
            ToolOutput::Structured { label, value } => {
                let mut out = format!("{}: ", label);
                value.render_into(&mut out);
                out
            }
            ToolOutput::Plain(text) => text.clone(),
        }
    }
}

/// 按字符数截断并追加显式截断标记
pub fn truncate_output(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

pub const TRUNCATION_MARKER: &str = "... [truncated]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_weather_record() {
        let out = ToolOutput::structured(
            "weather",
            Field::record([
                ("temp_c", Field::Decimal(18.2)),
                ("feels_like_c", Field::Decimal(17.5)),
                ("description", Field::text("clear sky")),
                ("humidity", Field::Int(61)),
                ("timestamp", Field::text("2024-05-01 12:00:00")),
            ]),
        );
        assert_eq!(
            out.render(),
            r#"weather: {temp_c: 18.2, feels_like_c: 17.5, description: "clear sky", humidity: 61, timestamp: "2024-05-01 12:00:00"}"#
        );
    }

    #[test]
    fn test_render_list_of_records_sanitizes_quotes() {
        let out = ToolOutput::structured(
            "sources",
            Field::List(vec![Field::record([
                ("title", Field::text(r#"The "Best" Cafés"#)),
                ("url", Field::text("https://example.com")),
                ("summary", Field::text("line one\nline two")),
            ])]),
        );
        assert_eq!(
            out.render(),
            r#"sources: [{title: "The 'Best' Cafés", url: "https://example.com", summary: "line one line two"}]"#
        );
    }

    #[test]
    fn test_render_empty_list() {
        assert_eq!(ToolOutput::structured("sources", Field::List(vec![])).render(), "sources: []");
    }

    #[test]
    fn test_decimal_formatting() {
        let render = |v: f64| ToolOutput::structured("t", Field::Decimal(v)).render();
        assert_eq!(render(18.0), "t: 18.0");
        assert_eq!(render(-0.0), "t: 0.0");
        assert_eq!(render(-3.26), "t: -3.3");
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short", 10), "short");
        let long = "é".repeat(30);
        let cut = truncate_output(&long, 20);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.chars().count(), 20 + TRUNCATION_MARKER.chars().count());
    }
}
