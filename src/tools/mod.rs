pub mod continue_chat;
pub mod executor;
pub mod forecast;
pub mod output;
pub mod registry;
pub mod schema;
pub mod search;
pub mod weather;

pub use continue_chat::ContinueChatTool;
pub use executor::{ExecutorConfig, ToolExecutor};
pub use forecast::ForecastTool;
pub use output::{truncate_output, Field, ToolOutput};
pub use registry::{Tool, ToolRegistry};
pub use schema::{parameters_schema_for, parse_args};
pub use search::SearchTool;
pub use weather::{OpenWeatherClient, WeatherTool};
