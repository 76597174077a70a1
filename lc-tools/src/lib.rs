//! Local tool bridge: tools the model may call during a chat round trip.

mod calculator;
mod clock;
mod error;
mod registry;
mod traits;
mod weather;

use std::sync::Arc;

pub use calculator::CalculatorTool;
pub use clock::ClockTool;
pub use error::{Result, ToolError};
pub use registry::ToolRegistry;
pub use traits::{Tool, ToolSpec, to_llm_tool_def};
pub use weather::WeatherTool;

pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(WeatherTool),
        Arc::new(ClockTool),
        Arc::new(CalculatorTool),
    ]
}
