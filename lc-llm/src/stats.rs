//! Presentation of per-request performance numbers.

use crate::types::{ChatResponse, FinishReason, Usage};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfStats {
    pub model: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub elapsed_ms: u64,
    pub completion_tokens_per_sec: f64,
}

impl PerfStats {
    pub fn from_response(resp: &ChatResponse, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let completion_tokens_per_sec = if secs > 0.0 {
            f64::from(resp.usage.completion_tokens) / secs
        } else {
            0.0
        };
        Self {
            model: resp.model.clone(),
            finish_reason: resp.finish_reason().clone(),
            usage: resp.usage,
            elapsed_ms: elapsed.as_millis() as u64,
            completion_tokens_per_sec,
        }
    }
}

impl fmt::Display for PerfStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model:             {}", self.model)?;
        writeln!(f, "finish_reason:     {}", self.finish_reason)?;
        writeln!(f, "prompt_tokens:     {}", self.usage.prompt_tokens)?;
        writeln!(f, "completion_tokens: {}", self.usage.completion_tokens)?;
        writeln!(f, "total_tokens:      {}", self.usage.total_tokens)?;
        writeln!(f, "elapsed:           {:.2}s", self.elapsed_ms as f64 / 1000.0)?;
        write!(f, "tokens/sec:        {:.1}", self.completion_tokens_per_sec)
    }
}
