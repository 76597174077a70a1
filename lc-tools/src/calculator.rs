//! `calculate`: arithmetic over + - * / and parentheses.

use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, require_string};
use async_trait::async_trait;
use serde_json::json;

/// Deepest run of nested parentheses and unary minus accepted.
const MAX_NESTING: usize = 64;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "calculate".to_string(),
            description: "Evaluate an arithmetic expression using + - * / and parentheses"
                .to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "expression": {"type": "string", "description": "e.g. (2 + 3) * 4"}
                },
                "required": ["expression"]
            }),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let expression = require_string(&arguments, "expression")?;
        let value = evaluate(&expression)?;
        Ok(json!({ "expression": expression, "result": value }))
    }
}

pub(crate) fn evaluate(expression: &str) -> Result<f64> {
    let mut parser = Parser {
        chars: expression.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.chars.len() {
        return Err(ToolError::InvalidArguments(format!(
            "unexpected character {:?} at {}",
            parser.chars[parser.pos], parser.pos
        )));
    }
    if !value.is_finite() {
        return Err(ToolError::ExecutionFailed(
            "result is not a finite number".to_string(),
        ));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '/' && rhs == 0.0 {
                return Err(ToolError::ExecutionFailed("division by zero".to_string()));
            }
            value = if op == '*' { value * rhs } else { value / rhs };
        }
        Ok(value)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ToolError::InvalidArguments(format!(
                "expression nested deeper than {MAX_NESTING} levels"
            )));
        }
        Ok(())
    }

    fn factor(&mut self) -> Result<f64> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                self.enter()?;
                let value = -self.factor()?;
                self.depth -= 1;
                Ok(value)
            }
            Some('(') => {
                self.pos += 1;
                self.enter()?;
                let value = self.expr()?;
                if self.peek() != Some(')') {
                    return Err(ToolError::InvalidArguments("missing ')'".to_string()));
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.chars[start..self.pos].iter().collect();
                literal
                    .parse()
                    .map_err(|_| ToolError::InvalidArguments(format!("bad number {literal:?}")))
            }
            Some(c) => Err(ToolError::InvalidArguments(format!(
                "unexpected character {c:?} at {}",
                self.pos
            ))),
            None => Err(ToolError::InvalidArguments(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_precedence_and_parentheses() {
        assert_eq!(evaluate("2+2").expect("eval"), 4.0);
        assert_eq!(evaluate("2 + 3 * 4").expect("eval"), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").expect("eval"), 20.0);
        assert_eq!(evaluate("-3 * -(1.5 - 0.5)").expect("eval"), 3.0);
        assert_eq!(evaluate("10 / 4 - 1").expect("eval"), 1.5);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("2 ^ 3").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("1..2").is_err());
    }

    #[test]
    fn deep_nesting_is_rejected_without_overflowing() {
        let minus = format!("{}1", "-".repeat(500_000));
        assert!(matches!(evaluate(&minus), Err(ToolError::InvalidArguments(_))));
        let parens = format!("{}1{}", "(".repeat(500_000), ")".repeat(500_000));
        assert!(matches!(evaluate(&parens), Err(ToolError::InvalidArguments(_))));

        let ok = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(evaluate(&ok).expect("eval"), 1.0);
        assert_eq!(evaluate("--1").expect("eval"), 1.0);
    }

    #[tokio::test]
    async fn execute_returns_result_field() {
        let out = CalculatorTool
            .execute(json!({"expression": "6 * 7"}))
            .await
            .expect("execute");
        assert_eq!(out["result"], json!(42.0));
    }
}
