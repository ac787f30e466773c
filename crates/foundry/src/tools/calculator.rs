use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::executor::{ToolExecutor, ToolKind};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolCall;

/// Evaluates arithmetic expressions against optional named variables.
/// Supports `+ - * / % ^`, parentheses, unary minus and a fixed set of
/// functions; nothing here executes code.
pub struct CalculatorTool {
    name: String,
    description: String,
    schema: Value,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self::with_spec(
            "calculator",
            "Evaluates arithmetic expressions. Supports +, -, *, /, %, ^, parentheses, \
             named variables and the functions abs, sqrt, round, floor, ceil, min, max, pow.",
        )
    }

    pub fn with_spec<N: Into<String>, D: Into<String>>(name: N, description: D) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Arithmetic expression to evaluate"
                    },
                    "variables": {
                        "type": "object",
                        "description": "Named numeric values referenced by the expression",
                        "additionalProperties": {"type": "number"}
                    }
                },
                "required": ["expression"]
            }),
        }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for CalculatorTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> &Value {
        &self.schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Calculation
    }

    async fn execute(&self, call: ToolCall) -> AgentResult<Value> {
        let expression = call
            .arguments
            .get("expression")
            .and_then(|e| e.as_str())
            .ok_or_else(|| {
                AgentError::InvalidParameters("'expression' must be a string".to_string())
            })?;

        let mut variables = HashMap::new();
        if let Some(vars) = call.arguments.get("variables").and_then(|v| v.as_object()) {
            for (name, value) in vars {
                let number = value.as_f64().ok_or_else(|| {
                    AgentError::InvalidParameters(format!(
                        "variable '{}' is not a number",
                        name
                    ))
                })?;
                variables.insert(name.clone(), number);
            }
        }

        let result = evaluate(expression, &variables)
            .map_err(|e| AgentError::ExecutionError(format!("Calculation error: {}", e)))?;

        Ok(json!({
            "expression": expression,
            "result": result,
            "variables_used": call.arguments.get("variables").cloned().unwrap_or(json!({})),
        }))
    }
}

/// Evaluate an expression with the given variable bindings
pub fn evaluate(expression: &str, variables: &HashMap<String, f64>) -> Result<f64, String> {
    let mut parser = Parser {
        input: expression.as_bytes(),
        pos: 0,
        variables,
    };
    let value = parser.expr()?;
    parser.skip_whitespace();
    if parser.pos != parser.input.len() {
        return Err(format!(
            "unexpected input at position {}",
            parser.pos
        ));
    }
    if !value.is_finite() {
        return Err("expression did not produce a finite number".to_string());
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    variables: &'a HashMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, expected: u8) -> Result<(), String> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected '{}'", expected as char))
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := power (('*' | '/' | '%') power)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.power()?;
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.power()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                Some(b'%') => {
                    self.pos += 1;
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value %= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    // power := unary ('^' power)?   right-associative
    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some(b'^') {
            self.pos += 1;
            let exponent = self.power()?;
            Ok(base.powf(exponent))
        } else {
            Ok(base)
        }
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
            Ok(-self.unary()?)
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.eat(b')')?;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.identifier(),
            Some(c) => Err(format!("unexpected character '{}'", c as char)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_digit() || self.input[self.pos] == b'.')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.input[start..self.pos]).unwrap();
        text.parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", text))
    }

    fn identifier(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_alphanumeric() || self.input[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.input[start..self.pos])
            .unwrap()
            .to_string();

        if self.peek() == Some(b'(') {
            self.pos += 1;
            let mut arguments = vec![self.expr()?];
            while self.peek() == Some(b',') {
                self.pos += 1;
                arguments.push(self.expr()?);
            }
            self.eat(b')')?;
            return apply_function(&name, &arguments);
        }

        self.variables
            .get(&name)
            .copied()
            .ok_or_else(|| format!("unknown variable '{}'", name))
    }
}

fn apply_function(name: &str, arguments: &[f64]) -> Result<f64, String> {
    let unary = |f: fn(f64) -> f64| -> Result<f64, String> {
        if arguments.len() != 1 {
            return Err(format!("{} takes exactly one argument", name));
        }
        Ok(f(arguments[0]))
    };

    match name {
        "abs" => unary(f64::abs),
        "sqrt" => {
            let value = unary(f64::sqrt)?;
            if value.is_nan() {
                return Err("sqrt of a negative number".to_string());
            }
            Ok(value)
        }
        "round" => unary(f64::round),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "min" => {
            if arguments.is_empty() {
                return Err("min takes at least one argument".to_string());
            }
            Ok(arguments.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            if arguments.is_empty() {
                return Err("max takes at least one argument".to_string());
            }
            Ok(arguments.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        "pow" => {
            if arguments.len() != 2 {
                return Err("pow takes exactly two arguments".to_string());
            }
            Ok(arguments[0].powf(arguments[1]))
        }
        _ => Err(format!("unknown function '{}'", name)),
    }
}
