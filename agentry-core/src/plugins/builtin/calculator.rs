//! Calculator - evaluates a single binary operation
//!
//! `"<number> <op> <number>"` with one of `+ - * /`. There is no precedence
//! and no chaining; the first operator after the leading character splits
//! the expression, so a leading sign stays with the left operand.

use std::sync::Arc;

use agentry_plugin_api::{
    ConfigSchema, Lifecycle, Payload, Plugin, PluginContext, PluginError, PluginManifest,
    PluginRequest, PluginResult, RequestExt, ValueType, async_trait,
};

/// Largest number of decimal places honored by `precision`
const MAX_PRECISION: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            '*' => Some(Self::Multiply),
            '/' => Some(Self::Divide),
            _ => None,
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Result<f64, PluginError> {
        let value = match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide if rhs == 0.0 => return Err(PluginError::domain("division by zero")),
            Self::Divide => lhs / rhs,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PluginError::domain("result is out of range"))
        }
    }
}

fn operand(text: &str) -> Result<f64, PluginError> {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PluginError::validation(format!("invalid number '{text}'"))),
    }
}

/// Evaluate one binary operation
pub fn evaluate(expression: &str) -> Result<f64, PluginError> {
    let expression = expression.trim();
    let (index, op) = expression
        .char_indices()
        .skip(1)
        .find_map(|(i, c)| Operator::from_char(c).map(|op| (i, op)))
        .ok_or_else(|| PluginError::validation("unsupported operation"))?;

    let lhs = operand(&expression[..index])?;
    let rhs = operand(&expression[index + 1..])?;
    op.apply(lhs, rhs)
}

fn round_to(value: f64, precision: i64) -> f64 {
    if precision < 0 {
        return value;
    }
    let factor = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    let scaled = value * factor;
    // Values this large carry no fractional digits to round.
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

#[derive(Debug, Default)]
pub struct CalculatorPlugin {
    state: Lifecycle,
}

impl CalculatorPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn precision(&self) -> i64 {
        self.state
            .context()
            .map(|ctx| ctx.config().get_i64("precision", -1))
            .unwrap_or(-1)
    }
}

#[async_trait]
impl Plugin for CalculatorPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new(
            "calculator",
            "1.0.0",
            "Evaluates one arithmetic operation on two numbers",
        )
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::empty().option(
            "precision",
            ValueType::Integer,
            -1,
            "Decimal places to round results to; negative disables rounding",
        )
    }

    async fn initialize(&self, ctx: Arc<PluginContext>) -> Result<(), PluginError> {
        if !self.state.initialize(ctx) {
            return Err(PluginError::failed("calculator is already initialized"));
        }
        Ok(())
    }

    async fn execute(&self, request: PluginRequest) -> PluginResult {
        let expression = request.require_str("operation")?;
        let result = round_to(evaluate(expression)?, self.precision());

        let mut payload = Payload::new();
        payload.insert("result".to_string(), result.into());
        payload.insert("expression".to_string(), expression.trim().into());
        Ok(payload)
    }

    fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        self.state.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::context_with;
    use serde_json::json;

    fn request(operation: &str) -> PluginRequest {
        json!({"operation": operation}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_evaluate_operators() {
        assert_eq!(evaluate("4 + 5").unwrap(), 9.0);
        assert_eq!(evaluate("10 - 4").unwrap(), 6.0);
        assert_eq!(evaluate("3 * 2.5").unwrap(), 7.5);
        assert_eq!(evaluate("9/3").unwrap(), 3.0);
    }

    #[test]
    fn test_leading_sign_belongs_to_left_operand() {
        assert_eq!(evaluate("-4 - 5").unwrap(), -9.0);
        assert_eq!(evaluate("  -2 * 3 ").unwrap(), -6.0);
        assert_eq!(evaluate("4 + -5").unwrap(), -1.0);
    }

    #[test]
    fn test_division_by_zero() {
        let err = evaluate("10 / 0").unwrap_err();
        assert!(matches!(err, PluginError::Domain(ref m) if m == "division by zero"));
    }

    #[test]
    fn test_bad_operands_and_operators() {
        assert!(matches!(evaluate("abc + 1"), Err(PluginError::Validation(_))));
        assert!(matches!(evaluate("1 + "), Err(PluginError::Validation(_))));
        assert!(matches!(evaluate("inf + 1"), Err(PluginError::Validation(_))));
        assert!(matches!(
            evaluate("2 ^ 3"),
            Err(PluginError::Validation(ref m)) if m == "unsupported operation"
        ));
        assert!(matches!(evaluate(""), Err(PluginError::Validation(_))));
    }

    #[test]
    fn test_overflow_is_domain_error() {
        assert!(matches!(evaluate("1e308 * 10"), Err(PluginError::Domain(_))));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.0 / 3.0, 2), 0.33);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(0.1 + 0.2, -1), 0.1 + 0.2);
        assert_eq!(round_to(1e300, 15), 1e300);
        assert_eq!(round_to(f64::MAX, 2), f64::MAX);
    }

    #[tokio::test]
    async fn test_execute_payload() {
        let plugin = CalculatorPlugin::new();
        plugin
            .initialize(context_with("calculator", &plugin.config_schema(), json!({})))
            .await
            .unwrap();

        let payload = plugin.execute(request(" 4 + 5 ")).await.unwrap();
        assert_eq!(payload["result"], 9.0);
        assert_eq!(payload["expression"], "4 + 5");
    }

    #[tokio::test]
    async fn test_execute_with_precision() {
        let plugin = CalculatorPlugin::new();
        plugin
            .initialize(context_with(
                "calculator",
                &plugin.config_schema(),
                json!({"precision": 3}),
            ))
            .await
            .unwrap();

        let payload = plugin.execute(request("2 / 3")).await.unwrap();
        assert_eq!(payload["result"], 0.667);
    }

    #[tokio::test]
    async fn test_execute_large_result_with_max_precision() {
        let plugin = CalculatorPlugin::new();
        plugin
            .initialize(context_with(
                "calculator",
                &plugin.config_schema(),
                json!({"precision": 15}),
            ))
            .await
            .unwrap();

        let payload = plugin.execute(request("1e300 + 1")).await.unwrap();
        assert!(payload["result"].is_f64());
        assert_eq!(payload["result"], 1e300);
    }

    #[tokio::test]
    async fn test_execute_requires_operation() {
        let plugin = CalculatorPlugin::new();
        let err = plugin.execute(PluginRequest::new()).await.unwrap_err();
        assert!(matches!(err, PluginError::Validation(_)));
    }
}
