//! Server-side Expression Evaluator
//!
//! Evaluates template expressions at build time to JSON values, without a
//! JavaScript engine. The expression is parsed with oxc and walked directly;
//! only the side-effect-free subset templates actually use is supported.
//! Anything else (calls, assignments, browser globals) is an [`EvalError`],
//! which the marker runtime turns into fallback markup.

use oxc_allocator::Allocator;
use oxc_ast::ast::{ChainElement, Expression, ObjectPropertyKind};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::EvalError;

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Binding {
    Value(Value),
    Unavailable(String),
}

/// Identifiers visible to an expression.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every prop as a bare identifier, plus the whole object as `props`.
    pub fn for_props(props: &Map<String, Value>) -> Self {
        let mut scope = Self::new();
        for (key, value) in props {
            scope.define(key, value.clone());
        }
        scope.define("props", Value::Object(props.clone()));
        scope
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), Binding::Value(value));
    }

    /// Declare a name that exists in the source but has no server-side value.
    pub fn mark_unavailable(&mut self, name: &str, reason: impl Into<String>) {
        self.bindings
            .insert(name.to_string(), Binding::Unavailable(reason.into()));
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        match self.bindings.get(name) {
            Some(Binding::Value(value)) => Ok(value.clone()),
            Some(Binding::Unavailable(reason)) => Err(EvalError::Unavailable {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(EvalError::UnknownIdentifier(name.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluate `code` against `scope`.
pub fn evaluate(code: &str, scope: &Scope) -> Result<Value, EvalError> {
    if code.trim().is_empty() {
        return Ok(Value::Null);
    }

    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let expr = Parser::new(&allocator, code, source_type)
        .parse_expression()
        .map_err(|errors| EvalError::Syntax {
            code: code.to_string(),
            message: errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })?;

    Evaluator { scope }.eval(&expr)
}

struct Evaluator<'s> {
    scope: &'s Scope,
}

impl<'s> Evaluator<'s> {
    fn eval(&self, expr: &Expression<'_>) -> Result<Value, EvalError> {
        match expr {
            Expression::NullLiteral(_) => Ok(Value::Null),
            Expression::BooleanLiteral(lit) => Ok(Value::Bool(lit.value)),
            Expression::NumericLiteral(lit) => Ok(number(lit.value)),
            Expression::StringLiteral(lit) => Ok(Value::String(lit.value.to_string())),

            Expression::TemplateLiteral(tpl) => {
                let mut out = String::new();
                for (i, quasi) in tpl.quasis.iter().enumerate() {
                    match &quasi.value.cooked {
                        Some(cooked) => out.push_str(cooked.as_str()),
                        None => out.push_str(quasi.value.raw.as_str()),
                    }
                    if let Some(inner) = tpl.expressions.get(i) {
                        out.push_str(&to_display_string(&self.eval(inner)?));
                    }
                }
                Ok(Value::String(out))
            }

            Expression::Identifier(id) => match id.name.as_str() {
                "undefined" => Ok(Value::Null),
                name => self.scope.lookup(name),
            },

            Expression::ParenthesizedExpression(paren) => self.eval(&paren.expression),

            Expression::StaticMemberExpression(member) => {
                let object = self.eval(&member.object)?;
                read_member(&object, member.property.name.as_str(), member.optional)
            }

            Expression::ComputedMemberExpression(member) => {
                let object = self.eval(&member.object)?;
                let key = to_display_string(&self.eval(&member.expression)?);
                read_member(&object, &key, member.optional)
            }

            // `a?.b`: inside a chain every member read tolerates null.
            Expression::ChainExpression(chain) => match &chain.expression {
                ChainElement::StaticMemberExpression(member) => {
                    let object = self.eval(&member.object)?;
                    read_member(&object, member.property.name.as_str(), true)
                }
                ChainElement::ComputedMemberExpression(member) => {
                    let object = self.eval(&member.object)?;
                    let key = to_display_string(&self.eval(&member.expression)?);
                    read_member(&object, &key, true)
                }
                _ => Err(EvalError::Unsupported("optional call".to_string())),
            },

            Expression::ArrayExpression(arr) => {
                let mut items = Vec::with_capacity(arr.elements.len());
                for element in &arr.elements {
                    match element.as_expression() {
                        Some(e) => items.push(self.eval(e)?),
                        None => {
                            return Err(EvalError::Unsupported(
                                "spread or hole in array literal".to_string(),
                            ))
                        }
                    }
                }
                Ok(Value::Array(items))
            }

            Expression::ObjectExpression(obj) => {
                let mut map = Map::new();
                for property in &obj.properties {
                    match property {
                        ObjectPropertyKind::ObjectProperty(p) => {
                            let key = p.key.static_name().ok_or_else(|| {
                                EvalError::Unsupported("computed object key".to_string())
                            })?;
                            map.insert(key.to_string(), self.eval(&p.value)?);
                        }
                        ObjectPropertyKind::SpreadProperty(spread) => {
                            if let Value::Object(inner) = self.eval(&spread.argument)? {
                                map.extend(inner);
                            }
                        }
                    }
                }
                Ok(Value::Object(map))
            }

            Expression::UnaryExpression(unary) => {
                let value = self.eval(&unary.argument)?;
                match unary.operator {
                    UnaryOperator::LogicalNot => Ok(Value::Bool(!is_truthy(&value))),
                    UnaryOperator::UnaryNegation => Ok(number(-to_number(&value))),
                    UnaryOperator::UnaryPlus => Ok(number(to_number(&value))),
                    UnaryOperator::Typeof => Ok(Value::String(type_of(&value).to_string())),
                    other => Err(EvalError::Unsupported(format!(
                        "unary operator `{}`",
                        other.as_str()
                    ))),
                }
            }

            Expression::BinaryExpression(binary) => {
                let left = self.eval(&binary.left)?;
                let right = self.eval(&binary.right)?;
                binary_op(binary.operator, &left, &right)
            }

            Expression::LogicalExpression(logical) => {
                let left = self.eval(&logical.left)?;
                match logical.operator {
                    LogicalOperator::And if !is_truthy(&left) => Ok(left),
                    LogicalOperator::Or if is_truthy(&left) => Ok(left),
                    LogicalOperator::Coalesce if !left.is_null() => Ok(left),
                    _ => self.eval(&logical.right),
                }
            }

            Expression::ConditionalExpression(cond) => {
                if is_truthy(&self.eval(&cond.test)?) {
                    self.eval(&cond.consequent)
                } else {
                    self.eval(&cond.alternate)
                }
            }

            Expression::CallExpression(_) | Expression::NewExpression(_) => {
                Err(EvalError::Unsupported("function calls".to_string()))
            }
            Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
                Err(EvalError::Unsupported("function values".to_string()))
            }
            Expression::AssignmentExpression(_) | Expression::UpdateExpression(_) => {
                Err(EvalError::Unsupported("assignments".to_string()))
            }
            _ => Err(EvalError::Unsupported("expression form".to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE SEMANTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON number from an f64, keeping integral values integral so they print
/// without a fractional part. Non-finite results become `null`.
pub fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "undefined",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
    }
}

/// Text a value renders as. `null`/`undefined` render empty.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn read_member(object: &Value, key: &str, optional: bool) -> Result<Value, EvalError> {
    match object {
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if key == "length" => Ok(Value::from(items.len())),
        Value::Array(items) => Ok(key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null)),
        Value::String(s) if key == "length" => Ok(Value::from(s.chars().count())),
        Value::Null if optional => Ok(Value::Null),
        Value::Null => Err(EvalError::Unsupported(format!(
            "reading `{}` of undefined",
            key
        ))),
        _ => Ok(Value::Null),
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            let (l, r) = (to_number(left), to_number(right));
            !l.is_nan() && l == r
        }
        _ => left == right,
    }
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}

fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;

    let value = match op {
        BinaryOperator::Addition => {
            let numeric = |v: &Value| matches!(v, Value::Null | Value::Bool(_) | Value::Number(_));
            if numeric(left) && numeric(right) {
                number(to_number(left) + to_number(right))
            } else {
                Value::String(to_display_string(left) + &to_display_string(right))
            }
        }
        BinaryOperator::Subtraction => number(to_number(left) - to_number(right)),
        BinaryOperator::Multiplication => number(to_number(left) * to_number(right)),
        BinaryOperator::Division => number(to_number(left) / to_number(right)),
        BinaryOperator::Remainder => number(to_number(left) % to_number(right)),
        BinaryOperator::Equality => Value::Bool(loose_equals(left, right)),
        BinaryOperator::Inequality => Value::Bool(!loose_equals(left, right)),
        BinaryOperator::StrictEquality => Value::Bool(strict_equals(left, right)),
        BinaryOperator::StrictInequality => Value::Bool(!strict_equals(left, right)),
        BinaryOperator::LessThan => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOperator::LessEqualThan => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterThan => {
            Value::Bool(compare(left, right) == Some(Ordering::Greater))
        }
        BinaryOperator::GreaterEqualThan => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        other => {
            return Err(EvalError::Unsupported(format!(
                "binary operator `{}`",
                other.as_str()
            )))
        }
    };
    Ok(value)
}
