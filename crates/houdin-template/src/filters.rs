//! Liquid-flavoured filters layered over minijinja's built-ins.
//!
//! Filters take and return [`Value`] so an undefined input flows through
//! instead of failing the whole placeholder.

use minijinja::value::ValueKind;
use minijinja::{Environment, Error, ErrorKind, Value};

use crate::engine::render_value;

pub fn register(env: &mut Environment<'static>) {
  env.add_filter("append", append);
  env.add_filter("prepend", prepend);
  env.add_filter("map", map);
  env.add_filter("sum", sum);
  env.add_filter("join", join);
  env.add_filter("split", split);
  env.add_filter("default", default);
  env.add_filter("upcase", upcase);
  env.add_filter("downcase", downcase);
  env.add_filter("size", size);
  env.add_filter("first", first);
  env.add_filter("last", last);
  env.add_filter("json", json);
  env.add_filter("plus", plus);
  env.add_filter("minus", minus);
  env.add_filter("times", times);
  env.add_filter("divided_by", divided_by);
  env.add_filter("replace", replace);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
  Int(i64),
  Float(f64),
}

impl Num {
  fn parse(value: &Value) -> Option<Num> {
    let text = match value.kind() {
      ValueKind::Number => value.to_string(),
      ValueKind::String => value.as_str()?.trim().to_string(),
      _ => return None,
    };
    if let Ok(i) = text.parse::<i64>() {
      return Some(Num::Int(i));
    }
    text.parse::<f64>().ok().map(Num::Float)
  }

  fn as_f64(self) -> f64 {
    match self {
      Num::Int(i) => i as f64,
      Num::Float(f) => f,
    }
  }

  fn into_value(self) -> Value {
    match self {
      Num::Int(i) => Value::from(i),
      Num::Float(f) => Value::from(f),
    }
  }
}

fn number(value: &Value, filter: &str) -> Result<Num, Error> {
  if value.is_undefined() || value.is_none() {
    return Ok(Num::Int(0));
  }
  Num::parse(value).ok_or_else(|| {
    Error::new(
      ErrorKind::InvalidOperation,
      format!("{} expects a number, got {}", filter, value),
    )
  })
}

fn arithmetic(
  left: &Value,
  right: &Value,
  filter: &str,
  int_op: fn(i64, i64) -> Option<i64>,
  float_op: fn(f64, f64) -> f64,
) -> Result<Value, Error> {
  let (a, b) = (number(left, filter)?, number(right, filter)?);
  let result = match (a, b) {
    (Num::Int(x), Num::Int(y)) => match int_op(x, y) {
      Some(i) => Num::Int(i),
      None => Num::Float(float_op(x as f64, y as f64)),
    },
    _ => Num::Float(float_op(a.as_f64(), b.as_f64())),
  };
  Ok(result.into_value())
}

fn items(value: &Value) -> Result<Vec<Value>, Error> {
  if value.is_undefined() || value.is_none() {
    return Ok(Vec::new());
  }
  match value.kind() {
    ValueKind::Seq | ValueKind::Iterable => Ok(value.try_iter()?.collect()),
    _ => Ok(vec![value.clone()]),
  }
}

fn append(value: Value, suffix: Value) -> String {
  format!("{}{}", render_value(&value), render_value(&suffix))
}

fn prepend(value: Value, prefix: Value) -> String {
  format!("{}{}", render_value(&prefix), render_value(&value))
}

/// Pluck a (possibly dotted) attribute from every item.
fn map(value: Value, attribute: Value) -> Result<Value, Error> {
  let path = attribute.as_str().ok_or_else(|| {
    Error::new(ErrorKind::InvalidOperation, "map expects an attribute name")
  })?;

  let mut plucked = Vec::new();
  for item in items(&value)? {
    let mut current = item;
    for segment in path.split('.') {
      current = current.get_attr(segment)?;
    }
    plucked.push(current);
  }
  Ok(Value::from(plucked))
}

fn sum(value: Value) -> Result<Value, Error> {
  let mut total = Num::Int(0);
  for item in items(&value)? {
    if item.is_undefined() || item.is_none() {
      continue;
    }
    let n = number(&item, "sum")?;
    total = match (total, n) {
      (Num::Int(a), Num::Int(b)) => a
        .checked_add(b)
        .map(Num::Int)
        .unwrap_or(Num::Float(a as f64 + b as f64)),
      (a, b) => Num::Float(a.as_f64() + b.as_f64()),
    };
  }
  Ok(total.into_value())
}

fn join(value: Value, separator: Option<Value>) -> Result<String, Error> {
  let separator = separator
    .as_ref()
    .map(render_value)
    .unwrap_or_else(|| " ".to_string());
  let parts: Vec<String> = items(&value)?.iter().map(render_value).collect();
  Ok(parts.join(&separator))
}

fn split(value: Value, separator: Value) -> Value {
  let text = render_value(&value);
  let separator = render_value(&separator);
  if text.is_empty() {
    return Value::from(Vec::<Value>::new());
  }
  let parts: Vec<Value> = if separator.is_empty() {
    text.chars().map(|c| Value::from(c.to_string())).collect()
  } else {
    text.split(separator.as_str()).map(Value::from).collect()
  };
  Value::from(parts)
}

fn default(value: Value, fallback: Option<Value>) -> Value {
  let missing = value.is_undefined()
    || value.is_none()
    || matches!(value.kind(), ValueKind::Bool) && !value.is_true()
    || value.as_str().is_some_and(str::is_empty)
    || matches!(value.kind(), ValueKind::Seq) && value.len() == Some(0);
  if missing {
    fallback.unwrap_or_else(|| Value::from(""))
  } else {
    value
  }
}

fn upcase(value: Value) -> String {
  render_value(&value).to_uppercase()
}

fn downcase(value: Value) -> String {
  render_value(&value).to_lowercase()
}

fn size(value: Value) -> usize {
  match value.kind() {
    ValueKind::Undefined | ValueKind::None => 0,
    ValueKind::String => value.as_str().map(|s| s.chars().count()).unwrap_or(0),
    _ => value.len().unwrap_or(0),
  }
}

fn first(value: Value) -> Result<Value, Error> {
  if let Some(s) = value.as_str() {
    return Ok(s.chars().next().map(|c| Value::from(c.to_string())).unwrap_or(Value::UNDEFINED));
  }
  Ok(items(&value)?.into_iter().next().unwrap_or(Value::UNDEFINED))
}

fn last(value: Value) -> Result<Value, Error> {
  if let Some(s) = value.as_str() {
    return Ok(s.chars().last().map(|c| Value::from(c.to_string())).unwrap_or(Value::UNDEFINED));
  }
  Ok(items(&value)?.into_iter().last().unwrap_or(Value::UNDEFINED))
}

fn json(value: Value) -> Result<String, Error> {
  serde_json::to_string(&value)
    .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("json: {}", e)))
}

fn plus(value: Value, operand: Value) -> Result<Value, Error> {
  arithmetic(&value, &operand, "plus", i64::checked_add, |a, b| a + b)
}

fn minus(value: Value, operand: Value) -> Result<Value, Error> {
  arithmetic(&value, &operand, "minus", i64::checked_sub, |a, b| a - b)
}

fn times(value: Value, operand: Value) -> Result<Value, Error> {
  arithmetic(&value, &operand, "times", i64::checked_mul, |a, b| a * b)
}

/// Integer operands use floor division.
fn divided_by(value: Value, operand: Value) -> Result<Value, Error> {
  let divisor = number(&operand, "divided_by")?;
  if divisor.as_f64() == 0.0 {
    return Err(Error::new(ErrorKind::InvalidOperation, "divided_by zero"));
  }
  arithmetic(&value, &operand, "divided_by", i64::checked_div_euclid, |a, b| a / b)
}

fn replace(value: Value, from: Value, to: Option<Value>) -> String {
  let to = to.as_ref().map(render_value).unwrap_or_default();
  render_value(&value).replace(&render_value(&from), &to)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_num_parse() {
    assert_eq!(Num::parse(&Value::from("5")), Some(Num::Int(5)));
    assert_eq!(Num::parse(&Value::from(" 2.5 ")), Some(Num::Float(2.5)));
    assert_eq!(Num::parse(&Value::from(7)), Some(Num::Int(7)));
    assert_eq!(Num::parse(&Value::from("seven")), None);
  }

  #[test]
  fn test_integer_arithmetic_stays_integer() {
    assert_eq!(plus(Value::from(2), Value::from("3")).unwrap(), Value::from(5));
    assert_eq!(divided_by(Value::from(7), Value::from(2)).unwrap(), Value::from(3));
    assert_eq!(times(Value::from(1.5), Value::from(2)).unwrap(), Value::from(3.0));
  }

  #[test]
  fn test_divided_by_zero_errors() {
    assert!(divided_by(Value::from(1), Value::from(0)).is_err());
  }

  #[test]
  fn test_default_on_empty() {
    assert_eq!(default(Value::UNDEFINED, Some(Value::from("x"))), Value::from("x"));
    assert_eq!(default(Value::from(""), Some(Value::from("x"))), Value::from("x"));
    assert_eq!(default(Value::from("y"), Some(Value::from("x"))), Value::from("y"));
  }

  #[test]
  fn test_split_and_size() {
    let parts = split(Value::from("a,b,c"), Value::from(","));
    assert_eq!(size(parts.clone()), 3);
    assert_eq!(join(parts, Some(Value::from("-"))).unwrap(), "a-b-c");
    assert_eq!(size(Value::UNDEFINED), 0);
  }
}
