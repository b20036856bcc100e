use std::{cmp::Ordering, collections::HashMap, io::Write, rc::Rc};

use itertools::Itertools;

use crate::{
    context::Output,
    environment::Environment,
    error::JaspError,
    interpreter::{Builtin, BuiltinFn, EvaluationResult, Function, Value},
};


fn expect_arity(name: &str, values: &[Value], count: usize) -> Result<(), JaspError> {
    if values.len() != count { return Err(JaspError::arity(name, count, values.len())); }
    Ok(())
}

fn expect_some(name: &str, values: &[Value]) -> Result<(), JaspError> {
    if values.is_empty() { return Err(JaspError::arity(name, "at least 1", 0)); }
    Ok(())
}

fn value_list_to_numbers(name: &str, values: Vec<Value>) -> Result<Vec<f64>, JaspError> {
    values.into_iter()
        .map(|value| match value {
            Value::Number(number) => Ok(number),
            other => Err(JaspError::type_error(format!("{} expects numbers, got {}", name, other.type_name())))
        }).collect()
}

fn value_list_to_booleans(name: &str, values: Vec<Value>) -> Result<Vec<bool>, JaspError> {
    values.into_iter()
        .map(|value| match value {
            Value::Boolean(boolean) => Ok(boolean),
            other => Err(JaspError::type_error(format!("{} expects booleans, got {}", name, other.type_name())))
        }).collect()
}

fn fold_numbers(name: &str, values: Vec<Value>, f: impl Fn(f64, f64) -> f64) -> EvaluationResult {
    expect_some(name, &values)?;

    // Left fold starting from the first argument
    let numbers = value_list_to_numbers(name, values)?;
    Ok(Value::Number(numbers[1..].iter().fold(numbers[0], |a, &b| f(a, b))))
}

fn builtin_add(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    expect_some("+", &values)?;

    if values.iter().all(|value| matches!(value, Value::String(_))) {
        let joined: String = values.iter().map(|value| value.to_string()).collect();
        return Ok(Value::from(joined.as_str()));
    }
    fold_numbers("+", values, |a, b| a + b)
}

fn builtin_sub(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    fold_numbers("-", values, |a, b| a - b)
}

fn builtin_mul(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    fold_numbers("*", values, |a, b| a * b)
}

fn builtin_div(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    expect_arity("/", &values, 2)?;

    let numbers = value_list_to_numbers("/", values)?;
    if numbers[1] == 0.0 { return Err(JaspError::ZeroDivisionError); }
    Ok(Value::Number(numbers[0] / numbers[1]))
}

fn builtin_eq(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    Ok(Value::Boolean(values.iter().all_equal()))
}

fn builtin_compare(name: &str, values: Vec<Value>, f: impl Fn(Ordering) -> bool) -> EvaluationResult {
    expect_arity(name, &values, 2)?;

    let ordering = match (&values[0], &values[1]) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) => return Err(JaspError::type_error(format!(
            "{} cannot compare {} with {}",
            name, a.type_name(), b.type_name()
        ))),
    };

    // NaN is unordered, every comparison with it is false
    Ok(Value::Boolean(ordering.is_some_and(f)))
}

fn builtin_greater(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    builtin_compare(">", values, |ordering| ordering == Ordering::Greater)
}

fn builtin_greater_eq(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    builtin_compare(">=", values, |ordering| ordering != Ordering::Less)
}

fn builtin_less(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    builtin_compare("<", values, |ordering| ordering == Ordering::Less)
}

fn builtin_less_eq(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    builtin_compare("<=", values, |ordering| ordering != Ordering::Greater)
}

fn builtin_not(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    expect_arity("not", &values, 1)?;
    let booleans = value_list_to_booleans("not", values)?;
    Ok(Value::Boolean(!booleans[0]))
}

// Arguments reach builtins already evaluated, so and/or reduce rather than short-circuit
fn builtin_and(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    Ok(Value::Boolean(value_list_to_booleans("and", values)?.into_iter().all(|b| b)))
}

fn builtin_or(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    Ok(Value::Boolean(value_list_to_booleans("or", values)?.into_iter().any(|b| b)))
}

fn builtin_do(mut values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    Ok(values.pop().unwrap_or(Value::Nil))
}

fn builtin_print(values: Vec<Value>, output: &mut Output) -> EvaluationResult {
    writeln!(output, "{}", values.iter().join(" "))
        .map_err(|error| JaspError::OutputError(error.to_string()))?;
    Ok(Value::Nil)
}

fn builtin_len(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    expect_arity("len", &values, 1)?;

    let length = match &values[0] {
        Value::Vector(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::String(string) => string.chars().count(),
        other => return Err(JaspError::type_error(format!("len expects a collection, got {}", other.type_name()))),
    };
    Ok(Value::Number(length as f64))
}

fn builtin_get(values: Vec<Value>, _output: &mut Output) -> EvaluationResult {
    expect_arity("get", &values, 2)?;

    match (&values[0], &values[1]) {
        (Value::Vector(items), Value::Number(index)) => {
            if index.fract() != 0.0 || *index < 0.0 {
                return Err(JaspError::type_error(format!("get expects a non negative whole index, got {}", index)));
            }
            items.get(*index as usize)
                .cloned()
                .ok_or_else(|| JaspError::type_error(format!("index {} out of range for vector of length {}", index, items.len())))
        }
        (Value::Map(map), key) => map.get(key)
            .cloned()
            .ok_or_else(|| JaspError::type_error(format!("key {:?} not found in map", key))),
        (collection, key) => Err(JaspError::type_error(format!(
            "get cannot index {} with {}",
            collection.type_name(), key.type_name()
        ))),
    }
}

fn builtin(name: &'static str, function: BuiltinFn) -> (String, Value) {
    (name.to_owned(), Value::Function(Function::Builtin(Builtin { name, function })))
}

/// A fresh global frame holding every builtin.
pub(crate) fn builtin_frame() -> Rc<Environment> {
    Environment::root(HashMap::from([
        builtin("+", builtin_add),
        builtin("-", builtin_sub),
        builtin("*", builtin_mul),
        builtin("/", builtin_div),

        builtin("=", builtin_eq),
        builtin(">", builtin_greater),
        builtin(">=", builtin_greater_eq),
        builtin("<", builtin_less),
        builtin("<=", builtin_less_eq),

        builtin("not", builtin_not),
        builtin("and", builtin_and),
        builtin("or", builtin_or),

        builtin("do", builtin_do),
        builtin("print", builtin_print),

        builtin("len", builtin_len),
        builtin("get", builtin_get),
    ]))
}
