use core::fmt;
use std::rc::Rc;

use itertools::Itertools;

use crate::{
    context::Output,
    environment::Environment,
    error::JaspError,
    parser::{Binder, Expr, ExprKind, Literal},
};

pub type EvaluationResult = Result<Value, JaspError>;

pub type BuiltinFn = fn(Vec<Value>, &mut Output) -> EvaluationResult;


/// Insertion ordered mapping between runtime values.
///
/// Inserting a key equal to an existing one replaces its value in place, so
/// the first insertion decides where the entry sits.
#[derive(Clone, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

#[derive(Clone, Copy)]
pub struct Builtin {
    pub(crate) name: &'static str,
    pub(crate) function: BuiltinFn,
}

/// A user defined function together with the frame it was defined in.
pub struct Lambda {
    name: String,
    parameters: Vec<String>,
    body: Rc<Expr>,
    environment: Rc<Environment>,
}

impl Lambda {
    fn call(&self, arguments: Vec<Value>, output: &mut Output) -> EvaluationResult {
        // A lambda must receive exactly one value per parameter
        if arguments.len() != self.parameters.len() {
            return Err(JaspError::arity(&self.name, self.parameters.len(), arguments.len()));
        }
        tracing::debug!(name = %self.name, arguments = arguments.len(), "calling function");

        let environment = Environment::new(&self.environment);
        for (parameter, argument) in self.parameters.iter().zip(arguments) {
            environment.define(parameter.as_str(), argument);
        }

        evaluate(&self.body, &environment, output)
    }
}

#[derive(Clone)]
pub enum Function {
    Builtin(Builtin),
    Lambda(Rc<Lambda>),
}

impl Function {
    pub fn call(&self, arguments: Vec<Value>, output: &mut Output) -> EvaluationResult {
        match self {
            Self::Builtin(builtin) => (builtin.function)(arguments, output),
            Self::Lambda(lambda) => lambda.call(arguments, output),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => a.name == b.name,
            (Self::Lambda(a), Self::Lambda(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Self::Lambda(lambda) => write!(f, "<fn {}>", lambda.name),
        }
    }
}

// Value type produced by evaluating expressions. Collections are shared,
// cloning a value never copies a vector or a map
#[derive(Clone, PartialEq)]
pub enum Value {
    /// The absence of a value, e.g. the result of `print`
    Nil,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Vector(Rc<Vec<Value>>),
    Map(Rc<Map>),
    Function(Function),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Vector(_) => "vector",
            Self::Map(_) => "map",
            Self::Function(_) => "function",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::Vector(Rc::new(values))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Self::Map(Rc::new(map))
    }
}

/// Formats a value the way it appears nested inside a collection, with
/// strings quoted.
struct Nested<'a>(&'a Value);

impl<'a> fmt::Display for Nested<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Value::String(string) => write!(f, "{:?}", string),
            value => fmt::Display::fmt(value, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Number(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{}", value),
            Self::Vector(items) => write!(f, "[{}]", items.iter().map(Nested).join(", ")),
            Self::Map(map) => {
                let entries = map.iter()
                    .map(|(key, value)| format!("{}: {}", Nested(key), Nested(value)))
                    .join(", ");
                write!(f, "{{{}}}", entries)
            }
            Self::Function(function) => fmt::Display::fmt(function, f),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt::Display::fmt(&Nested(self), f)
    }
}

fn evaluate_atom(literal: &Literal) -> Value {
    match literal {
        Literal::Number(number) => Value::Number(*number),
        Literal::String(string) => Value::from(string.as_str()),
        Literal::Boolean(boolean) => Value::Boolean(*boolean),
    }
}

fn evaluate_list(list: &[Expr], environment: &Rc<Environment>, output: &mut Output) -> Result<Vec<Value>, JaspError> {
    list.iter()
        .map(|expr| evaluate(expr, environment, output))
        .collect()
}

fn evaluate_map(entries: &[(Expr, Expr)], environment: &Rc<Environment>, output: &mut Output) -> EvaluationResult {
    // Keys and values are evaluated pairwise in declaration order, a later
    // entry with an equal key overwrites the earlier one
    let mut map = Map::new();
    for (key, value) in entries {
        let key = evaluate(key, environment, output)?;
        let value = evaluate(value, environment, output)?;
        map.insert(key, value);
    }
    Ok(Value::from(map))
}

fn evaluate_let(name: &str, value: &Expr, environment: &Rc<Environment>, output: &mut Output) -> EvaluationResult {
    // The binding goes into the frame the let is evaluated in, never a new one
    let value = evaluate(value, environment, output)?;
    environment.define(name, value.clone());
    Ok(value)
}

fn evaluate_if(
    condition: &Expr,
    then: &Expr,
    otherwise: Option<&Expr>,
    environment: &Rc<Environment>,
    output: &mut Output,
) -> EvaluationResult {
    match evaluate(condition, environment, output)? {
        Value::Boolean(true) => evaluate(then, environment, output),
        Value::Boolean(false) => match otherwise {
            Some(otherwise) => evaluate(otherwise, environment, output),
            None => Ok(Value::Nil),
        },
        other => Err(JaspError::type_error(format!(
            "if expression condition must evaluate to a boolean value, got {}",
            other.type_name()
        ))),
    }
}

fn evaluate_while(condition: &Expr, body: &Expr, environment: &Rc<Environment>, output: &mut Output) -> EvaluationResult {
    let mut last = Value::Nil;
    loop {
        match evaluate(condition, environment, output)? {
            Value::Boolean(true) => last = evaluate(body, environment, output)?,
            Value::Boolean(false) => return Ok(last),
            other => return Err(JaspError::type_error(format!(
                "loop condition must evaluate to a boolean value, got {}",
                other.type_name()
            ))),
        }
    }
}

fn evaluate_each(
    collection: &Expr,
    binder: &Binder,
    body: &Expr,
    environment: &Rc<Environment>,
    output: &mut Output,
) -> EvaluationResult {
    // One frame for the whole loop, the binders are redefined in it on every
    // iteration. The collection itself is evaluated in the enclosing frame
    let scope = Environment::new(environment);
    match binder {
        Binder::Element(name) => scope.define(name.as_str(), Value::Nil),
        Binder::Entry(key, value) => {
            scope.define(key.as_str(), Value::Nil);
            scope.define(value.as_str(), Value::Nil);
        }
    }

    let mut last = Value::Nil;
    match (evaluate(collection, environment, output)?, binder) {
        (Value::Vector(items), Binder::Element(name)) => {
            for item in items.iter() {
                scope.define(name.as_str(), item.clone());
                last = evaluate(body, &scope, output)?;
            }
        }
        (Value::Map(map), Binder::Element(name)) => {
            for (key, _) in map.iter() {
                scope.define(name.as_str(), key.clone());
                last = evaluate(body, &scope, output)?;
            }
        }
        (Value::Map(map), Binder::Entry(key_name, value_name)) => {
            for (key, value) in map.iter() {
                scope.define(key_name.as_str(), key.clone());
                scope.define(value_name.as_str(), value.clone());
                last = evaluate(body, &scope, output)?;
            }
        }
        (Value::Vector(_), Binder::Entry(..)) => {
            return Err(JaspError::type_error("each over a vector binds a single name"))
        }
        (other, _) => return Err(JaspError::type_error(format!(
            "each expression expects a vector or a map, got {}",
            other.type_name()
        ))),
    }

    Ok(last)
}

fn evaluate_fn_def(name: &str, parameters: &[String], body: &Rc<Expr>, environment: &Rc<Environment>) -> EvaluationResult {
    // The closure keeps a reference to the defining frame, so later
    // definitions in that frame are visible when it is called
    let function = Value::Function(Function::Lambda(Rc::new(Lambda {
        name: name.to_owned(),
        parameters: parameters.to_vec(),
        body: Rc::clone(body),
        environment: Rc::clone(environment),
    })));

    environment.define(name, function.clone());
    Ok(function)
}

fn evaluate_fn_call(callee: &Expr, arguments: &[Expr], environment: &Rc<Environment>, output: &mut Output) -> EvaluationResult {
    let function = match evaluate(callee, environment, output)? {
        Value::Function(function) => function,
        other => return Err(JaspError::type_error(format!("{} is not a function", other.type_name()))),
    };

    // Arguments are fully evaluated, left to right, before the call
    let arguments = evaluate_list(arguments, environment, output)?;
    function.call(arguments, output)
}

pub fn evaluate(expr: &Expr, environment: &Rc<Environment>, output: &mut Output) -> EvaluationResult {
    tracing::trace!(line = expr.position.line, column = expr.position.column, "evaluate");

    match &expr.kind {
        ExprKind::Atom(literal) => Ok(evaluate_atom(literal)),
        ExprKind::Ref(name) => environment.lookup(name),
        ExprKind::Vector(items) => Ok(Value::from(evaluate_list(items, environment, output)?)),
        ExprKind::Map(entries) => evaluate_map(entries, environment, output),
        ExprKind::Let { name, value } => evaluate_let(name, value, environment, output),
        ExprKind::If { condition, then, otherwise } => {
            evaluate_if(condition, then, otherwise.as_deref(), environment, output)
        }
        ExprKind::While { condition, body } => evaluate_while(condition, body, environment, output),
        ExprKind::Each { collection, binder, body } => evaluate_each(collection, binder, body, environment, output),
        ExprKind::FnDef { name, parameters, body } => evaluate_fn_def(name, parameters, body, environment),
        ExprKind::FnCall { callee, arguments } => evaluate_fn_call(callee, arguments, environment, output),
    }
}


#[cfg(test)]
mod tests {
    use anyhow::bail;

    use crate::{context::EvaluationContext, test_utils::{all_testcases, load_test_pair, TestEvaluationResult, TestOutput}};

    use super::*;

    fn compare_lists(a: &[Value], b: &[TestOutput]) -> bool {
        if a.len() != b.len() { return false; }

        a.iter().zip(b.iter())
            .all(|(a, b)| compare(a, b))
    }

    fn compare(a: &Value, b: &TestOutput) -> bool {
        match (a, b) {
            (Value::Nil, TestOutput::Nil) => true,
            (Value::Number(a), TestOutput::Number(b)) => (a - b).abs() < 1.0e-9,
            (Value::Boolean(a), TestOutput::Boolean(b)) => a == b,
            (Value::Vector(a), TestOutput::List(b)) => compare_lists(a, b),
            (value, TestOutput::Text(text)) => match value {
                Value::String(string) => string.as_ref() == text.as_str(),
                value => value.to_string() == *text,
            },
            _ => false
        }
    }

    fn assert_run(testcase: usize, entries: &[(String, TestEvaluationResult)]) -> anyhow::Result<()> {
        let mut evaluation_context = EvaluationContext::capturing();
        for (lineno, (source, expected)) in entries.iter().enumerate() {
            let result = evaluation_context.evaluate_str(source.as_str());
            let expected: Result<_, _> = expected.clone().into();

            println!("{}:\n{:?}", source, result);
            match (&result, &expected) {
                (Ok(a), Ok(b)) => assert!(compare(a, b), "Testcase({}, {}): Got {:?}, expected {:?}", testcase, lineno, result, expected),
                (Err(result), Err(expected))
                    => assert_eq!(result.kind(), expected.as_str(), "Testcase({}, {}): Got {:?}, expected {:?}", testcase, lineno, result, expected),
                _ => bail!("Testcase({}, {}): Got {:?}, expected {:?}", testcase, lineno, result, expected),
            }
        }

        Ok(())
    }

    #[test]
    fn evaluate_testcase() -> anyhow::Result<()> {
        for testcase in all_testcases() {
            println!("Running testcase {}", testcase);
            let entries = load_test_pair(testcase)?;
            assert_run(testcase, &entries)?;
        }

        Ok(())
    }

    fn run(source: &str) -> anyhow::Result<(Value, String)> {
        let mut context = EvaluationContext::capturing();
        let value = context.evaluate_str(source)?;
        Ok((value, context.take_output()))
    }

    fn run_err(source: &str) -> JaspError {
        match EvaluationContext::capturing().evaluate_str(source) {
            Ok(value) => panic!("expected {:?} to fail, got {:?}", source, value),
            Err(error) => error,
        }
    }

    #[test]
    fn arithmetic_call() -> anyhow::Result<()> {
        assert_eq!(run("(+ 3 4)")?.0, Value::Number(7.0));
        Ok(())
    }

    #[test]
    fn let_binds_in_global_frame() -> anyhow::Result<()> {
        let mut context = EvaluationContext::capturing();
        assert_eq!(context.evaluate_str("(let x 5)")?, Value::Number(5.0));
        assert_eq!(context.evaluate_str("(+ x 2)")?, Value::Number(7.0));
        assert!(context.global().contains("x"));
        Ok(())
    }

    #[test]
    fn named_function_call() -> anyhow::Result<()> {
        assert_eq!(run("(fn add1 (n) (+ n 1)) (add1 41)")?.0, Value::Number(42.0));
        Ok(())
    }

    #[test]
    fn if_selects_branch() -> anyhow::Result<()> {
        assert_eq!(run("(if (> 3 2) \"yes\" \"no\")")?.0, Value::from("yes"));
        assert_eq!(run("(if (< 3 2) \"yes\" \"no\")")?.0, Value::from("no"));
        assert_eq!(run("(if false 1)")?.0, Value::Nil);
        Ok(())
    }

    #[test]
    fn if_requires_boolean_condition() {
        assert_eq!(run_err("(if 1 2 3)").kind(), "TypeError");
        assert_eq!(run_err("(if \"\" 2)").kind(), "TypeError");
    }

    #[test]
    fn each_prints_vector_elements() -> anyhow::Result<()> {
        let (value, printed) = run("(each ([1 2 3]) x (print x))")?;
        assert_eq!(value, Value::Nil);
        assert_eq!(printed, "1\n2\n3\n");
        Ok(())
    }

    #[test]
    fn each_over_map_follows_insertion_order() -> anyhow::Result<()> {
        let (_, printed) = run("(each ({\"b\": 1 \"a\": 2 \"b\": 3} k v) (print k v))")?;
        assert_eq!(printed, "b 3\na 2\n");
        let (_, printed) = run("(each ({1: true 2: false}) k (print k))")?;
        assert_eq!(printed, "1\n2\n");
        Ok(())
    }

    #[test]
    fn each_returns_last_body_value() -> anyhow::Result<()> {
        assert_eq!(run("(each ([1 2 3] x) (* x 10))")?.0, Value::Number(30.0));
        assert_eq!(run("(each ([] x) x)")?.0, Value::Nil);
        Ok(())
    }

    #[test]
    fn each_scope_does_not_leak() {
        assert_eq!(run_err("(each ([1] x) x) x").kind(), "UnboundSymbolError");
    }

    #[test]
    fn each_shares_one_frame_across_iterations() -> anyhow::Result<()> {
        let mut context = EvaluationContext::capturing();
        let source = "(each ([1 2 3] x) (do (if (= x 1) (let acc 0)) (let acc (+ acc x)) acc))";
        assert_eq!(context.evaluate_str(source)?, Value::Number(6.0));
        assert!(!context.global().contains("acc"));
        assert_eq!(context.evaluate_str("acc").unwrap_err(), JaspError::UnboundSymbolError("acc".to_owned()));
        Ok(())
    }

    #[test]
    fn each_requires_collection() {
        assert_eq!(run_err("(let n 3) (each (n x) x)").kind(), "TypeError");
        assert_eq!(run_err("(each ([1 2] k v) k)").kind(), "TypeError");
    }

    #[test]
    fn while_loops_in_same_frame() -> anyhow::Result<()> {
        let source = "(let i 0) (let total 0) (while (< i 4) (do (let total (+ total i)) (let i (+ i 1)))) total";
        assert_eq!(run(source)?.0, Value::Number(6.0));
        assert_eq!(run("(while false 1)")?.0, Value::Nil);
        assert_eq!(run("(let i 0) (while (< i 3) (let i (+ i 1)))")?.0, Value::Number(3.0));
        Ok(())
    }

    #[test]
    fn while_requires_boolean_condition() {
        assert_eq!(run_err("(while 1 2)").kind(), "TypeError");
    }

    #[test]
    fn closure_arity_is_exact() {
        for arguments in ["", "1", "1 2 3"] {
            let source = format!("(fn pair (a b) [a b]) (pair {})", arguments);
            assert_eq!(run_err(&source).kind(), "ArityError");
        }
        assert_eq!(run_err("(fn none () 1) (none 1)").kind(), "ArityError");
    }

    #[test]
    fn let_in_function_body_is_local() {
        let error = run_err("(fn f () (let hidden 1)) (f) hidden");
        assert_eq!(error, JaspError::UnboundSymbolError("hidden".to_owned()));
    }

    #[test]
    fn closures_observe_later_updates_to_captured_frame() -> anyhow::Result<()> {
        let source = "
            (fn outer (n)
              (do
                (fn inner () n)
                (let n (+ n 1))
                (inner)))
            (outer 1)";
        assert_eq!(run(source)?.0, Value::Number(2.0));
        Ok(())
    }

    #[test]
    fn closures_outlive_their_defining_call() -> anyhow::Result<()> {
        let source = "
            (fn make-adder (n) (fn adder (x) (+ x n)))
            (let add5 (make-adder 5))
            (add5 10)";
        assert_eq!(run(source)?.0, Value::Number(15.0));
        Ok(())
    }

    #[test]
    fn globals_defined_after_function_are_visible() -> anyhow::Result<()> {
        assert_eq!(run("(fn spam () (* eggs 3)) (let eggs 20) (spam)")?.0, Value::Number(60.0));
        Ok(())
    }

    #[test]
    fn recursion_gets_fresh_frames() -> anyhow::Result<()> {
        let source = "(fn fact (n) (if (<= n 1) 1 (* n (fact (- n 1))))) (fact 10)";
        assert_eq!(run(source)?.0, Value::Number(3628800.0));
        Ok(())
    }

    #[test]
    fn immediately_invoked_function() -> anyhow::Result<()> {
        assert_eq!(run("((fn anon (a) (+ 2 a)) 5)")?.0, Value::Number(7.0));
        Ok(())
    }

    #[test]
    fn arguments_evaluate_left_to_right_before_call() -> anyhow::Result<()> {
        let (_, printed) = run("(fn second (a b) b) (second (print \"first\") (print \"second\"))")?;
        assert_eq!(printed, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn calling_non_function_fails() {
        assert_eq!(run_err("(1 2)").kind(), "TypeError");
    }

    #[test]
    fn unbound_reference_fails() {
        assert_eq!(run_err("(+ missing 1)"), JaspError::UnboundSymbolError("missing".to_owned()));
    }

    #[test]
    fn vector_and_map_literals() -> anyhow::Result<()> {
        let (value, _) = run("(let x 2) [1 x (+ x 1)]")?;
        assert_eq!(value, Value::from(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]));

        let (value, _) = run("{\"a\": 1 (+ 1 1): [2] \"a\": 3}")?;
        let Value::Map(map) = value else { bail!("not a map") };
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::from("a")), Some(&Value::Number(3.0)));
        assert_eq!(map.get(&Value::Number(2.0)), Some(&Value::from(vec![Value::Number(2.0)])));
        Ok(())
    }

    #[test]
    fn function_values_display_their_name() -> anyhow::Result<()> {
        assert_eq!(run("(fn add1 (n) (+ n 1))")?.0.to_string(), "<fn add1>");
        assert_eq!(run("+")?.0.to_string(), "<builtin +>");
        Ok(())
    }

    #[test]
    fn nested_display_quotes_strings() -> anyhow::Result<()> {
        let (value, _) = run("[\"a\" {\"k\": [1 true]}]")?;
        assert_eq!(value.to_string(), "[\"a\", {\"k\": [1, true]}]");
        Ok(())
    }

    #[test]
    fn collections_are_shared_not_copied() -> anyhow::Result<()> {
        let mut context = EvaluationContext::capturing();
        context.evaluate_str("(let a [1 2]) (let b a)")?;
        let (Value::Vector(a), Value::Vector(b)) = (context.global().lookup("a")?, context.global().lookup("b")?) else {
            bail!("expected vectors")
        };
        assert!(Rc::ptr_eq(&a, &b));
        Ok(())
    }

    #[test]
    fn functions_compare_by_identity() -> anyhow::Result<()> {
        let mut context = EvaluationContext::capturing();
        assert_eq!(context.evaluate_str("(fn f () 1) (let g f) (= f g)")?, Value::Boolean(true));
        assert_eq!(context.evaluate_str("(fn h () 1) (= f h)")?, Value::Boolean(false));
        Ok(())
    }
}
