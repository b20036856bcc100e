use core::fmt;

use itertools::Itertools;
use libfuzzer_sys::arbitrary::Arbitrary;

// Builtins, literals and loads from variables
#[derive(Arbitrary, Debug)]
pub enum JaspAtom {
    Add, Sub, Mul, Div,
    Eq, Greater, GreaterEq,
    Less, LessEq,
    Not, And, Or,
    Do, Print, Len, Get,
    True, False,

    Identifier(String),
    Text(String),
    Number(u32),
}

impl fmt::Display for JaspAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            JaspAtom::Add => "+",
            JaspAtom::Sub => "-",
            JaspAtom::Mul => "*",
            JaspAtom::Div => "/",
            JaspAtom::Eq => "=",
            JaspAtom::Greater => ">",
            JaspAtom::GreaterEq => ">=",
            JaspAtom::Less => "<",
            JaspAtom::LessEq => "<=",
            JaspAtom::Not => "not",
            JaspAtom::And => "and",
            JaspAtom::Or => "or",
            JaspAtom::Do => "do",
            JaspAtom::Print => "print",
            JaspAtom::Len => "len",
            JaspAtom::Get => "get",
            JaspAtom::True => "true",
            JaspAtom::False => "false",
            JaspAtom::Identifier(identifier) => identifier,
            JaspAtom::Text(text) => return write!(f, "{:?}", text),
            JaspAtom::Number(value) => return write!(f, "{}", value),
        })
    }
}

#[derive(Arbitrary, Debug)]
pub enum JaspForm {
    Let(String, Box<JaspForm>),
    If(Vec<JaspForm>),
    While(Vec<JaspForm>),
    Each(Box<JaspForm>, Vec<String>, Box<JaspForm>),
    Fn(String, Vec<String>, Box<JaspForm>),
    Call(Vec<JaspForm>),
    Vector(Vec<JaspForm>),
    Map(Vec<(JaspForm, JaspForm)>),

    Atom(JaspAtom),
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values.iter().map(T::to_string).join(" ")
}

impl fmt::Display for JaspForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JaspForm::Let(name, value) => write!(f, "(let {} {})", name, value),
            JaspForm::If(args) => write!(f, "(if {})", join(args)),
            JaspForm::While(args) => write!(f, "(while {})", join(args)),
            JaspForm::Each(collection, binders, body) => write!(f, "(each ({} {}) {})", collection, join(binders), body),
            JaspForm::Fn(name, parameters, body) => write!(f, "(fn {} ({}) {})", name, join(parameters), body),
            JaspForm::Call(args) => write!(f, "({})", join(args)),
            JaspForm::Vector(items) => write!(f, "[{}]", join(items)),
            JaspForm::Map(entries) => {
                write!(f, "{{{}}}", entries.iter().map(|(key, value)| format!("{}: {}", key, value)).join(" "))
            }
            JaspForm::Atom(atom) => atom.fmt(f),
        }
    }
}
