use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use crate::{error::JaspError, interpreter::Value};


/// One frame of the lexical scope chain.
///
/// Frames are shared through `Rc` so that closures can keep their defining
/// frame alive after the call that created it has returned. Every frame owns
/// its own bindings; nothing is shared between sibling frames.
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("parent", &self.parent.is_some())
            .finish()
    }
}

impl Environment {
    pub fn root(bindings: HashMap<String, Value>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(bindings),
            parent: None,
        })
    }

    pub fn new(parent: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Binds `name` in this frame, overwriting any previous binding here.
    /// Bindings of the same name in ancestor frames are shadowed, not touched.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        tracing::trace!(%name, "define");
        self.bindings.borrow_mut().insert(name, value);
    }

    pub fn lookup(&self, name: &str) -> Result<Value, JaspError> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Ok(value.clone())
        }
        match &self.parent {
            Some(parent) => parent.lookup(name),
            None => Err(JaspError::UnboundSymbolError(name.to_owned())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
            || self.parent.as_ref().is_some_and(|parent| parent.contains(name))
    }
}
