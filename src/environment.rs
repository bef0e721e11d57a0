use crate::Error;
use crate::ast::{Callable, Value};
use crate::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Expected number of arguments for a builtin or special form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check an argument count, producing an unnamed ArityError on mismatch.
    pub fn validate(&self, count: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if count != n => Err(Error::arity_error(n, count)),
            Arity::AtLeast(n) if count < n => Err(Error::arity_error(n, count)),
            Arity::Range(min, _) if count < min => Err(Error::arity_error(min, count)),
            Arity::Range(_, max) if count > max => Err(Error::arity_error(max, count)),
            _ => Ok(()),
        }
    }
}

/// Lexical scope for variable bindings.
///
/// An `Environment` is a cheap handle: clones share the same frame, so a
/// binding added through one handle is visible through every other. Each
/// frame may have a parent; lookups walk outwards, definitions always land
/// in the frame the handle points at.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
    /// Frames that bind a user function, shared across one scope tree.
    function_frames: Rc<RefCell<Vec<Weak<RefCell<Frame>>>>>,
}

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
    holds_function: bool,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty child scope of `parent`.
    pub fn with_parent(parent: &Environment) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(parent.clone()),
                holds_function: false,
            })),
            function_frames: Rc::clone(&parent.function_frames),
        }
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        let is_function = matches!(value, Value::Callable(Callable::Function(_)));
        let mut frame = self.frame.borrow_mut();
        if is_function && !frame.holds_function {
            frame.holds_function = true;
            self.function_frames
                .borrow_mut()
                .push(Rc::downgrade(&self.frame));
        }
        frame.bindings.insert(name.into(), value);
    }

    /// Clear every scope in this tree that binds a user function.
    ///
    /// A user function holds its defining scope, and that scope (or one of
    /// its ancestors) usually binds the function, so these scopes never
    /// reach a zero reference count. Every such cycle passes through a
    /// function binding, which this removes. Function values still held
    /// afterwards keep working only as far as they do not look up names in
    /// the cleared scopes.
    pub fn release(&self) {
        let frames = std::mem::take(&mut *self.function_frames.borrow_mut());
        for frame in frames.iter().filter_map(Weak::upgrade) {
            let bindings = {
                let mut frame = frame.borrow_mut();
                frame.holds_function = false;
                std::mem::take(&mut frame.bindings)
            };
            drop(bindings);
        }
    }

    /// Resolve `name`, walking parent scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.frame.borrow();
        match frame.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => frame.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    /// Whether `name` resolves in this scope or any parent.
    pub fn is_bound(&self, name: &str) -> bool {
        let frame = self.frame.borrow();
        frame.bindings.contains_key(name)
            || frame
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_bound(name))
    }

    /// Whether `name` is bound directly in this scope.
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.frame.borrow().bindings.contains_key(name)
    }

    /// Register a host function that works on raw evaluated values.
    ///
    /// # Example
    /// ```
    /// use minilisp::Value;
    /// use minilisp::Error;
    /// use minilisp::interpreter::Interpreter;
    ///
    /// fn count(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::from(args.len() as u32))
    /// }
    ///
    /// let interpreter = Interpreter::new();
    /// interpreter.environment().register_builtin_function("count", count);
    /// assert_eq!(interpreter.run("(count 1 2 3)"), Ok(Value::from(3)));
    /// ```
    pub fn register_builtin_function(&self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.define_builtin(name, wrapped);
    }

    /// Register a strongly-typed Rust function with a fixed number of
    /// parameters. Arity and parameter types are checked on every call.
    ///
    /// ```
    /// use minilisp::Value;
    /// use minilisp::interpreter::Interpreter;
    ///
    /// fn hypot(a: f64, b: f64) -> f64 {
    ///     (a * a + b * b).sqrt()
    /// }
    ///
    /// let interpreter = Interpreter::new();
    /// interpreter
    ///     .environment()
    ///     .register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// assert_eq!(interpreter.run("(hypot 3 4)"), Ok(Value::from(5)));
    /// ```
    ///
    /// Takes one or two parameters, each `f64`, `bool` or `Value`.
    /// Return types are anything `Into<Value>` or `Result<T, Error>` of one.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        let wrapped = func.into_operation();
        let id = name.to_owned();
        self.define_builtin(
            name,
            Arc::new(move |args: Vec<Value>| wrapped(args).map_err(|err| err.with_callee(&id))),
        );
    }

    /// Register a function whose last parameter is a rest iterator
    /// ([`crate::intooperation::NumIter`] or `ValueIter`), optionally after
    /// one fixed parameter.
    ///
    /// The total argument count is validated against `arity` before the
    /// function runs, since it cannot be derived from the signature.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args> + 'static,
    {
        let inner = func.into_variadic_operation();
        let id = name.to_owned();
        self.define_builtin(
            name,
            Arc::new(move |args: Vec<Value>| {
                arity
                    .validate(args.len())
                    .and_then(|()| inner(args))
                    .map_err(|err| err.with_callee(&id))
            }),
        );
    }

    fn define_builtin(&self, name: &str, func: Arc<OperationFn>) {
        self.define(
            name,
            Value::Callable(Callable::Builtin {
                id: name.to_owned(),
                func,
            }),
        );
    }

    /// Get all bindings visible from this scope, inner bindings shadowing
    /// outer ones. Returns (name, value) pairs sorted by name.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();
        self.collect_bindings(&mut bindings);

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    fn collect_bindings(&self, into: &mut HashMap<String, Value>) {
        let frame = self.frame.borrow();
        // Parent first so local bindings override
        if let Some(parent) = &frame.parent {
            parent.collect_bindings(into);
        }
        for (name, value) in &frame.bindings {
            into.insert(name.clone(), value.clone());
        }
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Scopes can reach themselves through closures, so only names are shown.
        let frame = self.frame.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}
