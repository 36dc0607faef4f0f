//! A small interpreter for named output programs
//!
//! Runs a [`JsProgram`] closely enough to the way a browser would run its
//! printed text to compare programs compiled with different options.
//! Variables are resolved through the names the AST already carries and
//! properties through their printed text.
//!
//! Native bodies are opaque text, so each one needs a host implementation
//! registered under its exact code. The support library's natives and
//! [`PRINT_NATIVE`] are registered by default.

use indexmap::IndexMap;
use jjs_core::jast::runtime as rt;
use jjs_core::js::ast::{JsBinaryOp, JsExpression, JsExpressionKind, JsFunction, JsProgram, JsStatement, JsStatementKind, JsUnaryOp};
use jjs_core::js::scope::NameId;
use jjs_core::js::source_gen::format_number;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Native body that appends its single argument `x` to the output
pub const PRINT_NATIVE: &str = "console.log(x);";

const DEFAULT_FUEL: usize = 2_000_000;
const MAX_CALL_DEPTH: usize = 400;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("uncaught exception: {0}")]
    Uncaught(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("no host implementation for native body `{0}`")]
    UnknownNative(String),

    #[error("step limit exceeded")]
    OutOfFuel,

    #[error("call stack exceeded {0} frames")]
    StackOverflow(usize),
}

fn type_error(message: impl Into<String>) -> Unwind {
    Unwind::Error(EvalError::Type(message.into()))
}

/// Abrupt completion of an expression
enum Unwind {
    Throw(Value),
    Error(EvalError),
}

impl From<EvalError> for Unwind {
    fn from(error: EvalError) -> Self {
        Unwind::Error(error)
    }
}

type Eval<T> = Result<T, Unwind>;

pub type ObjectRef = Rc<RefCell<Object>>;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObjectRef),
}

#[derive(Default)]
pub struct Object {
    pub props: IndexMap<String, Value>,
    pub proto: Option<ObjectRef>,
    /// Present for arrays
    pub elements: Option<Vec<Value>>,
    function: Option<Rc<JsFunction>>,
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn new_object(proto: Option<ObjectRef>) -> Self {
        Value::Object(Rc::new(RefCell::new(Object {
            proto,
            ..Object::default()
        })))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(Object {
            elements: Some(elements),
            ..Object::default()
        })))
    }

    fn function(function: &JsFunction) -> Self {
        Value::Object(Rc::new(RefCell::new(Object {
            function: Some(Rc::new(function.clone())),
            ..Object::default()
        })))
    }

    fn callable(&self) -> Option<Rc<JsFunction>> {
        match self {
            Value::Object(object) => object.borrow().function.clone(),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Object(object) => match &object.borrow().elements {
                Some(elements) if elements.is_empty() => 0.0,
                Some(elements) if elements.len() == 1 => elements[0].to_number(),
                _ => f64::NAN,
            },
        }
    }

    fn to_int32(&self) -> i32 {
        to_int32(self.to_number())
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(object) if object.borrow().function.is_some() => "function",
            Value::Object(_) => "object",
        }
    }

    /// Text without calling any `toString` of the program
    pub fn display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Object(object) => {
                let object = object.borrow();
                match &object.elements {
                    Some(elements) => elements
                        .iter()
                        .map(|e| match e {
                            Value::Undefined | Value::Null => String::new(),
                            other => other.display(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    None if object.function.is_some() => "function".to_string(),
                    None => "[object Object]".to_string(),
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => f.write_str(&other.display()),
        }
    }
}

pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
    wrapped as u32 as i32
}

pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => a.to_number() == b.to_number(),
        (Value::Bool(_), _) => loose_equals(&Value::Number(a.to_number()), b),
        (_, Value::Bool(_)) => loose_equals(a, &Value::Number(b.to_number())),
        _ => strict_equals(a, b),
    }
}

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn java_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

fn lookup(object: &ObjectRef, key: &str) -> Value {
    {
        let obj = object.borrow();
        if let Some(elements) = &obj.elements {
            if key == "length" {
                return Value::Number(elements.len() as f64);
            }
            if let Ok(index) = key.parse::<usize>() {
                return elements.get(index).cloned().unwrap_or(Value::Undefined);
            }
        }
        if let Some(value) = obj.props.get(key) {
            return value.clone();
        }
    }
    if key == "prototype" && object.borrow().function.is_some() {
        let proto = Value::new_object(None);
        object.borrow_mut().props.insert(key.to_string(), proto.clone());
        return proto;
    }
    let proto = object.borrow().proto.clone();
    match proto {
        Some(proto) => lookup(&proto, key),
        None => Value::Undefined,
    }
}

fn get_property(target: &Value, key: &str) -> Eval<Value> {
    match target {
        Value::Undefined | Value::Null => Err(type_error(format!(
            "cannot read '{}' of {}",
            key,
            target.display()
        ))),
        Value::Str(s) if key == "length" => Ok(Value::Number(utf16(s).len() as f64)),
        Value::Str(_) | Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
        Value::Object(object) => Ok(lookup(object, key)),
    }
}

fn set_property(target: &Value, key: &str, value: Value) -> Eval<()> {
    let Value::Object(object) = target else {
        return match target {
            Value::Undefined | Value::Null => Err(type_error(format!(
                "cannot set '{}' of {}",
                key,
                target.display()
            ))),
            _ => Ok(()),
        };
    };
    let mut object = object.borrow_mut();
    if let Some(elements) = &mut object.elements {
        if let Ok(index) = key.parse::<usize>() {
            if index >= elements.len() {
                elements.resize(index + 1, Value::Undefined);
            }
            elements[index] = value;
            return Ok(());
        }
    }
    object.props.insert(key.to_string(), value);
    Ok(())
}

fn property_key(value: &Value) -> String {
    value.display()
}

// ----------------------------------------------------------------------
// Natives
// ----------------------------------------------------------------------

type HostFn = Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>;

#[derive(Clone)]
enum Native {
    Host(HostFn),
    /// Host function receiving `this` as its first argument
    Method(HostFn),
    Print,
    CanCast,
    CanStore,
    ObjectEquals,
    ObjectHashCode,
    ObjectToString,
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn int_arg(args: &[Value], index: usize) -> i32 {
    arg(args, index).to_int32()
}

fn str_arg(args: &[Value], index: usize) -> String {
    arg(args, index).display()
}

fn long_arg(args: &[Value], index: usize) -> Result<i64, EvalError> {
    let value = arg(args, index);
    let Value::Object(object) = &value else {
        return Err(EvalError::Type(format!("expected a long, got {}", value.display())));
    };
    let object = object.borrow();
    match object.elements.as_deref() {
        Some([lo, hi]) => Ok((i64::from(hi.to_int32()) << 32) | i64::from(lo.to_number() as u32)),
        _ => Err(EvalError::Type("expected a two-element long".to_string())),
    }
}

fn long_value(value: i64) -> Value {
    Value::array(vec![
        Value::Number(f64::from(value as u32)),
        Value::Number(f64::from((value >> 32) as i32)),
    ])
}

fn seed_value(seed: i32) -> Value {
    match seed {
        rt::SEED_NUMBER => Value::Number(0.0),
        rt::SEED_BOOLEAN => Value::Bool(false),
        rt::SEED_LONG => long_value(0),
        _ => Value::Null,
    }
}

fn init_dims(dims: &[usize], seed: i32, query_id: &Value) -> Value {
    let Some((first, rest)) = dims.split_first() else {
        return seed_value(seed);
    };
    let elements = (0..*first)
        .map(|_| {
            if rest.is_empty() {
                seed_value(seed)
            } else {
                init_dims(rest, seed, query_id)
            }
        })
        .collect();
    let array = Value::array(elements);
    if rest.is_empty() {
        let _ = set_property(&array, "queryId$", query_id.clone());
    }
    array
}

fn host(f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static) -> Native {
    Native::Host(Rc::new(f))
}

fn default_natives() -> FxHashMap<String, Native> {
    let mut natives: FxHashMap<String, Native> = FxHashMap::default();
    natives.insert(PRINT_NATIVE.to_string(), Native::Print);
    natives.insert(rt::CAST_CAN_CAST.to_string(), Native::CanCast);
    natives.insert(rt::ARRAY_CAN_STORE.to_string(), Native::CanStore);
    natives.insert(rt::OBJECT_EQUALS_HELPER.to_string(), Native::ObjectEquals);
    natives.insert(rt::OBJECT_HASH_CODE_HELPER.to_string(), Native::ObjectHashCode);
    natives.insert(rt::OBJECT_TO_STRING_HELPER.to_string(), Native::ObjectToString);

    // String helpers take the string first; the instance forms read `this`
    let strings: [(&str, HostFn); 8] = [
        (rt::STRING_LENGTH, Rc::new(|a| Ok(Value::Number(utf16(&str_arg(a, 0)).len() as f64)))),
        (
            rt::STRING_CHAR_AT,
            Rc::new(|a| {
                let units = utf16(&str_arg(a, 0));
                let index = usize::try_from(int_arg(a, 1)).unwrap_or(usize::MAX);
                Ok(units.get(index).map_or(Value::Number(f64::NAN), |u| Value::Number(f64::from(*u))))
            }),
        ),
        (rt::STRING_EQUALS, Rc::new(|a| Ok(Value::Bool(strict_equals(&Value::string(&str_arg(a, 0)), &arg(a, 1)))))),
        (rt::STRING_HASH_CODE, Rc::new(|a| Ok(Value::Number(f64::from(java_hash(&str_arg(a, 0))))))),
        (rt::STRING_TO_STRING, Rc::new(|a| Ok(Value::string(&str_arg(a, 0))))),
        (
            rt::STRING_SUBSTRING,
            Rc::new(|a| {
                let units = utf16(&str_arg(a, 0));
                let clamp = |v: i32| usize::try_from(v.max(0)).unwrap_or(0).min(units.len());
                let (mut begin, mut end) = (clamp(int_arg(a, 1)), clamp(int_arg(a, 2)));
                if matches!(arg(a, 2), Value::Undefined) {
                    end = units.len();
                }
                if begin > end {
                    std::mem::swap(&mut begin, &mut end);
                }
                Ok(Value::string(&String::from_utf16_lossy(&units[begin..end])))
            }),
        ),
        (
            rt::STRING_INDEX_OF,
            Rc::new(|a| {
                let haystack = utf16(&str_arg(a, 0));
                let needle = utf16(&str_arg(a, 1));
                let found = if needle.is_empty() {
                    Some(0)
                } else {
                    haystack.windows(needle.len()).position(|w| w == needle.as_slice())
                };
                Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
            }),
        ),
        (rt::STRING_IS_EMPTY, Rc::new(|a| Ok(Value::Bool(str_arg(a, 0).is_empty())))),
    ];
    for (code, f) in strings {
        natives.insert(format!("var s = String(this); {}", code), Native::Method(f.clone()));
        natives.insert(code.to_string(), Native::Host(f));
    }

    natives.insert(
        rt::CAST_IS_STRING.to_string(),
        host(|a| Ok(Value::Bool(matches!(arg(a, 0), Value::Str(_))))),
    );
    natives.insert(
        rt::CAST_IS_ARRAY.to_string(),
        host(|a| {
            Ok(Value::Bool(
                matches!(arg(a, 0), Value::Object(o) if o.borrow().elements.is_some()),
            ))
        }),
    );
    natives.insert(rt::CAST_NARROW_BYTE.to_string(), host(|a| Ok(Value::Number(f64::from(int_arg(a, 0) as i8)))));
    natives.insert(rt::CAST_NARROW_SHORT.to_string(), host(|a| Ok(Value::Number(f64::from(int_arg(a, 0) as i16)))));
    natives.insert(rt::CAST_NARROW_CHAR.to_string(), host(|a| Ok(Value::Number(f64::from(int_arg(a, 0) as u16)))));
    natives.insert(rt::CAST_NARROW_INT.to_string(), host(|a| Ok(Value::Number(f64::from(int_arg(a, 0))))));
    natives.insert(
        rt::CAST_ROUND_INT.to_string(),
        host(|a| {
            let x = arg(a, 0).to_number().clamp(-2_147_483_648.0, 2_147_483_647.0);
            Ok(Value::Number(f64::from(to_int32(x))))
        }),
    );
    natives.insert(
        rt::CAST_CHAR_TO_STRING.to_string(),
        host(|a| Ok(Value::string(&String::from_utf16_lossy(&[int_arg(a, 0) as u16])))),
    );

    natives.insert(
        rt::ARRAY_INIT_DIM.to_string(),
        host(|a| {
            let length = usize::try_from(int_arg(a, 0)).unwrap_or(0);
            Ok(init_dims(&[length], int_arg(a, 1), &arg(a, 2)))
        }),
    );
    natives.insert(
        rt::ARRAY_INIT_DIMS.to_string(),
        host(|a| {
            let dims = match arg(a, 0) {
                Value::Object(o) => o
                    .borrow()
                    .elements
                    .iter()
                    .flatten()
                    .map(|d| usize::try_from(d.to_int32()).unwrap_or(0))
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            };
            Ok(init_dims(&dims, int_arg(a, 1), &arg(a, 2)))
        }),
    );
    natives.insert(
        rt::ARRAY_INIT_VALUES.to_string(),
        host(|a| {
            let elements = match arg(a, 0) {
                Value::Object(o) => o.borrow().elements.clone().unwrap_or_default(),
                _ => Vec::new(),
            };
            let array = Value::array(elements);
            set_property(&array, "queryId$", arg(a, 1)).map_err(|_| EvalError::Type("initValues".to_string()))?;
            Ok(array)
        }),
    );
    natives.insert(
        rt::ARRAY_SET_UNCHECKED.to_string(),
        host(|a| {
            let key = property_key(&arg(a, 1));
            set_property(&arg(a, 0), &key, arg(a, 2)).map_err(|_| EvalError::Type("setUnchecked".to_string()))?;
            Ok(arg(a, 2))
        }),
    );

    let binary: [(&str, fn(i64, i64) -> Option<i64>); 8] = [
        (rt::LONG_ADD, |x, y| Some(x.wrapping_add(y))),
        (rt::LONG_SUB, |x, y| Some(x.wrapping_sub(y))),
        (rt::LONG_MUL, |x, y| Some(x.wrapping_mul(y))),
        (rt::LONG_DIV, |x, y| (y != 0).then(|| x.wrapping_div(y))),
        (rt::LONG_MOD, |x, y| (y != 0).then(|| x.wrapping_rem(y))),
        (rt::LONG_AND, |x, y| Some(x & y)),
        (rt::LONG_OR, |x, y| Some(x | y)),
        (rt::LONG_XOR, |x, y| Some(x ^ y)),
    ];
    for (code, op) in binary {
        natives.insert(
            code.to_string(),
            host(move |a| {
                op(long_arg(a, 0)?, long_arg(a, 1)?)
                    .map(long_value)
                    .ok_or_else(|| EvalError::Type("long division by zero".to_string()))
            }),
        );
    }
    let shifts: [(&str, fn(i64, u32) -> i64); 3] = [
        (rt::LONG_SHL, |x, n| x.wrapping_shl(n)),
        (rt::LONG_SHR, |x, n| x >> n),
        (rt::LONG_SHRU, |x, n| ((x as u64) >> n) as i64),
    ];
    for (code, op) in shifts {
        natives.insert(
            code.to_string(),
            host(move |a| Ok(long_value(op(long_arg(a, 0)?, (int_arg(a, 1) & 63) as u32)))),
        );
    }
    let compares: [(&str, fn(i64, i64) -> bool); 6] = [
        (rt::LONG_EQ, |x, y| x == y),
        (rt::LONG_NEQ, |x, y| x != y),
        (rt::LONG_LT, |x, y| x < y),
        (rt::LONG_LTE, |x, y| x <= y),
        (rt::LONG_GT, |x, y| x > y),
        (rt::LONG_GTE, |x, y| x >= y),
    ];
    for (code, op) in compares {
        natives.insert(
            code.to_string(),
            host(move |a| Ok(Value::Bool(op(long_arg(a, 0)?, long_arg(a, 1)?)))),
        );
    }
    natives.insert(rt::LONG_NEG.to_string(), host(|a| Ok(long_value(long_arg(a, 0)?.wrapping_neg()))));
    natives.insert(rt::LONG_NOT.to_string(), host(|a| Ok(long_value(!long_arg(a, 0)?))));
    natives.insert(rt::LONG_FROM_INT.to_string(), host(|a| Ok(long_value(i64::from(int_arg(a, 0))))));
    natives.insert(
        rt::LONG_FROM_DOUBLE.to_string(),
        host(|a| {
            let x = arg(a, 0).to_number();
            // `as` saturates and maps NaN to zero
            Ok(long_value(x.trunc() as i64))
        }),
    );
    natives.insert(
        rt::LONG_TO_INT.to_string(),
        host(|a| Ok(Value::Number(f64::from(long_arg(a, 0)? as i32)))),
    );
    natives.insert(
        rt::LONG_TO_DOUBLE.to_string(),
        host(|a| Ok(Value::Number(long_arg(a, 0)? as f64))),
    );
    natives.insert(
        rt::LONG_TO_STRING.to_string(),
        host(|a| Ok(Value::string(&long_arg(a, 0)?.to_string()))),
    );
    natives
}

// ----------------------------------------------------------------------
// Evaluation
// ----------------------------------------------------------------------

enum Completion {
    Normal,
    Return(Value),
    Break(Option<NameId>),
    Continue(Option<NameId>),
}

struct Frame {
    this: Value,
    locals: FxHashMap<NameId, Value>,
}

impl Frame {
    fn new(this: Value) -> Self {
        Self {
            this,
            locals: FxHashMap::default(),
        }
    }
}

enum Place {
    Name(NameId),
    Property(Value, String),
}

pub struct Evaluator<'a> {
    program: &'a JsProgram,
    globals: FxHashMap<NameId, Value>,
    natives: FxHashMap<String, Native>,
    output: Vec<String>,
    fuel: usize,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(program: &'a JsProgram) -> Self {
        Self {
            program,
            globals: FxHashMap::default(),
            natives: default_natives(),
            output: Vec::new(),
            fuel: DEFAULT_FUEL,
            depth: 0,
        }
    }

    pub fn with_fuel(mut self, fuel: usize) -> Self {
        self.fuel = fuel;
        self
    }

    /// Implement the native body `code`
    pub fn with_native(
        mut self,
        code: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        self.natives.insert(code.into(), host(f));
        self
    }

    /// Lines appended by [`PRINT_NATIVE`]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// A global binding by printed name
    pub fn global(&self, text: &str) -> Option<Value> {
        self.globals
            .iter()
            .find(|(name, _)| self.program.name_text(**name) == text)
            .map(|(_, value)| value.clone())
    }

    /// Run the global block
    pub fn run(&mut self) -> Result<(), EvalError> {
        let program = self.program;
        for stmt in &program.global_block {
            if let JsStatementKind::Function(function) = &stmt.kind {
                if let Some(name) = function.name {
                    self.globals.insert(name, Value::function(function));
                }
            }
        }
        let mut frame = Frame::new(Value::Undefined);
        for stmt in &program.global_block {
            match self.exec(&mut frame, stmt) {
                Ok(_) => {}
                Err(Unwind::Throw(value)) => return Err(EvalError::Uncaught(describe_thrown(&value))),
                Err(Unwind::Error(error)) => return Err(error),
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Eval<()> {
        if self.fuel == 0 {
            return Err(EvalError::OutOfFuel.into());
        }
        self.fuel -= 1;
        Ok(())
    }

    fn is_global(&self, name: NameId) -> bool {
        let scope = self.program.names[name].scope;
        scope == self.program.top_scope || scope == self.program.root_scope
    }

    fn read_name(&self, frame: &Frame, name: NameId) -> Eval<Value> {
        if let Some(value) = frame.locals.get(&name) {
            return Ok(value.clone());
        }
        if !self.is_global(name) {
            return Ok(Value::Undefined);
        }
        if let Some(value) = self.globals.get(&name) {
            return Ok(value.clone());
        }
        match self.program.name_text(name) {
            "undefined" => Ok(Value::Undefined),
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            other => Err(type_error(format!("{} is not defined", other))),
        }
    }

    fn assign_name(&mut self, frame: &mut Frame, name: NameId, value: Value) {
        if self.is_global(name) {
            self.globals.insert(name, value);
        } else {
            frame.locals.insert(name, value);
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_block(&mut self, frame: &mut Frame, stmts: &[JsStatement]) -> Eval<Completion> {
        for stmt in stmts {
            match self.exec(frame, stmt)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec(&mut self, frame: &mut Frame, stmt: &JsStatement) -> Eval<Completion> {
        self.tick()?;
        match &stmt.kind {
            JsStatementKind::Block(stmts) => self.exec_block(frame, stmts),
            JsStatementKind::Expression(expr) => {
                self.eval(frame, expr)?;
                Ok(Completion::Normal)
            }
            JsStatementKind::Vars(vars) => {
                for var in vars {
                    match &var.init {
                        Some(init) => {
                            let value = self.eval(frame, init)?;
                            self.assign_name(frame, var.name, value);
                        }
                        None => {
                            let bound = frame.locals.contains_key(&var.name) || self.globals.contains_key(&var.name);
                            if !bound {
                                self.assign_name(frame, var.name, Value::Undefined);
                            }
                        }
                    }
                }
                Ok(Completion::Normal)
            }
            JsStatementKind::Function(function) => {
                if let Some(name) = function.name {
                    // top-level functions are bound before the first statement runs
                    if !self.globals.contains_key(&name) {
                        self.assign_name(frame, name, Value::function(function));
                    }
                }
                Ok(Completion::Normal)
            }
            JsStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                if self.eval(frame, cond)?.truthy() {
                    self.exec(frame, then_stmt)
                } else if let Some(else_stmt) = else_stmt {
                    self.exec(frame, else_stmt)
                } else {
                    Ok(Completion::Normal)
                }
            }
            JsStatementKind::While { .. } | JsStatementKind::DoWhile { .. } | JsStatementKind::For { .. } => {
                self.exec_loop(frame, stmt, None)
            }
            JsStatementKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(frame, value)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            JsStatementKind::Throw(value) => Err(Unwind::Throw(self.eval(frame, value)?)),
            JsStatementKind::Break(label) => Ok(Completion::Break(*label)),
            JsStatementKind::Continue(label) => Ok(Completion::Continue(*label)),
            JsStatementKind::Label { label, body } => {
                let completion = match body.kind {
                    JsStatementKind::While { .. } | JsStatementKind::DoWhile { .. } | JsStatementKind::For { .. } => {
                        self.exec_loop(frame, body, Some(*label))?
                    }
                    _ => self.exec(frame, body)?,
                };
                match completion {
                    Completion::Break(Some(l)) if l == *label => Ok(Completion::Normal),
                    other => Ok(other),
                }
            }
            JsStatementKind::Try { block, catch, finally } => {
                let mut outcome = self.exec_block(frame, block);
                if let Some(catch) = catch {
                    if let Err(Unwind::Throw(value)) = outcome {
                        frame.locals.insert(catch.param, value);
                        outcome = self.exec_block(frame, &catch.body);
                    }
                }
                if let Some(finally) = finally {
                    match self.exec_block(frame, finally)? {
                        Completion::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                outcome
            }
            JsStatementKind::Switch { expr, cases } => {
                let value = self.eval(frame, expr)?;
                let mut start = None;
                for (index, case) in cases.iter().enumerate() {
                    if let Some(label) = &case.label {
                        let label = self.eval(frame, label)?;
                        if strict_equals(&value, &label) {
                            start = Some(index);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|c| c.label.is_none()));
                if let Some(start) = start {
                    for case in &cases[start..] {
                        match self.exec_block(frame, &case.body)? {
                            Completion::Normal => {}
                            Completion::Break(None) => return Ok(Completion::Normal),
                            abrupt => return Ok(abrupt),
                        }
                    }
                }
                Ok(Completion::Normal)
            }
            JsStatementKind::Empty => Ok(Completion::Normal),
            JsStatementKind::Verbatim(code) => Err(type_error(format!("verbatim code outside a native function: {}", code))),
        }
    }

    /// `Some` when the loop must stop with that completion
    fn loop_body(&mut self, frame: &mut Frame, body: &JsStatement, label: Option<NameId>) -> Eval<Option<Completion>> {
        Ok(match self.exec(frame, body)? {
            Completion::Normal | Completion::Continue(None) => None,
            Completion::Continue(Some(l)) if Some(l) == label => None,
            Completion::Break(None) => Some(Completion::Normal),
            Completion::Break(Some(l)) if Some(l) == label => Some(Completion::Normal),
            abrupt => Some(abrupt),
        })
    }

    fn exec_loop(&mut self, frame: &mut Frame, stmt: &JsStatement, label: Option<NameId>) -> Eval<Completion> {
        match &stmt.kind {
            JsStatementKind::While { cond, body } => {
                while self.eval(frame, cond)?.truthy() {
                    if let Some(done) = self.loop_body(frame, body, label)? {
                        return Ok(done);
                    }
                }
            }
            JsStatementKind::DoWhile { body, cond } => loop {
                if let Some(done) = self.loop_body(frame, body, label)? {
                    return Ok(done);
                }
                if !self.eval(frame, cond)?.truthy() {
                    break;
                }
            },
            JsStatementKind::For { init, cond, incr, body } => {
                if let Some(init) = init {
                    self.exec(frame, init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(frame, cond)?.truthy() {
                            break;
                        }
                    }
                    if let Some(done) = self.loop_body(frame, body, label)? {
                        return Ok(done);
                    }
                    if let Some(incr) = incr {
                        self.eval(frame, incr)?;
                    }
                }
            }
            _ => return self.exec(frame, stmt),
        }
        Ok(Completion::Normal)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval_all(&mut self, frame: &mut Frame, exprs: &[JsExpression]) -> Eval<Vec<Value>> {
        exprs.iter().map(|e| self.eval(frame, e)).collect()
    }

    fn eval(&mut self, frame: &mut Frame, expr: &JsExpression) -> Eval<Value> {
        self.tick()?;
        let program = self.program;
        match &expr.kind {
            JsExpressionKind::NameRef { qualifier: None, name } => self.read_name(frame, *name),
            JsExpressionKind::NameRef {
                qualifier: Some(qualifier),
                name,
            } => {
                let target = self.eval(frame, qualifier)?;
                get_property(&target, program.name_text(*name))
            }
            JsExpressionKind::ArrayAccess { array, index } => {
                let target = self.eval(frame, array)?;
                let index = self.eval(frame, index)?;
                get_property(&target, &property_key(&index))
            }
            JsExpressionKind::Invocation { target, args } => self.invoke(frame, target, args),
            JsExpressionKind::New { ctor, args } => {
                let ctor = self.eval(frame, ctor)?;
                let args = self.eval_all(frame, args)?;
                let proto = match get_property(&ctor, "prototype")? {
                    Value::Object(proto) => Some(proto),
                    _ => None,
                };
                let instance = Value::new_object(proto);
                let result = self.call(&ctor, instance.clone(), args)?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => instance,
                })
            }
            JsExpressionKind::Binary { op, lhs, rhs } => self.binary(frame, *op, lhs, rhs),
            JsExpressionKind::Prefix { op, arg } => self.prefix(frame, *op, arg),
            JsExpressionKind::Postfix { op, arg } => self.update(frame, *op, arg, true),
            JsExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.eval(frame, cond)?.truthy() {
                    self.eval(frame, then_expr)
                } else {
                    self.eval(frame, else_expr)
                }
            }
            JsExpressionKind::Function(function) => Ok(Value::function(function)),
            JsExpressionKind::Number(n) => Ok(Value::Number(*n)),
            JsExpressionKind::String(s) => Ok(Value::string(s)),
            JsExpressionKind::Boolean(b) => Ok(Value::Bool(*b)),
            JsExpressionKind::Null => Ok(Value::Null),
            JsExpressionKind::This => Ok(frame.this.clone()),
            JsExpressionKind::ArrayLiteral(elements) => Ok(Value::array(self.eval_all(frame, elements)?)),
            JsExpressionKind::ObjectLiteral(props) => {
                let object = Value::new_object(None);
                for prop in props {
                    let key = match &prop.key.kind {
                        JsExpressionKind::NameRef { name, .. } => program.name_text(*name).to_string(),
                        _ => property_key(&self.eval(frame, &prop.key)?),
                    };
                    let value = self.eval(frame, &prop.value)?;
                    set_property(&object, &key, value)?;
                }
                Ok(object)
            }
        }
    }

    fn place(&mut self, frame: &mut Frame, expr: &JsExpression) -> Eval<Place> {
        let program = self.program;
        match &expr.kind {
            JsExpressionKind::NameRef { qualifier: None, name } => Ok(Place::Name(*name)),
            JsExpressionKind::NameRef {
                qualifier: Some(qualifier),
                name,
            } => {
                let target = self.eval(frame, qualifier)?;
                Ok(Place::Property(target, program.name_text(*name).to_string()))
            }
            JsExpressionKind::ArrayAccess { array, index } => {
                let target = self.eval(frame, array)?;
                let index = self.eval(frame, index)?;
                Ok(Place::Property(target, property_key(&index)))
            }
            _ => Err(type_error("invalid assignment target")),
        }
    }

    fn read_place(&self, frame: &Frame, place: &Place) -> Eval<Value> {
        match place {
            Place::Name(name) => self.read_name(frame, *name),
            Place::Property(target, key) => get_property(target, key),
        }
    }

    fn write_place(&mut self, frame: &mut Frame, place: &Place, value: Value) -> Eval<()> {
        match place {
            Place::Name(name) => {
                self.assign_name(frame, *name, value);
                Ok(())
            }
            Place::Property(target, key) => set_property(target, key, value),
        }
    }

    fn invoke(&mut self, frame: &mut Frame, target: &JsExpression, args: &[JsExpression]) -> Eval<Value> {
        let program = self.program;
        if let JsExpressionKind::NameRef {
            qualifier: Some(qualifier),
            name,
        } = &target.kind
        {
            let key = program.name_text(*name);
            let receiver = self.eval(frame, qualifier)?;
            if key == "call" && receiver.callable().is_some() {
                let mut args = self.eval_all(frame, args)?;
                let this = if args.is_empty() {
                    Value::Undefined
                } else {
                    args.remove(0)
                };
                return self.call(&receiver, this, args);
            }
            let function = get_property(&receiver, key)?;
            let args = self.eval_all(frame, args)?;
            return self.call(&function, receiver, args);
        }
        let function = self.eval(frame, target)?;
        let args = self.eval_all(frame, args)?;
        self.call(&function, Value::Undefined, args)
    }

    fn call(&mut self, function: &Value, this: Value, args: Vec<Value>) -> Eval<Value> {
        let Some(function) = function.callable() else {
            return Err(type_error(format!("{} is not a function", function.display())));
        };
        if let [JsStatement {
            kind: JsStatementKind::Verbatim(code),
            ..
        }] = function.body.as_slice()
        {
            return self.call_native(code, this, &args);
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::StackOverflow(MAX_CALL_DEPTH).into());
        }

        let mut frame = Frame::new(this);
        for (index, param) in function.params.iter().enumerate() {
            frame.locals.insert(*param, arg(&args, index));
        }
        self.depth += 1;
        let completion = self.exec_block(&mut frame, &function.body);
        self.depth -= 1;
        match completion? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn call_native(&mut self, code: &str, this: Value, args: &[Value]) -> Eval<Value> {
        let Some(native) = self.natives.get(code).cloned() else {
            return Err(EvalError::UnknownNative(code.to_string()).into());
        };
        match native {
            Native::Host(f) => Ok(f(args)?),
            Native::Method(f) => {
                let mut all = vec![this];
                all.extend_from_slice(args);
                Ok(f(&all)?)
            }
            Native::Print => {
                self.output.push(arg(args, 0).display());
                Ok(Value::Undefined)
            }
            Native::CanCast => {
                let map = match arg(args, 0) {
                    Value::Object(_) => get_property(&arg(args, 0), "castableTypeMap$")?,
                    _ => Value::Undefined,
                };
                let castable = match map {
                    Value::Object(_) => get_property(&map, &property_key(&arg(args, 1)))?.truthy(),
                    _ => false,
                };
                Ok(Value::Bool(castable))
            }
            Native::CanStore => {
                let query = get_property(&arg(args, 0), "queryId$")?;
                let query_id = match query {
                    Value::Undefined | Value::Null => return Ok(Value::Bool(true)),
                    q if q.to_number() < 0.0 => return Ok(Value::Bool(true)),
                    q => q,
                };
                let value = arg(args, 1);
                let map = match &value {
                    Value::Object(_) => get_property(&value, "castableTypeMap$")?,
                    _ => Value::Undefined,
                };
                let storable = match map {
                    Value::Object(_) => get_property(&map, &property_key(&query_id))?.truthy(),
                    _ => false,
                };
                Ok(Value::Bool(storable))
            }
            Native::ObjectEquals => {
                let (o, other) = (arg(args, 0), arg(args, 1));
                let equals = get_property(&o, rt::EQUALS_NAME)?;
                if equals.callable().is_some() {
                    let result = self.call(&equals, o, vec![other])?;
                    Ok(Value::Bool(result.truthy()))
                } else {
                    Ok(Value::Bool(strict_equals(&o, &other)))
                }
            }
            Native::ObjectHashCode => {
                let o = arg(args, 0);
                if let Value::Str(s) = &o {
                    return Ok(Value::Number(f64::from(java_hash(s))));
                }
                let hash = get_property(&o, rt::HASH_CODE_NAME)?;
                if hash.callable().is_some() {
                    return self.call(&hash, o, Vec::new());
                }
                let length = get_property(&o, "length")?;
                Ok(Value::Number(f64::from(length.to_int32())))
            }
            Native::ObjectToString => {
                let o = arg(args, 0);
                if let Value::Str(_) = o {
                    return Ok(o);
                }
                self.to_string_value(o)
            }
        }
    }

    /// `o.toString()`, falling back to the host text
    fn to_string_value(&mut self, value: Value) -> Eval<Value> {
        if let Value::Object(_) = &value {
            let to_string = get_property(&value, rt::TO_STRING_NAME)?;
            if to_string.callable().is_some() {
                return self.call(&to_string, value, Vec::new());
            }
        }
        Ok(Value::string(&value.display()))
    }

    fn to_primitive(&mut self, value: Value) -> Eval<Value> {
        match &value {
            Value::Object(object) if object.borrow().elements.is_none() && object.borrow().function.is_none() => {
                self.to_string_value(value)
            }
            Value::Object(_) => Ok(Value::string(&value.display())),
            _ => Ok(value),
        }
    }

    fn binary(&mut self, frame: &mut Frame, op: JsBinaryOp, lhs: &JsExpression, rhs: &JsExpression) -> Eval<Value> {
        match op {
            JsBinaryOp::Comma => {
                self.eval(frame, lhs)?;
                self.eval(frame, rhs)
            }
            JsBinaryOp::And => {
                let left = self.eval(frame, lhs)?;
                if left.truthy() {
                    self.eval(frame, rhs)
                } else {
                    Ok(left)
                }
            }
            JsBinaryOp::Or => {
                let left = self.eval(frame, lhs)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    self.eval(frame, rhs)
                }
            }
            JsBinaryOp::Assign => {
                let place = self.place(frame, lhs)?;
                let value = self.eval(frame, rhs)?;
                self.write_place(frame, &place, value.clone())?;
                Ok(value)
            }
            op if op.is_assignment() => {
                let place = self.place(frame, lhs)?;
                let old = self.read_place(frame, &place)?;
                let value = self.eval(frame, rhs)?;
                let result = self.arithmetic(compound_base(op), old, value)?;
                self.write_place(frame, &place, result.clone())?;
                Ok(result)
            }
            op => {
                let left = self.eval(frame, lhs)?;
                let right = self.eval(frame, rhs)?;
                self.arithmetic(op, left, right)
            }
        }
    }

    fn arithmetic(&mut self, op: JsBinaryOp, left: Value, right: Value) -> Eval<Value> {
        let number = |n: f64| Ok(Value::Number(n));
        match op {
            JsBinaryOp::Add => {
                let left = self.to_primitive(left)?;
                let right = self.to_primitive(right)?;
                if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                    return Ok(Value::string(&format!("{}{}", left.display(), right.display())));
                }
                number(left.to_number() + right.to_number())
            }
            JsBinaryOp::Sub => number(left.to_number() - right.to_number()),
            JsBinaryOp::Mul => number(left.to_number() * right.to_number()),
            JsBinaryOp::Div => number(left.to_number() / right.to_number()),
            JsBinaryOp::Mod => number(left.to_number() % right.to_number()),
            JsBinaryOp::Shl => number(f64::from(left.to_int32().wrapping_shl(right.to_int32() as u32 & 31))),
            JsBinaryOp::Shr => number(f64::from(left.to_int32() >> (right.to_int32() as u32 & 31))),
            JsBinaryOp::Shru => number(f64::from((left.to_int32() as u32) >> (right.to_int32() as u32 & 31))),
            JsBinaryOp::BitAnd => number(f64::from(left.to_int32() & right.to_int32())),
            JsBinaryOp::BitOr => number(f64::from(left.to_int32() | right.to_int32())),
            JsBinaryOp::BitXor => number(f64::from(left.to_int32() ^ right.to_int32())),
            JsBinaryOp::Lt | JsBinaryOp::Le | JsBinaryOp::Gt | JsBinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Value::Str(a), Value::Str(b)) => Some(utf16(a).cmp(&utf16(b))),
                    _ => left.to_number().partial_cmp(&right.to_number()),
                };
                let result = ordering.is_some_and(|o| match op {
                    JsBinaryOp::Lt => o.is_lt(),
                    JsBinaryOp::Le => o.is_le(),
                    JsBinaryOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                });
                Ok(Value::Bool(result))
            }
            JsBinaryOp::Eq => Ok(Value::Bool(loose_equals(&left, &right))),
            JsBinaryOp::Neq => Ok(Value::Bool(!loose_equals(&left, &right))),
            JsBinaryOp::StrictEq => Ok(Value::Bool(strict_equals(&left, &right))),
            JsBinaryOp::StrictNeq => Ok(Value::Bool(!strict_equals(&left, &right))),
            other => Err(type_error(format!("operator {} has no arithmetic form", other.symbol()))),
        }
    }

    fn prefix(&mut self, frame: &mut Frame, op: JsUnaryOp, arg: &JsExpression) -> Eval<Value> {
        match op {
            JsUnaryOp::Inc | JsUnaryOp::Dec => self.update(frame, op, arg, false),
            JsUnaryOp::Delete => {
                if let Place::Property(Value::Object(object), key) = self.place(frame, arg)? {
                    object.borrow_mut().props.shift_remove(&key);
                }
                Ok(Value::Bool(true))
            }
            JsUnaryOp::Neg => Ok(Value::Number(-self.eval(frame, arg)?.to_number())),
            JsUnaryOp::Pos => Ok(Value::Number(self.eval(frame, arg)?.to_number())),
            JsUnaryOp::Not => Ok(Value::Bool(!self.eval(frame, arg)?.truthy())),
            JsUnaryOp::BitNot => Ok(Value::Number(f64::from(!self.eval(frame, arg)?.to_int32()))),
            JsUnaryOp::TypeOf => Ok(Value::string(self.eval(frame, arg)?.type_of())),
            JsUnaryOp::Void => {
                self.eval(frame, arg)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn update(&mut self, frame: &mut Frame, op: JsUnaryOp, arg: &JsExpression, postfix: bool) -> Eval<Value> {
        let place = self.place(frame, arg)?;
        let old = self.read_place(frame, &place)?.to_number();
        let new = match op {
            JsUnaryOp::Inc => old + 1.0,
            JsUnaryOp::Dec => old - 1.0,
            other => return Err(type_error(format!("{} is not an update operator", other.symbol()))),
        };
        self.write_place(frame, &place, Value::Number(new))?;
        Ok(Value::Number(if postfix { old } else { new }))
    }
}

fn compound_base(op: JsBinaryOp) -> JsBinaryOp {
    match op {
        JsBinaryOp::AsgAdd => JsBinaryOp::Add,
        JsBinaryOp::AsgSub => JsBinaryOp::Sub,
        JsBinaryOp::AsgMul => JsBinaryOp::Mul,
        JsBinaryOp::AsgDiv => JsBinaryOp::Div,
        JsBinaryOp::AsgMod => JsBinaryOp::Mod,
        JsBinaryOp::AsgShl => JsBinaryOp::Shl,
        JsBinaryOp::AsgShr => JsBinaryOp::Shr,
        JsBinaryOp::AsgShru => JsBinaryOp::Shru,
        JsBinaryOp::AsgBitAnd => JsBinaryOp::BitAnd,
        JsBinaryOp::AsgBitXor => JsBinaryOp::BitXor,
        JsBinaryOp::AsgBitOr => JsBinaryOp::BitOr,
        other => other,
    }
}

fn describe_thrown(value: &Value) -> String {
    match get_property(value, "message") {
        Ok(Value::Str(message)) => format!("{} ({})", value.display(), message),
        _ => value.display(),
    }
}

/// Run `program` and return what it printed
pub fn run_program(program: &JsProgram) -> Result<Vec<String>, EvalError> {
    let mut evaluator = Evaluator::new(program);
    evaluator.run()?;
    Ok(evaluator.output)
}
