//! The support library every compiled program links against
//!
//! [`install`] builds the core `java.lang` types and the helper classes the
//! lowering passes call into. Helpers with Java bodies are ordinary program
//! code and go through the whole pipeline. Native helpers carry verbatim
//! JavaScript that references only its own parameters and JS built-ins.
//!
//! Every member a pass needs is registered in the program's index under a
//! fixed key such as `"Cast.dynamicCast"` or `"LongLib.add"`.
//!
//! A `long` value is represented at runtime as a two-element array
//! `[low 32 bits unsigned, high 32 bits signed]`.

use crate::jast::declarations::{FieldId, MethodFlags, MethodId, VarId};
use crate::jast::expression::{BinaryOp, JExpression};
use crate::jast::program::JProgram;
use crate::jast::statement::JStatement;
use crate::jast::types::{JType, TypeId};
use crate::source_info::SourceInfo;

pub const RUNTIME_FILE: &str = "jjs/Runtime.java";

/// Method names shared with every overrider and with JavaScript itself
pub const EQUALS_NAME: &str = "equals$";
pub const HASH_CODE_NAME: &str = "hashCode$";
pub const TO_STRING_NAME: &str = "toString";

// ----------------------------------------------------------------------
// Native bodies
// ----------------------------------------------------------------------

pub const OBJECT_EQUALS_HELPER: &str = "return o.equals$ ? o.equals$(other) : o === other;";
pub const OBJECT_HASH_CODE_HELPER: &str = "if (typeof o == 'string') { var h = 0; for (var i = 0; i < o.length; ++i) { h = (h << 5) - h + o.charCodeAt(i) | 0; } return h; } if (o.hashCode$) { return o.hashCode$(); } return o.length | 0;";
pub const OBJECT_TO_STRING_HELPER: &str = "return typeof o == 'string' ? o : o.toString();";

pub const STRING_LENGTH: &str = "return s.length;";
pub const STRING_CHAR_AT: &str = "return s.charCodeAt(index);";
pub const STRING_EQUALS: &str = "return s === other;";
pub const STRING_HASH_CODE: &str = "var h = 0; for (var i = 0; i < s.length; ++i) { h = (h << 5) - h + s.charCodeAt(i) | 0; } return h;";
pub const STRING_TO_STRING: &str = "return s;";
pub const STRING_SUBSTRING: &str = "return s.substring(begin, end);";
pub const STRING_INDEX_OF: &str = "return s.indexOf(str);";
pub const STRING_IS_EMPTY: &str = "return s.length == 0;";

pub const CAST_CAN_CAST: &str = "return !!(src.castableTypeMap$ && src.castableTypeMap$[queryId]);";
pub const CAST_IS_STRING: &str = "return typeof src == 'string';";
pub const CAST_IS_ARRAY: &str = "return Array.isArray(src);";
pub const CAST_NARROW_BYTE: &str = "return x << 24 >> 24;";
pub const CAST_NARROW_SHORT: &str = "return x << 16 >> 16;";
pub const CAST_NARROW_CHAR: &str = "return x & 65535;";
pub const CAST_NARROW_INT: &str = "return ~~x;";
pub const CAST_ROUND_INT: &str = "return ~~Math.max(Math.min(x, 2147483647), -2147483648);";
pub const CAST_CHAR_TO_STRING: &str = "return String.fromCharCode(x);";

pub const ARRAY_INIT_DIM: &str = "var a = new Array(length); for (var i = 0; i < length; ++i) { a[i] = seed == 1 ? 0 : seed == 2 ? false : seed == 3 ? [0, 0] : null; } a.queryId$ = queryId; return a;";
pub const ARRAY_INIT_DIMS: &str = "function make(d) { var n = dims[d], a = new Array(n); for (var i = 0; i < n; ++i) { a[i] = d + 1 < dims.length ? make(d + 1) : seed == 1 ? 0 : seed == 2 ? false : seed == 3 ? [0, 0] : null; } if (d + 1 == dims.length) { a.queryId$ = queryId; } return a; } return make(0);";
pub const ARRAY_INIT_VALUES: &str = "var a = values.slice(); a.queryId$ = queryId; return a;";
pub const ARRAY_CAN_STORE: &str = "var q = array.queryId$; return q == null || q < 0 || !!(value.castableTypeMap$ && value.castableTypeMap$[q]);";
pub const ARRAY_SET_UNCHECKED: &str = "return array[index] = value;";

macro_rules! long_binary {
    ($name:ident, $expr:literal) => {
        pub const $name: &str = concat!(
            "var x = (BigInt(a[1]) << 32n) + BigInt(a[0]), y = (BigInt(b[1]) << 32n) + BigInt(b[0]); ",
            "var r = BigInt.asIntN(64, ",
            $expr,
            "); return [Number(BigInt.asUintN(32, r)), Number(BigInt.asIntN(32, r >> 32n))];"
        );
    };
}

macro_rules! long_compare {
    ($name:ident, $op:literal) => {
        pub const $name: &str = concat!(
            "var x = (BigInt(a[1]) << 32n) + BigInt(a[0]), y = (BigInt(b[1]) << 32n) + BigInt(b[0]); ",
            "return x ",
            $op,
            " y;"
        );
    };
}

macro_rules! long_shift {
    ($name:ident, $expr:literal) => {
        pub const $name: &str = concat!(
            "var x = (BigInt(a[1]) << 32n) + BigInt(a[0]), n = BigInt(b & 63); ",
            "var r = BigInt.asIntN(64, ",
            $expr,
            "); return [Number(BigInt.asUintN(32, r)), Number(BigInt.asIntN(32, r >> 32n))];"
        );
    };
}

long_binary!(LONG_ADD, "x + y");
long_binary!(LONG_SUB, "x - y");
long_binary!(LONG_MUL, "x * y");
long_binary!(LONG_DIV, "x / y");
long_binary!(LONG_MOD, "x % y");
long_binary!(LONG_AND, "x & y");
long_binary!(LONG_OR, "x | y");
long_binary!(LONG_XOR, "x ^ y");
long_shift!(LONG_SHL, "x << n");
long_shift!(LONG_SHR, "x >> n");
long_shift!(LONG_SHRU, "BigInt.asUintN(64, x) >> n");
long_compare!(LONG_EQ, "==");
long_compare!(LONG_NEQ, "!=");
long_compare!(LONG_LT, "<");
long_compare!(LONG_LTE, "<=");
long_compare!(LONG_GT, ">");
long_compare!(LONG_GTE, ">=");

pub const LONG_NEG: &str = "var r = BigInt.asIntN(64, -((BigInt(a[1]) << 32n) + BigInt(a[0]))); return [Number(BigInt.asUintN(32, r)), Number(BigInt.asIntN(32, r >> 32n))];";
pub const LONG_NOT: &str = "var r = BigInt.asIntN(64, ~((BigInt(a[1]) << 32n) + BigInt(a[0]))); return [Number(BigInt.asUintN(32, r)), Number(BigInt.asIntN(32, r >> 32n))];";
pub const LONG_FROM_INT: &str = "return [a >>> 0, a < 0 ? -1 : 0];";
pub const LONG_FROM_DOUBLE: &str = "if (a !== a) { return [0, 0]; } var r = BigInt.asIntN(64, BigInt(Math.trunc(Math.max(Math.min(a, 9223372036854775000), -9223372036854775808)))); return [Number(BigInt.asUintN(32, r)), Number(BigInt.asIntN(32, r >> 32n))];";
pub const LONG_TO_INT: &str = "return a[0] | 0;";
pub const LONG_TO_DOUBLE: &str = "return a[1] * 4294967296 + a[0];";
pub const LONG_TO_STRING: &str = "return ((BigInt(a[1]) << 32n) + BigInt(a[0])).toString();";

/// Element seed passed to the array helpers
pub const SEED_NULL: i32 = 0;
pub const SEED_NUMBER: i32 = 1;
pub const SEED_BOOLEAN: i32 = 2;
pub const SEED_LONG: i32 = 3;

/// Seed for arrays whose leaf element type is `leaf`
pub fn seed_for(leaf: &JType) -> i32 {
    match leaf {
        _ if *leaf == JType::BOOLEAN => SEED_BOOLEAN,
        _ if *leaf == JType::LONG => SEED_LONG,
        JType::Primitive(_) => SEED_NUMBER,
        _ => SEED_NULL,
    }
}

// ----------------------------------------------------------------------
// Installation
// ----------------------------------------------------------------------

struct RuntimeBuilder<'p> {
    program: &'p mut JProgram,
    info: SourceInfo,
}

impl RuntimeBuilder<'_> {
    fn at(&self) -> SourceInfo {
        self.info.clone()
    }

    fn class(&mut self, key: &str, name: &str, super_class: Option<TypeId>, is_final: bool) -> TypeId {
        let info = self.at();
        let id = self.program.create_class(info, name, super_class, false, is_final);
        self.program.register_indexed_type(key, id);
        id
    }

    fn method(
        &mut self,
        key: &str,
        ty: TypeId,
        name: &str,
        return_type: JType,
        params: &[(&str, JType)],
        flags: MethodFlags,
    ) -> (MethodId, Vec<VarId>) {
        let info = self.at();
        let method = self.program.create_method(info, ty, name, return_type, flags);
        let vars = params
            .iter()
            .map(|(param, param_ty)| {
                let info = self.at();
                self.program.create_param(info, method, param, param_ty.clone(), false)
            })
            .collect();
        self.program.register_indexed_method(key, method);
        (method, vars)
    }

    fn native(
        &mut self,
        key: &str,
        ty: TypeId,
        name: &str,
        return_type: JType,
        params: &[(&str, JType)],
        code: &str,
    ) -> MethodId {
        let (method, _) = self.method(key, ty, name, return_type, params, MethodFlags::static_method());
        self.program.set_native_body(method, code);
        method
    }

    fn field(&mut self, key: &str, ty: TypeId, name: &str, field_ty: JType, is_static: bool) -> FieldId {
        let info = self.at();
        let field = self.program.create_field(info, ty, name, field_ty, is_static, false);
        self.program.register_indexed_field(key, field);
        field
    }

    fn var(&self, var: VarId) -> JExpression {
        JExpression::var_ref(self.at(), var)
    }

    fn int(&self, value: i32) -> JExpression {
        JExpression::int_lit(self.at(), value)
    }

    fn null(&self) -> JExpression {
        JExpression::null_lit(self.at())
    }

    fn ret(&self, value: JExpression) -> JStatement {
        JStatement::return_stmt(self.at(), Some(value))
    }

    fn call(&self, target: MethodId, args: Vec<JExpression>) -> JExpression {
        JExpression::static_call(self.at(), target, args)
    }

    fn bin(&self, op: BinaryOp, lhs: JExpression, rhs: JExpression, ty: JType) -> JExpression {
        JExpression::binary(self.at(), op, lhs, rhs, ty)
    }

    /// `super(args)` as the first statement of a constructor
    fn super_ctor(&self, class: TypeId, ctor: MethodId, args: Vec<JExpression>) -> JStatement {
        JStatement::expr(JExpression::super_call(self.at(), JExpression::this(self.at(), class), ctor, args))
    }
}

/// Build the support library into `program`
pub fn install(program: &mut JProgram) {
    let info = program.info(RUNTIME_FILE, 1, 0, 0);
    let mut rt = RuntimeBuilder { program, info };

    let object = rt.class("Object", "java.lang.Object", None, false);
    let object_ty = JType::Declared(object);
    let string = rt.class("String", "java.lang.String", Some(object), true);
    let string_ty = JType::Declared(string);
    rt.class("Class", "java.lang.Class", Some(object), true);

    let object_ctor = install_object(&mut rt, object, string);
    install_string(&mut rt, string, &object_ty);
    install_enum(&mut rt, object, object_ctor, &string_ty);

    // Throwables
    let throwable = rt.class("Throwable", "java.lang.Throwable", Some(object), false);
    let message = rt.field("Throwable.message", throwable, "message", string_ty.clone(), false);
    let (throwable_ctor, vars) = rt.method(
        "Throwable.<init>",
        throwable,
        "Throwable",
        JType::VOID,
        &[("message", string_ty.clone())],
        MethodFlags::constructor(),
    );
    let body = vec![
        rt.super_ctor(throwable, object_ctor, vec![]),
        JStatement::expr(JExpression::assign(
            rt.at(),
            JExpression::field_ref(rt.at(), Some(JExpression::this(rt.at(), throwable)), message),
            rt.var(vars[0]),
            string_ty.clone(),
        )),
    ];
    rt.program.set_body(throwable_ctor, body);
    let (get_message, _) = rt.method(
        "Throwable.getMessage",
        throwable,
        "getMessage",
        string_ty.clone(),
        &[],
        MethodFlags::instance(),
    );
    let body = vec![rt.ret(JExpression::field_ref(
        rt.at(),
        Some(JExpression::this(rt.at(), throwable)),
        message,
    ))];
    rt.program.set_body(get_message, body);

    let simple_exception = |rt: &mut RuntimeBuilder<'_>, key: &str, name: &str| -> (TypeId, MethodId) {
        let class = rt.class(key, name, Some(throwable), false);
        let (ctor, _) = rt.method(
            &format!("{}.<init>", key),
            class,
            key,
            JType::VOID,
            &[],
            MethodFlags::constructor(),
        );
        let body = vec![rt.super_ctor(class, throwable_ctor, vec![rt.null()])];
        rt.program.set_body(ctor, body);
        (class, ctor)
    };
    let class_cast = simple_exception(&mut rt, "ClassCastException", "java.lang.ClassCastException");
    let array_store = simple_exception(&mut rt, "ArrayStoreException", "java.lang.ArrayStoreException");

    let assertion_error = rt.class("AssertionError", "java.lang.AssertionError", Some(throwable), false);
    let (assertion_ctor, vars) = rt.method(
        "AssertionError.<init>",
        assertion_error,
        "AssertionError",
        JType::VOID,
        &[("message", string_ty.clone())],
        MethodFlags::constructor(),
    );
    let body = vec![rt.super_ctor(assertion_error, throwable_ctor, vec![rt.var(vars[0])])];
    rt.program.set_body(assertion_ctor, body);

    let js_exception = rt.class(
        "JavaScriptException",
        "jjs.lang.JavaScriptException",
        Some(throwable),
        false,
    );
    let exception_field = rt.field(
        "JavaScriptException.exception",
        js_exception,
        "exception",
        object_ty.clone(),
        false,
    );
    let (js_exception_ctor, vars) = rt.method(
        "JavaScriptException.<init>",
        js_exception,
        "JavaScriptException",
        JType::VOID,
        &[("exception", object_ty.clone())],
        MethodFlags::constructor(),
    );
    let body = vec![
        rt.super_ctor(js_exception, throwable_ctor, vec![rt.null()]),
        JStatement::expr(JExpression::assign(
            rt.at(),
            JExpression::field_ref(rt.at(), Some(JExpression::this(rt.at(), js_exception)), exception_field),
            rt.var(vars[0]),
            object_ty.clone(),
        )),
    ];
    rt.program.set_body(js_exception_ctor, body);

    install_cast(&mut rt, object, &object_ty, &string_ty, class_cast);
    install_long_lib(&mut rt, object, &string_ty);
    install_array(&mut rt, object, &object_ty, array_store);

    // Exceptions
    let exceptions = rt.class("Exceptions", "jjs.lang.Exceptions", Some(object), true);
    let (caught, vars) = rt.method(
        "Exceptions.caught",
        exceptions,
        "caught",
        object_ty.clone(),
        &[("e", object_ty.clone())],
        MethodFlags::static_method(),
    );
    let body = vec![
        JStatement::if_stmt(
            rt.at(),
            JExpression::instance_of(rt.at(), JType::Declared(throwable), rt.var(vars[0])),
            rt.ret(rt.var(vars[0])),
            None,
        ),
        rt.ret(JExpression::new_instance(
            rt.at(),
            js_exception,
            js_exception_ctor,
            vec![rt.var(vars[0])],
        )),
    ];
    rt.program.set_body(caught, body);
    let (throw_assertion, vars) = rt.method(
        "Exceptions.throwAssertionError",
        exceptions,
        "throwAssertionError",
        JType::VOID,
        &[("message", string_ty.clone())],
        MethodFlags::static_method(),
    );
    let body = vec![JStatement::throw_stmt(
        rt.at(),
        JExpression::new_instance(rt.at(), assertion_error, assertion_ctor, vec![rt.var(vars[0])]),
    )];
    rt.program.set_body(throw_assertion, body);

    // Placeholders for members proven to be accessed on null
    let null_class = rt.class("Null", "jjs.lang.Null", Some(object), true);
    let (null_method, _) = rt.method(
        "Null.nullMethod",
        null_class,
        "nullMethod",
        JType::Null,
        &[],
        MethodFlags::static_method(),
    );
    let null_field = rt.field("Null.nullField", null_class, "nullField", JType::Null, true);
    rt.program.null_method = Some(null_method);
    rt.program.null_field = Some(null_field);

    // Deferred binding entry point, replaced per permutation
    let gwt = rt.class("GWT", "jjs.core.GWT", Some(object), true);
    let class_ty = rt.program.class_literal_type();
    let (create, _) = rt.method(
        "GWT.create",
        gwt,
        "create",
        object_ty,
        &[("type", class_ty)],
        MethodFlags::static_method(),
    );
    let body = vec![rt.ret(rt.null())];
    rt.program.set_body(create, body);
}

/// `java.lang.Enum`: the name and ordinal fields, their accessors and the
/// constructor every enum constructor chains to
fn install_enum(rt: &mut RuntimeBuilder<'_>, object: TypeId, object_ctor: MethodId, string_ty: &JType) {
    let info = rt.at();
    let base = rt.program.create_class(info, "java.lang.Enum", Some(object), true, false);
    rt.program.register_indexed_type("Enum", base);
    let name = rt.field("Enum.name", base, "name", string_ty.clone(), false);
    let ordinal = rt.field("Enum.ordinal", base, "ordinal", JType::INT, false);
    let this_name = JExpression::field_ref(rt.at(), Some(JExpression::this(rt.at(), base)), name);
    let this_ordinal = JExpression::field_ref(rt.at(), Some(JExpression::this(rt.at(), base)), ordinal);

    let (ctor, vars) = rt.method(
        "Enum.<init>",
        base,
        "Enum",
        JType::VOID,
        &[("name", string_ty.clone()), ("ordinal", JType::INT)],
        MethodFlags::constructor(),
    );
    let body = vec![
        rt.super_ctor(base, object_ctor, vec![]),
        JStatement::expr(JExpression::assign(rt.at(), this_name.clone(), rt.var(vars[0]), string_ty.clone())),
        JStatement::expr(JExpression::assign(rt.at(), this_ordinal.clone(), rt.var(vars[1]), JType::INT)),
    ];
    rt.program.set_body(ctor, body);

    let (accessor, _) = rt.method(
        "Enum.name",
        base,
        "name",
        string_ty.clone(),
        &[],
        MethodFlags::instance().final_(),
    );
    let body = vec![rt.ret(this_name)];
    rt.program.set_body(accessor, body);

    let (accessor, _) = rt.method(
        "Enum.ordinal",
        base,
        "ordinal",
        JType::INT,
        &[],
        MethodFlags::instance().final_(),
    );
    let body = vec![rt.ret(this_ordinal)];
    rt.program.set_body(accessor, body);
}

/// Returns the `Object` constructor
fn install_object(rt: &mut RuntimeBuilder<'_>, object: TypeId, string: TypeId) -> MethodId {
    let object_ty = JType::Declared(object);
    let string_ty = JType::Declared(string);

    let (ctor, _) = rt.method(
        "Object.<init>",
        object,
        "Object",
        JType::VOID,
        &[],
        MethodFlags::constructor(),
    );
    rt.program.set_body(ctor, vec![]);

    let hash = rt.field("Object.$hash", object, "$hash", JType::INT, false);
    let next_hash = rt.field("Object.$nextHash", object, "$nextHash", JType::INT, true);

    let (equals, vars) = rt.method(
        "Object.equals",
        object,
        "equals",
        JType::BOOLEAN,
        &[("other", object_ty.clone())],
        MethodFlags::instance(),
    );
    let body = vec![rt.ret(rt.bin(
        BinaryOp::Eq,
        JExpression::this(rt.at(), object),
        rt.var(vars[0]),
        JType::BOOLEAN,
    ))];
    rt.program.set_body(equals, body);

    let (hash_code, _) = rt.method(
        "Object.hashCode",
        object,
        "hashCode",
        JType::INT,
        &[],
        MethodFlags::instance(),
    );
    let this_hash = || JExpression::field_ref(rt.at(), Some(JExpression::this(rt.at(), object)), hash);
    let next = || JExpression::field_ref(rt.at(), None, next_hash);
    let bump = JStatement::block(
        rt.at(),
        vec![
            JStatement::expr(JExpression::assign(
                rt.at(),
                next(),
                rt.bin(BinaryOp::Add, next(), rt.int(1), JType::INT),
                JType::INT,
            )),
            JStatement::expr(JExpression::assign(rt.at(), this_hash(), next(), JType::INT)),
        ],
    );
    let body = vec![
        JStatement::if_stmt(
            rt.at(),
            rt.bin(BinaryOp::Eq, this_hash(), rt.int(0), JType::BOOLEAN),
            bump,
            None,
        ),
        rt.ret(this_hash()),
    ];
    rt.program.set_body(hash_code, body);

    let (to_string, _) = rt.method(
        "Object.toString",
        object,
        "toString",
        string_ty.clone(),
        &[],
        MethodFlags::instance(),
    );
    let body = vec![rt.ret(rt.bin(
        BinaryOp::Add,
        JExpression::string_lit(rt.at(), "Object@"),
        JExpression::call(rt.at(), Some(JExpression::this(rt.at(), object)), hash_code, vec![]),
        string_ty.clone(),
    ))];
    rt.program.set_body(to_string, body);

    // Dispatch helpers for receivers that may be strings or arrays
    let equals_helper = rt.native(
        "Object.$equals",
        object,
        "$equals",
        JType::BOOLEAN,
        &[("o", object_ty.clone()), ("other", object_ty.clone())],
        OBJECT_EQUALS_HELPER,
    );
    let hash_helper = rt.native(
        "Object.$hashCode",
        object,
        "$hashCode",
        JType::INT,
        &[("o", object_ty.clone())],
        OBJECT_HASH_CODE_HELPER,
    );
    let to_string_helper = rt.native(
        "Object.$toString",
        object,
        "$toString",
        string_ty,
        &[("o", object_ty)],
        OBJECT_TO_STRING_HELPER,
    );
    rt.program.devirtualized.insert(equals, equals_helper);
    rt.program.devirtualized.insert(hash_code, hash_helper);
    rt.program.devirtualized.insert(to_string, to_string_helper);
    ctor
}

fn install_string(rt: &mut RuntimeBuilder<'_>, string: TypeId, object_ty: &JType) {
    let string_ty = JType::Declared(string);
    let methods: [(&str, JType, Vec<(&str, JType)>, &str); 8] = [
        ("length", JType::INT, vec![], STRING_LENGTH),
        ("charAt", JType::CHAR, vec![("index", JType::INT)], STRING_CHAR_AT),
        ("equals", JType::BOOLEAN, vec![("other", object_ty.clone())], STRING_EQUALS),
        ("hashCode", JType::INT, vec![], STRING_HASH_CODE),
        ("toString", string_ty.clone(), vec![], STRING_TO_STRING),
        (
            "substring",
            string_ty.clone(),
            vec![("begin", JType::INT), ("end", JType::INT)],
            STRING_SUBSTRING,
        ),
        ("indexOf", JType::INT, vec![("str", string_ty.clone())], STRING_INDEX_OF),
        ("isEmpty", JType::BOOLEAN, vec![], STRING_IS_EMPTY),
    ];
    for (name, return_type, params, code) in methods {
        let (instance, _) = rt.method(
            &format!("String.{}", name),
            string,
            name,
            return_type.clone(),
            &params,
            MethodFlags::instance().final_(),
        );
        rt.program
            .set_native_body(instance, format!("var s = String(this); {}", code));

        let mut helper_params = vec![("s", string_ty.clone())];
        helper_params.extend(params.iter().cloned());
        let helper = rt.native(
            &format!("String.${}", name),
            string,
            &format!("${}", name),
            return_type,
            &helper_params,
            code,
        );
        rt.program.devirtualized.insert(instance, helper);
    }
}

fn install_cast(
    rt: &mut RuntimeBuilder<'_>,
    object: TypeId,
    object_ty: &JType,
    string_ty: &JType,
    (class_cast, class_cast_ctor): (TypeId, MethodId),
) {
    let cast = rt.class("Cast", "jjs.lang.Cast", Some(object), true);
    let src = ("src", object_ty.clone());
    let query = ("queryId", JType::INT);

    let can_cast = rt.native(
        "Cast.canCast",
        cast,
        "canCast",
        JType::BOOLEAN,
        &[src.clone(), query.clone()],
        CAST_CAN_CAST,
    );
    let is_string = rt.native("Cast.isString", cast, "isString", JType::BOOLEAN, &[src.clone()], CAST_IS_STRING);
    let is_array = rt.native("Cast.isArray", cast, "isArray", JType::BOOLEAN, &[src.clone()], CAST_IS_ARRAY);

    // src != null && check(src)
    let guarded = |rt: &RuntimeBuilder<'_>, var: VarId, check: JExpression| {
        rt.bin(
            BinaryOp::And,
            rt.bin(BinaryOp::Neq, rt.var(var), rt.null(), JType::BOOLEAN),
            check,
            JType::BOOLEAN,
        )
    };

    let (instance_of, vars) = rt.method(
        "Cast.instanceOf",
        cast,
        "instanceOf",
        JType::BOOLEAN,
        &[src.clone(), query.clone()],
        MethodFlags::static_method(),
    );
    let check = rt.call(can_cast, vec![rt.var(vars[0]), rt.var(vars[1])]);
    let body = vec![rt.ret(guarded(&*rt, vars[0], check))];
    rt.program.set_body(instance_of, body);

    // if (src != null && !check(src)) throw new ClassCastException(); return src;
    let dynamic_cast = |rt: &mut RuntimeBuilder<'_>,
                        key: &str,
                        name: &str,
                        params: &[(&str, JType)],
                        check: &dyn Fn(&RuntimeBuilder<'_>, &[VarId]) -> JExpression| {
        let (method, vars) = rt.method(key, cast, name, object_ty.clone(), params, MethodFlags::static_method());
        let failed = JExpression::not(rt.at(), check(&*rt, &vars));
        let body = vec![
            JStatement::if_stmt(
                rt.at(),
                guarded(&*rt, vars[0], failed),
                JStatement::throw_stmt(
                    rt.at(),
                    JExpression::new_instance(rt.at(), class_cast, class_cast_ctor, vec![]),
                ),
                None,
            ),
            rt.ret(rt.var(vars[0])),
        ];
        rt.program.set_body(method, body);
    };
    dynamic_cast(
        rt,
        "Cast.dynamicCast",
        "dynamicCast",
        &[src.clone(), query],
        &|rt, vars| rt.call(can_cast, vec![rt.var(vars[0]), rt.var(vars[1])]),
    );
    dynamic_cast(
        rt,
        "Cast.dynamicCastString",
        "dynamicCastString",
        &[src.clone()],
        &|rt, vars| rt.call(is_string, vec![rt.var(vars[0])]),
    );
    dynamic_cast(
        rt,
        "Cast.dynamicCastArray",
        "dynamicCastArray",
        &[src],
        &|rt, vars| rt.call(is_array, vec![rt.var(vars[0])]),
    );

    let narrowing: [(&str, JType, JType, &str); 6] = [
        ("narrow_byte", JType::BYTE, JType::INT, CAST_NARROW_BYTE),
        ("narrow_short", JType::SHORT, JType::INT, CAST_NARROW_SHORT),
        ("narrow_char", JType::CHAR, JType::INT, CAST_NARROW_CHAR),
        ("narrow_int", JType::INT, JType::DOUBLE, CAST_NARROW_INT),
        ("round_int", JType::INT, JType::DOUBLE, CAST_ROUND_INT),
        ("charToString", string_ty.clone(), JType::CHAR, CAST_CHAR_TO_STRING),
    ];
    for (name, ret, param, code) in narrowing {
        rt.native(&format!("Cast.{}", name), cast, name, ret, &[("x", param)], code);
    }
}

fn install_long_lib(rt: &mut RuntimeBuilder<'_>, object: TypeId, string_ty: &JType) {
    let long_lib = rt.class("LongLib", "jjs.lang.LongLib", Some(object), true);
    let a = ("a", JType::LONG);
    let b = ("b", JType::LONG);
    let shift = ("b", JType::INT);

    let binary = [
        ("add", LONG_ADD),
        ("sub", LONG_SUB),
        ("mul", LONG_MUL),
        ("div", LONG_DIV),
        ("mod", LONG_MOD),
        ("and", LONG_AND),
        ("or", LONG_OR),
        ("xor", LONG_XOR),
    ];
    for (name, code) in binary {
        rt.native(&format!("LongLib.{}", name), long_lib, name, JType::LONG, &[a.clone(), b.clone()], code);
    }
    for (name, code) in [("shl", LONG_SHL), ("shr", LONG_SHR), ("shru", LONG_SHRU)] {
        rt.native(
            &format!("LongLib.{}", name),
            long_lib,
            name,
            JType::LONG,
            &[a.clone(), shift.clone()],
            code,
        );
    }
    let compare = [
        ("eq", LONG_EQ),
        ("neq", LONG_NEQ),
        ("lt", LONG_LT),
        ("lte", LONG_LTE),
        ("gt", LONG_GT),
        ("gte", LONG_GTE),
    ];
    for (name, code) in compare {
        rt.native(
            &format!("LongLib.{}", name),
            long_lib,
            name,
            JType::BOOLEAN,
            &[a.clone(), b.clone()],
            code,
        );
    }
    let unary: [(&str, JType, JType, &str); 7] = [
        ("neg", JType::LONG, JType::LONG, LONG_NEG),
        ("not", JType::LONG, JType::LONG, LONG_NOT),
        ("fromInt", JType::LONG, JType::INT, LONG_FROM_INT),
        ("fromDouble", JType::LONG, JType::DOUBLE, LONG_FROM_DOUBLE),
        ("toInt", JType::INT, JType::LONG, LONG_TO_INT),
        ("toDouble", JType::DOUBLE, JType::LONG, LONG_TO_DOUBLE),
        ("toString", string_ty.clone(), JType::LONG, LONG_TO_STRING),
    ];
    for (name, ret, param, code) in unary {
        rt.native(&format!("LongLib.{}", name), long_lib, name, ret, &[("a", param)], code);
    }
}

fn install_array(
    rt: &mut RuntimeBuilder<'_>,
    object: TypeId,
    object_ty: &JType,
    (store_error, array_store_ctor): (TypeId, MethodId),
) {
    let array = rt.class("Array", "jjs.lang.Array", Some(object), true);
    let object_array = JType::array_of(object_ty.clone());
    let int_array = JType::array_of(JType::INT);

    rt.native(
        "Array.initDim",
        array,
        "initDim",
        object_ty.clone(),
        &[("length", JType::INT), ("seed", JType::INT), ("queryId", JType::INT)],
        ARRAY_INIT_DIM,
    );
    rt.native(
        "Array.initDims",
        array,
        "initDims",
        object_ty.clone(),
        &[("dims", int_array), ("seed", JType::INT), ("queryId", JType::INT)],
        ARRAY_INIT_DIMS,
    );
    rt.native(
        "Array.initValues",
        array,
        "initValues",
        object_ty.clone(),
        &[("values", object_ty.clone()), ("queryId", JType::INT)],
        ARRAY_INIT_VALUES,
    );
    let can_store = rt.native(
        "Array.canStore",
        array,
        "canStore",
        JType::BOOLEAN,
        &[("array", object_array.clone()), ("value", object_ty.clone())],
        ARRAY_CAN_STORE,
    );
    let set_unchecked = rt.native(
        "Array.setUnchecked",
        array,
        "setUnchecked",
        object_ty.clone(),
        &[
            ("array", object_array.clone()),
            ("index", JType::INT),
            ("value", object_ty.clone()),
        ],
        ARRAY_SET_UNCHECKED,
    );

    let (set_check, vars) = rt.method(
        "Array.setCheck",
        array,
        "setCheck",
        object_ty.clone(),
        &[
            ("array", object_array),
            ("index", JType::INT),
            ("value", object_ty.clone()),
        ],
        MethodFlags::static_method(),
    );
    let (arr, index, value) = (vars[0], vars[1], vars[2]);
    let rejects = rt.bin(
        BinaryOp::And,
        rt.bin(BinaryOp::Neq, rt.var(value), rt.null(), JType::BOOLEAN),
        JExpression::not(rt.at(), rt.call(can_store, vec![rt.var(arr), rt.var(value)])),
        JType::BOOLEAN,
    );
    let body = vec![
        JStatement::if_stmt(
            rt.at(),
            rejects,
            JStatement::throw_stmt(
                rt.at(),
                JExpression::new_instance(rt.at(), store_error, array_store_ctor, vec![]),
            ),
            None,
        ),
        rt.ret(rt.call(set_unchecked, vec![rt.var(arr), rt.var(index), rt.var(value)])),
    ];
    rt.program.set_body(set_check, body);
}

/// Every indexed method, sorted by key
pub fn indexed_methods(program: &JProgram) -> Vec<MethodId> {
    program
        .indexed_methods_sorted()
        .into_iter()
        .map(|(_, method)| method)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodBody;

    fn installed() -> JProgram {
        let mut program = JProgram::new(false);
        install(&mut program);
        program
    }

    #[test]
    fn test_install_registers_lowering_helpers() {
        let program = installed();
        for key in [
            "Cast.dynamicCast",
            "Cast.instanceOf",
            "Cast.narrow_int",
            "LongLib.add",
            "LongLib.fromInt",
            "LongLib.toString",
            "Array.initDim",
            "Array.setCheck",
            "Exceptions.caught",
            "Exceptions.throwAssertionError",
            "GWT.create",
            "Object.$equals",
            "String.$length",
        ] {
            assert!(program.indexed_method(key).is_ok(), "missing {}", key);
        }
        assert!(program.null_method.is_some());
        assert!(program.null_field.is_some());
    }

    #[test]
    fn test_enum_base_carries_ordinal() {
        let program = installed();
        let base = program.indexed_type("Enum").unwrap();
        assert!(program.types[base].is_abstract);
        let ordinal = program.indexed_field("Enum.ordinal").unwrap();
        assert_eq!(program.fields[ordinal].ty, JType::INT);
        let accessor = program.indexed_method("Enum.ordinal").unwrap();
        assert_eq!(program.methods[accessor].return_type, JType::INT);
        let name = program.indexed_method("Enum.name").unwrap();
        assert!(program.is_string_type(&program.methods[name].return_type));
        let ctor = program.indexed_method("Enum.<init>").unwrap();
        assert_eq!(program.methods[ctor].params.len(), 2);
    }

    #[test]
    fn test_string_methods_are_devirtualized() {
        let program = installed();
        let length = program.indexed_method("String.length").unwrap();
        let helper = program.devirtualized[&length];
        assert!(program.methods[helper].is_static);
        assert_eq!(program.methods[helper].params.len(), 1);
        match &program.methods[helper].body {
            MethodBody::Native(native) => assert_eq!(native.code, STRING_LENGTH),
            other => panic!("expected native helper, got {:?}", other),
        }
        match &program.methods[length].body {
            MethodBody::Native(native) => {
                assert_eq!(native.code, format!("var s = String(this); {}", STRING_LENGTH))
            }
            other => panic!("expected native body, got {:?}", other),
        }
    }

    #[test]
    fn test_long_natives_share_representation() {
        assert!(LONG_ADD.contains("x + y"));
        assert!(LONG_SHRU.contains("BigInt.asUintN(64, x) >> n"));
        assert!(LONG_LT.ends_with("return x < y;"));
    }

    #[test]
    fn test_seed_for_leaf_types() {
        assert_eq!(seed_for(&JType::INT), SEED_NUMBER);
        assert_eq!(seed_for(&JType::BOOLEAN), SEED_BOOLEAN);
        assert_eq!(seed_for(&JType::LONG), SEED_LONG);
        assert_eq!(seed_for(&JType::Null), SEED_NULL);
    }

    #[test]
    fn test_runtime_classes_extend_object() {
        let program = installed();
        let object = program.indexed_type("Object").unwrap();
        for key in ["String", "Throwable", "Cast", "LongLib", "Array", "Exceptions"] {
            let ty = program.indexed_type(key).unwrap();
            assert_eq!(program.types[ty].super_class, Some(object), "{}", key);
        }
    }
}
