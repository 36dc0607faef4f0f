//! Ready-made programs for pipeline tests
//!
//! Each fixture documents what it prints so tests can compare the output of
//! a compiled program against the expected lines.

use crate::builder::{call_stmt, ProgramBuilder};
use jjs_core::config::{ModuleDef, PermutationDef};
use jjs_core::jast::{
    BinaryOp, JCatch, JExpression, JLiteral, JProgram, JStatement, JStatementKind, JType, MethodFlags,
};

pub const MAIN_CLASS: &str = "app.Main";

/// Module with `app.Main` as its only entry point
pub fn main_module() -> ModuleDef {
    ModuleDef::new("app", vec![MAIN_CLASS.to_string()])
}

/// Module naming an entry class that does not exist
pub fn missing_entry_module() -> ModuleDef {
    ModuleDef::new("app", vec!["app.DoesNotExist".to_string()])
}

/// Prints `Hello, world`
pub fn hello_program() -> JProgram {
    let mut b = ProgramBuilder::new();
    let main = b.class(MAIN_CLASS);
    let string_ty = b.program().string_type();
    let print = b.print_method(main, "print", string_ty);
    let info = b.info();
    let stmt = call_stmt(
        info.clone(),
        None,
        print,
        vec![JExpression::string_lit(info, "Hello, world")],
    );
    b.entry(main, vec![stmt]);
    b.build()
}

/// Prints `1` and `2`, calling a private no-op helper in between
pub fn dead_helper_program() -> JProgram {
    let mut b = ProgramBuilder::new();
    let main = b.class(MAIN_CLASS);
    let print = b.print_method(main, "print", JType::INT);
    let (helper, _) = b.method_with(
        main,
        "unusedHelper",
        JType::VOID,
        &[],
        MethodFlags::static_method().private(),
    );
    b.set_body(helper, vec![]);

    let info = b.info();
    let body = vec![
        call_stmt(info.clone(), None, print, vec![JExpression::int_lit(info.clone(), 1)]),
        call_stmt(info.clone(), None, helper, vec![]),
        call_stmt(info.clone(), None, print, vec![JExpression::int_lit(info, 2)]),
    ];
    b.entry(main, body);
    b.build()
}

/// Virtual dispatch, a class initializer, instance fields and a loop.
///
/// ```text
/// class Counter { static int created; int count;
///   static { created = 10; }
///   Counter() { created = created + 1; }
///   int step() { return 1; }
///   void bump() { count = count + step(); } }
/// class Doubler extends Counter { int step() { return 2; } }
/// static int run(Counter c, int n) {
///   int i = 0; while (i < n) { c.bump(); i = i + 1; } return c.count; }
/// print(run(new Counter(), 3)); print(run(new Doubler(), 3)); print(Counter.created);
/// ```
///
/// Prints `3`, `6` and `12`.
pub fn counter_program() -> JProgram {
    let mut b = ProgramBuilder::new();
    let counter = b.class("app.Counter");
    let counter_ty = JType::Declared(counter);
    let created = b.static_field(counter, "created", JType::INT);
    let count = b.field(counter, "count", JType::INT);

    let info = b.info();
    let init = JStatement::expr(JExpression::assign(
        info.clone(),
        JExpression::field_ref(info.clone(), None, created),
        JExpression::int_lit(info, 10),
        JType::INT,
    ));
    b.clinit(counter, vec![init]);

    let object_ctor = b.object_ctor();
    let (counter_ctor, _) = b.constructor(counter, object_ctor, &[], |b, _| {
        let info = b.info();
        let created_ref = || JExpression::field_ref(info.clone(), None, created);
        vec![JStatement::expr(JExpression::assign(
            info.clone(),
            created_ref(),
            JExpression::binary(
                info.clone(),
                BinaryOp::Add,
                created_ref(),
                JExpression::int_lit(info.clone(), 1),
                JType::INT,
            ),
            JType::INT,
        ))]
    });

    let (step, _) = b.method(counter, "step", JType::INT, &[]);
    let info = b.info();
    b.set_body(
        step,
        vec![JStatement::return_stmt(info.clone(), Some(JExpression::int_lit(info, 1)))],
    );

    let (bump, _) = b.method(counter, "bump", JType::VOID, &[]);
    let info = b.info();
    let this = || JExpression::this(info.clone(), counter);
    let count_ref = || JExpression::field_ref(info.clone(), Some(this()), count);
    let bump_body = vec![JStatement::expr(JExpression::assign(
        info.clone(),
        count_ref(),
        JExpression::binary(
            info.clone(),
            BinaryOp::Add,
            count_ref(),
            JExpression::call(info.clone(), Some(this()), step, vec![]),
            JType::INT,
        ),
        JType::INT,
    ))];
    b.set_body(bump, bump_body);

    let doubler = b.subclass("app.Doubler", counter);
    let (doubler_ctor, _) = b.constructor(doubler, counter_ctor, &[], |_, _| Vec::new());
    let (doubler_step, _) = b.method(doubler, "step", JType::INT, &[]);
    let info = b.info();
    b.set_body(
        doubler_step,
        vec![JStatement::return_stmt(info.clone(), Some(JExpression::int_lit(info, 2)))],
    );

    let main = b.class(MAIN_CLASS);
    let print = b.print_method(main, "print", JType::INT);
    let (run, params) = b.static_method(
        main,
        "run",
        JType::INT,
        &[("c", counter_ty.clone()), ("n", JType::INT)],
    );
    let i = b.local(run, "i", JType::INT);
    let info = b.info();
    let var = |v| JExpression::var_ref(info.clone(), v);
    let run_body = vec![
        JStatement::local_decl(info.clone(), i, Some(JExpression::int_lit(info.clone(), 0))),
        JStatement::while_stmt(
            info.clone(),
            JExpression::binary(info.clone(), BinaryOp::Lt, var(i), var(params[1]), JType::BOOLEAN),
            JStatement::block(
                info.clone(),
                vec![
                    call_stmt(info.clone(), Some(var(params[0])), bump, vec![]),
                    JStatement::expr(JExpression::assign(
                        info.clone(),
                        var(i),
                        JExpression::binary(
                            info.clone(),
                            BinaryOp::Add,
                            var(i),
                            JExpression::int_lit(info.clone(), 1),
                            JType::INT,
                        ),
                        JType::INT,
                    )),
                ],
            ),
        ),
        JStatement::return_stmt(
            info.clone(),
            Some(JExpression::field_ref(info.clone(), Some(var(params[0])), count)),
        ),
    ];
    b.set_body(run, run_body);

    let info = b.info();
    let run_with = |class, ctor| {
        JExpression::static_call(
            info.clone(),
            run,
            vec![
                JExpression::new_instance(info.clone(), class, ctor, vec![]),
                JExpression::int_lit(info.clone(), 3),
            ],
        )
    };
    let entry_body = vec![
        call_stmt(info.clone(), None, print, vec![run_with(counter, counter_ctor)]),
        call_stmt(info.clone(), None, print, vec![run_with(doubler, doubler_ctor)]),
        call_stmt(
            info.clone(),
            None,
            print,
            vec![JExpression::field_ref(info.clone(), None, created)],
        ),
    ];
    b.entry(main, entry_body);
    b.build()
}

/// A cast whose result is never read still throws when it fails.
///
/// ```text
/// class Shape {} class Circ extends Shape {} class Sq extends Shape {}
/// static Shape make(int k) { return k == 1 ? new Circ() : new Sq(); }
/// Shape o = make(1);
/// try { Sq q = (Sq) o; print(9); } catch (ClassCastException e) { print(7); }
/// ```
///
/// Prints `7`.
pub fn failed_cast_program() -> JProgram {
    let mut b = ProgramBuilder::new();
    let object = b.object();
    let shape = b.subclass("app.Shape", object);
    let shape_ty = JType::Declared(shape);
    let circ = b.subclass("app.Circ", shape);
    let circ_ctor = b.default_constructor(circ);
    let sq = b.subclass("app.Sq", shape);
    let sq_ctor = b.default_constructor(sq);

    let main = b.class(MAIN_CLASS);
    let print = b.print_method(main, "print", JType::INT);
    let (make, params) = b.static_method(main, "make", shape_ty.clone(), &[("k", JType::INT)]);
    let info = b.info();
    let pick = JExpression::conditional(
        info.clone(),
        JExpression::binary(
            info.clone(),
            BinaryOp::Eq,
            JExpression::var_ref(info.clone(), params[0]),
            JExpression::int_lit(info.clone(), 1),
            JType::BOOLEAN,
        ),
        JExpression::new_instance(info.clone(), circ, circ_ctor, vec![]),
        JExpression::new_instance(info.clone(), sq, sq_ctor, vec![]),
        shape_ty.clone(),
    );
    b.set_body(make, vec![JStatement::return_stmt(info, Some(pick))]);

    let class_cast = match b.program().indexed_type("ClassCastException") {
        Ok(ty) => ty,
        Err(_) => panic!("support library did not register ClassCastException"),
    };
    let (entry, _) = b.static_method(main, "run", JType::VOID, &[]);
    let o = b.local(entry, "o", shape_ty.clone());
    let q = b.local(entry, "q", JType::Declared(sq));
    let e = b.local(entry, "e", JType::Declared(class_cast));
    let info = b.info();
    let print_int = |v| call_stmt(info.clone(), None, print, vec![JExpression::int_lit(info.clone(), v)]);
    let body = vec![
        JStatement::local_decl(
            info.clone(),
            o,
            Some(JExpression::static_call(info.clone(), make, vec![JExpression::int_lit(info.clone(), 1)])),
        ),
        JStatement::new(
            info.clone(),
            JStatementKind::Try {
                block: vec![
                    JStatement::local_decl(
                        info.clone(),
                        q,
                        Some(JExpression::cast(
                            info.clone(),
                            JType::Declared(sq),
                            JExpression::var_ref(info.clone(), o),
                        )),
                    ),
                    print_int(9),
                ],
                catches: vec![JCatch {
                    info: info.clone(),
                    var: e,
                    body: vec![print_int(7)],
                }],
                finally: None,
            },
        ),
    ];
    b.set_body(entry, body);
    b.entry(main, vec![call_stmt(info, None, entry, vec![])]);
    b.build()
}

/// Enums read through their ordinals.
///
/// `Color c = pick(2);` then prints `c.ordinal()`, `c == BLUE ? 1 : 0` and
/// `GREEN.ordinal()`; finally `Object o = Size.LARGE;` prints
/// `((Size) o).ordinal()`. Output is `2`, `1`, `1`, `1`.
pub fn enum_program() -> JProgram {
    let mut b = ProgramBuilder::new();
    let (color, colors) = b.enumeration("app.Color", &["RED", "GREEN", "BLUE"]);
    let (size, sizes) = b.enumeration("app.Size", &["SMALL", "LARGE"]);
    let color_ty = JType::Declared(color);
    let ordinal = match b.program().indexed_method("Enum.ordinal") {
        Ok(method) => method,
        Err(_) => panic!("support library did not register Enum.ordinal"),
    };

    let main = b.class(MAIN_CLASS);
    let print = b.print_method(main, "print", JType::INT);
    let (pick, params) = b.static_method(main, "pick", color_ty.clone(), &[("k", JType::INT)]);
    let info = b.info();
    let constant = |field| JExpression::field_ref(info.clone(), None, field);
    let k_is = |v| {
        JExpression::binary(
            info.clone(),
            BinaryOp::Eq,
            JExpression::var_ref(info.clone(), params[0]),
            JExpression::int_lit(info.clone(), v),
            JType::BOOLEAN,
        )
    };
    let chosen = JExpression::conditional(
        info.clone(),
        k_is(2),
        constant(colors[2]),
        JExpression::conditional(info.clone(), k_is(1), constant(colors[1]), constant(colors[0]), color_ty.clone()),
        color_ty.clone(),
    );
    b.set_body(pick, vec![JStatement::return_stmt(info.clone(), Some(chosen))]);

    let (run, _) = b.static_method(main, "run", JType::VOID, &[]);
    let c = b.local(run, "c", color_ty.clone());
    let object_ty = JType::Declared(b.object());
    let o = b.local(run, "o", object_ty);
    let info = b.info();
    let constant = |field| JExpression::field_ref(info.clone(), None, field);
    let ordinal_of = |value| JExpression::call(info.clone(), Some(value), ordinal, vec![]);
    let print_stmt = |value| call_stmt(info.clone(), None, print, vec![value]);
    let is_blue = JExpression::conditional(
        info.clone(),
        JExpression::binary(
            info.clone(),
            BinaryOp::Eq,
            JExpression::var_ref(info.clone(), c),
            constant(colors[2]),
            JType::BOOLEAN,
        ),
        JExpression::int_lit(info.clone(), 1),
        JExpression::int_lit(info.clone(), 0),
        JType::INT,
    );
    let body = vec![
        JStatement::local_decl(
            info.clone(),
            c,
            Some(JExpression::static_call(info.clone(), pick, vec![JExpression::int_lit(info.clone(), 2)])),
        ),
        print_stmt(ordinal_of(JExpression::var_ref(info.clone(), c))),
        print_stmt(is_blue),
        print_stmt(ordinal_of(constant(colors[1]))),
        JStatement::local_decl(info.clone(), o, Some(constant(sizes[1]))),
        print_stmt(ordinal_of(JExpression::cast(
            info.clone(),
            JType::Declared(size),
            JExpression::var_ref(info.clone(), o),
        ))),
    ];
    b.set_body(run, body);
    b.entry(main, vec![call_stmt(info, None, run, vec![])]);
    b.build()
}

/// 64-bit arithmetic that overflows 32 bits.
///
/// `long big = 4294967296L * 3 + 8;` then prints `(int) (big % 5)` and
/// `(int) (big >> 32)`, i.e. `1` and `3`.
pub fn long_program() -> JProgram {
    let mut b = ProgramBuilder::new();
    let main = b.class(MAIN_CLASS);
    let print = b.print_method(main, "print", JType::INT);
    let entry = b.entry(main, vec![]);
    let big = b.local(entry, "big", JType::LONG);

    let info = b.info();
    let long = |v| JExpression::long_lit(info.clone(), v);
    let big_ref = || JExpression::var_ref(info.clone(), big);
    let init = JExpression::binary(
        info.clone(),
        BinaryOp::Add,
        JExpression::binary(info.clone(), BinaryOp::Mul, long(4_294_967_296), long(3), JType::LONG),
        long(8),
        JType::LONG,
    );
    let as_int = |expr| JExpression::cast(info.clone(), JType::INT, expr);
    let body = vec![
        JStatement::local_decl(info.clone(), big, Some(init)),
        call_stmt(
            info.clone(),
            None,
            print,
            vec![as_int(JExpression::binary(
                info.clone(),
                BinaryOp::Mod,
                big_ref(),
                long(5),
                JType::LONG,
            ))],
        ),
        call_stmt(
            info.clone(),
            None,
            print,
            vec![as_int(JExpression::binary(
                info.clone(),
                BinaryOp::Shr,
                big_ref(),
                JExpression::int_lit(info.clone(), 32),
                JType::LONG,
            ))],
        ),
    ];
    b.set_body(entry, body);
    b.build()
}

/// Deferred binding of `app.Greeter` to `app.English` (prints `1`) or
/// `app.French` (prints `2`)
pub fn rebind_program() -> JProgram {
    let mut b = ProgramBuilder::new();
    let greeter = b.interface("app.Greeter");
    let greeter_ty = JType::Declared(greeter);
    let (greet, _) = b.method_with(
        greeter,
        "greet",
        JType::INT,
        &[],
        MethodFlags::abstract_method(),
    );

    for (name, value) in [("app.English", 1), ("app.French", 2)] {
        let class = b.class(name);
        b.implements(class, greeter);
        b.default_constructor(class);
        let (method, _) = b.method(class, "greet", JType::INT, &[]);
        let info = b.info();
        b.set_body(
            method,
            vec![JStatement::return_stmt(info.clone(), Some(JExpression::int_lit(info, value)))],
        );
    }

    let main = b.class(MAIN_CLASS);
    let print = b.print_method(main, "print", JType::INT);
    let create = match b.program().indexed_method("GWT.create") {
        Ok(create) => create,
        Err(_) => panic!("support library did not register GWT.create"),
    };
    let info = b.info();
    let created = JExpression::cast(
        info.clone(),
        greeter_ty.clone(),
        JExpression::static_call(
            info.clone(),
            create,
            vec![JExpression::literal(info.clone(), JLiteral::Class(greeter_ty))],
        ),
    );
    let stmt = call_stmt(
        info.clone(),
        None,
        print,
        vec![JExpression::call(info, Some(created), greet, vec![])],
    );
    b.entry(main, vec![stmt]);
    b.build()
}

/// One permutation per greeter implementation
pub fn greeter_permutations() -> Vec<PermutationDef> {
    ["app.English", "app.French"]
        .into_iter()
        .enumerate()
        .map(|(id, answer)| PermutationDef {
            id,
            rebinds: [("app.Greeter".to_string(), answer.to_string())].into_iter().collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_have_entry_classes() {
        for program in [hello_program(), dead_helper_program(), counter_program(), long_program(), rebind_program()] {
            assert!(program.find_type(MAIN_CLASS).is_some());
        }
    }

    #[test]
    fn test_greeter_permutations_are_numbered() {
        let perms = greeter_permutations();
        assert_eq!(perms.len(), 2);
        assert_eq!(perms[1].id, 1);
        assert_eq!(perms[1].rebinds["app.Greeter"], "app.French");
    }
}
