//! Property tests for the output encoders and the namers

use jjs_core::config::NameDenylist;
use jjs_core::js::namer::obfuscate::obfuscated_ident;
use jjs_core::js::namer::{check_names, JsObfuscateNamer, JsPrettyNamer, JsVerboseNamer};
use jjs_core::js::scope::{is_reserved, is_valid_ident};
use jjs_core::js::source_gen::format_number;
use jjs_core::js::sourcemap::encode_vlq;
use jjs_core::js::{JsProgram, NameId, ScopeKind};
use proptest::prelude::*;
use std::collections::HashSet;

const BASE64: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn decode_vlq(encoded: &str) -> i64 {
    let mut value: u64 = 0;
    let mut shift = 0;
    for c in encoded.chars() {
        let digit = BASE64.find(c).unwrap() as u64;
        value |= (digit & 0x1F) << shift;
        shift += 5;
    }
    let magnitude = (value >> 1) as i64;
    if value & 1 == 1 {
        -magnitude
    } else {
        magnitude
    }
}

/// Identifiers as the code generator produces them, reserved words included
fn ident() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z][a-zA-Z0-9_]{0,5}",
        1 => prop::sample::select(vec!["function", "var", "Math", "undefined", "this", "a", "b"])
            .prop_map(str::to_string),
    ]
}

/// Top-level names plus one function scope per entry of `locals`
fn program_with(top: &[String], locals: &[Vec<String>]) -> (JsProgram, Vec<NameId>) {
    let mut program = JsProgram::new();
    let top_scope = program.top_scope;
    let mut names = Vec::new();
    for (i, ident) in top.iter().enumerate() {
        names.push(program.declare_name(top_scope, &format!("{}_{}", ident, i), ident));
    }
    for (f, idents) in locals.iter().enumerate() {
        let scope = program.new_scope(top_scope, ScopeKind::Function, format!("f{}", f));
        for ident in idents {
            names.push(program.declare_name(scope, ident, ident));
        }
    }
    (program, names)
}

proptest! {
    #[test]
    fn prop_vlq_round_trips(value in -1_000_000_000i64..1_000_000_000) {
        let encoded = encode_vlq(value);
        prop_assert!(encoded.chars().all(|c| BASE64.contains(c)));
        prop_assert_eq!(decode_vlq(&encoded), value);
    }

    #[test]
    fn prop_small_vlq_values_take_one_char(value in -15i64..=15) {
        prop_assert_eq!(encode_vlq(value).len(), 1);
    }

    #[test]
    fn prop_formatted_numbers_parse_back(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let text = format_number(value);
        let parsed: f64 = text.parse().unwrap();
        prop_assert_eq!(parsed, if value == 0.0 { 0.0 } else { value }, "{}", text);
    }

    #[test]
    fn prop_integral_numbers_print_without_fraction(value in -1_000_000i64..1_000_000) {
        prop_assert_eq!(format_number(value as f64), value.to_string());
    }

    #[test]
    fn prop_obfuscated_idents_are_distinct_and_valid(a in 0usize..200_000, b in 0usize..200_000) {
        let (x, y) = (obfuscated_ident(a), obfuscated_ident(b));
        prop_assert!(is_valid_ident(&x));
        prop_assert_eq!(a == b, x == y);
    }

    #[test]
    fn prop_obfuscated_naming_is_checked(
        top in prop::collection::vec(ident(), 0..40),
        locals in prop::collection::vec(prop::collection::vec(ident(), 0..10), 0..5),
    ) {
        let (mut program, names) = program_with(&top, &locals);
        JsObfuscateNamer::new().exec(&mut program);
        prop_assert!(check_names(&program).is_ok());
        for name in names {
            let text = program.name_text(name);
            prop_assert!(!is_reserved(text), "{}", text);
            prop_assert!(text.len() <= 3, "{}", text);
        }
    }

    #[test]
    fn prop_pretty_naming_avoids_denylist(
        top in prop::collection::vec(ident(), 0..40),
        locals in prop::collection::vec(prop::collection::vec(ident(), 0..10), 0..5),
        denied in ident(),
    ) {
        let (mut program, names) = program_with(&top, &locals);
        let denylist = NameDenylist { exact: vec![denied], suffixes: vec!["Handler".to_string()] };
        JsPrettyNamer::new(denylist.clone()).exec(&mut program).unwrap();
        prop_assert!(check_names(&program).is_ok());

        let top_texts: Vec<&str> = program.scopes[program.top_scope]
            .names
            .values()
            .map(|n| program.name_text(*n))
            .collect();
        prop_assert_eq!(top_texts.iter().collect::<HashSet<_>>().len(), top_texts.len());
        for name in names {
            let text = program.name_text(name);
            prop_assert!(is_valid_ident(text) && !is_reserved(text), "{}", text);
            prop_assert!(!denylist.is_denied(text), "{}", text);
        }
    }

    #[test]
    fn prop_verbose_naming_is_checked(
        top in prop::collection::vec(ident(), 0..40),
        locals in prop::collection::vec(prop::collection::vec(ident(), 0..10), 0..5),
    ) {
        let (mut program, _) = program_with(&top, &locals);
        JsVerboseNamer.exec(&mut program).unwrap();
        prop_assert!(check_names(&program).is_ok());
    }
}
