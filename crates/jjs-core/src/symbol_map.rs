//! Java member to output identifier table
//!
//! Written next to obfuscated output so stack traces and debuggers can be
//! mapped back to the Java declarations.

use crate::codegen::JavaToJsNames;
use crate::jast::program::JProgram;
use crate::js::ast::JsProgram;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    /// Seed function of a class
    Class,
    Clinit,
    Method,
    /// Prototype property shared by overriding methods
    Property,
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEntry {
    /// `pkg.Type`, `pkg.Type.member` or a method signature
    pub java: String,
    pub kind: SymbolKind,
    pub js: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMap {
    pub entries: Vec<SymbolEntry>,
}

impl SymbolMap {
    /// Collect the printed name of every generated declaration. Call after naming.
    pub fn build(program: &JProgram, js: &JsProgram, names: &JavaToJsNames) -> Self {
        let mut entries = Vec::new();
        let text = |name| js.name_text(name).to_string();

        for (ty, name) in &names.types {
            entries.push(SymbolEntry {
                java: program.types[*ty].name.clone(),
                kind: SymbolKind::Class,
                js: text(*name),
            });
        }
        for (ty, name) in &names.clinits {
            entries.push(SymbolEntry {
                java: format!("{}.$clinit", program.types[*ty].name),
                kind: SymbolKind::Clinit,
                js: text(*name),
            });
        }
        for (method, name) in &names.methods {
            entries.push(SymbolEntry {
                java: format!(
                    "{}.{}",
                    program.types[program.methods[*method].enclosing_type].name,
                    program.signature(*method)
                ),
                kind: SymbolKind::Method,
                js: text(*name),
            });
        }
        for (method, name) in &names.polymorphic {
            entries.push(SymbolEntry {
                java: format!(
                    "{}.{}",
                    program.types[program.methods[*method].enclosing_type].name,
                    program.signature(*method)
                ),
                kind: SymbolKind::Property,
                js: text(*name),
            });
        }
        for (field, name) in &names.fields {
            entries.push(SymbolEntry {
                java: program.field_name(*field),
                kind: SymbolKind::Field,
                js: text(*name),
            });
        }

        entries.sort_by(|a, b| a.java.cmp(&b.java).then(a.kind.cmp(&b.kind)));
        Self { entries }
    }

    pub fn lookup(&self, java: &str, kind: SymbolKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.java == java && e.kind == kind)
            .map(|e| e.js.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One `java<TAB>kind<TAB>js` line per entry
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let kind = match entry.kind {
                SymbolKind::Class => "class",
                SymbolKind::Clinit => "clinit",
                SymbolKind::Method => "method",
                SymbolKind::Property => "property",
                SymbolKind::Field => "field",
            };
            out.push_str(&format!("{}\t{}\t{}\n", entry.java, kind, entry.js));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate;
    use crate::jast::types::JType;
    use crate::jast::MethodFlags;
    use crate::js::namer::JsObfuscateNamer;
    use crate::source_info::SourceInfo;

    #[test]
    fn test_obfuscated_names_are_recorded() {
        let info = SourceInfo::unknown;
        let mut program = JProgram::new(false);
        let object = program.create_class(info(), "java.lang.Object", None, false, false);
        program.register_indexed_type("Object", object);
        let main_class = program.create_class(info(), "app.Main", Some(object), false, true);
        let main = program.create_method(info(), main_class, "main", JType::VOID, MethodFlags::static_method());
        program.create_field(info(), main_class, "count", JType::INT, true, false);
        program.add_entry_method(main, None);

        let mut generated = generate(&program).unwrap();
        JsObfuscateNamer::new().exec(&mut generated.program);
        let map = SymbolMap::build(&program, &generated.program, &generated.names);

        let main_js = map.lookup("app.Main.main()", SymbolKind::Method).unwrap();
        assert!(main_js.len() <= 2, "{}", main_js);
        assert!(map.lookup("app.Main.count", SymbolKind::Field).is_some());
        assert!(map.lookup("app.Main", SymbolKind::Class).is_some());
        assert!(map.to_tsv().contains("app.Main.main()\tmethod\t"));
    }
}
