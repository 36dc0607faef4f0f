//! Output size per Java class

use crate::codegen::JavaToJsNames;
use crate::jast::program::JProgram;
use crate::jast::types::TypeId;
use crate::js::ast::{JsProgram, JsStatement, JsStatementKind};
use crate::js::scope::NameId;
use crate::js::source_gen::SourceRangeMap;
use crate::source_info::{Axis, SourceInfo};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Bucket for statements no class can be found for
pub const UNATTRIBUTED: &str = "<unattributed>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSize {
    pub name: String,
    /// Bytes of output
    pub size: usize,
    pub statements: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub permutation_id: usize,
    pub total_size: usize,
    /// Largest first
    pub classes: Vec<ClassSize>,
}

impl CompileReport {
    /// Attribute every top-level statement's output range to a class.
    ///
    /// `ranges` must come from printing `js` with range recording on; its
    /// depth-0 ranges line up with `js.global_block`.
    pub fn build(
        permutation_id: usize,
        program: &JProgram,
        js: &JsProgram,
        names: &JavaToJsNames,
        ranges: &SourceRangeMap,
        total_size: usize,
    ) -> Self {
        let owners = owners(names, program);
        let mut sizes: IndexMap<String, (usize, usize)> = IndexMap::new();
        let mut previous: Option<String> = None;

        let top_level = ranges.iter().filter(|range| range.depth == 0);
        for (range, stmt) in top_level.zip(&js.global_block) {
            let class = class_of_info(&range.info)
                .or_else(|| class_of_stmt(stmt, &owners, program))
                .or_else(|| previous.clone())
                .unwrap_or_else(|| UNATTRIBUTED.to_string());
            let entry = sizes.entry(class.clone()).or_default();
            entry.0 += range.end - range.start;
            entry.1 += 1;
            previous = Some(class);
        }

        let mut classes: Vec<ClassSize> = sizes
            .into_iter()
            .map(|(name, (size, statements))| ClassSize { name, size, statements })
            .collect();
        classes.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));
        tracing::debug!(classes = classes.len(), total_size, "compile report built");
        Self {
            permutation_id,
            total_size,
            classes,
        }
    }

    pub fn size_of(&self, class: &str) -> Option<usize> {
        self.classes.iter().find(|c| c.name == class).map(|c| c.size)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Top-level names and the class that declared them
fn owners(names: &JavaToJsNames, program: &JProgram) -> FxHashMap<NameId, TypeId> {
    let mut owners = FxHashMap::default();
    owners.extend(names.types.iter().map(|(ty, name)| (*name, *ty)));
    owners.extend(names.clinits.iter().map(|(ty, name)| (*name, *ty)));
    owners.extend(
        names
            .methods
            .iter()
            .map(|(m, name)| (*name, program.methods[*m].enclosing_type)),
    );
    owners.extend(
        names
            .fields
            .iter()
            .filter(|(f, _)| program.fields[**f].is_static)
            .map(|(f, name)| (*name, program.fields[*f].enclosing_type)),
    );
    owners
}

fn class_of_info(info: &SourceInfo) -> Option<String> {
    if let Some(class) = info.primary_correlation(Axis::Class) {
        return Some(class.ident.clone());
    }
    [Axis::Method, Axis::Field].into_iter().find_map(|axis| {
        let member = info.primary_correlation(axis)?;
        member
            .ident
            .rsplit_once('.')
            .map(|(owner, _)| owner.to_string())
    })
}

fn class_of_stmt(stmt: &JsStatement, owners: &FxHashMap<NameId, TypeId>, program: &JProgram) -> Option<String> {
    let name = match &stmt.kind {
        JsStatementKind::Function(function) => function.name?,
        JsStatementKind::Vars(vars) => vars.iter().find_map(|v| owners.get(&v.name).map(|_| v.name))?,
        _ => return None,
    };
    owners.get(&name).map(|ty| program.types[*ty].name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate;
    use crate::jast::types::JType;
    use crate::jast::MethodFlags;
    use crate::js::namer::JsVerboseNamer;
    use crate::js::source_gen::{JsSourceGenerator, TextOutput};

    #[test]
    fn test_sizes_add_up_per_class() {
        let info = SourceInfo::unknown;
        let mut program = JProgram::new(false);
        let object = program.create_class(info(), "java.lang.Object", None, false, false);
        program.register_indexed_type("Object", object);
        let main_class = program.create_class(info(), "app.Main", Some(object), false, true);
        let main = program.create_method(info(), main_class, "main", JType::VOID, MethodFlags::static_method());
        program.add_entry_method(main, None);

        let mut generated = generate(&program).unwrap();
        JsVerboseNamer.exec(&mut generated.program).unwrap();
        let source = JsSourceGenerator::new(&generated.program, TextOutput::Minified)
            .with_ranges(true)
            .generate();
        let ranges = source.ranges.unwrap();
        let report = CompileReport::build(0, &program, &generated.program, &generated.names, &ranges, source.js.len());

        let main_size = report.size_of("app.Main").unwrap();
        assert!(main_size >= "function app_Main_main(){}".len());
        // the shared `var _;` belongs to no class
        assert_eq!(report.size_of(UNATTRIBUTED), Some("var _;".len()));
        let attributed: usize = report.classes.iter().map(|c| c.size).sum();
        assert!(attributed <= report.total_size);
    }
}
