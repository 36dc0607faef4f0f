//! Class hierarchy snapshot used by the analyses
//!
//! Built from the live types of a program. Passes that change the hierarchy
//! (pruning, finalizing) rebuild the oracle before the next pass reads it.

use crate::jast::declarations::MethodId;
use crate::jast::program::JProgram;
use crate::jast::types::{JType, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default)]
pub struct TypeOracle {
    /// class -> superclass
    super_class: FxHashMap<TypeId, Option<TypeId>>,
    /// type -> every supertype, itself and Object included
    supertypes: FxHashMap<TypeId, FxHashSet<TypeId>>,
    /// type -> every strict subtype, in declaration order
    subtypes: FxHashMap<TypeId, Vec<TypeId>>,
    /// Interfaces are not part of any superclass chain
    interfaces: FxHashSet<TypeId>,
    /// method -> signature
    signatures: FxHashMap<MethodId, String>,
    /// (type, signature) -> virtual method declared in that type
    declared: FxHashMap<(TypeId, String), MethodId>,
    /// method -> methods it overrides or implements
    overrides: FxHashMap<MethodId, Vec<MethodId>>,
    /// method -> methods overriding or implementing it
    overriders: FxHashMap<MethodId, Vec<MethodId>>,
    /// RTA result from the last prune, if any
    instantiated: Option<FxHashSet<TypeId>>,
    object: Option<TypeId>,
}

impl TypeOracle {
    pub fn build(program: &JProgram) -> Self {
        let mut oracle = TypeOracle {
            object: program.index.types.get("Object").copied(),
            instantiated: program.instantiated.clone(),
            ..TypeOracle::default()
        };
        let live = program.live_type_set();

        for ty in &program.declared_types {
            let decl = &program.types[*ty];
            oracle
                .super_class
                .insert(*ty, decl.super_class.filter(|s| live.contains(s)));
            if decl.is_interface() {
                oracle.interfaces.insert(*ty);
            }
            for method in &decl.methods {
                let m = &program.methods[*method];
                let sig = program.signature(*method);
                if m.is_virtual() {
                    oracle.declared.insert((*ty, sig.clone()), *method);
                }
                oracle.signatures.insert(*method, sig);
            }
        }

        for ty in &program.declared_types {
            let mut all = FxHashSet::default();
            collect_supertypes(program, &live, *ty, &mut all);
            if let Some(object) = oracle.object {
                all.insert(object);
            }
            oracle.supertypes.insert(*ty, all);
        }

        for ty in &program.declared_types {
            for sup in &oracle.supertypes[ty] {
                if sup != ty {
                    oracle.subtypes.entry(*sup).or_default().push(*ty);
                }
            }
        }

        oracle.compute_overrides(program);
        oracle
    }

    /// For every type T and every virtual method declared in a strict
    /// supertype of T, the method dispatched on a T receiver overrides it
    fn compute_overrides(&mut self, program: &JProgram) {
        let mut pairs: Vec<(MethodId, MethodId)> = Vec::new();
        for ty in &program.declared_types {
            let mut supers: Vec<TypeId> = self.supertypes[ty].iter().copied().collect();
            supers.sort();
            for sup in supers {
                if sup == *ty {
                    continue;
                }
                for method in &program.types[sup].methods {
                    if !program.methods[*method].is_virtual() {
                        continue;
                    }
                    let sig = &self.signatures[method];
                    let implementation = if self.interfaces.contains(ty) {
                        self.declared.get(&(*ty, sig.clone())).copied()
                    } else {
                        self.resolve(*ty, sig)
                    };
                    if let Some(implementation) = implementation {
                        if implementation != *method {
                            pairs.push((implementation, *method));
                        }
                    }
                }
            }
        }
        for (overrider, overridden) in pairs {
            let list = self.overrides.entry(overrider).or_default();
            if !list.contains(&overridden) {
                list.push(overridden);
            }
            let list = self.overriders.entry(overridden).or_default();
            if !list.contains(&overrider) {
                list.push(overrider);
            }
        }
    }

    pub fn signature(&self, method: MethodId) -> Option<&str> {
        self.signatures.get(&method).map(String::as_str)
    }

    pub fn super_class(&self, ty: TypeId) -> Option<TypeId> {
        self.super_class.get(&ty).copied().flatten()
    }

    /// `ty` and its superclasses, nearest first
    pub fn class_chain(&self, ty: TypeId) -> Vec<TypeId> {
        let mut chain = vec![ty];
        let mut current = ty;
        while let Some(parent) = self.super_class(current) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn is_interface(&self, ty: TypeId) -> bool {
        self.interfaces.contains(&ty)
    }

    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        sub == sup
            || self
                .supertypes
                .get(&sub)
                .is_some_and(|supers| supers.contains(&sup))
    }

    pub fn supertypes(&self, ty: TypeId) -> Vec<TypeId> {
        let mut all: Vec<TypeId> = self
            .supertypes
            .get(&ty)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        all.sort();
        all
    }

    pub fn subtypes(&self, ty: TypeId) -> &[TypeId] {
        self.subtypes.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_subtypes(&self, ty: TypeId) -> bool {
        !self.subtypes(ty).is_empty()
    }

    pub fn overrides(&self, method: MethodId) -> &[MethodId] {
        self.overrides.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn overriders(&self, method: MethodId) -> &[MethodId] {
        self.overriders.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_overridden(&self, method: MethodId) -> bool {
        !self.overriders(method).is_empty()
    }

    /// Method a virtual call with `sig` dispatches to on an exact `class` receiver
    pub fn resolve(&self, class: TypeId, sig: &str) -> Option<MethodId> {
        self.class_chain(class)
            .into_iter()
            .find_map(|c| self.declared.get(&(c, sig.to_string())).copied())
    }

    /// Whether `ty` has live instances; always true before the first prune
    pub fn is_instantiated(&self, ty: TypeId) -> bool {
        self.instantiated
            .as_ref()
            .map_or(true, |set| set.contains(&ty))
    }

    /// Whether any value of static type `ty` can exist at runtime
    pub fn has_instantiated_subtype(&self, ty: TypeId) -> bool {
        self.is_instantiated(ty) || self.subtypes(ty).iter().any(|s| self.is_instantiated(*s))
    }

    /// Every value of type `from` is also a value of type `to`
    pub fn can_assign(&self, from: &JType, to: &JType) -> bool {
        if from == to {
            return true;
        }
        match (from, to) {
            (JType::Null, to) => to.is_reference(),
            (JType::Declared(a), JType::Declared(b)) => self.is_subtype(*a, *b),
            (JType::Array(_), JType::Declared(b)) => Some(*b) == self.object,
            (JType::Array(a), JType::Array(b)) => {
                if a.is_reference() && b.is_reference() {
                    self.can_assign(a, b)
                } else {
                    a == b
                }
            }
            _ => false,
        }
    }

    /// Least upper bound of the given types, `None` for an empty input.
    /// When no single most specific supertype exists the result is Object.
    pub fn generalize(&self, types: &[JType]) -> Option<JType> {
        let (first, rest) = types.split_first()?;
        let mut result = first.clone();
        for ty in rest {
            result = self.generalize_pair(&result, ty);
        }
        Some(result)
    }

    fn generalize_pair(&self, a: &JType, b: &JType) -> JType {
        if self.can_assign(a, b) {
            return b.clone();
        }
        if self.can_assign(b, a) {
            return a.clone();
        }
        let object = self.object.map(JType::Declared).unwrap_or(JType::Null);
        match (a, b) {
            (JType::Declared(x), JType::Declared(y)) => {
                let shared: Vec<TypeId> = self
                    .supertypes(*x)
                    .into_iter()
                    .filter(|s| self.is_subtype(*y, *s))
                    .collect();
                let minimal: Vec<TypeId> = shared
                    .iter()
                    .copied()
                    .filter(|s| !shared.iter().any(|o| o != s && self.is_subtype(*o, *s)))
                    .collect();
                match minimal.as_slice() {
                    [only] => JType::Declared(*only),
                    _ => object,
                }
            }
            (JType::Array(x), JType::Array(y)) if x.is_reference() && y.is_reference() => {
                JType::array_of(self.generalize_pair(x, y))
            }
            _ if a.is_reference() && b.is_reference() => object,
            _ => a.clone(),
        }
    }

    /// `candidate` when it is narrower than `declared`, else `declared`
    pub fn stronger_type(&self, declared: &JType, candidate: &JType) -> JType {
        if candidate != declared && self.can_assign(candidate, declared) {
            candidate.clone()
        } else {
            declared.clone()
        }
    }
}

fn collect_supertypes(
    program: &JProgram,
    live: &FxHashSet<TypeId>,
    ty: TypeId,
    out: &mut FxHashSet<TypeId>,
) {
    if !live.contains(&ty) || !out.insert(ty) {
        return;
    }
    let decl = &program.types[ty];
    if let Some(parent) = decl.super_class {
        collect_supertypes(program, live, parent, out);
    }
    for interface in &decl.interfaces {
        collect_supertypes(program, live, *interface, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;
    use crate::source_info::SourceInfo;

    struct Hierarchy {
        program: JProgram,
        object: TypeId,
        shape: TypeId,
        circle: TypeId,
        square: TypeId,
        named: TypeId,
    }

    // Object <- Shape <- {Circle, Square}; Circle implements Named
    fn hierarchy() -> Hierarchy {
        let info = SourceInfo::unknown;
        let mut program = JProgram::new(false);
        let object = program.create_class(info(), "java.lang.Object", None, false, false);
        program.register_indexed_type("Object", object);
        let named = program.create_interface(info(), "Named");
        let shape = program.create_class(info(), "Shape", Some(object), true, false);
        let circle = program.create_class(info(), "Circle", Some(shape), false, false);
        let square = program.create_class(info(), "Square", Some(shape), false, false);
        program.add_interface(circle, named);
        Hierarchy {
            program,
            object,
            shape,
            circle,
            square,
            named,
        }
    }

    #[test]
    fn test_subtypes_and_assignability() {
        let h = hierarchy();
        let oracle = TypeOracle::build(&h.program);

        assert!(oracle.is_subtype(h.circle, h.shape));
        assert!(oracle.is_subtype(h.circle, h.named));
        assert!(oracle.is_subtype(h.named, h.object));
        assert!(!oracle.is_subtype(h.square, h.named));
        assert_eq!(oracle.subtypes(h.shape), &[h.circle, h.square]);

        let circle_arr = JType::array_of(JType::Declared(h.circle));
        let shape_arr = JType::array_of(JType::Declared(h.shape));
        assert!(oracle.can_assign(&circle_arr, &shape_arr));
        assert!(oracle.can_assign(&circle_arr, &JType::Declared(h.object)));
        assert!(!oracle.can_assign(&JType::array_of(JType::INT), &JType::array_of(JType::LONG)));
        assert!(oracle.can_assign(&JType::Null, &JType::Declared(h.named)));
    }

    #[test]
    fn test_generalize_finds_common_class() {
        let h = hierarchy();
        let oracle = TypeOracle::build(&h.program);
        let lub = oracle.generalize(&[JType::Declared(h.circle), JType::Declared(h.square), JType::Null]);
        assert_eq!(lub, Some(JType::Declared(h.shape)));
        assert_eq!(oracle.generalize(&[]), None);
    }

    #[test]
    fn test_stronger_type_keeps_declared_when_unrelated() {
        let h = hierarchy();
        let oracle = TypeOracle::build(&h.program);
        let shape = JType::Declared(h.shape);
        let named = JType::Declared(h.named);
        assert_eq!(oracle.stronger_type(&shape, &JType::Declared(h.circle)), JType::Declared(h.circle));
        assert_eq!(oracle.stronger_type(&shape, &named), shape);
        assert_eq!(oracle.stronger_type(&shape, &JType::Null), JType::Null);
    }

    #[test]
    fn test_overriders_include_interface_implementations() {
        let mut h = hierarchy();
        let info = SourceInfo::unknown;
        let area = h
            .program
            .create_method(info(), h.shape, "area", JType::DOUBLE, MethodFlags::abstract_method());
        let circle_area = h
            .program
            .create_method(info(), h.circle, "area", JType::DOUBLE, MethodFlags::instance());
        let name = h
            .program
            .create_method(info(), h.named, "name", JType::VOID, MethodFlags::abstract_method());
        let shape_name = h
            .program
            .create_method(info(), h.shape, "name", JType::VOID, MethodFlags::instance());

        let oracle = TypeOracle::build(&h.program);
        assert_eq!(oracle.overriders(area), &[circle_area]);
        assert_eq!(oracle.overrides(circle_area), &[area]);
        // Circle inherits Shape.name, which then implements Named.name
        assert_eq!(oracle.overriders(name), &[shape_name]);
        assert_eq!(oracle.resolve(h.square, "area()"), Some(area));
        assert_eq!(oracle.resolve(h.circle, "area()"), Some(circle_area));
    }

    #[test]
    fn test_instantiation_defaults_to_unknown() {
        let mut h = hierarchy();
        let oracle = TypeOracle::build(&h.program);
        assert!(oracle.is_instantiated(h.square));

        h.program.instantiated = Some([h.circle].into_iter().collect());
        let oracle = TypeOracle::build(&h.program);
        assert!(!oracle.is_instantiated(h.square));
        assert!(oracle.has_instantiated_subtype(h.shape));
        assert!(oracle.has_instantiated_subtype(h.named));
    }
}
