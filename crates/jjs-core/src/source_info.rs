//! Source provenance for AST nodes
//!
//! Every typed and output AST node carries exactly one [`SourceInfo`]. When
//! provenance tracking is disabled the info is a bare [`SourceOrigin`] and
//! [`SourceInfo::make_child`] hands back the receiver. When tracking is
//! enabled the info is a correlated record that remembers its parent, any
//! additional ancestors merged into it, and a set of [`Correlation`] tags used
//! by compile reports.
//!
//! Origins and correlations are interned through a [`CorrelationFactory`]
//! owned by the program being compiled. Its caches are cleared whenever a
//! permutation takes its private copy of the AST.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// File and position a node was produced from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceOrigin {
    pub file: String,
    pub start_line: u32,
    pub start_pos: u32,
    pub end_pos: u32,
}

impl SourceOrigin {
    pub const UNKNOWN_FILE: &'static str = "Unknown";

    pub fn new(file: impl Into<String>, start_line: u32, start_pos: u32, end_pos: u32) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_pos,
            end_pos,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.file == Self::UNKNOWN_FILE
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.file, self.start_line)
    }
}

/// Category a correlation classifies a node under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    Class,
    Field,
    Method,
    Literal,
    Function,
    JsName,
    Origin,
}

/// Kind of literal recorded on the literal axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralKind {
    Boolean,
    Char,
    Class,
    Double,
    Float,
    Int,
    Long,
    Null,
    String,
    JsArray,
    JsObject,
    JsNumber,
    JsString,
}

/// A cross-cutting tag attached to source infos
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Correlation {
    pub axis: Axis,
    pub ident: String,
    pub literal: Option<LiteralKind>,
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.axis, self.ident)
    }
}

/// Provenance record with parent and correlation tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedInfo {
    origin: Arc<SourceOrigin>,
    parent: Option<SourceInfo>,
    additional_ancestors: Vec<SourceInfo>,
    correlations: Vec<Arc<Correlation>>,
}

/// Provenance attached to every AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceInfo {
    Origin(Arc<SourceOrigin>),
    Correlated(Arc<CorrelatedInfo>),
}

impl SourceInfo {
    /// Shared info for nodes with no known origin
    pub fn unknown() -> Self {
        static UNKNOWN: OnceLock<Arc<SourceOrigin>> = OnceLock::new();
        let origin = UNKNOWN.get_or_init(|| {
            Arc::new(SourceOrigin::new(SourceOrigin::UNKNOWN_FILE, 0, 0, 0))
        });
        SourceInfo::Origin(Arc::clone(origin))
    }

    pub fn origin(&self) -> &SourceOrigin {
        match self {
            SourceInfo::Origin(origin) => origin,
            SourceInfo::Correlated(info) => &info.origin,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.origin().file
    }

    pub fn start_line(&self) -> u32 {
        self.origin().start_line
    }

    pub fn start_pos(&self) -> u32 {
        self.origin().start_pos
    }

    pub fn end_pos(&self) -> u32 {
        self.origin().end_pos
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self, SourceInfo::Correlated(_))
    }

    /// Derive the info for a synthetic node built from this one
    pub fn make_child(&self) -> SourceInfo {
        match self {
            SourceInfo::Origin(_) => self.clone(),
            SourceInfo::Correlated(info) => SourceInfo::Correlated(Arc::new(CorrelatedInfo {
                origin: Arc::clone(&info.origin),
                parent: Some(self.clone()),
                additional_ancestors: Vec::new(),
                correlations: info.correlations.clone(),
            })),
        }
    }

    pub fn parent(&self) -> Option<&SourceInfo> {
        match self {
            SourceInfo::Origin(_) => None,
            SourceInfo::Correlated(info) => info.parent.as_ref(),
        }
    }

    pub fn additional_ancestors(&self) -> &[SourceInfo] {
        match self {
            SourceInfo::Origin(_) => &[],
            SourceInfo::Correlated(info) => &info.additional_ancestors,
        }
    }

    /// Record that this node also derives from `others`
    pub fn add_additional_ancestors(&mut self, others: &[SourceInfo]) {
        if let SourceInfo::Correlated(info) = self {
            let info = Arc::make_mut(info);
            for other in others {
                if !info
                    .additional_ancestors
                    .iter()
                    .any(|existing| existing.same_record(other))
                {
                    info.additional_ancestors.push(other.clone());
                }
            }
        }
    }

    /// Attach a tag, replacing any existing tag on the same axis with the same ident
    pub fn add_correlation(&mut self, correlation: Arc<Correlation>) {
        if let SourceInfo::Correlated(info) = self {
            let info = Arc::make_mut(info);
            if !info.correlations.iter().any(|c| **c == *correlation) {
                info.correlations.push(correlation);
            }
        }
    }

    pub fn correlations(&self) -> &[Arc<Correlation>] {
        match self {
            SourceInfo::Origin(_) => &[],
            SourceInfo::Correlated(info) => &info.correlations,
        }
    }

    /// The most recently attached correlation on `axis`
    pub fn primary_correlation(&self, axis: Axis) -> Option<&Correlation> {
        self.correlations()
            .iter()
            .rev()
            .find(|c| c.axis == axis)
            .map(|c| c.as_ref())
    }

    fn same_record(&self, other: &SourceInfo) -> bool {
        match (self, other) {
            (SourceInfo::Origin(a), SourceInfo::Origin(b)) => Arc::ptr_eq(a, b) || a == b,
            (SourceInfo::Correlated(a), SourceInfo::Correlated(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.origin().fmt(f)
    }
}

/// Per-compilation interning context for origins and correlations
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CorrelationFactory {
    enabled: bool,
    #[serde(skip)]
    origins: FxHashMap<SourceOrigin, Arc<SourceOrigin>>,
    #[serde(skip)]
    correlations: FxHashMap<Correlation, Arc<Correlation>>,
}

impl Clone for CorrelationFactory {
    fn clone(&self) -> Self {
        Self::new(self.enabled)
    }
}

impl CorrelationFactory {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            origins: FxHashMap::default(),
            correlations: FxHashMap::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Canonical origin for a position
    pub fn origin(
        &mut self,
        file: &str,
        start_line: u32,
        start_pos: u32,
        end_pos: u32,
    ) -> Arc<SourceOrigin> {
        let key = SourceOrigin::new(file, start_line, start_pos, end_pos);
        if let Some(existing) = self.origins.get(&key) {
            return Arc::clone(existing);
        }
        let origin = Arc::new(key.clone());
        self.origins.insert(key, Arc::clone(&origin));
        origin
    }

    /// Create the info for a freshly parsed node
    pub fn create_info(&mut self, file: &str, start_line: u32, start_pos: u32, end_pos: u32) -> SourceInfo {
        let origin = self.origin(file, start_line, start_pos, end_pos);
        if self.enabled {
            let mut info = SourceInfo::Correlated(Arc::new(CorrelatedInfo {
                origin,
                parent: None,
                additional_ancestors: Vec::new(),
                correlations: Vec::new(),
            }));
            let file_tag = self.correlation(Axis::Origin, file, None);
            info.add_correlation(file_tag);
            info
        } else {
            SourceInfo::Origin(origin)
        }
    }

    /// Canonical correlation for `(axis, ident, literal)`
    pub fn correlation(&mut self, axis: Axis, ident: &str, literal: Option<LiteralKind>) -> Arc<Correlation> {
        let key = Correlation {
            axis,
            ident: ident.to_string(),
            literal,
        };
        if let Some(existing) = self.correlations.get(&key) {
            return Arc::clone(existing);
        }
        let correlation = Arc::new(key.clone());
        self.correlations.insert(key, Arc::clone(&correlation));
        correlation
    }

    pub fn by_class(&mut self, name: &str) -> Arc<Correlation> {
        self.correlation(Axis::Class, name, None)
    }

    pub fn by_method(&mut self, name: &str) -> Arc<Correlation> {
        self.correlation(Axis::Method, name, None)
    }

    pub fn by_field(&mut self, name: &str) -> Arc<Correlation> {
        self.correlation(Axis::Field, name, None)
    }

    pub fn by_literal(&mut self, kind: LiteralKind) -> Arc<Correlation> {
        self.correlation(Axis::Literal, &format!("{:?}", kind), Some(kind))
    }

    pub fn by_function(&mut self, name: &str) -> Arc<Correlation> {
        self.correlation(Axis::Function, name, None)
    }

    pub fn by_js_name(&mut self, name: &str) -> Arc<Correlation> {
        self.correlation(Axis::JsName, name, None)
    }

    /// Number of interned entries across both tables
    pub fn cached_entries(&self) -> usize {
        self.origins.len() + self.correlations.len()
    }

    /// Drop both interning tables
    pub fn clear(&mut self) {
        self.origins.clear();
        self.correlations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_child_is_noop_without_tracking() {
        let mut factory = CorrelationFactory::new(false);
        let info = factory.create_info("Foo.java", 3, 10, 20);
        let child = info.make_child();

        assert!(!child.is_tracking());
        assert!(child.parent().is_none());
        assert_eq!(child.start_line(), 3);
        match (&info, &child) {
            (SourceInfo::Origin(a), SourceInfo::Origin(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected origin infos"),
        }
    }

    #[test]
    fn test_make_child_links_parent_when_tracking() {
        let mut factory = CorrelationFactory::new(true);
        let mut info = factory.create_info("Foo.java", 3, 10, 20);
        info.add_correlation(factory.by_class("com.example.Foo"));

        let child = info.make_child();
        assert!(child.is_tracking());
        assert!(child.parent().is_some());
        assert_eq!(
            child.primary_correlation(Axis::Class).map(|c| c.ident.as_str()),
            Some("com.example.Foo")
        );
    }

    #[test]
    fn test_origins_are_interned() {
        let mut factory = CorrelationFactory::new(false);
        let a = factory.origin("A.java", 1, 0, 5);
        let b = factory.origin("A.java", 1, 0, 5);
        assert!(Arc::ptr_eq(&a, &b));

        factory.clear();
        let c = factory.origin("A.java", 1, 0, 5);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a, c);
    }

    #[test]
    fn test_additional_ancestors_deduplicated() {
        let mut factory = CorrelationFactory::new(true);
        let mut target = factory.create_info("A.java", 1, 0, 1);
        let other = factory.create_info("B.java", 2, 0, 1);

        target.add_additional_ancestors(&[other.clone(), other.clone()]);
        assert_eq!(target.additional_ancestors().len(), 1);
    }

    #[test]
    fn test_appending_does_not_affect_shared_copies() {
        let mut factory = CorrelationFactory::new(true);
        let original = factory.create_info("A.java", 1, 0, 1);
        let mut copy = original.clone();
        copy.add_correlation(factory.by_method("A.run()V"));

        assert!(original.primary_correlation(Axis::Method).is_none());
        assert!(copy.primary_correlation(Axis::Method).is_some());
    }

    #[test]
    fn test_unknown_info() {
        let info = SourceInfo::unknown();
        assert!(info.origin().is_unknown());
        assert_eq!(info.to_string(), "Unknown(0)");
    }
}
