use crate::js::source_gen::SourceRangeMap;
use crate::source_info::Axis;
use serde::{Deserialize, Serialize};

/// A source map builder following the Source Map v3 specification
/// https://sourcemaps.info/spec.html
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    file: Option<String>,
    source_root: Option<String>,
    sources: Vec<String>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
}

#[derive(Debug, Clone)]
struct Mapping {
    generated_line: usize,
    generated_column: usize,
    source_index: usize,
    source_line: usize,
    source_column: usize,
    name_index: Option<usize>,
}

/// The JSON structure for source maps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&mut self, file: impl Into<String>) {
        self.file = Some(file.into());
    }

    pub fn set_source_root(&mut self, source_root: impl Into<String>) {
        self.source_root = Some(source_root.into());
    }

    /// Add a source file and return its index
    pub fn add_source(&mut self, source_file: &str) -> usize {
        if let Some(idx) = self.sources.iter().position(|s| s == source_file) {
            idx
        } else {
            self.sources.push(source_file.to_string());
            self.sources.len() - 1
        }
    }

    fn add_name(&mut self, name: &str) -> usize {
        if let Some(idx) = self.names.iter().position(|existing| existing == name) {
            idx
        } else {
            self.names.push(name.to_string());
            self.names.len() - 1
        }
    }

    /// Map a generated position to a zero-based source position.
    /// Mappings must be added in generated order.
    pub fn add_mapping(
        &mut self,
        generated: (usize, usize),
        source_file: &str,
        source: (usize, usize),
        name: Option<&str>,
    ) {
        let source_index = self.add_source(source_file);
        let name_index = name.map(|n| self.add_name(n));
        self.mappings.push(Mapping {
            generated_line: generated.0,
            generated_column: generated.1,
            source_index,
            source_line: source.0,
            source_column: source.1,
            name_index,
        });
    }

    /// One mapping per recorded range whose origin is known. Range starts
    /// are emitted in increasing order, which keeps the mappings sorted.
    pub fn from_ranges(ranges: &SourceRangeMap) -> Self {
        let mut builder = Self::new();
        for range in ranges.iter() {
            let origin = range.info.origin();
            if origin.is_unknown() {
                continue;
            }
            let name = range
                .info
                .primary_correlation(Axis::Method)
                .or_else(|| range.info.primary_correlation(Axis::Function))
                .map(|c| c.ident.clone());
            builder.add_mapping(
                (range.line, range.column),
                &origin.file,
                (origin.start_line.saturating_sub(1) as usize, 0),
                name.as_deref(),
            );
        }
        builder
    }

    pub fn build(self) -> SourceMap {
        let mappings = self.encode_mappings();
        SourceMap {
            version: 3,
            file: self.file,
            source_root: self.source_root,
            sources: self.sources,
            names: self.names,
            mappings,
        }
    }

    fn encode_mappings(&self) -> String {
        let mut result = String::new();
        let mut prev_generated_line = 0;
        let mut prev_generated_col = 0;
        let mut prev_source_index = 0;
        let mut prev_source_line = 0;
        let mut prev_source_col = 0;
        let mut prev_name_index = 0;
        let mut line_has_segment = false;

        for mapping in &self.mappings {
            while prev_generated_line < mapping.generated_line {
                result.push(';');
                prev_generated_line += 1;
                prev_generated_col = 0;
                line_has_segment = false;
            }
            if line_has_segment {
                result.push(',');
            }
            line_has_segment = true;

            // [generated_col, source_index, source_line, source_col, name_index], all deltas
            result.push_str(&encode_vlq(mapping.generated_column as i64 - prev_generated_col as i64));
            prev_generated_col = mapping.generated_column;

            result.push_str(&encode_vlq(mapping.source_index as i64 - prev_source_index as i64));
            prev_source_index = mapping.source_index;

            result.push_str(&encode_vlq(mapping.source_line as i64 - prev_source_line as i64));
            prev_source_line = mapping.source_line;

            result.push_str(&encode_vlq(mapping.source_column as i64 - prev_source_col as i64));
            prev_source_col = mapping.source_column;

            if let Some(name_idx) = mapping.name_index {
                result.push_str(&encode_vlq(name_idx as i64 - prev_name_index as i64));
                prev_name_index = name_idx;
            }
        }

        result
    }
}

/// Encode a single value as Base64 VLQ
pub fn encode_vlq(value: i64) -> String {
    const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut vlq: u64 = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        (value as u64) << 1
    };

    let mut result = String::new();
    loop {
        let mut digit = (vlq & 0x1F) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0x20;
        }
        result.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
    result
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Inline data URI form
    pub fn to_data_uri(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, json.as_bytes());
        Ok(format!("data:application/json;charset=utf-8;base64,{}", encoded))
    }

    /// Trailing `//# sourceMappingURL=` comment with the map inlined
    pub fn to_comment(&self) -> Result<String, serde_json::Error> {
        let data_uri = self.to_data_uri()?;
        Ok(format!("//# sourceMappingURL={}", data_uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::ast::{JsExpression, JsProgram, JsStatement};
    use crate::js::source_gen::{JsSourceGenerator, TextOutput};
    use crate::source_info::{CorrelationFactory, SourceInfo};

    #[test]
    fn test_vlq_encoding() {
        assert_eq!(encode_vlq(0), "A");
        assert_eq!(encode_vlq(1), "C");
        assert_eq!(encode_vlq(-1), "D");
        assert_eq!(encode_vlq(15), "e");
        assert_eq!(encode_vlq(-15), "f");
        assert_eq!(encode_vlq(16), "gB");
        assert_eq!(encode_vlq(-16), "hB");
        assert_eq!(encode_vlq(123), "2H");
    }

    #[test]
    fn test_segments_and_lines() {
        let mut builder = SourceMapBuilder::new();
        builder.set_file("app.js");
        builder.add_mapping((0, 0), "Main.java", (0, 0), Some("main"));
        builder.add_mapping((0, 4), "Main.java", (1, 0), None);
        builder.add_mapping((2, 0), "Util.java", (0, 0), Some("main"));
        let map = builder.build();

        assert_eq!(map.version, 3);
        assert_eq!(map.sources, vec!["Main.java", "Util.java"]);
        assert_eq!(map.names, vec!["main"]);
        assert_eq!(map.mappings, "AAAAA,IACA;;ACDAA");
    }

    #[test]
    fn test_from_ranges_skips_unknown_origins() {
        let mut factory = CorrelationFactory::new(true);
        let known = factory.create_info("Main.java", 3, 10, 20);

        let mut program = JsProgram::new();
        let a = program.fresh_name(program.top_scope, "a", "a");
        program.global_block.push(JsStatement::var(SourceInfo::unknown(), a, None));
        program.global_block.push(
            JsExpression::assign(
                known.clone(),
                JsExpression::name_ref(known.clone(), a),
                JsExpression::number(known.clone(), 1.0),
            )
            .make_stmt(),
        );
        let generated = JsSourceGenerator::new(&program, TextOutput::Minified)
            .with_ranges(true)
            .generate();
        let map = SourceMapBuilder::from_ranges(&generated.ranges.unwrap()).build();

        assert_eq!(map.sources, vec!["Main.java"]);
        assert_eq!(map.mappings, ";AAEA");
        let json = map.to_json().unwrap();
        assert!(json.contains("\"version\": 3"));
        assert!(map.to_comment().unwrap().starts_with("//# sourceMappingURL=data:application/json"));
    }
}
