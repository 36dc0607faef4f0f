use indoc::indoc;
use jjs_core::config::{CliOverrides, CompilerConfig, CompilerOptions, JsOutputOption};
use jjs_core::CompilationError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_options_yaml() {
    let yaml = serde_yaml::to_string(&CompilerOptions::default()).unwrap();
    insta::assert_snapshot!(yaml, @r###"
    aggressivelyOptimize: true
    enableAssertions: false
    output: OBFUSCATED
    validateOnly: false
    sourceMap: false
    symbolMap: false
    compileReport: false
    trackSourceInfo: false
    castCheckingDisabled: false
    maxFixpointIterations: 100
    prettyNameDenylist:
      exact: []
      suffixes: []
    "###);
}

#[test]
fn test_from_file_picks_format_by_extension() {
    let temp_dir = TempDir::new().unwrap();
    let yaml_path = temp_dir.path().join("jjs.yaml");
    fs::write(
        &yaml_path,
        indoc! {"
            compilerOptions:
              output: PRETTY
              sourceMap: true
            module:
              name: shop
              entryPoints: [shop.Main, shop.Admin]
        "},
    )
    .unwrap();
    let json_path = temp_dir.path().join("jjs.JSON");
    fs::write(
        &json_path,
        indoc! {r#"
            {
              "compilerOptions": { "enableAssertions": true, "maxFixpointIterations": 7 },
              "permutations": [{ "rebinds": { "a.Api": "a.ApiImpl" } }]
            }
        "#},
    )
    .unwrap();

    let yaml = CompilerConfig::from_file(&yaml_path).unwrap();
    assert_eq!(yaml.compiler_options.output, JsOutputOption::Pretty);
    assert!(yaml.compiler_options.source_map);
    assert!(yaml.compiler_options.needs_tracking());
    assert_eq!(yaml.module.name, "shop");
    assert_eq!(yaml.module.entry_points, vec!["shop.Main", "shop.Admin"]);

    let json = CompilerConfig::from_file(&json_path).unwrap();
    assert!(json.compiler_options.enable_assertions);
    assert!(json.compiler_options.aggressively_optimize);
    assert_eq!(json.compiler_options.max_fixpoint_iterations, 7);
    assert_eq!(json.effective_permutations()[0].rebinds["a.Api"], "a.ApiImpl");
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = CompilerConfig::from_file(&temp_dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, CompilationError::Io(_)));
    assert!(!err.is_user_error());
}

#[test]
fn test_unknown_field_type_is_config_error() {
    let err = CompilerConfig::from_yaml(indoc! {"
        compilerOptions:
          maxFixpointIterations: lots
    "})
    .unwrap_err();
    assert!(matches!(err, CompilationError::Config(_)));
}

#[test]
fn test_permutation_ids_follow_declaration_order() {
    let config = CompilerConfig::from_yaml(indoc! {"
        permutations:
          - id: 41
            rebinds: { a.Api: a.Webkit }
          - id: 7
            rebinds: { a.Api: a.Gecko }
    "})
    .unwrap();
    let ids: Vec<usize> = config.effective_permutations().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn test_overrides_only_touch_set_values() {
    let mut config = CompilerConfig::from_yaml(indoc! {"
        compilerOptions:
          output: DETAILED
          symbolMap: true
        module:
          entryPoints: [app.Main]
    "})
    .unwrap();
    config.merge(&CliOverrides {
        aggressively_optimize: Some(false),
        compile_report: Some(true),
        ..CliOverrides::default()
    });

    let options = &config.compiler_options;
    assert!(!options.aggressively_optimize);
    assert!(options.compile_report);
    assert!(options.symbol_map);
    assert_eq!(options.output, JsOutputOption::Detailed);
    assert_eq!(config.module.entry_points, vec!["app.Main"]);
}

#[test]
fn test_config_round_trips_through_yaml() {
    let config = CompilerConfig::from_yaml(indoc! {"
        compilerOptions:
          output: PRETTY
          prettyNameDenylist:
            exact: [debug]
        permutations:
          - rebinds: { a.Api: a.Webkit }
    "})
    .unwrap();
    let text = serde_yaml::to_string(&config).unwrap();
    assert_eq!(CompilerConfig::from_yaml(&text).unwrap(), config);
}
