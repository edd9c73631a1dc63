//! Integration tests for pipeline compilation
//!
//! These tests validate the compiler over user-facing JSON definitions:
//! - One definition fans out to one run per input file
//! - Repeated compilation is byte-for-byte deterministic
//! - Structural violations surface as distinct errors
//! - Per-file parameter overrides land on the right run

mod common;

use common::builders::{chain, test_registry};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tessera::ops::IMPORT_OP;
use tessera::pipeline::{PipelineCompiler, PipelineConfig, SettingsExt};

fn input_files(stems: &[&str]) -> Vec<PathBuf> {
    stems
        .iter()
        .map(|stem| PathBuf::from(format!("data/{stem}.xyz")))
        .collect()
}

#[test]
fn test_definition_fans_out_one_run_per_file() {
    let config = chain(&["downsample", "cluster", "save_session"]);
    let files = input_files(&["tomo_a", "tomo_b", "tomo_c"]);

    let runs = PipelineCompiler::compile(&config, &files, &test_registry()).unwrap();

    assert_eq!(runs.len(), 3);
    for (index, run) in runs.iter().enumerate() {
        assert_eq!(run.metadata.file_index, index);
        assert_eq!(run.metadata.total_files, 3);
        assert_eq!(run.metadata.pipeline_version, "2.0");
        let ops: Vec<&str> = run
            .operations
            .iter()
            .map(|o| o.operation_id.as_str())
            .collect();
        assert_eq!(ops, [IMPORT_OP, "downsample", "cluster", "save_session"]);
    }
    let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(ids, ["tomo_a", "tomo_b", "tomo_c"]);
}

#[test]
fn test_json_document_compiles_with_per_file_overrides() {
    let config = PipelineConfig::from_json(
        r#"{
            "version": "2.0",
            "nodes": [
                {"id": "load", "operation_id": "import_batch",
                 "settings": {"scale": 2.0,
                              "file_parameters": {"b.xyz": {"sampling_rate": 8.0}}}},
                {"id": "seg", "operation_id": "cluster", "inputs": ["load"],
                 "settings": {"cell_size": 1.5}},
                {"id": "keep", "operation_id": "cluster_select", "inputs": ["seg"],
                 "settings": {"lower_threshold": 100}},
                {"id": "save", "operation_id": "save_session", "inputs": ["keep"]}
            ]
        }"#,
    )
    .unwrap();

    let files = vec![PathBuf::from("a.xyz"), PathBuf::from("b.xyz")];
    let runs = PipelineCompiler::compile(&config, &files, &test_registry()).unwrap();

    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].input_params.scale, 2.0);
    assert_eq!(runs[0].input_params.sampling_rate, 1.0);
    assert_eq!(
        runs[1].input_params.sampling_rate, 8.0,
        "per-file override lands on b only"
    );
    assert_eq!(
        runs[0].operations[0].settings.get_str("input_file"),
        Some("a.xyz")
    );
    // Downstream steps stay byte-identical across the two runs.
    assert_eq!(
        serde_json::to_string(&runs[0].operations[1..]).unwrap(),
        serde_json::to_string(&runs[1].operations[1..]).unwrap()
    );
}

#[test]
fn test_repeated_compilation_is_byte_identical() {
    let config = chain(&["cluster", "cluster_select", "export_data"]);
    let files = input_files(&["x", "y"]);
    let registry = test_registry();

    let first = PipelineCompiler::compile(&config, &files, &registry).unwrap();
    let second = PipelineCompiler::compile(&config, &files, &registry).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_structural_violations_surface_distinct_errors() {
    // One document per rejection case. Each must produce its own message so
    // users can tell what is wrong from the CLI output alone.
    let bad_documents = [
        // empty graph
        r#"{"nodes": []}"#,
        // no root: every node is someone's input
        r#"{"nodes": [
            {"id": "a", "operation_id": "import_batch", "inputs": ["b"]},
            {"id": "b", "operation_id": "cluster", "inputs": ["a"]}]}"#,
        // root exists but is not an import
        r#"{"nodes": [{"id": "seg", "operation_id": "cluster"}]}"#,
        // two import roots
        r#"{"nodes": [
            {"id": "l1", "operation_id": "import_batch"},
            {"id": "l2", "operation_id": "import_batch"},
            {"id": "seg", "operation_id": "cluster", "inputs": ["l1", "l2"]}]}"#,
        // reference to a node that does not exist
        r#"{"nodes": [
            {"id": "load", "operation_id": "import_batch"},
            {"id": "seg", "operation_id": "cluster", "inputs": ["ghost"]}]}"#,
        // cycle behind the root
        r#"{"nodes": [
            {"id": "load", "operation_id": "import_batch"},
            {"id": "a", "operation_id": "cluster", "inputs": ["load", "b"]},
            {"id": "b", "operation_id": "downsample", "inputs": ["a"]}]}"#,
        // duplicate node id
        r#"{"nodes": [
            {"id": "load", "operation_id": "import_batch"},
            {"id": "load", "operation_id": "cluster"}]}"#,
        // operation the registry has never heard of
        r#"{"nodes": [
            {"id": "load", "operation_id": "import_batch"},
            {"id": "seg", "operation_id": "warp_drive", "inputs": ["load"]}]}"#,
    ];

    let registry = test_registry();
    let mut messages = HashSet::new();
    for document in bad_documents {
        let config = PipelineConfig::from_json(document).unwrap();
        let err = PipelineCompiler::compile(&config, &input_files(&["x"]), &registry)
            .expect_err("document should be rejected");
        assert!(
            messages.insert(err.to_string()),
            "duplicate error message: {err}"
        );
    }

    // The empty-batch rejection needs a valid graph and an empty file list.
    let err = PipelineCompiler::compile(&chain(&["cluster"]), &[], &registry).unwrap_err();
    assert!(messages.insert(err.to_string()));
    assert_eq!(messages.len(), bad_documents.len() + 1);
}

fn ops_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::collection::vec(
        prop_oneof![
            Just("cluster"),
            Just("downsample"),
            Just("sample"),
            Just("cluster_select"),
        ],
        0..6,
    )
}

fn stems_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-z][a-z0-9]{2,8}", 1..6)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn test_generated_chains_fan_out_per_file(ops in ops_strategy(), stems in stems_strategy()) {
        let config = chain(&ops);
        let files: Vec<PathBuf> = stems
            .iter()
            .map(|stem| PathBuf::from(format!("{stem}.xyz")))
            .collect();
        let registry = test_registry();

        let runs = PipelineCompiler::compile(&config, &files, &registry).unwrap();

        prop_assert_eq!(runs.len(), files.len());
        for (run, stem) in runs.iter().zip(&stems) {
            prop_assert_eq!(run.run_id.as_str(), stem.as_str());
            prop_assert_eq!(run.operations.len(), ops.len() + 1);
            prop_assert_eq!(run.operations[0].operation_id.as_str(), IMPORT_OP);
        }
    }

    #[test]
    fn test_generated_chains_compile_deterministically(
        ops in ops_strategy(),
        stems in stems_strategy(),
    ) {
        let config = chain(&ops);
        let files: Vec<PathBuf> = stems
            .iter()
            .map(|stem| PathBuf::from(format!("{stem}.xyz")))
            .collect();
        let registry = test_registry();

        let first = PipelineCompiler::compile(&config, &files, &registry).unwrap();
        let second = PipelineCompiler::compile(&config, &files, &registry).unwrap();

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
