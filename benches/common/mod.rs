#![allow(dead_code)]
use std::fs;
use std::path::Path;

use livesource::ast::Program;
use livesource::parser;
use test_support::bench_cases;

/// `(case name, source)` for every bench-enabled program carrying `tag`.
pub fn workloads(tag: &str) -> Vec<(String, String)> {
    let cases = bench_cases(Path::new("tests/programs"), Some(tag))
        .unwrap_or_else(|err| panic!("load bench cases: {err:#}"));
    assert!(!cases.is_empty(), "no bench cases tagged '{tag}'");
    cases
        .into_iter()
        .map(|case| {
            let source = fs::read_to_string(&case.program_path)
                .unwrap_or_else(|err| panic!("read {}: {err}", case.program_path.display()));
            (case.name, source)
        })
        .collect()
}

pub fn load_program(label: &str, source: &str) -> Program {
    parser::parse(source).unwrap_or_else(|err| panic!("parse {label}: {err}"))
}
