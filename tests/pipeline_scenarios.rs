//! End-to-end submissions through `Pipeline::submit`.

use jsbox::pipeline::{Pipeline, PipelineConfig, PipelineResponse};
use jsbox::transform::TransformOptions;
use serde_json::Value;

fn submit(source: &str) -> PipelineResponse {
    Pipeline::default().submit(source)
}

fn logs(source: &str) -> Vec<String> {
    let response = submit(source);
    let report = response.report().expect("completed response");
    assert!(report.execution_success, "{:?}", report.error);
    report.logs.clone()
}

#[test]
fn print_and_console_are_captured_in_order() {
    assert_eq!(
        logs("print('hi'); console.log('a', 1, true, null); console.error({x: [1, 2]}); console.warn(undefined);"),
        ["hi", "a 1 true null", "{\"x\":[1,2]}", "undefined"]
    );
}

#[test]
fn uncaught_errors_are_program_output() {
    let response = submit("print('start'); throw new Error(\"boom\");");
    let report = response.report().unwrap();
    assert!(report.execution_success);
    assert_eq!(report.logs, ["start", "Error: boom"]);
}

#[test]
fn host_capabilities_are_absent() {
    for source in ["require('fs')", "process.exit()", "fetch('http://example.com')"] {
        let lines = logs(source);
        assert_eq!(lines.len(), 1, "{source}");
        assert!(lines[0].ends_with("is not defined"), "{source}: {lines:?}");
    }
    assert_eq!(
        logs("print(typeof require, typeof process, typeof globalThis, typeof setTimeout);"),
        ["undefined undefined undefined undefined"]
    );
}

#[test]
fn unbalanced_braces_fail_before_execution() {
    let response = submit("function f() { print('never');");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], false);
    let message = json["message"].as_str().unwrap();
    assert!(message.starts_with("Parsing error: "), "{message}");
    assert!(message.contains("(line 1, column"), "{message}");
    assert!(json.get("result").is_none());
    assert_eq!(json["diagnostic"]["line"], 1);
}

#[test]
fn reserved_hook_is_a_transform_error() {
    let response = submit("let __capture = 1;");
    let message = response.message().unwrap();
    assert!(message.starts_with("Transformation error: "), "{message}");
}

#[test]
fn completed_response_carries_ast_and_rewritten_code() {
    let response = submit("console.log(2 * 3); debugger;");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["result"]["logs"], serde_json::json!(["6"]));

    let code = json["transformedCode"].as_str().unwrap();
    assert!(code.contains("__capture('log', 6)"), "{code}");
    assert!(!code.contains("debugger"), "{code}");

    let ast: Value = serde_json::from_str(json["ast"].as_str().unwrap()).unwrap();
    assert!(ast.is_object());
}

#[test]
fn transformation_can_be_disabled() {
    let config = PipelineConfig {
        transform: TransformOptions::disabled(),
        include_ast: false,
        ..PipelineConfig::default()
    };
    let response = Pipeline::new(config).submit("console.log(1 + 1);");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["result"]["logs"], serde_json::json!(["2"]));
    assert!(json["transformedCode"].as_str().unwrap().contains("console.log(1 + 1)"));
    assert!(json.get("ast").is_none());
}

#[test]
fn programs_that_bind_console_keep_their_own() {
    assert_eq!(
        logs("const console = { log(x) { print('custom ' + x); } }; console.log(5);"),
        ["custom 5"]
    );
}

#[test]
fn language_tour() {
    assert_eq!(
        logs(
            "const { a, b: [first, ...others] = [], ...rest } = { a: 1, b: [2, 3, 4], c: 5, d: 6 };
             print(a, first, others, rest);
             const square = n => n ** 2;
             print([1, 2, 3].map(square).reduce((x, y) => x + y, 0));
             print(`template ${a + first} ${'nested'.toUpperCase()}`);
             let total = 0;
             for (const n of [1, 2, 3, 4]) { if (n === 3) continue; total += n; }
             print(total, 7 % 3, -7 % 3, 2 ** -1, 0.1 + 0.2);
             print(typeof null, typeof (() => 1), [] + [], [1] == 1, null ?? 'dflt', undefined?.x);
             switch (3) { case 1: print('one'); case 3: print('three'); case 4: print('four'); break; default: print('d'); }"
        ),
        [
            "1 2 [3,4] {\"c\":5,\"d\":6}",
            "14",
            "template 3 NESTED",
            "7 1 -1 0.5 0.30000000000000004",
            "object function  true dflt undefined",
            "three",
            "four",
        ]
    );
}

#[test]
fn identical_input_gives_identical_output() {
    let source = "const xs = []; for (let i = 0; i < 5; i++) xs.push(Math.floor(Math.random() * 100)); print(xs);";
    assert_eq!(logs(source), logs(source));
}

#[test]
fn very_long_operator_chains_are_rejected_not_fatal() {
    let source = format!("let x = 1{};", " + x".repeat(50_000));
    let response = submit(&source);
    let message = response.message().unwrap();
    assert!(message.starts_with("Parsing error: Expression is nested too deeply"), "{message}");

    let source = format!("let x = 1; print(x{});", " + x".repeat(800));
    assert_eq!(logs(&source), ["801"]);
}
