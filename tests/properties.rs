//! Properties of the parse → transform → execute chain over generated input.

use jsbox::pipeline::Pipeline;
use jsbox::syntax::{codegen, parse_program};
use jsbox::transform::{TransformOptions, transform};
use proptest::prelude::*;

fn arithmetic() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        Just("x".to_string()),
        Just("'s'".to_string()),
        Just("true".to_string()),
    ];
    leaf.prop_recursive(4, 32, 2, |inner| {
        (
            inner.clone(),
            prop::sample::select(vec!["+", "-", "*", "/", "%", "<", "===", "&&", "??"]),
            inner,
        )
            .prop_map(|(left, op, right)| format!("({left} {op} {right})"))
    })
}

fn program() -> impl Strategy<Value = String> {
    prop::collection::vec(arithmetic(), 1..4).prop_map(|exprs| {
        let body: String = exprs
            .iter()
            .map(|expr| format!("console.log({expr});\n"))
            .collect();
        format!("let x = 7;\n{body}")
    })
}

proptest! {
    #[test]
    fn parser_never_panics(source in "\\PC{0,80}") {
        let _ = parse_program(&source);
    }

    #[test]
    fn transform_is_idempotent(source in program()) {
        let parsed = parse_program(&source).unwrap();
        let options = TransformOptions::default();
        let once = transform(&parsed, &options).unwrap();
        let twice = transform(&once.program, &options).unwrap();
        prop_assert_eq!(&once.code, &twice.code);
        prop_assert!(!twice.changed);
    }

    #[test]
    fn generated_code_reparses_to_itself(source in program()) {
        let parsed = parse_program(&source).unwrap();
        let printed = codegen::generate(&parsed);
        let reparsed = parse_program(&printed).unwrap();
        prop_assert_eq!(codegen::generate(&reparsed), printed);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn execution_is_deterministic(source in program()) {
        let pipeline = Pipeline::default();
        let first = serde_json::to_value(pipeline.submit(&source)).unwrap();
        let second = serde_json::to_value(pipeline.submit(&source)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn folding_preserves_output(source in program()) {
        let folded = Pipeline::default().submit(&source);
        let config = jsbox::PipelineConfig {
            transform: TransformOptions { fold_constants: false, ..TransformOptions::default() },
            ..jsbox::PipelineConfig::default()
        };
        let unfolded = Pipeline::new(config).submit(&source);
        prop_assert_eq!(
            &folded.report().unwrap().logs,
            &unfolded.report().unwrap().logs
        );
    }
}
