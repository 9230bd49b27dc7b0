//! The `JSON` namespace.

use super::{arg, methods, namespace};
use crate::sandbox::EvalResult;
use crate::sandbox::format::JsonLayout;
use crate::sandbox::interpreter::Interpreter;
use crate::sandbox::value::Value;
use std::rc::Rc;

/// Longest indentation `JSON.stringify` honours.
const MAX_GAP: usize = 10;

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let json = namespace(interpreter, "JSON")?;
    methods(
        interpreter,
        &json,
        &[("stringify", 3, stringify), ("parse", 2, parse)],
    )
}

fn stringify(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut layout = JsonLayout::default();
    match arg(args, 1) {
        replacer if replacer.is_callable() => layout.replacer = Some(replacer),
        Value::Object(list) if list.borrow().is_array() => {
            let items = list.borrow().elements().cloned().unwrap_or_default();
            let mut keys: Vec<Rc<str>> = Vec::new();
            for item in items {
                if matches!(item, Value::String(_) | Value::Number(_)) {
                    let key = interpreter.to_property_key(&item)?;
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
            layout.keys = Some(keys);
        }
        _ => {}
    }
    layout.gap = match arg(args, 2) {
        Value::Number(width) if width >= 1.0 => " ".repeat((width as usize).min(MAX_GAP)),
        Value::String(text) => text.chars().take(MAX_GAP).collect(),
        _ => String::new(),
    };
    let text = interpreter.json_stringify(&arg(args, 0), &layout)?;
    Ok(text.map(Value::string).unwrap_or_default())
}

fn parse(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = interpreter.to_string(&arg(args, 0))?;
    interpreter.json_parse(&text)
}

#[cfg(test)]
mod tests {
    use crate::sandbox::{ExecutionLimits, SandboxExecutor};
    use crate::syntax::parse_program;

    fn logs(src: &str) -> Vec<String> {
        let program = parse_program(src).unwrap();
        let result = SandboxExecutor::new().execute(&program, &ExecutionLimits::default());
        assert!(result.success, "{:?}", result.error);
        result.logs
    }

    #[test]
    fn stringify_layouts() {
        assert_eq!(
            logs(
                "const value = {b: [1, 'x'], a: undefined, f() {}, n: NaN};
                 print(JSON.stringify(value));
                 print(JSON.stringify({a: 1, b: 2, c: 3}, ['c', 'a']));
                 print(JSON.stringify({a: 1, b: 'drop'}, (k, v) => typeof v === 'string' ? undefined : v));
                 print(JSON.stringify({a: [1]}, null, 2));
                 print(JSON.stringify(undefined) === undefined, JSON.stringify({toJSON() { return 'custom'; }}));"
            ),
            [
                "{\"b\":[1,\"x\"],\"n\":null}",
                "{\"c\":3,\"a\":1}",
                "{\"a\":1}",
                "{\n  \"a\": [\n    1\n  ]\n}",
                "true \"custom\"",
            ]
        );
    }

    #[test]
    fn parse_and_cycles() {
        assert_eq!(
            logs(
                "const parsed = JSON.parse('{\"x\": [1, {\"y\": null}], \"z\": \"s\"}');
                 print(parsed.x[1].y, parsed.z, parsed.x.length);
                 try { JSON.parse('{bad'); } catch (e) { print(e.name); }
                 const loop = {}; loop.self = loop;
                 try { JSON.stringify(loop); } catch (e) { print(e.message); }"
            ),
            ["null s 2", "SyntaxError", "Converting circular structure to JSON"]
        );
    }
}
