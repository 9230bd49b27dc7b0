//! `String` and `String.prototype`.
//!
//! Positions and lengths are in UTF-16 code units, so the helpers work on
//! `Vec<u16>` and convert back at the end.

use super::{arg, constructor, methods, relative_index};
use crate::sandbox::EvalResult;
use crate::sandbox::interpreter::{ErrorKind, Interpreter};
use crate::sandbox::operators::to_uint32;
use crate::sandbox::value::Value;
use crate::syntax::number::is_js_whitespace;
use std::cmp::Ordering;
use std::rc::Rc;

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let prototype = interpreter.realm.string_prototype.clone();
    let string = constructor(interpreter, "String", 1, call, None, &prototype)?;
    methods(interpreter, &string, &[("fromCharCode", 1, from_char_code)])?;
    methods(
        interpreter,
        &prototype,
        &[
            ("charAt", 1, char_at),
            ("charCodeAt", 1, char_code_at),
            ("codePointAt", 1, code_point_at),
            ("at", 1, at),
            ("indexOf", 1, index_of),
            ("lastIndexOf", 1, last_index_of),
            ("includes", 1, includes),
            ("startsWith", 1, starts_with),
            ("endsWith", 1, ends_with),
            ("slice", 2, slice),
            ("substring", 2, substring),
            ("substr", 2, substr),
            ("toUpperCase", 0, to_upper_case),
            ("toLowerCase", 0, to_lower_case),
            ("trim", 0, trim),
            ("trimStart", 0, trim_start),
            ("trimEnd", 0, trim_end),
            ("padStart", 1, pad_start),
            ("padEnd", 1, pad_end),
            ("repeat", 1, repeat),
            ("split", 2, split),
            ("replace", 2, replace),
            ("replaceAll", 2, replace_all),
            ("concat", 1, concat),
            ("localeCompare", 1, locale_compare),
            ("toString", 0, value_of),
            ("valueOf", 0, value_of),
        ],
    )
}

fn call(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    match args.first() {
        None => Ok(Value::string("")),
        Some(value) => Ok(Value::String(interpreter.to_string(value)?)),
    }
}

fn from_char_code(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut units = Vec::with_capacity(args.len());
    for value in args {
        let code = interpreter.to_number(value)?;
        units.push((to_uint32(code) & 0xFFFF) as u16);
    }
    Ok(from_units(&units))
}

/// `this` converted to a string; `null` and `undefined` are rejected.
fn this_text(interpreter: &mut Interpreter, this: &Value, method: &str) -> EvalResult<Rc<str>> {
    if this.is_nullish() {
        return Err(interpreter.type_error(format!(
            "String.prototype.{method} called on null or undefined"
        )));
    }
    interpreter.to_string(this)
}

fn this_units(interpreter: &mut Interpreter, this: &Value, method: &str) -> EvalResult<Vec<u16>> {
    Ok(this_text(interpreter, this, method)?.encode_utf16().collect())
}

fn arg_units(interpreter: &mut Interpreter, args: &[Value], index: usize) -> EvalResult<Vec<u16>> {
    Ok(interpreter.to_string(&arg(args, index))?.encode_utf16().collect())
}

fn from_units(units: &[u16]) -> Value {
    Value::string(String::from_utf16_lossy(units))
}

/// First occurrence of `needle` at or after `from`.
fn find(interpreter: &Interpreter, haystack: &[u16], needle: &[u16], from: usize) -> EvalResult<Option<usize>> {
    if from > haystack.len() {
        return Ok(None);
    }
    if needle.is_empty() {
        return Ok(Some(from));
    }
    let Some(last) = haystack.len().checked_sub(needle.len()) else {
        return Ok(None);
    };
    for start in from..=last {
        interpreter.tick()?;
        if haystack[start..start + needle.len()] == *needle {
            return Ok(Some(start));
        }
    }
    Ok(None)
}

/// Last occurrence of `needle` starting at or before `from`.
fn rfind(interpreter: &Interpreter, haystack: &[u16], needle: &[u16], from: usize) -> EvalResult<Option<usize>> {
    let Some(last) = haystack.len().checked_sub(needle.len()) else {
        return Ok(None);
    };
    for start in (0..=from.min(last)).rev() {
        interpreter.tick()?;
        if haystack[start..start + needle.len()] == *needle {
            return Ok(Some(start));
        }
    }
    Ok(None)
}

/// Integer argument clamped into `0..=length`.
fn clamped(interpreter: &mut Interpreter, value: Option<&Value>, default: f64, length: usize) -> EvalResult<usize> {
    let position = interpreter.to_integer(value, default)?;
    Ok(position.clamp(0.0, length as f64) as usize)
}

fn char_at(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "charAt")?;
    let position = interpreter.to_integer(args.first(), 0.0)?;
    if position < 0.0 || position >= units.len() as f64 {
        return Ok(Value::string(""));
    }
    let index = position as usize;
    Ok(from_units(&units[index..=index]))
}

fn char_code_at(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "charCodeAt")?;
    let position = interpreter.to_integer(args.first(), 0.0)?;
    if position < 0.0 || position >= units.len() as f64 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(f64::from(units[position as usize])))
}

fn code_point_at(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "codePointAt")?;
    let position = interpreter.to_integer(args.first(), 0.0)?;
    if position < 0.0 || position >= units.len() as f64 {
        return Ok(Value::Undefined);
    }
    let index = position as usize;
    let code = match char::decode_utf16(units[index..].iter().copied()).next() {
        Some(Ok(ch)) => u32::from(ch),
        _ => u32::from(units[index]),
    };
    Ok(Value::Number(f64::from(code)))
}

fn at(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "at")?;
    let length = units.len() as f64;
    let position = interpreter.to_integer(args.first(), 0.0)?;
    let index = if position < 0.0 { length + position } else { position };
    if index < 0.0 || index >= length {
        return Ok(Value::Undefined);
    }
    let index = index as usize;
    Ok(from_units(&units[index..=index]))
}

fn index_of(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "indexOf")?;
    let needle = arg_units(interpreter, args, 0)?;
    let from = clamped(interpreter, args.get(1), 0.0, units.len())?;
    Ok(position_value(find(interpreter, &units, &needle, from)?))
}

fn last_index_of(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "lastIndexOf")?;
    let needle = arg_units(interpreter, args, 0)?;
    let from = match args.get(1) {
        None | Some(Value::Undefined) => units.len(),
        Some(value) => {
            let number = interpreter.to_number(value)?;
            if number.is_nan() {
                units.len()
            } else {
                number.trunc().clamp(0.0, units.len() as f64) as usize
            }
        }
    };
    Ok(position_value(rfind(interpreter, &units, &needle, from)?))
}

fn position_value(position: Option<usize>) -> Value {
    Value::Number(position.map_or(-1.0, |index| index as f64))
}

fn includes(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "includes")?;
    let needle = arg_units(interpreter, args, 0)?;
    let from = clamped(interpreter, args.get(1), 0.0, units.len())?;
    Ok(Value::Boolean(find(interpreter, &units, &needle, from)?.is_some()))
}

fn starts_with(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "startsWith")?;
    let needle = arg_units(interpreter, args, 0)?;
    let from = clamped(interpreter, args.get(1), 0.0, units.len())?;
    Ok(Value::Boolean(units[from..].starts_with(&needle)))
}

fn ends_with(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "endsWith")?;
    let needle = arg_units(interpreter, args, 0)?;
    let end = clamped(interpreter, args.get(1), units.len() as f64, units.len())?;
    Ok(Value::Boolean(units[..end].ends_with(&needle)))
}

fn slice(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "slice")?;
    let length = units.len();
    let start = interpreter.to_integer(args.first(), 0.0)?;
    let end = interpreter.to_integer(args.get(1), length as f64)?;
    let start = relative_index(start, length);
    let end = relative_index(end, length).max(start);
    Ok(from_units(&units[start..end]))
}

fn substring(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "substring")?;
    let length = units.len();
    let start = clamped(interpreter, args.first(), 0.0, length)?;
    let end = clamped(interpreter, args.get(1), length as f64, length)?;
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Ok(from_units(&units[start..end]))
}

fn substr(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "substr")?;
    let length = units.len();
    let start = interpreter.to_integer(args.first(), 0.0)?;
    let start = relative_index(start, length);
    let count = clamped(interpreter, args.get(1), length as f64, length - start)?;
    Ok(from_units(&units[start..start + count]))
}

fn to_upper_case(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let text = this_text(interpreter, this, "toUpperCase")?;
    Ok(Value::string(text.to_uppercase()))
}

fn to_lower_case(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let text = this_text(interpreter, this, "toLowerCase")?;
    Ok(Value::string(text.to_lowercase()))
}

fn trim(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let text = this_text(interpreter, this, "trim")?;
    Ok(Value::string(text.trim_matches(is_js_whitespace)))
}

fn trim_start(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let text = this_text(interpreter, this, "trimStart")?;
    Ok(Value::string(text.trim_start_matches(is_js_whitespace)))
}

fn trim_end(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let text = this_text(interpreter, this, "trimEnd")?;
    Ok(Value::string(text.trim_end_matches(is_js_whitespace)))
}

fn pad(interpreter: &mut Interpreter, this: &Value, args: &[Value], at_start: bool) -> EvalResult<Value> {
    let method = if at_start { "padStart" } else { "padEnd" };
    let units = this_units(interpreter, this, method)?;
    let target = interpreter.to_integer(args.first(), 0.0)?;
    let filler: Vec<u16> = match args.get(1) {
        None | Some(Value::Undefined) => vec![u16::from(b' ')],
        Some(value) => interpreter.to_string(value)?.encode_utf16().collect(),
    };
    if target <= units.len() as f64 || filler.is_empty() {
        return Ok(from_units(&units));
    }
    interpreter.check_string_length(target as usize)?;
    let missing = target as usize - units.len();
    let padding: Vec<u16> = filler.iter().copied().cycle().take(missing).collect();
    let padded = if at_start {
        [padding, units].concat()
    } else {
        [units, padding].concat()
    };
    Ok(from_units(&padded))
}

fn pad_start(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    pad(interpreter, this, args, true)
}

fn pad_end(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    pad(interpreter, this, args, false)
}

fn repeat(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(interpreter, this, "repeat")?;
    let count = interpreter.to_integer(args.first(), 0.0)?;
    if count < 0.0 || count.is_infinite() {
        let shown = crate::syntax::number::format_number(count);
        return Err(interpreter.throw(ErrorKind::Range, format!("Invalid count value: {shown}")));
    }
    if text.is_empty() || count == 0.0 {
        return Ok(Value::string(""));
    }
    interpreter.check_string_length((text.len() as f64 * count).min(usize::MAX as f64) as usize)?;
    Ok(Value::string(text.repeat(count as usize)))
}

fn split(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let units = this_units(interpreter, this, "split")?;
    let limit = match args.get(1) {
        None | Some(Value::Undefined) => u32::MAX as usize,
        Some(value) => to_uint32(interpreter.to_number(value)?) as usize,
    };
    let separator = match args.first() {
        None | Some(Value::Undefined) => None,
        Some(value) => Some(interpreter.to_string(value)?.encode_utf16().collect::<Vec<u16>>()),
    };
    let mut parts: Vec<Value> = Vec::new();
    match separator {
        None => parts.push(from_units(&units)),
        Some(separator) if separator.is_empty() => {
            for unit in units.iter().take(limit) {
                interpreter.tick()?;
                parts.push(from_units(std::slice::from_ref(unit)));
            }
        }
        Some(separator) => {
            let mut start = 0;
            while let Some(found) = find(interpreter, &units, &separator, start)? {
                parts.push(from_units(&units[start..found]));
                start = found + separator.len();
            }
            parts.push(from_units(&units[start..]));
        }
    }
    parts.truncate(limit);
    Ok(Value::Object(interpreter.new_array(parts)?))
}

/// Expand `$$`, `$&`, `` $` `` and `$'` in a replacement template.
fn expand_template(template: &[u16], units: &[u16], start: usize, end: usize) -> Vec<u16> {
    let mut out = Vec::with_capacity(template.len());
    let mut index = 0;
    while index < template.len() {
        let unit = template[index];
        let next = template.get(index + 1).copied();
        if unit == u16::from(b'$') {
            let expansion: Option<&[u16]> = match next.and_then(|next| u8::try_from(next).ok()) {
                Some(b'$') => Some(&template[index..=index]),
                Some(b'&') => Some(&units[start..end]),
                Some(b'`') => Some(&units[..start]),
                Some(b'\'') => Some(&units[end..]),
                _ => None,
            };
            if let Some(expansion) = expansion {
                out.extend_from_slice(expansion);
                index += 2;
                continue;
            }
        }
        out.push(unit);
        index += 1;
    }
    out
}

fn replace_matches(interpreter: &mut Interpreter, this: &Value, args: &[Value], all: bool) -> EvalResult<Value> {
    let method = if all { "replaceAll" } else { "replace" };
    let units = this_units(interpreter, this, method)?;
    let pattern = arg_units(interpreter, args, 0)?;
    let replacement = arg(args, 1);
    let template = if replacement.is_callable() {
        None
    } else {
        Some(interpreter.to_string(&replacement)?.encode_utf16().collect::<Vec<u16>>())
    };

    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(found) = find(interpreter, &units, &pattern, from)? {
        positions.push(found);
        if !all {
            break;
        }
        from = found + pattern.len().max(1);
    }

    let subject = from_units(&units);
    let mut out = Vec::with_capacity(units.len());
    let mut last = 0;
    for start in positions {
        let end = start + pattern.len();
        out.extend_from_slice(&units[last..start]);
        match &template {
            Some(template) => out.extend(expand_template(template, &units, start, end)),
            None => {
                let matched = from_units(&units[start..end]);
                let result = interpreter.call(
                    &replacement,
                    &Value::Undefined,
                    &[matched, Value::from(start), subject.clone()],
                )?;
                out.extend(interpreter.to_string(&result)?.encode_utf16());
            }
        }
        interpreter.check_string_length(out.len())?;
        last = end;
    }
    out.extend_from_slice(&units[last..]);
    Ok(from_units(&out))
}

fn replace(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    replace_matches(interpreter, this, args, false)
}

fn replace_all(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    replace_matches(interpreter, this, args, true)
}

fn concat(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut text = this_text(interpreter, this, "concat")?.to_string();
    for value in args {
        text.push_str(&interpreter.to_string(value)?);
        interpreter.check_string_length(text.len())?;
    }
    Ok(Value::string(text))
}

fn locale_compare(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(interpreter, this, "localeCompare")?;
    let other = interpreter.to_string(&arg(args, 0))?;
    let ordering = match text.to_lowercase().cmp(&other.to_lowercase()) {
        Ordering::Equal => text.cmp(&other).reverse(),
        ordering => ordering,
    };
    Ok(Value::Number(match ordering {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }))
}

fn value_of(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    match this {
        Value::String(_) => Ok(this.clone()),
        _ => Err(interpreter.type_error("String.prototype.valueOf requires that 'this' be a String")),
    }
}

#[cfg(test)]
mod tests {
    use super::expand_template;
    use crate::sandbox::{ExecutionLimits, SandboxExecutor};
    use crate::syntax::parse_program;

    fn logs(src: &str) -> Vec<String> {
        let program = parse_program(src).unwrap();
        let result = SandboxExecutor::new().execute(&program, &ExecutionLimits::default());
        assert!(result.success, "{:?}", result.error);
        result.logs
    }

    fn units(text: &str) -> Vec<u16> {
        text.encode_utf16().collect()
    }

    #[test]
    fn replacement_patterns() {
        let subject = units("abc");
        let expanded = expand_template(&units("[$&|$`|$'|$$|$x]"), &subject, 1, 2);
        assert_eq!(String::from_utf16_lossy(&expanded), "[b|a|c|$|$x]");
    }

    #[test]
    fn searching_and_slicing() {
        assert_eq!(
            logs(
                "const s = 'hello world';
                 print(s.indexOf('o'), s.lastIndexOf('o'), s.includes('wor'), s.startsWith('world', 6));
                 print(s.slice(-5), s.substring(5, 0), s.substr(1, 3), s.at(-1), s.charAt(99) === '');
                 print('😀x'.length, '😀x'.codePointAt(0), '😀x'.charCodeAt(2));"
            ),
            ["4 7 true true", "world hello ell d true", "3 128512 120"]
        );
    }

    #[test]
    fn transforming() {
        assert_eq!(
            logs(
                "print('a,b,,c'.split(','), 'abc'.split(''), 'abc'.split(), 'a-b-c'.split('-', 2));
                 print('  x '.trim() + '|', '5'.padStart(3, '0'), 'ab'.padEnd(5, 'xy'), 'ab'.repeat(3));
                 print('a.b.c'.replace('.', '!'), 'a.b.c'.replaceAll('.', (m, i) => i));
                 print('Straße'.toUpperCase(), 'a'.localeCompare('b'), String(null), String.fromCharCode(72, 105));
                 try { 'x'.repeat(-1); } catch (e) { print(e.name, e.message); }"
            ),
            [
                "[\"a\",\"b\",\"\",\"c\"] [\"a\",\"b\",\"c\"] [\"abc\"] [\"a\",\"b\"]",
                "x| 005 abxyx ababab",
                "a!b.c a1b3c",
                "STRASSE -1 null Hi",
                "RangeError Invalid count value: -1",
            ]
        );
    }
}
