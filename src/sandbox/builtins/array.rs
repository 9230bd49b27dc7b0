//! `Array` and `Array.prototype`.

use super::{arg, callback, constructor, methods, relative_index};
use crate::sandbox::interpreter::{ErrorKind, Interpreter};
use crate::sandbox::operators::{same_value_zero, strict_equals};
use crate::sandbox::value::{MAX_ARRAY_LENGTH, ObjectKind, ObjectRef, Value, lookup};
use crate::sandbox::EvalResult;
use std::cmp::Ordering;

/// Elements written between interrupt polls in `fill`.
const FILL_CHUNK: usize = 1 << 16;

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let prototype = interpreter.realm.array_prototype.clone();
    let array = constructor(interpreter, "Array", 1, call, Some(construct), &prototype)?;
    methods(
        interpreter,
        &array,
        &[("isArray", 1, is_array), ("from", 1, from), ("of", 0, of)],
    )?;
    methods(
        interpreter,
        &prototype,
        &[
            ("push", 1, push),
            ("pop", 0, pop),
            ("shift", 0, shift),
            ("unshift", 1, unshift),
            ("slice", 2, slice),
            ("splice", 2, splice),
            ("concat", 1, concat),
            ("join", 1, join),
            ("reverse", 0, reverse),
            ("indexOf", 1, index_of),
            ("lastIndexOf", 1, last_index_of),
            ("includes", 1, includes),
            ("find", 1, find),
            ("findIndex", 1, find_index),
            ("findLast", 1, find_last),
            ("findLastIndex", 1, find_last_index),
            ("filter", 1, filter),
            ("map", 1, map),
            ("forEach", 1, for_each),
            ("reduce", 1, reduce),
            ("reduceRight", 1, reduce_right),
            ("some", 1, some),
            ("every", 1, every),
            ("sort", 1, sort),
            ("flat", 0, flat),
            ("flatMap", 1, flat_map),
            ("fill", 1, fill),
            ("keys", 0, keys),
            ("values", 0, values),
            ("entries", 0, entries),
            ("at", 1, at),
            ("toString", 0, to_string),
        ],
    )
}

fn call(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let elements = match args {
        [Value::Number(length)] => {
            if length.fract() != 0.0 || *length < 0.0 || *length > MAX_ARRAY_LENGTH as f64 {
                return Err(interpreter.throw(ErrorKind::Range, "Invalid array length"));
            }
            vec![Value::Undefined; *length as usize]
        }
        _ => args.to_vec(),
    };
    Ok(Value::Object(interpreter.new_array(elements)?))
}

fn construct(interpreter: &mut Interpreter, args: &[Value], new_target: &ObjectRef) -> EvalResult<Value> {
    let array = call(interpreter, &Value::Undefined, args)?;
    if let (Value::Object(array), Some(Value::Object(prototype))) = (&array, lookup(new_target, "prototype")) {
        array.borrow_mut().prototype = Some(prototype);
    }
    Ok(array)
}

fn is_array(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(matches!(
        args.first(),
        Some(Value::Object(object)) if object.borrow().is_array()
    )))
}

fn from(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let source = arg(args, 0);
    let mapper = match args.get(1) {
        None | Some(Value::Undefined) => None,
        Some(mapper) => Some(callback(interpreter, mapper)?),
    };
    let items: Vec<Value> = match &source {
        Value::Undefined | Value::Null | Value::String(_) => interpreter.iterate(&source, None)?.collect(),
        Value::Object(object) if object.borrow().is_array() => snapshot(object),
        Value::Object(object) => {
            let length = lookup(object, "length").unwrap_or_default();
            let length = interpreter.to_integer(Some(&length), 0.0)?.max(0.0);
            if length > MAX_ARRAY_LENGTH as f64 {
                return Err(interpreter.throw(ErrorKind::Range, "Invalid array length"));
            }
            let mut items = Vec::with_capacity(length as usize);
            for index in 0..length as usize {
                interpreter.tick()?;
                items.push(lookup(object, &index.to_string()).unwrap_or_default());
            }
            items
        }
        _ => Vec::new(),
    };
    let items = match mapper {
        Some(mapper) => {
            let mut mapped = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                mapped.push(interpreter.call(&mapper, &Value::Undefined, &[item, Value::from(index)])?);
            }
            mapped
        }
        None => items,
    };
    Ok(Value::Object(interpreter.new_array(items)?))
}

fn of(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Object(interpreter.new_array(args.to_vec())?))
}

fn this_array(interpreter: &mut Interpreter, this: &Value, method: &str) -> EvalResult<ObjectRef> {
    match this {
        Value::Object(object) if object.borrow().is_array() => Ok(object.clone()),
        _ => Err(interpreter.type_error(format!("Array.prototype.{method} called on non-array"))),
    }
}

fn snapshot(array: &ObjectRef) -> Vec<Value> {
    array.borrow().elements().cloned().unwrap_or_default()
}

fn length_of(array: &ObjectRef) -> usize {
    array.borrow().elements().map_or(0, Vec::len)
}

fn element(array: &ObjectRef, index: usize) -> Value {
    array
        .borrow()
        .elements()
        .and_then(|elements| elements.get(index).cloned())
        .unwrap_or_default()
}

/// Apply an in-place change, refusing frozen arrays.
fn mutate<R>(
    interpreter: &mut Interpreter,
    array: &ObjectRef,
    change: impl FnOnce(&mut Vec<Value>) -> R,
) -> EvalResult<R> {
    let result = {
        let mut borrowed = array.borrow_mut();
        let frozen = borrowed.frozen;
        match &mut borrowed.kind {
            ObjectKind::Array(elements) if !frozen => Some(change(elements)),
            _ => None,
        }
    };
    result.ok_or_else(|| interpreter.type_error("Cannot modify a frozen array"))
}

/// Refuse growth past the maximum array length.
fn ensure_room(interpreter: &mut Interpreter, array: &ObjectRef, added: usize) -> EvalResult<()> {
    if length_of(array).saturating_add(added) > MAX_ARRAY_LENGTH {
        Err(interpreter.throw(ErrorKind::Range, "Invalid array length"))
    } else {
        Ok(())
    }
}

fn push(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "push")?;
    ensure_room(interpreter, &array, args.len())?;
    let length = mutate(interpreter, &array, |elements| {
        elements.extend_from_slice(args);
        elements.len()
    })?;
    Ok(Value::from(length))
}

fn pop(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "pop")?;
    Ok(mutate(interpreter, &array, Vec::pop)?.unwrap_or_default())
}

fn shift(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "shift")?;
    let removed = mutate(interpreter, &array, |elements| {
        (!elements.is_empty()).then(|| elements.remove(0))
    })?;
    Ok(removed.unwrap_or_default())
}

fn unshift(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "unshift")?;
    ensure_room(interpreter, &array, args.len())?;
    let length = mutate(interpreter, &array, |elements| {
        elements.splice(0..0, args.iter().cloned());
        elements.len()
    })?;
    Ok(Value::from(length))
}

/// `start`/`end` arguments resolved against `length`.
fn range(interpreter: &mut Interpreter, args: &[Value], first: usize, length: usize) -> EvalResult<(usize, usize)> {
    let start = interpreter.to_integer(args.get(first), 0.0)?;
    let end = interpreter.to_integer(args.get(first + 1), length as f64)?;
    let start = relative_index(start, length);
    let end = relative_index(end, length).max(start);
    Ok((start, end))
}

fn slice(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "slice")?;
    let items = snapshot(&array);
    let (start, end) = range(interpreter, args, 0, items.len())?;
    Ok(Value::Object(interpreter.new_array(items[start..end].to_vec())?))
}

fn splice(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "splice")?;
    let length = length_of(&array);
    let start = interpreter.to_integer(args.first(), 0.0)?;
    let start = relative_index(start, length);
    let delete = match args.len() {
        0 => 0,
        1 => length - start,
        _ => {
            let count = interpreter.to_integer(args.get(1), 0.0)?;
            count.clamp(0.0, (length - start) as f64) as usize
        }
    };
    let inserted = args.get(2..).unwrap_or_default();
    ensure_room(interpreter, &array, inserted.len())?;
    let removed = mutate(interpreter, &array, |elements| {
        elements
            .splice(start..start + delete, inserted.iter().cloned())
            .collect::<Vec<_>>()
    })?;
    Ok(Value::Object(interpreter.new_array(removed)?))
}

fn concat(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "concat")?;
    let mut items = snapshot(&array);
    for value in args {
        match value {
            Value::Object(object) if object.borrow().is_array() => items.extend(snapshot(object)),
            other => items.push(other.clone()),
        }
        if items.len() > MAX_ARRAY_LENGTH {
            return Err(interpreter.throw(ErrorKind::Range, "Invalid array length"));
        }
    }
    Ok(Value::Object(interpreter.new_array(items)?))
}

fn join(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "join")?;
    let separator = match args.first() {
        None | Some(Value::Undefined) => ",".into(),
        Some(separator) => interpreter.to_string(separator)?,
    };
    interpreter.enter_native()?;
    let joined = join_elements(interpreter, &array, &separator);
    interpreter.leave_native();
    Ok(Value::string(joined?))
}

fn join_elements(interpreter: &mut Interpreter, array: &ObjectRef, separator: &str) -> EvalResult<String> {
    let mut joined = String::new();
    for index in 0..length_of(array) {
        interpreter.tick()?;
        if index > 0 {
            joined.push_str(separator);
        }
        let item = element(array, index);
        if !item.is_nullish() {
            joined.push_str(&interpreter.to_string(&item)?);
        }
        interpreter.check_string_length(joined.len())?;
    }
    Ok(joined)
}

fn reverse(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "reverse")?;
    mutate(interpreter, &array, |elements| elements.reverse())?;
    Ok(this.clone())
}

fn index_of(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "indexOf")?;
    let items = snapshot(&array);
    let from = interpreter.to_integer(args.get(1), 0.0)?;
    let target = arg(args, 0);
    for index in relative_index(from, items.len())..items.len() {
        interpreter.tick()?;
        if strict_equals(&items[index], &target) {
            return Ok(Value::from(index));
        }
    }
    Ok(Value::Number(-1.0))
}

fn last_index_of(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "lastIndexOf")?;
    let items = snapshot(&array);
    if items.is_empty() {
        return Ok(Value::Number(-1.0));
    }
    let last = items.len() as f64 - 1.0;
    let from = interpreter.to_integer(args.get(1), last)?;
    let from = if from < 0.0 { items.len() as f64 + from } else { from.min(last) };
    if from < 0.0 {
        return Ok(Value::Number(-1.0));
    }
    let target = arg(args, 0);
    for index in (0..=from as usize).rev() {
        interpreter.tick()?;
        if strict_equals(&items[index], &target) {
            return Ok(Value::from(index));
        }
    }
    Ok(Value::Number(-1.0))
}

fn includes(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "includes")?;
    let items = snapshot(&array);
    let from = interpreter.to_integer(args.get(1), 0.0)?;
    let target = arg(args, 0);
    for item in &items[relative_index(from, items.len())..] {
        interpreter.tick()?;
        if same_value_zero(item, &target) {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

/// Call the callback for each index below the starting length, in order
/// (`reverse` walks backwards); stop when `visit` returns `Some`.
fn walk<T>(
    interpreter: &mut Interpreter,
    this: &Value,
    args: &[Value],
    method: &str,
    reverse: bool,
    mut visit: impl FnMut(usize, Value, Value) -> Option<T>,
) -> EvalResult<Option<T>> {
    let array = this_array(interpreter, this, method)?;
    let function = callback(interpreter, &arg(args, 0))?;
    let this_arg = arg(args, 1);
    let length = length_of(&array);
    for step in 0..length {
        let index = if reverse { length - 1 - step } else { step };
        let item = element(&array, index);
        let result = interpreter.call(
            &function,
            &this_arg,
            &[item.clone(), Value::from(index), this.clone()],
        )?;
        if let Some(found) = visit(index, item, result) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn find(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let found = walk(interpreter, this, args, "find", false, |_, item, result| {
        result.truthy().then_some(item)
    })?;
    Ok(found.unwrap_or_default())
}

fn find_index(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let found = walk(interpreter, this, args, "findIndex", false, |index, _, result| {
        result.truthy().then_some(index)
    })?;
    Ok(Value::Number(found.map_or(-1.0, |index| index as f64)))
}

fn find_last(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let found = walk(interpreter, this, args, "findLast", true, |_, item, result| {
        result.truthy().then_some(item)
    })?;
    Ok(found.unwrap_or_default())
}

fn find_last_index(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let found = walk(interpreter, this, args, "findLastIndex", true, |index, _, result| {
        result.truthy().then_some(index)
    })?;
    Ok(Value::Number(found.map_or(-1.0, |index| index as f64)))
}

fn filter(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut kept = Vec::new();
    walk::<()>(interpreter, this, args, "filter", false, |_, item, result| {
        if result.truthy() {
            kept.push(item);
        }
        None
    })?;
    Ok(Value::Object(interpreter.new_array(kept)?))
}

fn map(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut mapped = Vec::new();
    walk::<()>(interpreter, this, args, "map", false, |_, _, result| {
        mapped.push(result);
        None
    })?;
    Ok(Value::Object(interpreter.new_array(mapped)?))
}

fn for_each(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    walk::<()>(interpreter, this, args, "forEach", false, |_, _, _| None)?;
    Ok(Value::Undefined)
}

fn some(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let found = walk(interpreter, this, args, "some", false, |_, _, result| {
        result.truthy().then_some(())
    })?;
    Ok(Value::Boolean(found.is_some()))
}

fn every(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let failed = walk(interpreter, this, args, "every", false, |_, _, result| {
        (!result.truthy()).then_some(())
    })?;
    Ok(Value::Boolean(failed.is_none()))
}

fn fold(interpreter: &mut Interpreter, this: &Value, args: &[Value], reverse: bool) -> EvalResult<Value> {
    let method = if reverse { "reduceRight" } else { "reduce" };
    let array = this_array(interpreter, this, method)?;
    let function = callback(interpreter, &arg(args, 0))?;
    let length = length_of(&array);
    let order = move |step: usize| if reverse { length - 1 - step } else { step };
    let (mut accumulator, first) = match args.get(1) {
        Some(initial) => (initial.clone(), 0),
        None if length == 0 => {
            return Err(interpreter.type_error("Reduce of empty array with no initial value"));
        }
        None => (element(&array, order(0)), 1),
    };
    for step in first..length {
        let index = order(step);
        let item = element(&array, index);
        accumulator = interpreter.call(
            &function,
            &Value::Undefined,
            &[accumulator, item, Value::from(index), this.clone()],
        )?;
    }
    Ok(accumulator)
}

fn reduce(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    fold(interpreter, this, args, false)
}

fn reduce_right(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    fold(interpreter, this, args, true)
}

fn sort(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "sort")?;
    let comparator = match args.first() {
        None | Some(Value::Undefined) => None,
        Some(comparator) => Some(callback(interpreter, comparator)?),
    };
    let (defined, undefined): (Vec<Value>, Vec<Value>) = snapshot(&array)
        .into_iter()
        .partition(|item| !matches!(item, Value::Undefined));
    let mut sorted = merge_sort(interpreter, defined, |interpreter, a, b| match &comparator {
        Some(comparator) => {
            let result = interpreter.call(comparator, &Value::Undefined, &[a.clone(), b.clone()])?;
            let result = interpreter.to_number(&result)?;
            Ok(result.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
        }
        None => {
            let a = interpreter.to_string(a)?;
            let b = interpreter.to_string(b)?;
            Ok(a.encode_utf16().cmp(b.encode_utf16()))
        }
    })?;
    sorted.extend(undefined);
    mutate(interpreter, &array, |elements| *elements = sorted)?;
    Ok(this.clone())
}

/// Stable bottom-up merge sort with a comparator that may throw.
fn merge_sort(
    interpreter: &mut Interpreter,
    items: Vec<Value>,
    mut compare: impl FnMut(&mut Interpreter, &Value, &Value) -> EvalResult<Ordering>,
) -> EvalResult<Vec<Value>> {
    let length = items.len();
    let mut source = items;
    let mut width = 1;
    while width < length {
        let mut merged = Vec::with_capacity(length);
        let mut start = 0;
        while start < length {
            let middle = (start + width).min(length);
            let end = (start + 2 * width).min(length);
            let (mut left, mut right) = (start, middle);
            while left < middle && right < end {
                interpreter.tick()?;
                if compare(interpreter, &source[right], &source[left])? == Ordering::Less {
                    merged.push(source[right].clone());
                    right += 1;
                } else {
                    merged.push(source[left].clone());
                    left += 1;
                }
            }
            merged.extend_from_slice(&source[left..middle]);
            merged.extend_from_slice(&source[right..end]);
            start = end;
        }
        source = merged;
        width *= 2;
    }
    Ok(source)
}

fn flatten_into(
    interpreter: &mut Interpreter,
    items: Vec<Value>,
    depth: f64,
    out: &mut Vec<Value>,
) -> EvalResult<()> {
    for item in items {
        interpreter.tick()?;
        match &item {
            Value::Object(object) if depth >= 1.0 && object.borrow().is_array() => {
                interpreter.enter_native()?;
                let nested = flatten_into(interpreter, snapshot(object), depth - 1.0, out);
                interpreter.leave_native();
                nested?;
            }
            _ => out.push(item),
        }
        if out.len() > MAX_ARRAY_LENGTH {
            return Err(interpreter.throw(ErrorKind::Range, "Invalid array length"));
        }
    }
    Ok(())
}

fn flat(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "flat")?;
    let depth = interpreter.to_integer(args.first(), 1.0)?;
    let mut out = Vec::new();
    flatten_into(interpreter, snapshot(&array), depth, &mut out)?;
    Ok(Value::Object(interpreter.new_array(out)?))
}

fn flat_map(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut mapped = Vec::new();
    walk::<()>(interpreter, this, args, "flatMap", false, |_, _, result| {
        mapped.push(result);
        None
    })?;
    let mut out = Vec::new();
    flatten_into(interpreter, mapped, 1.0, &mut out)?;
    Ok(Value::Object(interpreter.new_array(out)?))
}

fn fill(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "fill")?;
    let (start, end) = range(interpreter, args, 1, length_of(&array))?;
    let value = arg(args, 0);
    let mut chunk_start = start;
    while chunk_start < end {
        interpreter.tick()?;
        let chunk_end = (chunk_start + FILL_CHUNK).min(end);
        mutate(interpreter, &array, |elements| {
            elements[chunk_start..chunk_end].fill(value.clone());
        })?;
        chunk_start = chunk_end;
    }
    Ok(this.clone())
}

fn keys(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "keys")?;
    let keys = (0..length_of(&array)).map(Value::from).collect();
    Ok(Value::Object(interpreter.new_array(keys)?))
}

fn values(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "values")?;
    let items = snapshot(&array);
    Ok(Value::Object(interpreter.new_array(items)?))
}

fn entries(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "entries")?;
    let mut pairs = Vec::new();
    for (index, item) in snapshot(&array).into_iter().enumerate() {
        interpreter.tick()?;
        let pair = interpreter.new_array(vec![Value::from(index), item])?;
        pairs.push(Value::Object(pair));
    }
    Ok(Value::Object(interpreter.new_array(pairs)?))
}

fn at(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let array = this_array(interpreter, this, "at")?;
    let length = length_of(&array) as f64;
    let position = interpreter.to_integer(args.first(), 0.0)?;
    let index = if position < 0.0 { length + position } else { position };
    if index < 0.0 || index >= length {
        return Ok(Value::Undefined);
    }
    Ok(element(&array, index as usize))
}

fn to_string(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    join(interpreter, this, &[])
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
    fn mutation_methods() {
        assert_eq!(
            logs(
                "const a = [1, 2, 3];
                 print(a.push(4, 5), a.pop(), a.shift(), a.unshift(0), a.join('-'));
                 print(a.splice(1, 2, 'x', 'y', 'z'), a);
                 print(a.reverse().join(''), a.fill(7, 1, 3).join());"
            ),
            ["5 5 1 4 0-2-3-4", "[2,3] [0,\"x\",\"y\",\"z\",4]", "4zyx0 4,7,7,x,0"]
        );
    }

    #[test]
    fn callbacks_and_searches() {
        assert_eq!(
            logs(
                "const a = [5, 1, 4, 2, 3];
                 print(a.map(x => x * 2).filter(x => x > 4).join());
                 print(a.find(x => x > 3), a.findIndex(x => x > 3), a.findLast(x => x < 3));
                 print(a.reduce((s, x) => s + x, 0), a.reduceRight((s, x) => s + x));
                 print(a.some(x => x > 4), a.every(x => x > 0), a.includes(NaN), [NaN].includes(NaN));
                 print(a.indexOf(4), a.lastIndexOf(9), a.at(-1));"
            ),
            ["10,8,6", "5 0 2", "15 15", "true true false true", "2 -1 3"]
        );
    }

    #[test]
    fn sorting_is_stable_and_string_ordered_by_default() {
        assert_eq!(
            logs(
                "print([10, 9, 1, 100, undefined, 2].sort());
                 const people = [{n: 'b', a: 1}, {n: 'a', a: 0}, {n: 'c', a: 1}, {n: 'd', a: 0}];
                 print(people.sort((x, y) => x.a - y.a).map(p => p.n).join(''));
                 try { [2, 1].sort(() => { throw new Error('cmp'); }); } catch (e) { print(e.message); }"
            ),
            ["[1,10,100,2,9,null]", "adbc", "cmp"]
        );
    }

    #[test]
    fn construction_and_flattening() {
        assert_eq!(
            logs(
                "print(Array.from({length: 3}, (_, i) => i * i), Array.of(7, 8), Array.from('héllo').length);
                 print([1, [2, [3, [4]]]].flat(Infinity), [1, 2].flatMap(x => [x, x * 10]));
                 print(new Array(3).length, Array.isArray([]), Array.isArray('a'));
                 try { new Array(-1); } catch (e) { print(e.name); }"
            ),
            ["[0,1,4] [7,8] 5", "[1,2,3,4] [1,10,2,20]", "3 true false", "RangeError"]
        );
    }

    #[test]
    fn frozen_arrays_reject_changes() {
        assert_eq!(
            logs(
                "const a = Object.freeze([1]);
                 try { a.push(2); } catch (e) { print(e instanceof TypeError, a.length); }"
            ),
            ["true 1"]
        );
    }
}
