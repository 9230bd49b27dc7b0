//! JSON text conversion and the rendering of captured output lines.

use super::interpreter::{ErrorKind, Interpreter};
use super::value::{ObjectRef, Value, lookup};
use super::EvalResult;
use crate::syntax::number::format_number;
use std::rc::Rc;

/// How `JSON.stringify` filters and lays out its output.
#[derive(Default)]
pub(crate) struct JsonLayout {
    /// Replacer function, called for every key/value pair.
    pub replacer: Option<Value>,
    /// Allow-list of keys from an array replacer.
    pub keys: Option<Vec<Rc<str>>>,
    /// Indentation unit; empty for compact output.
    pub gap: String,
}

struct Serializer<'a> {
    layout: &'a JsonLayout,
    stack: Vec<ObjectRef>,
    indent: String,
}

/// JSON string literal for `text`.
pub(crate) fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""))
}

impl Interpreter {
    /// `JSON.stringify(value)`; `None` when the result is `undefined`.
    pub(crate) fn json_stringify(&mut self, value: &Value, layout: &JsonLayout) -> EvalResult<Option<String>> {
        let holder = match layout.replacer {
            Some(_) => {
                let holder = self.new_object()?;
                holder.borrow_mut().set_own("", value.clone()).ok();
                Some(holder)
            }
            None => None,
        };
        let mut serializer = Serializer {
            layout,
            stack: Vec::new(),
            indent: String::new(),
        };
        self.serialize_property(&mut serializer, holder.as_ref(), "", value.clone())
    }

    fn serialize_property(
        &mut self,
        serializer: &mut Serializer<'_>,
        holder: Option<&ObjectRef>,
        key: &str,
        mut value: Value,
    ) -> EvalResult<Option<String>> {
        self.tick()?;
        if let Value::Object(object) = &value {
            if let Some(to_json) = lookup(object, "toJSON").filter(Value::is_callable) {
                value = self.call(&to_json, &value, &[Value::string(key)])?;
            }
        }
        if let Some(replacer) = &serializer.layout.replacer {
            let this = holder.cloned().map(Value::Object).unwrap_or_default();
            value = self.call(replacer, &this, &[Value::string(key), value])?;
        }
        Ok(match &value {
            Value::Null => Some("null".to_string()),
            Value::Boolean(flag) => Some(flag.to_string()),
            Value::Number(number) if number.is_finite() => Some(format_number(*number)),
            Value::Number(_) => Some("null".to_string()),
            Value::String(text) => Some(quote(text)),
            Value::Object(_) if value.is_callable() => None,
            Value::Object(object) => Some(self.serialize_object(serializer, object)?),
            Value::Undefined => None,
        })
    }

    fn serialize_object(&mut self, serializer: &mut Serializer<'_>, object: &ObjectRef) -> EvalResult<String> {
        if serializer.stack.iter().any(|open| Rc::ptr_eq(open, object)) {
            return Err(self.type_error("Converting circular structure to JSON"));
        }
        self.enter_native()?;
        serializer.stack.push(object.clone());
        let outer = serializer.indent.clone();
        serializer.indent.push_str(&serializer.layout.gap);
        let result = self.serialize_members(serializer, object);
        serializer.indent = outer;
        serializer.stack.pop();
        self.leave_native();
        let (parts, is_array) = result?;

        let (open, close) = if is_array { ('[', ']') } else { ('{', '}') };
        if parts.is_empty() {
            return Ok(format!("{open}{close}"));
        }
        let text = if serializer.layout.gap.is_empty() {
            format!("{open}{}{close}", parts.join(","))
        } else {
            let inner = format!("{}{}", serializer.indent, serializer.layout.gap);
            let separator = format!(",\n{inner}");
            format!("{open}\n{inner}{}\n{}{close}", parts.join(&separator), serializer.indent)
        };
        self.check_string_length(text.len())?;
        Ok(text)
    }

    fn serialize_members(
        &mut self,
        serializer: &mut Serializer<'_>,
        object: &ObjectRef,
    ) -> EvalResult<(Vec<String>, bool)> {
        let length = object.borrow().elements().map(Vec::len);
        let mut parts = Vec::new();
        if let Some(length) = length {
            for index in 0..length {
                let item = object.borrow().get_own(&index.to_string()).unwrap_or_default();
                let text = self.serialize_property(serializer, Some(object), &index.to_string(), item)?;
                parts.push(text.unwrap_or_else(|| "null".to_string()));
            }
            return Ok((parts, true));
        }

        let keys = match &serializer.layout.keys {
            Some(keys) => keys.clone(),
            None => object.borrow().own_keys(),
        };
        let colon = if serializer.layout.gap.is_empty() { ":" } else { ": " };
        for key in keys {
            let item = lookup(object, &key).unwrap_or_default();
            if let Some(text) = self.serialize_property(serializer, Some(object), &key, item)? {
                parts.push(format!("{}{colon}{text}", quote(&key)));
            }
        }
        Ok((parts, false))
    }

    /// `JSON.parse(text)`.
    pub(crate) fn json_parse(&mut self, text: &str) -> EvalResult<Value> {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(parsed) => self.from_json(&parsed),
            Err(err) => Err(self.throw(
                ErrorKind::Syntax,
                format!(
                    "Unexpected token in JSON at line {} column {}",
                    err.line(),
                    err.column()
                ),
            )),
        }
    }

    fn from_json(&mut self, json: &serde_json::Value) -> EvalResult<Value> {
        self.tick()?;
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Boolean(*flag),
            serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(text) => Value::string(text.as_str()),
            serde_json::Value::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.from_json(item)?);
                }
                Value::Object(self.new_array(elements)?)
            }
            serde_json::Value::Object(entries) => {
                let object = self.new_object()?;
                for (key, item) in entries {
                    let item = self.from_json(item)?;
                    object.borrow_mut().set_own(key, item).ok();
                }
                Value::Object(object)
            }
        })
    }

    /// One output line: objects as JSON, everything else as a string,
    /// separated by single spaces.
    pub(crate) fn format_line(&mut self, args: &[Value]) -> EvalResult<String> {
        let mut line = String::new();
        for (index, arg) in args.iter().enumerate() {
            if index > 0 {
                line.push(' ');
            }
            let rendered = match arg {
                Value::Null => "null".to_string(),
                Value::Object(_) if !arg.is_callable() => self
                    .json_stringify(arg, &JsonLayout::default())?
                    .unwrap_or_default(),
                other => self.to_string(other)?.to_string(),
            };
            line.push_str(&rendered);
            self.check_string_length(line.len())?;
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_controls() {
        assert_eq!(quote("a\"b\n\u{1}"), "\"a\\\"b\\n\\u0001\"");
        assert_eq!(quote("é"), "\"é\"");
    }
}
