//! Conversion between host [`Value`]s and engine values.
//!
//! Host values enter the engine through [`IntoJs`] and leave it through
//! [`FromJs`]. Strings, booleans and numbers pass through unchanged; arrays
//! and plain objects are converted element by element; binary data travels
//! as `Uint8Array`.

use std::collections::BTreeMap;

use rquickjs::{
    Array, ArrayBuffer, Ctx, FromJs, IntoJs, Object, Result, Type, TypedArray,
    Value as JsValue,
};

use tracing::debug;

use crate::Value;

/// Nesting depth after which script values are read back as `Null`.
///
/// Script objects may be cyclic; the cap keeps conversion finite. Hitting it
/// is logged at debug level.
pub const MAX_DEPTH: usize = 64;

impl<'js> IntoJs<'js> for Value {
    fn into_js(self, ctx: &Ctx<'js>) -> Result<JsValue<'js>> {
        match self {
            Value::Null => Ok(JsValue::new_null(ctx.clone())),
            Value::Bool(b) => Ok(JsValue::new_bool(ctx.clone(), b)),
            Value::Number(n) => Ok(number_to_js(ctx, n)),
            Value::String(s) => s.into_js(ctx),
            Value::Array(items) => {
                let array = Array::new(ctx.clone())?;
                for (index, item) in items.into_iter().enumerate() {
                    array.set(index, item)?;
                }
                Ok(array.into_value())
            }
            Value::Object(map) => {
                let object = Object::new(ctx.clone())?;
                for (key, item) in map {
                    object.set(key, item)?;
                }
                Ok(object.into_value())
            }
            Value::Bytes(bytes) => Ok(TypedArray::<u8>::new(ctx.clone(), bytes)?.into_value()),
        }
    }
}

impl<'js> FromJs<'js> for Value {
    fn from_js(ctx: &Ctx<'js>, value: JsValue<'js>) -> Result<Self> {
        read_value(ctx, value, 0)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_js<'js>(ctx: &Ctx<'js>, n: f64) -> JsValue<'js> {
    if n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
        JsValue::new_int(ctx.clone(), n as i32)
    } else {
        JsValue::new_float(ctx.clone(), n)
    }
}

fn read_value<'js>(ctx: &Ctx<'js>, value: JsValue<'js>, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        debug!(
            max_depth = MAX_DEPTH,
            kind = value.type_name(),
            "Value nested too deeply, read as null"
        );
        return Ok(Value::Null);
    }

    match value.type_of() {
        Type::Bool => Ok(Value::Bool(value.as_bool().unwrap_or_default())),
        Type::Int | Type::Float => Ok(Value::Number(value.as_number().unwrap_or_default())),
        Type::String => String::from_js(ctx, value).map(Value::String),
        Type::Array => {
            let array = Array::from_js(ctx, value)?;
            let mut items = Vec::with_capacity(array.len());
            for item in array.iter::<JsValue>() {
                items.push(read_value(ctx, item?, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        Type::Object => {
            if let Some(bytes) = read_bytes(ctx, &value) {
                return Ok(Value::Bytes(bytes));
            }
            let object = Object::from_js(ctx, value)?;
            let mut map = BTreeMap::new();
            for prop in object.props::<String, JsValue>() {
                let (key, item) = prop?;
                if item.is_function() {
                    continue;
                }
                map.insert(key, read_value(ctx, item, depth + 1)?);
            }
            Ok(Value::Object(map))
        }
        _ => Ok(Value::Null),
    }
}

/// Read a `Uint8Array` or `ArrayBuffer` as bytes.
fn read_bytes<'js>(ctx: &Ctx<'js>, value: &JsValue<'js>) -> Option<Vec<u8>> {
    if let Ok(typed) = TypedArray::<u8>::from_js(ctx, value.clone()) {
        return typed.as_bytes().map(<[u8]>::to_vec);
    }
    if let Ok(buffer) = ArrayBuffer::from_js(ctx, value.clone()) {
        return buffer.as_bytes().map(<[u8]>::to_vec);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptEngine;
    use spider_bridge_common::EngineConfig;

    fn engine() -> ScriptEngine {
        ScriptEngine::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_object_round_trip_keys() {
        let engine = engine();
        let mut map = BTreeMap::new();
        map.insert("area".to_string(), "cn".to_string());
        map.insert("year".to_string(), "2024".to_string());

        engine.context().with(|ctx| {
            let object = Value::from(&map).into_js(&ctx).unwrap();
            assert!(object.is_object());
            let back = Value::from_js(&ctx, object).unwrap();
            let back = back.as_object().unwrap();

            assert_eq!(back.keys().collect::<Vec<_>>(), vec!["area", "year"]);
            assert_eq!(back["year"], Value::from("2024"));

            let empty = Value::from(&BTreeMap::<String, String>::new()).into_js(&ctx).unwrap();
            let back = Value::from_js(&ctx, empty).unwrap();
            assert_eq!(back, Value::Object(BTreeMap::new()));
        });
    }

    #[test]
    fn test_array_preserves_order_and_length() {
        let engine = engine();
        let items = vec!["b".to_string(), "a".to_string(), "c".to_string()];

        engine.context().with(|ctx| {
            let array = Array::from_js(&ctx, Value::from(items.as_slice()).into_js(&ctx).unwrap()).unwrap();
            assert_eq!(array.len(), 3);
            let back = Value::from_js(&ctx, array.into_value()).unwrap();
            assert_eq!(back, Value::from(items.as_slice()));

            let empty = Array::from_js(&ctx, Value::from(&[] as &[String]).into_js(&ctx).unwrap()).unwrap();
            assert_eq!(empty.len(), 0);
            let back = Value::from_js(&ctx, empty.into_value()).unwrap();
            assert_eq!(back, Value::Array(Vec::new()));
        });
    }

    #[test]
    fn test_scalars_pass_through() {
        let engine = engine();

        engine.context().with(|ctx| {
            for value in [
                Value::Null,
                Value::Bool(true),
                Value::Number(7.0),
                Value::Number(-2.5),
                Value::from("text"),
            ] {
                let js = value.clone().into_js(&ctx).unwrap();
                assert_eq!(Value::from_js(&ctx, js).unwrap(), value);
            }
        });
    }

    #[test]
    fn test_script_values() {
        let engine = engine();

        engine.context().with(|ctx| {
            let js: JsValue = ctx
                .eval(r#"({ name: "x", n: 3, nested: [1, { ok: true }], skip() {}, u: undefined })"#)
                .unwrap();
            let value = Value::from_js(&ctx, js).unwrap();
            let map = value.as_object().unwrap();

            assert_eq!(map["name"], Value::from("x"));
            assert_eq!(map["n"], Value::Number(3.0));
            assert!(!map.contains_key("skip"));
            assert!(map["u"].is_null());

            let nested = map["nested"].as_array().unwrap();
            assert_eq!(nested[0], Value::Number(1.0));
            assert_eq!(
                nested[1].as_object().unwrap()["ok"],
                Value::Bool(true)
            );
        });
    }

    #[test]
    fn test_bytes_as_uint8array() {
        let engine = engine();

        engine.context().with(|ctx| {
            let js = Value::Bytes(vec![1, 2, 250]).into_js(&ctx).unwrap();
            ctx.globals().set("buf", js).unwrap();

            let kind: String = ctx.eval("buf.constructor.name").unwrap();
            assert_eq!(kind, "Uint8Array");

            let js: JsValue = ctx.eval("new Uint8Array([9, 8]).buffer").unwrap();
            assert_eq!(Value::from_js(&ctx, js).unwrap(), Value::Bytes(vec![9, 8]));

            let js: JsValue = ctx.eval("buf").unwrap();
            assert_eq!(
                Value::from_js(&ctx, js).unwrap(),
                Value::Bytes(vec![1, 2, 250])
            );
        });
    }

    #[test]
    fn test_cyclic_object_terminates() {
        let engine = engine();

        engine.context().with(|ctx| {
            let js: JsValue = ctx.eval("const o = { a: 1 }; o.self = o; o").unwrap();
            let value = Value::from_js(&ctx, js).unwrap();
            assert_eq!(value.as_object().unwrap()["a"], Value::Number(1.0));
        });
    }

    #[test]
    fn test_depth_cap_on_deep_values() {
        let engine = engine();

        engine.context().with(|ctx| {
            let js: JsValue = ctx
                .eval("let v = 'leaf'; for (let i = 0; i < 70; i++) v = [v]; v")
                .unwrap();
            let mut value = Value::from_js(&ctx, js).unwrap();

            for _ in 0..MAX_DEPTH {
                value = value.as_array().unwrap()[0].clone();
            }
            assert_eq!(value, Value::Array(vec![Value::Null]));
        });
    }
}
