//! Proxy passthrough results.
//!
//! A spider's `proxy` function returns `[contentType, extra, body]`. The body
//! is either a sequence of byte values or anything else, which is taken as
//! text.

use std::io::Cursor;

use bytes::Bytes;
use rquickjs::{Array, Ctx, FromJs, Value as JsValue};
use serde_json::Value as Json;

use spider_bridge_common::BridgeError;
use spider_bridge_core::{JsResultExt, Value};

const OPERATION: &str = "proxy";

/// Decoded result of a spider's `proxy` function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyResponse {
    /// MIME type reported by the spider.
    pub content_type: String,

    /// Spider-specific extra data, often a status code or header blob.
    pub extra: String,

    /// Response body.
    pub body: Bytes,
}

impl ProxyResponse {
    /// A reader over the body.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }

    /// Decode the parsed JSON form of a proxy result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidResult`] if `result` is not an array.
    pub fn from_json(result: &Json) -> Result<Self, BridgeError> {
        let Json::Array(items) = result else {
            return Err(BridgeError::invalid_result(
                OPERATION,
                format!("expected an array, got {}", json_kind(result)),
            ));
        };

        Ok(Self {
            content_type: items.first().map(json_text).unwrap_or_default(),
            extra: items.get(1).map(json_text).unwrap_or_default(),
            body: items.get(2).map(body_bytes).unwrap_or_default(),
        })
    }
}

/// Decode a raw proxy result inside the engine.
///
/// The value is rendered with the engine's own `JSON.stringify`. A body
/// held in a `Uint8Array` or `ArrayBuffer` is copied out directly.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidResult`] if the value is not an array.
pub fn decode<'js>(ctx: &Ctx<'js>, value: JsValue<'js>) -> Result<ProxyResponse, BridgeError> {
    if !value.is_array() {
        return Err(BridgeError::invalid_result(
            OPERATION,
            format!("expected an array, got {}", value.type_name()),
        ));
    }

    let binary_body = value
        .as_array()
        .map(|items| binary_element(ctx, items))
        .transpose()?
        .flatten();

    let text = ctx
        .json_stringify(value)
        .or_bridge(ctx)?
        .ok_or_else(|| BridgeError::invalid_result(OPERATION, "result is not serializable"))?
        .to_string()
        .or_bridge(ctx)?;

    let parsed: Json = serde_json::from_str(&text)
        .map_err(|e| BridgeError::invalid_result(OPERATION, e.to_string()))?;

    let mut response = ProxyResponse::from_json(&parsed)?;
    if let Some(body) = binary_body {
        response.body = Bytes::from(body);
    }
    Ok(response)
}

fn binary_element<'js>(ctx: &Ctx<'js>, items: &Array<'js>) -> Result<Option<Vec<u8>>, BridgeError> {
    let element: JsValue = items.get(2).or_bridge(ctx)?;
    if !element.is_object() || element.is_array() {
        return Ok(None);
    }
    match Value::from_js(ctx, element).or_bridge(ctx)? {
        Value::Bytes(bytes) => Ok(Some(bytes)),
        _ => Ok(None),
    }
}

fn json_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn body_bytes(value: &Json) -> Bytes {
    match value {
        Json::Array(items) => items.iter().map(byte_of).collect(),
        Json::Null => Bytes::new(),
        other => Bytes::from(json_text(other)),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn byte_of(value: &Json) -> u8 {
    let n = match value {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Json::String(s) => s.trim().parse::<f64>().map_or(0, |f| f.trunc() as i64),
        Json::Bool(b) => i64::from(*b),
        _ => 0,
    };
    n as u8
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
