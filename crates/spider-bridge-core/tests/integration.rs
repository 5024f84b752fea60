//! Integration tests for spider-bridge-core.
//!
//! These tests verify the pieces working together on a worker thread:
//! - Engine creation inside a task queue
//! - Host globals registration
//! - Module normalization and evaluation
//! - Value marshalling in both directions

use std::collections::BTreeMap;

use rquickjs::function::{Rest, This};
use rquickjs::{FromJs, Function, Module, Object, Value as JsValue};

use spider_bridge_common::{CapabilityConfig, EngineConfig};
use spider_bridge_core::{
    JsResultExt, ModuleNormalizer, ScriptEngine, TaskQueue, Value, new_binding_name,
};
use spider_bridge_host::linker::register_all;
use spider_bridge_host::{GuestLogs, HostGlobals, LocalStore, LogLevel};

fn engine_queue() -> TaskQueue<ScriptEngine> {
    TaskQueue::spawn("core-it", || {
        ScriptEngine::new(&EngineConfig::default()).expect("engine")
    })
    .unwrap()
}

fn host_globals(logs: &GuestLogs) -> HostGlobals {
    HostGlobals {
        spider: "it.js".into(),
        logs: logs.clone(),
        local: LocalStore::new(),
        capabilities: None,
    }
}

/// Evaluate `source` as a spider module and call `function` on its export.
fn load_and_call(
    engine: &ScriptEngine,
    globals: &HostGlobals,
    source: &str,
    function: &str,
    args: Vec<Value>,
) -> Value {
    let binding = new_binding_name();
    let normalized = ModuleNormalizer::default()
        .normalize(source, &binding)
        .unwrap();

    engine.context().with(|ctx| {
        register_all(&ctx, &CapabilityConfig::default(), globals).unwrap();
        Module::evaluate(ctx.clone(), format!("{binding}.js"), normalized)
            .and_then(|promise| promise.finish::<()>())
            .or_bridge(&ctx)
            .unwrap();

        let exported: Object = ctx.globals().get(binding.as_str()).unwrap();
        let function: Function = exported.get(function).unwrap();
        let result = function
            .call::<_, JsValue>((This(exported), Rest(args)))
            .or_bridge(&ctx)
            .unwrap();
        Value::from_js(&ctx, result).unwrap()
    })
}

// ============================================================================
// Test: Dialects on the worker
// ============================================================================

#[test]
fn test_all_dialects_on_worker() {
    let queue = engine_queue();
    let logs = GuestLogs::new(16);

    let sources = [
        "export function __jsEvalReturn() {\n  return { home(f) { return 'eval:' + f; } };\n}",
        "__JS_SPIDER__ = { home(f) { return 'placeholder:' + f; } };",
        "export default { home(f) { return 'default:' + f; } };",
    ];

    for source in sources {
        let globals = host_globals(&logs);
        let result = queue
            .run(move |engine| {
                load_and_call(engine, &globals, source, "home", vec![Value::Bool(true)])
            })
            .unwrap();

        let text = result.into_text();
        assert!(text.ends_with(":true"), "unexpected result {text}");
    }
}

// ============================================================================
// Test: Marshalling through the engine
// ============================================================================

#[test]
fn test_marshalling_round_trip_through_script() {
    let queue = engine_queue();
    let logs = GuestLogs::new(16);
    let globals = host_globals(&logs);

    let mut extend = BTreeMap::new();
    extend.insert("area".to_string(), "jp".to_string());
    extend.insert("year".to_string(), "2024".to_string());

    let result = queue
        .run(move |engine| {
            load_and_call(
                engine,
                &globals,
                "export default { echo(obj, list) { return { keys: Object.keys(obj).sort(), list, size: list.length }; } }",
                "echo",
                vec![Value::from(&extend), Value::from(&[] as &[String])],
            )
        })
        .unwrap();

    let object = result.as_object().unwrap();
    assert_eq!(
        object["keys"],
        Value::Array(vec![Value::from("area"), Value::from("year")])
    );
    assert_eq!(object["list"], Value::Array(vec![]));
    assert_eq!(object["size"], Value::Number(0.0));
}

// ============================================================================
// Test: Guest logging
// ============================================================================

#[test]
fn test_console_output_is_captured() {
    let queue = engine_queue();
    let logs = GuestLogs::new(16);
    let globals = host_globals(&logs);

    queue
        .run(move |engine| {
            load_and_call(
                engine,
                &globals,
                "console.info('loading'); export default { run() { console.error('failed', 7); return null; } }",
                "run",
                vec![],
            )
        })
        .unwrap();

    let entries = logs.snapshot();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].level, LogLevel::Info);
    assert_eq!(entries[0].message, "loading");
    assert_eq!(entries[1].level, LogLevel::Error);
    assert_eq!(entries[1].message, "failed 7");
}

// ============================================================================
// Test: Awaiting queued work
// ============================================================================

#[tokio::test]
async fn test_awaited_handle() {
    let queue = engine_queue();

    let handle = queue
        .submit(|engine| {
            engine
                .context()
                .with(|ctx| ctx.eval::<i32, _>("[1, 2, 3].reduce((a, b) => a + b)").or_bridge(&ctx))
        })
        .unwrap();

    let sum = tokio_test::assert_ok!(handle.await.unwrap());
    assert_eq!(sum, 6);

    queue.shutdown(|_| {});
}
