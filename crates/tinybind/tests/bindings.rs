mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{call_i32, failing_page_bytes, page_bytes, started};
use eyre::Result;
use tinybind::host::{EventTarget, FileFetcher, Level, Response, RouteFetcher};
use tinybind::{Bindings, Compiled, Config, Error, ImportTable, LoadState, ModuleSource};
use tinywasm::types::WasmValue;
use url::Url;

#[test]
fn start_builds_the_page() -> Result<()> {
    let bindings = started(Config::default())?;
    assert_eq!(bindings.state(), LoadState::Started);

    let document = bindings.host().document();
    let output = document.get_element_by_id("output").expect("output element");
    assert_eq!(document.text_content(output).as_deref(), Some("ready"));
    assert_eq!(document.outer_html(document.body()), r#"<body><div id="output">ready</div></body>"#);
    Ok(())
}

#[test]
fn clicks_bubble_to_module_listeners() -> Result<()> {
    let mut bindings = started(Config::default())?;
    let output = bindings.host().document().get_element_by_id("output").expect("output element");

    assert!(bindings.dispatch_event(output, "click")?);
    assert!(bindings.dispatch_event(output, "click")?);
    assert!(bindings.dispatch_event(output, "keydown")?);
    assert_eq!(call_i32(&mut bindings, "calls")?, 2);

    // the module drops the event handles it was given
    let live = bindings.live_handles();
    bindings.dispatch_event(output, "click")?;
    assert_eq!(bindings.live_handles(), live);
    Ok(())
}

#[test]
fn strings_cross_the_boundary() -> Result<()> {
    let mut bindings = started(Config::default())?;
    bindings.call_with_str("greet", "hello")?;
    bindings.call_with_str("greet", "grüße, 世界 🦀")?;
    bindings.call_with_str("greet", "")?;

    let console = bindings.host().console();
    let logged: Vec<_> = console.at(Level::Log).collect();
    assert_eq!(logged, ["hello", "grüße, 世界 🦀", ""]);
    Ok(())
}

#[test]
fn host_errors_become_module_exceptions() -> Result<()> {
    let mut bindings = started(Config::default())?;
    assert_eq!(call_i32(&mut bindings, "last_exception")?, 0);

    // the binding returns normally with a null handle
    assert_eq!(call_i32(&mut bindings, "bad_element")?, 0);
    assert_ne!(call_i32(&mut bindings, "last_exception")?, 0);
    Ok(())
}

#[test]
fn storage_quota_is_reported_as_exception() -> Result<()> {
    let config = Config { storage_quota: 8, ..Config::default() };
    let mut bindings = started(config)?;

    bindings.call_with_str("store", "ok")?;
    assert_eq!(bindings.host().storage().get_item("key"), Some("ok"));
    assert_eq!(call_i32(&mut bindings, "last_exception")?, 0);

    bindings.call_with_str("store", "far too long")?;
    assert_eq!(bindings.host().storage().get_item("key"), Some("ok"));
    assert_ne!(call_i32(&mut bindings, "last_exception")?, 0);
    Ok(())
}

#[test]
fn throw_unwinds_the_call() -> Result<()> {
    let mut bindings = started(Config::default())?;
    let err = bindings.call_with_str("fail", "unreachable state").unwrap_err();
    assert!(matches!(err, Error::Runtime(_)), "unexpected error: {err}");
    assert!(err.to_string().contains("unreachable state"));

    // the instance stays usable
    assert_eq!(bindings.state(), LoadState::Started);
    assert_eq!(call_i32(&mut bindings, "calls")?, 0);
    Ok(())
}

#[test]
fn timers_fire_on_the_virtual_clock() -> Result<()> {
    let mut bindings = started(Config::default())?;
    let first = bindings.call("schedule", &[WasmValue::I32(50)])?;
    let second = bindings.call("schedule", &[WasmValue::I32(10)])?;
    assert_ne!(first, second);
    assert_eq!(bindings.host().timers().pending(), 2);

    assert_eq!(bindings.advance_timers(9)?, 0);
    assert_eq!(bindings.advance_timers(1)?, 1);
    assert_eq!(bindings.advance_timers(100)?, 1);
    assert_eq!(bindings.host().timers().pending(), 0);
    assert_eq!(call_i32(&mut bindings, "calls")?, 2);
    Ok(())
}

#[test]
fn malformed_binaries_never_start() -> Result<()> {
    let mut bindings = Bindings::new(Config::default())?;
    let mut corrupt = page_bytes()?;
    corrupt.truncate(corrupt.len() / 2);

    assert!(bindings.init(ModuleSource::Bytes(corrupt), &mut FileFetcher).is_err());
    assert_eq!(bindings.state(), LoadState::Unloaded);
    assert!(matches!(bindings.call("calls", &[]), Err(Error::NotLoaded)));

    // a later load still succeeds
    bindings.init(ModuleSource::Bytes(page_bytes()?), &mut FileFetcher)?;
    assert_eq!(bindings.state(), LoadState::Started);
    Ok(())
}

#[test]
fn init_is_idempotent() -> Result<()> {
    let mut bindings = Bindings::new(Config::default())?;
    bindings.init(ModuleSource::Bytes(page_bytes()?), &mut FileFetcher)?;
    bindings.init(ModuleSource::Bytes(page_bytes()?), &mut FileFetcher)?;
    bindings.init(ModuleSource::Bytes(b"garbage".to_vec()), &mut FileFetcher)?;

    let document = bindings.host().document();
    assert_eq!(document.query_selector_all(document.root(), "#output")?.len(), 1);
    Ok(())
}

#[test]
fn unbound_imports_fail_the_load() -> Result<()> {
    let bytes = wat::parse_str(
        r#"(module
            (import "wbg" "__wbg_requestAnimationFrame_86c40e9b0a3e7b1f" (func (param i32 i32) (result i32)))
            (memory (export "memory") 1))"#,
    )?;

    let mut bindings = Bindings::new(Config::default())?;
    match bindings.init(ModuleSource::Bytes(bytes), &mut FileFetcher) {
        Err(Error::MissingBindings(missing)) => {
            assert_eq!(missing, ["wbg::__wbg_requestAnimationFrame_86c40e9b0a3e7b1f"])
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(bindings.state(), LoadState::Unloaded);
    Ok(())
}

#[test]
#[cfg(feature = "mime-fallback")]
fn responses_without_wasm_content_type_fall_back() -> Result<()> {
    let url = Url::parse("http://localhost/compute.wasm")?;
    let response = Response::new(url, 200, page_bytes()?).with_header("content-type", "application/octet-stream");

    let strict = Config { mime_fallback: false, ..Config::default() };
    let mut bindings = Bindings::new(strict)?;
    let result = bindings.init(ModuleSource::Response(response.clone()), &mut FileFetcher);
    assert!(matches!(result, Err(Error::MimeType { .. })));
    assert_eq!(bindings.state(), LoadState::Unloaded);

    let mut bindings = Bindings::new(Config::default())?;
    bindings.init(ModuleSource::Response(response), &mut FileFetcher)?;
    assert_eq!(bindings.state(), LoadState::Started);
    Ok(())
}

#[test]
fn default_source_is_the_artifact_next_to_the_base_url() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("compute.wasm"), page_bytes()?)?;

    let base_url = Url::from_directory_path(dir.path()).map_err(|_| eyre::eyre!("invalid directory"))?;
    let mut bindings = Bindings::new(Config { base_url: Some(base_url), ..Config::default() })?;
    bindings.init(ModuleSource::Default, &mut RouteFetcher::new())?;
    assert_eq!(bindings.state(), LoadState::Started);
    Ok(())
}

#[test]
fn missing_artifacts_are_fetch_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let base_url = Url::from_directory_path(dir.path()).map_err(|_| eyre::eyre!("invalid directory"))?;
    let mut bindings = Bindings::new(Config { base_url: Some(base_url), ..Config::default() })?;

    let result = bindings.init(ModuleSource::Default, &mut FileFetcher);
    assert!(matches!(result, Err(Error::Fetch { status: 404, .. })));
    assert_eq!(bindings.state(), LoadState::Unloaded);
    Ok(())
}

#[test]
fn imports_receive_arguments_in_declaration_order() -> Result<()> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut imports = ImportTable::with_defaults();
    let log = seen.clone();
    imports.func("record", move |_, (a, b, c): (i32, i32, i32)| {
        log.borrow_mut().push((a, b, c));
        Ok(a * 100 + b * 10 + c)
    });
    imports.func("mix", |_, (a, b, c, d): (i32, f64, i32, f64)| Ok(a as f64 * 1000.0 + b * 100.0 + c as f64 * 10.0 + d));

    let bytes = wat::parse_str(
        r#"(module
            (import "wbg" "__wbg_record_0123456789abcdef" (func $record (param i32 i32 i32) (result i32)))
            (import "wbg" "__wbg_mix_fedcba9876543210" (func $mix (param i32 f64 i32 f64) (result f64)))
            (memory (export "memory") 1)
            (func (export "record") (result i32)
              (call $record (i32.const 1) (i32.const 2) (i32.const 3)))
            (func (export "mix") (result f64)
              (call $mix (i32.const 1) (f64.const 2) (i32.const 3) (f64.const 4))))"#,
    )?;

    let mut bindings = Bindings::with_imports(Config::default(), imports)?;
    bindings.init_sync(Compiled::compile(&bytes)?)?;

    assert_eq!(bindings.call("record", &[])?, [WasmValue::I32(123)]);
    assert_eq!(*seen.borrow(), [(1, 2, 3)]);
    assert_eq!(bindings.call("mix", &[])?, [WasmValue::F64(1234.0)]);
    Ok(())
}

#[test]
fn failed_start_leaves_no_page_behind() -> Result<()> {
    let mut bindings = Bindings::new(Config::default())?;
    bindings.host().storage_mut().set_item("visits", "3")?;

    let err = bindings.init_sync(Compiled::compile(&failing_page_bytes()?)?).unwrap_err();
    assert!(err.to_string().contains("ready"), "unexpected error: {err}");
    assert_eq!(bindings.state(), LoadState::Unloaded);
    assert_eq!(bindings.live_handles(), 0);
    {
        let document = bindings.host().document();
        assert_eq!(document.get_element_by_id("output"), None);
        assert_eq!(document.listener_count(EventTarget::Node(document.body())), 0);
    }

    bindings.init_sync(Compiled::compile(&page_bytes()?)?)?;
    let body = {
        let document = bindings.host().document();
        assert_eq!(document.outer_html(document.body()), r#"<body><div id="output">ready</div></body>"#);
        document.body()
    };

    bindings.dispatch_event(body, "click")?;
    assert_eq!(call_i32(&mut bindings, "calls")?, 1);
    assert_eq!(bindings.host().storage().get_item("visits"), Some("3"));
    Ok(())
}

#[test]
fn nodes_of_another_page_are_rejected() -> Result<()> {
    let mut bindings = started(Config::default())?;
    let mut other = tinybind::host::Document::new();
    let foreign = (0..32).map(|_| other.create_text("x")).last().expect("node");

    match bindings.dispatch_event(foreign, "click") {
        Err(Error::Host(err)) => assert_eq!(err.name(), "NotFoundError"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(bindings.set_intersecting(foreign, true).is_err());
    Ok(())
}
