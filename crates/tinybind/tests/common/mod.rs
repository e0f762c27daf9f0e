#![allow(dead_code)]

use eyre::Result;
use tinybind::{Bindings, Compiled, Config};
use tinywasm::types::WasmValue;

/// A small page script: builds `<div id="output">ready</div>`, counts clicks
/// on the body and schedules timers, all through generated-style imports.
pub const PAGE: &str = r#"
(module
  (import "wbg" "__wbindgen_init_externref_table" (func $init_table))
  (import "wbg" "__wbindgen_externref_table_grow" (func $table_grow (param i32) (result i32)))
  (import "wbg" "__wbindgen_externref_drop" (func $drop (param i32)))
  (import "wbg" "__wbindgen_closure_new" (func $closure_new (param i32 i32 i32 i32) (result i32)))
  (import "wbg" "__wbindgen_throw" (func $throw (param i32 i32)))
  (import "wbg" "__wbg_window_b3d1a6c0a5e1f3d2" (func $window (result i32)))
  (import "wbg" "__wbg_document_5f6c1a2b3c4d5e6f" (func $document (param i32) (result i32)))
  (import "wbg" "__wbg_body_0a1b2c3d4e5f6a7b" (func $body (param i32) (result i32)))
  (import "wbg" "__wbg_createElement_964ab674a0176cd8" (func $create_element (param i32 i32 i32) (result i32)))
  (import "wbg" "__wbg_setAttribute_2704501201f15687" (func $set_attribute (param i32 i32 i32 i32 i32)))
  (import "wbg" "__wbg_set_textContent_12af0b0f84feb710" (func $set_text (param i32 i32 i32)))
  (import "wbg" "__wbg_appendChild_805222bfc2f4c2b6" (func $append_child (param i32 i32) (result i32)))
  (import "wbg" "__wbg_addEventListener_90e553fdce254421" (func $listen (param i32 i32 i32 i32)))
  (import "wbg" "__wbg_localStorage_e381d34d0c40c761" (func $local_storage (param i32) (result i32)))
  (import "wbg" "__wbg_setItem_212ecc915942ab0a" (func $set_item (param i32 i32 i32 i32 i32)))
  (import "wbg" "__wbg_setTimeout_7bb3429662ab1e70" (func $set_timeout (param i32 i32 i32) (result i32)))
  (import "wbg" "__wbg_log_ea240990d83e374e" (func $log (param i32 i32)))

  (memory (export "memory") 1)

  (global $heap (mut i32) (i32.const 1024))
  (global $exn (mut i32) (i32.const 0))
  (global $calls (mut i32) (i32.const 0))
  (global $destroyed (mut i32) (i32.const 0))
  (global $window (mut i32) (i32.const 0))

  (data (i32.const 16) "div")
  (data (i32.const 32) "click")
  (data (i32.const 48) "id")
  (data (i32.const 64) "output")
  (data (i32.const 80) "ready")
  (data (i32.const 96) "key")
  (data (i32.const 112) "bad tag")

  (func $malloc (export "__wbindgen_malloc") (param $size i32) (param $align i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap (i32.add (global.get $heap) (local.get $size)))
    (block $done
      (loop $grow
        (br_if $done (i32.le_u (global.get $heap) (i32.mul (memory.size) (i32.const 65536))))
        (drop (memory.grow (i32.const 1)))
        (br $grow)))
    (local.get $ptr))

  (func (export "__wbindgen_realloc") (param $ptr i32) (param $old i32) (param $new i32) (param $align i32) (result i32)
    (local $dst i32)
    (local $i i32)
    (local.set $dst (call $malloc (local.get $new) (local.get $align)))
    (block $done
      (loop $copy
        (br_if $done (i32.ge_u (local.get $i) (local.get $old)))
        (i32.store8 (i32.add (local.get $dst) (local.get $i)) (i32.load8_u (i32.add (local.get $ptr) (local.get $i))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $copy)))
    (local.get $dst))

  (func (export "__externref_table_alloc") (result i32)
    (call $table_grow (i32.const 1)))

  (func (export "__wbindgen_exn_store") (param $idx i32)
    (global.set $exn (local.get $idx)))

  (func (export "__wbindgen_closure_invoke") (param $shim i32) (param $a i32) (param $b i32) (param $arg i32)
    (global.set $calls (i32.add (global.get $calls) (i32.const 1)))
    (call $drop (local.get $arg)))

  (func (export "__wbindgen_closure_destroy") (param $dtor i32) (param $a i32) (param $b i32)
    (global.set $destroyed (i32.add (global.get $destroyed) (i32.const 1))))

  (func (export "__wbindgen_start")
    (local $document i32)
    (local $body i32)
    (local $output i32)
    (call $init_table)
    (global.set $window (call $window))
    (local.set $document (call $document (global.get $window)))
    (local.set $body (call $body (local.get $document)))
    (local.set $output (call $create_element (local.get $document) (i32.const 16) (i32.const 3)))
    (call $set_attribute (local.get $output) (i32.const 48) (i32.const 2) (i32.const 64) (i32.const 6))
    (call $set_text (local.get $output) (i32.const 80) (i32.const 5))
    (drop (call $append_child (local.get $body) (local.get $output)))
    (call $listen
      (local.get $body) (i32.const 32) (i32.const 5)
      (call $closure_new (i32.const 1024) (i32.const 0) (i32.const 0) (i32.const 0))))

  (func (export "calls") (result i32) (global.get $calls))
  (func (export "destroyed") (result i32) (global.get $destroyed))
  (func (export "last_exception") (result i32) (global.get $exn))

  (func (export "greet") (param $ptr i32) (param $len i32)
    (call $log (local.get $ptr) (local.get $len)))

  (func (export "fail") (param $ptr i32) (param $len i32)
    (call $throw (local.get $ptr) (local.get $len)))

  (func (export "bad_element") (result i32)
    (call $create_element (call $document (global.get $window)) (i32.const 112) (i32.const 7)))

  (func (export "store") (param $ptr i32) (param $len i32)
    (call $set_item
      (call $local_storage (global.get $window))
      (i32.const 96) (i32.const 3) (local.get $ptr) (local.get $len)))

  (func (export "schedule") (param $delay i32) (result i32)
    (call $set_timeout
      (global.get $window)
      (call $closure_new (i32.const 2048) (i32.const 0) (i32.const 1) (i32.const 1))
      (local.get $delay)))
)
"#;

pub fn page_bytes() -> Result<Vec<u8>> {
    Ok(wat::parse_str(PAGE)?)
}

/// The page script with a start that throws once the page is built
pub fn failing_page_bytes() -> Result<Vec<u8>> {
    let listener = "(call $closure_new (i32.const 1024) (i32.const 0) (i32.const 0) (i32.const 0))))";
    let page = PAGE.replacen(listener, &format!("{}\n    (call $throw (i32.const 80) (i32.const 5)))", &listener[..listener.len() - 1]), 1);
    Ok(wat::parse_str(page)?)
}

/// Bindings with the page script started
pub fn started(config: Config) -> Result<Bindings> {
    let _ = pretty_env_logger::try_init();
    let mut bindings = Bindings::new(config)?;
    bindings.init_sync(Compiled::compile(&page_bytes()?)?)?;
    Ok(bindings)
}

/// Call an export returning a single `i32`
pub fn call_i32(bindings: &mut Bindings, export: &str) -> Result<i32> {
    match bindings.call(export, &[])?.as_slice() {
        [WasmValue::I32(value)] => Ok(*value),
        other => Err(eyre::eyre!("{export} returned {other:?}")),
    }
}
