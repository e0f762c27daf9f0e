//! Bindings every generated module relies on, independent of the page.

use super::{Cx, ImportTable, flag};
use crate::closure::GuestFn;
use crate::memory::{MemoryViews, offset_by};
use crate::value::HostValue;
use crate::{HostError, Result};

pub(super) fn register(table: &mut ImportTable) {
    table
        .func("__wbindgen_init_externref_table", |cx, ()| {
            cx.shared().table.init();
            Ok(())
        })
        .func("__wbindgen_externref_table_grow", |cx, delta: i32| Ok(cx.shared().table.grow(delta.max(0) as u32) as i32))
        .func("__wbindgen_externref_drop", |cx, idx: i32| {
            cx.shared().table.drop_handle(idx as u32);
            Ok(())
        })
        .func("__wbindgen_debug_string", |cx, (ret, handle): (i32, i32)| {
            let debug = cx.value(handle)?.debug_string();
            cx.put_string_ret(ret, Some(&debug))
        })
        .func("__wbindgen_is_function", |cx, handle: i32| Ok(flag(cx.value(handle)?.is_function())))
        .func("__wbindgen_is_undefined", |cx, handle: i32| Ok(flag(cx.value(handle)?.is_undefined())))
        .func("__wbindgen_is_null", |cx, handle: i32| Ok(flag(cx.value(handle)?.is_null())))
        .func("__wbindgen_string_get", |cx, (ret, handle): (i32, i32)| {
            let value = cx.value(handle)?;
            cx.put_string_ret(ret, value.as_str())
        })
        .func("__wbindgen_number_get", |cx, (ret, handle): (i32, i32)| {
            let number = cx.value(handle)?.as_number();
            write_number_ret(cx, ret, number)
        })
        .func("__wbindgen_string_new", |cx, (ptr, len): (i32, i32)| {
            let text = cx.string(ptr, len)?;
            cx.put(text)
        })
        .func("__wbindgen_number_new", |cx, value: f64| cx.put(value))
        .func("__wbindgen_throw", |cx, (ptr, len): (i32, i32)| -> Result<()> {
            let message = cx.string(ptr, len)?;
            Err(HostError::error(message).into())
        })
        .func("__wbindgen_closure_new", |cx, (a, b, dtor, shim): (i32, i32, i32, i32)| {
            let exports = &cx.config().exports;
            let closure = cx.shared().closures.wrap(
                a,
                b,
                GuestFn::dispatched(exports.closure_destroy.as_str(), dtor),
                GuestFn::dispatched(exports.closure_invoke.as_str(), shim),
            );
            cx.put(HostValue::Closure(closure))
        })
        .func("_wbg_cb_unref", |cx, handle: i32| {
            let closure = cx.closure(handle)?;
            closure.unref(cx.guest())
        });
}

/// Write an optional number as `(is_some: i32, _, value: f64)` at `ret`
fn write_number_ret(cx: &mut Cx<'_, '_>, ret: i32, number: Option<f64>) -> Result<()> {
    let views: &MemoryViews = &cx.shared().views;
    let guest = cx.guest();
    let ret = ret as u32;
    let words = views.words(guest)?;
    words.set_f64(guest, offset_by(ret, 8)?, number.unwrap_or(0.0))?;
    words.set_i32(guest, ret, flag(number.is_some()))
}
