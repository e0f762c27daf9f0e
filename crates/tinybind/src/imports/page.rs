use alloc::string::String;

use super::{Cx, ImportTable, flag};
use crate::heap::UNDEFINED;
use crate::host::Level;
use crate::value::{HostObject, HostValue};
use crate::Result;

pub(super) fn register(table: &mut ImportTable) {
    // window members
    table
        .func("location", |cx, window: i32| {
            cx.object(window, HostObject::Window)?;
            cx.put(HostObject::Location)
        })
        .catching("history", |cx, window: i32| {
            cx.object(window, HostObject::Window)?;
            cx.put(HostObject::History)
        })
        .func("navigator", |cx, window: i32| {
            cx.object(window, HostObject::Window)?;
            cx.put(HostObject::Navigator)
        })
        .func("clipboard", |cx, navigator: i32| {
            cx.object(navigator, HostObject::Navigator)?;
            cx.put(HostObject::Clipboard)
        })
        .catching("localStorage", |cx, window: i32| {
            cx.object(window, HostObject::Window)?;
            cx.put_opt(Some(HostObject::Storage))
        })
        .catching("href", |cx, (ret, location): (i32, i32)| {
            cx.object(location, HostObject::Location)?;
            let href = String::from(cx.host().history().href());
            cx.put_string_ret(ret, Some(&href))
        });

    // storage and clipboard
    table
        .catching("getItem", |cx, (ret, storage, ptr, len): (i32, i32, i32, i32)| {
            cx.object(storage, HostObject::Storage)?;
            let key = cx.string(ptr, len)?;
            let value = cx.host().storage().get_item(&key).map(String::from);
            cx.put_string_ret(ret, value.as_deref())
        })
        .catching("setItem", |cx, (storage, key_ptr, key_len, value_ptr, value_len): (i32, i32, i32, i32, i32)| {
            cx.object(storage, HostObject::Storage)?;
            let key = cx.string(key_ptr, key_len)?;
            let value = cx.string(value_ptr, value_len)?;
            Ok(cx.host().storage_mut().set_item(&key, &value)?)
        })
        .catching("removeItem", |cx, (storage, ptr, len): (i32, i32, i32)| {
            cx.object(storage, HostObject::Storage)?;
            let key = cx.string(ptr, len)?;
            cx.host().storage_mut().remove_item(&key);
            Ok(())
        })
        // resolves immediately; the handle stands in for the settled promise
        .catching("writeText", |cx, (clipboard, ptr, len): (i32, i32, i32)| {
            cx.object(clipboard, HostObject::Clipboard)?;
            let text = cx.string(ptr, len)?;
            cx.host().clipboard_mut().write_text(&text)?;
            Ok(UNDEFINED as i32)
        });

    // timers and history
    table
        .catching("setTimeout", |cx, (window, callback, delay): (i32, i32, i32)| {
            cx.object(window, HostObject::Window)?;
            let callback = cx.closure(callback)?;
            Ok(cx.host().timers_mut().set_timeout(callback, delay))
        })
        .func("clearTimeout", |cx, (window, id): (i32, i32)| {
            cx.object(window, HostObject::Window)?;
            cx.host().timers_mut().clear_timeout(id);
            Ok(())
        })
        .catching("pushState", |cx, args: (i32, i32, i32, i32, i32, i32)| {
            let (state, url) = history_args(cx, args)?;
            Ok(cx.host().history_mut().push_state(state, url.as_deref())?)
        })
        .catching("replaceState", |cx, args: (i32, i32, i32, i32, i32, i32)| {
            let (state, url) = history_args(cx, args)?;
            Ok(cx.host().history_mut().replace_state(state, url.as_deref())?)
        });

    // intersection observers
    table
        .catching("newIntersectionObserver", |cx, callback: i32| {
            let callback = cx.closure(callback)?;
            let observer = cx.host().observers_mut().create(callback);
            cx.put(HostValue::Observer(observer))
        })
        .func("observe", |cx, (observer, target): (i32, i32)| {
            let observer = match cx.value(observer)? {
                HostValue::Observer(observer) => observer,
                other => return Err(other.mismatch("IntersectionObserver")),
            };
            let target = cx.node(target)?;
            cx.host().observers_mut().observe(observer, target);
            Ok(())
        })
        .func("isIntersecting", |cx, entry: i32| match cx.value(entry)? {
            HostValue::ObserverEntry(entry) => Ok(flag(entry.is_intersecting)),
            other => Err(other.mismatch("IntersectionObserverEntry")),
        });

    // console
    for (name, level) in [("log", Level::Log), ("warn", Level::Warn), ("error", Level::Error)] {
        table.func(name, move |cx, (ptr, len): (i32, i32)| {
            let message = cx.string(ptr, len)?;
            cx.host().console_mut().write(level, message);
            Ok(())
        });
    }
}

/// `(history, state, title_ptr, title_len, url_ptr, url_len)`, where a null url pointer means no url
fn history_args(
    cx: &mut Cx<'_, '_>,
    (history, state, title_ptr, title_len, url_ptr, url_len): (i32, i32, i32, i32, i32, i32),
) -> Result<(serde_json::Value, Option<String>)> {
    cx.object(history, HostObject::History)?;
    let state = cx.value(state)?.to_json().unwrap_or(serde_json::Value::Null);
    // the title is unused by browsers, but must still be valid text
    cx.string(title_ptr, title_len)?;
    let url = cx.opt_string(url_ptr, url_len)?;
    Ok((state, url))
}
