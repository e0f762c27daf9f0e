use alloc::rc::Rc;
use log::debug;

use super::{Cx, ImportTable, flag};
use crate::host::Response;
use crate::value::{HostObject, HostValue};
use crate::{HostError, Result};

pub(super) fn register(table: &mut ImportTable) {
    table
        // completes before returning; the response handle stands in for the settled promise
        .catching("fetch", |cx, (window, ptr, len): (i32, i32, i32)| {
            cx.object(window, HostObject::Window)?;
            let input = cx.string(ptr, len)?;
            let url = cx
                .host()
                .history()
                .location()
                .join(&input)
                .map_err(|err| HostError::type_error(alloc::format!("failed to parse url '{input}': {err}")))?;

            debug!("module fetch of {url}");
            let response = cx.host().fetcher_mut().fetch(&url).map_err(|err| HostError::network(err.to_string()))?;
            cx.put(HostValue::Response(Rc::new(response)))
        })
        .func("ok", |cx, response: i32| Ok(flag(response_of(cx, response)?.ok())))
        .func("status", |cx, response: i32| Ok(response_of(cx, response)?.status as i32))
        .catching("text", |cx, response: i32| {
            let text = response_of(cx, response)?.text();
            cx.put(text)
        });
}

fn response_of(cx: &Cx<'_, '_>, handle: i32) -> Result<Rc<Response>> {
    cx.value(handle)?.as_response().cloned()
}
