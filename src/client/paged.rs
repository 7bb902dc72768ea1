//! Offset paging over a list query's `options` argument.

use super::utils::extract_items;
use super::WebstackClient;
use crate::error::{Result, SchemaError};
use crate::query::QueryDocument;
use futures::stream::BoxStream;
use futures::Stream;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Name of the paging argument.
pub const OPTIONS_ARGUMENT: &str = "options";

struct State {
    client: WebstackClient,
    document: QueryDocument,
    options: Map<String, Value>,
    offset: u64,
    page: u64,
    limit: u64,
    yielded: u64,
    buffered: VecDeque<Value>,
    done: bool,
    timeout: Duration,
}

/// Lazy results of an offset-paged query.
///
/// The document's `options` argument (`{offset, first}`) drives paging: `offset` is the
/// starting point and a positive `first` caps the total number of items. Pages of at
/// most `page_size` are requested until one comes back short or the cap is reached.
pub struct PagedResults {
    inner: BoxStream<'static, Result<Value>>,
}

impl PagedResults {
    pub(crate) fn new(
        client: WebstackClient,
        document: QueryDocument,
        page_size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let invalid = |reason: &str| SchemaError::InvalidArgument {
            argument: OPTIONS_ARGUMENT.to_string(),
            reason: reason.to_string(),
        };

        let options = match document.argument(OPTIONS_ARGUMENT).map(|arg| &arg.value) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(invalid("expected an object with offset and first").into()),
        };
        // fail now rather than on the first page
        document.with_argument_value(OPTIONS_ARGUMENT, Value::Null)?;

        let offset = options.get("offset").and_then(Value::as_u64).unwrap_or(0);
        let limit = options.get("first").and_then(Value::as_u64).unwrap_or(0);
        let page_size = page_size.max(1) as u64;
        let page = if limit == 0 { page_size } else { limit.min(page_size) };

        let state = State {
            client,
            document,
            options,
            offset,
            page,
            limit,
            yielded: 0,
            buffered: VecDeque::new(),
            done: false,
            timeout,
        };

        let inner = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.buffered.pop_front() {
                    state.yielded += 1;
                    return Some((Ok(item), state));
                }
                if state.done {
                    return None;
                }

                state.options.insert("offset".into(), state.offset.into());
                state.options.insert("first".into(), state.page.into());
                let result = match state
                    .document
                    .with_argument_value(OPTIONS_ARGUMENT, Value::Object(state.options.clone()))
                {
                    Ok(document) => state
                        .client
                        .execute_with_timeout(&document, state.timeout)
                        .await
                        .and_then(extract_items),
                    Err(err) => Err(err.into()),
                };

                let mut items = match result {
                    Ok(items) => items,
                    Err(err) => {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                };

                state.offset += items.len() as u64;
                if (items.len() as u64) < state.page {
                    state.done = true;
                }
                if state.limit != 0 && state.yielded + items.len() as u64 >= state.limit {
                    state.done = true;
                    items.truncate((state.limit - state.yielded) as usize);
                }
                state.buffered.extend(items);
            }
        });

        Ok(Self {
            inner: Box::pin(inner),
        })
    }
}

impl std::fmt::Debug for PagedResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedResults").finish_non_exhaustive()
    }
}

impl Stream for PagedResults {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
