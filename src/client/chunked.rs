//! Splitting large-collection queries into bounded sub-queries.
//!
//! A [`ChunkPlan`] partitions one list-valued argument of a document into ordered
//! chunks. [`ChunkedResults`] runs the chunk documents one after another and yields the
//! items of each response, in server order, before the next chunk is requested.

use super::utils::extract_items;
use super::WebstackClient;
use crate::error::{Result, SchemaError, WebstackError};
use crate::query::QueryDocument;
use crate::schema::is_list;
use futures::stream::BoxStream;
use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Ordered chunk documents derived from one document.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    argument: String,
    chunk_size: usize,
    total: usize,
    chunks: Vec<QueryDocument>,
}

impl ChunkPlan {
    /// Partition `argument` of `document` into chunks of at most `chunk_size` values.
    ///
    /// Every chunk document keeps the original selection and the other arguments. An
    /// empty list produces no chunks.
    pub fn new(document: &QueryDocument, argument: &str, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(WebstackError::Config("chunk size must be positive".into()));
        }
        let invalid = |reason: String| SchemaError::InvalidArgument {
            argument: argument.to_string(),
            reason,
        };

        let supplied = document
            .argument(argument)
            .ok_or_else(|| invalid(format!("not supplied to '{}'", document.name())))?;
        if !is_list(&supplied.type_ref) {
            return Err(invalid(format!("declared as '{}', not a list", supplied.type_ref)).into());
        }
        let values = supplied
            .value
            .as_array()
            .ok_or_else(|| invalid("value is not a list".to_string()))?;

        let chunks = values
            .chunks(chunk_size)
            .map(|chunk| document.with_argument_value(argument, Value::Array(chunk.to_vec())))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            argument: argument.to_string(),
            chunk_size,
            total: values.len(),
            chunks,
        })
    }

    /// Name of the partitioned argument.
    pub fn argument(&self) -> &str {
        &self.argument
    }

    /// Upper bound on values per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of values across all chunks.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk documents in order.
    pub fn documents(&self) -> &[QueryDocument] {
        &self.chunks
    }
}

/// Stops a [`ChunkedResults`] stream from another task.
#[derive(Debug, Clone)]
pub struct ChunkCanceller(Arc<AtomicBool>);

impl ChunkCanceller {
    /// No chunk is dispatched after this call; the stream ends.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct State {
    client: WebstackClient,
    chunks: VecDeque<QueryDocument>,
    buffered: VecDeque<Value>,
    dispatched: usize,
    total_chunks: usize,
    timeout: Duration,
    failed: bool,
    cancelled: Arc<AtomicBool>,
}

/// Lazy merged results of a chunked query.
///
/// - Chunks run sequentially in plan order; nothing is sent until the stream is polled.
/// - The cancel flag is checked before every dispatch.
/// - A failing chunk's error is yielded once and the stream ends. Items already
///   yielded stay valid.
/// - Not restartable: a new call re-issues every chunk.
pub struct ChunkedResults {
    inner: BoxStream<'static, Result<Value>>,
    cancelled: Arc<AtomicBool>,
}

impl ChunkedResults {
    pub(crate) fn new(client: WebstackClient, plan: ChunkPlan, timeout: Duration) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let state = State {
            client,
            total_chunks: plan.chunks.len(),
            chunks: plan.chunks.into(),
            buffered: VecDeque::new(),
            dispatched: 0,
            timeout,
            failed: false,
            cancelled: Arc::clone(&cancelled),
        };

        let inner = futures::stream::unfold(state, |mut state| async move {
            loop {
                if state.cancelled.load(Ordering::SeqCst) {
                    return None;
                }
                if let Some(item) = state.buffered.pop_front() {
                    return Some((Ok(item), state));
                }
                if state.failed {
                    return None;
                }
                let document = state.chunks.pop_front()?;
                state.dispatched += 1;
                if state.client.config().enable_logging {
                    tracing::debug!(
                        operation = document.name(),
                        chunk = state.dispatched,
                        of = state.total_chunks,
                        "dispatching chunk"
                    );
                }

                let result = state
                    .client
                    .execute_with_timeout(&document, state.timeout)
                    .await
                    .and_then(extract_items);
                match result {
                    Ok(items) => state.buffered.extend(items),
                    Err(err) => {
                        tracing::warn!(
                            operation = document.name(),
                            chunk = state.dispatched,
                            error = %err,
                            "chunk failed"
                        );
                        state.failed = true;
                        return Some((Err(err), state));
                    }
                }
            }
        });

        Self {
            inner: Box::pin(inner),
            cancelled,
        }
    }

    /// Stop dispatching chunks. Buffered items are discarded.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Handle that cancels this stream from elsewhere.
    pub fn canceller(&self) -> ChunkCanceller {
        ChunkCanceller(Arc::clone(&self.cancelled))
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ChunkedResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedResults")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for ChunkedResults {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_cancelled() {
            return Poll::Ready(None);
        }
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{OperationKind, QueryBuilder};
    use crate::schema::{ObjectType, OperationDef, Schema};
    use serde_json::json;

    fn document(ids: Value) -> QueryDocument {
        let schema = Schema::new()
            .with_type("Body", ObjectType::new().field("id", "Int!"))
            .with_operation(
                OperationKind::Query,
                "ListBodies",
                OperationDef::new("[Body!]!")
                    .argument("bodyIds", "[Int!]!")
                    .argument("environmentId", "String"),
            );
        QueryBuilder::new(&schema, OperationKind::Query, "ListBodies")
            .argument("bodyIds", ids)
            .argument("environmentId", json!("env"))
            .select_paths(["id"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_plan_partitions_in_order() {
        let ids: Vec<u32> = (1..=25).collect();
        let plan = ChunkPlan::new(&document(json!(ids)), "bodyIds", 10).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.total(), 25);

        let chunks: Vec<Value> = plan
            .documents()
            .iter()
            .map(|doc| doc.argument("bodyIds").unwrap().value.clone())
            .collect();
        assert_eq!(chunks[0], json!((1..=10).collect::<Vec<_>>()));
        assert_eq!(chunks[1], json!((11..=20).collect::<Vec<_>>()));
        assert_eq!(chunks[2], json!((21..=25).collect::<Vec<_>>()));

        for doc in plan.documents() {
            assert_eq!(doc.argument("environmentId").unwrap().value, json!("env"));
            assert_eq!(doc.selection().to_string(), "{id}");
        }
    }

    #[test]
    fn test_plan_empty_list() {
        let plan = ChunkPlan::new(&document(json!([])), "bodyIds", 10).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_rejects_bad_input() {
        let doc = document(json!([1, 2]));
        assert!(matches!(
            ChunkPlan::new(&doc, "bodyIds", 0),
            Err(WebstackError::Config(_))
        ));
        assert!(matches!(
            ChunkPlan::new(&doc, "environmentId", 5),
            Err(WebstackError::Schema(SchemaError::InvalidArgument { .. }))
        ));
        assert!(matches!(
            ChunkPlan::new(&doc, "missing", 5),
            Err(WebstackError::Schema(SchemaError::InvalidArgument { .. }))
        ));
    }
}
