use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value as JsonValue;
use tokio::time::sleep;

use crate::{transport, Body, CallRequest, CallResult, ClientOptions, RetryPolicy, TlsOptions};

/// Per-request result handler, invoked exactly once per terminal outcome
/// with `(result, id)` on the executor's task.
pub type ResponseCallback = Box<dyn FnMut(&CallResult, &str) + Send + 'static>;

/// Concurrent outbound HTTP request executor.
///
/// Requests accumulate through the fluent `add_*` methods and run on a
/// single cooperative task when [`execute_all`](Self::execute_all) drains
/// the queue: batches bounded by `max_concurrency` race to completion,
/// retryable outcomes are re-submitted inside their batch, and every queued
/// id ends up with exactly one [`CallResult`] in the returned map.
/// Options survive a drain; the queue and callback table do not.
pub struct MultiCallClient {
    options: ClientOptions,
    queue: Vec<CallRequest>,
    callbacks: HashMap<String, ResponseCallback>,
}

impl fmt::Debug for MultiCallClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiCallClient")
            .field("options", &self.options)
            .field("queued", &self.queue.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Default for MultiCallClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiCallClient {
    /// Creates an executor with default options.
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    /// Creates an executor with explicit options.
    pub fn with_options(options: ClientOptions) -> Self {
        Self {
            options,
            queue: Vec::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Current options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    // ── Configuration ─────────────────────────────────────────────────────

    /// Caps the number of in-flight requests. `0` means unbounded.
    pub fn set_max_concurrency(&mut self, limit: usize) -> &mut Self {
        self.options.max_concurrency = limit;
        self
    }

    /// Sets connect and total timeouts in seconds, each clamped to ≥ 1.
    pub fn set_timeouts(&mut self, connect_secs: u64, total_secs: u64) -> &mut Self {
        self.options.connect_timeout_secs = connect_secs.max(1);
        self.options.total_timeout_secs = total_secs.max(1);
        self
    }

    /// Replaces the TLS configuration.
    pub fn set_ssl(&mut self, tls: TlsOptions) -> &mut Self {
        self.options.tls = tls;
        self
    }

    /// Configures the retry policy: retries after the initial attempt, flat
    /// delay between attempts, and the retryable status codes.
    pub fn set_retries(
        &mut self,
        max_retries: u32,
        base_delay_ms: u64,
        retryable_status: impl IntoIterator<Item = u16>,
    ) -> &mut Self {
        self.options.retry = RetryPolicy {
            max_retries,
            base_delay_ms,
            retryable_status: retryable_status.into_iter().collect(),
            retry_on_network_error: self.options.retry.retry_on_network_error,
        };
        self
    }

    /// Whether transport-level failures (DNS, reset, timeout) are retried.
    pub fn retry_on_network_error(&mut self, retry: bool) -> &mut Self {
        self.options.retry.retry_on_network_error = retry;
        self
    }

    /// Sets the User-Agent. An empty string removes the override.
    pub fn set_user_agent(&mut self, agent: impl Into<String>) -> &mut Self {
        self.options.user_agent = agent.into();
        self
    }

    /// Adds a header applied to every request; request headers win.
    pub fn set_default_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.options
            .default_headers
            .push((name.into(), value.into()));
        self
    }

    // ── Queue builder ─────────────────────────────────────────────────────

    /// Queues a GET with optional query parameters.
    pub fn add_get(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> &mut Self {
        let body = if query.is_empty() {
            Body::None
        } else {
            Body::UrlEncoded(owned_pairs(query))
        };
        self.enqueue(
            CallRequest::new(id, url, "GET")
                .with_body(body)
                .with_headers(owned_pairs(headers)),
        )
    }

    /// Queues a POST with a JSON body.
    pub fn add_post(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        data: JsonValue,
        headers: &[(&str, &str)],
    ) -> &mut Self {
        self.enqueue(
            CallRequest::new(id, url, "POST")
                .with_body(Body::Json(data))
                .with_headers(owned_pairs(headers)),
        )
    }

    /// Queues a PUT with a JSON body.
    pub fn add_put(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        data: JsonValue,
        headers: &[(&str, &str)],
    ) -> &mut Self {
        self.enqueue(
            CallRequest::new(id, url, "PUT")
                .with_body(Body::Json(data))
                .with_headers(owned_pairs(headers)),
        )
    }

    /// Queues a POST with an urlencoded form body. The form content type
    /// overrides any caller-supplied `Content-Type` header.
    pub fn add_post_form(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        fields: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> &mut Self {
        self.enqueue(
            CallRequest::new(id, url, "POST")
                .with_body(Body::UrlEncoded(owned_pairs(fields)))
                .with_headers(owned_pairs(headers)),
        )
    }

    /// Queues a multipart POST. `files` pairs a field name with a
    /// filesystem path; an unreadable path terminalizes only this id.
    pub fn add_post_multipart(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        fields: &[(&str, &str)],
        files: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> &mut Self {
        self.enqueue(
            CallRequest::new(id, url, "POST")
                .with_body(Body::Multipart {
                    fields: owned_pairs(fields),
                    files: owned_pairs(files),
                })
                .with_headers(owned_pairs(headers)),
        )
    }

    /// Queues a POST with a raw body and explicit content type.
    pub fn add_post_raw(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        body: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
        headers: &[(&str, &str)],
    ) -> &mut Self {
        self.enqueue(
            CallRequest::new(id, url, "POST")
                .with_body(Body::Raw {
                    content_type: content_type.into(),
                    bytes: body.into(),
                })
                .with_headers(owned_pairs(headers)),
        )
    }

    /// Generic escape hatch: any method (upper-cased, empty defaults to
    /// GET), any [`Body`] variant, plus advisory transport options.
    pub fn add_request(
        &mut self,
        id: impl Into<String>,
        url: impl Into<String>,
        method: &str,
        body: Body,
        headers: &[(&str, &str)],
        options: &[(&str, &str)],
    ) -> &mut Self {
        self.enqueue(
            CallRequest::new(id, url, method)
                .with_body(body)
                .with_headers(owned_pairs(headers))
                .with_options(owned_pairs(options)),
        )
    }

    /// Registers or overwrites the result callback for `id`. Registering
    /// for an id that never executes is a no-op, not an error.
    pub fn on_response(
        &mut self,
        id: impl Into<String>,
        callback: impl FnMut(&CallResult, &str) + Send + 'static,
    ) -> &mut Self {
        self.callbacks.insert(id.into(), Box::new(callback));
        self
    }

    /// Number of distinct queued ids.
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Empties the queue and the callback table. Idempotent.
    pub fn clear_queue(&mut self) -> &mut Self {
        self.queue.clear();
        self.callbacks.clear();
        self
    }

    fn enqueue(&mut self, request: CallRequest) -> &mut Self {
        if let Some(slot) = self.queue.iter_mut().find(|queued| queued.id == request.id) {
            *slot = request;
        } else {
            self.queue.push(request);
        }
        self
    }

    // ── Execution ─────────────────────────────────────────────────────────

    /// Drains the queue and returns the result map keyed by id.
    ///
    /// Blocks the calling task until every request, retries included, has a
    /// terminal outcome. Per-request failures are data in the map, never
    /// errors; callbacks fire as their ids complete. The queue and callback
    /// table are consumed; options stay.
    pub async fn execute_all(&mut self) -> HashMap<String, CallResult> {
        let queue = mem::take(&mut self.queue);
        let callbacks = mem::take(&mut self.callbacks);
        drain(queue, callbacks, self.options.clone()).await
    }

    /// Synonym of [`execute_all`](Self::execute_all).
    pub async fn wait_for_all(&mut self) -> HashMap<String, CallResult> {
        self.execute_all().await
    }

    /// Hands the queued batch to a detached execution path and returns
    /// without waiting for results.
    ///
    /// Returns `false` on an empty queue. Otherwise the batch is spawned
    /// onto the hosting tokio runtime, or — when the caller runs outside
    /// any runtime — executed synchronously on a throwaway current-thread
    /// runtime, and `true` is returned once dispatch was initiated. The
    /// queue and callback table are cleared either way; callbacks still
    /// fire inside the detached task.
    pub fn fire_and_forget(&mut self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        let queue = mem::take(&mut self.queue);
        let callbacks = mem::take(&mut self.callbacks);
        let options = self.options.clone();
        let batch = async move {
            drain(queue, callbacks, options).await;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(batch);
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(batch),
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("fire-and-forget dropped batch: no runtime available: {_err}");
                }
            },
        }
        true
    }
}

/// Executor core: drains `queue` in batches of `max_concurrency`, retries
/// inside each batch, dispatches callbacks per completion and aggregates
/// the keyed result map.
async fn drain(
    queue: Vec<CallRequest>,
    mut callbacks: HashMap<String, ResponseCallback>,
    options: ClientOptions,
) -> HashMap<String, CallResult> {
    let mut results = HashMap::with_capacity(queue.len());
    if queue.is_empty() {
        return results;
    }

    let http = match transport::build_http_client(&options) {
        Ok(http) => http,
        Err(err) => {
            // Client construction failed: every id gets the same terminal
            // outcome and its callback.
            let error = err.to_string();
            for request in queue {
                let result = CallResult::from_error(error.clone(), 0.0);
                dispatch_callback(&mut callbacks, &request.id, &result);
                results.insert(request.id, result);
            }
            return results;
        }
    };

    let mut pending = queue;
    let batch_size = if options.max_concurrency == 0 {
        pending.len()
    } else {
        options.max_concurrency
    };

    while !pending.is_empty() {
        let take = batch_size.min(pending.len());
        let batch: Vec<CallRequest> = pending.drain(..take).collect();

        #[cfg(feature = "tracing")]
        tracing::debug!("submitting batch of {} request(s)", batch.len());

        let mut in_flight: FuturesUnordered<_> = batch
            .into_iter()
            .map(|request| run_call(&http, request, &options))
            .collect();

        while let Some((id, result)) = in_flight.next().await {
            dispatch_callback(&mut callbacks, &id, &result);
            results.insert(id, result);
        }
    }

    results
}

/// Runs one request to its terminal outcome, looping through retries. The
/// reported duration spans every attempt and retry delay.
async fn run_call(
    http: &reqwest::Client,
    request: CallRequest,
    options: &ClientOptions,
) -> (String, CallResult) {
    let started = Instant::now();
    let mut retries = 0u32;
    loop {
        match transport::send_request(http, &request, options).await {
            Ok((status, body)) => {
                if options.retry.should_retry(retries, Some(status), false) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("retrying {} after status {status}", request.id);
                    sleep(options.retry.delay()).await;
                    retries += 1;
                    continue;
                }
                let result =
                    CallResult::from_response(status, body, started.elapsed().as_secs_f64());
                return (request.id, result);
            }
            Err(err) => {
                if options.retry.should_retry(retries, None, err.is_network()) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("retrying {} after network error: {err}", request.id);
                    sleep(options.retry.delay()).await;
                    retries += 1;
                    continue;
                }
                let result =
                    CallResult::from_error(err.to_string(), started.elapsed().as_secs_f64());
                return (request.id, result);
            }
        }
    }
}

/// Invokes the callback registered for `id`, if any, exactly once. A
/// panicking callback is contained here so the remaining ids still get
/// their callbacks and the aggregate stays complete.
fn dispatch_callback(
    callbacks: &mut HashMap<String, ResponseCallback>,
    id: &str,
    result: &CallResult,
) {
    if let Some(mut callback) = callbacks.remove(id) {
        if catch_unwind(AssertUnwindSafe(|| callback(result, id))).is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!("response callback for {id} panicked");
        }
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::MultiCallClient;
    use crate::Body;

    #[test]
    fn queue_size_counts_distinct_ids() {
        let mut client = MultiCallClient::new();
        client
            .add_get("a", "http://localhost/one", &[], &[])
            .add_get("a", "http://localhost/two", &[], &[])
            .add_post("b", "http://localhost/", json!({}), &[]);
        assert_eq!(client.queue_size(), 2);
    }

    #[test]
    fn re_adding_an_id_keeps_the_last_descriptor_in_place() {
        let mut client = MultiCallClient::new();
        client
            .add_get("a", "http://localhost/one", &[], &[])
            .add_get("b", "http://localhost/", &[], &[])
            .add_post("a", "http://localhost/two", json!({"x": 1}), &[]);
        assert_eq!(client.queue[0].id, "a");
        assert_eq!(client.queue[0].method, "POST");
        assert_eq!(client.queue[0].url, "http://localhost/two");
    }

    #[test]
    fn clear_queue_is_idempotent_and_drops_callbacks() {
        let mut client = MultiCallClient::new();
        client
            .add_get("a", "http://localhost/", &[], &[])
            .on_response("a", |_, _| {});
        client.clear_queue().clear_queue();
        assert_eq!(client.queue_size(), 0);
        assert!(client.callbacks.is_empty());
    }

    #[test]
    fn timeouts_clamp_to_at_least_one_second() {
        let mut client = MultiCallClient::new();
        client.set_timeouts(0, 0);
        assert_eq!(client.options().connect_timeout_secs, 1);
        assert_eq!(client.options().total_timeout_secs, 1);
    }

    #[test]
    fn set_retries_collapses_duplicate_codes_and_keeps_network_flag() {
        let mut client = MultiCallClient::new();
        client
            .retry_on_network_error(true)
            .set_retries(3, 10, [500, 500, 503]);
        assert_eq!(client.options().retry.retryable_status.len(), 2);
        assert!(client.options().retry.retry_on_network_error);
        assert_eq!(client.options().retry.max_retries, 3);
    }

    #[test]
    fn on_response_overwrites_earlier_registration() {
        let mut client = MultiCallClient::new();
        client
            .on_response("a", |_, _| {})
            .on_response("a", |_, _| {});
        assert_eq!(client.callbacks.len(), 1);
    }

    #[test]
    fn add_post_form_uses_the_urlencoded_variant() {
        let mut client = MultiCallClient::new();
        client.add_post_form("f", "http://localhost/", &[("a", "1")], &[]);
        assert!(matches!(client.queue[0].body, Body::UrlEncoded(_)));
    }

    #[test]
    fn add_request_normalizes_the_method() {
        let mut client = MultiCallClient::new();
        client
            .add_request("m", "http://localhost/", "purge", Body::None, &[], &[])
            .add_request("n", "http://localhost/", "", Body::None, &[], &[]);
        assert_eq!(client.queue[0].method, "PURGE");
        assert_eq!(client.queue[1].method, "GET");
    }

    #[test]
    fn fire_and_forget_reports_an_empty_queue() {
        let mut client = MultiCallClient::new();
        assert!(!client.fire_and_forget());
    }
}
