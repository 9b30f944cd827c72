use super::KeyStrategy;
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use futures::stream::{self, Stream, StreamExt};
use http_body_util::BodyExt;

/// Default upper bound for buffering a login form
const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Canonical form of an account identifier: trimmed and lower-cased.
///
/// Returns `None` for identifiers that are empty after trimming.
pub fn normalize_account(account: &str) -> Option<String> {
    let account = account.trim();
    if account.is_empty() {
        None
    } else {
        Some(account.to_lowercase())
    }
}

/// Keys requests by the account they claim, read from a submitted field
///
/// Looks for the field (default `email`) in an urlencoded form or a JSON
/// object body, then in the query string. The key is `{field}:{account}`.
/// Requests that name no account are not limited.
///
/// The body is buffered up to a size limit and put back on the request, so
/// the handler still sees it. Bodies that declare a larger `Content-Length`
/// are left untouched and only the query string is consulted.
#[derive(Debug, Clone)]
pub struct SubmittedAccount {
    field: String,
    body_limit: usize,
}

impl SubmittedAccount {
    pub fn new() -> Self {
        Self::field("email")
    }

    /// Read a differently named field
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    fn account_in_body(&self, content_type: &str, body: &Bytes) -> Option<String> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/x-www-form-urlencoded" {
            self.account_in_urlencoded(body)
        } else if essence == "application/json" || essence.ends_with("+json") {
            serde_json::from_slice::<serde_json::Value>(body)
                .ok()?
                .get(&self.field)?
                .as_str()
                .map(str::to_string)
        } else {
            None
        }
    }

    fn account_in_urlencoded(&self, input: &[u8]) -> Option<String> {
        url::form_urlencoded::parse(input)
            .find(|(name, _)| name == self.field.as_str())
            .map(|(_, value)| value.into_owned())
    }

    /// Buffer the body if it is small enough, restoring it on the request
    ///
    /// A body that outgrows the limit while streaming is handed back intact:
    /// the chunks read so far are replayed ahead of the unread remainder.
    async fn buffer_body(&self, request: &mut Request) -> Option<Bytes> {
        let declared = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len == 0 || len > self.body_limit) {
            return None;
        }

        let mut body = std::mem::take(request.body_mut());
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut len = 0;

        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    // Trailers carry no account
                    let Ok(data) = frame.into_data() else { continue };
                    len += data.len();
                    chunks.push(data);

                    if len > self.body_limit {
                        tracing::debug!(
                            target: "floodgate.keys.body",
                            limit = self.body_limit,
                            "Request body exceeds account key limit"
                        );
                        *request.body_mut() = replay(chunks, body.into_data_stream());
                        return None;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        target: "floodgate.keys.body",
                        error = %e,
                        "Failed to buffer request body for account key"
                    );
                    *request.body_mut() = replay(chunks, stream::iter([Err(e)]));
                    return None;
                }
            }
        }

        let bytes = match chunks.len() {
            0 => Bytes::new(),
            1 => chunks.swap_remove(0),
            _ => Bytes::from(chunks.concat()),
        };
        *request.body_mut() = Body::from(bytes.clone());
        Some(bytes)
    }
}

/// A body yielding `read` followed by whatever `rest` still produces
fn replay<S>(read: Vec<Bytes>, rest: S) -> Body
where
    S: Stream<Item = Result<Bytes, axum::Error>> + Send + 'static,
{
    let read = stream::iter(read.into_iter().map(Ok::<_, axum::Error>));
    Body::from_stream(read.chain(rest))
}

impl Default for SubmittedAccount {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStrategy for SubmittedAccount {
    fn name(&self) -> &'static str {
        "account"
    }

    async fn key(&self, request: &mut Request) -> Option<String> {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let from_body = match content_type {
            Some(content_type) => match self.buffer_body(request).await {
                Some(body) => self.account_in_body(&content_type, &body),
                None => None,
            },
            None => None,
        };

        let account = from_body.or_else(|| {
            request
                .uri()
                .query()
                .and_then(|query| self.account_in_urlencoded(query.as_bytes()))
        })?;

        normalize_account(&account).map(|account| format!("{}:{}", self.field, account))
    }
}
