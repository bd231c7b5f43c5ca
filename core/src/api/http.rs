//! HTTP route handlers for the streaming gateway (component G).
//!
//! All handlers are thin; business logic lives in [`crate::services`] and
//! [`crate::devices`]. Grounded on the reference stack's range-probing
//! `stream_audio` handler for the overall extractor/response shape, replaced
//! end to end with the fixed-block range algebra from the data model.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_stream::stream;
use axum::body::Body;
use bytes::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::api::AppState;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol_constants::{DLNA_TIME_SEEK_RANGE, DLNA_TRANSFER_MODE, MAX_GENA_BODY_SIZE, STREAM_CONTENT_TYPE};
use crate::services::IdleCloseArgs;
use crate::tokens::serialize_token;
use crate::utils::now_millis;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route(
            "/stream/{message_id}/{remote_token}",
            get(stream_handler).options(stream_probe_handler).put(stream_probe_handler),
        )
        .route("/upnp/notify/{local_token}", any(gena_notify_handler))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.reader.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "gone"),
    }
}

fn dlna_headers(headers: &mut HeaderMap) {
    headers.insert("transferMode.dlna.org", DLNA_TRANSFER_MODE.parse().unwrap());
    headers.insert("TimeSeekRange.dlna.org", DLNA_TIME_SEEK_RANGE.parse().unwrap());
    headers.insert(
        "contentFeatures.dlna.org",
        "DLNA.ORG_OP=01;DLNA.ORG_CI=0;".parse().unwrap(),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".parse().unwrap());
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS, PUT".parse().unwrap());
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, "Range, Content-Type".parse().unwrap());
}

async fn stream_probe_handler() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    dlna_headers(&mut headers);
    headers.insert(header::ACCEPT_RANGES, "bytes".parse().unwrap());
    (StatusCode::OK, headers, Body::empty())
}

/// Parses `Range: bytes=<first>-<last>?`. Returns `None` on any malformed
/// input; the caller maps that to `400`.
fn parse_range(raw: &str) -> Option<(u64, Option<u64>)> {
    let spec = raw.strip_prefix("bytes=")?;
    let (first_str, last_str) = spec.split_once('-')?;
    let first: u64 = first_str.trim().parse().ok()?;
    let last = if last_str.trim().is_empty() {
        None
    } else {
        Some(last_str.trim().parse().ok()?)
    };
    Some((first, last))
}

async fn stream_handler(
    Path((message_id_str, remote_token_str)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, BridgeError> {
    let message_id: u64 = message_id_str.parse().map_err(|_| BridgeError::Unauthorized)?;
    let remote_token: u64 = remote_token_str.parse().map_err(|_| BridgeError::Unauthorized)?;

    let local_token = serialize_token(remote_token, message_id);
    let session = state
        .sessions
        .get(local_token)
        .ok_or_else(|| BridgeError::Forbidden("unknown stream token".to_string()))?;

    let block_size = state.config.bot.block_size;
    let range_requested = headers.get(header::RANGE).is_some();

    let (safe_offset, mut data_to_skip, requested_last) = match headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
    {
        None => (0u64, 0u64, None),
        Some(raw) => {
            let (first, last) = parse_range(raw)
                .ok_or_else(|| BridgeError::BadRequest(format!("malformed Range header: {raw}")))?;
            let safe_offset = (first / block_size) * block_size;
            let data_to_skip = first - safe_offset;
            if data_to_skip > block_size {
                return Err(BridgeError::InternalInconsistent("data_to_skip > block_size".to_string()));
            }
            (safe_offset, data_to_skip, last)
        }
    };

    let message = state
        .reader
        .get_message(message_id as i64)
        .await
        .map_err(|_| BridgeError::NotFound(format!("message {message_id} not found")))?;

    let size = message.size;

    if safe_offset + data_to_skip > size {
        return Err(BridgeError::BadRequest("range starts beyond end of file".to_string()));
    }
    if let Some(last) = requested_last {
        if last >= size {
            return Err(BridgeError::BadRequest("range end at or beyond file size".to_string()));
        }
    }
    let max_size = requested_last.unwrap_or(size);

    let status = if range_requested || max_size != size {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let read_after = safe_offset + data_to_skip;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_RANGE,
        format!("bytes {read_after}-{max_size}/{size}").parse().unwrap(),
    );
    response_headers.insert(header::ACCEPT_RANGES, "bytes".parse().unwrap());
    response_headers.insert(header::CONTENT_LENGTH, size.to_string().parse().unwrap());
    dlna_headers(&mut response_headers);
    response_headers.insert(header::CONTENT_TYPE, STREAM_CONTENT_TYPE.parse().unwrap());
    let quoted_name = utf8_percent_encode(&message.display_name(), NON_ALPHANUMERIC).to_string();
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        format!("inline; filename=\"{quoted_name}\"").parse().unwrap(),
    );

    let closing = Arc::new(AtomicBool::new(false));
    session
        .transports
        .lock()
        .await
        .push(crate::services::TransportHandle {
            id: rand::random(),
            closing: Arc::clone(&closing),
        });

    let chat_id = message.chat_id;
    let app_state = state.clone();
    let reader = Arc::clone(&state.reader);
    let session_for_stream = Arc::clone(&session);

    let body_stream = stream! {
        let _guard = TransportCloseGuard { closing };
        let mut offset = safe_offset;
        loop {
            schedule_idle_check(
                &app_state,
                IdleCloseArgs { message_id: message.message_id, chat_id, local_token, size },
            );

            let block = match reader.get_block(&message, offset, block_size).await {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("[stream] get_block failed for token {}: {}", local_token, e);
                    yield Err(std::io::Error::other(e.to_string()));
                    break;
                }
            };
            if block.is_empty() {
                break;
            }

            let new_offset = offset + block.len() as u64;
            let mut chunk = Bytes::from(block);
            if data_to_skip > 0 {
                let skip = (data_to_skip as usize).min(chunk.len());
                chunk = chunk.slice(skip..);
                data_to_skip = 0;
            }
            if new_offset > max_size {
                let overrun = (new_offset - max_size) as usize;
                let keep = chunk.len().saturating_sub(overrun);
                chunk = chunk.slice(..keep);
            }

            if _guard.closing.load(Ordering::SeqCst) {
                break;
            }

            yield Ok::<Bytes, std::io::Error>(chunk);
            session_for_stream.downloaded_blocks.lock().await.insert(offset);

            offset = new_offset;
            if offset >= max_size {
                break;
            }
        }
    };

    let body = Body::from_stream(body_stream);
    Ok((status, response_headers, body).into_response())
}

struct TransportCloseGuard {
    closing: Arc<AtomicBool>,
}

impl Drop for TransportCloseGuard {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

fn schedule_idle_check(state: &AppState, args: IdleCloseArgs) {
    let state = state.clone();
    if let Some(session) = state.sessions.get(args.local_token) {
        session.idle_debounce.update_args(args, move |a| idle_fire(state.clone(), a));
    }
}

fn idle_fire(state: AppState, args: IdleCloseArgs) -> BoxFuture {
    Box::pin(async move {
        let Some(session) = state.sessions.get(args.local_token) else {
            return;
        };

        let transports = session.transports.lock().await;
        let all_closing = !transports.is_empty() && transports.iter().all(|t| t.closing.load(Ordering::SeqCst));
        drop(transports);

        if !all_closing {
            session.idle_debounce.reschedule(move |a| idle_fire(state.clone(), a));
            return;
        }

        state.sessions.remove(args.local_token);

        let downloaded = session.downloaded_blocks.lock().await.len() as u64;
        let block_size = state.config.bot.block_size;
        let total_blocks = (args.size / block_size) + 1;
        let remaining = total_blocks.saturating_sub(downloaded);
        let remaining_percent = (remaining as f64 / total_blocks as f64) * 100.0;

        if let Some(device) = &session.device {
            let _ = device.stop().await;
            device.on_close(args.local_token).await;
        }
        session.idle_debounce.close();

        state.emitter.emit_stream(crate::events::StreamEvent::Closed {
            remaining_percent,
            chat_id: args.chat_id,
            message_id: args.message_id,
            local_token: args.local_token,
            timestamp: now_millis(),
        });
    })
}

async fn gena_notify_handler(State(state): State<AppState>, req: Request<Body>) -> BridgeResult<impl IntoResponse> {
    let (parts, body) = req.into_parts();

    if parts.method.as_str() != "NOTIFY" {
        return Err(BridgeError::BadRequest(format!("expected NOTIFY, got {}", parts.method)));
    }

    let sid = parts
        .headers
        .get("SID")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BridgeError::BadRequest("missing SID header".to_string()))?
        .to_string();

    let body_bytes = axum::body::to_bytes(body, MAX_GENA_BODY_SIZE)
        .await
        .map_err(|e| BridgeError::BadRequest(format!("failed to read NOTIFY body: {e}")))?;

    if let Some(notify) = &state.upnp_notify {
        notify.handle_notify(&sid, &String::from_utf8_lossy(&body_bytes)).await;
    }

    Ok(StatusCode::OK)
}
