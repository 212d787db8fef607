//! The HTTP front end (C8): accepts connections and serves the single
//! JSON-RPC endpoint, the ticketed download endpoint, and CORS preflight
//! requests.

use crate::config::ServiceConfig;
use crate::db::Repository;
use crate::dispatch;
use crate::service::Service;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use ws_blob_shock::ShockClient;

type BodyError = Box<dyn std::error::Error + Send + Sync>;
type RespBody = BoxBody<Bytes, BodyError>;

fn empty_body() -> RespBody {
    Empty::new().map_err(|never: Infallible| match never {}).boxed()
}

fn full_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into()).map_err(|never: Infallible| match never {}).boxed()
}

fn incoming_body(body: Incoming) -> RespBody {
    body.map_err(|e| Box::new(e) as BodyError).boxed()
}

/// Everything a connection handler needs, held by `Arc` and cloned cheaply per request.
#[derive(Clone)]
struct AppState {
    config: Arc<ServiceConfig>,
    service: Arc<Service>,
    repo: Repository,
    shock: Option<ShockClient>,
}

/// Binds `config.bind_address()` and serves connections until the process
/// is terminated. Each accepted connection is handled on its own task.
pub async fn serve(config: Arc<ServiceConfig>, service: Arc<Service>, repo: Repository, shock: Option<ShockClient>) -> std::io::Result<()> {
    let state = AppState { config: config.clone(), service, repo, shock };
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "workspace service listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| handle(state.clone(), req));
                    if let Err(err) = hyper::server::conn::http1::Builder::new().serve_connection(io, service).await {
                        warn!(%peer, error = %err, "connection ended with an error");
                    }
                });
            }
            Err(err) => {
                error!(error = %err, "error accepting incoming connection");
            }
        }
    }
}

async fn handle(state: AppState, req: Request<Incoming>) -> Result<Response<RespBody>, Infallible> {
    let origin = req.headers().get(header::ORIGIN).cloned();
    let requested_headers = req.headers().get(header::ACCESS_CONTROL_REQUEST_HEADERS).cloned();
    let path = req.uri().path().to_string();

    let mut response = if req.method() == Method::OPTIONS && path == state.config.api_root() {
        preflight_response(origin.as_ref(), requested_headers.as_ref())
    } else if req.method() == Method::POST && path == state.config.api_root() {
        handle_rpc(&state, req).await
    } else if req.method() == Method::GET {
        if let Some(rest) = path.strip_prefix("/dl/") {
            handle_download(&state, rest).await
        } else {
            not_found()
        }
    } else {
        not_found()
    };

    if let Some(origin) = origin {
        response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    Ok(response)
}

fn preflight_response(_origin: Option<&HeaderValue>, requested_headers: Option<&HeaderValue>) -> Response<RespBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS")
        .header(header::ACCESS_CONTROL_MAX_AGE, "86400");
    if let Some(headers) = requested_headers {
        builder = builder.header(header::ACCESS_CONTROL_ALLOW_HEADERS, headers.clone());
    }
    builder.body(empty_body()).unwrap_or_else(|_| fallback_response(StatusCode::NO_CONTENT))
}

async fn handle_rpc(state: &AppState, req: Request<Incoming>) -> Response<RespBody> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return fallback_response(StatusCode::BAD_REQUEST);
        }
    };
    let now = chrono::Utc::now().timestamp();
    let reply = dispatch::dispatch(&state.service, &body, now).await;
    let serialized = reply.to_string();
    let status = StatusCode::from_u16(dispatch::http_status(serialized.as_bytes())).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full_body(serialized))
        .unwrap_or_else(|_| fallback_response(StatusCode::INTERNAL_SERVER_ERROR))
}

async fn handle_download(state: &AppState, rest: &str) -> Response<RespBody> {
    let Some((key, name)) = rest.split_once('/') else {
        return not_found();
    };
    let ticket = match state.repo.lookup_download(key).await {
        Ok(Some(ticket)) => ticket,
        Ok(None) => return not_found(),
        Err(err) => {
            error!(error = %err, "download ticket lookup failed");
            return fallback_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let decoded_name = percent_encoding::percent_decode_str(name).decode_utf8_lossy();
    if decoded_name.as_ref() != ticket.name {
        return not_found();
    }
    let now = chrono::Utc::now().timestamp();
    if ticket.expiration_time < now {
        return not_found();
    }

    let disposition = format!("attachment; filename={}", ticket.name);

    if let Some(file_path) = &ticket.file_path {
        let data = match state.repo.fs_handle().read(std::path::Path::new(file_path)).await {
            Ok(data) => data,
            Err(err) => {
                error!(error = %err, "failed to read download body from filesystem store");
                return fallback_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, data.len())
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(full_body(data))
            .unwrap_or_else(|_| fallback_response(StatusCode::INTERNAL_SERVER_ERROR));
    }

    let (Some(shock), Some(node_url), Some(token)) = (&state.shock, &ticket.shock_node, &ticket.token) else {
        return fallback_response(StatusCode::INTERNAL_SERVER_ERROR);
    };
    match shock.start_download(node_url, token).await {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(incoming_body(body))
            .unwrap_or_else(|_| fallback_response(StatusCode::INTERNAL_SERVER_ERROR)),
        Err(err) => {
            error!(error = %err, "failed to stream download from blob store");
            fallback_response(StatusCode::BAD_GATEWAY)
        }
    }
}

fn not_found() -> Response<RespBody> {
    fallback_response(StatusCode::NOT_FOUND)
}

fn fallback_response(status: StatusCode) -> Response<RespBody> {
    Response::builder().status(status).body(empty_body()).expect("static response is always valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_echoes_requested_headers() {
        let origin = HeaderValue::from_static("https://example.test");
        let requested = HeaderValue::from_static("content-type");
        let resp = preflight_response(Some(&origin), Some(&requested));
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(), "content-type");
        assert_eq!(resp.headers().get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "86400");
    }

    #[test]
    fn preflight_without_origin_omits_allow_origin() {
        let resp = preflight_response(None, None);
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
