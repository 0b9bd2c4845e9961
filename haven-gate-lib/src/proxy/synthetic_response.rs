use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Empty};
use hyper::body::Bytes;
use hyper::Response;
use tracing::warn;

use crate::gate::json_error;
use crate::proxy::http_result::HttpError;

type RespBody = BoxBody<Bytes, hyper::Error>;

/// JSON response for a forwarding failure (4xx/5xx)
pub(crate) fn synthetic_error_response(error: &HttpError) -> Response<RespBody> {
    let status = StatusCode::from(error);
    let reason = status.canonical_reason().unwrap_or("Error");
    let message = match error {
        HttpError::UpstreamTimeout(_) => "The application took too long to respond.",
        HttpError::UpstreamUnreachable(_) => "The application is currently unreachable.",
        HttpError::InvalidUri(_) => "Malformed request target.",
    };

    json_error(status, reason, message, None).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build error response, sending empty body");
        status_only(status)
    })
}

pub(crate) fn status_only(status: StatusCode) -> Response<RespBody> {
    let mut resp = Response::new(Empty::<Bytes>::new().map_err(|never| match never {}).boxed());
    *resp.status_mut() = status;
    resp
}
