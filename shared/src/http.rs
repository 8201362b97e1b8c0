//! HTTP helpers for Lambda functions.

use lambda_http::{Body, Response};
use serde::Serialize;
use tracing::error;

use crate::cors::ResponseHeaders;
use crate::models::ErrorBody;
use crate::Error;

/// Create a response with the given status, headers and raw body.
pub fn build_response(
    status: u16,
    headers: &ResponseHeaders,
    body: Body,
) -> Result<Response<Body>, lambda_http::Error> {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    Ok(builder.body(body).map_err(Box::new)?)
}

/// Create a JSON response with the given status code and data.
///
/// Serialization failures become a 500 with a fixed body.
pub fn json_response<T: Serialize>(
    status: u16,
    headers: &ResponseHeaders,
    data: &T,
) -> Result<Response<Body>, lambda_http::Error> {
    match serde_json::to_string(data) {
        Ok(body) => build_response(status, headers, Body::from(body)),
        Err(e) => {
            let err = Error::from(e);
            error!("Error encoding response JSON: {}", err);
            error_response(&err, headers)
        }
    }
}

/// Create the `{error, message}` response for an error.
pub fn error_response(
    err: &Error,
    headers: &ResponseHeaders,
) -> Result<Response<Body>, lambda_http::Error> {
    let body = serde_json::to_string(&ErrorBody::from(err)).unwrap_or_else(|_| {
        r#"{"error":"Internal server error","message":"An unexpected error occurred. Please try again later."}"#
            .to_string()
    });
    build_response(err.status_code(), headers, Body::from(body))
}

/// Empty-bodied 200, used for CORS preflight.
pub fn empty_response(headers: &ResponseHeaders) -> Result<Response<Body>, lambda_http::Error> {
    build_response(200, headers, Body::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cors::{build_headers, OriginDecision};

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[test]
    fn test_error_response_shape() {
        let headers = build_headers(&OriginDecision::Absent, &[], "POST, OPTIONS");
        let response = error_response(&Error::MissingQuery, &headers).unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(response.headers()["x-frame-options"], "DENY");

        let body = body_json(&response);
        assert_eq!(body["error"], "Missing query parameter");
        assert!(body["message"].as_str().unwrap().contains("equipment maintenance"));
    }

    #[test]
    fn test_empty_response() {
        let headers = build_headers(&OriginDecision::Absent, &[], "POST, OPTIONS");
        let response = empty_response(&headers).unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.body().is_empty());
    }
}
