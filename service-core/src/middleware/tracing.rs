use axum::http::{HeaderName, HeaderValue};
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Every request carries an `x-request-id`: the caller's if one was sent,
/// a freshly minted one otherwise. The response echoes it back so log
/// lines can be tied to the reply the operator saw.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = match req.headers().get(&REQUEST_ID_HEADER) {
        Some(existing) => existing.clone(),
        None => {
            let minted = mint_request_id();
            req.headers_mut()
                .insert(&REQUEST_ID_HEADER, minted.clone());
            minted
        }
    };

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(&REQUEST_ID_HEADER, request_id);
    response
}

fn mint_request_id() -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
