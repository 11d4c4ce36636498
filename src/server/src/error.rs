//! HTTP error conversions.

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use isoshelf_core::error::ShelfError;

/// Map a ShelfError to an HTTP status.
pub fn status_for(err: &ShelfError) -> StatusCode {
    match err {
        ShelfError::NotFound(_) => StatusCode::NOT_FOUND,
        ShelfError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        ShelfError::ArchiveUnavailable { .. }
        | ShelfError::ExtractionFailed { .. }
        | ShelfError::IoError(_)
        | ShelfError::StoreUnavailable(_)
        | ShelfError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Plain-text response carrying only the public description.
pub fn error_response(err: &ShelfError) -> Response<Body> {
    text_response(status_for(err), err.public_message())
}

/// Plain-text response with the given status.
pub fn text_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{}\n", message)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = ShelfError::NotFound("image fedora".to_string());
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_path_maps_to_400() {
        let err = ShelfError::InvalidPath("a/../../etc".to_string());
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_errors_map_to_500() {
        let errors = [
            ShelfError::ArchiveUnavailable {
                image: "u".to_string(),
                message: "m".to_string(),
            },
            ShelfError::ExtractionFailed {
                image: "u".to_string(),
                path: "p".to_string(),
                message: "m".to_string(),
            },
            ShelfError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "x")),
            ShelfError::StoreUnavailable("s".to_string()),
        ];
        for err in &errors {
            assert_eq!(status_for(err), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[tokio::test]
    async fn test_error_response_hides_internal_paths() {
        let err = ShelfError::StoreUnavailable("/srv/isos: permission denied".to_string());
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("/srv"));
        assert!(body.contains("Image store is unavailable"));
    }
}
