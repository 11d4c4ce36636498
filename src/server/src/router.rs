//! Request routing.
//!
//! ```text
//! {prefix}/                         → 302 {prefix}/html/
//! {prefix}/healthz                  → ok
//! {prefix}/{html|json}/             → image inventory
//! {prefix}/{html|json}/{image}/...  → directory listing
//! {prefix}/download/{file}          → whole image
//! {prefix}/download/{image}/...     → extracted member
//! ```

use std::sync::Arc;

use hyper::header::{
    HeaderValue, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION,
};
use hyper::{Body, Method, Request, Response, StatusCode};
use isoshelf_core::error::{Result, ShelfError};
use isoshelf_runtime::Shelf;

use crate::error::{error_response, text_response};
use crate::render::{self, Format, Links};
use crate::urlpath::{decode_path, decode_segment};

/// A parsed request target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Redirect,
    Health,
    Inventory(Format),
    Listing {
        format: Format,
        image: String,
        path: String,
    },
    ImageDownload(String),
    MemberDownload {
        image: String,
        path: String,
    },
}

impl Route {
    /// Image and path a failed request was about, for logging.
    fn context(&self) -> (&str, &str) {
        match self {
            Route::Listing { image, path, .. } | Route::MemberDownload { image, path } => {
                (image.as_str(), path.as_str())
            }
            Route::ImageDownload(image) => (image.as_str(), ""),
            _ => ("", ""),
        }
    }
}

/// Dispatches HTTP requests to the shelf engine.
#[derive(Clone)]
pub struct Router {
    shelf: Arc<Shelf>,
    links: Links,
}

impl Router {
    /// Create a router serving under `prefix` (already normalized).
    pub fn new(shelf: Arc<Shelf>, prefix: &str) -> Self {
        Self {
            shelf,
            links: Links::new(prefix),
        }
    }

    /// Handle one request. Never fails; errors become HTTP responses.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let raw_path = req.uri().path().to_string();
        tracing::debug!(method = %method, path = %raw_path, "Handling request");

        if method != Method::GET && method != Method::HEAD {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
            response
                .headers_mut()
                .insert(hyper::header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let route = match self.parse(&raw_path) {
            Ok(route) => route,
            Err(e) => {
                tracing::debug!(path = %raw_path, error = %e, "Rejected request path");
                return error_response(&e);
            }
        };

        match self.dispatch(&route).await {
            Ok(response) => response,
            Err(e) => {
                let (image, path) = route.context();
                if e.is_client_error() {
                    tracing::debug!(image = %image, path = %path, error = %e, "Request failed");
                } else {
                    tracing::error!(image = %image, path = %path, error = %e, "Request failed");
                }
                error_response(&e)
            }
        }
    }

    fn parse(&self, raw_path: &str) -> Result<Route> {
        let not_found = || ShelfError::NotFound(format!("route {}", raw_path));

        let rest = raw_path
            .strip_prefix(self.links.prefix())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(not_found)?;
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            return Ok(Route::Redirect);
        }

        let (head, tail) = match rest.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };

        match head {
            "healthz" if tail.is_none() => Ok(Route::Health),
            "html" | "json" => {
                let format = if head == "html" {
                    Format::Html
                } else {
                    Format::Json
                };
                let Some(tail) = tail.filter(|t| !t.is_empty()) else {
                    return Ok(Route::Inventory(format));
                };
                let (image, path) = split_image(tail)?;
                Ok(Route::Listing {
                    format,
                    image,
                    path,
                })
            }
            "download" => {
                let tail = tail.filter(|t| !t.is_empty()).ok_or_else(not_found)?;
                if tail.contains('/') {
                    let (image, path) = split_image(tail)?;
                    Ok(Route::MemberDownload { image, path })
                } else {
                    Ok(Route::ImageDownload(decode_segment(tail)?))
                }
            }
            _ => Err(not_found()),
        }
    }

    async fn dispatch(&self, route: &Route) -> Result<Response<Body>> {
        match route {
            Route::Redirect => Ok(self.redirect()),
            Route::Health => Ok(text_response(StatusCode::OK, "ok")),
            Route::Inventory(format) => {
                let nodes = self.shelf.inventory().await?;
                match format {
                    Format::Html => Ok(html_response(render::inventory_html(&self.links, &nodes))),
                    Format::Json => json_response(&render::json_items(&self.links, "", &nodes)),
                }
            }
            Route::Listing {
                format,
                image,
                path,
            } => {
                let listing = self.shelf.list_directory(image, path).await?;
                match format {
                    Format::Html => Ok(html_response(render::listing_html(&self.links, &listing))),
                    Format::Json => json_response(&render::json_items(
                        &self.links,
                        &listing.image.name,
                        &listing.nodes,
                    )),
                }
            }
            Route::ImageDownload(file) => {
                let image = self.shelf.open_image(file).await?;
                tracing::info!(
                    image = %image.handle.name,
                    size = image.size,
                    "Serving whole image"
                );
                Ok(attachment_response(
                    &image.handle.file_name,
                    image.size,
                    Body::wrap_stream(image.stream),
                ))
            }
            Route::MemberDownload { image, path } => {
                let file = self.shelf.extract(image, path).await?;
                tracing::info!(
                    image = %image,
                    path = %path,
                    size = file.size,
                    "Serving extracted file"
                );
                Ok(attachment_response(
                    &file.name,
                    file.size,
                    Body::wrap_stream(file.stream),
                ))
            }
        }
    }

    fn redirect(&self) -> Response<Body> {
        let target = self.links.inventory(Format::Html);
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::FOUND;
        if let Ok(location) = HeaderValue::from_str(&target) {
            response.headers_mut().insert(LOCATION, location);
        }
        response
    }
}

/// Split `{image}/{path...}` into the decoded image name and path.
fn split_image(tail: &str) -> Result<(String, String)> {
    let (image, path) = tail.split_once('/').unwrap_or((tail, ""));
    Ok((decode_segment(image)?, decode_path(path)?))
}

fn html_response(html: String) -> Response<Body> {
    let mut response = Response::new(Body::from(html));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn json_response<T: serde::Serialize>(value: &T) -> Result<Response<Body>> {
    let body = serde_json::to_vec(value)
        .map_err(|e| ShelfError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

fn attachment_response(name: &str, size: u64, body: Body) -> Response<Body> {
    let mime = mime_guess::from_path(name).first_or_octet_stream();

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
    if let Ok(value) = HeaderValue::from_str(&render::content_disposition(name)) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    response
}
