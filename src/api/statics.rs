//! Dashboard asset serving
//!
//! Minimal static file delivery under the configured public root: `/` maps
//! to `/index.html`, anything containing `..` or resolving to a directory is
//! forbidden, missing files are 404, everything else is served whole with a
//! Content-Length.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::server::AppState;

/// Map a request path to a relative file path, rejecting traversal attempts
fn sanitize(path: &str) -> Option<&str> {
    let path = if path == "/" { "/index.html" } else { path };

    if path.contains("..") {
        return None;
    }
    Some(path.trim_start_matches('/'))
}

/// Fallback handler serving dashboard assets
pub async fn serve_asset(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(relative) = sanitize(uri.path()) else {
        warn!("forbidden '{}'", uri.path());
        return StatusCode::FORBIDDEN.into_response();
    };

    let fname: PathBuf = Path::new(&state.public_root).join(relative);

    match tokio::fs::metadata(&fname).await {
        Ok(meta) if meta.is_dir() => {
            warn!("forbidden '{}'", uri.path());
            StatusCode::FORBIDDEN.into_response()
        }
        Ok(_) => match tokio::fs::read(&fname).await {
            Ok(bytes) => (StatusCode::OK, bytes).into_response(),
            Err(e) => {
                warn!("failed to read '{}': {}", fname.display(), e);
                StatusCode::NOT_FOUND.into_response()
            }
        },
        Err(_) => {
            warn!("not found '{}'", uri.path());
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_maps_to_index() {
        assert_eq!(sanitize("/"), Some("index.html"));
    }

    #[test]
    fn test_plain_paths_pass_through() {
        assert_eq!(sanitize("/application.js"), Some("application.js"));
        assert_eq!(sanitize("/css/main.css"), Some("css/main.css"));
    }

    #[test]
    fn test_traversal_is_rejected() {
        assert_eq!(sanitize("/../etc/passwd"), None);
        assert_eq!(sanitize("/css/../../secret"), None);
        assert_eq!(sanitize("/.."), None);
    }
}
