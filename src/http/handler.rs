//! Static file responses.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::{HostTable, MediaTable, Site};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, SERVER_NAME, StatusCode};

/// Builds the response for a complete request.
///
/// Never fails: filesystem problems become 404, 403 or 500 responses, and the
/// cause of a 500 is logged here rather than returned.
pub fn respond(request: &Request, site: &Site) -> Response {
    if request.method != Method::GET {
        return Response::not_implemented();
    }

    let path = resolve_path(request, &site.hosts);

    let response = match serve_file(&path, &site.media) {
        Ok(response) => response,
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::InvalidInput => Response::not_found(),
            io::ErrorKind::PermissionDenied => Response::forbidden(),
            _ => {
                tracing::error!(path = %path.display(), error = %e, "failed to serve file");
                Response::internal_error()
            }
        },
    };

    tracing::debug!(
        method = request.method.as_str(),
        target = %request.target,
        path = %path.display(),
        status = response.status.as_u16(),
        "request served"
    );

    response
}

/// Maps the request target onto the document root of its virtual host.
///
/// `/` maps to `index.html`; any other target is appended to the root as is.
pub fn resolve_path(request: &Request, hosts: &HostTable) -> PathBuf {
    let root = hosts.resolve(request.host());

    let mut path = OsString::from(root.as_os_str());
    if request.target == "/" {
        path.push("/index.html");
    } else {
        path.push(&request.target);
    }
    PathBuf::from(path)
}

fn serve_file(path: &Path, media: &MediaTable) -> io::Result<Response> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Ok(Response::not_found());
    }

    let body = fs::read(path)?;
    let modified = metadata.modified()?;

    let mut builder = ResponseBuilder::new(StatusCode::Ok).header("Server", SERVER_NAME);
    if let Some(mime) = media.for_path(path) {
        builder = builder.header("Content-Type", mime);
    }

    Ok(builder
        .header("Date", httpdate::fmt_http_date(SystemTime::now()))
        .header("Last-Modified", httpdate::fmt_http_date(modified))
        .body(body)
        .build())
}
