//! HTTP front end for the image cache.
//!
//! Routes (GET only):
//!
//! ```text
//! /img/{id}?width=&height=&crop=   variant bytes (PNG)
//! /img/random                      variant of a uniformly random image
//! /img/first                       variant of the lexicographically first id
//! /meta/{id}                       metadata as JSON
//! ```
//!
//! Dimension policy lives here, not in the cache: only the sizes in
//! [`ALLOWED_DIMENSIONS`] are accepted (400 otherwise), which bounds the
//! number of variant files any client can force onto disk. The library
//! itself accepts arbitrary dimensions.

use clap::Parser;
use picshelf::{CacheConfig, CacheError, ImageCache};
use std::path::PathBuf;
use tiny_http::{Header, Request, Response, Server};
use tracing_subscriber::EnvFilter;

/// Variant sizes the HTTP layer will hand to the cache.
const ALLOWED_DIMENSIONS: &[u32] = &[2048, 1024, 512, 256, 128, 64, 32, 16];

#[derive(Parser)]
#[command(name = "picshelf")]
#[command(about = "Content-addressed image cache with an HTTP front end")]
#[command(version)]
struct Cli {
    /// Directory of source images
    #[arg(long, default_value = "assets/images")]
    images: PathBuf,

    /// Directory for canonical and variant files
    #[arg(long, default_value = "assets/cache")]
    cache: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Do not watch the image directory for changes
    #[arg(long)]
    no_watch: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cache = ImageCache::open(CacheConfig {
        image_dir: cli.images,
        cache_dir: cli.cache,
        watch: !cli.no_watch,
    })?;

    let server = Server::http(&cli.bind).map_err(|e| format!("bind {}: {e}", cli.bind))?;
    tracing::info!(addr = %cli.bind, images = cache.len(), "listening");

    for request in server.incoming_requests() {
        if let Err(e) = handle(&cache, request) {
            tracing::warn!(error = %e, "failed to send response");
        }
    }
    Ok(())
}

fn handle(cache: &ImageCache, request: Request) -> std::io::Result<()> {
    if request.method() != &tiny_http::Method::Get {
        return respond_text(request, 405, "method not allowed");
    }

    let url = request.url().to_string();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    tracing::debug!(path, query, "request");

    if let Some(id) = path.strip_prefix("/meta/") {
        return respond_meta(cache, request, id);
    }
    if let Some(selector) = path.strip_prefix("/img/") {
        return respond_image(cache, request, selector, query);
    }

    respond_text(request, 404, "not found")
}

fn respond_image(
    cache: &ImageCache,
    request: Request,
    selector: &str,
    query: &str,
) -> std::io::Result<()> {
    let params = match VariantParams::parse(query) {
        Ok(params) => params,
        Err(msg) => return respond_text(request, 400, &msg),
    };

    let id = match resolve_id(cache, selector) {
        Some(id) => id,
        None => return respond_text(request, 404, "no such image"),
    };

    match cache.get_or_create_variant(&id, params.width, params.height, params.crop) {
        Ok(path) => {
            let bytes = std::fs::read(&path)?;
            respond_bytes(request, 200, "image/png", bytes)
        }
        Err(CacheError::UnknownId(_)) => respond_text(request, 404, "no such image"),
        Err(e) => {
            tracing::error!(id, error = %e, "variant request failed");
            respond_text(request, 500, "internal error")
        }
    }
}

fn respond_meta(cache: &ImageCache, request: Request, id: &str) -> std::io::Result<()> {
    match cache.get_metadata(id) {
        Some(metadata) => match serde_json::to_vec(&metadata) {
            Ok(body) => respond_bytes(request, 200, "application/json", body),
            Err(e) => {
                tracing::error!(id, error = %e, "metadata serialization failed");
                respond_text(request, 500, "internal error")
            }
        },
        None => respond_text(request, 404, "no such image"),
    }
}

/// Map the path segment after `/img/` to a concrete id.
fn resolve_id(cache: &ImageCache, selector: &str) -> Option<String> {
    match selector {
        "random" => cache.random_id().ok(),
        "first" => cache.first_id().ok(),
        id => cache.id_exists(id).then(|| id.to_string()),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct VariantParams {
    width: Option<u32>,
    height: Option<u32>,
    crop: bool,
}

impl VariantParams {
    /// Parse and validate the query string. Unknown keys are ignored;
    /// malformed values and disallowed dimensions are a 400.
    fn parse(query: &str) -> Result<Self, String> {
        let mut params = Self::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "width" => params.width = Some(parse_dimension(key, value)?),
                "height" => params.height = Some(parse_dimension(key, value)?),
                "crop" => params.crop = matches!(value, "" | "1" | "true"),
                _ => {}
            }
        }
        Ok(params)
    }
}

fn parse_dimension(key: &str, value: &str) -> Result<u32, String> {
    let dim: u32 = value
        .parse()
        .map_err(|_| format!("{key} must be a positive integer"))?;
    if !ALLOWED_DIMENSIONS.contains(&dim) {
        return Err(format!("{key} must be one of {ALLOWED_DIMENSIONS:?}"));
    }
    Ok(dim)
}

fn respond_bytes(
    request: Request,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
) -> std::io::Result<()> {
    let header =
        Header::from_bytes("Content-Type", content_type).expect("Content-Type is a valid header");
    request.respond(Response::from_data(body).with_status_code(status).with_header(header))
}

fn respond_text(request: Request, status: u16, message: &str) -> std::io::Result<()> {
    respond_bytes(request, status, "text/plain", message.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_query_is_default() {
        assert_eq!(VariantParams::parse("").unwrap(), VariantParams::default());
    }

    #[test]
    fn parse_width_height_and_crop() {
        let params = VariantParams::parse("width=512&height=256&crop=true").unwrap();
        assert_eq!(params.width, Some(512));
        assert_eq!(params.height, Some(256));
        assert!(params.crop);
    }

    #[test]
    fn parse_bare_crop_flag() {
        assert!(VariantParams::parse("crop").unwrap().crop);
        assert!(VariantParams::parse("crop=1").unwrap().crop);
        assert!(!VariantParams::parse("crop=no").unwrap().crop);
    }

    #[test]
    fn parse_rejects_disallowed_dimension() {
        assert!(VariantParams::parse("width=500").is_err());
        assert!(VariantParams::parse("height=0").is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_dimension() {
        assert!(VariantParams::parse("width=big").is_err());
        assert!(VariantParams::parse("width=-1").is_err());
    }

    #[test]
    fn parse_ignores_unknown_keys() {
        let params = VariantParams::parse("foo=bar&width=128").unwrap();
        assert_eq!(params.width, Some(128));
    }

    #[test]
    fn allowed_dimensions_are_sorted_descending_and_unique() {
        let mut sorted = ALLOWED_DIMENSIONS.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        assert_eq!(sorted.as_slice(), ALLOWED_DIMENSIONS);
    }
}
