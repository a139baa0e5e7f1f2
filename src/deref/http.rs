//! Dereferencing of http and https IRIs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;

use crate::cache::redirect::RedirectManager;
use crate::cache::CacheView;
use crate::deref::{Dereferencer, Representation};
use crate::rdfize::RdfFormat;
use crate::{CacheError, Result};

/// Path extensions that almost certainly do not name RDF documents and are
/// rejected before any network round-trip. The list deliberately omits
/// `htm`, `html`, `xhtml`, `jpg` and `jpeg`: RDFa and image-metadata
/// RDFizers may consume those.
pub const NON_RDF_EXTENSIONS: &[&str] = &[
    "123", "3dm", "3dmf", "3gp", "8bi", "aac", "ai", "aif", "app", "asf",
    "asp", "asx", "avi", "bat", "bin", "bmp", "c", "cab", "cfg", "cgi",
    "com", "cpl", "cpp", "css", "csv", "dat", "db", "dll", "dmg", "dmp",
    "doc", "drv", "drw", "dxf", "eps", "exe", "fnt", "fon", "gif", "gz",
    "h", "hqx", "iff", "indd", "ini", "iso", "java", "js", "jsp", "key",
    "log", "m3u", "mdb", "mid", "midi", "mim", "mng", "mov", "mp3", "mp4",
    "mpa", "mpg", "msg", "msi", "otf", "pct", "pdf", "php", "pif", "pkg",
    "pl", "plugin", "png", "pps", "ppt", "ps", "psd", "psp", "qt", "qxd",
    "qxp", "ra", "ram", "rar", "reg", "rm", "rtf", "sea", "sit", "sitx",
    "sql", "svg", "swf", "sys", "tar", "tif", "ttf", "uue", "vb", "vcd",
    "wav", "wks", "wma", "wmv", "wpd", "wps", "ws", "xll", "xls", "yps",
    "zip",
];

const MAX_REDIRECT_HOPS: usize = 8;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches http(s) IRIs with content negotiation and per-hop redirect
/// recording.
///
/// Automatic redirect following is disabled on the client: each hop is
/// recorded through the [`RedirectManager`], and a hop landing on an
/// already-fresh document short-circuits the fetch with `Ok(None)`.
pub struct HttpDereferencer {
    client: Client,
    view: CacheView,
    redirects: Arc<RedirectManager>,
    blocked_extensions: HashSet<String>,
}

impl HttpDereferencer {
    pub fn new(view: CacheView, redirects: Arc<RedirectManager>) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HttpDereferencer {
            client,
            view,
            redirects,
            blocked_extensions: HashSet::new(),
        })
    }

    /// Adds an extension to the blocked list.
    pub fn block_extension(&mut self, extension: &str) {
        self.blocked_extensions
            .insert(extension.to_ascii_lowercase());
    }

    /// Adds every extension in the iterator to the blocked list.
    pub fn with_blocked_extensions<'a>(
        mut self,
        extensions: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        for extension in extensions {
            self.block_extension(extension);
        }
        self
    }

    fn is_blocked(&self, iri: &str) -> bool {
        path_extension(iri)
            .map(|ext| self.blocked_extensions.contains(&ext))
            .unwrap_or(false)
    }
}

impl Dereferencer for HttpDereferencer {
    fn name(&self) -> &str {
        "HttpDereferencer"
    }

    fn dereference(&self, iri: &str) -> Result<Option<Representation>> {
        if self.is_blocked(iri) {
            return Err(CacheError::Dereference(format!(
                "refusing to dereference <{iri}>: blocked non-RDF extension"
            )));
        }

        // A previously recorded chain resolves to its terminal IRI up front.
        let resolved = self.redirects.resolve(iri)?;
        if resolved != iri && self.view.is_fresh(&resolved) {
            return Ok(None);
        }

        let accept = self.view.accept_header();
        let mut current = resolved;
        for _ in 0..MAX_REDIRECT_HOPS {
            let response = self
                .client
                .get(&current)
                .header(ACCEPT, accept.as_str())
                .send()?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        CacheError::Dereference(format!(
                            "redirect from <{current}> carries no location"
                        ))
                    })?;
                let target = absolute_location(&current, location)?;
                self.redirects.record(&current, &target)?;
                if self.view.is_fresh(&target) {
                    return Ok(None);
                }
                current = target;
                continue;
            }

            if !status.is_success() {
                return Err(CacheError::Dereference(format!(
                    "HTTP {status} fetching <{current}>"
                )));
            }

            let media_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .or_else(|| {
                    path_extension(&current)
                        .and_then(|ext| RdfFormat::from_extension(&ext))
                        .map(|format| format.media_type().to_owned())
                })
                .unwrap_or_default();

            return Ok(Some(Representation::new(media_type, Box::new(response))));
        }

        Err(CacheError::Dereference(format!(
            "too many redirects from <{iri}>"
        )))
    }
}

/// Resolves a Location header value against the IRI it was served from.
fn absolute_location(base: &str, location: &str) -> Result<String> {
    let base = url::Url::parse(base).map_err(|e| CacheError::Iri(format!("{base}: {e}")))?;
    let target = base
        .join(location)
        .map_err(|e| CacheError::Iri(format!("{location}: {e}")))?;
    Ok(target.to_string())
}

/// Extracts the lowercased extension of an IRI's path, ignoring query and
/// fragment.
fn path_extension(iri: &str) -> Option<String> {
    let url = url::Url::parse(iri).ok()?;
    let filename = url.path().rsplit('/').next()?;
    let (stem, extension) = filename.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}
