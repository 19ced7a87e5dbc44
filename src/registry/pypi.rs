//! PyPI (Python Package Index) endpoints.
//!
//! - Release metadata: GET {index}/pypi/{package}/{version}/json
//! - Simple listing:   GET {index}/simple/{package}/

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;

use super::{PackageMetadata, RegistryError};
use crate::model::Vulnerability;

lazy_static! {
    static ref ANCHOR_RE: Regex =
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*"([^"]+)"[^>]*>(.*?)</a>"#).unwrap();
}

/// Shape of the release metadata response we care about.
#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    info: ReleaseInfo,
    #[serde(default)]
    vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    /// `null` for releases without dependencies.
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

/// Fetch the metadata of one pinned release.
pub async fn fetch_metadata(
    client: &Client,
    index: &Url,
    package: &str,
    version: &str,
    timeout: Duration,
) -> Result<PackageMetadata, RegistryError> {
    let url = metadata_url(index, package, version)?;
    let body = get_text(client, url, timeout).await?;
    parse_metadata(&body)
}

/// Fetch the simple listing page of a package. Returns the page URL (for
/// resolving relative links) and its HTML.
pub async fn fetch_listing(
    client: &Client,
    index: &Url,
    package: &str,
    timeout: Duration,
) -> Result<(Url, String), RegistryError> {
    let url = listing_url(index, package)?;
    let body = get_text(client, url.clone(), timeout).await?;
    Ok((url, body))
}

/// Stream a file download into `dest`. Returns the number of bytes written.
pub async fn download(
    client: &Client,
    url: Url,
    dest: &mut std::fs::File,
    timeout: Duration,
) -> Result<u64, RegistryError> {
    let mut response = send(client, url, timeout).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(map_reqwest)? {
        dest.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    dest.flush()?;
    Ok(written)
}

async fn send(
    client: &Client,
    url: Url,
    timeout: Duration,
) -> Result<reqwest::Response, RegistryError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(map_reqwest)?;

    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(RegistryError::NotFound),
        StatusCode::TOO_MANY_REQUESTS => Err(RegistryError::RateLimited),
        s => Err(RegistryError::Status(s.as_u16())),
    }
}

async fn get_text(client: &Client, url: Url, timeout: Duration) -> Result<String, RegistryError> {
    let response = send(client, url, timeout).await?;
    response.text().await.map_err(map_reqwest)
}

fn map_reqwest(e: reqwest::Error) -> RegistryError {
    if e.is_timeout() {
        RegistryError::Timeout
    } else {
        RegistryError::Network(e)
    }
}

fn metadata_url(index: &Url, package: &str, version: &str) -> Result<Url, RegistryError> {
    let path = format!("pypi/{}/{}/json", normalize_package_name(package), version);
    index
        .join(&path)
        .map_err(|e| RegistryError::InvalidUrl(e.to_string()))
}

fn listing_url(index: &Url, package: &str) -> Result<Url, RegistryError> {
    let path = format!("simple/{}/", normalize_package_name(package));
    index
        .join(&path)
        .map_err(|e| RegistryError::InvalidUrl(e.to_string()))
}

/// Decode a release metadata body.
pub fn parse_metadata(body: &str) -> Result<PackageMetadata, RegistryError> {
    let response: ReleaseResponse = serde_json::from_str(body)?;
    Ok(PackageMetadata {
        requires_dist: response.info.requires_dist.unwrap_or_default(),
        vulnerabilities: response.vulnerabilities,
    })
}

/// Find the source distribution link for `package==version` on a simple
/// listing page.
///
/// The file name is matched case-insensitively, with `-`, `_` and `.`
/// interchangeable inside the package name. The `#sha256=` fragment is
/// dropped and relative links are resolved against `page`.
pub fn find_sdist_link(html: &str, page: &Url, package: &str, version: &str) -> Option<Url> {
    let file_re = sdist_file_regex(package, version)?;

    for caps in ANCHOR_RE.captures_iter(html) {
        let Some(href) = caps.get(1).map(|m| m.as_str().replace("&amp;", "&")) else {
            continue;
        };
        let text = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        let Ok(mut url) = page.join(&href) else {
            log::debug!("skipping unparseable link {:?}", href);
            continue;
        };
        url.set_fragment(None);

        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_string();

        if file_re.is_match(text) || file_re.is_match(&file_name) {
            return Some(url);
        }
    }

    None
}

fn sdist_file_regex(package: &str, version: &str) -> Option<Regex> {
    let normalized = normalize_package_name(package);
    let name_pattern = normalized
        .split('-')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[-_.]+");
    let pattern = format!(
        r"(?i)^{}-{}\.tar\.gz$",
        name_pattern,
        regex::escape(version)
    );
    Regex::new(&pattern).ok()
}

/// Normalize a Python package name per PEP 503.
/// - Lowercase
/// - Replace consecutive runs of [-_.] with a single -
pub fn normalize_package_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_separator = false;

    for c in name.trim().chars() {
        match c {
            '-' | '_' | '.' => {
                if !prev_separator {
                    result.push('-');
                    prev_separator = true;
                }
            }
            c => {
                result.push(c.to_ascii_lowercase());
                prev_separator = false;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> Url {
        Url::parse("https://pypi.org/").unwrap()
    }

    #[test]
    fn test_normalize_package_name() {
        assert_eq!(normalize_package_name("Requests"), "requests");
        assert_eq!(normalize_package_name("Flask_RESTful"), "flask-restful");
        assert_eq!(normalize_package_name("a__b--c..d"), "a-b-c-d");
        assert_eq!(
            normalize_package_name("typing_extensions"),
            "typing-extensions"
        );
    }

    #[test]
    fn test_metadata_and_listing_urls() {
        assert_eq!(
            metadata_url(&index(), "Requests", "2.31.0").unwrap().as_str(),
            "https://pypi.org/pypi/requests/2.31.0/json"
        );
        assert_eq!(
            listing_url(&index(), "Flask_RESTful").unwrap().as_str(),
            "https://pypi.org/simple/flask-restful/"
        );
    }

    #[test]
    fn test_parse_metadata() {
        let body = r#"{
            "info": {"name": "requests", "requires_dist": ["charset-normalizer<4,>=2", "idna<4,>=2.5"]},
            "vulnerabilities": [{"id": "PYSEC-2023-74", "aliases": ["CVE-2023-32681"], "fixed_in": ["2.31.0"], "summary": null}]
        }"#;
        let metadata = parse_metadata(body).unwrap();
        assert_eq!(metadata.requires_dist.len(), 2);
        assert_eq!(metadata.vulnerabilities.len(), 1);
        assert_eq!(metadata.vulnerabilities[0].id, "PYSEC-2023-74");
        assert_eq!(metadata.vulnerabilities[0].fixed_in, vec!["2.31.0"]);
    }

    #[test]
    fn test_parse_metadata_null_requires_dist() {
        let metadata = parse_metadata(r#"{"info": {"requires_dist": null}}"#).unwrap();
        assert!(metadata.requires_dist.is_empty());
        assert!(metadata.vulnerabilities.is_empty());
    }

    #[test]
    fn test_parse_metadata_malformed() {
        assert!(matches!(
            parse_metadata("<html>"),
            Err(RegistryError::Decode(_))
        ));
    }

    #[test]
    fn test_find_sdist_link() {
        let page = Url::parse("https://pypi.org/simple/flask-restful/").unwrap();
        let html = r#"
<html><body>
<a href="https://files.pythonhosted.org/packages/aa/Flask_RESTful-0.3.10-py2.py3-none-any.whl#sha256=abc">Flask_RESTful-0.3.10-py2.py3-none-any.whl</a><br/>
<a href="https://files.pythonhosted.org/packages/bb/Flask-RESTful-0.3.10.tar.gz#sha256=def" data-requires-python="">Flask-RESTful-0.3.10.tar.gz</a><br/>
</body></html>"#;
        let url = find_sdist_link(html, &page, "flask_restful", "0.3.10").unwrap();
        assert_eq!(
            url.as_str(),
            "https://files.pythonhosted.org/packages/bb/Flask-RESTful-0.3.10.tar.gz"
        );
        assert!(find_sdist_link(html, &page, "flask_restful", "0.3.9").is_none());
    }

    #[test]
    fn test_find_sdist_link_relative_href() {
        let page = Url::parse("https://mirror.example/simple/demo/").unwrap();
        let html = r#"<a href="../../files/demo-1.0.tar.gz">demo-1.0.tar.gz</a>"#;
        let url = find_sdist_link(html, &page, "demo", "1.0").unwrap();
        assert_eq!(url.as_str(), "https://mirror.example/files/demo-1.0.tar.gz");
    }
}
