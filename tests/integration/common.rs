//! Shared fixtures for integration tests

use site_indexer::config::from_toml_str;
use site_indexer::{SiteConfig, SiteIndexer};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renders a page with a main region holding a heading, a paragraph and links
pub fn html_page(title: &str, text: &str, links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{0}">Link to {0}</a></li>"#, href))
        .collect();

    format!(
        r#"<html><head><title>{title}</title></head><body>
<nav><a href="/">Home</a></nav>
<main>
  <h1>{title}</h1>
  <p>{text}</p>
  <ul>{items}</ul>
</main>
</body></html>"#
    )
}

/// Responds to `GET route` with an HTML page
pub async fn mount_page(server: &MockServer, route: &str, title: &str, text: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page(title, text, links).into_bytes(), "text/html"),
        )
        .mount(server)
        .await;
}

/// Responds to `GET route` with a bare status code
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mounts the four-page site A→{B,C}, B→{D}
pub async fn mount_small_site(server: &MockServer) {
    mount_page(
        server,
        "/",
        "Alpha",
        "Alpha introduces the guide.",
        &["/b", "/c"],
    )
    .await;
    mount_page(server, "/b", "Bravo", "Bravo explains installation.", &["/d"]).await;
    mount_page(server, "/c", "Charlie", "Charlie covers configuration.", &[]).await;
    mount_page(server, "/d", "Delta", "Delta documents deployment.", &[]).await;
}

/// A fast site configuration for the mock server; `extra` is appended verbatim
pub fn site_config(server: &MockServer, name: &str, extra: &str) -> SiteConfig {
    from_toml_str(&format!(
        r#"
[site]
name = "{name}"
base-url = "{uri}/"

[politeness]
delay-ms = 0

[fetch]
retry-base-ms = 10
timeout-secs = 5

{extra}
"#,
        name = name,
        uri = server.uri(),
        extra = extra
    ))
    .expect("valid test config")
}

/// A fresh indexer backed by a database in a temporary directory
pub fn open_indexer() -> (TempDir, SiteIndexer) {
    let dir = TempDir::new().expect("temp dir");
    let indexer = SiteIndexer::open(&dir.path().join("index.db")).expect("open indexer");
    (dir, indexer)
}

/// Absolute URL on the mock server
pub fn url_on(server: &MockServer, route: &str) -> String {
    format!("{}{}", server.uri(), route)
}
