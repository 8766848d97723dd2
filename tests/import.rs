//! Integration tests for the full import pipeline against a local HTTP server.
//!
//! The server listens on 127.0.0.1, which the host safety check would refuse.
//! Tests therefore fetch `docs.test:<port>`: a stub resolver tells the safety
//! check that `docs.test` is a public address, and a connect override routes
//! the actual connection to the mock server.

use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use url2md::{
    convert_html, import_to_file, import_url_to_markdown, ErrorKind, HostResolver, ImportConfig,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PUBLIC_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34));
const PRIVATE_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));

/// `docs.test` is public, `intranet.test` is private, everything else fails.
struct StubResolver;

#[async_trait]
impl HostResolver for StubResolver {
    async fn resolve(&self, host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        match host {
            "docs.test" => Ok(vec![PUBLIC_IP]),
            "intranet.test" => Ok(vec![PRIVATE_IP]),
            other => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such host: {other}"),
            )),
        }
    }
}

/// Answers public for the first lookup and private for every later one.
struct RebindingResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl HostResolver for RebindingResolver {
    async fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(vec![PUBLIC_IP]),
            _ => Ok(vec![PRIVATE_IP]),
        }
    }
}

fn config_for(server: &MockServer) -> ImportConfig {
    builder_for(server).build().unwrap()
}

/// Pipeline logs for failing tests: `RUST_LOG=url2md=debug cargo test`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn builder_for(server: &MockServer) -> url2md::ImportConfigBuilder {
    init_logging();
    ImportConfig::builder()
        .resolver(Arc::new(StubResolver))
        .connect_override("docs.test", *server.address())
}

fn url(server: &MockServer, p: &str) -> String {
    format!("http://docs.test:{}{}", server.address().port(), p)
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn redirect(to: &str) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", to)
}

/// `<div><p>…</p>` nested `levels` deep, never closed.
fn nested_page(levels: usize) -> String {
    let mut page = String::from("<html><head><title>Deep</title></head><body>");
    for _ in 0..levels {
        page.push_str("<div><p>Paragraph text, long enough to score, yes.</p>");
    }
    page.push_str("</body></html>");
    page
}

const MINIMAL: &str = r#"<html><head><title>Title</title></head>
<body><h1>Title</h1><p>Hello <a href="/x">x</a></p></body></html>"#;

const ARTICLE: &str = r#"<!DOCTYPE html>
<html><head><title>Release notes for May | Docs</title></head>
<body>
  <nav class="menu"><a href="/">Home</a> <a href="/blog">Blog</a> <a href="/about">About</a></nav>
  <div class="post-content">
    <h2>What changed</h2>
    <p>The importer now follows redirects one hop at a time, checking each target before it connects.</p>
    <p>Relative links such as <a href="guide/start">the guide</a> are rewritten against the final page address.</p>
    <ul><li>Faster extraction</li><li>Smaller output</li></ul>
    <pre><code>url2md https://example.com/post</code></pre>
  </div>
  <footer class="footer">Copyright, legal, cookie settings and the rest of the chrome.</footer>
</body></html>"#;

// ── Success paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn minimal_document_converts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(MINIMAL))
        .mount(&server)
        .await;

    let result = import_url_to_markdown(url(&server, "/a"), &config_for(&server))
        .await
        .unwrap();

    assert_eq!(result.title, "Title");
    assert_eq!(result.source_url, url(&server, "/a"));
    assert!(result.markdown.contains("# Title"), "{}", result.markdown);
    assert!(result.markdown.contains("Hello"), "{}", result.markdown);
    assert!(
        result.markdown.contains(&format!("({})", url(&server, "/x"))),
        "{}",
        result.markdown
    );
    assert_eq!(result.markdown, result.markdown.trim());
}

#[tokio::test]
async fn article_content_is_isolated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/notes"))
        .respond_with(html(ARTICLE))
        .mount(&server)
        .await;

    let result = import_url_to_markdown(url(&server, "/blog/notes"), &config_for(&server))
        .await
        .unwrap();
    let md = &result.markdown;

    assert_eq!(result.title, "Release notes for May");
    assert!(md.contains("## What changed"), "{md}");
    assert!(md.contains("- Faster extraction"), "{md}");
    assert!(md.contains("```"), "{md}");
    assert!(md.contains(&url(&server, "/blog/guide/start")), "{md}");
    assert!(!md.contains("cookie settings"), "{md}");
}

#[tokio::test]
async fn source_url_is_final_url_after_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(redirect("/docs/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/new"))
        .respond_with(html(
            r#"<html><head><title>Moved</title></head><body><p>See <a href="next">next</a></p></body></html>"#,
        ))
        .mount(&server)
        .await;

    let result = import_url_to_markdown(url(&server, "/old"), &config_for(&server))
        .await
        .unwrap();

    assert_eq!(result.source_url, url(&server, "/docs/new"));
    // Relative links resolve against the final URL, not the input.
    assert!(result.markdown.contains(&url(&server, "/docs/next")), "{}", result.markdown);
}

#[tokio::test]
async fn exactly_max_redirects_is_allowed() {
    let server = MockServer::start().await;
    for (from, to) in [("/r0", "/r1"), ("/r1", "/r2"), ("/r2", "/r3")] {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(redirect(to))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/r3"))
        .respond_with(html(MINIMAL))
        .mount(&server)
        .await;

    let result = import_url_to_markdown(url(&server, "/r0"), &config_for(&server))
        .await
        .unwrap();
    assert_eq!(result.source_url, url(&server, "/r3"));
}

#[tokio::test]
async fn repeated_imports_are_identical() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(ARTICLE))
        .mount(&server)
        .await;
    let config = config_for(&server);

    let first = import_url_to_markdown(url(&server, "/a"), &config).await.unwrap();
    let second = import_url_to_markdown(url(&server, "/a"), &config).await.unwrap();

    assert_eq!(first.markdown, second.markdown);
    assert_eq!(first.title, second.title);
    assert_eq!(first.source_url, second.source_url);
}

#[tokio::test]
async fn xhtml_content_type_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(MINIMAL.as_bytes().to_vec(), "application/xhtml+xml"),
        )
        .mount(&server)
        .await;

    let result = import_url_to_markdown(url(&server, "/x"), &config_for(&server)).await;
    assert!(result.is_ok(), "{result:?}");
}

// ── Host safety ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn private_literal_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(MINIMAL))
        .mount(&server)
        .await;

    let target = format!("http://127.0.0.1:{}/", server.address().port());
    let err = import_url_to_markdown(target, &config_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedHost);
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty(), "{} requests reached the server", received.len());
}

#[tokio::test]
async fn privately_resolving_host_is_rejected() {
    let server = MockServer::start().await;
    let err = import_url_to_markdown("http://intranet.test/", &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedHost);
    assert_eq!(err.kind().http_status(), 400);
}

#[tokio::test]
async fn rebinding_between_check_and_connect_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(MINIMAL))
        .mount(&server)
        .await;
    init_logging();
    let resolver = RebindingResolver {
        calls: AtomicUsize::new(0),
    };
    let config = ImportConfig::builder()
        .resolver(Arc::new(resolver))
        .build()
        .unwrap();

    let target = format!("http://flip.test:{}/", server.address().port());
    let err = import_url_to_markdown(target, &config).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedHost);
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty(), "{} requests reached the server", received.len());
}

#[tokio::test]
async fn redirect_to_loopback_is_rejected() {
    let server = MockServer::start().await;
    let port = server.address().port();
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(redirect(&format!("http://127.0.0.1:{port}/secret")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(html(MINIMAL))
        .expect(0)
        .mount(&server)
        .await;

    let err = import_url_to_markdown(url(&server, "/start"), &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedHost);
}

#[tokio::test]
async fn redirect_to_private_resolving_host_is_rejected() {
    let server = MockServer::start().await;
    let port = server.address().port();
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(redirect(&format!("http://intranet.test:{port}/admin")))
        .mount(&server)
        .await;

    let err = import_url_to_markdown(url(&server, "/start"), &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedHost);
}

// ── Fetch failures ───────────────────────────────────────────────────────────

#[tokio::test]
async fn too_many_redirects_is_internal_error() {
    let server = MockServer::start().await;
    for i in 0..5 {
        Mock::given(method("GET"))
            .and(path(format!("/r{i}")))
            .respond_with(redirect(&format!("/r{}", i + 1)))
            .mount(&server)
            .await;
    }

    let err = import_url_to_markdown(url(&server, "/r0"), &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalError);
    assert_eq!(err.to_failure().message, ErrorKind::InternalError.public_message());
}

#[tokio::test]
async fn redirect_without_location_is_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(301))
        .mount(&server)
        .await;

    let err = import_url_to_markdown(url(&server, "/a"), &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalError);
}

#[tokio::test]
async fn upstream_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = import_url_to_markdown(url(&server, "/missing"), &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalError);
    let failure = err.to_failure();
    assert!(failure.message.contains("404"), "{}", failure.message);
    assert!(!failure.message.contains("docs.test"), "{}", failure.message);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html(MINIMAL).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = builder_for(&server).timeout_secs(1).build().unwrap();
    let err = import_url_to_markdown(url(&server, "/slow"), &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FetchTimeout);
    assert_eq!(err.kind().http_status(), 504);
}

// ── Content failures ─────────────────────────────────────────────────────────

#[tokio::test]
async fn json_is_unsupported_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"{}".to_vec(), "application/json"))
        .mount(&server)
        .await;

    let err = import_url_to_markdown(url(&server, "/api"), &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);
    assert_eq!(err.kind().http_status(), 422);
}

#[tokio::test]
async fn non_html_body_is_never_read() {
    let server = MockServer::start().await;
    let payload = format!("[{}]", "1,".repeat(32 * 1024)).into_bytes();
    Mock::given(method("GET"))
        .and(path("/dump"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload, "application/json"))
        .mount(&server)
        .await;

    // Past the body ceiling: reading first would fail with CONTENT_TOO_LARGE.
    let config = builder_for(&server).max_body_bytes(1024).build().unwrap();
    let err = import_url_to_markdown(url(&server, "/dump"), &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);
}

#[tokio::test]
async fn endless_non_html_body_is_rejected_promptly() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n\
                    Transfer-Encoding: chunked\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let chunk = format!("400\r\n{}\r\n", "x".repeat(1024));
        while socket.write_all(chunk.as_bytes()).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let config = ImportConfig::builder()
        .resolver(Arc::new(StubResolver))
        .connect_override("docs.test", addr)
        .timeout_secs(10)
        .build()
        .unwrap();
    let started = Instant::now();
    let target = format!("http://docs.test:{}/stream", addr.port());
    let err = import_url_to_markdown(target, &config).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);
    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    let big = format!("<html><body><p>{}</p></body></html>", "a".repeat(8 * 1024));
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(html(&big))
        .mount(&server)
        .await;

    let config = builder_for(&server).max_body_bytes(4 * 1024).build().unwrap();
    let err = import_url_to_markdown(url(&server, "/big"), &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContentTooLarge);
}

#[tokio::test]
async fn empty_page_is_parse_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(html("<html><head><title>Nothing</title></head><body>  </body></html>"))
        .mount(&server)
        .await;

    let err = import_url_to_markdown(url(&server, "/empty"), &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailed);
}

#[tokio::test]
async fn deeply_nested_page_converts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/deep"))
        .respond_with(html(&nested_page(10_000)))
        .mount(&server)
        .await;

    let result = import_url_to_markdown(url(&server, "/deep"), &config_for(&server))
        .await
        .unwrap();
    assert_eq!(result.title, "Deep");
    assert_eq!(result.markdown.matches("Paragraph text").count(), 10_000);
}

#[tokio::test]
async fn twenty_thousand_levels_convert_offline() {
    let page = nested_page(20_000);
    let result = convert_html(&page, "https://docs.test/deep", &ImportConfig::default())
        .await
        .unwrap();
    assert!(result.markdown.starts_with("Paragraph text"), "{}", &result.markdown[..60]);
}

// ── Other entry points ───────────────────────────────────────────────────────

#[tokio::test]
async fn import_to_file_writes_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(MINIMAL))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("page.md");
    let result = import_to_file(url(&server, "/a"), &out, true, &config_for(&server))
        .await
        .unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("---\ntitle: \"Title\"\n"), "{written}");
    assert!(written.ends_with(&format!("{}\n", result.markdown)), "{written}");
    assert!(!out.with_extension("md.tmp").exists());
}

#[tokio::test]
async fn failed_import_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"{}".to_vec(), "application/json"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("page.md");
    let err = import_to_file(url(&server, "/api"), &out, false, &config_for(&server))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedContentType);
    assert!(!out.exists());
}

#[tokio::test]
async fn convert_html_matches_fetched_import() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/notes"))
        .respond_with(html(ARTICLE))
        .mount(&server)
        .await;
    let config = config_for(&server);
    let target = url(&server, "/blog/notes");

    let fetched = import_url_to_markdown(&target, &config).await.unwrap();
    let offline = convert_html(ARTICLE, &target, &config).await.unwrap();

    assert_eq!(fetched.markdown, offline.markdown);
    assert_eq!(fetched.title, offline.title);
}
