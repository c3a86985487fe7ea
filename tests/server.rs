use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

use static_http_server::{handle_connection, Config};

/// Document root populated with a small site, removed on drop.
struct Site {
    root: PathBuf,
}

impl Site {
    fn new(name: &str) -> Self {
        let base = std::env::temp_dir().join(format!(
            "static-http-server-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&base);

        let root = base.join("www");
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(root.join("about.html"), "<h1>about</h1>").unwrap();
        std::fs::write(root.join("docs/index.html"), "<h1>docs</h1>").unwrap();
        std::fs::write(root.join("style.css"), "body {}").unwrap();
        std::fs::write(root.join("blob.bin"), [0u8, 159, 146, 150]).unwrap();
        std::fs::write(base.join("secret.txt"), "secret").unwrap();

        Self { root }
    }

    fn config(&self) -> Config {
        Config::parse_args(["--root".to_string(), self.root.display().to_string()]).unwrap()
    }

    fn base(&self) -> &Path {
        self.root.parent().unwrap()
    }
}

impl Drop for Site {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(self.base());
    }
}

struct Reply {
    status: String,
    head: String,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.head.split("\r\n").skip(1).find_map(|line| {
            let (k, v) = line.split_once(": ")?;
            k.eq_ignore_ascii_case(name).then_some(v)
        })
    }
}

async fn exchange(cfg: &Config, request: &[u8]) -> Reply {
    let (mut client, server) = duplex(64 * 1024);
    let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();

    client.write_all(request).await.unwrap();
    handle_connection(server, peer, cfg).await.unwrap();

    let mut raw = Vec::new();
    client.read_to_end(&mut raw).await.unwrap();

    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("end of head");
    let head = String::from_utf8(raw[..end].to_vec()).unwrap();

    Reply {
        status: head.split("\r\n").next().unwrap().to_string(),
        body: raw[end + 4..].to_vec(),
        head,
    }
}

#[tokio::test]
async fn serves_index_page() {
    let site = Site::new("index");
    let reply = exchange(&site.config(), b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

    assert_eq!(reply.status, "HTTP/1.1 200 OK");
    assert_eq!(reply.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(reply.header("content-length"), Some("13"));
    assert_eq!(reply.body, b"<h1>home</h1>");
}

#[tokio::test]
async fn serves_pages_without_extension_and_directories() {
    let site = Site::new("pages");
    let cfg = site.config();

    let about = exchange(&cfg, b"GET /about HTTP/1.1\r\n\r\n").await;
    assert_eq!(about.status, "HTTP/1.1 200 OK");
    assert_eq!(about.body, b"<h1>about</h1>");

    let docs = exchange(&cfg, b"GET /docs/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(docs.status, "HTTP/1.1 200 OK");
    assert_eq!(docs.body, b"<h1>docs</h1>");

    let css = exchange(&cfg, b"GET /style.css?v=2 HTTP/1.1\r\n\r\n").await;
    assert_eq!(css.header("Content-Type"), Some("text/css; charset=utf-8"));
    assert_eq!(css.body, b"body {}");
}

#[tokio::test]
async fn serves_binary_files_as_is() {
    let site = Site::new("binary");
    let reply = exchange(&site.config(), b"GET /blob.bin HTTP/1.1\r\n\r\n").await;

    assert_eq!(reply.status, "HTTP/1.1 200 OK");
    assert_eq!(reply.header("Content-Type"), Some("application/octet-stream"));
    assert_eq!(reply.body, [0u8, 159, 146, 150]);
}

#[tokio::test]
async fn missing_files() {
    let site = Site::new("missing");
    let cfg = site.config();

    let reply = exchange(&cfg, b"GET /nope.html HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status, "HTTP/1.1 404 Not Found");
    assert_eq!(reply.body, b"Not found");

    // the index page is only reachable through its directory
    let reply = exchange(&cfg, b"GET /index HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status, "HTTP/1.1 404 Not Found");
}

#[tokio::test]
async fn traversal_is_refused() {
    let site = Site::new("traversal");
    let reply = exchange(&site.config(), b"GET /../secret.txt HTTP/1.1\r\n\r\n").await;

    assert_eq!(reply.status, "HTTP/1.1 403 Forbidden");
    assert_ne!(reply.body, b"secret");
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_escape_is_refused() {
    let site = Site::new("symlink");
    std::os::unix::fs::symlink(site.base().join("secret.txt"), site.root.join("leak.txt")).unwrap();

    let reply = exchange(&site.config(), b"GET /leak.txt HTTP/1.1\r\n\r\n").await;

    assert_eq!(reply.status, "HTTP/1.1 403 Forbidden");
}

#[tokio::test]
async fn only_get_is_allowed() {
    let site = Site::new("method");
    let reply = exchange(
        &site.config(),
        b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc",
    )
    .await;

    assert_eq!(reply.status, "HTTP/1.1 405 Method Not Allowed");
    assert_eq!(reply.header("Allow"), Some("GET"));
    assert_eq!(reply.header("Content-Type"), None);
    assert!(reply.body.is_empty());
}

#[tokio::test]
async fn unsupported_version() {
    let site = Site::new("version");
    let reply = exchange(&site.config(), b"GET / HTTP/2.0\r\n\r\n").await;
    assert_eq!(reply.status, "HTTP/1.1 505 HTTP Version Not Supported");

    let reply = exchange(&site.config(), b"GET / http/1.1\r\n\r\n").await;
    assert_eq!(reply.status, "HTTP/1.1 200 OK");
}

#[tokio::test]
async fn malformed_requests() {
    let site = Site::new("malformed");
    let cfg = site.config();

    let reply = exchange(&cfg, b"BREW /pot HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status, "HTTP/1.1 400 Bad Request");
    assert_eq!(reply.body, b"invalid method 'BREW'");

    let reply = exchange(&cfg, b"GET / HTTP/1.1\r\nContent-Length: x\r\n\r\n").await;
    assert_eq!(reply.status, "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn closed_connection_gets_no_response() {
    let site = Site::new("closed");
    let (mut client, server) = duplex(1024);
    let peer: SocketAddr = "127.0.0.1:50001".parse().unwrap();

    client.write_all(b"GET /").await.unwrap();
    client.shutdown().await.unwrap();

    let result = handle_connection(server, peer, &site.config()).await;
    assert!(result.is_err());

    let mut raw = Vec::new();
    client.read_to_end(&mut raw).await.unwrap();
    assert!(raw.is_empty());
}

#[tokio::test]
async fn hostile_request_leaves_server_running() {
    let site = Site::new("hostile");
    let cfg: &'static Config = Box::leak(Box::new(site.config()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(static_http_server::server::serve(listener, cfg));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nabc")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw).await;
    assert!(raw.is_empty());

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    assert!(raw.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(!server.is_finished());

    server.abort();
}

#[tokio::test]
async fn serves_over_tcp() {
    let site = Site::new("tcp");
    let cfg: &'static Config = Box::leak(Box::new(site.config()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(static_http_server::server::serve(listener, cfg));

    for path in ["/", "/about"] {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
            .unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        assert!(raw.starts_with(b"HTTP/1.1 200 OK\r\n"), "{path}");
    }

    server.abort();
}
