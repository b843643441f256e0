//! Canned-response PostgREST stand-in.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct Canned {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self { Self { status, headers: Vec::new(), body: body.to_string() } }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

/// A request as seen by the server: lower-cased head (request line included)
/// and the raw body.
pub struct Seen {
    pub head: String,
    pub body: String,
}

impl Seen {
    pub fn request_line(&self) -> &str { self.head.lines().next().unwrap_or_default() }

    pub fn json(&self) -> serde_json::Value { serde_json::from_str(&self.body).expect("json body") }
}

pub async fn serve(responses: Vec<Canned>) -> (String, JoinHandle<Vec<Seen>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for canned in responses {
            let (mut sock, _) = listener.accept().await.expect("accept");
            seen.push(read_request(&mut sock).await);
            let extra: String = canned.headers.iter().map(|(k, v)| format!("{k}: {v}\r\n")).collect();
            let resp = format!(
                "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\n{extra}connection: close\r\n\r\n{}",
                canned.status,
                canned.body.len(),
                canned.body
            );
            sock.write_all(resp.as_bytes()).await.expect("write");
            let _ = sock.shutdown().await;
        }
        seen
    });
    (format!("http://{addr}"), handle)
}

async fn read_request(sock: &mut TcpStream) -> Seen {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = sock.read(&mut chunk).await.expect("read");
        if n == 0 { break; }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let len = head
                .lines()
                .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + len {
                let body = String::from_utf8_lossy(&buf[pos + 4..pos + 4 + len]).to_string();
                return Seen { head: head.to_ascii_lowercase(), body };
            }
        }
    }
    Seen { head: String::new(), body: String::new() }
}
