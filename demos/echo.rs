//! Echoes every request back as plain text: its params, then its body.
//!
//!     cargo run --example echo -- 9999
//!
//! Point a web server's fastcgi_pass (or equivalent) at 127.0.0.1:9999.

use fastcgi_codec::*;
use tokio::net::TcpListener;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct EchoHandler {
    request_count: AtomicUsize,
}

impl EchoHandler {
    pub fn new() -> EchoHandler {
        EchoHandler {
            request_count: AtomicUsize::new(1),
        }
    }
}

impl FastcgiRequestHandler for EchoHandler {
    fn call(&self, request: FastcgiRequest, response: &mut Response<'_>) {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        let mut params: Vec<_> = request.params.iter().collect();
        params.sort();

        let mut body = format!("Content-Type: text/plain\r\n\r\nrequest #{} (id {})\n\nparams:\n",
                               count, request.request_id);
        for (name, value) in params {
            body.push_str(&format!("  {} = {}\n",
                                   String::from_utf8_lossy(name),
                                   String::from_utf8_lossy(value)));
        }
        body.push_str(&format!("\nbody ({} bytes):\n", request.stdin.len()));

        let mut body = body.into_bytes();
        body.extend_from_slice(&request.stdin);

        response.send_stdout(&body);
        response.finish();
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let port: u16 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().expect("port must be a number"),
        None => 9999,
    };

    let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("failed to bind socket");
    println!("listening on 127.0.0.1:{}", port);

    let server = FastcgiServer::new(Arc::new(EchoHandler::new()), FastcgiConfig::default());
    server.run(listener).await.expect("failed to run the server");
}
