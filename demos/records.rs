//! Dumps every record a FastCGI client sends, without answering any of them.

use fastcgi_codec::*;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;

fn print_record(record: FastcgiRecord) {
    println!("request id: {}", record.request_id);
    println!("record type: {}", record.body.type_byte());
    match record.body {
        FastcgiRecordBody::BeginRequest(body) => println!("  {:?}", body),
        FastcgiRecordBody::Params(content) => {
            match read_params(&content) {
                Ok(pairs) => {
                    for (name, value) in pairs {
                        println!("  {} = {}",
                                 String::from_utf8_lossy(name),
                                 String::from_utf8_lossy(value));
                    }
                },
                Err(e) => println!("  bad params: {}", e),
            }
        },
        FastcgiRecordBody::Stdin(content) | FastcgiRecordBody::Data(content) => {
            println!("  {} bytes", content.len());
        },
        other => println!("  {:?}", other),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let listener = TcpListener::bind("127.0.0.1:9999").await.expect("failed to bind socket");

    loop {
        let (socket, addr) = listener.accept().await.expect("failed to accept");
        println!("new connection from {}", addr);

        let mut records = FramedRead::new(socket, FastcgiLowlevelCodec::default());
        while let Some(result) = records.next().await {
            match result {
                Ok(record) => print_record(record),
                Err(e) => {
                    println!("error: {}", e);
                    break;
                },
            }
        }
    }
}
