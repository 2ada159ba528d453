use bytes::BytesMut;
use crate::config::FastcgiConfig;
use crate::error::{FastcgiError, FastcgiResult};
use crate::hi::connection::{FastcgiConnection, Progress};
use crate::hi::handler::FastcgiRequestHandler;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use std::io;
use std::sync::Arc;

const READ_BUFFER_SIZE: usize = 8 * 1024;

async fn flush_outbound<IO>(io: &mut IO, connection: &mut FastcgiConnection) -> io::Result<()>
    where IO: AsyncWrite + Unpin
{
    let outbound = connection.take_outbound();
    if !outbound.is_empty() {
        trace!("writing {} bytes", outbound.len());
        io.write_all(&outbound).await?;
        io.flush().await?;
    }
    Ok(())
}

async fn close<IO>(io: &mut IO)
    where IO: AsyncWrite + Unpin
{
    if let Err(e) = io.shutdown().await {
        debug!("error shutting down connection: {}", e);
    }
}

/// Drive one FastCGI connection until the peer hangs up, a request without the keep-connection
/// flag finishes, or a protocol error occurs.
pub async fn serve_connection<IO, H>(mut io: IO, handler: Arc<H>, config: FastcgiConfig)
    -> FastcgiResult<()>
    where IO: AsyncRead + AsyncWrite + Unpin,
          H: FastcgiRequestHandler + ?Sized,
{
    let mut connection = FastcgiConnection::new(config);
    let mut inbound = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        let result = connection.process(&mut inbound, &*handler);
        flush_outbound(&mut io, &mut connection).await?;

        match result {
            Ok(_) if connection.is_closing() => break,
            Ok(Progress::Dispatched { request_id }) => {
                debug!("request {} done", request_id);
            },
            Ok(Progress::Short) => {
                if io.read_buf(&mut inbound).await? == 0 {
                    debug!("peer closed the connection");
                    let result = connection.finish(&mut inbound, &*handler);
                    flush_outbound(&mut io, &mut connection).await?;
                    close(&mut io).await;
                    return result.map(|_| ());
                }
            },
            Err(e) => {
                close(&mut io).await;
                return Err(e);
            },
        }
    }

    close(&mut io).await;
    Ok(())
}

/// Accepts TCP connections and serves each on its own task, at most `max_conns` at a time.
pub struct FastcgiServer<H: FastcgiRequestHandler + Send + Sync + 'static> {
    handler: Arc<H>,
    config: FastcgiConfig,
}

impl<H: FastcgiRequestHandler + Send + Sync + 'static> FastcgiServer<H> {
    pub fn new(handler: Arc<H>, config: FastcgiConfig) -> FastcgiServer<H> {
        FastcgiServer {
            handler,
            config,
        }
    }

    pub async fn run(&self, listener: TcpListener) -> io::Result<()> {
        let limit = Arc::new(Semaphore::new(self.config.max_conns as usize));
        loop {
            let permit = limit.clone()
                .acquire_owned()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let (socket, addr) = listener.accept().await?;
            info!("new connection from {}", addr);

            let handler = self.handler.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                match serve_connection(socket, handler, config).await {
                    Ok(()) => debug!("connection from {} closed", addr),
                    Err(FastcgiError::Io(e)) => warn!("i/o error on connection from {}: {}", addr, e),
                    Err(e) => warn!("connection from {} dropped: {}", addr, e),
                }
                drop(permit);
            });
        }
    }
}
