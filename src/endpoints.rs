//! Endpoint server for exposing metrics and health checks

use crate::metrics;
use anyhow::Result;
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;

/// Start the endpoint server
pub async fn endpoint_server(port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Metrics endpoint listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((mut socket, _addr)) => {
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};

                    let mut buf = [0; 1024];
                    match socket.read(&mut buf).await {
                        Ok(n) => {
                            let request = String::from_utf8_lossy(&buf[..n]);
                            let response = if request.starts_with("GET /metrics") {
                                render_metrics()
                            } else {
                                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nok"
                                    .to_string()
                            };
                            let _ = socket.write_all(response.as_bytes()).await;
                        }
                        Err(e) => {
                            tracing::error!("Failed to read from socket: {}", e);
                        }
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = metrics::metrics().registry().gather();
    let mut body = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut body) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        encoder.format_type(),
        body.len(),
        String::from_utf8_lossy(&body)
    )
}
