use boardwalk::{BoardwalkError, BoardwalkServer};

#[tokio::main]
async fn main() -> Result<(), BoardwalkError> {
    boardwalk::init_tracing();

    let addr = std::env::var("BOARDWALK_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let server = BoardwalkServer::builder()
        .bind(&addr)
        .redis_url(std::env::var("REDIS_URL").ok())
        .build()
        .await?;
    server.run().await
}
