//! Plain-HTTP health listener so the hosting platform sees the process as up.

use {
    axum::{Router, routing::get},
    tracing::info,
};

async fn ok() -> &'static str {
    "OK"
}

/// Bind `0.0.0.0:{port}` and serve until the process exits.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let app = Router::new().route("/", get(ok)).route("/healthz", get(ok));
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "health listener up");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responds_ok() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/", get(ok)).route("/healthz", get(ok));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body = reqwest::get(format!("http://{addr}/healthz"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");
    }
}
