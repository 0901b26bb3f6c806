use multicall_http::MultiCallClient;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base = std::env::var("MULTICALL_TARGET_URL")
        .unwrap_or_else(|_| "https://httpbin.org".to_owned());

    let mut client = MultiCallClient::new();
    client
        .set_timeouts(5, 15)
        .set_user_agent("multicall-http-demo/0.2")
        .add_get("ip", format!("{base}/ip"), &[], &[])
        .add_get("headers", format!("{base}/headers"), &[("show", "all")], &[])
        .add_post("echo", format!("{base}/post"), json!({ "hello": "world" }), &[]);

    let results = client.execute_all().await;

    for (id, result) in &results {
        if result.success {
            println!("{id}: HTTP {} ({:.3}s)", result.http_code, result.duration_secs);
        } else {
            eprintln!(
                "{id}: failed with HTTP {} — {}",
                result.http_code, result.error
            );
        }
    }

    Ok(())
}
