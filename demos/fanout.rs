use multicall_http::MultiCallClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base = std::env::var("MULTICALL_TARGET_URL")
        .unwrap_or_else(|_| "https://httpbin.org".to_owned());

    let mut client = MultiCallClient::new();
    client
        .set_max_concurrency(4)
        .set_retries(2, 250, [429, 502, 503])
        .retry_on_network_error(true);

    for index in 0..12 {
        let id = format!("page-{index}");
        client.add_get(
            id.clone(),
            format!("{base}/get"),
            &[("page", &index.to_string())],
            &[],
        );
        client.on_response(id, |result, id| {
            println!(
                "{id} finished: HTTP {} in {:.3}s",
                result.http_code, result.duration_secs
            );
        });
    }

    let results = client.wait_for_all().await;
    let failed = results.values().filter(|result| !result.success).count();
    println!("{} request(s), {failed} failed", results.len());

    Ok(())
}
