use std::fs;
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const FEED_PATH: &str = "/bitcoin_price_feed.xml";
    pub const FALLBACK_PATH: &str = "/api/v3/simple/price";

    pub async fn create_feed_server(mock_response: &str, expected_requests: u64) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FEED_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .expect(expected_requests)
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_fallback_server(mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FALLBACK_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub fn feed_xml(price: &str) -> String {
        format!(
            r#"<rss version="2.0"><channel>
                <item><title>Bitcoin price: {price} USD</title></item>
            </channel></rss>"#
        )
    }
}

const STOREFRONT: &str = concat!(
    r#"<div class="product">"#,
    r#"<span class="price"><span class="money">$1,234.56</span></span>"#,
    r#"</div>"#,
    r#"<div class="cart">"#,
    r#"<span class="price"><span class="money">$99.00</span></span>"#,
    r#"</div>"#,
);

fn write_config(
    feed_server: &wiremock::MockServer,
    fallback_server: &wiremock::MockServer,
    store_dir: &std::path::Path,
) -> tempfile::NamedTempFile {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
feeds:
  primary:
    url: "{}{}"
  fallback:
    url: "{}{}"
update_interval: 25
display: sats
store_path: "{}"
"#,
        feed_server.uri(),
        test_utils::FEED_PATH,
        fallback_server.uri(),
        test_utils::FALLBACK_PATH,
        store_dir.display(),
    );
    fs::write(config_file.path(), &config_content).expect("Failed to write config file");
    config_file
}

#[test_log::test(tokio::test)]
async fn test_full_convert_flow_with_mock_feed() {
    let feed_server =
        test_utils::create_feed_server(&test_utils::feed_xml("$50,000.00"), 1).await;
    let fallback_server = test_utils::create_fallback_server(r#"{"bitcoin": {"usd": 1.0}}"#).await;
    let store_dir = tempfile::tempdir().unwrap();
    let config_file = write_config(&feed_server, &fallback_server, store_dir.path());

    let input = tempfile::NamedTempFile::new().unwrap();
    fs::write(input.path(), STOREFRONT).unwrap();
    let output = tempfile::NamedTempFile::new().unwrap();

    let result = satsify::run_command(
        satsify::AppCommand::Convert {
            input: input.path().to_path_buf(),
            output: Some(output.path().to_path_buf()),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Convert failed with: {:?}", result.err());

    let html = fs::read_to_string(output.path()).unwrap();
    info!(?html, "Converted storefront markup");

    // $1,234.56 at 50k USD/BTC renders as grouped sats
    assert!(html.contains(
        "<span class=\"btc-price-display\"><span class=\"btc-amount\">\u{0180}2,469,120 (sats)</span></span>"
    ));
    assert!(html.contains("data-btc-processed=\"true\""));

    // The cart block is payment-critical and stays untouched
    assert!(html.contains(
        r#"<div class="cart"><span class="price"><span class="money">$99.00</span></span></div>"#
    ));
}

#[test_log::test(tokio::test)]
async fn test_price_command_caches_across_runs() {
    // The mock expects exactly one request: the second run must hit the cache
    let feed_server =
        test_utils::create_feed_server(&test_utils::feed_xml("$67,123.45"), 1).await;
    let fallback_server = test_utils::create_fallback_server(r#"{"bitcoin": {"usd": 1.0}}"#).await;
    let store_dir = tempfile::tempdir().unwrap();
    let config_file = write_config(&feed_server, &fallback_server, store_dir.path());
    let config_path = config_file.path().to_str().unwrap().to_string();

    let first = satsify::run_command(satsify::AppCommand::Price, Some(&config_path)).await;
    assert!(first.is_ok(), "First price run failed: {:?}", first.err());

    let second = satsify::run_command(satsify::AppCommand::Price, Some(&config_path)).await;
    assert!(second.is_ok(), "Second price run failed: {:?}", second.err());
}

#[test_log::test(tokio::test)]
async fn test_fallback_feed_converts_when_primary_is_malformed() {
    // Primary feed item has no dollar token, so the fallback must be used
    let feed_server = test_utils::create_feed_server(
        "<rss><channel><item><title>Bitcoin is doing fine</title></item></channel></rss>",
        1,
    )
    .await;
    let fallback_server =
        test_utils::create_fallback_server(r#"{"bitcoin": {"usd": 50000.0}}"#).await;
    let store_dir = tempfile::tempdir().unwrap();
    let config_file = write_config(&feed_server, &fallback_server, store_dir.path());

    let input = tempfile::NamedTempFile::new().unwrap();
    fs::write(input.path(), STOREFRONT).unwrap();
    let output = tempfile::NamedTempFile::new().unwrap();

    let result = satsify::run_command(
        satsify::AppCommand::Convert {
            input: input.path().to_path_buf(),
            output: Some(output.path().to_path_buf()),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Convert failed with: {:?}", result.err());

    let html = fs::read_to_string(output.path()).unwrap();
    assert!(html.contains("\u{0180}2,469,120 (sats)"));
}

#[test_log::test(tokio::test)]
async fn test_unreachable_feeds_leave_markup_untouched() {
    // Point both feeds at paths the mock servers do not serve
    let feed_server = wiremock::MockServer::start().await;
    let fallback_server = wiremock::MockServer::start().await;
    let store_dir = tempfile::tempdir().unwrap();
    let config_file = write_config(&feed_server, &fallback_server, store_dir.path());

    let input = tempfile::NamedTempFile::new().unwrap();
    fs::write(input.path(), STOREFRONT).unwrap();
    let output = tempfile::NamedTempFile::new().unwrap();

    let result = satsify::run_command(
        satsify::AppCommand::Convert {
            input: input.path().to_path_buf(),
            output: Some(output.path().to_path_buf()),
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Convert failed with: {:?}", result.err());

    // Degraded state: prices stay in dollars
    assert_eq!(fs::read_to_string(output.path()).unwrap(), STOREFRONT);
}
