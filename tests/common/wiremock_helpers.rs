use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves `body` as JSON at `url_path`.
pub async fn mock_json_document(url_path: &str, body: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    server
}

/// Serves HTML content at `url_path`.
pub async fn mock_html_page(url_path: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Answers every GET with the given status code and a short body.
pub async fn mock_error_server(status: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_string("denied"))
        .mount(&server)
        .await;

    server
}

/// A download-warning page whose form posts back to `/uc` with a confirm token.
pub fn warning_page_with_form(file_id: &str, token: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Google Drive - Virus scan warning</title></head>
<body>
  <p>Google Drive can't scan this file for viruses.</p>
  <form id="download-form" action="/uc" method="get">
    <input type="submit" id="uc-download-link" value="Download anyway"/>
    <input type="hidden" name="id" value="{file_id}"/>
    <input type="hidden" name="export" value="download"/>
    <input type="hidden" name="confirm" value="{token}"/>
  </form>
</body></html>"#
    )
}

/// Shared-drive style host at `/uc`: the first request gets the warning
/// page, the request carrying `confirm=<token>` gets the document.
pub async fn mock_interstitial_host(file_id: &str, token: &str, document: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", file_id))
        .and(query_param("confirm", token))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(document.to_string())
                .insert_header("content-type", "application/octet-stream"),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/uc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(warning_page_with_form(file_id, token))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .with_priority(5)
        .mount(&server)
        .await;

    server
}
