use crate::app::ports::{FetchRequest, FetchResponse, HttpClientPort};
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestHttp {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn header_map(request: &FetchRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ScraperError::Config(format!("invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ScraperError::Config(format!("invalid value for header '{}': {}", name, e))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            ScraperError::Config(format!("unsupported HTTP method '{}'", request.method))
        })?;
        let headers = Self::header_map(request)?;

        let resp = self
            .client
            .request(method, &request.url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ScraperError::Fetch {
                url: request.url.clone(),
                message: e.to_string(),
            })?;
        let status = resp.status().as_u16();
        // charset from Content-Type, else UTF-8; undecodable bytes become U+FFFD
        let body = resp.text().await.map_err(|e| ScraperError::Fetch {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request(headers: &[(&str, &str)]) -> FetchRequest {
        FetchRequest {
            url: "https://example.com".into(),
            method: "GET".into(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<IndexMap<_, _>>(),
        }
    }

    #[test]
    fn test_header_map_accepts_valid_headers() {
        let map = ReqwestHttp::header_map(&request(&[("User-Agent", "x"), ("Accept", "text/html")]))
            .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("user-agent").unwrap(), "x");
    }

    #[test]
    fn test_header_map_rejects_bad_name() {
        let err = ReqwestHttp::header_map(&request(&[("Bad Header", "x")])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    /// Serves one canned HTTP response on a local port and returns its URL.
    async fn serve_once(content_type: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                content_type,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_body_is_decoded_with_declared_charset() {
        let url = serve_once(
            "text/html; charset=ISO-8859-1",
            b"<p class='v'>caf\xe9</p>",
        )
        .await;
        let mut req = request(&[]);
        req.url = url;
        let resp = ReqwestHttp::new().fetch(&req).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "<p class='v'>caf\u{e9}</p>");
    }

    #[tokio::test]
    async fn test_undeclared_bad_bytes_decode_lossily() {
        let url = serve_once("text/html", b"<p>caf\xe9</p>").await;
        let mut req = request(&[]);
        req.url = url;
        let resp = ReqwestHttp::new().fetch(&req).await.unwrap();
        assert_eq!(resp.body, "<p>caf\u{fffd}</p>");
    }

    #[tokio::test]
    async fn test_connection_failure_is_fetch_error() {
        let http = ReqwestHttp::new();
        let mut req = request(&[]);
        req.url = "http://127.0.0.1:9/unreachable".into();
        let err = http.fetch(&req).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Fetch);
    }
}
