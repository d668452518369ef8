//! HTTP fetcher built on reqwest's blocking client.

use std::time::Duration;

use reqwest::blocking::Client;

use super::{FetchError, FetchStream, Fetcher};

/// Default request timeout in seconds.
///
/// Elevation datasets are large, so this is generous compared to tile APIs.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Fetches resources over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with default timeouts.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Create a fetcher with custom request and connect timeouts.
    ///
    /// `timeout` bounds the whole transfer, including reading the body, not
    /// just a stalled read. A body still streaming when it expires fails
    /// with [`FetchError::Timeout`].
    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchStream, FetchError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        tracing::debug!(
            url,
            content_length = response.content_length(),
            "Streaming remote resource"
        );
        Ok(Box::new(response))
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single connection with a canned response.
    fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = stream;
            let _ = stream.write_all(response);
            let _ = stream.flush();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_default_timeouts() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(fetcher.timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_fetch_streams_body() {
        let origin =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello");
        let fetcher = HttpFetcher::new().unwrap();

        let mut body = Vec::new();
        fetcher
            .fetch(&format!("{}/maps/a.jpg", origin))
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_fetch_error_status() {
        let origin = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let fetcher = HttpFetcher::new().unwrap();

        let result = fetcher.fetch(&format!("{}/maps/missing.jpg", origin));
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[test]
    fn test_fetch_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = HttpFetcher::new().unwrap();

        let result = fetcher.fetch(&format!("http://127.0.0.1:{}/a.jpg", port));
        assert!(matches!(result, Err(FetchError::Network { .. })));
    }

    #[test]
    fn test_fetch_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            // Accept and hold the connection open without answering.
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
            drop(stream);
        });

        let fetcher =
            HttpFetcher::with_timeouts(Duration::from_millis(300), Duration::from_secs(1)).unwrap();
        let result = fetcher.fetch(&format!("http://{}/slow.jpg", addr));
        assert!(matches!(result, Err(FetchError::Timeout { .. })));

        handle.join().unwrap();
    }

    #[test]
    fn test_timeout_bounds_body_transfer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            // Answer headers and part of the body at once, then stall.
            let (mut stream, _) = listener.accept().unwrap();
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\npartial",
            );
            let _ = stream.flush();
            thread::sleep(Duration::from_secs(3));
            drop(stream);
        });

        let fetcher =
            HttpFetcher::with_timeouts(Duration::from_millis(500), Duration::from_secs(1)).unwrap();
        let started = std::time::Instant::now();
        let mut body = fetcher.fetch(&format!("http://{}/big.img", addr)).unwrap();

        let mut buf = Vec::new();
        let read = body.read_to_end(&mut buf);
        assert!(read.is_err());
        assert!(started.elapsed() < Duration::from_secs(3));

        let error = FetchError::from_body_error("http://x", &read.unwrap_err(), 1);
        assert!(matches!(
            error,
            FetchError::Timeout { .. } | FetchError::Network { .. }
        ));

        handle.join().unwrap();
    }
}
