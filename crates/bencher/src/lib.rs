//! Shared fixtures for the onion benchmarks.

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    file: TestFile,
}

impl TestCase {
    pub const fn new(name: &'static str, file: TestFile) -> Self {
        Self { name, file }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }
}

/// A raw request as it arrives on the wire.
#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}

pub static GET_SMALL: TestFile = TestFile::new(
    "get_small",
    concat!("GET /users?id=7 HTTP/1.1\r\n", "Host: 127.0.0.1:3000\r\n", "Accept: */*\r\n", "\r\n"),
);

pub static GET_LARGE: TestFile = TestFile::new(
    "get_large",
    concat!(
        "GET /api/v1/projects/onion/releases?page=2&per_page=50 HTTP/1.1\r\n",
        "Host: app.example.com\r\n",
        "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:131.0) Gecko/20100101 Firefox/131.0\r\n",
        "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n",
        "Accept-Language: en-US,en;q=0.5\r\n",
        "Accept-Encoding: gzip, deflate, br, zstd\r\n",
        "Referer: https://app.example.com/projects/onion\r\n",
        "Cookie: session=4f6b2c1e9a8d7f3b; theme=dark; locale=en-US; tz=Europe%2FBerlin\r\n",
        "X-Forwarded-For: 203.0.113.7, 198.51.100.23, 10.0.0.12\r\n",
        "X-Forwarded-Proto: https\r\n",
        "X-Request-Id: 9f0c7a52-3b8e-4e61-a7d2-5c1f08b9e4aa\r\n",
        "If-None-Match: \"b7a1e3\"\r\n",
        "If-Modified-Since: Wed, 21 Oct 2015 07:28:00 GMT\r\n",
        "Cache-Control: max-age=0\r\n",
        "Connection: keep-alive\r\n",
        "\r\n",
    ),
);

pub static POST_JSON: TestFile = TestFile::new(
    "post_json",
    concat!(
        "POST /users HTTP/1.1\r\n",
        "Host: 127.0.0.1:3000\r\n",
        "Content-Type: application/json\r\n",
        "Content-Length: 27\r\n",
        "\r\n",
        r#"{"name":"onion","id":1024}"#,
        "\n",
    ),
);
