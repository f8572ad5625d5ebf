//! Download transports for address lists and dnsmasq fragments.
//!
//! A transport has one job: write the body of an HTTP(S) GET to a local
//! path and report success or failure. The built-in client (reqwest +
//! rustls) is the default; `curl` and `wget` can be substituted for
//! systems where an external tool is preferred.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::cmd_abstraction::{
    args_to_strings, tool_available, CommandExecutor, CommandOutput, RealCommandExecutor,
};
use crate::error::FetchError;

const TIMEOUT_SECS: u64 = 60;

/// Maximum size of a single downloaded list (32 MB)
/// Full-table IPv4 country lists are a few MB, so this leaves ample margin
pub const MAX_LIST_SIZE: u64 = 32 * 1024 * 1024;

/// Which transport to use for downloads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Built-in HTTP client
    #[default]
    Builtin,
    /// External curl
    Curl,
    /// External wget
    Wget,
    /// curl if present, else wget
    Auto,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "builtin" => Ok(TransportKind::Builtin),
            "curl" => Ok(TransportKind::Curl),
            "wget" => Ok(TransportKind::Wget),
            "auto" => Ok(TransportKind::Auto),
            other => Err(format!(
                "Unknown transport '{}' (builtin, curl, wget, auto)",
                other
            )),
        }
    }
}

/// HTTP GET capability: write the response body to `dest`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;

    /// Short name for log lines.
    fn name(&self) -> &str;
}

/// Built-in HTTP client
pub struct HttpTransport {
    client: Client,
    max_size: u64,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("listsync/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_size: MAX_LIST_SIZE,
        })
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_size {
                return Err(FetchError::TooLarge {
                    size: content_length,
                    max: self.max_size,
                });
            }
        }

        let mut file = File::create(dest)?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            // Content-Length may be absent or wrong; enforce the limit on what arrives
            if written > self.max_size {
                return Err(FetchError::TooLarge {
                    size: written,
                    max: self.max_size,
                });
            }
            file.write_all(&chunk)?;
        }
        file.sync_all()?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

/// External download tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTool {
    Curl,
    Wget,
}

impl DownloadTool {
    fn program(&self) -> &'static str {
        match self {
            DownloadTool::Curl => "curl",
            DownloadTool::Wget => "wget",
        }
    }

    /// Arguments that write the body to stdout.
    fn args(&self, url: &str) -> Vec<String> {
        let timeout = TIMEOUT_SECS.to_string();
        match self {
            DownloadTool::Curl => args_to_strings(&["-fsSL", "--max-time", &timeout, url]),
            DownloadTool::Wget => args_to_strings(&["-q", "-T", &timeout, "-O", "-", url]),
        }
    }
}

/// Downloads through curl or wget
///
/// The tool writes to stdout, which is the destination file opened here.
/// It never touches the path itself, so once the temporary file is unlinked
/// nothing can recreate it. The child is killed if the download is dropped.
pub struct CommandTransport {
    tool: DownloadTool,
    program: PathBuf,
}

impl CommandTransport {
    pub fn new(tool: DownloadTool) -> Self {
        Self {
            tool,
            program: PathBuf::from(tool.program()),
        }
    }

    /// Run a specific binary instead of looking the tool up in PATH.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Pick curl if it runs, else wget.
    pub fn detect(executor: &dyn CommandExecutor) -> Result<Self, FetchError> {
        for tool in [DownloadTool::Curl, DownloadTool::Wget] {
            if tool_available(executor, tool.program()) {
                return Ok(Self::new(tool));
            }
        }
        Err(FetchError::Unavailable)
    }

    pub fn tool(&self) -> DownloadTool {
        self.tool
    }
}

#[async_trait]
impl Transport for CommandTransport {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let tool = self.tool.program();
        let file = File::create(dest)?;

        let child = Command::new(&self.program)
            .args(self.tool.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => FetchError::Unavailable,
                _ => FetchError::Command {
                    tool: tool.to_string(),
                    reason: e.to_string(),
                },
            })?;

        let output = CommandOutput::from(child.wait_with_output().await?);
        if !output.success {
            return Err(FetchError::Command {
                tool: tool.to_string(),
                reason: output.failure_reason(),
            });
        }

        let size = std::fs::metadata(dest)?.len();
        debug!("{} downloaded {} bytes from {}", tool, size, url);
        Ok(size)
    }

    fn name(&self) -> &str {
        self.tool.program()
    }
}

/// Create a transport from configuration.
pub fn create_transport(kind: TransportKind) -> Result<Box<dyn Transport>, FetchError> {
    match kind {
        TransportKind::Builtin => Ok(Box::new(HttpTransport::new()?)),
        TransportKind::Curl => Ok(Box::new(CommandTransport::new(DownloadTool::Curl))),
        TransportKind::Wget => Ok(Box::new(CommandTransport::new(DownloadTool::Wget))),
        TransportKind::Auto => Ok(Box::new(CommandTransport::detect(&RealCommandExecutor::new())?)),
    }
}

/// Last non-empty path segment of a URL, used as an install file name.
pub fn file_name_from_url(url: &str) -> Option<PathBuf> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()?
        .to_string();
    if segment == "." || segment == ".." {
        return None;
    }
    Some(PathBuf::from(segment))
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Transport serving a fixed body (or a fixed failure)
    pub struct StaticTransport {
        pub body: Option<Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
        pub dest_paths: Mutex<Vec<PathBuf>>,
    }

    impl StaticTransport {
        pub fn serving(body: &str) -> Self {
            Self {
                body: Some(body.as_bytes().to_vec()),
                requests: Mutex::new(Vec::new()),
                dest_paths: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                body: None,
                requests: Mutex::new(Vec::new()),
                dest_paths: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.dest_paths.lock().unwrap().push(dest.to_path_buf());
            match &self.body {
                Some(body) => {
                    std::fs::write(dest, body)?;
                    Ok(body.len() as u64)
                }
                None => Err(FetchError::Status(reqwest::StatusCode::NOT_FOUND)),
            }
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// Transport that writes part of a body and then never finishes
    pub struct StallingTransport {
        pub dest_paths: Mutex<Vec<PathBuf>>,
    }

    impl StallingTransport {
        pub fn new() -> Self {
            Self {
                dest_paths: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for StallingTransport {
        async fn download(&self, _url: &str, dest: &Path) -> Result<u64, FetchError> {
            self.dest_paths.lock().unwrap().push(dest.to_path_buf());
            std::fs::write(dest, b"10.0.0.0/8\n172.16.")?;
            futures::future::pending::<()>().await;
            unreachable!()
        }

        fn name(&self) -> &str {
            "stalling"
        }
    }

    /// Answer one request on a local port with a raw HTTP response.
    ///
    /// Returns the URL to fetch.
    pub async fn serve_raw(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/china_ip_list.txt", addr)
    }

    /// Response with a Content-Length header
    pub fn sized_response(body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    /// Chunked response that never announces its length
    pub fn chunked_response(body: &[u8]) -> Vec<u8> {
        let mut out =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
        out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\r\n0\r\n\r\n");
        out
    }

    /// Write an executable shell script standing in for curl or wget.
    pub fn fake_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{chunked_response, fake_tool, serve_raw, sized_response};
    use super::*;
    use crate::cmd_abstraction::MockCommandExecutor;
    use tempfile::TempDir;

    fn ok() -> anyhow::Result<CommandOutput> {
        Ok(CommandOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("curl".parse::<TransportKind>(), Ok(TransportKind::Curl));
        assert_eq!("auto".parse::<TransportKind>(), Ok(TransportKind::Auto));
        assert!("aria2".parse::<TransportKind>().is_err());
        assert_eq!(TransportKind::default(), TransportKind::Builtin);
    }

    #[test]
    fn test_curl_args() {
        let args = DownloadTool::Curl.args("https://example.com/a.txt");
        assert_eq!(
            args,
            vec!["-fsSL", "--max-time", "60", "https://example.com/a.txt"]
        );
    }

    #[test]
    fn test_wget_args() {
        let args = DownloadTool::Wget.args("https://example.com/a.txt");
        assert_eq!(
            args,
            vec!["-q", "-T", "60", "-O", "-", "https://example.com/a.txt"]
        );
    }

    #[test]
    fn test_detect_prefers_curl() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, _| cmd == "curl")
            .returning(|_, _| ok());

        let transport = CommandTransport::detect(&mock).unwrap();
        assert_eq!(transport.tool(), DownloadTool::Curl);
    }

    #[test]
    fn test_detect_falls_back_to_wget() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, _| cmd == "curl")
            .returning(|_, _| Err(anyhow::anyhow!("Failed to execute curl")));
        mock.expect_execute()
            .withf(|cmd, _| cmd == "wget")
            .returning(|_, _| ok());

        let transport = CommandTransport::detect(&mock).unwrap();
        assert_eq!(transport.tool(), DownloadTool::Wget);
        assert_eq!(transport.name(), "wget");
    }

    #[test]
    fn test_detect_none_available() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .returning(|cmd, _| Err(anyhow::anyhow!("Failed to execute {}", cmd)));

        let result = CommandTransport::detect(&mock);
        assert!(matches!(result, Err(FetchError::Unavailable)));
    }

    #[tokio::test]
    async fn test_command_transport_streams_stdout_to_dest() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "curl", r#"printf '%s\n' "$@""#);
        let dest = dir.path().join("out");

        let transport = CommandTransport::new(DownloadTool::Curl).with_program(&tool);
        let size = transport
            .download("https://example.com/l", &dest)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(written, "-fsSL\n--max-time\n60\nhttps://example.com/l\n");
        assert_eq!(size, written.len() as u64);
    }

    #[tokio::test]
    async fn test_command_transport_failure_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(
            dir.path(),
            "curl",
            "echo 'curl: (22) The requested URL returned error: 404' >&2\nexit 22",
        );

        let transport = CommandTransport::new(DownloadTool::Curl).with_program(&tool);
        let err = transport
            .download("https://example.com/missing", &dir.path().join("out"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Command { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_command_transport_missing_tool() {
        let dir = TempDir::new().unwrap();
        let transport =
            CommandTransport::new(DownloadTool::Wget).with_program("/nonexistent/listsync/wget");

        let result = transport
            .download("https://example.com/l", &dir.path().join("out"))
            .await;
        assert!(matches!(result, Err(FetchError::Unavailable)));
    }

    #[tokio::test]
    async fn test_http_download() {
        let url = serve_raw(sized_response(b"10.0.0.0/8\n")).await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out");

        let transport = HttpTransport::new().unwrap().with_max_size(16);
        let size = transport.download(&url, &dest).await.unwrap();

        assert_eq!(size, 11);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "10.0.0.0/8\n");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let url = serve_raw(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        )
        .await;
        let dir = TempDir::new().unwrap();

        let err = HttpTransport::new()
            .unwrap()
            .download(&url, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s == reqwest::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_http_content_length_over_limit() {
        let url = serve_raw(sized_response(&[b'1'; 64])).await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out");

        let err = HttpTransport::new()
            .unwrap()
            .with_max_size(16)
            .download(&url, &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { size: 64, max: 16 }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_http_chunked_body_over_limit() {
        let url = serve_raw(chunked_response(b"10.0.0.0/8\n172.16.0.0/12\n")).await;
        let dir = TempDir::new().unwrap();

        let err = HttpTransport::new()
            .unwrap()
            .with_max_size(16)
            .download(&url, &dir.path().join("out"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { max: 16, .. }));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url(
                "https://raw.githubusercontent.com/felixonmars/dnsmasq-china-list/master/accelerated-domains.china.conf"
            ),
            Some(PathBuf::from("accelerated-domains.china.conf"))
        );
        assert_eq!(
            file_name_from_url("https://example.com/lists/apple.china.conf?ref=main"),
            Some(PathBuf::from("apple.china.conf"))
        );
        assert_eq!(file_name_from_url("https://example.com/"), None);
        assert_eq!(file_name_from_url("not a url"), None);
    }
}
