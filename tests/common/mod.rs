//! Common test utilities - ShareTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use imgshare::config::ServerConfig;
use imgshare::images::MemoryImageStore;
use imgshare::Server;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tokio::task::JoinHandle;

/// Extra allowed origin configured on every test server
pub const FRONTEND_ORIGIN: &str = "https://share.example.com";

/// Test harness that spawns a real imgshare server on a random port,
/// backed by an in-memory image store
pub struct ShareTest {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryImageStore>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl ShareTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with_purge_interval(None).await
    }

    /// Start a test server, optionally running the expired-image reaper
    pub async fn start_with_purge_interval(purge_interval: Option<Duration>) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = ServerConfig {
            bind_addr: addr,
            frontend_url: Some(FRONTEND_ORIGIN.to_string()),
            purge_interval,
        };

        let store = Arc::new(MemoryImageStore::new());
        let server = Arc::new(Server::with_store(config, store.clone()));
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            store,
            server,
            handle: Some(handle),
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.get(self.url(path)).send().await?)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.delete(self.url(path)).send().await?)
    }

    /// Upload `data` as the `image` multipart field
    pub async fn upload(
        &self,
        path: &str,
        file_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().part("image", part);
        Ok(self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await?)
    }

    /// Upload an image and return its share id
    pub async fn share(&self, file_name: &str, mime_type: &str, data: Vec<u8>) -> Result<String> {
        let resp = self.upload("/upload", file_name, mime_type, data).await?;
        anyhow::ensure!(resp.status() == 200, "upload failed: {}", resp.status());
        let body: serde_json::Value = resp.json().await?;
        body["shareId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("no shareId in {}", body))
    }

    /// Shutdown the server gracefully and wait for it to finish
    pub async fn stop(mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for ShareTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// True when `id` is exactly 32 lowercase hex characters
pub fn is_share_id(id: &str) -> bool {
    id.len() == 32 && id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}
