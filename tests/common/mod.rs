//! Canned HTTP server for CoinGecko client tests

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;
type Hung = Arc<Mutex<HashSet<String>>>;

/// Answers each GET with the response registered for its path
///
/// Unregistered paths get a plain-text 404. Paths marked with
/// [`MockHttpServer::hang`] read the request and never answer.
pub struct MockHttpServer {
    pub addr: SocketAddr,
    routes: Routes,
    hung: Hung,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<Notify>,
}

impl MockHttpServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Routes = Arc::default();
        let hung: Hung = Arc::default();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(Notify::new());

        let (routes_task, hung_task, requests_task, shutdown_task) = (
            routes.clone(),
            hung.clone(),
            requests.clone(),
            shutdown.clone(),
        );
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        let routes = routes_task.clone();
                        let hung = hung_task.clone();
                        let requests = requests_task.clone();
                        tokio::spawn(Self::handle_connection(stream, routes, hung, requests));
                    }
                    _ = shutdown_task.notified() => break,
                }
            }
        });

        Self {
            addr,
            routes,
            hung,
            requests,
            shutdown,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.into()));
    }

    /// Accepts requests for `path` but never responds
    pub fn hang(&self, path: &str) {
        self.hung.lock().unwrap().insert(path.to_string());
    }

    /// Request targets (path and query) received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    async fn handle_connection(
        stream: TcpStream,
        routes: Routes,
        hung: Hung,
        requests: Arc<Mutex<Vec<String>>>,
    ) {
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
            return;
        }
        loop {
            let mut header = String::new();
            match reader.read_line(&mut header).await {
                Ok(0) => break,
                Ok(_) if header == "\r\n" || header == "\n" => break,
                Ok(_) => continue,
                Err(_) => return,
            }
        }

        let target = request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or("/")
            .to_string();
        let path = target.split('?').next().unwrap_or("/").to_string();
        requests.lock().unwrap().push(target);

        let hang = hung.lock().unwrap().contains(&path);
        if hang {
            // Keep the connection open until the client gives up
            let _stream = reader;
            std::future::pending::<()>().await;
            return;
        }

        let (status, body, content_type) = match routes.lock().unwrap().get(&path) {
            Some((status, body)) => (*status, body.clone(), "application/json"),
            None => (404, "Not Found".to_string(), "text/plain"),
        };

        let response = format!(
            "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        let mut stream = reader.into_inner();
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

/// Base URL of a port nothing listens on
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
