//! Integration tests for the service manager daemon.
//!
//! These tests start a real listener and talk to it over the Unix socket.
//! Standard tools stand in for the privileged helpers: each receives the
//! service name as its only argument, exactly like the real helpers.

use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nix::unistd::getuid;
use serde_json::{json, Value};
use tempfile::TempDir;

use svcmgr_daemon::config::Settings;
use svcmgr_daemon::socket::SocketListener;

const REGISTRY: &str = r#"
services:
  pzserver:
    display_name: "PZServer Game Server"
    description: "Project Zomboid dedicated game server"
  web:
    display_name: "Web Frontend"
    permissions_required: stop
  api:
    permissions_required: all
    status_check_allowed: false
"#;

/// Test daemon instance.
struct TestDaemon {
    socket_path: PathBuf,
    registry_path: PathBuf,
    audit_path: PathBuf,
    temp_dir: TempDir,
    listener: Arc<SocketListener>,
    shutdown: Arc<tokio::sync::Notify>,
}

fn settings_toml(dir: &Path, allowed_uid: u32, default_service: &str) -> String {
    format!(
        r#"
[socket]
path = "{socket}"
permissions = "0600"

[security]
allowed_peer_uids = [{uid}]

[registry]
path = "{registry}"
default_service = "{default_service}"

[helpers]
use_escalation = false
status = "/bin/echo"
start = "/bin/true"
stop = "/bin/false"
restart = "/bin/true"
status_timeout_seconds = 5
action_timeout_seconds = 5

[logging]
level = "warn"

[limits]
socket_timeout_seconds = 10

[audit]
enabled = true
log_path = "{audit}"
"#,
        socket = dir.join("daemon.sock").display(),
        uid = allowed_uid,
        registry = dir.join("services.yaml").display(),
        default_service = default_service,
        audit = dir.join("audit/audit.log").display(),
    )
}

impl TestDaemon {
    async fn start() -> Self {
        Self::start_with_uid(getuid().as_raw()).await
    }

    async fn start_with_uid(allowed_uid: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(temp_dir.path().join("services.yaml"), REGISTRY)
            .expect("Failed to write registry");

        let settings =
            Settings::from_toml_str(&settings_toml(temp_dir.path(), allowed_uid, "pzserver"))
                .expect("Invalid test settings");

        let listener = Arc::new(
            SocketListener::bind(Arc::new(settings))
                .await
                .expect("Failed to bind socket"),
        );

        let shutdown = Arc::new(tokio::sync::Notify::new());
        let shutdown_for_run = Arc::clone(&shutdown);
        let listener_for_run = Arc::clone(&listener);
        tokio::spawn(async move {
            if let Err(e) = listener_for_run.run(shutdown_for_run).await {
                eprintln!("Listener error: {}", e);
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            socket_path: temp_dir.path().join("daemon.sock"),
            registry_path: temp_dir.path().join("services.yaml"),
            audit_path: temp_dir.path().join("audit/audit.log"),
            temp_dir,
            listener,
            shutdown,
        }
    }

    fn connect(&self) -> Client {
        let stream = UnixStream::connect(&self.socket_path).expect("Failed to connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(15)))
            .expect("Failed to set read timeout");
        stream
            .set_write_timeout(Some(Duration::from_secs(15)))
            .expect("Failed to set write timeout");
        Client { stream }
    }

    /// Send one request on a fresh connection.
    fn send_request(&self, command: &str, params: Value) -> Value {
        self.connect()
            .request(command, params)
            .expect("Request failed")
    }

    fn audit_lines(&self) -> Vec<Value> {
        std::fs::read_to_string(&self.audit_path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).expect("Audit line is not JSON"))
            .collect()
    }

    async fn stop(self) {
        self.shutdown.notify_waiters();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

struct Client {
    stream: UnixStream,
}

impl Client {
    fn request(&mut self, command: &str, params: Value) -> Result<Value, String> {
        let body = serde_json::to_vec(&json!({"command": command, "params": params}))
            .map_err(|e| format!("Failed to serialize: {}", e))?;
        self.send_raw(&body)
    }

    fn send_raw(&mut self, body: &[u8]) -> Result<Value, String> {
        self.stream
            .write_all(&(body.len() as u32).to_be_bytes())
            .and_then(|_| self.stream.write_all(body))
            .and_then(|_| self.stream.flush())
            .map_err(|e| format!("Failed to write: {}", e))?;

        let mut length_bytes = [0u8; 4];
        self.stream
            .read_exact(&mut length_bytes)
            .map_err(|e| format!("Failed to read response length: {}", e))?;

        let mut response = vec![0u8; u32::from_be_bytes(length_bytes) as usize];
        self.stream
            .read_exact(&mut response)
            .map_err(|e| format!("Failed to read response: {}", e))?;

        serde_json::from_slice(&response).map_err(|e| format!("Failed to parse: {}", e))
    }
}

fn error_code(response: &Value) -> &str {
    response["error"]["code"].as_str().unwrap_or("")
}

// ============================================================================
// Socket Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_socket_created_with_permissions() {
    let daemon = TestDaemon::start().await;

    let metadata = std::fs::metadata(&daemon.socket_path).expect("Socket file should exist");
    assert_eq!(metadata.permissions().mode() & 0o777, 0o600);

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_many_requests_on_one_connection() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.connect();

    for i in 0..5 {
        let response = client.request("services.list", json!({})).unwrap();
        assert_eq!(response["success"], true, "Request {}: {:?}", i, response);
        assert!(response["request_id"].is_string());
    }

    // Requests are counted after the response is written.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(daemon.listener.metrics().total_requests(), 5);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_request_keeps_connection() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.connect();

    let response = client.send_raw(b"{not json").unwrap();
    assert_eq!(response["success"], false);
    assert_eq!(error_code(&response), "INVALID_REQUEST");

    let response = client.request("services.list", json!({})).unwrap();
    assert_eq!(response["success"], true);

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unauthorized_peer_rejected() {
    let daemon = TestDaemon::start_with_uid(getuid().as_raw().wrapping_add(1)).await;

    let result = daemon.connect().request("services.list", json!({}));
    assert!(result.is_err(), "Expected connection to be dropped: {:?}", result);

    daemon.stop().await;
}

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_services() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("services.list", json!({}));
    assert_eq!(response["success"], true, "{:?}", response);

    let services = response["data"]["services"].as_array().unwrap();
    let names: Vec<&str> = services.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["api", "pzserver", "web"]);

    assert_eq!(services[0]["status"], "status_check_disabled");
    assert_eq!(services[0]["permissions"], "all");
    // The stand-in status helper echoes the service name back as its state.
    assert_eq!(services[1]["status"], "pzserver");
    assert_eq!(services[1]["display_name"], "PZServer Game Server");
    assert_eq!(services[2]["status"], "web");
    assert_eq!(services[2]["permissions"], "stop");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("service.status", json!({"service": "web"}));
    assert_eq!(response["data"]["status"], "web");

    let response = daemon.send_request("service.status", json!({}));
    assert_eq!(response["data"]["service"], "pzserver");
    assert_eq!(response["data"]["status"], "pzserver");

    let response = daemon.send_request("service.status", json!({"service": "db"}));
    assert_eq!(response["success"], false);
    assert_eq!(error_code(&response), "NOT_FOUND");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_permission_denied_is_audited() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("service.start", json!({"service": "web"}));
    assert_eq!(response["success"], false);
    assert_eq!(error_code(&response), "PERMISSION_DENIED");
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("not permitted"));

    let audit = daemon.audit_lines();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["command"], "service.start");
    assert_eq!(audit[0]["service"], "web");
    assert_eq!(audit[0]["action"], "start");
    assert_eq!(audit[0]["peer_uid"], getuid().as_raw());
    assert_eq!(audit[0]["result"]["status"], "failure");
    assert_eq!(audit[0]["result"]["error_code"], "PERMISSION_DENIED");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_helper_reports_action_failed() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("service.stop", json!({"service": "web"}));
    assert_eq!(response["success"], false, "{:?}", response);
    assert_eq!(error_code(&response), "ACTION_FAILED");
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to stop service"));
    assert_eq!(response["data"]["service"], "web");
    assert_eq!(response["data"]["action"], "stop");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_defaults_to_default_service() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("service.restart", json!({}));
    assert_eq!(response["success"], true, "{:?}", response);
    assert_eq!(response["data"]["service"], "pzserver");
    assert_eq!(
        response["data"]["message"],
        "Service restart initiated successfully"
    );

    let audit = daemon.audit_lines();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["service"], "pzserver");
    assert_eq!(audit[0]["result"]["status"], "success");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_action() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request(
        "service.action",
        json!({"service": "api", "action": "start"}),
    );
    assert_eq!(response["success"], true, "{:?}", response);

    let response = daemon.send_request(
        "service.action",
        json!({"service": "api", "action": "reboot"}),
    );
    assert_eq!(error_code(&response), "INVALID_ACTION");
    assert_eq!(response["error"]["message"], "Invalid action: reboot");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queries_are_not_audited() {
    let daemon = TestDaemon::start().await;

    daemon.send_request("services.list", json!({}));
    daemon.send_request("service.status", json!({"service": "web"}));
    assert!(daemon.audit_lines().is_empty());

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_command() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("service.reboot", json!({"service": "web"}));
    assert_eq!(response["success"], false);
    assert_eq!(error_code(&response), "UNKNOWN_COMMAND");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_required_parameter() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("service.start", json!({}));
    assert_eq!(response["success"], false);
    assert_eq!(error_code(&response), "INVALID_REQUEST");

    daemon.stop().await;
}

// ============================================================================
// Reload Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registry_edits_take_effect_immediately() {
    let daemon = TestDaemon::start().await;

    let response = daemon.send_request("service.start", json!({"service": "web"}));
    assert_eq!(error_code(&response), "PERMISSION_DENIED");

    std::fs::write(
        &daemon.registry_path,
        "services:\n  web:\n    permissions_required: all\n",
    )
    .unwrap();

    let response = daemon.send_request("service.start", json!({"service": "web"}));
    assert_eq!(response["success"], true, "{:?}", response);

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_broken_registry_falls_back() {
    let daemon = TestDaemon::start().await;

    std::fs::write(&daemon.registry_path, "services: [broken").unwrap();

    let response = daemon.send_request("services.list", json!({}));
    let services = response["data"]["services"].as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["name"], "pzserver");
    assert_eq!(services[0]["permissions"], "restart");

    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_settings_reload() {
    let daemon = TestDaemon::start().await;

    let reloaded = Settings::from_toml_str(&settings_toml(
        daemon.temp_dir.path(),
        getuid().as_raw(),
        "web",
    ))
    .unwrap();
    daemon.listener.reload(reloaded);

    let response = daemon.send_request("service.status", json!({}));
    assert_eq!(response["data"]["service"], "web");

    daemon.stop().await;
}
