//! Drives the watcher/follower pair against a minimal hand-rolled server
//! speaking the wire protocol directly, standing in for the shell-driven
//! scenarios in spec §8 (S1/S2 at the integration-test level).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use logrelay_agent::{context::AgentContext, watcher, Config};
use logrelay_protocol::{frame, DataMeta, Header, LengthPayload, DATA_COMMAND, HEADER_COMMAND};
use tempfile::tempdir;
use tokio::io::BufReader;
use tokio::net::TcpListener;

fn test_config(server_host: String, server_port: u16, scan_glob: String) -> Config {
    Config {
        scan_globs: vec![scan_glob],
        scan_exclude_globs: vec![],
        server_host,
        server_port,
        tls: false,
        tls_cert: None,
        client_token: "topsecret".to_string(),
        log_file: None,
        verbose: false,
        scan_new_files_interval: Duration::from_millis(20),
        tail_read_interval: Duration::from_millis(20),
        rotated_files_inactivity_threshold: Duration::from_secs(600),
        prefix_length: 10,
        min_prefix_length: 2,
    }
}

/// Accepts a single connection, replies `length: 0` to the header, then
/// appends every received `data` payload to `received`.
async fn spawn_capturing_server(received: Arc<Mutex<Vec<u8>>>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket, _peer) = listener.accept().await.unwrap();
        let mut conn = BufReader::new(socket);

        let request = frame::read_request(&mut conn).await.unwrap();
        assert_eq!(request.command, HEADER_COMMAND);
        let _header: Header = serde_json::from_value(request.meta).unwrap();
        frame::write_reply_ok(&mut conn, Some(&LengthPayload { length: 0 }))
            .await
            .unwrap();

        loop {
            let request = match frame::read_request(&mut conn).await {
                Ok(request) => request,
                Err(_) => break,
            };
            if request.command != DATA_COMMAND {
                break;
            }
            let meta: DataMeta = serde_json::from_value(request.meta).unwrap();
            let payload = match meta.compression {
                None => request.data,
                Some(codec) => logrelay_protocol::compression::decompress(request.data, codec)
                    .await
                    .unwrap(),
            };
            received.lock().unwrap().extend_from_slice(&payload);
            frame::write_reply_ok(&mut conn, None::<&()>).await.ok();
        }
    });

    addr
}

#[tokio::test]
async fn follower_streams_existing_content_and_appended_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sample.log");
    tokio::fs::write(&path, b"2021-02-22 Hello world!\n")
        .await
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let addr = spawn_capturing_server(received.clone()).await;

    let cfg = test_config(
        addr.ip().to_string(),
        addr.port(),
        path.to_string_lossy().into_owned(),
    );
    let ctx = Arc::new(AgentContext::new(cfg));

    let watch_path: PathBuf = path.clone();
    let handle = tokio::spawn(async move { watcher::run(ctx, watch_path).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        received.lock().unwrap().as_slice(),
        b"2021-02-22 Hello world!\n"
    );

    tokio::fs::write(
        &path,
        b"2021-02-22 Hello world!\nSecond line\n".to_vec(),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        received.lock().unwrap().as_slice(),
        b"2021-02-22 Hello world!\nSecond line\n"
    );

    handle.abort();
}
