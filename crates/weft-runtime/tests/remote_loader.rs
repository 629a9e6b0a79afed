//! Remote-URL loading against a local socket.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use weft_runtime::{
    call_value, remote_entry_key, LoadError, LoadInfo, Realm, ScriptAttrs, ScriptLoader,
};

/// Serve one HTTP response on an ephemeral port and return the base URL.
async fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/javascript\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn remote_load_extracts_named_export_and_publishes() {
    let base = serve_once(
        "200 OK",
        "module.exports = { RemoteApp: { mount: () => 'mounted' } };",
    )
    .await;
    let url = format!("{}/container/remote-entry.js", base);

    let realm = Realm::new();
    let loader = ScriptLoader::new(realm.clone());
    let info = LoadInfo {
        attrs: ScriptAttrs {
            name: Some("remote_app".to_string()),
            global_name: Some("RemoteApp".to_string()),
        },
        preload_hook: None,
    };
    let container = loader.load(&url, &info).await.unwrap();

    let mount = container
        .as_object()
        .expect("named export is the container interface")
        .borrow()
        .get("mount")
        .unwrap();
    assert_eq!(call_value(&mount, &[]).unwrap().as_str(), Some("mounted"));

    // Published under the caller-supplied global name.
    assert!(realm.get("RemoteApp").unwrap().strict_eq(&container));
}

#[tokio::test]
async fn remote_load_without_global_name_publishes_under_container_key() {
    let base = serve_once("200 OK", "module.exports = { ready: true };").await;
    let url = format!("{}/entry.js", base);

    let realm = Realm::new();
    let loader = ScriptLoader::new(realm.clone());
    let info = LoadInfo {
        attrs: ScriptAttrs::named("app2"),
        preload_hook: None,
    };
    let exported = loader.load(&url, &info).await.unwrap();
    let published = realm.get(&remote_entry_key("app2")).unwrap();
    assert!(published.strict_eq(&exported));
}

#[tokio::test]
async fn remote_http_error_status_is_fetch_failure() {
    let base = serve_once("404 Not Found", "").await;
    let url = format!("{}/missing.js", base);

    let realm = Realm::new();
    let loader = ScriptLoader::new(realm.clone());
    let result = loader
        .load(
            &url,
            &LoadInfo {
                attrs: ScriptAttrs::named("app3"),
                preload_hook: None,
            },
        )
        .await;
    assert!(matches!(result, Err(LoadError::FetchFailure { .. })));
    assert!(realm.get(&remote_entry_key("app3")).is_none());
}

#[tokio::test]
async fn remote_connection_refused_is_fetch_failure() {
    // Bind then drop to get a port with no listener.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let realm = Realm::new();
    let loader = ScriptLoader::new(realm.clone());
    let result = loader
        .load(
            &format!("http://{}/entry.js", addr),
            &LoadInfo {
                attrs: ScriptAttrs::named("app4"),
                preload_hook: None,
            },
        )
        .await;
    assert!(matches!(result, Err(LoadError::FetchFailure { .. })));
    assert!(realm.get(&remote_entry_key("app4")).is_none());
}

#[tokio::test]
async fn remote_execution_error_is_execution_failure_and_nothing_published() {
    let base = serve_once("200 OK", "throw 'remote payload broke';").await;
    let url = format!("{}/entry.js", base);

    let realm = Realm::new();
    let loader = ScriptLoader::new(realm.clone());
    let result = loader
        .load(
            &url,
            &LoadInfo {
                attrs: ScriptAttrs::named("app5"),
                preload_hook: None,
            },
        )
        .await;
    match result {
        Err(LoadError::ExecutionFailure(e)) => {
            assert!(e.to_string().contains("remote payload broke"))
        }
        other => panic!("expected execution failure, got {:?}", other.map(|_| ())),
    }
    assert!(realm.get(&remote_entry_key("app5")).is_none());
}

#[tokio::test]
async fn malformed_remote_url_is_invalid_location() {
    let loader = ScriptLoader::new(Realm::new());
    let result = loader
        .create_script("https://exa mple.com/entry.js", None, None)
        .await;
    assert!(matches!(result, Err(LoadError::InvalidLocation(_))));
}
