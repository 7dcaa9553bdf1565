//! Development server with live reload

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

use crate::commands::build;
use crate::Site;

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
</body>
"#;

/// Server state
struct ServerState {
    dest_dir: PathBuf,
    /// Base path the site is mounted under, e.g. `/blog`
    base: String,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

/// Serve the built site. The site must already be built.
pub async fn start(
    site: &Site,
    host: &str,
    port: u16,
    watch: bool,
    open: bool,
    drafts: bool,
) -> Result<()> {
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let state = Arc::new(ServerState {
        dest_dir: site.dest_dir.clone(),
        base: site.config.base_path(),
        reload_tx: reload_tx.clone(),
        live_reload: watch,
    });

    let app = Router::new()
        .route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .with_state(state.clone());

    let bind_host = if host == "localhost" { "127.0.0.1" } else { host };
    let addr: SocketAddr = format!("{}:{}", bind_host, port).parse()?;

    let url = format!("http://{}:{}{}/", host, port, state.base);
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        let site = site.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_and_reload(site, drafts, reload_tx) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Rebuild on source changes and tell connected pages to reload
fn watch_and_reload(site: Site, drafts: bool, reload_tx: broadcast::Sender<()>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
    debouncer
        .watcher()
        .watch(&site.source_dir, RecursiveMode::Recursive)?;
    tracing::debug!("Watching: {:?}", site.source_dir);

    let mut site = site;
    for result in rx {
        match result {
            Ok(events) => {
                let changed: Vec<_> = events
                    .iter()
                    .filter(|e| build::is_source_change(&site, &e.path))
                    .collect();
                if changed.is_empty() {
                    continue;
                }
                for event in &changed {
                    println!("File changed: {}", event.path.display());
                }

                println!("Rebuilding...");
                if let Ok(rebuilt) = build::rebuild(&site, drafts) {
                    println!("Rebuilt successfully");
                    site = rebuilt;
                    let _ = reload_tx.send(());
                }
            }
            Err(e) => tracing::error!("Watch error: {:?}", e),
        }
    }

    Ok(())
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Serve files under the base path, injecting the live reload script
/// into HTML pages
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();

    if !state.base.is_empty() && path == "/" {
        let location = format!("{}/", state.base);
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }

    let Some(site_path) = strip_base(&path, &state.base) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let file_path = resolve_file(&state.dest_dir, &site_path);
    let is_html = file_path
        .extension()
        .is_some_and(|ext| ext == "html" || ext == "htm");

    if is_html && state.live_reload {
        return match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_live_reload(&content)).into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        };
    }

    let (mut parts, body) = request.into_parts();
    parts.uri = match site_path.parse::<Uri>() {
        Ok(uri) => uri,
        Err(_) => return (StatusCode::BAD_REQUEST, "Bad request").into_response(),
    };
    let request = Request::from_parts(parts, body);

    let mut service = ServeDir::new(&state.dest_dir).append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Request path with the base path removed
fn strip_base(path: &str, base: &str) -> Option<String> {
    if base.is_empty() {
        return Some(path.to_string());
    }
    let rest = path.strip_prefix(base)?;
    match rest {
        "" => Some("/".to_string()),
        _ if rest.starts_with('/') => Some(rest.to_string()),
        _ => None,
    }
}

/// Map a site path to a file the way a static host would
fn resolve_file(dest_dir: &Path, site_path: &str) -> PathBuf {
    let decoded = crate::helpers::decode_url(site_path);
    let clean = decoded.trim_start_matches('/');
    if clean.split('/').any(|c| c == "..") {
        return dest_dir.join("404.html");
    }

    let candidate = dest_dir.join(clean);
    if clean.is_empty() || candidate.is_dir() {
        return candidate.join("index.html");
    }
    if candidate.exists() {
        return candidate;
    }
    let with_html = dest_dir.join(format!("{}.html", clean));
    if with_html.exists() {
        with_html
    } else {
        candidate
    }
}

fn inject_live_reload(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], LIVE_RELOAD_SCRIPT, &html[pos + 7..]),
        None => format!("{}{}", html, LIVE_RELOAD_SCRIPT),
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
