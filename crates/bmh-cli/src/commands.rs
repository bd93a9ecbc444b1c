use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bmh_operator::{HostOperator, RestOperator};
use bmh_store::{InMemoryStore, ObjectStore, RedbStore};
use uuid::Uuid;

// ── Serve ─────────────────────────────────────────────────────────────────────

pub async fn serve(
    config: PathBuf,
    profiles_dir: PathBuf,
    operator_url: String,
    ephemeral: bool,
    store_path: Option<String>,
    rotate_token: bool,
    port: u16,
    bind: String,
) -> Result<()> {
    let controller_config =
        bmh_config::load(&config).with_context(|| format!("Failed to load config from {}", config.display()))?;
    let profiles = bmh_config::load_profiles(&profiles_dir)
        .with_context(|| format!("Failed to load hardware profiles from {}", profiles_dir.display()))?;

    // Reuse existing token unless rotation is explicitly requested.
    // This means server restarts don't invalidate client configurations.
    let token_path = default_token_path();
    let token = if !rotate_token {
        if let Ok(existing) = std::fs::read_to_string(&token_path).map(|s| s.trim().to_string()) {
            if !existing.is_empty() {
                println!("Reusing existing token from {}", token_path.display());
                existing
            } else {
                let t = generate_token();
                write_token(&token_path, &t)?;
                println!("Generated new token (written to {})", token_path.display());
                t
            }
        } else {
            let t = generate_token();
            write_token(&token_path, &t)?;
            println!("Generated new token (written to {})", token_path.display());
            t
        }
    } else {
        let t = generate_token();
        write_token(&token_path, &t)?;
        println!("Rotated token (written to {})", token_path.display());
        println!("New token: {}", t);
        t
    };

    let store: Arc<dyn ObjectStore> = if ephemeral {
        println!("Using in-memory (ephemeral) store — state will be lost on server stop");
        Arc::new(InMemoryStore::new())
    } else {
        let path = resolve_store_path(store_path);
        println!("Using persistent store at {}", path.display());
        Arc::new(
            RedbStore::open(&path).with_context(|| format!("Failed to open store at {}", path.display()))?,
        )
    };

    let operator: Arc<dyn HostOperator> = Arc::new(RestOperator::new(operator_url.clone()));

    let addr = format!("{bind}:{port}");
    println!("Starting bmhctl admin API on http://{addr} (operator: {operator_url}, profiles: {})", profiles.len());

    let app = bmh_api::build_app(store, operator, profiles, controller_config, Arc::new(token));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

// ── Reconcile ─────────────────────────────────────────────────────────────────

pub async fn reconcile(nar_id: String, remote: Option<String>, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let body = serde_json::json!({ "nar_id": nar_id });
    let report: serde_json::Value = authed_client(&token)
        .post(format!("{}/reconcile", url.trim_end_matches('/')))
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;

    print_report(&report);
    Ok(())
}

// ── Status ────────────────────────────────────────────────────────────────────

pub async fn status(remote: Option<String>, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let body: serde_json::Value = authed_client(&token)
        .get(format!("{}/status", url.trim_end_matches('/')))
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;

    if let Some(count) = body.get("nar_count").and_then(|v| v.as_u64()) {
        println!("NARs: {}", count);
    }
    if let Some(profiles) = body.get("hardware_profiles").and_then(|v| v.as_array()) {
        let names: Vec<&str> = profiles.iter().filter_map(|p| p.as_str()).collect();
        println!("Hardware profiles: {}", names.join(", "));
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

// ── Get ───────────────────────────────────────────────────────────────────────

pub async fn get_nar(id: String, remote: Option<String>, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let body: serde_json::Value = authed_client(&token)
        .get(format!("{}/nars/{}", url.trim_end_matches('/'), id))
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

pub async fn get_node(id: String, remote: Option<String>, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let body: serde_json::Value = authed_client(&token)
        .get(format!("{}/nodes/{}", url.trim_end_matches('/'), id))
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

// ── Deallocate ────────────────────────────────────────────────────────────────

pub async fn deallocate(
    nar_id: String,
    node_id: String,
    remote: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let report: serde_json::Value = authed_client(&token)
        .post(format!(
            "{}/nars/{}/nodes/{}/deallocate",
            url.trim_end_matches('/'),
            nar_id,
            node_id
        ))
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;

    print_report(&report);
    Ok(())
}

// ── Events ────────────────────────────────────────────────────────────────────

pub async fn events(
    nar_id: Option<String>,
    limit: Option<u32>,
    remote: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let token = resolve_token(token)?;
    let url = server_url(remote);
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(id) = &nar_id {
        query.push(("nar_id", id.clone()));
    }
    if let Some(l) = limit {
        query.push(("limit", l.to_string()));
    }

    let events: Vec<serde_json::Value> = authed_client(&token)
        .get(format!("{}/events", url.trim_end_matches('/')))
        .query(&query)
        .send()
        .await
        .with_context(|| format!("Failed to reach server at {url}"))?
        .json()
        .await?;

    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }
    for e in &events {
        println!("{}", serde_json::to_string(e)?);
    }
    Ok(())
}

fn print_report(report: &serde_json::Value) {
    if let Some(changes) = report.get("changes").and_then(|c| c.as_array()) {
        for c in changes {
            println!("{}", c);
        }
    }
    let n_changes = report.get("changes").and_then(|c| c.as_array()).map(|a| a.len()).unwrap_or(0);
    println!("{} change(s) applied.", n_changes);

    if let Some(errors) = report.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            eprintln!("\n{} error(s):", errors.len());
            for e in errors {
                eprintln!("  ! {}", e);
            }
        }
    }
    if let Some(requeue) = report.get("requeue") {
        if !requeue.is_null() && requeue.as_str() != Some("None") {
            println!("Requeue: {}", requeue);
        }
    }
}

// ── Token helpers ─────────────────────────────────────────────────────────────

/// Generate a cryptographically random token as a 64-character hex string.
fn generate_token() -> String {
    let a = Uuid::new_v4().to_string().replace('-', "");
    let b = Uuid::new_v4().to_string().replace('-', "");
    format!("{}{}", a, b)
}

/// Resolve the token to use for API calls.
///
/// Priority: explicit value (from --token / BMH_TOKEN) → ~/.bmhctl/token file
fn resolve_token(explicit: Option<String>) -> Result<String> {
    if let Some(t) = explicit {
        return Ok(t);
    }
    let path = default_token_path();
    std::fs::read_to_string(&path).map(|s| s.trim().to_string()).with_context(|| {
        format!(
            "No token provided and could not read token file at {}. \
             Use --token, BMH_TOKEN, or run `bmhctl serve` first.",
            path.display()
        )
    })
}

/// Write the token to the token file with owner-only permissions.
fn write_token(path: &PathBuf, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, token).with_context(|| format!("Failed to write token to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

fn default_token_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".bmhctl").join("token")
}

/// Build a reqwest Client with the Authorization header pre-configured.
fn authed_client(token: &str) -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    let bearer = format!("Bearer {}", token);
    headers.insert(
        reqwest::header::AUTHORIZATION,
        reqwest::header::HeaderValue::from_str(&bearer).expect("token contains invalid header characters"),
    );
    reqwest::Client::builder().default_headers(headers).build().expect("failed to build HTTP client")
}

// ── Other helpers ─────────────────────────────────────────────────────────────

fn server_url(remote: Option<String>) -> String {
    remote.unwrap_or_else(|| "http://localhost:8090".into())
}

fn resolve_store_path(store_path: Option<String>) -> PathBuf {
    if let Some(p) = store_path {
        return PathBuf::from(p);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".bmhctl").join("state.redb")
}
