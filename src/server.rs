use std::{
    net::SocketAddr,
    path::{Path as FsPath, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, OriginalUri, Path, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::{get, MethodRouter},
    Router,
};
use tokio::{fs, signal, spawn};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::{
    config::FileServerConfig,
    fs_ops::{self, HashAlgorithm},
    logging,
    protocols::{PatchCommand, PatchRequest},
    scheduler::{LockPath, PathScheduler, SchedulerSession},
};

pub struct AppState {
    pub scheduler: PathScheduler,
    pub config: FileServerConfig,
}

/// Resolve a prefix-stripped URL path into the scheduler's lock key form
/// and the on-disk location. Traversal segments never reach the disk.
fn resolve_path(
    config: &FileServerConfig,
    raw: Option<&str>,
) -> Result<(LockPath, PathBuf), Response> {
    let lock_path = LockPath::parse(raw.unwrap_or("")).map_err(|error| {
        error_response(StatusCode::BAD_REQUEST, format!("Bad Request: {error}"))
    })?;
    if lock_path
        .segments()
        .iter()
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Bad Request: path traversal".to_string(),
        ));
    }
    let mut disk = PathBuf::from(&config.root_dir);
    for segment in lock_path.segments() {
        disk.push(segment);
    }
    Ok((lock_path, disk))
}

fn error_response(status: StatusCode, message: String) -> Response {
    warn!(status = status.as_u16(), %message, "request failed");
    (status, message).into_response()
}

fn internal_error(error: impl std::fmt::Display) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal Server Error: {error}"),
    )
}

fn text_plain(data: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        data,
    )
        .into_response()
}

async fn enqueue_unlock(session: &SchedulerSession, keys: &[&str]) {
    if let Err(error) = session.unlock_many(keys).await {
        warn!(%error, "failed to enqueue unlock");
    }
}

async fn get_entry(
    State(state): State<Arc<AppState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    path: Option<Path<String>>,
) -> Response {
    let raw = path.as_deref().map(String::as_str);
    let (lock_path, disk) = match resolve_path(&state.config, raw) {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    let key = lock_path.to_string();
    let session = state.scheduler.session();
    if let Err(error) = session.lock(&key).await {
        return internal_error(error);
    }
    let response = serve_entry(&method, &uri, &disk).await;
    enqueue_unlock(&session, &[key.as_str()]).await;
    response
}

async fn serve_entry(method: &Method, uri: &Uri, disk: &FsPath) -> Response {
    let meta = match fs::metadata(disk).await {
        Ok(meta) => meta,
        Err(error) => {
            return error_response(StatusCode::NOT_FOUND, format!("File Not Found: {error}"))
        }
    };

    if meta.is_dir() {
        // Directory listings are plain text; canonical directory URLs end
        // in a slash, everything else redirects there first.
        if !uri.path().ends_with('/') {
            return Redirect::to(&format!("{}/", uri.path())).into_response();
        }
        let listing = match fs_ops::children_of_dir_text(disk).await {
            Ok(listing) => listing,
            Err(error) => return internal_error(error),
        };
        return sized_text(method, listing);
    }

    let file = match fs::File::open(disk).await {
        Ok(file) => file,
        Err(error) => {
            return error_response(StatusCode::NOT_FOUND, format!("File Not Found: {error}"))
        }
    };
    let mime = mime_guess::from_path(disk).first_or_octet_stream();
    let body = if *method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(ReaderStream::new(file))
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, meta.len())
        .body(body)
        .unwrap_or_else(|error| internal_error(error))
}

/// Plain-text response advertising its length; HEAD keeps the headers
/// and drops the body.
fn sized_text(method: &Method, data: String) -> Response {
    let body = if *method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(data.clone())
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::CONTENT_LENGTH, data.len())
        .body(body)
        .unwrap_or_else(|error| internal_error(error))
}

async fn put_entry(
    State(state): State<Arc<AppState>>,
    path: Option<Path<String>>,
    body: Bytes,
) -> Response {
    let raw = path.as_deref().map(String::as_str);
    let (lock_path, disk) = match resolve_path(&state.config, raw) {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    let key = lock_path.to_string();
    let session = state.scheduler.session();
    if let Err(error) = session.lock(&key).await {
        return internal_error(error);
    }
    let response = match fs_ops::save_new_file(&disk, &body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => internal_error(error),
    };
    enqueue_unlock(&session, &[key.as_str()]).await;
    response
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    path: Option<Path<String>>,
) -> Response {
    let raw = path.as_deref().map(String::as_str);
    let (lock_path, disk) = match resolve_path(&state.config, raw) {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    let key = lock_path.to_string();
    let session = state.scheduler.session();
    if let Err(error) = session.lock(&key).await {
        return internal_error(error);
    }
    let response = match fs_ops::remove_all(&disk).await {
        Ok(()) if lock_path.is_root() => {
            // The namespace root must always exist; recreate it after a
            // whole-tree delete.
            match fs::create_dir_all(&disk).await {
                Ok(()) => StatusCode::OK.into_response(),
                Err(error) => internal_error(error),
            }
        }
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => internal_error(error),
    };
    enqueue_unlock(&session, &[key.as_str()]).await;
    response
}

async fn post_entry(
    State(state): State<Arc<AppState>>,
    path: Option<Path<String>>,
    mut multipart: Multipart,
) -> Response {
    let raw = path.as_deref().map(String::as_str);
    let (lock_path, disk) = match resolve_path(&state.config, raw) {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    let key = lock_path.to_string();
    let session = state.scheduler.session();
    if let Err(error) = session.lock(&key).await {
        return internal_error(error);
    }
    let response = save_upload(&disk, &mut multipart).await;
    enqueue_unlock(&session, &[key.as_str()]).await;
    response
}

async fn save_upload(dir: &FsPath, multipart: &mut Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Bad Request: {error}"))
            }
        };
        let Some(file_name) = field.file_name().map(ToOwned::to_owned) else {
            continue;
        };
        if file_name.contains('/') || file_name.contains("..") {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Bad Request: invalid upload file name '{file_name}'"),
            );
        }
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(error) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Bad Request: {error}"))
            }
        };
        if let Err(error) = fs::write(dir.join(&file_name), &data).await {
            return internal_error(error);
        }
    }
    StatusCode::OK.into_response()
}

async fn patch_entry(
    State(state): State<Arc<AppState>>,
    path: Option<Path<String>>,
    body: Bytes,
) -> Response {
    let raw = path.as_deref().map(String::as_str);
    let (lock_path, disk) = match resolve_path(&state.config, raw) {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    let patch: PatchRequest = match serde_json::from_slice(&body) {
        Ok(patch) => patch,
        Err(error) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Bad Request: {error}"))
        }
    };

    // The second operand arrives as a full URL path, prefix included.
    let other = match patch.other_path.as_deref().filter(|p| !p.is_empty()) {
        Some(other_url) => match other_url.strip_prefix(&state.config.url_prefix) {
            Some(stripped) => match resolve_path(&state.config, Some(stripped)) {
                Ok(resolved) => Some(resolved),
                Err(response) => return response,
            },
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Bad Request: path did not start with url prefix: {other_url}"),
                )
            }
        },
        None => None,
    };

    let primary_key = lock_path.to_string();
    let other_key = other.as_ref().map(|(path, _)| path.to_string());
    let mut keys: Vec<&str> = vec![primary_key.as_str()];
    if let Some(ref key) = other_key {
        keys.push(key.as_str());
    }

    let session = state.scheduler.session();
    if let Err(error) = session.lock_many(&keys).await {
        return internal_error(error);
    }
    let response = run_patch_command(
        patch.command,
        &disk,
        other.as_ref().map(|(_, other_disk)| other_disk.as_path()),
    )
    .await;
    enqueue_unlock(&session, &keys).await;
    response
}

async fn run_patch_command(
    command: PatchCommand,
    disk: &FsPath,
    other_disk: Option<&FsPath>,
) -> Response {
    if command.needs_other_path() {
        let Some(other) = other_disk else {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Bad Request: command requires otherPath".to_string(),
            );
        };
        return run_two_path_command(command, disk, other).await;
    }

    match command {
        PatchCommand::IsDir => match fs_ops::is_dir(disk).await {
            Ok(true) => text_plain("1".to_string()),
            Ok(false) => text_plain(String::new()),
            Err(error) => internal_error(error),
        },
        PatchCommand::List => match fs_ops::children_of_dir_text(disk).await {
            Ok(listing) => text_plain(listing),
            Err(error) => internal_error(error),
        },
        PatchCommand::MkDir => match fs::create_dir(disk).await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(error) => internal_error(error),
        },
        PatchCommand::Md5 => match fs_ops::file_hash(disk, HashAlgorithm::Md5).await {
            Ok(digest) => text_plain(digest),
            Err(error) => internal_error(error),
        },
        PatchCommand::Sha256 => match fs_ops::file_hash(disk, HashAlgorithm::Sha256).await {
            Ok(digest) => text_plain(digest),
            Err(error) => internal_error(error),
        },
        _ => error_response(
            StatusCode::BAD_REQUEST,
            "Bad Request: Unsupported PATCH command".to_string(),
        ),
    }
}

async fn run_two_path_command(command: PatchCommand, disk: &FsPath, other: &FsPath) -> Response {
    match command {
        PatchCommand::Move => match fs::rename(disk, other).await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(error) => internal_error(error),
        },
        PatchCommand::Copy => {
            match fs_ops::copy_recursive(disk.to_path_buf(), other.to_path_buf()).await {
                Ok(()) => StatusCode::OK.into_response(),
                Err(error) => internal_error(error),
            }
        }
        PatchCommand::Zip => {
            if !other.to_string_lossy().ends_with(".zip") {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Bad Request: second path must end in \".zip\"".to_string(),
                );
            }
            if fs_ops::exists(other).await {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Bad Request: Item exists at path.".to_string(),
                );
            }
            match fs_ops::zip_entity(disk.to_path_buf(), other.to_path_buf()).await {
                Ok(()) => StatusCode::OK.into_response(),
                Err(error) => internal_error(error),
            }
        }
        PatchCommand::Unzip => {
            if !disk.to_string_lossy().ends_with(".zip") {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Bad Request: source path must end in \".zip\"".to_string(),
                );
            }
            if fs_ops::exists(other).await {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Bad Request: entity exists at destination".to_string(),
                );
            }
            match fs_ops::unzip_archive(disk.to_path_buf(), other.to_path_buf()).await {
                Ok(()) => StatusCode::OK.into_response(),
                Err(error) => internal_error(error),
            }
        }
        _ => error_response(
            StatusCode::BAD_REQUEST,
            "Bad Request: Unsupported PATCH command".to_string(),
        ),
    }
}

async fn sink_handler() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

fn file_method_router() -> MethodRouter<Arc<AppState>> {
    get(get_entry)
        .put(put_entry)
        .delete(delete_entry)
        .post(post_entry)
        .patch(patch_entry)
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let file_routes = Router::new()
        .route("/", file_method_router())
        .route("/{*path}", file_method_router());

    let prefix = state.config.url_prefix.trim_end_matches('/').to_string();
    let router = if prefix.is_empty() {
        file_routes
    } else {
        Router::new().nest(&prefix, file_routes)
    };

    router
        .layer(DefaultBodyLimit::max(state.config.max_payload_size))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            state.config.max_payload_size,
        ))
        .layer(create_cors_layer(
            state.config.cors_allowed_origins.clone(),
        ))
        .fallback(sink_handler)
        .with_state(state)
}

pub async fn startup(config: FileServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

    config.validate()?;

    let _log_guard = if !LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        Some(logging::init_logging(
            config.log_level.as_deref().unwrap_or("info"),
            config.log_dir.as_deref(),
        )?)
    } else {
        None
    };

    fs::create_dir_all(&config.root_dir).await?;

    info!(
        "Starting file gateway on {}:{} | root: {} | prefix: {} | max_payload: {}MB",
        config.host,
        config.port,
        config.root_dir,
        config.url_prefix,
        config.max_payload_size / (1024 * 1024)
    );

    let scheduler = PathScheduler::new();
    let state = Arc::new(AppState {
        scheduler,
        config: config.clone(),
    });
    let app = build_app(state);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;
    info!("Listening on {}", bind_addr);

    let handle = axum_server::Handle::new();
    let handle_clone = handle.clone();
    let grace_period = Duration::from_secs(config.shutdown_grace_period_secs);
    spawn(async move {
        shutdown_signal().await;
        handle_clone.graceful_shutdown(Some(grace_period));
    });

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

fn create_cors_layer(allowed_origins: Vec<String>) -> tower_http::cors::CorsLayer {
    use tower_http::cors::Any;

    let cors = if allowed_origins.is_empty() {
        tower_http::cors::CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .into_iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        tower_http::cors::CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::DELETE,
                Method::POST,
                Method::PATCH,
            ])
            .allow_headers([header::CONTENT_TYPE])
    };

    cors.max_age(Duration::from_secs(3600))
}
