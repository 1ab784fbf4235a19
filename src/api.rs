//! HTTP gateway API: authentication triggers and outbound sends.
//!
//! Every handler produces exactly one JSON response with a `success`
//! boolean; failures carry an `error` string. Validation problems are
//! 400 and never logged as exceptional; everything else is 500.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use wagate_core::config::{direct_chat_id, is_valid_phone};
use wagate_core::error::GatewayError;
use wagate_core::message::MediaPayload;
use wagate_session::qr;

use crate::state::AppState;

/// `POST /api/pair` request body.
#[derive(Debug, Deserialize)]
struct PairRequest {
    #[serde(rename = "phoneNumber")]
    phone_number: String,
}

/// `POST /api/sendmessage` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    number: String,
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    media_url: Option<String>,
    filename: Option<String>,
    caption: Option<String>,
}

fn fail(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"success": false, "error": msg.into()})))
}

fn internal(e: GatewayError) -> (StatusCode, Json<Value>) {
    fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// `GET /` — static landing page.
async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

/// `POST /api/qr` — one QR attempt; responds with the first emitted QR
/// payload as a base64 PNG data URL.
async fn qr_attempt(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let payload = state.sessions.begin_qr().await.map_err(|e| {
        error!("QR attempt failed: {e}");
        internal(e)
    })?;

    let png = qr::qr_png(&payload).map_err(|e| {
        error!("QR render failed: {e}");
        internal(e)
    })?;

    let data_url = format!("data:image/png;base64,{}", BASE64.encode(&png));

    Ok(Json(json!({
        "success": true,
        "qr": data_url,
        "message": "Scan the QR code with WhatsApp (Linked Devices)",
    })))
}

/// `POST /api/pair` — one pairing attempt, bounded at 60s.
async fn pair(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !is_valid_phone(&req.phone_number) {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            "phoneNumber must be 10-15 digits",
        ));
    }

    let code = state
        .sessions
        .begin_pairing(&req.phone_number)
        .await
        .map_err(|e| {
            error!("pairing attempt failed: {e}");
            internal(e)
        })?;

    Ok(Json(json!({
        "success": true,
        "pairingCode": code,
        "message": "Enter the code in WhatsApp > Linked Devices > Link with phone number",
    })))
}

/// `POST /api/sendmessage` — text or media send through the primary
/// session, with a best-effort reaction on media sends.
async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !is_valid_phone(&req.number) {
        return Err(fail(StatusCode::BAD_REQUEST, "number must be 10-15 digits"));
    }

    let chat = direct_chat_id(&req.number);
    let client = state.sessions.primary().client().await.map_err(internal)?;

    let Some(url) = req.media_url.as_deref() else {
        // A media request without a mediaUrl degrades to a text send.
        if req.kind.as_deref() == Some("media") {
            info!("media send to {chat} has no mediaUrl, sending as text");
        }
        let text = req
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| fail(StatusCode::BAD_REQUEST, "message is required for text sends"))?;

        client.send_text(&chat, text).await.map_err(|e| {
            error!("text send to {chat} failed: {e}");
            internal(e)
        })?;
        return Ok(Json(json!({"success": true})));
    };

    let media = fetch_media(url, req.filename.as_deref()).await.map_err(|e| {
        error!("media fetch from {url} failed: {e}");
        internal(e)
    })?;

    let emoji = reaction_emoji(&media.extension());
    let msg_id = client
        .send_media(&chat, media, req.caption.as_deref())
        .await
        .map_err(|e| {
            error!("media send to {chat} failed: {e}");
            internal(e)
        })?;

    // Reaction is decorative; a failure never fails the request.
    if let Err(e) = client.react(&chat, &msg_id, emoji).await {
        warn!("media reaction failed: {e}");
    }

    Ok(Json(json!({"success": true})))
}

/// Download a remote file into a sendable payload.
async fn fetch_media(url: &str, filename: Option<&str>) -> Result<MediaPayload, GatewayError> {
    let resp = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| GatewayError::Client(format!("media fetch failed: {e}")))?;

    let mimetype = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let filename = filename
        .map(str::to_string)
        .or_else(|| {
            url.rsplit('/')
                .next()
                .map(|s| s.split('?').next().unwrap_or(s))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "file".to_string());

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| GatewayError::Client(format!("media body read failed: {e}")))?;

    Ok(MediaPayload {
        bytes: bytes.to_vec(),
        mimetype,
        filename,
    })
}

/// Fixed extension-to-emoji lookup for media reactions.
fn reaction_emoji(ext: &str) -> &'static str {
    match ext {
        ".mp3" => "🎧",
        ".mp4" => "🎬",
        ".jpg" | ".png" => "🖼️",
        ".pdf" | ".doc" | ".docx" => "📄",
        ".xls" | ".xlsx" => "📊",
        ".zip" => "🗄️",
        _ => "📎",
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/qr", post(qr_attempt))
        .route("/api/pair", post(pair))
        .route("/api/sendmessage", post(send_message))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Bind and run the gateway API until the process exits.
pub async fn serve(state: AppState) {
    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("gateway API failed to bind {addr}: {e}");
            return;
        }
    };

    info!("gateway API listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("gateway API error: {e}");
    }
}
