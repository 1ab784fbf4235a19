//! Live WhatsApp client via `whatsapp-rust`.
//!
//! Speaks the WhatsApp Web protocol (Noise handshake + Signal
//! encryption). Each client instance persists its session to
//! `{auth_root}/{client_id}/whatsapp.db`, so ephemeral auth attempts
//! and the primary session never share credentials on disk.

mod events;
mod send;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wagate_core::error::GatewayError;
use wagate_core::message::MediaPayload;
use wagate_core::traits::{AuthMethod, ChatClient, ClientEvent, ClientFactory};
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust::pair_code::PairCodeOptions;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use send::{chat_id_to_jid, retry_send, split_message};

/// Creates live WhatsApp clients, one isolated session directory each.
pub struct WhatsAppFactory {
    auth_root: String,
}

impl WhatsAppFactory {
    pub fn new(auth_root: &str) -> Self {
        Self {
            auth_root: auth_root.to_string(),
        }
    }

    fn session_db_path(&self, client_id: &str) -> Result<String, GatewayError> {
        let session_dir = format!("{}/{client_id}", self.auth_root);
        std::fs::create_dir_all(&session_dir)?;
        Ok(format!("{session_dir}/whatsapp.db"))
    }
}

#[async_trait]
impl ClientFactory for WhatsAppFactory {
    async fn create(
        &self,
        client_id: &str,
        method: AuthMethod,
    ) -> Result<(Arc<dyn ChatClient>, mpsc::Receiver<ClientEvent>), GatewayError> {
        let db_path = self.session_db_path(client_id)?;
        info!("whatsapp client {client_id} starting (session: {db_path})");

        let backend = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .map_err(|e| GatewayError::Client(format!("whatsapp store init failed: {e}")))?,
        );

        let (event_tx, event_rx) = mpsc::channel(64);

        let mut builder = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, _client| {
                let tx = event_tx.clone();
                async move {
                    events::forward(event, &tx).await;
                }
            });

        if let AuthMethod::Pairing { phone } = &method {
            info!("whatsapp client {client_id}: pair-code flow enabled");
            builder = builder.with_pair_code(PairCodeOptions {
                phone_number: phone.clone(),
                ..Default::default()
            });
        }

        let mut bot = builder
            .build()
            .await
            .map_err(|e| GatewayError::Client(format!("whatsapp bot build failed: {e}")))?;

        let client = bot.client();

        let run_handle = bot
            .run()
            .await
            .map_err(|e| GatewayError::Client(format!("whatsapp bot run failed: {e}")))?;

        let wrapped = Arc::new(WhatsAppClient {
            client,
            run_handle: Mutex::new(Some(run_handle)),
        });

        Ok((wrapped as Arc<dyn ChatClient>, event_rx))
    }
}

/// A single live WhatsApp session.
pub struct WhatsAppClient {
    client: Arc<Client>,
    run_handle: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl ChatClient for WhatsAppClient {
    async fn send_text(&self, chat: &str, text: &str) -> Result<String, GatewayError> {
        let jid = chat_id_to_jid(chat)?;

        let mut last_id = String::new();
        for chunk in split_message(text, 4096) {
            let msg = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            last_id = retry_send(&self.client, &jid, msg).await?;
        }

        Ok(last_id)
    }

    async fn send_media(
        &self,
        chat: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<String, GatewayError> {
        let jid = chat_id_to_jid(chat)?;
        let is_image = media.mimetype.starts_with("image/");

        let media_type = if is_image {
            whatsapp_rust::download::MediaType::Image
        } else {
            whatsapp_rust::download::MediaType::Document
        };

        let upload = self
            .client
            .upload(media.bytes.clone(), media_type)
            .await
            .map_err(|e| GatewayError::Client(format!("whatsapp media upload failed: {e}")))?;

        let msg = if is_image {
            waproto::whatsapp::Message {
                image_message: Some(Box::new(waproto::whatsapp::message::ImageMessage {
                    mimetype: Some(media.mimetype.clone()),
                    caption: caption.map(str::to_string),
                    url: Some(upload.url),
                    direct_path: Some(upload.direct_path),
                    media_key: Some(upload.media_key),
                    file_enc_sha256: Some(upload.file_enc_sha256),
                    file_sha256: Some(upload.file_sha256),
                    file_length: Some(upload.file_length),
                    ..Default::default()
                })),
                ..Default::default()
            }
        } else {
            waproto::whatsapp::Message {
                document_message: Some(Box::new(waproto::whatsapp::message::DocumentMessage {
                    mimetype: Some(media.mimetype.clone()),
                    file_name: Some(media.filename.clone()),
                    caption: caption.map(str::to_string),
                    url: Some(upload.url),
                    direct_path: Some(upload.direct_path),
                    media_key: Some(upload.media_key),
                    file_enc_sha256: Some(upload.file_enc_sha256),
                    file_sha256: Some(upload.file_sha256),
                    file_length: Some(upload.file_length),
                    ..Default::default()
                })),
                ..Default::default()
            }
        };

        retry_send(&self.client, &jid, msg).await
    }

    async fn react(
        &self,
        chat: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), GatewayError> {
        let jid = chat_id_to_jid(chat)?;

        let msg = waproto::whatsapp::Message {
            reaction_message: Some(Box::new(waproto::whatsapp::message::ReactionMessage {
                key: Some(waproto::whatsapp::MessageKey {
                    remote_jid: Some(jid.to_string()),
                    from_me: Some(false),
                    id: Some(message_id.to_string()),
                    ..Default::default()
                }),
                text: Some(emoji.to_string()),
                sender_timestamp_ms: Some(chrono::Utc::now().timestamp_millis()),
                ..Default::default()
            })),
            ..Default::default()
        };

        self.client
            .send_message(jid, msg)
            .await
            .map_err(|e| GatewayError::Client(format!("whatsapp reaction failed: {e}")))?;

        Ok(())
    }

    async fn destroy(&self) -> Result<(), GatewayError> {
        if let Some(handle) = self.run_handle.lock().await.take() {
            handle.abort();
            info!("whatsapp client stopped");
        } else {
            warn!("whatsapp client already stopped");
        }
        Ok(())
    }
}
