//! The single long-lived authenticated session the bot operates through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wagate_core::config::{direct_chat_id, RuntimeConfig};
use wagate_core::error::GatewayError;
use wagate_core::message::ChatMessage;
use wagate_core::traits::{AuthMethod, ChatClient, ClientEvent, ClientFactory};

/// Client id under which the primary session's credentials are persisted.
pub const PRIMARY_CLIENT_ID: &str = "primary";

/// Whether a previous run left primary-session credentials under
/// `auth_path`. The live client persists them at
/// `{auth_path}/primary/whatsapp.db`; when the file exists the primary
/// session can be resumed at startup without a fresh linking flow.
pub fn has_persisted_credentials(auth_path: &str) -> bool {
    std::path::Path::new(auth_path)
        .join(PRIMARY_CLIENT_ID)
        .join("whatsapp.db")
        .is_file()
}

/// The primary session. Created once, re-initialized on every hand-off,
/// torn down at process shutdown.
pub struct PrimarySession {
    owner_number: String,
    runtime: Arc<RwLock<RuntimeConfig>>,
    /// Inbound messages are forwarded here for the dispatcher.
    msg_tx: mpsc::Sender<ChatMessage>,
    client: Mutex<Option<Arc<dyn ChatClient>>>,
    connected: Arc<AtomicBool>,
    forward_task: Mutex<Option<JoinHandle<()>>>,
}

impl PrimarySession {
    pub fn new(
        owner_number: String,
        runtime: Arc<RwLock<RuntimeConfig>>,
        msg_tx: mpsc::Sender<ChatMessage>,
    ) -> Self {
        Self {
            owner_number,
            runtime,
            msg_tx,
            client: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            forward_task: Mutex::new(None),
        }
    }

    /// (Re)initialize the primary session from persisted credentials.
    ///
    /// Any previous client is torn down first. `auth_label` names the
    /// flow that produced the credentials, for the owner notification.
    pub async fn activate(
        &self,
        factory: &Arc<dyn ClientFactory>,
        auth_label: &str,
    ) -> Result<(), GatewayError> {
        self.teardown_current().await;

        let (client, mut rx) = factory.create(PRIMARY_CLIENT_ID, AuthMethod::Resume).await?;
        *self.client.lock().await = Some(client.clone());

        let connected = self.connected.clone();
        let msg_tx = self.msg_tx.clone();
        let owner = self.owner_number.clone();
        let runtime = self.runtime.clone();
        let label = auth_label.to_string();

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ClientEvent::Ready => {
                        connected.store(true, Ordering::SeqCst);
                        info!("primary session ready");
                        if !owner.is_empty() {
                            let (prefix, mode) = {
                                let rt = runtime.read().await;
                                (rt.prefix.clone(), rt.mode)
                            };
                            let text = format!(
                                "🤖 Bot is online!\nPrefix: {prefix}\nMode: {mode}\nAuth Method: {label}"
                            );
                            if let Err(e) =
                                client.send_text(&direct_chat_id(&owner), &text).await
                            {
                                warn!("owner online notification failed: {e}");
                            }
                        }
                    }
                    ClientEvent::Disconnected(reason) => {
                        connected.store(false, Ordering::SeqCst);
                        warn!("primary session disconnected: {reason}");
                    }
                    ClientEvent::AuthFailure(reason) => {
                        connected.store(false, Ordering::SeqCst);
                        warn!("primary session auth failure: {reason}");
                    }
                    ClientEvent::Message(msg) => {
                        if msg_tx.send(msg).await.is_err() {
                            info!("dispatcher receiver dropped, stopping forwarder");
                            break;
                        }
                    }
                    _ => {}
                }
            }
        });

        if let Some(old) = self.forward_task.lock().await.replace(task) {
            old.abort();
        }

        Ok(())
    }

    /// Whether the session has reached ready and not since disconnected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The active client, for outbound sends.
    pub async fn client(&self) -> Result<Arc<dyn ChatClient>, GatewayError> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| GatewayError::Client("primary session not initialized".into()))
    }

    /// Best-effort direct message to the owner.
    pub async fn notify_owner(&self, text: &str) {
        if self.owner_number.is_empty() {
            return;
        }
        match self.client().await {
            Ok(client) => {
                if let Err(e) = client
                    .send_text(&direct_chat_id(&self.owner_number), text)
                    .await
                {
                    warn!("owner notification failed: {e}");
                }
            }
            Err(_) => warn!("owner notification skipped: no primary client"),
        }
    }

    /// Tear down the session. Teardown failures are logged, never fatal.
    pub async fn destroy(&self) {
        self.teardown_current().await;
    }

    async fn teardown_current(&self) {
        if let Some(task) = self.forward_task.lock().await.take() {
            task.abort();
        }
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.destroy().await {
                warn!("primary session teardown failed: {e}");
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}
