//! Test doubles for the chat-client boundary.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wagate_core::config::{Config, RuntimeConfig};
use wagate_core::error::GatewayError;
use wagate_core::message::MediaPayload;
use wagate_core::registry::CommandRegistry;
use wagate_core::traits::{AuthMethod, ChatClient, ClientEvent, ClientFactory};
use wagate_session::SessionManager;

use crate::state::AppState;

/// Records every outbound call; optionally fails sends.
pub struct FakeClient {
    pub sent: Mutex<Vec<(String, String)>>,
    pub media_sent: Mutex<Vec<(String, MediaPayload, Option<String>)>>,
    pub reactions: Mutex<Vec<(String, String, String)>>,
    pub destroyed: AtomicBool,
    pub fail_sends: AtomicBool,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            media_sent: Mutex::new(Vec::new()),
            reactions: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
        })
    }

    pub fn sent_to(&self, chat: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == chat)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl ChatClient for FakeClient {
    async fn send_text(&self, chat: &str, text: &str) -> Result<String, GatewayError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(GatewayError::Client("send failed".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat.to_string(), text.to_string()));
        Ok("fake-msg-id".into())
    }

    async fn send_media(
        &self,
        chat: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<String, GatewayError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(GatewayError::Client("send failed".into()));
        }
        self.media_sent.lock().unwrap().push((
            chat.to_string(),
            media,
            caption.map(str::to_string),
        ));
        Ok("fake-msg-id".into())
    }

    async fn react(
        &self,
        chat: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), GatewayError> {
        self.reactions.lock().unwrap().push((
            chat.to_string(),
            message_id.to_string(),
            emoji.to_string(),
        ));
        Ok(())
    }

    async fn destroy(&self) -> Result<(), GatewayError> {
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out fake clients and keeps the event senders so tests can
/// script each client's lifecycle.
#[derive(Default)]
pub struct FakeFactory {
    pub created: Mutex<Vec<(String, AuthMethod, mpsc::Sender<ClientEvent>, Arc<FakeClient>)>>,
}

impl FakeFactory {
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn sender(&self, idx: usize) -> mpsc::Sender<ClientEvent> {
        self.created.lock().unwrap()[idx].2.clone()
    }

    pub fn client(&self, idx: usize) -> Arc<FakeClient> {
        self.created.lock().unwrap()[idx].3.clone()
    }

    pub async fn wait_created(&self, n: usize) {
        for _ in 0..200 {
            if self.created_count() >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("factory never created {n} clients");
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn create(
        &self,
        client_id: &str,
        method: AuthMethod,
    ) -> Result<(Arc<dyn ChatClient>, mpsc::Receiver<ClientEvent>), GatewayError> {
        let (tx, rx) = mpsc::channel(16);
        let client = FakeClient::new();
        self.created.lock().unwrap().push((
            client_id.to_string(),
            method,
            tx,
            client.clone(),
        ));
        Ok((client as Arc<dyn ChatClient>, rx))
    }
}

/// App state over a fake factory, with the owner set to `254700000001`.
pub fn test_state(factory: Arc<FakeFactory>, registry: CommandRegistry) -> AppState {
    let config = Config {
        port: 8000,
        bot_number: "254700000000".into(),
        owner_number: "254700000001".into(),
        auth_path: "./auth".into(),
        headless: true,
        auth_type: None,
    };
    let runtime = Arc::new(tokio::sync::RwLock::new(RuntimeConfig::default()));
    let (msg_tx, _msg_rx) = mpsc::channel(64);
    let sessions = Arc::new(SessionManager::new(
        factory,
        config.owner_number.clone(),
        runtime.clone(),
        msg_tx,
    ));
    AppState {
        config: Arc::new(config),
        runtime,
        registry: Arc::new(registry),
        sessions,
    }
}

/// Activate the primary session against the fake factory and return its
/// client. The factory must be the one inside `state`.
pub async fn connect_primary(state: &AppState, factory: &FakeFactory) -> Arc<FakeClient> {
    state
        .sessions
        .resume_primary()
        .await
        .expect("primary activation");
    factory.wait_created(1).await;
    let idx = factory.created_count() - 1;
    factory
        .sender(idx)
        .send(ClientEvent::Ready)
        .await
        .expect("primary ready event");
    for _ in 0..200 {
        if state.sessions.primary().is_connected() {
            return factory.client(idx);
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("primary never connected");
}
