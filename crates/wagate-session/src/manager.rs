//! The session lifecycle manager.
//!
//! Owns the registry of in-flight ephemeral authentication attempts plus
//! the single primary session. Every attempt runs a driver task that
//! feeds client events through the pure transition function and applies
//! the resulting effects: surfacing credentials, handing off to the
//! primary session, or tearing the attempt down. Entries never outlive
//! their terminal transition.

use crate::attempt::{transition, AttemptMethod, AttemptState, Effect};
use crate::primary::PrimarySession;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use wagate_core::config::RuntimeConfig;
use wagate_core::error::GatewayError;
use wagate_core::message::ChatMessage;
use wagate_core::traits::{AuthMethod, ChatClient, ClientEvent, ClientFactory};

/// Bound on the pairing flow reaching a code.
pub const PAIRING_TIMEOUT: Duration = Duration::from_secs(60);
/// Bound on a QR attempt producing its first payload.
pub const FIRST_QR_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential progress surfaced to whoever initiated an attempt.
#[derive(Debug, Clone)]
pub enum AttemptNotice {
    /// A QR payload; later notices supersede earlier ones.
    Qr(String),
    /// The pairing code.
    PairingCode(String),
    /// The attempt reached a failure terminal.
    Failed(String),
}

struct AttemptHandle {
    method: AttemptMethod,
    client: Arc<dyn ChatClient>,
    driver: Option<JoinHandle<()>>,
}

/// Owns all authentication attempts and the primary session.
pub struct SessionManager {
    factory: Arc<dyn ClientFactory>,
    attempts: Mutex<HashMap<String, AttemptHandle>>,
    primary: PrimarySession,
    seq: AtomicU64,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        owner_number: String,
        runtime: Arc<RwLock<RuntimeConfig>>,
        msg_tx: mpsc::Sender<ChatMessage>,
    ) -> Self {
        Self {
            factory,
            attempts: Mutex::new(HashMap::new()),
            primary: PrimarySession::new(owner_number, runtime, msg_tx),
            seq: AtomicU64::new(0),
        }
    }

    pub fn primary(&self) -> &PrimarySession {
        &self.primary
    }

    /// Activate the primary session from already-persisted credentials,
    /// without running an authentication attempt first.
    pub async fn resume_primary(&self) -> Result<(), GatewayError> {
        self.primary.activate(&self.factory, "resumed").await
    }

    /// Start a QR attempt and return the first emitted QR payload.
    pub async fn begin_qr(self: &Arc<Self>) -> Result<String, GatewayError> {
        let (id, mut rx) = self.start_attempt(AttemptMethod::Qr).await?;

        let wait = async {
            while let Some(notice) = rx.recv().await {
                match notice {
                    AttemptNotice::Qr(payload) => return Ok(payload),
                    AttemptNotice::Failed(reason) => return Err(GatewayError::Auth(reason)),
                    AttemptNotice::PairingCode(_) => continue,
                }
            }
            Err(GatewayError::Auth(
                "attempt ended before a QR was produced".into(),
            ))
        };

        match tokio::time::timeout(FIRST_QR_TIMEOUT, wait).await {
            Ok(result) => result,
            Err(_) => {
                self.cancel(&id).await;
                Err(GatewayError::Timeout(format!(
                    "no QR payload within {}s",
                    FIRST_QR_TIMEOUT.as_secs()
                )))
            }
        }
    }

    /// Start a QR attempt and return its id plus the full notice stream,
    /// so the terminal flow can re-render each superseding QR.
    pub async fn begin_qr_stream(
        self: &Arc<Self>,
    ) -> Result<(String, mpsc::Receiver<AttemptNotice>), GatewayError> {
        self.start_attempt(AttemptMethod::Qr).await
    }

    /// Start a pairing attempt for `phone` and return the pairing code,
    /// bounded by [`PAIRING_TIMEOUT`].
    pub async fn begin_pairing(self: &Arc<Self>, phone: &str) -> Result<String, GatewayError> {
        self.begin_pairing_bounded(phone, PAIRING_TIMEOUT).await
    }

    async fn begin_pairing_bounded(
        self: &Arc<Self>,
        phone: &str,
        bound: Duration,
    ) -> Result<String, GatewayError> {
        let (id, mut rx) = self
            .start_attempt_with(
                AttemptMethod::Pairing,
                AuthMethod::Pairing {
                    phone: phone.to_string(),
                },
            )
            .await?;

        let wait = async {
            while let Some(notice) = rx.recv().await {
                match notice {
                    AttemptNotice::PairingCode(code) => return Ok(code),
                    AttemptNotice::Failed(reason) => return Err(GatewayError::Auth(reason)),
                    AttemptNotice::Qr(_) => continue,
                }
            }
            Err(GatewayError::Auth(
                "attempt ended before a pairing code was produced".into(),
            ))
        };

        match tokio::time::timeout(bound, wait).await {
            Ok(result) => result,
            Err(_) => {
                self.cancel(&id).await;
                Err(GatewayError::Timeout(format!(
                    "pairing flow produced no code within {}s",
                    bound.as_secs()
                )))
            }
        }
    }

    async fn start_attempt(
        self: &Arc<Self>,
        method: AttemptMethod,
    ) -> Result<(String, mpsc::Receiver<AttemptNotice>), GatewayError> {
        self.start_attempt_with(method, AuthMethod::Qr).await
    }

    /// Create a client, register the attempt, and spawn its driver.
    async fn start_attempt_with(
        self: &Arc<Self>,
        method: AttemptMethod,
        auth: AuthMethod,
    ) -> Result<(String, mpsc::Receiver<AttemptNotice>), GatewayError> {
        let id = self.next_attempt_id(method);
        let (client, events) = self.factory.create(&id, auth).await?;
        let (notice_tx, notice_rx) = mpsc::channel(8);

        // Register before spawning the driver so a fast terminal
        // transition always finds its own entry to remove.
        self.attempts.lock().await.insert(
            id.clone(),
            AttemptHandle {
                method,
                client: client.clone(),
                driver: None,
            },
        );

        info!("auth attempt {id} started ({})", method.label());

        let driver = tokio::spawn(Self::drive(
            self.clone(),
            id.clone(),
            method,
            client,
            events,
            notice_tx,
        ));
        if let Some(handle) = self.attempts.lock().await.get_mut(&id) {
            handle.driver = Some(driver);
        }

        Ok((id, notice_rx))
    }

    /// Per-attempt event loop: fold client events through the state
    /// machine and apply effects until a terminal state is reached.
    async fn drive(
        manager: Arc<Self>,
        id: String,
        method: AttemptMethod,
        client: Arc<dyn ChatClient>,
        mut events: mpsc::Receiver<ClientEvent>,
        notice_tx: mpsc::Sender<AttemptNotice>,
    ) {
        let mut state = AttemptState::Initializing;

        while let Some(event) = events.recv().await {
            let (next, effects) = transition(&state, &event);
            state = next;

            for effect in effects {
                match effect {
                    Effect::EmitQr(payload) => {
                        let _ = notice_tx.send(AttemptNotice::Qr(payload)).await;
                    }
                    Effect::EmitPairingCode(code) => {
                        let _ = notice_tx.send(AttemptNotice::PairingCode(code)).await;
                    }
                    Effect::HandOff => {
                        info!("auth attempt {id} ready, handing off to primary session");
                        if let Err(e) =
                            manager.primary.activate(&manager.factory, method.label()).await
                        {
                            error!("primary session activation after {id} failed: {e}");
                        }
                        manager.dispose(&id, &client).await;
                    }
                    Effect::Fail(reason) => {
                        warn!("auth attempt {id} failed: {reason}");
                        let _ = notice_tx.send(AttemptNotice::Failed(reason)).await;
                        manager.dispose(&id, &client).await;
                    }
                }
            }

            // A ready attempt is handed off once the effect has run.
            if state == AttemptState::Ready {
                state = AttemptState::HandedOff;
            }

            if state.is_terminal() {
                return;
            }
        }

        // Event stream closed without a terminal transition.
        if !state.is_terminal() {
            let reason = "client event stream closed".to_string();
            warn!("auth attempt {id}: {reason}");
            let _ = notice_tx.send(AttemptNotice::Failed(reason)).await;
            manager.dispose(&id, &client).await;
        }
    }

    /// Remove an attempt and tear its client down. Teardown failures are
    /// logged only; cleanup is best-effort.
    async fn dispose(&self, id: &str, client: &Arc<dyn ChatClient>) {
        self.attempts.lock().await.remove(id);
        if let Err(e) = client.destroy().await {
            warn!("attempt {id} client teardown failed: {e}");
        }
    }

    /// Cancel an attempt from outside its driver (timeout or shutdown).
    pub async fn cancel(&self, id: &str) {
        let handle = self.attempts.lock().await.remove(id);
        if let Some(handle) = handle {
            if let Some(driver) = handle.driver {
                driver.abort();
            }
            if let Err(e) = handle.client.destroy().await {
                warn!("attempt {id} client teardown failed: {e}");
            }
            info!("auth attempt {id} ({}) cancelled", handle.method.label());
        }
    }

    /// Whether the attempt is still registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.attempts.lock().await.contains_key(id)
    }

    /// Number of in-flight attempts, for diagnostics.
    pub async fn active_count(&self) -> usize {
        self.attempts.lock().await.len()
    }

    /// Notify the owner, tear down every attempt, then the primary
    /// session. All teardown failures are logged, never fatal.
    pub async fn shutdown(&self) {
        self.primary.notify_owner("🛑 Bot shutting down").await;

        let drained: Vec<(String, AttemptHandle)> =
            self.attempts.lock().await.drain().collect();
        for (id, handle) in drained {
            info!("aborting auth attempt {id} ({})", handle.method.label());
            if let Some(driver) = handle.driver {
                driver.abort();
            }
            if let Err(e) = handle.client.destroy().await {
                warn!("attempt {id} client teardown failed during shutdown: {e}");
            }
        }

        self.primary.destroy().await;
        info!("session manager shut down");
    }

    fn next_attempt_id(&self, method: AttemptMethod) -> String {
        // Millisecond timestamp plus a sequence number: time-derived but
        // collision-free for attempts started in the same millisecond.
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{seq}",
            method.id_prefix(),
            chrono::Utc::now().timestamp_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;
    use wagate_core::message::MediaPayload;

    struct FakeClient {
        destroyed: AtomicBool,
        sent: StdMutex<Vec<(String, String)>>,
    }

    impl FakeClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                destroyed: AtomicBool::new(false),
                sent: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatClient for FakeClient {
        async fn send_text(&self, chat: &str, text: &str) -> Result<String, GatewayError> {
            self.sent
                .lock()
                .unwrap()
                .push((chat.to_string(), text.to_string()));
            Ok("fake-msg-id".into())
        }

        async fn send_media(
            &self,
            _chat: &str,
            _media: MediaPayload,
            _caption: Option<&str>,
        ) -> Result<String, GatewayError> {
            Ok("fake-msg-id".into())
        }

        async fn react(
            &self,
            _chat: &str,
            _message_id: &str,
            _emoji: &str,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn destroy(&self) -> Result<(), GatewayError> {
            self.destroyed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Records every created client with its event sender so tests can
    /// script the event stream.
    #[derive(Default)]
    struct FakeFactory {
        created: StdMutex<Vec<(String, AuthMethod, mpsc::Sender<ClientEvent>, Arc<FakeClient>)>>,
    }

    impl FakeFactory {
        fn created_count(&self) -> usize {
            self.created.lock().unwrap().len()
        }

        fn sender(&self, idx: usize) -> mpsc::Sender<ClientEvent> {
            self.created.lock().unwrap()[idx].2.clone()
        }

        fn client(&self, idx: usize) -> Arc<FakeClient> {
            self.created.lock().unwrap()[idx].3.clone()
        }

        fn auth(&self, idx: usize) -> AuthMethod {
            self.created.lock().unwrap()[idx].1.clone()
        }

        async fn wait_created(&self, n: usize) {
            wait_until(|| self.created_count() >= n).await;
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

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within 1s");
    }

    async fn wait_for_attempt_count(mgr: &Arc<SessionManager>, n: usize) {
        for _ in 0..200 {
            if mgr.active_count().await == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("attempt count never reached {n}");
    }

    fn manager(factory: Arc<FakeFactory>) -> (Arc<SessionManager>, mpsc::Receiver<ChatMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let runtime = Arc::new(RwLock::new(RuntimeConfig::default()));
        (
            Arc::new(SessionManager::new(
                factory,
                "254700000001".into(),
                runtime,
                tx,
            )),
            rx,
        )
    }

    #[tokio::test]
    async fn test_qr_attempt_returns_first_payload() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.begin_qr().await })
        };

        factory.wait_created(1).await;
        factory.sender(0).send(ClientEvent::Qr("qr-1".into())).await.unwrap();
        factory.sender(0).send(ClientEvent::Qr("qr-2".into())).await.unwrap();

        let payload = task.await.unwrap().unwrap();
        assert_eq!(payload, "qr-1");
        assert_eq!(mgr.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_ready_hands_off_and_removes_attempt() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.begin_qr().await })
        };

        factory.wait_created(1).await;
        factory.sender(0).send(ClientEvent::Qr("qr-1".into())).await.unwrap();
        task.await.unwrap().unwrap();

        factory.sender(0).send(ClientEvent::Ready).await.unwrap();
        wait_for_attempt_count(&mgr, 0).await;

        // The ephemeral client was destroyed and the primary (second
        // created client) resumed from persisted credentials.
        assert!(factory.client(0).destroyed.load(Ordering::SeqCst));
        assert_eq!(factory.created_count(), 2);
        assert_eq!(factory.auth(1), AuthMethod::Resume);

        // Primary flips to connected on its own ready event.
        factory.sender(1).send(ClientEvent::Ready).await.unwrap();
        let mgr3 = mgr.clone();
        wait_until(move || mgr3.primary().is_connected()).await;
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_and_cleans_up() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.begin_qr().await })
        };

        factory.wait_created(1).await;
        factory
            .sender(0)
            .send(ClientEvent::AuthFailure("rejected".into()))
            .await
            .unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)), "got {err}");
        assert_eq!(mgr.active_count().await, 0);
        assert!(factory.client(0).destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_disconnect_before_ready_is_failure() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let (id, mut notices) = mgr.begin_qr_stream().await.unwrap();
        factory.wait_created(1).await;
        factory
            .sender(0)
            .send(ClientEvent::Disconnected("socket closed".into()))
            .await
            .unwrap();

        match notices.recv().await {
            Some(AttemptNotice::Failed(reason)) => {
                assert!(reason.contains("disconnected before ready"))
            }
            other => panic!("expected failure notice, got {other:?}"),
        }
        wait_for_attempt_count(&mgr, 0).await;
        assert!(!mgr.contains(&id).await);
        // No hand-off happened.
        assert_eq!(factory.created_count(), 1);
    }

    #[tokio::test]
    async fn test_pairing_returns_code_then_hands_off() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.begin_pairing("254712345678").await })
        };

        factory.wait_created(1).await;
        assert_eq!(
            factory.auth(0),
            AuthMethod::Pairing {
                phone: "254712345678".into()
            }
        );

        factory
            .sender(0)
            .send(ClientEvent::PairingCode("WXYZ-9876".into()))
            .await
            .unwrap();
        assert_eq!(task.await.unwrap().unwrap(), "WXYZ-9876");

        factory.sender(0).send(ClientEvent::Authenticated).await.unwrap();
        factory.sender(0).send(ClientEvent::Ready).await.unwrap();
        wait_for_attempt_count(&mgr, 0).await;
    }

    #[tokio::test]
    async fn test_pairing_timeout_tears_down_attempt() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let err = mgr
            .begin_pairing_bounded("254712345678", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)), "got {err}");
        assert_eq!(mgr.active_count().await, 0);
        assert!(factory.client(0).destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_concurrent_qr_attempts_are_independent() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let task_a = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.begin_qr().await })
        };
        let task_b = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.begin_qr().await })
        };

        factory.wait_created(2).await;
        // Resolve the second attempt first: neither blocks on the other.
        factory.sender(1).send(ClientEvent::Qr("qr-b".into())).await.unwrap();
        let payload_b = task_b.await.unwrap().unwrap();
        assert_eq!(payload_b, "qr-b");

        factory.sender(0).send(ClientEvent::Qr("qr-a".into())).await.unwrap();
        let payload_a = task_a.await.unwrap().unwrap();
        assert_eq!(payload_a, "qr-a");

        assert_eq!(mgr.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_everything() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let _stream = mgr.begin_qr_stream().await.unwrap();
        factory.wait_created(1).await;
        assert_eq!(mgr.active_count().await, 1);

        mgr.shutdown().await;
        assert_eq!(mgr.active_count().await, 0);
        assert!(factory.client(0).destroyed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_attempt_ids_unique_and_method_prefixed() {
        let factory = Arc::new(FakeFactory::default());
        let (mgr, _rx) = manager(factory.clone());

        let (id_a, _rx_a) = mgr.begin_qr_stream().await.unwrap();
        let (id_b, _rx_b) = mgr.begin_qr_stream().await.unwrap();
        assert_ne!(id_a, id_b);
        assert!(id_a.starts_with("web-qr-"));
    }
}
