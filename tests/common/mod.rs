//! Shared mock adapters for integration tests
//!
//! The mocks implement the platform capability traits with recorded calls
//! and test-drivable state streams, so tests can walk a call through its
//! lifecycle without any network or audio device.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use softphone_core::{
    AudioSink, ClientConfig, ClientError, ClientResult, IdentityConfig, InfoBody, InviteSender,
    MediaSource, MediaStream, MediaTrack, SessionState, SignalingAgent, SignalingAgentFactory,
    SignalingSession, SipUri, RelayCredential,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("softphone_core=debug")
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new(
        IdentityConfig::new("wss://sip.example.com:7443", "sip:alice@example.com")
            .with_credentials("alice", "secret"),
    )
}

/// Let spawned forwarder tasks drain their channels
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub struct TestSource {
    tracks: Mutex<Vec<MediaTrack>>,
    version: watch::Sender<u64>,
}

impl TestSource {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        let (version, _) = watch::channel(0);
        Self { tracks: Mutex::new(tracks), version }
    }

    #[allow(dead_code)]
    pub fn add_track(&self, track: MediaTrack) {
        self.tracks.lock().unwrap().push(track);
        self.version.send_modify(|v| *v += 1);
    }
}

impl MediaSource for TestSource {
    fn receivers(&self) -> Vec<MediaTrack> {
        self.tracks.lock().unwrap().clone()
    }

    fn track_events(&self) -> Option<watch::Receiver<u64>> {
        Some(self.version.subscribe())
    }
}

#[derive(Default)]
pub struct TestSink {
    pub events: Mutex<Vec<String>>,
}

impl TestSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl AudioSink for TestSink {
    fn attach(&self, stream: &MediaStream) {
        self.events.lock().unwrap().push(format!("attach:{}", stream.tracks.len()));
    }
    fn play(&self) {
        self.events.lock().unwrap().push("play".into());
    }
    fn pause(&self) {
        self.events.lock().unwrap().push("pause".into());
    }
    fn detach(&self) {
        self.events.lock().unwrap().push("detach".into());
    }
    fn set_gain(&self, level: f32) {
        self.events.lock().unwrap().push(format!("gain:{}", level));
    }
}

pub struct MockSession {
    remote: String,
    state_tx: watch::Sender<SessionState>,
    calls: Mutex<Vec<String>>,
    source: Arc<TestSource>,
    shared_log: Option<Arc<Mutex<Vec<String>>>>,
    /// Simulated transport latency on reject/bye
    signal_delay: Duration,
}

impl MockSession {
    pub fn new(remote: impl Into<String>) -> Arc<Self> {
        Self::build(remote, None, Duration::ZERO)
    }

    /// A session that also records into `log` shared with other mocks, with
    /// its termination signals slowed down to expose ordering bugs
    pub fn with_shared_log(
        remote: impl Into<String>,
        log: Arc<Mutex<Vec<String>>>,
        signal_delay: Duration,
    ) -> Arc<Self> {
        Self::build(remote, Some(log), signal_delay)
    }

    fn build(
        remote: impl Into<String>,
        shared_log: Option<Arc<Mutex<Vec<String>>>>,
        signal_delay: Duration,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SessionState::Initial);
        Arc::new(Self {
            remote: remote.into(),
            state_tx,
            calls: Mutex::new(Vec::new()),
            source: Arc::new(TestSource::new(vec![MediaTrack {
                id: "audio-0".into(),
                active: true,
            }])),
            shared_log,
            signal_delay,
        })
    }

    /// Drive the session into a new lifecycle state, as the remote signaling
    /// stack would
    pub fn drive(&self, state: SessionState) {
        let _ = self.state_tx.send(state);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn source(&self) -> Arc<TestSource> {
        self.source.clone()
    }

    fn record(&self, call: impl Into<String>) {
        let call = call.into();
        if let Some(log) = &self.shared_log {
            log.lock().unwrap().push(call.clone());
        }
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SignalingSession for MockSession {
    fn remote_identity(&self) -> String {
        self.remote.clone()
    }

    fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn media_source(&self) -> Option<Arc<dyn MediaSource>> {
        Some(self.source.clone() as Arc<dyn MediaSource>)
    }

    async fn accept(&self) -> ClientResult<()> {
        self.record("accept");
        Ok(())
    }

    async fn reject(&self) -> ClientResult<()> {
        tokio::time::sleep(self.signal_delay).await;
        self.record("reject");
        Ok(())
    }

    async fn bye(&self) -> ClientResult<()> {
        tokio::time::sleep(self.signal_delay).await;
        self.record("bye");
        Ok(())
    }

    async fn send_info(&self, body: InfoBody) -> ClientResult<()> {
        self.record(format!("info:{}:{}:{}", body.content_type, body.content_disposition, body.content));
        Ok(())
    }
}

pub struct MockAgent {
    pub register_ok: bool,
    pub invites: Mutex<Vec<String>>,
    pub sessions: Mutex<Vec<Arc<MockSession>>>,
    pub shutdowns: AtomicUsize,
    pub relay_credentials: Mutex<Vec<RelayCredential>>,
    shared_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockAgent {
    pub fn new(register_ok: bool) -> Arc<Self> {
        Self::build(register_ok, None)
    }

    /// An agent that records its shutdown into `log` shared with sessions
    pub fn with_shared_log(register_ok: bool, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Self::build(register_ok, Some(log))
    }

    fn build(register_ok: bool, shared_log: Option<Arc<Mutex<Vec<String>>>>) -> Arc<Self> {
        Arc::new(Self {
            register_ok,
            invites: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
            relay_credentials: Mutex::new(Vec::new()),
            shared_log,
        })
    }

    /// The session created for the most recent invite
    pub fn last_session(&self) -> Arc<MockSession> {
        self.sessions.lock().unwrap().last().cloned().expect("no outgoing session")
    }

    pub fn invite_targets(&self) -> Vec<String> {
        self.invites.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalingAgent for MockAgent {
    async fn register(&self) -> ClientResult<()> {
        if self.register_ok {
            Ok(())
        } else {
            Err(ClientError::transport_failed("407 Proxy Authentication Required"))
        }
    }

    async fn invite(
        &self,
        target: &SipUri,
        relay: Option<RelayCredential>,
    ) -> ClientResult<Arc<dyn SignalingSession>> {
        self.invites.lock().unwrap().push(target.to_string());
        if let Some(credential) = relay {
            self.relay_credentials.lock().unwrap().push(credential);
        }
        let session = MockSession::new(target.to_string());
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session as Arc<dyn SignalingSession>)
    }

    async fn shutdown(&self) {
        if let Some(log) = &self.shared_log {
            log.lock().unwrap().push("agent-shutdown".into());
        }
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockFactory {
    pub agent: Arc<MockAgent>,
    pub invite_tx: Mutex<Option<InviteSender>>,
}

impl MockFactory {
    pub fn new(agent: Arc<MockAgent>) -> Arc<Self> {
        Arc::new(Self { agent, invite_tx: Mutex::new(None) })
    }

    /// Deliver an inbound invite, as the signaling stack would
    pub fn push_invite(&self, session: Arc<MockSession>) {
        let tx = self.invite_tx.lock().unwrap().clone().expect("factory not started");
        tx.send(session as Arc<dyn SignalingSession>).expect("invite channel closed");
    }
}

#[async_trait]
impl SignalingAgentFactory for MockFactory {
    async fn create(
        &self,
        _config: &ClientConfig,
        invites: InviteSender,
    ) -> ClientResult<Arc<dyn SignalingAgent>> {
        *self.invite_tx.lock().unwrap() = Some(invites);
        Ok(self.agent.clone() as Arc<dyn SignalingAgent>)
    }
}
