//! Signaling Façade (§4.10, component C10): the public surface of this
//! crate, composing every other component into the four long-lived workers
//! described in `spec.md` §5.
//!
//! The "one `Arc<Shared>` owned by a background task, handle methods that
//! lock briefly and return" shape follows
//! `examples/instrumentisto-medea/crates/medea-coturn-telnet-client::client::CoturnTelnetConnection`'s
//! single-owner-plus-async-methods idiom, generalized from one `TcpStream`
//! to this crate's REST + WSS + state-machine trio. Where the teacher's
//! `jason` client keeps everything on one `Rc<RefCell<_>>` behind a
//! single-threaded executor, this crate is natively multi-threaded, so
//! shared state is owned by `Arc` and guarded by `tokio::sync::Mutex`
//! instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::cache::{EndpointCacheStore, NullEndpointCacheStore};
use crate::channel_info::{ChannelInfo, ChannelRole, RawChannelInfo};
use crate::clock_skew::{ClockSkewMap, Ticks100Ns};
use crate::collaborators::{ClockSource, CredentialsProvider, SystemClock};
use crate::config::ClientConfig;
use crate::error::{Result, SignalingError};
use crate::ice::IceConfigSet;
use crate::message::{self, SignalingMessage};
use crate::metrics::{CallClass, MetricsSnapshot, SignalingMetrics};
use crate::rest_client::{HttpTransport, ReqwestTransport, RestClient};
use crate::session_router::{RouteOutcome, SessionRouter};
use crate::state_machine::{self, State, StepBackoff, StepResult, TransitionPolicy};
use crate::wss_client::{self, WssClient, WssEvent};

/// Callbacks invoked by the message-router worker (`spec.md` §5 task 3) as
/// it dispatches reassembled inbound messages.
pub struct SignalingCallbacks {
    pub on_offer: Arc<dyn Fn(String, Vec<u8>, Vec<Vec<u8>>) + Send + Sync>,
    pub on_answer: Arc<dyn Fn(String, Vec<u8>) + Send + Sync>,
    pub on_candidate: Arc<dyn Fn(String, Vec<u8>) + Send + Sync>,
    pub on_disconnected: Arc<dyn Fn() + Send + Sync>,
    pub on_error: Arc<dyn Fn(SignalingError) + Send + Sync>,
}

struct Shared<T: HttpTransport> {
    config: ClientConfig,
    channel_info: ChannelInfo,
    client_id: String,
    credentials: Arc<dyn CredentialsProvider>,
    clock: Arc<dyn ClockSource>,
    cache: Arc<dyn EndpointCacheStore>,
    callbacks: SignalingCallbacks,
    rest: RestClient<T>,
    metrics: SignalingMetrics,

    state_tx: watch::Sender<State>,
    clock_skew: Mutex<ClockSkewMap>,
    ice_configs: Mutex<IceConfigSet>,
    router: Mutex<SessionRouter>,
    channel_arn: Mutex<Option<String>>,
    update_version: Mutex<Option<String>>,
    endpoints: Mutex<(Option<String>, Option<String>)>,
    wss: Mutex<Option<WssClient>>,

    /// Signals the message-router worker pushes into the state-machine
    /// worker while `CONNECTED`: an in-band `GO_AWAY`/`RECONNECT_ICE_SERVER`
    /// message, or a WSS-level `GO_AWAY` close (`spec.md` §4.6, §4.8).
    connected_signal_tx: mpsc::UnboundedSender<StepResult>,
    connected_signal_rx: Mutex<mpsc::UnboundedReceiver<StepResult>>,
    /// Absolute deadline (`ttl - ice_refresh_grace`) for the next proactive
    /// `GetIceConfig` refresh while `CONNECTED`, set whenever a fresh ICE
    /// config set is retrieved (`spec.md` §4.9).
    ice_refresh_deadline: Mutex<Option<Ticks100Ns>>,

    delete_requested: AtomicBool,
    shutdown_requested: AtomicBool,
    /// Set once the first `CONNECTED` is reached; a later `step_connect`
    /// call increments the `reconnects` counter instead of being treated as
    /// the initial connection.
    has_connected_once: AtomicBool,
    /// Set by [`step_describe`] on a cache hit, consumed by
    /// [`step_get_endpoint`] to skip the redundant `GetEndpoint` call
    /// (`SPEC_FULL.md` §4.13).
    cache_hit: AtomicBool,
}

/// Handle returned by [`SignalingClient::create`]; the public API named in
/// `spec.md` §4.10.
pub struct SignalingClient<T: HttpTransport = ReqwestTransport> {
    shared: Arc<Shared<T>>,
    state_rx: watch::Receiver<State>,
    worker: Option<JoinHandle<()>>,
    gc_worker: Option<JoinHandle<()>>,
}

impl SignalingClient<ReqwestTransport> {
    pub async fn create(
        raw: RawChannelInfo,
        client_id: String,
        credentials: Arc<dyn CredentialsProvider>,
        config: ClientConfig,
        callbacks: SignalingCallbacks,
    ) -> Result<Self> {
        Self::create_with_transport(
            raw,
            client_id,
            credentials,
            Arc::new(SystemClock),
            Arc::new(NullEndpointCacheStore),
            config,
            callbacks,
            ReqwestTransport::default(),
        )
        .await
    }
}

impl<T: HttpTransport + 'static> SignalingClient<T> {
    /// Full constructor accepting injectable collaborators, used by tests
    /// and by callers that need a non-default clock, cache, or transport.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_with_transport(
        raw: RawChannelInfo,
        client_id: String,
        credentials: Arc<dyn CredentialsProvider>,
        clock: Arc<dyn ClockSource>,
        cache: Arc<dyn EndpointCacheStore>,
        config: ClientConfig,
        callbacks: SignalingCallbacks,
        transport: T,
    ) -> Result<Self> {
        let channel_info = ChannelInfo::validate(raw)?;
        let max_sessions = config.max_concurrent_sessions;
        let role = channel_info.role;
        let (state_tx, state_rx) = watch::channel(State::New);
        let (connected_signal_tx, connected_signal_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            rest: RestClient::new(transport, config.clone()),
            metrics: SignalingMetrics::new(config.latency_ema_alpha),
            config,
            channel_info,
            client_id,
            credentials,
            clock,
            cache,
            callbacks,
            state_tx,
            clock_skew: Mutex::new(ClockSkewMap::new()),
            ice_configs: Mutex::new(IceConfigSet::new()),
            router: Mutex::new(SessionRouter::new(role, max_sessions)),
            channel_arn: Mutex::new(None),
            update_version: Mutex::new(None),
            endpoints: Mutex::new((None, None)),
            wss: Mutex::new(None),
            connected_signal_tx,
            connected_signal_rx: Mutex::new(connected_signal_rx),
            ice_refresh_deadline: Mutex::new(None),
            delete_requested: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            has_connected_once: AtomicBool::new(false),
            cache_hit: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = tokio::spawn(async move {
            run_state_machine(worker_shared).await;
        });

        let gc_shared = Arc::clone(&shared);
        let gc_worker = tokio::spawn(async move {
            run_session_gc(gc_shared).await;
        });

        Ok(Self {
            shared,
            state_rx,
            worker: Some(worker),
            gc_worker: Some(gc_worker),
        })
    }

    /// Blocks until `CONNECTED` or a terminal failure, bounded by
    /// `config.connect_timeout` (`spec.md` §4.10).
    pub async fn connect(&mut self) -> Result<()> {
        let timeout = self.shared.config.connect_timeout;
        tokio::time::timeout(timeout, async {
            loop {
                if *self.state_rx.borrow() == State::Connected {
                    return Ok(());
                }
                if self.state_rx.borrow().is_terminal() {
                    return Err(SignalingError::OperationTimedOut);
                }
                if self.state_rx.changed().await.is_err() {
                    return Err(SignalingError::InternalError("state worker exited".into()));
                }
            }
        })
        .await
        .map_err(|_| SignalingError::OperationTimedOut)?
    }

    /// Graceful disconnect: closes the WSS socket; the worker re-enters
    /// `DISCONNECTED` and, per `channel_info.reconnect`, either loops back
    /// to `GET_TOKEN` or stops.
    pub async fn disconnect(&self) -> Result<()> {
        let guard = self.shared.wss.lock().await;
        if let Some(wss) = guard.as_ref() {
            wss.close();
        }
        Ok(())
    }

    /// Sends `msg` over the current WSS connection. Rejects with
    /// [`SignalingError::NotConnected`] if not connected (`spec.md` §4.10).
    pub async fn send_message(&self, msg: SignalingMessage) -> Result<usize> {
        let guard = self.shared.wss.lock().await;
        let wss = guard.as_ref().ok_or(SignalingError::NotConnected)?;
        let body = serde_json::to_vec(&msg.to_wire_json())
            .map_err(|e| SignalingError::InvalidApiReturn(e.to_string()))?;
        let sent = wss.send(body)?;
        self.shared.metrics.record_message_sent();
        Ok(sent)
    }

    pub async fn get_ice_config_count(&self) -> usize {
        self.shared.ice_configs.lock().await.len()
    }

    pub async fn get_ice_config_info(&self, index: usize) -> Option<crate::ice::IceConfigInfo> {
        self.shared.ice_configs.lock().await.get(index).cloned()
    }

    #[must_use]
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Runs the `DELETE` state path then stops the worker (`spec.md`
    /// §4.10).
    pub async fn delete(mut self) -> Result<()> {
        self.shared.delete_requested.store(true, Ordering::SeqCst);
        if let Some(wss) = self.shared.wss.lock().await.as_ref() {
            wss.close();
        }
        let timeout = self.shared.config.shutdown_timeout;
        let deleted = tokio::time::timeout(timeout, async {
            loop {
                if self.state_rx.borrow().is_terminal() {
                    return Ok(());
                }
                if self.state_rx.changed().await.is_err() {
                    return Err(SignalingError::InternalError("state worker exited".into()));
                }
            }
        })
        .await;
        self.shared.shutdown_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            handle.abort();
        }
        if let Some(handle) = self.gc_worker.take() {
            handle.abort();
        }
        deleted.map_err(|_| SignalingError::OperationTimedOut)?
    }
}

/// Converts a `(end - start)` tick span into milliseconds for the latency
/// EMA (`spec.md` §4.10); negative spans (a corrected clock skew moving
/// `now` backwards mid-call) are floored to zero.
fn elapsed_millis(end: Ticks100Ns, start: Ticks100Ns) -> f64 {
    (end - start).max(0) as f64 / 10_000.0
}

fn policy<T: HttpTransport>(shared: &Shared<T>, current: State) -> TransitionPolicy {
    TransitionPolicy {
        continue_on_ready: true,
        reconnect: shared.channel_info.reconnect,
        delete_requested: current == State::Describe && shared.delete_requested.load(Ordering::SeqCst),
    }
}

async fn run_state_machine<T: HttpTransport + 'static>(shared: Arc<Shared<T>>) {
    let mut state = State::New;
    let mut backoff = StepBackoff::new(
        shared.config.step_retry_base_delay,
        shared.config.step_retry_max_delay,
        shared.config.rest_retry_max_attempts,
    );

    loop {
        if shared.shutdown_requested.load(Ordering::SeqCst) {
            return;
        }
        let result = execute_step(&shared, state).await;
        if state_machine::is_retryable(result) {
            if let Ok(delay) = backoff.next_delay() {
                tokio::time::sleep(delay).await;
                continue;
            }
            (shared.callbacks.on_error)(SignalingError::OperationTimedOut);
            shared.metrics.record_runtime_error();
            return;
        }
        backoff.reset();

        let next = state_machine::next_state(state, result, policy(&shared, state));
        match next {
            Some(next_state) if next_state != state => {
                state = next_state;
                let _ = shared.state_tx.send(state);
                if state.is_terminal() {
                    return;
                }
            }
            Some(_) => {
                // Idle transition (e.g. READY awaiting a user connect call);
                // re-poll after a short pause rather than busy-looping.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            None => return,
        }
    }
}

async fn execute_step<T: HttpTransport + 'static>(shared: &Arc<Shared<T>>, state: State) -> StepResult {
    let now = shared.clock.now();
    match state {
        State::New => StepResult::Ok,
        State::GetToken => match shared.credentials.fetch(now).await {
            Ok(_) => StepResult::Ok,
            Err(SignalingError::NoCredentials) => StepResult::TransientFailure,
            Err(_) => StepResult::NotAuthorized,
        },
        State::Describe => step_describe(shared, now).await,
        State::Create => step_create(shared, now).await,
        State::GetEndpoint => step_get_endpoint(shared, now).await,
        State::GetIceConfig => step_get_ice_config(shared, now).await,
        State::Ready => StepResult::Ok,
        State::Connect => step_connect(shared, now).await,
        State::Connected => step_wait_connected(shared).await,
        State::Disconnected => StepResult::Ok,
        State::Delete => step_delete(shared, now).await,
        State::Deleted => StepResult::Ok,
    }
}

async fn credentials_or_fail<T: HttpTransport>(
    shared: &Shared<T>,
    now: Ticks100Ns,
) -> std::result::Result<crate::collaborators::AwsCredentials, StepResult> {
    shared.credentials.fetch(now).await.map_err(|_| StepResult::NotAuthorized)
}

async fn step_describe<T: HttpTransport>(shared: &Arc<Shared<T>>, now: Ticks100Ns) -> StepResult {
    let creds = match credentials_or_fail(shared, now).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    if shared.channel_info.cache_policy {
        if let Some(name) = &shared.channel_info.channel_name {
            if let Ok(Some(cached)) = shared.cache.load(name).await {
                *shared.channel_arn.lock().await = Some(cached.channel_arn);
                *shared.endpoints.lock().await = (Some(cached.https_endpoint), Some(cached.wss_endpoint));
                shared.cache_hit.store(true, Ordering::SeqCst);
                return StepResult::Ok;
            }
        }
    }
    let mut skew = shared.clock_skew.lock().await;
    let start = shared.clock.now();
    let outcome = shared.rest.describe_channel(&shared.channel_info, &creds, &mut skew, now).await;
    shared
        .metrics
        .record_latency(CallClass::DescribeChannel, elapsed_millis(shared.clock.now(), start));
    match outcome {
        Ok(desc) => {
            *shared.channel_arn.lock().await = Some(desc.channel_arn);
            *shared.update_version.lock().await = Some(desc.update_version);
            StepResult::Ok
        }
        Err(SignalingError::NotFound) => StepResult::ChannelNotFound,
        Err(SignalingError::ChannelBeingDeleted) => StepResult::ChannelBeingDeleted,
        Err(_) => {
            shared.metrics.record_error();
            StepResult::TransientFailure
        }
    }
}

async fn step_create<T: HttpTransport>(shared: &Arc<Shared<T>>, now: Ticks100Ns) -> StepResult {
    let creds = match credentials_or_fail(shared, now).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let mut skew = shared.clock_skew.lock().await;
    let start = shared.clock.now();
    let outcome = shared.rest.create_channel(&shared.channel_info, &creds, &mut skew, now).await;
    shared
        .metrics
        .record_latency(CallClass::CreateChannel, elapsed_millis(shared.clock.now(), start));
    match outcome {
        Ok(arn) => {
            *shared.channel_arn.lock().await = Some(arn);
            StepResult::Ok
        }
        Err(_) => {
            shared.metrics.record_error();
            StepResult::TransientFailure
        }
    }
}

async fn step_get_endpoint<T: HttpTransport>(shared: &Arc<Shared<T>>, now: Ticks100Ns) -> StepResult {
    if shared.cache_hit.swap(false, Ordering::SeqCst) {
        return StepResult::Ok;
    }
    let creds = match credentials_or_fail(shared, now).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let arn = match shared.channel_arn.lock().await.clone() {
        Some(a) => a,
        None => return StepResult::TransientFailure,
    };
    let start = shared.clock.now();
    let outcome = {
        let mut skew = shared.clock_skew.lock().await;
        shared.rest.get_endpoint(&shared.channel_info, &arn, &creds, &mut skew, now).await
    };
    shared
        .metrics
        .record_latency(CallClass::GetEndpoint, elapsed_millis(shared.clock.now(), start));
    match outcome {
        Ok(endpoints) => {
            *shared.endpoints.lock().await = (endpoints.https.clone(), endpoints.wss.clone());
            if shared.channel_info.cache_policy {
                if let (Some(https), Some(wss)) = (endpoints.https, endpoints.wss) {
                    let entry = crate::cache::CachedEndpointState {
                        role: shared.channel_info.role,
                        created_at: now,
                        channel_name: shared.channel_info.channel_name.clone().unwrap_or_default(),
                        channel_arn: arn,
                        region: shared.channel_info.region.clone(),
                        https_endpoint: https,
                        wss_endpoint: wss,
                    };
                    let _ = shared.cache.save(entry).await;
                }
            }
            StepResult::Ok
        }
        Err(_) => {
            shared.metrics.record_error();
            StepResult::TransientFailure
        }
    }
}

async fn step_get_ice_config<T: HttpTransport>(shared: &Arc<Shared<T>>, now: Ticks100Ns) -> StepResult {
    let creds = match credentials_or_fail(shared, now).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let arn = match shared.channel_arn.lock().await.clone() {
        Some(a) => a,
        None => return StepResult::TransientFailure,
    };
    let mut skew = shared.clock_skew.lock().await;
    let start = shared.clock.now();
    let outcome = shared
        .rest
        .get_ice_config(&shared.channel_info, &arn, &shared.client_id, &creds, &mut skew, now)
        .await;
    shared
        .metrics
        .record_latency(CallClass::GetIceConfig, elapsed_millis(shared.clock.now(), start));
    match outcome {
        Ok(configs) => {
            let deadline = {
                let mut configs_guard = shared.ice_configs.lock().await;
                configs_guard.replace(configs);
                configs_guard.earliest_refresh_at(shared.config.ice_refresh_grace)
            };
            *shared.ice_refresh_deadline.lock().await = deadline;
            shared.metrics.record_ice_refresh();
            StepResult::Ok
        }
        Err(_) => {
            shared.metrics.record_error();
            StepResult::TransientFailure
        }
    }
}

async fn step_connect<T: HttpTransport + 'static>(shared: &Arc<Shared<T>>, now: Ticks100Ns) -> StepResult {
    let creds = match credentials_or_fail(shared, now).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let arn = match shared.channel_arn.lock().await.clone() {
        Some(a) => a,
        None => return StepResult::TransientFailure,
    };
    let wss_host = match shared.endpoints.lock().await.1.clone() {
        Some(h) => h,
        None => return StepResult::TransientFailure,
    };

    let client_id = if shared.channel_info.role == ChannelRole::Viewer {
        Some(shared.client_id.as_str())
    } else {
        None
    };
    let url = {
        let skew = shared.clock_skew.lock().await;
        match wss_client::build_signed_url(
            wss_host.trim_start_matches("wss://"),
            &arn,
            shared.channel_info.role,
            client_id,
            &shared.channel_info.region,
            &creds,
            &skew,
            now,
        ) {
            Ok(u) => u,
            Err(_) => return StepResult::TransientFailure,
        }
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let start = shared.clock.now();
    let outcome = WssClient::connect(&url, shared.config.ping_interval, events_tx).await;
    shared
        .metrics
        .record_latency(CallClass::WssConnect, elapsed_millis(shared.clock.now(), start));
    match outcome {
        Ok(client) => {
            if shared.has_connected_once.swap(true, Ordering::SeqCst) {
                shared.metrics.record_reconnect();
            }
            *shared.wss.lock().await = Some(client);
            let worker_shared = Arc::clone(shared);
            tokio::spawn(async move {
                run_message_router(worker_shared, events_rx).await;
            });
            StepResult::Ok
        }
        Err(_) => {
            shared.metrics.record_error();
            StepResult::TransientFailure
        }
    }
}

/// While `CONNECTED`, each poll: checks the transport is still up, drains a
/// pending `GO_AWAY`/`RECONNECT_ICE_SERVER` signal from the message-router
/// worker, and, absent either, waits for whichever comes first between that
/// signal and the ICE-refresh deadline (`spec.md` §4.6, §4.8, §4.9). A due
/// ICE refresh is performed in place via [`step_get_ice_config`], so the
/// machine never leaves `CONNECTED` just to rotate TURN credentials.
async fn step_wait_connected<T: HttpTransport + 'static>(shared: &Arc<Shared<T>>) -> StepResult {
    let wss_connected = shared
        .wss
        .lock()
        .await
        .as_ref()
        .map(wss_client::WssClient::is_connected)
        .unwrap_or(false);
    if !wss_connected {
        return StepResult::TransportDropped;
    }

    let poll_interval = Duration::from_millis(100);
    let now = shared.clock.now();
    let wait = match *shared.ice_refresh_deadline.lock().await {
        Some(deadline) if deadline <= now => return step_get_ice_config(shared, now).await,
        Some(deadline) => Duration::from_nanos((deadline - now).max(0) as u64 * 100).min(poll_interval),
        None => poll_interval,
    };

    let mut signal_rx = shared.connected_signal_rx.lock().await;
    tokio::select! {
        signal = signal_rx.recv() => signal.unwrap_or(StepResult::TransportDropped),
        () = tokio::time::sleep(wait) => StepResult::Ok,
    }
}

async fn step_delete<T: HttpTransport>(shared: &Arc<Shared<T>>, now: Ticks100Ns) -> StepResult {
    let creds = match credentials_or_fail(shared, now).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let arn = match shared.channel_arn.lock().await.clone() {
        Some(a) => a,
        None => return StepResult::Ok,
    };
    let version = shared.update_version.lock().await.clone().unwrap_or_default();
    let mut skew = shared.clock_skew.lock().await;
    let start = shared.clock.now();
    let outcome = shared
        .rest
        .delete_channel(&shared.channel_info, &arn, &version, &creds, &mut skew, now)
        .await;
    shared
        .metrics
        .record_latency(CallClass::DeleteChannel, elapsed_millis(shared.clock.now(), start));
    match outcome {
        Ok(()) => StepResult::Ok,
        Err(_) => {
            shared.metrics.record_error();
            StepResult::TransientFailure
        }
    }
}

/// Message-router worker (`spec.md` §5 task 3): consumes WSS events,
/// parses complete frames, and dispatches to the session router.
async fn run_message_router<T: HttpTransport>(
    shared: Arc<Shared<T>>,
    mut events: mpsc::UnboundedReceiver<WssEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            WssEvent::Connected => {}
            WssEvent::Data(frame) => {
                shared.metrics.record_message_received();
                let now = shared.clock.now();
                match message::parse(&frame) {
                    Ok(parsed) => {
                        if let Some(list) = &parsed.ice_server_list {
                            let configs: Vec<_> = list
                                .iter()
                                .cloned()
                                .filter_map(|w| w.into_ice_config_info(now).ok())
                                .collect();
                            if !configs.is_empty() {
                                shared.ice_configs.lock().await.replace(configs);
                            }
                        }
                        let outcome = shared.router.lock().await.route(parsed, now);
                        dispatch_outcome(&shared, outcome);
                    }
                    Err(e) => {
                        shared.metrics.record_runtime_error();
                        (shared.callbacks.on_error)(e);
                    }
                }
            }
            WssEvent::GoAway => {
                let _ = shared.connected_signal_tx.send(StepResult::GoAway);
            }
            WssEvent::Disconnected => {
                (shared.callbacks.on_disconnected)();
                return;
            }
            WssEvent::Error(msg) => {
                shared.metrics.record_error();
                (shared.callbacks.on_error)(SignalingError::TransportFailed(msg));
            }
        }
    }
}

/// Session-GC worker (`spec.md` §5 task 4): periodically drops terminated
/// sessions and expired pending-candidate queues. Mirrors the WSS client's
/// `tokio::time::interval` ping-ticker idiom.
async fn run_session_gc<T: HttpTransport>(shared: Arc<Shared<T>>) {
    let mut ticker = tokio::time::interval(shared.config.session_cleanup_wait);
    loop {
        ticker.tick().await;
        if shared.shutdown_requested.load(Ordering::SeqCst) {
            return;
        }
        let now = shared.clock.now();
        let mut router = shared.router.lock().await;
        router
            .pending_queues_mut()
            .sweep_expired(now, shared.config.pending_queue_ttl);
        router.collect_garbage();
    }
}

fn dispatch_outcome<T: HttpTransport>(shared: &Arc<Shared<T>>, outcome: Result<RouteOutcome>) {
    match outcome {
        Ok(RouteOutcome::NewSession {
            peer_id,
            payload,
            drained_candidates,
        }) => (shared.callbacks.on_offer)(peer_id, payload, drained_candidates),
        Ok(RouteOutcome::Answer { peer_id, payload }) => (shared.callbacks.on_answer)(peer_id, payload),
        Ok(RouteOutcome::Candidate { peer_id, payload }) => {
            (shared.callbacks.on_candidate)(peer_id, payload)
        }
        Ok(RouteOutcome::Queued { .. }) => {}
        Ok(RouteOutcome::ReconnectIce) => {
            let _ = shared.connected_signal_tx.send(StepResult::ReconnectIceServer);
        }
        Ok(RouteOutcome::GoAway) => {
            let _ = shared.connected_signal_tx.send(StepResult::GoAway);
        }
        Err(e) => {
            shared.metrics.record_runtime_error();
            (shared.callbacks.on_error)(e);
        }
    }
}
