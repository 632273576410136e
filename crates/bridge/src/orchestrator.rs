//! The bridge orchestrator: owns the session and drives the loop.
//!
//! ```text
//! start ──► Running ──► (cap reached) ───────────────► flush ──► Idle
//!              │
//!              └──► stop ──► Stopping ──► (safe point) ─► flush ──► Idle
//! ```
//!
//! Each iteration of the loop picks one turn:
//! - **opening**: no Subject reply yet, greet the Subject
//! - **topic switch**: the current topic has run its course, inject the next one
//! - **recovery**: the Responder is repeating itself, ask it to break the loop
//! - **normal**: hand the Subject's last reply plus recent history to the
//!   Responder and relay its output to the Subject
//!
//! Failed calls skip the iteration. The loop never terminates the process.

use chrono::Utc;
use parley_config::AppConfig;
use parley_core::{
    AgentFailure, AgentReply, AgentRole, BridgeError, ConverseOptions, ConverseRequest, Exchange,
    RemoteAgent,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context_window::ContextWindow;
use crate::recorder::{SessionRecorder, SessionStore};
use crate::session::{
    LogPage, Phase, Session, StartParams, StartReceipt, StatusReport, StopReceipt,
};
use crate::stall::StallDetector;
use crate::topics::TopicScheduler;

/// Consecutive loop-break prompts sent before the stall detector is reset.
pub const MAX_LOOP_BREAK_ATTEMPTS: u32 = 3;

/// Progress is logged every this many exchanges.
const PROGRESS_EVERY: u64 = 10;

/// Static configuration of the bridge loop.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Pairs of recent dialogue replayed to the Responder.
    pub history_horizon: usize,
    pub topics: Arc<[String]>,
    pub opening_message: String,
    pub loop_break_prompt: String,
    pub options: ConverseOptions,
    /// Parameters used for fields a start request leaves out.
    pub defaults: StartParams,
}

impl BridgeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            history_horizon: config.bridge.history_horizon,
            topics: config.bridge.topics.iter().cloned().collect(),
            opening_message: config.bridge.opening_message.clone(),
            loop_break_prompt: config.bridge.loop_break_prompt.clone(),
            options: ConverseOptions {
                temperature: config.responder.temperature,
                max_output_units: config.responder.max_output_units,
            },
            defaults: StartParams::from(&config.bridge.defaults),
        }
    }
}

/// Everything behind the bridge's single lock.
struct BridgeState {
    session: Session,
    recorder: Option<Arc<SessionRecorder>>,
    stop: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    last_artifact: Option<String>,
    last_persist_error: Option<String>,
}

/// Relays a conversation between a Responder and a Subject.
///
/// At most one loop runs at a time. Every control operation returns
/// promptly: none of them waits on the loop's network calls.
pub struct Bridge {
    subject: Arc<dyn RemoteAgent>,
    responder: Arc<dyn RemoteAgent>,
    store: Arc<dyn SessionStore>,
    settings: Arc<BridgeSettings>,
    state: Arc<Mutex<BridgeState>>,
}

impl Bridge {
    pub fn new(
        subject: Arc<dyn RemoteAgent>,
        responder: Arc<dyn RemoteAgent>,
        store: Arc<dyn SessionStore>,
        settings: BridgeSettings,
    ) -> Result<Self, BridgeError> {
        TopicScheduler::new(settings.topics.clone())?;
        if settings.history_horizon == 0 {
            return Err(BridgeError::InvalidConfig(
                "history horizon must be at least 1".into(),
            ));
        }
        if settings.opening_message.trim().is_empty() || settings.loop_break_prompt.trim().is_empty()
        {
            return Err(BridgeError::InvalidConfig(
                "opening message and loop-break prompt must not be blank".into(),
            ));
        }

        let state = BridgeState {
            session: Session::idle(&settings.defaults),
            recorder: None,
            stop: None,
            task: None,
            last_artifact: None,
            last_persist_error: None,
        };

        Ok(Self {
            subject,
            responder,
            store,
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().session.phase
    }

    /// A copy of the current session.
    pub fn session(&self) -> Session {
        self.state.lock().unwrap().session.clone()
    }

    /// Start a run.
    ///
    /// Both agents are probed first; the loop is spawned only if both are
    /// ready. Returns as soon as the loop is spawned.
    pub async fn start(&self, params: StartParams) -> Result<StartReceipt, BridgeError> {
        if self.phase() != Phase::Idle {
            return Err(BridgeError::AlreadyRunning);
        }
        params.validate()?;
        let delay = params.delay()?;

        let (subject_ready, responder_ready) =
            tokio::join!(self.subject.health_check(), self.responder.health_check());
        for (role, ready) in [
            (AgentRole::Subject, subject_ready),
            (AgentRole::Responder, responder_ready),
        ] {
            if !ready {
                warn!(role = %role, "Readiness probe failed, refusing to start");
                return Err(BridgeError::DependencyUnavailable {
                    role,
                    reason: "readiness probe failed".into(),
                });
            }
        }

        let topics = TopicScheduler::new(self.settings.topics.clone())?;

        let mut state = self.state.lock().unwrap();
        // Another start may have won while the probes were in flight.
        if state.session.phase != Phase::Idle {
            return Err(BridgeError::AlreadyRunning);
        }

        let started_at = Utc::now();
        let recorder = Arc::new(SessionRecorder::new(Some(started_at), self.store.clone()));
        let (stop_tx, stop_rx) = watch::channel(false);

        state.session = Session::started(&params, started_at);
        state.recorder = Some(recorder.clone());
        state.stop = Some(stop_tx);

        let run = RunLoop {
            subject: self.subject.clone(),
            responder: self.responder.clone(),
            recorder,
            settings: self.settings.clone(),
            state: self.state.clone(),
            stop: stop_rx,
            params,
            delay,
            window: ContextWindow::for_horizon(self.settings.history_horizon),
            stall: StallDetector::new(),
            topics,
            loop_break_attempts: 0,
            last_subject_reply: None,
        };
        state.task = Some(tokio::spawn(run.run()));

        info!(
            exchange_limit = params.exchange_limit,
            delay_secs = params.inter_exchange_delay_seconds,
            topic_switch_interval = params.topic_switch_interval,
            "Bridge session started"
        );

        Ok(StartReceipt { started_at, params })
    }

    /// Ask the loop to stop at its next safe point.
    ///
    /// In-flight calls are never interrupted. Stopping twice is harmless.
    pub fn stop(&self) -> Result<StopReceipt, BridgeError> {
        let mut state = self.state.lock().unwrap();
        match state.session.phase {
            Phase::Idle => Err(BridgeError::NotRunning),
            Phase::Running | Phase::Stopping => {
                state.session.phase = Phase::Stopping;
                if let Some(stop) = &state.stop {
                    stop.send_replace(true);
                }
                info!(
                    exchanges = state.session.exchanges_completed,
                    "Stop requested"
                );
                Ok(StopReceipt {
                    exchanges_completed: state.session.exchanges_completed,
                })
            }
        }
    }

    /// Session snapshot plus live readiness of both agents.
    pub async fn status(&self) -> StatusReport {
        let (session, last_artifact, last_persist_error) = {
            let state = self.state.lock().unwrap();
            (
                state.session.clone(),
                state.last_artifact.clone(),
                state.last_persist_error.clone(),
            )
        };

        let (subject_reachable, responder_reachable) =
            tokio::join!(self.subject.health_check(), self.responder.health_check());

        StatusReport {
            running: session.is_running(),
            phase: session.phase,
            exchanges_completed: session.exchanges_completed,
            exchange_limit: session.exchange_limit,
            current_topic: session.current_topic,
            topic_index: session.topic_index,
            messages_on_current_topic: session.messages_on_current_topic,
            topic_switch_interval: session.topic_switch_interval,
            inter_exchange_delay_seconds: session.inter_exchange_delay_seconds,
            started_at: session.started_at,
            subject_reachable,
            responder_reachable,
            last_artifact,
            last_persist_error,
        }
    }

    /// The most recent `limit` exchanges of the current or last run.
    pub fn log(&self, limit: usize) -> LogPage {
        let recorder = self.state.lock().unwrap().recorder.clone();
        let (total_exchanges, exchanges) = match recorder {
            Some(recorder) => recorder.snapshot(limit),
            None => (0, Vec::new()),
        };
        LogPage {
            total_exchanges,
            returned_count: exchanges.len(),
            exchanges,
        }
    }

    /// Wait for the most recently started loop to finish.
    ///
    /// Only one caller gets to wait on a given run; others return at once.
    pub async fn wait_idle(&self) {
        let task = self.state.lock().unwrap().task.take();
        let Some(task) = task else {
            return;
        };

        if let Err(e) = task.await {
            error!(error = %e, "Bridge loop task failed");
            let mut state = self.state.lock().unwrap();
            state.session.phase = Phase::Idle;
            state.stop = None;
        }
    }

    /// Stop any active run and wait for its session log to be flushed.
    pub async fn shutdown(&self) {
        if self.stop().is_ok() {
            info!("Waiting for the bridge loop to finish");
        }
        self.wait_idle().await;
    }
}

/// Which kind of turn an iteration takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Opening,
    TopicSwitch,
    Recovery,
    Normal,
}

enum Step {
    Recorded(u64),
    /// Stop was observed between the Responder and Subject hops.
    Interrupted,
}

/// A call that failed; the iteration is skipped.
struct Skipped {
    role: AgentRole,
    failure: AgentFailure,
}

/// State owned by one run. Dropped when the run ends.
struct RunLoop {
    subject: Arc<dyn RemoteAgent>,
    responder: Arc<dyn RemoteAgent>,
    recorder: Arc<SessionRecorder>,
    settings: Arc<BridgeSettings>,
    state: Arc<Mutex<BridgeState>>,
    stop: watch::Receiver<bool>,
    params: StartParams,
    delay: Duration,
    window: ContextWindow,
    stall: StallDetector,
    topics: TopicScheduler,
    loop_break_attempts: u32,
    last_subject_reply: Option<String>,
}

impl RunLoop {
    async fn run(mut self) {
        loop {
            if self.stop_requested() {
                info!("Bridge loop observed stop request");
                break;
            }
            if self.with_session(|s| s.cap_reached()) {
                info!(
                    exchange_limit = self.params.exchange_limit,
                    "Exchange limit reached"
                );
                break;
            }

            match self.step().await {
                Ok(Step::Recorded(completed)) => {
                    if completed % PROGRESS_EVERY == 0 {
                        let topic_index = self.topics.cursor();
                        info!(
                            completed,
                            limit = self.params.exchange_limit,
                            topic = topic_index,
                            topics = self.topics.len(),
                            "Progress: {completed}/{} exchanges",
                            self.params.exchange_limit
                        );
                    }
                }
                Ok(Step::Interrupted) => {
                    info!("Bridge loop observed stop request");
                    break;
                }
                Err(skipped) => {
                    warn!(
                        role = %skipped.role,
                        reason = %skipped.failure.reason,
                        detail = %skipped.failure.detail,
                        "No {} reply, skipping iteration",
                        skipped.role
                    );
                }
            }

            self.pause().await;
        }

        self.finish().await;
    }

    fn choose_turn(&self) -> Turn {
        if self.last_subject_reply.is_none() {
            return Turn::Opening;
        }
        let on_topic = self.with_session(|s| s.messages_on_current_topic);
        if on_topic >= self.params.topic_switch_interval {
            Turn::TopicSwitch
        } else if self.stall.is_stalled() && self.loop_break_attempts < MAX_LOOP_BREAK_ATTEMPTS {
            Turn::Recovery
        } else {
            Turn::Normal
        }
    }

    async fn step(&mut self) -> Result<Step, Skipped> {
        let turn = self.choose_turn();
        debug!(?turn, "Next turn");

        let outbound = match turn {
            Turn::Opening => self.settings.opening_message.clone(),
            Turn::TopicSwitch => {
                let topic = self.topics.next();
                let topic_index = self.topics.cursor();
                self.with_session(|s| {
                    s.messages_on_current_topic = 0;
                    s.current_topic = topic.clone();
                    s.topic_index = topic_index;
                });
                info!(topic = %topic, "Switching to new topic");
                topic
            }
            Turn::Recovery | Turn::Normal => {
                let output = self.ask_responder(turn).await?;
                if self.stop_requested() {
                    return Ok(Step::Interrupted);
                }
                output
            }
        };

        let reply = self
            .subject
            .converse(ConverseRequest::new(outbound.clone()))
            .await
            .map_err(|failure| Skipped {
                role: AgentRole::Subject,
                failure,
            })?;

        Ok(Step::Recorded(self.record(outbound, reply)))
    }

    async fn ask_responder(&mut self, turn: Turn) -> Result<String, Skipped> {
        let request = if turn == Turn::Recovery {
            self.loop_break_attempts += 1;
            warn!(
                attempt = self.loop_break_attempts,
                max = MAX_LOOP_BREAK_ATTEMPTS,
                "Responder is repeating itself, sending loop-break prompt"
            );
            ConverseRequest::new(self.settings.loop_break_prompt.clone())
        } else {
            if self.stall.is_stalled() {
                info!("Loop-break attempts exhausted, resetting stall detector");
                self.stall.reset();
            }
            self.loop_break_attempts = 0;
            let prompt = self.last_subject_reply.clone().unwrap_or_default();
            ConverseRequest::new(prompt)
                .with_history(self.window.recent_pairs(self.settings.history_horizon))
        }
        .with_options(self.settings.options);

        let reply = self
            .responder
            .converse(request)
            .await
            .map_err(|failure| Skipped {
                role: AgentRole::Responder,
                failure,
            })?;

        self.stall.observe(&reply.text);
        Ok(reply.text)
    }

    fn record(&mut self, outbound: String, reply: AgentReply) -> u64 {
        self.window.push(reply.text.clone(), outbound.clone());
        self.last_subject_reply = Some(reply.text.clone());
        self.recorder
            .append(Exchange::now(outbound, reply.text, reply.metrics));

        self.with_session(|s| {
            s.exchanges_completed += 1;
            s.messages_on_current_topic += 1;
            s.exchanges_completed
        })
    }

    /// The inter-exchange delay. Wakes early on stop.
    async fn pause(&mut self) {
        let delay = self.delay;
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.stop.wait_for(|stop| *stop) => {}
        }
    }

    async fn finish(self) {
        let outcome = self.recorder.flush().await;

        let mut state = self.state.lock().unwrap();
        match outcome {
            Ok(Some(location)) => {
                state.last_artifact = Some(location);
                state.last_persist_error = None;
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Failed to save session log");
                state.last_persist_error = Some(e.to_string());
            }
        }
        state.session.phase = Phase::Idle;
        state.stop = None;

        info!(
            exchanges = state.session.exchanges_completed,
            "Bridge loop stopped"
        );
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.state.lock().unwrap().session)
    }
}
