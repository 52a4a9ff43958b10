// Interview session driver
//
// A single task owns every piece of session state and multiplexes all event
// sources through one select loop: link events, captured frames, the level
// sampling tick, the liveness poll, the countdown, and the retry, grace and
// forced-failure deadlines. Media acquisition and agent negotiation run in
// spawned tasks and report back over an internal channel; their results are
// checked against the session state on arrival.
//
// Handlers are synchronous and take `now` explicitly.

use anyhow::Result;
use chrono::Local;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::countdown::{Countdown, CountdownTick};
use super::decision::{Decision, DecisionOutcome, DecisionState};
use super::liveness::{LevelOutcome, LivenessPolicy, LivenessState, StrikeOutcome};
use super::prompt;
use super::result::InterviewResult;
use super::status::{ContactCard, SessionStatus};
use super::transcript::TranscriptAssembler;
use crate::agent::messages::{Blob, DecisionArgs, FunctionCall, ServerContent};
use crate::agent::{
    AgentLink, AgentTransport, ClientMessage, ConnectionManager, LinkEvent, LinkLoss, OpenOutcome,
    RetryPolicy, SendOutcome, ServerMessage, SetupConfig, NOTIFY_RESULT,
};
use crate::audio::{
    codec, convert, AudioFrame, AudioSink, CaptureConfig, FrameSlicer, MediaDevices, MediaStream,
    PlaybackQueue, TrackGuard, VolumeMeter,
};
use crate::config::{AgentConfig, AudioConfig, Config, InterviewConfig, RecruiterConfig};
use crate::error::{SessionError, SessionResult};

const POLL_PERIOD: Duration = Duration::from_secs(1);
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Everything a session needs from the service configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub agent: AgentConfig,
    pub audio: AudioConfig,
    pub interview: InterviewConfig,
    pub retry: RetryPolicy,
    pub recruiter: RecruiterConfig,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent: config.agent.clone(),
            audio: config.audio.clone(),
            interview: config.interview.clone(),
            retry: RetryPolicy::from(&config.retry),
            recruiter: config.recruiter.clone(),
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            target_sample_rate: self.audio.input_sample_rate,
            target_channels: 1,
            ..CaptureConfig::default()
        }
    }

    fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.audio.sample_interval_ms.max(1))
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// External collaborators of one session
pub struct SessionDeps {
    pub transport: Arc<dyn AgentTransport>,
    pub media: Arc<dyn MediaDevices>,
    pub sink: Box<dyn AudioSink>,
}

pub type SinkFactory = Arc<dyn Fn() -> Result<Box<dyn AudioSink>> + Send + Sync>;

/// Starts sessions against a fixed set of collaborators
#[derive(Clone)]
pub struct SessionLauncher {
    settings: SessionSettings,
    transport: Arc<dyn AgentTransport>,
    media: Arc<dyn MediaDevices>,
    sinks: SinkFactory,
}

impl SessionLauncher {
    pub fn new(
        settings: SessionSettings,
        transport: Arc<dyn AgentTransport>,
        media: Arc<dyn MediaDevices>,
        sinks: SinkFactory,
    ) -> Self {
        Self {
            settings,
            transport,
            media,
            sinks,
        }
    }

    pub fn launch(&self, config: SessionConfig) -> Result<SessionHandle> {
        let sink = (self.sinks)()?;
        Ok(start(
            config,
            self.settings.clone(),
            SessionDeps {
                transport: Arc::clone(&self.transport),
                media: Arc::clone(&self.media),
                sink,
            },
        ))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

/// Start a session on the current runtime
pub fn start(config: SessionConfig, settings: SessionSettings, deps: SessionDeps) -> SessionHandle {
    let (controller, handle) = SessionController::new(config, settings, deps, Instant::now());
    tokio::spawn(controller.run());
    handle
}

#[derive(Debug)]
enum Command {
    Terminate,
}

/// Cloneable control surface of a running session
#[derive(Clone)]
pub struct SessionControl {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionControl {
    /// Request user termination. Returns false if the session is already gone.
    pub fn terminate(&self) -> bool {
        self.commands.try_send(Command::Terminate).is_ok()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}

pub struct SessionHandle {
    control: SessionControl,
    outcome: oneshot::Receiver<SessionResult<InterviewResult>>,
}

impl SessionHandle {
    pub fn terminate(&self) -> bool {
        self.control.terminate()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.control.status()
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// The single outcome of the session
    pub async fn finished(self) -> SessionResult<InterviewResult> {
        self.outcome.await.unwrap_or(Err(SessionError::Aborted))
    }
}

enum Acquired {
    Media(Result<MediaStream>),
    Link {
        generation: u64,
        result: Result<AgentLink>,
    },
}

pub struct SessionController {
    config: SessionConfig,
    settings: SessionSettings,
    setup: SetupConfig,
    transport: Arc<dyn AgentTransport>,
    media: Arc<dyn MediaDevices>,
    sink: Box<dyn AudioSink>,

    connection: ConnectionManager,
    inbound: Option<mpsc::Receiver<LinkEvent>>,
    retry_at: Option<Instant>,

    frames: Option<mpsc::Receiver<AudioFrame>>,
    track: Option<TrackGuard>,
    meter: VolumeMeter,
    slicer: FrameSlicer,
    playback: PlaybackQueue,
    user_level: f32,

    liveness: LivenessState,
    transcript: TranscriptAssembler,
    decision: DecisionState,
    countdown: Countdown,
    next_poll: Option<Instant>,
    next_tick: Option<Instant>,

    commands: mpsc::Receiver<Command>,
    acquired_tx: mpsc::Sender<Acquired>,
    acquired_rx: mpsc::Receiver<Acquired>,
    status: watch::Sender<SessionStatus>,
    outcome: Option<oneshot::Sender<SessionResult<InterviewResult>>>,
    error: Option<SessionError>,
    finished: bool,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        settings: SessionSettings,
        deps: SessionDeps,
        now: Instant,
    ) -> (Self, SessionHandle) {
        let (cmd_tx, commands) = mpsc::channel(8);
        let (acquired_tx, acquired_rx) = mpsc::channel(4);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (status, status_rx) = watch::channel(SessionStatus::initial(
            settings.interview.duration_secs,
            settings.retry.max_retries,
        ));

        let setup = prompt::build_setup(&config, &settings.agent, &settings.recruiter);
        let liveness = LivenessState::new(
            LivenessPolicy::from_config(&settings.interview, &settings.audio),
            now,
        );
        let decision = DecisionState::new(
            settings.interview.grace(),
            settings.interview.forced_failure_timeout(),
        );

        let controller = Self {
            connection: ConnectionManager::new(settings.retry),
            inbound: None,
            retry_at: None,
            frames: None,
            track: None,
            meter: VolumeMeter::default(),
            slicer: FrameSlicer::new(settings.audio.frame_samples),
            playback: PlaybackQueue::new(),
            user_level: 0.0,
            liveness,
            transcript: TranscriptAssembler::new(),
            decision,
            countdown: Countdown::new(settings.interview.duration_secs),
            next_poll: None,
            next_tick: None,
            commands,
            acquired_tx,
            acquired_rx,
            status,
            outcome: Some(outcome_tx),
            error: None,
            finished: false,
            config,
            setup,
            transport: deps.transport,
            media: deps.media,
            sink: deps.sink,
            settings,
        };

        let handle = SessionHandle {
            control: SessionControl {
                commands: cmd_tx,
                status: status_rx,
            },
            outcome: outcome_rx,
        };

        (controller, handle)
    }

    pub async fn run(mut self) {
        self.begin();

        let mut sampler = tokio::time::interval(self.settings.sample_interval());
        sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.finished {
            tokio::select! {
                Some(command) = self.commands.recv() => match command {
                    Command::Terminate => self.terminate(),
                },
                Some(acquired) = self.acquired_rx.recv() => match acquired {
                    Acquired::Media(result) => self.on_media(result),
                    Acquired::Link { generation, result } => {
                        self.on_link(generation, result, Instant::now())
                    }
                },
                event = recv_opt(&mut self.inbound) => self.on_link_event(event, Instant::now()),
                frame = recv_opt(&mut self.frames) => self.on_frame(frame),
                _ = sampler.tick() => self.on_sample_tick(Instant::now()),
                _ = sleep_opt(self.next_poll) => self.on_liveness_poll(Instant::now()),
                _ = sleep_opt(self.next_tick) => self.on_countdown_tick(Instant::now()),
                _ = sleep_opt(self.retry_at) => self.on_retry_due(),
                _ = sleep_opt(self.decision.grace_deadline()) => self.on_grace_elapsed(),
                _ = sleep_opt(self.decision.forced_deadline()) => self.on_forced_deadline(),
            }

            self.publish();
        }

        debug!("Session loop for {} finished", self.config.candidate_name);
    }

    /// Acquire the input stream; the first connection attempt follows once it is installed
    pub fn begin(&mut self) {
        info!(
            "Starting interview with {} for {} in {}",
            self.config.candidate_name, self.config.role, self.config.language
        );

        let media = Arc::clone(&self.media);
        let capture = self.settings.capture_config();
        let tx = self.acquired_tx.clone();
        info!("Acquiring input stream from {} backend", media.name());

        tokio::spawn(async move {
            let result = media.acquire(&capture).await;
            // If the session is gone the stream is dropped here, which stops it
            let _ = tx.send(Acquired::Media(result)).await;
        });

        self.publish();
    }

    pub fn on_media(&mut self, result: Result<MediaStream>) {
        if self.finished {
            debug!("Releasing input stream acquired after close");
            return;
        }

        match result {
            Ok(stream) => {
                let (frames, track) = stream.into_parts();
                self.frames = Some(frames);
                self.track = Some(track);
                info!("Input stream acquired");
                self.connect();
            }
            Err(e) => {
                error!("Media acquisition failed: {:#}", e);
                self.fail(SessionError::MediaAcquisition(format!("{e:#}")));
            }
        }
    }

    fn connect(&mut self) {
        let Some(generation) = self.connection.begin_attempt() else {
            return;
        };

        let transport = Arc::clone(&self.transport);
        let setup = self.setup.clone();
        let tx = self.acquired_tx.clone();
        info!("Connecting to agent via {} transport", transport.name());

        tokio::spawn(async move {
            let result = transport.connect(&setup).await;
            // A link that outlives the session is dropped here, closing it
            let _ = tx.send(Acquired::Link { generation, result }).await;
        });
    }

    pub fn on_link(&mut self, generation: u64, result: Result<AgentLink>, now: Instant) {
        match result {
            Ok(link) => {
                let AgentLink { outbound, inbound } = link;
                match self.connection.on_open(generation, outbound) {
                    OpenOutcome::Installed => {
                        self.inbound = Some(inbound);
                        self.went_live(now);
                    }
                    OpenOutcome::Released => drop(inbound),
                }
            }
            Err(e) => {
                warn!("Connection attempt {} failed: {:#}", generation, e);
                self.link_lost(generation, now);
            }
        }
    }

    fn went_live(&mut self, now: Instant) {
        self.liveness.rearm(now);
        self.next_poll = Some(now + POLL_PERIOD);
        self.next_tick = Some(now + TICK_PERIOD);
    }

    fn link_lost(&mut self, generation: u64, now: Instant) {
        match self.connection.on_lost(generation) {
            LinkLoss::Ignored => {}
            LinkLoss::Retry { delay, .. } => {
                self.inbound = None;
                self.next_poll = None;
                self.next_tick = None;
                self.retry_at = Some(now + delay);
            }
            LinkLoss::Fatal { attempts } => {
                error!("Giving up on the agent connection after {} retries", attempts);
                self.fail(SessionError::RetriesExhausted { attempts });
            }
        }
    }

    pub fn on_retry_due(&mut self) {
        self.retry_at = None;
        if !self.finished {
            self.connect();
        }
    }

    pub fn on_link_event(&mut self, event: Option<LinkEvent>, now: Instant) {
        let generation = self.connection.generation();
        match event {
            Some(LinkEvent::Message(msg)) => self.on_server_message(msg, now),
            Some(LinkEvent::Error(e)) => self.connection.on_error(generation, &e),
            Some(LinkEvent::Closed(reason)) => {
                info!(
                    "Agent connection closed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );
                self.link_lost(generation, now);
            }
            None => {
                debug!("Agent link channel ended");
                self.link_lost(generation, now);
            }
        }
    }

    pub fn on_server_message(&mut self, msg: ServerMessage, now: Instant) {
        if self.finished {
            return;
        }

        if let Some(go_away) = &msg.go_away {
            info!(
                "Agent is going away (time left: {})",
                go_away.time_left.as_deref().unwrap_or("unknown")
            );
        }

        if let Some(content) = msg.server_content {
            self.on_server_content(content);
        }

        if let Some(tool_call) = msg.tool_call {
            for call in tool_call.function_calls {
                self.on_function_call(call, now);
            }
        }
    }

    fn on_server_content(&mut self, content: ServerContent) {
        if let Some(text) = content
            .output_transcription
            .as_ref()
            .and_then(|t| t.text.as_deref())
        {
            self.transcript.push_agent(text);
        }
        if let Some(text) = content
            .input_transcription
            .as_ref()
            .and_then(|t| t.text.as_deref())
        {
            self.transcript.push_user(text);
        }

        if content.turn_complete {
            let added = self.transcript.complete_turn(Local::now()).len();
            debug!("Turn complete ({} transcript entries)", added);
        }

        for blob in content.audio_blobs() {
            self.on_agent_audio(blob);
        }
    }

    fn on_agent_audio(&mut self, blob: &Blob) {
        if !codec::is_pcm(&blob.mime_type) {
            debug!("Ignoring agent payload of type {}", blob.mime_type);
            return;
        }

        let samples = match codec::decode_pcm(&blob.data) {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => return,
            Err(e) => {
                warn!("Dropping agent audio: {:#}", e);
                return;
            }
        };

        let rate = codec::parse_rate(&blob.mime_type).unwrap_or(self.settings.audio.output_sample_rate);
        let duration = codec::duration_secs(samples.len(), rate);
        let segment = self.playback.schedule(duration, self.sink.clock());
        self.sink.play(segment.id, &samples, rate, segment.start);
        self.liveness.agent_started();
    }

    fn on_function_call(&mut self, call: FunctionCall, now: Instant) {
        if self.finished {
            return;
        }

        if call.name != NOTIFY_RESULT {
            warn!("Agent called unknown function {}", call.name);
            let response = json!({ "error": format!("Unknown function: {}", call.name) });
            self.send(ClientMessage::tool_ack(call.id, call.name.clone(), response));
            return;
        }

        self.send(ClientMessage::tool_ack(
            call.id.clone(),
            call.name.clone(),
            json!({ "result": "ok" }),
        ));

        let args = call.decision_args().unwrap_or_else(|e| {
            warn!("Malformed decision arguments ({}), treating as a failing decision", e);
            DecisionArgs {
                passed: false,
                reason: String::new(),
            }
        });
        info!("Agent decision: passed={} reason={:?}", args.passed, args.reason);

        match self.decision.on_decision(args.passed, args.reason, now) {
            DecisionOutcome::Finalize(decision) => self.finalize(decision),
            DecisionOutcome::Grace { .. } => {}
            DecisionOutcome::Ignored => {}
        }
    }

    /// Captured audio: meter it and forward it in fixed-size frames
    pub fn on_frame(&mut self, frame: Option<AudioFrame>) {
        let Some(frame) = frame else {
            info!("Capture stream ended");
            self.frames = None;
            // The last window would otherwise read as speech forever
            self.meter.reset();
            self.user_level = 0.0;
            return;
        };
        if self.finished {
            return;
        }

        let rate = self.settings.audio.input_sample_rate;
        let frame = convert::normalize_frame(frame, rate, 1);
        self.meter.push(&frame.samples);

        for chunk in self.slicer.push(&frame.samples) {
            // Not connected: the frame is lost, never queued
            if !self.connection.can_deliver() {
                continue;
            }
            self.connection
                .send(ClientMessage::audio(codec::encode_pcm_blob(&chunk, rate)));
        }
    }

    /// Level sampling tick: reap finished playback, then check for speech
    pub fn on_sample_tick(&mut self, now: Instant) {
        if self.finished {
            return;
        }

        let clock = self.sink.clock();
        self.playback.reap(clock);
        if self.playback.is_empty() && self.liveness.agent_speaking() {
            debug!("Agent audio drained");
            self.liveness.agent_finished(now);
        }

        let level = self.meter.level();
        self.user_level = level;

        if let LevelOutcome::BargeIn {
            interruptions,
            alert,
        } = self.liveness.observe_level(level, now)
        {
            let discarded = self.playback.clear(clock);
            self.sink.stop_all();
            let max = self.liveness.policy().max_interruptions;
            info!(
                "Candidate interrupted the agent ({}/{}), {} segments discarded",
                interruptions, max, discarded
            );
            if alert {
                self.send_directive(prompt::interruption_alert(max));
            }
        }
    }

    pub fn on_liveness_poll(&mut self, now: Instant) {
        self.next_poll = None;
        if self.finished || !self.connection.is_live() {
            return;
        }
        self.next_poll = Some(now + POLL_PERIOD);

        if self.decision.is_latched() || self.decision.forced_failure_pending() {
            return;
        }

        let max = self.liveness.policy().max_strikes;
        match self.liveness.poll(now) {
            Some(StrikeOutcome::Warning { strike }) => {
                warn!("Candidate silent, strike {}/{}", strike, max);
                let silence = self.liveness.policy().silence_timeout.as_secs();
                self.send_directive(prompt::strike_warning(strike, max, silence));
            }
            Some(StrikeOutcome::FinalStrike) => {
                warn!("Candidate silent, final strike. Forcing a failing decision");
                self.send_directive(prompt::forced_failure_directive(max));
                self.decision.arm_forced_failure(now);
            }
            None => {}
        }
    }

    pub fn on_countdown_tick(&mut self, now: Instant) {
        self.next_tick = None;
        if self.finished || !self.connection.is_live() {
            return;
        }
        self.next_tick = Some(now + TICK_PERIOD);

        if self.decision.in_grace() {
            return;
        }

        if self.countdown.tick() == CountdownTick::Expired {
            info!("Interview time limit reached");
            let reason = prompt::time_limit_reason(self.countdown.total());
            let decision = self.decision.conclude(Decision::fail(reason));
            self.finalize(decision);
        }
    }

    pub fn on_grace_elapsed(&mut self) {
        if let Some(decision) = self.decision.grace_elapsed() {
            self.finalize(decision);
        }
    }

    pub fn on_forced_deadline(&mut self) {
        if let Some(decision) = self.decision.forced_failure_elapsed() {
            warn!("No decision from the agent after the final strike");
            self.finalize(decision);
        }
    }

    /// User termination
    pub fn terminate(&mut self) {
        if self.finished {
            return;
        }
        info!("Termination requested");
        let decision = self.decision.conclude(Decision::fail(prompt::USER_ENDED_REASON));
        self.finalize(decision);
    }

    fn send(&mut self, msg: ClientMessage) {
        if self.connection.send(msg) == SendOutcome::Dropped {
            debug!("Dropped outgoing message, no live connection");
        }
    }

    fn send_directive(&mut self, text: String) {
        info!("Sending directive: {}", text);
        self.send(ClientMessage::system_text(text));
    }

    fn finalize(&mut self, decision: Decision) {
        if self.finished {
            debug!("Session already finalized");
            return;
        }
        self.finished = true;

        let flushed = self.transcript.flush_pending(Local::now());
        if flushed > 0 {
            debug!("Flushed {} pending transcript entries", flushed);
        }
        self.teardown();

        let result = InterviewResult {
            passed: decision.passed,
            notes: decision.reason,
            transcript: self.transcript.entries().to_vec(),
        };
        info!(
            "Interview with {} finished: {} ({})",
            self.config.candidate_name,
            result.status_label(),
            result.notes_or_na()
        );

        self.publish();
        if let Some(tx) = self.outcome.take() {
            let _ = tx.send(Ok(result));
        }
    }

    fn fail(&mut self, err: SessionError) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.teardown();

        error!("Interview session failed: {}", err);
        self.error = Some(err.clone());
        self.publish();
        if let Some(tx) = self.outcome.take() {
            let _ = tx.send(Err(err));
        }
    }

    fn teardown(&mut self) {
        self.connection.close(true);
        self.inbound = None;
        self.retry_at = None;
        self.next_poll = None;
        self.next_tick = None;

        let clock = self.sink.clock();
        self.playback.clear(clock);
        self.sink.stop_all();
        self.sink.close();
        self.liveness.agent_finished(Instant::now());

        self.frames = None;
        if let Some(mut track) = self.track.take() {
            track.stop();
        }
        debug!("Session resources released");
    }

    fn publish(&self) {
        let shortlisted = self.decision.in_grace();
        let status = SessionStatus {
            connection: self.connection.state(),
            reconnect_attempt: self.connection.retry_state().attempt_count,
            max_retries: self.connection.policy().max_retries,
            seconds_left: self.countdown.remaining(),
            strikes: self.liveness.strike_count(),
            interruptions: self.liveness.interruption_count(),
            agent_speaking: self.liveness.agent_speaking(),
            user_level: self.user_level,
            shortlisted,
            contact: shortlisted.then(|| ContactCard::from(&self.settings.recruiter)),
            latest: self.transcript.latest().cloned(),
            error: self.error.as_ref().map(|e| e.to_string()),
            finished: self.finished,
        };

        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn liveness(&self) -> &LivenessState {
        &self.liveness
    }

    pub fn playback(&self) -> &PlaybackQueue {
        &self.playback
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
