use crate::{error::Error, rpc::TransactionSubscribeRequest, sink::NotificationSink};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde_json::Value;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    net::TcpStream,
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        watch,
    },
    time::Interval,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Seconds an open session is allowed to stream before the controller closes
/// it. Every pushed event is metered by the provider, so an unattended
/// session is capped rather than left running.
pub const DEFAULT_AUTO_CLOSE_SECS: u32 = 30;

const ATLAS_MAINNET: &str = "wss://atlas-mainnet.helius-rpc.com";

/// Where the session connects and how it behaves once open.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub endpoint: Url,
    pub auto_close_secs: u32,
    /// Whether a `start` from idle empties the notification sink first.
    pub clear_on_start: bool,
}

impl SessionConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            auto_close_secs: DEFAULT_AUTO_CLOSE_SECS,
            clear_on_start: false,
        }
    }

    /// Config against the Atlas mainnet endpoint with the api key embedded
    /// as a query credential. The key format is not validated here.
    pub fn atlas(api_key: &str) -> Result<Self, Error> {
        let endpoint = Url::parse(&format!("{}?api-key={}", ATLAS_MAINNET, api_key))?;
        Ok(Self::new(endpoint))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    /// Transient: cleanup runs and the session lands back on `Idle` before
    /// anyone can observe this state through the watch channel.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// User-issued stop command.
    Stopped,
    /// The countdown reached zero.
    AutoClose,
    /// The peer closed the transport or the stream errored.
    PeerClosed,
    /// The transport never reached open.
    ConnectFailed,
}

/// Emitted by the controller for a single subscriber; the presentation side
/// never touches the socket.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Connected,
    Notification(Value),
    Closed(CloseReason),
}

/// Snapshot published on every state change. `remaining_seconds` is only
/// meaningful while the state is `Open`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub remaining_seconds: u32,
}

enum Command {
    Start(TransactionSubscribeRequest),
    Stop,
}

enum Input {
    Start(TransactionSubscribeRequest),
    Stop,
    TransportOpen,
    TransportClosed,
    Frame(String),
    Tick,
}

#[derive(Debug, PartialEq)]
enum Effect {
    Connect,
    Send(String),
    Close,
    Event(SessionEvent),
}

/// The session state machine. Synchronous: every external stimulus arrives
/// as an [`Input`] and the transport work to perform comes back as
/// [`Effect`]s, which keeps the transition rules testable without a socket.
struct Session {
    state: SessionState,
    remaining_seconds: u32,
    pending_request: Option<String>,
    auto_close_secs: u32,
    clear_on_start: bool,
    sink: Arc<Mutex<NotificationSink>>,
}

impl Session {
    fn new(auto_close_secs: u32, clear_on_start: bool, sink: Arc<Mutex<NotificationSink>>) -> Self {
        Self {
            state: SessionState::Idle,
            remaining_seconds: auto_close_secs,
            pending_request: None,
            auto_close_secs,
            clear_on_start,
            sink,
        }
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            remaining_seconds: self.remaining_seconds,
        }
    }

    fn apply(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Start(request) => self.on_start(request),
            Input::Stop => self.on_stop(),
            Input::TransportOpen => self.on_transport_open(),
            Input::TransportClosed => self.on_transport_closed(),
            Input::Frame(text) => self.on_frame(text),
            Input::Tick => self.on_tick(),
        }
    }

    fn on_start(&mut self, request: TransactionSubscribeRequest) -> Vec<Effect> {
        let text = match serde_json::to_string(&request) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "could not serialize subscribe request");
                return Vec::new();
            }
        };
        match self.state {
            SessionState::Idle => {
                if self.clear_on_start {
                    self.lock_sink().clear();
                }
                self.pending_request = Some(text);
                self.state = SessionState::Connecting;
                vec![Effect::Connect]
            }
            SessionState::Connecting => {
                tracing::warn!("start ignored, session is already connecting");
                Vec::new()
            }
            // Resubscribe in place: push the fresh request on the live
            // socket instead of opening a second transport.
            SessionState::Open => vec![Effect::Send(text)],
            SessionState::Closed => Vec::new(),
        }
    }

    fn on_stop(&mut self) -> Vec<Effect> {
        match self.state {
            SessionState::Connecting | SessionState::Open => self.close(CloseReason::Stopped),
            SessionState::Idle | SessionState::Closed => Vec::new(),
        }
    }

    fn on_transport_open(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        self.state = SessionState::Open;
        self.remaining_seconds = self.auto_close_secs;
        let mut effects = Vec::new();
        if let Some(request) = self.pending_request.take() {
            effects.push(Effect::Send(request));
        }
        effects.push(Effect::Event(SessionEvent::Connected));
        effects
    }

    fn on_transport_closed(&mut self) -> Vec<Effect> {
        match self.state {
            SessionState::Connecting => self.close(CloseReason::ConnectFailed),
            SessionState::Open => self.close(CloseReason::PeerClosed),
            SessionState::Idle | SessionState::Closed => Vec::new(),
        }
    }

    fn on_frame(&mut self, text: String) -> Vec<Effect> {
        if self.state != SessionState::Open {
            return Vec::new();
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                self.lock_sink().append(value.clone());
                vec![Effect::Event(SessionEvent::Notification(value))]
            }
            Err(err) => {
                // Fatal to the frame, not to the session.
                tracing::debug!(error = %err, "dropping malformed frame");
                Vec::new()
            }
        }
    }

    fn on_tick(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Open {
            return Vec::new();
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.close(CloseReason::AutoClose)
        } else {
            Vec::new()
        }
    }

    fn close(&mut self, reason: CloseReason) -> Vec<Effect> {
        self.state = SessionState::Closed;
        self.pending_request = None;
        self.remaining_seconds = self.auto_close_secs;
        self.state = SessionState::Idle;
        tracing::info!(?reason, "session closed");
        vec![Effect::Close, Effect::Event(SessionEvent::Closed(reason))]
    }

    fn lock_sink(&self) -> std::sync::MutexGuard<'_, NotificationSink> {
        self.sink.lock().expect("notification sink lock poisoned")
    }
}

/// Owns the websocket halves and drives the state machine from a spawned
/// task. All session and sink mutation happens here, so user commands and
/// transport callbacks cannot race.
pub struct SessionController {
    session: Session,
    endpoint: Url,
    commands: UnboundedReceiver<Command>,
    events: UnboundedSender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
    write: Option<SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>>,
    read: Option<SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>>,
    ticker: Interval,
}

impl SessionController {
    /// Spawns the controller task and returns the command/read handle plus
    /// the event stream for the single subscriber.
    pub fn spawn(config: SessionConfig) -> (SessionHandle, UnboundedReceiver<SessionEvent>) {
        let (command_sender, command_receiver) = unbounded_channel();
        let (event_sender, event_receiver) = unbounded_channel();
        let sink = Arc::new(Mutex::new(NotificationSink::new()));
        let session = Session::new(config.auto_close_secs, config.clear_on_start, sink.clone());
        let (status_sender, status_receiver) = watch::channel(session.status());

        let mut controller = Self {
            session,
            endpoint: config.endpoint,
            commands: command_receiver,
            events: event_sender,
            status: status_sender,
            write: None,
            read: None,
            ticker: tokio::time::interval(Duration::from_secs(1)),
        };
        tokio::spawn(async move {
            controller.run().await;
        });

        (
            SessionHandle {
                commands: command_sender,
                status: status_receiver,
                sink,
            },
            event_receiver,
        )
    }

    /// Async run loop for the session controller.
    async fn run(&mut self) {
        loop {
            let input = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Start(request)) => Input::Start(request),
                    Some(Command::Stop) => Input::Stop,
                    None => {
                        // Every handle is gone. Release the transport and stop.
                        self.close_transport().await;
                        return;
                    }
                },

                message = next_message(&mut self.read) => match message {
                    Some(Ok(Message::Text(text))) => Input::Frame(text),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => Input::TransportClosed,
                    // Ping/pong and binary frames carry no notifications.
                    Some(Ok(_)) => continue,
                },

                _ = self.ticker.tick(), if self.session.state() == SessionState::Open => Input::Tick,
            };
            self.dispatch(input).await;
        }
    }

    async fn dispatch(&mut self, input: Input) {
        let mut next = Some(input);
        while let Some(input) = next.take() {
            let was_open = self.session.state() == SessionState::Open;
            let effects = self.session.apply(input);
            if !was_open && self.session.state() == SessionState::Open {
                // Arm the countdown: first tick one second from now.
                self.ticker.reset();
            }

            for effect in effects {
                match effect {
                    Effect::Connect => match connect_async(self.endpoint.clone()).await {
                        Ok((socket, _)) => {
                            tracing::info!("websocket transport established");
                            let (write, read) = socket.split();
                            self.write = Some(write);
                            self.read = Some(read);
                            next = Some(Input::TransportOpen);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "websocket connect failed");
                            next = Some(Input::TransportClosed);
                        }
                    },
                    Effect::Send(text) => {
                        tracing::debug!(frame = %text, "sending subscribe request");
                        if let Some(write) = self.write.as_mut() {
                            if let Err(err) = write.send(Message::Text(text)).await {
                                tracing::warn!(error = %err, "websocket send failed");
                                next = Some(Input::TransportClosed);
                            }
                        }
                    }
                    Effect::Close => self.close_transport().await,
                    Effect::Event(event) => {
                        if let Err(_) = self.events.send(event) {
                            // The subscriber hung up; keep running for the
                            // handle's command and sink access.
                        }
                    }
                }
            }

            if let Err(_) = self.status.send(self.session.status()) {
                // No watchers left. Harmless.
            }
        }
    }

    async fn close_transport(&mut self) {
        self.read = None;
        if let Some(mut write) = self.write.take() {
            if let Err(_) = write.close().await {
                // Peer may already be gone; the handle is released either way.
            }
        }
    }
}

async fn next_message(
    read: &mut Option<SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match read {
        Some(read) => read.next().await,
        None => std::future::pending().await,
    }
}

/// Cheap-to-clone handle held by the presentation side. Commands are
/// fire-and-forget; outcomes arrive through the status watch and the event
/// stream returned by [`SessionController::spawn`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    sink: Arc<Mutex<NotificationSink>>,
}

impl SessionHandle {
    /// Opens the session, or re-sends the request on the live socket when
    /// one is already open.
    pub fn start(&self, request: TransactionSubscribeRequest) -> Result<(), Error> {
        self.commands
            .send(Command::Start(request))
            .map_err(|_| Error::SessionDied)
    }

    /// Tears the session down immediately.
    pub fn stop(&self) -> Result<(), Error> {
        self.commands
            .send(Command::Stop)
            .map_err(|_| Error::SessionDied)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch receiver for callers that want to await state changes.
    pub fn status_receiver(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Runs `f` against the sink under its lock. The controller is the only
    /// writer, so readers never observe a half-applied frame.
    pub fn with_notifications<R>(&self, f: impl FnOnce(&NotificationSink) -> R) -> R {
        let sink = self.sink.lock().expect("notification sink lock poisoned");
        f(&sink)
    }

    /// Snapshot of all received frames in arrival order.
    pub fn notifications(&self) -> Vec<Value> {
        self.with_notifications(|sink| sink.iter().cloned().collect())
    }
}
