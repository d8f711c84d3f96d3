//! Client builder and the two session loops.
//!
//! The [`ClientBuilder`] configures the transport, report source and summary
//! format. The [`Client`] coordinates the session:
//! 1. `run_inbound` receives server frames and updates receipts and the ledger
//! 2. `run_commands` reads console lines and issues protocol frames
//!
//! Both loops share one set of tables behind a single lock. The lock is only
//! taken in synchronous sections, never across an `.await`.
//!
//! # Example
//!
//! ```ignore
//! use stomp_client::{console, Client};
//! use tokio::io::BufReader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, notices) = Client::builder().build();
//!
//!     tokio::spawn(console::print_notices(notices));
//!     let inbound = tokio::spawn({
//!         let client = client.clone();
//!         async move { client.run_inbound().await }
//!     });
//!
//!     client.run_commands(BufReader::new(tokio::io::stdin())).await?;
//!     client.stop();
//!     inbound.abort();
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, Notify};

use crate::command::{Command, CommandError};
use crate::console::Notice;
use crate::error::{Result, StompError};
use crate::event::Event;
use crate::ledger::{Ledger, Summary, DEFAULT_DATE_FORMAT};
use crate::protocol::{
    commands, headers, ConnectionState, Frame, ProtocolSession, DEFAULT_MAX_FRAME_SIZE,
    DISCONNECT_RECEIPT_ID,
};
use crate::report::{JsonReportSource, ReportSource};
use crate::transport::{TcpTransport, Transport};

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `strftime` format for event times in summary files.
    pub date_format: String,
    /// Largest inbound frame accepted by the default TCP transport.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Builder for configuring and creating a client.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    report_source: Option<Arc<dyn ReportSource>>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport: None,
            report_source: None,
        }
    }

    /// Use a custom transport instead of TCP.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom source for `report` instead of JSON files.
    pub fn report_source(mut self, source: Arc<dyn ReportSource>) -> Self {
        self.report_source = Some(source);
        self
    }

    /// Set the summary date format.
    ///
    /// Default: `%d/%m/%y %H:%M`
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.config.date_format = format.into();
        self
    }

    /// Set the maximum inbound frame size for the default transport.
    ///
    /// Default: 1 MiB
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Build the client and the receiver for its console notices.
    pub fn build(self) -> (Client, mpsc::UnboundedReceiver<Notice>) {
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(TcpTransport::with_max_frame_size(self.config.max_frame_size))
        });
        let reports = self
            .report_source
            .unwrap_or_else(|| Arc::new(JsonReportSource));
        let (notices, notice_rx) = mpsc::unbounded_channel();

        let shared = Shared {
            session: ProtocolSession::new(transport),
            tables: Mutex::new(Tables::default()),
            notices,
            reports,
            active: AtomicBool::new(true),
            opened: Notify::new(),
            config: self.config,
        };
        (
            Client {
                shared: Arc::new(shared),
            },
            notice_rx,
        )
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by the coordinator and shared by both loops.
#[derive(Default)]
struct Tables {
    /// Channel → live subscription id.
    subscriptions: HashMap<String, u64>,
    /// Receipt id → text shown when the receipt arrives.
    receipts: HashMap<i64, String>,
    next_subscription_id: u64,
    next_receipt_id: i64,
    ledger: Ledger,
    current_user: String,
}

impl Tables {
    fn allocate_subscription(&mut self, channel: &str) -> u64 {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.subscriptions.insert(channel.to_string(), id);
        id
    }

    fn register_receipt(&mut self, text: String) -> i64 {
        let id = self.next_receipt_id;
        self.next_receipt_id += 1;
        self.receipts.insert(id, text);
        id
    }
}

struct Shared {
    session: ProtocolSession,
    tables: Mutex<Tables>,
    notices: mpsc::UnboundedSender<Notice>,
    reports: Arc<dyn ReportSource>,
    /// Cleared by `stop()`; both loops exit at their next iteration.
    active: AtomicBool,
    /// Wakes the inbound loop once a login has opened the transport.
    opened: Notify,
    config: ClientConfig,
}

/// A session coordinator. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.session.state()
    }

    /// Whether CONNECTED has been received for the current session.
    pub fn is_logged_in(&self) -> bool {
        self.shared.session.is_logged_in()
    }

    /// Live subscription id for a channel.
    pub fn subscription_id(&self, channel: &str) -> Option<u64> {
        self.shared.tables.lock().subscriptions.get(channel).copied()
    }

    /// Number of receipts still waiting for the server.
    pub fn pending_receipts(&self) -> usize {
        self.shared.tables.lock().receipts.len()
    }

    /// Snapshot the ledger entry for (channel, user).
    pub fn summary(&self, channel: &str, user: &str) -> Summary {
        self.shared.tables.lock().ledger.summarize(channel, user)
    }

    /// Whether the loops should keep running.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Ask both loops to exit.
    ///
    /// A loop blocked on the network or console exits after its current
    /// receive completes.
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::Release);
        self.shared.opened.notify_one();
    }

    /// Receive and dispatch server frames until stopped.
    ///
    /// While the transport is closed the loop parks until a login opens it.
    pub async fn run_inbound(&self) {
        while self.is_active() {
            if !self.shared.session.is_transport_open() {
                self.shared.opened.notified().await;
                continue;
            }

            match self.shared.session.receive_frame().await {
                Ok(frame) => self.dispatch_frame(frame).await,
                Err(StompError::Parse(e)) => {
                    tracing::warn!("Discarding malformed frame: {}", e);
                }
                Err(e) => {
                    tracing::error!("Connection lost: {}", e);
                    self.teardown().await;
                    self.notify(Notice::ConnectionLost);
                }
            }
        }
        tracing::debug!("Inbound loop stopped");
    }

    /// Read console lines and dispatch them until the input ends or the
    /// client is stopped.
    pub async fn run_commands<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while self.is_active() {
            let Some(line) = lines.next_line().await? else {
                tracing::debug!("Console input closed");
                break;
            };
            self.dispatch_command(&line).await;
        }
        Ok(())
    }

    /// Handle one console line.
    pub async fn dispatch_command(&self, line: &str) {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(CommandError::Empty) => return,
            Err(CommandError::Unknown(name)) => {
                tracing::debug!("Ignoring unknown command {:?}", name);
                return;
            }
            Err(CommandError::Usage(usage)) => {
                let is_login = line.split_whitespace().next() == Some("login");
                if is_login || self.is_logged_in() {
                    self.notify(Notice::Usage(usage));
                }
                return;
            }
        };

        if !matches!(command, Command::Login { .. }) && !self.is_logged_in() {
            tracing::debug!("Ignoring {} while not logged in", command.name());
            return;
        }

        match command {
            Command::Login {
                addr,
                host,
                user,
                passcode,
            } => self.login(&addr, &host, &user, &passcode).await,
            Command::Join { channel } => self.join(&channel).await,
            Command::Exit { channel } => self.exit(&channel).await,
            Command::Report { file } => self.report(&file).await,
            Command::Summary {
                channel,
                user,
                file,
            } => self.write_summary(&channel, &user, &file).await,
            Command::Logout => self.logout().await,
        }
    }

    /// Handle one frame from the server.
    pub async fn dispatch_frame(&self, frame: Frame) {
        match frame.command() {
            commands::CONNECTED => {
                self.shared.session.set_state(ConnectionState::LoggedIn);
                tracing::info!("Logged in");
                self.notify(Notice::LoginSuccessful);
            }
            commands::RECEIPT => self.handle_receipt(&frame).await,
            commands::MESSAGE => self.handle_message(&frame),
            commands::ERROR => {
                let message = frame.header(headers::MESSAGE).unwrap_or_default().to_string();
                tracing::error!("Server error: {}", message);
                self.teardown().await;
                self.notify(Notice::ServerError {
                    message,
                    body: frame.body().to_string(),
                });
            }
            other => tracing::debug!("Ignoring {} frame", other),
        }
    }

    async fn handle_receipt(&self, frame: &Frame) {
        let receipt_id = match parse_receipt_id(frame) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("{}", e);
                self.teardown().await;
                let detail = match e {
                    StompError::MalformedReceipt(detail) => detail,
                    other => other.to_string(),
                };
                self.notify(Notice::MalformedReceipt(detail));
                return;
            }
        };

        if receipt_id == DISCONNECT_RECEIPT_ID {
            tracing::info!("Logged out");
            self.teardown().await;
            return;
        }

        let text = self.shared.tables.lock().receipts.remove(&receipt_id);
        match text {
            Some(text) => self.notify(Notice::Receipt(text)),
            None => tracing::warn!("Receipt {} does not match a pending action", receipt_id),
        }
    }

    fn handle_message(&self, frame: &Frame) {
        let event = match Event::from_message_body(frame.body(), frame.header(headers::DESTINATION))
        {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping message: {}", e);
                return;
            }
        };

        let channel = event.channel().to_string();
        let user = event.owner_user().to_string();
        tracing::debug!(
            "Recording event {:?} from {} on {} (subscription {:?})",
            event.name(),
            user,
            channel,
            frame.header(headers::SUBSCRIPTION)
        );
        self.shared.tables.lock().ledger.insert(&channel, &user, event);
    }

    async fn login(&self, addr: &str, host: &str, user: &str, passcode: &str) {
        // A login while awaiting CONNECTED resends CONNECT over the open transport.
        if self.shared.session.is_logged_in() {
            self.notify(Notice::AlreadyLoggedIn);
            return;
        }

        self.shared.tables.lock().current_user = user.to_string();

        match self.shared.session.connect(addr, host, user, passcode).await {
            Ok(()) => {
                tracing::info!("Sent CONNECT to {} as {}", addr, user);
                self.shared.opened.notify_one();
            }
            Err(StompError::AlreadyLoggedIn) => self.notify(Notice::AlreadyLoggedIn),
            Err(e) => {
                tracing::warn!("Login to {} failed: {}", addr, e);
                self.shared.session.close_transport().await;
                self.notify(Notice::ConnectFailed);
            }
        }
    }

    async fn join(&self, channel: &str) {
        let allocated = {
            let mut tables = self.shared.tables.lock();
            if tables.subscriptions.contains_key(channel) {
                None
            } else {
                let subscription_id = tables.allocate_subscription(channel);
                let receipt_id = tables.register_receipt(format!("Joined channel {}", channel));
                Some((subscription_id, receipt_id))
            }
        };

        let Some((subscription_id, receipt_id)) = allocated else {
            self.notify(Notice::AlreadyJoined(channel.to_string()));
            return;
        };

        if let Err(e) = self
            .shared
            .session
            .subscribe(channel, subscription_id, receipt_id)
            .await
        {
            tracing::warn!("Failed to join {}: {}", channel, e);
            {
                let mut tables = self.shared.tables.lock();
                if tables.subscriptions.get(channel) == Some(&subscription_id) {
                    tables.subscriptions.remove(channel);
                }
                tables.receipts.remove(&receipt_id);
            }
            self.notify(Notice::SendFailed("join"));
        }
    }

    async fn exit(&self, channel: &str) {
        let allocated = {
            let mut tables = self.shared.tables.lock();
            match tables.subscriptions.get(channel).copied() {
                Some(subscription_id) => {
                    let receipt_id = tables.register_receipt(format!("Exited channel {}", channel));
                    Some((subscription_id, receipt_id))
                }
                None => None,
            }
        };

        let Some((subscription_id, receipt_id)) = allocated else {
            tracing::debug!("Not subscribed to {}", channel);
            return;
        };

        let result = self
            .shared
            .session
            .unsubscribe(subscription_id, receipt_id)
            .await;

        let failed = {
            let mut tables = self.shared.tables.lock();
            match result {
                Ok(()) => {
                    if tables.subscriptions.get(channel) == Some(&subscription_id) {
                        tables.subscriptions.remove(channel);
                    }
                    None
                }
                Err(e) => {
                    tables.receipts.remove(&receipt_id);
                    Some(e)
                }
            }
        };

        if let Some(e) = failed {
            tracing::warn!("Failed to exit {}: {}", channel, e);
            self.notify(Notice::SendFailed("exit"));
        }
    }

    async fn report(&self, file: &Path) {
        let batch = match self.shared.reports.load(file).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", file.display(), e);
                self.notify(Notice::ReportFailed {
                    path: file.to_path_buf(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let user = self.shared.tables.lock().current_user.clone();
        let total = batch.events.len();
        for record in batch.events {
            let event = record.into_event(&batch.channel, &user);
            if let Err(e) = self
                .shared
                .session
                .send(&batch.channel, &event.to_report_body())
                .await
            {
                tracing::warn!("Failed to report to {}: {}", batch.channel, e);
                self.notify(Notice::SendFailed("report"));
                return;
            }
        }
        tracing::info!("Reported {} events to {}", total, batch.channel);
    }

    async fn write_summary(&self, channel: &str, user: &str, file: &Path) {
        let summary = self.summary(channel, user);
        let text = summary.render(&self.shared.config.date_format);

        match tokio::fs::write(file, text).await {
            Ok(()) => tracing::info!(
                "Wrote summary of {} events for {} on {} to {}",
                summary.total,
                user,
                channel,
                file.display()
            ),
            Err(e) => {
                tracing::warn!("Failed to write {}: {}", file.display(), e);
                self.notify(Notice::FileError(file.to_path_buf()));
            }
        }
    }

    async fn logout(&self) {
        if let Err(e) = self.shared.session.disconnect().await {
            tracing::warn!("Failed to send DISCONNECT: {}", e);
            self.notify(Notice::SendFailed("logout"));
        }
    }

    /// Drop the session: close the transport and forget subscriptions and
    /// pending receipts. The ledger is kept.
    async fn teardown(&self) {
        self.shared.session.close_transport().await;
        let mut tables = self.shared.tables.lock();
        tables.subscriptions.clear();
        tables.receipts.clear();
    }

    fn notify(&self, notice: Notice) {
        if self.shared.notices.send(notice).is_err() {
            tracing::debug!("Notice dropped, no console attached");
        }
    }
}

/// Read the numeric `receipt-id` header.
fn parse_receipt_id(frame: &Frame) -> Result<i64> {
    let raw = frame
        .header(headers::RECEIPT_ID)
        .ok_or_else(|| StompError::MalformedReceipt("missing receipt-id header".into()))?;
    raw.trim()
        .parse()
        .map_err(|_| StompError::MalformedReceipt(format!("receipt-id {:?} is not a number", raw)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::report::{ReportBatch, ReportRecord};
    use crate::transport::{BoxFuture, MemoryPeer, MemoryTransport};

    struct FixedReports(ReportBatch);

    impl ReportSource for FixedReports {
        fn load<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<ReportBatch>> {
            let batch = self.0.clone();
            Box::pin(async move { Ok(batch) })
        }
    }

    fn setup_with(builder: ClientBuilder) -> (Client, MemoryPeer, mpsc::UnboundedReceiver<Notice>) {
        let (transport, peer) = MemoryTransport::pair();
        let (client, notices) = builder.transport(Arc::new(transport)).build();
        (client, peer, notices)
    }

    fn setup() -> (Client, MemoryPeer, mpsc::UnboundedReceiver<Notice>) {
        setup_with(Client::builder())
    }

    fn frame(command: &str, headers: &[(&str, &str)], body: &str) -> Frame {
        let headers: BTreeMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Frame::build(command, headers, body).unwrap()
    }

    fn message(channel: &str, user: &str, date_time: i64, info: &str) -> Frame {
        let body = format!(
            "user:{}\ncity:Haifa\nevent name:e{}\ndate time:{}\ngeneral information:\n{}description:\nsomething happened",
            user, date_time, date_time, info
        );
        frame(
            commands::MESSAGE,
            &[(headers::DESTINATION, channel), (headers::SUBSCRIPTION, "0")],
            &body,
        )
    }

    async fn logged_in() -> (Client, MemoryPeer, mpsc::UnboundedReceiver<Notice>) {
        let (client, mut peer, mut notices) = setup();
        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        let connect = peer.recv_frame().await.unwrap();
        assert!(connect.is(commands::CONNECT));
        client.dispatch_frame(frame(commands::CONNECTED, &[("version", "1.2")], "")).await;
        assert_eq!(notices.recv().await, Some(Notice::LoginSuccessful));
        (client, peer, notices)
    }

    #[tokio::test]
    async fn test_login_handshake() {
        let (client, mut peer, mut notices) = setup();
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        let connect = peer.recv_frame().await.unwrap();
        assert_eq!(connect.header("host"), Some("127.0.0.1"));
        assert_eq!(connect.header("login"), Some("alice"));
        assert_eq!(client.connection_state(), ConnectionState::AwaitingConnected);

        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        let retry = peer.recv_frame().await.unwrap();
        assert!(retry.is(commands::CONNECT));
        assert_eq!(retry.header("login"), Some("alice"));
        assert_eq!(peer.connect_count(), 1);
        assert!(notices.try_recv().is_err());

        client.dispatch_frame(frame(commands::CONNECTED, &[], "")).await;
        assert_eq!(notices.recv().await, Some(Notice::LoginSuccessful));
        assert!(client.is_logged_in());

        client.dispatch_command("login 127.0.0.1:7777 bob pw").await;
        assert_eq!(notices.recv().await, Some(Notice::AlreadyLoggedIn));
        assert!(peer.try_recv_frame().is_none());
    }

    #[tokio::test]
    async fn test_login_retry_after_silent_server() {
        let (client, mut peer, mut notices) = setup();

        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        assert!(peer.recv_frame().await.unwrap().is(commands::CONNECT));

        client.dispatch_command("logout").await;
        assert!(peer.try_recv_frame().is_none());
        assert_eq!(client.connection_state(), ConnectionState::AwaitingConnected);

        client.dispatch_command("login 127.0.0.1:7777 bob pw2").await;
        let retry = peer.recv_frame().await.unwrap();
        assert!(retry.is(commands::CONNECT));
        assert_eq!(retry.header("login"), Some("bob"));
        assert_eq!(retry.header("passcode"), Some("pw2"));

        client.dispatch_frame(frame(commands::CONNECTED, &[("version", "1.2")], "")).await;
        assert_eq!(notices.recv().await, Some(Notice::LoginSuccessful));
        assert!(client.is_logged_in());

        client.dispatch_command("join sports").await;
        assert!(peer.recv_frame().await.unwrap().is(commands::SUBSCRIBE));
    }

    #[tokio::test]
    async fn test_login_connect_failure() {
        let (client, peer, mut notices) = setup();
        peer.refuse_connections(true);

        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        assert_eq!(notices.recv().await, Some(Notice::ConnectFailed));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_commands_ignored_until_logged_in() {
        let (client, mut peer, mut notices) = setup();

        client.dispatch_command("join sports").await;
        client.dispatch_command("join").await;
        client.dispatch_command("logout").await;
        assert!(peer.try_recv_frame().is_none());
        assert!(notices.try_recv().is_err());
        assert_eq!(client.subscription_id("sports"), None);

        client.dispatch_command("login nowhere alice pw").await;
        assert_eq!(
            notices.recv().await,
            Some(Notice::Usage("login {host:port} {username} {password}"))
        );
    }

    #[tokio::test]
    async fn test_join_and_receipt() {
        let (client, mut peer, mut notices) = logged_in().await;

        client.dispatch_command("join sports").await;
        let subscribe = peer.recv_frame().await.unwrap();
        assert!(subscribe.is(commands::SUBSCRIBE));
        assert_eq!(subscribe.header("destination"), Some("sports"));
        assert_eq!(subscribe.header("id"), Some("0"));
        assert_eq!(subscribe.header("receipt"), Some("0"));
        assert_eq!(client.subscription_id("sports"), Some(0));
        assert_eq!(client.pending_receipts(), 1);

        client
            .dispatch_frame(frame(commands::RECEIPT, &[("receipt-id", "0")], ""))
            .await;
        assert_eq!(
            notices.recv().await,
            Some(Notice::Receipt("Joined channel sports".into()))
        );
        assert_eq!(client.pending_receipts(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_join_sends_nothing() {
        let (client, mut peer, mut notices) = logged_in().await;

        client.dispatch_command("join sports").await;
        peer.recv_frame().await.unwrap();

        client.dispatch_command("join sports").await;
        assert_eq!(notices.recv().await, Some(Notice::AlreadyJoined("sports".into())));
        assert!(peer.try_recv_frame().is_none());
        assert_eq!(client.pending_receipts(), 1);

        client.dispatch_command("join police").await;
        let subscribe = peer.recv_frame().await.unwrap();
        assert_eq!(subscribe.header("id"), Some("1"));
        assert_eq!(subscribe.header("receipt"), Some("1"));
    }

    #[tokio::test]
    async fn test_exit_channel() {
        let (client, mut peer, mut notices) = logged_in().await;

        client.dispatch_command("exit sports").await;
        assert!(peer.try_recv_frame().is_none());

        client.dispatch_command("join sports").await;
        peer.recv_frame().await.unwrap();

        client.dispatch_command("exit sports").await;
        let unsubscribe = peer.recv_frame().await.unwrap();
        assert!(unsubscribe.is(commands::UNSUBSCRIBE));
        assert_eq!(unsubscribe.header("id"), Some("0"));
        assert_eq!(unsubscribe.header("receipt"), Some("1"));
        assert_eq!(client.subscription_id("sports"), None);

        client
            .dispatch_frame(frame(commands::RECEIPT, &[("receipt-id", "1")], ""))
            .await;
        assert_eq!(
            notices.recv().await,
            Some(Notice::Receipt("Exited channel sports".into()))
        );
    }

    #[tokio::test]
    async fn test_unknown_receipt_is_ignored() {
        let (client, _peer, mut notices) = logged_in().await;
        client
            .dispatch_frame(frame(commands::RECEIPT, &[("receipt-id", "42")], ""))
            .await;
        assert!(notices.try_recv().is_err());
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn test_messages_are_ordered_in_ledger() {
        let (client, _peer, _notices) = logged_in().await;

        client.dispatch_frame(message("sports", "bob", 1000, "")).await;
        client
            .dispatch_frame(message("sports", "bob", 500, "\tactive:true\n"))
            .await;
        client.dispatch_frame(message("sports", "carol", 700, "")).await;
        client
            .dispatch_frame(frame(commands::MESSAGE, &[("destination", "sports")], "garbage"))
            .await;

        let summary = client.summary("sports", "bob");
        let times: Vec<i64> = summary.events.iter().map(Event::date_time).collect();
        assert_eq!(times, vec![500, 1000]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.active, 1);
        assert_eq!(summary.forces_arrival, 0);
        assert_eq!(client.summary("sports", "carol").total, 1);
    }

    #[tokio::test]
    async fn test_disconnect_receipt_tears_down_silently() {
        let (client, mut peer, mut notices) = logged_in().await;
        client.dispatch_command("join sports").await;
        peer.recv_frame().await.unwrap();
        client.dispatch_frame(message("sports", "bob", 1, "")).await;

        client.dispatch_command("logout").await;
        let disconnect = peer.recv_frame().await.unwrap();
        assert!(disconnect.is(commands::DISCONNECT));
        assert_eq!(disconnect.header("receipt"), Some("-1"));

        client
            .dispatch_frame(frame(commands::RECEIPT, &[("receipt-id", "-1")], ""))
            .await;
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(peer.close_count(), 1);
        assert!(notices.try_recv().is_err());
        assert_eq!(client.subscription_id("sports"), None);
        assert_eq!(client.pending_receipts(), 0);
        // Received events outlive the session.
        assert_eq!(client.summary("sports", "bob").total, 1);
    }

    #[tokio::test]
    async fn test_malformed_receipt_is_surfaced() {
        let (client, peer, mut notices) = logged_in().await;

        client
            .dispatch_frame(frame(commands::RECEIPT, &[("receipt-id", "abc")], ""))
            .await;
        match notices.recv().await {
            Some(Notice::MalformedReceipt(detail)) => assert!(detail.contains("abc")),
            other => panic!("unexpected notice {:?}", other),
        }
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_receipt_id_is_surfaced() {
        let (client, _peer, mut notices) = logged_in().await;
        client.dispatch_frame(frame(commands::RECEIPT, &[], "")).await;
        assert!(matches!(notices.recv().await, Some(Notice::MalformedReceipt(_))));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_error_frame_tears_down() {
        let (client, mut peer, mut notices) = logged_in().await;
        client.dispatch_command("join sports").await;
        peer.recv_frame().await.unwrap();

        client
            .dispatch_frame(frame(
                commands::ERROR,
                &[("message", "malformed frame received")],
                "no such destination",
            ))
            .await;

        assert_eq!(
            notices.recv().await,
            Some(Notice::ServerError {
                message: "malformed frame received".into(),
                body: "no such destination".into(),
            })
        );
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(client.subscription_id("sports"), None);

        // A fresh login reopens the transport.
        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        assert!(peer.recv_frame().await.unwrap().is(commands::CONNECT));
        assert_eq!(peer.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_other_frames_are_ignored() {
        let (client, _peer, mut notices) = logged_in().await;
        client.dispatch_frame(frame("HEARTBEAT", &[], "")).await;
        assert!(client.is_logged_in());
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_usage_notice_when_logged_in() {
        let (client, mut peer, mut notices) = logged_in().await;
        client.dispatch_command("summary sports").await;
        assert_eq!(
            notices.recv().await,
            Some(Notice::Usage("summary {channel_name} {user} {file}"))
        );
        client.dispatch_command("dance").await;
        assert!(notices.try_recv().is_err());
        assert!(peer.try_recv_frame().is_none());
    }

    #[tokio::test]
    async fn test_report_sends_one_frame_per_event() {
        let mut info = BTreeMap::new();
        info.insert("active".to_string(), "true".to_string());
        let batch = ReportBatch {
            channel: "police".into(),
            events: vec![
                ReportRecord {
                    name: "theft".into(),
                    city: "Springfield".into(),
                    date_time: 2000,
                    description: "car taken".into(),
                    general_information: info,
                },
                ReportRecord {
                    name: "noise".into(),
                    city: "Shelbyville".into(),
                    date_time: 1000,
                    description: String::new(),
                    general_information: BTreeMap::new(),
                },
            ],
        };

        let (transport, mut peer) = MemoryTransport::pair();
        let (client, mut notices) = Client::builder()
            .transport(Arc::new(transport))
            .report_source(Arc::new(FixedReports(batch)))
            .build();
        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        peer.recv_frame().await.unwrap();
        client.dispatch_frame(frame(commands::CONNECTED, &[], "")).await;
        notices.recv().await.unwrap();

        client.dispatch_command("report events.json").await;

        let first = peer.recv_frame().await.unwrap();
        assert!(first.is(commands::SEND));
        assert_eq!(first.header("destination"), Some("police"));
        let event = Event::from_message_body(first.body(), None).unwrap();
        assert_eq!(event.owner_user(), "alice");
        assert_eq!(event.channel(), "police");
        assert_eq!(event.name(), "theft");
        assert!(event.flag("active"));
        assert_eq!(event.description(), "car taken");

        let second = peer.recv_frame().await.unwrap();
        let event = Event::from_message_body(second.body(), None).unwrap();
        assert_eq!(event.date_time(), 1000);
        assert!(peer.try_recv_frame().is_none());
    }

    #[tokio::test]
    async fn test_report_missing_file() {
        let (client, mut peer, mut notices) = logged_in().await;
        client.dispatch_command("report /nonexistent/events.json").await;
        assert!(matches!(notices.recv().await, Some(Notice::ReportFailed { .. })));
        assert!(peer.try_recv_frame().is_none());
    }

    #[tokio::test]
    async fn test_summary_file() {
        let (client, _peer, mut notices) = logged_in().await;
        client
            .dispatch_frame(message("sports", "bob", 1000, "\tforces_arrival_at_scene:true\n"))
            .await;
        client.dispatch_frame(message("sports", "bob", 500, "")).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "stale contents that must disappear").unwrap();

        client
            .dispatch_command(&format!("summary sports bob {}", path.display()))
            .await;
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Channel sports\nStats:\nTotal: 2\nactive: 0\nforces arrival at scene: 1\n"));
        assert!(text.contains("event name: e500\n"));
        assert!(!text.contains("stale"));
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_summary_file_error() {
        let (client, _peer, mut notices) = logged_in().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        client
            .dispatch_command(&format!("summary sports bob {}", path.display()))
            .await;
        assert_eq!(notices.recv().await, Some(Notice::FileError(PathBuf::from(&path))));
    }

    #[tokio::test]
    async fn test_custom_date_format() {
        let (client, _peer, _notices) = setup_with(Client::builder().date_format("%Y"));
        client.dispatch_frame(message("sports", "bob", 500, "")).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        client.write_summary("sports", "bob", &path).await;

        let text = std::fs::read_to_string(&path).unwrap();
        let expected = format!("date time: {}\n", crate::ledger::format_date_time(500, "%Y"));
        assert!(text.contains(&expected));
    }

    #[tokio::test]
    async fn test_inbound_loop_handles_connection_loss() {
        let (client, mut peer, mut notices) = setup();
        let inbound = tokio::spawn({
            let client = client.clone();
            async move { client.run_inbound().await }
        });

        client.dispatch_command("login 127.0.0.1:7777 alice pw").await;
        peer.recv_frame().await.unwrap();
        peer.send_frame(&frame(commands::CONNECTED, &[("version", "1.2")], ""));
        assert_eq!(notices.recv().await, Some(Notice::LoginSuccessful));

        // A malformed frame is skipped without ending the session.
        peer.send_raw(&b"\n\n  \nreceipt-id:0\n\n\0"[..]);
        peer.send_frame(&frame(commands::RECEIPT, &[("receipt-id", "9")], ""));

        drop(peer);
        assert_eq!(notices.recv().await, Some(Notice::ConnectionLost));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        client.stop();
        inbound.await.unwrap();
    }

    #[tokio::test]
    async fn test_command_loop_ends_with_input() {
        let (client, mut peer, _notices) = setup();
        let input = tokio::io::BufReader::new(&b"\nlogin 127.0.0.1:7777 alice pw\njoin sports\n"[..]);

        client.run_commands(input).await.unwrap();

        assert!(peer.recv_frame().await.unwrap().is(commands::CONNECT));
        // CONNECTED never arrived, so the join was ignored.
        assert!(peer.try_recv_frame().is_none());
    }

    #[test]
    fn test_receipt_id_parsing() {
        assert_eq!(parse_receipt_id(&frame(commands::RECEIPT, &[("receipt-id", "7")], "")).unwrap(), 7);
        assert_eq!(
            parse_receipt_id(&frame(commands::RECEIPT, &[("receipt-id", " -1 ")], "")).unwrap(),
            -1
        );
        assert!(matches!(
            parse_receipt_id(&frame(commands::RECEIPT, &[], "")),
            Err(StompError::MalformedReceipt(_))
        ));
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Client::builder().date_format("%H:%M").max_frame_size(4096);
        assert_eq!(builder.config.date_format, "%H:%M");
        assert_eq!(builder.config.max_frame_size, 4096);

        let defaults = ClientBuilder::default();
        assert_eq!(defaults.config.date_format, DEFAULT_DATE_FORMAT);
        assert_eq!(defaults.config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }
}
