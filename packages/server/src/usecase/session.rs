//! Per-connection chat session: the protocol state machine.
//!
//! ```text
//! AwaitingJoin ──#join ok──▶ Active ──#quit / EOF──▶ Terminating
//!      │                                                 ▲
//!      └──────── EOF / malformed / rejected ─────────────┘
//! ```
//!
//! The session reads lines from any stream of decoded lines and writes its
//! replies to the connection's [`PusherChannel`], the same channel the
//! dispatcher uses, so replies and broadcasts reach the peer in one order.

use std::{io, net::SocketAddr, sync::Arc};

use futures_util::{Stream, StreamExt};

use crate::{
    domain::{
        ConnectionId, Nickname, PendingMessage, PusherChannel, RegistryError, UserRegistry,
        protocol::{self, ClientLine, Command},
    },
    infrastructure::MessageQueue,
};

use super::error::JoinRejection;

/// Shared collaborators every session needs.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<dyn UserRegistry>,
    pub queue: MessageQueue,
    pub server_nickname: Arc<str>,
    pub max_nickname_len: usize,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The client sent `#quit`.
    Graceful,
    /// The join phase failed, the client got an explanation.
    Rejected,
    /// The peer vanished, nothing more can be written.
    Abrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub connection: ConnectionId,
    pub nickname: Option<Nickname>,
    pub outcome: SessionOutcome,
}

enum SessionState {
    AwaitingJoin,
    Active(Nickname),
    Terminating(Termination),
}

enum Termination {
    Rejected(JoinRejection),
    Quit(Nickname),
    Closed(Option<Nickname>),
}

/// The outbound pusher task is gone.
struct PeerGone;

/// One client's session, from the join attempt to termination.
pub struct ChatSession<S> {
    context: SessionContext,
    connection: ConnectionId,
    address: SocketAddr,
    lines: S,
    outbound: PusherChannel,
}

impl<S> ChatSession<S>
where
    S: Stream<Item = Result<String, io::Error>> + Unpin + Send,
{
    pub fn new(
        context: SessionContext,
        connection: ConnectionId,
        address: SocketAddr,
        lines: S,
        outbound: PusherChannel,
    ) -> Self {
        Self {
            context,
            connection,
            address,
            lines,
            outbound,
        }
    }

    /// Drive the session to completion.
    pub async fn run(mut self) -> SessionReport {
        let mut state = SessionState::AwaitingJoin;
        loop {
            state = match state {
                SessionState::AwaitingJoin => self.await_join().await,
                SessionState::Active(nickname) => self.active(nickname).await,
                SessionState::Terminating(termination) => return self.terminate(termination).await,
            };
        }
    }

    async fn await_join(&mut self) -> SessionState {
        let Some(line) = self.next_line().await else {
            return SessionState::Terminating(Termination::Closed(None));
        };

        let Some(raw) = protocol::parse_join(&line) else {
            tracing::warn!("Malformed join from {}: {:?}", self.address, line);
            return SessionState::Terminating(Termination::Rejected(JoinRejection::Malformed(
                line,
            )));
        };
        let nickname = match Nickname::parse(raw, self.context.max_nickname_len) {
            Ok(nickname) => nickname,
            Err(e) => {
                tracing::warn!("Invalid nickname {:?} from {}: {}", raw, self.address, e);
                return SessionState::Terminating(Termination::Rejected(e.into()));
            }
        };
        tracing::info!(
            "Join request from {} with nickname '{}'",
            self.address,
            nickname
        );

        if let Err(e) = self
            .context
            .registry
            .join(
                self.connection,
                nickname.clone(),
                self.address,
                self.outbound.clone(),
            )
            .await
        {
            tracing::warn!("Join of '{}' from {} refused: {}", nickname, self.address, e);
            return SessionState::Terminating(Termination::Rejected(e.into()));
        }
        tracing::debug!(
            "'{}' registered, {} member(s) online",
            nickname,
            self.context.registry.count().await
        );

        let welcome = protocol::welcome_text(nickname.as_str());
        if self.reply(&welcome).await.is_err() || self.send_help().await.is_err() {
            return SessionState::Terminating(Termination::Closed(Some(nickname)));
        }
        SessionState::Active(nickname)
    }

    async fn active(&mut self, nickname: Nickname) -> SessionState {
        loop {
            let Some(line) = self.next_line().await else {
                return SessionState::Terminating(Termination::Closed(Some(nickname)));
            };

            let sent = match protocol::parse_line(&line) {
                ClientLine::Empty => continue,
                ClientLine::Command(Command::Quit) => {
                    tracing::info!("Received quit command from '{}'", nickname);
                    return SessionState::Terminating(Termination::Quit(nickname));
                }
                ClientLine::Command(Command::List) => {
                    tracing::info!("Received list command from '{}'", nickname);
                    let members = self.context.registry.list_members().await;
                    self.reply(&protocol::roster_text(&members)).await
                }
                ClientLine::Command(Command::Stats) => {
                    tracing::info!("Received stats command from '{}'", nickname);
                    let text = match self.context.registry.stats(self.connection).await {
                        Ok(stats) => protocol::stats_text(nickname.as_str(), stats),
                        Err(e) => {
                            tracing::error!("Stats for '{}' unavailable: {}", nickname, e);
                            protocol::user_not_found_text(nickname.as_str())
                        }
                    };
                    self.reply(&text).await
                }
                ClientLine::Command(Command::Help) => {
                    tracing::debug!("Sending help to '{}'", nickname);
                    self.send_help().await
                }
                ClientLine::Command(Command::Unknown(command)) => {
                    tracing::debug!("Unknown command {:?} from '{}'", command, nickname);
                    self.reply(&protocol::unknown_command_text()).await
                }
                ClientLine::Chat(text) => {
                    let message = PendingMessage::from_user(&nickname, text);
                    if self.context.queue.enqueue(message).await.is_err() {
                        tracing::error!("Message queue closed, dropping line from '{}'", nickname);
                    }
                    Ok(())
                }
            };

            if sent.is_err() {
                return SessionState::Terminating(Termination::Closed(Some(nickname)));
            }
        }
    }

    async fn terminate(self, termination: Termination) -> SessionReport {
        let (nickname, outcome) = match termination {
            Termination::Rejected(rejection) => {
                let outcome = match self.reply(&rejection.to_string()).await {
                    Ok(()) => SessionOutcome::Rejected,
                    Err(PeerGone) => SessionOutcome::Abrupt,
                };
                (None, outcome)
            }
            Termination::Quit(nickname) => {
                let farewell = match self.context.registry.leave(self.connection).await {
                    Ok(()) => protocol::farewell_text(nickname.as_str()),
                    Err(e @ RegistryError::UserNotFound(_)) => {
                        tracing::error!(
                            "'{}' quit but was not registered, likely a server-side inconsistency: {}",
                            nickname,
                            e
                        );
                        protocol::user_not_found_text(nickname.as_str())
                    }
                    Err(e) => {
                        tracing::error!("Failed to unregister '{}': {}", nickname, e);
                        protocol::farewell_text(nickname.as_str())
                    }
                };
                let outcome = match self.reply(&farewell).await {
                    Ok(()) => SessionOutcome::Graceful,
                    Err(PeerGone) => SessionOutcome::Abrupt,
                };
                (Some(nickname), outcome)
            }
            Termination::Closed(nickname) => {
                if let Some(nickname) = &nickname {
                    tracing::info!("Connection of '{}' closed unexpectedly", nickname);
                    if let Err(e) = self.context.registry.leave(self.connection).await {
                        tracing::error!("Failed to unregister '{}': {}", nickname, e);
                    }
                }
                (nickname, SessionOutcome::Abrupt)
            }
        };

        SessionReport {
            connection: self.connection,
            nickname,
            outcome,
        }
    }

    async fn next_line(&mut self) -> Option<String> {
        match self.lines.next().await {
            Some(Ok(line)) => Some(line),
            Some(Err(e)) => {
                tracing::debug!("Read error on connection {}: {}", self.connection, e);
                None
            }
            None => None,
        }
    }

    async fn reply(&self, text: &str) -> Result<(), PeerGone> {
        let line = protocol::format_line(&self.context.server_nickname, text);
        self.outbound.send(line).await.map_err(|_| PeerGone)
    }

    async fn send_help(&self) -> Result<(), PeerGone> {
        for line in protocol::help_lines() {
            self.reply(&line).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        domain::MockUserRegistry,
        infrastructure::{InMemoryUserRegistry, QueueConsumer},
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - join フェーズ（正常、形式エラー、ニックネーム重複、満員、切断）
    // - active フェーズの各コマンドとチャット行の扱い
    // - 終了処理（#quit での挨拶、切断時は挨拶なし、leave の呼び出し）
    //
    // 【どのようなシナリオをテストするか】
    // - 実際の InMemoryUserRegistry を使ったシナリオ
    // - MockUserRegistry を使った「leave で UserNotFound」の異常系
    // ========================================

    const SERVER: &str = "SERVER";

    struct Harness {
        registry: Arc<InMemoryUserRegistry>,
        queue: MessageQueue,
        consumer: QueueConsumer,
    }

    impl Harness {
        fn new(capacity: usize) -> Self {
            let (queue, consumer) = MessageQueue::bounded(64);
            let registry = Arc::new(InMemoryUserRegistry::new(capacity, SERVER, queue.clone()));
            Self {
                registry,
                queue,
                consumer,
            }
        }

        fn context(&self) -> SessionContext {
            SessionContext {
                registry: self.registry.clone(),
                queue: self.queue.clone(),
                server_nickname: Arc::from(SERVER),
                max_nickname_len: 16,
            }
        }

        fn drain_queue(&mut self) -> Vec<PendingMessage> {
            std::iter::from_fn(|| self.consumer.try_dequeue()).collect()
        }
    }

    async fn run_session(
        context: SessionContext,
        connection: u64,
        lines: &[&str],
    ) -> (SessionReport, Vec<String>) {
        let input: Vec<io::Result<String>> = lines.iter().map(|l| Ok(l.to_string())).collect();
        let (tx, mut rx) = mpsc::channel(128);
        let session = ChatSession::new(
            context,
            ConnectionId::new(connection),
            SocketAddr::from(([127, 0, 0, 1], 40000 + connection as u16)),
            stream::iter(input),
            tx,
        );

        let report = session.run().await;
        let mut output = Vec::new();
        while let Ok(line) = rx.try_recv() {
            output.push(line);
        }
        (report, output)
    }

    fn server_line(text: &str) -> String {
        protocol::format_line(SERVER, text)
    }

    #[tokio::test]
    async fn test_join_then_quit_is_graceful() {
        // テスト項目: join → #quit で歓迎・ヘルプ・お別れの挨拶が送られ、登録が解除される
        // given (前提条件):
        let mut harness = Harness::new(4);

        // when (操作):
        let (report, output) = run_session(harness.context(), 1, &["#join alice", "#quit"]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Graceful);
        assert_eq!(report.nickname.unwrap().as_str(), "alice");
        assert_eq!(output[0], server_line(&protocol::welcome_text("alice")));
        let help: Vec<String> = protocol::help_lines().iter().map(|l| server_line(l)).collect();
        assert_eq!(&output[1..1 + help.len()], &help[..]);
        assert_eq!(
            output.last().unwrap(),
            &server_line(&protocol::farewell_text("alice"))
        );
        assert_eq!(harness.registry.count().await, 0);

        let announcements: Vec<String> =
            harness.drain_queue().into_iter().map(|m| m.text).collect();
        assert_eq!(
            announcements,
            vec![protocol::joined_text("alice"), protocol::left_text("alice")]
        );
    }

    #[tokio::test]
    async fn test_malformed_join_is_rejected() {
        // テスト項目: 最初の行が join でない場合はエラーを返して終了し、登録されない
        // given (前提条件):
        let mut harness = Harness::new(4);

        // when (操作):
        let (report, output) = run_session(harness.context(), 1, &["hello", "#join alice"]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Rejected);
        assert_eq!(report.nickname, None);
        assert_eq!(
            output,
            vec![server_line("Join failed, received message: hello")]
        );
        assert_eq!(harness.registry.count().await, 0);
        assert!(harness.drain_queue().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_nickname_is_rejected() {
        // テスト項目: 長すぎるニックネームは join フェーズで拒否される
        // given (前提条件):
        let harness = Harness::new(4);

        // when (操作):
        let (report, output) =
            run_session(harness.context(), 1, &["#join a_very_long_nickname_indeed"]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Rejected);
        assert_eq!(
            output,
            vec![server_line(
                "Join failed, invalid nickname: nickname is longer than 16 characters"
            )]
        );
    }

    #[tokio::test]
    async fn test_closed_before_join_sends_nothing() {
        // テスト項目: join 前に切断された場合は何も送らずに終了する
        // given (前提条件):
        let harness = Harness::new(4);

        // when (操作):
        let (report, output) = run_session(harness.context(), 1, &[]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Abrupt);
        assert!(output.is_empty());
        assert_eq!(harness.registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_nickname_is_rejected() {
        // テスト項目: 使用中のニックネームで join すると拒否され、登録されない
        // given (前提条件):
        let harness = Harness::new(4);
        let (tx, _rx) = mpsc::channel(8);
        harness
            .registry
            .join(
                ConnectionId::new(1),
                Nickname::parse("alice", 16).unwrap(),
                "127.0.0.1:1".parse().unwrap(),
                tx,
            )
            .await
            .unwrap();

        // when (操作):
        let (report, output) = run_session(harness.context(), 2, &["#join alice"]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Rejected);
        assert_eq!(
            output,
            vec![server_line("Join failed, nickname not available")]
        );
        assert_eq!(harness.registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_full_registry_rejects_join() {
        // テスト項目: 満員の場合は too many users で拒否される
        // given (前提条件):
        let harness = Harness::new(1);
        let (tx, _rx) = mpsc::channel(8);
        harness
            .registry
            .join(
                ConnectionId::new(1),
                Nickname::parse("bob", 16).unwrap(),
                "127.0.0.1:1".parse().unwrap(),
                tx,
            )
            .await
            .unwrap();

        // when (操作):
        let (report, output) = run_session(harness.context(), 2, &["#join extra"]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Rejected);
        assert_eq!(
            output,
            vec![server_line("Join failed, too many users connected (1)")]
        );
        assert_eq!(harness.registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_active_commands_and_chat() {
        // テスト項目: active フェーズでのコマンド応答とチャット行のキュー投入
        // given (前提条件):
        let mut harness = Harness::new(4);
        let lines = [
            "#join alice",
            "",
            "hello there",
            "#list",
            "#stats",
            "#dance",
            "#quit",
        ];

        // when (操作):
        let (report, output) = run_session(harness.context(), 3, &lines).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Graceful);
        let help_len = protocol::help_lines().len();
        let replies = &output[1 + help_len..];
        assert_eq!(
            replies,
            &[
                server_line("Connected users (1): alice (127.0.0.1:40003)"),
                server_line("Statistics for alice: sent=0,received=0"),
                server_line(&protocol::unknown_command_text()),
                server_line(&protocol::farewell_text("alice")),
            ]
        );

        let queued = harness.drain_queue();
        assert_eq!(queued.len(), 3);
        assert_eq!(
            queued[1],
            PendingMessage::from_user(&Nickname::parse("alice", 16).unwrap(), "hello there")
        );
    }

    #[tokio::test]
    async fn test_help_command_resends_help() {
        // テスト項目: #help でヘルプが再送される
        // given (前提条件):
        let harness = Harness::new(4);

        // when (操作):
        let (_report, output) =
            run_session(harness.context(), 1, &["#join alice", "#help", "#quit"]).await;

        // then (期待する結果): 歓迎 + ヘルプ 2 回 + お別れ
        let help_len = protocol::help_lines().len();
        assert_eq!(output.len(), 1 + help_len * 2 + 1);
        assert_eq!(output[1], output[1 + help_len]);
    }

    #[tokio::test]
    async fn test_abrupt_close_after_join_leaves_without_farewell() {
        // テスト項目: join 後に突然切断された場合、お別れは送らず leave だけ行う
        // given (前提条件):
        let mut harness = Harness::new(4);

        // when (操作):
        let (report, output) = run_session(harness.context(), 1, &["#join alice", "hi"]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Abrupt);
        assert!(!output.iter().any(|l| l.contains("thanks")));
        assert_eq!(harness.registry.count().await, 0);
        let texts: Vec<String> = harness.drain_queue().into_iter().map(|m| m.text).collect();
        assert_eq!(texts.last().unwrap(), &protocol::left_text("alice"));
    }

    #[tokio::test]
    async fn test_read_error_is_treated_as_abrupt() {
        // テスト項目: 読み込みエラーは突然の切断として扱われる
        // given (前提条件):
        let harness = Harness::new(4);
        let input: Vec<io::Result<String>> = vec![
            Ok("#join alice".to_string()),
            Err(io::Error::from(io::ErrorKind::ConnectionReset)),
            Ok("#quit".to_string()),
        ];
        let (tx, _rx) = mpsc::channel(128);
        let session = ChatSession::new(
            harness.context(),
            ConnectionId::new(1),
            "127.0.0.1:2".parse().unwrap(),
            stream::iter(input),
            tx,
        );

        // when (操作):
        let report = session.run().await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Abrupt);
        assert_eq!(harness.registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_peer_gone_during_replies_ends_session() {
        // テスト項目: 送信側が閉じている場合は突然の切断として終了し、登録は解除される
        // given (前提条件):
        let harness = Harness::new(4);
        let input: Vec<io::Result<String>> =
            vec![Ok("#join alice".to_string()), Ok("#list".to_string())];
        let (tx, rx) = mpsc::channel(128);
        drop(rx);
        let session = ChatSession::new(
            harness.context(),
            ConnectionId::new(1),
            "127.0.0.1:2".parse().unwrap(),
            stream::iter(input),
            tx,
        );

        // when (操作):
        let report = session.run().await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Abrupt);
        assert_eq!(harness.registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_quit_with_missing_user_reports_not_found() {
        // テスト項目: #quit 時に leave が UserNotFound を返した場合、その旨を挨拶として送る
        // given (前提条件):
        let mut registry = MockUserRegistry::new();
        registry.expect_join().times(1).returning(|_, _, _, _| Ok(()));
        registry.expect_count().returning(|| 1);
        registry
            .expect_leave()
            .times(1)
            .returning(|connection| Err(RegistryError::UserNotFound(connection)));
        let (queue, _consumer) = MessageQueue::bounded(4);
        let context = SessionContext {
            registry: Arc::new(registry),
            queue,
            server_nickname: Arc::from(SERVER),
            max_nickname_len: 16,
        };

        // when (操作):
        let (report, output) = run_session(context, 1, &["#join alice", "#quit"]).await;

        // then (期待する結果):
        assert_eq!(report.outcome, SessionOutcome::Graceful);
        assert_eq!(
            output.last().unwrap(),
            &server_line(&protocol::user_not_found_text("alice"))
        );
    }
}
