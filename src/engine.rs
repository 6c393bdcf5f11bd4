//! Form engine
//!
//! Drives sessions through the state machine: looks up or creates the
//! session, arms its inactivity deadline, runs the pure transition and
//! executes the resulting effects (replies, persistence, dispatch).

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::{Transport, TransportError};

use crate::dispatch::SubmissionDispatcher;
use crate::persistence::Persistence;
use crate::session::{ChatId, Expiry, SessionGuard, SessionStore};
use crate::state_machine::{render, transition, Effect, Event, Progress, TransitionResult};
use crate::submission::SubmissionEvent;
use crate::template::{FormTemplate, MessageKey};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

const EXPIRY_QUEUE: usize = 256;

/// Live view of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub chat_id: ChatId,
    #[serde(flatten)]
    pub progress: Progress,
}

struct Inner<T> {
    template: Arc<FormTemplate>,
    sessions: SessionStore,
    transport: T,
    persistence: Persistence,
    dispatcher: Option<Arc<SubmissionDispatcher>>,
    session_timeout: Duration,
}

/// Cheap to clone; all clones share the same sessions
pub struct FormEngine<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for FormEngine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> FormEngine<T> {
    /// Build the engine and start the task that reaps expired sessions
    pub fn new(
        template: Arc<FormTemplate>,
        transport: T,
        persistence: Persistence,
        dispatcher: Option<Arc<SubmissionDispatcher>>,
        session_timeout: Duration,
    ) -> Self {
        let (sessions, expiry_rx) = SessionStore::new(EXPIRY_QUEUE);
        let inner = Arc::new(Inner {
            template,
            sessions,
            transport,
            persistence,
            dispatcher,
            session_timeout,
        });
        spawn_reaper(Arc::downgrade(&inner), expiry_rx);
        Self { inner }
    }

    pub fn template(&self) -> &Arc<FormTemplate> {
        &self.inner.template
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Apply one inbound event to the chat's session.
    ///
    /// Returns an error only when a reply could not be delivered; the
    /// session has then been cleared.
    pub async fn handle(&self, chat_id: &ChatId, event: Event) -> Result<(), TransportError> {
        let inner = &self.inner;
        let mut session = inner.sessions.get_or_create(chat_id).await;
        inner
            .sessions
            .reset_deadline(&mut session, inner.session_timeout);

        let result = match transition(session.progress(), &inner.template, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Event not applicable");
                let reply = render::message(&inner.template, MessageKey::InvalidAction);
                return match inner.transport.send(chat_id, reply).await {
                    Ok(()) => Ok(()),
                    Err(e) => Err(inner.abandon(&mut session, e).await),
                };
            }
        };

        let TransitionResult { next, effects } = result;
        let finished = next.is_none();
        if let Some(progress) = next {
            session.set_progress(progress);
        }

        for effect in effects {
            match effect {
                Effect::Reply(outbound) => {
                    if let Err(e) = inner.transport.send(chat_id, outbound).await {
                        return Err(inner.abandon(&mut session, e).await);
                    }
                }
                Effect::Finalize(submission) => inner.finalize(chat_id, submission).await,
                Effect::Diagnostic { field, reason } => {
                    tracing::info!(chat_id = %chat_id, field = %field, reason = %reason, "Input rejected");
                }
            }
        }

        if finished {
            inner.sessions.clear_locked(&mut session);
            tracing::debug!(chat_id = %chat_id, "Session finished");
        }
        Ok(())
    }

    /// Current progress of a live session
    pub async fn snapshot(&self, chat_id: &ChatId) -> Option<SessionSnapshot> {
        let session = self.inner.sessions.get_existing(chat_id).await?;
        Some(SessionSnapshot {
            chat_id: chat_id.clone(),
            progress: session.progress().clone(),
        })
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }
}

fn spawn_reaper<T: Transport + 'static>(inner: Weak<Inner<T>>, mut expiry_rx: mpsc::Receiver<Expiry>) {
    tokio::spawn(async move {
        while let Some(expiry) = expiry_rx.recv().await {
            let Some(engine) = inner.upgrade() else {
                break;
            };
            tokio::spawn(async move { engine.expire(expiry).await });
        }
        tracing::debug!("Session reaper stopped");
    });
}

impl<T: Transport> Inner<T> {
    /// End a session whose deadline passed, unless it was re-armed since
    async fn expire(&self, expiry: Expiry) {
        let Some(mut session) = self.sessions.get_existing(&expiry.chat_id).await else {
            return;
        };
        if session.deadline_epoch() != Some(expiry.epoch) {
            tracing::debug!(chat_id = %expiry.chat_id, epoch = expiry.epoch, "Ignoring stale expiry");
            return;
        }

        self.sessions.clear_locked(&mut session);
        tracing::info!(chat_id = %expiry.chat_id, "Session expired");

        let reply = render::message(&self.template, MessageKey::SessionEnded);
        if let Err(e) = self.transport.send(&expiry.chat_id, reply).await {
            tracing::warn!(chat_id = %expiry.chat_id, error = %e, "Failed to send session end");
        }
    }

    /// Persist, then queue for delivery. Failures are logged only.
    async fn finalize(&self, chat_id: &ChatId, submission: SubmissionEvent) {
        if self.persistence.is_enabled() {
            if let Err(e) = self
                .persistence
                .insert(Arc::clone(&self.template), submission.clone())
                .await
            {
                tracing::error!(
                    chat_id = %chat_id,
                    form = %submission.form_name,
                    error = %e,
                    "Failed to persist submission"
                );
            }
        }

        if let Some(dispatcher) = &self.dispatcher {
            if let Err(e) = dispatcher.enqueue(submission).await {
                tracing::error!(chat_id = %chat_id, error = %e, "Failed to queue submission");
            }
        }
    }

    /// Clear a session after a failed send so the user is not stranded
    async fn abandon(&self, session: &mut SessionGuard, error: TransportError) -> TransportError {
        tracing::error!(chat_id = %session.chat_id(), error = %error, "Send failed, clearing session");
        let notice = render::message(&self.template, MessageKey::SendFailed);
        if let Err(e) = self.transport.send(session.chat_id(), notice).await {
            tracing::debug!(
                chat_id = %session.chat_id(),
                error = %e,
                "Failed to send failure notice"
            );
        }
        self.sessions.clear_locked(session);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MockAdaptor, RecordingNotifier, RecordingTransport};
    use super::*;
    use crate::config::QueueFullPolicy;
    use crate::dispatch::DispatcherConfig;
    use crate::state_machine::{Command, FormState};
    use crate::template::{FieldKind, FieldSpec, Rules};

    struct Harness {
        engine: FormEngine<Arc<RecordingTransport>>,
        transport: Arc<RecordingTransport>,
        notifier: Arc<RecordingNotifier>,
        adaptor: Arc<MockAdaptor>,
        dispatcher: Arc<SubmissionDispatcher>,
    }

    fn harness(template: FormTemplate, timeout: Duration) -> Harness {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let adaptor = Arc::new(MockAdaptor::default());
        let dispatcher = Arc::new(SubmissionDispatcher::start(
            DispatcherConfig {
                workers: 2,
                queue_size: 16,
                on_full: QueueFullPolicy::Block,
            },
            notifier.clone(),
        ));
        let engine = FormEngine::new(
            Arc::new(template),
            transport.clone(),
            Persistence::with_adaptor(adaptor.clone(), Duration::from_secs(5)),
            Some(dispatcher.clone()),
            timeout,
        );
        Harness {
            engine,
            transport,
            notifier,
            adaptor,
            dispatcher,
        }
    }

    fn nickname_form() -> FormTemplate {
        FormTemplate::new(
            "Nick",
            "nicks",
            vec![FieldSpec::new("nick", FieldKind::Text).required().with_rules(Rules {
                min_length: 3,
                ..Rules::default()
            })],
        )
        .unwrap()
    }

    fn text(s: &str) -> Event {
        Event::Text(s.to_string())
    }

    fn default_text(key: MessageKey) -> String {
        key.default_text().to_string()
    }

    #[tokio::test]
    async fn rejected_then_accepted_submits_exactly_once() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let chat = ChatId::from("42");

        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        h.engine.handle(&chat, text("ab")).await.unwrap();
        let snapshot = h.engine.snapshot(&chat).await.unwrap();
        assert_eq!(snapshot.progress.state, FormState::Collecting { step: 0 });

        h.engine.handle(&chat, text("abc")).await.unwrap();
        assert!(h.engine.snapshot(&chat).await.is_none());
        h.dispatcher.shutdown().await;

        let delivered = h.notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].value("nick"), Some("abc"));
        assert_eq!(h.adaptor.inserted(), delivered);

        let bodies = h.transport.bodies(&chat);
        assert!(bodies[1].contains("too short"));
        assert_eq!(bodies.last(), Some(&default_text(MessageKey::Submit)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sessions_keep_their_own_answers() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let tasks = (0..50).map(|n| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                let chat = ChatId::new(format!("chat-{n}"));
                engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
                engine.handle(&chat, text(&format!("user-{n}"))).await.unwrap();
            })
        });
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }
        h.dispatcher.shutdown().await;

        let mut delivered: Vec<String> = h
            .notifier
            .delivered()
            .iter()
            .filter_map(|e| e.value("nick").map(str::to_string))
            .collect();
        delivered.sort();
        let mut expected: Vec<String> = (0..50).map(|n| format!("user-{n}")).collect();
        expected.sort();
        assert_eq!(delivered, expected);
        assert_eq!(h.adaptor.inserted().len(), 50);
        assert_eq!(h.engine.active_sessions(), 0);
    }

    #[tokio::test]
    async fn review_modification_reaches_the_submission() {
        let template = FormTemplate::new(
            "Pick",
            "picks",
            vec![
                FieldSpec::new("name", FieldKind::Text).required(),
                FieldSpec::new("color", FieldKind::Select).with_options(["red", "green"]),
            ],
        )
        .unwrap()
        .with_review(true);
        let h = harness(template, Duration::from_secs(60));
        let chat = ChatId::from("7");

        for event in [
            Event::Command(Command::Start),
            text("Ada"),
            text("red"),
            Event::Callback("modify_color".into()),
            text("green"),
            Event::Callback("submit".into()),
        ] {
            h.engine.handle(&chat, event).await.unwrap();
        }
        h.dispatcher.shutdown().await;

        let delivered = h.notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].value("color"), Some("green"));
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_clears_the_session() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let chat = ChatId::from("sleepy");

        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        h.engine.handle(&chat, text("ab")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        let ended = default_text(MessageKey::SessionEnded);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !h.transport.bodies(&chat).contains(&ended) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session end notice");
        assert!(h.engine.snapshot(&chat).await.is_none());

        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        let snapshot = h.engine.snapshot(&chat).await.unwrap();
        assert_eq!(snapshot.progress, Progress::default());
        assert!(h.notifier.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_the_session_alive() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let chat = ChatId::from("busy");
        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_secs(40)).await;
            h.engine.handle(&chat, Event::Command(Command::Help)).await.unwrap();
        }
        assert!(h.engine.snapshot(&chat).await.is_some());
        assert!(!h
            .transport
            .bodies(&chat)
            .contains(&default_text(MessageKey::SessionEnded)));
    }

    #[tokio::test]
    async fn stale_expiry_is_ignored() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let chat = ChatId::from("a");
        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        let epoch = {
            let session = h.engine.inner.sessions.get_existing(&chat).await.unwrap();
            session.deadline_epoch().unwrap()
        };

        h.engine
            .inner
            .expire(Expiry {
                chat_id: chat.clone(),
                epoch: epoch + 1000,
            })
            .await;
        assert!(h.engine.snapshot(&chat).await.is_some());

        h.engine
            .inner
            .expire(Expiry {
                chat_id: chat.clone(),
                epoch,
            })
            .await;
        assert!(h.engine.snapshot(&chat).await.is_none());
    }

    #[tokio::test]
    async fn send_failure_clears_the_session() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let chat = ChatId::from("gone");
        h.transport.fail_for(&chat);
        let err = h
            .engine
            .handle(&chat, Event::Command(Command::Start))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
        assert!(h.engine.snapshot(&chat).await.is_none());
        // The failure notice could not be delivered either
        assert!(h.transport.bodies(&chat).is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_does_not_block_submission() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        h.adaptor.set_failing(true);
        let chat = ChatId::from("p");
        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        h.engine.handle(&chat, text("abcd")).await.unwrap();
        h.dispatcher.shutdown().await;

        assert!(h.adaptor.inserted().is_empty());
        assert_eq!(h.notifier.delivered().len(), 1);
        assert_eq!(
            h.transport.bodies(&chat).last(),
            Some(&default_text(MessageKey::Submit))
        );
    }

    #[tokio::test]
    async fn invalid_action_keeps_state() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let chat = ChatId::from("x");
        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        h.engine
            .handle(&chat, Event::Callback("submit".into()))
            .await
            .unwrap();
        assert_eq!(
            h.transport.bodies(&chat).last(),
            Some(&default_text(MessageKey::InvalidAction))
        );
        let snapshot = h.engine.snapshot(&chat).await.unwrap();
        assert_eq!(snapshot.progress.state, FormState::Collecting { step: 0 });
    }

    #[tokio::test]
    async fn end_command_clears_without_submitting() {
        let h = harness(nickname_form(), Duration::from_secs(60));
        let chat = ChatId::from("bye");
        h.engine.handle(&chat, Event::Command(Command::Start)).await.unwrap();
        h.engine.handle(&chat, Event::Command(Command::End)).await.unwrap();
        h.engine.handle(&chat, Event::Command(Command::End)).await.unwrap();
        h.dispatcher.shutdown().await;
        assert!(h.notifier.delivered().is_empty());
        assert_eq!(h.engine.active_sessions(), 0);
    }
}
