use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::progress::TherapeuticProgress;
use super::prompt::{self, PromptSpec};
use super::session::{Codeword, ConversationTheme, Message, NegotiationMode, NegotiationSession, Sender};
use crate::access::AccessController;
use crate::completion::{complete_with_retry, CompletionError, CompletionService, RetryPolicy};
use crate::error::{CoreError, Result, ValidationError};
use crate::personality::Personality;

const ACCESS_CONTROL_FRAMING: &str = "Strict mode is active. Explain to the Jailkeeper why you \
    need to change your schemas right now.";
const ACCESS_GRANTED_NOTICE: &str = "Access granted. Schema changes are unlocked for";

#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationOutcome {
    /// The assistant answered without granting access.
    Reply(String),
    /// The answer carried the codeword and the gate was unlocked.
    Granted { reply: String, duration: Duration },
    /// The session moved on while the completion was in flight.
    Discarded,
}

/// Observable negotiation state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegotiationState {
    pub session_id: Uuid,
    pub epoch: u64,
    pub mode: NegotiationMode,
    pub in_access_control_mode: bool,
    pub personality: Personality,
    pub theme: Option<ConversationTheme>,
    pub unauthorized: bool,
}

/// Identity of the session a completion was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    session_id: Uuid,
    epoch: u64,
    in_access_control_mode: bool,
}

impl Ticket {
    fn of(session: &NegotiationSession) -> Self {
        Self {
            session_id: session.id,
            epoch: session.epoch,
            in_access_control_mode: session.in_access_control_mode,
        }
    }
}

pub struct Negotiator {
    session: Mutex<NegotiationSession>,
    completion: Arc<dyn CompletionService>,
    gate: AccessController,
    retry: RetryPolicy,
}

impl Negotiator {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        gate: AccessController,
        personality: Personality,
        codeword: Codeword,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            session: Mutex::new(NegotiationSession::new(personality, codeword)),
            completion,
            gate,
            retry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, NegotiationSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> NegotiationState {
        let session = self.lock();
        NegotiationState {
            session_id: session.id,
            epoch: session.epoch,
            mode: session.mode,
            in_access_control_mode: session.in_access_control_mode,
            personality: session.personality,
            theme: session.theme,
            unauthorized: session.unauthorized,
        }
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.lock().transcript.clone()
    }

    pub fn progress(&self) -> TherapeuticProgress {
        self.lock().progress.clone()
    }

    // ── Mode transitions ─────────────────────────────────────────────

    /// Start negotiating for access: authority persona, codeword armed.
    pub fn enter_access_control_mode(&self) {
        let mut session = self.lock();
        session.transition(NegotiationMode::Authority, true);
        session.push(ACCESS_CONTROL_FRAMING, Sender::System);
        info!(epoch = session.epoch, "entered access control mode");
    }

    /// Leave access control mode. An authority conversation falls back to guide.
    pub fn exit_access_control_mode(&self) {
        let mut session = self.lock();
        let mode = match session.mode {
            NegotiationMode::Authority => NegotiationMode::Guide,
            other => other,
        };
        session.transition(mode, false);
        debug!(epoch = session.epoch, "left access control mode");
    }

    /// Switch to the authority persona without arming the codeword.
    pub fn switch_to_authority_mode(&self) {
        let mut session = self.lock();
        let in_acm = session.in_access_control_mode;
        session.transition(NegotiationMode::Authority, in_acm);
    }

    pub fn reset_session(&self) {
        let mut session = self.lock();
        session.restart();
        debug!(session_id = %session.id, "negotiation session reset");
    }

    pub fn set_personality(&self, personality: Personality) {
        self.lock().personality = personality;
    }

    pub fn set_theme(&self, theme: Option<ConversationTheme>) {
        self.lock().theme = theme;
    }

    // ── Coaching progress ────────────────────────────────────────────

    pub fn add_goal(&self, goal: &str) -> bool {
        self.lock().progress.add_goal(goal)
    }

    pub fn complete_goal(&self, goal: &str) -> bool {
        let completed = self.lock().progress.complete_goal(goal);
        if completed {
            info!("goal completed");
        }
        completed
    }

    pub fn add_insight(&self, insight: &str) -> bool {
        self.lock().progress.add_insight(insight)
    }

    pub fn add_trigger_pattern(&self, trigger: &str) -> bool {
        self.lock().progress.add_trigger_pattern(trigger)
    }

    pub fn add_coping_strategy(&self, strategy: &str) -> bool {
        self.lock().progress.add_coping_strategy(strategy)
    }

    // ── Conversation ─────────────────────────────────────────────────

    /// Send a user statement and act on the reply.
    ///
    /// In access control mode a reply containing the codeword unlocks the
    /// gate for the personality's grant duration and returns the
    /// conversation to guide mode. The gate is unlocked before the reply is
    /// recorded: if the grant fails, the transcript ends at the user
    /// statement and the session stays in access control mode.
    pub async fn submit_user_statement(&self, text: &str) -> Result<NegotiationOutcome> {
        let statement = text.trim();
        if statement.is_empty() {
            return Err(ValidationError::EmptyStatement.into());
        }

        let (ticket, spec) = self.prepare(|session| {
            let spec = build_prompt(session, statement);
            session.push(statement, Sender::User);
            spec
        })?;

        self.exchange(ticket, spec, |session, reply| {
            if !(ticket.in_access_control_mode && session.codeword.appears_in(&reply)) {
                session.push(reply.clone(), Sender::Assistant);
                return Ok(NegotiationOutcome::Reply(reply));
            }

            let duration = session.personality.grant_duration();
            self.gate.grant_temporary_access(duration)?;
            session.push(reply.clone(), Sender::Assistant);
            session.transition(NegotiationMode::Guide, false);
            session.push(
                format!(
                    "{ACCESS_GRANTED_NOTICE} {} minutes.",
                    duration.as_secs() / 60
                ),
                Sender::System,
            );
            info!(
                personality = %session.personality,
                duration_secs = duration.as_secs(),
                "negotiation granted temporary access"
            );
            Ok(NegotiationOutcome::Granted { reply, duration })
        })
        .await
    }

    /// Ask the guide to open a daily check-in and count it toward the
    /// engagement streak.
    pub async fn daily_checkin(&self) -> Result<NegotiationOutcome> {
        let (ticket, spec) = self.prepare(|session| {
            session.theme = Some(ConversationTheme::DailyCheckin);
            prompt::daily_checkin(&session.personality.tone(), &session.progress)
        })?;

        self.exchange(ticket, spec, |session, reply| {
            session.push(reply.clone(), Sender::Assistant);
            session.progress.record_checkin(Utc::now());
            debug!(streak = session.progress.engagement_streak, "daily check-in recorded");
            Ok(NegotiationOutcome::Reply(reply))
        })
        .await
    }

    /// Ask the guide for a weekly review. `usage` is free-form figures such
    /// as screen time per category and may be empty.
    pub async fn weekly_review(&self, usage: &BTreeMap<String, String>) -> Result<NegotiationOutcome> {
        let (ticket, spec) = self.prepare(|session| {
            session.theme = Some(ConversationTheme::WeeklyReview);
            prompt::weekly_review(&session.personality.tone(), &session.progress, usage)
        })?;

        self.exchange(ticket, spec, |session, reply| {
            session.push(reply.clone(), Sender::Assistant);
            session.progress.record_weekly_review(Utc::now());
            Ok(NegotiationOutcome::Reply(reply))
        })
        .await
    }

    fn prepare(
        &self,
        build: impl FnOnce(&mut NegotiationSession) -> PromptSpec,
    ) -> Result<(Ticket, PromptSpec)> {
        let mut session = self.lock();
        if session.unauthorized {
            return Err(CompletionError::Unauthorized.into());
        }
        let spec = build(&mut session);
        Ok((Ticket::of(&session), spec))
    }

    /// Run one completion and hand the reply to `on_reply` under the session
    /// lock, unless the session moved on in the meantime.
    async fn exchange(
        &self,
        ticket: Ticket,
        spec: PromptSpec,
        on_reply: impl FnOnce(&mut NegotiationSession, String) -> Result<NegotiationOutcome>,
    ) -> Result<NegotiationOutcome> {
        let result = complete_with_retry(
            self.completion.as_ref(),
            self.retry,
            &spec.text,
            spec.temperature,
            spec.max_tokens,
        )
        .await;

        let mut session = self.lock();
        let current = Ticket::of(&session);
        if current != ticket {
            debug!(?ticket, ?current, "discarding completion for a stale session");
            return Ok(NegotiationOutcome::Discarded);
        }

        match result {
            Ok(reply) => on_reply(&mut session, reply),
            Err(e) => {
                if e == CompletionError::Unauthorized {
                    warn!("completion service rejected credentials; session latched");
                    session.unauthorized = true;
                }
                Err(CoreError::NegotiationTransport(e))
            }
        }
    }
}

fn build_prompt(session: &NegotiationSession, statement: &str) -> PromptSpec {
    let tone = session.personality.tone();
    let history = &session.transcript;
    if session.in_access_control_mode {
        prompt::negotiation(&tone, &session.codeword, history, statement)
    } else if session.mode == NegotiationMode::Authority {
        prompt::authority(&tone, &session.codeword, history, statement)
    } else {
        prompt::guide(
            &tone,
            session.theme,
            &session.progress,
            &session.codeword,
            history,
            statement,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::future::Future;
    use tokio::sync::Notify;

    struct Echo {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionService for Echo {
        async fn complete(&self, prompt: &str, _: f32, _: u32) -> std::result::Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn negotiator(reply: &str) -> (Negotiator, AccessController, Arc<Echo>) {
        let gate = AccessController::new();
        gate.set_strict_mode(true);
        gate.set_has_active_schema(true);
        let echo = Arc::new(Echo {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let negotiator = Negotiator::new(
            echo.clone(),
            gate.clone(),
            Personality::Balanced,
            Codeword::new("OPEN-SESAME"),
            RetryPolicy::default(),
        );
        (negotiator, gate, echo)
    }

    #[tokio::test]
    async fn codeword_in_access_control_mode_grants_once() {
        let (negotiator, gate, echo) = negotiator("Fine. OPEN-SESAME");
        negotiator.enter_access_control_mode();

        let outcome = negotiator
            .submit_user_statement("My boss needs the schedule changed")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            NegotiationOutcome::Granted {
                reply: "Fine. OPEN-SESAME".into(),
                duration: Duration::from_secs(600),
            }
        );
        assert!(!gate.is_locked());
        assert_eq!(gate.snapshot().access_time_remaining_secs, 600);

        let state = negotiator.state();
        assert_eq!(state.mode, NegotiationMode::Guide);
        assert!(!state.in_access_control_mode);

        let senders: Vec<Sender> = negotiator.transcript().iter().map(|m| m.sender).collect();
        assert_eq!(
            senders,
            vec![Sender::System, Sender::User, Sender::Assistant, Sender::System]
        );
        assert!(echo.prompts.lock().unwrap()[0].contains("OPEN-SESAME"));

        // Same reply again, now outside access control mode.
        gate.revoke_access();
        let outcome = negotiator.submit_user_statement("again").await.unwrap();
        assert!(matches!(outcome, NegotiationOutcome::Reply(_)));
        assert!(gate.is_locked());
    }

    #[tokio::test]
    async fn codeword_outside_access_control_mode_never_grants() {
        let (negotiator, gate, echo) = negotiator("OPEN-SESAME");
        negotiator.switch_to_authority_mode();
        let outcome = negotiator.submit_user_statement("let me in").await.unwrap();
        assert!(matches!(outcome, NegotiationOutcome::Reply(_)));
        assert!(gate.is_locked());
        assert!(!echo.prompts.lock().unwrap()[0].contains("OPEN-SESAME"));
    }

    #[tokio::test]
    async fn blank_statement_rejected_before_append() {
        let (negotiator, _, _) = negotiator("hi");
        let err = negotiator.submit_user_statement("   ").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyStatement)));
        assert!(negotiator.transcript().is_empty());
    }

    #[tokio::test]
    async fn exit_returns_authority_to_guide() {
        let (negotiator, _, _) = negotiator("hi");
        negotiator.enter_access_control_mode();
        let before = negotiator.state().epoch;
        negotiator.exit_access_control_mode();
        let state = negotiator.state();
        assert_eq!(state.mode, NegotiationMode::Guide);
        assert!(!state.in_access_control_mode);
        assert!(state.epoch > before);
    }

    struct Stalled {
        release: Notify,
        reply: String,
    }

    #[async_trait]
    impl CompletionService for Stalled {
        async fn complete(&self, _: &str, _: f32, _: u32) -> std::result::Result<String, CompletionError> {
            self.release.notified().await;
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn stale_completion_is_discarded() {
        let gate = AccessController::new();
        gate.set_strict_mode(true);
        gate.set_has_active_schema(true);
        let stalled = Arc::new(Stalled {
            release: Notify::new(),
            reply: "OPEN-SESAME".into(),
        });
        let negotiator = Arc::new(Negotiator::new(
            stalled.clone(),
            gate.clone(),
            Personality::Strict,
            Codeword::new("OPEN-SESAME"),
            RetryPolicy::default(),
        ));
        negotiator.enter_access_control_mode();

        let task = {
            let negotiator = negotiator.clone();
            tokio::spawn(async move { negotiator.submit_user_statement("please").await })
        };
        tokio::task::yield_now().await;
        negotiator.exit_access_control_mode();
        stalled.release.notify_one();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, NegotiationOutcome::Discarded);
        assert!(gate.is_locked());
        assert!(negotiator
            .transcript()
            .iter()
            .all(|m| m.sender != Sender::Assistant));
    }

    struct NoopWaker;

    impl std::task::Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
    }

    #[test]
    fn failed_grant_leaves_no_reply_behind() {
        let (negotiator, gate, _) = negotiator("Fine. OPEN-SESAME");
        negotiator.enter_access_control_mode();

        // Polled outside any runtime, so the countdown cannot be spawned.
        let waker = std::task::Waker::from(Arc::new(NoopWaker));
        let mut cx = std::task::Context::from_waker(&waker);
        let mut submit = std::pin::pin!(negotiator.submit_user_statement("let me in"));
        let result = match submit.as_mut().poll(&mut cx) {
            std::task::Poll::Ready(result) => result,
            std::task::Poll::Pending => panic!("echo completion should resolve in one poll"),
        };

        assert!(matches!(result, Err(CoreError::Runtime(_))));
        assert!(gate.is_locked());
        let state = negotiator.state();
        assert!(state.in_access_control_mode);
        assert_eq!(state.mode, NegotiationMode::Authority);
        let senders: Vec<Sender> = negotiator.transcript().iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::System, Sender::User]);
    }

    #[tokio::test]
    async fn checkin_uses_progress_and_counts_streak() {
        let (negotiator, gate, echo) = negotiator("Morning! How did last night go? OPEN-SESAME");
        assert!(negotiator.add_goal("No phone after 22:00"));
        negotiator.enter_access_control_mode();

        let outcome = negotiator.daily_checkin().await.unwrap();
        assert!(matches!(outcome, NegotiationOutcome::Reply(_)));
        assert!(gate.is_locked());
        let prompt = echo.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("DAILY CHECK-IN SESSION"));
        assert!(prompt.contains("No phone after 22:00"));

        let progress = negotiator.progress();
        assert_eq!(progress.engagement_streak, 1);
        assert!(progress.last_checkin.is_some());
        let last = negotiator.transcript().pop().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.theme, Some(ConversationTheme::DailyCheckin));
    }

    #[tokio::test]
    async fn weekly_review_records_date_and_usage() {
        let (negotiator, _, echo) = negotiator("Good week.");
        negotiator.add_goal("Read before bed");
        assert!(negotiator.complete_goal("Read before bed"));
        let usage = BTreeMap::from([("Social".to_string(), "4h 10m".to_string())]);

        negotiator.weekly_review(&usage).await.unwrap();

        let prompt = echo.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("- Goals completed recently: Read before bed"));
        assert!(prompt.contains("- Social: 4h 10m"));
        assert!(negotiator.progress().last_weekly_review.is_some());
        assert_eq!(negotiator.state().theme, Some(ConversationTheme::WeeklyReview));
    }

    #[tokio::test]
    async fn progress_survives_reset() {
        let (negotiator, _, _) = negotiator("hi");
        negotiator.add_insight("I reach for the phone when tired");
        negotiator.add_coping_strategy("Stand up and stretch");
        negotiator.add_trigger_pattern("Late evenings");
        negotiator.reset_session();
        let progress = negotiator.progress();
        assert_eq!(progress.insights, vec!["I reach for the phone when tired"]);
        assert_eq!(progress.coping_strategies, vec!["Stand up and stretch"]);
        assert_eq!(progress.trigger_patterns, vec!["Late evenings"]);
    }
}
