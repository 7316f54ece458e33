use std::fmt;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::progress::TherapeuticProgress;
use crate::personality::Personality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn label(self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "Jailkeeper",
            Sender::System => "System",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversationTheme {
    DailyCheckin,
    WeeklyReview,
    GoalSetting,
    TriggerExploration,
    CopingStrategies,
    Mindfulness,
    ProgressCelebration,
    SetbackSupport,
}

impl ConversationTheme {
    pub const ALL: [ConversationTheme; 8] = [
        ConversationTheme::DailyCheckin,
        ConversationTheme::WeeklyReview,
        ConversationTheme::GoalSetting,
        ConversationTheme::TriggerExploration,
        ConversationTheme::CopingStrategies,
        ConversationTheme::Mindfulness,
        ConversationTheme::ProgressCelebration,
        ConversationTheme::SetbackSupport,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ConversationTheme::DailyCheckin => "Daily Check-in",
            ConversationTheme::WeeklyReview => "Weekly Review",
            ConversationTheme::GoalSetting => "Goal Setting",
            ConversationTheme::TriggerExploration => "Trigger Exploration",
            ConversationTheme::CopingStrategies => "Coping Strategies",
            ConversationTheme::Mindfulness => "Mindfulness",
            ConversationTheme::ProgressCelebration => "Progress Celebration",
            ConversationTheme::SetbackSupport => "Setback Support",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConversationTheme::DailyCheckin => "Daily reflection on digital habits and intentions",
            ConversationTheme::WeeklyReview => "Weekly progress review and planning",
            ConversationTheme::GoalSetting => "Setting and refining digital wellness goals",
            ConversationTheme::TriggerExploration => "Identifying triggers for excessive app use",
            ConversationTheme::CopingStrategies => "Developing healthy coping mechanisms",
            ConversationTheme::Mindfulness => "Mindful awareness of technology use",
            ConversationTheme::ProgressCelebration => "Celebrating achievements and milestones",
            ConversationTheme::SetbackSupport => "Support and guidance during difficult times",
        }
    }
}

/// One transcript entry. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ConversationTheme>,
}

impl Message {
    pub fn new(
        content: impl Into<String>,
        sender: Sender,
        theme: Option<ConversationTheme>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            theme,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationMode {
    #[default]
    Guide,
    Authority,
}

/// Secret phrase whose presence in a completion signals a grant.
#[derive(Clone, PartialEq, Eq)]
pub struct Codeword(String);

impl Codeword {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self(phrase.into())
    }

    /// A fresh random phrase for this process.
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        Self(format!("UNLOCK-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact, case-sensitive substring match.
    pub fn appears_in(&self, text: &str) -> bool {
        !self.0.is_empty() && text.contains(&self.0)
    }
}

impl fmt::Debug for Codeword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Codeword(..)")
    }
}

/// Conversation state for one negotiation.
#[derive(Debug, Clone)]
pub struct NegotiationSession {
    pub(crate) id: Uuid,
    /// Bumped on every mode transition.
    pub(crate) epoch: u64,
    pub(crate) mode: NegotiationMode,
    pub(crate) in_access_control_mode: bool,
    pub(crate) personality: Personality,
    pub(crate) theme: Option<ConversationTheme>,
    pub(crate) transcript: Vec<Message>,
    pub(crate) codeword: Codeword,
    /// Set when the completion service rejected our credentials.
    pub(crate) unauthorized: bool,
    pub(crate) progress: TherapeuticProgress,
}

impl NegotiationSession {
    pub fn new(personality: Personality, codeword: Codeword) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch: 0,
            mode: NegotiationMode::Guide,
            in_access_control_mode: false,
            personality,
            theme: None,
            transcript: Vec::new(),
            codeword,
            unauthorized: false,
            progress: TherapeuticProgress::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn mode(&self) -> NegotiationMode {
        self.mode
    }

    pub fn in_access_control_mode(&self) -> bool {
        self.in_access_control_mode
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn progress(&self) -> &TherapeuticProgress {
        &self.progress
    }

    pub(crate) fn transition(&mut self, mode: NegotiationMode, in_access_control_mode: bool) {
        self.mode = mode;
        self.in_access_control_mode = in_access_control_mode;
        self.epoch += 1;
    }

    pub(crate) fn push(&mut self, content: impl Into<String>, sender: Sender) -> Message {
        let message = Message::new(content, sender, self.theme);
        self.transcript.push(message.clone());
        message
    }

    /// Fresh identity and transcript. Personality, theme, codeword and
    /// coaching progress carry over.
    pub(crate) fn restart(&mut self) {
        let epoch = self.epoch + 1;
        let progress = std::mem::take(&mut self.progress);
        *self = Self {
            epoch,
            theme: self.theme,
            progress,
            ..Self::new(self.personality, self.codeword.clone())
        };
    }
}
