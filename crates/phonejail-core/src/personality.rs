//! Jailkeeper personalities.
//!
//! A personality fixes two things: how long a successful negotiation
//! unlocks the gate, and the tone the prompts are written in.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use indoc::indoc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Personality {
    #[default]
    Strict,
    Balanced,
    Lenient,
}

/// Prompt text for one personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTone {
    pub description: &'static str,
    /// Persona used when deciding on access.
    pub authority_directive: &'static str,
    /// Persona used for ordinary coaching conversation.
    pub guide_directive: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonalityPolicy {
    pub grant_duration: Duration,
    pub tone: PromptTone,
}

impl Personality {
    pub const ALL: [Personality; 3] = [
        Personality::Strict,
        Personality::Balanced,
        Personality::Lenient,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Strict => "Strict",
            Personality::Balanced => "Balanced",
            Personality::Lenient => "Lenient",
        }
    }

    pub fn grant_duration(self) -> Duration {
        match self {
            Personality::Strict => Duration::from_secs(5 * 60),
            Personality::Balanced => Duration::from_secs(10 * 60),
            Personality::Lenient => Duration::from_secs(15 * 60),
        }
    }

    pub fn tone(self) -> PromptTone {
        match self {
            Personality::Strict => PromptTone {
                description: "A strict enforcer who prioritizes productivity and minimal distractions",
                authority_directive: "You are a strict digital jailkeeper. You enforce productivity \
                    and minimize distractions. Only grant access for genuine emergencies or \
                    critical needs.",
                guide_directive: indoc! {"
                    You are a strict but caring digital wellness coach. Help the user build a
                    disciplined, productive relationship with technology.

                    - Use direct, clear language about digital discipline.
                    - Challenge rationalizations and excuses.
                    - Encourage structured, goal-oriented habits.
                    - Celebrate progress but keep standards high.
                "},
            },
            Personality::Balanced => PromptTone {
                description: "A balanced guide who helps maintain a healthy relationship with technology",
                authority_directive: "You are a balanced digital jailkeeper. You help users maintain \
                    a healthy relationship with technology. Consider reasonable requests that show \
                    self-awareness.",
                guide_directive: indoc! {"
                    You are a balanced digital wellness coach. Help the user find a sustainable
                    middle ground between restriction and freedom.

                    - Be empathetic while keeping clear boundaries.
                    - Build awareness of usage patterns.
                    - Encourage gradual, sustainable change.
                    - Validate struggles while promoting growth.
                "},
            },
            Personality::Lenient => PromptTone {
                description: "A flexible companion who allows more freedom while still providing guidance",
                authority_directive: "You are a lenient digital jailkeeper. You allow more freedom \
                    while still providing guidance. Be flexible but encourage good digital habits.",
                guide_directive: indoc! {"
                    You are a gentle, supportive digital wellness coach. Help the user develop a
                    positive relationship with technology.

                    - Use warm language that reduces shame and guilt.
                    - Focus on small, achievable changes.
                    - Celebrate all progress, however small.
                    - Emphasize self-compassion during setbacks.
                "},
            },
        }
    }

    pub fn policy(self) -> PersonalityPolicy {
        PersonalityPolicy {
            grant_duration: self.grant_duration(),
            tone: self.tone(),
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown personality: {0}")]
pub struct UnknownPersonality(pub String);

impl FromStr for Personality {
    type Err = UnknownPersonality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Personality::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPersonality(s.to_string()))
    }
}
