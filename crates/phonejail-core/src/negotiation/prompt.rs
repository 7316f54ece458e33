//! Prompt construction for the conversation shapes.
//!
//! Only the negotiation prompt ever mentions the codeword. Earlier replies
//! that contained it are shown with the phrase withheld everywhere else, so
//! a guide or authority completion cannot simply repeat it.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use indoc::{formatdoc, indoc};

use super::progress::TherapeuticProgress;
use super::session::{Codeword, ConversationTheme, Message, Sender};
use crate::personality::PromptTone;

const GUIDE_HISTORY: usize = 5;
const RECENT_INSIGHTS: usize = 3;
const RECENT_COMPLETED: usize = 5;
const WITHHELD: &str = "[withheld]";

const GUIDE_TECHNIQUES: &str = indoc! {"
    CONVERSATION GUIDELINES:
    - Use CBT techniques: thought records, behavioral experiments, cognitive restructuring.
    - Use open questions, affirmations, reflections and summaries.
    - Explore ambivalence about technology use.
    - Help identify and challenge automatic thoughts.
    - Celebrate progress and normalize setbacks.
"};

/// A rendered prompt plus its sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub text: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PromptSpec {
    fn coaching(text: String) -> Self {
        Self {
            text,
            temperature: 0.8,
            max_tokens: 300,
        }
    }

    fn gatekeeping(text: String) -> Self {
        Self {
            text,
            temperature: 0.7,
            max_tokens: 150,
        }
    }
}

fn write_history<'a>(
    out: &mut String,
    history: impl IntoIterator<Item = &'a Message>,
    withhold: Option<&Codeword>,
) {
    for message in history {
        if message.sender == Sender::System {
            continue;
        }
        let label = message.sender.label();
        match withhold {
            Some(codeword) if codeword.appears_in(&message.content) => {
                let content = message.content.replace(codeword.as_str(), WITHHELD);
                let _ = writeln!(out, "{label}: {content}");
            }
            _ => {
                let _ = writeln!(out, "{label}: {}", message.content);
            }
        }
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none yet".to_string()
    } else {
        items.join(", ")
    }
}

fn tail(items: &[String], n: usize) -> &[String] {
    &items[items.len().saturating_sub(n)..]
}

/// Access-control negotiation: the model decides on a grant.
pub fn negotiation(
    tone: &PromptTone,
    codeword: &Codeword,
    history: &[Message],
    statement: &str,
) -> PromptSpec {
    let mut text = formatdoc! {"
        {authority}

        IMPORTANT: You are in ACCESS CONTROL MODE. The user is asking to change their blocking schemas while strict mode is active. Judge the request in keeping with your personality.

        CRITICAL INSTRUCTION: If and only if you decide to grant access, include the exact phrase \"{codeword}\" somewhere in your response. Never include it otherwise.

        Conversation history:
        ",
        authority = tone.authority_directive,
        codeword = codeword.as_str(),
    };
    write_history(&mut text, history, None);
    let _ = write!(text, "User: {statement}\n\nJailkeeper:");
    PromptSpec::gatekeeping(text)
}

/// Authority tone outside access-control mode. No codeword is offered.
pub fn authority(
    tone: &PromptTone,
    codeword: &Codeword,
    history: &[Message],
    statement: &str,
) -> PromptSpec {
    let mut text = format!("{}\n\n", tone.authority_directive);
    write_history(&mut text, history, Some(codeword));
    let _ = write!(text, "User: {statement}\n\nJailkeeper:");
    PromptSpec::gatekeeping(text)
}

fn write_progress(out: &mut String, progress: &TherapeuticProgress) {
    out.push_str("USER'S PROGRESS:\n");
    let _ = writeln!(out, "- Current goals: {}", join_or_none(&progress.current_goals));
    let _ = writeln!(out, "- Completed goals: {}", join_or_none(&progress.completed_goals));
    let _ = writeln!(out, "- Key insights: {}", join_or_none(&progress.insights));
    let _ = writeln!(out, "- Identified triggers: {}", join_or_none(&progress.trigger_patterns));
    let _ = writeln!(out, "- Coping strategies: {}", join_or_none(&progress.coping_strategies));
    let _ = writeln!(out, "- Engagement streak: {} days", progress.engagement_streak);
    if let Some(date) = progress.last_checkin_date() {
        let _ = writeln!(out, "- Last check-in: {}", date.format("%b %-d, %Y"));
    }
    out.push('\n');
}

/// Coaching conversation over the most recent messages.
pub fn guide(
    tone: &PromptTone,
    theme: Option<ConversationTheme>,
    progress: &TherapeuticProgress,
    codeword: &Codeword,
    history: &[Message],
    statement: &str,
) -> PromptSpec {
    let mut text = format!("{}\n", tone.guide_directive);
    if let Some(theme) = theme {
        let _ = writeln!(
            text,
            "CURRENT CONVERSATION THEME: {} - {}\n",
            theme.display_name(),
            theme.description()
        );
    }
    write_progress(&mut text, progress);
    text.push_str(GUIDE_TECHNIQUES);
    text.push_str("\nRECENT CONVERSATION:\n");
    let recent: Vec<&Message> = history
        .iter()
        .filter(|m| m.sender != Sender::System)
        .collect();
    let skip = recent.len().saturating_sub(GUIDE_HISTORY);
    write_history(&mut text, recent.into_iter().skip(skip), Some(codeword));
    let _ = write!(
        text,
        "User: {statement}\n\nJailkeeper (respond as a supportive guide):"
    );
    PromptSpec::coaching(text)
}

/// Opening message for a daily check-in.
pub fn daily_checkin(tone: &PromptTone, progress: &TherapeuticProgress) -> PromptSpec {
    let text = formatdoc! {"
        {directive}
        DAILY CHECK-IN SESSION

        You are opening a brief, supportive daily check-in. Review how yesterday went with their digital habits, note challenges or successes, and help set an intention for today.

        USER'S CURRENT CONTEXT:
        - Current goals: {goals}
        - Recent insights: {insights}
        - Engagement streak: {streak} days

        Open with a warm, personal greeting and one open-ended question about their recent experience.

        Jailkeeper:",
        directive = tone.guide_directive,
        goals = join_or_none(&progress.current_goals),
        insights = join_or_none(tail(&progress.insights, RECENT_INSIGHTS)),
        streak = progress.engagement_streak,
    };
    PromptSpec::coaching(text)
}

/// Weekly review over the user's progress and optional usage figures.
pub fn weekly_review(
    tone: &PromptTone,
    progress: &TherapeuticProgress,
    usage: &BTreeMap<String, String>,
) -> PromptSpec {
    let mut text = formatdoc! {"
        {directive}
        WEEKLY REVIEW SESSION

        You are conducting a weekly review. Look for patterns in the user's digital habits, celebrate progress, name areas to improve, and plan the coming week.

        USER'S PROGRESS:
        - Goals completed recently: {completed}
        - Current goals: {goals}
        - New insights: {insights}
        - Engagement streak: {streak} days

        ",
        directive = tone.guide_directive,
        completed = join_or_none(tail(&progress.completed_goals, RECENT_COMPLETED)),
        goals = join_or_none(&progress.current_goals),
        insights = join_or_none(tail(&progress.insights, RECENT_INSIGHTS)),
        streak = progress.engagement_streak,
    };
    if !usage.is_empty() {
        text.push_str("WEEKLY USAGE DATA:\n");
        for (key, value) in usage {
            let _ = writeln!(text, "- {key}: {value}");
        }
        text.push('\n');
    }
    text.push_str(
        "Give a thoughtful review that acknowledges progress, identifies patterns and \
         helps plan for continued growth.\n\nJailkeeper:",
    );
    PromptSpec::coaching(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::Personality;

    fn history() -> Vec<Message> {
        vec![
            Message::new("framing", Sender::System, None),
            Message::new("I need my mail app", Sender::User, None),
            Message::new("Why now?", Sender::Assistant, None),
        ]
    }

    #[test]
    fn negotiation_prompt_carries_codeword_and_drops_system() {
        let tone = Personality::Strict.tone();
        let spec = negotiation(&tone, &Codeword::new("OPEN-42"), &history(), "Work emergency");
        assert!(spec.text.contains("\"OPEN-42\""));
        assert!(spec.text.contains(tone.authority_directive));
        assert!(!spec.text.contains("framing"));
        assert!(spec.text.contains("User: I need my mail app"));
        assert!(spec.text.contains("Jailkeeper: Why now?"));
        assert!(spec.text.ends_with("User: Work emergency\n\nJailkeeper:"));
        assert_eq!(spec.max_tokens, 150);
    }

    #[test]
    fn authority_prompt_has_no_codeword_instruction() {
        let codeword = Codeword::new("OPEN-42");
        let spec = authority(&Personality::Balanced.tone(), &codeword, &history(), "hello");
        assert!(!spec.text.contains("CRITICAL INSTRUCTION"));
        assert!(!spec.text.contains("OPEN-42"));
    }

    #[test]
    fn earlier_grant_phrase_is_withheld_outside_negotiation() {
        let codeword = Codeword::new("OPEN-42");
        let mut history = history();
        history.push(Message::new("Fine. OPEN-42", Sender::Assistant, None));
        let tone = Personality::Balanced.tone();

        let spec = authority(&tone, &codeword, &history, "again?");
        assert!(!spec.text.contains("OPEN-42"));
        assert!(spec.text.contains("Jailkeeper: Fine. [withheld]"));

        let spec = guide(&tone, None, &TherapeuticProgress::default(), &codeword, &history, "hi");
        assert!(!spec.text.contains("OPEN-42"));
        assert!(spec.text.contains("Fine. [withheld]"));
    }

    #[test]
    fn guide_prompt_keeps_last_five() {
        let history: Vec<Message> = (0..8)
            .map(|i| Message::new(format!("msg-{i}"), Sender::User, None))
            .collect();
        let spec = guide(
            &Personality::Lenient.tone(),
            Some(ConversationTheme::Mindfulness),
            &TherapeuticProgress::default(),
            &Codeword::new("OPEN-42"),
            &history,
            "now",
        );
        assert!(!spec.text.contains("msg-2"));
        assert!(spec.text.contains("msg-3"));
        assert!(spec.text.contains("msg-7"));
        assert!(spec.text.contains("Mindfulness"));
        assert_eq!(spec.temperature, 0.8);
        assert_eq!(spec.max_tokens, 300);
        assert!(spec.text.contains("- Current goals: none yet"));
    }

    fn progress() -> TherapeuticProgress {
        let mut progress = TherapeuticProgress::default();
        progress.add_goal("Phone stays in the hall overnight");
        progress.add_trigger_pattern("Boredom on the commute");
        for insight in ["one", "two", "three", "four"] {
            progress.add_insight(insight);
        }
        progress.engagement_streak = 4;
        progress
    }

    #[test]
    fn guide_prompt_reports_progress() {
        let spec = guide(
            &Personality::Balanced.tone(),
            None,
            &progress(),
            &Codeword::new("OPEN-42"),
            &[],
            "hi",
        );
        assert!(spec.text.contains("- Current goals: Phone stays in the hall overnight"));
        assert!(spec.text.contains("- Identified triggers: Boredom on the commute"));
        assert!(spec.text.contains("- Engagement streak: 4 days"));
        assert!(!spec.text.contains("CURRENT CONVERSATION THEME"));
        assert!(!spec.text.contains("Last check-in"));
    }

    #[test]
    fn daily_checkin_shows_latest_insights() {
        let spec = daily_checkin(&Personality::Lenient.tone(), &progress());
        assert!(spec.text.contains("DAILY CHECK-IN SESSION"));
        assert!(spec.text.contains("- Recent insights: two, three, four"));
        assert!(spec.text.contains("- Engagement streak: 4 days"));
        assert!(spec.text.ends_with("Jailkeeper:"));
        assert_eq!(spec.max_tokens, 300);
    }

    #[test]
    fn weekly_review_lists_usage_only_when_given() {
        let tone = Personality::Strict.tone();
        let spec = weekly_review(&tone, &progress(), &BTreeMap::new());
        assert!(spec.text.contains("- Goals completed recently: none yet"));
        assert!(!spec.text.contains("WEEKLY USAGE DATA"));

        let usage = BTreeMap::from([("Screen time".to_string(), "21h".to_string())]);
        let spec = weekly_review(&tone, &progress(), &usage);
        assert!(spec.text.contains("WEEKLY USAGE DATA:\n- Screen time: 21h\n"));
    }
}
