//! System prompt templates and user-message builders.
//!
//! Templates define the structured output contracts (classifier token,
//! tool-loop JSON decision); builders format the per-call user message
//! with query, conversation, shared outputs, and loop transcript blocks.
//! Wording is deliberately minimal — instruction content is owned by the
//! deployment, via the override directory.

use std::fmt::Write;
use std::path::Path;

use crate::conversation::{ConversationTurn, Role};
use crate::registry::AgentDescriptor;
use crate::state::AgentOutputs;

/// System prompt for the intent classifier.
///
/// The reply contract is a single delimited token, not prose:
/// `<agent>[,<agent>...]|<single|sequential|parallel>`.
pub const CLASSIFIER_SYSTEM_PROMPT: &str = r"You are a request router. Given a user query, prior conversation, and a roster of available agents, decide which agent(s) should handle the request and in which shape.

Shapes:
- single: exactly one agent handles the request.
- sequential: two or more agents run in order, each seeing earlier outputs.
- parallel: two or three agents run concurrently on the same request.

Reply with EXACTLY one line and nothing else:
<agent>[,<agent>...]|<single|sequential|parallel>

Examples:
generalist|single
research,summary|sequential
news,weather,finance|parallel";

/// System prompt for the tool-calling loop.
///
/// The reply contract is a single JSON object per turn: either a tool
/// invocation plan or a final answer.
pub const REACT_SYSTEM_PROMPT: &str = r#"You solve the user's request step by step. Each turn, reply with EXACTLY one JSON object and nothing else.

To call a tool:
{"thought": "<why this tool>", "action": {"tool": "<name>", "params": {<arguments>}}}

To finish:
{"thought": "<why you are done>", "answer": "<final answer>"}

Tool results arrive as observations in the transcript. Never repeat a call that already produced an observation."#;

/// Default prompt directory under the user's config.
const DEFAULT_PROMPT_DIR: &str = ".config/maestro-rs/prompts";

/// Filename for the classifier prompt template.
const CLASSIFIER_FILENAME: &str = "classifier.md";
/// Filename for the tool-loop prompt template.
const REACT_FILENAME: &str = "react.md";

/// A set of system prompts for the core's own reasoning calls.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Per-agent prompts are not part of this set —
/// they belong to the handlers registered by the caller.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// System prompt for the intent classifier.
    pub classifier: String,
    /// System prompt for the tool-calling loop.
    pub react: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in
    /// defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `MAESTRO_PROMPT_DIR` environment variable
    /// 3. `~/.config/maestro-rs/prompts/`
    ///
    /// Each file is loaded independently — a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(std::path::PathBuf::from)
            .or_else(|| {
                std::env::var("MAESTRO_PROMPT_DIR")
                    .ok()
                    .map(std::path::PathBuf::from)
            })
            .or_else(|| dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR)));

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            classifier: load_file(CLASSIFIER_FILENAME, CLASSIFIER_SYSTEM_PROMPT),
            react: load_file(REACT_FILENAME, REACT_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            classifier: CLASSIFIER_SYSTEM_PROMPT.to_string(),
            react: REACT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Renders prior conversation turns as a tagged block. Empty input
/// renders nothing.
fn write_conversation(prompt: &mut String, conversation: &[ConversationTurn]) {
    if conversation.is_empty() {
        return;
    }
    prompt.push_str("<conversation>\n");
    for turn in conversation {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let _ = writeln!(prompt, "{role}: {}", turn.text);
    }
    prompt.push_str("</conversation>\n\n");
}

/// Builds the classifier's user message: roster, conversation, query.
#[must_use]
pub fn build_classifier_prompt(
    system: &str,
    query: &str,
    conversation: &[ConversationTurn],
    roster: &[AgentDescriptor],
) -> String {
    let mut prompt = format!("{system}\n\n<agents>\n");
    for agent in roster {
        let _ = writeln!(
            prompt,
            "- {name}: {display} [{category}]",
            name = agent.name,
            display = agent.display_name,
            category = agent.category,
        );
    }
    prompt.push_str("</agents>\n\n");
    write_conversation(&mut prompt, conversation);
    let _ = write!(prompt, "<query>{query}</query>");
    prompt
}

/// Renders outputs shared by earlier agents in the chain. Empty input
/// renders nothing.
fn write_shared_outputs(prompt: &mut String, prior_outputs: &AgentOutputs) {
    if prior_outputs.is_empty() {
        return;
    }
    prompt.push_str("<shared_context>\n");
    for output in prior_outputs {
        let _ = write!(
            prompt,
            "<output agent=\"{agent}\">\n{text}\n</output>\n",
            agent = output.agent,
            text = output.output,
        );
    }
    prompt.push_str("</shared_context>\n\n");
}

/// Builds a specialized agent's user message: conversation, outputs
/// shared by earlier agents in the chain, query.
#[must_use]
pub fn build_agent_prompt(
    system: &str,
    query: &str,
    conversation: &[ConversationTurn],
    prior_outputs: &AgentOutputs,
) -> String {
    let mut prompt = format!("{system}\n\n");
    write_conversation(&mut prompt, conversation);
    write_shared_outputs(&mut prompt, prior_outputs);
    let _ = write!(prompt, "<query>{query}</query>");
    prompt
}

/// Builds the tool-loop user message: tool roster, conversation, shared
/// outputs, query, and the transcript of steps taken so far in this run.
#[must_use]
pub fn build_react_prompt(
    system: &str,
    query: &str,
    conversation: &[ConversationTurn],
    prior_outputs: &AgentOutputs,
    tools: &[crate::tool::ToolDescriptor],
    transcript: &[String],
) -> String {
    let mut prompt = format!("{system}\n\n<tools>\n");
    for tool in tools {
        let _ = writeln!(prompt, "- {}: {}", tool.name, tool.description);
    }
    prompt.push_str("</tools>\n\n");
    write_conversation(&mut prompt, conversation);
    write_shared_outputs(&mut prompt, prior_outputs);
    let _ = write!(prompt, "<query>{query}</query>");
    if !transcript.is_empty() {
        prompt.push_str("\n\n<transcript>\n");
        for line in transcript {
            let _ = writeln!(prompt, "{line}");
        }
        prompt.push_str("</transcript>");
    }
    prompt
}
