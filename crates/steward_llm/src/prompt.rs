//! Prompt construction for output analysis.

/// Upper bound on terminal output characters sent to the model.
const MAX_OUTPUT_CHARS: usize = 6000;

/// Everything the analysis prompt is built from.
#[derive(Debug, Clone, Default)]
pub struct PromptInput<'a> {
    pub terminal_output: &'a str,
    /// Project summary and documentation excerpts
    pub project_notes: Option<&'a str>,
    /// The user's own guidance text
    pub guide_prompt: Option<&'a str>,
}

/// Build the single free-text prompt that asks for a strict JSON verdict.
pub fn build_analysis_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::from(
        "You are supervising an AI coding assistant running in a terminal. \
Read its most recent output and decide whether a short corrective instruction \
should be typed into its input.\n\n\
Intervene only when the assistant is clearly looping, stalled, ignoring project \
conventions, or about to do something risky. When unsure, do not intervene.\n",
    );

    if let Some(notes) = input.project_notes.filter(|n| !n.trim().is_empty()) {
        prompt.push_str("\n## Project context\n");
        prompt.push_str(notes.trim());
        prompt.push('\n');
    }

    if let Some(guide) = input.guide_prompt.filter(|g| !g.trim().is_empty()) {
        prompt.push_str("\n## Supervisor instructions\n");
        prompt.push_str(guide.trim());
        prompt.push('\n');
    }

    prompt.push_str("\n## Recent terminal output\n```\n");
    prompt.push_str(tail_chars(input.terminal_output, MAX_OUTPUT_CHARS));
    prompt.push_str("\n```\n");

    prompt.push_str(
        "\nRespond with ONLY a JSON object, no markdown, in exactly this shape:\n\
{\"shouldIntervene\": boolean, \"guidance\": string (omit when not intervening), \
\"confidence\": number between 0 and 1, \"reasoning\": string}\n\
Keep guidance to one or two sentences addressed directly to the assistant.",
    );

    prompt
}

/// The last `max` characters of `s`, on a char boundary.
fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let skip = count - max;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
