//! Prompt templates for the three summarization levels.
//!
//! The commit prompt is format-agnostic. Card and epic prompts end with an
//! output contract chosen by [`SummaryFormat`].

use crate::summarize::SummaryFormat;

pub fn commit_prompt(diff: &str) -> String {
    format!(
        "Summarize the following Git commit diff for a technical audience:\n\n\
         {diff}\n\n\
         Explain what changed, which files or modules were affected, and the purpose of the change.\n\
         Call out feature toggles, API interfaces (distinguish an API call from an API definition), \
         the repository name and any other relevant detail.\n"
    )
}

/// `(repo, sha, summary)` entries, in commit order.
pub fn card_prompt(
    title: &str,
    description: &str,
    commits: &[(&str, &str, String)],
    format: SummaryFormat,
) -> String {
    let commit_summaries = commits
        .iter()
        .map(|(repo, sha, summary)| format!("- Repo: {repo}, SHA: {sha}\n{summary}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are generating a changelog entry for a technical story card.\n\n\
         Card title: {title}\n\
         Description: {description}\n\n\
         Here are summaries of the code commits:\n\n\
         {commit_summaries}\n\n\
         Write a concise changelog entry that keeps every important detail and connects the \
         business need with the code changes.\n\
         {contract}\n",
        contract = card_contract(format),
    )
}

/// `(card_id, card_title, summary)` entries, in card order.
pub fn epic_prompt(
    title: &str,
    description: &str,
    cards: &[(&str, &str, String)],
    format: SummaryFormat,
) -> String {
    let card_summaries = cards
        .iter()
        .map(|(id, card_title, summary)| format!("### {id} - {card_title}\n{summary}"))
        .collect::<Vec<_>>()
        .join("\n\n\n");
    format!(
        "You are an engineering technical note generator.\n\n\
         Epic title: {title}\n\
         Description: {description}\n\n\
         Here are summaries of the individual cards:\n\n\
         {card_summaries}\n\n\
         Write a high-level changelog entry (4-5 sentences) followed by the detailed summaries \
         of the individual cards.\n\
         {contract}\n\
         Focus on business value and system changes.\n",
        contract = epic_contract(format),
    )
}

fn card_contract(format: SummaryFormat) -> &'static str {
    match format {
        SummaryFormat::Markdown => {
            "Lay the entry out as:\n<Repository>\n<Changelog>\n\
             Keep toggles, API references and similar items in a separate section."
        }
        SummaryFormat::Table => {
            "Lay the entry out as a Markdown table with the columns \
             | Repository | Change | Toggles / APIs |, one row per change."
        }
        SummaryFormat::Xhtml => {
            "Return only well-formed XHTML fragments (<h3>, <p>, <ul>, <li>, <code>), \
             one <h3> per repository followed by its changes."
        }
    }
}

fn epic_contract(format: SummaryFormat) -> &'static str {
    match format {
        SummaryFormat::Markdown => {
            "Keep the detailed summaries in the format:\n<CARD_ID> - <CARD_TITLE>\n<Repository>\n<Changelog>\n\
             Keep toggles, API references and similar items in a separate section.\n\
             Make sure the Markdown is well formatted and wrapped; use bullet points and subtitles."
        }
        SummaryFormat::Table => {
            "Present the detailed summaries as one Markdown table with the columns \
             | Card | Repository | Change | Toggles / APIs |, one row per change."
        }
        SummaryFormat::Xhtml => {
            "Return only well-formed XHTML suitable for Confluence storage format: \
             an <h2> overview section, then one <h3>CARD_ID - CARD_TITLE</h3> section per card \
             with <ul> lists of changes. Do not wrap the answer in code fences."
        }
    }
}
