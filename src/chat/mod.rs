use crate::error::Result;
use crate::inference::{Backend, ChatMessage};
use crate::search::{ContextSnippet, ContextSource, SearchClient};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// State for one interactive session
///
/// Transcript, query history, and streak live here and die with the
/// session; nothing is process-global.
#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    query_history: Vec<String>,
    streak: u32,
}

impl ChatSession {
    #[must_use]
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            query_history: Vec::new(),
            streak: 0,
        }
    }

    /// Record a user question, bumping the streak
    pub fn record_query(&mut self, query: &str) {
        self.query_history.push(query.to_string());
        self.streak += 1;
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Most recent question, offered back as a retry suggestion
    #[must_use]
    pub fn last_query(&self) -> Option<&str> {
        self.query_history.last().map(String::as_str)
    }
}

/// Prompt for the pre-retrieval analysis turn
#[must_use]
pub fn analysis_prompt(question: &str) -> String {
    format!(
        "Analyze this question and identify key concepts, intent and potential ambiguities without answering it: '{question}'"
    )
}

/// Combine the question with the model's analysis into a retrieval query
#[must_use]
pub fn refine_query(question: &str, thought: &str) -> String {
    let thought = thought.trim();
    if thought.is_empty() {
        question.to_string()
    } else {
        format!("{question} {thought}")
    }
}

/// Build the prompt for one turn, prefixing retrieved context when present
#[must_use]
pub fn build_prompt(question: &str, context: Option<&ContextSnippet>) -> String {
    match context {
        Some(snippet) => format!(
            "Context: {}\nQuestion: {question}\nAnswer concisely.",
            snippet.summary
        ),
        None => format!("Question: {question}\nAnswer concisely using your knowledge."),
    }
}

/// Run the interactive chat loop until the user types `exit` or EOF
pub async fn run_interactive(
    backend: &Backend,
    system_prompt: &str,
    mut search: Option<(&mut SearchClient, ContextSource)>,
) -> Result<()> {
    let mut session = ChatSession::new(system_prompt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Delta chat ({} backend). Type 'exit' to quit.\n", backend.backend_name());

    loop {
        if session.streak() > 0 {
            println!("Streak: {}", session.streak());
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            println!("Session ended.");
            break;
        }

        session.record_query(input);

        let context = match &mut search {
            Some((client, source)) => {
                // Ask the model what the question is really about before
                // searching; the analysis sharpens the retrieval query.
                let query = match ask_analysis(backend, input).await {
                    Ok(thought) => refine_query(input, &thought),
                    Err(e) => {
                        tracing::warn!("Question analysis failed: {e}");
                        input.to_string()
                    }
                };

                match client.fetch(*source, &query).await {
                    Ok(snippet) => {
                        if let Some(s) = &snippet {
                            println!("{}: {}", source.label(), s.summary);
                        }
                        snippet
                    }
                    Err(e) => {
                        // A failed lookup degrades to an unaugmented answer
                        tracing::warn!("Context fetch failed: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        session.push_user(build_prompt(input, context.as_ref()));

        let spinner = thinking_spinner();
        let started = Instant::now();
        let reply = match backend.chat(session.messages()).await {
            Ok(reply) => reply,
            Err(e) => {
                spinner.finish_and_clear();
                eprintln!("Error generating response: {e}");
                continue;
            }
        };
        spinner.finish_and_clear();

        println!("Delta: {reply}\n");
        print_speed(&reply, started.elapsed());

        if let Some(snippet) = &context {
            print_sources(snippet);
        }
        if let Some(last) = session.last_query() {
            println!("Try again: {last}");
        }

        session.push_assistant(reply);
    }

    Ok(())
}

/// One-shot: ask the model about a query given retrieved context
pub async fn ask_with_context(
    backend: &Backend,
    system_prompt: &str,
    query: &str,
    snippet: &ContextSnippet,
) -> Result<String> {
    let messages = vec![
        ChatMessage::system(format!(
            "{system_prompt} Use the provided context to answer."
        )),
        ChatMessage::user(format!(
            "Context: {}\n\nQuestion: {query}",
            snippet.summary
        )),
    ];

    let spinner = thinking_spinner();
    let result = backend.chat(&messages).await;
    spinner.finish_and_clear();

    result
}

/// Pre-retrieval turn: have the model analyze the question on its own,
/// outside the session transcript
async fn ask_analysis(backend: &Backend, question: &str) -> Result<String> {
    let messages = vec![ChatMessage::user(analysis_prompt(question))];

    let spinner = thinking_spinner();
    let result = backend.chat(&messages).await;
    spinner.finish_and_clear();

    result
}

fn print_speed(reply: &str, elapsed: Duration) {
    let token_count = reply.split_whitespace().count();
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 && token_count > 0 {
        println!("Speed: {:.2} tokens/s", token_count as f64 / secs);
    }
}

fn print_sources(snippet: &ContextSnippet) {
    if snippet.citations.is_empty() {
        return;
    }

    println!("Sources:");
    for (i, citation) in snippet.citations.iter().enumerate() {
        println!("{}. {citation}", i + 1);
    }
    if let Some(url) = &snippet.url {
        println!("Link: {url}");
    }
}

/// Spinner tied to one generation; cleared when the reply arrives
fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} thinking...")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(250));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Role;

    #[test]
    fn test_session_starts_with_system_prompt() {
        let session = ChatSession::new("You are a helpful assistant.");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);
        assert_eq!(session.streak(), 0);
        assert!(session.last_query().is_none());
    }

    #[test]
    fn test_record_query_bumps_streak_and_history() {
        let mut session = ChatSession::new("sys");
        session.record_query("what is rust");
        session.record_query("who made it");

        assert_eq!(session.streak(), 2);
        assert_eq!(session.last_query(), Some("who made it"));
    }

    #[test]
    fn test_transcript_alternates_roles() {
        let mut session = ChatSession::new("sys");
        session.push_user("question one");
        session.push_assistant("answer one");
        session.push_user("question two");

        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
    }

    #[test]
    fn test_analysis_prompt_wraps_question() {
        let prompt = analysis_prompt("what is rust?");
        assert!(prompt.contains("'what is rust?'"));
        assert!(prompt.contains("without answering it"));
    }

    #[test]
    fn test_refine_query_appends_thought() {
        let refined = refine_query("what is rust?", "Key concepts: systems programming.");
        assert_eq!(refined, "what is rust? Key concepts: systems programming.");
    }

    #[test]
    fn test_refine_query_keeps_question_on_empty_thought() {
        assert_eq!(refine_query("what is rust?", ""), "what is rust?");
        assert_eq!(refine_query("what is rust?", "   "), "what is rust?");
    }

    #[test]
    fn test_build_prompt_without_context() {
        let prompt = build_prompt("what is rust?", None);
        assert_eq!(
            prompt,
            "Question: what is rust?\nAnswer concisely using your knowledge."
        );
    }

    #[test]
    fn test_build_prompt_with_context() {
        let snippet = ContextSnippet {
            summary: "Rust is a programming language.".to_string(),
            citations: vec![],
            url: None,
        };

        let prompt = build_prompt("what is rust?", Some(&snippet));
        assert!(prompt.starts_with("Context: Rust is a programming language."));
        assert!(prompt.contains("Question: what is rust?"));
        assert!(prompt.ends_with("Answer concisely."));
    }
}
