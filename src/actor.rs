//! Local command handling
//!
//! The coordinator hands each transcript to an actor; an actor that takes
//! ownership of the text suppresses any further processing of it.

/// Maps recognized text to a local action
pub trait CommandActor: Send + Sync {
    /// Whether this actor would take ownership of `text`
    fn can_handle(&self, text: &str) -> bool;

    /// Run the action for `text` if one matches.
    ///
    /// Side-effecting; returns whether the actor took ownership of the
    /// text.
    fn handle(&self, text: &str) -> bool;

    /// Phrases to bias the recognizer toward
    fn phrases(&self) -> Vec<String>;
}

type CommandFn = Box<dyn Fn(&str) + Send + Sync>;

struct Command {
    keyword: String,
    run: CommandFn,
}

/// Keyword-matching actor: first registered keyword found in the
/// transcript wins. Matching is case-insensitive.
#[derive(Default)]
pub struct KeywordActor {
    commands: Vec<Command>,
}

impl KeywordActor {
    /// Create an actor with no registered commands
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `run` for transcripts containing `keyword`
    pub fn add_keyword<F>(&mut self, keyword: &str, run: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.commands.push(Command {
            keyword: keyword.to_lowercase(),
            run: Box::new(run),
        });
    }

    fn find(&self, text: &str) -> Option<&Command> {
        let normalized = text.to_lowercase();
        self.commands.iter().find(|c| normalized.contains(&c.keyword))
    }
}

impl CommandActor for KeywordActor {
    fn can_handle(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    fn handle(&self, text: &str) -> bool {
        self.find(text).is_some_and(|command| {
            tracing::debug!(keyword = %command.keyword, "running command");
            (command.run)(text);
            true
        })
    }

    fn phrases(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.keyword.clone()).collect()
    }
}
