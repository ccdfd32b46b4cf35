//! Interactive questions asked by `dev`, `save`, and `push`.

use paper_shared::Result;

/// Asks the user for input. The CLI answers from the terminal; tests script
/// the answers.
pub trait Prompter {
    /// Free-text answer. An empty reply takes `default` when there is one.
    fn text(&self, question: &str, default: Option<&str>) -> Result<String>;

    /// Yes/no answer. An empty reply takes `default`.
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;
}

/// Prompter that replays canned answers in order.
#[cfg(test)]
pub(crate) struct ScriptedPrompter {
    answers: std::cell::RefCell<std::collections::VecDeque<String>>,
    pub(crate) asked: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub(crate) fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: std::cell::RefCell::new(answers.into_iter().map(Into::into).collect()),
            asked: Default::default(),
        }
    }

    fn next(&self, question: &str) -> String {
        self.asked.borrow_mut().push(question.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn text(&self, question: &str, default: Option<&str>) -> Result<String> {
        let answer = self.next(question);
        Ok(match (answer.is_empty(), default) {
            (true, Some(d)) => d.to_string(),
            _ => answer,
        })
    }

    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        let answer = self.next(question);
        Ok(match answer.as_str() {
            "" => default,
            a => a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"),
        })
    }
}
