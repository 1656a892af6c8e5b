//! Narrative planner seam.
//!
//! The [`Planner`] is the LLM-facing contract of the workspace: it produces
//! the narrator's reply for a chat turn and, through [`Planner::generate`],
//! schema-constrained JSON for the extraction tasks (memory candidates,
//! movement inference, graph deltas). How the model is loaded, quantized, or
//! served is a backend concern.

use core::future::Future;

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;

use crate::json::parse_lenient;
use crate::message::Message;

/// Conversation handed to [`Planner::respond`].
#[derive(Debug, Clone, Default)]
pub struct PlannerRequest {
    messages: Vec<Message>,
}

impl PlannerRequest {
    /// Creates a request from the provided messages.
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self {
            messages: messages.into(),
        }
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the conversation messages.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consumes the request, yielding the owned messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Convenience helper that builds a single system + user request.
pub fn oneshot(system: impl Into<String>, user: impl Into<String>) -> PlannerRequest {
    PlannerRequest::new(vec![
        Message::system(system.into()),
        Message::user(user.into()),
    ])
}

/// Language model used for narration and structured extraction.
pub trait Planner: Send + Sync {
    /// Generates the complete reply for a conversation.
    fn respond(&self, request: PlannerRequest) -> impl Future<Output = crate::Result> + Send;

    /// Generates a JSON value conforming to `T`'s schema.
    ///
    /// The default implementation appends a schema instruction, parses the
    /// reply leniently, and retries exactly once with a correction prompt
    /// when the first reply is not valid JSON. Backends with native
    /// structured decoding should override this.
    fn generate<T: JsonSchema + DeserializeOwned + 'static + Send>(
        &self,
        request: PlannerRequest,
    ) -> impl Future<Output = crate::Result<T>> + Send {
        async { structured_generate(self, request).await }
    }
}

impl<P: Planner> Planner for &P {
    fn respond(&self, request: PlannerRequest) -> impl Future<Output = crate::Result> + Send {
        P::respond(self, request)
    }

    fn generate<T: JsonSchema + DeserializeOwned + 'static + Send>(
        &self,
        request: PlannerRequest,
    ) -> impl Future<Output = crate::Result<T>> + Send {
        P::generate(self, request)
    }
}

impl<P: Planner> Planner for std::sync::Arc<P> {
    fn respond(&self, request: PlannerRequest) -> impl Future<Output = crate::Result> + Send {
        P::respond(self, request)
    }

    fn generate<T: JsonSchema + DeserializeOwned + 'static + Send>(
        &self,
        request: PlannerRequest,
    ) -> impl Future<Output = crate::Result<T>> + Send {
        P::generate(self, request)
    }
}

async fn structured_generate<P, T>(planner: &P, mut request: PlannerRequest) -> crate::Result<T>
where
    P: Planner + ?Sized,
    T: JsonSchema + DeserializeOwned + 'static + Send,
{
    let schema = schema_for!(T);
    let schema_json = serde_json::to_string(&schema)?;
    request.push(Message::system(format!(
        "Respond with a single JSON value matching this JSON Schema. \
         Output only the JSON value, no prose and no code fences.\n{schema_json}"
    )));

    let raw = planner.respond(request.clone()).await?;
    match parse_lenient::<T>(&raw) {
        Ok(value) => Ok(value),
        Err(_) => {
            let sample: String = raw.chars().take(200).collect();
            request.push(Message::assistant(raw));
            request.push(Message::user(format!(
                "The previous response was not valid JSON: {sample}\n\
                 Return ONLY a valid JSON value with the required structure."
            )));
            let retried = planner.respond(request).await?;
            parse_lenient::<T>(&retried)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Mutex;

    /// Planner that replays a scripted queue of replies.
    struct Scripted {
        replies: Mutex<Vec<String>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            let mut queued: Vec<String> = replies.iter().map(|r| (*r).to_string()).collect();
            queued.reverse();
            Self {
                replies: Mutex::new(queued),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Planner for Scripted {
        async fn respond(&self, _request: PlannerRequest) -> crate::Result {
            *self.calls.lock().unwrap() += 1;
            Ok(self.replies.lock().unwrap().pop().unwrap_or_default())
        }
    }

    #[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
    struct Verdict {
        go: bool,
    }

    #[tokio::test]
    async fn generate_parses_first_reply() {
        let planner = Scripted::new(&[r#"{"go":true}"#]);
        let verdict: Verdict = planner.generate(oneshot("sys", "usr")).await.unwrap();
        assert!(verdict.go);
        assert_eq!(planner.calls(), 1);
    }

    #[tokio::test]
    async fn generate_retries_once_on_bad_json() {
        let planner = Scripted::new(&["that is not json", r#"{"go":false}"#]);
        let verdict: Verdict = planner.generate(oneshot("sys", "usr")).await.unwrap();
        assert!(!verdict.go);
        assert_eq!(planner.calls(), 2);
    }

    #[tokio::test]
    async fn generate_gives_up_after_second_failure() {
        let planner = Scripted::new(&["nope", "still nope"]);
        let result: crate::Result<Verdict> = planner.generate(oneshot("sys", "usr")).await;
        assert!(result.is_err());
        assert_eq!(planner.calls(), 2);
    }

    #[tokio::test]
    async fn oneshot_builds_system_then_user() {
        let request = oneshot("a", "b");
        let roles: Vec<_> = request.messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![crate::Role::System, crate::Role::User]);
    }
}
