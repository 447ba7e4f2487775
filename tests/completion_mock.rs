use async_trait::async_trait;
use chrono::NaiveDate;
use microplan::components::completion::CompletionService;
use microplan::components::scheduler::parser::parse_schedule;
use microplan::error::{AppResult, Error};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Mock completion service replaying scripted responses
#[derive(Default)]
pub struct MockCompletion {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every user prompt the mock has been asked to complete
    pub async fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> AppResult<String> {
        self.prompts.lock().await.push(user_prompt.to_string());

        let mut responses = self.responses.lock().await;
        match responses.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(Error::CompletionUnavailable(reason)),
            None => Err(Error::CompletionUnavailable(
                "no scripted response left".to_string(),
            )),
        }
    }
}

/// The mock replays responses in order and records prompts
#[tokio::test]
async fn test_mock_completion_replay() {
    let mock = MockCompletion::with_responses(vec![
        Ok("first".to_string()),
        Err("connection refused".to_string()),
    ]);

    let first = mock.complete("system", "prompt one").await.unwrap();
    assert_eq!(first, "first");

    let second = mock.complete("system", "prompt two").await;
    assert!(matches!(second, Err(Error::CompletionUnavailable(_))));

    let prompts = mock.seen_prompts().await;
    assert_eq!(prompts, vec!["prompt one", "prompt two"]);
}

/// A scripted response flows through the parser like a real one
#[tokio::test]
async fn test_mock_response_parses() {
    let mock = MockCompletion::with_responses(vec![Ok(r#"Sure, here you go:
[{"task_name": "Laundry", "task_desc": "Wash clothes", "rec_freq": "none", "rec_num": 0, "start_time": "07:30", "end_time": "08:00"}]"#
        .to_string())]);

    let response = mock.complete("system", "schedule my day").await.unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let parsed = parse_schedule(&response, date, "UTC".parse().unwrap()).unwrap();

    assert_eq!(parsed.entries.len(), 1);
    assert_eq!(parsed.entries[0].title, "Laundry");
    assert!(parsed.dropped.is_empty());
}
