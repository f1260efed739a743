//! Agent 编排集成测试：挂起/恢复、迭代上限、工具失败、推理引擎失败、取消

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use mailbee::agent::AgentServices;
    use mailbee::config::{AgentSection, AppConfig};
    use mailbee::core::{FixedClock, Orchestrator};
    use mailbee::llm::{LlmClient, MockLlmClient};
    use mailbee::mail::{Email, InMemoryMailStore, MailStore, Task, TaskContext};
    use mailbee::memory::Message;
    use mailbee::scheduling::MeetingStatus;
    use mailbee::tools::{Tool, ToolKind, ToolRegistry};
    use tokio_util::sync::CancellationToken;

    const NOW: &str = "2024-01-01T10:00:00";

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn email(body: &str) -> Email {
        Email {
            id: "e1".into(),
            thread_id: "t1".into(),
            user_id: "me@example.com".into(),
            subject: "Project sync".into(),
            sender: "Bob <bob@example.com>".into(),
            snippet: None,
            body: Some(body.into()),
            date: at("2023-12-31T09:00:00"),
            snoozed_until: None,
        }
    }

    async fn setup(llm: Arc<MockLlmClient>, body: &str) -> (Orchestrator, Arc<InMemoryMailStore>, Task) {
        let store = Arc::new(InMemoryMailStore::new());
        let email = email(body);
        store.upsert_email(email.clone()).await.unwrap();
        let services = AgentServices::new(
            &AppConfig::default(),
            llm,
            store.clone(),
            Arc::new(FixedClock(at(NOW))),
        );
        let orchestrator = Orchestrator::new(services, AgentSection::default());
        (orchestrator, store, Task::from_email(&email, "me@example.com"))
    }

    /// 决策请求带系统提示；工具内部的 LLM 调用只有一条 user 消息
    fn is_decision(messages: &[Message]) -> bool {
        messages.len() > 1
    }

    fn observations(messages: &[Message]) -> usize {
        messages
            .iter()
            .filter(|m| m.content.starts_with("Observation:"))
            .count()
    }

    fn resumed(messages: &[Message]) -> bool {
        messages
            .get(1)
            .is_some_and(|m| m.content.contains("The user answered your earlier question"))
    }

    #[tokio::test]
    async fn test_suspend_then_resume() {
        let llm = Arc::new(MockLlmClient::with_responder(|messages| {
            if resumed(messages) {
                Ok(r#"{"thought": "time is known", "final_answer": "Meeting noted for 3pm."}"#.into())
            } else {
                Ok(r#"{"thought": "no time given", "final_answer": "<<REQUEST_INFO: What time?>>"}"#.into())
            }
        }));
        let (orchestrator, _store, task) = setup(llm.clone(), "Can we meet?").await;

        let first = orchestrator.run(&task).await;
        assert!(first.needs_input);
        assert_eq!(first.prompt.as_deref(), Some("What time?"));
        assert!(first.error.is_none());

        let second = orchestrator.run(&task.with_user_input("3pm")).await;
        assert!(!second.needs_input);
        assert_eq!(second.prompt, None);
        assert_eq!(second.responses, vec!["Meeting noted for 3pm.".to_string()]);
        assert!(second.responses.iter().all(|r| !r.contains("REQUEST_INFO")));

        let last_call = llm.calls().pop().unwrap();
        assert!(last_call[1].content.contains("\"3pm\""));
    }

    #[tokio::test]
    async fn test_resumed_run_never_suspends_again() {
        let llm = Arc::new(MockLlmClient::new().with_fallback("<<REQUEST_INFO: What time?>>"));
        let (orchestrator, _store, task) = setup(llm, "Can we meet?").await;
        let result = orchestrator.run(&task.with_user_input("3pm")).await;
        assert!(!result.needs_input);
        assert_eq!(result.responses.len(), 1);
        assert!(!result.responses[0].contains("REQUEST_INFO"));
    }

    #[tokio::test]
    async fn test_ceiling_caps_dispatches_at_five() {
        let llm = Arc::new(
            MockLlmClient::new()
                .with_fallback(r#"{"thought": "again", "action": "snooze_email", "action_input": "1"}"#),
        );
        let (orchestrator, store, task) = setup(llm.clone(), "Later please").await;

        let result = orchestrator.run(&task).await;
        assert_eq!(result.structured_thoughts.actions.len(), 5);
        assert_eq!(llm.call_count(), 5);
        assert!(!result.needs_input);
        assert!(result.error.is_none());
        assert!(result.responses[0].starts_with("Stopped after 5 steps (5 tool calls)"));
        assert_eq!(store.snoozed_until("e1").await.unwrap(), Some(at("2024-01-02T10:00:00")));
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_observation() {
        let llm = Arc::new(MockLlmClient::with_script([
            r#"{"thought": "snooze", "action": "snooze_email", "action_input": "-2"}"#,
            r#"{"thought": "bad input", "final_answer": "Could not snooze."}"#,
        ]));
        let (orchestrator, store, task) = setup(llm, "Later please").await;

        let result = orchestrator.run(&task).await;
        assert!(result.error.is_none());
        assert_eq!(result.responses, vec!["Could not snooze.".to_string()]);
        let observation = &result.structured_thoughts.observations[0].text;
        assert!(observation.starts_with("Error:"));
        assert!(observation.contains("Days cannot be negative"));
        assert_eq!(store.snoozed_until("e1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_decision_is_recoverable() {
        let llm = Arc::new(MockLlmClient::with_script([
            r#"{"thought": "classify", "action": "filter_email", "action_input": "#,
            r#"{"thought": "fixed", "final_answer": "Done."}"#,
        ]));
        let (orchestrator, _store, task) = setup(llm, "hello").await;

        let result = orchestrator.run(&task).await;
        assert_eq!(result.responses, vec!["Done.".to_string()]);
        assert!(result.structured_thoughts.observations[0].text.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_llm_failure_yields_error_result() {
        let llm = Arc::new(MockLlmClient::failing("service unavailable"));
        let (orchestrator, _store, task) = setup(llm, "hello").await;

        let result = orchestrator.run(&task).await;
        assert_eq!(result.error.as_deref(), Some("LLM error: service unavailable"));
        assert_eq!(
            result.responses,
            vec!["Agent processing failed: LLM error: service unavailable".to_string()]
        );
        assert!(!result.needs_input);
        assert!(result.thoughts.iter().any(|l| l == "[step 1] LLM error"));
    }

    #[tokio::test]
    async fn test_urgent_email_classified_important() {
        let llm = Arc::new(MockLlmClient::with_responder(|messages| {
            if !is_decision(messages) {
                return Err("unexpected tool completion".into());
            }
            match observations(messages) {
                0 => Ok(r#"{"thought": "classify first", "action": "filter_email", "action_input": "urgent: reset password immediately"}"#.into()),
                _ => Ok(r#"{"thought": "important", "final_answer": "Flagged as important."}"#.into()),
            }
        }));
        let (orchestrator, _store, task) =
            setup(llm, "urgent: reset password immediately").await;

        let result = orchestrator.run(&task).await;
        assert_eq!(result.responses, vec!["Flagged as important.".to_string()]);
        let s = &result.structured_thoughts;
        assert_eq!(s.actions[0].tool, "filter_email");
        assert_eq!(s.observations[0].text, "Category: IMPORTANT");
        assert_eq!(s.observations[0].step, s.actions[0].step);
        assert!(result
            .thoughts
            .iter()
            .any(|l| l == "[step 1] Observation: Category: IMPORTANT"));
    }

    #[tokio::test]
    async fn test_schedule_meeting_end_to_end() {
        let llm = Arc::new(MockLlmClient::with_responder(|messages| {
            if !is_decision(messages) {
                return Ok(r#"```json
{"title": "Project sync", "start_time": "2024-01-02T17:00:00", "attendees": ["Alice@Example.com", "not-an-address"]}
```"#
                    .into());
            }
            match observations(messages) {
                0 => Ok(r#"{"thought": "book it", "action": "schedule_meeting", "action_input": "Project sync tomorrow at 5pm"}"#.into()),
                _ => Ok(r#"{"final_answer": "Meeting booked."}"#.into()),
            }
        }));
        let (orchestrator, store, task) = setup(llm, "Can we sync tomorrow at 5pm?").await;

        let result = orchestrator.run(&task).await;
        assert_eq!(result.responses, vec!["Meeting booked.".to_string()]);

        let meetings = store.meetings_for_email("e1").await.unwrap();
        assert_eq!(meetings.len(), 1);
        let m = &meetings[0];
        assert_eq!(m.start_time, at("2024-01-02T17:00:00"));
        assert_eq!(m.end_time, at("2024-01-02T18:00:00"));
        assert_eq!(m.status, MeetingStatus::Scheduled);
        assert_eq!(m.platform, "internal");
        let attendees: Vec<&str> = m.attendees.iter().map(String::as_str).collect();
        assert_eq!(attendees, vec!["alice@example.com", "bob@example.com", "me@example.com"]);
        assert!(result.structured_thoughts.observations[0]
            .text
            .starts_with("Meeting 'Project sync' scheduled on internal"));
    }

    #[tokio::test]
    async fn test_repeated_snooze_is_idempotent() {
        let responder = |messages: &[Message]| match observations(messages) {
            0 => Ok(r#"{"action": "snooze_email", "action_input": "2"}"#.to_string()),
            _ => Ok(r#"{"final_answer": "Snoozed."}"#.to_string()),
        };
        let llm = Arc::new(MockLlmClient::with_responder(responder));
        let (orchestrator, store, task) = setup(llm, "Later please").await;

        let first = orchestrator.run(&task).await;
        let after_first = store.snoozed_until("e1").await.unwrap();
        let second = orchestrator.run(&task).await;
        let after_second = store.snoozed_until("e1").await.unwrap();

        assert_eq!(after_first, Some(at("2024-01-03T10:00:00")));
        assert_eq!(after_first, after_second);
        assert_eq!(
            first.structured_thoughts.observations[0].text,
            second.structured_thoughts.observations[0].text
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_error() {
        let llm = Arc::new(MockLlmClient::new());
        let (orchestrator, _store, task) = setup(llm.clone(), "hello").await;
        let token = CancellationToken::new();
        token.cancel();

        let result = orchestrator.run_with_cancel(&task, token).await;
        assert_eq!(result.error.as_deref(), Some("Cancelled"));
        assert_eq!(result.responses, vec!["Agent processing failed: Cancelled".to_string()]);
        assert_eq!(llm.call_count(), 0);
    }

    struct CannedSummary;

    #[async_trait]
    impl Tool for CannedSummary {
        fn kind(&self) -> ToolKind {
            ToolKind::SummarizeEmail
        }

        fn description(&self) -> &str {
            "Summarize. Input: text"
        }

        async fn execute(&self, _input: &str) -> Result<String, String> {
            Ok("canned summary".into())
        }
    }

    #[tokio::test]
    async fn test_registrar_replaces_default_tool() {
        let llm = Arc::new(MockLlmClient::with_script([
            r#"{"action": "Summarize-Email", "action_input": "hello"}"#,
            r#"{"final_answer": "ok"}"#,
        ]));
        let (orchestrator, _store, task) = setup(llm, "hello").await;
        let orchestrator = orchestrator.with_registrar(Arc::new(|registry: &mut ToolRegistry, _ctx: &TaskContext| {
            registry.register(CannedSummary);
        }));

        let result = orchestrator.run(&task).await;
        assert_eq!(result.structured_thoughts.observations[0].text, "canned summary");
    }

    /// 第一次决策挂起 3 秒，之后立即结束
    struct StallsOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for StallsOnce {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
            Ok(r#"{"thought": "retry", "final_answer": "Handled."}"#.to_string())
        }
    }

    #[tokio::test]
    async fn test_slow_decision_times_out_and_run_continues() {
        let store = Arc::new(InMemoryMailStore::new());
        let email = email("Quick question");
        store.upsert_email(email.clone()).await.unwrap();
        let llm = Arc::new(StallsOnce {
            calls: AtomicUsize::new(0),
        });
        let services = AgentServices::new(
            &AppConfig::default(),
            llm.clone(),
            store,
            Arc::new(FixedClock(at(NOW))),
        );
        let agent = AgentSection {
            decision_timeout_secs: 1,
            ..AgentSection::default()
        };
        let orchestrator = Orchestrator::new(services, agent);

        let result = orchestrator.run(&Task::from_email(&email, "me@example.com")).await;
        assert!(result.error.is_none());
        assert_eq!(result.responses, vec!["Handled.".to_string()]);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
        let obs = &result.structured_thoughts.observations;
        assert_eq!(obs.len(), 1);
        assert!(obs[0].text.starts_with("Error: reasoning step timed out"));
    }
}
