//! HTTP API wire formats and the status computation behind `/status`.
//!
//! The `live` tests need a running server backed by PostgreSQL. Start one,
//! set AUTOTEST_SERVER_URL and run with `--ignored`.

use autotest_engine::{
    reconcile, HistorySummary, RemoteTestProgress, RemoteTestResult, SessionStatus,
    StatusSource, TestMode,
};
use serde_json::json;

const T0: u64 = 1_706_745_600_000;

fn create_result(test_id: &str, score: u32, completed_at: u64) -> RemoteTestResult {
    RemoteTestResult {
        user_id: "u1".into(),
        test_id: test_id.into(),
        category: "B".into(),
        score,
        total_questions: 30,
        passed: score >= 27,
        completed_at,
        test_mode: TestMode::Exam,
    }
}

fn create_progress(test_id: &str, answered: usize, updated_at: u64) -> RemoteTestProgress {
    let answers: Vec<Option<String>> = (0..answered).map(|_| Some("A".to_string())).collect();
    RemoteTestProgress::from_answers("u1", test_id, "B", answered, &answers, updated_at)
}

#[cfg(test)]
mod wire_format_tests {
    use super::*;

    #[test]
    fn test_progress_body_is_sparse_camel_case() {
        let mut progress = create_progress("test1", 0, T0);
        progress.answers.insert(7, "C".into());
        progress.current_question = 7;

        let body = serde_json::to_value(&progress).unwrap();
        assert_eq!(
            body,
            json!({
                "userId": "u1",
                "testId": "test1",
                "category": "B",
                "currentQuestion": 7,
                "answers": {"7": "C"},
                "updatedAt": T0
            })
        );
    }

    #[test]
    fn test_absent_progress_is_null() {
        let parsed: Option<RemoteTestProgress> = serde_json::from_str("null").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_result_body_defaults_to_exam_mode() {
        let parsed: RemoteTestResult = serde_json::from_value(json!({
            "userId": "u1",
            "testId": "test1",
            "category": "B",
            "score": 26,
            "totalQuestions": 30,
            "passed": false,
            "completedAt": T0
        }))
        .unwrap();
        assert_eq!(parsed.test_mode, TestMode::Exam);

        let body = serde_json::to_value(create_result("test1", 28, T0)).unwrap();
        assert_eq!(body["testMode"], "exam");
        assert_eq!(body["totalQuestions"], 30);
    }

    #[test]
    fn test_me_and_error_bodies() {
        #[derive(serde::Deserialize)]
        struct Me {
            id: String,
        }
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let me: Me = serde_json::from_str(r#"{"id":"u1"}"#).unwrap();
        assert_eq!(me.id, "u1");

        let err: ErrorBody = serde_json::from_str(r#"{"error":"Unauthorized"}"#).unwrap();
        assert_eq!(err.error, "Unauthorized");
    }
}

#[cfg(test)]
mod status_tests {
    use super::*;

    #[test]
    fn test_latest_result_wins_over_older_attempts() {
        let results = vec![
            create_result("test1", 12, T0),
            create_result("test1", 29, T0 + 60_000),
        ];
        let statuses = reconcile(&results, &[], &[]);

        let status = statuses.get("test1").unwrap();
        assert_eq!(status.status, SessionStatus::Approved);
        assert_eq!(status.score, Some(29));
        assert_eq!(HistorySummary::from_results(&results).tests_completed, 2);
    }

    #[test]
    fn test_newer_progress_reopens_a_graded_test() {
        let results = vec![create_result("test1", 28, T0)];
        let progress = vec![create_progress("test1", 3, T0 + 1)];

        let status = reconcile(&results, &progress, &[]).get("test1").cloned().unwrap();
        assert_eq!(status.status, SessionStatus::Incomplete);
        assert_eq!(status.source, StatusSource::RemoteProgress);
        assert_eq!(status.current_question, Some(3));
    }

    #[test]
    fn test_stale_progress_row_does_not_hide_result() {
        // Result insert succeeded, progress delete did not.
        let results = vec![create_result("test1", 20, T0 + 5_000)];
        let progress = vec![create_progress("test1", 10, T0 + 4_000)];

        let statuses = reconcile(&results, &progress, &[]);
        assert_eq!(statuses.get("test1").unwrap().status, SessionStatus::Failed);

        let summary = statuses.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 1);
    }
}

#[cfg(test)]
mod live {
    use super::*;

    fn server_url() -> String {
        std::env::var("AUTOTEST_SERVER_URL").unwrap_or_else(|_| "http://localhost:3000".into())
    }

    #[tokio::test]
    #[ignore = "requires a running server and database"]
    async fn test_progress_round_trip() {
        let client = reqwest::Client::new();
        let base = server_url();
        let token = format!("live-{}", std::process::id());
        let progress = create_progress("live-test", 2, T0);

        let response = client
            .put(format!("{}/progress/live-test", base))
            .bearer_auth(&token)
            .json(&progress)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let fetched: Option<RemoteTestProgress> = client
            .get(format!("{}/progress/live-test", base))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let fetched = fetched.unwrap();
        assert_eq!(fetched.user_id, token);
        assert_eq!(fetched.answers, progress.answers);

        let response = client
            .delete(format!("{}/progress/live-test", base))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

        let fetched: Option<RemoteTestProgress> = client
            .get(format!("{}/progress/live-test", base))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    #[ignore = "requires a running server and database"]
    async fn test_requests_without_token_are_unauthorized() {
        let response = reqwest::get(format!("{}/me", server_url())).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    }
}
