//! Test definitions, session configuration and grading.
//!
//! A test definition is what the question bank serves: a titled list of
//! multiple-choice questions, each with exactly one canonical answer.

use crate::{error::Result, Category, Error, TestId};
use serde::{Deserialize, Serialize};

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question text
    pub question: String,
    /// Offered options, in display order
    pub options: Vec<String>,
    /// The canonical answer (one of `options`)
    pub answer: String,
    /// Optional illustration URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Question {
    /// Whether `option` is one of the offered options.
    pub fn offers(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// A full test as served by the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: TestId,
    pub title: String,
    pub category: Category,
    pub questions: Vec<Question>,
}

impl TestDefinition {
    /// Number of questions.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Reject definitions a session cannot run on.
    pub fn validate(&self) -> Result<()> {
        if self.questions.is_empty() {
            return Err(Error::EmptyTest(self.id.clone()));
        }

        for (index, question) in self.questions.iter().enumerate() {
            if question.options.is_empty() {
                return Err(Error::InvalidTest(format!(
                    "question {} of '{}' has no options",
                    index, self.id
                )));
            }
            if !question.offers(&question.answer) {
                return Err(Error::InvalidTest(format!(
                    "answer of question {} of '{}' is not among its options",
                    index, self.id
                )));
            }
        }

        Ok(())
    }
}

/// Default number of correct answers needed to pass.
pub const DEFAULT_PASSING_THRESHOLD: u32 = 27;

/// Default time budget for one attempt (30 minutes).
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30 * 60;

/// Per-category session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    /// Minimum number of correct answers for `passed`
    pub passing_threshold: u32,
    /// Countdown budget in seconds
    pub time_limit_secs: u32,
}

impl TestConfig {
    pub fn new(passing_threshold: u32, time_limit_secs: u32) -> Self {
        Self {
            passing_threshold,
            time_limit_secs,
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PASSING_THRESHOLD, DEFAULT_TIME_LIMIT_SECS)
    }
}

/// Tally of a graded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
}

impl Grade {
    pub fn total(&self) -> u32 {
        self.correct + self.incorrect + self.unanswered
    }

    pub fn passed(&self, config: &TestConfig) -> bool {
        self.correct >= config.passing_threshold
    }
}

/// Compare each answer to its question's canonical answer.
///
/// Questions without a matching answer slot count as unanswered, so the tally
/// always covers every question of the definition.
pub fn grade(definition: &TestDefinition, answers: &[Option<String>]) -> Grade {
    let mut grade = Grade {
        correct: 0,
        incorrect: 0,
        unanswered: 0,
    };

    for (index, question) in definition.questions.iter().enumerate() {
        match answers.get(index).and_then(Option::as_deref) {
            None => grade.unanswered += 1,
            Some(answer) if answer == question.answer => grade.correct += 1,
            Some(_) => grade.incorrect += 1,
        }
    }

    grade
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(answer: &str) -> Question {
        Question {
            question: "Which sign means stop?".into(),
            options: vec!["A".into(), "B".into(), "C".into()],
            answer: answer.into(),
            image: None,
        }
    }

    fn definition(n: usize) -> TestDefinition {
        TestDefinition {
            id: "test1".into(),
            title: "Test 001".into(),
            category: "B".into(),
            questions: (0..n).map(|_| question("A")).collect(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_test() {
        assert!(definition(3).validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_test() {
        let err = definition(0).validate().unwrap_err();
        assert_eq!(err, Error::EmptyTest("test1".into()));
    }

    #[test]
    fn validate_rejects_answer_outside_options() {
        let mut def = definition(2);
        def.questions[1].answer = "Z".into();
        assert!(matches!(def.validate(), Err(Error::InvalidTest(_))));
    }

    #[test]
    fn grade_counts_each_bucket() {
        let def = definition(4);
        let answers = vec![Some("A".into()), Some("B".into()), None, Some("A".into())];
        let grade = grade(&def, &answers);

        assert_eq!(grade.correct, 2);
        assert_eq!(grade.incorrect, 1);
        assert_eq!(grade.unanswered, 1);
        assert_eq!(grade.total(), 4);
    }

    #[test]
    fn grade_treats_missing_slots_as_unanswered() {
        let def = definition(3);
        let grade = grade(&def, &[Some("A".into())]);
        assert_eq!(grade.unanswered, 2);
        assert_eq!(grade.total(), 3);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let config = TestConfig::default();
        let at = Grade {
            correct: 27,
            incorrect: 3,
            unanswered: 0,
        };
        let below = Grade {
            correct: 26,
            incorrect: 4,
            unanswered: 0,
        };
        assert!(at.passed(&config));
        assert!(!below.passed(&config));
    }

    #[test]
    fn image_is_optional_in_json() {
        let json = r#"{"question": "Q", "options": ["A", "B"], "answer": "A"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert!(q.image.is_none());
        assert!(q.offers("B"));
        assert!(!q.offers("C"));
    }
}
