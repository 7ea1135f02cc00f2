#[cfg(test)]
pub mod fixtures {
    use crate::models::domain::{
        question::{Choice, Pair},
        ExamDefinition, Question, QuestionBody,
    };

    /// Fixed "now" for tests driven by a manual clock.
    pub const START_MS: i64 = 1_700_000_000_000;

    fn choice(id: &str, text: &str, is_correct: bool) -> Choice {
        Choice {
            id: id.to_string(),
            text: text.to_string(),
            is_correct,
        }
    }

    fn pair(id: &str, left: &str, right: &str) -> Pair {
        Pair {
            id: id.to_string(),
            left_text: left.to_string(),
            right_text: right.to_string(),
        }
    }

    fn question(id: &str, text: &str, points: u32, body: QuestionBody) -> Question {
        Question {
            id: id.to_string(),
            text: text.to_string(),
            points,
            body,
        }
    }

    /// One question of every type.
    pub fn sample_exam() -> ExamDefinition {
        ExamDefinition {
            id: "exam-1".to_string(),
            code: "GEO101".to_string(),
            title: "Geography basics".to_string(),
            description: Some("Capitals, rivers and a little chemistry".to_string()),
            duration: 30,
            shuffle_questions: false,
            questions: vec![
                question(
                    "q-mc",
                    "What is the capital of Italy?",
                    2,
                    QuestionBody::MultipleChoice {
                        choices: vec![choice("mc-1", "Rome", true), choice("mc-2", "Milan", false)],
                    },
                ),
                question(
                    "q-multi",
                    "Which of these are rivers?",
                    3,
                    QuestionBody::MultiSelect {
                        choices: vec![
                            choice("m-1", "Danube", true),
                            choice("m-2", "Alps", false),
                            choice("m-3", "Rhine", true),
                        ],
                    },
                ),
                question(
                    "q-tf",
                    "The Sahara is in South America.",
                    1,
                    QuestionBody::TrueFalse { correct: false },
                ),
                question(
                    "q-fill",
                    "[] is on the river [].",
                    2,
                    QuestionBody::FillBlank {
                        answers: vec!["Paris".to_string(), "Seine".to_string()],
                    },
                ),
                question(
                    "q-clue",
                    "Plants release [].",
                    1,
                    QuestionBody::FillBlankClue {
                        answers: vec!["Oxygen".to_string()],
                        clue: "oxygen, nitrogen".to_string(),
                    },
                ),
                question(
                    "q-match",
                    "Match each country with its capital.",
                    3,
                    QuestionBody::Matching {
                        pairs: vec![
                            pair("p-1", "France", "Paris"),
                            pair("p-2", "Spain", "Madrid"),
                            pair("p-3", "Japan", "Tokyo"),
                        ],
                    },
                ),
            ],
        }
    }

    pub fn shuffled_exam() -> ExamDefinition {
        ExamDefinition {
            code: "SHUF01".to_string(),
            shuffle_questions: true,
            ..sample_exam()
        }
    }
}

#[cfg(test)]
pub mod fakes {
    use std::sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    };

    use async_trait::async_trait;

    use crate::{
        errors::{AppError, AppResult},
        services::environment::{EnvironmentSignal, ProctorEnvironment, SignalSink, Subscription},
    };

    /// Scriptable proctoring environment. Signals are only delivered while a
    /// subscription is live.
    #[derive(Default)]
    pub struct FakeEnvironment {
        deny_fullscreen: AtomicBool,
        fullscreen: AtomicBool,
        fullscreen_requests: AtomicU32,
        exit_calls: AtomicU32,
        active_subscriptions: Arc<AtomicU32>,
        sink: Arc<Mutex<Option<SignalSink>>>,
    }

    impl FakeEnvironment {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn denying() -> Self {
            let env = Self::default();
            env.set_allow_fullscreen(false);
            env
        }

        pub fn set_allow_fullscreen(&self, allow: bool) {
            self.deny_fullscreen.store(!allow, Ordering::SeqCst);
        }

        /// Simulates the student leaving (or entering) fullscreen by themselves.
        pub fn set_fullscreen(&self, active: bool) {
            self.fullscreen.store(active, Ordering::SeqCst);
        }

        pub fn fullscreen_requests(&self) -> u32 {
            self.fullscreen_requests.load(Ordering::SeqCst)
        }

        pub fn exit_calls(&self) -> u32 {
            self.exit_calls.load(Ordering::SeqCst)
        }

        pub fn active_subscriptions(&self) -> u32 {
            self.active_subscriptions.load(Ordering::SeqCst)
        }

        /// Returns whether a live subscriber received the signal.
        pub fn emit(&self, signal: EnvironmentSignal) -> bool {
            let sink = self.sink.lock().expect("sink lock poisoned");
            match sink.as_ref() {
                Some(sink) => sink.send(signal).is_ok(),
                None => false,
            }
        }
    }

    #[async_trait]
    impl ProctorEnvironment for FakeEnvironment {
        async fn request_fullscreen(&self) -> AppResult<()> {
            self.fullscreen_requests.fetch_add(1, Ordering::SeqCst);
            if self.deny_fullscreen.load(Ordering::SeqCst) {
                return Err(AppError::Environment("Fullscreen request was denied".to_string()));
            }
            self.fullscreen.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn exit_fullscreen(&self) -> AppResult<()> {
            self.exit_calls.fetch_add(1, Ordering::SeqCst);
            self.fullscreen.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_fullscreen_active(&self) -> bool {
            self.fullscreen.load(Ordering::SeqCst)
        }

        fn subscribe(&self, sink: SignalSink) -> Subscription {
            self.active_subscriptions.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock().expect("sink lock poisoned") = Some(sink);

            let active = self.active_subscriptions.clone();
            let slot = self.sink.clone();
            Subscription::new(move || {
                active.fetch_sub(1, Ordering::SeqCst);
                if let Ok(mut slot) = slot.lock() {
                    *slot = None;
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::FakeEnvironment;
    use super::fixtures::*;
    use crate::services::environment::{EnvironmentSignal, ProctorEnvironment};

    #[test]
    fn sample_exam_covers_every_question_type() {
        let exam = sample_exam();
        let mut types: Vec<_> = exam.questions.iter().map(|q| q.question_type()).collect();
        types.dedup();
        assert_eq!(types.len(), 6);
        assert_eq!(exam.total_points(), 12);
    }

    #[test]
    fn fake_environment_drops_sink_on_cancel() {
        let env = FakeEnvironment::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut subscription = env.subscribe(tx);
        assert!(env.emit(EnvironmentSignal::WindowBlur));
        assert_eq!(rx.try_recv().ok(), Some(EnvironmentSignal::WindowBlur));

        subscription.cancel();
        assert!(!env.emit(EnvironmentSignal::WindowBlur));
        assert_eq!(env.active_subscriptions(), 0);
    }
}
