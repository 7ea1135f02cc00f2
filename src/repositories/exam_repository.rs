use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use tokio::sync::RwLock;
use validator::Validate;

use crate::{
    auth::SessionProvider,
    config::Config,
    errors::{AppError, AppResult},
    models::{
        domain::{AttemptRecord, ExamDefinition, StudentExam},
        dto::{SubmitAttemptRequest, SubmitAttemptResponse},
    },
    services::grading_service::GradingService,
};

/// The exam server as seen from a student session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Student-safe projection of the exam behind `code`.
    async fn fetch_exam(&self, code: &str) -> AppResult<StudentExam>;
    async fn submit_attempt(
        &self,
        code: &str,
        request: &SubmitAttemptRequest,
    ) -> AppResult<SubmitAttemptResponse>;
}

pub struct HttpExamRepository {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl HttpExamRepository {
    pub fn new(config: &Config, session: Arc<dyn SessionProvider>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.access_token() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    fn check_status(response: Response, code: &str) -> AppResult<Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Exam '{}' not found", code)));
        }
        if !status.is_success() {
            return Err(AppError::Network(format!(
                "Exam server responded with {} for exam '{}'",
                status, code
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ExamRepository for HttpExamRepository {
    async fn fetch_exam(&self, code: &str) -> AppResult<StudentExam> {
        let request = self.authorize(self.client.get(self.url(&format!("exams/{}", code))));
        let response = Self::check_status(request.send().await?, code)?;

        let exam = response.json::<StudentExam>().await?;
        log::info!("Fetched exam '{}' with {} questions", code, exam.questions.len());
        Ok(exam)
    }

    async fn submit_attempt(
        &self,
        code: &str,
        request: &SubmitAttemptRequest,
    ) -> AppResult<SubmitAttemptResponse> {
        let http_request = self
            .authorize(self.client.post(self.url(&format!("exams/{}/attempt", code))))
            .json(request);
        let response = Self::check_status(http_request.send().await?, code)?;

        let result = response.json::<SubmitAttemptResponse>().await?;
        log::info!("Attempt for exam '{}' scored {}", code, result.score);
        Ok(result)
    }
}

/// In-process scoring endpoint: serves student views of the exams it holds
/// and grades submissions against the full definitions.
#[derive(Default)]
pub struct InMemoryExamRepository {
    exams: Arc<RwLock<HashMap<String, ExamDefinition>>>,
    attempts: Arc<RwLock<Vec<AttemptRecord>>>,
}

impl InMemoryExamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exam(exam: ExamDefinition) -> Self {
        let mut exams = HashMap::new();
        exams.insert(exam.code.clone(), exam);
        Self {
            exams: Arc::new(RwLock::new(exams)),
            attempts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.read().await.clone()
    }
}

#[async_trait]
impl ExamRepository for InMemoryExamRepository {
    async fn fetch_exam(&self, code: &str) -> AppResult<StudentExam> {
        let exams = self.exams.read().await;
        exams
            .get(code)
            .map(ExamDefinition::student_view)
            .ok_or_else(|| AppError::NotFound(format!("Exam '{}' not found", code)))
    }

    async fn submit_attempt(
        &self,
        code: &str,
        request: &SubmitAttemptRequest,
    ) -> AppResult<SubmitAttemptResponse> {
        request.validate()?;

        let record = {
            let exams = self.exams.read().await;
            let exam = exams
                .get(code)
                .ok_or_else(|| AppError::NotFound(format!("Exam '{}' not found", code)))?;
            GradingService::grade_attempt(exam, request)
        };

        let score = record.score;
        self.attempts.write().await.push(record);

        Ok(SubmitAttemptResponse {
            success: true,
            score,
        })
    }
}
