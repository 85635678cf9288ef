//! Interview session: API client, wire types, and the per-session runner.

pub mod client;
pub mod runner;
pub mod types;

pub use client::{ApiError, HttpInterviewApi, InterviewApi};
pub use runner::{InterviewRunner, InterviewSummary, QuestionOutcome, QuestionReady};
pub use types::{CreatedInterview, Interview, NewQuestion, Question, ResponseRecord};
