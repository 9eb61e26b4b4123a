pub mod countdown;
pub mod session;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Frame;

pub use session::{Phase, QuizSession, SessionEvent};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    /// Number of poses the player has to hold for this question.
    pub poses: u32,
}

impl Question {
    pub fn new(prompt: impl Into<String>, poses: u32) -> Self {
        Self {
            prompt: prompt.into(),
            poses,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizDefinitionError {
    #[error("quiz has no questions")]
    Empty,
    #[error("question {index} ({prompt:?}) requires no poses")]
    NoPoses { index: u32, prompt: String },
}

/// Ordered list of questions. Question numbers are 1-based everywhere.
#[derive(Clone, Debug)]
pub struct QuizDefinition {
    questions: Vec<Question>,
}

impl QuizDefinition {
    pub fn new(questions: Vec<Question>) -> Result<Self, QuizDefinitionError> {
        if questions.is_empty() {
            return Err(QuizDefinitionError::Empty);
        }
        if let Some((idx, question)) = questions.iter().enumerate().find(|(_, q)| q.poses == 0) {
            return Err(QuizDefinitionError::NoPoses {
                index: idx as u32 + 1,
                prompt: question.prompt.clone(),
            });
        }
        Ok(Self { questions })
    }

    pub fn len(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn question(&self, number: u32) -> Option<&Question> {
        number
            .checked_sub(1)
            .and_then(|idx| self.questions.get(idx as usize))
    }

    pub fn poses_for(&self, number: u32) -> u32 {
        self.question(number).map(|q| q.poses).unwrap_or(0)
    }

    pub fn total_poses(&self) -> u32 {
        self.questions.iter().map(|q| q.poses).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionProgress {
    pub question_index: u32,
    pub pose_index: u32,
    pub correct_answers: u32,
    pub answered_questions: u32,
}

impl SessionProgress {
    pub fn new() -> Self {
        Self {
            question_index: 1,
            pose_index: 1,
            correct_answers: 0,
            answered_questions: 0,
        }
    }
}

impl Default for SessionProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Handed to the results screen once the last question is answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuizOutcome {
    pub correct_answers: u32,
    pub total_questions: u32,
    pub total_poses: u32,
}

impl QuizOutcome {
    pub fn score_percent(&self) -> u32 {
        score_percent(self.correct_answers, self.total_poses)
    }
}

pub fn score_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct.min(total) * 100) / total
}

#[derive(Clone, Debug)]
pub struct CaptureResult {
    pub image: Frame,
    pub is_similar: bool,
    pub annotated_image: Option<Frame>,
}

impl CaptureResult {
    /// The image worth showing: the evaluator's annotation when present.
    pub fn display_image(&self) -> &Frame {
        self.annotated_image.as_ref().unwrap_or(&self.image)
    }
}
