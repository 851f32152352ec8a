use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::engine::difficulty::DifficultyState;
use crate::session::identity::LearnerInfo;
use crate::session::quiz::QuizDefinition;
use crate::session::result::{QuestionOutcome, ResultRecord};
use crate::session::state::Progress;

/// Everything the score depends on besides the answers themselves.
#[derive(Clone, Debug)]
pub struct ScoreContext {
    pub learner: LearnerInfo,
    /// Seconds consumed from a global countdown; `None` for other modes.
    pub global_consumed: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub difficulty: Option<DifficultyState>,
}

/// Exact set equality: a multi-select answer is only correct when it picks
/// every correct option and nothing else.
pub fn is_correct(selected: &BTreeSet<usize>, correct: &BTreeSet<usize>) -> bool {
    !selected.is_empty() && selected == correct
}

pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * correct as f64 / total as f64).round() as u32
}

pub fn score(progress: &Progress, quiz: &QuizDefinition, ctx: ScoreContext) -> ResultRecord {
    let mut questions = Vec::with_capacity(quiz.len());
    let mut correct_answers = Vec::new();
    let mut incorrect_answers = Vec::new();
    let mut unanswered = Vec::new();

    for (index, question) in quiz.questions.iter().enumerate() {
        let empty = BTreeSet::new();
        let selected = progress.answers.get(index).unwrap_or(&empty);
        let expected = question.correct_indices();
        let answered = !selected.is_empty();
        let correct = is_correct(selected, &expected);

        if !answered {
            unanswered.push(index);
        } else if correct {
            correct_answers.push(index);
        } else {
            incorrect_answers.push(index);
        }

        questions.push(QuestionOutcome {
            question_index: index,
            answered,
            correct,
            selected: selected.iter().copied().collect(),
            correct_options: expected.into_iter().collect(),
            elapsed_secs: progress.elapsed.get(index).copied().unwrap_or(0.0),
        });
    }

    let time_taken_secs = match ctx.global_consumed {
        Some(consumed) => consumed as f64,
        None => questions.iter().map(|q| q.elapsed_secs).sum(),
    };

    let total = quiz.len();
    let score = correct_answers.len();
    ResultRecord {
        quiz_id: quiz.id.clone(),
        quiz_title: quiz.title.clone(),
        learner: ctx.learner,
        score,
        total,
        percentage: percentage(score, total),
        questions,
        correct_answers,
        incorrect_answers,
        unanswered,
        time_taken_secs,
        started_at: ctx.started_at,
        submitted_at: ctx.submitted_at,
        difficulty: ctx.difficulty,
    }
}
