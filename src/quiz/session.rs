use std::{
    mem,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::{
    CaptureResult, Question, QuizDefinition, QuizOutcome, SessionProgress,
    countdown::{Countdown, CountdownStep},
};
use crate::{
    evaluator::{AnswerEvaluator, EvaluationError, Submission, Verdict},
    pipeline::FrameSource,
    types::Frame,
};

const CELEBRATION_DURATION: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub enum Phase {
    Ready,
    CountingDown(Countdown),
    /// A snapshot is with the evaluator; `ticket` identifies the request.
    Evaluating { ticket: u64, image: Frame },
    WrongAnswer,
    Finished(QuizOutcome),
}

#[derive(Clone, Debug)]
pub enum SessionEvent {
    CountdownTick(u32),
    Captured,
    Correct { annotated_image: Option<Frame> },
    Incorrect,
    EvaluationFailed(String),
    MissingAnnotation,
    PoseChanged { question_no: u32, pose_no: u32 },
    Completed(QuizOutcome),
}

struct EvaluationReply {
    ticket: u64,
    result: Result<Verdict, EvaluationError>,
}

/// Drives one play-through: countdown, capture, evaluation and progression.
///
/// The session is owned by the UI thread and advanced through [`poll`]; the only
/// background work is the evaluation request, which runs on its own thread and
/// reports back over a channel. Replies are matched by ticket so that a reply
/// arriving after a skip (or after the session is dropped) changes nothing.
///
/// [`poll`]: QuizSession::poll
pub struct QuizSession {
    definition: QuizDefinition,
    progress: SessionProgress,
    phase: Phase,
    capture: Option<CaptureResult>,
    countdown_ticks: u32,
    evaluator: Arc<dyn AnswerEvaluator>,
    reply_tx: Sender<EvaluationReply>,
    reply_rx: Receiver<EvaluationReply>,
    next_ticket: u64,
    celebrate_until: Option<Instant>,
}

impl QuizSession {
    pub fn new(
        definition: QuizDefinition,
        countdown_ticks: u32,
        evaluator: Arc<dyn AnswerEvaluator>,
    ) -> Self {
        let (reply_tx, reply_rx) = unbounded();
        Self {
            definition,
            progress: SessionProgress::new(),
            phase: Phase::Ready,
            capture: None,
            countdown_ticks,
            evaluator,
            reply_tx,
            reply_rx,
            next_ticket: 0,
            celebrate_until: None,
        }
    }

    pub fn definition(&self) -> &QuizDefinition {
        &self.definition
    }

    pub fn progress(&self) -> SessionProgress {
        self.progress
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn capture(&self) -> Option<&CaptureResult> {
        self.capture.as_ref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.definition.question(self.progress.question_index)
    }

    pub fn poses_in_current_question(&self) -> u32 {
        self.definition.poses_for(self.progress.question_index)
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        match &self.phase {
            Phase::CountingDown(countdown) => Some(countdown.remaining()),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<QuizOutcome> {
        match self.phase {
            Phase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished(_))
    }

    pub fn can_start_countdown(&self) -> bool {
        matches!(self.phase, Phase::Ready)
    }

    pub fn is_celebrating(&self, now: Instant) -> bool {
        self.celebrate_until.is_some_and(|until| now < until)
    }

    /// Starts the capture countdown. Returns `false` without touching anything
    /// when a countdown or evaluation is already running, a wrong answer is
    /// pending, or the quiz is over.
    pub fn start_countdown(&mut self, now: Instant) -> bool {
        if !self.can_start_countdown() {
            log::debug!("countdown rejected in phase {:?}", self.phase_name());
            return false;
        }
        self.phase = Phase::CountingDown(Countdown::start(self.countdown_ticks, now));
        true
    }

    /// Advances the countdown and collects finished evaluations.
    pub fn poll(&mut self, now: Instant, frames: &dyn FrameSource) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        let step = match &mut self.phase {
            Phase::CountingDown(countdown) => Some(countdown.advance(now)),
            _ => None,
        };
        match step {
            Some(CountdownStep::Tick(remaining)) => {
                events.push(SessionEvent::CountdownTick(remaining))
            }
            Some(CountdownStep::Expired) => events.extend(self.capture_and_evaluate(frames)),
            Some(CountdownStep::Pending) | None => {}
        }

        while let Ok(reply) = self.reply_rx.try_recv() {
            events.extend(self.handle_reply(reply, now));
        }

        events
    }

    /// Takes a still from `frames` and sends it to the evaluator in the
    /// background. Without a frame the attempt is dropped quietly.
    pub fn capture_and_evaluate(&mut self, frames: &dyn FrameSource) -> Vec<SessionEvent> {
        if !matches!(self.phase, Phase::Ready | Phase::CountingDown(_)) {
            log::debug!("capture ignored in phase {:?}", self.phase_name());
            return Vec::new();
        }

        let Some(image) = frames.capture_still() else {
            log::debug!("no camera frame available, skipping capture");
            self.phase = Phase::Ready;
            return Vec::new();
        };

        let image_jpeg = match image.to_jpeg() {
            Ok(bytes) => bytes,
            Err(err) => {
                let err = EvaluationError::Snapshot(format!("{err:#}"));
                log::warn!("{err}");
                return self.enter_wrong_answer(image, None, Some(err));
            }
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let submission = Submission {
            image_jpeg,
            pose_no: self.progress.pose_index,
            question_no: self.progress.question_index,
        };
        let evaluator = self.evaluator.clone();
        let reply_tx = self.reply_tx.clone();
        thread::spawn(move || {
            let result = evaluator.evaluate(&submission);
            // The session may be gone by now; nobody is left to tell.
            let _ = reply_tx.send(EvaluationReply { ticket, result });
        });

        self.phase = Phase::Evaluating { ticket, image };
        vec![SessionEvent::Captured]
    }

    pub fn advance_pose(&mut self, correct: bool) -> Vec<SessionEvent> {
        if self.is_finished() {
            return Vec::new();
        }

        self.capture = None;
        if correct {
            self.progress.correct_answers += 1;
        }

        if self.progress.pose_index < self.poses_in_current_question() {
            self.progress.pose_index += 1;
            self.phase = Phase::Ready;
            vec![self.pose_changed()]
        } else {
            self.advance_question()
        }
    }

    pub fn advance_question(&mut self) -> Vec<SessionEvent> {
        if self.is_finished() {
            return Vec::new();
        }

        self.capture = None;
        self.progress.answered_questions += 1;

        if self.progress.question_index < self.definition.len() {
            self.progress.question_index += 1;
            self.progress.pose_index = 1;
            self.phase = Phase::Ready;
            vec![self.pose_changed()]
        } else {
            let outcome = QuizOutcome {
                correct_answers: self.progress.correct_answers,
                total_questions: self.definition.len(),
                total_poses: self.definition.total_poses(),
            };
            log::info!(
                "quiz finished: {} correct poses over {} questions",
                outcome.correct_answers,
                outcome.total_questions
            );
            self.phase = Phase::Finished(outcome);
            vec![SessionEvent::Completed(outcome)]
        }
    }

    /// Ends the current question without scoring it. Any running countdown or
    /// pending evaluation is abandoned.
    pub fn skip_question(&mut self) -> Vec<SessionEvent> {
        if self.is_finished() {
            return Vec::new();
        }
        log::info!(
            "skipping question {} at pose {}",
            self.progress.question_index,
            self.progress.pose_index
        );
        self.advance_question()
    }

    pub fn retry(&mut self) -> bool {
        if !matches!(self.phase, Phase::WrongAnswer) {
            return false;
        }
        self.capture = None;
        self.phase = Phase::Ready;
        true
    }

    fn handle_reply(&mut self, reply: EvaluationReply, now: Instant) -> Vec<SessionEvent> {
        let image = match mem::replace(&mut self.phase, Phase::Ready) {
            Phase::Evaluating { ticket, image } if ticket == reply.ticket => image,
            other => {
                log::debug!("discarding stale evaluation reply #{}", reply.ticket);
                self.phase = other;
                return Vec::new();
            }
        };

        let verdict = match reply.result {
            Ok(verdict) => verdict,
            Err(err) => {
                log::warn!("evaluation failed: {err}");
                return self.enter_wrong_answer(image, None, Some(err));
            }
        };

        let mut events = Vec::new();
        if verdict.annotated_image.is_none() {
            events.push(SessionEvent::MissingAnnotation);
        }

        if verdict.is_similar {
            self.celebrate_until = Some(now + CELEBRATION_DURATION);
            events.push(SessionEvent::Correct {
                annotated_image: verdict.annotated_image,
            });
            events.extend(self.advance_pose(true));
        } else {
            events.extend(self.enter_wrong_answer(image, verdict.annotated_image, None));
        }
        events
    }

    fn enter_wrong_answer(
        &mut self,
        image: Frame,
        annotated_image: Option<Frame>,
        failure: Option<EvaluationError>,
    ) -> Vec<SessionEvent> {
        self.capture = Some(CaptureResult {
            image,
            is_similar: false,
            annotated_image,
        });
        self.phase = Phase::WrongAnswer;
        match failure {
            Some(err) => vec![SessionEvent::EvaluationFailed(err.to_string())],
            None => vec![SessionEvent::Incorrect],
        }
    }

    fn pose_changed(&self) -> SessionEvent {
        SessionEvent::PoseChanged {
            question_no: self.progress.question_index,
            pose_no: self.progress.pose_index,
        }
    }

    fn phase_name(&self) -> &'static str {
        match self.phase {
            Phase::Ready => "ready",
            Phase::CountingDown(_) => "counting-down",
            Phase::Evaluating { .. } => "evaluating",
            Phase::WrongAnswer => "wrong-answer",
            Phase::Finished(_) => "finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use super::*;
    use crate::quiz::{Question, countdown::TICK_INTERVAL};

    struct ScriptedEvaluator {
        replies: Mutex<VecDeque<Result<Verdict, EvaluationError>>>,
        seen: Mutex<Vec<(u32, u32)>>,
        gate: Option<Receiver<()>>,
    }

    impl ScriptedEvaluator {
        fn new(replies: Vec<Result<Verdict, EvaluationError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn gated(replies: Vec<Result<Verdict, EvaluationError>>, gate: Receiver<()>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
                gate: Some(gate),
            })
        }

        fn submissions(&self) -> Vec<(u32, u32)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl AnswerEvaluator for ScriptedEvaluator {
        fn evaluate(&self, submission: &Submission) -> Result<Verdict, EvaluationError> {
            self.seen
                .lock()
                .unwrap()
                .push((submission.pose_no, submission.question_no));
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(EvaluationError::Status(500)))
        }
    }

    struct StillCamera(Option<Frame>);

    impl StillCamera {
        fn ready() -> Self {
            Self(Some(Frame {
                rgba: vec![120; 8 * 8 * 4],
                width: 8,
                height: 8,
                timestamp: Instant::now(),
            }))
        }
    }

    impl FrameSource for StillCamera {
        fn capture_still(&self) -> Option<Frame> {
            self.0.clone()
        }
    }

    fn similar() -> Result<Verdict, EvaluationError> {
        Ok(Verdict {
            is_similar: true,
            annotated_image: None,
        })
    }

    fn not_similar() -> Result<Verdict, EvaluationError> {
        Ok(Verdict {
            is_similar: false,
            annotated_image: None,
        })
    }

    fn quiz(poses: &[u32]) -> QuizDefinition {
        QuizDefinition::new(
            poses
                .iter()
                .enumerate()
                .map(|(idx, &n)| Question::new(format!("question {}", idx + 1), n))
                .collect(),
        )
        .unwrap()
    }

    /// Runs one countdown to expiry and waits for the evaluation reply.
    fn capture(session: &mut QuizSession, camera: &StillCamera) -> Vec<SessionEvent> {
        let t0 = Instant::now();
        assert!(session.start_countdown(t0));
        let mut events = session.poll(t0 + TICK_INTERVAL * 3, camera);
        events.extend(wait_for_reply(session, camera));
        events
    }

    fn wait_for_reply(session: &mut QuizSession, camera: &StillCamera) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while matches!(session.phase(), Phase::Evaluating { .. }) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            events.extend(session.poll(Instant::now(), camera));
        }
        events
    }

    #[test]
    fn all_correct_session_completes_with_pose_count() {
        let evaluator = ScriptedEvaluator::new(vec![similar(), similar(), similar()]);
        let mut session = QuizSession::new(quiz(&[1, 2]), 3, evaluator.clone());
        let camera = StillCamera::ready();

        capture(&mut session, &camera);
        assert_eq!(session.progress().question_index, 2);
        assert_eq!(session.progress().pose_index, 1);
        assert_eq!(session.progress().answered_questions, 1);

        capture(&mut session, &camera);
        assert_eq!(session.progress().pose_index, 2);
        assert_eq!(session.progress().answered_questions, 1);

        let events = capture(&mut session, &camera);
        let outcome = QuizOutcome {
            correct_answers: 3,
            total_questions: 2,
            total_poses: 3,
        };
        assert!(
            events
                .iter()
                .any(|e| matches!(e, SessionEvent::Completed(o) if *o == outcome))
        );
        assert_eq!(session.outcome(), Some(outcome));
        assert_eq!(session.progress().answered_questions, 2);
        assert_eq!(evaluator.submissions(), vec![(1, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn countdown_ticks_and_rejects_second_start() {
        let evaluator = ScriptedEvaluator::new(vec![similar()]);
        let mut session = QuizSession::new(quiz(&[2]), 3, evaluator);
        let camera = StillCamera::ready();
        let t0 = Instant::now();

        assert!(session.start_countdown(t0));
        assert_eq!(session.countdown_remaining(), Some(3));
        assert!(!session.start_countdown(t0 + Duration::from_millis(200)));
        assert_eq!(session.countdown_remaining(), Some(3));

        let events = session.poll(t0 + TICK_INTERVAL, &camera);
        assert!(matches!(events.as_slice(), [SessionEvent::CountdownTick(2)]));
        assert!(!session.start_countdown(t0 + TICK_INTERVAL));

        let events = session.poll(t0 + TICK_INTERVAL * 3, &camera);
        assert!(matches!(events.as_slice(), [SessionEvent::Captured]));
        assert!(!session.start_countdown(t0 + TICK_INTERVAL * 3));
    }

    #[test]
    fn wrong_answer_then_retry_then_correct() {
        let evaluator = ScriptedEvaluator::new(vec![not_similar(), similar()]);
        let mut session = QuizSession::new(quiz(&[2]), 3, evaluator);
        let camera = StillCamera::ready();

        let events = capture(&mut session, &camera);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Incorrect)));
        assert!(matches!(session.phase(), Phase::WrongAnswer));
        assert!(session.capture().is_some_and(|c| !c.is_similar));
        assert_eq!(session.progress(), SessionProgress::new());
        assert!(!session.start_countdown(Instant::now()));

        assert!(session.retry());
        assert!(session.capture().is_none());
        assert_eq!(session.progress(), SessionProgress::new());
        assert!(!session.retry());

        capture(&mut session, &camera);
        assert_eq!(session.progress().correct_answers, 1);
        assert_eq!(session.progress().pose_index, 2);
    }

    #[test]
    fn evaluation_failure_counts_as_wrong_answer() {
        let evaluator = ScriptedEvaluator::new(vec![Err(EvaluationError::Status(503))]);
        let mut session = QuizSession::new(quiz(&[1, 1]), 3, evaluator);
        let camera = StillCamera::ready();

        let events = capture(&mut session, &camera);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, SessionEvent::EvaluationFailed(msg) if msg.contains("503")))
        );
        assert!(matches!(session.phase(), Phase::WrongAnswer));
        assert_eq!(session.progress(), SessionProgress::new());
    }

    #[test]
    fn missing_annotation_is_reported_separately() {
        let evaluator = ScriptedEvaluator::new(vec![similar()]);
        let mut session = QuizSession::new(quiz(&[1, 1]), 3, evaluator);
        let camera = StillCamera::ready();

        let events = capture(&mut session, &camera);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::MissingAnnotation)));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Correct { .. })));
        assert!(session.is_celebrating(Instant::now()));
    }

    #[test]
    fn skip_mid_question_resets_pose_and_keeps_score() {
        let evaluator = ScriptedEvaluator::new(vec![similar()]);
        let mut session = QuizSession::new(quiz(&[3, 1]), 3, evaluator);
        let camera = StillCamera::ready();

        capture(&mut session, &camera);
        assert_eq!(session.progress().pose_index, 2);

        let events = session.skip_question();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::PoseChanged {
                question_no: 2,
                pose_no: 1
            }]
        ));
        let progress = session.progress();
        assert_eq!(progress.answered_questions, 1);
        assert_eq!(progress.question_index, 2);
        assert_eq!(progress.pose_index, 1);
        assert_eq!(progress.correct_answers, 1);
    }

    #[test]
    fn skipping_every_question_finishes_with_zero() {
        let evaluator = ScriptedEvaluator::new(Vec::new());
        let mut session = QuizSession::new(quiz(&[1, 2, 1]), 3, evaluator);

        session.skip_question();
        session.skip_question();
        let events = session.skip_question();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Completed(QuizOutcome {
                correct_answers: 0,
                total_questions: 3,
                total_poses: 4
            })]
        ));
        assert_eq!(session.progress().answered_questions, 3);
        assert_eq!(session.progress().question_index, 3);

        assert!(session.skip_question().is_empty());
        assert!(!session.start_countdown(Instant::now()));
        assert_eq!(session.progress().answered_questions, 3);
    }

    #[test]
    fn wrong_answer_then_skip_advances_without_scoring() {
        let evaluator = ScriptedEvaluator::new(vec![not_similar()]);
        let mut session = QuizSession::new(quiz(&[2, 1]), 3, evaluator);
        let camera = StillCamera::ready();

        capture(&mut session, &camera);
        assert!(matches!(session.phase(), Phase::WrongAnswer));

        let events = session.skip_question();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::PoseChanged {
                question_no: 2,
                pose_no: 1
            }]
        ));

        let progress = session.progress();
        assert_eq!(progress.answered_questions, 1);
        assert_eq!(progress.question_index, 2);
        assert_eq!(progress.pose_index, 1);
        assert_eq!(progress.correct_answers, 0);
        assert!(session.capture().is_none());
        assert!(matches!(session.phase(), Phase::Ready));
    }

    #[test]
    fn skip_cancels_running_countdown() {
        let evaluator = ScriptedEvaluator::new(vec![similar()]);
        let mut session = QuizSession::new(quiz(&[1, 1]), 3, evaluator.clone());
        let camera = StillCamera::ready();
        let t0 = Instant::now();

        assert!(session.start_countdown(t0));
        session.poll(t0 + TICK_INTERVAL, &camera);
        assert_eq!(session.countdown_remaining(), Some(2));

        session.skip_question();
        assert_eq!(session.countdown_remaining(), None);
        assert!(matches!(session.phase(), Phase::Ready));

        let events = session.poll(t0 + TICK_INTERVAL * 5, &camera);
        assert!(
            !events.iter().any(|e| matches!(e, SessionEvent::Captured)),
            "{events:?}"
        );
        assert!(evaluator.submissions().is_empty());
        assert_eq!(session.progress().question_index, 2);
    }

    #[test]
    fn skip_during_evaluation_discards_late_reply() {
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let evaluator = ScriptedEvaluator::gated(vec![similar()], release_rx);
        let mut session = QuizSession::new(quiz(&[1, 1]), 3, evaluator.clone());
        let camera = StillCamera::ready();
        let t0 = Instant::now();

        session.start_countdown(t0);
        session.poll(t0 + TICK_INTERVAL * 3, &camera);
        assert!(matches!(session.phase(), Phase::Evaluating { .. }));

        session.skip_question();
        release_tx.send(()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while evaluator.submissions().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));
        let events = session.poll(Instant::now(), &camera);

        assert!(events.is_empty(), "{events:?}");
        assert!(matches!(session.phase(), Phase::Ready));
        assert_eq!(session.progress().correct_answers, 0);
        assert_eq!(session.progress().question_index, 2);
    }

    #[test]
    fn capture_without_camera_frame_returns_to_ready() {
        let evaluator = ScriptedEvaluator::new(vec![similar()]);
        let mut session = QuizSession::new(quiz(&[1]), 3, evaluator.clone());
        let camera = StillCamera(None);
        let t0 = Instant::now();

        session.start_countdown(t0);
        let events = session.poll(t0 + TICK_INTERVAL * 3, &camera);
        assert!(events.is_empty());
        assert!(session.can_start_countdown());
        assert!(evaluator.submissions().is_empty());
    }

    #[test]
    fn pose_index_never_exceeds_required_poses() {
        let replies = (0..6).map(|_| similar()).collect();
        let evaluator = ScriptedEvaluator::new(replies);
        let definition = quiz(&[2, 3, 1]);
        let mut session = QuizSession::new(definition.clone(), 3, evaluator);
        let camera = StillCamera::ready();

        while !session.is_finished() {
            let progress = session.progress();
            assert!(progress.pose_index >= 1);
            assert!(progress.pose_index <= definition.poses_for(progress.question_index));
            capture(&mut session, &camera);
        }
        assert_eq!(session.outcome().map(|o| o.correct_answers), Some(6));
    }
}
