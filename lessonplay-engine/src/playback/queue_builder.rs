//! Queue Builder
//!
//! Linearizes a selected question, or the whole lesson when nothing is
//! selected, into the ordered playback queue. Blank fields are skipped; the
//! builder never fails and an empty queue is a valid result.

use lessonplay_common::content::{ContentItem, ContentKind, ContentQueue, REPEAT_AFTER_ME};
use lessonplay_common::lesson::{non_empty, ExercisePrompt, Lesson, MediaFields, Question, SourcedExercise};

/// Build the queue for `selected`, or for the lesson itself when `None`
pub fn build_queue(lesson: &Lesson, selected: Option<&Question>) -> ContentQueue {
    match selected {
        Some(question) => build_for_question(question),
        None => build_for_lesson(lesson),
    }
}

/// Title, prompt, teacher script, then every exercise prompt in order
pub fn build_for_question(question: &Question) -> ContentQueue {
    let mut builder = QueueBuilder::default();
    let qid = question.id.as_str();
    let hint = question.media_hint();

    builder.push(qid, "title", &question.title, ContentKind::Title, hint);
    builder.push(qid, "prompt", &question.data.prompt, ContentKind::Prompt, hint);
    builder.push(qid, "script", &question.data.teacher_script, ContentKind::Script, hint);

    for (index, exercise) in question.exercise_prompts.iter().enumerate() {
        let source_id = exercise.source_id(qid, index);
        let sourced = SourcedExercise {
            source_id: &source_id,
            exercise,
        };
        let hint = sourced.media_hint().or(hint);

        builder.push(&source_id, "text", &exercise.text, ContentKind::Exercise, hint);
        builder.push(&source_id, "instructions", &exercise.instructions, ContentKind::Instruction, hint);
        builder.push(&source_id, "writing", &exercise.writing_prompt, ContentKind::Writing, hint);
        builder.push(&source_id, "speaking", &exercise.speaking_prompt, ContentKind::Speaking, hint);
        builder.push_spoken_part(&source_id, exercise, hint);
    }

    builder.finish()
}

/// Lesson title, description and narration, then the lesson's own exercises
///
/// Lesson-level exercises get only their text and the narration/say-text
/// part, without instruction, writing or speaking items.
pub fn build_for_lesson(lesson: &Lesson) -> ContentQueue {
    let mut builder = QueueBuilder::default();
    let lid = lesson.lesson_id();
    let hint = non_empty(&lesson.media_url);

    builder.push(lid, "title", &lesson.title, ContentKind::Title, hint);
    builder.push(lid, "description", &lesson.description, ContentKind::Prompt, hint);
    builder.push(lid, "narration", &lesson.narration, ContentKind::Narration, hint);

    for (index, exercise) in lesson.exercise_prompts.iter().enumerate() {
        let source_id = exercise.source_id(lid, index);
        let sourced = SourcedExercise {
            source_id: &source_id,
            exercise,
        };
        let hint = sourced.media_hint().or(hint);

        builder.push(&source_id, "text", &exercise.text, ContentKind::Exercise, hint);
        builder.push_spoken_part(&source_id, exercise, hint);
    }

    builder.finish()
}

#[derive(Default)]
struct QueueBuilder {
    items: Vec<ContentItem>,
}

impl QueueBuilder {
    fn push(
        &mut self,
        source_id: &str,
        suffix: &str,
        text: &Option<String>,
        kind: ContentKind,
        hint: Option<&str>,
    ) {
        if let Some(text) = non_empty(text) {
            self.push_text(source_id, suffix, text, kind, hint);
        }
    }

    fn push_text(&mut self, source_id: &str, suffix: &str, text: &str, kind: ContentKind, hint: Option<&str>) {
        self.items.push(ContentItem {
            id: format!("{}-{}", source_id, suffix),
            text: text.to_string(),
            kind,
            source_id: source_id.to_string(),
            media_url: hint.map(str::to_string),
        });
    }

    /// Narration plus the repeat-after-me cue, or else the say-text
    fn push_spoken_part(&mut self, source_id: &str, exercise: &ExercisePrompt, hint: Option<&str>) {
        if let Some(narration) = non_empty(&exercise.narration) {
            self.push_text(source_id, "narration", narration, ContentKind::Narration, hint);
            self.push_text(source_id, "repeat", REPEAT_AFTER_ME, ContentKind::UserPrompt, hint);
        } else {
            self.push(source_id, "saytext", &exercise.saytext, ContentKind::SayText, hint);
        }
    }

    fn finish(self) -> ContentQueue {
        ContentQueue::from_items(self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonplay_common::lesson::{MediaMetadata, QuestionData};

    fn text(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn kinds(queue: &ContentQueue) -> Vec<ContentKind> {
        queue.iter().map(|item| item.kind).collect()
    }

    fn texts(queue: &ContentQueue) -> Vec<&str> {
        queue.iter().map(|item| item.text.as_str()).collect()
    }

    #[test]
    fn test_prompt_and_script_without_title() {
        let question = Question {
            id: "q1".to_string(),
            data: QuestionData {
                prompt: text("Say hi"),
                teacher_script: text("Hello class"),
                ..Default::default()
            },
            ..Default::default()
        };

        let queue = build_for_question(&question);
        assert_eq!(kinds(&queue), vec![ContentKind::Prompt, ContentKind::Script]);
        assert_eq!(texts(&queue), vec!["Say hi", "Hello class"]);
        assert!(queue.iter().all(|item| item.source_id == "q1"));
    }

    #[test]
    fn test_title_prompt_script_lead_the_queue() {
        let question = Question {
            id: "q1".to_string(),
            title: text("Greetings"),
            data: QuestionData {
                prompt: text("Say hi"),
                teacher_script: text("Hello class"),
                ..Default::default()
            },
            exercise_prompts: vec![ExercisePrompt {
                id: text("e1"),
                text: text("Wave"),
                ..Default::default()
            }],
            ..Default::default()
        };

        let queue = build_for_question(&question);
        assert_eq!(
            &kinds(&queue)[..3],
            &[ContentKind::Title, ContentKind::Prompt, ContentKind::Script]
        );
        assert_eq!(queue.get(3).unwrap().kind, ContentKind::Exercise);
    }

    #[test]
    fn test_narration_followed_by_repeat_cue() {
        let question = Question {
            id: "q1".to_string(),
            exercise_prompts: vec![ExercisePrompt {
                id: text("e1"),
                narration: text("Repeat after me: cat"),
                ..Default::default()
            }],
            ..Default::default()
        };

        let queue = build_for_question(&question);
        assert_eq!(texts(&queue), vec!["Repeat after me: cat", "Now your turn, Say:"]);
        assert_eq!(kinds(&queue), vec![ContentKind::Narration, ContentKind::UserPrompt]);
        assert!(queue.iter().all(|item| item.source_id == "e1"));
    }

    #[test]
    fn test_narration_takes_priority_over_saytext() {
        let question = Question {
            id: "q1".to_string(),
            exercise_prompts: vec![ExercisePrompt {
                id: text("e1"),
                narration: text("Listen: dog"),
                saytext: text("dog"),
                ..Default::default()
            }],
            ..Default::default()
        };

        let queue = build_for_question(&question);
        assert!(queue.iter().all(|item| item.kind != ContentKind::SayText));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_full_exercise_expansion_order() {
        let question = Question {
            id: "q1".to_string(),
            exercise_prompts: vec![ExercisePrompt {
                id: text("e1"),
                text: text("Look at the picture"),
                instructions: text("Use full sentences"),
                writing_prompt: text("Write one line"),
                speaking_prompt: text("Describe it"),
                saytext: text("It is a cat"),
                ..Default::default()
            }],
            ..Default::default()
        };

        let queue = build_for_question(&question);
        assert_eq!(
            kinds(&queue),
            vec![
                ContentKind::Exercise,
                ContentKind::Instruction,
                ContentKind::Writing,
                ContentKind::Speaking,
                ContentKind::SayText,
            ]
        );
    }

    #[test]
    fn test_lesson_fallback_without_selection() {
        let lesson = Lesson {
            id: text("l1"),
            title: text("Animals"),
            description: text("We learn animal names"),
            narration: text("Welcome"),
            exercise_prompts: vec![ExercisePrompt {
                text: text("Point at the cat"),
                instructions: text("ignored at lesson level"),
                saytext: text("cat"),
                ..Default::default()
            }],
            questions: vec![Question {
                id: "q1".to_string(),
                data: QuestionData {
                    prompt: text("not played"),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        };

        let queue = build_queue(&lesson, None);
        assert_eq!(
            texts(&queue),
            vec!["Animals", "We learn animal names", "Welcome", "Point at the cat", "cat"]
        );
        assert_eq!(queue.get(3).unwrap().source_id, "l1-ex0");
    }

    #[test]
    fn test_selected_question_wins_over_lesson() {
        let question = Question {
            id: "q1".to_string(),
            data: QuestionData {
                prompt: text("Only me"),
                ..Default::default()
            },
            ..Default::default()
        };
        let lesson = Lesson {
            title: text("Lesson title"),
            questions: vec![question.clone()],
            ..Default::default()
        };

        let queue = build_queue(&lesson, Some(&question));
        assert_eq!(texts(&queue), vec!["Only me"]);
    }

    #[test]
    fn test_empty_lesson_builds_empty_queue() {
        let queue = build_queue(&Lesson::default(), None);
        assert!(queue.is_empty());

        let blank = Question {
            id: "q1".to_string(),
            title: text("   "),
            ..Default::default()
        };
        assert!(build_for_question(&blank).is_empty());
    }

    #[test]
    fn test_items_carry_owner_media_hint() {
        let question = Question {
            id: "q1".to_string(),
            metadata: MediaMetadata {
                image_url: text("q.png"),
                video_url: None,
            },
            data: QuestionData {
                prompt: text("Look"),
                ..Default::default()
            },
            exercise_prompts: vec![
                ExercisePrompt {
                    id: text("e1"),
                    text: text("Own media"),
                    metadata: MediaMetadata {
                        image_url: None,
                        video_url: text("e.mp4"),
                    },
                    ..Default::default()
                },
                ExercisePrompt {
                    id: text("e2"),
                    text: text("Inherits"),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let queue = build_for_question(&question);
        let hints: Vec<Option<&str>> = queue.iter().map(|i| i.media_url.as_deref()).collect();
        assert_eq!(hints, vec![Some("q.png"), Some("e.mp4"), Some("q.png")]);
    }

    #[test]
    fn test_ids_unique_with_duplicate_exercise_ids() {
        let exercise = ExercisePrompt {
            id: text("dup"),
            text: text("Same id"),
            ..Default::default()
        };
        let question = Question {
            id: "q1".to_string(),
            exercise_prompts: vec![exercise.clone(), exercise],
            ..Default::default()
        };

        let queue = build_for_question(&question);
        assert_eq!(queue.ids(), vec!["dup-text", "dup-text#2"]);
    }
}
