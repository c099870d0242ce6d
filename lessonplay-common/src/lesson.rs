//! Lesson input model
//!
//! Lessons arrive from the lesson data provider as JSON. The engine reads
//! them and never mutates them. Field names accept both the snake_case and
//! camelCase spellings that have been used by lesson authors over time.

use serde::{Deserialize, Serialize};

/// Fallback identity for lessons delivered without an `id`
pub const DEFAULT_LESSON_ID: &str = "lesson";

/// A lesson with optional top-level narration and a list of questions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub narration: Option<String>,
    #[serde(default, alias = "mediaUrl")]
    pub media_url: Option<String>,
    #[serde(default, alias = "titleImageUrl")]
    pub title_image_url: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, alias = "exercisePrompts")]
    pub exercise_prompts: Vec<ExercisePrompt>,
}

/// One question of a lesson
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub question_type: Option<String>,
    #[serde(default, alias = "mediaUrl")]
    pub media_url: Option<String>,
    #[serde(default)]
    pub data: QuestionData,
    #[serde(default)]
    pub metadata: MediaMetadata,
    #[serde(default)]
    pub content: Option<ContentMedia>,
    #[serde(default, alias = "exercisePrompts")]
    pub exercise_prompts: Vec<ExercisePrompt>,
}

/// Text payload of a question, plus the legacy image fields stored beside it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionData {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "teacherScript")]
    pub teacher_script: Option<String>,
    #[serde(default, alias = "sampleAnswer")]
    pub sample_answer: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, rename = "imageUrl")]
    pub image_url_camel: Option<String>,
}

/// `metadata` object carried by questions and exercise prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default, rename = "imageUrl", alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, rename = "videoUrl", alias = "video_url")]
    pub video_url: Option<String>,
}

/// Nested `content` object with its own image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMedia {
    #[serde(default, rename = "imageUrl", alias = "image_url")]
    pub image_url: Option<String>,
}

/// Nested `data` object of an exercise prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseData {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, rename = "imageUrl")]
    pub image_url_camel: Option<String>,
}

/// One exercise step inside a question or at lesson level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExercisePrompt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "prompt")]
    pub text: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default, alias = "writingPrompt")]
    pub writing_prompt: Option<String>,
    #[serde(default, alias = "speakingPrompt")]
    pub speaking_prompt: Option<String>,
    #[serde(default)]
    pub narration: Option<String>,
    #[serde(default, alias = "sayText", alias = "say_text")]
    pub saytext: Option<String>,
    #[serde(default, alias = "mediaUrl", alias = "media")]
    pub media_url: Option<String>,
    #[serde(default)]
    pub metadata: MediaMetadata,
    #[serde(default)]
    pub content: Option<ContentMedia>,
    #[serde(default)]
    pub data: Option<ExerciseData>,
}

/// Returns the trimmed value if the field is present and not blank
pub fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Uniform view over the media-bearing fields of questions and exercise prompts
pub trait MediaFields {
    /// Identity used as `source_id` of anything resolved from this owner
    fn source_id(&self) -> &str;
    fn direct_media(&self) -> Option<&str>;
    fn metadata(&self) -> &MediaMetadata;
    fn content_image(&self) -> Option<&str>;
    fn data_image(&self) -> Option<&str>;
    fn data_image_camel(&self) -> Option<&str>;

    /// Media URL hint carried by queue items owned by this source
    fn media_hint(&self) -> Option<&str> {
        non_empty(&self.metadata().image_url).or_else(|| non_empty(&self.metadata().video_url))
    }
}

impl MediaFields for Question {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn direct_media(&self) -> Option<&str> {
        non_empty(&self.media_url)
    }

    fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    fn content_image(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| non_empty(&c.image_url))
    }

    fn data_image(&self) -> Option<&str> {
        non_empty(&self.data.image_url)
    }

    fn data_image_camel(&self) -> Option<&str> {
        non_empty(&self.data.image_url_camel)
    }
}

/// Exercise prompt paired with the identity it resolves under
#[derive(Debug, Clone, Copy)]
pub struct SourcedExercise<'a> {
    pub source_id: &'a str,
    pub exercise: &'a ExercisePrompt,
}

impl MediaFields for SourcedExercise<'_> {
    fn source_id(&self) -> &str {
        self.source_id
    }

    fn direct_media(&self) -> Option<&str> {
        non_empty(&self.exercise.media_url)
    }

    fn metadata(&self) -> &MediaMetadata {
        &self.exercise.metadata
    }

    fn content_image(&self) -> Option<&str> {
        self.exercise.content.as_ref().and_then(|c| non_empty(&c.image_url))
    }

    fn data_image(&self) -> Option<&str> {
        self.exercise.data.as_ref().and_then(|d| non_empty(&d.image_url))
    }

    fn data_image_camel(&self) -> Option<&str> {
        self.exercise.data.as_ref().and_then(|d| non_empty(&d.image_url_camel))
    }
}

impl ExercisePrompt {
    /// Stable identity of this exercise within its owner
    ///
    /// Exercises delivered without an id are named after their owner and position.
    pub fn source_id(&self, owner_id: &str, index: usize) -> String {
        match non_empty(&self.id) {
            Some(id) => id.to_string(),
            None => format!("{}-ex{}", owner_id, index),
        }
    }
}

impl Lesson {
    /// Lesson identity, defaulting when the provider omitted it
    pub fn lesson_id(&self) -> &str {
        non_empty(&self.id).unwrap_or(DEFAULT_LESSON_ID)
    }

    /// Lesson-level image (title image first, then media_url)
    pub fn lesson_image(&self) -> Option<&str> {
        non_empty(&self.title_image_url).or_else(|| non_empty(&self.media_url))
    }

    pub fn find_question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn has_question(&self, id: &str) -> bool {
        self.find_question(id).is_some()
    }

    /// Find an exercise prompt by its source id, searching questions first
    ///
    /// Returns the owned source id together with the exercise.
    pub fn find_exercise(&self, source_id: &str) -> Option<(String, &ExercisePrompt)> {
        for question in &self.questions {
            for (index, exercise) in question.exercise_prompts.iter().enumerate() {
                let id = exercise.source_id(&question.id, index);
                if id == source_id {
                    return Some((id, exercise));
                }
            }
        }
        let lesson_id = self.lesson_id();
        self.exercise_prompts
            .iter()
            .enumerate()
            .map(|(index, exercise)| (exercise.source_id(lesson_id, index), exercise))
            .find(|(id, _)| id == source_id)
    }
}
