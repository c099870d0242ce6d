//! Lesson fixtures

use lessonplay_common::config::PlayerConfig;
use lessonplay_common::lesson::Lesson;

/// Lesson with a narration, two questions and a lesson-level exercise
pub fn sample_lesson() -> Lesson {
    serde_json::from_value(serde_json::json!({
        "id": "l1",
        "title": "Greetings",
        "description": "Saying hello",
        "narration": "Welcome to the lesson",
        "titleImageUrl": "https://cdn.example.com/title.png",
        "questions": [
            {
                "id": "q1",
                "title": "Say hello",
                "type": "speaking",
                "data": {
                    "prompt": "How do you greet a friend?",
                    "teacher_script": "Listen carefully"
                },
                "metadata": { "imageUrl": "https://images.unsplash.com/hello.jpg" },
                "exercisePrompts": [
                    { "id": "e1", "text": "Hello", "saytext": "Hello there" }
                ]
            },
            {
                "id": "q2",
                "title": "Say goodbye",
                "data": { "prompt": "How do you say goodbye?" },
                "mediaUrl": "https://cdn.example.com/bye.gif"
            }
        ],
        "exercisePrompts": [
            { "id": "le1", "text": "Practice", "narration": "Repeat after me" }
        ]
    }))
    .unwrap()
}

/// Lesson with nothing to say
pub fn empty_lesson() -> Lesson {
    serde_json::from_value(serde_json::json!({ "id": "empty" })).unwrap()
}

/// Defaults with a fast reconciliation tick
pub fn test_config() -> PlayerConfig {
    let mut config = PlayerConfig::default();
    config.sync.reconcile_interval_ms = 20;
    config
}
