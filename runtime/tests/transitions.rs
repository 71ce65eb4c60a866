use chatflow_core::{Block, BlockId, Flow, FlowDocument, Parameters};
use chatflow_test::{ScriptedResponder, TestSession, assert_current_block};
use std::time::Duration;

fn slideshow() -> Flow {
    Flow::builder("intro")
        .block(
            "intro",
            Block::new()
                .message("Welcome!")
                .transition(Duration::from_secs(1))
                .path_fn(|p: &Parameters| {
                    if p.user_input.is_empty() {
                        Some(BlockId::from("auto"))
                    } else {
                        Some(BlockId::from("manual"))
                    }
                }),
        )
        .block(
            "auto",
            Block::new()
                .message("Moving on by itself.")
                .transition(Duration::from_millis(500))
                .path("end"),
        )
        .block("manual", Block::new().message("You skipped ahead."))
        .block("end", Block::new().message("The end."))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn transitions_fire_in_sequence() {
    let t = TestSession::new(slideshow());
    t.start().await.unwrap();
    assert_current_block!(t, "intro");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_current_block!(t, "auto");

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_current_block!(t, "end");

    assert_eq!(
        t.bot_texts(),
        vec!["Welcome!", "Moving on by itself.", "The end."]
    );
    assert!(t.user_texts().is_empty());
    assert_eq!(
        t.entered_blocks(),
        vec![
            BlockId::from("intro"),
            BlockId::from("auto"),
            BlockId::from("end")
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn submission_cancels_pending_transition() {
    let t = TestSession::new(slideshow());
    t.start().await.unwrap();

    t.submit("skip").await.unwrap();
    assert_current_block!(t, "manual");
    assert!(!t.session.cancel_pending_transition());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_current_block!(t, "manual");
    assert_eq!(t.session.handle().path_len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_transition_never_fires() {
    let t = TestSession::new(slideshow());
    t.start().await.unwrap();
    assert!(t.session.cancel_pending_transition());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_current_block!(t, "intro");
}

#[tokio::test(start_paused = true)]
async fn transition_never_consults_responder() {
    let flow = Flow::builder("hold")
        .block(
            "hold",
            Block::new().transition(Duration::from_millis(100)),
        )
        .build()
        .unwrap();
    let responder = ScriptedResponder::new().reply(["should not appear"]);
    let t = TestSession::with_responder(flow, responder.clone());
    t.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(responder.calls(), 0);
    assert!(t.bot_texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_session_cancels_timer() {
    let t = TestSession::new(slideshow());
    t.start().await.unwrap();
    let handle = t.session.handle().clone();
    drop(t);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.current_path(), Some(BlockId::from("intro")));
}

const QUIZ: &str = r#"
start = "ask_math_question"

[blocks.ask_math_question]
message = "What is 1 + 1?"
routes = { when = { "2" = "correct" }, otherwise = "incorrect" }

[blocks.correct]
message = "Well done!"
transition_ms = 200
path = "ask_math_question"

[blocks.incorrect]
message = "Not quite, try again."
path = "ask_math_question"
"#;

#[tokio::test(start_paused = true)]
async fn document_flow_routes_and_loops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quiz.toml");
    std::fs::write(&path, QUIZ).unwrap();
    let flow = FlowDocument::load(&path).unwrap().into_flow().unwrap();

    let t = TestSession::new(flow);
    t.start().await.unwrap();

    t.submit("3").await.unwrap();
    assert_current_block!(t, "incorrect");
    t.submit("ok").await.unwrap();
    assert_current_block!(t, "ask_math_question");

    t.submit("2").await.unwrap();
    assert_current_block!(t, "correct");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_current_block!(t, "ask_math_question");

    assert_eq!(
        t.bot_texts(),
        vec![
            "What is 1 + 1?",
            "Not quite, try again.",
            "What is 1 + 1?",
            "Well done!",
            "What is 1 + 1?"
        ]
    );
}
