//! Conversation window truncation, SPEC_FULL §8 scenario 8.

use agent_orchestration_core::{ConversationWindow, Message, WindowConfig};

#[test]
fn system_messages_survive_count_based_truncation() {
    let window = ConversationWindow::new(WindowConfig {
        max_messages: 3,
        max_tokens: 8_000,
        use_token_truncation: false,
        keep_all_system_messages: true,
    })
    .unwrap();

    window.set_system_prompt("S");
    window.add_message(Message::user("U1"));
    window.add_message(Message::user("U2"));
    window.add_message(Message::assistant("A1"));
    window.add_message(Message::user("U3"));

    let messages = window.get_messages();

    assert!(messages[0].is_system(), "system message must stay first");
    assert_eq!(messages[0].text(), "S");
    assert!(messages.iter().any(|m| m.text() == "U3"), "most recent message must survive");
    assert!(!messages.iter().any(|m| m.text() == "U1"), "oldest non-system message must be evicted");
}

#[test]
fn window_respects_its_own_message_count_cap() {
    let window = ConversationWindow::new(WindowConfig {
        max_messages: 3,
        max_tokens: 8_000,
        use_token_truncation: false,
        keep_all_system_messages: true,
    })
    .unwrap();

    window.set_system_prompt("S");
    for i in 0..10 {
        window.add_message(Message::user(format!("U{i}")));
    }

    assert!(window.len() <= 3);
    let messages = window.get_messages();
    assert!(messages[0].is_system());
}
