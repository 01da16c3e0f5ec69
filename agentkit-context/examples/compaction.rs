//! Example: build a conversation, check token estimates, and compact with SlidingWindow.
//!
//! Run with: `cargo run --example compaction -p agentkit-context`

use agentkit_context::SlidingWindow;
use agentkit_provider::context::ContextStrategy;
use agentkit_provider::{ChatMessage, MessagePart, Role};

fn main() {
    let strategy = SlidingWindow::new();

    let messages = vec![
        ChatMessage::user("Can you explain what a HashMap is in Rust?"),
        ChatMessage::assistant(
            "A HashMap in Rust is a collection that stores key-value pairs. \
             It uses a hashing algorithm to map keys to their associated values, \
             providing O(1) average-case lookup, insertion, and deletion.",
        ),
        ChatMessage::user("How do I iterate over a HashMap?"),
        ChatMessage::assistant(
            "You can iterate over a HashMap using a for loop: \
             `for (key, value) in &map { ... }`. You can also use `.keys()`, \
             `.values()`, or `.iter()` for more specific iteration patterns.",
        ),
        ChatMessage::user("What about BTreeMap? When should I use it instead?"),
        ChatMessage::assistant(
            "Use BTreeMap when you need keys in sorted order. BTreeMap provides \
             O(log n) operations but maintains ordering. HashMap is faster for \
             unsorted access patterns.",
        ),
    ];

    let total_tokens = strategy.token_estimate(&messages);
    println!("Conversation has {} messages", messages.len());
    println!("Estimated token count: {total_tokens}");

    let should = strategy.should_compact(&messages, 60);
    println!("\nShould compact (threshold=60, current={total_tokens}): {should}");

    if should {
        let compacted = strategy.compact(messages.clone());
        let compacted_tokens = strategy.token_estimate(&compacted);

        println!("\nBefore compaction: {} messages, {total_tokens} tokens", messages.len());
        println!("After compaction:  {} messages, {compacted_tokens} tokens", compacted.len());

        println!("\nRetained messages:");
        for msg in &compacted {
            let role = match msg.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            let text = msg
                .parts
                .iter()
                .filter_map(|part| match part {
                    MessagePart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("");
            let display = if text.len() > 60 { format!("{}...", &text[..60]) } else { text };
            println!("  [{role}] {display}");
        }
    } else {
        println!("No compaction needed.");
    }
}
