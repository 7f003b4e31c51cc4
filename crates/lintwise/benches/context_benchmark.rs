use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lintwise::context::prune_messages;
use lintwise::models::message::Message;
use lintwise::token_counter::TokenCounter;

fn conversation(turns: usize) -> Vec<Message> {
    let mut messages = vec![Message::system().with_text("You review code.\n".repeat(50))];
    for i in 0..turns {
        messages.push(Message::user().with_text(format!("question {} {}", i, "lint ".repeat(80))));
        let answer = format!("answer {} {}", i, "fixed ".repeat(120));
        messages.push(Message::assistant().with_text(answer));
    }
    messages.push(Message::user().with_text("what is left?"));
    messages
}

fn benchmark_counting(c: &mut Criterion) {
    let counter = TokenCounter::new();
    for &length in &[1_000, 10_000, 100_000] {
        let text = "hello ".repeat(length);
        c.bench_function(&format!("count_{}_words", length), |b| {
            b.iter(|| counter.count_tokens(black_box(&text)))
        });
    }
}

fn benchmark_pruning(c: &mut Criterion) {
    for &turns in &[10, 100, 1_000] {
        let messages = conversation(turns);
        c.bench_function(&format!("prune_{}_turns", turns), |b| {
            b.iter(|| prune_messages(black_box(&messages), 8192, 400))
        });
    }
}

criterion_group!(benches, benchmark_counting, benchmark_pruning);
criterion_main!(benches);
