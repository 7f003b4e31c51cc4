use rand::seq::SliceRandom;

const THINKING_MESSAGES: &[&str] = &[
    "Reading between the lines",
    "Counting semicolons",
    "Untangling imports",
    "Chasing a dangling reference",
    "Consulting the style guide",
    "Squinting at the diff",
    "Measuring cyclomatic complexity",
    "Looking for unused variables",
    "Weighing naming choices",
    "Following the call graph",
    "Tidying whitespace",
    "Checking the edge cases",
];

pub fn get_random_thinking_message() -> &'static str {
    THINKING_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Thinking")
}
