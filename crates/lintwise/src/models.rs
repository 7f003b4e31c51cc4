//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - ollama chat messages/tools, sent from the agent to the completion endpoint
//! - capability calls and results, exchanged with the registered systems
//! - agent events, sent from the agent to whatever renders the conversation
//!
//! Wire formats are converted into these internal structs at the edges
//! (see `providers::ollama`), so the agent loop only ever sees these types.
pub mod event;
pub mod message;
pub mod role;
pub mod tool;
