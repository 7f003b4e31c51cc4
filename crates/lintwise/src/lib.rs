pub mod agent;
pub mod capabilities;
pub mod context;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod systems;
pub mod token_counter;
