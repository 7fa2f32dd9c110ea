pub mod change_tracker;
pub mod chunking_strategy;
pub mod corpus;
pub mod index_manager;
pub mod prompt;
pub mod vector_index;
