//! Text processing: tokenization, vocabulary and feature projection

pub mod projector;
pub mod tokenizer;
pub mod vocabulary;

pub use projector::{project, project_records, FeatureVector};
pub use tokenizer::Tokenizer;
pub use vocabulary::{VocabEntry, Vocabulary, VocabularyBuilder, Weighting};
