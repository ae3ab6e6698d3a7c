pub mod compare;
pub mod generate;
pub mod hash;
pub mod matching;
pub mod pull_rate;
