pub mod aggregator;
pub mod evaluator;
pub mod extraction;
pub mod failure_log;
pub mod handlers;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod records;
pub mod storage;

#[cfg(test)]
pub mod testing;
