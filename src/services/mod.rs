pub mod authoring;
pub mod backend;
pub mod export;
pub mod llm;
pub mod markdown;
pub mod outline;
pub mod prompts;
pub mod retry;
pub mod storage;
