//! Run several prompts in parallel through a small client pool.
//!
//! Six tasks share `LLM_HARNESS_POOL_SIZE` clients (3 by default), so at
//! most that many requests are in flight at once. Results print in
//! submission order.
//!
//! Run with: `ANTHROPIC_API_KEY=... cargo run --example concurrency`

use llm_harness::logging::{init_logging, LogLevel};
use llm_harness::{ClientPool, Settings};

const PROMPTS: [&str; 6] = [
    "Generate a shopping list to cook a thanksgiving dinner.",
    "Output 30 different Rust crates in a bulleted list.",
    "Write a short poem about calling language models from Rust.",
    "What is the state capital of California?",
    "What is the state capital of New York?",
    "Write a 300-word film script with three characters meeting at a small diner: \
a journalist trying too hard, a laconic director, and a retired detective who \
ends up inserting himself into their conversation.",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogLevel::Info);
    let settings = Settings::from_env()?;
    let config = settings.client_config().with_max_tokens(1000).with_temperature(0.0);
    let pool = ClientPool::new(&settings.api_key, settings.pool_size, config)?;

    let mut handles = Vec::with_capacity(PROMPTS.len());
    for (index, prompt) in PROMPTS.into_iter().enumerate() {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let client = pool.acquire().await?;
            tracing::info!(task = index, "starting task");
            let answer = client.prompt(prompt).await;
            tracing::info!(task = index, "finished task");
            answer
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await??);
    }
    pool.close();

    for (i, result) in results.iter().enumerate() {
        println!("Result {}: {}\n", i + 1, result);
    }
    Ok(())
}
