//! Three-step run with priorities, a per-step timeout and a run timeout.

use async_trait::async_trait;
use junban::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Request {
    headers: Mutex<Vec<(String, String)>>,
}

#[derive(Debug)]
struct AuthStep;

#[async_trait]
impl Step<Request, u16> for AuthStep {
    async fn execute(&self, req: Arc<Request>) -> Result<StepOutput<u16>, EngineError> {
        let authorized = req
            .headers
            .lock()
            .map(|h| h.iter().any(|(k, _)| k == "authorization"))
            .unwrap_or(false);
        if !authorized {
            return Ok(StepOutput::stop(401));
        }
        Ok(StepOutput::next())
    }

    fn priority(&self) -> Option<f64> {
        Some(1.0)
    }
}

#[derive(Debug)]
struct LookupStep;

#[async_trait]
impl Step<Request, u16> for LookupStep {
    async fn execute(&self, _req: Arc<Request>) -> Result<StepOutput<u16>, EngineError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(StepOutput::next())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut engine: Engine<Request, u16> = Engine::with_options(EngineOptions {
        sort_by_priority: true,
        reject_duplicates: true,
    });

    engine.append(Arc::new(LookupStep), Some(Duration::from_millis(200)))?;
    engine.append(
        from_fn("respond", |_: Arc<Request>| async {
            Ok::<_, EngineError>(StepOutput::stop(200))
        })
        .with_priority(10.0)
        .shared(),
        None,
    )?;
    engine.append(Arc::new(AuthStep), None)?;

    let anonymous = Request::default();
    match engine.execute(anonymous, Some(Duration::from_secs(1))).await {
        Ok(outcome) => println!("anonymous: {:?}", outcome),
        Err(e) => eprintln!("anonymous run failed: {}", e),
    }

    let signed = Request::default();
    if let Ok(mut headers) = signed.headers.lock() {
        headers.push(("authorization".to_string(), "Bearer demo".to_string()));
    }
    match engine.execute(signed, Some(Duration::from_secs(1))).await {
        Ok(outcome) => println!("signed: {:?}", outcome),
        Err(e) => eprintln!("signed run failed: {}", e),
    }

    Ok(())
}
