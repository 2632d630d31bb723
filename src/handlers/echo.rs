//! Handler that records the job it received

use crate::error::Result;
use crate::job::{JobContext, JobHandler};
use async_trait::async_trait;

pub struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }

    async fn process(&self, ctx: &mut JobContext) -> Result<()> {
        let summary = ctx.descriptor().summary();
        let job_id = ctx.job_id().to_string();
        ctx.log(&format!("Processing job {}", job_id));
        ctx.log(&format!("Request: {}", summary));

        let parameters: Vec<String> = ctx
            .descriptor()
            .parameters
            .iter()
            .map(|(name, value)| format!("  {} = {}", name, value))
            .collect();
        if parameters.is_empty() {
            ctx.log("No parameters");
        } else {
            ctx.log(&format!("Parameters:\n{}", parameters.join("\n")));
        }

        Ok(())
    }
}
