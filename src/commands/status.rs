// ABOUTME: Status command implementation.
// ABOUTME: Lists the persisted services of one environment.

use shipwright::backend::StateStore;
use shipwright::config::Config;
use shipwright::error::Result;
use shipwright::output::Output;
use shipwright::types::EnvironmentName;

use super::backend::open_backend;

pub async fn status(config: &Config, environment: &EnvironmentName, output: &Output) -> Result<()> {
    let backend = open_backend(config);
    let state = backend.load_environment(environment).await?;
    let services = backend.list_services(environment).await?;

    output.progress(&format!("Environment {} is {}", state.name, state.status));
    if services.is_empty() {
        output.progress("No services released yet.");
        return Ok(());
    }
    output.services(&services);
    Ok(())
}
