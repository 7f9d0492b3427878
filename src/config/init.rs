// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a shipwright.yml template and the workflow directory.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ServiceName;

use super::CONFIG_FILENAME;

pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let project = match project {
        Some(name) => ServiceName::new(name)?.to_string(),
        None => "my-project".to_string(),
    };

    std::fs::write(&config_path, template_yaml(&project))?;
    std::fs::create_dir_all(dir.join(".shipwright/workflows"))?;

    Ok(())
}

fn template_yaml(project: &str) -> String {
    format!(
        r#"project: {project}

backend:
  path: .shipwright/state

locking:
  environment_wait: 30s
  # Fail immediately if another release holds a service
  service_wait: 0s

# Each product runs <directory>/<product> deploy|promote
workflows:
  directory: .shipwright/workflows

services:
  - name: api
    product: gcp-cloud-run
    build_directory: .
    dockerfile: Dockerfile
"#
    )
}
