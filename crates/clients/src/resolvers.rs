//! Resolve a project reference to its id

use platform_core::{Error, ProjectContext, ProjectId, Result};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::project::ProjectClient;

/// Determine the project a call should act on
///
/// * `None` uses the project from the runtime context.
/// * A string holding a UUID is taken as the project id.
/// * Any other string is looked up by name among the projects accessible
///   to the context user; exactly one project must match.
#[instrument(skip(client, context))]
pub async fn resolve_project_id(
    client: &ProjectClient,
    context: &ProjectContext,
    project: Option<&str>,
) -> Result<ProjectId> {
    let Some(project) = project else {
        return context.project_id.ok_or_else(|| Error::ProjectResolution {
            message: "Must pass a project name or ID when none can be determined from the runtime context".to_string(),
        });
    };

    if let Ok(id) = Uuid::parse_str(project) {
        return Ok(ProjectId::new(id));
    }

    let user_id = context.user_id.ok_or_else(|| Error::ProjectResolution {
        message: format!("No user in the runtime context to look up project {:?}", project),
    })?;

    let mut matches: Vec<_> = client
        .list_accessible_by_user(user_id)
        .await?
        .into_iter()
        .filter(|p| p.name == project)
        .collect();

    match matches.len() {
        1 => {
            let found = matches.remove(0);
            debug!(project_id = %found.id, "Resolved project by name");
            Ok(found.id)
        }
        0 => Err(Error::ProjectResolution {
            message: format!("No projects of name {} found", project),
        }),
        _ => Err(Error::ProjectResolution {
            message: format!("Multiple projects of name {} found", project),
        }),
    }
}
