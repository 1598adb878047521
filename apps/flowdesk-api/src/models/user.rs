use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Workflow role carried in the bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "revisor")]
    Reviewer,
    Supervisor,
    Admin,
}

/// Authenticated identity attached to every live connection and REST request.
///
/// Users themselves live outside this service; the principal is a snapshot of
/// the claims in the credential that opened the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
}
