use serde::{Deserialize, Serialize};

use super::lenient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unique_azure_id: String,
    #[serde(default, deserialize_with = "lenient::string_vec")]
    pub department_ids: Vec<String>,
}

impl User {
    /// Create responses either return the user itself or wrap it as `{"user": {...}}`.
    pub fn from_create_response(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match value.get("user") {
            Some(inner) if inner.is_object() && value.get("id").is_none() => {
                serde_json::from_value(inner.clone())
            }
            _ => serde_json::from_value(value),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub unique_azure_id: String,
    pub department_ids: Vec<String>,
}

pub const ADMIN_DEPARTMENT: &str = "ADMIN";
pub const ADMIN_CATEGORY: &str = "Application Administrator";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string_vec")]
    pub category_ids: Vec<String>,
}

impl Department {
    pub fn is_admin(&self) -> bool {
        self.name == ADMIN_DEPARTMENT
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    pub name: String,
    pub category_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Category {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
}

/// One group entry from the directory's `memberOf` listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMembership {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberOfResponse {
    #[serde(default)]
    pub value: Vec<DirectoryMembership>,
}

/// Department resolved from the signed-in user's directory membership.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectoryDepartment {
    pub department_id: String,
    pub department_name: String,
    pub directory_name: String,
    pub category_id: String,
}

/// A vector index a user may query, as recorded by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorAssignment {
    #[serde(default)]
    pub vector_index: Option<String>,
}
