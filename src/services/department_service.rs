use futures::future::join_all;
use tracing::{info, warn};

use super::backend_client::BackendClient;
use crate::error::AppResult;
use crate::models::{Category, Department, NewDepartment, Notice, ADMIN_CATEGORY};

/// A department with the vector indexes still attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentRow {
    pub department: Department,
    pub vector_indexes: usize,
}

/// Departments an administrator may manage. ADMIN itself is never listed.
pub async fn list_departments(backend: &BackendClient) -> AppResult<Vec<Department>> {
    let departments = backend.list_departments().await?;
    Ok(departments.into_iter().filter(|d| !d.is_admin()).collect())
}

/// Managed departments with their vector index counts. A failed count reads as zero.
pub async fn department_rows(backend: &BackendClient) -> AppResult<Vec<DepartmentRow>> {
    let departments = list_departments(backend).await?;
    let counts = join_all(departments.iter().map(|d| vector_index_count(backend, &d.id))).await;
    Ok(departments
        .into_iter()
        .zip(counts)
        .map(|(department, vector_indexes)| DepartmentRow {
            department,
            vector_indexes,
        })
        .collect())
}

async fn vector_index_count(backend: &BackendClient, department_id: &str) -> usize {
    match backend.department_vector_indexes(department_id).await {
        Ok(indexes) => indexes.len(),
        Err(e) => {
            warn!(department_id, error = %e, "vector index lookup failed");
            0
        }
    }
}

fn incomplete(draft: &NewDepartment) -> Option<Notice> {
    (draft.name.trim().is_empty() || draft.category_ids.is_empty())
        .then(|| Notice::error("Please fill in all fields"))
}

pub async fn create_department(backend: &BackendClient, draft: &NewDepartment) -> AppResult<Notice> {
    if let Some(notice) = incomplete(draft) {
        return Ok(notice);
    }
    let created = backend.create_department(draft).await?;
    info!(department_id = %created.id, name = %created.name, "department created");
    Ok(Notice::success("Department created successfully"))
}

pub async fn update_department(
    backend: &BackendClient,
    department_id: &str,
    draft: &NewDepartment,
) -> AppResult<Notice> {
    if let Some(notice) = incomplete(draft) {
        return Ok(notice);
    }
    backend.update_department(department_id, draft).await?;
    info!(department_id, "department updated");
    Ok(Notice::success("Department updated successfully"))
}

/// Deletes a department unless vector indexes still reference it.
pub async fn delete_department(backend: &BackendClient, department_id: &str) -> AppResult<Notice> {
    let indexes = backend.department_vector_indexes(department_id).await?;
    if !indexes.is_empty() {
        return Ok(Notice::info(
            "First, delete the vector indexes associated with this department.",
        ));
    }
    backend.delete_department(department_id).await?;
    info!(department_id, "department deleted");
    Ok(Notice::success("Department deleted successfully"))
}

/// Directory categories a department may be linked to.
pub async fn list_categories(backend: &BackendClient) -> AppResult<Vec<Category>> {
    let categories = backend.list_categories().await?;
    Ok(categories
        .into_iter()
        .filter(|c| c.name != ADMIN_CATEGORY)
        .collect())
}
