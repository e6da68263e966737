use futures::future::join_all;
use tracing::{debug, info, warn};

use super::backend_client::BackendClient;
use super::identity_service::IdentityClient;
use super::local_store::LocalStore;
use super::vector_store_client::VectorStoreClient;
use crate::error::{AppError, AppResult};
use crate::models::{
    format_temperature, parse_max_tokens, parse_temperature, AccountProfile, DepartmentRef,
    DirectoryDepartment, FormState, ModelCatalog, NewDepartment, NewUser, Notice, Session,
    SessionParameters, ADMIN_DEPARTMENT,
};

/// Group name used when the directory lists fewer than two memberships.
pub const UNKNOWN_GROUP: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Updated,
    Created,
}

impl SaveOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SaveOutcome::Updated => "Data updated successfully!",
            SaveOutcome::Created => "Data saved successfully!",
        }
    }
}

/// Indexes the user may pick after choosing a vector store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSelection {
    pub indexes: Vec<String>,
    pub notice: Option<Notice>,
}

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Overlays the remote session onto the local mirror. Remote wins when it
/// exists; a 404 keeps the mirror and only records the user id; any other
/// failure keeps the mirror untouched. Never fails.
pub async fn load_settings(backend: &BackendClient, store: &LocalStore, user_id: i64) -> FormState {
    let mut form = store.form_state();

    match backend.get_session_by_user_id(user_id).await {
        Ok(session) => {
            let local = form.parameters();
            form.apply_session(&session);
            if form.has_user() && local != form.parameters() {
                debug!(user_id, "local settings differ from remote session, using remote");
            }
            form.user_id = user_id;
        }
        Err(e) if e.is_not_found() => {
            debug!(user_id, "no remote session yet");
            form.user_id = user_id;
        }
        Err(e) => {
            warn!(user_id, error = %e, "session fetch failed, keeping local settings");
        }
    }

    if let Err(e) = store.save_form_state(&form) {
        warn!(error = %e, "failed to write local settings");
    }
    form
}

/// Persists the form as the user's session: updates the existing record, or
/// creates one when the fetch or the update finds none. Never both. The local
/// mirror is written after the remote write succeeds.
pub async fn save_settings(
    backend: &BackendClient,
    store: &LocalStore,
    form: &FormState,
) -> AppResult<SaveOutcome> {
    let mut form = form.clone();
    if form.session_id.is_empty() {
        form.session_id = uuid::Uuid::new_v4().to_string();
    }
    form.temp = format_temperature(form.temp);
    let payload = form.to_session();

    let existing = match backend.get_session_by_user_id(form.user_id).await {
        Ok(existing) => Some(existing),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    // A 404 on the update means the record is gone; create it instead.
    let updated = match existing {
        Some(existing) => {
            match backend
                .update_session_by_user_id(form.user_id, &payload)
                .await
            {
                Ok(echoed) => Some(echoed.or(Some(existing))),
                Err(e) if e.is_not_found() => {
                    debug!(user_id = form.user_id, "session vanished before update");
                    None
                }
                Err(e) => return Err(e),
            }
        }
        None => None,
    };

    let (outcome, stored) = match updated {
        Some(stored) => (SaveOutcome::Updated, stored),
        None => (SaveOutcome::Created, backend.create_session(&payload).await?),
    };

    if let Some(stored) = stored.filter(|s| !s.session_id.is_empty()) {
        form.session_id = stored.session_id;
    }
    store.save_form_state(&form)?;
    info!(user_id = form.user_id, ?outcome, "settings saved");
    Ok(outcome)
}

/// Writes the parameter panel to the mirror, then to the backend. Returns
/// `false` when the mirror has no user id and nothing was sent.
pub async fn save_parameters(
    backend: &BackendClient,
    store: &LocalStore,
    params: &SessionParameters,
) -> AppResult<bool> {
    let form = store.update_form_state(|form| form.apply_parameters(params))?;
    if !form.has_user() {
        warn!("user id not found in local settings");
        return Ok(false);
    }
    backend
        .update_session_parameters(form.user_id, &form.parameters())
        .await?;
    Ok(true)
}

// ============================================================================
// FIELD EDITS
// ============================================================================

pub fn set_vendor(store: &LocalStore, vendor: &str) -> AppResult<FormState> {
    store.update_form_state(|form| {
        if form.llm_vendor != vendor {
            form.llm_model.clear();
        }
        form.llm_vendor = vendor.to_string();
    })
}

pub fn set_model(store: &LocalStore, model: &str) -> AppResult<FormState> {
    store.update_form_state(|form| form.llm_model = model.to_string())
}

pub fn set_temperature(store: &LocalStore, raw: &str) -> AppResult<FormState> {
    let temp = parse_temperature(raw);
    store.update_form_state(|form| form.temp = temp)
}

pub fn set_max_tokens(store: &LocalStore, raw: &str) -> AppResult<FormState> {
    let max_tokens = parse_max_tokens(raw);
    store.update_form_state(|form| form.max_tokens = max_tokens)
}

pub fn set_vector_index(store: &LocalStore, index: &str) -> AppResult<FormState> {
    store.update_form_state(|form| form.vector_index = index.to_string())
}

// ============================================================================
// CATALOGUES AND VECTOR STORES
// ============================================================================

pub async fn llm_catalog(backend: &BackendClient) -> AppResult<ModelCatalog> {
    Ok(ModelCatalog::from_refs(&backend.llm_refs().await?))
}

pub async fn emb_llm_catalog(backend: &BackendClient) -> AppResult<ModelCatalog> {
    Ok(ModelCatalog::from_refs(&backend.emb_llm_refs().await?))
}

/// Selects a vector store and lists the indexes the user may query in it.
/// Members of the ADMIN department see every index; others see the ones
/// recorded for their directory category.
pub async fn select_vector_store(
    backend: &BackendClient,
    vector_stores: &VectorStoreClient,
    identity: &IdentityClient,
    store: &LocalStore,
    vector_store: &str,
) -> AppResult<IndexSelection> {
    let form = store.update_form_state(|form| {
        form.vector_store = vector_store.to_string();
        form.vector_index.clear();
    })?;

    if form.department_id.is_empty() || !form.has_user() {
        return Ok(IndexSelection {
            indexes: Vec::new(),
            notice: Some(Notice::error(
                "Department ID or User ID is not available in local storage",
            )),
        });
    }

    let (indexes, category_id) = tokio::try_join!(
        vector_stores.list_indexes(vector_store),
        directory_category_id(backend, identity, store),
    )?;

    let departments = backend.list_departments().await?;
    let is_admin = departments
        .iter()
        .any(|d| d.name == ADMIN_DEPARTMENT && d.id == form.department_id);
    if is_admin {
        return Ok(IndexSelection {
            indexes,
            notice: None,
        });
    }

    let assigned = backend
        .list_user_vectors(form.user_id, &category_id, vector_store)
        .await?;
    let matched: Vec<String> = assigned
        .into_iter()
        .filter_map(|a| a.vector_index)
        .filter(|index| indexes.contains(index))
        .collect();

    let notice = matched
        .is_empty()
        .then(|| Notice::info("No matching indexes found."));
    Ok(IndexSelection {
        indexes: matched,
        notice,
    })
}

// ============================================================================
// DIRECTORY
// ============================================================================

/// The signed-in account and the display name of its second directory group.
pub async fn directory_group_name(
    identity: &IdentityClient,
    store: &LocalStore,
) -> AppResult<(AccountProfile, String)> {
    let account = store.account();
    if !account.is_signed_in() {
        return Err(AppError::NotAuthenticated("no signed-in account".to_string()));
    }
    let token = identity.get_valid_access_token(store).await?;
    let groups = identity.fetch_member_of(&account.unique_id, &token).await?;
    let name = groups
        .get(1)
        .and_then(|g| g.display_name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_GROUP.to_string());
    Ok((account, name))
}

async fn directory_category_id(
    backend: &BackendClient,
    identity: &IdentityClient,
    store: &LocalStore,
) -> AppResult<String> {
    let (_, group) = directory_group_name(identity, store).await?;
    backend
        .search_categories(&group)
        .await?
        .into_iter()
        .next()
        .map(|c| c.id)
        .ok_or_else(|| AppError::NotFound(format!("category {}", group)))
}

/// Maps a directory group to its backend category and department. With
/// `create_missing` the category and department are created on the fly.
pub async fn resolve_directory_department(
    backend: &BackendClient,
    group: &str,
    create_missing: bool,
) -> AppResult<DirectoryDepartment> {
    let category_id = match backend.search_categories(group).await?.into_iter().next() {
        Some(category) => category.id,
        None if create_missing => {
            info!(group, "creating category for directory group");
            backend.create_category(group).await?.id
        }
        None => return Err(AppError::NotFound(format!("category {}", group))),
    };

    let department_id = match backend.department_id_by_category(&category_id).await? {
        Some(id) => id,
        None if create_missing => {
            info!(group, "creating department for directory group");
            backend
                .create_department(&NewDepartment {
                    name: group.to_string(),
                    category_ids: vec![category_id.clone()],
                })
                .await?
                .id
        }
        None => return Err(AppError::NotFound(format!("department for {}", group))),
    };

    let department = backend.get_department(&department_id).await?;
    let department_name = if department.name.is_empty() {
        UNKNOWN_GROUP.to_string()
    } else {
        department.name
    };

    Ok(DirectoryDepartment {
        department_id,
        department_name,
        directory_name: group.to_string(),
        category_id,
    })
}

// ============================================================================
// SIGN-IN BOOTSTRAP
// ============================================================================

/// Populates the local mirror for a freshly signed-in account. Known users
/// get their stored session; new users are created with a default session.
pub async fn bootstrap_login(
    backend: &BackendClient,
    identity: &IdentityClient,
    store: &LocalStore,
) -> AppResult<FormState> {
    let (account, group) = directory_group_name(identity, store).await?;

    let form = match backend.get_user_by_unique_id(&account.unique_id).await {
        Ok(user) => {
            let lookups = user.department_ids.iter().map(|id| backend.get_department(id));
            let departments: Vec<DepartmentRef> = join_all(lookups)
                .await
                .into_iter()
                .filter_map(|result| match result {
                    Ok(d) => Some(DepartmentRef {
                        id: d.id,
                        name: d.name,
                    }),
                    Err(e) => {
                        warn!(error = %e, "department lookup failed");
                        None
                    }
                })
                .collect();
            let directory = resolve_directory_department(backend, &group, false).await?;

            let mut form = FormState {
                user_id: user.id,
                name: user.name,
                unique_id: user.unique_azure_id,
                department_id: directory.department_id,
                department_name: directory.department_name,
                departments,
                ..Default::default()
            };
            match backend.get_session_by_user_id(user.id).await {
                Ok(session) => form.apply_session(&session),
                Err(e) => warn!(error = %e, "no session for returning user"),
            }
            form
        }
        Err(e) if e.is_not_found() => {
            let directory = resolve_directory_department(backend, &group, false).await?;
            let user = backend
                .create_user(&NewUser {
                    name: account.name.clone(),
                    unique_azure_id: account.unique_id.clone(),
                    department_ids: vec![directory.department_id.clone()],
                })
                .await?;
            info!(user_id = user.id, "created user");

            let unique_id = if user.unique_azure_id.is_empty() {
                account.unique_id.clone()
            } else {
                user.unique_azure_id.clone()
            };
            let defaults = Session::with_defaults(user.id, &unique_id);
            let session = backend
                .create_session(&defaults)
                .await?
                .unwrap_or(defaults);

            let mut form = FormState {
                user_id: user.id,
                name: if user.name.is_empty() { account.name } else { user.name },
                unique_id,
                department_id: directory.department_id,
                department_name: directory.department_name,
                ..Default::default()
            };
            form.apply_session(&session);
            form
        }
        Err(e) => return Err(e),
    };

    store.save_form_state(&form)?;
    Ok(form)
}

/// Refreshes identity fields of the mirror from the directory, creating the
/// backend user, category and department when missing, then reloads the
/// session settings.
pub async fn sync_profile(
    backend: &BackendClient,
    identity: &IdentityClient,
    store: &LocalStore,
) -> AppResult<FormState> {
    let (account, group) = directory_group_name(identity, store).await?;
    let directory = resolve_directory_department(backend, &group, true).await?;

    let user = match backend.get_user_by_unique_id(&account.unique_id).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            backend
                .create_user(&NewUser {
                    name: account.name.clone(),
                    unique_azure_id: account.unique_id.clone(),
                    department_ids: vec![directory.department_id.clone()],
                })
                .await?
        }
        Err(e) => return Err(e),
    };

    let mut form = load_settings(backend, store, user.id).await;
    form.name = account.name;
    form.unique_id = account.unique_id;
    form.department_id = directory.department_id;
    form.department_name = directory.department_name;
    form.user_id = user.id;
    store.save_form_state(&form)?;
    Ok(form)
}
