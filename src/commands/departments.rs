use clap::Subcommand;

use super::context::{show, AppContext};
use crate::error::AppResult;
use crate::models::NewDepartment;
use crate::services::department_service;

#[derive(Debug, Subcommand)]
pub enum DepartmentAction {
    /// List departments with their vector index counts
    List,
    Create {
        name: String,
        /// Category id linked to the department; repeatable
        #[arg(long = "category", required = true)]
        categories: Vec<String>,
    },
    Update {
        id: String,
        name: String,
        #[arg(long = "category", required = true)]
        categories: Vec<String>,
    },
    /// Delete a department that has no vector indexes left
    Delete { id: String },
}

pub async fn run_departments(ctx: &AppContext, action: DepartmentAction) -> AppResult<()> {
    let backend = ctx.backend()?;
    match action {
        DepartmentAction::List => {
            for row in department_service::department_rows(&backend).await? {
                println!(
                    "{:>6}  {:24}  categories: {}  vector indexes: {}",
                    row.department.id,
                    row.department.name,
                    row.department.category_ids.join(","),
                    row.vector_indexes
                );
            }
        }
        DepartmentAction::Create { name, categories } => {
            let draft = NewDepartment {
                name,
                category_ids: categories,
            };
            show(&department_service::create_department(&backend, &draft).await?);
        }
        DepartmentAction::Update {
            id,
            name,
            categories,
        } => {
            let draft = NewDepartment {
                name,
                category_ids: categories,
            };
            show(&department_service::update_department(&backend, &id, &draft).await?);
        }
        DepartmentAction::Delete { id } => {
            show(&department_service::delete_department(&backend, &id).await?);
        }
    }
    Ok(())
}

pub async fn run_categories(ctx: &AppContext) -> AppResult<()> {
    for category in department_service::list_categories(&ctx.backend()?).await? {
        println!("{:>6}  {}", category.id, category.name);
    }
    Ok(())
}
