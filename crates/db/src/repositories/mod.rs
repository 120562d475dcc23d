mod project_criteria_repo;
mod result_repo;
mod visualization_repo;

pub use project_criteria_repo::ProjectCriteriaRepo;
pub use result_repo::ResultRepo;
pub use visualization_repo::VisualizationRepo;
