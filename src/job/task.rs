use crate::utils::errors::JobError;

/// §9 Design Notes: the source's late-bound task name is modeled as a tagged
/// variant parsed from the incoming string, with an explicit unknown-task
/// error rather than a silent no-op. Concrete processors (fit, despeckle,
/// grid, map) are out of scope (§1) — only the tag and its parameters live
/// here; `job::executor::Executor` is where a real implementation would
/// switch on the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Fit,
    Despeckle,
    MakeGrid { params: String },
    Map { params: String },
}

impl Task {
    pub fn parse(task_name: &str, params: &str) -> Result<Task, JobError> {
        match task_name {
            "fit" => Ok(Task::Fit),
            "despeckle" => Ok(Task::Despeckle),
            "grid" | "make_grid" => Ok(Task::MakeGrid {
                params: params.to_string(),
            }),
            "map" => Ok(Task::Map {
                params: params.to_string(),
            }),
            other => Err(JobError::UnknownTask(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Task::Fit => "fit",
            Task::Despeckle => "despeckle",
            Task::MakeGrid { .. } => "grid",
            Task::Map { .. } => "map",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_name_is_rejected() {
        assert_eq!(Task::parse("does_not_exist", ""), Err(JobError::UnknownTask("does_not_exist".into())));
    }

    #[test]
    fn known_tasks_round_trip_their_name() {
        assert_eq!(Task::parse("fit", "").unwrap().name(), "fit");
        assert_eq!(Task::parse("despeckle", "").unwrap().name(), "despeckle");
        assert_eq!(Task::parse("grid", "w=1").unwrap().name(), "grid");
    }
}
