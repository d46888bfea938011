use super::*;

/// The jobs a session may still submit against. A clean job supersedes
/// everything sent before it; a same-tip refresh leaves earlier jobs valid.
#[derive(Debug, Default)]
pub(crate) struct Jobs {
    valid: HashMap<JobId, Arc<Job>>,
}

impl Jobs {
    pub(crate) fn new() -> Self {
        Self {
            valid: HashMap::new(),
        }
    }

    pub(crate) fn insert_with_clean(&mut self, job: Arc<Job>, clean_jobs: bool) {
        if clean_jobs {
            self.valid.clear();
        }
        self.valid.insert(job.job_id, job);
    }

    pub(crate) fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.valid.get(id).cloned()
    }
}
