/// What the guard remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureHistory {
    /// The most recent run did not pass
    pub last_failed: bool,
    /// Targets that failed and have not passed since, in first-failure order
    pub failed_paths: Vec<String>,
}

impl FailureHistory {
    /// Append paths not already remembered.
    pub fn add<S: AsRef<str>>(&mut self, paths: &[S]) {
        for path in paths {
            let path = path.as_ref();
            if !self.failed_paths.iter().any(|p| p == path) {
                self.failed_paths.push(path.to_string());
            }
        }
    }

    pub fn remove<S: AsRef<str>>(&mut self, paths: &[S]) {
        self.failed_paths
            .retain(|p| !paths.iter().any(|path| path.as_ref() == p));
    }

    pub fn clear(&mut self) {
        self.failed_paths.clear();
    }
}
