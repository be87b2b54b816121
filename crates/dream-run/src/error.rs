fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Errors from composing or running external commands.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("environment variable {0} is not set in the run configuration")]
    MissingEnvironment(String),

    #[error("environment variable {0} is not a nested run configuration")]
    NotNested(String),

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed with {}: {command}", describe_exit(.code))]
    Failed { command: String, code: Option<i32> },
}

pub type RunResult<T> = Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages() {
        let err = RunError::Failed {
            command: "terraform plan".into(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "command failed with exit code 2: terraform plan");

        let err = RunError::Failed {
            command: "x".into(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
    }
}
