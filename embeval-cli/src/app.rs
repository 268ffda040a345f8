use std::path::Path;

use anyhow::{Result, anyhow};
use embeval_core::{Config, Encoder, EvaluationRunner, Scores, SplitFile};

/// Application state
pub struct App {
    pub config: Config,
    runner: Option<EvaluationRunner>,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runner: None,
            status_message: None,
        }
    }

    pub fn task_name(&self) -> &str {
        &self.config.task.name
    }

    /// Load the split file, build the encoder, and prepare the evaluators
    pub fn load(&mut self, data_path: &Path) -> Result<()> {
        self.status_message = Some("Loading splits...".into());

        let splits = SplitFile::from_file(data_path)?.into_splits()?;
        if splits.train_len() == 0 || splits.test_len() == 0 {
            return Err(anyhow!(
                "Split file must contain both train and test sentences ({} train, {} test)",
                splits.train_len(),
                splits.test_len()
            ));
        }

        self.status_message = Some(format!("Loading encoder {}...", self.config.encoder.model));
        let encoder = Encoder::from_config(&self.config.encoder)?;

        let runner = EvaluationRunner::from_config(&self.config, splits, Box::new(encoder))?;
        self.status_message = Some(format!(
            "Prepared {} evaluators for {}",
            runner.evaluator_count(),
            runner.task()
        ));
        self.runner = Some(runner);
        Ok(())
    }

    pub async fn run(&mut self) -> Result<Vec<Scores>> {
        let runner = self
            .runner
            .as_mut()
            .ok_or_else(|| anyhow!("Splits not loaded"))?;

        let scores = runner.run().await?;
        self.status_message = Some(format!("Finished {} evaluators", scores.len()));
        Ok(scores)
    }
}
