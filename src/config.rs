use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    model_download::default_handpose_model_path,
    quiz::{Question, QuizDefinition, QuizDefinitionError, countdown::DEFAULT_COUNTDOWN_TICKS},
};

pub const CONFIG_PATH_ENV: &str = "SIGN_QUIZ_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "sign-quiz.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid quiz: {0}")]
    Quiz(#[from] QuizDefinitionError),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub evaluator_url: String,
    pub pose_reference_url: String,
    pub request_timeout_secs: u64,
    pub countdown_ticks: u32,
    pub model_path: PathBuf,
    pub questions: Vec<Question>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            evaluator_url: "http://localhost:8080/api/v1/game/answer".to_string(),
            pose_reference_url: "http://localhost:8080/api/v1/game/pose".to_string(),
            request_timeout_secs: 15,
            countdown_ticks: DEFAULT_COUNTDOWN_TICKS,
            model_path: default_handpose_model_path(),
            questions: vec![
                Question::new("바나나", 2),
                Question::new("사과", 1),
                Question::new("고마워요", 2),
                Question::new("안녕하세요", 1),
            ],
        }
    }
}

impl QuizConfig {
    /// Loads from `$SIGN_QUIZ_CONFIG`, else `sign-quiz.toml` in the working
    /// directory. A missing default file means built-in defaults.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(path)
                } else {
                    log::info!("no {DEFAULT_CONFIG_FILE} found, using built-in quiz");
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        log::info!(
            "loaded quiz config from {} ({} questions)",
            path.display(),
            config.questions.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countdown_ticks == 0 {
            return Err(ConfigError::Invalid(
                "countdown_ticks must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.evaluator_url.trim().is_empty() {
            return Err(ConfigError::Invalid("evaluator_url is empty".to_string()));
        }
        self.quiz_definition()?;
        Ok(())
    }

    pub fn quiz_definition(&self) -> Result<QuizDefinition, QuizDefinitionError> {
        QuizDefinition::new(self.questions.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = QuizConfig::default();
        config.validate().unwrap();
        assert_eq!(config.countdown_ticks, 3);
        assert_eq!(config.quiz_definition().unwrap().len(), 4);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let file = write_config(
            r#"
evaluator_url = "https://quiz.example/answer"

[[questions]]
prompt = "바나나"
poses = 2

[[questions]]
prompt = "사과"
poses = 1
"#,
        );

        let config = QuizConfig::load(file.path()).unwrap();
        assert_eq!(config.evaluator_url, "https://quiz.example/answer");
        assert_eq!(config.countdown_ticks, DEFAULT_COUNTDOWN_TICKS);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        let quiz = config.quiz_definition().unwrap();
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz.total_poses(), 3);
    }

    #[test]
    fn empty_quiz_is_rejected() {
        let file = write_config("questions = []\n");
        let err = QuizConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Quiz(QuizDefinitionError::Empty)), "{err}");
    }

    #[test]
    fn zero_countdown_is_rejected() {
        let file = write_config("countdown_ticks = 0\n");
        assert!(matches!(
            QuizConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn broken_toml_is_a_parse_error() {
        let file = write_config("countdown_ticks = \"three\"\n");
        assert!(matches!(
            QuizConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = QuizConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
