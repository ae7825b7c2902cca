use std::{
    env::{self, VarError},
    fs::File,
    io,
    path::{Path, PathBuf},
};

use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use startlinker_core::{
    error::Error,
    model::{CurrentUser, UserId},
    util::mkdir_if_not_exists,
    webapi::WebApiConfig,
};

const APP_NAME: &str = "StartLinker";
const CONFIG_FILENAME: &str = "config.json";
const RECENT_SEARCHES_FILENAME: &str = "recent_searches.json";
const API_URL_ENV_VAR: &str = "STARTLINKER_API_URL";
const PROXY_ENV_VAR: &str = "HTTPS_PROXY";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            token: None,
            user_id: UserId::default(),
            username: String::new(),
            display_name: None,
            avatar: None,
        }
    }
}

impl Config {
    fn app_dirs() -> Option<AppDirs> {
        const USE_XDG_ON_MACOS: bool = false;

        AppDirs::new(Some(APP_NAME), USE_XDG_ON_MACOS)
    }

    pub fn config_dir() -> Option<PathBuf> {
        Self::app_dirs().map(|dirs| dirs.config_dir)
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILENAME))
    }

    pub fn recent_searches_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(RECENT_SEARCHES_FILENAME))
    }

    /// Load the config from the platform config dir.  Returns `None` if there
    /// is no config file yet.
    pub fn load() -> Result<Option<Config>, Error> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Config>, Error> {
        match File::open(path) {
            Ok(file) => {
                log::info!("loading config: {:?}", path);
                Ok(Some(serde_json::from_reader(file)?))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write the config to the platform config dir.
    pub fn save(&self) -> Result<(), Error> {
        let path = Self::config_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no config dir"))?;
        self.save_to(&path)?;
        log::info!("saved config: {:?}", path);
        Ok(())
    }

    fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent() {
            mkdir_if_not_exists(dir)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// API base URL, `STARTLINKER_API_URL` taking precedence over the file.
    pub fn api_url(&self) -> String {
        self.api_url_with(read_env(API_URL_ENV_VAR))
    }

    fn api_url_with(&self, env_override: Option<String>) -> String {
        env_override
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.api_url.clone())
    }

    pub fn proxy() -> Option<String> {
        read_env(PROXY_ENV_VAR)
    }

    pub fn web_api(&self) -> WebApiConfig {
        WebApiConfig {
            base_url: self.api_url(),
            token: self.token.clone(),
            proxy_url: Self::proxy(),
        }
    }

    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.user_id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    env::var(name).map_or_else(
        |err| match err {
            VarError::NotPresent => None,
            VarError::NotUnicode(_) => {
                log::error!("{} is not a valid unicode", name);
                None
            }
        },
        Some,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"user_id": 7, "username": "ada"}"#).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token, None);
        assert_eq!(config.current_user().id, UserId(7));
        assert_eq!(config.current_user().username, "ada");
    }

    #[test]
    fn env_overrides_api_url() {
        let config = Config::default();
        assert_eq!(
            config.api_url_with(Some("https://api.startlinker.com".into())),
            "https://api.startlinker.com"
        );
        assert_eq!(config.api_url_with(Some(" ".into())), DEFAULT_API_URL);
        assert_eq!(config.api_url_with(None), DEFAULT_API_URL);
    }

    #[test]
    fn saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);
        assert_eq!(Config::load_from(&path).unwrap(), None);

        let config = Config {
            token: Some("secret".into()),
            user_id: UserId(3),
            username: "bob".into(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), Some(config));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
