use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{ReqbenchError, Result};

/// 配置文件名
pub const CONFIG_FILE: &str = "reqbench.toml";
/// 覆盖历史目录的环境变量
pub const HISTORY_DIR_ENV: &str = "REQBENCH_HISTORY_DIR";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_ITEMS: usize = 10_000;
const DEFAULT_HISTORY_DIR: &str = ".reqbench";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 单次请求超时（毫秒）
    pub timeout_ms: u64,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// 未设置时使用 ~/.reqbench
    pub dir: Option<PathBuf>,
    pub max_items: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            history: HistoryConfig::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(ReqbenchError::Config(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.history.max_items == 0 {
            return Err(ReqbenchError::Config(
                "history.max_items must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 历史目录：环境变量 > 配置文件 > ~/.reqbench > ./.reqbench
    pub fn history_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(HISTORY_DIR_ENV)
            && !dir.is_empty()
        {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.history.dir {
            return dir.clone();
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_HISTORY_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR))
    }
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ReqbenchError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Config::parse(&content)
    }

    /// 查找配置文件
    /// 查找顺序：
    /// 1. 当前目录及父目录
    /// 2. 用户配置目录 ~/.config/reqbench/
    pub fn find() -> Option<PathBuf> {
        Self::find_upwards(std::env::current_dir().ok()?).or_else(Self::user_config_path)
    }

    /// 找到就加载，找不到用默认值；文件存在但无效时报错
    pub fn load() -> Result<Config> {
        match Self::find() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load_from_path(path)
            }
            None => Ok(Config::default()),
        }
    }

    fn find_upwards(mut current: PathBuf) -> Option<PathBuf> {
        loop {
            let config_path = current.join(CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }

            // 尝试父目录
            if !current.pop() {
                return None;
            }
        }
    }

    fn user_config_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config_path = home.join(".config").join("reqbench").join(CONFIG_FILE);
        config_path.is_file().then_some(config_path)
    }
}
