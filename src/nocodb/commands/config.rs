use crate::commands::{CmdMessage, CmdResult};
use crate::config::NocoConfig;
use crate::error::Result;
use std::path::Path;

#[derive(Debug, Clone)]
pub enum ConfigAction {
    ShowAll,
    ShowKey(String),
    Set(String, String),
}

#[derive(Debug, Clone)]
pub enum HeaderAction {
    List,
    Set(String, String),
    Delete(String),
}

pub fn run(dir: &Path, action: ConfigAction) -> Result<CmdResult> {
    match action {
        ConfigAction::ShowAll => {
            let config = NocoConfig::load(dir)?;
            Ok(CmdResult::default().with_config(config))
        }
        ConfigAction::ShowKey(key) => {
            let config = NocoConfig::load(dir)?;
            let mut result = CmdResult::default();
            match config.get(&key) {
                Some(val) => result.add_message(CmdMessage::info(val)),
                None => {
                    result.add_message(CmdMessage::error(format!("Unknown config key: {}", key)))
                }
            }
            Ok(result)
        }
        ConfigAction::Set(key, value) => {
            let mut config = NocoConfig::load(dir)?;
            if let Err(e) = config.set(&key, &value) {
                let mut res = CmdResult::default();
                res.add_message(CmdMessage::error(e));
                return Ok(res);
            }
            config.save(dir)?;
            let display_val = config.get(&key).unwrap_or_else(|| value.clone());
            let mut result = CmdResult::default().with_config(config);
            result.add_message(CmdMessage::success(format!(
                "{} set to {}",
                key, display_val
            )));
            Ok(result)
        }
    }
}

pub fn headers(dir: &Path, action: HeaderAction) -> Result<CmdResult> {
    let mut config = NocoConfig::load(dir)?;
    let mut result = CmdResult::default();
    match action {
        HeaderAction::List => {
            if config.headers.is_empty() {
                result.add_message(CmdMessage::info("No headers configured"));
            }
        }
        HeaderAction::Set(name, value) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                result.add_message(CmdMessage::error("Header name cannot be empty"));
                return Ok(result);
            }
            config.headers.insert(name.clone(), value);
            config.save(dir)?;
            result.add_message(CmdMessage::success(format!("Header {} set", name)));
        }
        HeaderAction::Delete(name) => {
            if config.headers.remove(&name).is_some() {
                config.save(dir)?;
                result.add_message(CmdMessage::success(format!("Header {} deleted", name)));
            } else {
                result.add_message(CmdMessage::warning(format!("Header {} was not set", name)));
            }
        }
    }
    Ok(result.with_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use tempfile::TempDir;

    #[test]
    fn set_then_show_key() {
        let temp = TempDir::new().unwrap();
        let set = run(
            temp.path(),
            ConfigAction::Set("baseUrl".into(), "http://localhost:8080".into()),
        )
        .unwrap();
        assert_eq!(set.messages[0].level, MessageLevel::Success);

        let shown = run(temp.path(), ConfigAction::ShowKey("baseUrl".into())).unwrap();
        assert_eq!(shown.messages[0].content, "http://localhost:8080");
    }

    #[test]
    fn invalid_set_reports_error_and_does_not_save() {
        let temp = TempDir::new().unwrap();
        let result = run(
            temp.path(),
            ConfigAction::Set("batchSize".into(), "-1".into()),
        )
        .unwrap();
        assert_eq!(result.messages[0].level, MessageLevel::Error);
        assert!(!temp.path().join("config.json").exists());
    }

    #[test]
    fn headers_set_list_delete() {
        let temp = TempDir::new().unwrap();
        headers(
            temp.path(),
            HeaderAction::Set("xc-token".into(), "abc".into()),
        )
        .unwrap();

        let listed = headers(temp.path(), HeaderAction::List).unwrap();
        let config = listed.config.unwrap();
        assert_eq!(config.headers.get("xc-token").map(String::as_str), Some("abc"));

        let deleted = headers(temp.path(), HeaderAction::Delete("xc-token".into())).unwrap();
        assert!(deleted.config.unwrap().headers.is_empty());

        let again = headers(temp.path(), HeaderAction::Delete("xc-token".into())).unwrap();
        assert_eq!(again.messages[0].level, MessageLevel::Warning);
    }
}
