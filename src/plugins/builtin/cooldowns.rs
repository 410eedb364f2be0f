//! Per-user command cooldowns

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::application::errors::BotError;
use crate::infrastructure::plugins::PluginOptions;
use crate::plugins::trait_def::{Module, ModuleInstance};

/// Name the dispatcher looks the module up by
pub const COOLDOWN_MODULE: &str = "cooldowns";

#[derive(Default)]
pub struct CooldownModule {
    last_use: Mutex<HashMap<(String, String), Instant>>,
}

impl CooldownModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a use of `command` by `user`. Returns the seconds left, rounded
    /// up, when the user is still cooling down; the use is not recorded then.
    pub fn check(&self, user: &str, command: &str, cooldown: Duration) -> Option<u64> {
        let now = Instant::now();
        let mut last_use = self.last_use.lock().ok()?;
        let key = (user.to_string(), command.to_string());
        if let Some(last) = last_use.get(&key) {
            let elapsed = now.duration_since(*last);
            if elapsed < cooldown {
                let remaining = (cooldown - elapsed).as_secs_f64().ceil() as u64;
                return Some(remaining.max(1));
            }
        }
        last_use.insert(key, now);
        None
    }

    pub fn reset(&self, user: &str, command: &str) {
        if let Ok(mut last_use) = self.last_use.lock() {
            last_use.remove(&(user.to_string(), command.to_string()));
        }
    }

    pub fn tracked(&self) -> usize {
        self.last_use.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Module for CooldownModule {
    async fn exit(&self) -> Result<(), BotError> {
        if let Ok(mut last_use) = self.last_use.lock() {
            last_use.clear();
        }
        Ok(())
    }
}

pub fn factory(_options: &PluginOptions) -> Result<ModuleInstance, BotError> {
    Ok(ModuleInstance::new(CooldownModule::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_window() {
        let cooldowns = CooldownModule::new();
        let window = Duration::from_secs(30);
        assert_eq!(cooldowns.check("u1", "ping", window), None);
        let remaining = cooldowns.check("u1", "ping", window).unwrap();
        assert!(remaining >= 29 && remaining <= 30);

        // Other users and commands are independent
        assert_eq!(cooldowns.check("u2", "ping", window), None);
        assert_eq!(cooldowns.check("u1", "help", window), None);
        assert_eq!(cooldowns.tracked(), 3);

        cooldowns.reset("u1", "ping");
        assert_eq!(cooldowns.check("u1", "ping", window), None);
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let cooldowns = CooldownModule::new();
        assert_eq!(cooldowns.check("u1", "ping", Duration::ZERO), None);
        assert_eq!(cooldowns.check("u1", "ping", Duration::ZERO), None);
    }

    #[tokio::test]
    async fn test_exit_clears() {
        let cooldowns = CooldownModule::new();
        cooldowns.check("u1", "ping", Duration::from_secs(5));
        cooldowns.exit().await.unwrap();
        assert_eq!(cooldowns.tracked(), 0);
    }
}
