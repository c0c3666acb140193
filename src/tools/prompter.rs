use anyhow::Result;
use dialoguer::Confirm;

/// 是/否確認；整理流程中唯一會等待使用者的地方
pub trait Prompter {
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// 終端機互動確認
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, message: &str) -> Result<bool> {
        let confirm = Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()?;
        Ok(confirm)
    }
}

/// 固定回答，供非互動情境與測試使用
pub struct FixedPrompter(pub bool);

impl Prompter for FixedPrompter {
    fn confirm(&self, _message: &str) -> Result<bool> {
        Ok(self.0)
    }
}
