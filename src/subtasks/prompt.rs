//! Prompt construction for subtask suggestions.

const SYSTEM_PROMPT: &str =
    "You are a productivity assistant. Always respond ONLY with valid JSON.";

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Both parts joined into one prompt, for providers without a system role.
    pub fn as_single_text(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Build the prompt asking the model to split `task_name` into subtasks.
pub fn build_prompt(task_name: &str) -> Prompt {
    let user = format!(
        r#"Break the following task into 3-5 logical subtasks in English.
Each subtask should be a short action phrase, not a sentence.
Return ONLY valid JSON in this format:
{{ "subtasks": ["step 1", "step 2"] }}

Task: "{}""#,
        task_name.trim()
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
