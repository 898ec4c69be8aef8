//! Llama-3 chat prompt for grounded answers.

use crate::core::config::PromptConfig;

use super::index::ScoredChunk;

const BEGIN_OF_TEXT: &str = "<|begin_of_text|>";
const END_OF_TURN: &str = "<|eot_id|>";

fn header(role: &str) -> String {
    format!("<|start_header_id|>{}<|end_header_id|>\n\n", role)
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
    context_header: String,
    question_label: String,
}

impl PromptAssembler {
    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            context_header: config.context_header.clone(),
            question_label: config.question_label.clone(),
        }
    }

    /// Renders the system turn, a user turn holding the passages in the
    /// order given followed by the question, and an open assistant turn.
    pub fn build(&self, question: &str, documents: &[ScoredChunk]) -> String {
        let mut prompt = String::with_capacity(
            self.system_prompt.len()
                + question.len()
                + documents.iter().map(|d| d.content.len() + 6).sum::<usize>()
                + 256,
        );

        prompt.push_str(BEGIN_OF_TEXT);
        prompt.push_str(&header("system"));
        prompt.push_str(&self.system_prompt);
        prompt.push_str(END_OF_TURN);

        prompt.push_str(&header("user"));
        prompt.push_str(&self.context_header);
        prompt.push('\n');
        for document in documents {
            prompt.push_str("\n    ");
            prompt.push_str(&document.content);
            prompt.push('\n');
        }
        prompt.push_str("\n\n");
        prompt.push_str(&self.question_label);
        prompt.push(' ');
        prompt.push_str(question);
        prompt.push_str(END_OF_TURN);

        prompt.push_str(&header("assistant"));
        prompt
    }
}
